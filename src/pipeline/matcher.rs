//! Rule matcher — ordered first-match keyword evaluation.
//!
//! Rules are evaluated in their stored (creation) order and the first rule
//! whose keyword matches wins. No scoring, no multi-rule application: at
//! most one rule fires per event.

use tracing::debug;

use crate::model::{AutomationRule, MatchKind};

/// Return the first rule in stored order whose keyword matches `text`.
///
/// Matching is case-insensitive. `exact` compares the trimmed text against
/// the keyword; `contains` looks for the keyword as a substring. Rules with
/// blank keywords never match. A `None` return is a normal, frequent
/// outcome, not an error.
pub fn first_match<'a>(rules: &'a [AutomationRule], text: &str) -> Option<&'a AutomationRule> {
    let normalized = text.trim().to_lowercase();

    for rule in rules {
        let keyword = rule.keyword.trim().to_lowercase();
        if keyword.is_empty() {
            // Defensive skip — an empty keyword would match everything.
            continue;
        }

        let hit = match rule.match_kind {
            MatchKind::Exact => normalized == keyword,
            MatchKind::Contains => normalized.contains(&keyword),
        };

        if hit {
            debug!(
                rule_id = %rule.id,
                keyword = %rule.keyword,
                match_kind = rule.match_kind.as_str(),
                "Rule matched"
            );
            return Some(rule);
        }
    }

    None
}
