//! Domain types shared across the engine.
//!
//! Accounts, campaigns, rules, and templates are created through the
//! dashboard (out of scope here) and are read-only inputs to the pipeline.
//! `DeliveryLogEntry` is the engine's only write.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ── Action kind ─────────────────────────────────────────────────────

/// The effect applied to an inbound comment/message when a rule fires.
///
/// Stored rules keep the raw action string (`AutomationRule::action`);
/// parsing happens at evaluation time so unknown values can terminate as a
/// logged no-op instead of failing row decode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    /// Create a public comment reply on the source event.
    Reply,
    /// Send a private message to the actor.
    Dm,
    /// Mark the source comment as hidden.
    Hide,
    /// Remove the source comment.
    Delete,
}

impl ActionKind {
    /// Parse a stored action string. Returns `None` for unrecognized values.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "reply" => Some(Self::Reply),
            "dm" => Some(Self::Dm),
            "hide" => Some(Self::Hide),
            "delete" => Some(Self::Delete),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Reply => "reply",
            Self::Dm => "dm",
            Self::Hide => "hide",
            Self::Delete => "delete",
        }
    }

    /// Whether this action carries response text (reply/dm) or acts on the
    /// source event alone (hide/delete).
    pub fn needs_text(&self) -> bool {
        matches!(self, Self::Reply | Self::Dm)
    }
}

// ── Match kind ──────────────────────────────────────────────────────

/// How a rule keyword is compared against the event text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchKind {
    /// Full trimmed text equals the keyword (case-insensitive).
    Exact,
    /// Keyword appears anywhere in the text (case-insensitive).
    Contains,
}

impl MatchKind {
    /// Decode a stored match type. Unknown strings fall back to `Exact` —
    /// a corrupt row must not start firing on substrings.
    pub fn parse(s: &str) -> Self {
        match s {
            "contains" => Self::Contains,
            _ => Self::Exact,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Exact => "exact",
            Self::Contains => "contains",
        }
    }
}

// ── Template kind ───────────────────────────────────────────────────

/// Visibility/behavior of a response template.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TemplateKind {
    /// Used for public comment replies.
    Public,
    /// Used for private (DM) replies.
    Private,
    /// Defers to the generative text provider instead of static text.
    Generative,
}

impl TemplateKind {
    pub fn parse(s: &str) -> Self {
        match s {
            "private" => Self::Private,
            "generative" => Self::Generative,
            _ => Self::Public,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Public => "public",
            Self::Private => "private",
            Self::Generative => "generative",
        }
    }
}

// ── Stored entities ─────────────────────────────────────────────────

/// A tenant's link to a connected platform page.
///
/// Looked up by page id, never mutated by the engine (token refresh is an
/// external collaborator concern).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TenantAccount {
    pub id: String,
    pub tenant_id: String,
    /// Platform page identifier.
    pub page_id: String,
    /// Business-account identifier — some platform types deliver events keyed
    /// by this instead of the page id.
    pub business_account_id: Option<String>,
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
}

impl TenantAccount {
    /// The access token, if present and non-blank.
    pub fn usable_token(&self) -> Option<&str> {
        self.access_token
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
    }
}

/// A named grouping of automation rules configured by a tenant.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Campaign {
    pub id: String,
    pub account_id: String,
    pub name: String,
    pub enabled: bool,
}

/// A keyword rule. Rules are evaluated in creation order; the first match
/// wins and at most one rule fires per event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AutomationRule {
    pub id: String,
    pub campaign_id: String,
    pub keyword: String,
    pub match_kind: MatchKind,
    /// Raw action string as stored; see [`ActionKind::parse`].
    pub action: String,
    pub template_id: Option<String>,
}

impl AutomationRule {
    /// The typed action, or `None` for unrecognized values (no-op).
    pub fn action_kind(&self) -> Option<ActionKind> {
        ActionKind::parse(&self.action)
    }
}

/// A response template referenced by rules.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponseTemplate {
    pub id: String,
    pub tenant_id: String,
    pub kind: TemplateKind,
    pub text: String,
}

/// Durability record of a dispatched action — append-only, written once per
/// successful dispatch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliveryLogEntry {
    pub source_event_id: String,
    pub action_taken: ActionKind,
    pub response_text: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl DeliveryLogEntry {
    pub fn new(
        source_event_id: &str,
        action_taken: ActionKind,
        response_text: Option<String>,
    ) -> Self {
        Self {
            source_event_id: source_event_id.to_string(),
            action_taken,
            response_text,
            created_at: Utc::now(),
        }
    }
}
