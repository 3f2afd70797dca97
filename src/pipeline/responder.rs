//! Response resolver — turns a matched rule's action into response text.
//!
//! Only consulted for reply/dm actions; hide/delete never reach this stage.
//! Generative failures degrade to canned text — the pipeline keeps going
//! rather than failing the webhook on a flaky AI provider.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::genai::ReplyGenerator;
use crate::model::{ActionKind, ResponseTemplate, TemplateKind};

/// Generic acknowledgment used whenever no usable template or generated
/// text is available. The dispatched action always carries non-empty text.
pub const FALLBACK_REPLY: &str = "Thanks for your comment!";

/// Resolves response text for reply/dm actions.
pub struct ReplyResolver {
    generator: Option<Arc<dyn ReplyGenerator>>,
}

impl ReplyResolver {
    pub fn new(generator: Option<Arc<dyn ReplyGenerator>>) -> Self {
        Self { generator }
    }

    /// Produce response text for a `reply` or `dm` action.
    ///
    /// A `generative` template takes precedence over static templates
    /// regardless of visibility — the tenant has opted into AI drafting for
    /// all auto-replies. Otherwise `reply` selects a `public` template and
    /// `dm` a `private` one. Every failure path lands on [`FALLBACK_REPLY`].
    pub async fn resolve(
        &self,
        action: ActionKind,
        templates: &[ResponseTemplate],
        original_text: &str,
    ) -> String {
        if let Some(template) = templates.iter().find(|t| t.kind == TemplateKind::Generative) {
            debug!(template_id = %template.id, "Using generative template");
            return self.generate(original_text).await;
        }

        let wanted = match action {
            ActionKind::Reply => TemplateKind::Public,
            ActionKind::Dm => TemplateKind::Private,
            // Hide/delete carry no text; the engine skips this stage for
            // them, but resolve defensively anyway.
            ActionKind::Hide | ActionKind::Delete => return FALLBACK_REPLY.to_string(),
        };

        match templates.iter().find(|t| t.kind == wanted) {
            Some(template) => template.text.clone(),
            None => {
                debug!(
                    action = action.as_str(),
                    "No template for action, using fallback text"
                );
                FALLBACK_REPLY.to_string()
            }
        }
    }

    /// Call the generator, falling back to canned text on any failure —
    /// missing credentials, provider error, or timeout.
    async fn generate(&self, original_text: &str) -> String {
        let Some(generator) = self.generator.as_ref() else {
            warn!("Generative template configured but no generator credentials; using fallback");
            return FALLBACK_REPLY.to_string();
        };

        match generator.draft_reply(original_text).await {
            Ok(text) => text,
            Err(e) => {
                warn!(error = %e, "Generative draft failed, using fallback");
                FALLBACK_REPLY.to_string()
            }
        }
    }
}
