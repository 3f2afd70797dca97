//! Pipeline orchestrator — runs one inbound webhook payload through the
//! full automation pipeline.
//!
//! Stages execute strictly sequentially; each can short-circuit with a
//! distinct terminal outcome instead of an error. Only store failures
//! propagate as `PipelineError` (the internal-fault class → HTTP 500);
//! everything else, including downstream dispatch failures, resolves to an
//! outcome so the platform never retries a processed event.

use std::sync::Arc;

use tracing::{debug, error, info, warn};

use crate::error::PipelineError;
use crate::events::{WebhookEvent, normalize};
use crate::graph::{GraphApi, dispatch};
use crate::model::{ActionKind, DeliveryLogEntry};
use crate::pipeline::matcher::first_match;
use crate::pipeline::responder::ReplyResolver;
use crate::store::EngineStore;

/// Terminal state of one pipeline run.
///
/// Every variant acknowledges the webhook with HTTP 200; the distinction is
/// carried in the response body and the logs.
#[derive(Debug, Clone)]
pub enum PipelineOutcome {
    /// Payload didn't represent a new comment/message.
    Ignored,
    /// No tenant account connected for the event's page.
    NoAccount { page_id: String },
    /// Account exists but has no usable access token.
    Misconfigured { account_id: String },
    /// No rule matched the event text.
    NoMatch,
    /// Rule carries an action kind this engine doesn't implement.
    UnsupportedAction { action: String },
    /// The platform API rejected the dispatch.
    DispatchFailed { action: ActionKind, error: String },
    /// Action dispatched and logged.
    Delivered {
        action: ActionKind,
        response_text: Option<String>,
    },
}

impl PipelineOutcome {
    /// Short label for logging and the webhook response body.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Ignored => "ignored",
            Self::NoAccount { .. } => "no_account",
            Self::Misconfigured { .. } => "misconfigured",
            Self::NoMatch => "no_match",
            Self::UnsupportedAction { .. } => "unsupported_action",
            Self::DispatchFailed { .. } => "dispatch_failed",
            Self::Delivered { .. } => "delivered",
        }
    }

    /// The coarse `status` field of the webhook response.
    pub fn status(&self) -> &'static str {
        match self {
            Self::Delivered { .. } => "processed",
            _ => "ignored",
        }
    }
}

/// The automation engine. Stateless per call — all cross-call state lives
/// in the store, read fresh on every webhook so rule edits apply
/// immediately.
pub struct Engine {
    store: Arc<dyn EngineStore>,
    graph: Arc<dyn GraphApi>,
    resolver: ReplyResolver,
}

impl Engine {
    pub fn new(
        store: Arc<dyn EngineStore>,
        graph: Arc<dyn GraphApi>,
        resolver: ReplyResolver,
    ) -> Self {
        Self {
            store,
            graph,
            resolver,
        }
    }

    /// Run one raw webhook payload through the pipeline.
    pub async fn handle(
        &self,
        payload: &serde_json::Value,
    ) -> Result<PipelineOutcome, PipelineError> {
        // Stage 1: normalize.
        let event = match normalize(payload) {
            WebhookEvent::Comment(e) | WebhookEvent::Message(e) => e,
            WebhookEvent::Unrecognized => {
                debug!("Payload not a new comment/message, ignoring");
                return Ok(PipelineOutcome::Ignored);
            }
        };

        info!(
            kind = event.kind.as_str(),
            source_id = %event.source_id,
            page_id = %event.page_id,
            "Processing inbound event"
        );

        // Stage 2: resolve the tenant account.
        let Some(account) = self.store.find_account_by_page(&event.page_id).await? else {
            info!(page_id = %event.page_id, "No connected account for page");
            return Ok(PipelineOutcome::NoAccount {
                page_id: event.page_id,
            });
        };

        let Some(token) = account.usable_token().map(String::from) else {
            // Retrying won't fix missing config — logged, acknowledged.
            warn!(
                account_id = %account.id,
                tenant_id = %account.tenant_id,
                "Account has no access token, skipping event"
            );
            return Ok(PipelineOutcome::Misconfigured {
                account_id: account.id,
            });
        };

        // Stage 3: match rules, first match wins.
        let rules = self.store.rules_for_account(&account.id).await?;
        let Some(rule) = first_match(&rules, &event.text) else {
            debug!(source_id = %event.source_id, "No rule matched");
            return Ok(PipelineOutcome::NoMatch);
        };

        let Some(action) = rule.action_kind() else {
            // Forward compatibility: action kinds we don't implement yet are
            // a logged no-op, never fatal.
            warn!(
                rule_id = %rule.id,
                action = %rule.action,
                "Rule has unsupported action, skipping"
            );
            return Ok(PipelineOutcome::UnsupportedAction {
                action: rule.action.clone(),
            });
        };

        // Stage 4: resolve response text. Hide/delete skip this entirely —
        // no template read, no generative call.
        let response_text = if action.needs_text() {
            let templates = self.store.templates_for_tenant(&account.tenant_id).await?;
            Some(
                self.resolver
                    .resolve(action, &templates, &event.text)
                    .await,
            )
        } else {
            None
        };

        // Stage 5: dispatch.
        if let Err(e) = dispatch(
            self.graph.as_ref(),
            action,
            &event,
            &token,
            response_text.as_deref(),
        )
        .await
        {
            error!(
                action = action.as_str(),
                source_id = %event.source_id,
                error = %e,
                "Dispatch failed"
            );
            return Ok(PipelineOutcome::DispatchFailed {
                action,
                error: e.to_string(),
            });
        }

        // Stage 6: delivery log — only after a successful dispatch.
        self.store
            .record_delivery(&DeliveryLogEntry::new(
                &event.source_id,
                action,
                response_text.clone(),
            ))
            .await?;

        Ok(PipelineOutcome::Delivered {
            action,
            response_text,
        })
    }
}
