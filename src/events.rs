//! Event normalizer — parses raw webhook payloads into canonical events.
//!
//! Platform webhooks deliver deeply nested, loosely-shaped JSON. A single
//! validating parse here produces a tagged result so the rest of the
//! pipeline never touches the raw payload. Anything that isn't a brand-new
//! comment or message (edits, likes, reactions, echoes, the page's own
//! comments) comes back as `Unrecognized` — ignored, never an error.

use serde::Deserialize;
use tracing::debug;

// ── Canonical event ─────────────────────────────────────────────────

/// What kind of inbound event this is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    Comment,
    Message,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Comment => "comment",
            Self::Message => "message",
        }
    }
}

/// Canonical inbound event — the transient input to the pipeline.
/// Created per webhook delivery, never persisted.
#[derive(Debug, Clone)]
pub struct InboundEvent {
    /// Page/business-account identifier the event belongs to.
    pub page_id: String,
    pub kind: EventKind,
    /// Comment id or message id.
    pub source_id: String,
    /// The commenting/messaging user.
    pub actor_id: String,
    pub text: String,
}

/// Result of normalizing a raw webhook payload.
#[derive(Debug, Clone)]
pub enum WebhookEvent {
    Comment(InboundEvent),
    Message(InboundEvent),
    Unrecognized,
}

impl WebhookEvent {
    /// The event, if this payload represented one.
    pub fn into_event(self) -> Option<InboundEvent> {
        match self {
            Self::Comment(e) | Self::Message(e) => Some(e),
            Self::Unrecognized => None,
        }
    }
}

// ── Raw payload shapes ──────────────────────────────────────────────
//
// Everything is optional: the platform sends many shapes through the same
// endpoint and absent fields are routine, not malformed.

#[derive(Debug, Deserialize)]
struct Envelope {
    #[serde(default)]
    entry: Vec<Entry>,
}

#[derive(Debug, Deserialize)]
struct Entry {
    id: Option<String>,
    #[serde(default)]
    changes: Vec<Change>,
    #[serde(default)]
    messaging: Vec<Messaging>,
}

#[derive(Debug, Deserialize)]
struct Change {
    field: Option<String>,
    value: Option<ChangeValue>,
}

#[derive(Debug, Deserialize)]
struct ChangeValue {
    item: Option<String>,
    verb: Option<String>,
    comment_id: Option<String>,
    message: Option<String>,
    from: Option<Actor>,
}

#[derive(Debug, Deserialize)]
struct Messaging {
    sender: Option<Actor>,
    recipient: Option<Actor>,
    message: Option<MessageBody>,
}

#[derive(Debug, Deserialize)]
struct MessageBody {
    mid: Option<String>,
    text: Option<String>,
    #[serde(default)]
    is_echo: bool,
}

#[derive(Debug, Deserialize)]
struct Actor {
    id: Option<String>,
}

// ── Normalization ───────────────────────────────────────────────────

/// Parse a raw webhook payload into a canonical event.
///
/// Pure transformation — no I/O, no errors. Payloads that don't represent a
/// new comment or message are `Unrecognized`.
pub fn normalize(payload: &serde_json::Value) -> WebhookEvent {
    let envelope: Envelope = match serde_json::from_value(payload.clone()) {
        Ok(env) => env,
        Err(e) => {
            debug!(error = %e, "Payload does not match webhook envelope shape");
            return WebhookEvent::Unrecognized;
        }
    };

    for entry in &envelope.entry {
        if let Some(event) = comment_from_entry(entry) {
            return WebhookEvent::Comment(event);
        }
        if let Some(event) = message_from_entry(entry) {
            return WebhookEvent::Message(event);
        }
    }

    WebhookEvent::Unrecognized
}

/// Extract a new-comment event from a feed change, if present.
fn comment_from_entry(entry: &Entry) -> Option<InboundEvent> {
    let page_id = entry.id.as_deref()?;

    for change in &entry.changes {
        // Only feed/comment changes carry comments; likes, reactions and
        // other fields arrive on the same endpoint.
        match change.field.as_deref() {
            Some("feed") | Some("comments") => {}
            _ => continue,
        }

        let Some(value) = change.value.as_ref() else {
            continue;
        };
        if value.item.as_deref() != Some("comment") || value.verb.as_deref() != Some("add") {
            // Edits, removals, likes on comments.
            continue;
        }

        let (Some(comment_id), Some(text)) = (value.comment_id.as_deref(), value.message.as_deref())
        else {
            continue;
        };
        let Some(actor_id) = value.from.as_ref().and_then(|f| f.id.as_deref()) else {
            continue;
        };

        // Loop guard: the page's own comments (including our dispatched
        // replies) must not re-trigger the pipeline.
        if actor_id == page_id {
            debug!(comment_id, "Skipping page's own comment");
            continue;
        }

        return Some(InboundEvent {
            page_id: page_id.to_string(),
            kind: EventKind::Comment,
            source_id: comment_id.to_string(),
            actor_id: actor_id.to_string(),
            text: text.to_string(),
        });
    }

    None
}

/// Extract a new direct-message event, if present.
fn message_from_entry(entry: &Entry) -> Option<InboundEvent> {
    for messaging in &entry.messaging {
        let Some(message) = messaging.message.as_ref() else {
            // Delivery/read receipts, postbacks.
            continue;
        };
        if message.is_echo {
            // Echoes of messages the page itself sent.
            continue;
        }

        let (Some(text), Some(mid)) = (message.text.as_deref(), message.mid.as_deref()) else {
            continue;
        };
        let Some(actor_id) = messaging.sender.as_ref().and_then(|s| s.id.as_deref()) else {
            continue;
        };
        let Some(page_id) = messaging
            .recipient
            .as_ref()
            .and_then(|r| r.id.as_deref())
            .or(entry.id.as_deref())
        else {
            continue;
        };

        return Some(InboundEvent {
            page_id: page_id.to_string(),
            kind: EventKind::Message,
            source_id: mid.to_string(),
            actor_id: actor_id.to_string(),
            text: text.to_string(),
        });
    }

    None
}
