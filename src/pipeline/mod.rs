//! The automation pipeline: normalize → resolve account → match rule →
//! resolve response → dispatch → log.

pub mod engine;
pub mod matcher;
pub mod responder;

pub use engine::{Engine, PipelineOutcome};
pub use matcher::first_match;
pub use responder::{FALLBACK_REPLY, ReplyResolver};
