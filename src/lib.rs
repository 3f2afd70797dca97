//! ReplyFlow — webhook-driven comment & DM automation engine.

pub mod config;
pub mod error;
pub mod events;
pub mod genai;
pub mod graph;
pub mod model;
pub mod pipeline;
pub mod store;
pub mod webhook;
