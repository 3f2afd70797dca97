//! Error types for ReplyFlow.

/// Top-level error type for the engine.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Dispatch error: {0}")]
    Dispatch(#[from] DispatchError),

    #[error("Generation error: {0}")]
    Generation(#[from] GenerationError),

    #[error("Pipeline error: {0}")]
    Pipeline(#[from] PipelineError),
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

/// Persistence errors from the engine store.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Failed to open database: {0}")]
    Open(String),

    #[error("Query failed: {0}")]
    Query(String),

    #[error("Entity not found: {entity} with id {id}")]
    NotFound { entity: String, id: String },

    #[error("Migration failed: {0}")]
    Migration(String),
}

/// Errors from the platform Graph API.
///
/// The Graph API reports failures both via HTTP status and via an `error`
/// object inside 2xx bodies — both map to `Api` with the raw body kept
/// for diagnostics.
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("Graph API request failed: {0}")]
    Request(String),

    #[error("Graph API error (status {status}): {body}")]
    Api { status: u16, body: String },
}

/// Generative text provider errors.
#[derive(Debug, thiserror::Error)]
pub enum GenerationError {
    #[error("Provider request failed: {0}")]
    Request(String),

    #[error("Provider returned an error (status {status}): {body}")]
    Api { status: u16, body: String },

    #[error("Invalid response from provider: {0}")]
    InvalidResponse(String),
}

/// Pipeline-level errors. These are the internal-fault class: anything that
/// reaches the webhook handler as a `PipelineError` becomes an HTTP 500.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

/// Result type alias for the engine.
pub type Result<T> = std::result::Result<T, Error>;
