//! Configuration loaded from the environment.

use secrecy::SecretString;

use crate::error::ConfigError;
use crate::graph::DEFAULT_GRAPH_BASE_URL;

/// Engine configuration.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Token the platform must echo during the GET verification handshake.
    pub verify_token: String,
    /// Path to the local libSQL database file.
    pub db_path: String,
    /// Port the webhook server listens on.
    pub port: u16,
    /// Graph API base URL (overridable for tests/staging).
    pub graph_base_url: String,
    /// Generative provider key; absent means no AI drafting.
    pub openai_api_key: Option<SecretString>,
    /// Model used for drafted replies.
    pub genai_model: String,
}

impl EngineConfig {
    /// Read configuration from the environment.
    ///
    /// Only the verify token is required — everything else has a default,
    /// and a missing provider key degrades to canned fallback replies.
    pub fn from_env() -> Result<Self, ConfigError> {
        let verify_token = std::env::var("REPLYFLOW_VERIFY_TOKEN")
            .map_err(|_| ConfigError::MissingEnvVar("REPLYFLOW_VERIFY_TOKEN".into()))?;

        let db_path = std::env::var("REPLYFLOW_DB_PATH")
            .unwrap_or_else(|_| "./data/replyflow.db".to_string());

        let port_raw = std::env::var("REPLYFLOW_PORT").unwrap_or_else(|_| "8080".to_string());
        let port: u16 = port_raw.parse().map_err(|_| ConfigError::InvalidValue {
            key: "REPLYFLOW_PORT".into(),
            message: format!("not a valid port: {port_raw}"),
        })?;

        let graph_base_url = std::env::var("REPLYFLOW_GRAPH_BASE_URL")
            .unwrap_or_else(|_| DEFAULT_GRAPH_BASE_URL.to_string());

        let openai_api_key = std::env::var("OPENAI_API_KEY")
            .ok()
            .filter(|k| !k.trim().is_empty())
            .map(SecretString::from);

        let genai_model = std::env::var("REPLYFLOW_GENAI_MODEL")
            .unwrap_or_else(|_| crate::genai::DEFAULT_MODEL.to_string());

        Ok(Self {
            verify_token,
            db_path,
            port,
            graph_base_url,
            openai_api_key,
            genai_model,
        })
    }
}
