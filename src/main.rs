use std::sync::Arc;

use replyflow::config::EngineConfig;
use replyflow::genai::{OpenAiGenerator, ReplyGenerator};
use replyflow::graph::{GraphApi, GraphClient};
use replyflow::pipeline::{Engine, ReplyResolver};
use replyflow::store::{EngineStore, LibSqlStore};
use replyflow::webhook::webhook_routes;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let config = EngineConfig::from_env().map_err(|e| {
        eprintln!("Error: {e}");
        eprintln!("  export REPLYFLOW_VERIFY_TOKEN=<your webhook verify token>");
        anyhow::anyhow!("configuration failed")
    })?;

    eprintln!("⚙  ReplyFlow v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   Webhook: http://0.0.0.0:{}/webhook", config.port);
    eprintln!("   Database: {}", config.db_path);
    eprintln!("   Graph API: {}", config.graph_base_url);

    // ── Store ────────────────────────────────────────────────────────────
    let store: Arc<dyn EngineStore> = Arc::new(
        LibSqlStore::new_local(std::path::Path::new(&config.db_path))
            .await
            .map_err(|e| anyhow::anyhow!("failed to open database at {}: {e}", config.db_path))?,
    );

    // ── Graph API client ─────────────────────────────────────────────────
    let graph: Arc<dyn GraphApi> = Arc::new(GraphClient::new(config.graph_base_url.clone()));

    // ── Generative provider (optional) ───────────────────────────────────
    let generator: Option<Arc<dyn ReplyGenerator>> = match config.openai_api_key.clone() {
        Some(key) => {
            eprintln!("   Generative replies: enabled ({})", config.genai_model);
            Some(Arc::new(OpenAiGenerator::new(key, config.genai_model.clone())))
        }
        None => {
            eprintln!("   Generative replies: disabled (no OPENAI_API_KEY)");
            None
        }
    };

    // ── Engine + server ──────────────────────────────────────────────────
    let engine = Arc::new(Engine::new(store, graph, ReplyResolver::new(generator)));
    let app = webhook_routes(engine, &config.verify_token)
        .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()));

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", config.port)).await?;
    tracing::info!(port = config.port, "Webhook server started");
    axum::serve(listener, app).await?;

    Ok(())
}
