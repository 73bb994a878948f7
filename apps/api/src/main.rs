mod config;
mod db;
mod errors;
mod llm_client;
mod models;
mod routes;
mod state;
mod suggestions;

use anyhow::Result;
use aws_config::Region;
use aws_sdk_s3::config::Credentials;
use std::net::SocketAddr;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use std::sync::Arc;

use crate::config::Config;
use crate::db::create_pool;
use crate::llm_client::LlmClient;
use crate::routes::build_router;
use crate::state::AppState;
use crate::suggestions::generator::{
    AiSuggestionGenerator, HeuristicGenerator, SuggestionGenerator,
};

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (fails on missing required env vars)
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}={}", env!("CARGO_CRATE_NAME"), &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Vellum API v{}", env!("CARGO_PKG_VERSION"));

    // Initialize PostgreSQL
    let db = create_pool(&config.database_url).await?;

    // Initialize S3 / MinIO
    let s3 = build_s3_client(&config).await;
    info!("S3 client initialized");

    let suggester = build_suggester(&config)?;
    info!("Suggestion generator: {}", suggester.backend());

    // Build app state
    let state = AppState {
        db,
        s3,
        config: config.clone(),
        suggester,
    };

    // Build router
    // TODO: restrict CORS origins once the editor frontend has a fixed host
    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// AI generator when enabled and keyed (ENABLE_AI_SUGGESTIONS + ANTHROPIC_API_KEY),
/// heuristic scan otherwise.
fn build_suggester(config: &Config) -> Result<Arc<dyn SuggestionGenerator>> {
    Ok(match (&config.anthropic_api_key, config.enable_ai_suggestions) {
        (Some(key), true) => {
            let llm = LlmClient::new(key.clone())?;
            info!("LLM client initialized (model: {})", llm_client::MODEL);
            Arc::new(AiSuggestionGenerator::new(llm, config.ai_fallback_to_heuristic))
        }
        (None, true) => {
            info!("ANTHROPIC_API_KEY not set; AI suggestions disabled");
            Arc::new(HeuristicGenerator)
        }
        _ => Arc::new(HeuristicGenerator),
    })
}

/// Constructs an S3 client configured for MinIO (local) or AWS (production).
async fn build_s3_client(config: &Config) -> aws_sdk_s3::Client {
    let credentials = Credentials::new(
        &config.aws_access_key_id,
        &config.aws_secret_access_key,
        None,
        None,
        "vellum-static",
    );

    let s3_config = aws_config::defaults(aws_config::BehaviorVersion::latest())
        .region(Region::new("us-east-1"))
        .credentials_provider(credentials)
        .endpoint_url(&config.s3_endpoint)
        .load()
        .await;

    aws_sdk_s3::Client::new(&s3_config)
}
