use axum::{http::HeaderValue, routing::get, Router};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use acrophylia::{
    api,
    config::{GameConfig, ServerConfig},
    content::{ContentProvider, LlmContentProvider, StaticContentProvider},
    llm,
    state::AppState,
    ws,
};

fn cors_layer(origins: &[String]) -> CorsLayer {
    if origins.is_empty() {
        return CorsLayer::permissive();
    }

    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::warn!("Ignoring invalid CORS origin {}: {}", origin, e);
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods(Any)
        .allow_headers(Any)
}

/// LLM-backed content when a provider is configured, local content otherwise
fn content_provider() -> Arc<dyn ContentProvider> {
    let llm_config = llm::LlmConfig::from_env();
    match llm_config.build_manager() {
        Ok(manager) => {
            tracing::info!(
                "LLM providers initialized: {}",
                manager.provider_names().join(", ")
            );
            Arc::new(LlmContentProvider::new(manager, llm_config))
        }
        Err(e) => {
            tracing::warn!(
                "Failed to initialize LLM providers: {}. Using built-in content.",
                e
            );
            Arc::new(StaticContentProvider)
        }
    }
}

#[tokio::main]
async fn main() -> std::io::Result<()> {
    // Load .env file if present (before any env var reads)
    if let Err(e) = dotenvy::dotenv() {
        // Not an error if .env doesn't exist, only log if it's a different issue
        if !matches!(e, dotenvy::Error::Io(_)) {
            eprintln!("Warning: Failed to load .env file: {}", e);
        }
    }

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "acrophylia=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Acrophylia...");

    let server_config = ServerConfig::from_env();
    let game_config = GameConfig::from_env();
    tracing::info!(
        "Rooms need {} players, {} rounds by default, scoring {:?}",
        game_config.min_players,
        game_config.default_total_rounds,
        game_config.scoring
    );

    let state = Arc::new(AppState::new(content_provider(), game_config));

    let app = Router::new()
        .route("/ws", get(ws::ws_handler))
        .route("/api/health", get(api::health))
        .route("/api/rooms/{room_id}", get(api::room_summary))
        .layer(cors_layer(&server_config.cors_origins))
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], server_config.port));
    tracing::info!("Listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await
}
