//! HTTP API Server
//!
//! Starts and manages the axum-based HTTP server.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use http::HeaderValue;
use axum::routing::get;
use axum::{middleware, Router};
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use care_core::{ApiConfig, Config, Marketplace};

use crate::handlers::health;
use crate::middleware::auth_middleware;
use crate::routes::routes;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub marketplace: Arc<Marketplace>,
}

impl AppState {
    pub fn new(config: Config, marketplace: Arc<Marketplace>) -> Self {
        Self {
            config: Arc::new(config),
            marketplace,
        }
    }
}

/// CORS from the configured origins; permissive when none are configured
fn cors_layer(config: &ApiConfig) -> CorsLayer {
    match &config.allowed_origins {
        Some(origins) => {
            let origins: Vec<HeaderValue> = origins
                .iter()
                .filter_map(|origin| match HeaderValue::from_str(origin) {
                    Ok(value) => Some(value),
                    Err(_) => {
                        warn!("Ignoring invalid CORS origin: {}", origin);
                        None
                    }
                })
                .collect();
            CorsLayer::new()
                .allow_origin(AllowOrigin::list(origins))
                .allow_methods(Any)
                .allow_headers(Any)
        }
        None => CorsLayer::permissive(),
    }
}

/// The full application router. `/health` is public, everything else
/// goes through API key authentication.
pub fn app(state: AppState) -> Router {
    let api = routes().route_layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    Router::new()
        .route("/health", get(health))
        .merge(api)
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer(&state.config.api))
        .with_state(state)
}

/// Start the HTTP API server and serve until `shutdown` resolves
pub async fn start_server(
    config: Config,
    marketplace: Arc<Marketplace>,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> anyhow::Result<()> {
    if config.api.key.is_none() {
        warn!("API_KEY is not set, the HTTP API is open");
    }

    let addr = SocketAddr::from(([0, 0, 0, 0], config.api.port));
    let app = app(AppState::new(config, marketplace));

    info!("HTTP API listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await?;

    Ok(())
}
