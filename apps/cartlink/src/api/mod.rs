//! # cartlink HTTP Module
//!
//! This module implements the HTTP server using axum: the redirect
//! gateway wraps every storefront route, and the protocol surface lives
//! under `/ct/v1`.
//!
//! ## Endpoints
//!
//! - `GET /health` - Health check (no auth)
//! - `GET /ct/v1/products` - List published products
//! - `GET /ct/v1/product/{id}` - Full product record
//! - `POST /ct/v1/stock/update` - Apply a consumed-stock batch
//! - `POST /ct/v1/order/completed` - Report a completed order
//!
//! Everything under `/ct/v1` requires the `x-cartlink-secret` header.
//!
//! ## Security Configuration (Environment Variables)
//!
//! - `CARTLINK_CORS_ORIGINS`: Comma-separated list of allowed origins, or "*" for all (default: localhost only)
//! - `CARTLINK_RATE_LIMIT`: Requests per second (default: 100, 0 to disable)

mod auth;
mod handlers;
mod middleware;
pub mod types;

pub use middleware::{create_rate_limiter, get_rate_limit_from_env};
// Re-export handlers for integration tests (via `cartlink::api::*`)
#[allow(unused_imports)]
pub use handlers::{
    health_handler, order_completed_handler, product_handler, products_handler,
    stock_update_handler,
};

use crate::gateway;
use crate::push::StockPusher;
use axum::{
    Router,
    http::{HeaderValue, Method, header},
    middleware as axum_middleware,
    routing::{get, post},
};
use cartlink_core::primitives::{API_PREFIX, MAX_TOKEN_BYTES};
use cartlink_core::{CartlinkError, RedbStore, SiteConfig};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

// =============================================================================
// SERVER STATE
// =============================================================================

/// Shared server state.
#[derive(Clone)]
pub struct AppState {
    /// The site store: settings, carts, catalog, activity log.
    pub store: Arc<RedbStore>,
    /// Outbound stock reconciliation client.
    pub pusher: StockPusher,
}

impl AppState {
    /// Create new app state over an opened store.
    #[must_use]
    pub fn new(store: RedbStore) -> Self {
        Self {
            store: Arc::new(store),
            pusher: StockPusher::new(),
        }
    }

    /// Replace the pusher (tests inject short timeouts).
    #[must_use]
    pub fn with_pusher(mut self, pusher: StockPusher) -> Self {
        self.pusher = pusher;
        self
    }

    /// Append an activity entry unconditionally. Errors and failures are
    /// always recorded, whatever the logging gate says.
    pub fn log_always(&self, message: &str) {
        let time = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);
        if let Err(e) = self.store.append_activity(time, message) {
            tracing::warn!(error = %e, "Activity log write failed");
        }
    }

    /// Append a routine entry, gated on `debug_logging`.
    pub fn log_debug(&self, message: &str) {
        match self.store.load_config() {
            Ok(Some(config)) => self.log_debug_with(&config, message),
            Ok(None) => {}
            Err(e) => tracing::warn!(error = %e, "Settings read failed for logging"),
        }
    }

    /// Like [`Self::log_debug`] with the config already in hand.
    pub fn log_debug_with(&self, config: &SiteConfig, message: &str) {
        if config.debug_logging {
            self.log_always(message);
        }
    }
}

// =============================================================================
// CORS CONFIGURATION
// =============================================================================

/// Build CORS layer from environment configuration.
///
/// Reads `CARTLINK_CORS_ORIGINS`:
/// - If "*": allows all origins (development mode - use with caution!)
/// - If not set: defaults to localhost only (restrictive default)
/// - Otherwise: parses comma-separated list of allowed origins
fn build_cors_layer() -> CorsLayer {
    let origins_env = std::env::var("CARTLINK_CORS_ORIGINS").ok();

    match origins_env.as_deref() {
        Some("*") => {
            tracing::warn!(
                "CORS: Allowing ALL origins (CARTLINK_CORS_ORIGINS=*). This is insecure for production!"
            );
            CorsLayer::permissive()
        }
        Some(origins) => {
            let allowed_origins: Vec<HeaderValue> = origins
                .split(',')
                .filter_map(|s| {
                    let trimmed = s.trim();
                    match trimmed.parse::<HeaderValue>() {
                        Ok(hv) => {
                            tracing::info!("CORS: Allowing origin: {}", trimmed);
                            Some(hv)
                        }
                        Err(e) => {
                            tracing::warn!("CORS: Invalid origin '{}': {}", trimmed, e);
                            None
                        }
                    }
                })
                .collect();

            if allowed_origins.is_empty() {
                tracing::warn!(
                    "CORS: No valid origins in CARTLINK_CORS_ORIGINS, defaulting to localhost only"
                );
                build_localhost_cors()
            } else {
                CorsLayer::new()
                    .allow_origin(allowed_origins)
                    .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
                    .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
            }
        }
        None => {
            tracing::info!("CORS: No CARTLINK_CORS_ORIGINS set, defaulting to localhost only");
            build_localhost_cors()
        }
    }
}

/// Build a restrictive CORS layer that only allows localhost origins.
fn build_localhost_cors() -> CorsLayer {
    let localhost_origins = vec![
        "http://localhost:3000".parse::<HeaderValue>().ok(),
        "http://localhost:8080".parse::<HeaderValue>().ok(),
        "http://127.0.0.1:3000".parse::<HeaderValue>().ok(),
        "http://127.0.0.1:8080".parse::<HeaderValue>().ok(),
    ];
    let origins: Vec<HeaderValue> = localhost_origins.into_iter().flatten().collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
}

// =============================================================================
// ROUTER CREATION
// =============================================================================

/// Create the axum router.
///
/// Middleware stack (outer to inner):
/// 1. CORS + tracing + body limit
/// 2. Redirect gateway - every storefront request passes the decision engine
/// 3. Rate limiting (protocol surface, if enabled)
/// 4. Shared-secret auth (protocol surface)
pub fn create_router(state: AppState) -> Router {
    let cors = build_cors_layer();

    let rate_limit = get_rate_limit_from_env();
    let rate_limiter = if rate_limit > 0 {
        tracing::info!("Rate limiting enabled: {} requests/second", rate_limit);
        Some(create_rate_limiter(rate_limit))
    } else {
        tracing::info!("Rate limiting disabled");
        None
    };

    // Protocol surface: authenticated, rate limited.
    let mut protocol = Router::new()
        .route("/products", get(handlers::products_handler))
        .route("/product/{id}", get(handlers::product_handler))
        .route("/stock/update", post(handlers::stock_update_handler))
        .route("/order/completed", post(handlers::order_completed_handler))
        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            auth::shared_secret_middleware,
        ));

    if let Some(limiter) = rate_limiter {
        protocol = protocol.layer(axum_middleware::from_fn_with_state(
            limiter,
            middleware::rate_limit_middleware,
        ));
    }

    // Everything that is not the protocol surface is a storefront page
    // and goes through the redirect gateway.
    Router::new()
        .route("/health", get(handlers::health_handler))
        .nest(API_PREFIX, protocol)
        .fallback(gateway::storefront_handler)
        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            gateway::gateway_middleware,
        ))
        .layer(axum::extract::DefaultBodyLimit::max(2 * MAX_TOKEN_BYTES))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// =============================================================================
// SERVER STARTUP
// =============================================================================

/// Start the HTTP server.
pub async fn run_server(addr: &str, state: AppState) -> Result<(), CartlinkError> {
    let router = create_router(state);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| CartlinkError::Storage(format!("Bind failed: {}", e)))?;

    tracing::info!("cartlink HTTP server listening on {}", addr);

    axum::serve(listener, router)
        .await
        .map_err(|e| CartlinkError::Storage(format!("Server error: {}", e)))
}
