//! # API Endpoint Handlers
//!
//! The protocol surface under `/ct/v1`:
//!
//! - `GET /products` - list published products (replication feed)
//! - `GET /product/{id}` - full record of one product
//! - `POST /stock/update` - apply a consumed-stock batch
//! - `POST /order/completed` - order finished here; trigger the push

use super::{AppState, types};
use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use cartlink_core::{StoreInventory, stock};

// =============================================================================
// HEALTH HANDLER
// =============================================================================

/// Health check endpoint.
pub async fn health_handler() -> impl IntoResponse {
    Json(types::HealthResponse::default())
}

// =============================================================================
// CATALOG HANDLERS
// =============================================================================

/// List published products.
pub async fn products_handler(State(state): State<AppState>) -> impl IntoResponse {
    match state.store.list_products() {
        Ok(products) => (StatusCode::OK, Json(products)).into_response(),
        Err(e) => {
            tracing::error!(error = %e, "Product listing failed");
            storage_error().into_response()
        }
    }
}

/// Full record of one product.
pub async fn product_handler(
    State(state): State<AppState>,
    Path(id): Path<u64>,
) -> impl IntoResponse {
    match state.store.get_product(id) {
        Ok(Some(record)) => (StatusCode::OK, Json(record)).into_response(),
        Ok(None) => (
            StatusCode::NOT_FOUND,
            Json(types::ErrorResponse::new("no_product", "Product not found")),
        )
            .into_response(),
        Err(e) => {
            tracing::error!(error = %e, product_id = id, "Product fetch failed");
            storage_error().into_response()
        }
    }
}

// =============================================================================
// STOCK UPDATE HANDLER
// =============================================================================

/// Apply an inbound consumed-stock batch.
///
/// Always 200 with per-item results; one bad item never fails the batch.
pub async fn stock_update_handler(
    State(state): State<AppState>,
    Json(request): Json<types::StockUpdateRequest>,
) -> impl IntoResponse {
    let mut inventory = StoreInventory(&state.store);
    let results = stock::apply_stock_update(&mut inventory, &request.items);

    let skipped = results
        .iter()
        .filter(|r| r.status == cartlink_core::StockUpdateStatus::Skipped)
        .count();
    state.log_debug(&format!(
        "Stock update: {} items, {} skipped",
        results.len(),
        skipped
    ));
    tracing::info!(items = results.len(), skipped, "Stock update applied");

    (
        StatusCode::OK,
        Json(types::StockUpdateResponse {
            success: true,
            results,
        }),
    )
}

// =============================================================================
// ORDER COMPLETION HANDLER
// =============================================================================

/// An order finished on this site; push consumed quantities to the peer.
///
/// The push runs detached with its own timeout, so the storefront's
/// order-completion flow is never blocked on the peer. The response only
/// acknowledges hand-off.
pub async fn order_completed_handler(
    State(state): State<AppState>,
    Json(request): Json<types::OrderCompletedRequest>,
) -> impl IntoResponse {
    let batch = stock::batch_from_order(&request.items);
    let batch_size = batch.len();

    state.log_debug(&format!(
        "Order {} completed with {} stock lines",
        request.order_id, batch_size
    ));

    if batch_size > 0 {
        let pusher = state.pusher.clone();
        let push_state = state.clone();
        let order_id = request.order_id;
        tokio::spawn(async move {
            let config = match push_state.store.load_config() {
                Ok(Some(config)) => config,
                Ok(None) => {
                    push_state.log_always(&format!(
                        "Stock push for order {order_id} skipped: site not configured"
                    ));
                    return;
                }
                Err(e) => {
                    push_state
                        .log_always(&format!("Stock push for order {order_id} failed: {e}"));
                    return;
                }
            };
            match pusher.push(&config, &batch).await {
                Ok(results) => {
                    tracing::info!(order_id, results = results.len(), "Stock push completed");
                    push_state.log_debug_with(&config, &format!(
                        "Stock push for order {order_id}: {} results",
                        results.len()
                    ));
                }
                Err(e) => {
                    tracing::warn!(order_id, error = %e, "Stock push failed");
                    push_state.log_always(&format!("Stock push for order {order_id} failed: {e}"));
                }
            }
        });
    }

    (
        StatusCode::ACCEPTED,
        Json(types::OrderCompletedResponse {
            accepted: true,
            batch_size,
        }),
    )
}

// =============================================================================
// SHARED
// =============================================================================

fn storage_error() -> (StatusCode, Json<types::ErrorResponse>) {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(types::ErrorResponse::new(
            "storage_error",
            "Site store unavailable",
        )),
    )
}
