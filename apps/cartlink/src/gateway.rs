//! # Redirect Gateway
//!
//! The middleware that puts every storefront request through the
//! decision engine. It loads the configuration and the session cart,
//! evaluates, executes the cart effect, and either answers with a 303
//! redirect or lets the request through to the local render.
//!
//! Effect failures never cancel a redirect: a shopper with a broken cart
//! still lands somewhere, and the failure goes to the activity log.

use crate::api::AppState;
use axum::{
    body::Body,
    extract::State,
    http::{Request, StatusCode, header},
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use cartlink_core::primitives::{API_PREFIX, TOKEN_LOG_TRUNCATE};
use cartlink_core::{CartEffect, CartStore, RequestContext, SessionCart, evaluate, executor};

/// Session cookie carrying the cart key.
const SESSION_COOKIE: &str = "cartlink_session";

/// Cart key for requests without a session cookie.
const GUEST_SESSION: &str = "guest";

// =============================================================================
// GATEWAY MIDDLEWARE
// =============================================================================

/// Evaluate the decision engine for every storefront request.
pub async fn gateway_middleware(
    State(state): State<AppState>,
    request: Request<Body>,
    next: Next,
) -> Response {
    // The protocol surface and the health check never redirect.
    let path = request.uri().path();
    if path.starts_with(API_PREFIX) || path == "/health" {
        return next.run(request).await;
    }

    let config = match state.store.load_config() {
        Ok(Some(config)) => config,
        // Uninitialized site: plain pass-through.
        Ok(None) => return next.run(request).await,
        Err(e) => {
            tracing::error!(error = %e, "Settings store unavailable; serving locally");
            return next.run(request).await;
        }
    };
    if !config.enabled {
        return next.run(request).await;
    }

    let target = request
        .uri()
        .path_and_query()
        .map(|pq| pq.as_str().to_string())
        .unwrap_or_else(|| "/".to_string());
    let ctx = RequestContext::from_target(&target);
    let session = session_key(&request);

    let mut cart = match SessionCart::load(&state.store, &session) {
        Ok(cart) => cart,
        Err(e) => {
            state.log_always(&format!("Cart load failed for session {session}: {e}"));
            tracing::warn!(error = %e, session = %session, "Cart load failed; serving locally");
            return next.run(request).await;
        }
    };

    let outcome = evaluate(&config, &ctx, &cart.current_items());

    match outcome.effect {
        Some(CartEffect::Clear) => match executor::clear_cart(&mut cart) {
            Ok(()) => state.log_debug_with(&config, "Cart cleared on peer instruction"),
            Err(e) => {
                state.log_always(&format!("Cart clear failed: {e}"));
                tracing::warn!(error = %e, "Cart clear failed; redirect proceeds");
            }
        },
        Some(CartEffect::Replace(snapshot)) => {
            match executor::apply_snapshot(&mut cart, &snapshot) {
                Ok(added) => state.log_debug_with(
                    &config,
                    &format!("Transfer token consumed: {added} lines applied"),
                ),
                Err(e) => {
                    state.log_always(&format!("Transfer apply failed: {e}"));
                    tracing::warn!(error = %e, "Transfer apply failed; redirect proceeds");
                }
            }
        }
        None => {}
    }

    match outcome.decision.location() {
        None => next.run(request).await,
        Some(location) => {
            state.log_debug_with(
                &config,
                &format!("Redirect {} -> {}", truncated(&target), truncated(&location)),
            );
            tracing::info!(
                from = %truncated(&target),
                to = %truncated(&location),
                "Gateway redirect"
            );
            Redirect::to(&location).into_response()
        }
    }
}

/// Cart session key from the session cookie, `guest` without one.
fn session_key(request: &Request<Body>) -> String {
    request
        .headers()
        .get(header::COOKIE)
        .and_then(|v| v.to_str().ok())
        .and_then(|cookies| {
            cookies.split(';').find_map(|cookie| {
                let (name, value) = cookie.trim().split_once('=')?;
                (name == SESSION_COOKIE && !value.is_empty()).then(|| value.to_string())
            })
        })
        .unwrap_or_else(|| GUEST_SESSION.to_string())
}

/// Cap a URL for logging; tokens make them arbitrarily long.
fn truncated(url: &str) -> String {
    if url.len() <= TOKEN_LOG_TRUNCATE {
        return url.to_string();
    }
    let mut cut = TOKEN_LOG_TRUNCATE;
    while !url.is_char_boundary(cut) {
        cut -= 1;
    }
    format!("{}…", &url[..cut])
}

// =============================================================================
// STOREFRONT FALLBACK
// =============================================================================

/// Stand-in storefront render for requests the gateway allows through.
///
/// A real deployment fronts the commerce platform here; the server only
/// needs something to serve so allowed pages resolve.
pub async fn storefront_handler(uri: axum::http::Uri) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/html; charset=utf-8")],
        format!(
            "<!doctype html><html><head><title>cartlink</title></head>\
             <body><p>Rendered locally: {}</p></body></html>",
            uri.path()
        ),
    )
}

// =============================================================================
// TESTS
// =============================================================================
