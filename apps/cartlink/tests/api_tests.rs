//! Integration tests for the cartlink HTTP surface.
//!
//! Uses axum-test to exercise the gateway and the protocol endpoints
//! without starting a real server; the stock pusher is tested against a
//! real ephemeral listener.

// Allow unwrap and panic in tests - these are standard for test code
#![allow(clippy::unwrap_used, clippy::panic)]

use axum::http::{HeaderName, HeaderValue, StatusCode, header};
use axum_test::TestServer;
use cartlink::api::{AppState, create_router};
use cartlink::push::StockPusher;
use cartlink_core::primitives::SECRET_HEADER;
use cartlink_core::{
    CartLineItem, PageTag, ProductRecord, RedbStore, SiteConfig, SiteRole, VariationRecord, codec,
};
use serde_json::json;
use std::collections::BTreeSet;
use std::time::Duration;

const SECRET: &str = "test-secret";

fn secret_header() -> HeaderName {
    HeaderName::from_static(SECRET_HEADER)
}

// =============================================================================
// HELPER FUNCTIONS
// =============================================================================

fn site_config(role: SiteRole) -> SiteConfig {
    SiteConfig {
        role,
        enabled: true,
        peer_url: "https://peer.example.com".into(),
        shared_secret: SECRET.into(),
        allowed_pages: BTreeSet::new(),
        debug_logging: true,
        bypass_path_fragments: vec!["airwallex".into()],
    }
}

/// Create a test server over a fresh store, configured with `config`.
fn create_test_server(config: Option<&SiteConfig>) -> (TestServer, AppState, tempfile::TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let store = RedbStore::open(dir.path().join("site.redb")).unwrap();
    if let Some(config) = config {
        store.save_config(config).unwrap();
    }
    let state = AppState::new(store).with_pusher(StockPusher::with_timeout(
        Duration::from_millis(500),
    ));
    let router = create_router(state.clone());
    (TestServer::new(router).unwrap(), state, dir)
}

fn managed_product(id: u64, stock: i64) -> ProductRecord {
    ProductRecord {
        id,
        name: format!("Product {id}"),
        status: "publish".into(),
        manage_stock: true,
        stock_quantity: stock,
        ..ProductRecord::default()
    }
}

fn location(response: &axum_test::TestResponse) -> String {
    response
        .headers()
        .get(header::LOCATION)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string()
}

// =============================================================================
// HEALTH & UNCONFIGURED SITE
// =============================================================================

#[tokio::test]
async fn health_needs_no_auth() {
    let (server, _state, _dir) = create_test_server(None);
    let response = server.get("/health").await;
    response.assert_status_ok();
    assert_eq!(response.json::<serde_json::Value>()["status"], "ok");
}

#[tokio::test]
async fn unconfigured_site_serves_everything_locally() {
    let (server, _state, _dir) = create_test_server(None);
    let response = server.get("/checkout/").await;
    response.assert_status_ok();
}

// =============================================================================
// GATEWAY: PRIMARY SIDE
// =============================================================================

#[tokio::test]
async fn primary_checkout_redirects_with_cart_token() {
    // Scenario A: two items in the cart, checkout is not allowed locally.
    let (server, state, _dir) = create_test_server(Some(&site_config(SiteRole::Primary)));
    let cart = vec![CartLineItem::simple(7, 2), CartLineItem::simple(9, 1)];
    state.store.save_cart("guest", &cart).unwrap();

    let response = server.get("/checkout/").await;
    response.assert_status(StatusCode::SEE_OTHER);

    let location = location(&response);
    assert!(location.starts_with("https://peer.example.com/checkout/?transfer_cart="));
    let token = location.split("transfer_cart=").nth(1).unwrap();
    assert_eq!(codec::decode(token).unwrap(), cart);
}

#[tokio::test]
async fn primary_allowed_page_renders_locally() {
    let mut config = site_config(SiteRole::Primary);
    config.allowed_pages.insert(PageTag::FrontPage);
    let (server, _state, _dir) = create_test_server(Some(&config));

    let response = server.get("/").await;
    response.assert_status_ok();
}

#[tokio::test]
async fn primary_clear_instruction_empties_cart_and_returns() {
    let (server, state, _dir) = create_test_server(Some(&site_config(SiteRole::Primary)));
    state
        .store
        .save_cart("guest", &vec![CartLineItem::simple(7, 2)])
        .unwrap();

    let response = server
        .get("/")
        .add_query_param("clear_cart", "1")
        .add_query_param(
            "return_to",
            "https://peer.example.com/checkout/order-received/5/?cleared=1",
        )
        .await;
    response.assert_status(StatusCode::SEE_OTHER);
    assert_eq!(
        location(&response),
        "https://peer.example.com/checkout/order-received/5/?cleared=1"
    );
    assert!(state.store.load_cart("guest").unwrap().is_empty());
}

#[tokio::test]
async fn sessions_are_isolated_by_cookie() {
    let (server, state, _dir) = create_test_server(Some(&site_config(SiteRole::Primary)));
    state
        .store
        .save_cart("shopper-a", &vec![CartLineItem::simple(7, 2)])
        .unwrap();

    // The guest session has no cart, so the bounce is a plain redirect.
    let response = server.get("/checkout/").await;
    assert!(!location(&response).contains("transfer_cart"));

    // Shopper A's cookie selects the populated cart.
    let response = server
        .get("/checkout/")
        .add_header(
            header::COOKIE,
            HeaderValue::from_static("cartlink_session=shopper-a"),
        )
        .await;
    assert!(location(&response).contains("transfer_cart="));
}

// =============================================================================
// GATEWAY: SECONDARY SIDE
// =============================================================================

#[tokio::test]
async fn secondary_consumes_token_and_strips_it() {
    // Scenario B: an inbound transfer replaces the cart, the follow-up
    // redirect carries no token.
    let mut config = site_config(SiteRole::Secondary);
    config.allowed_pages.insert(PageTag::Checkout);
    let (server, state, _dir) = create_test_server(Some(&config));

    let cart = vec![CartLineItem::simple(7, 2)];
    let token = codec::encode(&cart);
    let response = server
        .get("/checkout/")
        .add_query_param("transfer_cart", &token)
        .await;

    response.assert_status(StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/checkout/");
    assert_eq!(state.store.load_cart("guest").unwrap(), cart);

    // The stripped URL is now allowed and renders locally.
    let response = server.get("/checkout/").await;
    response.assert_status_ok();
}

#[tokio::test]
async fn secondary_order_received_clears_peer_then_settles() {
    let mut config = site_config(SiteRole::Secondary);
    config.allowed_pages.insert(PageTag::OrderReceived);
    config.allowed_pages.insert(PageTag::Checkout);
    let (server, _state, _dir) = create_test_server(Some(&config));

    // First visit: bounce to the peer with a clear instruction.
    let response = server.get("/checkout/order-received/55/").await;
    response.assert_status(StatusCode::SEE_OTHER);
    let loc = location(&response);
    assert!(loc.starts_with("https://peer.example.com?clear_cart=1&return_to="));
    assert!(loc.contains("cleared%3D1"));

    // The return trip carries the cleared marker and renders locally.
    let response = server
        .get("/checkout/order-received/55/")
        .add_query_param("cleared", "1")
        .await;
    response.assert_status_ok();
}

#[tokio::test]
async fn secondary_payment_callback_is_never_redirected() {
    let (server, _state, _dir) = create_test_server(Some(&site_config(SiteRole::Secondary)));
    let response = server.get("/wc-api/airwallex_webhook/").await;
    response.assert_status_ok();
}

// =============================================================================
// PROTOCOL SURFACE: AUTH
// =============================================================================

#[tokio::test]
async fn protocol_endpoints_require_the_shared_secret() {
    let (server, _state, _dir) = create_test_server(Some(&site_config(SiteRole::Primary)));

    let response = server.get("/ct/v1/products").await;
    response.assert_status_unauthorized();

    let response = server
        .get("/ct/v1/products")
        .add_header(secret_header(), HeaderValue::from_static("wrong"))
        .await;
    response.assert_status_unauthorized();

    let response = server
        .get("/ct/v1/products")
        .add_header(secret_header(), HeaderValue::from_static(SECRET))
        .await;
    response.assert_status_ok();
}

#[tokio::test]
async fn unconfigured_site_rejects_protocol_calls() {
    let (server, _state, _dir) = create_test_server(None);
    let response = server
        .get("/ct/v1/products")
        .add_header(secret_header(), HeaderValue::from_static(SECRET))
        .await;
    response.assert_status_unauthorized();
}

// =============================================================================
// PROTOCOL SURFACE: CATALOG
// =============================================================================

#[tokio::test]
async fn product_listing_and_fetch() {
    let (server, state, _dir) = create_test_server(Some(&site_config(SiteRole::Primary)));
    state.store.put_product(&managed_product(7, 10)).unwrap();
    let mut draft = managed_product(8, 3);
    draft.status = "draft".into();
    state.store.put_product(&draft).unwrap();

    let response = server
        .get("/ct/v1/products")
        .add_header(secret_header(), HeaderValue::from_static(SECRET))
        .await;
    response.assert_status_ok();
    let listing = response.json::<serde_json::Value>();
    // Drafts are not replicated.
    assert_eq!(listing.as_array().unwrap().len(), 1);
    assert_eq!(listing[0]["id"], 7);

    let response = server
        .get("/ct/v1/product/7")
        .add_header(secret_header(), HeaderValue::from_static(SECRET))
        .await;
    response.assert_status_ok();
    let record = response.json::<ProductRecord>();
    assert_eq!(record.id, 7);
    assert_eq!(record.stock_quantity, 10);
}

#[tokio::test]
async fn missing_product_is_a_machine_readable_404() {
    let (server, _state, _dir) = create_test_server(Some(&site_config(SiteRole::Primary)));
    let response = server
        .get("/ct/v1/product/404404")
        .add_header(secret_header(), HeaderValue::from_static(SECRET))
        .await;
    response.assert_status_not_found();
    assert_eq!(response.json::<serde_json::Value>()["code"], "no_product");
}

// =============================================================================
// PROTOCOL SURFACE: STOCK UPDATE
// =============================================================================

#[tokio::test]
async fn stock_update_reports_per_item_outcomes() {
    // Scenario D: one managed product, one unmanaged, one unknown.
    let (server, state, _dir) = create_test_server(Some(&site_config(SiteRole::Primary)));
    state.store.put_product(&managed_product(7, 10)).unwrap();
    let mut unmanaged = managed_product(8, 5);
    unmanaged.manage_stock = false;
    state.store.put_product(&unmanaged).unwrap();

    let response = server
        .post("/ct/v1/stock/update")
        .add_header(secret_header(), HeaderValue::from_static(SECRET))
        .json(&json!({
            "items": [
                { "product_id": 7, "quantity": 2 },
                { "product_id": 8, "quantity": 1 },
                { "product_id": 404404, "quantity": 1 },
            ]
        }))
        .await;
    response.assert_status_ok();

    let results = response.json::<serde_json::Value>()["results"].clone();
    assert_eq!(results[0]["status"], "success");
    assert_eq!(results[0]["new_stock"], 8);
    assert_eq!(results[1]["status"], "skipped");
    assert_eq!(results[1]["reason"], "Stock management disabled");
    assert_eq!(results[2]["status"], "skipped");
    assert_eq!(results[2]["reason"], "Product not found");

    let record = state.store.get_product(7).unwrap().unwrap();
    assert_eq!(record.stock_quantity, 8);
}

#[tokio::test]
async fn stock_update_targets_the_variation() {
    let (server, state, _dir) = create_test_server(Some(&site_config(SiteRole::Primary)));
    let mut parent = managed_product(12, 0);
    parent.manage_stock = false;
    parent.variations.push(VariationRecord {
        id: 120,
        status: "publish".into(),
        manage_stock: true,
        stock_quantity: 5,
        ..VariationRecord::default()
    });
    state.store.put_product(&parent).unwrap();

    let response = server
        .post("/ct/v1/stock/update")
        .add_header(secret_header(), HeaderValue::from_static(SECRET))
        .json(&json!({
            "items": [{ "product_id": 12, "variation_id": 120, "quantity": 2 }]
        }))
        .await;
    response.assert_status_ok();
    let results = response.json::<serde_json::Value>()["results"].clone();
    assert_eq!(results[0]["id"], 120);
    assert_eq!(results[0]["new_stock"], 3);
}

// =============================================================================
// ORDER COMPLETION & STOCK PUSH
// =============================================================================

#[tokio::test]
async fn order_completed_is_acknowledged_immediately() {
    let (server, _state, _dir) = create_test_server(Some(&site_config(SiteRole::Secondary)));

    let response = server
        .post("/ct/v1/order/completed")
        .add_header(secret_header(), HeaderValue::from_static(SECRET))
        .json(&json!({
            "order_id": 55,
            "items": [
                { "product_id": 7, "quantity": 2 },
                { "product_id": 0, "quantity": 9 },
            ]
        }))
        .await;
    response.assert_status(StatusCode::ACCEPTED);
    let body = response.json::<serde_json::Value>();
    assert_eq!(body["accepted"], true);
    // The void line is dropped from the batch.
    assert_eq!(body["batch_size"], 1);
}

/// Scenario C: the push arrives at a live peer with the right header and
/// payload, and the response flows back.
#[tokio::test]
async fn stock_push_round_trips_against_a_live_peer() {
    use axum::{Json, Router, routing::post};
    use tokio::sync::mpsc;

    let (tx, mut rx) = mpsc::unbounded_channel::<(String, serde_json::Value)>();
    let peer = Router::new().route(
        "/ct/v1/stock/update",
        post(
            move |headers: axum::http::HeaderMap, Json(body): Json<serde_json::Value>| {
                let secret = headers
                    .get(SECRET_HEADER)
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or_default()
                    .to_string();
                let _ = tx.send((secret, body));
                async {
                    Json(json!({
                        "success": true,
                        "results": [{ "id": 7, "status": "success", "new_stock": 8 }]
                    }))
                }
            },
        ),
    );
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let _ = axum::serve(listener, peer).await;
    });

    let mut config = site_config(SiteRole::Secondary);
    config.peer_url = format!("http://{addr}");

    let pusher = StockPusher::with_timeout(Duration::from_secs(2));
    let results = pusher
        .push(
            &config,
            &[cartlink_core::StockReconciliationItem {
                product_id: 7,
                variation_id: 0,
                quantity: 2,
            }],
        )
        .await
        .unwrap();

    assert_eq!(results.len(), 1);
    assert_eq!(results[0].new_stock, Some(8));

    let (secret, body) = rx.recv().await.unwrap();
    assert_eq!(secret, SECRET);
    assert_eq!(body["items"][0]["product_id"], 7);
    assert_eq!(body["items"][0]["quantity"], 2);
}

#[tokio::test]
async fn stock_push_times_out_against_a_silent_peer() {
    // Bound but never accepted: the connection parks in the backlog and
    // the request must die by timeout, not hang.
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let mut config = site_config(SiteRole::Secondary);
    config.peer_url = format!("http://{addr}");

    let pusher = StockPusher::with_timeout(Duration::from_millis(200));
    let result = pusher
        .push(
            &config,
            &[cartlink_core::StockReconciliationItem {
                product_id: 7,
                variation_id: 0,
                quantity: 1,
            }],
        )
        .await;
    assert!(matches!(
        result,
        Err(cartlink_core::CartlinkError::UpstreamUnavailable(_))
    ));
    drop(listener);
}

// =============================================================================
// CATALOG REPLICATION
// =============================================================================

/// Replication against a live peer stops at the first broken record and
/// keeps everything fetched before it.
#[tokio::test]
async fn sync_stops_at_first_failure_and_keeps_prior_records() {
    use cartlink::sync::{CatalogClient, run_sync};

    use axum::{Json, Router, extract::Path as AxumPath, routing::get};

    // A peer listing two products where the second always 500s.
    async fn listing() -> Json<serde_json::Value> {
        Json(json!([{ "id": 1, "title": "Product 1" }, { "id": 2, "title": "Product 2" }]))
    }
    async fn product(AxumPath(id): AxumPath<u64>) -> Result<Json<ProductRecord>, StatusCode> {
        if id == 2 {
            return Err(StatusCode::INTERNAL_SERVER_ERROR);
        }
        Ok(Json(managed_product(id, 4)))
    }
    let peer = Router::new()
        .route("/ct/v1/products", get(listing))
        .route("/ct/v1/product/{id}", get(product));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let _ = axum::serve(listener, peer).await;
    });

    let (_server, state, _dir) = create_test_server(Some(&site_config(SiteRole::Secondary)));
    let mut config = site_config(SiteRole::Secondary);
    config.peer_url = format!("http://{addr}");
    let client = CatalogClient::new(&config)
        .unwrap()
        .with_timeout(Duration::from_secs(2));

    let result = run_sync(&state.store, &client, None).await;
    assert!(matches!(
        result,
        Err(cartlink_core::CartlinkError::UpstreamUnavailable(_))
    ));

    // Product 1 made it across before the run aborted.
    assert_eq!(state.store.get_product(1).unwrap().unwrap().stock_quantity, 4);
    assert!(state.store.get_product(2).unwrap().is_none());

    // A limited re-run targets only the id that is still missing; the
    // peer keeps failing it, so the store is unchanged.
    let result = run_sync(&state.store, &client, Some(&[2])).await;
    assert!(result.is_err());
    assert!(state.store.get_product(2).unwrap().is_none());
}

// =============================================================================
// ACTIVITY LOG
// =============================================================================

#[tokio::test]
async fn redirects_are_recorded_when_debug_logging_is_on() {
    let (server, state, _dir) = create_test_server(Some(&site_config(SiteRole::Primary)));
    let _ = server.get("/checkout/").await;

    let entries = state.store.recent_activity().unwrap();
    assert!(
        entries
            .iter()
            .any(|e| e.message.contains("Redirect") && e.message.contains("/checkout/"))
    );
}

#[tokio::test]
async fn quiet_config_logs_nothing_routine() {
    let mut config = site_config(SiteRole::Primary);
    config.debug_logging = false;
    let (server, state, _dir) = create_test_server(Some(&config));
    let _ = server.get("/checkout/").await;

    assert!(state.store.recent_activity().unwrap().is_empty());
}
