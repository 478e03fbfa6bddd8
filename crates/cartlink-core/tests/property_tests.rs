//! # Property-Based Tests
//!
//! Verification tests using proptest for the handoff protocol.
//!
//! These tests ensure codec reversibility and the loop-avoidance
//! invariants of the decision engine.

use cartlink_core::{
    CartLineItem, CartSnapshot, Decision, PageTag, RequestContext, SiteConfig, SiteRole, codec,
    evaluate,
};
use proptest::collection::{btree_map, vec};
use proptest::prelude::*;
use std::collections::BTreeSet;

// =============================================================================
// GENERATORS
// =============================================================================

fn arb_line_item() -> impl Strategy<Value = CartLineItem> {
    (
        1u64..100_000,
        1u64..1_000,
        0u64..100_000,
        btree_map("[a-z_]{1,20}", "[a-zA-Z0-9 -]{0,24}", 0..4),
    )
        .prop_map(|(product_id, quantity, variation_id, variation)| CartLineItem {
            product_id,
            quantity,
            variation_id,
            variation,
        })
}

fn arb_snapshot() -> impl Strategy<Value = CartSnapshot> {
    vec(arb_line_item(), 0..20)
}

fn secondary_config() -> SiteConfig {
    SiteConfig {
        role: SiteRole::Secondary,
        enabled: true,
        peer_url: "https://primary.example.com".into(),
        shared_secret: "s3cret".into(),
        allowed_pages: BTreeSet::new(),
        debug_logging: false,
        bypass_path_fragments: vec!["airwallex".into()],
    }
}

// =============================================================================
// PROPERTY TESTS
// =============================================================================

proptest! {
    /// decode(encode(s)) == s for every well-formed snapshot.
    #[test]
    fn codec_roundtrip(snapshot in arb_snapshot()) {
        let token = codec::encode(&snapshot);
        let decoded = codec::decode(&token).expect("decode");
        prop_assert_eq!(decoded, snapshot);
    }

    /// Tokens survive a query string untouched: URL-safe alphabet only,
    /// no padding.
    #[test]
    fn token_charset_is_url_safe(snapshot in arb_snapshot()) {
        let token = codec::encode(&snapshot);
        prop_assert!(token
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
    }

    /// Encoding is deterministic: one snapshot, one token.
    #[test]
    fn encoding_is_deterministic(snapshot in arb_snapshot()) {
        prop_assert_eq!(codec::encode(&snapshot), codec::encode(&snapshot));
    }

    /// Arbitrary token strings never panic the decoder.
    #[test]
    fn decode_never_panics(token in "[ -~]{0,300}") {
        let _ = codec::decode(&token);
    }

    /// A consumed token is never present in the follow-up redirect: the
    /// receiving site strips it whatever the cart contents were.
    #[test]
    fn consumed_token_is_stripped(snapshot in arb_snapshot(), local in arb_snapshot()) {
        let token = codec::encode(&snapshot);
        let ctx = RequestContext::from_target(&format!("/checkout/?transfer_cart={token}"));
        let outcome = evaluate(&secondary_config(), &ctx, &local);

        if let Some(location) = outcome.decision.location() {
            prop_assert!(!location.contains(&token));
        }
    }

    /// A request already carrying the cleared marker never produces
    /// another clear instruction, so the confirmation handshake cannot
    /// loop.
    #[test]
    fn cleared_marker_never_loops(order_id in 1u64..1_000_000, local in arb_snapshot()) {
        let ctx = RequestContext::from_target(&format!(
            "/checkout/order-received/{order_id}/?cleared=1"
        ));
        let outcome = evaluate(&secondary_config(), &ctx, &local);
        let is_clear = matches!(outcome.decision, Decision::ClearAndRedirect { .. });
        prop_assert!(!is_clear);
    }

    /// Pages on the allow-list are always served locally on the
    /// Secondary, whatever the cart holds.
    #[test]
    fn allowed_pages_are_always_served(local in arb_snapshot()) {
        let mut config = secondary_config();
        config.allowed_pages.insert(PageTag::Checkout);
        let ctx = RequestContext::from_target("/checkout/");
        let outcome = evaluate(&config, &ctx, &local);
        prop_assert!(outcome.decision.is_allow());
    }

    /// A disabled installation never redirects anything.
    #[test]
    fn disabled_never_redirects(local in arb_snapshot(), path in "/[a-z/-]{0,30}") {
        let mut config = secondary_config();
        config.enabled = false;
        let ctx = RequestContext::from_target(&path);
        let outcome = evaluate(&config, &ctx, &local);
        prop_assert!(outcome.decision.is_allow());
    }
}
