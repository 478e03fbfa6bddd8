//! # Cart Snapshot Codec
//!
//! Serializes a cart snapshot into an opaque, URL-safe transfer token and
//! back. The token is `urlsafe_base64(JSON(snapshot))`, carried as a single
//! query parameter across the redirect; it exists only for the lifetime of
//! one HTTP round trip and is never persisted.
//!
//! ## Leniency Policy
//!
//! Decoding is deliberately tolerant of slightly malformed peers. The
//! structural shape (a JSON array of objects) is enforced; within an
//! object, every field is coerced rather than rejected:
//!
//! - missing or non-numeric `product_id` / `quantity` / `variation_id` → 0
//! - integers carried as JSON strings (`"7"`) are accepted
//! - non-string values inside `variation` are dropped
//!
//! Receivers must not hard-fail on a peer that is off by a field. Callers
//! treat a `DecodeError` as "no token present", not as a user-facing error.

use crate::primitives::MAX_TOKEN_BYTES;
use crate::types::{CartLineItem, CartSnapshot};
use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use std::collections::BTreeMap;
use thiserror::Error;

/// Why a transfer token failed to decode.
#[derive(Debug, Error)]
pub enum DecodeError {
    /// Token exceeds [`MAX_TOKEN_BYTES`]; rejected before base64 work.
    #[error("token length {0} exceeds maximum {MAX_TOKEN_BYTES} bytes")]
    TooLong(usize),

    /// The token is not valid URL-safe base64.
    #[error("base64 decode failed: {0}")]
    Base64(String),

    /// The decoded payload is not valid JSON.
    #[error("JSON parse failed: {0}")]
    Json(String),

    /// The payload parsed but is not a list of objects.
    #[error("payload shape invalid: {0}")]
    Shape(String),
}

// =============================================================================
// ENCODE
// =============================================================================

/// Encode a snapshot into a transfer token.
///
/// Never fails for well-formed input: the data model contains nothing JSON
/// cannot represent. Token length is unbounded by design; log it truncated
/// to [`crate::primitives::TOKEN_LOG_TRUNCATE`] characters.
#[must_use]
pub fn encode(snapshot: &CartSnapshot) -> String {
    // Serializing Vec<CartLineItem> cannot fail: all keys are strings and
    // all values are integers or strings.
    let json = serde_json::to_vec(snapshot).unwrap_or_default();
    URL_SAFE_NO_PAD.encode(json)
}

// =============================================================================
// DECODE
// =============================================================================

/// Decode a transfer token back into a snapshot.
///
/// Exact inverse of [`encode`] for well-formed snapshots. See the module
/// docs for the leniency policy applied to per-item fields.
pub fn decode(token: &str) -> Result<CartSnapshot, DecodeError> {
    if token.len() > MAX_TOKEN_BYTES {
        return Err(DecodeError::TooLong(token.len()));
    }

    // Tolerate padded variants of the same alphabet.
    let trimmed = token.trim_end_matches('=');
    let bytes = URL_SAFE_NO_PAD
        .decode(trimmed)
        .map_err(|e| DecodeError::Base64(e.to_string()))?;

    let value: serde_json::Value =
        serde_json::from_slice(&bytes).map_err(|e| DecodeError::Json(e.to_string()))?;

    let items = value
        .as_array()
        .ok_or_else(|| DecodeError::Shape("expected a JSON array".to_string()))?;

    let mut snapshot = Vec::with_capacity(items.len());
    for (index, item) in items.iter().enumerate() {
        let object = item.as_object().ok_or_else(|| {
            DecodeError::Shape(format!("item {index} is not an object"))
        })?;
        snapshot.push(coerce_item(object));
    }
    Ok(snapshot)
}

/// Coerce one wire object into a line item, zeroing anything malformed.
fn coerce_item(object: &serde_json::Map<String, serde_json::Value>) -> CartLineItem {
    let mut variation = BTreeMap::new();
    if let Some(attrs) = object.get("variation").and_then(|v| v.as_object()) {
        for (key, value) in attrs {
            if let Some(s) = value.as_str() {
                variation.insert(key.clone(), s.to_string());
            }
        }
    }

    CartLineItem {
        product_id: coerce_u64(object.get("product_id")),
        quantity: coerce_u64(object.get("quantity")),
        variation_id: coerce_u64(object.get("variation_id")),
        variation,
    }
}

/// `intval`-style coercion: numbers pass through, numeric strings parse,
/// everything else becomes 0.
fn coerce_u64(value: Option<&serde_json::Value>) -> u64 {
    match value {
        Some(v) => v
            .as_u64()
            .or_else(|| v.as_str().and_then(|s| s.trim().parse().ok()))
            .unwrap_or(0),
        None => 0,
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use super::*;
    use crate::types::CartLineItem;

    fn two_item_snapshot() -> CartSnapshot {
        let mut variable = CartLineItem::simple(12, 1);
        variable.variation_id = 120;
        variable
            .variation
            .insert("attribute_pa_color".into(), "red".into());
        vec![CartLineItem::simple(7, 2), variable]
    }

    #[test]
    fn roundtrip_preserves_items_and_order() {
        let snapshot = two_item_snapshot();
        let token = encode(&snapshot);
        let decoded = decode(&token).expect("decode");
        assert_eq!(decoded, snapshot);
    }

    #[test]
    fn empty_snapshot_roundtrips() {
        let token = encode(&vec![]);
        assert_eq!(decode(&token).expect("decode"), vec![]);
    }

    #[test]
    fn token_is_url_safe() {
        let token = encode(&two_item_snapshot());
        assert!(
            token
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'),
            "token must survive a query string untouched: {token}"
        );
    }

    #[test]
    fn padded_token_is_accepted() {
        let snapshot = two_item_snapshot();
        let json = serde_json::to_vec(&snapshot).expect("json");
        let padded = base64::engine::general_purpose::URL_SAFE.encode(json);
        assert_eq!(decode(&padded).expect("decode"), snapshot);
    }

    #[test]
    fn garbage_base64_is_rejected() {
        assert!(matches!(decode("!!!not-base64!!!"), Err(DecodeError::Base64(_))));
    }

    #[test]
    fn non_json_payload_is_rejected() {
        let token = URL_SAFE_NO_PAD.encode(b"definitely not json");
        assert!(matches!(decode(&token), Err(DecodeError::Json(_))));
    }

    #[test]
    fn non_array_payload_is_rejected() {
        let token = URL_SAFE_NO_PAD.encode(br#"{"product_id": 7}"#);
        assert!(matches!(decode(&token), Err(DecodeError::Shape(_))));
    }

    #[test]
    fn non_object_item_is_rejected() {
        let token = URL_SAFE_NO_PAD.encode(br#"[1, 2, 3]"#);
        assert!(matches!(decode(&token), Err(DecodeError::Shape(_))));
    }

    #[test]
    fn oversized_token_is_rejected_before_decoding() {
        let token = "A".repeat(MAX_TOKEN_BYTES + 1);
        assert!(matches!(decode(&token), Err(DecodeError::TooLong(_))));
    }

    #[test]
    fn missing_fields_coerce_to_zero() {
        let token = URL_SAFE_NO_PAD.encode(br#"[{"quantity": 2}]"#);
        let decoded = decode(&token).expect("decode");
        assert_eq!(decoded.len(), 1);
        assert_eq!(decoded[0].product_id, 0);
        assert_eq!(decoded[0].quantity, 2);
        assert_eq!(decoded[0].variation_id, 0);
    }

    #[test]
    fn stringly_typed_integers_are_accepted() {
        let token =
            URL_SAFE_NO_PAD.encode(br#"[{"product_id": "7", "quantity": " 2 ", "variation_id": "x"}]"#);
        let decoded = decode(&token).expect("decode");
        assert_eq!(decoded[0].product_id, 7);
        assert_eq!(decoded[0].quantity, 2);
        assert_eq!(decoded[0].variation_id, 0);
    }

    #[test]
    fn non_string_variation_values_are_dropped() {
        let token = URL_SAFE_NO_PAD
            .encode(br#"[{"product_id": 5, "quantity": 1, "variation": {"size": "L", "depth": 3}}]"#);
        let decoded = decode(&token).expect("decode");
        assert_eq!(decoded[0].variation.len(), 1);
        assert_eq!(decoded[0].variation["size"], "L");
    }
}
