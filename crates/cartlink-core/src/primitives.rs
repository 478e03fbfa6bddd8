//! # Protocol Constants
//!
//! Hardcoded constants of the cart handoff protocol.
//!
//! These are wire-level names and operational limits. They are compiled
//! into the binary and are immutable at runtime; both sites of a handoff
//! pair must agree on them.

/// Query parameter carrying an encoded cart snapshot across a redirect.
pub const TRANSFER_PARAM: &str = "transfer_cart";

/// Query parameter instructing a Primary site to empty its local cart.
pub const CLEAR_PARAM: &str = "clear_cart";

/// Query parameter carrying the URL to bounce back to after a cart clear.
pub const RETURN_PARAM: &str = "return_to";

/// Query parameter marking that a clear round trip has already happened.
///
/// Checked on the Secondary's order-confirmation path before issuing
/// another clear instruction. This is the loop-avoidance marker for the
/// confirmation⇄clear handshake.
pub const CLEARED_PARAM: &str = "cleared";

/// HTTP header carrying the shared secret on inbound protocol calls.
pub const SECRET_HEADER: &str = "x-cartlink-secret";

/// Path prefix of this protocol's own REST endpoints.
///
/// Requests under this prefix bypass the redirect decision engine on
/// either site role.
pub const API_PREFIX: &str = "/ct/v1";

// =============================================================================
// INPUT VALIDATION LIMITS
// =============================================================================

/// Maximum accepted length of an inbound transfer token, in bytes.
///
/// Tokens longer than this are rejected before base64 decoding.
/// This prevents memory exhaustion from malicious or malformed peers.
pub const MAX_TOKEN_BYTES: usize = 65536;

/// Tokens are truncated to this many characters when logged.
///
/// Token length is unbounded by design (it scales with cart size), so
/// log entries must not carry the whole thing.
pub const TOKEN_LOG_TRUNCATE: usize = 200;

// =============================================================================
// ACTIVITY LOG
// =============================================================================

/// Maximum number of retained activity log entries.
///
/// The log is append-only and capped; older entries are pruned.
pub const ACTIVITY_LOG_CAP: usize = 50;

/// Activity log messages are truncated to this many bytes before storage.
pub const ACTIVITY_MESSAGE_TRUNCATE: usize = 1000;

// =============================================================================
// OUTBOUND CALLS
// =============================================================================

/// Timeout for the stock reconciliation push, in seconds.
///
/// The push is fire-and-forget: a timed-out call is treated as a plain
/// failure and never retried.
pub const PUSH_TIMEOUT_SECS: u64 = 15;

/// Timeout for catalog replication fetches, in seconds.
pub const SYNC_TIMEOUT_SECS: u64 = 30;

/// Default payment-provider callback fragment exempt from redirecting.
///
/// A Secondary site must never bounce a payment provider's callback to
/// the Primary. Deployments can extend the list via configuration.
pub const DEFAULT_BYPASS_FRAGMENT: &str = "airwallex";

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn param_names_are_stable() {
        // Wire names are a cross-site contract; changing them breaks
        // deployed handoff pairs.
        assert_eq!(TRANSFER_PARAM, "transfer_cart");
        assert_eq!(CLEAR_PARAM, "clear_cart");
        assert_eq!(RETURN_PARAM, "return_to");
        assert_eq!(CLEARED_PARAM, "cleared");
    }

    #[test]
    fn secret_header_is_lowercase() {
        // HTTP/2 requires lowercase header names.
        assert_eq!(SECRET_HEADER, SECRET_HEADER.to_lowercase());
    }
}
