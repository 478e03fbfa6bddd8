//! # Redirect Decision Engine
//!
//! The state machine at the heart of the handoff. It is evaluated fresh
//! per request from `SiteConfig` + request context + the live local cart;
//! nothing is persisted between requests. The engine performs no I/O at
//! all: cart mutations are returned as a [`CartEffect`] for the caller to
//! execute, and the redirect itself is returned as a [`Decision`].
//!
//! ## Loop Avoidance
//!
//! Three invariants keep the stateless handshake from cycling:
//!
//! 1. A consumed (or undecodable) token is stripped before any further
//!    redirect; a decoded token is never forwarded unchanged.
//! 2. The `cleared` marker on the Secondary's order-confirmation path is
//!    checked before issuing another clear instruction.
//! 3. A transfer with an empty cart short-circuits to a plain redirect
//!    instead of round-tripping an empty payload.

use crate::codec;
use crate::pages::{self, PageTag};
use crate::primitives::{CLEAR_PARAM, CLEARED_PARAM, RETURN_PARAM, TRANSFER_PARAM};
use crate::request::{self, RequestContext};
use crate::types::{CartSnapshot, SiteConfig, SiteRole};

/// Protocol parameters stripped from any URL forwarded to the peer.
///
/// `cleared` is deliberately not in this list: the marker must survive
/// the splice or the confirmation⇄clear handshake would loop.
const STRIPPED_PARAMS: &[&str] = &[TRANSFER_PARAM, CLEAR_PARAM, RETURN_PARAM];

// =============================================================================
// DECISIONS & EFFECTS
// =============================================================================

/// The closed set of actions the engine can take on a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    /// Serve the request locally; no redirect.
    Allow,
    /// Redirect to the peer carrying an encoded cart snapshot.
    RedirectTransfer { target: String, token: String },
    /// Redirect without a payload.
    RedirectPlain { target: String },
    /// Instruct the peer to empty its cart and bounce back to `return_url`.
    ClearAndRedirect { target: String, return_url: String },
}

impl Decision {
    /// The redirect location, or `None` for [`Decision::Allow`].
    #[must_use]
    pub fn location(&self) -> Option<String> {
        match self {
            Self::Allow => None,
            Self::RedirectTransfer { target, token } => {
                Some(request::with_param(target, TRANSFER_PARAM, token))
            }
            Self::RedirectPlain { target } => Some(target.clone()),
            Self::ClearAndRedirect { target, return_url } => Some(request::with_param(
                &request::with_param(target, CLEAR_PARAM, "1"),
                RETURN_PARAM,
                return_url,
            )),
        }
    }

    #[must_use]
    pub fn is_allow(&self) -> bool {
        matches!(self, Self::Allow)
    }
}

/// A local cart mutation the caller must execute before redirecting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CartEffect {
    /// Empty the local cart.
    Clear,
    /// Replace the local cart with a decoded snapshot.
    Replace(CartSnapshot),
}

/// Result of one engine evaluation: what to answer, and what to do to the
/// local cart first. Effect failures are logged by the caller and never
/// cancel the decision — navigation must not dead-end.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outcome {
    pub decision: Decision,
    pub effect: Option<CartEffect>,
}

impl Outcome {
    fn allow() -> Self {
        Self {
            decision: Decision::Allow,
            effect: None,
        }
    }

    fn redirect(decision: Decision) -> Self {
        Self {
            decision,
            effect: None,
        }
    }
}

// =============================================================================
// EVALUATION
// =============================================================================

/// Evaluate one request. Rule evaluation is strictly ordered; the first
/// matching rule wins.
#[must_use]
pub fn evaluate(config: &SiteConfig, ctx: &RequestContext, cart: &CartSnapshot) -> Outcome {
    // Global bypasses, on either role: authoring tools and this
    // protocol's own endpoints are never redirected.
    if !config.enabled || ctx.is_editor_context() || ctx.is_protocol_endpoint() {
        return Outcome::allow();
    }

    match config.role {
        SiteRole::Primary => evaluate_primary(config, ctx, cart),
        SiteRole::Secondary => evaluate_secondary(config, ctx, cart),
    }
}

fn evaluate_primary(config: &SiteConfig, ctx: &RequestContext, cart: &CartSnapshot) -> Outcome {
    // Rule 1: sender-side half of the completion handshake. The peer
    // finished checkout; empty the stale local cart and bounce back.
    if ctx.param(CLEAR_PARAM) == Some("1") {
        let decision = match ctx.param(RETURN_PARAM) {
            Some(return_url) if !return_url.is_empty() => Decision::RedirectPlain {
                target: return_url.to_string(),
            },
            _ => Decision::Allow,
        };
        return Outcome {
            decision,
            effect: Some(CartEffect::Clear),
        };
    }

    // Rule 2: sync-back path — the peer pushed a post-checkout cart state.
    if let Some(outcome) = consume_token(ctx) {
        return outcome;
    }

    // Rule 3: commerce pages this site is not allowed to serve bounce to
    // the peer, carrying the live cart.
    let tags = pages::classify(ctx);
    if transfer_worthy(&tags) && !pages::is_allowed(&config.allowed_pages, &tags) {
        if let Some(target) = peer_target(config, ctx) {
            return Outcome::redirect(transfer_or_plain(target, cart));
        }
    }

    Outcome::allow()
}

fn evaluate_secondary(config: &SiteConfig, ctx: &RequestContext, cart: &CartSnapshot) -> Outcome {
    // Rule 1: inbound transfer from the Primary.
    if let Some(outcome) = consume_token(ctx) {
        return outcome;
    }

    let tags = pages::classify(ctx);

    // Rule 2: order confirmed here; tell the Primary to drop its stale
    // cart and come back to a confirmation URL that will not loop.
    if tags.contains(&PageTag::OrderReceived)
        && !ctx.has_param(CLEARED_PARAM)
        && config.has_peer()
    {
        let return_url = request::with_param(&ctx.current_url(), CLEARED_PARAM, "1");
        return Outcome::redirect(Decision::ClearAndRedirect {
            target: config.peer_url.clone(),
            return_url,
        });
    }

    // Rule 3: payment-provider callbacks pass unconditionally.
    if config
        .bypass_path_fragments
        .iter()
        .any(|fragment| !fragment.is_empty() && ctx.path.contains(fragment.as_str()))
    {
        return Outcome::allow();
    }

    // Rule 4: explicitly allowed pages render locally.
    if pages::is_allowed(&config.allowed_pages, &tags) {
        return Outcome::allow();
    }

    // Rule 5: everything else bounces back to the Primary; a non-empty
    // local cart rides along so state is not lost on the way.
    match peer_target(config, ctx) {
        Some(target) => Outcome::redirect(transfer_or_plain(target, cart)),
        // No peer configured: render locally rather than dead-end.
        None => Outcome::allow(),
    }
}

// =============================================================================
// RULE HELPERS
// =============================================================================

/// Consume a transfer token if present and decodable.
///
/// An undecodable token is treated as absent: the caller falls through to
/// the remaining rules, and every peer URL built afterwards has the token
/// stripped, so garbage is never forwarded.
fn consume_token(ctx: &RequestContext) -> Option<Outcome> {
    let token = ctx.param(TRANSFER_PARAM)?;
    let snapshot = codec::decode(token).ok()?;
    Some(Outcome {
        decision: Decision::RedirectPlain {
            target: ctx.url_without(&[TRANSFER_PARAM]),
        },
        effect: Some(CartEffect::Replace(snapshot)),
    })
}

/// The commerce surface that triggers a handoff on the Primary.
fn transfer_worthy(tags: &std::collections::BTreeSet<PageTag>) -> bool {
    [
        PageTag::Storefront,
        PageTag::Cart,
        PageTag::Checkout,
        PageTag::MyAccount,
    ]
    .iter()
    .any(|tag| tags.contains(tag))
}

/// Current request target spliced onto the peer base URL, protocol
/// parameters stripped. `None` when no peer is configured.
fn peer_target(config: &SiteConfig, ctx: &RequestContext) -> Option<String> {
    if !config.has_peer() {
        return None;
    }
    Some(request::join_peer(
        &config.peer_url,
        &ctx.url_without(STRIPPED_PARAMS),
    ))
}

/// Carry the cart when there is one; an empty cart short-circuits to a
/// plain redirect rather than round-tripping an empty payload.
fn transfer_or_plain(target: String, cart: &CartSnapshot) -> Decision {
    if cart.is_empty() {
        Decision::RedirectPlain { target }
    } else {
        Decision::RedirectTransfer {
            target,
            token: codec::encode(cart),
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================
