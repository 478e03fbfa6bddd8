//! # Request Context & URL Splicing
//!
//! A normalized view of one inbound page request, plus the pure URL
//! helpers the redirect protocol is built from. The decision engine never
//! sees the transport; it sees a [`RequestContext`].
//!
//! Query parameters are kept as an ordered list of decoded pairs so that
//! reconstructed URLs preserve the original parameter order.

use crate::primitives::API_PREFIX;

/// A normalized inbound request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestContext {
    /// Decoded request path, always starting with `/`.
    pub path: String,
    /// Decoded query parameters in original order.
    pub query: Vec<(String, String)>,
    /// Content-page identifier, when the host platform resolved one.
    pub page_id: Option<u64>,
}

impl RequestContext {
    /// Build a context from a raw request target (`/checkout/?a=b`).
    #[must_use]
    pub fn from_target(target: &str) -> Self {
        let (raw_path, raw_query) = match target.split_once('?') {
            Some((p, q)) => (p, q),
            None => (target, ""),
        };

        let path = if raw_path.starts_with('/') {
            raw_path.to_string()
        } else {
            format!("/{raw_path}")
        };

        let query: Vec<(String, String)> = raw_query
            .split('&')
            .filter(|pair| !pair.is_empty())
            .map(|pair| match pair.split_once('=') {
                Some((k, v)) => (decode_component(k), decode_component(v)),
                None => (decode_component(pair), String::new()),
            })
            .collect();

        // The host platform addresses plain content pages by numeric id.
        let page_id = query
            .iter()
            .find(|(k, _)| k == "page_id" || k == "p")
            .and_then(|(_, v)| v.parse().ok());

        Self {
            path,
            query,
            page_id,
        }
    }

    /// First value of a query parameter, if present.
    #[must_use]
    pub fn param(&self, key: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// True when the parameter is present, with any value.
    #[must_use]
    pub fn has_param(&self, key: &str) -> bool {
        self.param(key).is_some()
    }

    /// Reassemble the current URL (path + query), re-encoding values.
    #[must_use]
    pub fn current_url(&self) -> String {
        assemble(&self.path, self.query.iter().map(|(k, v)| (k.as_str(), v.as_str())))
    }

    /// Current URL with the named parameters removed.
    ///
    /// Used to strip a consumed transfer token (and the other protocol
    /// parameters) before any further redirect is issued.
    #[must_use]
    pub fn url_without(&self, params: &[&str]) -> String {
        assemble(
            &self.path,
            self.query
                .iter()
                .filter(|(k, _)| !params.contains(&k.as_str()))
                .map(|(k, v)| (k.as_str(), v.as_str())),
        )
    }

    /// True for administrative and authoring contexts that must never be
    /// redirected: the dashboard, page-builder previews, the customizer,
    /// and block-editor probes.
    #[must_use]
    pub fn is_editor_context(&self) -> bool {
        if self.path.starts_with("/wp-admin") || self.path.starts_with("/admin") {
            return true;
        }
        self.has_param("elementor-preview")
            || self.param("action") == Some("elementor")
            || self.has_param("customize_changeset_uuid")
            || self.has_param("block-editor")
    }

    /// True for calls to this protocol's own REST surface.
    #[must_use]
    pub fn is_protocol_endpoint(&self) -> bool {
        self.path.starts_with(API_PREFIX) || self.path == "/health" || self.path.contains("ct/v1")
    }
}

// =============================================================================
// URL ASSEMBLY
// =============================================================================

/// Join a path with encoded query pairs.
fn assemble<'a>(path: &str, pairs: impl Iterator<Item = (&'a str, &'a str)>) -> String {
    let mut url = path.to_string();
    let mut separator = '?';
    for (key, value) in pairs {
        url.push(separator);
        url.push_str(&encode_component(key));
        url.push('=');
        url.push_str(&encode_component(value));
        separator = '&';
    }
    url
}

/// Append one query parameter to a URL that may already carry a query.
#[must_use]
pub fn with_param(url: &str, key: &str, value: &str) -> String {
    let separator = if url.contains('?') { '&' } else { '?' };
    format!(
        "{url}{separator}{}={}",
        encode_component(key),
        encode_component(value)
    )
}

/// Splice a local request target onto the peer's base URL.
///
/// The peer URL gains a trailing slash, the local target loses its leading
/// slash, so `https://peer` + `/checkout/?x=1` becomes
/// `https://peer/checkout/?x=1`.
#[must_use]
pub fn join_peer(peer_url: &str, local_target: &str) -> String {
    let base = peer_url.trim_end_matches('/');
    let local = local_target.trim_start_matches('/');
    format!("{base}/{local}")
}

// =============================================================================
// PERCENT ENCODING
// =============================================================================

/// Percent-encode a query component. Unreserved characters (RFC 3986) pass
/// through untouched, which keeps URL-safe base64 tokens byte-identical.
#[must_use]
pub fn encode_component(component: &str) -> String {
    let mut encoded = String::with_capacity(component.len());
    for byte in component.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                encoded.push(byte as char);
            }
            _ => {
                encoded.push('%');
                encoded.push(hex_digit(byte >> 4));
                encoded.push(hex_digit(byte & 0x0F));
            }
        }
    }
    encoded
}

/// Decode a percent-encoded query component. Malformed escapes pass
/// through literally rather than failing; `+` decodes to a space.
#[must_use]
pub fn decode_component(component: &str) -> String {
    let bytes = component.as_bytes();
    let mut decoded = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'%' => {
                match (hex_value(bytes.get(i + 1)), hex_value(bytes.get(i + 2))) {
                    (Some(hi), Some(lo)) => {
                        decoded.push((hi << 4) | lo);
                        i += 3;
                    }
                    _ => {
                        decoded.push(b'%');
                        i += 1;
                    }
                }
            }
            b'+' => {
                decoded.push(b' ');
                i += 1;
            }
            byte => {
                decoded.push(byte);
                i += 1;
            }
        }
    }
    String::from_utf8_lossy(&decoded).into_owned()
}

fn hex_digit(nibble: u8) -> char {
    char::from_digit(u32::from(nibble), 16)
        .map(|c| c.to_ascii_uppercase())
        .unwrap_or('0')
}

fn hex_value(byte: Option<&u8>) -> Option<u8> {
    byte.and_then(|b| (*b as char).to_digit(16)).map(|d| d as u8)
}

// =============================================================================
// TESTS
// =============================================================================
