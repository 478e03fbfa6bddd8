//! # Site Configuration Loading
//!
//! Parses a TOML configuration file into a [`SiteConfig`] and applies
//! environment overrides. The parsed configuration is written into the
//! site store; at request time everything reads from the store, never
//! from the file.
//!
//! ## Environment Overrides
//!
//! - `CARTLINK_PEER_URL`: overrides `peer_url`
//! - `CARTLINK_SHARED_SECRET`: overrides `shared_secret`
//!
//! ## Example
//!
//! ```toml
//! role = "primary"
//! enabled = true
//! peer_url = "https://checkout.example.com"
//! shared_secret = "..."
//! allowed_pages = ["front_page", "archive_shop", "single_product", "blog_posts"]
//! debug_logging = false
//! bypass_path_fragments = ["airwallex"]
//! ```

use cartlink_core::primitives::DEFAULT_BYPASS_FRAGMENT;
use cartlink_core::{PageTag, SiteConfig, SiteRole};
use serde::Deserialize;
use std::collections::BTreeSet;
use std::path::Path;
use thiserror::Error;

/// Why a configuration file failed to load.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config file: {0}")]
    Io(String),

    #[error("cannot parse config file: {0}")]
    Parse(String),

    #[error("invalid role '{0}': expected 'primary' or 'secondary'")]
    InvalidRole(String),

    #[error("invalid allowed_pages entry: {0}")]
    InvalidPage(String),
}

/// The raw file shape, before validation.
#[derive(Debug, Deserialize)]
struct FileConfig {
    role: String,
    #[serde(default = "default_enabled")]
    enabled: bool,
    #[serde(default)]
    peer_url: String,
    #[serde(default)]
    shared_secret: String,
    #[serde(default)]
    allowed_pages: Vec<String>,
    #[serde(default)]
    debug_logging: bool,
    #[serde(default = "default_bypass")]
    bypass_path_fragments: Vec<String>,
}

fn default_enabled() -> bool {
    true
}

fn default_bypass() -> Vec<String> {
    vec![DEFAULT_BYPASS_FRAGMENT.to_string()]
}

/// Load and validate a configuration file, then apply env overrides.
pub fn load_file(path: &Path) -> Result<SiteConfig, ConfigError> {
    let text = std::fs::read_to_string(path).map_err(|e| ConfigError::Io(e.to_string()))?;
    let mut config = parse(&text)?;
    apply_env_overrides(&mut config);
    Ok(config)
}

/// Parse configuration text into a validated [`SiteConfig`].
pub fn parse(text: &str) -> Result<SiteConfig, ConfigError> {
    let file: FileConfig = toml::from_str(text).map_err(|e| ConfigError::Parse(e.to_string()))?;

    let role = match file.role.as_str() {
        "primary" => SiteRole::Primary,
        "secondary" => SiteRole::Secondary,
        other => return Err(ConfigError::InvalidRole(other.to_string())),
    };

    let mut allowed_pages = BTreeSet::new();
    for entry in &file.allowed_pages {
        let tag: PageTag = entry
            .parse()
            .map_err(|_| ConfigError::InvalidPage(entry.clone()))?;
        allowed_pages.insert(tag);
    }

    Ok(SiteConfig {
        role,
        enabled: file.enabled,
        peer_url: file.peer_url.trim_end_matches('/').to_string(),
        shared_secret: file.shared_secret,
        allowed_pages,
        debug_logging: file.debug_logging,
        bypass_path_fragments: file.bypass_path_fragments,
    })
}

/// Apply `CARTLINK_PEER_URL` and `CARTLINK_SHARED_SECRET` overrides.
pub fn apply_env_overrides(config: &mut SiteConfig) {
    if let Ok(peer) = std::env::var("CARTLINK_PEER_URL") {
        if !peer.trim().is_empty() {
            config.peer_url = peer.trim_end_matches('/').to_string();
        }
    }
    if let Ok(secret) = std::env::var("CARTLINK_SHARED_SECRET") {
        if !secret.is_empty() {
            config.shared_secret = secret;
        }
    }
}

/// Generate a fresh shared secret.
///
/// Hashes several independently seeded `RandomState` instances together
/// with the current time. Not a CSPRNG, but the secret guards a
/// low-value, rate-limited surface and can be rotated at any time by
/// re-running `init`.
#[must_use]
pub fn generate_secret() -> String {
    use std::collections::hash_map::RandomState;
    use std::hash::{BuildHasher, Hasher};

    let mut secret = String::with_capacity(64);
    for round in 0u64..4 {
        let mut hasher = RandomState::new().build_hasher();
        hasher.write_u64(round);
        hasher.write_u128(
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .map(|d| d.as_nanos())
                .unwrap_or(0),
        );
        secret.push_str(&format!("{:016x}", hasher.finish()));
    }
    secret
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn full_config_parses() {
        let config = parse(
            r#"
            role = "primary"
            enabled = true
            peer_url = "https://checkout.example.com/"
            shared_secret = "s3cret"
            allowed_pages = ["front_page", "blog_posts", "42"]
            debug_logging = true
            bypass_path_fragments = ["airwallex", "stripe"]
            "#,
        )
        .expect("parse");

        assert_eq!(config.role, SiteRole::Primary);
        // Trailing slash is normalized away.
        assert_eq!(config.peer_url, "https://checkout.example.com");
        assert!(config.allowed_pages.contains(&PageTag::FrontPage));
        assert!(config.allowed_pages.contains(&PageTag::Page(42)));
        assert_eq!(config.bypass_path_fragments.len(), 2);
    }

    #[test]
    fn minimal_config_gets_defaults() {
        let config = parse(r#"role = "secondary""#).expect("parse");
        assert_eq!(config.role, SiteRole::Secondary);
        assert!(config.enabled);
        assert!(config.allowed_pages.is_empty());
        assert_eq!(
            config.bypass_path_fragments,
            vec![DEFAULT_BYPASS_FRAGMENT.to_string()]
        );
    }

    #[test]
    fn bad_role_is_rejected() {
        assert!(matches!(
            parse(r#"role = "tertiary""#),
            Err(ConfigError::InvalidRole(_))
        ));
    }

    #[test]
    fn bad_page_entry_is_rejected() {
        let result = parse(
            r#"
            role = "primary"
            allowed_pages = ["wc_wishlist"]
            "#,
        );
        assert!(matches!(result, Err(ConfigError::InvalidPage(_))));
    }

    #[test]
    fn generated_secrets_are_long_and_distinct() {
        let a = generate_secret();
        let b = generate_secret();
        assert_eq!(a.len(), 64);
        assert_ne!(a, b);
    }
}
