//! # Access Policy Evaluator
//!
//! Classifies an inbound request against a closed set of page tags and
//! evaluates the configured allow-list. All platform-specific page
//! detection lives behind this one seam: [`classify`] is a pure function
//! from request context to a set of tags, and a request can match several
//! tags at once (a product page is both `SingleProduct` and `Storefront`).
//!
//! Allow-lists are deny-by-default: an empty allow-list permits nothing,
//! and a site must be explicitly opened up page by page.

use crate::request::RequestContext;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::str::FromStr;

// =============================================================================
// PAGE TAGS
// =============================================================================

/// What kind of page a request targets.
///
/// Either a specific content page by numeric id, or one of the named
/// special locations of the storefront. The symbolic serialized names
/// (`wc_checkout`, `archive_shop`, …) are the configuration vocabulary and
/// must stay stable.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub enum PageTag {
    /// A specific content page, addressed by its numeric id.
    Page(u64),
    /// The site front page.
    FrontPage,
    /// The shop archive (product listing root).
    ShopArchive,
    /// A product category archive.
    ProductCategory,
    /// A product tag archive.
    ProductTag,
    /// A single product detail page.
    SingleProduct,
    /// Search results.
    SearchResults,
    /// The blog archive and other non-commerce post listings.
    BlogArchive,
    /// The cart page.
    Cart,
    /// The checkout page.
    Checkout,
    /// The order-received (confirmation) endpoint.
    OrderReceived,
    /// The order-tracking page.
    OrderTracking,
    /// The account home page.
    MyAccount,
    /// The view-order account endpoint.
    ViewOrder,
    /// The lost-password account endpoint.
    LostPassword,
    /// Any commerce-rendered page at all. Matched alongside the specific
    /// commerce tags; the engine's transfer trigger keys off this.
    Storefront,
}

impl PageTag {
    /// Symbolic configuration name of this tag.
    #[must_use]
    pub fn as_config_name(self) -> String {
        match self {
            Self::Page(id) => id.to_string(),
            Self::FrontPage => "front_page".into(),
            Self::ShopArchive => "archive_shop".into(),
            Self::ProductCategory => "archive_product_cat".into(),
            Self::ProductTag => "archive_product_tag".into(),
            Self::SingleProduct => "single_product".into(),
            Self::SearchResults => "search_results".into(),
            Self::BlogArchive => "blog_posts".into(),
            Self::Cart => "wc_cart".into(),
            Self::Checkout => "wc_checkout".into(),
            Self::OrderReceived => "wc_order_received".into(),
            Self::OrderTracking => "wc_order_tracking".into(),
            Self::MyAccount => "wc_my_account".into(),
            Self::ViewOrder => "wc_view_order".into(),
            Self::LostPassword => "wc_lost_password".into(),
            Self::Storefront => "is_woocommerce".into(),
        }
    }
}

/// The configuration name was not recognized.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownPageTag(pub String);

impl std::fmt::Display for UnknownPageTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "unknown page tag: {}", self.0)
    }
}

impl std::error::Error for UnknownPageTag {}

impl FromStr for PageTag {
    type Err = UnknownPageTag;

    /// Parse a configuration entry: a symbolic name or a numeric page id.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Ok(id) = s.parse::<u64>() {
            return Ok(Self::Page(id));
        }
        match s {
            "front_page" => Ok(Self::FrontPage),
            "archive_shop" => Ok(Self::ShopArchive),
            "archive_product_cat" => Ok(Self::ProductCategory),
            "archive_product_tag" => Ok(Self::ProductTag),
            "single_product" => Ok(Self::SingleProduct),
            "search_results" => Ok(Self::SearchResults),
            "blog_posts" => Ok(Self::BlogArchive),
            "wc_cart" => Ok(Self::Cart),
            "wc_checkout" => Ok(Self::Checkout),
            "wc_order_received" => Ok(Self::OrderReceived),
            "wc_order_tracking" => Ok(Self::OrderTracking),
            "wc_my_account" => Ok(Self::MyAccount),
            "wc_view_order" => Ok(Self::ViewOrder),
            "wc_lost_password" => Ok(Self::LostPassword),
            "is_woocommerce" => Ok(Self::Storefront),
            other => Err(UnknownPageTag(other.to_string())),
        }
    }
}

// =============================================================================
// CLASSIFICATION
// =============================================================================

/// Determine every tag that applies to the request.
#[must_use]
pub fn classify(ctx: &RequestContext) -> BTreeSet<PageTag> {
    let mut tags = BTreeSet::new();

    if let Some(id) = ctx.page_id {
        tags.insert(PageTag::Page(id));
    }
    if ctx.has_param("s") {
        tags.insert(PageTag::SearchResults);
    }

    let mut segments = ctx.path.split('/').filter(|s| !s.is_empty());
    let first = segments.next();
    let second = segments.next();

    match first {
        None => {
            tags.insert(PageTag::FrontPage);
        }
        Some("shop") => {
            tags.insert(PageTag::ShopArchive);
            tags.insert(PageTag::Storefront);
        }
        Some("product-category") => {
            tags.insert(PageTag::ProductCategory);
            tags.insert(PageTag::Storefront);
        }
        Some("product-tag") => {
            tags.insert(PageTag::ProductTag);
            tags.insert(PageTag::Storefront);
        }
        Some("product") => {
            tags.insert(PageTag::SingleProduct);
            tags.insert(PageTag::Storefront);
        }
        Some("blog") => {
            tags.insert(PageTag::BlogArchive);
        }
        Some("cart") => {
            tags.insert(PageTag::Cart);
            tags.insert(PageTag::Storefront);
        }
        Some("checkout") => {
            tags.insert(PageTag::Checkout);
            tags.insert(PageTag::Storefront);
            if second == Some("order-received") {
                tags.insert(PageTag::OrderReceived);
            }
        }
        Some("order-tracking") => {
            tags.insert(PageTag::OrderTracking);
        }
        Some("my-account") => {
            tags.insert(PageTag::MyAccount);
            tags.insert(PageTag::Storefront);
            match second {
                Some("view-order") => {
                    tags.insert(PageTag::ViewOrder);
                }
                Some("lost-password") => {
                    tags.insert(PageTag::LostPassword);
                }
                _ => {}
            }
        }
        Some(_) => {}
    }

    tags
}

// =============================================================================
// ALLOW-LIST EVALUATION
// =============================================================================

/// True iff the allow-list and the matched tags intersect.
///
/// An empty allow-list always yields `false`: nothing is allowed by
/// default, the site must be explicitly opened up.
#[must_use]
pub fn is_allowed(allowed: &BTreeSet<PageTag>, matched: &BTreeSet<PageTag>) -> bool {
    if allowed.is_empty() {
        return false;
    }
    allowed.intersection(matched).next().is_some()
}

// =============================================================================
// TESTS
// =============================================================================
