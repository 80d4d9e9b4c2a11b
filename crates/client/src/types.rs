//! Domain types for the storefront client.
//!
//! These types provide a clean, ergonomic API separate from the raw wire
//! shapes returned by the REST backend (see [`crate::gateway::wire`]).

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use maison_core::{CartLineId, CurrencyCode, FavoriteId, Price, ProductId, VariantId};

// =============================================================================
// Product Types
// =============================================================================

/// A specific color/size combination of a product.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Variant {
    /// Variant ID.
    pub id: VariantId,
    /// Color option, if the product is sold in colors.
    pub color: Option<String>,
    /// Size option, if the product is sold in sizes.
    pub size: Option<String>,
    /// Variant-specific price override.
    pub price: Option<Price>,
    /// Whether this variant is available for sale.
    pub available: bool,
}

/// A product in the catalog.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Product {
    /// Product ID.
    pub id: ProductId,
    /// Product title.
    pub title: String,
    /// List price.
    pub price: Price,
    /// Sale price, when the product is on sale.
    pub sale_price: Option<Price>,
    /// Primary image URL.
    pub image_url: Option<String>,
    /// Available variants. Empty for products sold without options.
    pub variants: Vec<Variant>,
}

impl Product {
    /// Whether this product is sold in variants (color/size options).
    #[must_use]
    pub fn has_variants(&self) -> bool {
        !self.variants.is_empty()
    }

    /// Find the variant exactly matching the given color and size selection.
    #[must_use]
    pub fn resolve_variant(&self, color: Option<&str>, size: Option<&str>) -> Option<&Variant> {
        self.variants
            .iter()
            .find(|v| v.color.as_deref() == color && v.size.as_deref() == size)
    }
}

// =============================================================================
// Cart Types
// =============================================================================

/// Identity key of a cart line: one line may exist per
/// `(product, color, size)` combination.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LineKey {
    /// Product ID.
    pub product_id: ProductId,
    /// Selected color, if any.
    pub color: Option<String>,
    /// Selected size, if any.
    pub size: Option<String>,
}

impl LineKey {
    /// Create a new line key.
    #[must_use]
    pub const fn new(product_id: ProductId, color: Option<String>, size: Option<String>) -> Self {
        Self {
            product_id,
            color,
            size,
        }
    }
}

impl std::fmt::Display for LineKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "product {}", self.product_id)?;
        if let Some(color) = &self.color {
            write!(f, " / {color}")?;
        }
        if let Some(size) = &self.size {
            write!(f, " / {size}")?;
        }
        Ok(())
    }
}

/// A line item in the cart.
///
/// Quantity is always >= 1; a quantity reaching zero removes the line.
#[derive(Debug, Clone)]
pub struct CartLine {
    /// Identity key.
    pub key: LineKey,
    /// Server-side line identifier, used for update/remove calls.
    pub remote_id: CartLineId,
    /// Product title.
    pub title: String,
    /// Quantity, >= 1.
    pub quantity: u32,
    /// Price actually charged per unit (sale price when on sale).
    pub unit_price: Price,
    /// List price per unit.
    pub original_price: Price,
    /// Whether the unit price is a sale price below list.
    pub on_sale: bool,
    /// Normalized absolute image URL.
    pub image_url: Option<String>,
}

impl CartLine {
    /// Total for this line (`unit_price * quantity`).
    #[must_use]
    pub fn line_total(&self) -> Price {
        self.unit_price * self.quantity
    }
}

/// The shopping cart: an ordered collection of lines.
///
/// `item_count` and `total` are pure projections over the lines and are
/// never stored independently.
#[derive(Debug, Clone, Default)]
pub struct Cart {
    lines: Vec<CartLine>,
}

impl Cart {
    /// Build a cart from converted lines.
    ///
    /// Callers are responsible for the line invariants (no zero quantities,
    /// no duplicate keys); the wire conversion enforces them.
    #[must_use]
    pub(crate) const fn from_lines(lines: Vec<CartLine>) -> Self {
        Self { lines }
    }

    /// The cart lines, in server order.
    #[must_use]
    pub fn lines(&self) -> &[CartLine] {
        &self.lines
    }

    /// Whether the cart has no lines.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Sum of quantities across all lines.
    #[must_use]
    pub fn item_count(&self) -> u32 {
        self.lines.iter().map(|l| l.quantity).sum()
    }

    /// Sum of `unit_price * quantity` across all lines.
    ///
    /// The currency is taken from the first line; an empty cart totals to
    /// zero in the default currency.
    #[must_use]
    pub fn total(&self) -> Price {
        let currency = self
            .lines
            .first()
            .map_or(CurrencyCode::default(), |l| l.unit_price.currency_code);
        self.lines
            .iter()
            .fold(Price::zero(currency), |acc, l| acc + l.line_total())
    }

    /// Find the line with the given identity key.
    #[must_use]
    pub fn find(&self, key: &LineKey) -> Option<&CartLine> {
        self.lines.iter().find(|l| &l.key == key)
    }
}

// =============================================================================
// Favorites Types
// =============================================================================

/// A favorited product, as listed by the backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FavoriteRecord {
    /// Favorite entry ID.
    pub id: FavoriteId,
    /// The favorited product.
    pub product_id: ProductId,
    /// Product title, for list display.
    pub title: String,
    /// Normalized absolute image URL.
    pub image_url: Option<String>,
    /// When the product was favorited.
    pub favorited_at: DateTime<Utc>,
}

/// The set of products the current user has favorited.
///
/// The ID set is the single source of truth for membership queries; the
/// records exist for list display only.
#[derive(Debug, Clone, Default)]
pub struct FavoriteSet {
    ids: HashSet<ProductId>,
    records: Vec<FavoriteRecord>,
}

impl FavoriteSet {
    /// Build a set from server records, deriving membership from them.
    #[must_use]
    pub fn from_records(records: Vec<FavoriteRecord>) -> Self {
        let ids = records.iter().map(|r| r.product_id).collect();
        Self { ids, records }
    }

    /// Whether the product is favorited.
    #[must_use]
    pub fn contains(&self, product_id: ProductId) -> bool {
        self.ids.contains(&product_id)
    }

    /// Number of favorited products.
    #[must_use]
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    /// Whether no products are favorited.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// The raw favorite records, in server order.
    #[must_use]
    pub fn records(&self) -> &[FavoriteRecord] {
        &self.records
    }

    /// Optimistically mark a product as favorited.
    ///
    /// Returns `true` if the product was not already in the set.
    pub(crate) fn mark(&mut self, product_id: ProductId) -> bool {
        self.ids.insert(product_id)
    }

    /// Optimistically unmark a product.
    ///
    /// Returns `true` if the product was in the set.
    pub(crate) fn unmark(&mut self, product_id: ProductId) -> bool {
        self.ids.remove(&product_id)
    }
}
