//! Wire shapes exchanged with the REST backend.
//!
//! Raw DTOs stay in this module; everything the rest of the crate touches
//! goes through [`super::conversions`] first.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use maison_core::{CartLineId, CurrencyCode, FavoriteId, ProductId, VariantId};

use crate::session::User;

/// `POST /auth/login` and `POST /auth/register` response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthPayload {
    /// Bearer token for subsequent calls.
    pub access_token: String,
    /// The authenticated user.
    pub user: User,
}

/// `GET /cart` response envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteCart {
    /// The cart lines.
    pub items: Vec<RemoteCartLine>,
}

/// A cart line as the server reports it.
///
/// Quantities arrive as `i64` and prices as decimal strings; the conversion
/// layer normalizes both.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteCartLine {
    /// Server-side line ID.
    pub id: CartLineId,
    /// Product ID.
    pub product_id: ProductId,
    /// Product title.
    pub title: String,
    /// Selected color, if any.
    pub color: Option<String>,
    /// Selected size, if any.
    pub size: Option<String>,
    /// Quantity as reported by the server.
    pub quantity: i64,
    /// List price per unit.
    pub price: Decimal,
    /// Sale price per unit, when on sale.
    pub sale_price: Option<Decimal>,
    /// ISO 4217 currency code.
    #[serde(default)]
    pub currency: CurrencyCode,
    /// Image path or URL, possibly relative to the media base.
    pub image: Option<String>,
}

/// `POST /cart/items` request body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewCartItem {
    /// Product to add.
    pub product_id: ProductId,
    /// Selected color, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    /// Selected size, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<String>,
    /// Quantity to add.
    pub quantity: u32,
}

/// `PATCH /cart/items/{id}` request body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateCartItem {
    /// New quantity.
    pub quantity: u32,
}

/// A favorite record as the server reports it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteFavorite {
    /// Favorite entry ID.
    pub id: FavoriteId,
    /// The favorited product.
    pub product_id: ProductId,
    /// Product title.
    pub title: String,
    /// Image path or URL, possibly relative to the media base.
    pub image: Option<String>,
    /// When the product was favorited.
    pub created_at: DateTime<Utc>,
}

/// A product as the server reports it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteProduct {
    /// Product ID.
    pub id: ProductId,
    /// Product title.
    pub title: String,
    /// List price.
    pub price: Decimal,
    /// Sale price, when on sale.
    pub sale_price: Option<Decimal>,
    /// ISO 4217 currency code.
    #[serde(default)]
    pub currency: CurrencyCode,
    /// Image path or URL, possibly relative to the media base.
    pub image: Option<String>,
    /// Product variants.
    #[serde(default)]
    pub variants: Vec<RemoteVariant>,
}

/// A product variant as the server reports it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteVariant {
    /// Variant ID.
    pub id: VariantId,
    /// Color option.
    pub color: Option<String>,
    /// Size option.
    pub size: Option<String>,
    /// Variant price override.
    pub price: Option<Decimal>,
    /// Whether this variant is in stock.
    #[serde(default = "default_true")]
    pub available: bool,
}

const fn default_true() -> bool {
    true
}
