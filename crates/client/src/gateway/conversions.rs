//! Conversions from wire shapes to domain types.
//!
//! This is where the cart invariants are enforced on ingest: non-positive
//! quantities are dropped, duplicate identity keys are merged, sale prices
//! are resolved against list prices, and image paths are normalized to
//! absolute URLs.

use tracing::warn;
use url::Url;

use maison_core::{CurrencyCode, Price};
use rust_decimal::Decimal;

use crate::types::{Cart, CartLine, FavoriteRecord, FavoriteSet, LineKey, Product, Variant};

use super::wire::{RemoteCartLine, RemoteFavorite, RemoteProduct};

/// Convert the server's cart lines into the local [`Cart`].
pub fn convert_cart(lines: Vec<RemoteCartLine>, media_base: &Url) -> Cart {
    let mut out: Vec<CartLine> = Vec::with_capacity(lines.len());

    for raw in lines {
        let Ok(quantity) = u32::try_from(raw.quantity) else {
            warn!(line_id = %raw.id, quantity = raw.quantity, "dropping cart line with negative quantity");
            continue;
        };
        if quantity == 0 {
            warn!(line_id = %raw.id, "dropping cart line with zero quantity");
            continue;
        }

        let key = LineKey::new(raw.product_id, raw.color, raw.size);

        // The key is the identity: merge any duplicates the server hands us.
        if let Some(existing) = out.iter_mut().find(|l| l.key == key) {
            warn!(line_id = %raw.id, key = %existing.key, "merging duplicate cart line");
            existing.quantity += quantity;
            continue;
        }

        let (unit_price, original_price, on_sale) =
            resolve_prices(raw.price, raw.sale_price, raw.currency);

        out.push(CartLine {
            key,
            remote_id: raw.id,
            title: raw.title,
            quantity,
            unit_price,
            original_price,
            on_sale,
            image_url: raw.image.as_deref().map(|i| normalize_image_url(i, media_base)),
        });
    }

    Cart::from_lines(out)
}

/// Convert the server's favorite records into the local [`FavoriteSet`].
pub fn convert_favorites(records: Vec<RemoteFavorite>, media_base: &Url) -> FavoriteSet {
    let records = records
        .into_iter()
        .map(|raw| FavoriteRecord {
            id: raw.id,
            product_id: raw.product_id,
            title: raw.title,
            image_url: raw.image.as_deref().map(|i| normalize_image_url(i, media_base)),
            favorited_at: raw.created_at,
        })
        .collect();
    FavoriteSet::from_records(records)
}

/// Convert a server product into the domain [`Product`].
pub fn convert_product(raw: RemoteProduct, media_base: &Url) -> Product {
    let currency = raw.currency;
    Product {
        id: raw.id,
        title: raw.title,
        price: Price::new(raw.price, currency),
        sale_price: raw.sale_price.map(|p| Price::new(p, currency)),
        image_url: raw.image.as_deref().map(|i| normalize_image_url(i, media_base)),
        variants: raw
            .variants
            .into_iter()
            .map(|v| Variant {
                id: v.id,
                color: v.color,
                size: v.size,
                price: v.price.map(|p| Price::new(p, currency)),
                available: v.available,
            })
            .collect(),
    }
}

/// Resolve the charged unit price against the list price.
///
/// A sale price only counts as a sale when it is strictly below list.
fn resolve_prices(
    list: Decimal,
    sale: Option<Decimal>,
    currency: CurrencyCode,
) -> (Price, Price, bool) {
    let original = Price::new(list, currency);
    match sale {
        Some(sale) if sale < list => (Price::new(sale, currency), original, true),
        _ => (original, original, false),
    }
}

/// Resolve an image path to an absolute URL against the media base.
///
/// Already-absolute URLs pass through untouched; anything that fails to
/// resolve is returned as-is rather than dropped.
fn normalize_image_url(raw: &str, media_base: &Url) -> String {
    match Url::parse(raw) {
        Ok(absolute) => absolute.into(),
        Err(url::ParseError::RelativeUrlWithoutBase) => media_base
            .join(raw.trim_start_matches('/'))
            .map_or_else(|_| raw.to_owned(), String::from),
        Err(_) => raw.to_owned(),
    }
}
