//! Remote gateway: the REST boundary of the subsystem.
//!
//! The managers speak to the backend through the narrow capability traits
//! defined here ([`AuthGateway`], [`CatalogGateway`], [`CartGateway`],
//! [`FavoritesGateway`]); [`HttpGateway`] implements all of them over
//! `reqwest` with bearer-token authentication. Tests substitute an
//! in-memory implementation.

pub mod conversions;
pub mod wire;

use std::sync::Arc;
use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use thiserror::Error;
use tracing::instrument;

use maison_core::{CartLineId, ProductId};

use crate::config::ClientConfig;
use crate::types::Product;
use wire::{AuthPayload, NewCartItem, RemoteCart, RemoteCartLine, RemoteFavorite, UpdateCartItem};

/// Errors from the HTTP boundary.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// Transport-level failure (connect, timeout, TLS).
    #[error("http transport error: {0}")]
    Http(#[from] reqwest::Error),

    /// The server rejected the bearer token (401). Treated as session
    /// expiry by the caller.
    #[error("session expired or token invalid")]
    Unauthorized,

    /// The server asked us to back off (429).
    #[error("rate limited, retry after {0}s")]
    RateLimited(u64),

    /// Any other non-success status.
    #[error("server returned {status}: {body}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Response body, truncated for logging.
        body: String,
    },

    /// The response body could not be decoded.
    #[error("failed to decode response: {0}")]
    Decode(#[from] serde_json::Error),
}

// The traits are consumed through generics, never trait objects, so the
// auto-captured futures are fine.
#[allow(async_fn_in_trait)]
/// Authentication endpoints.
pub trait AuthGateway {
    /// Exchange credentials for an access token and user record.
    async fn login(&self, email: &str, password: &str) -> Result<AuthPayload, GatewayError>;

    /// Create an account and return its first access token.
    async fn register(
        &self,
        email: &str,
        password: &str,
        name: &str,
    ) -> Result<AuthPayload, GatewayError>;
}

#[allow(async_fn_in_trait)]
/// Catalog read endpoints.
pub trait CatalogGateway {
    /// Fetch a single product with its variants.
    async fn fetch_product(&self, product_id: ProductId) -> Result<Product, GatewayError>;
}

#[allow(async_fn_in_trait)]
/// Cart endpoints. All calls are authenticated.
pub trait CartGateway {
    /// Fetch the server's authoritative cart.
    async fn fetch_cart(&self, token: &SecretString)
    -> Result<Vec<RemoteCartLine>, GatewayError>;

    /// Add a line to the cart.
    async fn add_item(&self, token: &SecretString, item: &NewCartItem)
    -> Result<(), GatewayError>;

    /// Set the quantity of an existing line.
    async fn update_item(
        &self,
        token: &SecretString,
        line_id: CartLineId,
        quantity: u32,
    ) -> Result<(), GatewayError>;

    /// Remove a line.
    async fn remove_item(
        &self,
        token: &SecretString,
        line_id: CartLineId,
    ) -> Result<(), GatewayError>;

    /// Remove every line.
    async fn clear_cart(&self, token: &SecretString) -> Result<(), GatewayError>;
}

#[allow(async_fn_in_trait)]
/// Favorites endpoints. All calls are authenticated.
pub trait FavoritesGateway {
    /// Fetch the user's favorite records.
    async fn fetch_favorites(
        &self,
        token: &SecretString,
    ) -> Result<Vec<RemoteFavorite>, GatewayError>;

    /// Favorite a product.
    async fn add_favorite(
        &self,
        token: &SecretString,
        product_id: ProductId,
    ) -> Result<(), GatewayError>;

    /// Unfavorite a product.
    async fn remove_favorite(
        &self,
        token: &SecretString,
        product_id: ProductId,
    ) -> Result<(), GatewayError>;
}

/// The full gateway surface consumed by [`crate::Storefront`].
pub trait ApiGateway: AuthGateway + CatalogGateway + CartGateway + FavoritesGateway {}

impl<T: AuthGateway + CatalogGateway + CartGateway + FavoritesGateway> ApiGateway for T {}

// =============================================================================
// HttpGateway
// =============================================================================

/// Client for the Maison REST API.
///
/// Stateless apart from connection pooling; the per-user bearer token is
/// passed into every authenticated call by the managers.
#[derive(Clone)]
pub struct HttpGateway {
    inner: Arc<HttpGatewayInner>,
}

struct HttpGatewayInner {
    client: reqwest::Client,
    base_url: String,
    media_base: url::Url,
}

impl HttpGateway {
    /// Create a new API client.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying HTTP client cannot be built.
    pub fn new(config: &ClientConfig) -> Result<Self, GatewayError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;

        Ok(Self {
            inner: Arc::new(HttpGatewayInner {
                client,
                base_url: config.api_base_url.as_str().trim_end_matches('/').to_string(),
                media_base: config.media_base_url.clone(),
            }),
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{path}", self.inner.base_url)
    }

    fn authed(&self, method: reqwest::Method, path: &str, token: &SecretString) -> reqwest::RequestBuilder {
        self.inner
            .client
            .request(method, self.endpoint(path))
            .bearer_auth(token.expose_secret())
    }

    /// Send a request and decode the JSON response body.
    async fn execute<T: DeserializeOwned>(
        &self,
        request: reqwest::RequestBuilder,
    ) -> Result<T, GatewayError> {
        let response_text = self.send(request).await?;

        match serde_json::from_str(&response_text) {
            Ok(value) => Ok(value),
            Err(e) => {
                tracing::error!(
                    error = %e,
                    body = %truncate(&response_text, 500),
                    "Failed to parse API response"
                );
                Err(GatewayError::Decode(e))
            }
        }
    }

    /// Send a request and discard any response body.
    async fn execute_empty(&self, request: reqwest::RequestBuilder) -> Result<(), GatewayError> {
        self.send(request).await.map(|_| ())
    }

    /// Send a request, mapping status codes and reading the body as text
    /// first for better error diagnostics.
    async fn send(&self, request: reqwest::RequestBuilder) -> Result<String, GatewayError> {
        let response = request.send().await?;
        let status = response.status();

        if status == reqwest::StatusCode::UNAUTHORIZED {
            return Err(GatewayError::Unauthorized);
        }

        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get("Retry-After")
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.parse::<u64>().ok())
                .unwrap_or(1);
            return Err(GatewayError::RateLimited(retry_after));
        }

        let response_text = response.text().await?;

        if !status.is_success() {
            tracing::error!(
                status = %status,
                body = %truncate(&response_text, 500),
                "API returned non-success status"
            );
            return Err(GatewayError::Status {
                status: status.as_u16(),
                body: truncate(&response_text, 200),
            });
        }

        Ok(response_text)
    }
}

fn truncate(s: &str, max_chars: usize) -> String {
    s.chars().take(max_chars).collect()
}

impl AuthGateway for HttpGateway {
    #[instrument(skip(self, password), fields(email = %email))]
    async fn login(&self, email: &str, password: &str) -> Result<AuthPayload, GatewayError> {
        let request = self
            .inner
            .client
            .post(self.endpoint("auth/login"))
            .json(&serde_json::json!({ "email": email, "password": password }));
        self.execute(request).await
    }

    #[instrument(skip(self, password), fields(email = %email))]
    async fn register(
        &self,
        email: &str,
        password: &str,
        name: &str,
    ) -> Result<AuthPayload, GatewayError> {
        let request = self
            .inner
            .client
            .post(self.endpoint("auth/register"))
            .json(&serde_json::json!({ "email": email, "password": password, "name": name }));
        self.execute(request).await
    }
}

impl CatalogGateway for HttpGateway {
    #[instrument(skip(self), fields(product_id = %product_id))]
    async fn fetch_product(&self, product_id: ProductId) -> Result<Product, GatewayError> {
        let request = self
            .inner
            .client
            .get(self.endpoint(&format!("products/{product_id}")));
        let raw: wire::RemoteProduct = self.execute(request).await?;
        Ok(conversions::convert_product(raw, &self.inner.media_base))
    }
}

impl CartGateway for HttpGateway {
    #[instrument(skip(self, token))]
    async fn fetch_cart(
        &self,
        token: &SecretString,
    ) -> Result<Vec<RemoteCartLine>, GatewayError> {
        let cart: RemoteCart = self
            .execute(self.authed(reqwest::Method::GET, "cart", token))
            .await?;
        Ok(cart.items)
    }

    #[instrument(skip(self, token, item), fields(product_id = %item.product_id))]
    async fn add_item(
        &self,
        token: &SecretString,
        item: &NewCartItem,
    ) -> Result<(), GatewayError> {
        self.execute_empty(self.authed(reqwest::Method::POST, "cart/items", token).json(item))
            .await
    }

    #[instrument(skip(self, token), fields(line_id = %line_id))]
    async fn update_item(
        &self,
        token: &SecretString,
        line_id: CartLineId,
        quantity: u32,
    ) -> Result<(), GatewayError> {
        let request = self
            .authed(reqwest::Method::PATCH, &format!("cart/items/{line_id}"), token)
            .json(&UpdateCartItem { quantity });
        self.execute_empty(request).await
    }

    #[instrument(skip(self, token), fields(line_id = %line_id))]
    async fn remove_item(
        &self,
        token: &SecretString,
        line_id: CartLineId,
    ) -> Result<(), GatewayError> {
        self.execute_empty(self.authed(
            reqwest::Method::DELETE,
            &format!("cart/items/{line_id}"),
            token,
        ))
        .await
    }

    #[instrument(skip(self, token))]
    async fn clear_cart(&self, token: &SecretString) -> Result<(), GatewayError> {
        self.execute_empty(self.authed(reqwest::Method::DELETE, "cart/clear", token))
            .await
    }
}

impl FavoritesGateway for HttpGateway {
    #[instrument(skip(self, token))]
    async fn fetch_favorites(
        &self,
        token: &SecretString,
    ) -> Result<Vec<RemoteFavorite>, GatewayError> {
        self.execute(self.authed(reqwest::Method::GET, "favorites", token))
            .await
    }

    #[instrument(skip(self, token), fields(product_id = %product_id))]
    async fn add_favorite(
        &self,
        token: &SecretString,
        product_id: ProductId,
    ) -> Result<(), GatewayError> {
        let request = self
            .authed(reqwest::Method::POST, "favorites", token)
            .json(&serde_json::json!({ "product_id": product_id }));
        self.execute_empty(request).await
    }

    #[instrument(skip(self, token), fields(product_id = %product_id))]
    async fn remove_favorite(
        &self,
        token: &SecretString,
        product_id: ProductId,
    ) -> Result<(), GatewayError> {
        self.execute_empty(self.authed(
            reqwest::Method::DELETE,
            &format!("favorites/product/{product_id}"),
            token,
        ))
        .await
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use url::Url;

    fn config() -> ClientConfig {
        ClientConfig::new(
            Url::parse("https://api.maison.example/v1/").unwrap(),
            Url::parse("https://media.maison.example/").unwrap(),
            PathBuf::from("creds.json"),
            30,
        )
    }

    #[test]
    fn test_endpoint_joins_without_double_slash() {
        let gateway = HttpGateway::new(&config()).unwrap();
        assert_eq!(
            gateway.endpoint("cart/items"),
            "https://api.maison.example/v1/cart/items"
        );
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("hello", 3), "hel");
        assert_eq!(truncate("hi", 10), "hi");
    }

    #[test]
    fn test_gateway_error_display() {
        let err = GatewayError::Status {
            status: 503,
            body: "maintenance".to_string(),
        };
        assert_eq!(err.to_string(), "server returned 503: maintenance");
        assert_eq!(
            GatewayError::RateLimited(7).to_string(),
            "rate limited, retry after 7s"
        );
    }
}
