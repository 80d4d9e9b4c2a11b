//! Unified error type for the storefront client.
//!
//! Every public operation returns `Result<T, StoreError>`. Nothing here is
//! retried automatically; errors propagate to the calling UI layer, which
//! owns user-facing messaging. Failed mutations leave prior local state
//! untouched.

use thiserror::Error;

use maison_core::ProductId;

use crate::gateway::GatewayError;
use crate::session::{AuthError, CredentialStoreError};
use crate::types::LineKey;

/// Errors surfaced by the cart, favorites, and session operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Operation attempted while logged out.
    #[error("operation requires an authenticated session")]
    NotAuthenticated,

    /// A mutation targeted a cart line that is not present locally.
    #[error("no cart line for {0}")]
    LineNotFound(LineKey),

    /// The product is sold in variants but no matching color/size was
    /// selected.
    #[error("product {0} requires a color/size selection")]
    VariantRequired(ProductId),

    /// Authentication failed.
    #[error("auth error: {0}")]
    Auth(#[from] AuthError),

    /// Network or server failure at the gateway boundary.
    #[error("gateway error: {0}")]
    Gateway(#[from] GatewayError),

    /// The durable credential storage failed.
    #[error("credential storage error: {0}")]
    Credential(#[from] CredentialStoreError),
}

/// Result type alias for `StoreError`.
pub type Result<T> = std::result::Result<T, StoreError>;
