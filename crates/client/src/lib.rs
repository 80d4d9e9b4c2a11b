//! Maison Client - Storefront client services.
//!
//! This crate owns the client-side state that must stay consistent with the
//! remote, per-user server state: the shopping cart and the favorites list.
//! UI layers (pages, dialogs, the admin console) call into the public
//! contracts here and render whatever comes back; they never mutate cart or
//! favorites state directly.
//!
//! # Architecture
//!
//! - [`session::SessionStore`] - authenticated identity and its transitions
//! - [`gateway`] - the REST boundary (`reqwest`-backed [`gateway::HttpGateway`])
//! - [`cart::CartManager`] - authoritative local view of the user's cart
//! - [`favorites::FavoritesManager`] - favorited product set and toggle protocol
//! - [`storefront::Storefront`] - constructs the services once and drives
//!   login/logout resynchronization
//!
//! Cart mutations are confirmed by a full refetch rather than patched
//! optimistically; favorites update the local set first and then resync.
//! See the individual modules for the reasoning behind the asymmetry.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod cart;
pub mod config;
pub mod error;
pub mod favorites;
pub mod gateway;
pub mod session;
pub mod storefront;
pub mod types;

pub use cart::CartManager;
pub use config::{ClientConfig, ConfigError};
pub use error::{Result, StoreError};
pub use favorites::FavoritesManager;
pub use gateway::{
    ApiGateway, AuthGateway, CartGateway, CatalogGateway, FavoritesGateway, GatewayError,
    HttpGateway,
};
pub use session::{
    AuthError, CredentialStoreError, FileTokenStore, Registration, Session, SessionStore,
    StoredCredential, TokenStore, User,
};
pub use storefront::Storefront;
pub use types::{Cart, CartLine, FavoriteRecord, FavoriteSet, LineKey, Product, Variant};
