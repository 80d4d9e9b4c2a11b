//! Storefront facade: constructs the services once and drives session
//! transitions.
//!
//! There is no ambient state anywhere in the crate; one `Storefront` is
//! built at application start and passed by reference to the UI. Session
//! transitions are the one cross-cutting concern: on login/restore both
//! managers resynchronize, on logout both flush locally without a network
//! call.

use std::sync::Arc;

use secrecy::SecretString;
use tracing::{instrument, warn};

use crate::cart::CartManager;
use crate::config::ClientConfig;
use crate::error::Result;
use crate::favorites::FavoritesManager;
use maison_core::ProductId;

use crate::gateway::{ApiGateway, HttpGateway};
use crate::session::{FileTokenStore, Registration, SessionStore, TokenStore, User};
use crate::types::Product;

/// The subsystem's root: session store, cart manager, favorites manager.
pub struct Storefront<G> {
    gateway: Arc<G>,
    session: Arc<SessionStore<G>>,
    cart: CartManager<G>,
    favorites: FavoritesManager<G>,
}

impl Storefront<HttpGateway> {
    /// Build a storefront over the real HTTP gateway and a file-backed
    /// token store, per the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn from_config(config: &ClientConfig) -> Result<Self> {
        let gateway = HttpGateway::new(config)?;
        let tokens = FileTokenStore::new(config.credential_path.clone());
        Ok(Self::new(config, gateway, Box::new(tokens)))
    }
}

impl<G: ApiGateway> Storefront<G> {
    /// Wire up the services around the given gateway and token store.
    pub fn new(config: &ClientConfig, gateway: G, tokens: Box<dyn TokenStore>) -> Self {
        let gateway = Arc::new(gateway);
        let session = Arc::new(SessionStore::new(Arc::clone(&gateway), tokens));
        let cart = CartManager::new(
            Arc::clone(&gateway),
            Arc::clone(&session),
            config.media_base_url.clone(),
        );
        let favorites = FavoritesManager::new(
            Arc::clone(&gateway),
            Arc::clone(&session),
            config.media_base_url.clone(),
        );
        Self {
            gateway,
            session,
            cart,
            favorites,
        }
    }

    /// Fetch a product with its variants, for product pages and the
    /// add-to-cart flow.
    ///
    /// # Errors
    ///
    /// `Gateway` on network/server failure, including an unknown product.
    pub async fn fetch_product(&self, product_id: ProductId) -> Result<Product> {
        Ok(self.gateway.fetch_product(product_id).await?)
    }

    /// The session store.
    #[must_use]
    pub fn session(&self) -> &SessionStore<G> {
        &self.session
    }

    /// The cart manager.
    #[must_use]
    pub const fn cart(&self) -> &CartManager<G> {
        &self.cart
    }

    /// The favorites manager.
    #[must_use]
    pub const fn favorites(&self) -> &FavoritesManager<G> {
        &self.favorites
    }

    /// Log in and synchronize cart and favorites from the server.
    ///
    /// # Errors
    ///
    /// Propagates authentication and gateway failures from the login call
    /// itself; a failed initial sync is logged and recovered by the next
    /// operation's refresh.
    #[instrument(skip(self, password), fields(email = %email))]
    pub async fn login(&self, email: &str, password: &str) -> Result<User> {
        let user = self.session.login(email, password).await?;
        self.sync_after_login().await;
        Ok(user)
    }

    /// Register a new account, log it in, and synchronize.
    ///
    /// # Errors
    ///
    /// Propagates validation, authentication, and gateway failures from the
    /// registration call.
    #[instrument(skip(self, registration), fields(email = %registration.email))]
    pub async fn register(&self, registration: &Registration) -> Result<User> {
        let user = self.session.register(registration).await?;
        self.sync_after_login().await;
        Ok(user)
    }

    /// Accept an already-issued credential (the separate admin login flow)
    /// and synchronize.
    ///
    /// # Errors
    ///
    /// Returns an error if the credential cannot be persisted.
    pub async fn admin_login(&self, user: User, access_token: SecretString) -> Result<()> {
        self.session.admin_login(user, access_token)?;
        self.sync_after_login().await;
        Ok(())
    }

    /// Restore a persisted session at startup and synchronize if one was
    /// found.
    ///
    /// # Errors
    ///
    /// Returns an error if the credential store cannot be read.
    #[instrument(skip(self))]
    pub async fn restore(&self) -> Result<Option<User>> {
        let Some(user) = self.session.restore()? else {
            return Ok(None);
        };
        self.sync_after_login().await;
        Ok(Some(user))
    }

    /// Log out: clear the session and flush cart and favorites locally,
    /// with no network call.
    ///
    /// The managers are always flushed, even if removing the persisted
    /// credential fails.
    ///
    /// # Errors
    ///
    /// Returns an error if the persisted credential could not be removed.
    #[instrument(skip(self))]
    pub fn logout(&self) -> Result<()> {
        let result = self.session.logout();
        self.cart.clear_local();
        self.favorites.clear_local();
        result
    }

    /// Handle a session expiry signalled by a 401 from the gateway: the
    /// same local transition as a logout, with failures only logged since
    /// the token is already dead.
    pub fn expire_session(&self) {
        warn!("session expired, clearing local state");
        if let Err(e) = self.logout() {
            warn!(error = %e, "failed to remove persisted credential on expiry");
        }
    }

    async fn sync_after_login(&self) {
        if let Err(e) = self.cart.refresh().await {
            warn!(error = %e, "initial cart sync failed");
        }
        if let Err(e) = self.favorites.fetch_favorites().await {
            warn!(error = %e, "initial favorites sync failed");
        }
    }
}
