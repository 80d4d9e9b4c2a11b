//! Cart manager: the authoritative local view of the user's cart.
//!
//! Every mutating operation calls the gateway and then resynchronizes by
//! refetching the whole cart, rather than patching local state
//! optimistically. The server applies business rules the client does not
//! know about (stock limits, price changes), so the extra round trip buys
//! guaranteed convergence; a cart is small enough for that to be cheap.
//!
//! Overlapping mutations are serialized through an async mutex held across
//! the gateway call and the trailing refresh, so rapid repeated UI actions
//! queue in arrival order instead of racing to the resync boundary.

use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard};

use secrecy::SecretString;
use tracing::{debug, instrument};
use url::Url;

use maison_core::{Price, ProductId};

use crate::error::{Result, StoreError};
use crate::gateway::conversions::convert_cart;
use crate::gateway::wire::NewCartItem;
use crate::gateway::CartGateway;
use crate::session::SessionStore;
use crate::types::{Cart, LineKey, Product};

/// Owns the local cart state and the mutation protocol against the backend.
pub struct CartManager<G> {
    gateway: Arc<G>,
    session: Arc<SessionStore<G>>,
    media_base: Url,
    state: RwLock<Cart>,
    // Serializes mutations; held across the gateway call and refresh.
    mutation: tokio::sync::Mutex<()>,
}

impl<G> CartManager<G> {
    pub(crate) fn new(gateway: Arc<G>, session: Arc<SessionStore<G>>, media_base: Url) -> Self {
        Self {
            gateway,
            session,
            media_base,
            state: RwLock::new(Cart::default()),
            mutation: tokio::sync::Mutex::new(()),
        }
    }

    fn read_state(&self) -> RwLockReadGuard<'_, Cart> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn replace(&self, cart: Cart) {
        let mut guard = self.state.write().unwrap_or_else(PoisonError::into_inner);
        *guard = cart;
    }

    /// Snapshot of the current cart. Pure, no network call.
    #[must_use]
    pub fn snapshot(&self) -> Cart {
        self.read_state().clone()
    }

    /// Sum of `unit_price * quantity` over current lines. Pure, no network
    /// call.
    #[must_use]
    pub fn cart_total(&self) -> Price {
        self.read_state().total()
    }

    /// Sum of quantities over current lines. Pure, no network call.
    #[must_use]
    pub fn item_count(&self) -> u32 {
        self.read_state().item_count()
    }

    /// Flush local state without a network call. Used on logout.
    pub(crate) fn clear_local(&self) {
        self.replace(Cart::default());
    }

    /// The line matching the key, if present: `(remote id, quantity)`.
    fn find_line(&self, key: &LineKey) -> Option<(maison_core::CartLineId, u32)> {
        self.read_state()
            .find(key)
            .map(|l| (l.remote_id, l.quantity))
    }
}

impl<G: CartGateway> CartManager<G> {
    /// Add a product to the cart.
    ///
    /// For products sold in variants, the color/size selection must resolve
    /// to an exact variant; enforcement lives here, not at call sites. If a
    /// line with the same identity key already exists, its quantity is
    /// incremented on the server instead of creating a duplicate. A zero
    /// `quantity` is treated as 1.
    ///
    /// # Errors
    ///
    /// `NotAuthenticated` when logged out, `VariantRequired` when the
    /// selection does not resolve, `Gateway` on network/server failure.
    #[instrument(skip(self, product), fields(product_id = %product.id))]
    pub async fn add_to_cart(
        &self,
        product: &Product,
        color: Option<&str>,
        size: Option<&str>,
        quantity: u32,
    ) -> Result<()> {
        let token = self.session.require_token()?;
        let quantity = quantity.max(1);

        let key = if product.has_variants() {
            let variant = product
                .resolve_variant(color, size)
                .ok_or(StoreError::VariantRequired(product.id))?;
            LineKey::new(product.id, variant.color.clone(), variant.size.clone())
        } else {
            LineKey::new(
                product.id,
                color.map(str::to_owned),
                size.map(str::to_owned),
            )
        };

        let _guard = self.mutation.lock().await;

        match self.find_line(&key) {
            Some((remote_id, existing)) => {
                debug!(%key, "merging into existing cart line");
                self.gateway
                    .update_item(&token, remote_id, existing + quantity)
                    .await?;
            }
            None => {
                self.gateway
                    .add_item(
                        &token,
                        &NewCartItem {
                            product_id: product.id,
                            color: key.color.clone(),
                            size: key.size.clone(),
                            quantity,
                        },
                    )
                    .await?;
            }
        }

        self.refresh_with(&token).await
    }

    /// Set the quantity of an existing line. A quantity of zero removes the
    /// line.
    ///
    /// # Errors
    ///
    /// `NotAuthenticated` when logged out, `LineNotFound` if no line
    /// matches the key, `Gateway` on network/server failure.
    #[instrument(skip(self), fields(product_id = %product_id))]
    pub async fn update_quantity(
        &self,
        product_id: ProductId,
        size: Option<&str>,
        color: Option<&str>,
        new_quantity: u32,
    ) -> Result<()> {
        if new_quantity == 0 {
            return self.remove_from_cart(product_id, size, color).await;
        }

        let token = self.session.require_token()?;
        let key = LineKey::new(
            product_id,
            color.map(str::to_owned),
            size.map(str::to_owned),
        );

        let _guard = self.mutation.lock().await;

        let (remote_id, _) = self
            .find_line(&key)
            .ok_or(StoreError::LineNotFound(key))?;

        self.gateway
            .update_item(&token, remote_id, new_quantity)
            .await?;
        self.refresh_with(&token).await
    }

    /// Remove a line from the cart.
    ///
    /// # Errors
    ///
    /// `NotAuthenticated` when logged out, `LineNotFound` if no line
    /// matches the key, `Gateway` on network/server failure.
    #[instrument(skip(self), fields(product_id = %product_id))]
    pub async fn remove_from_cart(
        &self,
        product_id: ProductId,
        size: Option<&str>,
        color: Option<&str>,
    ) -> Result<()> {
        let token = self.session.require_token()?;
        let key = LineKey::new(
            product_id,
            color.map(str::to_owned),
            size.map(str::to_owned),
        );

        let _guard = self.mutation.lock().await;

        let (remote_id, _) = self
            .find_line(&key)
            .ok_or(StoreError::LineNotFound(key))?;

        self.gateway.remove_item(&token, remote_id).await?;
        self.refresh_with(&token).await
    }

    /// Empty the cart on the server, then reset local state directly (no
    /// refetch needed for an empty cart).
    ///
    /// # Errors
    ///
    /// `NotAuthenticated` when logged out, `Gateway` on network/server
    /// failure.
    #[instrument(skip(self))]
    pub async fn clear_cart(&self) -> Result<()> {
        let token = self.session.require_token()?;
        let _guard = self.mutation.lock().await;

        self.gateway.clear_cart(&token).await?;
        self.clear_local();
        Ok(())
    }

    /// Authoritative resync: replace the whole local cart with the server's
    /// view. All mutating operations end here.
    ///
    /// # Errors
    ///
    /// `NotAuthenticated` when logged out, `Gateway` on network/server
    /// failure. On failure the prior local state is left intact.
    #[instrument(skip(self))]
    pub async fn refresh(&self) -> Result<()> {
        let token = self.session.require_token()?;
        let _guard = self.mutation.lock().await;
        self.refresh_with(&token).await
    }

    async fn refresh_with(&self, token: &SecretString) -> Result<()> {
        let raw = self.gateway.fetch_cart(token).await?;
        // A logout may have landed while the fetch was in flight; adopting
        // the response now would resurrect state the flush just cleared.
        if !self.session.is_authenticated() {
            debug!("session ended during refresh, discarding fetched cart");
            return Ok(());
        }
        let cart = convert_cart(raw, &self.media_base);
        debug!(lines = cart.lines().len(), count = cart.item_count(), "cart refreshed");
        self.replace(cart);
        Ok(())
    }
}
