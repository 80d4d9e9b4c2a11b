//! Favorites manager: the favorited-product set and the toggle protocol.
//!
//! Unlike the cart, favorites are updated optimistically: toggling is a
//! binary, commutative operation with low conflict risk, so the local ID
//! set changes before the server confirms, and the confirmatory refetch
//! follows. A failed gateway call rolls the optimistic change back, so a
//! failed operation never leaves the set partially mutated.

use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard};

use secrecy::SecretString;
use tracing::{debug, instrument};
use url::Url;

use maison_core::ProductId;

use crate::error::Result;
use crate::gateway::conversions::convert_favorites;
use crate::gateway::FavoritesGateway;
use crate::session::SessionStore;
use crate::types::FavoriteSet;

/// Owns the local favorites state and the toggle protocol against the
/// backend.
pub struct FavoritesManager<G> {
    gateway: Arc<G>,
    session: Arc<SessionStore<G>>,
    media_base: Url,
    state: RwLock<FavoriteSet>,
    // Serializes mutations; held across the gateway call and refetch.
    mutation: tokio::sync::Mutex<()>,
}

impl<G> FavoritesManager<G> {
    pub(crate) fn new(gateway: Arc<G>, session: Arc<SessionStore<G>>, media_base: Url) -> Self {
        Self {
            gateway,
            session,
            media_base,
            state: RwLock::new(FavoriteSet::default()),
            mutation: tokio::sync::Mutex::new(()),
        }
    }

    fn read_state(&self) -> RwLockReadGuard<'_, FavoriteSet> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn with_state<R>(&self, f: impl FnOnce(&mut FavoriteSet) -> R) -> R {
        let mut guard = self.state.write().unwrap_or_else(PoisonError::into_inner);
        f(&mut guard)
    }

    /// Whether the product is favorited. Pure, no network call.
    ///
    /// The local set is the single source of truth for this query.
    #[must_use]
    pub fn is_favorite(&self, product_id: ProductId) -> bool {
        self.read_state().contains(product_id)
    }

    /// Snapshot of the current favorites. Pure, no network call.
    #[must_use]
    pub fn snapshot(&self) -> FavoriteSet {
        self.read_state().clone()
    }

    /// Flush local state without a network call. Used on logout.
    pub(crate) fn clear_local(&self) {
        self.with_state(|s| *s = FavoriteSet::default());
    }
}

impl<G: FavoritesGateway> FavoritesManager<G> {
    /// Authoritative resync: replace the local set and records with the
    /// server's view.
    ///
    /// # Errors
    ///
    /// `NotAuthenticated` when logged out, `Gateway` on network/server
    /// failure. On failure the prior local state is left intact.
    #[instrument(skip(self))]
    pub async fn fetch_favorites(&self) -> Result<()> {
        let token = self.session.require_token()?;
        let _guard = self.mutation.lock().await;
        self.fetch_with(&token).await
    }

    /// Favorite a product.
    ///
    /// # Errors
    ///
    /// `NotAuthenticated` when logged out, `Gateway` on network/server
    /// failure (the optimistic update is rolled back).
    #[instrument(skip(self), fields(product_id = %product_id))]
    pub async fn add_to_favorites(&self, product_id: ProductId) -> Result<()> {
        let token = self.session.require_token()?;
        let _guard = self.mutation.lock().await;
        self.add_locked(&token, product_id).await
    }

    /// Unfavorite a product.
    ///
    /// # Errors
    ///
    /// `NotAuthenticated` when logged out, `Gateway` on network/server
    /// failure (the optimistic update is rolled back).
    #[instrument(skip(self), fields(product_id = %product_id))]
    pub async fn remove_from_favorites(&self, product_id: ProductId) -> Result<()> {
        let token = self.session.require_token()?;
        let _guard = self.mutation.lock().await;
        self.remove_locked(&token, product_id).await
    }

    /// Toggle a product's favorite status based on current membership.
    /// The single entry point used by the UI.
    ///
    /// Membership is read under the mutation lock, so overlapping toggles
    /// observe each other's outcome: two rapid toggles settle as
    /// add-then-remove, not two adds.
    ///
    /// # Errors
    ///
    /// Same as [`Self::add_to_favorites`] / [`Self::remove_from_favorites`].
    #[instrument(skip(self), fields(product_id = %product_id))]
    pub async fn toggle_favorite(&self, product_id: ProductId) -> Result<()> {
        let token = self.session.require_token()?;
        let _guard = self.mutation.lock().await;

        if self.read_state().contains(product_id) {
            self.remove_locked(&token, product_id).await
        } else {
            self.add_locked(&token, product_id).await
        }
    }

    async fn add_locked(&self, token: &SecretString, product_id: ProductId) -> Result<()> {
        let inserted = self.with_state(|s| s.mark(product_id));

        if let Err(e) = self.gateway.add_favorite(token, product_id).await {
            if inserted {
                self.with_state(|s| s.unmark(product_id));
            }
            return Err(e.into());
        }

        self.fetch_with(token).await
    }

    async fn remove_locked(&self, token: &SecretString, product_id: ProductId) -> Result<()> {
        let removed = self.with_state(|s| s.unmark(product_id));

        if let Err(e) = self.gateway.remove_favorite(token, product_id).await {
            if removed {
                self.with_state(|s| s.mark(product_id));
            }
            return Err(e.into());
        }

        self.fetch_with(token).await
    }

    async fn fetch_with(&self, token: &SecretString) -> Result<()> {
        let raw = self.gateway.fetch_favorites(token).await?;
        // A logout may have landed while the fetch was in flight; adopting
        // the response now would resurrect state the flush just cleared.
        if !self.session.is_authenticated() {
            debug!("session ended during refetch, discarding fetched favorites");
            return Ok(());
        }
        let set = convert_favorites(raw, &self.media_base);
        debug!(count = set.len(), "favorites refreshed");
        self.with_state(|s| *s = set);
        Ok(())
    }
}
