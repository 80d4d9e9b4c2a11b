//! Shared test support: an in-memory gateway standing in for the Maison
//! REST backend, plus fixtures and invariant helpers.

#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::Utc;
use rust_decimal::Decimal;
use secrecy::SecretString;
use tokio::sync::Notify;
use url::Url;

use maison_client::gateway::wire::{AuthPayload, NewCartItem, RemoteCartLine, RemoteFavorite};
use maison_client::gateway::{
    AuthGateway, CartGateway, CatalogGateway, FavoritesGateway, GatewayError,
};
use maison_client::{
    Cart, ClientConfig, Product, Storefront, TokenStore, User, Variant,
};
use maison_core::{
    CartLineId, CurrencyCode, Email, FavoriteId, Price, ProductId, UserId, UserRole, VariantId,
};

// =============================================================================
// FakeGateway
// =============================================================================

struct Account {
    email: String,
    password: String,
    user: User,
}

#[derive(Default)]
struct FakeState {
    accounts: Vec<Account>,
    products: HashMap<ProductId, Product>,
    cart: Vec<RemoteCartLine>,
    favorites: Vec<RemoteFavorite>,
    next_user_id: i64,
    next_line_id: i64,
    next_favorite_id: i64,
    fail_next: bool,
    expired: bool,
    hold: Option<(Arc<Notify>, Arc<Notify>)>,
}

/// Handle to a request parked by [`FakeGateway::hold_next_fetch`]. Lets a
/// test interleave other operations while a fetch is in flight.
pub struct FetchHold {
    entered: Arc<Notify>,
    release: Arc<Notify>,
}

impl FetchHold {
    /// Wait until the held request has arrived at the gateway.
    pub async fn entered(&self) {
        self.entered.notified().await;
    }

    /// Let the held request proceed.
    pub fn release(&self) {
        self.release.notify_one();
    }
}

/// In-memory stand-in for the backend. Cloning shares the state, so tests
/// keep a handle after moving a clone into the [`Storefront`].
#[derive(Clone, Default)]
pub struct FakeGateway {
    state: Arc<Mutex<FakeState>>,
}

impl FakeGateway {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, FakeState> {
        self.state.lock().expect("fake gateway lock")
    }

    /// Register an account directly on the server side.
    pub fn seed_account(&self, email: &str, password: &str) -> User {
        let mut state = self.lock();
        state.next_user_id += 1;
        let user = User {
            id: UserId::new(state.next_user_id),
            email: Email::parse(email).expect("valid test email"),
            name: "Test Shopper".to_string(),
            role: UserRole::Customer,
        };
        state.accounts.push(Account {
            email: email.to_string(),
            password: password.to_string(),
            user: user.clone(),
        });
        user
    }

    /// Make a product known to the server so cart additions can be priced.
    pub fn seed_product(&self, product: &Product) {
        self.lock().products.insert(product.id, product.clone());
    }

    /// Put a line in the server-side cart, as if added in a prior session.
    pub fn seed_cart_line(
        &self,
        product: &Product,
        color: Option<&str>,
        size: Option<&str>,
        quantity: i64,
    ) {
        let mut state = self.lock();
        state.next_line_id += 1;
        let line = RemoteCartLine {
            id: CartLineId::new(state.next_line_id),
            product_id: product.id,
            title: product.title.clone(),
            color: color.map(str::to_owned),
            size: size.map(str::to_owned),
            quantity,
            price: product.price.amount,
            sale_price: product.sale_price.map(|p| p.amount),
            currency: product.price.currency_code,
            image: product.image_url.clone(),
        };
        state.cart.push(line);
    }

    /// Put a favorite record on the server, as if saved in a prior session.
    pub fn seed_favorite(&self, product: &Product) {
        let mut state = self.lock();
        state.next_favorite_id += 1;
        let record = RemoteFavorite {
            id: FavoriteId::new(state.next_favorite_id),
            product_id: product.id,
            title: product.title.clone(),
            image: product.image_url.clone(),
            created_at: Utc::now(),
        };
        state.favorites.push(record);
    }

    /// Park the next cart or favorites fetch until the returned handle is
    /// released.
    pub fn hold_next_fetch(&self) -> FetchHold {
        let entered = Arc::new(Notify::new());
        let release = Arc::new(Notify::new());
        self.lock().hold = Some((Arc::clone(&entered), Arc::clone(&release)));
        FetchHold { entered, release }
    }

    async fn pause_if_held(&self) {
        let held = self.lock().hold.take();
        if let Some((entered, release)) = held {
            entered.notify_one();
            release.notified().await;
        }
    }

    /// Fail the next gateway call with a 500.
    pub fn fail_next_call(&self) {
        self.lock().fail_next = true;
    }

    /// Reject every subsequent authenticated call with a 401.
    pub fn expire_tokens(&self) {
        self.lock().expired = true;
    }

    /// Number of lines in the server-side cart.
    pub fn server_cart_len(&self) -> usize {
        self.lock().cart.len()
    }

    /// Number of server-side favorite records.
    pub fn server_favorites_len(&self) -> usize {
        self.lock().favorites.len()
    }
}

fn gate(state: &mut FakeState) -> Result<(), GatewayError> {
    if state.expired {
        return Err(GatewayError::Unauthorized);
    }
    if state.fail_next {
        state.fail_next = false;
        return Err(GatewayError::Status {
            status: 500,
            body: "injected failure".to_string(),
        });
    }
    Ok(())
}

impl AuthGateway for FakeGateway {
    async fn login(&self, email: &str, password: &str) -> Result<AuthPayload, GatewayError> {
        let mut state = self.lock();
        gate(&mut state)?;
        state
            .accounts
            .iter()
            .find(|a| a.email == email && a.password == password)
            .map(|a| AuthPayload {
                access_token: format!("token-{}", a.user.id),
                user: a.user.clone(),
            })
            .ok_or(GatewayError::Unauthorized)
    }

    async fn register(
        &self,
        email: &str,
        password: &str,
        name: &str,
    ) -> Result<AuthPayload, GatewayError> {
        let mut state = self.lock();
        gate(&mut state)?;
        if state.accounts.iter().any(|a| a.email == email) {
            return Err(GatewayError::Status {
                status: 409,
                body: "email already registered".to_string(),
            });
        }
        state.next_user_id += 1;
        let user = User {
            id: UserId::new(state.next_user_id),
            email: Email::parse(email).expect("valid test email"),
            name: name.to_string(),
            role: UserRole::Customer,
        };
        state.accounts.push(Account {
            email: email.to_string(),
            password: password.to_string(),
            user: user.clone(),
        });
        Ok(AuthPayload {
            access_token: format!("token-{}", user.id),
            user,
        })
    }
}

impl CatalogGateway for FakeGateway {
    async fn fetch_product(&self, product_id: ProductId) -> Result<Product, GatewayError> {
        let mut state = self.lock();
        gate(&mut state)?;
        state.products.get(&product_id).cloned().ok_or_else(|| {
            GatewayError::Status {
                status: 404,
                body: format!("no product {product_id}"),
            }
        })
    }
}

impl CartGateway for FakeGateway {
    async fn fetch_cart(
        &self,
        _token: &SecretString,
    ) -> Result<Vec<RemoteCartLine>, GatewayError> {
        self.pause_if_held().await;
        let mut state = self.lock();
        gate(&mut state)?;
        Ok(state.cart.clone())
    }

    async fn add_item(
        &self,
        _token: &SecretString,
        item: &NewCartItem,
    ) -> Result<(), GatewayError> {
        let mut state = self.lock();
        gate(&mut state)?;
        let Some(product) = state.products.get(&item.product_id).cloned() else {
            return Err(GatewayError::Status {
                status: 404,
                body: format!("no product {}", item.product_id),
            });
        };
        state.next_line_id += 1;
        let line = RemoteCartLine {
            id: CartLineId::new(state.next_line_id),
            product_id: product.id,
            title: product.title,
            color: item.color.clone(),
            size: item.size.clone(),
            quantity: i64::from(item.quantity),
            price: product.price.amount,
            sale_price: product.sale_price.map(|p| p.amount),
            currency: product.price.currency_code,
            image: product.image_url,
        };
        state.cart.push(line);
        Ok(())
    }

    async fn update_item(
        &self,
        _token: &SecretString,
        line_id: CartLineId,
        quantity: u32,
    ) -> Result<(), GatewayError> {
        let mut state = self.lock();
        gate(&mut state)?;
        let line = state
            .cart
            .iter_mut()
            .find(|l| l.id == line_id)
            .ok_or(GatewayError::Status {
                status: 404,
                body: "no such cart line".to_string(),
            })?;
        line.quantity = i64::from(quantity);
        Ok(())
    }

    async fn remove_item(
        &self,
        _token: &SecretString,
        line_id: CartLineId,
    ) -> Result<(), GatewayError> {
        let mut state = self.lock();
        gate(&mut state)?;
        let before = state.cart.len();
        state.cart.retain(|l| l.id != line_id);
        if state.cart.len() == before {
            return Err(GatewayError::Status {
                status: 404,
                body: "no such cart line".to_string(),
            });
        }
        Ok(())
    }

    async fn clear_cart(&self, _token: &SecretString) -> Result<(), GatewayError> {
        let mut state = self.lock();
        gate(&mut state)?;
        state.cart.clear();
        Ok(())
    }
}

impl FavoritesGateway for FakeGateway {
    async fn fetch_favorites(
        &self,
        _token: &SecretString,
    ) -> Result<Vec<RemoteFavorite>, GatewayError> {
        self.pause_if_held().await;
        let mut state = self.lock();
        gate(&mut state)?;
        Ok(state.favorites.clone())
    }

    async fn add_favorite(
        &self,
        _token: &SecretString,
        product_id: ProductId,
    ) -> Result<(), GatewayError> {
        let mut state = self.lock();
        gate(&mut state)?;
        if state.favorites.iter().any(|f| f.product_id == product_id) {
            return Ok(());
        }
        let title = state
            .products
            .get(&product_id)
            .map_or_else(|| format!("Product {product_id}"), |p| p.title.clone());
        state.next_favorite_id += 1;
        let record = RemoteFavorite {
            id: FavoriteId::new(state.next_favorite_id),
            product_id,
            title,
            image: None,
            created_at: Utc::now(),
        };
        state.favorites.push(record);
        Ok(())
    }

    async fn remove_favorite(
        &self,
        _token: &SecretString,
        product_id: ProductId,
    ) -> Result<(), GatewayError> {
        let mut state = self.lock();
        gate(&mut state)?;
        state.favorites.retain(|f| f.product_id != product_id);
        Ok(())
    }
}

// =============================================================================
// Fixtures
// =============================================================================

pub fn usd(cents: i64) -> Price {
    Price::new(Decimal::new(cents, 2), CurrencyCode::USD)
}

/// A shirt sold in color/size variants at $19.99.
pub fn shirt() -> Product {
    Product {
        id: ProductId::new(1),
        title: "Linen Shirt".to_string(),
        price: usd(1999),
        sale_price: None,
        image_url: Some("/img/shirt.jpg".to_string()),
        variants: vec![
            variant(11, Some("Red"), Some("M")),
            variant(12, Some("Blue"), Some("L")),
            variant(13, Some("Blue"), Some("M")),
        ],
    }
}

/// A scarf with no variants, on sale at $4.00 (list $5.00).
pub fn scarf() -> Product {
    Product {
        id: ProductId::new(2),
        title: "Silk Scarf".to_string(),
        price: usd(500),
        sale_price: Some(usd(400)),
        image_url: None,
        variants: vec![],
    }
}

pub fn variant(id: i64, color: Option<&str>, size: Option<&str>) -> Variant {
    Variant {
        id: VariantId::new(id),
        color: color.map(str::to_owned),
        size: size.map(str::to_owned),
        price: None,
        available: true,
    }
}

/// Route tracing output through the test harness. Safe to call from every
/// test; only the first call installs the subscriber.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub fn test_config(dir: &Path) -> ClientConfig {
    ClientConfig::new(
        Url::parse("https://api.maison.test/v1/").expect("valid test url"),
        Url::parse("https://media.maison.test/").expect("valid test url"),
        dir.join("credentials.json"),
        5,
    )
}

/// A storefront over the fake gateway, with credentials persisted into the
/// given temp dir. Returns a handle to the shared fake state as well.
pub fn storefront(dir: &Path) -> (Storefront<FakeGateway>, FakeGateway) {
    init_tracing();
    let fake = FakeGateway::new();
    let config = test_config(dir);
    let tokens: Box<dyn TokenStore> =
        Box::new(maison_client::FileTokenStore::new(config.credential_path.clone()));
    let front = Storefront::new(&config, fake.clone(), tokens);
    (front, fake)
}

/// A storefront with one seeded account, already logged in.
pub async fn logged_in_storefront(dir: &Path) -> (Storefront<FakeGateway>, FakeGateway) {
    let (front, fake) = storefront(dir);
    fake.seed_account("shopper@example.com", "plaisir-2024");
    front
        .login("shopper@example.com", "plaisir-2024")
        .await
        .expect("login");
    (front, fake)
}

// =============================================================================
// Invariant Helpers
// =============================================================================

/// Check the cart invariants: no line with quantity below one, no two lines
/// sharing an identity key, and the total equal to the sum of line totals.
pub fn assert_cart_invariants(cart: &Cart) {
    let mut seen = HashSet::new();
    let mut expected_total = Decimal::ZERO;
    for line in cart.lines() {
        assert!(line.quantity >= 1, "cart holds line with zero quantity");
        assert!(
            seen.insert(line.key.clone()),
            "cart holds duplicate identity key {}",
            line.key
        );
        expected_total += line.unit_price.amount * Decimal::from(line.quantity);
    }
    assert_eq!(cart.total().amount, expected_total);
}
