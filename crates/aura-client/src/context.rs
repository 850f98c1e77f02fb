//! # App Context
//!
//! Everything the UI holds for the lifetime of the app: the API client, the
//! signed-in user, and the persisted cart, favorites and preferences.
//!
//! ## Mutation Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                   Persisted Container Mutation                          │
//! │                                                                         │
//! │  UI handler ──► PersistedCart::add() ──► Cart::add()  (in memory)      │
//! │                                              │                          │
//! │                                        Ok ───┤─── Err ──► return Err    │
//! │                                              ▼           (no write)     │
//! │                                   Persister::save("aura.cart")          │
//! │                                              │                          │
//! │                              storage error ──┴──► warn!, still Ok       │
//! │                                                                         │
//! │  Startup: Persister::load() once per key; missing or corrupt → empty   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The containers are owned by [`AppContext`] and mutated through `&mut`, so
//! no two mutations interleave.

use std::sync::Arc;

use aura_core::{
    Cart, CartItem, CheckoutQuote, CoreError, CoreResult, DailyUsage, FavoriteSet, NewOrder,
    RegisterRequest, Role, Theme, User,
};
use chrono::Utc;
use secrecy::SecretString;
use tracing::{debug, info, warn};

use crate::api::ApiClient;
use crate::config::ClientConfig;
use crate::error::{ClientError, ClientResult};
use crate::storage::{keys, FileStore, KeyValueStore, Persister};
use crate::tokens::TokenStore;
use crate::transport::{HttpTransport, ReqwestTransport};
use crate::ui::Navigator;

// =============================================================================
// Persisted Cart
// =============================================================================

/// A [`Cart`] that writes itself to storage after every change.
#[derive(Debug)]
pub struct PersistedCart {
    cart: Cart,
    persister: Persister,
}

impl PersistedCart {
    /// Rehydrates the cart snapshot.
    pub fn load(persister: Persister) -> Self {
        let items: Vec<CartItem> = persister.load(keys::CART).unwrap_or_default();
        let cart = Cart::from_snapshot(items);
        debug!(lines = cart.len(), "Rehydrated cart");
        PersistedCart { cart, persister }
    }

    pub fn cart(&self) -> &Cart {
        &self.cart
    }

    pub fn add(&mut self, item: CartItem) -> CoreResult<()> {
        self.cart.add(item)?;
        self.persist();
        Ok(())
    }

    /// Removes the line for `id`. Returns false (and writes nothing) if the
    /// id was not in the cart.
    pub fn remove(&mut self, id: &str) -> bool {
        let removed = self.cart.remove(id);
        if removed {
            self.persist();
        }
        removed
    }

    pub fn set_quantity(&mut self, id: &str, quantity: i64) -> CoreResult<()> {
        self.cart.set_quantity(id, quantity)?;
        self.persist();
        Ok(())
    }

    pub fn clear(&mut self) {
        self.cart.clear();
        self.persist();
    }

    fn persist(&self) {
        self.persister.save(keys::CART, self.cart.items());
    }
}

// =============================================================================
// Persisted Favorites
// =============================================================================

#[derive(Debug)]
pub struct PersistedFavorites {
    set: FavoriteSet,
    persister: Persister,
}

impl PersistedFavorites {
    pub fn load(persister: Persister) -> Self {
        let set: FavoriteSet = persister.load(keys::FAVORITES).unwrap_or_default();
        debug!(count = set.len(), "Rehydrated favorites");
        PersistedFavorites { set, persister }
    }

    pub fn favorites(&self) -> &FavoriteSet {
        &self.set
    }

    /// Flips membership and returns whether `id` is now a favorite.
    pub fn toggle(&mut self, id: &str) -> bool {
        let now_favorite = self.set.toggle(id);
        self.persist();
        now_favorite
    }

    pub fn add(&mut self, id: &str) -> bool {
        let added = self.set.add(id);
        if added {
            self.persist();
        }
        added
    }

    pub fn remove(&mut self, id: &str) -> bool {
        let removed = self.set.remove(id);
        if removed {
            self.persist();
        }
        removed
    }

    pub fn clear(&mut self) {
        self.set.clear();
        self.persist();
    }

    fn persist(&self) {
        self.persister.save(keys::FAVORITES, &self.set);
    }
}

// =============================================================================
// Preferences
// =============================================================================

/// Theme and onboarding flag.
#[derive(Debug)]
pub struct Preferences {
    theme: Theme,
    onboarding_seen: bool,
    persister: Persister,
}

impl Preferences {
    pub fn load(persister: Persister) -> Self {
        Preferences {
            theme: persister.load(keys::THEME).unwrap_or_default(),
            onboarding_seen: persister.load(keys::ONBOARDING_SEEN).unwrap_or(false),
            persister,
        }
    }

    pub fn theme(&self) -> Theme {
        self.theme
    }

    pub fn set_theme(&mut self, theme: Theme) {
        self.theme = theme;
        self.persister.save(keys::THEME, &self.theme);
    }

    pub fn onboarding_seen(&self) -> bool {
        self.onboarding_seen
    }

    pub fn mark_onboarding_seen(&mut self) {
        if !self.onboarding_seen {
            self.onboarding_seen = true;
            self.persister.save(keys::ONBOARDING_SEEN, &true);
        }
    }
}

// =============================================================================
// App Context
// =============================================================================

/// Application-wide state, created once at startup.
pub struct AppContext {
    config: ClientConfig,
    api: ApiClient,
    session: Option<User>,
    cart: PersistedCart,
    favorites: PersistedFavorites,
    preferences: Preferences,
    /// Order body for a payment that went through but was never placed.
    pending_order: Option<NewOrder>,
    persister: Persister,
    navigator: Arc<dyn Navigator>,
}

impl AppContext {
    /// Builds the context over explicit storage and transport.
    pub fn new(
        config: ClientConfig,
        store: Arc<dyn KeyValueStore>,
        transport: Arc<dyn HttpTransport>,
        navigator: Arc<dyn Navigator>,
    ) -> Self {
        let persister = Persister::new(store);
        let tokens = Arc::new(TokenStore::load(persister.clone()));
        let api = ApiClient::new(
            transport,
            tokens,
            navigator.clone(),
            config.api.login_route.clone(),
        );

        let pending_order: Option<NewOrder> = persister.load(keys::PENDING_ORDER);
        if let Some(order) = &pending_order {
            warn!(reference = %order.payment_reference, "Found a paid order that was never placed");
        }

        AppContext {
            cart: PersistedCart::load(persister.clone()),
            favorites: PersistedFavorites::load(persister.clone()),
            preferences: Preferences::load(persister.clone()),
            pending_order,
            persister,
            config,
            api,
            session: None,
            navigator,
        }
    }

    /// Builds the production context: file storage in the data directory
    /// and a reqwest transport.
    pub fn open(config: ClientConfig, navigator: Arc<dyn Navigator>) -> ClientResult<Self> {
        config.validate()?;
        let store = FileStore::open(config.data_dir()?)?;
        let transport = ReqwestTransport::new(&config.api)?;
        info!(base_url = %config.api.base_url, data_dir = %store.dir().display(), "Opening app context");
        Ok(Self::new(config, Arc::new(store), Arc::new(transport), navigator))
    }

    // =========================================================================
    // Session
    // =========================================================================

    /// Restores the session from stored tokens, if any.
    ///
    /// An expired session is not an error here; the user simply starts
    /// signed out.
    pub async fn bootstrap(&mut self) -> ClientResult<Option<&User>> {
        if !self.api.tokens().is_signed_in() {
            debug!("No stored session");
            return Ok(None);
        }
        match self.api.me().await {
            Ok(user) => {
                info!(user_id = %user.id, "Restored session");
                self.session = Some(user);
            }
            Err(ClientError::SessionExpired) => self.session = None,
            Err(e) => return Err(e),
        }
        Ok(self.session.as_ref())
    }

    pub async fn login(&mut self, email: &str, password: &SecretString) -> ClientResult<&User> {
        let user = self.api.login(email, password).await?;
        Ok(&*self.session.insert(user))
    }

    pub async fn register(&mut self, request: &RegisterRequest) -> ClientResult<&User> {
        let user = self.api.register(request).await?;
        Ok(&*self.session.insert(user))
    }

    /// Ends the session and wipes per-user state. Local state is always
    /// cleared, even when the server call fails.
    pub async fn logout(&mut self) {
        if let Err(e) = self.api.logout().await {
            warn!(error = %e, "Logout request failed");
        }
        self.session = None;
        self.cart.clear();
        self.favorites.clear();
        if let Some(order) = self.pending_order.take() {
            warn!(reference = %order.payment_reference, "Discarding unplaced order on logout");
            self.persister.forget(keys::PENDING_ORDER);
        }
        info!("Signed out");
    }

    pub fn session(&self) -> Option<&User> {
        self.session.as_ref()
    }

    /// Role used for limits. Signed-out shoppers count as consumers.
    pub fn role(&self) -> Role {
        self.session.as_ref().map(|u| u.role).unwrap_or_default()
    }

    pub fn is_signed_in(&self) -> bool {
        self.session.is_some() && self.api.tokens().is_signed_in()
    }

    // =========================================================================
    // Pricing
    // =========================================================================

    /// Prices the current cart for the current role.
    pub fn quote(&self, usage: DailyUsage) -> CheckoutQuote {
        self.config
            .pricing
            .quote(self.cart.cart().items(), self.role(), usage)
    }

    /// What the user already ordered today (UTC), from their order history.
    pub async fn daily_usage(&self) -> ClientResult<DailyUsage> {
        let orders = self.api.my_orders().await?;
        let usage = self
            .config
            .pricing
            .daily_usage(&orders, Utc::now().date_naive());
        debug!(bottles = usage.bottles, bundles = usage.bundles, "Computed daily usage");
        Ok(usage)
    }

    // =========================================================================
    // Orders
    // =========================================================================

    /// Cancels one of the signed-in user's orders.
    ///
    /// The status is looked up in the user's order history first. Shipped,
    /// delivered and cancelled orders are rejected without calling the
    /// cancel endpoint.
    pub async fn cancel_order(&self, order_id: &str) -> ClientResult<()> {
        let order = self
            .api
            .my_orders()
            .await?
            .into_iter()
            .find(|o| o.id == order_id)
            .ok_or_else(|| CoreError::OrderNotFound(order_id.to_string()))?;

        if !order.status.can_cancel() {
            return Err(CoreError::NotCancellable {
                order_id: order.id,
                status: order.status,
            }
            .into());
        }

        self.api.cancel_order(&order.id).await?;
        info!(order_id, "Order cancelled");
        Ok(())
    }

    /// The paid-but-unplaced order, if checkout stopped between payment and
    /// order creation. Survives restarts.
    pub fn pending_order(&self) -> Option<&NewOrder> {
        self.pending_order.as_ref()
    }

    pub(crate) fn set_pending_order(&mut self, order: Option<NewOrder>) {
        match &order {
            Some(order) => self.persister.save(keys::PENDING_ORDER, order),
            None if self.pending_order.is_some() => self.persister.forget(keys::PENDING_ORDER),
            None => {}
        }
        self.pending_order = order;
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn api(&self) -> &ApiClient {
        &self.api
    }

    pub fn navigator(&self) -> &Arc<dyn Navigator> {
        &self.navigator
    }

    pub fn cart(&self) -> &PersistedCart {
        &self.cart
    }

    pub fn cart_mut(&mut self) -> &mut PersistedCart {
        &mut self.cart
    }

    pub fn favorites(&self) -> &PersistedFavorites {
        &self.favorites
    }

    pub fn favorites_mut(&mut self) -> &mut PersistedFavorites {
        &mut self.favorites
    }

    pub fn preferences(&self) -> &Preferences {
        &self.preferences
    }

    pub fn preferences_mut(&mut self) -> &mut Preferences {
        &mut self.preferences
    }
}

impl std::fmt::Debug for AppContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppContext")
            .field("session", &self.session.as_ref().map(|u| &u.id))
            .field("cart_lines", &self.cart.cart().len())
            .field("favorites", &self.favorites.favorites().len())
            .field("pending_order", &self.pending_order.is_some())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;
    use crate::testing::{RecordingNavigator, ScriptedTransport};
    use aura_core::{CoreError, Money};
    use serde_json::json;

    struct FailingStore;

    impl KeyValueStore for FailingStore {
        fn get(&self, _key: &str) -> ClientResult<Option<String>> {
            Err(ClientError::Storage("disk unavailable".to_string()))
        }

        fn set(&self, _key: &str, _value: &str) -> ClientResult<()> {
            Err(ClientError::Storage("disk full".to_string()))
        }

        fn remove(&self, _key: &str) -> ClientResult<()> {
            Err(ClientError::Storage("disk full".to_string()))
        }
    }

    fn context(store: Arc<dyn KeyValueStore>) -> (AppContext, Arc<ScriptedTransport>) {
        let transport = Arc::new(ScriptedTransport::new());
        let ctx = AppContext::new(
            ClientConfig::default(),
            store,
            transport.clone(),
            Arc::new(RecordingNavigator::default()),
        );
        (ctx, transport)
    }

    fn bottle(id: &str, qty: u32) -> CartItem {
        CartItem::new(id, "Oud Noir", Money::from_major(4_500), qty)
    }

    #[test]
    fn test_each_mutation_writes_once() {
        let store = Arc::new(MemoryStore::new());
        let (mut ctx, _) = context(store.clone());
        assert_eq!(store.write_count(), 0);

        ctx.cart_mut().add(bottle("p1", 1)).unwrap();
        ctx.cart_mut().add(bottle("p1", 2)).unwrap();
        ctx.cart_mut().set_quantity("p1", 5).unwrap();
        assert_eq!(store.write_count(), 3);

        // rejected and no-op mutations do not write
        assert!(ctx.cart_mut().set_quantity("missing", 2).is_err());
        assert!(!ctx.cart_mut().remove("missing"));
        assert_eq!(store.write_count(), 3);

        ctx.favorites_mut().toggle("p1");
        ctx.preferences_mut().set_theme(Theme::Dark);
        ctx.preferences_mut().mark_onboarding_seen();
        ctx.preferences_mut().mark_onboarding_seen();
        assert_eq!(store.write_count(), 6);
    }

    #[test]
    fn test_state_rehydrates_from_storage() {
        let store = Arc::new(MemoryStore::new());
        {
            let (mut ctx, _) = context(store.clone());
            ctx.cart_mut().add(bottle("p1", 2)).unwrap();
            ctx.favorites_mut().toggle("p9");
            ctx.preferences_mut().set_theme(Theme::Light);
        }

        let (ctx, _) = context(store);
        assert_eq!(ctx.cart().cart().count(), 2);
        assert_eq!(ctx.cart().cart().total(), Money::from_major(9_000));
        assert!(ctx.favorites().favorites().contains("p9"));
        assert_eq!(ctx.preferences().theme(), Theme::Light);
    }

    #[test]
    fn test_corrupt_snapshots_start_empty() {
        let store = Arc::new(MemoryStore::new());
        store.set(keys::CART, "{\"oops\":").unwrap();
        store.set(keys::FAVORITES, "42").unwrap();
        store.set(keys::THEME, "\"sepia\"").unwrap();

        let (ctx, _) = context(store);
        assert!(ctx.cart().cart().is_empty());
        assert!(ctx.favorites().favorites().is_empty());
        assert_eq!(ctx.preferences().theme(), Theme::System);
    }

    #[test]
    fn test_failing_store_does_not_fail_mutations() {
        let (mut ctx, _) = context(Arc::new(FailingStore));
        ctx.cart_mut().add(bottle("p1", 1)).unwrap();
        assert!(ctx.favorites_mut().toggle("p1"));
        assert_eq!(ctx.cart().cart().count(), 1);
    }

    #[tokio::test]
    async fn test_quote_uses_session_role() {
        let (mut ctx, transport) = context(Arc::new(MemoryStore::new()));
        ctx.cart_mut().add(bottle("p1", 12)).unwrap();

        let quote = ctx.quote(DailyUsage::default());
        assert!(matches!(
            quote.ensure_allowed(),
            Err(CoreError::LimitExceeded(_))
        ));

        transport.push_json(
            200,
            json!({
                "token": "a1",
                "user": { "_id": "u1", "name": "Ada", "email": "ada@example.com", "role": "distributor" }
            }),
        );
        ctx.login("ada@example.com", &SecretString::from("pw".to_string()))
            .await
            .unwrap();
        assert_eq!(ctx.role(), Role::Distributor);
        assert!(ctx.quote(DailyUsage::default()).ensure_allowed().is_ok());
    }

    #[tokio::test]
    async fn test_logout_resets_per_user_state() {
        let store = Arc::new(MemoryStore::new());
        let (mut ctx, transport) = context(store.clone());
        transport.push_json(
            200,
            json!({
                "accessToken": "a1",
                "refreshToken": "r1",
                "user": { "id": "u1", "name": "Ada", "email": "ada@example.com" }
            }),
        );
        ctx.login("ada@example.com", &SecretString::from("pw".to_string()))
            .await
            .unwrap();
        ctx.cart_mut().add(bottle("p1", 1)).unwrap();
        ctx.favorites_mut().toggle("p1");

        transport.push(503, "");
        ctx.logout().await;

        assert!(ctx.session().is_none());
        assert!(!ctx.is_signed_in());
        assert!(ctx.cart().cart().is_empty());
        assert!(ctx.favorites().favorites().is_empty());
        assert_eq!(store.get(keys::ACCESS_TOKEN).unwrap(), None);
        assert_eq!(store.get(keys::CART).unwrap().as_deref(), Some("[]"));
    }

    #[tokio::test]
    async fn test_bootstrap_without_tokens_skips_network() {
        let (mut ctx, transport) = context(Arc::new(MemoryStore::new()));
        assert!(ctx.bootstrap().await.unwrap().is_none());
        assert!(transport.requests().is_empty());
    }

    fn history() -> serde_json::Value {
        json!([
            { "_id": "o1", "total": 4500, "status": "processing", "createdAt": "2026-10-16T09:30:00Z" },
            { "_id": "o2", "total": 4500, "status": "shipped", "createdAt": "2026-10-15T09:30:00Z" }
        ])
    }

    #[tokio::test]
    async fn test_cancel_order_checks_status_first() {
        let (ctx, transport) = context(Arc::new(MemoryStore::new()));
        transport.push_json(200, history());
        transport.push_json(200, json!({ "message": "Order cancelled" }));

        ctx.cancel_order("o1").await.unwrap();
        let sent = transport.requests();
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[1].path, "/orders/o1/cancel");
    }

    #[tokio::test]
    async fn test_cancel_order_rejects_shipped_and_unknown_locally() {
        let (ctx, transport) = context(Arc::new(MemoryStore::new()));
        transport.push_json(200, history());
        transport.push_json(200, history());

        let err = ctx.cancel_order("o2").await.unwrap_err();
        assert!(matches!(
            err,
            ClientError::Core(CoreError::NotCancellable { status: aura_core::OrderStatus::Shipped, .. })
        ));
        let err = ctx.cancel_order("o9").await.unwrap_err();
        assert!(matches!(err, ClientError::Core(CoreError::OrderNotFound(_))));

        // only the two history lookups went out
        assert!(transport.requests().iter().all(|r| r.path == "/orders/my-orders"));
        assert_eq!(transport.requests().len(), 2);
    }

    #[tokio::test]
    async fn test_daily_usage_counts_todays_orders() {
        let (ctx, transport) = context(Arc::new(MemoryStore::new()));
        let now = Utc::now().to_rfc3339();
        transport.push_json(
            200,
            json!([
                {
                    "_id": "o1",
                    "items": [{ "id": "p1", "name": "Oud Noir", "price": 4500, "quantity": 3 }],
                    "total": 16000,
                    "status": "pending",
                    "createdAt": now
                },
                {
                    "_id": "o2",
                    "items": [{ "id": "p2", "name": "Auraset Trio", "price": 20000, "quantity": 1 }],
                    "total": 23000,
                    "status": "cancelled",
                    "createdAt": now
                }
            ]),
        );

        let usage = ctx.daily_usage().await.unwrap();
        assert_eq!(usage, DailyUsage { bottles: 3, bundles: 0 });
    }
}
