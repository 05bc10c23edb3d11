use std::sync::Arc;

use anyhow::Context;

use storefront_alerts::{LowStockPolicy, StockAlert};
use storefront_core::{OrderId, ProductId, StockAlertId, UserId};
use storefront_infra::{
    CartAck, CartError, CartService, CartView, OrderQueries, OrderWorkflow, StockAlertService,
    config::{InfraConfig, StoreConfig},
    seed::seed_demo_catalog,
    store::{CatalogStore, InMemoryStore, OrderReadStore, PostgresStore, StockAlertStore, Store, StoreError},
};
use storefront_orders::{Order, OrderError, Page};

/// Every service the routes need, wired to one store.
pub struct StorefrontServices<S>
where
    S: Store + CatalogStore + OrderReadStore + StockAlertStore + 'static,
{
    pub store: Arc<S>,
    pub workflow: OrderWorkflow<S>,
    pub carts: CartService<S>,
    pub orders: OrderQueries<S>,
    pub alerts: StockAlertService<S>,
}

impl<S> StorefrontServices<S>
where
    S: Store + CatalogStore + OrderReadStore + StockAlertStore + 'static,
{
    pub fn new(store: Arc<S>, policy: LowStockPolicy) -> Self {
        Self {
            workflow: OrderWorkflow::new(store.clone(), policy),
            carts: CartService::new(store.clone()),
            orders: OrderQueries::new(store.clone()),
            alerts: StockAlertService::new(store.clone()),
            store,
        }
    }
}

pub enum AppServices {
    InMemory(StorefrontServices<InMemoryStore>),
    Persistent(StorefrontServices<PostgresStore>),
}

macro_rules! with_services {
    ($self:expr, $s:ident => $body:expr) => {
        match $self {
            AppServices::InMemory($s) => $body,
            AppServices::Persistent($s) => $body,
        }
    };
}

impl AppServices {
    /// In-memory wiring over an existing store (dev/test).
    pub fn in_memory(store: InMemoryStore, policy: LowStockPolicy) -> Self {
        AppServices::InMemory(StorefrontServices::new(Arc::new(store), policy))
    }

    pub fn backend(&self) -> &'static str {
        match self {
            AppServices::InMemory(_) => "in_memory",
            AppServices::Persistent(_) => "postgres",
        }
    }

    pub async fn create_order(&self, user_id: &UserId) -> Result<OrderId, OrderError> {
        with_services!(self, s => s.workflow.create_order(user_id).await)
    }

    pub async fn add_cart_item(&self, user_id: &UserId, product_id: i64, quantity: i32) -> Result<CartAck, CartError> {
        with_services!(self, s => s.carts.add_item(user_id, product_id, quantity).await)
    }

    pub async fn decrease_cart_item(
        &self,
        user_id: &UserId,
        product_id: ProductId,
        amount: i32,
    ) -> Result<CartAck, CartError> {
        with_services!(self, s => s.carts.decrease_item(user_id, product_id, amount).await)
    }

    pub async fn get_cart(&self, user_id: &UserId) -> Result<CartView, CartError> {
        with_services!(self, s => s.carts.get_cart(user_id).await)
    }

    pub async fn clear_cart(&self, user_id: &UserId) -> Result<CartAck, CartError> {
        with_services!(self, s => s.carts.clear_cart(user_id).await)
    }

    pub async fn get_order(&self, order_id: OrderId) -> Result<Option<Order>, OrderError> {
        with_services!(self, s => s.orders.get_order(order_id).await)
    }

    pub async fn orders_by_user(
        &self,
        user_id: &UserId,
        page: Option<u32>,
        page_size: Option<u32>,
    ) -> Result<Page<Order>, OrderError> {
        with_services!(self, s => s.orders.orders_by_user(user_id, page, page_size).await)
    }

    pub async fn all_orders(&self) -> Result<Vec<Order>, OrderError> {
        with_services!(self, s => s.orders.all_orders().await)
    }

    pub async fn list_alerts(&self) -> Result<Vec<StockAlert>, StoreError> {
        with_services!(self, s => s.alerts.list().await)
    }

    pub async fn unacknowledged_alerts(&self) -> Result<u64, StoreError> {
        with_services!(self, s => s.alerts.unacknowledged_count().await)
    }

    pub async fn get_alert(&self, alert_id: StockAlertId) -> Result<Option<StockAlert>, StoreError> {
        with_services!(self, s => s.alerts.get(alert_id).await)
    }

    pub async fn acknowledge_alert(&self, alert_id: StockAlertId) -> Result<bool, StoreError> {
        with_services!(self, s => s.alerts.acknowledge(alert_id).await)
    }

    pub async fn delete_alert(&self, alert_id: StockAlertId) -> Result<bool, StoreError> {
        with_services!(self, s => s.alerts.delete(alert_id).await)
    }
}

pub async fn build_services(config: &InfraConfig) -> anyhow::Result<AppServices> {
    let policy = config.workflow.low_stock_policy();

    let services = match &config.store {
        StoreConfig::InMemory => {
            tracing::info!("using in-memory stores");
            AppServices::in_memory(InMemoryStore::new(), policy)
        }
        StoreConfig::Postgres {
            database_url,
            max_connections,
        } => {
            let store = PostgresStore::connect(database_url, *max_connections)
                .await
                .context("failed to connect to DATABASE_URL")?;
            store.migrate().await.context("failed to apply storefront schema")?;
            tracing::info!(max_connections, "using postgres stores");
            AppServices::Persistent(StorefrontServices::new(Arc::new(store), policy))
        }
    };

    if config.seed_catalog {
        with_services!(&services, s => seed_demo_catalog(s.store.as_ref()).await)
            .context("failed to seed demo catalog")?;
    }

    Ok(services)
}
