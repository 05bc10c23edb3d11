use std::collections::BTreeMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;

use storefront_alerts::{NewStockAlert, StockAlert};
use storefront_cart::{CartItem, ShoppingCart};
use storefront_catalog::{Product, ProductRecord};
use storefront_core::{CartId, OrderId, ProductId, RowVersion, StockAlertId, UserId, Versioned};
use storefront_orders::{CheckoutLine, NewOrder, Order, Page, PageRequest};

use super::{
    CartSnapshot, CatalogStore, OrderReadStore, StockAlertStore, Store, StoreError, UnitOfWork,
};

#[derive(Debug, Clone, PartialEq, Eq)]
struct StoredCart {
    id: CartId,
    items: Vec<CartItem>,
    row_version: RowVersion,
}

#[derive(Debug, Default)]
struct State {
    products: BTreeMap<ProductId, ProductRecord>,
    carts: BTreeMap<UserId, StoredCart>,
    orders: BTreeMap<OrderId, Order>,
    alerts: BTreeMap<StockAlertId, StockAlert>,
}

/// Key sequences. Like database sequences they are not rolled back, so an
/// aborted unit of work leaves a gap.
#[derive(Debug)]
struct Sequences {
    cart: AtomicI64,
    order: AtomicI64,
    alert: AtomicI64,
}

impl Default for Sequences {
    fn default() -> Self {
        Self {
            cart: AtomicI64::new(1),
            order: AtomicI64::new(1),
            alert: AtomicI64::new(1),
        }
    }
}

fn next_key(seq: &AtomicI64) -> i64 {
    seq.fetch_add(1, Ordering::SeqCst)
}

/// In-memory storefront store.
///
/// Intended for tests/dev. Clones share the same state, so a clone can be
/// handed to the catalog seeder and the services alike.
#[derive(Debug, Clone, Default)]
pub struct InMemoryStore {
    state: Arc<RwLock<State>>,
    ids: Arc<Sequences>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, State>, StoreError> {
        self.state
            .read()
            .map_err(|_| StoreError::Backend("lock poisoned".to_string()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, State>, StoreError> {
        self.state
            .write()
            .map_err(|_| StoreError::Backend("lock poisoned".to_string()))
    }
}

fn hydrate(record: &ProductRecord) -> Result<Product, StoreError> {
    Product::from_record(record.clone()).map_err(|e| StoreError::Corrupt(e.to_string()))
}

#[derive(Debug)]
struct StagedProduct {
    record: ProductRecord,
    expected: RowVersion,
}

#[derive(Debug)]
struct StagedCart {
    user_id: UserId,
    stored: StoredCart,
    /// `None` when the cart is inserted by this unit of work.
    expected: Option<RowVersion>,
}

/// Unit of work over [`InMemoryStore`].
///
/// Writes are staged and become visible to this unit of work immediately.
/// Other units of work see them only after `commit`, which re-checks every
/// row version under the write lock and applies all staged writes or none.
#[derive(Debug)]
pub struct InMemoryUnitOfWork {
    store: InMemoryStore,
    products: Vec<StagedProduct>,
    cart: Option<StagedCart>,
    orders: Vec<Order>,
    alerts: Vec<StockAlert>,
}

impl InMemoryUnitOfWork {
    fn staged_product(&self, product_id: ProductId) -> Option<&StagedProduct> {
        self.products.iter().find(|p| p.record.id == product_id)
    }

    fn current_product(&self, state: &State, product_id: ProductId) -> Result<Option<Product>, StoreError> {
        match self.staged_product(product_id) {
            Some(staged) => hydrate(&staged.record).map(Some),
            None => state.products.get(&product_id).map(hydrate).transpose(),
        }
    }

    fn current_cart(&self, state: &State, user_id: &UserId) -> Option<StoredCart> {
        match &self.cart {
            Some(staged) if &staged.user_id == user_id => Some(staged.stored.clone()),
            _ => state.carts.get(user_id).cloned(),
        }
    }
}

#[async_trait]
impl UnitOfWork for InMemoryUnitOfWork {
    async fn load_cart_with_items(&mut self, user_id: &UserId) -> Result<Option<CartSnapshot>, StoreError> {
        let state = self.store.read()?;
        let Some(stored) = self.current_cart(&state, user_id) else {
            return Ok(None);
        };

        let mut lines = Vec::with_capacity(stored.items.len());
        for item in &stored.items {
            lines.push(CheckoutLine {
                item: *item,
                product: self.current_product(&state, item.product_id)?,
            });
        }

        let cart = ShoppingCart::restore(stored.id, user_id.clone(), stored.items, stored.row_version);
        Ok(Some(CartSnapshot { cart, lines }))
    }

    async fn load_product(&mut self, product_id: ProductId) -> Result<Option<Product>, StoreError> {
        let state = self.store.read()?;
        self.current_product(&state, product_id)
    }

    async fn update_product(&mut self, product: &Product) -> Result<RowVersion, StoreError> {
        let product_id = product.id_typed();

        let (actual, original) = match self.staged_product(product_id) {
            Some(staged) => (staged.record.row_version, staged.expected),
            None => {
                let state = self.store.read()?;
                let stored = state
                    .products
                    .get(&product_id)
                    .ok_or(StoreError::ProductConflict { product_id })?;
                (stored.row_version, stored.row_version)
            }
        };
        if product.row_version() != actual {
            return Err(StoreError::ProductConflict { product_id });
        }

        let mut record = product.to_record();
        record.row_version = actual.next();
        let new_version = record.row_version;

        self.products.retain(|p| p.record.id != product_id);
        self.products.push(StagedProduct {
            record,
            expected: original,
        });
        Ok(new_version)
    }

    async fn add_order(&mut self, order: &NewOrder) -> Result<OrderId, StoreError> {
        let id = OrderId::from_raw(next_key(&self.store.ids.order));
        self.orders.push(Order::from_new(id, order.clone()));
        Ok(id)
    }

    async fn save_cart(&mut self, cart: &ShoppingCart) -> Result<ShoppingCart, StoreError> {
        let user_id = cart.user_id().clone();
        let current = {
            let state = self.store.read()?;
            self.current_cart(&state, &user_id)
        };

        let (id, expected, new_version) = match (cart.id(), current) {
            (None, None) => (
                CartId::from_raw(next_key(&self.store.ids.cart)),
                None,
                RowVersion::INITIAL.next(),
            ),
            (None, Some(_)) => return Err(StoreError::CartConflict { user_id }),
            (Some(id), Some(stored)) if stored.id == id && stored.row_version == cart.row_version() => {
                let original = match &self.cart {
                    Some(staged) if staged.user_id == user_id => staged.expected,
                    _ => Some(stored.row_version),
                };
                (id, original, stored.row_version.next())
            }
            (Some(_), _) => return Err(StoreError::CartConflict { user_id }),
        };

        self.cart = Some(StagedCart {
            user_id,
            stored: StoredCart {
                id,
                items: cart.items().to_vec(),
                row_version: new_version,
            },
            expected,
        });
        Ok(cart.clone().persisted(id, new_version))
    }

    async fn add_stock_alert(&mut self, alert: &NewStockAlert) -> Result<StockAlertId, StoreError> {
        let id = StockAlertId::from_raw(next_key(&self.store.ids.alert));
        self.alerts.push(StockAlert::from_new(id, alert.clone()));
        Ok(id)
    }

    async fn commit(self) -> Result<(), StoreError> {
        let mut state = self.store.write()?;

        for staged in &self.products {
            let actual = state.products.get(&staged.record.id).map(|p| p.row_version);
            if actual != Some(staged.expected) {
                return Err(StoreError::ProductConflict {
                    product_id: staged.record.id,
                });
            }
        }
        if let Some(staged) = &self.cart {
            let actual = state.carts.get(&staged.user_id).map(|c| c.row_version);
            if actual != staged.expected {
                return Err(StoreError::CartConflict {
                    user_id: staged.user_id.clone(),
                });
            }
        }

        for staged in self.products {
            state.products.insert(staged.record.id, staged.record);
        }
        if let Some(staged) = self.cart {
            state.carts.insert(staged.user_id, staged.stored);
        }
        for order in self.orders {
            state.orders.insert(order.id_typed(), order);
        }
        for alert in self.alerts {
            state.alerts.insert(alert.id_typed(), alert);
        }
        Ok(())
    }

    async fn rollback(self) -> Result<(), StoreError> {
        Ok(())
    }
}

#[async_trait]
impl Store for InMemoryStore {
    type Tx = InMemoryUnitOfWork;

    async fn begin(&self) -> Result<Self::Tx, StoreError> {
        Ok(InMemoryUnitOfWork {
            store: self.clone(),
            products: Vec::new(),
            cart: None,
            orders: Vec::new(),
            alerts: Vec::new(),
        })
    }
}

#[async_trait]
impl CatalogStore for InMemoryStore {
    async fn get_product(&self, product_id: ProductId) -> Result<Option<Product>, StoreError> {
        let state = self.read()?;
        state.products.get(&product_id).map(hydrate).transpose()
    }

    async fn put_product(&self, product: &Product) -> Result<Product, StoreError> {
        let mut state = self.write()?;
        let mut record = product.to_record();
        record.row_version = state
            .products
            .get(&record.id)
            .map(|p| p.row_version)
            .unwrap_or(RowVersion::INITIAL)
            .next();
        let stored = hydrate(&record)?;
        state.products.insert(record.id, record);
        Ok(stored)
    }
}

fn newest_first(orders: &mut [Order]) {
    orders.sort_by(|a, b| {
        b.order_date()
            .cmp(&a.order_date())
            .then_with(|| b.id_typed().cmp(&a.id_typed()))
    });
}

#[async_trait]
impl OrderReadStore for InMemoryStore {
    async fn get_order(&self, order_id: OrderId) -> Result<Option<Order>, StoreError> {
        Ok(self.read()?.orders.get(&order_id).cloned())
    }

    async fn list_orders_by_user(&self, user_id: &UserId, page: PageRequest) -> Result<Page<Order>, StoreError> {
        let mut orders: Vec<Order> = self
            .read()?
            .orders
            .values()
            .filter(|o| o.user_id() == user_id)
            .cloned()
            .collect();
        newest_first(&mut orders);

        let total_count = orders.len() as u64;
        let skip = usize::try_from(page.offset()).unwrap_or(usize::MAX);
        let take = usize::try_from(page.limit()).unwrap_or(usize::MAX);
        Ok(Page {
            total_count,
            items: orders.into_iter().skip(skip).take(take).collect(),
        })
    }

    async fn list_all_orders(&self) -> Result<Vec<Order>, StoreError> {
        let mut orders: Vec<Order> = self.read()?.orders.values().cloned().collect();
        newest_first(&mut orders);
        Ok(orders)
    }
}

#[async_trait]
impl StockAlertStore for InMemoryStore {
    async fn list_alerts(&self) -> Result<Vec<StockAlert>, StoreError> {
        let mut alerts: Vec<StockAlert> = self.read()?.alerts.values().cloned().collect();
        alerts.sort_by(|a, b| {
            b.triggered_at()
                .cmp(&a.triggered_at())
                .then_with(|| b.id_typed().cmp(&a.id_typed()))
        });
        Ok(alerts)
    }

    async fn get_alert(&self, alert_id: StockAlertId) -> Result<Option<StockAlert>, StoreError> {
        Ok(self.read()?.alerts.get(&alert_id).cloned())
    }

    async fn count_unacknowledged(&self) -> Result<u64, StoreError> {
        Ok(self
            .read()?
            .alerts
            .values()
            .filter(|a| !a.is_acknowledged())
            .count() as u64)
    }

    async fn acknowledge_alert(&self, alert_id: StockAlertId) -> Result<bool, StoreError> {
        let mut state = self.write()?;
        match state.alerts.get_mut(&alert_id) {
            Some(alert) => {
                alert.acknowledge();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete_alert(&self, alert_id: StockAlertId) -> Result<bool, StoreError> {
        Ok(self.write()?.alerts.remove(&alert_id).is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use storefront_core::{CategoryId, Money};

    fn user(raw: &str) -> UserId {
        UserId::parse(raw).unwrap()
    }

    async fn seeded(stock: i32) -> (InMemoryStore, Product) {
        let store = InMemoryStore::new();
        let product = Product::new(
            ProductId::from_raw(1),
            "Lamp",
            Money::new(dec!(25.00)).unwrap(),
            stock,
            CategoryId::from_raw(1),
        )
        .unwrap();
        let stored = store.put_product(&product).await.unwrap();
        (store, stored)
    }

    #[tokio::test]
    async fn put_product_starts_at_version_one_and_bumps() {
        let (store, stored) = seeded(3).await;
        assert_eq!(stored.row_version(), RowVersion::new(1));
        let again = store.put_product(&stored).await.unwrap();
        assert_eq!(again.row_version(), RowVersion::new(2));
    }

    #[tokio::test]
    async fn staged_writes_are_invisible_until_commit() {
        let (store, product) = seeded(10).await;

        let mut uow = store.begin().await.unwrap();
        let mut changed = uow.load_product(product.id_typed()).await.unwrap().unwrap();
        changed.decrement_stock(4).unwrap();
        uow.update_product(&changed).await.unwrap();

        // Read-your-writes inside the unit of work.
        let inside = uow.load_product(product.id_typed()).await.unwrap().unwrap();
        assert_eq!(inside.stock_quantity(), 6);
        assert_eq!(inside.row_version(), RowVersion::new(2));

        let outside = store.get_product(product.id_typed()).await.unwrap().unwrap();
        assert_eq!(outside.stock_quantity(), 10);

        uow.commit().await.unwrap();
        let after = store.get_product(product.id_typed()).await.unwrap().unwrap();
        assert_eq!(after.stock_quantity(), 6);
    }

    #[tokio::test]
    async fn rollback_discards_everything() {
        let (store, product) = seeded(10).await;

        let mut uow = store.begin().await.unwrap();
        let mut changed = product.clone();
        changed.decrement_stock(1).unwrap();
        uow.update_product(&changed).await.unwrap();
        let mut cart = ShoppingCart::new(user("u1"));
        cart.add_item(product.id_typed(), 1).unwrap();
        uow.save_cart(&cart).await.unwrap();
        uow.rollback().await.unwrap();

        assert_eq!(
            store.get_product(product.id_typed()).await.unwrap().unwrap().stock_quantity(),
            10
        );
        let mut check = store.begin().await.unwrap();
        assert!(check.load_cart_with_items(&user("u1")).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn stale_product_version_conflicts_at_update_and_commit() {
        let (store, product) = seeded(10).await;

        let mut first = store.begin().await.unwrap();
        let mut second = store.begin().await.unwrap();

        let mut a = first.load_product(product.id_typed()).await.unwrap().unwrap();
        let mut b = second.load_product(product.id_typed()).await.unwrap().unwrap();
        a.decrement_stock(1).unwrap();
        b.decrement_stock(1).unwrap();

        first.update_product(&a).await.unwrap();
        // Not yet committed: the second update is still against the stored version.
        second.update_product(&b).await.unwrap();

        first.commit().await.unwrap();
        assert_eq!(
            second.commit().await,
            Err(StoreError::ProductConflict {
                product_id: product.id_typed()
            })
        );

        let after = store.get_product(product.id_typed()).await.unwrap().unwrap();
        assert_eq!(after.stock_quantity(), 9);
    }

    #[tokio::test]
    async fn second_new_cart_for_same_user_conflicts() {
        let store = InMemoryStore::new();

        let mut first = store.begin().await.unwrap();
        let mut second = store.begin().await.unwrap();
        first.save_cart(&ShoppingCart::new(user("u1"))).await.unwrap();
        second.save_cart(&ShoppingCart::new(user("u1"))).await.unwrap();

        first.commit().await.unwrap();
        assert!(matches!(
            second.commit().await,
            Err(StoreError::CartConflict { .. })
        ));
    }

    #[tokio::test]
    async fn cart_round_trips_with_lines_in_order_and_missing_products() {
        let (store, product) = seeded(5).await;
        let ghost = ProductId::from_raw(99);

        let mut uow = store.begin().await.unwrap();
        let mut cart = ShoppingCart::new(user("u1"));
        cart.add_item(ghost, 1).unwrap();
        cart.add_item(product.id_typed(), 2).unwrap();
        let saved = uow.save_cart(&cart).await.unwrap();
        assert_eq!(saved.row_version(), RowVersion::new(1));
        uow.commit().await.unwrap();

        let mut uow = store.begin().await.unwrap();
        let snapshot = uow.load_cart_with_items(&user("u1")).await.unwrap().unwrap();
        assert_eq!(snapshot.cart.id(), saved.id());
        assert_eq!(snapshot.lines.len(), 2);
        assert_eq!(snapshot.lines[0].item.product_id, ghost);
        assert!(snapshot.lines[0].product.is_none());
        assert_eq!(
            snapshot.lines[1].product.as_ref().map(|p| p.name()),
            Some("Lamp")
        );
    }

    #[tokio::test]
    async fn alerts_are_listed_newest_first_and_managed() {
        let store = InMemoryStore::new();
        let now = chrono::Utc::now();

        let mut uow = store.begin().await.unwrap();
        let older = uow
            .add_stock_alert(&NewStockAlert {
                product_id: ProductId::from_raw(1),
                product_name: "Lamp".into(),
                quantity_at_trigger: 4,
                triggered_at: now - chrono::Duration::minutes(5),
            })
            .await
            .unwrap();
        let newer = uow
            .add_stock_alert(&NewStockAlert {
                product_id: ProductId::from_raw(2),
                product_name: "Desk".into(),
                quantity_at_trigger: 0,
                triggered_at: now,
            })
            .await
            .unwrap();
        uow.commit().await.unwrap();

        let ids: Vec<_> = store
            .list_alerts()
            .await
            .unwrap()
            .iter()
            .map(|a| a.id_typed())
            .collect();
        assert_eq!(ids, vec![newer, older]);
        assert_eq!(store.count_unacknowledged().await.unwrap(), 2);

        assert!(store.acknowledge_alert(older).await.unwrap());
        assert_eq!(store.count_unacknowledged().await.unwrap(), 1);

        assert!(store.delete_alert(newer).await.unwrap());
        assert!(!store.delete_alert(newer).await.unwrap());
        assert!(!store.acknowledge_alert(newer).await.unwrap());
    }
}
