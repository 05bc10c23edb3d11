//! Storage boundary for the storefront.
//!
//! Writes that must be atomic go through a [`UnitOfWork`] obtained from
//! [`Store::begin`]. The unit of work exposes only the capabilities checkout
//! and the cart service need; it is finished explicitly with `commit` or
//! `rollback`. Reads that do not take part in a unit of work go through the
//! narrow query traits below.
//!
//! Every product and cart write is a compare-and-swap on the row version the
//! caller read. A stale version fails with a conflict; nothing is retried.

pub mod in_memory;
pub mod postgres;

use async_trait::async_trait;
use thiserror::Error;

use storefront_alerts::{NewStockAlert, StockAlert};
use storefront_cart::ShoppingCart;
use storefront_catalog::Product;
use storefront_core::{OrderId, ProductId, RowVersion, StockAlertId, UserId};
use storefront_orders::{CheckoutLine, NewOrder, Order, Page, PageRequest};

pub use in_memory::{InMemoryStore, InMemoryUnitOfWork};
pub use postgres::{PostgresStore, PostgresUnitOfWork};

/// Store operation error.
///
/// These are **infrastructure errors** (concurrency, corrupt rows, backend
/// failures) as opposed to domain errors.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("product {product_id} was modified concurrently")]
    ProductConflict { product_id: ProductId },

    #[error("cart of user {user_id} was modified concurrently")]
    CartConflict { user_id: UserId },

    /// A stored row violates a domain invariant and cannot be loaded.
    #[error("corrupt row: {0}")]
    Corrupt(String),

    #[error("store backend failure: {0}")]
    Backend(String),
}

/// A user's cart with each line joined to its product, read at one point in time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CartSnapshot {
    pub cart: ShoppingCart,
    /// One entry per cart line, in cart order.
    pub lines: Vec<CheckoutLine>,
}

/// Explicit transaction over the storefront tables.
///
/// Dropping a unit of work without calling `commit` discards its writes, but
/// callers should call `rollback` on every failure path.
#[async_trait]
pub trait UnitOfWork: Send {
    /// Load the user's cart with its lines and their products.
    async fn load_cart_with_items(&mut self, user_id: &UserId) -> Result<Option<CartSnapshot>, StoreError>;

    async fn load_product(&mut self, product_id: ProductId) -> Result<Option<Product>, StoreError>;

    /// Persist a product read earlier in this unit of work. Fails with
    /// `ProductConflict` if the stored row no longer has the product's row
    /// version. Returns the new row version.
    async fn update_product(&mut self, product: &Product) -> Result<RowVersion, StoreError>;

    async fn add_order(&mut self, order: &NewOrder) -> Result<OrderId, StoreError>;

    /// Insert (first save) or compare-and-swap update the cart and its lines.
    /// Returns the cart as persisted.
    async fn save_cart(&mut self, cart: &ShoppingCart) -> Result<ShoppingCart, StoreError>;

    async fn add_stock_alert(&mut self, alert: &NewStockAlert) -> Result<StockAlertId, StoreError>;

    async fn commit(self) -> Result<(), StoreError>;

    async fn rollback(self) -> Result<(), StoreError>;
}

/// Entry point for units of work.
#[async_trait]
pub trait Store: Send + Sync {
    type Tx: UnitOfWork + 'static;

    async fn begin(&self) -> Result<Self::Tx, StoreError>;
}

/// Catalog collaborator: the small part of product management the storefront
/// needs (seeding and lookups).
#[async_trait]
pub trait CatalogStore: Send + Sync {
    async fn get_product(&self, product_id: ProductId) -> Result<Option<Product>, StoreError>;

    /// Insert or overwrite a product without a version check. Returns the
    /// product as stored, with its new row version.
    async fn put_product(&self, product: &Product) -> Result<Product, StoreError>;
}

/// Read side of the order store.
#[async_trait]
pub trait OrderReadStore: Send + Sync {
    async fn get_order(&self, order_id: OrderId) -> Result<Option<Order>, StoreError>;

    /// The user's orders, newest first.
    async fn list_orders_by_user(&self, user_id: &UserId, page: PageRequest) -> Result<Page<Order>, StoreError>;

    /// Every order, newest first.
    async fn list_all_orders(&self) -> Result<Vec<Order>, StoreError>;
}

/// Stock alert store (outside the checkout unit of work).
#[async_trait]
pub trait StockAlertStore: Send + Sync {
    /// Every alert, newest first.
    async fn list_alerts(&self) -> Result<Vec<StockAlert>, StoreError>;

    async fn get_alert(&self, alert_id: StockAlertId) -> Result<Option<StockAlert>, StoreError>;

    async fn count_unacknowledged(&self) -> Result<u64, StoreError>;

    /// Returns `false` if the alert does not exist.
    async fn acknowledge_alert(&self, alert_id: StockAlertId) -> Result<bool, StoreError>;

    /// Returns `false` if the alert does not exist.
    async fn delete_alert(&self, alert_id: StockAlertId) -> Result<bool, StoreError>;
}
