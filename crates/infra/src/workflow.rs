//! `CreateOrder`: turn a user's cart into an order in one unit of work.
//!
//! The sequence is:
//! 1. load the cart with its lines and products
//! 2. plan the checkout (validates every line before touching stock)
//! 3. write each decremented product with a row-version check, raising a
//!    stock alert when a product crosses its low-stock threshold
//! 4. insert the order, clear the cart, commit
//!
//! Any failure rolls the whole unit of work back: no stock change, no order,
//! no alert and an untouched cart.

use std::sync::Arc;

use chrono::Utc;
use tracing::instrument;

use storefront_alerts::LowStockPolicy;
use storefront_core::{OrderId, ProductId, UserId};
use storefront_orders::{CheckoutPlan, OrderError, plan_checkout};

use crate::store::{Store, StoreError, UnitOfWork};

/// Order placement service.
pub struct OrderWorkflow<S: Store> {
    store: Arc<S>,
    policy: LowStockPolicy,
}

impl<S: Store> Clone for OrderWorkflow<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            policy: self.policy,
        }
    }
}

impl<S: Store> OrderWorkflow<S> {
    pub fn new(store: Arc<S>, policy: LowStockPolicy) -> Self {
        Self { store, policy }
    }

    /// Place an order for everything in the user's cart.
    ///
    /// Returns the new order's id. On any error nothing is persisted.
    #[instrument(skip(self), fields(user_id = %user_id))]
    pub async fn create_order(&self, user_id: &UserId) -> Result<OrderId, OrderError> {
        let mut uow = self.store.begin().await.map_err(unexpected)?;

        match self.place(&mut uow, user_id).await {
            Ok((order_id, plan)) => {
                if let Err(err) = uow.commit().await {
                    let err = map_store_error(err, &plan);
                    log_failure(user_id, &err);
                    return Err(err);
                }
                tracing::info!(
                    user_id = %user_id,
                    order_id = %order_id,
                    total = %plan.order.total_price,
                    lines = plan.order.items.len(),
                    "order placed"
                );
                Ok(order_id)
            }
            Err(err) => {
                if let Err(rollback_err) = uow.rollback().await {
                    tracing::warn!(error = %rollback_err, "rollback after failed checkout failed");
                }
                log_failure(user_id, &err);
                Err(err)
            }
        }
    }

    async fn place(&self, uow: &mut S::Tx, user_id: &UserId) -> Result<(OrderId, CheckoutPlan), OrderError> {
        let snapshot = uow
            .load_cart_with_items(user_id)
            .await
            .map_err(unexpected)?
            .filter(|s| !s.cart.is_empty())
            .ok_or(OrderError::EmptyCart)?;

        let now = Utc::now();
        let plan = plan_checkout(user_id, &snapshot.lines, now)?;

        for change in &plan.stock_changes {
            uow.update_product(&change.product)
                .await
                .map_err(|e| map_store_error(e, &plan))?;

            if let Some(alert) = self.policy.evaluate(&change.product, change.previous_stock, now) {
                let alert_id = uow.add_stock_alert(&alert).await.map_err(unexpected)?;
                tracing::info!(
                    alert_id = %alert_id,
                    product_id = %alert.product_id,
                    quantity = alert.quantity_at_trigger,
                    "low stock alert raised"
                );
            }
        }

        let order_id = uow.add_order(&plan.order).await.map_err(unexpected)?;

        let mut cart = snapshot.cart;
        cart.clear();
        uow.save_cart(&cart).await.map_err(|e| map_store_error(e, &plan))?;

        Ok((order_id, plan))
    }
}

fn unexpected(err: StoreError) -> OrderError {
    OrderError::Unexpected(err.to_string())
}

fn product_name(plan: &CheckoutPlan, product_id: ProductId) -> String {
    plan.stock_changes
        .iter()
        .find(|c| c.product.id_typed() == product_id)
        .map(|c| c.product.name().to_string())
        .unwrap_or_else(|| product_id.to_string())
}

/// Row-version conflicts become retryable errors; anything else is unexpected.
fn map_store_error(err: StoreError, plan: &CheckoutPlan) -> OrderError {
    match err {
        StoreError::ProductConflict { product_id } => OrderError::ConcurrentStockConflict {
            product_id,
            product_name: product_name(plan, product_id),
        },
        StoreError::CartConflict { .. } => OrderError::ConcurrentCartConflict,
        other => unexpected(other),
    }
}

fn log_failure(user_id: &UserId, err: &OrderError) {
    match err {
        OrderError::ConcurrentStockConflict { product_id, .. } => {
            tracing::warn!(user_id = %user_id, product_id = %product_id, "checkout lost a stock race");
        }
        OrderError::ConcurrentCartConflict => {
            tracing::warn!(user_id = %user_id, "checkout lost a cart race");
        }
        OrderError::Unexpected(msg) => {
            tracing::error!(user_id = %user_id, error = %msg, "checkout failed unexpectedly");
        }
        other => {
            tracing::info!(user_id = %user_id, code = other.code(), "checkout rejected");
        }
    }
}
