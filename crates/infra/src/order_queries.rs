//! Read-only order lookups.

use std::sync::Arc;

use tracing::instrument;

use storefront_core::{OrderId, UserId};
use storefront_orders::{Order, OrderError, Page, PageRequest};

use crate::store::{OrderReadStore, StoreError};

pub struct OrderQueries<S: OrderReadStore> {
    store: Arc<S>,
}

impl<S: OrderReadStore> Clone for OrderQueries<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
        }
    }
}

fn unexpected(err: StoreError) -> OrderError {
    OrderError::Unexpected(err.to_string())
}

impl<S: OrderReadStore> OrderQueries<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    #[instrument(skip(self), fields(order_id = %order_id), err(Display))]
    pub async fn get_order(&self, order_id: OrderId) -> Result<Option<Order>, OrderError> {
        self.store.get_order(order_id).await.map_err(unexpected)
    }

    /// One page of the user's order history, newest first.
    ///
    /// `page` and `page_size` default to 1 and 10; out-of-range values are
    /// `InvalidInput`.
    #[instrument(skip(self), fields(user_id = %user_id), err(Display))]
    pub async fn orders_by_user(
        &self,
        user_id: &UserId,
        page: Option<u32>,
        page_size: Option<u32>,
    ) -> Result<Page<Order>, OrderError> {
        let defaults = PageRequest::default();
        let request = PageRequest::new(
            page.unwrap_or(defaults.page()),
            page_size.unwrap_or(defaults.page_size()),
        )?;
        self.store
            .list_orders_by_user(user_id, request)
            .await
            .map_err(unexpected)
    }

    #[instrument(skip(self), err(Display))]
    pub async fn all_orders(&self) -> Result<Vec<Order>, OrderError> {
        self.store.list_all_orders().await.map_err(unexpected)
    }
}
