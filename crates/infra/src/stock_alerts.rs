//! Administration of raised stock alerts.

use std::sync::Arc;

use tracing::instrument;

use storefront_alerts::StockAlert;
use storefront_core::StockAlertId;

use crate::store::{StockAlertStore, StoreError};

pub struct StockAlertService<S: StockAlertStore> {
    store: Arc<S>,
}

impl<S: StockAlertStore> Clone for StockAlertService<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
        }
    }
}

impl<S: StockAlertStore> StockAlertService<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Every alert, newest first.
    pub async fn list(&self) -> Result<Vec<StockAlert>, StoreError> {
        self.store.list_alerts().await
    }

    pub async fn unacknowledged_count(&self) -> Result<u64, StoreError> {
        self.store.count_unacknowledged().await
    }

    pub async fn get(&self, alert_id: StockAlertId) -> Result<Option<StockAlert>, StoreError> {
        self.store.get_alert(alert_id).await
    }

    /// Returns `false` when the alert does not exist. Acknowledging twice is fine.
    #[instrument(skip(self), fields(alert_id = %alert_id), err(Display))]
    pub async fn acknowledge(&self, alert_id: StockAlertId) -> Result<bool, StoreError> {
        let found = self.store.acknowledge_alert(alert_id).await?;
        if found {
            tracing::info!(alert_id = %alert_id, "stock alert acknowledged");
        }
        Ok(found)
    }

    #[instrument(skip(self), fields(alert_id = %alert_id), err(Display))]
    pub async fn delete(&self, alert_id: StockAlertId) -> Result<bool, StoreError> {
        let found = self.store.delete_alert(alert_id).await?;
        if found {
            tracing::info!(alert_id = %alert_id, "stock alert deleted");
        }
        Ok(found)
    }
}
