use chrono::{DateTime, Utc};
use serde::Serialize;

use storefront_catalog::Product;
use storefront_core::{Entity, ProductId, StockAlertId};

/// An alert that has been decided on but not yet stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewStockAlert {
    pub product_id: ProductId,
    pub product_name: String,
    pub quantity_at_trigger: i32,
    pub triggered_at: DateTime<Utc>,
}

/// Entity: StockAlert.
///
/// `product_name` is a snapshot; renaming the product later does not change it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StockAlert {
    id: StockAlertId,
    product_id: ProductId,
    product_name: String,
    quantity_at_trigger: i32,
    triggered_at: DateTime<Utc>,
    is_acknowledged: bool,
}

impl StockAlert {
    pub fn from_new(id: StockAlertId, alert: NewStockAlert) -> Self {
        Self {
            id,
            product_id: alert.product_id,
            product_name: alert.product_name,
            quantity_at_trigger: alert.quantity_at_trigger,
            triggered_at: alert.triggered_at,
            is_acknowledged: false,
        }
    }

    pub fn restore(
        id: StockAlertId,
        product_id: ProductId,
        product_name: String,
        quantity_at_trigger: i32,
        triggered_at: DateTime<Utc>,
        is_acknowledged: bool,
    ) -> Self {
        Self {
            id,
            product_id,
            product_name,
            quantity_at_trigger,
            triggered_at,
            is_acknowledged,
        }
    }

    /// Mark the alert as seen. Acknowledging twice is a no-op.
    pub fn acknowledge(&mut self) {
        self.is_acknowledged = true;
    }

    pub fn id_typed(&self) -> StockAlertId {
        self.id
    }

    pub fn product_id(&self) -> ProductId {
        self.product_id
    }

    pub fn product_name(&self) -> &str {
        &self.product_name
    }

    pub fn quantity_at_trigger(&self) -> i32 {
        self.quantity_at_trigger
    }

    pub fn triggered_at(&self) -> DateTime<Utc> {
        self.triggered_at
    }

    pub fn is_acknowledged(&self) -> bool {
        self.is_acknowledged
    }
}

impl Entity for StockAlert {
    type Id = StockAlertId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

/// Decides whether a stock decrement raises an alert.
///
/// An alert is raised when stock moves from above the product's threshold to
/// at or below it. Further decrements while already low do not raise again.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LowStockPolicy {
    enabled: bool,
}

impl LowStockPolicy {
    pub fn enabled() -> Self {
        Self { enabled: true }
    }

    pub fn disabled() -> Self {
        Self { enabled: false }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// `product` is the product after the decrement.
    pub fn evaluate(
        &self,
        product: &Product,
        previous_stock: i32,
        now: DateTime<Utc>,
    ) -> Option<NewStockAlert> {
        if !self.enabled {
            return None;
        }
        if product.crossed_low_stock_since(previous_stock) {
            Some(NewStockAlert {
                product_id: product.id_typed(),
                product_name: product.name().to_string(),
                quantity_at_trigger: product.stock_quantity(),
                triggered_at: now,
            })
        } else {
            None
        }
    }
}

impl Default for LowStockPolicy {
    fn default() -> Self {
        Self::enabled()
    }
}
