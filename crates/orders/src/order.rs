use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use storefront_core::{DomainError, DomainResult, Entity, Money, OrderId, ProductId, UserId};

/// A purchased line. `unit_price` is the product price captured when the
/// order was placed; later catalog price changes never reach it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderItem {
    pub product_id: ProductId,
    pub quantity: i32,
    pub unit_price: Money,
}

impl OrderItem {
    pub fn line_total(&self) -> DomainResult<Money> {
        self.unit_price.times(self.quantity)
    }
}

/// An order that has been built but not yet stored (no id assigned).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewOrder {
    pub user_id: UserId,
    pub order_date: DateTime<Utc>,
    pub total_price: Money,
    pub items: Vec<OrderItem>,
}

impl NewOrder {
    /// Build an order from its lines, computing the exact total.
    pub fn new(user_id: UserId, order_date: DateTime<Utc>, items: Vec<OrderItem>) -> DomainResult<Self> {
        if items.is_empty() {
            return Err(DomainError::invariant("an order needs at least one item"));
        }
        let total_price = total_of(&items)?;
        Ok(Self {
            user_id,
            order_date,
            total_price,
            items,
        })
    }
}

/// Entity: Order. Immutable once stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Order {
    id: OrderId,
    user_id: UserId,
    order_date: DateTime<Utc>,
    total_price: Money,
    items: Vec<OrderItem>,
}

impl Order {
    /// Attach the store-assigned id to a freshly built order.
    pub fn from_new(id: OrderId, order: NewOrder) -> Self {
        Self {
            id,
            user_id: order.user_id,
            order_date: order.order_date,
            total_price: order.total_price,
            items: order.items,
        }
    }

    /// Rehydrate a stored order. The stored total must equal the sum of its lines.
    pub fn restore(
        id: OrderId,
        user_id: UserId,
        order_date: DateTime<Utc>,
        total_price: Money,
        items: Vec<OrderItem>,
    ) -> DomainResult<Self> {
        let computed = total_of(&items)?;
        if computed != total_price {
            return Err(DomainError::invariant(format!(
                "order {id} total {total_price} does not match its lines ({computed})"
            )));
        }
        Ok(Self {
            id,
            user_id,
            order_date,
            total_price,
            items,
        })
    }

    pub fn id_typed(&self) -> OrderId {
        self.id
    }

    pub fn user_id(&self) -> &UserId {
        &self.user_id
    }

    pub fn order_date(&self) -> DateTime<Utc> {
        self.order_date
    }

    pub fn total_price(&self) -> Money {
        self.total_price
    }

    pub fn items(&self) -> &[OrderItem] {
        &self.items
    }
}

impl Entity for Order {
    type Id = OrderId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

fn total_of(items: &[OrderItem]) -> DomainResult<Money> {
    items
        .iter()
        .try_fold(Money::ZERO, |acc, item| acc.checked_add(item.line_total()?))
}
