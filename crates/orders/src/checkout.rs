//! Checkout planning: validate every cart line, then decrement stock and build
//! the order.
//!
//! Planning is pure. The caller loads the cart lines (with their products) in
//! a unit of work, asks for a plan, and persists the plan's stock changes and
//! order in that same unit of work. Because every line is validated before any
//! product is touched, a failing line never leaves a partial decrement behind.

use chrono::{DateTime, Utc};

use storefront_cart::CartItem;
use storefront_catalog::Product;
use storefront_core::{ProductId, UserId};

use crate::error::OrderError;
use crate::order::{NewOrder, OrderItem};

/// A cart line together with the product it references, as read at the
/// start of checkout. `product` is `None` when the product no longer exists.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutLine {
    pub item: CartItem,
    pub product: Option<Product>,
}

/// Net stock change for one product in a plan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StockChange {
    /// The product with its stock already decremented. Its row version is
    /// still the one read at the start of checkout.
    pub product: Product,
    /// Stock as read, before this plan's decrements.
    pub previous_stock: i32,
}

/// Everything checkout has to persist.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutPlan {
    /// One entry per distinct product, in first-seen cart order.
    pub stock_changes: Vec<StockChange>,
    pub order: NewOrder,
}

/// Plan the conversion of `lines` into an order placed at `order_date`.
///
/// Lines are checked in the given order and the first failure wins:
/// missing product, then non-positive quantity, then insufficient stock.
/// Quantities for a product that appears on more than one line are checked
/// against the stock that remains after the earlier lines.
pub fn plan_checkout(
    user_id: &UserId,
    lines: &[CheckoutLine],
    order_date: DateTime<Utc>,
) -> Result<CheckoutPlan, OrderError> {
    if lines.is_empty() {
        return Err(OrderError::EmptyCart);
    }

    // Phase 1: validate everything against a scratch view of remaining stock.
    let mut remaining: Vec<(ProductId, i32)> = Vec::with_capacity(lines.len());
    for line in lines {
        let product = line.product.as_ref().ok_or(OrderError::ProductNotFound {
            product_id: line.item.product_id,
        })?;

        let quantity = line.item.quantity;
        if quantity <= 0 {
            return Err(OrderError::InvalidQuantity {
                product_id: product.id_typed(),
                product_name: product.name().to_string(),
                quantity,
            });
        }

        let available = match remaining.iter().find(|(id, _)| *id == product.id_typed()) {
            Some((_, left)) => *left,
            None => product.stock_quantity(),
        };
        if quantity > available {
            return Err(OrderError::InsufficientStock {
                product_id: product.id_typed(),
                product_name: product.name().to_string(),
                requested: quantity,
                available,
            });
        }

        match remaining.iter_mut().find(|(id, _)| *id == product.id_typed()) {
            Some(entry) => entry.1 -= quantity,
            None => remaining.push((product.id_typed(), available - quantity)),
        }
    }

    // Phase 2: apply. Prices are taken from the products as read, before any
    // decrement, which is the snapshot the order keeps.
    let mut stock_changes: Vec<StockChange> = Vec::with_capacity(remaining.len());
    let mut items = Vec::with_capacity(lines.len());
    for line in lines {
        let Some(read) = line.product.as_ref() else {
            return Err(OrderError::ProductNotFound {
                product_id: line.item.product_id,
            });
        };

        items.push(OrderItem {
            product_id: read.id_typed(),
            quantity: line.item.quantity,
            unit_price: read.price(),
        });

        let idx = match stock_changes
            .iter()
            .position(|c| c.product.id_typed() == read.id_typed())
        {
            Some(idx) => idx,
            None => {
                stock_changes.push(StockChange {
                    product: read.clone(),
                    previous_stock: read.stock_quantity(),
                });
                stock_changes.len() - 1
            }
        };

        stock_changes[idx]
            .product
            .decrement_stock(line.item.quantity)
            .map_err(|e| OrderError::Unexpected(e.to_string()))?;
    }

    let order = NewOrder::new(user_id.clone(), order_date, items)?;

    Ok(CheckoutPlan {
        stock_changes,
        order,
    })
}
