use serde::{Deserialize, Serialize};

use storefront_core::{Money, OrderId, ProductId, UserId};
use storefront_orders::{Order, OrderItem};

// -------------------------
// Request DTOs
// -------------------------

#[derive(Debug, Deserialize)]
pub struct AddCartItemRequest {
    pub product_id: i64,
    pub quantity: i32,
}

#[derive(Debug, Deserialize)]
pub struct DecreaseCartItemRequest {
    pub amount: i32,
}

#[derive(Debug, Deserialize)]
pub struct CreateOrderRequest {
    pub user_id: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct PageQuery {
    pub page: Option<u32>,
    pub page_size: Option<u32>,
}

// -------------------------
// Response DTOs
// -------------------------

#[derive(Debug, Serialize)]
pub struct CreateOrderResponse {
    pub message: &'static str,
    pub order_id: OrderId,
}

#[derive(Debug, Serialize)]
pub struct OrderItemView {
    pub product_id: ProductId,
    pub quantity: i32,
    pub unit_price: Money,
    pub line_total: Option<Money>,
}

#[derive(Debug, Serialize)]
pub struct OrderView {
    pub id: OrderId,
    pub user_id: UserId,
    pub order_date: String,
    pub total_price: Money,
    pub items: Vec<OrderItemView>,
}

#[derive(Debug, Serialize)]
pub struct OrderPageView {
    pub total_count: u64,
    pub items: Vec<OrderView>,
}

fn item_view(item: &OrderItem) -> OrderItemView {
    OrderItemView {
        product_id: item.product_id,
        quantity: item.quantity,
        unit_price: item.unit_price,
        line_total: item.line_total().ok(),
    }
}

impl From<&Order> for OrderView {
    fn from(order: &Order) -> Self {
        Self {
            id: order.id_typed(),
            user_id: order.user_id().clone(),
            order_date: order.order_date().to_rfc3339(),
            total_price: order.total_price(),
            items: order.items().iter().map(item_view).collect(),
        }
    }
}
