//! Order placement failures.

use thiserror::Error;

use storefront_core::{DomainError, ProductId};

/// Typed failure of `CreateOrder` and the order queries.
///
/// Messages name the offending product so the caller can fix the cart and
/// resubmit.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum OrderError {
    #[error("Cart is empty or does not exist.")]
    EmptyCart,

    #[error("Product {product_id} not found.")]
    ProductNotFound { product_id: ProductId },

    #[error("Invalid quantity for product {product_name}.")]
    InvalidQuantity {
        product_id: ProductId,
        product_name: String,
        quantity: i32,
    },

    #[error("Not enough stock for '{product_name}'.")]
    InsufficientStock {
        product_id: ProductId,
        product_name: String,
        requested: i32,
        available: i32,
    },

    #[error("Product '{product_name}' was updated by another user. Please try again.")]
    ConcurrentStockConflict {
        product_id: ProductId,
        product_name: String,
    },

    /// The cart changed between reading it and clearing it at checkout.
    #[error("Your cart was changed by another request. Please try again.")]
    ConcurrentCartConflict,

    #[error("{0}")]
    InvalidInput(String),

    #[error("Error placing order: {0}")]
    Unexpected(String),
}

impl OrderError {
    /// Stable machine-readable code for transports.
    pub fn code(&self) -> &'static str {
        match self {
            OrderError::EmptyCart => "empty_cart",
            OrderError::ProductNotFound { .. } => "product_not_found",
            OrderError::InvalidQuantity { .. } => "invalid_quantity",
            OrderError::InsufficientStock { .. } => "insufficient_stock",
            OrderError::ConcurrentStockConflict { .. } => "concurrent_stock_conflict",
            OrderError::ConcurrentCartConflict => "concurrent_cart_conflict",
            OrderError::InvalidInput(_) => "invalid_input",
            OrderError::Unexpected(_) => "unexpected_error",
        }
    }
}

impl From<DomainError> for OrderError {
    fn from(err: DomainError) -> Self {
        match err {
            DomainError::Validation(msg) | DomainError::InvalidId(msg) => OrderError::InvalidInput(msg),
            other => OrderError::Unexpected(other.to_string()),
        }
    }
}
