//! Cart operations: add, decrease, view, clear.
//!
//! Each call is its own unit of work. Cart writes are compare-and-swap on the
//! cart's row version, so two concurrent edits of the same cart cannot both
//! succeed.

use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;
use tracing::instrument;

use storefront_cart::DecreaseOutcome;
use storefront_cart::ShoppingCart;
use storefront_core::{DomainError, Money, ProductId, UserId};

use crate::store::{Store, StoreError, UnitOfWork};

pub const ITEM_ADDED: &str = "Item added to cart successfully.";
pub const ITEM_DECREASED: &str = "Item quantity updated successfully.";
pub const CART_CLEARED: &str = "Cart cleared successfully.";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CartError {
    #[error("{0}")]
    InvalidInput(String),

    #[error("Product not found.")]
    ProductNotFound { product_id: ProductId },

    #[error("Cart not found.")]
    CartNotFound,

    #[error("Item not found in cart.")]
    ItemNotFound { product_id: ProductId },

    #[error("The cart was changed by another request. Please try again.")]
    Conflict,

    #[error("Error updating cart: {0}")]
    Unexpected(String),
}

impl CartError {
    pub fn code(&self) -> &'static str {
        match self {
            CartError::InvalidInput(_) => "invalid_input",
            CartError::ProductNotFound { .. } => "product_not_found",
            CartError::CartNotFound => "cart_not_found",
            CartError::ItemNotFound { .. } => "item_not_found",
            CartError::Conflict => "cart_conflict",
            CartError::Unexpected(_) => "unexpected_error",
        }
    }
}

impl From<StoreError> for CartError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::CartConflict { .. } => CartError::Conflict,
            other => CartError::Unexpected(other.to_string()),
        }
    }
}

impl From<DomainError> for CartError {
    fn from(err: DomainError) -> Self {
        match err {
            DomainError::Validation(msg) | DomainError::InvalidId(msg) => CartError::InvalidInput(msg),
            other => CartError::Unexpected(other.to_string()),
        }
    }
}

/// `{success, message}` acknowledgement of a cart mutation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CartAck {
    pub success: bool,
    pub message: String,
}

impl CartAck {
    fn ok(message: &str) -> Self {
        Self {
            success: true,
            message: message.to_string(),
        }
    }
}

/// A cart line as shown to the user, joined with the product at read time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CartLineView {
    pub product_id: ProductId,
    /// `None` when the product no longer exists.
    pub product_name: Option<String>,
    pub unit_price: Option<Money>,
    pub quantity: i32,
    pub line_total: Option<Money>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CartView {
    pub user_id: UserId,
    pub items: Vec<CartLineView>,
    pub total_items: i64,
    /// Sum over lines whose product still exists, at current prices.
    pub subtotal: Money,
}

impl CartView {
    fn empty(user_id: UserId) -> Self {
        Self {
            user_id,
            items: Vec::new(),
            total_items: 0,
            subtotal: Money::ZERO,
        }
    }
}

pub struct CartService<S: Store> {
    store: Arc<S>,
}

impl<S: Store> Clone for CartService<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
        }
    }
}

impl<S: Store> CartService<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Add `quantity` of a product, creating the cart on first use.
    ///
    /// Stock is not checked here; checkout does that.
    #[instrument(skip(self), fields(user_id = %user_id), err(Display))]
    pub async fn add_item(&self, user_id: &UserId, product_id: i64, quantity: i32) -> Result<CartAck, CartError> {
        let product_id = ProductId::new(product_id)
            .map_err(|_| CartError::InvalidInput("Valid Product ID is required.".to_string()))?;
        if quantity <= 0 {
            return Err(CartError::InvalidInput("Quantity must be at least 1.".to_string()));
        }

        let mut uow = self.store.begin().await?;
        let result = add_in(&mut uow, user_id, product_id, quantity).await;
        complete(uow, result).await?;
        Ok(CartAck::ok(ITEM_ADDED))
    }

    /// Decrease a line by `amount`; the line is removed once it reaches zero.
    #[instrument(skip(self), fields(user_id = %user_id), err(Display))]
    pub async fn decrease_item(
        &self,
        user_id: &UserId,
        product_id: ProductId,
        amount: i32,
    ) -> Result<CartAck, CartError> {
        if amount <= 0 {
            return Err(CartError::InvalidInput("Amount must be at least 1.".to_string()));
        }

        let mut uow = self.store.begin().await?;
        let result = decrease_in(&mut uow, user_id, product_id, amount).await;
        let outcome = complete(uow, result).await?;
        tracing::debug!(?outcome, "cart line decreased");
        Ok(CartAck::ok(ITEM_DECREASED))
    }

    /// The user's cart with current product names and prices. A user without
    /// a cart gets an empty view.
    #[instrument(skip(self), fields(user_id = %user_id), err(Display))]
    pub async fn get_cart(&self, user_id: &UserId) -> Result<CartView, CartError> {
        let mut uow = self.store.begin().await?;
        let result = uow.load_cart_with_items(user_id).await.map_err(CartError::from);
        let Some(snapshot) = complete(uow, result).await? else {
            return Ok(CartView::empty(user_id.clone()));
        };

        let mut view = CartView::empty(user_id.clone());
        for line in snapshot.lines {
            let unit_price = line.product.as_ref().map(|p| p.price());
            let line_total = unit_price.map(|p| p.times(line.item.quantity)).transpose()?;
            if let Some(total) = line_total {
                view.subtotal = view.subtotal.checked_add(total)?;
            }
            view.total_items += i64::from(line.item.quantity);
            view.items.push(CartLineView {
                product_id: line.item.product_id,
                product_name: line.product.map(|p| p.name().to_string()),
                unit_price,
                quantity: line.item.quantity,
                line_total,
            });
        }
        Ok(view)
    }

    /// Remove every line. The cart row itself is kept.
    #[instrument(skip(self), fields(user_id = %user_id), err(Display))]
    pub async fn clear_cart(&self, user_id: &UserId) -> Result<CartAck, CartError> {
        let mut uow = self.store.begin().await?;
        let result = clear_in(&mut uow, user_id).await;
        let removed = complete(uow, result).await?;
        tracing::info!(user_id = %user_id, removed, "cart cleared");
        Ok(CartAck::ok(CART_CLEARED))
    }
}

async fn load_cart<U: UnitOfWork>(uow: &mut U, user_id: &UserId) -> Result<Option<ShoppingCart>, CartError> {
    Ok(uow.load_cart_with_items(user_id).await?.map(|s| s.cart))
}

async fn add_in<U: UnitOfWork>(
    uow: &mut U,
    user_id: &UserId,
    product_id: ProductId,
    quantity: i32,
) -> Result<(), CartError> {
    if uow.load_product(product_id).await?.is_none() {
        return Err(CartError::ProductNotFound { product_id });
    }

    let mut cart = load_cart(uow, user_id)
        .await?
        .unwrap_or_else(|| ShoppingCart::new(user_id.clone()));
    cart.add_item(product_id, quantity)?;
    uow.save_cart(&cart).await?;
    Ok(())
}

async fn decrease_in<U: UnitOfWork>(
    uow: &mut U,
    user_id: &UserId,
    product_id: ProductId,
    amount: i32,
) -> Result<DecreaseOutcome, CartError> {
    let mut cart = load_cart(uow, user_id).await?.ok_or(CartError::CartNotFound)?;
    let outcome = cart.decrease_item(product_id, amount).map_err(|e| match e {
        DomainError::NotFound => CartError::ItemNotFound { product_id },
        other => CartError::from(other),
    })?;
    uow.save_cart(&cart).await?;
    Ok(outcome)
}

async fn clear_in<U: UnitOfWork>(uow: &mut U, user_id: &UserId) -> Result<usize, CartError> {
    let mut cart = load_cart(uow, user_id).await?.ok_or(CartError::CartNotFound)?;
    let removed = cart.clear();
    if removed > 0 {
        uow.save_cart(&cart).await?;
    }
    Ok(removed)
}

/// Commit on success, roll back on failure.
async fn complete<U: UnitOfWork, T>(uow: U, result: Result<T, CartError>) -> Result<T, CartError> {
    match result {
        Ok(value) => {
            uow.commit().await?;
            Ok(value)
        }
        Err(err) => {
            if let Err(rollback_err) = uow.rollback().await {
                tracing::warn!(error = %rollback_err, "cart rollback failed");
            }
            Err(err)
        }
    }
}
