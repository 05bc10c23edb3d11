//! Shopping cart domain module.
//!
//! One cart per user, one line per product. Pure domain logic (no IO, no HTTP,
//! no storage); stores persist carts and enforce the row-version token.

pub mod cart;

pub use cart::{CartItem, DecreaseOutcome, ShoppingCart};
