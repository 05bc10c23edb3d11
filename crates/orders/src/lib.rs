//! Orders domain module.
//!
//! Immutable orders with price-snapshotted lines, the checkout planning step
//! that turns a loaded cart into stock decrements plus a new order, and the
//! error taxonomy of order placement. No IO, no HTTP, no storage.

pub mod checkout;
pub mod error;
pub mod order;
pub mod paging;

pub use checkout::{CheckoutLine, CheckoutPlan, StockChange, plan_checkout};
pub use error::OrderError;
pub use order::{NewOrder, Order, OrderItem};
pub use paging::{DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE, Page, PageRequest};
