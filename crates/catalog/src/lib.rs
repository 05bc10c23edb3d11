//! Catalog domain module.
//!
//! Products and the rules for decrementing their stock, implemented purely as
//! deterministic domain logic (no IO, no HTTP, no storage).

pub mod product;

pub use product::{DEFAULT_LOW_STOCK_THRESHOLD, Product, ProductRecord};
