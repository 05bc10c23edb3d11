//! `storefront-core` — domain foundation building blocks.
//!
//! This crate contains **pure domain** primitives (no infrastructure concerns):
//! identifiers, the domain error model, money and the optimistic concurrency
//! token shared by every stored entity.

pub mod entity;
pub mod error;
pub mod id;
pub mod value_object;
pub mod version;

pub use entity::Entity;
pub use error::{DomainError, DomainResult};
pub use id::{CartId, CategoryId, OrderId, ProductId, StockAlertId, UserId};
pub use value_object::{Money, ValueObject};
pub use version::{RowVersion, Versioned};
