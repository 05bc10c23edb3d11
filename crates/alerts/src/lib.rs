//! Low-stock alerting domain module.

pub mod alert;

pub use alert::{LowStockPolicy, NewStockAlert, StockAlert};
