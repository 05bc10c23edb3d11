//! Infrastructure layer: stores, the order workflow and the services built on them.

pub mod cart_service;
pub mod config;
pub mod order_queries;
pub mod seed;
pub mod stock_alerts;
pub mod store;
pub mod workflow;

pub use cart_service::{CartAck, CartError, CartLineView, CartService, CartView};
pub use order_queries::OrderQueries;
pub use stock_alerts::StockAlertService;
pub use workflow::OrderWorkflow;
