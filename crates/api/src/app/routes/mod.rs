use axum::{Router, routing::get};

pub mod cart;
pub mod orders;
pub mod stock_alerts;
pub mod system;

/// Router for all authenticated endpoints.
pub fn router() -> Router {
    Router::new()
        .route("/whoami", get(system::whoami))
        .nest("/cart", cart::router())
        .nest("/orders", orders::router())
        .nest("/stock-alerts", stock_alerts::router())
}
