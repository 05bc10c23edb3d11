//! HTTP API application wiring (Axum router + service wiring).
//!
//! - `services.rs`: store selection and the services built on it
//! - `routes/`: HTTP routes + handlers (one file per area)
//! - `dto.rs`: request/response DTOs
//! - `errors.rs`: consistent error responses

use std::sync::Arc;

use axum::{Extension, Router, routing::get};
use tower::ServiceBuilder;

use storefront_infra::config::InfraConfig;

use crate::middleware;

pub mod dto;
pub mod errors;
pub mod routes;
pub mod services;

/// Build the full HTTP router from environment configuration.
pub async fn build_app(jwt_secret: String) -> anyhow::Result<Router> {
    let config = InfraConfig::from_env()?;
    let services = services::build_services(&config).await?;
    Ok(build_router(Arc::new(services), &jwt_secret))
}

/// Router over already-wired services.
pub fn build_router(services: Arc<services::AppServices>, jwt_secret: &str) -> Router {
    let jwt = Arc::new(storefront_auth::Hs256JwtValidator::new(jwt_secret.as_bytes().to_vec()));
    let auth_state = middleware::AuthState { jwt };

    // Protected routes: require a verified principal.
    let protected = routes::router().layer(axum::middleware::from_fn_with_state(
        auth_state,
        middleware::auth_middleware,
    ));

    Router::new()
        .route("/health", get(routes::system::health))
        .merge(protected)
        .layer(
            ServiceBuilder::new()
                .layer(axum::middleware::from_fn(middleware::request_span_middleware))
                .layer(Extension(services)),
        )
}
