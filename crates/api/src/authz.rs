//! API-side authorization guards.
//!
//! Checks run in the handler before the service call, so the services stay
//! auth-agnostic.

use axum::http::StatusCode;
use axum::response::Response;

use storefront_auth::{Permission, authorize, authorize_owner_or_admin};
use storefront_core::UserId;

use crate::app::errors::json_error;
use crate::context::PrincipalContext;

/// The caller must be `target` or an administrator.
pub fn require_owner_or_admin(principal: &PrincipalContext, target: &UserId) -> Result<(), Response> {
    authorize_owner_or_admin(&principal.principal(), target)
        .map_err(|e| json_error(StatusCode::FORBIDDEN, "forbidden", e.to_string()))
}

/// The caller must hold `permission` (administrators hold every permission).
pub fn require_permission(principal: &PrincipalContext, permission: &'static str) -> Result<(), Response> {
    authorize(&principal.principal(), &Permission::new(permission))
        .map_err(|e| json_error(StatusCode::FORBIDDEN, "forbidden", e.to_string()))
}
