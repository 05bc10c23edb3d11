use std::sync::Arc;

use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, put},
    Json, Router,
};

use storefront_auth::Permission;
use storefront_core::StockAlertId;

use crate::app::errors;
use crate::app::services::AppServices;
use crate::authz::require_permission;
use crate::context::PrincipalContext;

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_alerts))
        .route("/unacknowledged/count", get(unacknowledged_count))
        .route("/:id", get(get_alert).delete(delete_alert))
        .route("/:id/acknowledge", put(acknowledge_alert))
}

fn admin(principal: &PrincipalContext) -> Result<(), axum::response::Response> {
    require_permission(principal, Permission::STOCK_ALERTS_MANAGE)
}

fn alert_id(raw: &str) -> Result<StockAlertId, axum::response::Response> {
    raw.parse().map_err(errors::invalid_input)
}

pub async fn list_alerts(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
) -> axum::response::Response {
    if let Err(resp) = admin(&principal) {
        return resp;
    }
    match services.list_alerts().await {
        Ok(alerts) => Json(alerts).into_response(),
        Err(e) => errors::store_error_to_response(e),
    }
}

pub async fn unacknowledged_count(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
) -> axum::response::Response {
    if let Err(resp) = admin(&principal) {
        return resp;
    }
    match services.unacknowledged_alerts().await {
        Ok(count) => Json(serde_json::json!({ "count": count })).into_response(),
        Err(e) => errors::store_error_to_response(e),
    }
}

pub async fn get_alert(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    if let Err(resp) = admin(&principal) {
        return resp;
    }
    let id = match alert_id(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    match services.get_alert(id).await {
        Ok(Some(alert)) => Json(alert).into_response(),
        Ok(None) => errors::not_found("Stock alert"),
        Err(e) => errors::store_error_to_response(e),
    }
}

pub async fn acknowledge_alert(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    if let Err(resp) = admin(&principal) {
        return resp;
    }
    let id = match alert_id(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    match services.acknowledge_alert(id).await {
        Ok(true) => StatusCode::NO_CONTENT.into_response(),
        Ok(false) => errors::not_found("Stock alert"),
        Err(e) => errors::store_error_to_response(e),
    }
}

pub async fn delete_alert(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    if let Err(resp) = admin(&principal) {
        return resp;
    }
    let id = match alert_id(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    match services.delete_alert(id).await {
        Ok(true) => StatusCode::NO_CONTENT.into_response(),
        Ok(false) => errors::not_found("Stock alert"),
        Err(e) => errors::store_error_to_response(e),
    }
}
