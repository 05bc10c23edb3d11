use std::sync::Arc;

use axum::{
    extract::{Extension, Path},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};

use storefront_core::{ProductId, UserId};

use crate::app::services::AppServices;
use crate::app::{dto, errors};
use crate::authz::require_owner_or_admin;
use crate::context::PrincipalContext;

pub fn router() -> Router {
    Router::new()
        .route("/:user_id", get(get_cart).delete(clear_cart))
        .route("/:user_id/items", post(add_item))
        .route("/:user_id/items/:product_id/decrease", post(decrease_item))
}

/// Parse the cart owner from the path and check the caller may act for them.
fn owner(principal: &PrincipalContext, raw: &str) -> Result<UserId, axum::response::Response> {
    let user_id = UserId::parse(raw).map_err(errors::invalid_input)?;
    require_owner_or_admin(principal, &user_id)?;
    Ok(user_id)
}

pub async fn get_cart(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(user_id): Path<String>,
) -> axum::response::Response {
    let user_id = match owner(&principal, &user_id) {
        Ok(u) => u,
        Err(resp) => return resp,
    };

    match services.get_cart(&user_id).await {
        Ok(view) => Json(view).into_response(),
        Err(e) => errors::cart_error_to_response(e),
    }
}

pub async fn add_item(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(user_id): Path<String>,
    Json(body): Json<dto::AddCartItemRequest>,
) -> axum::response::Response {
    let user_id = match owner(&principal, &user_id) {
        Ok(u) => u,
        Err(resp) => return resp,
    };

    match services
        .add_cart_item(&user_id, body.product_id, body.quantity)
        .await
    {
        Ok(ack) => Json(ack).into_response(),
        Err(e) => errors::cart_error_to_response(e),
    }
}

pub async fn decrease_item(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path((user_id, product_id)): Path<(String, String)>,
    Json(body): Json<dto::DecreaseCartItemRequest>,
) -> axum::response::Response {
    let user_id = match owner(&principal, &user_id) {
        Ok(u) => u,
        Err(resp) => return resp,
    };
    let product_id: ProductId = match product_id.parse() {
        Ok(id) => id,
        Err(e) => return errors::invalid_input(e),
    };

    match services
        .decrease_cart_item(&user_id, product_id, body.amount)
        .await
    {
        Ok(ack) => Json(ack).into_response(),
        Err(e) => errors::cart_error_to_response(e),
    }
}

pub async fn clear_cart(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(user_id): Path<String>,
) -> axum::response::Response {
    let user_id = match owner(&principal, &user_id) {
        Ok(u) => u,
        Err(resp) => return resp,
    };

    match services.clear_cart(&user_id).await {
        Ok(ack) => Json(ack).into_response(),
        Err(e) => errors::cart_error_to_response(e),
    }
}
