use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};

use storefront_auth::Permission;
use storefront_core::{OrderId, UserId};

use crate::app::services::AppServices;
use crate::app::{dto, errors};
use crate::authz::{require_owner_or_admin, require_permission};
use crate::context::PrincipalContext;

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_all_orders).post(create_order))
        .route("/:id", get(get_order))
        .route("/user/:user_id", get(orders_by_user))
}

pub async fn create_order(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Json(body): Json<dto::CreateOrderRequest>,
) -> axum::response::Response {
    let user_id = match UserId::parse(body.user_id) {
        Ok(u) => u,
        Err(e) => return errors::invalid_input(e),
    };
    if let Err(resp) = require_owner_or_admin(&principal, &user_id) {
        return resp;
    }

    match services.create_order(&user_id).await {
        Ok(order_id) => (
            StatusCode::CREATED,
            Json(dto::CreateOrderResponse {
                message: "Order placed successfully",
                order_id,
            }),
        )
            .into_response(),
        Err(e) => errors::order_error_to_response(e),
    }
}

pub async fn list_all_orders(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
) -> axum::response::Response {
    if let Err(resp) = require_permission(&principal, Permission::ORDERS_READ_ALL) {
        return resp;
    }

    match services.all_orders().await {
        Ok(orders) => Json(orders.iter().map(dto::OrderView::from).collect::<Vec<_>>()).into_response(),
        Err(e) => errors::order_error_to_response(e),
    }
}

pub async fn get_order(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let order_id: OrderId = match id.parse() {
        Ok(v) => v,
        Err(e) => return errors::invalid_input(e),
    };

    let order = match services.get_order(order_id).await {
        Ok(Some(order)) => order,
        Ok(None) => return errors::not_found("Order"),
        Err(e) => return errors::order_error_to_response(e),
    };

    if let Err(resp) = require_owner_or_admin(&principal, order.user_id()) {
        return resp;
    }

    Json(dto::OrderView::from(&order)).into_response()
}

pub async fn orders_by_user(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(user_id): Path<String>,
    Query(query): Query<dto::PageQuery>,
) -> axum::response::Response {
    let user_id = match UserId::parse(user_id) {
        Ok(u) => u,
        Err(e) => return errors::invalid_input(e),
    };
    if let Err(resp) = require_owner_or_admin(&principal, &user_id) {
        return resp;
    }

    match services
        .orders_by_user(&user_id, query.page, query.page_size)
        .await
    {
        Ok(page) => Json(dto::OrderPageView {
            total_count: page.total_count,
            items: page.items.iter().map(dto::OrderView::from).collect(),
        })
        .into_response(),
        Err(e) => errors::order_error_to_response(e),
    }
}
