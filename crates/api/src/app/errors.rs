use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::json;

use storefront_core::DomainError;
use storefront_infra::CartError;
use storefront_infra::store::StoreError;
use storefront_orders::OrderError;

pub fn order_error_to_response(err: OrderError) -> axum::response::Response {
    let status = match &err {
        OrderError::EmptyCart | OrderError::InvalidInput(_) => StatusCode::BAD_REQUEST,
        OrderError::ProductNotFound { .. }
        | OrderError::InvalidQuantity { .. }
        | OrderError::InsufficientStock { .. } => StatusCode::UNPROCESSABLE_ENTITY,
        OrderError::ConcurrentStockConflict { .. } | OrderError::ConcurrentCartConflict => {
            StatusCode::CONFLICT
        }
        OrderError::Unexpected(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    json_error(status, err.code(), err.to_string())
}

pub fn cart_error_to_response(err: CartError) -> axum::response::Response {
    let status = match &err {
        CartError::InvalidInput(_) => StatusCode::BAD_REQUEST,
        CartError::ProductNotFound { .. } => StatusCode::UNPROCESSABLE_ENTITY,
        CartError::CartNotFound | CartError::ItemNotFound { .. } => StatusCode::NOT_FOUND,
        CartError::Conflict => StatusCode::CONFLICT,
        CartError::Unexpected(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    json_error(status, err.code(), err.to_string())
}

pub fn store_error_to_response(err: StoreError) -> axum::response::Response {
    tracing::error!(error = %err, "store failure");
    json_error(StatusCode::INTERNAL_SERVER_ERROR, "unexpected_error", err.to_string())
}

/// Path or query parameter that failed to parse.
pub fn invalid_input(err: DomainError) -> axum::response::Response {
    json_error(StatusCode::BAD_REQUEST, "invalid_input", err.detail())
}

pub fn not_found(what: &str) -> axum::response::Response {
    json_error(StatusCode::NOT_FOUND, "not_found", format!("{what} not found."))
}

pub fn json_error(
    status: StatusCode,
    code: &'static str,
    message: impl Into<String>,
) -> axum::response::Response {
    (
        status,
        axum::Json(json!({
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use storefront_core::ProductId;

    #[test]
    fn order_errors_map_to_documented_statuses() {
        let cases = [
            (OrderError::EmptyCart, StatusCode::BAD_REQUEST),
            (OrderError::InvalidInput("x".into()), StatusCode::BAD_REQUEST),
            (
                OrderError::ProductNotFound {
                    product_id: ProductId::from_raw(1),
                },
                StatusCode::UNPROCESSABLE_ENTITY,
            ),
            (
                OrderError::InsufficientStock {
                    product_id: ProductId::from_raw(1),
                    product_name: "C".into(),
                    requested: 5,
                    available: 2,
                },
                StatusCode::UNPROCESSABLE_ENTITY,
            ),
            (
                OrderError::ConcurrentStockConflict {
                    product_id: ProductId::from_raw(1),
                    product_name: "A".into(),
                },
                StatusCode::CONFLICT,
            ),
            (OrderError::ConcurrentCartConflict, StatusCode::CONFLICT),
            (OrderError::Unexpected("boom".into()), StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (err, status) in cases {
            assert_eq!(order_error_to_response(err).status(), status);
        }
    }

    #[test]
    fn cart_lookups_map_to_not_found() {
        assert_eq!(
            cart_error_to_response(CartError::CartNotFound).status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            cart_error_to_response(CartError::ItemNotFound {
                product_id: ProductId::from_raw(3)
            })
            .status(),
            StatusCode::NOT_FOUND
        );
    }
}
