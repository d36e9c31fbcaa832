use std::sync::Arc;

use axum::{Extension, Json, Router, http::StatusCode, response::IntoResponse, routing::get};

use storefront_auth::AccessPolicy;

use crate::app::dto::{CreateOrderRequest, OrderResponse};
use crate::app::errors::{ApiError, JsonBody};
use crate::app::services::AppServices;
use crate::context::PrincipalContext;
use crate::middleware;

/// Order endpoints; callers only ever see and create their own orders.
pub fn router() -> Router {
    Router::new()
        .route("/orders/", get(list_orders).post(create_order))
        .route_layer(axum::middleware::from_fn_with_state(
            AccessPolicy::IsAuthenticated,
            middleware::enforce_policy,
        ))
}

pub async fn list_orders(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
) -> Result<impl IntoResponse, ApiError> {
    let orders = services
        .list_orders(principal.user_id())
        .await?
        .iter()
        .map(OrderResponse::from)
        .collect::<Vec<_>>();
    Ok(Json(orders))
}

/// The owner is always the caller; any `user`, `total`, `status` or
/// `created_at` in the body is ignored.
pub async fn create_order(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    JsonBody(body): JsonBody<CreateOrderRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let lines = body.into_lines()?;
    let order = services.place_order(principal.user_id(), lines).await?;
    Ok((StatusCode::CREATED, Json(OrderResponse::from(&order))))
}
