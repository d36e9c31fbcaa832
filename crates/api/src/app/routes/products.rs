use std::sync::Arc;

use axum::{
    Extension, Json, Router,
    extract::Path,
    http::StatusCode,
    response::IntoResponse,
    routing::get,
};

use storefront_auth::AccessPolicy;
use storefront_core::ProductId;

use crate::app::dto::{ProductRequest, ProductResponse};
use crate::app::errors::{ApiError, JsonBody};
use crate::app::services::AppServices;
use crate::middleware;

/// Catalog endpoints: anyone may read, only authenticated callers may write.
pub fn router() -> Router {
    Router::new()
        .route("/products/", get(list_products).post(create_product))
        .route(
            "/products/:id/",
            get(get_product)
                .put(replace_product)
                .patch(update_product)
                .delete(delete_product),
        )
        .route_layer(axum::middleware::from_fn_with_state(
            AccessPolicy::IsAuthenticatedOrReadOnly,
            middleware::enforce_policy,
        ))
}

fn parse_id(raw: &str) -> Result<ProductId, ApiError> {
    Ok(raw.parse::<ProductId>()?)
}

pub async fn list_products(
    Extension(services): Extension<Arc<AppServices>>,
) -> Result<impl IntoResponse, ApiError> {
    let items = services
        .list_products()
        .await?
        .iter()
        .map(ProductResponse::from)
        .collect::<Vec<_>>();
    Ok(Json(items))
}

pub async fn create_product(
    Extension(services): Extension<Arc<AppServices>>,
    JsonBody(body): JsonBody<ProductRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let product = services.create_product(body.into_new_product()?).await?;
    Ok((StatusCode::CREATED, Json(ProductResponse::from(&product))))
}

pub async fn get_product(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let product = services.get_product(parse_id(&id)?).await?;
    Ok(Json(ProductResponse::from(&product)))
}

/// `PUT`: full replacement; every required field must be supplied.
pub async fn replace_product(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
    JsonBody(body): JsonBody<ProductRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let id = parse_id(&id)?;
    let changes = body.into_new_product()?.into_changes();
    let product = services.update_product(id, changes).await?;
    Ok(Json(ProductResponse::from(&product)))
}

/// `PATCH`: only the supplied fields change.
pub async fn update_product(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
    JsonBody(body): JsonBody<ProductRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let id = parse_id(&id)?;
    let product = services.update_product(id, body.into_changes()?).await?;
    Ok(Json(ProductResponse::from(&product)))
}

pub async fn delete_product(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    services.delete_product(parse_id(&id)?).await?;
    Ok(StatusCode::NO_CONTENT)
}
