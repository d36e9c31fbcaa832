use std::sync::Arc;

use axum::{Extension, Json, Router, http::StatusCode, response::IntoResponse, routing::post};

use storefront_auth::AccessPolicy;

use crate::app::dto::{AccessResponse, LoginRequest, RefreshRequest, RegisterRequest, RegisterResponse};
use crate::app::errors::{ApiError, JsonBody};
use crate::app::services::AppServices;
use crate::middleware;

/// Account endpoints; open to anonymous callers.
pub fn router() -> Router {
    Router::new()
        .route("/register/", post(register))
        .route("/login/", post(login))
        .route("/token/refresh/", post(refresh))
        .route_layer(axum::middleware::from_fn_with_state(
            AccessPolicy::AllowAny,
            middleware::enforce_policy,
        ))
}

pub async fn register(
    Extension(services): Extension<Arc<AppServices>>,
    JsonBody(body): JsonBody<RegisterRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let registration = body.into_registration()?;
    let (user, tokens) = services.register(registration).await?;
    Ok((StatusCode::CREATED, Json(RegisterResponse::new(&user, tokens))))
}

pub async fn login(
    Extension(services): Extension<Arc<AppServices>>,
    JsonBody(body): JsonBody<LoginRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let (username, password) = body.into_parts()?;
    let tokens = services.login(&username, password).await?;
    Ok(Json(tokens))
}

pub async fn refresh(
    Extension(services): Extension<Arc<AppServices>>,
    JsonBody(body): JsonBody<RefreshRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let token = body.into_token()?;
    let access = services.refresh(&token)?;
    Ok(Json(AccessResponse { access }))
}
