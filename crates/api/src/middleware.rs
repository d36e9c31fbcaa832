use std::sync::Arc;

use axum::{
    extract::State,
    http::{HeaderMap, header},
    middleware::Next,
    response::Response,
};
use chrono::Utc;

use storefront_auth::{Access, AccessPolicy, TokenKind, TokenValidator, authorize};
use storefront_core::Entity;
use storefront_infra::Store;

use crate::app::errors::ApiError;
use crate::context::PrincipalContext;

#[derive(Clone)]
pub struct AuthState {
    pub tokens: Arc<dyn TokenValidator>,
    pub users: Arc<dyn Store>,
}

/// Resolve the caller from `Authorization: Bearer <access token>`.
///
/// No header means an anonymous request; the per-route access policy then
/// decides. A header that is present but unusable is rejected outright, as
/// is a valid token whose user no longer exists.
pub async fn auth_middleware(
    State(state): State<AuthState>,
    mut req: axum::http::Request<axum::body::Body>,
    next: Next,
) -> Result<Response, ApiError> {
    if let Some(token) = extract_bearer(req.headers())? {
        let claims = state
            .tokens
            .validate(token, TokenKind::Access, Utc::now())
            .map_err(|e| {
                tracing::debug!(error = %e, "access token rejected");
                ApiError::AuthenticationFailed("Given token not valid for any token type".to_string())
            })?;

        let user = state.users.get_user(claims.sub).await?.ok_or_else(|| {
            tracing::debug!(user_id = %claims.sub, "token subject not found");
            ApiError::AuthenticationFailed("User not found".to_string())
        })?;

        req.extensions_mut()
            .insert(PrincipalContext::new(user.id(), user.username()));
    }

    Ok(next.run(req).await)
}

/// Enforce a route group's access policy against the resolved caller.
///
/// Runs inside `auth_middleware`, before any body is read.
pub async fn enforce_policy(
    State(policy): State<AccessPolicy>,
    req: axum::http::Request<axum::body::Body>,
    next: Next,
) -> Result<Response, ApiError> {
    let access = Access::from_method(req.method().as_str());
    let principal = req
        .extensions()
        .get::<PrincipalContext>()
        .map(PrincipalContext::principal);
    authorize(policy, access, principal)?;

    Ok(next.run(req).await)
}

fn extract_bearer(headers: &HeaderMap) -> Result<Option<&str>, ApiError> {
    let Some(header) = headers.get(header::AUTHORIZATION) else {
        return Ok(None);
    };

    let malformed =
        || ApiError::AuthenticationFailed("Authorization header must be 'Bearer <token>'".to_string());

    let header = header.to_str().map_err(|_| malformed())?;
    let token = header.strip_prefix("Bearer ").ok_or_else(malformed)?.trim();
    if token.is_empty() {
        return Err(malformed());
    }

    Ok(Some(token))
}
