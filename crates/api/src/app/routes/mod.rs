use axum::Router;

pub mod auth;
pub mod orders;
pub mod products;
pub mod system;

/// Router for every API endpoint except the health probe.
///
/// Paths keep their trailing slash, as clients call them.
pub fn router() -> Router {
    Router::new()
        .merge(auth::router())
        .merge(products::router())
        .merge(orders::router())
}
