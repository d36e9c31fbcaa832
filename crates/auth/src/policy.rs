use serde::Serialize;
use thiserror::Error;

use storefront_core::UserId;

/// The authenticated caller of a request.
///
/// Derived from a validated access token; construction is decoupled from
/// transport so tests and workers can build one directly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Principal {
    pub user_id: UserId,
    pub username: String,
}

/// Whether an operation only reads or also changes state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    Read,
    Write,
}

impl Access {
    /// Classify an HTTP method name. `GET`, `HEAD` and `OPTIONS` are safe.
    pub fn from_method(method: &str) -> Self {
        match method {
            "GET" | "HEAD" | "OPTIONS" => Access::Read,
            _ => Access::Write,
        }
    }
}

/// Per-endpoint access rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessPolicy {
    /// Anyone, authenticated or not.
    AllowAny,
    /// Only authenticated callers.
    IsAuthenticated,
    /// Anyone may read; only authenticated callers may write.
    IsAuthenticatedOrReadOnly,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthzError {
    #[error("authentication credentials were not provided")]
    Unauthenticated,
}

/// Decide whether `principal` may perform an operation of kind `access`
/// under `policy`.
///
/// - No IO
/// - No panics
pub fn authorize(
    policy: AccessPolicy,
    access: Access,
    principal: Option<&Principal>,
) -> Result<(), AuthzError> {
    match (policy, access, principal) {
        (AccessPolicy::AllowAny, _, _) => Ok(()),
        (_, _, Some(_)) => Ok(()),
        (AccessPolicy::IsAuthenticatedOrReadOnly, Access::Read, None) => Ok(()),
        (_, _, None) => Err(AuthzError::Unauthenticated),
    }
}
