use storefront_auth::Principal;
use storefront_core::UserId;

/// Principal context for a request (authenticated identity).
///
/// Inserted by the auth middleware only when a valid access token was
/// presented; anonymous requests carry none.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrincipalContext {
    principal: Principal,
}

impl PrincipalContext {
    pub fn new(user_id: UserId, username: impl Into<String>) -> Self {
        Self {
            principal: Principal {
                user_id,
                username: username.into(),
            },
        }
    }

    pub fn user_id(&self) -> UserId {
        self.principal.user_id
    }

    pub fn principal(&self) -> &Principal {
        &self.principal
    }
}
