//! User identity and registration rules.

use chrono::{DateTime, Utc};
use thiserror::Error;

use storefront_core::{DomainError, DomainResult, Entity, FieldErrors, UserId};

use crate::password::{PasswordPolicy, verify_dummy, verify_password};

pub const USERNAME_MAX_LEN: usize = 150;
pub const EMAIL_MAX_LEN: usize = 254;

/// A registered account.
///
/// The password is only ever held as an Argon2 PHC hash.
#[derive(Clone, PartialEq, Eq)]
pub struct User {
    id: UserId,
    username: String,
    email: String,
    password_hash: String,
    date_joined: DateTime<Utc>,
}

impl core::fmt::Debug for User {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("User")
            .field("id", &self.id)
            .field("username", &self.username)
            .field("email", &self.email)
            .field("date_joined", &self.date_joined)
            .finish_non_exhaustive()
    }
}

impl User {
    /// Create the account for an already validated registration.
    pub fn register(
        id: UserId,
        registration: &Registration,
        password_hash: String,
        date_joined: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            username: registration.username().to_string(),
            email: registration.email().to_string(),
            password_hash,
            date_joined,
        }
    }

    /// Rebuild a user from storage.
    pub fn restore(
        id: UserId,
        username: String,
        email: String,
        password_hash: String,
        date_joined: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            username,
            email,
            password_hash,
            date_joined,
        }
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn email(&self) -> &str {
        &self.email
    }

    pub fn password_hash(&self) -> &str {
        &self.password_hash
    }

    pub fn date_joined(&self) -> DateTime<Utc> {
        self.date_joined
    }
}

impl Entity for User {
    type Id = UserId;

    fn id(&self) -> Self::Id {
        self.id
    }
}

/// A sign-up request.
///
/// Username and email are trimmed on construction; passwords are kept as
/// given.
#[derive(Clone, PartialEq, Eq)]
pub struct Registration {
    username: String,
    email: String,
    password: String,
    password2: String,
}

impl core::fmt::Debug for Registration {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Registration")
            .field("username", &self.username)
            .field("email", &self.email)
            .finish_non_exhaustive()
    }
}

impl Registration {
    pub fn new(
        username: impl Into<String>,
        email: impl Into<String>,
        password: impl Into<String>,
        password2: impl Into<String>,
    ) -> Self {
        Self {
            username: username.into().trim().to_string(),
            email: email.into().trim().to_string(),
            password: password.into(),
            password2: password2.into(),
        }
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn email(&self) -> &str {
        &self.email
    }

    pub fn password(&self) -> &str {
        &self.password
    }

    /// Check every field, collecting all failures.
    ///
    /// Username uniqueness needs storage and is checked by the caller.
    pub fn validate(&self, policy: &PasswordPolicy) -> DomainResult<()> {
        let mut errors = FieldErrors::new();

        if let Err(msg) = check_username(&self.username) {
            errors.add("username", msg);
        }
        if let Err(msg) = check_email(&self.email) {
            errors.add("email", msg);
        }

        if self.password.is_empty() {
            errors.add("password", "This field may not be blank.");
        } else if self.password != self.password2 {
            errors.add("password", "Password fields didn't match.");
        } else {
            for problem in policy.check(&self.password, &self.username, &self.email) {
                errors.add("password", problem);
            }
        }

        errors.into_result()
    }
}

fn check_username(username: &str) -> Result<(), String> {
    if username.is_empty() {
        return Err("This field may not be blank.".to_string());
    }
    if username.chars().count() > USERNAME_MAX_LEN {
        return Err(format!(
            "Ensure this field has no more than {USERNAME_MAX_LEN} characters."
        ));
    }
    let allowed = |c: char| c.is_alphanumeric() || matches!(c, '@' | '.' | '+' | '-' | '_');
    if !username.chars().all(allowed) {
        return Err(
            "Enter a valid username. This value may contain only letters, numbers, and @/./+/-/_ characters."
                .to_string(),
        );
    }
    Ok(())
}

/// Empty means "no email". Otherwise a single `@` with a dotted domain.
fn check_email(email: &str) -> Result<(), String> {
    if email.is_empty() {
        return Ok(());
    }
    let invalid = || "Enter a valid email address.".to_string();
    if email.chars().count() > EMAIL_MAX_LEN || email.chars().any(char::is_whitespace) {
        return Err(invalid());
    }
    let (local, domain) = email.split_once('@').ok_or_else(invalid)?;
    if local.is_empty() || domain.contains('@') {
        return Err(invalid());
    }
    let labels: Vec<&str> = domain.split('.').collect();
    if labels.len() < 2 || labels.iter().any(|l| l.is_empty()) {
        return Err(invalid());
    }
    Ok(())
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthError {
    /// Unknown username or wrong password; callers cannot tell which.
    #[error("No active account found with the given credentials")]
    InvalidCredentials,
}

/// Check a login attempt against the stored account, if any.
///
/// An unknown user still costs one Argon2 verification.
pub fn authenticate<'a>(user: Option<&'a User>, password: &str) -> Result<&'a User, AuthError> {
    match user {
        Some(user) if verify_password(password, user.password_hash()) => Ok(user),
        Some(_) => Err(AuthError::InvalidCredentials),
        None => {
            verify_dummy(password);
            Err(AuthError::InvalidCredentials)
        }
    }
}

/// Convenience for callers reporting a taken username.
pub fn username_taken() -> DomainError {
    DomainError::field("username", "A user with that username already exists.")
}
