//! Password strength policy and hashing.

use std::sync::LazyLock;

use argon2::Argon2;
use argon2::password_hash::{
    PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Frequently used passwords rejected when `reject_common` is on.
const COMMON_PASSWORDS: &[&str] = &[
    "123456", "12345678", "123456789", "1234567890", "password", "password1", "password12",
    "password123", "qwerty", "qwerty123", "qwertyuiop", "abc123", "111111", "000000", "iloveyou",
    "admin", "admin123", "welcome", "welcome1", "letmein", "monkey", "dragon", "football",
    "baseball", "sunshine", "princess", "master", "shadow", "superman", "trustno1", "passw0rd",
    "starwars", "whatever", "freedom", "hello123", "login", "changeme", "secret", "zaq12wsx",
    "1q2w3e4r", "1qaz2wsx", "asdfghjkl", "michael", "jennifer", "charlie", "access",
];

/// Configurable password strength rules.
///
/// Each failing rule contributes its own message, so a caller sees every
/// reason at once.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PasswordPolicy {
    /// Minimum number of characters.
    pub min_length: usize,
    /// Reject passwords made only of digits.
    pub reject_numeric: bool,
    /// Reject passwords found in the built-in common list.
    pub reject_common: bool,
    /// Reject passwords equal to or containing the username / email local part.
    pub reject_similar_to_user: bool,
}

impl Default for PasswordPolicy {
    fn default() -> Self {
        Self {
            min_length: 8,
            reject_numeric: true,
            reject_common: true,
            reject_similar_to_user: true,
        }
    }
}

impl PasswordPolicy {
    /// Check `password` for a user with the given attributes.
    ///
    /// Returns the list of violation messages (empty when acceptable).
    pub fn check(&self, password: &str, username: &str, email: &str) -> Vec<String> {
        let mut problems = Vec::new();

        if password.chars().count() < self.min_length {
            problems.push(format!(
                "This password is too short. It must contain at least {} characters.",
                self.min_length
            ));
        }

        if self.reject_numeric && !password.is_empty() && password.chars().all(|c| c.is_ascii_digit()) {
            problems.push("This password is entirely numeric.".to_string());
        }

        let lowered = password.to_lowercase();
        if self.reject_common && COMMON_PASSWORDS.contains(&lowered.as_str()) {
            problems.push("This password is too common.".to_string());
        }

        if self.reject_similar_to_user {
            let local_part = email.split('@').next().unwrap_or_default();
            let similar = [("username", username), ("email address", local_part)]
                .into_iter()
                .find(|(_, attr)| {
                    let attr = attr.to_lowercase();
                    attr.chars().count() >= 3 && lowered.contains(&attr)
                });
            if let Some((label, _)) = similar {
                problems.push(format!("The password is too similar to the {label}."));
            }
        }

        problems
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("password hashing failed: {0}")]
pub struct PasswordHashError(String);

/// Hash a password with Argon2id and a fresh random salt (PHC string format).
pub fn hash_password(password: &str) -> Result<String, PasswordHashError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| PasswordHashError(e.to_string()))
}

/// Check `password` against a stored PHC hash.
///
/// A malformed stored hash never verifies.
pub fn verify_password(password: &str, stored_hash: &str) -> bool {
    match PasswordHash::new(stored_hash) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(e) => {
            tracing::warn!(error = %e, "stored password hash is malformed");
            false
        }
    }
}

/// Verified against when a login names no account, so that path runs the
/// same Argon2 work as a wrong password.
static DUMMY_HASH: LazyLock<Option<String>> =
    LazyLock::new(|| hash_password("no-such-account-placeholder").ok());

/// One Argon2 verification whose result is discarded.
pub(crate) fn verify_dummy(password: &str) {
    if let Some(hash) = DUMMY_HASH.as_deref() {
        let _ = verify_password(password, hash);
    }
}
