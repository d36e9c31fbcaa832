//! `storefront-auth`: authentication and authorization boundary.
//!
//! Users and registration rules, password policy and hashing, signed
//! access/refresh credentials, and the per-endpoint access policies.
//! This crate is intentionally decoupled from HTTP and storage.

pub mod claims;
pub mod password;
pub mod policy;
pub mod tokens;
pub mod user;

pub use claims::{JwtClaims, TokenKind, TokenValidationError, validate_claims};
pub use password::{PasswordHashError, PasswordPolicy, hash_password, verify_password};
pub use policy::{Access, AccessPolicy, AuthzError, Principal, authorize};
pub use tokens::{CredentialIssuer, CredentialPair, Hs256Credentials, TokenError, TokenValidator};
pub use user::{AuthError, Registration, User, authenticate, username_taken};
