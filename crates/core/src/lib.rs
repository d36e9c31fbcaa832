//! `storefront-core`: domain foundation building blocks.
//!
//! This crate contains **pure domain** primitives shared by the catalog,
//! orders and auth crates (no HTTP, no storage drivers).

pub mod entity;
pub mod error;
pub mod id;
pub mod money;
pub mod value_object;

pub use entity::Entity;
pub use error::{DomainError, DomainResult, FieldErrors, StoreError};
pub use id::{OrderId, ProductId, UserId};
pub use money::Money;
pub use value_object::ValueObject;
