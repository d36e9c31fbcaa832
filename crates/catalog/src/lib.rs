//! Catalog domain module.
//!
//! Products and their field rules, implemented purely as deterministic domain
//! logic (no IO, no HTTP, no storage).

pub mod product;

pub use product::{
    NewProduct, Product, ProductChanges, ProductSnapshot, CATEGORY_MAX_LEN, NAME_MAX_LEN,
};
