//! Storage ports used by the HTTP layer.
//!
//! Every method is async and returns `StoreError` for driver failures.
//! Domain absence is `Ok(None)` / `Ok(false)`, never an error.

use async_trait::async_trait;

use storefront_auth::User;
use storefront_catalog::Product;
use storefront_core::{ProductId, StoreError, UserId};
use storefront_orders::{Order, OrderUnitOfWork};

#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Insert a new user. A taken username is `StoreError::Constraint`.
    async fn insert_user(&self, user: &User) -> Result<(), StoreError>;

    async fn find_by_username(&self, username: &str) -> Result<Option<User>, StoreError>;

    async fn get_user(&self, id: UserId) -> Result<Option<User>, StoreError>;
}

#[async_trait]
pub trait ProductRepository: Send + Sync {
    /// All products, oldest first.
    async fn list_products(&self) -> Result<Vec<Product>, StoreError>;

    async fn get_product(&self, id: ProductId) -> Result<Option<Product>, StoreError>;

    async fn insert_product(&self, product: &Product) -> Result<(), StoreError>;

    /// Replace a stored product. Returns `false` when it does not exist.
    async fn update_product(&self, product: &Product) -> Result<bool, StoreError>;

    /// Returns `false` when it does not exist. A product still referenced by
    /// an order item is `StoreError::Constraint`.
    async fn delete_product(&self, id: ProductId) -> Result<bool, StoreError>;
}

#[async_trait]
pub trait OrderRepository: Send + Sync {
    /// Orders owned by `owner`, newest first.
    async fn list_orders_for(&self, owner: UserId) -> Result<Vec<Order>, StoreError>;

    /// Open a unit of work for placing one order.
    async fn begin(&self) -> Result<Box<dyn OrderTransaction>, StoreError>;
}

/// An open order-placement transaction.
///
/// Dropping it without calling `commit` discards everything staged.
#[async_trait]
pub trait OrderTransaction: OrderUnitOfWork {
    async fn commit(self: Box<Self>) -> Result<(), StoreError>;
}

/// The three repositories behind one handle.
pub trait Store: UserRepository + ProductRepository + OrderRepository {}

impl<T> Store for T where T: UserRepository + ProductRepository + OrderRepository {}
