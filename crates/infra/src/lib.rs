//! Infrastructure layer: repository ports and their in-memory / Postgres
//! implementations.

pub mod memory;
pub mod postgres;
pub mod repository;

pub use memory::InMemoryStore;
pub use postgres::PostgresStore;
pub use repository::{
    OrderRepository, OrderTransaction, ProductRepository, Store, UserRepository,
};
