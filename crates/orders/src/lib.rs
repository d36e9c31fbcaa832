//! Orders domain module.
//!
//! `order` holds the order aggregate and its line items; `assembler` turns a
//! caller's cart into a priced, persisted order through a transactional unit
//! of work supplied by the storage layer.

pub mod assembler;
pub mod order;

pub use assembler::{OrderError, OrderUnitOfWork, create_order};
pub use order::{
    DEFAULT_QUANTITY, MAX_QUANTITY, Order, OrderDraft, OrderItem, OrderLineRequest, OrderStatus,
};
