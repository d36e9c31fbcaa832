//! Order assembly: cart lines in, priced and persisted order out.
//!
//! The assembler never commits. It reads prices and saves the order through
//! an [`OrderUnitOfWork`] that the storage layer backs with one transaction;
//! the caller commits after `create_order` returns `Ok` and otherwise drops
//! the unit of work, which rolls everything back.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;
use tracing::instrument;

use storefront_catalog::Product;
use storefront_core::{DomainError, Entity, FieldErrors, OrderId, ProductId, StoreError, UserId};

use crate::order::{Order, OrderDraft, OrderLineRequest, validate_lines};

/// Transaction-scoped access the assembler needs from storage.
///
/// Implementations must read and write through the same transaction, and
/// must keep every product returned by `product_for_pricing` from changing
/// until that transaction ends.
#[async_trait]
pub trait OrderUnitOfWork: Send {
    /// Look up (and lock) a product for pricing.
    async fn product_for_pricing(&mut self, id: ProductId) -> Result<Option<Product>, StoreError>;

    /// Stage the order and its items for commit.
    async fn save_order(&mut self, order: &Order) -> Result<(), StoreError>;
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum OrderError {
    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Build, price and stage a new order for `owner`.
///
/// Lines are validated first (non-empty, positive quantities), then every
/// product is resolved inside the unit of work, then the order is saved.
/// An unknown product fails the whole call with a field error naming the
/// offending line; nothing is saved in that case.
#[instrument(skip(uow, lines), fields(owner = %owner, line_count = lines.len()), err)]
pub async fn create_order<U>(
    uow: &mut U,
    owner: UserId,
    lines: &[OrderLineRequest],
    now: DateTime<Utc>,
) -> Result<Order, OrderError>
where
    U: OrderUnitOfWork + ?Sized,
{
    let quantities = validate_lines(lines)?;

    let mut draft = OrderDraft::new(owner);
    let mut missing = FieldErrors::new();
    for (idx, (line, quantity)) in lines.iter().zip(quantities).enumerate() {
        match uow.product_for_pricing(line.product_id).await? {
            Some(product) => draft.add_item(&product, quantity)?,
            None => missing.add(
                format!("order_items[{idx}].product_id"),
                format!("Invalid pk \"{}\" - object does not exist.", line.product_id),
            ),
        }
    }
    missing.into_result()?;

    let order = draft.place(OrderId::new(), now)?;
    uow.save_order(&order).await?;

    tracing::info!(order_id = %order.id(), total = %order.total(), "order assembled");
    Ok(order)
}
