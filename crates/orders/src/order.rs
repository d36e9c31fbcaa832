use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use storefront_catalog::{Product, ProductSnapshot};
use storefront_core::{
    DomainError, DomainResult, Entity, FieldErrors, Money, OrderId, ProductId, UserId,
};

/// Quantity used when a line omits it.
pub const DEFAULT_QUANTITY: u32 = 1;

/// Largest accepted line quantity.
pub const MAX_QUANTITY: u32 = i32::MAX as u32;

/// Order status.
///
/// Only `Pending` is ever produced; the other states exist so stored orders
/// from a fulfilment process can be read back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    #[default]
    Pending,
    Paid,
    Shipped,
    Delivered,
    Cancelled,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Paid => "paid",
            OrderStatus::Shipped => "shipped",
            OrderStatus::Delivered => "delivered",
            OrderStatus::Cancelled => "cancelled",
        }
    }
}

impl core::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl core::str::FromStr for OrderStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(OrderStatus::Pending),
            "paid" => Ok(OrderStatus::Paid),
            "shipped" => Ok(OrderStatus::Shipped),
            "delivered" => Ok(OrderStatus::Delivered),
            "cancelled" => Ok(OrderStatus::Cancelled),
            other => Err(DomainError::field("status", format!("\"{other}\" is not a valid choice."))),
        }
    }
}

/// One requested line of a new order, as supplied by the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderLineRequest {
    pub product_id: ProductId,
    /// Requested quantity; `None` means `DEFAULT_QUANTITY`.
    pub quantity: Option<i64>,
}

impl OrderLineRequest {
    pub fn new(product_id: ProductId, quantity: Option<i64>) -> Self {
        Self {
            product_id,
            quantity,
        }
    }
}

/// Check the shape of a cart before any product is looked up.
///
/// Returns the effective quantity of each line, in input order.
pub(crate) fn validate_lines(lines: &[OrderLineRequest]) -> DomainResult<Vec<u32>> {
    if lines.is_empty() {
        return Err(DomainError::field("order_items", "This list may not be empty."));
    }

    let mut errors = FieldErrors::new();
    let mut quantities = Vec::with_capacity(lines.len());
    for (idx, line) in lines.iter().enumerate() {
        let raw = line.quantity.unwrap_or(i64::from(DEFAULT_QUANTITY));
        if raw < 1 {
            errors.add(
                format!("order_items[{idx}].quantity"),
                "Ensure this value is greater than or equal to 1.",
            );
        } else if raw > i64::from(MAX_QUANTITY) {
            errors.add(
                format!("order_items[{idx}].quantity"),
                format!("Ensure this value is less than or equal to {MAX_QUANTITY}."),
            );
        } else {
            quantities.push(raw as u32);
        }
    }
    errors.into_result()?;
    Ok(quantities)
}

/// A line of a placed order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderItem {
    product: ProductSnapshot,
    quantity: u32,
}

impl OrderItem {
    pub fn new(product: ProductSnapshot, quantity: u32) -> Self {
        Self { product, quantity }
    }

    pub fn product(&self) -> &ProductSnapshot {
        &self.product
    }

    pub fn product_id(&self) -> ProductId {
        self.product.id
    }

    pub fn quantity(&self) -> u32 {
        self.quantity
    }

    pub fn line_total(&self) -> Option<Money> {
        self.product.price.checked_mul_quantity(self.quantity)
    }
}

/// An order being priced, before it has an id.
///
/// The running total is updated as each line is added, in input order.
#[derive(Debug, Clone)]
pub struct OrderDraft {
    owner: UserId,
    items: Vec<OrderItem>,
    total: Money,
}

impl OrderDraft {
    pub fn new(owner: UserId) -> Self {
        Self {
            owner,
            items: Vec::new(),
            total: Money::ZERO,
        }
    }

    /// Price one line against the product's current (server-side) price.
    ///
    /// The running total must stay a valid `Money` amount.
    pub fn add_item(&mut self, product: &Product, quantity: u32) -> DomainResult<()> {
        let too_large = || DomainError::field("order_items", "Order total is too large.");
        let item = OrderItem::new(product.snapshot(), quantity);
        let total = item
            .line_total()
            .and_then(|line| self.total.checked_add(line))
            .ok_or_else(too_large)?;
        self.total = Money::new(total.amount()).map_err(|_| too_large())?;
        self.items.push(item);
        Ok(())
    }

    pub fn total(&self) -> Money {
        self.total
    }

    pub fn place(self, id: OrderId, created_at: DateTime<Utc>) -> DomainResult<Order> {
        if self.items.is_empty() {
            return Err(DomainError::field("order_items", "This list may not be empty."));
        }
        Ok(Order {
            id,
            owner: self.owner,
            items: self.items,
            total: self.total,
            status: OrderStatus::default(),
            created_at,
        })
    }
}

/// A placed order.
///
/// # Invariants
/// - At least one item.
/// - `total == Σ item.product.price * item.quantity`.
/// - `owner`, `created_at` and the items never change after placement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Order {
    id: OrderId,
    owner: UserId,
    items: Vec<OrderItem>,
    total: Money,
    status: OrderStatus,
    created_at: DateTime<Utc>,
}

impl Order {
    /// Rebuild an order from storage, re-checking the total.
    pub fn restore(
        id: OrderId,
        owner: UserId,
        items: Vec<OrderItem>,
        total: Money,
        status: OrderStatus,
        created_at: DateTime<Utc>,
    ) -> DomainResult<Self> {
        let computed = sum_items(&items)
            .ok_or_else(|| DomainError::invariant(format!("order {id}: total overflows")))?;
        if computed != total {
            return Err(DomainError::invariant(format!(
                "order {id}: stored total {total} does not match lines ({computed})"
            )));
        }
        if items.is_empty() {
            return Err(DomainError::invariant(format!("order {id}: has no items")));
        }
        Ok(Self {
            id,
            owner,
            items,
            total,
            status,
            created_at,
        })
    }

    pub fn owner(&self) -> UserId {
        self.owner
    }

    pub fn items(&self) -> &[OrderItem] {
        &self.items
    }

    pub fn total(&self) -> Money {
        self.total
    }

    pub fn status(&self) -> OrderStatus {
        self.status
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn references(&self, product_id: ProductId) -> bool {
        self.items.iter().any(|i| i.product_id() == product_id)
    }
}

impl Entity for Order {
    type Id = OrderId;

    fn id(&self) -> Self::Id {
        self.id
    }
}

fn sum_items(items: &[OrderItem]) -> Option<Money> {
    items
        .iter()
        .try_fold(Money::ZERO, |acc, item| acc.checked_add(item.line_total()?))
}
