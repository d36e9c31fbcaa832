//! Request/response DTOs and their mapping to domain types.
//!
//! Request fields are optional at the serde level so that a missing field
//! becomes a field-level validation message rather than a body rejection.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use storefront_auth::{CredentialPair, Registration, User};
use storefront_catalog::{NewProduct, Product, ProductChanges, ProductSnapshot};
use storefront_core::{DomainResult, Entity, FieldErrors, Money, OrderId, ProductId, UserId};
use storefront_orders::{Order, OrderLineRequest, OrderStatus};

const REQUIRED: &str = "This field is required.";

// -------------------------
// Request DTOs
// -------------------------

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub username: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    pub password2: Option<String>,
}

impl RegisterRequest {
    pub fn into_registration(self) -> DomainResult<Registration> {
        let mut errors = FieldErrors::new();
        let username = required(&mut errors, "username", self.username);
        let password = required(&mut errors, "password", self.password);
        let password2 = required(&mut errors, "password2", self.password2);
        errors.into_result()?;
        Ok(Registration::new(
            username,
            self.email.unwrap_or_default(),
            password,
            password2,
        ))
    }
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: Option<String>,
    pub password: Option<String>,
}

impl LoginRequest {
    pub fn into_parts(self) -> DomainResult<(String, String)> {
        let mut errors = FieldErrors::new();
        let username = required(&mut errors, "username", self.username);
        let password = required(&mut errors, "password", self.password);
        errors.into_result()?;
        // Registration stores usernames trimmed.
        Ok((username.trim().to_string(), password))
    }
}

#[derive(Debug, Deserialize)]
pub struct RefreshRequest {
    pub refresh: Option<String>,
}

impl RefreshRequest {
    pub fn into_token(self) -> DomainResult<String> {
        let mut errors = FieldErrors::new();
        let token = required(&mut errors, "refresh", self.refresh);
        errors.into_result()?;
        Ok(token)
    }
}

/// Body of `POST /products/`, `PUT /products/{id}/` and `PATCH /products/{id}/`.
#[derive(Debug, Default, Deserialize)]
pub struct ProductRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    pub price: Option<Decimal>,
    pub category: Option<String>,
}

impl ProductRequest {
    /// Full representation: every field but `description` must be present.
    pub fn into_new_product(self) -> DomainResult<NewProduct> {
        let mut errors = FieldErrors::new();
        let name = required(&mut errors, "name", self.name);
        let category = required(&mut errors, "category", self.category);
        let price = match self.price {
            Some(p) => parse_price(&mut errors, p),
            None => {
                errors.add("price", REQUIRED);
                None
            }
        };
        errors.into_result()?;
        NewProduct::new(
            name,
            self.description.unwrap_or_default(),
            price.unwrap_or(Money::ZERO),
            category,
        )
    }

    /// Partial representation: only the fields present are changed.
    pub fn into_changes(self) -> DomainResult<ProductChanges> {
        let mut errors = FieldErrors::new();
        let price = self.price.and_then(|p| parse_price(&mut errors, p));
        errors.into_result()?;
        let changes = ProductChanges {
            name: self.name,
            description: self.description,
            price,
            category: self.category,
        };
        changes.validate()?;
        Ok(changes)
    }
}

#[derive(Debug, Deserialize)]
pub struct CreateOrderRequest {
    pub order_items: Option<Vec<OrderItemRequest>>,
}

#[derive(Debug, Deserialize)]
pub struct OrderItemRequest {
    /// Kept as text so a malformed id is reported against its line.
    pub product_id: Option<String>,
    pub quantity: Option<i64>,
}

impl CreateOrderRequest {
    pub fn into_lines(self) -> DomainResult<Vec<OrderLineRequest>> {
        let Some(items) = self.order_items else {
            return Err(FieldErrors::single("order_items", REQUIRED).into());
        };

        let mut errors = FieldErrors::new();
        let mut lines = Vec::with_capacity(items.len());
        for (idx, item) in items.into_iter().enumerate() {
            let field = format!("order_items[{idx}].product_id");
            match item.product_id {
                Some(raw) => match raw.parse::<ProductId>() {
                    Ok(product_id) => lines.push(OrderLineRequest::new(product_id, item.quantity)),
                    Err(_) => errors.add(
                        field,
                        format!("Invalid pk \"{raw}\" - object does not exist."),
                    ),
                },
                None => errors.add(field, REQUIRED),
            }
        }
        errors.into_result()?;
        Ok(lines)
    }
}

fn required(errors: &mut FieldErrors, field: &str, value: Option<String>) -> String {
    match value {
        Some(v) => v,
        None => {
            errors.add(field, REQUIRED);
            String::new()
        }
    }
}

fn parse_price(errors: &mut FieldErrors, raw: Decimal) -> Option<Money> {
    match Money::new(raw) {
        Ok(money) => Some(money),
        Err(storefront_core::DomainError::Validation(fields)) => {
            errors.extend(fields);
            None
        }
        Err(other) => {
            errors.add("price", other.to_string());
            None
        }
    }
}

// -------------------------
// Response DTOs
// -------------------------

#[derive(Debug, Serialize)]
pub struct RegisterResponse {
    pub id: UserId,
    pub username: String,
    pub email: String,
    pub access: String,
    pub refresh: String,
}

impl RegisterResponse {
    pub fn new(user: &User, tokens: CredentialPair) -> Self {
        Self {
            id: user.id(),
            username: user.username().to_string(),
            email: user.email().to_string(),
            access: tokens.access,
            refresh: tokens.refresh,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct AccessResponse {
    pub access: String,
}

#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct ProductResponse {
    pub id: ProductId,
    pub name: String,
    pub description: String,
    pub price: Money,
    pub category: String,
}

impl From<&Product> for ProductResponse {
    fn from(p: &Product) -> Self {
        Self {
            id: p.id(),
            name: p.name().to_string(),
            description: p.description().to_string(),
            price: p.price(),
            category: p.category().to_string(),
        }
    }
}

impl From<&ProductSnapshot> for ProductResponse {
    fn from(p: &ProductSnapshot) -> Self {
        Self {
            id: p.id,
            name: p.name.clone(),
            description: p.description.clone(),
            price: p.price,
            category: p.category.clone(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct OrderItemResponse {
    pub product: ProductResponse,
    pub quantity: u32,
}

#[derive(Debug, Serialize)]
pub struct OrderResponse {
    pub id: OrderId,
    pub user: UserId,
    pub order_items: Vec<OrderItemResponse>,
    pub total: Money,
    pub status: OrderStatus,
    pub created_at: DateTime<Utc>,
}

impl From<&Order> for OrderResponse {
    fn from(o: &Order) -> Self {
        Self {
            id: o.id(),
            user: o.owner(),
            order_items: o
                .items()
                .iter()
                .map(|item| OrderItemResponse {
                    product: ProductResponse::from(item.product()),
                    quantity: item.quantity(),
                })
                .collect(),
            total: o.total(),
            status: o.status(),
            created_at: o.created_at(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}
