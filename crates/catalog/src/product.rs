use serde::{Deserialize, Serialize};

use storefront_core::{DomainResult, Entity, FieldErrors, Money, ProductId, ValueObject};

/// Maximum length (in characters) of a product name.
pub const NAME_MAX_LEN: usize = 255;

/// Maximum length (in characters) of a product category.
pub const CATEGORY_MAX_LEN: usize = 100;

/// A catalog product.
///
/// # Invariants
/// - `name` and `category` are non-blank and within their length limits.
/// - `price` is a valid non-negative `Money`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Product {
    id: ProductId,
    name: String,
    description: String,
    price: Money,
    category: String,
}

impl Product {
    /// Materialize a validated `NewProduct` under the given id.
    pub fn create(id: ProductId, new: NewProduct) -> Self {
        Self {
            id,
            name: new.name,
            description: new.description,
            price: new.price,
            category: new.category,
        }
    }

    /// Rebuild a product from stored columns, re-checking field rules.
    pub fn restore(
        id: ProductId,
        name: String,
        description: String,
        price: Money,
        category: String,
    ) -> DomainResult<Self> {
        let new = NewProduct::new(name, description, price, category)?;
        Ok(Self::create(id, new))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn price(&self) -> Money {
        self.price
    }

    pub fn category(&self) -> &str {
        &self.category
    }

    /// Apply a (validated) change set, returning the updated product.
    ///
    /// Fields absent from `changes` keep their current value.
    pub fn apply(&self, changes: ProductChanges) -> DomainResult<Self> {
        changes.validate()?;
        Ok(Self {
            id: self.id,
            name: changes.name.map(|n| n.trim().to_string()).unwrap_or_else(|| self.name.clone()),
            description: changes.description.unwrap_or_else(|| self.description.clone()),
            price: changes.price.unwrap_or(self.price),
            category: changes
                .category
                .map(|c| c.trim().to_string())
                .unwrap_or_else(|| self.category.clone()),
        })
    }

    /// Freeze the current state for embedding in an order line.
    pub fn snapshot(&self) -> ProductSnapshot {
        ProductSnapshot {
            id: self.id,
            name: self.name.clone(),
            description: self.description.clone(),
            price: self.price,
            category: self.category.clone(),
        }
    }
}

impl Entity for Product {
    type Id = ProductId;

    fn id(&self) -> Self::Id {
        self.id
    }
}

/// Validated input for creating (or fully replacing) a product.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewProduct {
    name: String,
    description: String,
    price: Money,
    category: String,
}

impl NewProduct {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        price: Money,
        category: impl Into<String>,
    ) -> DomainResult<Self> {
        let name = name.into().trim().to_string();
        let category = category.into().trim().to_string();

        let mut errors = FieldErrors::new();
        check_text(&mut errors, "name", &name, NAME_MAX_LEN);
        check_text(&mut errors, "category", &category, CATEGORY_MAX_LEN);
        errors.into_result()?;

        Ok(Self {
            name,
            description: description.into(),
            price,
            category,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn price(&self) -> Money {
        self.price
    }

    /// Express a full replacement (PUT) as a change set touching every field.
    pub fn into_changes(self) -> ProductChanges {
        ProductChanges {
            name: Some(self.name),
            description: Some(self.description),
            price: Some(self.price),
            category: Some(self.category),
        }
    }
}

/// Partial update of a product (PATCH semantics).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProductChanges {
    pub name: Option<String>,
    pub description: Option<String>,
    pub price: Option<Money>,
    pub category: Option<String>,
}

impl ProductChanges {
    pub fn validate(&self) -> DomainResult<()> {
        let mut errors = FieldErrors::new();
        if let Some(name) = &self.name {
            check_text(&mut errors, "name", name.trim(), NAME_MAX_LEN);
        }
        if let Some(category) = &self.category {
            check_text(&mut errors, "category", category.trim(), CATEGORY_MAX_LEN);
        }
        errors.into_result()
    }
}

/// Product fields as they were when an order line was priced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductSnapshot {
    pub id: ProductId,
    pub name: String,
    pub description: String,
    pub price: Money,
    pub category: String,
}

impl ValueObject for ProductSnapshot {}

fn check_text(errors: &mut FieldErrors, field: &str, value: &str, max_len: usize) {
    if value.is_empty() {
        errors.add(field, "This field may not be blank.");
    } else if value.chars().count() > max_len {
        errors.add(
            field,
            format!("Ensure this field has no more than {max_len} characters."),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use storefront_core::DomainError;

    fn price(s: &str) -> Money {
        Money::parse(s).unwrap()
    }

    fn widget() -> Product {
        let new = NewProduct::new("Widget", "A widget", price("10.99"), "Tools").unwrap();
        Product::create(ProductId::new(), new)
    }

    #[test]
    fn new_product_trims_and_keeps_fields() {
        let new = NewProduct::new("  Widget ", "desc", price("1.50"), " Tools ").unwrap();
        let product = Product::create(ProductId::new(), new);
        assert_eq!(product.name(), "Widget");
        assert_eq!(product.category(), "Tools");
        assert_eq!(product.price().to_string(), "1.50");
    }

    #[test]
    fn blank_fields_are_reported_together() {
        let err = NewProduct::new(" ", "", price("1.00"), "").unwrap_err();
        match err {
            DomainError::Validation(fields) => {
                assert!(fields.get("name").is_some());
                assert!(fields.get("category").is_some());
                assert!(fields.get("description").is_none());
            }
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn overlong_name_is_rejected() {
        let name = "x".repeat(NAME_MAX_LEN + 1);
        assert!(NewProduct::new(name, "", price("1.00"), "Tools").is_err());
    }

    #[test]
    fn partial_update_keeps_untouched_fields() {
        let product = widget();
        let updated = product
            .apply(ProductChanges {
                price: Some(price("12.00")),
                ..Default::default()
            })
            .unwrap();

        assert_eq!(updated.id(), product.id());
        assert_eq!(updated.name(), "Widget");
        assert_eq!(updated.description(), "A widget");
        assert_eq!(updated.price(), price("12.00"));
    }

    #[test]
    fn update_cannot_blank_a_required_field() {
        let product = widget();
        let err = product
            .apply(ProductChanges {
                name: Some("   ".to_string()),
                ..Default::default()
            })
            .unwrap_err();
        assert_eq!(err, DomainError::field("name", "This field may not be blank."));
    }

    #[test]
    fn snapshot_freezes_current_state() {
        let product = widget();
        let snapshot = product.snapshot();
        let updated = product
            .apply(ProductChanges {
                price: Some(price("99.00")),
                ..Default::default()
            })
            .unwrap();

        assert_eq!(snapshot.price, price("10.99"));
        assert_eq!(updated.price(), price("99.00"));
        assert_eq!(snapshot.id, updated.id());
    }

    #[test]
    fn full_replacement_touches_every_field() {
        let new = NewProduct::new("Gadget", "", price("3.00"), "Toys").unwrap();
        let changes = new.into_changes();
        assert!(changes.name.is_some() && changes.price.is_some());
        let replaced = widget().apply(changes).unwrap();
        assert_eq!(replaced.name(), "Gadget");
        assert_eq!(replaced.description(), "");
        assert_eq!(replaced.category(), "Toys");
    }

    mod proptest_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            /// Property: applying an empty change set is the identity.
            #[test]
            fn empty_changes_are_identity(
                name in "[A-Za-z][A-Za-z0-9 ]{0,50}",
                category in "[A-Za-z]{1,20}",
                cents in 0i64..10_000_000i64,
            ) {
                let new = NewProduct::new(
                    name,
                    "",
                    Money::from_minor_units(cents).unwrap(),
                    category,
                ).unwrap();
                let product = Product::create(ProductId::new(), new);
                let same = product.apply(ProductChanges::default()).unwrap();
                prop_assert_eq!(same, product);
            }
        }
    }
}
