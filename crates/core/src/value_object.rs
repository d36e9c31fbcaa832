//! Value object trait: equality by value, not identity.

/// Marker trait for value objects.
///
/// Value objects carry no identity and never change once built. `Money` is
/// the canonical example here; an order line's product snapshot is another
/// (it freezes what the product looked like when the order was priced).
///
/// ```ignore
/// let a = Money::parse("10.99")?;
/// let b = Money::parse("10.990")?;
/// assert_eq!(a, b); // equal by value
/// ```
pub trait ValueObject: Clone + PartialEq + core::fmt::Debug {}
