//! Monetary amounts.

use core::str::FromStr;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::{DomainError, DomainResult};
use crate::value_object::ValueObject;

/// Digits after the decimal point every amount is stored with.
pub const MONEY_SCALE: u32 = 2;

/// Maximum number of significant digits (integer + fractional part).
pub const MONEY_MAX_DIGITS: u32 = 10;

/// A non-negative monetary amount with two fractional digits.
///
/// Serializes as a decimal string (`"21.98"`) so clients never see binary
/// floating point; deserializes from either a string or a JSON number.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "Decimal", into = "Decimal")]
pub struct Money(Decimal);

impl ValueObject for Money {}

impl Money {
    pub const ZERO: Money = Money(Decimal::ZERO);

    /// Validate a raw decimal as a price.
    ///
    /// Trailing zeros are ignored when counting fractional digits, so
    /// `10.990` is accepted as `10.99` while `10.991` is rejected.
    pub fn new(amount: Decimal) -> DomainResult<Self> {
        let normalized = amount.normalize();
        if normalized.is_sign_negative() && !normalized.is_zero() {
            return Err(DomainError::field(
                "price",
                "Ensure this value is greater than or equal to 0.",
            ));
        }
        if normalized.scale() > MONEY_SCALE {
            return Err(DomainError::field(
                "price",
                format!("Ensure that there are no more than {MONEY_SCALE} decimal places."),
            ));
        }

        let mut scaled = normalized.abs();
        scaled.rescale(MONEY_SCALE);
        if digit_count(scaled) > MONEY_MAX_DIGITS {
            return Err(DomainError::field(
                "price",
                format!("Ensure that there are no more than {MONEY_MAX_DIGITS} digits in total."),
            ));
        }
        Ok(Self(scaled))
    }

    /// Parse and validate a textual amount (e.g. `"10.99"`).
    pub fn parse(s: &str) -> DomainResult<Self> {
        let amount = Decimal::from_str(s.trim())
            .map_err(|_| DomainError::field("price", "A valid number is required."))?;
        Self::new(amount)
    }

    /// Amount in the smallest currency unit (cents).
    pub fn from_minor_units(cents: i64) -> DomainResult<Self> {
        Self::new(Decimal::new(cents, MONEY_SCALE))
    }

    pub fn amount(&self) -> Decimal {
        self.0
    }

    /// `self * quantity`, or `None` on overflow.
    pub fn checked_mul_quantity(self, quantity: u32) -> Option<Self> {
        self.0.checked_mul(Decimal::from(quantity)).map(Self::rescaled)
    }

    /// `self + other`, or `None` on overflow.
    pub fn checked_add(self, other: Money) -> Option<Self> {
        self.0.checked_add(other.0).map(Self::rescaled)
    }

    fn rescaled(mut amount: Decimal) -> Self {
        amount.rescale(MONEY_SCALE);
        Self(amount)
    }
}

impl Default for Money {
    fn default() -> Self {
        Self::ZERO
    }
}

impl core::fmt::Display for Money {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

impl TryFrom<Decimal> for Money {
    type Error = DomainError;

    fn try_from(value: Decimal) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Money> for Decimal {
    fn from(value: Money) -> Self {
        value.0
    }
}

impl FromStr for Money {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

fn digit_count(amount: Decimal) -> u32 {
    let mantissa = amount.mantissa().unsigned_abs();
    if mantissa == 0 {
        1
    } else {
        mantissa.ilog10() + 1
    }
}
