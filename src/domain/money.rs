use crate::error::{LedgerError, Result};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Number of decimal places carried by every currency value.
pub const SCALE: u32 = 2;

/// Brings `value` to exactly [`SCALE`] decimal places, refusing anything
/// that would need rounding.
fn to_currency(value: Decimal) -> Option<Decimal> {
    if value.normalize().scale() > SCALE {
        return None;
    }
    let mut scaled = value;
    scaled.rescale(SCALE);
    Some(scaled)
}

/// A non-negative monetary value with two decimal places.
///
/// Wraps `rust_decimal::Decimal` so that a Link balance can never be built
/// negative or with sub-cent precision.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(try_from = "Decimal", into = "Decimal")]
pub struct Money(Decimal);

/// A strictly positive monetary amount moved by a single transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "Decimal", into = "Decimal")]
pub struct Amount(Decimal);

impl Money {
    pub const ZERO: Self = Self(Decimal::from_parts(0, 0, 0, false, SCALE));

    pub fn new(value: Decimal) -> Result<Self> {
        if value.is_sign_negative() && !value.is_zero() {
            return Err(LedgerError::InvalidAmount(format!(
                "{value} is negative"
            )));
        }
        to_currency(value.abs())
            .map(Self)
            .ok_or_else(|| LedgerError::InvalidAmount(format!("{value} has sub-cent precision")))
    }

    pub fn value(&self) -> Decimal {
        self.0
    }

    /// Fails when the sum no longer fits at [`SCALE`] decimal places.
    pub fn credit(self, amount: Amount) -> Result<Self> {
        self.0
            .checked_add(amount.0)
            .filter(|sum| sum.scale() == SCALE)
            .map(Self)
            .ok_or_else(|| {
                LedgerError::InvalidAmount(format!("{self} + {amount} overflows the balance"))
            })
    }

    /// Returns `None` when `amount` exceeds the balance.
    pub fn debit(self, amount: Amount) -> Option<Self> {
        if amount.0 > self.0 {
            None
        } else {
            Some(Self(self.0 - amount.0))
        }
    }

    pub fn covers(&self, amount: Amount) -> bool {
        self.0 >= amount.0
    }
}

impl Amount {
    pub fn new(value: Decimal) -> Result<Self> {
        if value <= Decimal::ZERO {
            return Err(LedgerError::InvalidAmount(format!(
                "{value} must be positive"
            )));
        }
        to_currency(value)
            .map(Self)
            .ok_or_else(|| LedgerError::InvalidAmount(format!("{value} has sub-cent precision")))
    }

    pub fn value(&self) -> Decimal {
        self.0
    }
}

impl TryFrom<Decimal> for Money {
    type Error = LedgerError;

    fn try_from(value: Decimal) -> Result<Self> {
        Self::new(value)
    }
}

impl TryFrom<Decimal> for Amount {
    type Error = LedgerError;

    fn try_from(value: Decimal) -> Result<Self> {
        Self::new(value)
    }
}

impl From<Money> for Decimal {
    fn from(money: Money) -> Self {
        money.0
    }
}

impl From<Amount> for Decimal {
    fn from(amount: Amount) -> Self {
        amount.0
    }
}

impl From<Amount> for Money {
    fn from(amount: Amount) -> Self {
        Self(amount.0)
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}
