use crate::error::SettlementError;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A strictly positive monetary amount.
///
/// Wrapper around `rust_decimal::Decimal` so that obligation base amounts and
/// payment amounts can never be zero or negative.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
pub struct Amount(Decimal);

impl Amount {
    pub fn new(value: Decimal) -> Result<Self, SettlementError> {
        if value > Decimal::ZERO {
            Ok(Self(value))
        } else {
            Err(SettlementError::ValidationError(
                "amount must be positive".to_string(),
            ))
        }
    }

    pub fn value(&self) -> Decimal {
        self.0
    }
}

impl TryFrom<Decimal> for Amount {
    type Error = SettlementError;

    fn try_from(value: Decimal) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Amount> for Decimal {
    fn from(amount: Amount) -> Self {
        amount.0
    }
}

/// A percentage interest rate in the closed range `0..=100`.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
pub struct InterestRate(Decimal);

impl InterestRate {
    pub fn new(value: Decimal) -> Result<Self, SettlementError> {
        if value >= Decimal::ZERO && value <= Decimal::from(100) {
            Ok(Self(value))
        } else {
            Err(SettlementError::ValidationError(
                "interest rate must be between 0 and 100".to_string(),
            ))
        }
    }

    pub fn value(&self) -> Decimal {
        self.0
    }

    /// `base * (1 + rate / 100)`.
    pub fn apply(&self, base: Decimal) -> Decimal {
        base * (Decimal::ONE + self.0 / Decimal::from(100))
    }
}

impl TryFrom<Decimal> for InterestRate {
    type Error = SettlementError;

    fn try_from(value: Decimal) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}
