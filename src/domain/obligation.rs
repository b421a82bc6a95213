use crate::domain::money::{Amount, InterestRate};
use crate::domain::status::PaymentStatus;
use crate::error::{Result, SettlementError};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

pub type ObligationId = u32;
pub type CategoryId = u32;
pub type ServiceTypeId = u32;
pub type PropertyId = u32;

/// The two obligation families. They are structurally parallel but never
/// share a table: ids are assigned per family and lookups are family-scoped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Family {
    General,
    Service,
}

impl Family {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::General => "general",
            Self::Service => "service",
        }
    }
}

/// Family-specific attributes of an obligation.
///
/// `legacy_status` on the service kind mirrors a historical numeric status
/// column that coexisted with the status reference and was never reconciled
/// with it. It is carried for migration fidelity only; the engine neither
/// reads nor updates it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", tag = "family")]
pub enum ObligationKind {
    General {
        category_id: CategoryId,
        property_id: Option<PropertyId>,
    },
    Service {
        service_type_id: ServiceTypeId,
        legacy_status: i32,
    },
}

impl ObligationKind {
    pub fn family(&self) -> Family {
        match self {
            Self::General { .. } => Family::General,
            Self::Service { .. } => Family::Service,
        }
    }
}

/// A recurring or one-off financial obligation owed by a property or by the
/// condominium as a whole.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Obligation {
    pub id: ObligationId,
    pub kind: ObligationKind,
    pub start_date: NaiveDate,
    pub due_date: NaiveDate,
    pub base_amount: Amount,
    pub interest_amount: Option<Decimal>,
    pub interest_rate: Option<InterestRate>,
    pub description: String,
    pub status: PaymentStatus,
}

impl Obligation {
    pub fn family(&self) -> Family {
        self.kind.family()
    }

    /// Amount a settlement has to cover.
    ///
    /// With a percentage rate the flat interest amount is ignored; without
    /// one the flat amount (or zero) is added to the base.
    pub fn total_due(&self) -> Decimal {
        match self.interest_rate {
            Some(rate) => rate.apply(self.base_amount.value()),
            None => self.base_amount.value() + self.interest_amount.unwrap_or(Decimal::ZERO),
        }
    }
}

/// Creation input for an obligation. The status is mandatory: drafts carry no
/// default, so callers must state the initial lifecycle state explicitly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObligationDraft {
    pub kind: ObligationKind,
    pub start_date: NaiveDate,
    pub due_date: NaiveDate,
    pub base_amount: Amount,
    pub interest_amount: Option<Decimal>,
    pub interest_rate: Option<InterestRate>,
    pub description: String,
    pub status: PaymentStatus,
}

impl ObligationDraft {
    pub fn family(&self) -> Family {
        self.kind.family()
    }

    /// Field-level validation shared by create and update.
    ///
    /// Date ordering is only enforced for service obligations; general
    /// obligations historically never carried that check.
    pub fn validate(&self) -> Result<()> {
        if let Some(interest) = self.interest_amount
            && interest < Decimal::ZERO
        {
            return Err(SettlementError::ValidationError(
                "interest amount must not be negative".to_string(),
            ));
        }
        if self.description.trim().is_empty() {
            return Err(SettlementError::ValidationError(
                "description is required".to_string(),
            ));
        }
        if self.family() == Family::Service && self.due_date <= self.start_date {
            return Err(SettlementError::ValidationError(
                "due date must be after the start date".to_string(),
            ));
        }
        Ok(())
    }

    pub fn into_obligation(self, id: ObligationId) -> Obligation {
        Obligation {
            id,
            kind: self.kind,
            start_date: self.start_date,
            due_date: self.due_date,
            base_amount: self.base_amount,
            interest_amount: self.interest_amount,
            interest_rate: self.interest_rate,
            description: self.description,
            status: self.status,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn draft(kind: ObligationKind) -> ObligationDraft {
        ObligationDraft {
            kind,
            start_date: NaiveDate::from_ymd_opt(2026, 1, 1).unwrap(),
            due_date: NaiveDate::from_ymd_opt(2026, 2, 1).unwrap(),
            base_amount: Amount::new(dec!(100)).unwrap(),
            interest_amount: None,
            interest_rate: None,
            description: "monthly expense".to_string(),
            status: PaymentStatus::Pending,
        }
    }

    fn obligation(
        interest_amount: Option<Decimal>,
        interest_rate: Option<Decimal>,
    ) -> Obligation {
        let mut d = draft(ObligationKind::General {
            category_id: 1,
            property_id: None,
        });
        d.interest_amount = interest_amount;
        d.interest_rate = interest_rate.map(|r| InterestRate::new(r).unwrap());
        d.into_obligation(1)
    }

    #[test]
    fn test_total_due_with_rate() {
        let o = obligation(None, Some(dec!(10)));
        assert_eq!(o.total_due(), dec!(110.00));
    }

    #[test]
    fn test_total_due_with_flat_interest() {
        let o = obligation(Some(dec!(20)), None);
        assert_eq!(o.total_due(), dec!(120));
    }

    #[test]
    fn test_total_due_base_only() {
        let o = obligation(None, None);
        assert_eq!(o.total_due(), dec!(100));
    }

    #[test]
    fn test_rate_wins_over_flat_interest() {
        // When both are present the percentage rate is authoritative.
        let o = obligation(Some(dec!(50)), Some(dec!(10)));
        assert_eq!(o.total_due(), dec!(110.00));
    }

    #[test]
    fn test_service_date_ordering_enforced() {
        let mut d = draft(ObligationKind::Service {
            service_type_id: 1,
            legacy_status: 1,
        });
        d.due_date = d.start_date;
        assert!(matches!(
            d.validate(),
            Err(SettlementError::ValidationError(_))
        ));
    }

    #[test]
    fn test_general_date_ordering_not_enforced() {
        let mut d = draft(ObligationKind::General {
            category_id: 1,
            property_id: None,
        });
        d.due_date = d.start_date;
        assert!(d.validate().is_ok());
    }

    #[test]
    fn test_negative_interest_amount_rejected() {
        let mut d = draft(ObligationKind::General {
            category_id: 1,
            property_id: None,
        });
        d.interest_amount = Some(dec!(-1));
        assert!(d.validate().is_err());
    }
}
