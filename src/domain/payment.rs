use crate::domain::money::Amount;
use crate::domain::obligation::Family;
use crate::domain::status::PaymentStatus;
use crate::error::{Result, SettlementError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub type PaymentId = u32;

/// Photo reference recorded on payments the engine creates itself.
pub const AUTO_PAYMENT_PHOTO: &str = "AUTO_PAYMENT";

const RECEIPT_MAX_LEN: usize = 100;

/// A record of money received. `status` is only present on service payments;
/// general payments never carried a lifecycle state of their own.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Payment {
    pub id: PaymentId,
    pub family: Family,
    pub receipt_number: String,
    pub payment_date: DateTime<Utc>,
    pub amount: Amount,
    pub description: Option<String>,
    pub receipt_photo: String,
    pub status: Option<PaymentStatus>,
}

/// Creation input for a payment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentDraft {
    pub family: Family,
    pub receipt_number: String,
    pub payment_date: DateTime<Utc>,
    pub amount: Amount,
    pub description: Option<String>,
    pub receipt_photo: String,
    pub status: Option<PaymentStatus>,
}

impl PaymentDraft {
    pub fn validate(&self) -> Result<()> {
        if self.receipt_number.trim().is_empty() {
            return Err(SettlementError::ValidationError(
                "receipt number is required".to_string(),
            ));
        }
        if self.receipt_number.chars().count() > RECEIPT_MAX_LEN {
            return Err(SettlementError::ValidationError(format!(
                "receipt number exceeds {RECEIPT_MAX_LEN} characters"
            )));
        }
        Ok(())
    }

    pub fn into_payment(self, id: PaymentId) -> Payment {
        Payment {
            id,
            family: self.family,
            receipt_number: self.receipt_number,
            payment_date: self.payment_date,
            amount: self.amount,
            description: self.description,
            receipt_photo: self.receipt_photo,
            status: self.status,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn draft(receipt: &str) -> PaymentDraft {
        PaymentDraft {
            family: Family::Service,
            receipt_number: receipt.to_string(),
            payment_date: Utc::now(),
            amount: Amount::new(dec!(50)).unwrap(),
            description: None,
            receipt_photo: "receipt.jpg".to_string(),
            status: Some(PaymentStatus::Paid),
        }
    }

    #[test]
    fn test_receipt_number_required() {
        assert!(draft("R-1").validate().is_ok());
        assert!(draft("  ").validate().is_err());
    }

    #[test]
    fn test_receipt_number_length_cap() {
        let long = "x".repeat(101);
        assert!(draft(&long).validate().is_err());
        let max = "x".repeat(100);
        assert!(draft(&max).validate().is_ok());
    }
}
