use crate::domain::obligation::{Family, Obligation, ObligationId};
use crate::domain::payment::{Payment, PaymentId};
use serde::{Deserialize, Serialize};

pub type LinkId = u32;

/// The association recording that a specific payment settles a specific
/// obligation. The `(family, obligation_id, payment_id)` pair is unique.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Link {
    pub id: LinkId,
    pub family: Family,
    pub obligation_id: ObligationId,
    pub payment_id: PaymentId,
}

/// A link together with its resolved obligation and payment projections,
/// returned by the settlement operations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinkView {
    pub link: Link,
    pub obligation: Obligation,
    pub payment: Payment,
}
