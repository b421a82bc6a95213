use crate::domain::link::{Link, LinkId};
use crate::domain::obligation::{
    CategoryId, Family, Obligation, ObligationDraft, ObligationId, PropertyId, ServiceTypeId,
};
use crate::domain::payment::{Payment, PaymentDraft, PaymentId};
use crate::domain::status::PaymentStatus;
use crate::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub type UserId = u32;

/// Owns obligation records for both families.
#[async_trait]
pub trait ObligationStore: Send + Sync {
    async fn get(&self, family: Family, id: ObligationId) -> Result<Option<Obligation>>;
    async fn all(&self, family: Family) -> Result<Vec<Obligation>>;
    async fn insert(&self, draft: ObligationDraft) -> Result<ObligationId>;
    /// Full-field replacement keyed by `obligation.id`.
    async fn replace(&self, obligation: Obligation) -> Result<()>;
    /// Guarded compare-and-set: succeeds only while the stored status still
    /// equals `from`, otherwise fails with `Conflict`.
    async fn transition_status(
        &self,
        family: Family,
        id: ObligationId,
        from: PaymentStatus,
        to: PaymentStatus,
    ) -> Result<()>;
    /// Unconditional status write (the semi-manual settlement contract).
    async fn set_status(&self, family: Family, id: ObligationId, to: PaymentStatus) -> Result<()>;
    async fn remove(&self, family: Family, id: ObligationId) -> Result<()>;
}

/// Owns payment records. Receipt numbers are unique per family and the store
/// is the authority: `insert` fails with `Conflict` on a duplicate.
#[async_trait]
pub trait PaymentStore: Send + Sync {
    async fn get(&self, family: Family, id: PaymentId) -> Result<Option<Payment>>;
    async fn find_by_receipt(&self, family: Family, receipt: &str) -> Result<Option<Payment>>;
    async fn insert(&self, draft: PaymentDraft) -> Result<PaymentId>;
    async fn remove(&self, family: Family, id: PaymentId) -> Result<()>;
}

/// Owns the obligation/payment association. The pair is unique per family;
/// `insert` fails with `Conflict` when the pair is already linked.
#[async_trait]
pub trait LinkStore: Send + Sync {
    async fn by_obligation(&self, family: Family, obligation_id: ObligationId)
    -> Result<Vec<Link>>;
    async fn by_payment(&self, family: Family, payment_id: PaymentId) -> Result<Vec<Link>>;
    async fn by_pair(
        &self,
        family: Family,
        obligation_id: ObligationId,
        payment_id: PaymentId,
    ) -> Result<Option<Link>>;
    async fn insert(
        &self,
        family: Family,
        obligation_id: ObligationId,
        payment_id: PaymentId,
    ) -> Result<LinkId>;
    async fn remove(&self, family: Family, id: LinkId) -> Result<()>;
}

/// Existence checks for expense categories, service types and properties.
/// These live outside the settlement core; only the boolean answer matters.
#[async_trait]
pub trait ReferenceCatalog: Send + Sync {
    async fn category_exists(&self, id: CategoryId) -> Result<bool>;
    async fn service_type_exists(&self, id: ServiceTypeId) -> Result<bool>;
    async fn property_exists(&self, id: PropertyId) -> Result<bool>;
}

/// One audit record: who did what, against which table, with a free-form
/// message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEntry {
    pub user_id: UserId,
    pub action: String,
    pub table: String,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

impl AuditEntry {
    pub fn new(user_id: UserId, action: &str, table: &str, message: String) -> Self {
        Self {
            user_id,
            action: action.to_string(),
            table: table.to_string(),
            message,
            timestamp: Utc::now(),
        }
    }
}

/// Best-effort audit notification. Errors from `record` are logged by the
/// caller and never abort the primary operation.
#[async_trait]
pub trait AuditSink: Send + Sync {
    async fn record(&self, entry: AuditEntry) -> Result<()>;
}

pub type ObligationStoreBox = Box<dyn ObligationStore>;
pub type PaymentStoreBox = Box<dyn PaymentStore>;
pub type LinkStoreBox = Box<dyn LinkStore>;
pub type ReferenceCatalogBox = Box<dyn ReferenceCatalog>;
pub type AuditSinkBox = Box<dyn AuditSink>;
