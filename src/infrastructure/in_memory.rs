use crate::domain::link::{Link, LinkId};
use crate::domain::obligation::{
    CategoryId, Family, Obligation, ObligationDraft, ObligationId, PropertyId, ServiceTypeId,
};
use crate::domain::payment::{Payment, PaymentDraft, PaymentId};
use crate::domain::ports::{
    AuditEntry, AuditSink, LinkStore, ObligationStore, PaymentStore, ReferenceCatalog,
};
use crate::domain::status::PaymentStatus;
use crate::error::{Result, SettlementError};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::RwLock;

#[derive(Default)]
struct ObligationTable {
    rows: HashMap<ObligationId, Obligation>,
    next_id: ObligationId,
}

/// Thread-safe in-memory obligation store.
///
/// One arena per family; the two families never share ids. Status
/// transitions are compare-and-set under the write lock, so concurrent
/// settlers cannot both observe `Pending`.
#[derive(Default, Clone)]
pub struct InMemoryObligationStore {
    general: Arc<RwLock<ObligationTable>>,
    service: Arc<RwLock<ObligationTable>>,
}

impl InMemoryObligationStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn table(&self, family: Family) -> &Arc<RwLock<ObligationTable>> {
        match family {
            Family::General => &self.general,
            Family::Service => &self.service,
        }
    }
}

#[async_trait]
impl ObligationStore for InMemoryObligationStore {
    async fn get(&self, family: Family, id: ObligationId) -> Result<Option<Obligation>> {
        let table = self.table(family).read().await;
        Ok(table.rows.get(&id).cloned())
    }

    async fn all(&self, family: Family) -> Result<Vec<Obligation>> {
        let table = self.table(family).read().await;
        let mut rows: Vec<Obligation> = table.rows.values().cloned().collect();
        rows.sort_by_key(|o| o.id);
        Ok(rows)
    }

    async fn insert(&self, draft: ObligationDraft) -> Result<ObligationId> {
        let mut table = self.table(draft.family()).write().await;
        table.next_id += 1;
        let id = table.next_id;
        table.rows.insert(id, draft.into_obligation(id));
        Ok(id)
    }

    async fn replace(&self, obligation: Obligation) -> Result<()> {
        let mut table = self.table(obligation.family()).write().await;
        match table.rows.get_mut(&obligation.id) {
            Some(row) => {
                *row = obligation;
                Ok(())
            }
            None => Err(SettlementError::not_found("obligation", obligation.id)),
        }
    }

    async fn transition_status(
        &self,
        family: Family,
        id: ObligationId,
        from: PaymentStatus,
        to: PaymentStatus,
    ) -> Result<()> {
        let mut table = self.table(family).write().await;
        let row = table
            .rows
            .get_mut(&id)
            .ok_or(SettlementError::not_found("obligation", id))?;
        if row.status != from {
            return Err(SettlementError::Conflict(format!(
                "obligation {id} is {}, expected {}",
                row.status.describe(),
                from.describe()
            )));
        }
        row.status = to;
        Ok(())
    }

    async fn set_status(&self, family: Family, id: ObligationId, to: PaymentStatus) -> Result<()> {
        let mut table = self.table(family).write().await;
        let row = table
            .rows
            .get_mut(&id)
            .ok_or(SettlementError::not_found("obligation", id))?;
        row.status = to;
        Ok(())
    }

    async fn remove(&self, family: Family, id: ObligationId) -> Result<()> {
        let mut table = self.table(family).write().await;
        table
            .rows
            .remove(&id)
            .map(|_| ())
            .ok_or(SettlementError::not_found("obligation", id))
    }
}

#[derive(Default)]
struct PaymentTable {
    rows: HashMap<PaymentId, Payment>,
    by_receipt: HashMap<String, PaymentId>,
    next_id: PaymentId,
}

/// Thread-safe in-memory payment store with a unique receipt-number index.
///
/// The index is the authority for receipt uniqueness: check and insert happen
/// under one write lock, so a pre-check race cannot produce duplicates.
#[derive(Default, Clone)]
pub struct InMemoryPaymentStore {
    general: Arc<RwLock<PaymentTable>>,
    service: Arc<RwLock<PaymentTable>>,
}

impl InMemoryPaymentStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn table(&self, family: Family) -> &Arc<RwLock<PaymentTable>> {
        match family {
            Family::General => &self.general,
            Family::Service => &self.service,
        }
    }
}

#[async_trait]
impl PaymentStore for InMemoryPaymentStore {
    async fn get(&self, family: Family, id: PaymentId) -> Result<Option<Payment>> {
        let table = self.table(family).read().await;
        Ok(table.rows.get(&id).cloned())
    }

    async fn find_by_receipt(&self, family: Family, receipt: &str) -> Result<Option<Payment>> {
        let table = self.table(family).read().await;
        Ok(table
            .by_receipt
            .get(receipt)
            .and_then(|id| table.rows.get(id))
            .cloned())
    }

    async fn insert(&self, draft: PaymentDraft) -> Result<PaymentId> {
        let mut table = self.table(draft.family).write().await;
        if table.by_receipt.contains_key(&draft.receipt_number) {
            return Err(SettlementError::Conflict(format!(
                "a payment with receipt number {} already exists",
                draft.receipt_number
            )));
        }
        table.next_id += 1;
        let id = table.next_id;
        table.by_receipt.insert(draft.receipt_number.clone(), id);
        table.rows.insert(id, draft.into_payment(id));
        Ok(id)
    }

    async fn remove(&self, family: Family, id: PaymentId) -> Result<()> {
        let mut table = self.table(family).write().await;
        match table.rows.remove(&id) {
            Some(payment) => {
                table.by_receipt.remove(&payment.receipt_number);
                Ok(())
            }
            None => Err(SettlementError::not_found("payment", id)),
        }
    }
}

#[derive(Default)]
struct LinkTable {
    rows: HashMap<LinkId, Link>,
    by_pair: HashMap<(ObligationId, PaymentId), LinkId>,
    next_id: LinkId,
}

/// Thread-safe in-memory link store with a unique pair index.
#[derive(Default, Clone)]
pub struct InMemoryLinkStore {
    general: Arc<RwLock<LinkTable>>,
    service: Arc<RwLock<LinkTable>>,
}

impl InMemoryLinkStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn table(&self, family: Family) -> &Arc<RwLock<LinkTable>> {
        match family {
            Family::General => &self.general,
            Family::Service => &self.service,
        }
    }
}

#[async_trait]
impl LinkStore for InMemoryLinkStore {
    async fn by_obligation(
        &self,
        family: Family,
        obligation_id: ObligationId,
    ) -> Result<Vec<Link>> {
        let table = self.table(family).read().await;
        let mut links: Vec<Link> = table
            .rows
            .values()
            .filter(|l| l.obligation_id == obligation_id)
            .cloned()
            .collect();
        links.sort_by_key(|l| l.id);
        Ok(links)
    }

    async fn by_payment(&self, family: Family, payment_id: PaymentId) -> Result<Vec<Link>> {
        let table = self.table(family).read().await;
        let mut links: Vec<Link> = table
            .rows
            .values()
            .filter(|l| l.payment_id == payment_id)
            .cloned()
            .collect();
        links.sort_by_key(|l| l.id);
        Ok(links)
    }

    async fn by_pair(
        &self,
        family: Family,
        obligation_id: ObligationId,
        payment_id: PaymentId,
    ) -> Result<Option<Link>> {
        let table = self.table(family).read().await;
        Ok(table
            .by_pair
            .get(&(obligation_id, payment_id))
            .and_then(|id| table.rows.get(id))
            .cloned())
    }

    async fn insert(
        &self,
        family: Family,
        obligation_id: ObligationId,
        payment_id: PaymentId,
    ) -> Result<LinkId> {
        let mut table = self.table(family).write().await;
        if table.by_pair.contains_key(&(obligation_id, payment_id)) {
            return Err(SettlementError::Conflict(format!(
                "obligation {obligation_id} and payment {payment_id} are already linked"
            )));
        }
        table.next_id += 1;
        let id = table.next_id;
        table.by_pair.insert((obligation_id, payment_id), id);
        table.rows.insert(
            id,
            Link {
                id,
                family,
                obligation_id,
                payment_id,
            },
        );
        Ok(id)
    }

    async fn remove(&self, family: Family, id: LinkId) -> Result<()> {
        let mut table = self.table(family).write().await;
        match table.rows.remove(&id) {
            Some(link) => {
                table.by_pair.remove(&(link.obligation_id, link.payment_id));
                Ok(())
            }
            None => Err(SettlementError::not_found("link", id)),
        }
    }
}

/// Seedable in-memory reference catalog.
#[derive(Default, Clone)]
pub struct InMemoryReferenceCatalog {
    inner: Arc<RwLock<CatalogSets>>,
}

#[derive(Default)]
struct CatalogSets {
    categories: HashSet<CategoryId>,
    service_types: HashSet<ServiceTypeId>,
    properties: HashSet<PropertyId>,
}

impl InMemoryReferenceCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn add_category(&self, id: CategoryId) {
        self.inner.write().await.categories.insert(id);
    }

    pub async fn add_service_type(&self, id: ServiceTypeId) {
        self.inner.write().await.service_types.insert(id);
    }

    pub async fn add_property(&self, id: PropertyId) {
        self.inner.write().await.properties.insert(id);
    }
}

#[async_trait]
impl ReferenceCatalog for InMemoryReferenceCatalog {
    async fn category_exists(&self, id: CategoryId) -> Result<bool> {
        Ok(self.inner.read().await.categories.contains(&id))
    }

    async fn service_type_exists(&self, id: ServiceTypeId) -> Result<bool> {
        Ok(self.inner.read().await.service_types.contains(&id))
    }

    async fn property_exists(&self, id: PropertyId) -> Result<bool> {
        Ok(self.inner.read().await.properties.contains(&id))
    }
}

/// Audit sink that keeps entries in memory for inspection in tests.
#[derive(Default, Clone)]
pub struct InMemoryAuditSink {
    entries: Arc<RwLock<Vec<AuditEntry>>>,
}

impl InMemoryAuditSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn entries(&self) -> Vec<AuditEntry> {
        self.entries.read().await.clone()
    }
}

#[async_trait]
impl AuditSink for InMemoryAuditSink {
    async fn record(&self, entry: AuditEntry) -> Result<()> {
        self.entries.write().await.push(entry);
        Ok(())
    }
}

/// Audit sink that emits entries as structured log events.
#[derive(Default, Clone)]
pub struct TracingAuditSink;

#[async_trait]
impl AuditSink for TracingAuditSink {
    async fn record(&self, entry: AuditEntry) -> Result<()> {
        tracing::info!(
            user = entry.user_id,
            action = %entry.action,
            table = %entry.table,
            message = %entry.message,
            "audit"
        );
        Ok(())
    }
}
