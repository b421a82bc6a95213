use crate::domain::link::{Link, LinkId};
use crate::domain::obligation::{Family, Obligation, ObligationDraft, ObligationId};
use crate::domain::payment::{Payment, PaymentDraft, PaymentId};
use crate::domain::ports::{LinkStore, ObligationStore, PaymentStore};
use crate::domain::status::PaymentStatus;
use crate::error::{Result, SettlementError};
use async_trait::async_trait;
use rocksdb::{ColumnFamilyDescriptor, DB, Options};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Column family for obligation records (both families, prefixed key).
pub const CF_OBLIGATIONS: &str = "obligations";
/// Column family for payment records.
pub const CF_PAYMENTS: &str = "payments";
/// Column family for obligation/payment links.
pub const CF_LINKS: &str = "links";
/// Unique index: family + receipt number -> payment id.
pub const CF_RECEIPT_INDEX: &str = "receipt_index";
/// Unique index: family + obligation id + payment id -> link id.
pub const CF_PAIR_INDEX: &str = "pair_index";
/// Id counters.
pub const CF_META: &str = "meta";

const ALL_CFS: [&str; 6] = [
    CF_OBLIGATIONS,
    CF_PAYMENTS,
    CF_LINKS,
    CF_RECEIPT_INDEX,
    CF_PAIR_INDEX,
    CF_META,
];

fn family_byte(family: Family) -> u8 {
    match family {
        Family::General => 0,
        Family::Service => 1,
    }
}

fn id_key(family: Family, id: u32) -> [u8; 5] {
    let mut key = [0u8; 5];
    key[0] = family_byte(family);
    key[1..].copy_from_slice(&id.to_be_bytes());
    key
}

fn receipt_key(family: Family, receipt: &str) -> Vec<u8> {
    let mut key = Vec::with_capacity(1 + receipt.len());
    key.push(family_byte(family));
    key.extend_from_slice(receipt.as_bytes());
    key
}

fn pair_key(family: Family, obligation_id: ObligationId, payment_id: PaymentId) -> [u8; 9] {
    let mut key = [0u8; 9];
    key[0] = family_byte(family);
    key[1..5].copy_from_slice(&obligation_id.to_be_bytes());
    key[5..].copy_from_slice(&payment_id.to_be_bytes());
    key
}

/// A persistent store implementation using RocksDB.
///
/// Implements all three ledgers over one database. Uniqueness constraints
/// (receipt number, obligation/payment pair) live in dedicated index column
/// families; check and put happen under an internal write mutex because
/// RocksDB has no native put-if-absent.
///
/// `Clone` shares the underlying `Arc<DB>` and the write mutex.
#[derive(Clone)]
pub struct RocksDbStore {
    db: Arc<DB>,
    write_lock: Arc<Mutex<()>>,
}

impl RocksDbStore {
    /// Opens or creates a RocksDB instance at the given path, ensuring all
    /// required column families exist.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let descriptors: Vec<ColumnFamilyDescriptor> = ALL_CFS
            .iter()
            .map(|name| ColumnFamilyDescriptor::new(*name, Options::default()))
            .collect();

        let db = DB::open_cf_descriptors(&opts, path, descriptors)?;
        Ok(Self {
            db: Arc::new(db),
            write_lock: Arc::new(Mutex::new(())),
        })
    }

    fn cf(&self, name: &'static str) -> Result<&rocksdb::ColumnFamily> {
        self.db.cf_handle(name).ok_or_else(|| {
            SettlementError::Internal(Box::new(std::io::Error::other(format!(
                "column family {name} not found"
            ))))
        })
    }

    fn next_id(&self, counter: &str, family: Family) -> Result<u32> {
        let cf = self.cf(CF_META)?;
        let key = format!("{counter}:{}", family_byte(family));
        let current = match self.db.get_cf(&cf, &key)? {
            Some(bytes) => u32::from_be_bytes(bytes.as_slice().try_into().map_err(|_| {
                SettlementError::Internal(Box::new(std::io::Error::other(
                    "corrupt id counter",
                )))
            })?),
            None => 0,
        };
        let next = current + 1;
        self.db.put_cf(&cf, &key, next.to_be_bytes())?;
        Ok(next)
    }

    fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        cf: &'static str,
        key: &[u8],
    ) -> Result<Option<T>> {
        let handle = self.cf(cf)?;
        match self.db.get_cf(&handle, key)? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    fn put_json<T: serde::Serialize>(&self, cf: &'static str, key: &[u8], value: &T) -> Result<()> {
        let handle = self.cf(cf)?;
        self.db.put_cf(&handle, key, serde_json::to_vec(value)?)?;
        Ok(())
    }

    fn scan_family<T: serde::de::DeserializeOwned>(
        &self,
        cf: &'static str,
        family: Family,
    ) -> Result<Vec<T>> {
        let handle = self.cf(cf)?;
        let prefix = [family_byte(family)];
        let mut rows = Vec::new();
        let iter = self.db.iterator_cf(
            &handle,
            rocksdb::IteratorMode::From(&prefix, rocksdb::Direction::Forward),
        );
        for item in iter {
            let (key, value) = item?;
            if key.first() != Some(&family_byte(family)) {
                break;
            }
            rows.push(serde_json::from_slice(&value)?);
        }
        Ok(rows)
    }
}

#[async_trait]
impl ObligationStore for RocksDbStore {
    async fn get(&self, family: Family, id: ObligationId) -> Result<Option<Obligation>> {
        self.get_json(CF_OBLIGATIONS, &id_key(family, id))
    }

    async fn all(&self, family: Family) -> Result<Vec<Obligation>> {
        let mut rows: Vec<Obligation> = self.scan_family(CF_OBLIGATIONS, family)?;
        rows.sort_by_key(|o| o.id);
        Ok(rows)
    }

    async fn insert(&self, draft: ObligationDraft) -> Result<ObligationId> {
        let _guard = self.write_lock.lock().await;
        let family = draft.family();
        let id = self.next_id("obligation", family)?;
        self.put_json(CF_OBLIGATIONS, &id_key(family, id), &draft.into_obligation(id))?;
        Ok(id)
    }

    async fn replace(&self, obligation: Obligation) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        let key = id_key(obligation.family(), obligation.id);
        if self.get_json::<Obligation>(CF_OBLIGATIONS, &key)?.is_none() {
            return Err(SettlementError::not_found("obligation", obligation.id));
        }
        self.put_json(CF_OBLIGATIONS, &key, &obligation)
    }

    async fn transition_status(
        &self,
        family: Family,
        id: ObligationId,
        from: PaymentStatus,
        to: PaymentStatus,
    ) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        let key = id_key(family, id);
        let mut obligation: Obligation = self
            .get_json(CF_OBLIGATIONS, &key)?
            .ok_or(SettlementError::not_found("obligation", id))?;
        if obligation.status != from {
            return Err(SettlementError::Conflict(format!(
                "obligation {id} is {}, expected {}",
                obligation.status.describe(),
                from.describe()
            )));
        }
        obligation.status = to;
        self.put_json(CF_OBLIGATIONS, &key, &obligation)
    }

    async fn set_status(&self, family: Family, id: ObligationId, to: PaymentStatus) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        let key = id_key(family, id);
        let mut obligation: Obligation = self
            .get_json(CF_OBLIGATIONS, &key)?
            .ok_or(SettlementError::not_found("obligation", id))?;
        obligation.status = to;
        self.put_json(CF_OBLIGATIONS, &key, &obligation)
    }

    async fn remove(&self, family: Family, id: ObligationId) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        let key = id_key(family, id);
        if self.get_json::<Obligation>(CF_OBLIGATIONS, &key)?.is_none() {
            return Err(SettlementError::not_found("obligation", id));
        }
        let handle = self.cf(CF_OBLIGATIONS)?;
        self.db.delete_cf(&handle, key)?;
        Ok(())
    }
}

#[async_trait]
impl PaymentStore for RocksDbStore {
    async fn get(&self, family: Family, id: PaymentId) -> Result<Option<Payment>> {
        self.get_json(CF_PAYMENTS, &id_key(family, id))
    }

    async fn find_by_receipt(&self, family: Family, receipt: &str) -> Result<Option<Payment>> {
        let index = self.cf(CF_RECEIPT_INDEX)?;
        match self.db.get_cf(&index, receipt_key(family, receipt))? {
            Some(bytes) => {
                let id = u32::from_be_bytes(bytes.as_slice().try_into().map_err(|_| {
                    SettlementError::Internal(Box::new(std::io::Error::other(
                        "corrupt receipt index",
                    )))
                })?);
                self.get(family, id).await
            }
            None => Ok(None),
        }
    }

    async fn insert(&self, draft: PaymentDraft) -> Result<PaymentId> {
        let _guard = self.write_lock.lock().await;
        let family = draft.family;
        let index_key = receipt_key(family, &draft.receipt_number);
        let index = self.cf(CF_RECEIPT_INDEX)?;
        if self.db.get_pinned_cf(&index, &index_key)?.is_some() {
            return Err(SettlementError::Conflict(format!(
                "a payment with receipt number {} already exists",
                draft.receipt_number
            )));
        }
        let id = self.next_id("payment", family)?;
        self.put_json(CF_PAYMENTS, &id_key(family, id), &draft.into_payment(id))?;
        let index = self.cf(CF_RECEIPT_INDEX)?;
        self.db.put_cf(&index, index_key, id.to_be_bytes())?;
        Ok(id)
    }

    async fn remove(&self, family: Family, id: PaymentId) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        let key = id_key(family, id);
        let payment: Payment = self
            .get_json(CF_PAYMENTS, &key)?
            .ok_or(SettlementError::not_found("payment", id))?;
        let handle = self.cf(CF_PAYMENTS)?;
        self.db.delete_cf(&handle, key)?;
        let index = self.cf(CF_RECEIPT_INDEX)?;
        self.db
            .delete_cf(&index, receipt_key(family, &payment.receipt_number))?;
        Ok(())
    }
}

#[async_trait]
impl LinkStore for RocksDbStore {
    async fn by_obligation(
        &self,
        family: Family,
        obligation_id: ObligationId,
    ) -> Result<Vec<Link>> {
        let mut links: Vec<Link> = self.scan_family(CF_LINKS, family)?;
        links.retain(|l| l.obligation_id == obligation_id);
        links.sort_by_key(|l| l.id);
        Ok(links)
    }

    async fn by_payment(&self, family: Family, payment_id: PaymentId) -> Result<Vec<Link>> {
        let mut links: Vec<Link> = self.scan_family(CF_LINKS, family)?;
        links.retain(|l| l.payment_id == payment_id);
        links.sort_by_key(|l| l.id);
        Ok(links)
    }

    async fn by_pair(
        &self,
        family: Family,
        obligation_id: ObligationId,
        payment_id: PaymentId,
    ) -> Result<Option<Link>> {
        let index = self.cf(CF_PAIR_INDEX)?;
        match self
            .db
            .get_cf(&index, pair_key(family, obligation_id, payment_id))?
        {
            Some(bytes) => {
                let id = u32::from_be_bytes(bytes.as_slice().try_into().map_err(|_| {
                    SettlementError::Internal(Box::new(std::io::Error::other(
                        "corrupt pair index",
                    )))
                })?);
                self.get_json(CF_LINKS, &id_key(family, id))
            }
            None => Ok(None),
        }
    }

    async fn insert(
        &self,
        family: Family,
        obligation_id: ObligationId,
        payment_id: PaymentId,
    ) -> Result<LinkId> {
        let _guard = self.write_lock.lock().await;
        let index_key = pair_key(family, obligation_id, payment_id);
        let index = self.cf(CF_PAIR_INDEX)?;
        if self.db.get_pinned_cf(&index, index_key)?.is_some() {
            return Err(SettlementError::Conflict(format!(
                "obligation {obligation_id} and payment {payment_id} are already linked"
            )));
        }
        let id = self.next_id("link", family)?;
        let link = Link {
            id,
            family,
            obligation_id,
            payment_id,
        };
        self.put_json(CF_LINKS, &id_key(family, id), &link)?;
        let index = self.cf(CF_PAIR_INDEX)?;
        self.db.put_cf(&index, index_key, id.to_be_bytes())?;
        Ok(id)
    }

    async fn remove(&self, family: Family, id: LinkId) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        let key = id_key(family, id);
        let link: Link = self
            .get_json(CF_LINKS, &key)?
            .ok_or(SettlementError::not_found("link", id))?;
        let handle = self.cf(CF_LINKS)?;
        self.db.delete_cf(&handle, key)?;
        let index = self.cf(CF_PAIR_INDEX)?;
        self.db
            .delete_cf(&index, pair_key(family, link.obligation_id, link.payment_id))?;
        Ok(())
    }
}
