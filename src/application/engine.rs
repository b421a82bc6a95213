use crate::domain::link::{Link, LinkView};
use crate::domain::money::Amount;
use crate::domain::obligation::{
    Family, Obligation, ObligationDraft, ObligationId, ObligationKind,
};
use crate::domain::payment::{AUTO_PAYMENT_PHOTO, Payment, PaymentDraft, PaymentId};
use crate::domain::ports::{
    AuditEntry, AuditSinkBox, LinkStoreBox, ObligationStoreBox, PaymentStoreBox,
    ReferenceCatalogBox, UserId,
};
use crate::domain::status::{PaymentStatus, StatusRegistry};
use crate::error::{Result, SettlementError};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, MutexGuard, OwnedMutexGuard};

/// Caller-supplied payment details for semi-manual (service) settlement.
/// The amount is trusted as given; no recomputation happens on this path.
#[derive(Debug, Clone)]
pub struct ServicePaymentInput {
    pub receipt_number: String,
    pub payment_date: DateTime<Utc>,
    pub amount: Amount,
    pub description: Option<String>,
    pub receipt_photo: String,
    pub status_id: u8,
}

/// Orchestrates the settlement of obligations against payments.
///
/// Owns the storage ports and drives the two settlement flows, manual
/// linking, and the guarded administrative mutations. A per-obligation lock
/// serializes concurrent settlement of the same obligation, so the
/// check-then-act sequence inside a flow cannot interleave with another
/// settler.
pub struct SettlementEngine {
    obligations: ObligationStoreBox,
    payments: PaymentStoreBox,
    links: LinkStoreBox,
    catalog: ReferenceCatalogBox,
    audit: AuditSinkBox,
    statuses: StatusRegistry,
    locks: Mutex<HashMap<(Family, ObligationId), Arc<Mutex<()>>>>,
}

impl SettlementEngine {
    pub fn new(
        obligations: ObligationStoreBox,
        payments: PaymentStoreBox,
        links: LinkStoreBox,
        catalog: ReferenceCatalogBox,
        audit: AuditSinkBox,
    ) -> Self {
        Self {
            obligations,
            payments,
            links,
            catalog,
            audit,
            statuses: StatusRegistry,
            locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn status_registry(&self) -> &StatusRegistry {
        &self.statuses
    }

    /// Acquires the settlement lock for one obligation. Guard lifetime spans
    /// the whole check-compute-write sequence of a flow.
    async fn obligation_lock(
        &self,
        family: Family,
        id: ObligationId,
    ) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks: MutexGuard<'_, _> = self.locks.lock().await;
            locks
                .entry((family, id))
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .clone()
        };
        lock.lock_owned().await
    }

    /// Best-effort audit notification: failures are logged and swallowed.
    async fn notify_audit(&self, user_id: UserId, action: &str, table: &str, message: String) {
        let entry = AuditEntry::new(user_id, action, table, message);
        if let Err(e) = self.audit.record(entry).await {
            tracing::warn!(error = %e, action, table, "audit sink rejected entry");
        }
    }

    async fn require_obligation(&self, family: Family, id: ObligationId) -> Result<Obligation> {
        self.obligations
            .get(family, id)
            .await?
            .ok_or(SettlementError::not_found("obligation", id))
    }

    async fn require_payment(&self, family: Family, id: PaymentId) -> Result<Payment> {
        self.payments
            .get(family, id)
            .await?
            .ok_or(SettlementError::not_found("payment", id))
    }

    async fn view(&self, link: Link) -> Result<LinkView> {
        let obligation = self.require_obligation(link.family, link.obligation_id).await?;
        let payment = self.require_payment(link.family, link.payment_id).await?;
        Ok(LinkView {
            link,
            obligation,
            payment,
        })
    }

    /// Automatic settlement of a general obligation.
    ///
    /// Validates that the obligation exists, is `Pending` and has no payment
    /// attached, computes the amount due, then creates the payment, the link
    /// and the `Pending -> Paid` transition. Later-step failures compensate
    /// the earlier writes so no partial payment/link/status state survives.
    pub async fn settle_general(
        &self,
        obligation_id: ObligationId,
        user: UserId,
    ) -> Result<LinkView> {
        let _guard = self.obligation_lock(Family::General, obligation_id).await;

        let obligation = self.require_obligation(Family::General, obligation_id).await?;

        if obligation.status != PaymentStatus::Pending {
            tracing::warn!(
                obligation = obligation_id,
                status = obligation.status.describe(),
                "settlement rejected, obligation not pending"
            );
            return Err(SettlementError::InvalidState {
                obligation: obligation_id,
                reason: obligation.status.settlement_rejection().to_string(),
            });
        }

        let existing = self.links.by_obligation(Family::General, obligation_id).await?;
        if !existing.is_empty() {
            return Err(SettlementError::Conflict(format!(
                "obligation {obligation_id} already has a payment attached"
            )));
        }

        let total = obligation.total_due();
        let draft = PaymentDraft {
            family: Family::General,
            receipt_number: format!("Expensa-{obligation_id}"),
            payment_date: Utc::now(),
            amount: Amount::new(total)?,
            description: Some(format!(
                "Automatic payment for obligation: {}",
                obligation.description
            )),
            receipt_photo: AUTO_PAYMENT_PHOTO.to_string(),
            status: None,
        };
        draft.validate()?;

        let payment_id = self.payments.insert(draft).await?;
        tracing::info!(
            obligation = obligation_id,
            payment = payment_id,
            amount = %total,
            "automatic payment created"
        );

        let link_id = match self
            .links
            .insert(Family::General, obligation_id, payment_id)
            .await
        {
            Ok(id) => id,
            Err(e) => {
                let _ = self.payments.remove(Family::General, payment_id).await;
                return Err(e);
            }
        };

        if let Err(e) = self
            .obligations
            .transition_status(
                Family::General,
                obligation_id,
                PaymentStatus::Pending,
                PaymentStatus::Paid,
            )
            .await
        {
            let _ = self.links.remove(Family::General, link_id).await;
            let _ = self.payments.remove(Family::General, payment_id).await;
            return Err(e);
        }

        tracing::info!(
            obligation = obligation_id,
            payment = payment_id,
            "obligation settled"
        );
        self.notify_audit(
            user,
            "SETTLE",
            "expense_payments",
            format!("obligation {obligation_id} settled by payment {payment_id}"),
        )
        .await;

        self.view(Link {
            id: link_id,
            family: Family::General,
            obligation_id,
            payment_id,
        })
        .await
    }

    /// Semi-manual settlement of a service obligation.
    ///
    /// The caller supplies the full payment; nothing is recomputed. The
    /// status write is unconditional, and only the status reference moves to
    /// `Paid`; the service obligation's legacy numeric status is untouched.
    pub async fn settle_service(
        &self,
        obligation_id: ObligationId,
        input: ServicePaymentInput,
        user: UserId,
    ) -> Result<LinkView> {
        let _guard = self.obligation_lock(Family::Service, obligation_id).await;

        // Pre-check mirrors the two-step lookup the callers expect; the
        // store's unique index is the authority either way.
        if self
            .payments
            .find_by_receipt(Family::Service, &input.receipt_number)
            .await?
            .is_some()
        {
            return Err(SettlementError::Conflict(format!(
                "a payment with receipt number {} already exists",
                input.receipt_number
            )));
        }

        let status = self.statuses.resolve(input.status_id)?;
        let obligation = self.require_obligation(Family::Service, obligation_id).await?;

        let existing = self.links.by_obligation(Family::Service, obligation_id).await?;
        if !existing.is_empty() {
            return Err(SettlementError::Conflict(format!(
                "obligation {obligation_id} already has a payment attached"
            )));
        }

        let draft = PaymentDraft {
            family: Family::Service,
            receipt_number: input.receipt_number,
            payment_date: input.payment_date,
            amount: input.amount,
            description: input.description,
            receipt_photo: input.receipt_photo,
            status: Some(status),
        };
        draft.validate()?;

        let payment_id = self.payments.insert(draft).await?;

        let link_id = match self
            .links
            .insert(Family::Service, obligation_id, payment_id)
            .await
        {
            Ok(id) => id,
            Err(e) => {
                let _ = self.payments.remove(Family::Service, payment_id).await;
                return Err(e);
            }
        };

        if let Err(e) = self
            .obligations
            .set_status(Family::Service, obligation_id, PaymentStatus::Paid)
            .await
        {
            let _ = self.links.remove(Family::Service, link_id).await;
            let _ = self.payments.remove(Family::Service, payment_id).await;
            return Err(e);
        }

        tracing::info!(
            obligation = obligation_id,
            payment = payment_id,
            previous_status = obligation.status.describe(),
            "service obligation settled"
        );
        self.notify_audit(
            user,
            "SETTLE",
            "service_expense_payments",
            format!("service obligation {obligation_id} settled by payment {payment_id}"),
        )
        .await;

        self.view(Link {
            id: link_id,
            family: Family::Service,
            obligation_id,
            payment_id,
        })
        .await
    }

    /// Links an existing obligation to an existing payment directly.
    ///
    /// Free-form bookkeeping: no amount computation, no status transition,
    /// and no single-payment guard, so several payments may attach to one
    /// obligation through here. Only pair uniqueness is enforced.
    pub async fn link_manually(
        &self,
        family: Family,
        obligation_id: ObligationId,
        payment_id: PaymentId,
        user: UserId,
    ) -> Result<LinkView> {
        let obligation = self.require_obligation(family, obligation_id).await?;
        let payment = self.require_payment(family, payment_id).await?;

        if self
            .links
            .by_pair(family, obligation_id, payment_id)
            .await?
            .is_some()
        {
            return Err(SettlementError::Conflict(format!(
                "obligation {obligation_id} and payment {payment_id} are already linked"
            )));
        }

        let link_id = self.links.insert(family, obligation_id, payment_id).await?;

        self.notify_audit(
            user,
            "LINK",
            link_table(family),
            format!("payment {payment_id} linked to obligation {obligation_id}"),
        )
        .await;

        Ok(LinkView {
            link: Link {
                id: link_id,
                family,
                obligation_id,
                payment_id,
            },
            obligation,
            payment,
        })
    }

    /// Removes the link between an obligation and a payment.
    pub async fn unlink(
        &self,
        family: Family,
        obligation_id: ObligationId,
        payment_id: PaymentId,
        user: UserId,
    ) -> Result<()> {
        let link = self
            .links
            .by_pair(family, obligation_id, payment_id)
            .await?
            .ok_or(SettlementError::not_found("link", obligation_id))?;

        self.links.remove(family, link.id).await?;

        self.notify_audit(
            user,
            "UNLINK",
            link_table(family),
            format!("payment {payment_id} unlinked from obligation {obligation_id}"),
        )
        .await;
        Ok(())
    }

    async fn validate_references(&self, kind: &ObligationKind) -> Result<()> {
        match kind {
            ObligationKind::General {
                category_id,
                property_id,
            } => {
                if !self.catalog.category_exists(*category_id).await? {
                    return Err(SettlementError::not_found("category", *category_id));
                }
                if let Some(property_id) = property_id
                    && !self.catalog.property_exists(*property_id).await?
                {
                    return Err(SettlementError::not_found("property", *property_id));
                }
            }
            ObligationKind::Service {
                service_type_id, ..
            } => {
                if !self.catalog.service_type_exists(*service_type_id).await? {
                    return Err(SettlementError::not_found(
                        "service type",
                        *service_type_id,
                    ));
                }
            }
        }
        Ok(())
    }

    /// Creates an obligation after validating its fields and references.
    pub async fn create_obligation(
        &self,
        draft: ObligationDraft,
        user: UserId,
    ) -> Result<Obligation> {
        draft.validate()?;
        self.validate_references(&draft.kind).await?;

        let family = draft.family();
        let id = self.obligations.insert(draft).await?;
        let obligation = self.require_obligation(family, id).await?;

        self.notify_audit(
            user,
            "CREATE",
            obligation_table(family),
            format!("obligation {id} created"),
        )
        .await;
        Ok(obligation)
    }

    /// Full-field administrative replacement. Links are untouched and no
    /// status transition logic runs; the status is stored exactly as given.
    pub async fn update_obligation(&self, obligation: Obligation, user: UserId) -> Result<()> {
        let draft = ObligationDraft {
            kind: obligation.kind.clone(),
            start_date: obligation.start_date,
            due_date: obligation.due_date,
            base_amount: obligation.base_amount,
            interest_amount: obligation.interest_amount,
            interest_rate: obligation.interest_rate,
            description: obligation.description.clone(),
            status: obligation.status,
        };
        draft.validate()?;
        self.validate_references(&obligation.kind).await?;

        let family = obligation.family();
        let id = obligation.id;
        self.obligations.replace(obligation).await?;

        self.notify_audit(
            user,
            "UPDATE",
            obligation_table(family),
            format!("obligation {id} updated"),
        )
        .await;
        Ok(())
    }

    /// Deletes an obligation unless a link still references it.
    pub async fn delete_obligation(
        &self,
        family: Family,
        id: ObligationId,
        user: UserId,
    ) -> Result<()> {
        self.require_obligation(family, id).await?;
        if !self.links.by_obligation(family, id).await?.is_empty() {
            return Err(SettlementError::Conflict(format!(
                "obligation {id} still has payments linked to it"
            )));
        }
        self.obligations.remove(family, id).await?;

        self.notify_audit(
            user,
            "DELETE",
            obligation_table(family),
            format!("obligation {id} deleted"),
        )
        .await;
        Ok(())
    }

    /// Records a standalone payment for later manual linking.
    pub async fn register_payment(&self, draft: PaymentDraft, user: UserId) -> Result<Payment> {
        draft.validate()?;
        let family = draft.family;
        let id = self.payments.insert(draft).await?;
        let payment = self.require_payment(family, id).await?;

        self.notify_audit(
            user,
            "CREATE",
            payment_table(family),
            format!("payment {id} registered"),
        )
        .await;
        Ok(payment)
    }

    /// Deletes a payment unless a link still references it.
    pub async fn delete_payment(
        &self,
        family: Family,
        id: PaymentId,
        user: UserId,
    ) -> Result<()> {
        self.require_payment(family, id).await?;
        if !self.links.by_payment(family, id).await?.is_empty() {
            return Err(SettlementError::Conflict(format!(
                "payment {id} still settles an obligation"
            )));
        }
        self.payments.remove(family, id).await?;

        self.notify_audit(
            user,
            "DELETE",
            payment_table(family),
            format!("payment {id} deleted"),
        )
        .await;
        Ok(())
    }

    // Read surface used by the reporting layer.

    pub async fn obligation(&self, family: Family, id: ObligationId) -> Result<Option<Obligation>> {
        self.obligations.get(family, id).await
    }

    pub async fn obligations(&self, family: Family) -> Result<Vec<Obligation>> {
        self.obligations.all(family).await
    }

    pub async fn payment(&self, family: Family, id: PaymentId) -> Result<Option<Payment>> {
        self.payments.get(family, id).await
    }

    pub async fn links_for_obligation(
        &self,
        family: Family,
        obligation_id: ObligationId,
    ) -> Result<Vec<Link>> {
        self.links.by_obligation(family, obligation_id).await
    }

    pub async fn links_for_payment(
        &self,
        family: Family,
        payment_id: PaymentId,
    ) -> Result<Vec<Link>> {
        self.links.by_payment(family, payment_id).await
    }

    pub async fn link_for_pair(
        &self,
        family: Family,
        obligation_id: ObligationId,
        payment_id: PaymentId,
    ) -> Result<Option<Link>> {
        self.links.by_pair(family, obligation_id, payment_id).await
    }
}

fn obligation_table(family: Family) -> &'static str {
    match family {
        Family::General => "expenses",
        Family::Service => "service_expenses",
    }
}

fn payment_table(family: Family) -> &'static str {
    match family {
        Family::General => "payments",
        Family::Service => "service_payments",
    }
}

fn link_table(family: Family) -> &'static str {
    match family {
        Family::General => "expense_payments",
        Family::Service => "service_expense_payments",
    }
}
