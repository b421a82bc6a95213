use crate::application::engine::SettlementEngine;
use crate::domain::obligation::Family;
use crate::error::Result;
use rust_decimal::Decimal;
use serde::Serialize;
use std::io::Write;

/// One statement line: an obligation, what it owes, and what has been paid
/// against it through its links.
#[derive(Debug, Serialize, PartialEq)]
pub struct StatementRow {
    pub family: Family,
    pub obligation: u32,
    pub status: &'static str,
    pub total_due: Decimal,
    pub paid: Decimal,
    pub receipts: String,
}

/// Builds the statement rows for one obligation family by joining the
/// obligation ledger with its links and payments.
pub async fn collect_rows(engine: &SettlementEngine, family: Family) -> Result<Vec<StatementRow>> {
    let mut rows = Vec::new();
    for obligation in engine.obligations(family).await? {
        let links = engine.links_for_obligation(family, obligation.id).await?;
        let mut paid = Decimal::ZERO;
        let mut receipts = Vec::new();
        for link in &links {
            if let Some(payment) = engine.payment(family, link.payment_id).await? {
                paid += payment.amount.value();
                receipts.push(payment.receipt_number);
            }
        }
        rows.push(StatementRow {
            family,
            obligation: obligation.id,
            status: obligation.status.describe(),
            total_due: obligation.total_due(),
            paid,
            receipts: receipts.join("|"),
        });
    }
    Ok(rows)
}

/// Writes statement rows as CSV.
pub struct StatementWriter<W: Write> {
    writer: csv::Writer<W>,
}

impl<W: Write> StatementWriter<W> {
    pub fn new(sink: W) -> Self {
        Self {
            writer: csv::Writer::from_writer(sink),
        }
    }

    pub fn write_rows(&mut self, rows: Vec<StatementRow>) -> Result<()> {
        for row in rows {
            self.writer.serialize(row)?;
        }
        self.writer.flush()?;
        Ok(())
    }
}
