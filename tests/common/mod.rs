use chrono::NaiveDate;
use condoledger::application::engine::SettlementEngine;
use condoledger::domain::money::Amount;
use condoledger::domain::obligation::{ObligationDraft, ObligationKind};
use condoledger::domain::status::PaymentStatus;
use condoledger::infrastructure::in_memory::{
    InMemoryAuditSink, InMemoryLinkStore, InMemoryObligationStore, InMemoryPaymentStore,
    InMemoryReferenceCatalog,
};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::fs::File;
use std::io::Error;
use std::path::Path;

/// Engine over in-memory stores with catalog ids 1..=3 pre-registered.
pub async fn engine() -> SettlementEngine {
    let catalog = InMemoryReferenceCatalog::new();
    for id in 1..=3 {
        catalog.add_category(id).await;
        catalog.add_service_type(id).await;
        catalog.add_property(id).await;
    }
    SettlementEngine::new(
        Box::new(InMemoryObligationStore::new()),
        Box::new(InMemoryPaymentStore::new()),
        Box::new(InMemoryLinkStore::new()),
        Box::new(catalog),
        Box::new(InMemoryAuditSink::new()),
    )
}

pub fn general_draft(base: Decimal) -> ObligationDraft {
    ObligationDraft {
        kind: ObligationKind::General {
            category_id: 1,
            property_id: Some(1),
        },
        start_date: NaiveDate::from_ymd_opt(2026, 1, 1).unwrap(),
        due_date: NaiveDate::from_ymd_opt(2026, 2, 1).unwrap(),
        base_amount: Amount::new(base).unwrap(),
        interest_amount: None,
        interest_rate: None,
        description: "integration expense".to_string(),
        status: PaymentStatus::Pending,
    }
}

pub fn service_draft() -> ObligationDraft {
    ObligationDraft {
        kind: ObligationKind::Service {
            service_type_id: 1,
            legacy_status: 1,
        },
        start_date: NaiveDate::from_ymd_opt(2026, 1, 1).unwrap(),
        due_date: NaiveDate::from_ymd_opt(2026, 2, 1).unwrap(),
        base_amount: Amount::new(dec!(80)).unwrap(),
        interest_amount: None,
        interest_rate: None,
        description: "integration service expense".to_string(),
        status: PaymentStatus::Pending,
    }
}

pub const COMMAND_HEADER: [&str; 14] = [
    "op",
    "family",
    "obligation",
    "payment",
    "category",
    "property",
    "receipt",
    "amount",
    "interest_amount",
    "interest_rate",
    "status",
    "start_date",
    "due_date",
    "description",
];

/// Writes a command CSV with the full column set; rows are partial maps of
/// column name to value.
pub fn write_commands(path: &Path, rows: &[&[(&str, &str)]]) -> Result<(), Error> {
    let file = File::create(path)?;
    let mut wtr = csv::WriterBuilder::new().from_writer(file);

    wtr.write_record(COMMAND_HEADER)?;
    for row in rows {
        let record: Vec<&str> = COMMAND_HEADER
            .iter()
            .map(|column| {
                row.iter()
                    .find(|(name, _)| name == column)
                    .map(|(_, value)| *value)
                    .unwrap_or("")
            })
            .collect();
        wtr.write_record(&record)?;
    }

    wtr.flush()?;
    Ok(())
}
