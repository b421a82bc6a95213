use chrono::{Duration, Utc};
use clap::Parser;
use condoledger::application::engine::{ServicePaymentInput, SettlementEngine};
use condoledger::domain::money::{Amount, InterestRate};
use condoledger::domain::obligation::{Family, ObligationDraft, ObligationKind};
use condoledger::domain::payment::PaymentDraft;
use condoledger::domain::ports::UserId;
use condoledger::error::{Result, SettlementError};
use condoledger::infrastructure::in_memory::{
    InMemoryLinkStore, InMemoryObligationStore, InMemoryPaymentStore, InMemoryReferenceCatalog,
    TracingAuditSink,
};
#[cfg(feature = "storage-rocksdb")]
use condoledger::infrastructure::rocksdb::RocksDbStore;
use condoledger::interfaces::csv::command_reader::{Command, CommandOp, CommandReader};
use condoledger::interfaces::csv::statement_writer::{StatementWriter, collect_rows};
use miette::{IntoDiagnostic, miette};
use std::fs::File;
use std::io;
use std::path::PathBuf;

/// Photo reference recorded on payments imported through the batch file.
const BATCH_IMPORT_PHOTO: &str = "BATCH_IMPORT";

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Input commands CSV file
    input: PathBuf,

    /// Path to persistent database (optional). If provided, uses RocksDB.
    #[arg(long)]
    db_path: Option<PathBuf>,

    /// User id recorded on audit entries
    #[arg(long, default_value_t = 1)]
    user: UserId,
}

#[tokio::main]
async fn main() -> miette::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();

    let catalog = InMemoryReferenceCatalog::new();
    let engine = build_engine(cli.db_path.as_ref(), catalog.clone())?;

    let file = File::open(&cli.input).into_diagnostic()?;
    let reader = CommandReader::new(file);
    for command_result in reader.commands() {
        match command_result {
            Ok(command) => {
                if let Err(e) = execute(&engine, &catalog, &command, cli.user).await {
                    tracing::error!(error = %e, op = ?command.op, "command failed");
                }
            }
            Err(e) => {
                tracing::error!(error = %e, "unreadable command row");
            }
        }
    }

    let mut rows = collect_rows(&engine, Family::General).await.into_diagnostic()?;
    rows.extend(collect_rows(&engine, Family::Service).await.into_diagnostic()?);

    let stdout = io::stdout();
    let mut writer = StatementWriter::new(stdout.lock());
    writer.write_rows(rows).into_diagnostic()?;

    Ok(())
}

fn build_engine(
    db_path: Option<&PathBuf>,
    catalog: InMemoryReferenceCatalog,
) -> miette::Result<SettlementEngine> {
    match db_path {
        #[cfg(feature = "storage-rocksdb")]
        Some(path) => {
            let store = RocksDbStore::open(path).into_diagnostic()?;
            Ok(SettlementEngine::new(
                Box::new(store.clone()),
                Box::new(store.clone()),
                Box::new(store),
                Box::new(catalog),
                Box::new(TracingAuditSink),
            ))
        }
        #[cfg(not(feature = "storage-rocksdb"))]
        Some(_) => Err(miette!(
            "this build has no persistent storage; rebuild with --features storage-rocksdb"
        )),
        None => Ok(SettlementEngine::new(
            Box::new(InMemoryObligationStore::new()),
            Box::new(InMemoryPaymentStore::new()),
            Box::new(InMemoryLinkStore::new()),
            Box::new(catalog),
            Box::new(TracingAuditSink),
        )),
    }
}

async fn execute(
    engine: &SettlementEngine,
    catalog: &InMemoryReferenceCatalog,
    command: &Command,
    user: UserId,
) -> Result<()> {
    match command.op {
        CommandOp::Open => {
            let family = command.family()?;
            let amount = command.amount.ok_or_else(|| {
                SettlementError::ValidationError("amount is required".to_string())
            })?;
            let status_id = command.status.ok_or_else(|| {
                SettlementError::ValidationError("status is required".to_string())
            })?;
            let status = engine.status_registry().resolve(status_id)?;

            let reference = command.category.ok_or_else(|| {
                SettlementError::ValidationError(
                    "category (or service type) is required".to_string(),
                )
            })?;
            // A batch file is self-contained: referenced catalog ids are
            // registered before the obligation is created.
            let kind = match family {
                Family::General => {
                    catalog.add_category(reference).await;
                    if let Some(property) = command.property {
                        catalog.add_property(property).await;
                    }
                    ObligationKind::General {
                        category_id: reference,
                        property_id: command.property,
                    }
                }
                Family::Service => {
                    catalog.add_service_type(reference).await;
                    ObligationKind::Service {
                        service_type_id: reference,
                        legacy_status: 1,
                    }
                }
            };

            let today = Utc::now().date_naive();
            let draft = ObligationDraft {
                kind,
                start_date: command.start_date.unwrap_or(today),
                due_date: command.due_date.unwrap_or(today + Duration::days(30)),
                base_amount: Amount::new(amount)?,
                interest_amount: command.interest_amount,
                interest_rate: command.interest_rate.map(InterestRate::new).transpose()?,
                description: command
                    .description
                    .clone()
                    .unwrap_or_else(|| "imported obligation".to_string()),
                status,
            };
            let obligation = engine.create_obligation(draft, user).await?;
            tracing::info!(
                family = obligation.family().as_str(),
                obligation = obligation.id,
                "obligation opened"
            );
            Ok(())
        }
        CommandOp::Settle => {
            engine.settle_general(command.obligation()?, user).await?;
            Ok(())
        }
        CommandOp::Pay => {
            let input = ServicePaymentInput {
                receipt_number: command.receipt.clone().ok_or_else(|| {
                    SettlementError::ValidationError("receipt is required".to_string())
                })?,
                payment_date: Utc::now(),
                amount: Amount::new(command.amount.ok_or_else(|| {
                    SettlementError::ValidationError("amount is required".to_string())
                })?)?,
                description: command.description.clone(),
                receipt_photo: BATCH_IMPORT_PHOTO.to_string(),
                status_id: command.status.ok_or_else(|| {
                    SettlementError::ValidationError("status is required".to_string())
                })?,
            };
            engine
                .settle_service(command.obligation()?, input, user)
                .await?;
            Ok(())
        }
        CommandOp::Register => {
            let family = command.family()?;
            let status = command
                .status
                .map(|id| engine.status_registry().resolve(id))
                .transpose()?;
            let draft = PaymentDraft {
                family,
                receipt_number: command.receipt.clone().ok_or_else(|| {
                    SettlementError::ValidationError("receipt is required".to_string())
                })?,
                payment_date: Utc::now(),
                amount: Amount::new(command.amount.ok_or_else(|| {
                    SettlementError::ValidationError("amount is required".to_string())
                })?)?,
                description: command.description.clone(),
                receipt_photo: BATCH_IMPORT_PHOTO.to_string(),
                status,
            };
            engine.register_payment(draft, user).await?;
            Ok(())
        }
        CommandOp::Link => {
            engine
                .link_manually(command.family()?, command.obligation()?, command.payment()?, user)
                .await?;
            Ok(())
        }
        CommandOp::Unlink => {
            engine
                .unlink(command.family()?, command.obligation()?, command.payment()?, user)
                .await
        }
    }
}
