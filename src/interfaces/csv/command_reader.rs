use crate::domain::obligation::Family;
use crate::error::{Result, SettlementError};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::io::Read;

/// Billing operations accepted by the batch interface.
#[derive(Debug, Deserialize, PartialEq, Clone, Copy)]
#[serde(rename_all = "lowercase")]
pub enum CommandOp {
    /// Create an obligation.
    Open,
    /// Automatic settlement of a general obligation.
    Settle,
    /// Semi-manual settlement of a service obligation.
    Pay,
    /// Record a standalone payment.
    Register,
    /// Manually link an existing obligation and payment.
    Link,
    /// Remove a link.
    Unlink,
}

/// One row of a command CSV. Columns that an operation does not use are left
/// empty; per-operation requirements are enforced by the executor.
#[derive(Debug, Deserialize, PartialEq, Clone)]
pub struct Command {
    pub op: CommandOp,
    pub family: Option<Family>,
    pub obligation: Option<u32>,
    pub payment: Option<u32>,
    pub category: Option<u32>,
    pub property: Option<u32>,
    pub receipt: Option<String>,
    pub amount: Option<Decimal>,
    pub interest_amount: Option<Decimal>,
    pub interest_rate: Option<Decimal>,
    pub status: Option<u8>,
    pub start_date: Option<NaiveDate>,
    pub due_date: Option<NaiveDate>,
    pub description: Option<String>,
}

impl Command {
    pub fn family(&self) -> Result<Family> {
        self.family
            .ok_or_else(|| SettlementError::ValidationError("family is required".to_string()))
    }

    pub fn obligation(&self) -> Result<u32> {
        self.obligation.ok_or_else(|| {
            SettlementError::ValidationError("obligation id is required".to_string())
        })
    }

    pub fn payment(&self) -> Result<u32> {
        self.payment
            .ok_or_else(|| SettlementError::ValidationError("payment id is required".to_string()))
    }
}

/// Reads billing commands from a CSV source.
///
/// Wraps `csv::Reader` and yields `Result<Command>` lazily, so large batch
/// files stream without being loaded whole.
pub struct CommandReader<R: Read> {
    reader: csv::Reader<R>,
}

impl<R: Read> CommandReader<R> {
    pub fn new(source: R) -> Self {
        let reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .flexible(true)
            .from_reader(source);
        Self { reader }
    }

    pub fn commands(self) -> impl Iterator<Item = Result<Command>> {
        self.reader
            .into_deserialize()
            .map(|result| result.map_err(SettlementError::from))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    const HEADER: &str = "op, family, obligation, payment, category, property, receipt, amount, interest_amount, interest_rate, status, start_date, due_date, description";

    #[test]
    fn test_reader_valid_stream() {
        let data = format!(
            "{HEADER}\nopen, general, , , 1, , , 100.0, , 10, 1, 2026-01-01, 2026-02-01, january\nsettle, general, 1, , , , , , , , , , ,"
        );
        let reader = CommandReader::new(data.as_bytes());
        let results: Vec<Result<Command>> = reader.commands().collect();

        assert_eq!(results.len(), 2);
        let open = results[0].as_ref().unwrap();
        assert_eq!(open.op, CommandOp::Open);
        assert_eq!(open.family, Some(Family::General));
        assert_eq!(open.amount, Some(dec!(100.0)));
        assert_eq!(open.interest_rate, Some(dec!(10)));
        assert_eq!(open.status, Some(1));

        let settle = results[1].as_ref().unwrap();
        assert_eq!(settle.op, CommandOp::Settle);
        assert_eq!(settle.obligation, Some(1));
        assert_eq!(settle.amount, None);
    }

    #[test]
    fn test_reader_malformed_line() {
        let data = format!("{HEADER}\nexplode, general, 1, , , , , , , , , , ,");
        let reader = CommandReader::new(data.as_bytes());
        let results: Vec<Result<Command>> = reader.commands().collect();

        assert!(results[0].is_err());
    }

    #[test]
    fn test_missing_column_accessors() {
        let data = format!("{HEADER}\nsettle, , , , , , , , , , , , ,");
        let reader = CommandReader::new(data.as_bytes());
        let command = reader.commands().next().unwrap().unwrap();

        assert!(matches!(
            command.family(),
            Err(SettlementError::ValidationError(_))
        ));
        assert!(matches!(
            command.obligation(),
            Err(SettlementError::ValidationError(_))
        ));
    }
}
