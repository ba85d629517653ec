use serde::{Deserialize, Serialize};
use std::io;
use std::path::Path;
use thiserror::Error;

use crate::Amount;
use crate::catalog::StaticCatalog;
use crate::model::{CurrencyKind, CurrencyPack, EconomyGroup};
use crate::session::{Answer, Command};

/// Errors that can occur when reading or writing csv files
#[derive(Debug, Error)]
pub enum CsvError {
    #[error("failed to open {path}: {source}")]
    Open { path: String, source: csv::Error },

    #[error("line {line}: failed to parse row: {source}")]
    Parse { line: usize, source: csv::Error },

    #[error("line {line}: unrecognized attempt type '{kind}'")]
    UnrecognizedType { line: usize, kind: String },

    #[error("failed to write csv: {0}")]
    Write(#[from] csv::Error),

    #[error("failed to flush csv writer: {0}")]
    Flush(#[from] io::Error),
}

#[derive(Debug, Deserialize)]
struct AttemptRow {
    r#type: String,
    currency: CurrencyKind,
    amount: Amount,
    group: Option<String>,
    answer: Option<Answer>,
}

#[derive(Debug, Serialize)]
struct BalanceRow {
    currency: &'static str,
    balance: String,
}

fn reader(path: &Path) -> Result<csv::Reader<std::fs::File>, CsvError> {
    csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_path(path)
        .map_err(|source| CsvError::Open {
            path: path.display().to_string(),
            source,
        })
}

/// Read the premium pack catalog (`sku,amount`).
///
/// Bad rows are reported and skipped.
pub fn read_catalog(path: impl AsRef<Path>) -> Result<(StaticCatalog, Vec<CsvError>), CsvError> {
    let mut packs = Vec::new();
    let mut errors = Vec::new();

    for (idx, result) in reader(path.as_ref())?
        .into_deserialize::<CurrencyPack>()
        .enumerate()
    {
        let line = idx + 2; // 1-indexed, skip header
        match result {
            Ok(pack) => packs.push(pack),
            Err(source) => errors.push(CsvError::Parse { line, source }),
        }
    }
    Ok((StaticCatalog::new(packs), errors))
}

/// Read grants and purchase attempts from a csv file
pub fn read_commands(
    path: impl AsRef<Path>,
) -> Result<impl Iterator<Item = Result<Command, CsvError>>, CsvError> {
    let reader = reader(path.as_ref())?;

    Ok(reader
        .into_deserialize::<AttemptRow>()
        .enumerate()
        .map(|(idx, result)| {
            let line = idx + 2;
            let row = result.map_err(|source| CsvError::Parse { line, source })?;
            match row.r#type.as_str() {
                "grant" => Ok(Command::Grant {
                    currency: row.currency,
                    amount: row.amount,
                }),
                "purchase" => Ok(Command::Purchase {
                    currency: row.currency,
                    amount: row.amount,
                    group: row.group.map(EconomyGroup::new),
                    answer: row.answer.unwrap_or_default(),
                }),
                other => Err(CsvError::UnrecognizedType {
                    line,
                    kind: other.to_string(),
                }),
            }
        }))
}

/// Write wallet balances in csv format
pub fn write_balances(
    writer: impl io::Write,
    balances: impl IntoIterator<Item = (CurrencyKind, Amount)>,
) -> Result<(), CsvError> {
    let mut writer = csv::Writer::from_writer(writer);

    for (currency, balance) in balances {
        writer.serialize(BalanceRow {
            currency: currency.as_str(),
            balance: balance.to_string(),
        })?;
    }

    writer.flush()?;
    Ok(())
}
