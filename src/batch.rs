//! Batch input adapters.
//!
//! Turns tabular event lists into `EventSpec`s: a delimited file with
//! columns named exactly after the parameter names (`security_ticker`,
//! `market_ticker`, `event_date`), or an in-memory ordered sequence of
//! parameter mappings. Malformed rows surface as recorded errors routed
//! through the batch `ignore_errors` policy, never as silent drops.

use crate::error::{ErrorKind, EventStudyError, Result};
use crate::multiple::EventError;
use crate::types::{EventSpec, ExpectationModel, WindowSpec};
use chrono::NaiveDate;
use csv::ReaderBuilder;
use std::collections::HashMap;
use std::path::Path;
use tracing::debug;

/// One event row as a parameter mapping, keyed by parameter name.
pub type EventRecord = HashMap<String, String>;

/// Parsing configuration for batch input files.
#[derive(Debug, Clone)]
pub struct BatchInputConfig {
    /// Date format of the `event_date` column (chrono pattern).
    pub date_format: String,
    /// CSV delimiter.
    pub delimiter: u8,
}

impl Default for BatchInputConfig {
    fn default() -> Self {
        Self {
            date_format: "%Y-%m-%d".to_string(),
            delimiter: b',',
        }
    }
}

/// Parsed batch input: specs that parsed cleanly, in input order, plus
/// one recorded error per malformed row.
///
/// `positions[i]` is the input row position of `specs[i]`, so batch
/// results can report errors against original row numbers.
#[derive(Debug, Clone)]
pub struct BatchInput {
    pub specs: Vec<EventSpec>,
    pub positions: Vec<usize>,
    pub malformed: Vec<EventError>,
}

/// Parse an in-memory sequence of parameter mappings.
pub fn events_from_records(
    records: &[EventRecord],
    model: ExpectationModel,
    windows: WindowSpec,
    config: &BatchInputConfig,
) -> BatchInput {
    let mut input = BatchInput {
        specs: Vec::with_capacity(records.len()),
        positions: Vec::with_capacity(records.len()),
        malformed: Vec::new(),
    };

    for (index, record) in records.iter().enumerate() {
        match parse_record(record, index, model, windows, config) {
            Ok(spec) => {
                input.specs.push(spec);
                input.positions.push(index);
            }
            Err(error) => input.malformed.push(EventError {
                index,
                security_ticker: record
                    .get("security_ticker")
                    .cloned()
                    .unwrap_or_default(),
                event_date: None,
                kind: ErrorKind::MalformedInput,
                message: error.to_string(),
            }),
        }
    }

    debug!(
        parsed = input.specs.len(),
        malformed = input.malformed.len(),
        "parsed batch records"
    );
    input
}

/// Parse a delimited event file with a header row.
pub fn events_from_csv(
    path: impl AsRef<Path>,
    model: ExpectationModel,
    windows: WindowSpec,
    config: &BatchInputConfig,
) -> Result<BatchInput> {
    let mut reader = ReaderBuilder::new()
        .delimiter(config.delimiter)
        .trim(csv::Trim::All)
        .from_path(path.as_ref())?;

    let headers: Vec<String> = reader.headers()?.iter().map(|h| h.to_string()).collect();
    let mut records = Vec::new();
    for row in reader.records() {
        let row = row?;
        let record: EventRecord = headers
            .iter()
            .cloned()
            .zip(row.iter().map(|f| f.to_string()))
            .collect();
        records.push(record);
    }

    Ok(events_from_records(&records, model, windows, config))
}

fn parse_record(
    record: &EventRecord,
    index: usize,
    model: ExpectationModel,
    windows: WindowSpec,
    config: &BatchInputConfig,
) -> Result<EventSpec> {
    let field = |name: &str| -> Result<&str> {
        record
            .get(name)
            .map(String::as_str)
            .filter(|v| !v.is_empty())
            .ok_or_else(|| EventStudyError::MalformedInput {
                record: index,
                message: format!("missing column '{}'", name),
            })
    };

    let security_ticker = field("security_ticker")?;
    let raw_date = field("event_date")?;
    let event_date =
        NaiveDate::parse_from_str(raw_date, &config.date_format).map_err(|e| {
            EventStudyError::MalformedInput {
                record: index,
                message: format!("event_date '{}': {}", raw_date, e),
            }
        })?;

    let mut spec = EventSpec::new(security_ticker, event_date, windows, model);
    if let Some(market) = record.get("market_ticker").filter(|v| !v.is_empty()) {
        spec = spec.with_market(market.as_str());
    }

    if model.needs_market() && spec.market_ticker.is_none() {
        return Err(EventStudyError::MalformedInput {
            record: index,
            message: "market model requires a 'market_ticker' column".to_string(),
        });
    }

    Ok(spec)
}
