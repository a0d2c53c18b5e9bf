//! Market data loading and access.
//!
//! The engine reads return and factor series through the [`DataSource`]
//! trait; [`MarketData`] is the in-memory implementation with CSV
//! importers. Return files are wide tables (one date column followed by
//! one column per ticker); factor files are one date column followed by
//! one column per factor.

use crate::error::{EventStudyError, Result};
use crate::types::{FactorSeries, ReturnSeries};
use chrono::NaiveDate;
use csv::ReaderBuilder;
use std::collections::HashMap;
use std::path::Path;
use tracing::{debug, info};

/// Supplier of aligned trading-day series.
///
/// The engine treats lookups as synchronous calls returning fully
/// materialized series; an unavailable series fails with a
/// distinguishable error recorded against the requesting event.
pub trait DataSource: Sync {
    fn returns(&self, ticker: &str) -> Result<&ReturnSeries>;
    fn factors(&self, name: &str) -> Result<&FactorSeries>;
}

/// CSV import configuration.
#[derive(Debug, Clone)]
pub struct DataConfig {
    /// Date format of the date column (chrono pattern).
    pub date_format: String,
    /// CSV delimiter.
    pub delimiter: u8,
    /// Input columns contain prices rather than returns; convert on load.
    pub is_price: bool,
    /// When converting prices, compute log returns instead of simple
    /// percentage changes.
    pub log_returns: bool,
    /// Divide factor values by 100 (Fama-French files ship in percent).
    pub rescale_percent: bool,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            date_format: "%Y-%m-%d".to_string(),
            delimiter: b',',
            is_price: false,
            log_returns: true,
            rescale_percent: false,
        }
    }
}

impl DataConfig {
    pub fn with_date_format(mut self, format: impl Into<String>) -> Self {
        self.date_format = format.into();
        self
    }

    pub fn prices(mut self, log_returns: bool) -> Self {
        self.is_price = true;
        self.log_returns = log_returns;
        self
    }

    pub fn percent_factors(mut self) -> Self {
        self.rescale_percent = true;
        self
    }
}

/// In-memory market data store.
#[derive(Debug, Default)]
pub struct MarketData {
    returns: HashMap<String, ReturnSeries>,
    factors: HashMap<String, FactorSeries>,
}

impl MarketData {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a return series under its ticker.
    pub fn insert_returns(&mut self, series: ReturnSeries) {
        self.returns.insert(series.ticker.clone(), series);
    }

    /// Register a factor series under its name.
    pub fn insert_factors(&mut self, series: FactorSeries) {
        self.factors.insert(series.name.clone(), series);
    }

    /// Import a wide returns CSV: a date column followed by one column
    /// per ticker. With `config.is_price`, prices are converted to
    /// returns and the first date is dropped.
    pub fn import_returns_csv(&mut self, path: impl AsRef<Path>, config: &DataConfig) -> Result<()> {
        let (dates, columns) = read_wide_csv(path.as_ref(), config)?;

        for (ticker, values) in columns {
            let series = if config.is_price {
                if values.len() < 2 {
                    return Err(EventStudyError::DataError(format!(
                        "series '{}': need at least 2 prices to compute returns",
                        ticker
                    )));
                }
                // the first date has no preceding price and is dropped
                ReturnSeries::new(
                    ticker,
                    dates[1..].to_vec(),
                    to_returns(&values, config.log_returns),
                )?
            } else {
                ReturnSeries::new(ticker, dates.clone(), values)?
            };
            self.insert_returns(series);
        }

        info!(
            tickers = self.returns.len(),
            "imported return series from CSV"
        );
        Ok(())
    }

    /// Import a factor CSV: a date column followed by one column per
    /// factor. With `config.rescale_percent`, values are divided by 100.
    pub fn import_factors_csv(
        &mut self,
        name: impl Into<String>,
        path: impl AsRef<Path>,
        config: &DataConfig,
    ) -> Result<()> {
        let (dates, columns) = read_wide_csv(path.as_ref(), config)?;
        let mut names = Vec::with_capacity(columns.len());
        let mut values = Vec::with_capacity(columns.len());
        for (column, mut series) in columns {
            if config.rescale_percent {
                for v in &mut series {
                    *v /= 100.0;
                }
            }
            names.push(column);
            values.push(series);
        }
        let name = name.into();
        debug!(factors = names.len(), rows = dates.len(), %name, "imported factor series");
        self.insert_factors(FactorSeries::new(name, dates, names, values)?);
        Ok(())
    }
}

impl DataSource for MarketData {
    fn returns(&self, ticker: &str) -> Result<&ReturnSeries> {
        self.returns
            .get(ticker)
            .ok_or_else(|| EventStudyError::SeriesUnavailable(format!("returns for '{}'", ticker)))
    }

    fn factors(&self, name: &str) -> Result<&FactorSeries> {
        self.factors
            .get(name)
            .ok_or_else(|| EventStudyError::SeriesUnavailable(format!("factors '{}'", name)))
    }
}

/// Convert a price series to returns.
fn to_returns(prices: &[f64], log_returns: bool) -> Vec<f64> {
    prices
        .windows(2)
        .map(|w| {
            if log_returns {
                (w[1] / w[0]).ln()
            } else {
                (w[1] - w[0]) / w[0]
            }
        })
        .collect()
}

/// Read a wide CSV into a date column and named value columns, preserving
/// header order.
fn read_wide_csv(path: &Path, config: &DataConfig) -> Result<(Vec<NaiveDate>, Vec<(String, Vec<f64>)>)> {
    let mut reader = ReaderBuilder::new()
        .delimiter(config.delimiter)
        .trim(csv::Trim::All)
        .from_path(path)?;

    let headers = reader.headers()?.clone();
    if headers.len() < 2 {
        return Err(EventStudyError::DataError(format!(
            "{}: expected a date column and at least one value column",
            path.display()
        )));
    }

    let column_names: Vec<String> = headers.iter().skip(1).map(|h| h.to_string()).collect();
    let mut dates = Vec::new();
    let mut columns: Vec<Vec<f64>> = vec![Vec::new(); column_names.len()];

    for (row_index, record) in reader.records().enumerate() {
        let record = record?;
        let date_field = record.get(0).unwrap_or_default();
        let date = NaiveDate::parse_from_str(date_field, &config.date_format)?;
        dates.push(date);

        for (j, column) in columns.iter_mut().enumerate() {
            let field = record.get(j + 1).unwrap_or_default();
            let value: f64 = field.parse().map_err(|_| {
                EventStudyError::DataError(format!(
                    "{}: row {}, column '{}': not a number: '{}'",
                    path.display(),
                    row_index + 2,
                    column_names[j],
                    field
                ))
            })?;
            column.push(value);
        }
    }

    Ok((dates, column_names.into_iter().zip(columns).collect()))
}
