//! Core data types for the event study engine.

use crate::error::{EventStudyError, Result};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Ordered daily return series for one ticker.
///
/// Dates are strictly increasing trading days; non-trading days are simply
/// absent. The engine never mutates a series, it only slices windows out
/// of it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReturnSeries {
    pub ticker: String,
    pub dates: Vec<NaiveDate>,
    pub returns: Vec<f64>,
}

impl ReturnSeries {
    /// Create a new return series with validation.
    pub fn new(ticker: impl Into<String>, dates: Vec<NaiveDate>, returns: Vec<f64>) -> Result<Self> {
        let ticker = ticker.into();
        if dates.len() != returns.len() {
            return Err(EventStudyError::DataError(format!(
                "series '{}': {} dates but {} returns",
                ticker,
                dates.len(),
                returns.len()
            )));
        }
        if dates.windows(2).any(|w| w[0] >= w[1]) {
            return Err(EventStudyError::DataError(format!(
                "series '{}': dates must be strictly increasing",
                ticker
            )));
        }
        Ok(Self {
            ticker,
            dates,
            returns,
        })
    }

    pub fn len(&self) -> usize {
        self.returns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.returns.is_empty()
    }
}

/// Ordered daily factor series (one date column, several factor columns).
///
/// Stored column-major: `values[j]` is the full history of `columns[j]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FactorSeries {
    pub name: String,
    pub dates: Vec<NaiveDate>,
    pub columns: Vec<String>,
    pub values: Vec<Vec<f64>>,
}

impl FactorSeries {
    /// Create a new factor series with validation.
    pub fn new(
        name: impl Into<String>,
        dates: Vec<NaiveDate>,
        columns: Vec<String>,
        values: Vec<Vec<f64>>,
    ) -> Result<Self> {
        let name = name.into();
        if columns.len() != values.len() {
            return Err(EventStudyError::DataError(format!(
                "factor series '{}': {} column names but {} columns",
                name,
                columns.len(),
                values.len()
            )));
        }
        if values.iter().any(|v| v.len() != dates.len()) {
            return Err(EventStudyError::DataError(format!(
                "factor series '{}': column length does not match date column",
                name
            )));
        }
        if dates.windows(2).any(|w| w[0] >= w[1]) {
            return Err(EventStudyError::DataError(format!(
                "factor series '{}': dates must be strictly increasing",
                name
            )));
        }
        Ok(Self {
            name,
            dates,
            columns,
            values,
        })
    }

    /// Full history of one named factor column.
    pub fn column(&self, name: &str) -> Option<&[f64]> {
        self.columns
            .iter()
            .position(|c| c == name)
            .map(|i| self.values[i].as_slice())
    }

    pub fn len(&self) -> usize {
        self.dates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }
}

/// Expectation model used to compute normal (expected) returns.
///
/// A closed set of variants sharing one fit/predict contract; see the
/// `models` module for the estimators themselves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExpectationModel {
    /// Expected return is the estimation-window sample mean.
    ConstantMean,
    /// OLS of security return on one benchmark return (intercept + slope).
    Market,
    /// OLS of excess return on the Fama-French three factors.
    FamaFrench3,
    /// OLS of excess return on the Fama-French five factors.
    FamaFrench5,
}

impl ExpectationModel {
    /// Number of fitted parameters (intercept included).
    pub fn parameter_count(&self) -> usize {
        match self {
            ExpectationModel::ConstantMean => 1,
            ExpectationModel::Market => 2,
            ExpectationModel::FamaFrench3 => 4,
            ExpectationModel::FamaFrench5 => 6,
        }
    }

    /// Factor columns this model reads from a factor series, excluding
    /// the risk-free column.
    pub fn factor_columns(&self) -> &'static [&'static str] {
        match self {
            ExpectationModel::ConstantMean | ExpectationModel::Market => &[],
            ExpectationModel::FamaFrench3 => &["Mkt-RF", "SMB", "HML"],
            ExpectationModel::FamaFrench5 => &["Mkt-RF", "SMB", "HML", "RMW", "CMA"],
        }
    }

    /// Whether this model regresses on a benchmark ticker from the
    /// returns data.
    pub fn needs_market(&self) -> bool {
        matches!(self, ExpectationModel::Market)
    }

    /// Whether this model reads a factor series.
    pub fn needs_factors(&self) -> bool {
        !self.factor_columns().is_empty()
    }

    /// Parse a model name as written in study files ("market",
    /// "constant-mean", "ff3", "ff5").
    pub fn parse(name: &str) -> Result<Self> {
        match name.to_ascii_lowercase().as_str() {
            "constant-mean" | "constant_mean" | "mean" => Ok(ExpectationModel::ConstantMean),
            "market" | "market-model" | "market_model" => Ok(ExpectationModel::Market),
            "ff3" | "fama-french-3" | "famafrench3" => Ok(ExpectationModel::FamaFrench3),
            "ff5" | "fama-french-5" | "famafrench5" => Ok(ExpectationModel::FamaFrench5),
            other => Err(EventStudyError::ConfigError(format!(
                "unknown expectation model: {}",
                other
            ))),
        }
    }
}

impl fmt::Display for ExpectationModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ExpectationModel::ConstantMean => "constant-mean",
            ExpectationModel::Market => "market",
            ExpectationModel::FamaFrench3 => "ff3",
            ExpectationModel::FamaFrench5 => "ff5",
        };
        f.write_str(s)
    }
}

/// Window geometry shared by every event in a study.
///
/// The event window runs from `event_window.0` to `event_window.1` in
/// trading days relative to the event date, both inclusive. The
/// estimation window holds `estimation_size` trading days and ends
/// `buffer_size` trading days before the event window starts, so that
/// estimation is never contaminated by event-window returns.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WindowSpec {
    /// (start_offset, end_offset), start <= 0 <= end.
    pub event_window: (i32, i32),
    /// Length of the estimation window in trading days.
    pub estimation_size: usize,
    /// Gap between estimation window and event window in trading days.
    pub buffer_size: usize,
}

impl Default for WindowSpec {
    fn default() -> Self {
        Self {
            event_window: (-10, 10),
            estimation_size: 300,
            buffer_size: 30,
        }
    }
}

impl WindowSpec {
    pub fn new(event_window: (i32, i32), estimation_size: usize, buffer_size: usize) -> Self {
        Self {
            event_window,
            estimation_size,
            buffer_size,
        }
    }

    /// Number of offsets in the event window.
    pub fn event_window_size(&self) -> usize {
        (self.event_window.1 - self.event_window.0 + 1) as usize
    }

    /// Relative trading-day offsets covered by the event window.
    pub fn offsets(&self) -> Vec<i32> {
        (self.event_window.0..=self.event_window.1).collect()
    }

    /// Check the window invariants.
    pub fn validate(&self) -> Result<()> {
        let (start, end) = self.event_window;
        if start > 0 || end < 0 {
            return Err(EventStudyError::ConfigError(format!(
                "event window ({}, {}) must satisfy start <= 0 <= end",
                start, end
            )));
        }
        if self.estimation_size == 0 {
            return Err(EventStudyError::ConfigError(
                "estimation_size must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

/// Full specification of one event study computation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventSpec {
    /// Ticker of the security under study, as named in the returns data.
    pub security_ticker: String,
    /// Benchmark ticker, required by the market model.
    pub market_ticker: Option<String>,
    /// Date of the event.
    pub event_date: NaiveDate,
    /// Window geometry.
    pub windows: WindowSpec,
    /// Expectation model to fit on the estimation window.
    pub model: ExpectationModel,
}

impl EventSpec {
    pub fn new(
        security_ticker: impl Into<String>,
        event_date: NaiveDate,
        windows: WindowSpec,
        model: ExpectationModel,
    ) -> Self {
        Self {
            security_ticker: security_ticker.into(),
            market_ticker: None,
            event_date,
            windows,
            model,
        }
    }

    pub fn with_market(mut self, market_ticker: impl Into<String>) -> Self {
        self.market_ticker = Some(market_ticker.into());
        self
    }

    /// Check spec invariants before any data is touched.
    pub fn validate(&self) -> Result<()> {
        self.windows.validate()?;
        if self.model.needs_market() && self.market_ticker.is_none() {
            return Err(EventStudyError::ConfigError(format!(
                "event {} {}: market model requires a market ticker",
                self.security_ticker, self.event_date
            )));
        }
        Ok(())
    }
}

/// Significance tier of a p-value, rendered as asterisks in reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Significance {
    None,
    /// p <= 0.10
    Ninety,
    /// p <= 0.05
    NinetyFive,
    /// p <= 0.01
    NinetyNine,
}

impl Significance {
    /// Tier for a two-tailed p-value.
    pub fn from_p_value(p: f64) -> Self {
        if p <= 0.01 {
            Significance::NinetyNine
        } else if p <= 0.05 {
            Significance::NinetyFive
        } else if p <= 0.10 {
            Significance::Ninety
        } else {
            Significance::None
        }
    }

    /// Asterisk marks used in result tables.
    pub fn marks(&self) -> &'static str {
        match self {
            Significance::None => "",
            Significance::Ninety => "*",
            Significance::NinetyFive => "**",
            Significance::NinetyNine => "***",
        }
    }
}

impl fmt::Display for Significance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.marks())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_return_series_validation() {
        let ok = ReturnSeries::new(
            "AAPL",
            vec![date(2020, 1, 2), date(2020, 1, 3)],
            vec![0.01, -0.02],
        );
        assert!(ok.is_ok());

        let bad_len = ReturnSeries::new("AAPL", vec![date(2020, 1, 2)], vec![0.01, -0.02]);
        assert!(bad_len.is_err());

        let bad_order = ReturnSeries::new(
            "AAPL",
            vec![date(2020, 1, 3), date(2020, 1, 2)],
            vec![0.01, -0.02],
        );
        assert!(bad_order.is_err());
    }

    #[test]
    fn test_factor_series_column_lookup() {
        let fs = FactorSeries::new(
            "ff",
            vec![date(2020, 1, 2), date(2020, 1, 3)],
            vec!["Mkt-RF".to_string(), "RF".to_string()],
            vec![vec![0.01, 0.02], vec![0.0001, 0.0001]],
        )
        .unwrap();
        assert_eq!(fs.column("Mkt-RF"), Some(&[0.01, 0.02][..]));
        assert!(fs.column("SMB").is_none());
    }

    #[test]
    fn test_window_spec_size_and_offsets() {
        let w = WindowSpec::new((-2, 3), 100, 10);
        assert_eq!(w.event_window_size(), 6);
        assert_eq!(w.offsets(), vec![-2, -1, 0, 1, 2, 3]);
        assert!(w.validate().is_ok());

        let bad = WindowSpec::new((1, 3), 100, 10);
        assert!(bad.validate().is_err());
    }

    #[test]
    fn test_event_spec_market_model_requires_market() {
        let spec = EventSpec::new(
            "AAPL",
            date(2020, 6, 1),
            WindowSpec::default(),
            ExpectationModel::Market,
        );
        assert!(spec.validate().is_err());
        let spec = spec.with_market("SPY");
        assert!(spec.validate().is_ok());
    }

    #[test]
    fn test_model_parameter_counts() {
        assert_eq!(ExpectationModel::ConstantMean.parameter_count(), 1);
        assert_eq!(ExpectationModel::Market.parameter_count(), 2);
        assert_eq!(ExpectationModel::FamaFrench3.parameter_count(), 4);
        assert_eq!(ExpectationModel::FamaFrench5.parameter_count(), 6);
    }

    #[test]
    fn test_significance_tiers() {
        assert_eq!(Significance::from_p_value(0.005), Significance::NinetyNine);
        assert_eq!(Significance::from_p_value(0.01), Significance::NinetyNine);
        assert_eq!(Significance::from_p_value(0.03), Significance::NinetyFive);
        assert_eq!(Significance::from_p_value(0.05), Significance::NinetyFive);
        assert_eq!(Significance::from_p_value(0.07), Significance::Ninety);
        assert_eq!(Significance::from_p_value(0.10), Significance::Ninety);
        assert_eq!(Significance::from_p_value(0.2), Significance::None);
        assert_eq!(Significance::NinetyNine.marks(), "***");
    }

    #[test]
    fn test_model_parse_roundtrip() {
        for m in [
            ExpectationModel::ConstantMean,
            ExpectationModel::Market,
            ExpectationModel::FamaFrench3,
            ExpectationModel::FamaFrench5,
        ] {
            assert_eq!(ExpectationModel::parse(&m.to_string()).unwrap(), m);
        }
        assert!(ExpectationModel::parse("garch").is_err());
    }
}
