//! Kestrel - an event study engine for financial returns.
//!
//! # Overview
//!
//! Kestrel implements the classical event study methodology: it measures
//! whether a security's returns around a calendar event deviate
//! abnormally from a model-implied expectation, and aggregates that
//! measurement across many events.
//!
//! - **Expectation models**: constant-mean, market model, Fama-French
//!   3- and 5-factor OLS
//! - **Single events**: abnormal returns, cumulative abnormal returns,
//!   variance propagation, t-statistics, p-values, significance tiers
//! - **Batches**: parallel fan-out, partial-failure reporting, AAR/CAAR
//!   aggregation, generalized sign test, rank test, CAR distributions
//! - **Data loading**: wide CSV return and factor files with
//!   configurable date formats, price-to-return conversion
//! - **Configuration files**: TOML-based study files for reproducibility
//!
//! # Quick Start
//!
//! ```no_run
//! use kestrel::{
//!     data::{DataConfig, MarketData},
//!     engine::EventEngine,
//!     multiple::BatchConfig,
//!     types::{EventSpec, ExpectationModel, WindowSpec},
//! };
//! use chrono::NaiveDate;
//!
//! // Load returns (date column + one column per ticker)
//! let mut data = MarketData::new();
//! data.import_returns_csv("returns.csv", &DataConfig::default()).unwrap();
//!
//! // Describe one event
//! let spec = EventSpec::new(
//!     "AAPL",
//!     NaiveDate::from_ymd_opt(2007, 1, 9).unwrap(),
//!     WindowSpec::new((-5, 20), 300, 30),
//!     ExpectationModel::Market,
//! )
//! .with_market("SPY");
//!
//! // Compute it
//! let engine = EventEngine::new(&data);
//! let result = engine.run_single(&spec).unwrap();
//! println!("{}", kestrel::report::single_results_table(&result));
//! ```
//!
//! # Modules
//!
//! - [`types`]: core data types (series, specs, windows, models)
//! - [`error`]: error taxonomy and `Result` alias
//! - [`calendar`]: event date and window resolution
//! - [`data`]: data source trait, in-memory store, CSV import
//! - [`models`]: expectation model estimators
//! - [`stats`]: shared statistical helpers
//! - [`single`]: single-event computation
//! - [`multiple`]: batch computation and cross-sectional aggregation
//! - [`batch`]: tabular batch input adapters
//! - [`report`]: result tables, error reports, JSON export
//! - [`config`]: TOML study-file support
//! - [`engine`]: orchestration facade

pub mod batch;
pub mod calendar;
pub mod config;
pub mod data;
pub mod engine;
pub mod error;
pub mod models;
pub mod multiple;
pub mod report;
pub mod single;
pub mod stats;
pub mod types;

// Re-exports for convenience
pub use batch::{events_from_csv, events_from_records, BatchInput, BatchInputConfig, EventRecord};
pub use calendar::{resolve_windows, ResolvedWindows, ResolverConfig};
pub use config::StudyFileConfig;
pub use data::{DataConfig, DataSource, MarketData};
pub use engine::EventEngine;
pub use error::{ErrorKind, EventStudyError, Result};
pub use models::ModelFit;
pub use multiple::{
    BatchConfig, CarDistribution, EventError, MultipleEventResult, RankTestResult, SignBaseline,
    SignTestResult,
};
pub use single::SingleEventResult;
pub use types::{
    EventSpec, ExpectationModel, FactorSeries, ReturnSeries, Significance, WindowSpec,
};
