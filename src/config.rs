//! Configuration file support for event studies.
//!
//! Allows loading study parameters from TOML files for reproducible
//! runs: window geometry, data file locations and formats, model choice,
//! and the batch failure policy.

use crate::batch::BatchInputConfig;
use crate::calendar::ResolverConfig;
use crate::data::DataConfig;
use crate::error::Result;
use crate::multiple::BatchConfig;
use crate::types::{ExpectationModel, WindowSpec};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tracing::info;

/// Complete study configuration loaded from a file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StudyFileConfig {
    /// Window geometry.
    #[serde(default)]
    pub windows: WindowSettings,
    /// Data file locations and parsing.
    #[serde(default)]
    pub data: DataSettings,
    /// Model and batch policy.
    #[serde(default)]
    pub study: StudySettings,
}

/// Window geometry settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WindowSettings {
    #[serde(default = "default_event_start")]
    pub event_start: i32,
    #[serde(default = "default_event_end")]
    pub event_end: i32,
    #[serde(default = "default_estimation_size")]
    pub estimation_size: usize,
    #[serde(default = "default_buffer_size")]
    pub buffer_size: usize,
}

fn default_event_start() -> i32 { -10 }
fn default_event_end() -> i32 { 10 }
fn default_estimation_size() -> usize { 300 }
fn default_buffer_size() -> usize { 30 }

impl Default for WindowSettings {
    fn default() -> Self {
        Self {
            event_start: -10,
            event_end: 10,
            estimation_size: 300,
            buffer_size: 30,
        }
    }
}

/// Data file settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataSettings {
    /// Path to the wide returns CSV.
    pub returns_path: Option<String>,
    /// Path to the factor CSV.
    pub factors_path: Option<String>,
    #[serde(default = "default_date_format")]
    pub date_format: String,
    /// Fama-French files date their rows as plain yyyymmdd numbers.
    #[serde(default = "default_factor_date_format")]
    pub factor_date_format: String,
    /// Return columns hold prices; convert on load.
    #[serde(default)]
    pub prices: bool,
    #[serde(default = "default_true")]
    pub log_returns: bool,
    /// Factor values are given in percent.
    #[serde(default = "default_true")]
    pub rescale_factors: bool,
}

fn default_date_format() -> String { "%Y-%m-%d".to_string() }
fn default_factor_date_format() -> String { "%Y%m%d".to_string() }
fn default_true() -> bool { true }

impl Default for DataSettings {
    fn default() -> Self {
        Self {
            returns_path: None,
            factors_path: None,
            date_format: default_date_format(),
            factor_date_format: default_factor_date_format(),
            prices: false,
            log_returns: true,
            rescale_factors: true,
        }
    }
}

/// Model choice and batch policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StudySettings {
    /// Model name: "constant-mean", "market", "ff3", "ff5".
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_true")]
    pub ignore_errors: bool,
    /// Path to the event list CSV.
    pub events_path: Option<String>,
    #[serde(default = "default_date_format")]
    pub event_date_format: String,
    #[serde(default = "default_fallback")]
    pub date_fallback_days: u32,
    #[serde(default = "default_factor_set")]
    pub factor_set: String,
}

fn default_model() -> String { "market".to_string() }
fn default_fallback() -> u32 { 4 }
fn default_factor_set() -> String { "famafrench".to_string() }

impl Default for StudySettings {
    fn default() -> Self {
        Self {
            model: default_model(),
            ignore_errors: true,
            events_path: None,
            event_date_format: default_date_format(),
            date_fallback_days: default_fallback(),
            factor_set: default_factor_set(),
        }
    }
}

impl StudyFileConfig {
    /// Load a study configuration from a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref())?;
        let config = Self::from_toml(&content)?;
        info!(path = %path.as_ref().display(), "loaded study configuration");
        Ok(config)
    }

    /// Parse a study configuration from a TOML string.
    pub fn from_toml(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    pub fn window_spec(&self) -> WindowSpec {
        WindowSpec::new(
            (self.windows.event_start, self.windows.event_end),
            self.windows.estimation_size,
            self.windows.buffer_size,
        )
    }

    pub fn model(&self) -> Result<ExpectationModel> {
        ExpectationModel::parse(&self.study.model)
    }

    pub fn batch_config(&self) -> BatchConfig {
        BatchConfig {
            ignore_errors: self.study.ignore_errors,
        }
    }

    pub fn resolver_config(&self) -> ResolverConfig {
        ResolverConfig {
            date_fallback_days: self.study.date_fallback_days,
        }
    }

    pub fn returns_data_config(&self) -> DataConfig {
        let mut config = DataConfig::default().with_date_format(self.data.date_format.clone());
        if self.data.prices {
            config = config.prices(self.data.log_returns);
        }
        config
    }

    pub fn factors_data_config(&self) -> DataConfig {
        let mut config =
            DataConfig::default().with_date_format(self.data.factor_date_format.clone());
        if self.data.rescale_factors {
            config = config.percent_factors();
        }
        config
    }

    pub fn batch_input_config(&self) -> BatchInputConfig {
        BatchInputConfig {
            date_format: self.study.event_date_format.clone(),
            ..Default::default()
        }
    }
}
