//! Event study execution engine.
//!
//! `EventEngine` wires a data source, the window resolver, and the
//! expectation models together, and exposes single-event and batch
//! entry points, including the tabular batch adapters.

use crate::batch::{self, BatchInput, BatchInputConfig, EventRecord};
use crate::calendar::ResolverConfig;
use crate::data::DataSource;
use crate::error::{EventStudyError, Result};
use crate::multiple::{self, BatchConfig, MultipleEventResult};
use crate::single::{self, SingleEventResult};
use crate::types::{EventSpec, ExpectationModel, WindowSpec};
use std::path::Path;
use tracing::debug;

/// Default name under which a Fama-French factor series is looked up.
pub const DEFAULT_FACTOR_SET: &str = "famafrench";

/// Orchestrates event study computations against a data source.
pub struct EventEngine<'a, D: DataSource> {
    data: &'a D,
    resolver: ResolverConfig,
    factor_set: String,
}

impl<'a, D: DataSource> EventEngine<'a, D> {
    /// Create an engine reading from the given data source.
    pub fn new(data: &'a D) -> Self {
        Self {
            data,
            resolver: ResolverConfig::default(),
            factor_set: DEFAULT_FACTOR_SET.to_string(),
        }
    }

    /// Override the date resolution behavior.
    pub fn with_resolver(mut self, resolver: ResolverConfig) -> Self {
        self.resolver = resolver;
        self
    }

    /// Use a differently named factor series for the factor models.
    pub fn with_factor_set(mut self, name: impl Into<String>) -> Self {
        self.factor_set = name.into();
        self
    }

    /// Compute one event study.
    pub fn run_single(&self, spec: &EventSpec) -> Result<SingleEventResult> {
        single::compute(self.data, &self.resolver, &self.factor_set, spec)
    }

    /// Compute a batch of event studies and aggregate the survivors.
    pub fn run_batch(
        &self,
        specs: &[EventSpec],
        config: &BatchConfig,
    ) -> Result<MultipleEventResult> {
        multiple::compute(self.data, &self.resolver, &self.factor_set, specs, config)
    }

    /// Compute a batch from an in-memory sequence of parameter mappings.
    ///
    /// Malformed records are routed through the same `ignore_errors`
    /// policy as computation failures.
    pub fn run_batch_records(
        &self,
        records: &[EventRecord],
        model: ExpectationModel,
        windows: WindowSpec,
        config: &BatchConfig,
        input_config: &BatchInputConfig,
    ) -> Result<MultipleEventResult> {
        let input = batch::events_from_records(records, model, windows, input_config);
        self.run_parsed_batch(input, config)
    }

    /// Compute a batch from a delimited event file.
    pub fn run_batch_csv(
        &self,
        path: impl AsRef<Path>,
        model: ExpectationModel,
        windows: WindowSpec,
        config: &BatchConfig,
        input_config: &BatchInputConfig,
    ) -> Result<MultipleEventResult> {
        let input = batch::events_from_csv(path, model, windows, input_config)?;
        self.run_parsed_batch(input, config)
    }

    fn run_parsed_batch(
        &self,
        input: BatchInput,
        config: &BatchConfig,
    ) -> Result<MultipleEventResult> {
        if !config.ignore_errors {
            if let Some(first) = input.malformed.first() {
                return Err(EventStudyError::MalformedInput {
                    record: first.index,
                    message: first.message.clone(),
                });
            }
        }

        let mut result = self.run_batch(&input.specs, config)?;

        // computation errors carry positions within the parsed spec list;
        // report them against the original record positions instead
        for error in &mut result.errors {
            error.index = input.positions[error.index];
        }
        result.errors.extend(input.malformed);
        result.errors.sort_by_key(|e| e.index);

        debug!(
            surviving = result.surviving(),
            excluded = result.errors.len(),
            "batch complete"
        );
        Ok(result)
    }
}
