//! Cross-sectional aggregation over a batch of events.
//!
//! Runs the single-event engine once per event in parallel, collects
//! survivors and failures in input order, and aggregates the survivors
//! into AAR/CAAR statistics, nonparametric tests, and per-offset CAR
//! distribution summaries.

use crate::calendar::ResolverConfig;
use crate::data::DataSource;
use crate::error::{ErrorKind, EventStudyError, Result};
use crate::single::{self, SingleEventResult};
use crate::stats;
use crate::types::{EventSpec, Significance};
use chrono::NaiveDate;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// Batch failure policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchConfig {
    /// When true, failed events are recorded and excluded from
    /// aggregation; when false, the first observed failure aborts the
    /// whole batch.
    pub ignore_errors: bool,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            ignore_errors: true,
        }
    }
}

/// A recorded single-event failure inside a batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventError {
    /// Position of the event in the input batch.
    pub index: usize,
    pub security_ticker: String,
    /// Absent when the record never parsed far enough to yield a date.
    pub event_date: Option<NaiveDate>,
    pub kind: ErrorKind,
    pub message: String,
}

impl EventError {
    pub(crate) fn new(index: usize, spec: &EventSpec, error: &EventStudyError) -> Self {
        Self {
            index,
            security_ticker: spec.security_ticker.clone(),
            event_date: Some(spec.event_date),
            kind: error.kind(),
            message: error.to_string(),
        }
    }
}

/// Baseline proportion for the generalized sign test.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SignBaseline {
    /// Null of no abnormal effect: half the events positive.
    Half,
    /// Positive-sign frequency observed in the estimation windows,
    /// averaged across events (generalized sign test).
    EstimationImplied,
}

/// Outcome of the generalized sign test at one offset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignTestResult {
    pub offset: i32,
    /// Events with positive CAR at the offset.
    pub positive: usize,
    /// Surviving events.
    pub total: usize,
    /// Expected positive proportion under the null.
    pub baseline: f64,
    pub statistic: f64,
    pub p_value: f64,
}

/// Outcome of the rank test over the event window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankTestResult {
    /// Mean scaled rank of event-window observations (0.5 under the null).
    pub mean_scaled_rank: f64,
    pub statistic: f64,
    pub p_value: f64,
    pub events: usize,
    pub window_size: usize,
}

/// Descriptive statistics of the cross-section of CAR at one offset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CarDistribution {
    pub offset: i32,
    pub mean: f64,
    pub variance: f64,
    /// Excess kurtosis (normal = 0).
    pub kurtosis: f64,
    pub min: f64,
    pub quantile_25: f64,
    pub median: f64,
    pub quantile_75: f64,
    pub max: f64,
}

/// Aggregated result of a batch of event studies.
///
/// Derived entirely from its surviving single-event results; built once
/// per batch run and never mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MultipleEventResult {
    /// Surviving results, in input batch order.
    pub results: Vec<SingleEventResult>,
    /// Recorded failures, in input batch order.
    pub errors: Vec<EventError>,
    /// Relative offsets shared by every surviving event.
    pub offsets: Vec<i32>,
    /// Average abnormal return per offset.
    pub aar: Vec<f64>,
    /// Variance of the average abnormal return per offset.
    pub var_aar: Vec<f64>,
    /// Cumulative average abnormal return per offset.
    pub caar: Vec<f64>,
    /// Variance of the cumulative average abnormal return per offset.
    pub var_caar: Vec<f64>,
    /// CAAR t-statistic per offset.
    pub t_stat: Vec<f64>,
    /// Two-tailed p-value per offset.
    pub p_value: Vec<f64>,
    /// Significance tier per offset.
    pub significance: Vec<Significance>,
    /// Pooled degrees of freedom (sum over surviving events).
    pub degrees_of_freedom: usize,
}

/// Run a batch of event studies and aggregate the survivors.
///
/// Events are computed in parallel; survivor and error lists mirror the
/// input order regardless of completion order. With
/// `config.ignore_errors == false` the first observed failure aborts the
/// batch (best-effort: already-started computations finish and are
/// discarded).
pub fn compute(
    data: &dyn DataSource,
    resolver: &ResolverConfig,
    factor_set: &str,
    specs: &[EventSpec],
    config: &BatchConfig,
) -> Result<MultipleEventResult> {
    validate_batch(specs)?;
    info!(events = specs.len(), "running event study batch");

    if !config.ignore_errors {
        let results: Vec<SingleEventResult> = specs
            .par_iter()
            .map(|spec| single::compute(data, resolver, factor_set, spec))
            .collect::<Result<Vec<_>>>()?;
        return MultipleEventResult::aggregate(results, Vec::new());
    }

    let outcomes: Vec<std::result::Result<SingleEventResult, EventError>> = specs
        .par_iter()
        .enumerate()
        .map(|(index, spec)| {
            single::compute(data, resolver, factor_set, spec)
                .map_err(|e| EventError::new(index, spec, &e))
        })
        .collect();

    let mut results = Vec::with_capacity(specs.len());
    let mut errors = Vec::new();
    for outcome in outcomes {
        match outcome {
            Ok(result) => results.push(result),
            Err(error) => errors.push(error),
        }
    }

    if !errors.is_empty() {
        warn!(
            excluded = errors.len(),
            surviving = results.len(),
            "events excluded from aggregation; see the error report"
        );
    }

    MultipleEventResult::aggregate(results, errors)
}

/// Reject mixed event-window geometry before any computation starts.
fn validate_batch(specs: &[EventSpec]) -> Result<()> {
    if specs.is_empty() {
        return Err(EventStudyError::ConfigError(
            "batch contains no events".to_string(),
        ));
    }
    let window = specs[0].windows.event_window;
    for (i, spec) in specs.iter().enumerate() {
        if spec.windows.event_window != window {
            return Err(EventStudyError::ConfigError(format!(
                "event {} has window ({}, {}) but the batch uses ({}, {}); all events must share one event window",
                i, spec.windows.event_window.0, spec.windows.event_window.1, window.0, window.1
            )));
        }
    }
    Ok(())
}

impl MultipleEventResult {
    /// Aggregate surviving results into cross-sectional statistics.
    fn aggregate(results: Vec<SingleEventResult>, errors: Vec<EventError>) -> Result<Self> {
        let survivors = results.len();
        if survivors == 0 {
            return Err(EventStudyError::DataError(format!(
                "no events survived the batch ({} failed)",
                errors.len()
            )));
        }

        let offsets = results[0].offsets.clone();
        let width = offsets.len();
        let n = survivors as f64;

        let mut aar = vec![0.0; width];
        let mut var_aar = vec![0.0; width];
        for result in &results {
            for t in 0..width {
                aar[t] += result.ar[t];
                var_aar[t] += result.var_ar[t];
            }
        }
        for t in 0..width {
            aar[t] /= n;
            var_aar[t] /= n * n;
        }

        let caar = stats::cumulative_sum(&aar);
        let var_caar = stats::cumulative_sum(&var_aar);
        let degrees_of_freedom = results.iter().map(|r| r.fit.degrees_of_freedom).sum();

        let t_stat: Vec<f64> = caar
            .iter()
            .zip(&var_caar)
            .map(|(c, v)| c / v.sqrt())
            .collect();
        let p_value: Vec<f64> = t_stat
            .iter()
            .map(|t| stats::t_p_value_two_tailed(*t, degrees_of_freedom))
            .collect();
        let significance = p_value.iter().map(|p| Significance::from_p_value(*p)).collect();

        Ok(Self {
            results,
            errors,
            offsets,
            aar,
            var_aar,
            caar,
            var_caar,
            t_stat,
            p_value,
            significance,
            degrees_of_freedom,
        })
    }

    /// Number of surviving events.
    pub fn surviving(&self) -> usize {
        self.results.len()
    }

    /// Array position of a relative offset, if inside the window.
    pub fn position_of(&self, offset: i32) -> Option<usize> {
        self.offsets.iter().position(|o| *o == offset)
    }

    fn require_position(&self, offset: i32) -> Result<usize> {
        self.position_of(offset).ok_or_else(|| {
            EventStudyError::ConfigError(format!(
                "offset {} is outside the event window ({}..={})",
                offset,
                self.offsets.first().copied().unwrap_or(0),
                self.offsets.last().copied().unwrap_or(0)
            ))
        })
    }

    /// Cross-section of the surviving events' CAR at one offset.
    pub fn car_cross_section(&self, offset: i32) -> Result<Vec<f64>> {
        let pos = self.require_position(offset)?;
        Ok(self.results.iter().map(|r| r.car[pos]).collect())
    }

    /// Generalized sign test at one offset.
    ///
    /// Compares the observed fraction of events with positive CAR
    /// against the baseline proportion; normal approximation to the
    /// binomial.
    pub fn sign_test(&self, offset: i32, baseline: SignBaseline) -> Result<SignTestResult> {
        let cars = self.car_cross_section(offset)?;
        let total = cars.len();
        let positive = cars.iter().filter(|c| **c > 0.0).count();

        let p0 = match baseline {
            SignBaseline::Half => 0.5,
            SignBaseline::EstimationImplied => {
                let mut acc = 0.0;
                for result in &self.results {
                    let res = &result.fit.estimation_residuals;
                    acc += res.iter().filter(|r| **r > 0.0).count() as f64 / res.len() as f64;
                }
                acc / total as f64
            }
        };

        let spread = (total as f64 * p0 * (1.0 - p0)).sqrt();
        if spread == 0.0 {
            return Err(EventStudyError::DataError(format!(
                "sign test baseline {} is degenerate",
                p0
            )));
        }
        let statistic = (positive as f64 - total as f64 * p0) / spread;

        Ok(SignTestResult {
            offset,
            positive,
            total,
            baseline: p0,
            statistic,
            p_value: stats::normal_p_value_two_tailed(statistic),
        })
    }

    /// Rank test over the event window.
    ///
    /// Each event's estimation-plus-event residual span is turned into
    /// midranks scaled to (0, 1); under the null of no ranking effect
    /// the event-window observations average 0.5. Normal approximation
    /// with Var(U) = 1/12.
    pub fn rank_test(&self) -> Result<RankTestResult> {
        let window_size = self.offsets.len();
        let events = self.results.len();

        let mut acc = 0.0;
        for result in &self.results {
            let mut span = result.fit.estimation_residuals.clone();
            span.extend_from_slice(&result.ar);
            let length = span.len();
            let ranks = stats::midranks(&span);
            // the event window occupies the tail of the span
            for rank in &ranks[length - window_size..] {
                acc += rank / (length as f64 + 1.0);
            }
        }

        let observations = (events * window_size) as f64;
        let mean_scaled_rank = acc / observations;
        let statistic = (mean_scaled_rank - 0.5) * (12.0 * observations).sqrt();

        Ok(RankTestResult {
            mean_scaled_rank,
            statistic,
            p_value: stats::normal_p_value_two_tailed(statistic),
            events,
            window_size,
        })
    }

    /// Descriptive distribution of CAR across events at one offset.
    pub fn car_distribution(&self, offset: i32) -> Result<CarDistribution> {
        let cars = self.car_cross_section(offset)?;
        Ok(CarDistribution {
            offset,
            mean: stats::mean(&cars),
            variance: stats::population_variance(&cars),
            kurtosis: stats::excess_kurtosis(&cars),
            min: cars.iter().copied().fold(f64::INFINITY, f64::min),
            quantile_25: stats::quantile(&cars, 0.25),
            median: stats::quantile(&cars, 0.5),
            quantile_75: stats::quantile(&cars, 0.75),
            max: cars.iter().copied().fold(f64::NEG_INFINITY, f64::max),
        })
    }

    /// CAR distribution at every offset of the event window.
    pub fn car_distribution_table(&self) -> Vec<CarDistribution> {
        self.offsets
            .iter()
            .map(|o| self.car_distribution(*o).expect("offset from own window"))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::MarketData;
    use crate::types::{ExpectationModel, ReturnSeries, WindowSpec};
    use chrono::{Datelike, Duration, NaiveDate};

    fn weekdays(start: NaiveDate, n: usize) -> Vec<NaiveDate> {
        let mut dates = Vec::with_capacity(n);
        let mut d = start;
        while dates.len() < n {
            if d.weekday().num_days_from_monday() < 5 {
                dates.push(d);
            }
            d += Duration::days(1);
        }
        dates
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    /// One long synthetic series shared by all events in a batch.
    fn batch_data() -> (MarketData, Vec<NaiveDate>) {
        let dates = weekdays(date(2015, 1, 1), 600);
        let returns: Vec<f64> = (0..600)
            .map(|i| ((i * 11 % 37) as f64 - 18.0) / 1000.0)
            .collect();
        let mut data = MarketData::new();
        data.insert_returns(ReturnSeries::new("XYZ", dates.clone(), returns).unwrap());
        (data, dates)
    }

    fn spec_at(dates: &[NaiveDate], pos: usize) -> EventSpec {
        EventSpec::new(
            "XYZ",
            dates[pos],
            WindowSpec::new((-2, 2), 100, 10),
            ExpectationModel::ConstantMean,
        )
    }

    #[test]
    fn test_single_event_batch_reduces_to_single_result() {
        let (data, dates) = batch_data();
        let spec = spec_at(&dates, 400);

        let single_result =
            single::compute(&data, &ResolverConfig::default(), "ff", &spec).unwrap();
        let batch = compute(
            &data,
            &ResolverConfig::default(),
            "ff",
            &[spec],
            &BatchConfig::default(),
        )
        .unwrap();

        assert_eq!(batch.surviving(), 1);
        for t in 0..batch.offsets.len() {
            assert!((batch.aar[t] - single_result.ar[t]).abs() < 1e-12);
            assert!((batch.caar[t] - single_result.car[t]).abs() < 1e-12);
            assert!((batch.var_aar[t] - single_result.var_ar[t]).abs() < 1e-12);
        }
        assert_eq!(batch.degrees_of_freedom, single_result.fit.degrees_of_freedom);
    }

    #[test]
    fn test_partial_failure_collects_errors() {
        let (data, dates) = batch_data();
        let mut specs: Vec<EventSpec> = [300, 350, 400, 450].iter().map(|p| spec_at(&dates, *p)).collect();
        // event date far outside the series bounds
        specs.push(EventSpec::new(
            "XYZ",
            date(2030, 1, 6),
            WindowSpec::new((-2, 2), 100, 10),
            ExpectationModel::ConstantMean,
        ));

        let batch = compute(
            &data,
            &ResolverConfig::default(),
            "ff",
            &specs,
            &BatchConfig::default(),
        )
        .unwrap();

        assert_eq!(batch.surviving(), 4);
        assert_eq!(batch.errors.len(), 1);
        assert_eq!(batch.errors[0].index, 4);
        assert_eq!(batch.errors[0].kind, ErrorKind::DateNotFound);
    }

    #[test]
    fn test_fail_fast_aborts_batch() {
        let (data, dates) = batch_data();
        let mut specs: Vec<EventSpec> = [300, 350].iter().map(|p| spec_at(&dates, *p)).collect();
        specs.push(EventSpec::new(
            "XYZ",
            date(2030, 1, 6),
            WindowSpec::new((-2, 2), 100, 10),
            ExpectationModel::ConstantMean,
        ));

        let err = compute(
            &data,
            &ResolverConfig::default(),
            "ff",
            &specs,
            &BatchConfig {
                ignore_errors: false,
            },
        )
        .unwrap_err();
        assert!(matches!(err, EventStudyError::DateNotFound { .. }));
    }

    #[test]
    fn test_mixed_windows_rejected() {
        let (data, dates) = batch_data();
        let mut other = spec_at(&dates, 350);
        other.windows.event_window = (-5, 5);
        let specs = vec![spec_at(&dates, 300), other];

        let err = compute(
            &data,
            &ResolverConfig::default(),
            "ff",
            &specs,
            &BatchConfig::default(),
        )
        .unwrap_err();
        assert!(matches!(err, EventStudyError::ConfigError(_)));
    }

    #[test]
    fn test_empty_batch_rejected() {
        let (data, _) = batch_data();
        let err = compute(
            &data,
            &ResolverConfig::default(),
            "ff",
            &[],
            &BatchConfig::default(),
        )
        .unwrap_err();
        assert!(matches!(err, EventStudyError::ConfigError(_)));
    }

    #[test]
    fn test_aggregation_matches_hand_computation() {
        let (data, dates) = batch_data();
        let specs: Vec<EventSpec> = [300, 400, 500].iter().map(|p| spec_at(&dates, *p)).collect();
        let batch = compute(
            &data,
            &ResolverConfig::default(),
            "ff",
            &specs,
            &BatchConfig::default(),
        )
        .unwrap();

        let n = batch.surviving() as f64;
        for t in 0..batch.offsets.len() {
            let aar: f64 = batch.results.iter().map(|r| r.ar[t]).sum::<f64>() / n;
            assert!((batch.aar[t] - aar).abs() < 1e-12);
            let var: f64 = batch.results.iter().map(|r| r.var_ar[t]).sum::<f64>() / (n * n);
            assert!((batch.var_aar[t] - var).abs() < 1e-12);
        }
        // CAAR is the running sum of AAR
        let mut running = 0.0;
        for t in 0..batch.offsets.len() {
            running += batch.aar[t];
            assert!((batch.caar[t] - running).abs() < 1e-12);
        }
    }

    #[test]
    fn test_sign_test_balance_and_direction() {
        let (data, dates) = batch_data();
        let specs: Vec<EventSpec> = [250, 300, 350, 400, 450, 500]
            .iter()
            .map(|p| spec_at(&dates, *p))
            .collect();
        let batch = compute(
            &data,
            &ResolverConfig::default(),
            "ff",
            &specs,
            &BatchConfig::default(),
        )
        .unwrap();

        let test = batch.sign_test(0, SignBaseline::Half).unwrap();
        assert_eq!(test.total, 6);
        // statistic is zero exactly at balance, grows with imbalance
        let k = test.positive as f64;
        let n = test.total as f64;
        if (k / n - 0.5).abs() < 1e-12 {
            assert!(test.statistic.abs() < 1e-12);
        } else {
            assert!(test.statistic.abs() > 0.0);
            assert_eq!(test.statistic > 0.0, k / n > 0.5);
        }
        assert!(test.p_value >= 0.0 && test.p_value <= 1.0);
    }

    #[test]
    fn test_rank_test_bounds() {
        let (data, dates) = batch_data();
        let specs: Vec<EventSpec> = [300, 400, 500].iter().map(|p| spec_at(&dates, *p)).collect();
        let batch = compute(
            &data,
            &ResolverConfig::default(),
            "ff",
            &specs,
            &BatchConfig::default(),
        )
        .unwrap();

        let test = batch.rank_test().unwrap();
        assert!(test.mean_scaled_rank > 0.0 && test.mean_scaled_rank < 1.0);
        assert!(test.p_value >= 0.0 && test.p_value <= 1.0);
        assert_eq!(test.events, 3);
        assert_eq!(test.window_size, 5);
    }

    #[test]
    fn test_car_distribution_ordering() {
        let (data, dates) = batch_data();
        let specs: Vec<EventSpec> = [250, 300, 350, 400, 450, 500]
            .iter()
            .map(|p| spec_at(&dates, *p))
            .collect();
        let batch = compute(
            &data,
            &ResolverConfig::default(),
            "ff",
            &specs,
            &BatchConfig::default(),
        )
        .unwrap();

        let dist = batch.car_distribution(2).unwrap();
        assert!(dist.min <= dist.quantile_25);
        assert!(dist.quantile_25 <= dist.median);
        assert!(dist.median <= dist.quantile_75);
        assert!(dist.quantile_75 <= dist.max);
        assert!(dist.variance >= 0.0);

        let table = batch.car_distribution_table();
        assert_eq!(table.len(), batch.offsets.len());
        assert_eq!(table[0].offset, -2);

        // out-of-window offset is a configuration error
        assert!(batch.car_distribution(7).is_err());
    }
}
