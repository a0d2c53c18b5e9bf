//! Single-event computation.
//!
//! Orchestrates the window resolver and one expectation model for one
//! event: abnormal returns, their variances, cumulative abnormal returns
//! with propagated variance, t-statistics, p-values, and significance
//! markers, indexed by relative trading-day offset.

use crate::calendar::{resolve_windows, ResolverConfig};
use crate::data::DataSource;
use crate::error::{EventStudyError, Result};
use crate::models::{fit_constant_mean, fit_ols, ModelFit};
use crate::stats;
use crate::types::{EventSpec, ExpectationModel, FactorSeries, Significance};
use serde::{Deserialize, Serialize};

/// Result of one event study computation.
///
/// All arrays are indexed 1:1 with the relative offsets of the resolved
/// event window. Immutable once constructed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SingleEventResult {
    /// The specification this result was computed from.
    pub spec: EventSpec,
    /// The fitted expectation model.
    pub fit: ModelFit,
    /// Relative trading-day offsets (event date at 0).
    pub offsets: Vec<i32>,
    /// Abnormal return per offset.
    pub ar: Vec<f64>,
    /// Abnormal return variance per offset (constant across the window).
    pub var_ar: Vec<f64>,
    /// Cumulative abnormal return per offset.
    pub car: Vec<f64>,
    /// Variance of the cumulative abnormal return per offset.
    pub var_car: Vec<f64>,
    /// CAR t-statistic per offset.
    pub t_stat: Vec<f64>,
    /// Two-tailed p-value per offset.
    pub p_value: Vec<f64>,
    /// Significance tier per offset.
    pub significance: Vec<Significance>,
}

impl SingleEventResult {
    /// Assemble a result from abnormal returns and a model fit.
    pub(crate) fn from_abnormal_returns(spec: EventSpec, fit: ModelFit, ar: Vec<f64>) -> Self {
        let var = fit.residual_variance;
        let n = ar.len();

        let var_ar = vec![var; n];
        let car = stats::cumulative_sum(&ar);
        let var_car: Vec<f64> = (1..=n).map(|i| i as f64 * var).collect();
        let t_stat: Vec<f64> = car
            .iter()
            .zip(&var_car)
            .map(|(c, v)| c / v.sqrt())
            .collect();
        let p_value: Vec<f64> = t_stat
            .iter()
            .map(|t| stats::t_p_value_two_tailed(*t, fit.degrees_of_freedom))
            .collect();
        let significance = p_value.iter().map(|p| Significance::from_p_value(*p)).collect();

        Self {
            offsets: spec.windows.offsets(),
            spec,
            fit,
            ar,
            var_ar,
            car,
            var_car,
            t_stat,
            p_value,
            significance,
        }
    }

    /// Number of offsets in the event window.
    pub fn len(&self) -> usize {
        self.ar.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ar.is_empty()
    }

    /// Array position of a relative offset, if inside the window.
    pub fn position_of(&self, offset: i32) -> Option<usize> {
        self.offsets.iter().position(|o| *o == offset)
    }

    /// CAR at a relative offset.
    pub fn car_at(&self, offset: i32) -> Option<f64> {
        self.position_of(offset).map(|i| self.car[i])
    }

    /// CAR over the full window (its last offset).
    pub fn final_car(&self) -> f64 {
        *self.car.last().expect("event window is never empty")
    }
}

/// Compute a single event study.
///
/// Resolver and model errors are propagated unchanged; nothing is
/// swallowed at this layer.
pub fn compute(
    data: &dyn DataSource,
    resolver: &ResolverConfig,
    factor_set: &str,
    spec: &EventSpec,
) -> Result<SingleEventResult> {
    spec.validate()?;

    let security = data.returns(&spec.security_ticker)?;
    let windows = resolve_windows(
        &security.dates,
        spec.event_date,
        &spec.windows,
        resolver,
        &security.ticker,
    )?;
    let sec_est = &security.returns[windows.estimation.clone()];
    let sec_evt = &security.returns[windows.event.clone()];

    let (fit, ar) = match spec.model {
        ExpectationModel::ConstantMean => fit_constant_mean(sec_est, sec_evt)?,
        ExpectationModel::Market => {
            let market_ticker = spec.market_ticker.as_deref().expect("checked by validate");
            let market = data.returns(market_ticker)?;
            let market_windows = resolve_windows(
                &market.dates,
                spec.event_date,
                &spec.windows,
                resolver,
                &market.ticker,
            )?;
            let mkt_est = &market.returns[market_windows.estimation];
            let mkt_evt = &market.returns[market_windows.event];
            fit_ols(spec.model, sec_est, &[mkt_est], sec_evt, &[mkt_evt])?
        }
        ExpectationModel::FamaFrench3 | ExpectationModel::FamaFrench5 => {
            let factors = data.factors(factor_set)?;
            let factor_windows = resolve_windows(
                &factors.dates,
                spec.event_date,
                &spec.windows,
                resolver,
                &factors.name,
            )?;

            let rf = factor_column(factors, "RF")?;
            let rf_est = &rf[factor_windows.estimation.clone()];
            let rf_evt = &rf[factor_windows.event.clone()];

            // dependent variable is the excess return over the risk-free rate
            let y_est: Vec<f64> = sec_est.iter().zip(rf_est).map(|(r, rf)| r - rf).collect();
            let y_evt: Vec<f64> = sec_evt.iter().zip(rf_evt).map(|(r, rf)| r - rf).collect();

            let mut est_cols: Vec<&[f64]> = Vec::new();
            let mut evt_cols: Vec<&[f64]> = Vec::new();
            for name in spec.model.factor_columns() {
                let full = factor_column(factors, name)?;
                est_cols.push(&full[factor_windows.estimation.clone()]);
                evt_cols.push(&full[factor_windows.event.clone()]);
            }

            fit_ols(spec.model, &y_est, &est_cols, &y_evt, &evt_cols)?
        }
    };

    Ok(SingleEventResult::from_abnormal_returns(
        spec.clone(),
        fit,
        ar,
    ))
}

fn factor_column<'a>(factors: &'a FactorSeries, name: &str) -> Result<&'a [f64]> {
    factors.column(name).ok_or_else(|| {
        EventStudyError::DataError(format!(
            "factor series '{}' has no column '{}'",
            factors.name, name
        ))
    })
}
