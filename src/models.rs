//! Expectation models for normal-return estimation.
//!
//! A closed family of estimators sharing one fit/predict contract: fit on
//! the estimation window, produce an expected return for every event
//! window period, a residual variance, and the degrees of freedom. The
//! regression variants solve ordinary least squares through the normal
//! equations.

use crate::error::{EventStudyError, Result};
use crate::stats;
use crate::types::ExpectationModel;
use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};

/// Outcome of fitting an expectation model on an estimation window.
///
/// Immutable once fit; owned by exactly one single-event computation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelFit {
    pub model: ExpectationModel,
    /// Intercept first, then one slope per regressor. The constant-mean
    /// model stores the mean as its only coefficient.
    pub coefficients: Vec<f64>,
    /// Estimation-window residual variance, used as the per-period AR
    /// variance across the whole event window.
    pub residual_variance: f64,
    /// estimation_size minus the number of fitted parameters.
    pub degrees_of_freedom: usize,
    /// Residuals over the estimation window, retained for the
    /// nonparametric sign and rank tests.
    pub estimation_residuals: Vec<f64>,
}

impl ModelFit {
    /// Expected return for one period given its regressor values.
    pub fn expected_return(&self, regressors: &[f64]) -> f64 {
        let mut expected = self.coefficients[0];
        for (beta, x) in self.coefficients[1..].iter().zip(regressors) {
            expected += beta * x;
        }
        expected
    }
}

/// Fit the constant-mean model and compute event-window abnormal returns.
///
/// Expected return is the estimation-window sample mean; residual
/// variance is the unbiased sample variance (n - 1 divisor).
pub fn fit_constant_mean(estimation: &[f64], event: &[f64]) -> Result<(ModelFit, Vec<f64>)> {
    let n = estimation.len();
    if n < 2 {
        return Err(EventStudyError::InsufficientHistory {
            series: "estimation window".to_string(),
            message: format!("constant-mean fit needs at least 2 observations, got {}", n),
        });
    }

    let mu = stats::mean(estimation);
    let fit = ModelFit {
        model: ExpectationModel::ConstantMean,
        coefficients: vec![mu],
        residual_variance: stats::sample_variance(estimation),
        degrees_of_freedom: n - 1,
        estimation_residuals: estimation.iter().map(|r| r - mu).collect(),
    };
    let abnormal = event.iter().map(|r| r - mu).collect();
    Ok((fit, abnormal))
}

/// Fit an OLS regression model and compute event-window abnormal returns.
///
/// `regressors_estimation` and `regressors_event` hold one slice per
/// regressor column (no intercept column; it is added here). Residual
/// variance is SSE / (n - k - 1).
pub fn fit_ols(
    model: ExpectationModel,
    dependent_estimation: &[f64],
    regressors_estimation: &[&[f64]],
    dependent_event: &[f64],
    regressors_event: &[&[f64]],
) -> Result<(ModelFit, Vec<f64>)> {
    let n = dependent_estimation.len();
    let k = regressors_estimation.len();
    let params = k + 1;

    if regressors_estimation.iter().any(|c| c.len() != n) {
        return Err(EventStudyError::DataError(
            "regressor columns do not match the estimation window length".to_string(),
        ));
    }
    if regressors_event.len() != k
        || regressors_event.iter().any(|c| c.len() != dependent_event.len())
    {
        return Err(EventStudyError::DataError(
            "regressor columns do not match the event window length".to_string(),
        ));
    }
    if n <= params {
        return Err(EventStudyError::InsufficientHistory {
            series: "estimation window".to_string(),
            message: format!(
                "{} fit needs more than {} observations for positive degrees of freedom, got {}",
                model, params, n
            ),
        });
    }

    // Design matrix with an intercept column of ones.
    let mut design = DMatrix::from_element(n, params, 1.0);
    for (j, column) in regressors_estimation.iter().enumerate() {
        for (i, value) in column.iter().enumerate() {
            design[(i, j + 1)] = *value;
        }
    }
    let y = DVector::from_column_slice(dependent_estimation);

    // Normal equations: beta = (X'X)^-1 X'y.
    let xt = design.transpose();
    let xtx = &xt * &design;
    let xty = &xt * &y;
    let xtx_inv = xtx.try_inverse().ok_or_else(|| {
        EventStudyError::SingularFit(format!(
            "{} design matrix is rank-deficient (constant or collinear regressors)",
            model
        ))
    })?;
    let beta = xtx_inv * xty;

    let fitted = &design * &beta;
    let residuals: Vec<f64> = dependent_estimation
        .iter()
        .zip(fitted.iter())
        .map(|(obs, fit)| obs - fit)
        .collect();
    let sse: f64 = residuals.iter().map(|r| r * r).sum();
    let df = n - params;

    let fit = ModelFit {
        model,
        coefficients: beta.iter().copied().collect(),
        residual_variance: sse / df as f64,
        degrees_of_freedom: df,
        estimation_residuals: residuals,
    };

    let abnormal = dependent_event
        .iter()
        .enumerate()
        .map(|(i, obs)| {
            let row: Vec<f64> = regressors_event.iter().map(|c| c[i]).collect();
            obs - fit.expected_return(&row)
        })
        .collect();

    Ok((fit, abnormal))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constant_mean_known_values() {
        let estimation = [0.01, 0.02, -0.01, 0.00, 0.01];
        let event = [0.03, -0.02];
        let (fit, ar) = fit_constant_mean(&estimation, &event).unwrap();

        assert!((fit.coefficients[0] - 0.006).abs() < 1e-12);
        assert!((fit.residual_variance - 1.3e-4).abs() < 1e-12);
        assert_eq!(fit.degrees_of_freedom, 4);
        assert!((ar[0] - 0.024).abs() < 1e-12);
        assert!((ar[1] + 0.026).abs() < 1e-12);
    }

    #[test]
    fn test_constant_mean_too_short() {
        let err = fit_constant_mean(&[0.01], &[0.0]).unwrap_err();
        assert!(matches!(err, EventStudyError::InsufficientHistory { .. }));
    }

    #[test]
    fn test_market_model_recovers_exact_line() {
        // security = 0.001 + 1.5 * market exactly: residuals are zero and
        // the betas are recovered to machine precision.
        let market: Vec<f64> = (0..50).map(|i| (i as f64 - 25.0) / 1000.0).collect();
        let security: Vec<f64> = market.iter().map(|m| 0.001 + 1.5 * m).collect();
        let event_market = [0.01, -0.02];
        let event_security: Vec<f64> = event_market.iter().map(|m| 0.001 + 1.5 * m).collect();

        let (fit, ar) = fit_ols(
            ExpectationModel::Market,
            &security,
            &[&market],
            &event_security,
            &[&event_market],
        )
        .unwrap();

        assert!((fit.coefficients[0] - 0.001).abs() < 1e-10);
        assert!((fit.coefficients[1] - 1.5).abs() < 1e-10);
        assert!(fit.residual_variance < 1e-20);
        assert_eq!(fit.degrees_of_freedom, 48);
        assert!(ar.iter().all(|a| a.abs() < 1e-10));
    }

    #[test]
    fn test_market_model_residual_variance_divisor() {
        // security = market + a (+e, -e, -e, +e) noise block pattern. The
        // pattern is orthogonal to both the intercept and the linear
        // market column, so the fit recovers slope 1 / intercept 0 and
        // the residuals are exactly the noise: SSE = n * e^2.
        let n = 40;
        let e = 0.005;
        let pattern = [1.0, -1.0, -1.0, 1.0];
        let market: Vec<f64> = (0..n).map(|i| (i as f64 - 20.0) / 500.0).collect();
        let security: Vec<f64> = market
            .iter()
            .enumerate()
            .map(|(i, m)| m + e * pattern[i % 4])
            .collect();

        let (fit, _) = fit_ols(
            ExpectationModel::Market,
            &security,
            &[&market],
            &[],
            &[&[][..]],
        )
        .unwrap();

        let expected = (n as f64 * e * e) / (n as f64 - 2.0);
        assert!((fit.residual_variance - expected).abs() < 1e-12);
    }

    #[test]
    fn test_singular_fit_on_constant_regressor() {
        let security: Vec<f64> = (0..30).map(|i| i as f64 / 100.0).collect();
        let flat = vec![0.5; 30];
        let err = fit_ols(
            ExpectationModel::Market,
            &security,
            &[&flat],
            &[],
            &[&[][..]],
        )
        .unwrap_err();
        assert!(matches!(err, EventStudyError::SingularFit(_)));
    }

    #[test]
    fn test_multifactor_degrees_of_freedom() {
        let n = 60;
        let f1: Vec<f64> = (0..n).map(|i| (i as f64).sin() / 100.0).collect();
        let f2: Vec<f64> = (0..n).map(|i| (i as f64 * 0.7).cos() / 100.0).collect();
        let f3: Vec<f64> = (0..n).map(|i| ((i * i) as f64).sin() / 100.0).collect();
        let y: Vec<f64> = (0..n)
            .map(|i| 0.0002 + 1.1 * f1[i] - 0.4 * f2[i] + 0.2 * f3[i])
            .collect();

        let (fit, _) = fit_ols(
            ExpectationModel::FamaFrench3,
            &y,
            &[&f1, &f2, &f3],
            &[],
            &[&[][..], &[][..], &[][..]],
        )
        .unwrap();
        assert_eq!(fit.degrees_of_freedom, n - 4);
        assert_eq!(fit.coefficients.len(), 4);
        assert_eq!(fit.estimation_residuals.len(), n);
    }

    #[test]
    fn test_ols_insufficient_observations() {
        let y = [0.01, 0.02, 0.03];
        let x = [0.01, 0.015, 0.02];
        let err = fit_ols(
            ExpectationModel::FamaFrench3,
            &y,
            &[&x, &x, &x],
            &[],
            &[&[][..], &[][..], &[][..]],
        )
        .unwrap_err();
        assert!(matches!(err, EventStudyError::InsufficientHistory { .. }));
    }
}
