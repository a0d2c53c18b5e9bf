//! Shared statistical helpers.
//!
//! Small numeric routines used across the estimation and aggregation
//! engines: moments, quantiles, midranks, and two-tailed p-values from
//! the Student-t and standard normal distributions.

use statrs::distribution::{ContinuousCDF, Normal, StudentsT};

/// Arithmetic mean. Returns 0.0 for an empty slice.
pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Unbiased sample variance (n - 1 divisor). Returns 0.0 for n < 2.
pub fn sample_variance(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let m = mean(values);
    values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / (values.len() - 1) as f64
}

/// Population variance (n divisor). Returns 0.0 for an empty slice.
pub fn population_variance(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let m = mean(values);
    values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / values.len() as f64
}

/// Excess kurtosis (Fisher definition: normal = 0), population moments.
pub fn excess_kurtosis(values: &[f64]) -> f64 {
    let var = population_variance(values);
    if values.is_empty() || var == 0.0 {
        return 0.0;
    }
    let m = mean(values);
    let m4 = values.iter().map(|v| (v - m).powi(4)).sum::<f64>() / values.len() as f64;
    m4 / (var * var) - 3.0
}

/// Quantile with linear interpolation between order statistics.
///
/// `q` must lie in [0, 1]. Returns NaN for an empty slice.
pub fn quantile(values: &[f64], q: f64) -> f64 {
    if values.is_empty() {
        return f64::NAN;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let pos = q.clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    if lo == hi {
        sorted[lo]
    } else {
        let frac = pos - lo as f64;
        sorted[lo] * (1.0 - frac) + sorted[hi] * frac
    }
}

/// Midranks of a slice (average rank for ties), 1-based.
pub fn midranks(values: &[f64]) -> Vec<f64> {
    let n = values.len();
    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by(|&a, &b| {
        values[a]
            .partial_cmp(&values[b])
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let mut ranks = vec![0.0; n];
    let mut i = 0;
    while i < n {
        let mut j = i;
        while j + 1 < n && values[order[j + 1]] == values[order[i]] {
            j += 1;
        }
        // ranks i+1 ..= j+1 share the average
        let avg = (i + j + 2) as f64 / 2.0;
        for &idx in &order[i..=j] {
            ranks[idx] = avg;
        }
        i = j + 1;
    }
    ranks
}

/// Running cumulative sum.
pub fn cumulative_sum(values: &[f64]) -> Vec<f64> {
    values
        .iter()
        .scan(0.0, |acc, v| {
            *acc += v;
            Some(*acc)
        })
        .collect()
}

/// Two-tailed p-value of a t-statistic under Student-t with `df` degrees
/// of freedom.
///
/// Falls back to the standard normal when the distribution cannot be
/// constructed (df == 0 is rejected upstream by the model fits).
pub fn t_p_value_two_tailed(t_stat: f64, df: usize) -> f64 {
    if !t_stat.is_finite() {
        return f64::NAN;
    }
    match StudentsT::new(0.0, 1.0, df as f64) {
        Ok(dist) => 2.0 * (1.0 - dist.cdf(t_stat.abs())),
        Err(_) => normal_p_value_two_tailed(t_stat),
    }
}

/// Two-tailed p-value of a z-statistic under the standard normal.
pub fn normal_p_value_two_tailed(z: f64) -> f64 {
    if !z.is_finite() {
        return f64::NAN;
    }
    let dist = Normal::new(0.0, 1.0).expect("unit normal is always valid");
    2.0 * (1.0 - dist.cdf(z.abs()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mean_and_variances() {
        let v = [0.01, 0.02, -0.01, 0.00, 0.01];
        assert!((mean(&v) - 0.006).abs() < 1e-12);
        // deviations: .004 .014 -.016 -.006 .004 -> ss = 5.2e-4
        assert!((sample_variance(&v) - 1.3e-4).abs() < 1e-12);
        assert!((population_variance(&v) - 1.04e-4).abs() < 1e-12);
    }

    #[test]
    fn test_kurtosis_flat_and_peaked() {
        // constant series has zero variance, kurtosis defined as 0
        assert_eq!(excess_kurtosis(&[1.0, 1.0, 1.0]), 0.0);
        // symmetric two-point distribution has kurtosis -2
        let v = [-1.0, 1.0, -1.0, 1.0];
        assert!((excess_kurtosis(&v) + 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_quantile_interpolation() {
        let v = [1.0, 2.0, 3.0, 4.0];
        assert_eq!(quantile(&v, 0.0), 1.0);
        assert_eq!(quantile(&v, 1.0), 4.0);
        assert!((quantile(&v, 0.5) - 2.5).abs() < 1e-12);
        assert!((quantile(&v, 0.25) - 1.75).abs() < 1e-12);
    }

    #[test]
    fn test_midranks_with_ties() {
        let v = [3.0, 1.0, 2.0];
        assert_eq!(midranks(&v), vec![3.0, 1.0, 2.0]);
        let v = [1.0, 2.0, 2.0, 5.0];
        assert_eq!(midranks(&v), vec![1.0, 2.5, 2.5, 4.0]);
    }

    #[test]
    fn test_cumulative_sum() {
        assert_eq!(
            cumulative_sum(&[0.024, -0.026]),
            vec![0.024, 0.024 - 0.026]
        );
    }

    #[test]
    fn test_p_values_monotone_in_statistic() {
        let p1 = t_p_value_two_tailed(1.0, 100);
        let p2 = t_p_value_two_tailed(2.0, 100);
        let p3 = t_p_value_two_tailed(3.0, 100);
        assert!(p1 > p2 && p2 > p3);
        // symmetric in sign
        assert!((t_p_value_two_tailed(-2.0, 100) - p2).abs() < 1e-12);
        // zero statistic has p-value 1
        assert!((t_p_value_two_tailed(0.0, 50) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_normal_p_value_known_points() {
        // z = 1.96 -> p ~ 0.05 two-tailed
        let p = normal_p_value_two_tailed(1.96);
        assert!((p - 0.05).abs() < 0.001);
        assert!((normal_p_value_two_tailed(0.0) - 1.0).abs() < 1e-12);
    }
}
