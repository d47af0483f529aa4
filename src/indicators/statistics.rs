//! Rolling statistics used by the volume / open-interest strategies

/// Arithmetic mean, None for an empty slice
pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

/// Population standard deviation (ddof = 0)
pub fn std_dev(values: &[f64]) -> Option<f64> {
    let avg = mean(values)?;
    let variance = values.iter().map(|v| (v - avg).powi(2)).sum::<f64>() / values.len() as f64;
    Some(variance.sqrt())
}

/// Highest value of a window, None when empty
///
/// NaN entries are skipped rather than propagated; an all-NaN window yields NaN.
pub fn highest(values: &[f64]) -> Option<f64> {
    values.iter().copied().reduce(f64::max)
}

/// Lowest value of a window, None when empty
///
/// NaN entries are skipped like in [`highest`].
pub fn lowest(values: &[f64]) -> Option<f64> {
    values.iter().copied().reduce(f64::min)
}

/// Running sum
pub fn cumulative_sum(values: &[f64]) -> Vec<f64> {
    values
        .iter()
        .scan(0.0, |acc, v| {
            *acc += v;
            Some(*acc)
        })
        .collect()
}

/// Pearson correlation of two equally long series
///
/// Returns None when the lengths differ, fewer than two points are given,
/// or either series has zero variance.
pub fn pearson_correlation(x: &[f64], y: &[f64]) -> Option<f64> {
    if x.len() != y.len() || x.len() < 2 {
        return None;
    }

    let mean_x = mean(x)?;
    let mean_y = mean(y)?;

    let mut cov = 0.0;
    let mut var_x = 0.0;
    let mut var_y = 0.0;
    for (a, b) in x.iter().zip(y) {
        let dx = a - mean_x;
        let dy = b - mean_y;
        cov += dx * dy;
        var_x += dx * dx;
        var_y += dy * dy;
    }

    let denominator = (var_x * var_y).sqrt();
    if denominator == 0.0 || !denominator.is_finite() {
        return None;
    }

    Some(cov / denominator)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mean_and_std() {
        let values = [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0];
        assert_eq!(mean(&values), Some(5.0));
        assert_eq!(std_dev(&values), Some(2.0));
        assert!(mean(&[]).is_none());
    }

    #[test]
    fn test_extrema() {
        let values = [3.0, 9.0, -1.0, 4.0];
        assert_eq!(highest(&values), Some(9.0));
        assert_eq!(lowest(&values), Some(-1.0));
        assert!(highest(&[]).is_none());
    }

    #[test]
    fn test_extrema_skip_nan() {
        let values = [f64::NAN, 3.0, f64::NAN, 7.0];
        assert_eq!(highest(&values), Some(7.0));
        assert_eq!(lowest(&values), Some(3.0));
        assert!(highest(&[f64::NAN, f64::NAN]).unwrap().is_nan());
    }

    #[test]
    fn test_cumulative_sum() {
        assert_eq!(cumulative_sum(&[1.0, -2.0, 4.0]), vec![1.0, -1.0, 3.0]);
    }

    #[test]
    fn test_perfect_correlation() {
        let x = [1.0, 2.0, 3.0, 4.0];
        let y = [10.0, 20.0, 30.0, 40.0];
        let corr = pearson_correlation(&x, &y).unwrap();
        assert!((corr - 1.0).abs() < 1e-12);

        let inverse: Vec<f64> = y.iter().map(|v| -v).collect();
        let corr = pearson_correlation(&x, &inverse).unwrap();
        assert!((corr + 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_flat_series_has_no_correlation() {
        assert!(pearson_correlation(&[1.0, 2.0, 3.0], &[5.0, 5.0, 5.0]).is_none());
        assert!(pearson_correlation(&[1.0], &[2.0]).is_none());
        assert!(pearson_correlation(&[1.0, 2.0], &[2.0]).is_none());
    }
}
