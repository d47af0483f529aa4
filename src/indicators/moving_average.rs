/// Calculate Simple Moving Average (SMA)
pub fn calculate_sma(prices: &[f64], period: usize) -> Option<f64> {
    if period == 0 || prices.len() < period {
        return None;
    }

    let sum: f64 = prices.iter().rev().take(period).sum();
    Some(sum / period as f64)
}

/// Calculate Exponential Moving Average (EMA)
pub fn calculate_ema(prices: &[f64], period: usize) -> Option<f64> {
    ema_series(prices, period)
        .last()
        .copied()
        .filter(|v| !v.is_nan())
}

/// SMA aligned with the input; the first `period - 1` slots are NaN
pub fn sma_series(values: &[f64], period: usize) -> Vec<f64> {
    let mut out = vec![f64::NAN; values.len()];
    if period == 0 || values.len() < period {
        return out;
    }

    for i in (period - 1)..values.len() {
        let window = &values[i + 1 - period..=i];
        out[i] = window.iter().sum::<f64>() / period as f64;
    }

    out
}

/// EMA aligned with the input
///
/// Leading NaNs are skipped, then the average is seeded with the SMA of the
/// first `period` valid values and smoothed with `2 / (period + 1)`.
pub fn ema_series(values: &[f64], period: usize) -> Vec<f64> {
    let mut out = vec![f64::NAN; values.len()];
    if period == 0 {
        return out;
    }

    let start = values
        .iter()
        .position(|v| !v.is_nan())
        .unwrap_or(values.len());
    if values.len() - start < period {
        return out;
    }

    let seed_end = start + period;
    let multiplier = 2.0 / (period as f64 + 1.0);
    let mut ema = values[start..seed_end].iter().sum::<f64>() / period as f64;
    out[seed_end - 1] = ema;

    for i in seed_end..values.len() {
        ema = (values[i] - ema) * multiplier + ema;
        out[i] = ema;
    }

    out
}

/// Linearly weighted moving average aligned with the input (newest weight = `period`)
pub fn wma_series(values: &[f64], period: usize) -> Vec<f64> {
    let mut out = vec![f64::NAN; values.len()];
    if period == 0 || values.len() < period {
        return out;
    }

    let weight_sum = (period * (period + 1)) as f64 / 2.0;
    for i in (period - 1)..values.len() {
        let window = &values[i + 1 - period..=i];
        let weighted: f64 = window
            .iter()
            .enumerate()
            .map(|(w, v)| (w + 1) as f64 * v)
            .sum();
        out[i] = weighted / weight_sum;
    }

    out
}
