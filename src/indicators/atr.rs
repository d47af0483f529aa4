//! Average True Range (ATR) indicator
//!
//! Measures market volatility by calculating the average of true ranges over a period.
//! True Range is the greatest of:
//! - Current High - Current Low
//! - Abs(Current High - Previous Close)
//! - Abs(Current Low - Previous Close)
//!
//! Uses Wilder's smoothing for the moving average, seeded with the plain
//! mean of the first `period` true ranges.

/// ATR series aligned with the input arrays
///
/// The first bar has no previous close, so the first value lands on index `period`.
pub fn calculate_atr_series(high: &[f64], low: &[f64], close: &[f64], period: usize) -> Vec<f64> {
    let len = high.len().min(low.len()).min(close.len());
    let mut atr_series = vec![f64::NAN; len];
    if period == 0 || len < period + 1 {
        return atr_series;
    }

    let true_ranges: Vec<f64> = (1..len)
        .map(|i| {
            let prev_close = close[i - 1];
            (high[i] - low[i])
                .max((high[i] - prev_close).abs())
                .max((low[i] - prev_close).abs())
        })
        .collect();

    let mut atr = true_ranges.iter().take(period).sum::<f64>() / period as f64;
    atr_series[period] = atr;

    for i in period..true_ranges.len() {
        atr = (atr * (period as f64 - 1.0) + true_ranges[i]) / period as f64;
        atr_series[i + 1] = atr;
    }

    atr_series
}

/// Latest ATR value, or None if there is not enough data
pub fn calculate_atr(high: &[f64], low: &[f64], close: &[f64], period: usize) -> Option<f64> {
    calculate_atr_series(high, low, close, period)
        .last()
        .copied()
        .filter(|v| !v.is_nan())
}
