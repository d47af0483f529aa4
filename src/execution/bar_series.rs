use crate::indicators::{
    calculate_atr, calculate_atr_series, calculate_ema, calculate_sma, ema_series, sma_series,
    wma_series,
};
use crate::models::Bar;

/// Default number of bars kept by a series
pub const DEFAULT_SIZE: usize = 100;

/// Fixed-size rolling history of bar fields
///
/// Every field array always holds `size` values; new bars shift the arrays
/// left and land at the end. Slots not yet written are zero, so callers wait
/// for [`BarSeries::inited`] before reading.
#[derive(Debug, Clone)]
pub struct BarSeries {
    size: usize,
    count: usize,
    open: Vec<f64>,
    high: Vec<f64>,
    low: Vec<f64>,
    close: Vec<f64>,
    volume: Vec<f64>,
    turnover: Vec<f64>,
    open_interest: Vec<f64>,
}

impl BarSeries {
    /// Create a new bar series
    ///
    /// # Arguments
    /// * `size` - Number of bars to keep
    pub fn new(size: usize) -> Self {
        Self {
            size,
            count: 0,
            open: vec![0.0; size],
            high: vec![0.0; size],
            low: vec![0.0; size],
            close: vec![0.0; size],
            volume: vec![0.0; size],
            turnover: vec![0.0; size],
            open_interest: vec![0.0; size],
        }
    }

    /// Push a bar, dropping the oldest one
    pub fn update_bar(&mut self, bar: &Bar) {
        self.count += 1;
        if self.size == 0 {
            return;
        }

        push(&mut self.open, bar.open);
        push(&mut self.high, bar.high);
        push(&mut self.low, bar.low);
        push(&mut self.close, bar.close);
        push(&mut self.volume, bar.volume);
        push(&mut self.turnover, bar.turnover);
        push(&mut self.open_interest, bar.open_interest);
    }

    /// True once the series has been filled completely
    pub fn inited(&self) -> bool {
        self.count >= self.size
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// Bars pushed so far (not capped at `size`)
    pub fn count(&self) -> usize {
        self.count
    }

    pub fn open(&self) -> &[f64] {
        &self.open
    }

    pub fn high(&self) -> &[f64] {
        &self.high
    }

    pub fn low(&self) -> &[f64] {
        &self.low
    }

    pub fn close(&self) -> &[f64] {
        &self.close
    }

    pub fn volume(&self) -> &[f64] {
        &self.volume
    }

    pub fn turnover(&self) -> &[f64] {
        &self.turnover
    }

    pub fn open_interest(&self) -> &[f64] {
        &self.open_interest
    }

    pub fn sma_array(&self, period: usize) -> Vec<f64> {
        sma_series(&self.close, period)
    }

    pub fn ema_array(&self, period: usize) -> Vec<f64> {
        ema_series(&self.close, period)
    }

    pub fn wma_array(&self, period: usize) -> Vec<f64> {
        wma_series(&self.close, period)
    }

    pub fn atr_array(&self, period: usize) -> Vec<f64> {
        calculate_atr_series(&self.high, &self.low, &self.close, period)
    }

    /// Latest SMA of closes (NaN without enough data)
    pub fn sma(&self, period: usize) -> f64 {
        calculate_sma(&self.close, period).unwrap_or(f64::NAN)
    }

    pub fn ema(&self, period: usize) -> f64 {
        calculate_ema(&self.close, period).unwrap_or(f64::NAN)
    }

    pub fn wma(&self, period: usize) -> f64 {
        last(&self.wma_array(period))
    }

    pub fn atr(&self, period: usize) -> f64 {
        calculate_atr(&self.high, &self.low, &self.close, period).unwrap_or(f64::NAN)
    }
}

impl Default for BarSeries {
    fn default() -> Self {
        Self::new(DEFAULT_SIZE)
    }
}

fn push(array: &mut [f64], value: f64) {
    array.rotate_left(1);
    if let Some(slot) = array.last_mut() {
        *slot = value;
    }
}

fn last(values: &[f64]) -> f64 {
    values.last().copied().unwrap_or(f64::NAN)
}

/// `values[len - from_end .. len - to_end]`, clamped at the front like a
/// negative slice would be
pub fn tail_window(values: &[f64], from_end: usize, to_end: usize) -> &[f64] {
    let end = values.len().saturating_sub(to_end);
    let start = values.len().saturating_sub(from_end).min(end);
    &values[start..end]
}
