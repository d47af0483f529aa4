use serde::{Deserialize, Serialize};
use serde_json::json;

use super::{follow_signal, is_new_day, is_session_close, CtaStrategy};
use crate::error::StrategyError;
use crate::execution::{tail_window, BarGenerator, BarSeries, StrategyContext};
use crate::indicators::mean;
use crate::models::{Bar, Direction};
use crate::Result;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct OiBasedConfig {
    pub ma_p_length: usize, // Rolling window of the attitude measure P
    pub ma_q_length: usize, // Rolling window of the disagreement measure Q
    pub k: f64,             // Share of the day's volume taken by aggressive trades
    pub window: u32,
    pub price_add: f64,
    pub fixed_size: i64,
    pub array_size: usize,
}

impl Default for OiBasedConfig {
    fn default() -> Self {
        Self {
            ma_p_length: 19,
            ma_q_length: 17,
            k: 0.1,
            window: 1,
            price_add: 5.0,
            fixed_size: 1,
            array_size: 500,
        }
    }
}

impl OiBasedConfig {
    pub fn validate(&self) -> Result<()> {
        if self.ma_p_length < 1 {
            return Err(StrategyError::invalid("ma_p_length", "must be at least 1"));
        }
        if self.ma_q_length < 1 {
            return Err(StrategyError::invalid("ma_q_length", "must be at least 1"));
        }
        if !(self.k > 0.0 && self.k <= 1.0) {
            return Err(StrategyError::invalid("k", "must be in (0, 1]"));
        }
        if self.window < 1 {
            return Err(StrategyError::invalid("window", "must be at least 1"));
        }
        if self.fixed_size < 1 {
            return Err(StrategyError::invalid("fixed_size", "must be at least 1"));
        }
        if self.array_size < 3 {
            return Err(StrategyError::invalid("array_size", "must be at least 3"));
        }
        Ok(())
    }
}

/// Sum `values` over the highest-scoring bars until their volume reaches `target`
///
/// Bars are taken in descending score order; ties go to the latest bar.
fn aggressive_sum(scores: &[f64], values: &[f64], volumes: &[f64], target: f64) -> f64 {
    let mut remaining: Vec<usize> = (0..scores.len()).collect();
    let mut cum_volume = 0.0;
    let mut total = 0.0;

    while !remaining.is_empty() {
        let mut best = 0;
        for (pos, &i) in remaining.iter().enumerate() {
            if scores[i] >= scores[remaining[best]] {
                best = pos;
            }
        }

        let i = remaining.remove(best);
        cum_volume += volumes[i];
        total += values[i];

        if cum_volume >= target {
            break;
        }
    }

    total
}

fn push_rolling(array: &mut [f64], value: f64) {
    array.rotate_left(1);
    if let Some(slot) = array.last_mut() {
        *slot = value;
    }
}

/// Open interest based strategy
///
/// At the session close it measures the attitude (P, signed returns) and the
/// disagreement (Q, open interest changes) of the most aggressive trades of
/// the day. Once both rolling windows are full, P and Q are demeaned: opposite
/// signs go long, equal signs go short.
#[derive(Debug)]
pub struct OiBasedStrategy {
    name: String,
    config: OiBasedConfig,
    generator: BarGenerator,
    series: BarSeries,
    last_bar: Option<Bar>,
    count: usize,
    p_array: Vec<f64>,
    q_array: Vec<f64>,
    p_count: usize,
    q_count: usize,
    p: f64,
    q: f64,
}

impl OiBasedStrategy {
    pub fn new(name: impl Into<String>, config: OiBasedConfig) -> Result<Self> {
        config.validate()?;

        Ok(Self {
            name: name.into(),
            generator: BarGenerator::new(config.window),
            series: BarSeries::new(config.array_size),
            last_bar: None,
            count: 0,
            p_array: vec![0.0; config.ma_p_length],
            q_array: vec![0.0; config.ma_q_length],
            p_count: 0,
            q_count: 0,
            p: 0.0,
            q: 0.0,
            config,
        })
    }

    /// P and Q of the current day, None on zero volume or a zero previous close
    fn measure_day(&self) -> Option<(f64, f64)> {
        let count = self.count.min(self.series.size() - 1);

        let close = tail_window(self.series.close(), count, 0);
        let pre_close = tail_window(self.series.close(), count + 1, 1);
        if pre_close.iter().any(|&c| c == 0.0) {
            return None;
        }

        let volume = tail_window(self.series.volume(), count, 0);
        if volume.iter().any(|&v| v == 0.0) {
            return None;
        }

        let oi = tail_window(self.series.open_interest(), count, 0);
        let pre_oi = tail_window(self.series.open_interest(), count + 1, 1);

        let returns: Vec<f64> = close
            .iter()
            .zip(pre_close)
            .map(|(c, p)| (c - p) / p)
            .collect();
        let oi_change: Vec<f64> = oi.iter().zip(pre_oi).map(|(o, p)| o - p).collect();

        let attitude: Vec<f64> = returns
            .iter()
            .zip(volume)
            .map(|(r, v)| r.abs() / v.sqrt())
            .collect();
        let disagreement: Vec<f64> = oi_change
            .iter()
            .zip(volume)
            .map(|(o, v)| o.abs() / v.sqrt())
            .collect();

        let target = volume.iter().sum::<f64>() * self.config.k;
        let p = aggressive_sum(&attitude, &returns, volume, target);
        let q = aggressive_sum(&disagreement, &oi_change, volume, target);

        Some((p, q))
    }

    fn on_window_bar(&mut self, bar: &Bar, ctx: &mut dyn StrategyContext) -> Result<()> {
        self.series.update_bar(bar);
        if !self.series.inited() {
            return Ok(());
        }

        if is_new_day(self.last_bar.as_ref(), bar) {
            self.last_bar = Some(bar.clone());
            self.count = 1;
            return Ok(());
        }

        self.count += 1;

        if is_session_close(bar) {
            let Some((p, q)) = self.measure_day() else {
                return Ok(());
            };

            push_rolling(&mut self.p_array, p);
            push_rolling(&mut self.q_array, q);

            if self.p_count < self.config.ma_p_length || self.q_count < self.config.ma_q_length {
                self.p_count += 1;
                self.q_count += 1;
                return Ok(());
            }

            self.p = p - mean(&self.p_array).unwrap_or(0.0);
            self.q = q - mean(&self.q_array).unwrap_or(0.0);

            let direction = if (self.p < 0.0 && self.q > 0.0) || (self.p > 0.0 && self.q < 0.0) {
                Some(Direction::Long)
            } else if (self.p < 0.0 && self.q < 0.0) || (self.p > 0.0 && self.q > 0.0) {
                Some(Direction::Short)
            } else {
                None
            };

            if let Some(direction) = direction {
                follow_signal(
                    ctx,
                    direction,
                    bar.close,
                    self.config.price_add,
                    self.config.fixed_size,
                );
            }

            tracing::debug!(strategy = %self.name, pos = ctx.pos(), p = self.p, q = self.q, "session close evaluated");
        }

        ctx.put_event(self.variables());
        Ok(())
    }
}

impl CtaStrategy for OiBasedStrategy {
    fn name(&self) -> &str {
        &self.name
    }

    fn class_name(&self) -> &'static str {
        "OiBasedStrategy"
    }

    fn on_bar(&mut self, bar: &Bar, ctx: &mut dyn StrategyContext) -> Result<()> {
        match self.generator.update_bar(bar) {
            Some(window_bar) => self.on_window_bar(&window_bar, ctx),
            None => Ok(()),
        }
    }

    fn variables(&self) -> serde_json::Value {
        json!({
            "p": self.p,
            "q": self.q,
            "p_count": self.p_count,
            "q_count": self.q_count,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::execution::PaperContext;
    use crate::strategy::test_support::create_test_bar;
    use chrono::{Duration, NaiveDate};

    #[test]
    fn test_aggressive_sum_takes_top_scores() {
        let scores = [0.1, 0.5, 0.3, 0.5];
        let values = [1.0, 2.0, 3.0, 4.0];
        let volumes = [10.0, 10.0, 10.0, 10.0];

        // Tie at 0.5 goes to the latest index first
        assert_eq!(aggressive_sum(&scores, &values, &volumes, 10.0), 4.0);
        assert_eq!(aggressive_sum(&scores, &values, &volumes, 15.0), 6.0);
        assert_eq!(aggressive_sum(&scores, &values, &volumes, 1000.0), 10.0);
    }

    #[test]
    fn test_k_out_of_range_rejected() {
        for k in [0.0, -0.1, 1.5] {
            let config = OiBasedConfig {
                k,
                ..Default::default()
            };
            assert!(config.validate().is_err());
        }
    }

    fn closing_session(day: u32, rising: bool) -> Vec<Bar> {
        let start = NaiveDate::from_ymd_opt(2024, 1, day)
            .unwrap()
            .and_hms_opt(14, 55, 0)
            .unwrap();

        (0..5)
            .map(|i| {
                let step = if rising { i as f64 } else { -(i as f64) };
                let mut bar = create_test_bar(start + Duration::minutes(i), 100.0 + step);
                bar.open_interest = 10_000.0 + 5.0 * step;
                bar
            })
            .collect()
    }

    #[test]
    fn test_trades_after_rolling_windows_fill() {
        let config = OiBasedConfig {
            ma_p_length: 2,
            ma_q_length: 2,
            k: 0.5,
            array_size: 5,
            ..Default::default()
        };
        let mut strategy = OiBasedStrategy::new("oi", config).unwrap();
        let mut ctx = PaperContext::new("RB888.SHFE");
        ctx.book_mut().set_trading(true);

        // Day 2 only fills the series; days 3 and 4 fill P and Q
        for day in 2..=4 {
            for bar in closing_session(day, true) {
                strategy.on_bar(&bar, &mut ctx).unwrap();
            }
        }
        assert_eq!(strategy.p_count, 2);
        assert!(ctx.book().orders().is_empty());

        // A falling day: P and Q fall below their means together
        for bar in closing_session(5, false) {
            strategy.on_bar(&bar, &mut ctx).unwrap();
        }

        assert!(strategy.p < 0.0);
        assert!(strategy.q < 0.0);
        assert_eq!(ctx.pos(), -1);
    }
}
