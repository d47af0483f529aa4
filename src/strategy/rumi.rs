use serde::{Deserialize, Serialize};
use serde_json::json;

use super::{follow_signal, CtaStrategy};
use crate::error::StrategyError;
use crate::execution::{tail_window, BarGenerator, BarSeries, StrategyContext};
use crate::indicators::mean;
use crate::models::{Bar, Direction};
use crate::Result;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RumiConfig {
    pub fast_window: usize,
    pub slow_window: usize,
    pub diff_window: usize, // Bars averaged into the moving-average spread
    pub atr_window: usize,
    pub risk_level: f64, // Money at risk per ATR, sets the trade size
    pub window: u32,
    pub price_add: f64,
    pub fixed_size: i64, // Used when ATR gives no usable size
    pub array_size: usize,
}

impl Default for RumiConfig {
    fn default() -> Self {
        Self {
            fast_window: 3,
            slow_window: 50,
            diff_window: 30,
            atr_window: 10,
            risk_level: 5000.0,
            window: 30,
            price_add: 5.0,
            fixed_size: 1,
            array_size: 200,
        }
    }
}

impl RumiConfig {
    pub fn validate(&self) -> Result<()> {
        validate_windows(
            self.fast_window,
            self.slow_window,
            self.diff_window,
            self.array_size,
        )?;
        if self.atr_window < 1 || self.atr_window >= self.array_size {
            return Err(StrategyError::invalid(
                "atr_window",
                format!("must be in 1..{}", self.array_size),
            ));
        }
        if !(self.risk_level > 0.0) {
            return Err(StrategyError::invalid("risk_level", "must be positive"));
        }
        if self.window < 1 {
            return Err(StrategyError::invalid("window", "must be at least 1"));
        }
        if self.fixed_size < 1 {
            return Err(StrategyError::invalid("fixed_size", "must be at least 1"));
        }
        Ok(())
    }
}

pub(crate) fn validate_windows(
    fast_window: usize,
    slow_window: usize,
    diff_window: usize,
    array_size: usize,
) -> Result<()> {
    if fast_window < 1 {
        return Err(StrategyError::invalid("fast_window", "must be at least 1"));
    }
    if slow_window < 1 || slow_window > array_size {
        return Err(StrategyError::invalid(
            "slow_window",
            format!("must be in 1..={array_size}"),
        ));
    }
    if diff_window < 1 || diff_window >= array_size {
        return Err(StrategyError::invalid(
            "diff_window",
            format!("must be in 1..{array_size}"),
        ));
    }
    Ok(())
}

/// Cross of the averaged spread between a fast and a slow moving average
///
/// Returns the current spread mean and the crossing direction, if any. NaN
/// means (spread not warmed up) never cross.
pub(crate) fn spread_cross(diff: &[f64], diff_window: usize) -> (f64, Option<Direction>) {
    let mean_0 = mean(tail_window(diff, diff_window, 0)).unwrap_or(f64::NAN);
    let mean_1 = mean(tail_window(diff, diff_window + 1, 1)).unwrap_or(f64::NAN);

    let direction = if mean_0 > 0.0 && mean_1 <= 0.0 {
        Some(Direction::Long)
    } else if mean_0 < 0.0 && mean_1 >= 0.0 {
        Some(Direction::Short)
    } else {
        None
    };

    (mean_0, direction)
}

/// Trade size that risks `risk_level` per ATR, never below one contract
fn risk_size(risk_level: f64, atr: f64, fallback: i64) -> i64 {
    if !atr.is_finite() || atr <= 0.0 {
        return fallback;
    }
    ((risk_level / atr) as i64).max(1)
}

/// RUMI strategy
///
/// Follows the sign change of the smoothed spread between a fast SMA and a
/// slow WMA on N-minute bars, sizing each entry by ATR.
#[derive(Debug)]
pub struct RumiStrategy {
    name: String,
    config: RumiConfig,
    generator: BarGenerator,
    series: BarSeries,
    ma_diff: f64,
    atr_value: f64,
    trading_size: i64,
}

impl RumiStrategy {
    pub fn new(name: impl Into<String>, config: RumiConfig) -> Result<Self> {
        config.validate()?;

        Ok(Self {
            name: name.into(),
            generator: BarGenerator::new(config.window),
            series: BarSeries::new(config.array_size),
            ma_diff: 0.0,
            atr_value: 0.0,
            trading_size: config.fixed_size,
            config,
        })
    }

    pub fn trading_size(&self) -> i64 {
        self.trading_size
    }

    fn on_window_bar(&mut self, bar: &Bar, ctx: &mut dyn StrategyContext) -> Result<()> {
        ctx.cancel_all();

        self.series.update_bar(bar);
        if !self.series.inited() {
            return Ok(());
        }

        let fast = self.series.sma_array(self.config.fast_window);
        let slow = self.series.wma_array(self.config.slow_window);
        let diff: Vec<f64> = fast.iter().zip(&slow).map(|(f, s)| f - s).collect();

        let (ma_diff, direction) = spread_cross(&diff, self.config.diff_window);
        self.ma_diff = ma_diff;

        self.atr_value = self.series.atr(self.config.atr_window);
        self.trading_size = risk_size(self.config.risk_level, self.atr_value, self.config.fixed_size);

        if let Some(direction) = direction {
            follow_signal(ctx, direction, bar.close, self.config.price_add, self.trading_size);
        }

        ctx.put_event(self.variables());
        Ok(())
    }
}

impl CtaStrategy for RumiStrategy {
    fn name(&self) -> &str {
        &self.name
    }

    fn class_name(&self) -> &'static str {
        "RumiStrategy"
    }

    fn on_bar(&mut self, bar: &Bar, ctx: &mut dyn StrategyContext) -> Result<()> {
        match self.generator.update_bar(bar) {
            Some(window_bar) => self.on_window_bar(&window_bar, ctx),
            None => Ok(()),
        }
    }

    fn variables(&self) -> serde_json::Value {
        json!({
            "ma_diff": self.ma_diff,
            "atr_value": self.atr_value,
            "trading_size": self.trading_size,
        })
    }
}
