use serde::{Deserialize, Serialize};
use serde_json::json;

use super::{follow_signal, is_new_day, CtaStrategy};
use crate::error::StrategyError;
use crate::execution::{tail_window, BarGenerator, BarSeries, StrategyContext};
use crate::indicators::{highest, lowest};
use crate::models::{Bar, Direction};
use crate::Result;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ExtremeValueFollowConfig {
    pub extreme_window: usize, // Bars excluded from the end of the reference range
    pub min_count: usize,      // Intraday bars required before trading
    pub window: u32,           // Minutes per window bar
    pub price_add: f64,
    pub fixed_size: i64,
    pub array_size: usize,
}

impl Default for ExtremeValueFollowConfig {
    fn default() -> Self {
        Self {
            extreme_window: 9,
            min_count: 6,
            window: 5,
            price_add: 5.0,
            fixed_size: 1,
            array_size: 100,
        }
    }
}

impl ExtremeValueFollowConfig {
    pub fn validate(&self) -> Result<()> {
        if self.extreme_window < 1 {
            return Err(StrategyError::invalid("extreme_window", "must be at least 1"));
        }
        if self.window < 1 {
            return Err(StrategyError::invalid("window", "must be at least 1"));
        }
        if self.fixed_size < 1 {
            return Err(StrategyError::invalid("fixed_size", "must be at least 1"));
        }
        if self.array_size < 1 {
            return Err(StrategyError::invalid("array_size", "must be at least 1"));
        }
        Ok(())
    }
}

/// Extreme value following strategy
///
/// Uses the high and low of the opening stretch of the day as reference
/// extremes and follows a close that breaks out of them.
#[derive(Debug)]
pub struct ExtremeValueFollowStrategy {
    name: String,
    config: ExtremeValueFollowConfig,
    generator: BarGenerator,
    series: BarSeries,
    last_bar: Option<Bar>,
    bar_count: usize,
    high_extreme: f64,
    low_extreme: f64,
}

impl ExtremeValueFollowStrategy {
    pub fn new(name: impl Into<String>, config: ExtremeValueFollowConfig) -> Result<Self> {
        config.validate()?;

        Ok(Self {
            name: name.into(),
            generator: BarGenerator::new(config.window),
            series: BarSeries::new(config.array_size),
            last_bar: None,
            bar_count: 0,
            high_extreme: 0.0,
            low_extreme: 0.0,
            config,
        })
    }

    pub fn bar_count(&self) -> usize {
        self.bar_count
    }

    fn on_window_bar(&mut self, bar: &Bar, ctx: &mut dyn StrategyContext) -> Result<()> {
        self.series.update_bar(bar);
        if !self.series.inited() {
            return Ok(());
        }

        if is_new_day(self.last_bar.as_ref(), bar) {
            self.bar_count = 1;
        } else {
            self.bar_count += 1;

            if self.bar_count > self.config.min_count {
                self.follow_extremes(bar, ctx);
            }
        }

        self.last_bar = Some(bar.clone());
        ctx.put_event(self.variables());
        Ok(())
    }

    fn follow_extremes(&mut self, bar: &Bar, ctx: &mut dyn StrategyContext) {
        // Range starts `bar_count` bars back and spans max(bar_count - extreme_window, 1) bars
        let span = self
            .bar_count
            .saturating_sub(self.config.extreme_window)
            .max(1);
        let to_end = self.bar_count - span;

        let highs = tail_window(self.series.high(), self.bar_count, to_end);
        let lows = tail_window(self.series.low(), self.bar_count, to_end);
        let (Some(high), Some(low)) = (highest(highs), lowest(lows)) else {
            return;
        };
        self.high_extreme = high;
        self.low_extreme = low;

        let direction = if bar.close > high {
            Direction::Long
        } else if bar.close < low {
            Direction::Short
        } else {
            return;
        };

        if let Some(action) = follow_signal(
            ctx,
            direction,
            bar.close,
            self.config.price_add,
            self.config.fixed_size,
        ) {
            tracing::debug!(strategy = %self.name, ?action, high, low, "extreme broken");
        }
    }
}

impl CtaStrategy for ExtremeValueFollowStrategy {
    fn name(&self) -> &str {
        &self.name
    }

    fn class_name(&self) -> &'static str {
        "ExtremeValueFollowStrategy"
    }

    fn on_bar(&mut self, bar: &Bar, ctx: &mut dyn StrategyContext) -> Result<()> {
        match self.generator.update_bar(bar) {
            Some(window_bar) => self.on_window_bar(&window_bar, ctx),
            None => Ok(()),
        }
    }

    fn variables(&self) -> serde_json::Value {
        json!({
            "bar_count": self.bar_count,
            "high_extreme": self.high_extreme,
            "low_extreme": self.low_extreme,
        })
    }
}
