use serde::{Deserialize, Serialize};
use serde_json::json;

use super::rumi::{spread_cross, validate_windows};
use super::{follow_signal, CtaStrategy};
use crate::error::StrategyError;
use crate::execution::{BarSeries, DailyBarGenerator, StrategyContext};
use crate::models::Bar;
use crate::Result;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DailyRumiConfig {
    pub fast_window: usize,
    pub slow_window: usize,
    pub diff_window: usize,
    pub price_add: f64,
    pub fixed_size: i64,
    pub array_size: usize,
}

impl Default for DailyRumiConfig {
    fn default() -> Self {
        Self {
            fast_window: 3,
            slow_window: 50,
            diff_window: 30,
            price_add: 5.0,
            fixed_size: 1,
            array_size: 100,
        }
    }
}

impl DailyRumiConfig {
    pub fn validate(&self) -> Result<()> {
        validate_windows(
            self.fast_window,
            self.slow_window,
            self.diff_window,
            self.array_size,
        )?;
        if self.fixed_size < 1 {
            return Err(StrategyError::invalid("fixed_size", "must be at least 1"));
        }
        Ok(())
    }
}

/// RUMI on daily bars, using an EMA as the slow average and a fixed size
#[derive(Debug)]
pub struct DailyRumiStrategy {
    name: String,
    config: DailyRumiConfig,
    generator: DailyBarGenerator,
    series: BarSeries,
    ma_diff: f64,
}

impl DailyRumiStrategy {
    pub fn new(name: impl Into<String>, config: DailyRumiConfig) -> Result<Self> {
        config.validate()?;

        Ok(Self {
            name: name.into(),
            generator: DailyBarGenerator::new(1),
            series: BarSeries::new(config.array_size),
            ma_diff: 0.0,
            config,
        })
    }

    fn on_daily_bar(&mut self, bar: &Bar, ctx: &mut dyn StrategyContext) -> Result<()> {
        self.series.update_bar(bar);
        if !self.series.inited() {
            return Ok(());
        }

        let fast = self.series.sma_array(self.config.fast_window);
        let slow = self.series.ema_array(self.config.slow_window);
        let diff: Vec<f64> = fast.iter().zip(&slow).map(|(f, s)| f - s).collect();

        let (ma_diff, direction) = spread_cross(&diff, self.config.diff_window);
        self.ma_diff = ma_diff;

        if let Some(direction) = direction {
            follow_signal(
                ctx,
                direction,
                bar.close,
                self.config.price_add,
                self.config.fixed_size,
            );
        }

        ctx.put_event(self.variables());
        Ok(())
    }
}

impl CtaStrategy for DailyRumiStrategy {
    fn name(&self) -> &str {
        &self.name
    }

    fn class_name(&self) -> &'static str {
        "DailyRumiStrategy"
    }

    fn load_days(&self) -> u32 {
        30
    }

    fn on_bar(&mut self, bar: &Bar, ctx: &mut dyn StrategyContext) -> Result<()> {
        match self.generator.update_bar(bar) {
            Some(daily_bar) => self.on_daily_bar(&daily_bar, ctx),
            None => Ok(()),
        }
    }

    fn variables(&self) -> serde_json::Value {
        json!({ "ma_diff": self.ma_diff })
    }
}
