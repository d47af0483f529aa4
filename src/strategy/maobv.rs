use serde::{Deserialize, Serialize};
use serde_json::json;

use super::{follow_signal, CtaStrategy};
use crate::error::StrategyError;
use crate::execution::{tail_window, BarSeries, DailyBarGenerator, StrategyContext};
use crate::indicators::{cumulative_sum, highest, lowest};
use crate::models::{Bar, Direction};
use crate::Result;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct MaObvConfig {
    pub fast_window: usize,
    pub slow_window: usize,
    pub obv_window: usize, // Days in the on-balance volume range
    pub obv_up: f64,       // Relative OBV needed to go long
    pub obv_low: f64,      // Relative OBV needed to go short
    pub window: u32,       // Days per bar
    pub price_add: f64,
    pub fixed_size: i64,
    pub array_size: usize,
}

impl Default for MaObvConfig {
    fn default() -> Self {
        Self {
            fast_window: 5,
            slow_window: 65,
            obv_window: 70,
            obv_up: 0.5,
            obv_low: 0.2,
            window: 1,
            price_add: 1.0,
            fixed_size: 1,
            array_size: 100,
        }
    }
}

impl MaObvConfig {
    pub fn validate(&self) -> Result<()> {
        if self.fast_window < 1 || self.fast_window >= self.slow_window {
            return Err(StrategyError::invalid(
                "fast_window",
                "must be at least 1 and below slow_window",
            ));
        }
        if self.slow_window >= self.array_size {
            return Err(StrategyError::invalid(
                "slow_window",
                format!("must be below {}", self.array_size),
            ));
        }
        if self.obv_window < 1 || self.obv_window >= self.array_size {
            return Err(StrategyError::invalid(
                "obv_window",
                format!("must be in 1..{}", self.array_size),
            ));
        }
        if !(0.0..=1.0).contains(&self.obv_up) || !(0.0..=1.0).contains(&self.obv_low) {
            return Err(StrategyError::invalid(
                "obv_up",
                "obv thresholds must be within [0, 1]",
            ));
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

/// Position of the latest on-balance volume within its range, in [0, 1]
///
/// Volume counts as positive when the close did not fall. None when the range
/// is flat.
pub fn relative_obv(close: &[f64], pre_close: &[f64], volume: &[f64]) -> Option<f64> {
    let signed: Vec<f64> = close
        .iter()
        .zip(pre_close)
        .zip(volume)
        .map(|((c, p), v)| if c >= p { *v } else { -v })
        .collect();
    let obv = cumulative_sum(&signed);

    let last = *obv.last()?;
    let min = lowest(&obv)?;
    let max = highest(&obv)?;
    if max == min {
        return None;
    }

    Some((last - min) / (max - min))
}

/// Moving-average cross confirmed by on-balance volume, on daily bars
#[derive(Debug)]
pub struct MaObvStrategy {
    name: String,
    config: MaObvConfig,
    generator: DailyBarGenerator,
    series: BarSeries,
    fast_ma0: f64,
    fast_ma1: f64,
    slow_ma0: f64,
    slow_ma1: f64,
    obv: f64,
}

impl MaObvStrategy {
    pub fn new(name: impl Into<String>, config: MaObvConfig) -> Result<Self> {
        config.validate()?;

        Ok(Self {
            name: name.into(),
            generator: DailyBarGenerator::new(config.window),
            series: BarSeries::new(config.array_size),
            fast_ma0: 0.0,
            fast_ma1: 0.0,
            slow_ma0: 0.0,
            slow_ma1: 0.0,
            obv: 0.0,
            config,
        })
    }

    fn on_daily_bar(&mut self, bar: &Bar, ctx: &mut dyn StrategyContext) -> Result<()> {
        self.series.update_bar(bar);
        if !self.series.inited() {
            return Ok(());
        }

        let fast = self.series.sma_array(self.config.fast_window);
        let slow = self.series.sma_array(self.config.slow_window);
        let ([.., fast_ma1, fast_ma0], [.., slow_ma1, slow_ma0]) = (fast.as_slice(), slow.as_slice())
        else {
            return Ok(());
        };
        self.fast_ma0 = *fast_ma0;
        self.fast_ma1 = *fast_ma1;
        self.slow_ma0 = *slow_ma0;
        self.slow_ma1 = *slow_ma1;

        let n = self.config.obv_window;
        let Some(obv) = relative_obv(
            tail_window(self.series.close(), n, 0),
            tail_window(self.series.close(), n + 1, 1),
            tail_window(self.series.volume(), n, 0),
        ) else {
            tracing::debug!(strategy = %self.name, "flat obv range, skipping");
            return Ok(());
        };
        self.obv = obv;

        let cross_over = self.fast_ma0 > self.slow_ma0
            && self.fast_ma1 < self.slow_ma1
            && obv > self.config.obv_up;
        let cross_below = self.fast_ma0 < self.slow_ma0
            && self.fast_ma1 > self.slow_ma1
            && obv < self.config.obv_low;

        let direction = if cross_over {
            Some(Direction::Long)
        } else if cross_below {
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

        ctx.put_event(self.variables());
        Ok(())
    }
}

impl CtaStrategy for MaObvStrategy {
    fn name(&self) -> &str {
        &self.name
    }

    fn class_name(&self) -> &'static str {
        "MaObvStrategy"
    }

    fn load_days(&self) -> u32 {
        120
    }

    fn on_bar(&mut self, bar: &Bar, ctx: &mut dyn StrategyContext) -> Result<()> {
        match self.generator.update_bar(bar) {
            Some(daily_bar) => self.on_daily_bar(&daily_bar, ctx),
            None => Ok(()),
        }
    }

    fn variables(&self) -> serde_json::Value {
        json!({
            "fast_ma0": self.fast_ma0,
            "fast_ma1": self.fast_ma1,
            "slow_ma0": self.slow_ma0,
            "slow_ma1": self.slow_ma1,
            "obv": self.obv,
        })
    }
}
