use serde::{Deserialize, Serialize};
use serde_json::json;

use super::CtaStrategy;
use crate::error::StrategyError;
use crate::execution::{tail_window, BarGenerator, BarSeries, StrategyContext};
use crate::indicators::{ema_series, highest, lowest};
use crate::models::Bar;
use crate::Result;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TrendModelSysConfig {
    pub fast_window: usize,
    pub slow_window: usize,
    pub macd_window: usize,
    pub ncos: usize,     // Zero crosses required
    pub n_bars: u64,     // Bars the last `ncos` crosses must fit in
    pub trailbar: usize, // Bars forming the trailing exit channel
    pub window: u32,
    pub price_add: f64,
    pub fixed_size: i64,
    pub array_size: usize,
}

impl Default for TrendModelSysConfig {
    fn default() -> Self {
        Self {
            fast_window: 5,
            slow_window: 21,
            macd_window: 4,
            ncos: 4,
            n_bars: 75,
            trailbar: 5,
            window: 5,
            price_add: 5.0,
            fixed_size: 1,
            array_size: 100,
        }
    }
}

impl TrendModelSysConfig {
    pub fn validate(&self) -> Result<()> {
        if self.fast_window < 1 || self.fast_window >= self.slow_window {
            return Err(StrategyError::invalid(
                "fast_window",
                "must be at least 1 and below slow_window",
            ));
        }
        if self.slow_window + self.macd_window > self.array_size {
            return Err(StrategyError::invalid(
                "slow_window",
                "slow_window + macd_window must fit in array_size",
            ));
        }
        if self.macd_window < 1 {
            return Err(StrategyError::invalid("macd_window", "must be at least 1"));
        }
        if self.ncos < 1 {
            return Err(StrategyError::invalid("ncos", "must be at least 1"));
        }
        if self.trailbar < 1 || self.trailbar >= self.array_size {
            return Err(StrategyError::invalid(
                "trailbar",
                format!("must be in 1..{}", self.array_size),
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

/// Trend model system strategy
///
/// Watches zero crosses of a MACD-style histogram. When `ncos` crosses happen
/// within `n_bars`, the market is considered to be coiling: the strategy
/// brackets the range of those crossing bars with a buy stop and a short
/// stop. Open positions exit on a break of the trailing `trailbar` channel.
#[derive(Debug)]
pub struct TrendModelSysStrategy {
    name: String,
    config: TrendModelSysConfig,
    generator: BarGenerator,
    series: BarSeries,
    count: u64,
    mdif: f64,
    highest: f64,
    lowest: f64,
    bar_number: Vec<u64>,
    high_price: Vec<f64>,
    low_price: Vec<f64>,
}

impl TrendModelSysStrategy {
    pub fn new(name: impl Into<String>, config: TrendModelSysConfig) -> Result<Self> {
        config.validate()?;

        Ok(Self {
            name: name.into(),
            generator: BarGenerator::new(config.window),
            series: BarSeries::new(config.array_size),
            count: 0,
            mdif: 0.0,
            highest: 0.0,
            lowest: 0.0,
            bar_number: Vec::new(),
            high_price: Vec::new(),
            low_price: Vec::new(),
            config,
        })
    }

    /// Bar numbers of the recorded zero crosses
    pub fn crosses(&self) -> &[u64] {
        &self.bar_number
    }

    fn on_window_bar(&mut self, bar: &Bar, ctx: &mut dyn StrategyContext) -> Result<()> {
        self.series.update_bar(bar);
        if !self.series.inited() {
            return Ok(());
        }

        self.count += 1;

        let fast = self.series.ema_array(self.config.fast_window);
        let slow = self.series.ema_array(self.config.slow_window);
        let mval: Vec<f64> = fast.iter().zip(&slow).map(|(f, s)| f - s).collect();
        let mavg = ema_series(&mval, self.config.macd_window);
        let mdif: Vec<f64> = mval.iter().zip(&mavg).map(|(v, a)| v - a).collect();

        let (current, previous) = match mdif.as_slice() {
            [.., previous, current] => (*current, *previous),
            _ => return Ok(()),
        };
        self.mdif = current;

        // NaN compares false, so warm-up bars never cross
        let cross_over = current > 0.0 && previous < 0.0;
        let cross_below = current < 0.0 && previous > 0.0;

        let pos = ctx.pos();
        if pos > 0 {
            ctx.cancel_all();
            let trail = tail_window(self.series.low(), self.config.trailbar + 1, 1);
            if lowest(trail).is_some_and(|low| bar.close < low) {
                ctx.sell(bar.close - self.config.price_add, pos.abs(), false);
            }
        } else if pos < 0 {
            ctx.cancel_all();
            let trail = tail_window(self.series.high(), self.config.trailbar + 1, 1);
            if highest(trail).is_some_and(|high| bar.close > high) {
                ctx.cover(bar.close + self.config.price_add, pos.abs(), false);
            }
        }

        if cross_over || cross_below {
            self.bar_number.push(self.count);
            self.high_price.push(bar.high);
            self.low_price.push(bar.low);

            let ncos = self.config.ncos;
            if self.bar_number.len() < ncos {
                return Ok(());
            }

            let recent = &self.bar_number[self.bar_number.len() - ncos..];
            if recent[ncos - 1] - recent[0] > self.config.n_bars {
                return Ok(());
            }

            // Position as of the start of the bar, before any exit above filled
            if pos == 0 {
                let start = self.high_price.len() - ncos;
                self.highest = highest(&self.high_price[start..]).unwrap_or(bar.high);
                self.lowest = lowest(&self.low_price[start..]).unwrap_or(bar.low);

                ctx.buy(self.highest + self.config.price_add, self.config.fixed_size, true);
                ctx.short(self.lowest - self.config.price_add, self.config.fixed_size, true);

                tracing::debug!(
                    strategy = %self.name,
                    highest = self.highest,
                    lowest = self.lowest,
                    "bracket stops placed"
                );
            }
        }

        ctx.put_event(self.variables());
        Ok(())
    }
}

impl CtaStrategy for TrendModelSysStrategy {
    fn name(&self) -> &str {
        &self.name
    }

    fn class_name(&self) -> &'static str {
        "TrendModelSysStrategy"
    }

    fn on_bar(&mut self, bar: &Bar, ctx: &mut dyn StrategyContext) -> Result<()> {
        match self.generator.update_bar(bar) {
            Some(window_bar) => self.on_window_bar(&window_bar, ctx),
            None => Ok(()),
        }
    }

    fn variables(&self) -> serde_json::Value {
        json!({
            "count": self.count,
            "mdif": self.mdif,
            "highest": self.highest,
            "lowest": self.lowest,
            "crosses": self.bar_number.len(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::execution::PaperContext;
    use crate::models::{Direction, Offset, StopOrderStatus};
    use crate::strategy::test_support::{minute_bars, session_start};

    fn create_test_strategy() -> TrendModelSysStrategy {
        let config = TrendModelSysConfig {
            fast_window: 2,
            slow_window: 4,
            macd_window: 2,
            ncos: 2,
            n_bars: 20,
            trailbar: 2,
            window: 1,
            array_size: 8,
            ..Default::default()
        };
        TrendModelSysStrategy::new("tms", config).unwrap()
    }

    /// Closes that oscillate hard enough to make the histogram change sign
    fn zigzag(n: usize) -> Vec<f64> {
        (0..n)
            .map(|i| if (i / 3) % 2 == 0 { 100.0 + i as f64 } else { 100.0 - i as f64 })
            .collect()
    }

    #[test]
    fn test_invalid_windows_rejected() {
        let config = TrendModelSysConfig {
            fast_window: 30,
            ..Default::default()
        };
        assert!(config.validate().is_err());
        assert!(TrendModelSysConfig::default().validate().is_ok());
    }

    #[test]
    fn test_crosses_place_bracket_stops() {
        let mut strategy = create_test_strategy();
        let mut ctx = PaperContext::new("RB888.SHFE");
        ctx.book_mut().set_trading(true);

        for bar in minute_bars(session_start(2), &zigzag(40)) {
            ctx.book_mut().check_stop_orders(&bar);
            strategy.on_bar(&bar, &mut ctx).unwrap();
        }

        assert!(strategy.crosses().len() >= 2);
        let stops: Vec<_> = ctx.book().orders().iter().filter(|o| o.stop).collect();
        assert!(!stops.is_empty());
        assert!(stops.iter().any(|o| o.direction == Direction::Long));
        assert!(stops.iter().any(|o| o.direction == Direction::Short));
    }

    #[test]
    fn test_trailing_exit_closes_long() {
        let mut strategy = create_test_strategy();
        let mut ctx = PaperContext::new("RB888.SHFE");
        ctx.book_mut().set_trading(true);
        ctx.buy(100.0, 1, false);
        ctx.buy(200.0, 1, true);

        let mut closes = vec![100.0; 8];
        closes.push(90.0);
        for bar in minute_bars(session_start(2), &closes) {
            strategy.on_bar(&bar, &mut ctx).unwrap();
        }

        // Holding a position cancels working stops every bar
        let updates = ctx.book_mut().take_stop_order_updates();
        assert!(updates
            .iter()
            .any(|o| o.status == StopOrderStatus::Cancelled));
        assert_eq!(ctx.pos(), 0);
    }

    #[test]
    fn test_exit_on_crossing_bar_places_no_brackets() {
        let config = TrendModelSysConfig {
            fast_window: 2,
            slow_window: 4,
            macd_window: 2,
            ncos: 1,
            n_bars: 20,
            trailbar: 1,
            window: 1,
            array_size: 8,
            ..Default::default()
        };
        let mut strategy = TrendModelSysStrategy::new("tms", config).unwrap();
        let mut ctx = PaperContext::new("RB888.SHFE");
        ctx.book_mut().set_trading(true);
        ctx.buy(100.0, 1, false);

        // Accelerating rise keeps the histogram positive; the drop flips it
        let mut closes: Vec<f64> = (0..12).map(|i| 100.0 + (i * i) as f64).collect();
        closes.push(50.0);
        for bar in minute_bars(session_start(2), &closes) {
            strategy.on_bar(&bar, &mut ctx).unwrap();
        }

        assert_eq!(strategy.crosses().len(), 1);
        assert_eq!(ctx.pos(), 0);

        let orders = &ctx.book().orders()[1..];
        assert_eq!(orders.len(), 1);
        assert_eq!(orders[0].direction, Direction::Short);
        assert_eq!(orders[0].offset, Offset::Close);
        assert!(!orders[0].stop);
        assert!(ctx.book().waiting_stop_orders().is_empty());
    }
}
