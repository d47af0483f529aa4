use serde::{Deserialize, Serialize};
use serde_json::json;

use super::{follow_signal, CtaStrategy, SignalWindow};
use crate::error::StrategyError;
use crate::execution::{tail_window, BarGenerator, BarSeries, StrategyContext};
use crate::indicators::{highest, lowest};
use crate::models::{Bar, Decision, Direction};
use crate::Result;

/// Configuration for the continuous breakthroughs strategy
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ContinuousBreakthroughsConfig {
    pub n1: i64,           // Net breakouts needed to trade
    pub n2: usize,         // Closes forming the breakout channel
    pub count: u64,        // Bar span a breakout stays counted
    pub window: u32,       // Minutes per window bar
    pub price_add: f64,    // Limit price offset
    pub fixed_size: i64,   // Contracts per entry
    pub array_size: usize, // Bars of history kept
}

impl Default for ContinuousBreakthroughsConfig {
    fn default() -> Self {
        Self {
            n1: 4,
            n2: 4,
            count: 6,
            window: 5,
            price_add: 5.0,
            fixed_size: 1,
            array_size: 100,
        }
    }
}

impl ContinuousBreakthroughsConfig {
    pub fn validate(&self) -> Result<()> {
        if self.n1 < 1 {
            return Err(StrategyError::invalid("n1", "must be at least 1"));
        }
        if self.n2 < 1 || self.n2 >= self.array_size {
            return Err(StrategyError::invalid(
                "n2",
                format!("must be in 1..{}", self.array_size),
            ));
        }
        if self.count < 1 {
            return Err(StrategyError::invalid("count", "must be at least 1"));
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

/// Continuous breakthroughs tracking strategy
///
/// Counts closes breaking out of the channel formed by the previous `n2`
/// closes. Breakouts are kept in a [`SignalWindow`] for `count` bars; once the
/// net count exceeds `n1` in either direction the strategy follows it.
#[derive(Debug)]
pub struct ContinuousBreakthroughsStrategy {
    name: String,
    config: ContinuousBreakthroughsConfig,
    generator: BarGenerator,
    series: BarSeries,
    signals: SignalWindow,
    i_count: u64,
    highest: f64,
    lowest: f64,
}

impl ContinuousBreakthroughsStrategy {
    pub fn new(name: impl Into<String>, config: ContinuousBreakthroughsConfig) -> Result<Self> {
        config.validate()?;

        Ok(Self {
            name: name.into(),
            generator: BarGenerator::new(config.window),
            series: BarSeries::new(config.array_size),
            signals: SignalWindow::new(),
            i_count: 0,
            highest: 0.0,
            lowest: 0.0,
            config,
        })
    }

    pub fn signal_window(&self) -> &SignalWindow {
        &self.signals
    }

    fn on_window_bar(&mut self, bar: &Bar, ctx: &mut dyn StrategyContext) -> Result<()> {
        self.series.update_bar(bar);
        if !self.series.inited() {
            return Ok(());
        }

        self.i_count += 1;

        let channel = tail_window(self.series.close(), self.config.n2 + 1, 1);
        let (Some(high), Some(low)) = (highest(channel), lowest(channel)) else {
            return Ok(());
        };
        self.highest = high;
        self.lowest = low;

        if bar.close > self.highest {
            self.signals
                .record_and_evict(self.i_count, Direction::Long, self.config.count)?;
        }
        if bar.close < self.lowest {
            self.signals
                .record_and_evict(self.i_count, Direction::Short, self.config.count)?;
        }

        if self.signals.is_empty() {
            return Ok(());
        }

        let direction = match self.signals.decide(self.config.n1) {
            Decision::Long => Some(Direction::Long),
            Decision::Short => Some(Direction::Short),
            Decision::Neutral => None,
        };

        if let Some(direction) = direction {
            if let Some(action) = follow_signal(
                ctx,
                direction,
                bar.close,
                self.config.price_add,
                self.config.fixed_size,
            ) {
                tracing::debug!(
                    strategy = %self.name,
                    ?action,
                    net_signal = self.signals.net_signal(),
                    "breakout count crossed threshold"
                );
            }
        }

        ctx.put_event(self.variables());
        Ok(())
    }
}

impl CtaStrategy for ContinuousBreakthroughsStrategy {
    fn name(&self) -> &str {
        &self.name
    }

    fn class_name(&self) -> &'static str {
        "ContinuousBreakthroughsStrategy"
    }

    fn on_bar(&mut self, bar: &Bar, ctx: &mut dyn StrategyContext) -> Result<()> {
        match self.generator.update_bar(bar) {
            Some(window_bar) => self.on_window_bar(&window_bar, ctx),
            None => Ok(()),
        }
    }

    fn variables(&self) -> serde_json::Value {
        json!({
            "i_count": self.i_count,
            "highest": self.highest,
            "lowest": self.lowest,
            "net_signal": self.signals.net_signal(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::execution::PaperContext;
    use crate::models::Offset;
    use crate::strategy::test_support::{minute_bars, session_start};

    fn create_test_strategy() -> ContinuousBreakthroughsStrategy {
        let config = ContinuousBreakthroughsConfig {
            window: 1,
            array_size: 10,
            ..Default::default()
        };
        ContinuousBreakthroughsStrategy::new("cb", config).unwrap()
    }

    fn trading_context() -> PaperContext {
        let mut ctx = PaperContext::new("RB888.SHFE");
        ctx.book_mut().set_trading(true);
        ctx
    }

    fn run(strategy: &mut ContinuousBreakthroughsStrategy, ctx: &mut PaperContext, closes: &[f64]) {
        for bar in minute_bars(session_start(2), closes) {
            strategy.on_bar(&bar, ctx).unwrap();
        }
    }

    #[test]
    fn test_default_config_is_valid() {
        assert!(ContinuousBreakthroughsConfig::default().validate().is_ok());
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = ContinuousBreakthroughsConfig {
            n2: 0,
            ..Default::default()
        };
        assert!(ContinuousBreakthroughsStrategy::new("cb", config).is_err());
    }

    #[test]
    fn test_no_signal_before_inited() {
        let mut strategy = create_test_strategy();
        let mut ctx = trading_context();

        run(&mut strategy, &mut ctx, &[100.0, 101.0, 102.0, 103.0, 104.0]);

        assert!(strategy.signal_window().is_empty());
        assert!(ctx.book().orders().is_empty());
    }

    #[test]
    fn test_five_upward_breakouts_open_long() {
        let mut strategy = create_test_strategy();
        let mut ctx = trading_context();

        let mut closes = vec![100.0; 10];
        closes.extend([101.0, 102.0, 103.0, 104.0]);
        run(&mut strategy, &mut ctx, &closes);

        // Four breakouts: net 4 is not above n1
        assert_eq!(strategy.signal_window().net_signal(), 4);
        assert_eq!(ctx.pos(), 0);

        let mut closes = vec![100.0; 10];
        closes.extend([101.0, 102.0, 103.0, 104.0, 105.0]);
        let mut strategy = create_test_strategy();
        run(&mut strategy, &mut ctx, &closes);

        assert_eq!(ctx.pos(), 1);
        let order = ctx.book().orders().last().unwrap();
        assert_eq!(order.direction, Direction::Long);
        assert_eq!(order.offset, Offset::Open);
        assert_eq!(order.price, 110.0);
    }

    #[test]
    fn test_downward_breakouts_flip_long() {
        let mut strategy = create_test_strategy();
        let mut ctx = trading_context();
        ctx.buy(100.0, 2, false);

        let mut closes = vec![100.0; 10];
        closes.extend([99.0, 98.0, 97.0, 96.0, 95.0]);
        run(&mut strategy, &mut ctx, &closes);

        assert_eq!(strategy.signal_window().net_signal(), -5);
        assert_eq!(ctx.pos(), -1);
    }

    #[test]
    fn test_old_breakouts_expire() {
        let mut strategy = create_test_strategy();
        let mut ctx = trading_context();

        // Two breakouts, then a quiet stretch longer than `count`
        let mut closes = vec![100.0; 10];
        closes.extend([101.0, 102.0]);
        closes.extend([102.0; 8]);
        closes.push(103.0);
        run(&mut strategy, &mut ctx, &closes);

        assert_eq!(strategy.signal_window().len(), 1);
        assert_eq!(strategy.signal_window().net_signal(), 1);
    }
}
