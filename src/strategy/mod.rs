// Trading strategy module
// Bar-driven CTA strategies and the pieces they share
pub mod continuous_breakthroughs;
pub mod cpv;
pub mod daily_rumi;
pub mod extreme_value_follow;
pub mod maobv;
pub mod oi_based;
pub mod registry;
pub mod rumi;
pub mod signal_window;
pub mod trend_model_sys;

pub use continuous_breakthroughs::{ContinuousBreakthroughsConfig, ContinuousBreakthroughsStrategy};
pub use cpv::{CpvConfig, CpvStrategy};
pub use daily_rumi::{DailyRumiConfig, DailyRumiStrategy};
pub use extreme_value_follow::{ExtremeValueFollowConfig, ExtremeValueFollowStrategy};
pub use maobv::{MaObvConfig, MaObvStrategy};
pub use oi_based::{OiBasedConfig, OiBasedStrategy};
pub use registry::{build_strategy, default_setting, STRATEGY_CLASSES};
pub use rumi::{RumiConfig, RumiStrategy};
pub use signal_window::SignalWindow;
pub use trend_model_sys::{TrendModelSysConfig, TrendModelSysStrategy};

use crate::execution::StrategyContext;
use crate::models::{Bar, Direction, OrderAction, OrderRequest, StopOrder, TradeData};
use crate::Result;

/// Lifecycle every single-instrument strategy implements
///
/// The host calls `on_init` once, replays warm-up history through `on_bar`,
/// then calls `on_start` and keeps feeding completed one-minute bars.
pub trait CtaStrategy: Send {
    /// Instance name given in the settings
    fn name(&self) -> &str;

    /// Strategy class, as used by the registry
    fn class_name(&self) -> &'static str;

    /// Days of history replayed before trading starts
    fn load_days(&self) -> u32 {
        10
    }

    fn on_init(&mut self, ctx: &mut dyn StrategyContext) -> Result<()> {
        ctx.write_log(&format!("{} initialising", self.name()));
        ctx.load_bar(self.load_days());
        Ok(())
    }

    fn on_start(&mut self, ctx: &mut dyn StrategyContext) -> Result<()> {
        ctx.write_log(&format!("{} started", self.name()));
        ctx.put_event(self.variables());
        Ok(())
    }

    fn on_stop(&mut self, ctx: &mut dyn StrategyContext) -> Result<()> {
        ctx.write_log(&format!("{} stopped", self.name()));
        ctx.put_event(self.variables());
        Ok(())
    }

    /// Completed one-minute bar
    fn on_bar(&mut self, bar: &Bar, ctx: &mut dyn StrategyContext) -> Result<()>;

    fn on_trade(&mut self, _trade: &TradeData, ctx: &mut dyn StrategyContext) -> Result<()> {
        ctx.put_event(self.variables());
        Ok(())
    }

    fn on_order(&mut self, _order: &OrderRequest, _ctx: &mut dyn StrategyContext) -> Result<()> {
        Ok(())
    }

    fn on_stop_order(
        &mut self,
        _stop_order: &StopOrder,
        _ctx: &mut dyn StrategyContext,
    ) -> Result<()> {
        Ok(())
    }

    /// Snapshot of the strategy's displayable state
    fn variables(&self) -> serde_json::Value;
}

/// Move the position towards `direction` with an aggressive limit order
///
/// Flat opens `size` contracts; an opposite position is closed in full and
/// then reversed. Holding the same side does nothing.
///
/// # Arguments
/// * `close` - Close of the signal bar
/// * `price_add` - Price offset in the trade direction
/// * `size` - Contracts to open
pub fn follow_signal(
    ctx: &mut dyn StrategyContext,
    direction: Direction,
    close: f64,
    price_add: f64,
    size: i64,
) -> Option<OrderAction> {
    let pos = ctx.pos();

    match direction {
        Direction::Long => {
            let price = close + price_add;
            if pos == 0 {
                ctx.buy(price, size, false);
                Some(OrderAction::OpenLong)
            } else if pos < 0 {
                ctx.cover(price, pos.abs(), false);
                ctx.buy(price, size, false);
                Some(OrderAction::FlipToLong)
            } else {
                None
            }
        }
        Direction::Short => {
            let price = close - price_add;
            if pos == 0 {
                ctx.short(price, size, false);
                Some(OrderAction::OpenShort)
            } else if pos > 0 {
                ctx.sell(price, pos.abs(), false);
                ctx.short(price, size, false);
                Some(OrderAction::FlipToShort)
            } else {
                None
            }
        }
    }
}

/// True when a bar opens a new trading day relative to `last`
pub(crate) fn is_new_day(last: Option<&Bar>, bar: &Bar) -> bool {
    last.map_or(true, |last| last.date() != bar.date())
}

/// True for the last minute bar of the day session (14:59)
pub(crate) fn is_session_close(bar: &Bar) -> bool {
    use chrono::Timelike;
    bar.datetime.hour() == 14 && bar.datetime.minute() == 59
}
