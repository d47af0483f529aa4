// Portfolio strategy module
// Cross-sectional strategies trading several instruments from one bar slice

pub mod oi_concentration;
pub mod rank_data;

pub use oi_concentration::{OiConcentrationConfig, OiConcentrationStrategy};
pub use rank_data::{product_prefix, CsvRankSource, InMemoryRankSource, RankDataSource, RankSnapshot};

use std::collections::BTreeMap;

use crate::execution::PortfolioContext;
use crate::models::{Bar, TradeData};
use crate::Result;

/// Lifecycle of a strategy that trades a basket of instruments
pub trait PortfolioStrategy: Send {
    fn name(&self) -> &str;

    fn class_name(&self) -> &'static str;

    fn load_days(&self) -> u32 {
        1
    }

    fn on_init(&mut self, ctx: &mut dyn PortfolioContext) -> Result<()> {
        ctx.write_log(&format!("{} initialising", self.name()));
        ctx.load_bars(self.load_days());
        Ok(())
    }

    fn on_start(&mut self, ctx: &mut dyn PortfolioContext) -> Result<()> {
        ctx.write_log(&format!("{} started", self.name()));
        Ok(())
    }

    fn on_stop(&mut self, ctx: &mut dyn PortfolioContext) -> Result<()> {
        ctx.write_log(&format!("{} stopped", self.name()));
        Ok(())
    }

    /// Bars of every instrument sharing one timestamp, keyed by symbol
    fn on_bars(&mut self, bars: &BTreeMap<String, Bar>, ctx: &mut dyn PortfolioContext)
        -> Result<()>;

    fn on_trade(&mut self, _trade: &TradeData, ctx: &mut dyn PortfolioContext) -> Result<()> {
        ctx.put_event(self.variables());
        Ok(())
    }

    fn variables(&self) -> serde_json::Value;
}
