use std::collections::{BTreeMap, BTreeSet};

use chrono::{NaiveDate, NaiveDateTime};
use serde::Serialize;

use crate::error::StrategyError;
use crate::execution::{PaperBook, PaperContext, PaperPortfolioContext, StrategyContext};
use crate::models::{Bar, OrderRequest, TradeData};
use crate::portfolio::PortfolioStrategy;
use crate::strategy::CtaStrategy;
use crate::Result;

/// Outcome of replaying one strategy
#[derive(Debug, Clone, Serialize)]
pub struct ReplayReport {
    pub strategy_name: String,
    pub class_name: String,
    pub symbol: String,
    pub warmup_bars: usize,
    pub bars_replayed: usize,
    pub orders: Vec<OrderRequest>,
    pub trades: Vec<TradeData>,
    pub final_pos: i64,
    pub events: usize,
    pub variables: serde_json::Value,
}

/// Outcome of replaying one portfolio strategy
#[derive(Debug, Clone, Serialize)]
pub struct PortfolioReplayReport {
    pub strategy_name: String,
    pub class_name: String,
    pub symbols: Vec<String>,
    pub warmup_slices: usize,
    pub slices_replayed: usize,
    pub orders: Vec<OrderRequest>,
    pub trades: Vec<TradeData>,
    pub positions: BTreeMap<String, i64>,
    pub events: usize,
    pub variables: serde_json::Value,
}

/// Index of the first item past the first `days` distinct dates
fn warmup_end(dates: impl Iterator<Item = NaiveDate>, days: u32) -> usize {
    let mut seen = BTreeSet::new();
    let mut end = 0;

    for date in dates {
        if !seen.contains(&date) {
            if seen.len() == days as usize {
                break;
            }
            seen.insert(date);
        }
        end += 1;
    }

    end
}

fn check_order(previous: Option<NaiveDateTime>, current: NaiveDateTime) -> Result<()> {
    match previous {
        Some(previous) if current < previous => Err(StrategyError::InvalidBarData(format!(
            "bars out of order: {current} after {previous}"
        ))),
        _ => Ok(()),
    }
}

/// Drives a single-instrument strategy over recorded bars
///
/// Mirrors the host lifecycle: `on_init`, warm-up over the requested days with
/// trading disabled, `on_start`, live replay, `on_stop`. Stop orders are
/// checked against each bar before the strategy sees it, and fills are fed
/// back through `on_trade`.
#[derive(Debug, Clone)]
pub struct ReplayRunner {
    warmup: bool,
}

impl Default for ReplayRunner {
    fn default() -> Self {
        Self { warmup: true }
    }
}

impl ReplayRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_warmup(mut self, warmup: bool) -> Self {
        self.warmup = warmup;
        self
    }

    /// Run a replay
    ///
    /// # Arguments
    /// * `strategy` - The strategy to drive
    /// * `bars` - One-minute bars of a single symbol in time order
    pub fn run(&self, strategy: &mut dyn CtaStrategy, bars: &[Bar]) -> Result<ReplayReport> {
        let symbol = bars.first().map(|b| b.symbol.clone()).unwrap_or_default();

        let mut previous = None;
        for bar in bars {
            check_order(previous, bar.datetime)?;
            if bar.symbol != symbol {
                return Err(StrategyError::InvalidBarData(format!(
                    "mixed symbols in replay: {} and {}",
                    symbol, bar.symbol
                )));
            }
            previous = Some(bar.datetime);
        }

        let mut ctx = PaperContext::new(symbol.clone());
        strategy.on_init(&mut ctx)?;

        let warmup_bars = if self.warmup {
            let days = ctx.book().load_days().unwrap_or(0);
            warmup_end(bars.iter().map(Bar::date), days)
        } else {
            0
        };
        if warmup_bars == bars.len() && !bars.is_empty() {
            tracing::warn!(
                strategy = %strategy.name(),
                bars = bars.len(),
                "all bars consumed by warm-up"
            );
        }

        tracing::info!(
            strategy = %strategy.name(),
            symbol = %symbol,
            warmup_bars,
            total_bars = bars.len(),
            "starting replay"
        );

        for bar in &bars[..warmup_bars] {
            ctx.book_mut().set_datetime(bar.datetime);
            strategy.on_bar(bar, &mut ctx)?;
        }

        ctx.book_mut().set_trading(true);
        strategy.on_start(&mut ctx)?;

        let mut delivered_orders = ctx.book().orders().len();
        for bar in &bars[warmup_bars..] {
            ctx.book_mut().set_datetime(bar.datetime);

            ctx.book_mut().check_stop_orders(bar);
            deliver(strategy, &mut ctx, &mut delivered_orders)?;

            strategy.on_bar(bar, &mut ctx)?;
            deliver(strategy, &mut ctx, &mut delivered_orders)?;
        }

        strategy.on_stop(&mut ctx)?;

        let report = ReplayReport {
            strategy_name: strategy.name().to_string(),
            class_name: strategy.class_name().to_string(),
            final_pos: ctx.pos(),
            symbol,
            warmup_bars,
            bars_replayed: bars.len() - warmup_bars,
            orders: ctx.book().orders().to_vec(),
            trades: ctx.book().trades().to_vec(),
            events: ctx.book().events(),
            variables: strategy.variables(),
        };

        tracing::info!(
            strategy = %report.strategy_name,
            orders = report.orders.len(),
            trades = report.trades.len(),
            final_pos = report.final_pos,
            "replay finished"
        );

        Ok(report)
    }
}

/// Feed new orders, stop-order updates and fills back to the strategy
fn deliver(
    strategy: &mut dyn CtaStrategy,
    ctx: &mut PaperContext,
    delivered_orders: &mut usize,
) -> Result<()> {
    let orders: Vec<OrderRequest> = ctx.book().orders()[*delivered_orders..].to_vec();
    *delivered_orders += orders.len();
    for order in &orders {
        strategy.on_order(order, ctx)?;
    }

    for stop_order in ctx.book_mut().take_stop_order_updates() {
        strategy.on_stop_order(&stop_order, ctx)?;
    }

    for trade in ctx.book_mut().take_trades() {
        strategy.on_trade(&trade, ctx)?;
    }

    Ok(())
}

/// Drives a portfolio strategy over bars of several symbols
///
/// Bars sharing a timestamp are handed over together as one slice.
#[derive(Debug, Clone)]
pub struct PortfolioReplayRunner {
    warmup: bool,
}

impl Default for PortfolioReplayRunner {
    fn default() -> Self {
        Self { warmup: true }
    }
}

impl PortfolioReplayRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_warmup(mut self, warmup: bool) -> Self {
        self.warmup = warmup;
        self
    }

    pub fn run(
        &self,
        strategy: &mut dyn PortfolioStrategy,
        symbols: &[String],
        bars: &[Bar],
    ) -> Result<PortfolioReplayReport> {
        let mut slices: BTreeMap<NaiveDateTime, BTreeMap<String, Bar>> = BTreeMap::new();
        for bar in bars.iter().filter(|b| symbols.contains(&b.symbol)) {
            slices
                .entry(bar.datetime)
                .or_default()
                .insert(bar.symbol.clone(), bar.clone());
        }
        let slices: Vec<(NaiveDateTime, BTreeMap<String, Bar>)> = slices.into_iter().collect();

        let mut ctx = PaperPortfolioContext::new(symbols.to_vec());
        strategy.on_init(&mut ctx)?;

        let warmup_slices = if self.warmup {
            let days = ctx.book().load_days().unwrap_or(0);
            warmup_end(slices.iter().map(|(dt, _)| dt.date()), days)
        } else {
            0
        };

        tracing::info!(
            strategy = %strategy.name(),
            symbols = symbols.len(),
            warmup_slices,
            total_slices = slices.len(),
            "starting portfolio replay"
        );

        for (datetime, slice) in &slices[..warmup_slices] {
            ctx.book_mut().set_datetime(*datetime);
            strategy.on_bars(slice, &mut ctx)?;
        }

        ctx.book_mut().set_trading(true);
        strategy.on_start(&mut ctx)?;

        for (datetime, slice) in &slices[warmup_slices..] {
            ctx.book_mut().set_datetime(*datetime);
            strategy.on_bars(slice, &mut ctx)?;

            for trade in ctx.book_mut().take_trades() {
                strategy.on_trade(&trade, &mut ctx)?;
            }
        }

        strategy.on_stop(&mut ctx)?;

        let book: &PaperBook = ctx.book();
        Ok(PortfolioReplayReport {
            strategy_name: strategy.name().to_string(),
            class_name: strategy.class_name().to_string(),
            symbols: symbols.to_vec(),
            warmup_slices,
            slices_replayed: slices.len() - warmup_slices,
            orders: book.orders().to_vec(),
            trades: book.trades().to_vec(),
            positions: book.positions().clone(),
            events: book.events(),
            variables: strategy.variables(),
        })
    }
}
