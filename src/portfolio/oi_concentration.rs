use std::collections::{BTreeMap, HashMap};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::json;

use super::{PortfolioStrategy, RankDataSource};
use crate::error::StrategyError;
use crate::execution::PortfolioContext;
use crate::indicators::{mean, std_dev};
use crate::models::Bar;
use crate::Result;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct OiConcentrationConfig {
    #[serde(alias = "R")]
    pub r: usize, // Days in the deviation window, including today
    pub price_add: f64,
    pub capital_per_symbol: f64, // Notional allocated to each selected symbol
    pub select_ratio: f64,       // Share of the ranked symbols traded on each side
}

impl Default for OiConcentrationConfig {
    fn default() -> Self {
        Self {
            r: 5,
            price_add: 5.0,
            capital_per_symbol: 10_000.0,
            select_ratio: 0.2,
        }
    }
}

impl OiConcentrationConfig {
    pub fn validate(&self) -> Result<()> {
        if self.r < 2 {
            return Err(StrategyError::invalid("r", "must be at least 2"));
        }
        if !(self.capital_per_symbol > 0.0) {
            return Err(StrategyError::invalid("capital_per_symbol", "must be positive"));
        }
        if !(self.select_ratio > 0.0 && self.select_ratio <= 0.5) {
            return Err(StrategyError::invalid("select_ratio", "must be in (0, 0.5]"));
        }
        Ok(())
    }
}

/// Deviations of the latest value from the previous `r - 1` values
///
/// Returns `(dev1, dev2)`: the change relative to the mean and the change in
/// standard deviations. None without enough history or with a zero mean or
/// zero spread.
pub fn deviation(history: &[f64], r: usize) -> Option<(f64, f64)> {
    if r < 2 || history.len() < r {
        return None;
    }

    let latest = *history.last()?;
    let window = &history[history.len() - r..history.len() - 1];
    let avg = mean(window)?;
    let std = std_dev(window)?;
    if avg == 0.0 || std == 0.0 {
        return None;
    }

    Some(((latest - avg) / avg, (latest - avg) / std))
}

/// Open interest concentration strategy
///
/// Each trading day it scores every instrument by how unusual the net long
/// share of the top exchange members is, measured against the previous days.
/// The highest scores are bought and the lowest sold short, each with the
/// same notional.
pub struct OiConcentrationStrategy {
    name: String,
    config: OiConcentrationConfig,
    source: Box<dyn RankDataSource>,
    last_date: Option<NaiveDate>,
    lrsr: HashMap<String, Vec<f64>>,
    weighted_ls: HashMap<String, Vec<f64>>,
    lrsr_dev: BTreeMap<String, (f64, f64)>,
    weighted_ls_dev: BTreeMap<String, (f64, f64)>,
    targets: BTreeMap<String, i64>,
}

impl std::fmt::Debug for OiConcentrationStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OiConcentrationStrategy")
            .field("name", &self.name)
            .field("config", &self.config)
            .field("last_date", &self.last_date)
            .field("targets", &self.targets)
            .finish_non_exhaustive()
    }
}

impl OiConcentrationStrategy {
    pub fn new(
        name: impl Into<String>,
        config: OiConcentrationConfig,
        source: Box<dyn RankDataSource>,
    ) -> Result<Self> {
        config.validate()?;

        Ok(Self {
            name: name.into(),
            config,
            source,
            last_date: None,
            lrsr: HashMap::new(),
            weighted_ls: HashMap::new(),
            lrsr_dev: BTreeMap::new(),
            weighted_ls_dev: BTreeMap::new(),
            targets: BTreeMap::new(),
        })
    }

    /// Target positions chosen on the last evaluated day
    pub fn targets(&self) -> &BTreeMap<String, i64> {
        &self.targets
    }

    fn update_history(&mut self, symbol: &str, date: NaiveDate) {
        match self.source.snapshot(symbol, date) {
            Ok(snapshot) if snapshot.total_oi != 0.0 => {
                self.lrsr
                    .entry(symbol.to_string())
                    .or_default()
                    .push(snapshot.lrsr());
                self.weighted_ls
                    .entry(symbol.to_string())
                    .or_default()
                    .push(snapshot.weighted_ls());
            }
            Ok(_) => {
                tracing::warn!(strategy = %self.name, symbol, %date, "zero total open interest, skipping");
            }
            Err(e) => {
                tracing::warn!(strategy = %self.name, symbol, error = %e, "rank data unavailable, skipping");
            }
        }
    }

    /// Symbols to short and to buy, from the ascending weighted-LS ranking
    fn select(&self) -> (Vec<String>, Vec<String>) {
        let mut ranked: Vec<(&String, f64)> = self
            .weighted_ls_dev
            .iter()
            .map(|(symbol, (_, dev2))| (symbol, *dev2))
            .collect();
        ranked.sort_by(|a, b| a.1.total_cmp(&b.1));

        let n = (ranked.len() as f64 * self.config.select_ratio).round_ties_even() as usize;
        if n == 0 {
            return (Vec::new(), Vec::new());
        }

        let shorts = ranked[..n].iter().map(|(s, _)| (*s).clone()).collect();
        let longs = ranked[ranked.len() - n..]
            .iter()
            .map(|(s, _)| (*s).clone())
            .collect();
        (shorts, longs)
    }
}

impl PortfolioStrategy for OiConcentrationStrategy {
    fn name(&self) -> &str {
        &self.name
    }

    fn class_name(&self) -> &'static str {
        "OiConcentrationStrategy"
    }

    fn on_bars(&mut self, bars: &BTreeMap<String, Bar>, ctx: &mut dyn PortfolioContext) -> Result<()> {
        let Some(date) = bars.values().next().map(Bar::date) else {
            return Ok(());
        };
        // One evaluation per trading day
        if self.last_date == Some(date) {
            return Ok(());
        }
        self.last_date = Some(date);

        ctx.cancel_all();
        self.lrsr_dev.clear();
        self.weighted_ls_dev.clear();

        for symbol in bars.keys() {
            self.update_history(symbol, date);
        }

        let r = self.config.r;
        for symbol in bars.keys() {
            let lrsr = self.lrsr.get(symbol).and_then(|h| deviation(h, r));
            let weighted = self.weighted_ls.get(symbol).and_then(|h| deviation(h, r));
            if let (Some(lrsr), Some(weighted)) = (lrsr, weighted) {
                self.lrsr_dev.insert(symbol.clone(), lrsr);
                self.weighted_ls_dev.insert(symbol.clone(), weighted);
            }
        }

        let (shorts, longs) = self.select();

        for symbol in ctx.symbols() {
            let Some(bar) = bars.get(&symbol) else {
                continue;
            };
            let pos = ctx.pos(&symbol);
            if pos > 0 {
                ctx.sell(&symbol, bar.close - self.config.price_add, pos);
            } else if pos < 0 {
                ctx.cover(&symbol, bar.close + self.config.price_add, pos.abs());
            }
        }

        self.targets.clear();
        for (symbol, bar) in bars {
            let target = if bar.close <= 0.0 {
                0
            } else if longs.contains(symbol) {
                (self.config.capital_per_symbol / bar.close).round_ties_even() as i64
            } else if shorts.contains(symbol) {
                -(self.config.capital_per_symbol / bar.close).round_ties_even() as i64
            } else {
                0
            };
            self.targets.insert(symbol.clone(), target);

            if target > 0 {
                ctx.buy(symbol, bar.close + self.config.price_add, target);
            } else if target < 0 {
                ctx.short(symbol, bar.close - self.config.price_add, target.abs());
            }
        }

        tracing::debug!(
            strategy = %self.name,
            %date,
            ranked = self.weighted_ls_dev.len(),
            longs = longs.len(),
            shorts = shorts.len(),
            "daily rebalance"
        );

        ctx.put_event(self.variables());
        Ok(())
    }

    fn variables(&self) -> serde_json::Value {
        json!({
            "targets": self.targets,
            "lrsr_dev": self.lrsr_dev,
            "weighted_ls_dev": self.weighted_ls_dev,
        })
    }
}
