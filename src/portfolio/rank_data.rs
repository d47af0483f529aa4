use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::StrategyError;
use crate::Result;

const DATE_FORMAT: &str = "%Y-%m-%d";

/// Member position ranking of one product on one trading day
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct RankSnapshot {
    pub long: f64,           // Long holdings of the top members
    pub short: f64,          // Short holdings of the top members
    pub weighted_long: f64,  // Long holdings weighted by member rank
    pub weighted_short: f64, // Short holdings weighted by member rank
    pub total_oi: f64,
}

impl RankSnapshot {
    /// Net long share of the top members
    pub fn lrsr(&self) -> f64 {
        (self.long - self.short) / self.total_oi
    }

    /// Net long share computed from the weighted holdings
    pub fn weighted_ls(&self) -> f64 {
        (self.weighted_long - self.weighted_short) / self.total_oi
    }
}

/// Source of daily member ranking data
pub trait RankDataSource: Send {
    /// Ranking for `symbol` on `date`
    ///
    /// # Errors
    /// `MissingRankData` when the source has no row for that day.
    fn snapshot(&self, symbol: &str, date: NaiveDate) -> Result<RankSnapshot>;
}

/// Product code of a continuous contract symbol, `RB888.SHFE` -> `RB`
pub fn product_prefix(symbol: &str) -> &str {
    symbol.split("888").next().unwrap_or(symbol)
}

fn missing(symbol: &str, date: NaiveDate) -> StrategyError {
    StrategyError::MissingRankData {
        symbol: symbol.to_string(),
        date: date.format(DATE_FORMAT).to_string(),
    }
}

/// Rankings held in memory
#[derive(Debug, Default, Clone)]
pub struct InMemoryRankSource {
    rows: HashMap<(String, NaiveDate), RankSnapshot>,
}

impl InMemoryRankSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, symbol: impl Into<String>, date: NaiveDate, snapshot: RankSnapshot) {
        self.rows.insert((symbol.into(), date), snapshot);
    }
}

impl RankDataSource for InMemoryRankSource {
    fn snapshot(&self, symbol: &str, date: NaiveDate) -> Result<RankSnapshot> {
        self.rows
            .get(&(symbol.to_string(), date))
            .copied()
            .ok_or_else(|| missing(symbol, date))
    }
}

#[derive(Debug, Default)]
struct ProductRanks {
    long: BTreeMap<NaiveDate, f64>,
    short: BTreeMap<NaiveDate, f64>,
    weighted_long: BTreeMap<NaiveDate, f64>,
    weighted_short: BTreeMap<NaiveDate, f64>,
    total_oi: BTreeMap<NaiveDate, f64>,
}

/// Rankings read from the processed per-product CSV files
///
/// For product `P` the directory holds `P_processed_long.csv`,
/// `P_processed_short.csv`, `P_weighted_processed_long.csv`,
/// `P_weighted_processed_short.csv` (columns `trading_date`, `volume`) and
/// `P_total_oi.csv` (columns `trading_date`, `P_total_oi`).
#[derive(Debug, Default)]
pub struct CsvRankSource {
    products: HashMap<String, ProductRanks>,
}

impl CsvRankSource {
    /// Load the files of every product traded through `symbols`
    pub fn load(dir: impl AsRef<Path>, symbols: &[String]) -> Result<Self> {
        let dir = dir.as_ref();
        let mut products = HashMap::new();

        for symbol in symbols {
            let product = product_prefix(symbol);
            if products.contains_key(product) {
                continue;
            }

            let total_column = format!("{product}_total_oi");
            let ranks = ProductRanks {
                long: read_column(&dir.join(format!("{product}_processed_long.csv")), "volume")?,
                short: read_column(&dir.join(format!("{product}_processed_short.csv")), "volume")?,
                weighted_long: read_column(
                    &dir.join(format!("{product}_weighted_processed_long.csv")),
                    "volume",
                )?,
                weighted_short: read_column(
                    &dir.join(format!("{product}_weighted_processed_short.csv")),
                    "volume",
                )?,
                total_oi: read_column(&dir.join(format!("{product}_total_oi.csv")), &total_column)?,
            };

            tracing::debug!(product, days = ranks.total_oi.len(), "rank data loaded");
            products.insert(product.to_string(), ranks);
        }

        Ok(Self { products })
    }
}

impl RankDataSource for CsvRankSource {
    fn snapshot(&self, symbol: &str, date: NaiveDate) -> Result<RankSnapshot> {
        let ranks = self
            .products
            .get(product_prefix(symbol))
            .ok_or_else(|| missing(symbol, date))?;

        let value = |column: &BTreeMap<NaiveDate, f64>| {
            column.get(&date).copied().ok_or_else(|| missing(symbol, date))
        };

        Ok(RankSnapshot {
            long: value(&ranks.long)?,
            short: value(&ranks.short)?,
            weighted_long: value(&ranks.weighted_long)?,
            weighted_short: value(&ranks.weighted_short)?,
            total_oi: value(&ranks.total_oi)?,
        })
    }
}

/// Read `trading_date` and one value column of a ranking file
fn read_column(path: &Path, column: &str) -> Result<BTreeMap<NaiveDate, f64>> {
    let mut reader = csv::Reader::from_path(path)?;
    let headers = reader.headers()?.clone();

    let position = |name: &str| {
        headers.iter().position(|h| h == name).ok_or_else(|| {
            StrategyError::InvalidBarData(format!("{}: missing column `{name}`", path.display()))
        })
    };
    let date_idx = position("trading_date")?;
    let value_idx = position(column)?;

    let mut values = BTreeMap::new();
    for record in reader.records() {
        let record = record?;
        let (Some(date), Some(value)) = (record.get(date_idx), record.get(value_idx)) else {
            continue;
        };

        let date = NaiveDate::parse_from_str(date.trim(), DATE_FORMAT).map_err(|e| {
            StrategyError::InvalidBarData(format!("{}: bad date `{date}`: {e}", path.display()))
        })?;
        // Blank cells are treated as missing days
        if let Ok(value) = value.trim().parse::<f64>() {
            values.insert(date, value);
        }
    }

    Ok(values)
}
