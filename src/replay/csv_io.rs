use std::io;
use std::path::Path;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::error::StrategyError;
use crate::models::Bar;
use crate::Result;

pub const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// One row of a bar file
#[derive(Debug, Serialize, Deserialize)]
struct BarRecord {
    datetime: String,
    open: f64,
    high: f64,
    low: f64,
    close: f64,
    volume: f64,
    #[serde(default)]
    turnover: f64,
    #[serde(default)]
    open_interest: f64,
    #[serde(default)]
    symbol: Option<String>,
}

impl BarRecord {
    fn into_bar(self, default_symbol: &str, line: usize) -> Result<Bar> {
        let datetime = NaiveDateTime::parse_from_str(self.datetime.trim(), DATETIME_FORMAT)
            .map_err(|e| {
                StrategyError::InvalidBarData(format!(
                    "row {line}: bad datetime `{}`: {e}",
                    self.datetime
                ))
            })?;

        if self.high < self.low {
            return Err(StrategyError::InvalidBarData(format!(
                "row {line}: high {} below low {}",
                self.high, self.low
            )));
        }

        Ok(Bar {
            symbol: self
                .symbol
                .filter(|s| !s.is_empty())
                .unwrap_or_else(|| default_symbol.to_string()),
            datetime,
            open: self.open,
            high: self.high,
            low: self.low,
            close: self.close,
            volume: self.volume,
            turnover: self.turnover,
            open_interest: self.open_interest,
        })
    }
}

/// Read bars from a CSV file
///
/// Rows without a `symbol` column get `default_symbol`.
pub fn read_bars(path: impl AsRef<Path>, default_symbol: &str) -> Result<Vec<Bar>> {
    let file = std::fs::File::open(path.as_ref())?;
    let bars = read_bars_from(file, default_symbol)?;

    tracing::info!(
        path = %path.as_ref().display(),
        bars = bars.len(),
        "bars loaded"
    );

    Ok(bars)
}

pub fn read_bars_from<R: io::Read>(reader: R, default_symbol: &str) -> Result<Vec<Bar>> {
    let mut reader = csv::Reader::from_reader(reader);
    let mut bars = Vec::new();

    for (i, record) in reader.deserialize::<BarRecord>().enumerate() {
        // Header is line 1
        bars.push(record?.into_bar(default_symbol, i + 2)?);
    }

    Ok(bars)
}

pub fn write_bars(path: impl AsRef<Path>, bars: &[Bar], with_symbol: bool) -> Result<()> {
    let file = std::fs::File::create(path.as_ref())?;
    write_bars_to(file, bars, with_symbol)
}

pub fn write_bars_to<W: io::Write>(writer: W, bars: &[Bar], with_symbol: bool) -> Result<()> {
    let mut writer = csv::Writer::from_writer(writer);

    for bar in bars {
        writer.serialize(BarRecord {
            datetime: bar.datetime.format(DATETIME_FORMAT).to_string(),
            open: bar.open,
            high: bar.high,
            low: bar.low,
            close: bar.close,
            volume: bar.volume,
            turnover: bar.turnover,
            open_interest: bar.open_interest,
            symbol: with_symbol.then(|| bar.symbol.clone()),
        })?;
    }

    writer.flush()?;
    Ok(())
}
