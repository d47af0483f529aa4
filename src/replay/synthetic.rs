use std::str::FromStr;

use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime, NaiveTime, Weekday};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::error::StrategyError;
use crate::models::Bar;

/// Market scenario types for synthetic data generation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarketScenario {
    /// Steady uptrend with noise (+2% per day)
    Uptrend,
    /// Steady downtrend with noise (-2% per day)
    Downtrend,
    /// Mean-reverting chop around the base price
    Sideways,
    /// Large swings in both directions
    Volatile,
}

impl MarketScenario {
    pub const ALL: [MarketScenario; 4] = [
        MarketScenario::Uptrend,
        MarketScenario::Downtrend,
        MarketScenario::Sideways,
        MarketScenario::Volatile,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            MarketScenario::Uptrend => "uptrend",
            MarketScenario::Downtrend => "downtrend",
            MarketScenario::Sideways => "sideways",
            MarketScenario::Volatile => "volatile",
        }
    }
}

impl FromStr for MarketScenario {
    type Err = StrategyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        MarketScenario::ALL
            .into_iter()
            .find(|scenario| scenario.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| StrategyError::invalid("scenario", format!("unknown scenario `{s}`")))
    }
}

/// Day session minute blocks: 09:00-11:29 and 13:30-14:59
const SESSIONS: [(u32, u32, u32); 2] = [(9, 0, 150), (13, 30, 90)];

/// Minute bars per trading day
pub const BARS_PER_DAY: usize = 240;

/// Generates synthetic minute bars for replay
pub struct SyntheticBarGenerator {
    rng: StdRng,
    symbol: String,
    start_date: NaiveDate,
    base_price: f64,
    base_volume: f64,
    base_open_interest: f64,
}

impl SyntheticBarGenerator {
    /// Create a new generator with a seed for reproducibility
    pub fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            symbol: "RB888.SHFE".to_string(),
            start_date: NaiveDate::from_ymd_opt(2024, 1, 2).unwrap_or_default(),
            base_price: 3500.0,
            base_volume: 200.0,
            base_open_interest: 100_000.0,
        }
    }

    pub fn with_symbol(mut self, symbol: impl Into<String>) -> Self {
        self.symbol = symbol.into();
        self
    }

    pub fn with_base_price(mut self, base_price: f64) -> Self {
        self.base_price = base_price;
        self
    }

    /// Generate `days` trading days of minute bars, skipping weekends
    ///
    /// # Arguments
    /// * `scenario` - The market scenario to simulate
    /// * `days` - Number of trading days
    pub fn generate(&mut self, scenario: MarketScenario, days: usize) -> Vec<Bar> {
        let mut bars = Vec::with_capacity(days * BARS_PER_DAY);
        let mut price = self.base_price;
        let mut open_interest = self.base_open_interest;

        let drift = match scenario {
            MarketScenario::Uptrend => 0.02 / BARS_PER_DAY as f64,
            MarketScenario::Downtrend => -0.02 / BARS_PER_DAY as f64,
            MarketScenario::Sideways | MarketScenario::Volatile => 0.0,
        };

        for date in trading_days(self.start_date, days) {
            for datetime in session_minutes(date) {
                price += match scenario {
                    MarketScenario::Uptrend | MarketScenario::Downtrend => {
                        // Reduced noise so the trend dominates
                        price * (drift + self.rng.gen_range(-0.001..0.001))
                    }
                    MarketScenario::Sideways => {
                        (self.base_price - price) * 0.1 + price * self.rng.gen_range(-0.002..0.002)
                    }
                    MarketScenario::Volatile => price * self.rng.gen_range(-0.01..0.01),
                };

                // Prevent price from going too low
                price = price.max(self.base_price * 0.5);

                open_interest = (open_interest + self.rng.gen_range(-50.0..50.0_f64).round()).max(1.0);

                let bar = self.create_bar(datetime, price, open_interest);
                bars.push(bar);
            }
        }

        bars
    }

    /// Helper to create a bar from a close price
    fn create_bar(&mut self, datetime: NaiveDateTime, price: f64, open_interest: f64) -> Bar {
        let close = price.round();
        let noise_pct = 0.001; // ±0.1% intrabar movement

        let high = (price * (1.0 + self.rng.gen_range(0.0..noise_pct))).round().max(close);
        let low = (price * (1.0 - self.rng.gen_range(0.0..noise_pct))).round().min(close);
        let open = (price * (1.0 + self.rng.gen_range(-noise_pct..noise_pct)))
            .round()
            .clamp(low, high);

        // Vary volume ±50%
        let volume = (self.base_volume * self.rng.gen_range(0.5..1.5)).round().max(1.0);

        Bar {
            symbol: self.symbol.clone(),
            datetime,
            open,
            high,
            low,
            close,
            volume,
            turnover: close * volume * 10.0,
            open_interest,
        }
    }
}

fn trading_days(start: NaiveDate, days: usize) -> Vec<NaiveDate> {
    start
        .iter_days()
        .filter(|d| !matches!(d.weekday(), Weekday::Sat | Weekday::Sun))
        .take(days)
        .collect()
}

fn session_minutes(date: NaiveDate) -> Vec<NaiveDateTime> {
    SESSIONS
        .iter()
        .flat_map(|&(hour, minute, length)| {
            let start = date.and_time(NaiveTime::from_hms_opt(hour, minute, 0).unwrap_or_default());
            (0..length).map(move |i| start + Duration::minutes(i64::from(i)))
        })
        .collect()
}
