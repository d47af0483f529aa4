use serde::{Deserialize, Serialize};
use serde_json::json;

use super::{follow_signal, is_new_day, is_session_close, CtaStrategy};
use crate::error::StrategyError;
use crate::execution::{tail_window, BarSeries, StrategyContext};
use crate::indicators::{cumulative_sum, pearson_correlation};
use crate::models::{Bar, Direction};
use crate::Result;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CpvConfig {
    pub price_add: f64,
    pub fixed_size: i64,
    pub array_size: usize, // Must hold more than a full day of minute bars
}

impl Default for CpvConfig {
    fn default() -> Self {
        Self {
            price_add: 5.0,
            fixed_size: 1,
            array_size: 500,
        }
    }
}

impl CpvConfig {
    pub fn validate(&self) -> Result<()> {
        if self.fixed_size < 1 {
            return Err(StrategyError::invalid("fixed_size", "must be at least 1"));
        }
        if self.array_size < 3 {
            return Err(StrategyError::invalid("array_size", "must be at least 3"));
        }
        Ok(())
    }
}

/// Close price / corrected open interest correlation strategy
///
/// At the session close the day's open-interest path is rebuilt by splitting
/// each minute's change into the part explained by volume (T+1 traders) and
/// the rest (T+0 traders). A positive correlation between closes and the
/// corrected open interest goes long, otherwise short.
#[derive(Debug)]
pub struct CpvStrategy {
    name: String,
    config: CpvConfig,
    series: BarSeries,
    last_bar: Option<Bar>,
    count: usize,
    pv: f64,
}

impl CpvStrategy {
    pub fn new(name: impl Into<String>, config: CpvConfig) -> Result<Self> {
        config.validate()?;

        Ok(Self {
            name: name.into(),
            series: BarSeries::new(config.array_size),
            last_bar: None,
            count: 0,
            pv: 0.0,
            config,
        })
    }

    pub fn pv(&self) -> f64 {
        self.pv
    }

    /// Correlation of the day's closes with the corrected open interest
    ///
    /// None when the day has zero-volume bars, no net volume change, or the
    /// correlation is undefined.
    fn correlation(&self) -> Option<f64> {
        // One extra bar is needed for the previous-bar differences
        let count = self.count.min(self.series.size() - 1);

        let volume = self.series.volume();
        let vt = tail_window(volume, count, 0);
        if vt.iter().any(|&v| v == 0.0) {
            return None;
        }
        let pre_vt = tail_window(volume, count + 1, 1);
        let vt_change: Vec<f64> = vt.iter().zip(pre_vt).map(|(v, p)| v - p).collect();

        let open_interest = self.series.open_interest();
        let oi = tail_window(open_interest, count, 0);
        let pre_oi = tail_window(open_interest, count + 1, 1);

        let delta_oi = oi.last()? - oi.first()?;
        let delta_vt: f64 = vt_change.iter().skip(1).sum();
        if delta_vt == 0.0 {
            return None;
        }

        let mut mod_delta_oi: Vec<f64> = vt_change
            .iter()
            .zip(oi.iter().zip(pre_oi))
            .map(|(change, (o, p))| {
                let oi_t1 = change * delta_oi / delta_vt;
                let oi_t0 = -((o - p) - oi_t1);
                oi_t0 + oi_t1
            })
            .collect();
        mod_delta_oi[0] = oi[0];
        let mod_oi = cumulative_sum(&mod_delta_oi);

        let close = tail_window(self.series.close(), count, 0);
        pearson_correlation(close, &mod_oi)
    }
}

impl CtaStrategy for CpvStrategy {
    fn name(&self) -> &str {
        &self.name
    }

    fn class_name(&self) -> &'static str {
        "CpvStrategy"
    }

    fn on_bar(&mut self, bar: &Bar, ctx: &mut dyn StrategyContext) -> Result<()> {
        self.series.update_bar(bar);
        if !self.series.inited() {
            return Ok(());
        }

        if is_new_day(self.last_bar.as_ref(), bar) {
            self.last_bar = Some(bar.clone());
            self.count = 1;
            return Ok(());
        }

        self.count += 1;

        if is_session_close(bar) {
            let Some(pv) = self.correlation() else {
                tracing::debug!(strategy = %self.name, count = self.count, "correlation undefined, skipping");
                return Ok(());
            };
            self.pv = pv;

            let direction = if pv > 0.0 {
                Direction::Long
            } else {
                Direction::Short
            };
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

    fn variables(&self) -> serde_json::Value {
        json!({ "pv": self.pv, "count": self.count })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::execution::PaperContext;
    use crate::strategy::test_support::create_test_bar;
    use chrono::{Duration, NaiveDate};

    fn create_test_strategy() -> CpvStrategy {
        let config = CpvConfig {
            array_size: 10,
            ..Default::default()
        };
        CpvStrategy::new("cpv", config).unwrap()
    }

    fn trading_context() -> PaperContext {
        let mut ctx = PaperContext::new("RB888.SHFE");
        ctx.book_mut().set_trading(true);
        ctx
    }

    /// Bars from 14:50 to 14:59 on `day`, closes and open interest moving together
    fn closing_session(day: u32, oi_step: f64) -> Vec<Bar> {
        let start = NaiveDate::from_ymd_opt(2024, 1, day)
            .unwrap()
            .and_hms_opt(14, 50, 0)
            .unwrap();

        (0..10)
            .map(|i| {
                let mut bar = create_test_bar(start + Duration::minutes(i), 100.0 + i as f64);
                bar.volume = 100.0 + (i * i) as f64;
                bar.open_interest = 10_000.0 + oi_step * i as f64;
                bar
            })
            .collect()
    }

    #[test]
    fn test_signal_at_session_close() {
        let mut strategy = create_test_strategy();
        let mut ctx = trading_context();

        for bar in closing_session(2, 10.0) {
            strategy.on_bar(&bar, &mut ctx).unwrap();
        }
        assert!(ctx.book().orders().is_empty());

        for bar in closing_session(3, 10.0) {
            strategy.on_bar(&bar, &mut ctx).unwrap();
        }

        assert_eq!(strategy.count, 10);
        assert_ne!(ctx.pos(), 0);
        assert!(strategy.pv().is_finite());
        let expected = if strategy.pv() > 0.0 { 1 } else { -1 };
        assert_eq!(ctx.pos(), expected);
    }

    #[test]
    fn test_zero_volume_skips_day() {
        let mut strategy = create_test_strategy();
        let mut ctx = trading_context();

        for bar in closing_session(2, 10.0) {
            strategy.on_bar(&bar, &mut ctx).unwrap();
        }

        let mut day = closing_session(3, 10.0);
        day[4].volume = 0.0;
        for bar in day {
            strategy.on_bar(&bar, &mut ctx).unwrap();
        }

        assert!(ctx.book().orders().is_empty());
    }

    #[test]
    fn test_flat_volume_skips_day() {
        let mut strategy = create_test_strategy();
        let mut ctx = trading_context();

        for bar in closing_session(2, 10.0) {
            strategy.on_bar(&bar, &mut ctx).unwrap();
        }

        let mut day = closing_session(3, 10.0);
        for bar in day.iter_mut() {
            bar.volume = 100.0;
        }
        for bar in day {
            strategy.on_bar(&bar, &mut ctx).unwrap();
        }

        assert!(ctx.book().orders().is_empty());
        assert_eq!(strategy.pv(), 0.0);
    }
}
