use chrono::{NaiveTime, Timelike};

use crate::models::Bar;

/// Aggregates one-minute bars into N-minute window bars
///
/// A window closes on the minute bar whose `(minute + 1)` is a multiple of
/// the window, so a 5-minute window emits on minutes 4, 9, 14, ...
#[derive(Debug, Clone)]
pub struct BarGenerator {
    window: u32,
    window_bar: Option<Bar>,
}

impl BarGenerator {
    pub fn new(window: u32) -> Self {
        Self {
            window: window.max(1),
            window_bar: None,
        }
    }

    pub fn window(&self) -> u32 {
        self.window
    }

    /// Feed a minute bar; returns the window bar when it completes
    pub fn update_bar(&mut self, bar: &Bar) -> Option<Bar> {
        match self.window_bar.as_mut() {
            Some(window_bar) => {
                window_bar.high = window_bar.high.max(bar.high);
                window_bar.low = window_bar.low.min(bar.low);
            }
            None => {
                let mut window_bar = bar.clone();
                window_bar.datetime = bar
                    .datetime
                    .with_second(0)
                    .and_then(|dt| dt.with_nanosecond(0))
                    .unwrap_or(bar.datetime);
                window_bar.volume = 0.0;
                window_bar.turnover = 0.0;
                self.window_bar = Some(window_bar);
            }
        }

        if let Some(window_bar) = self.window_bar.as_mut() {
            accumulate(window_bar, bar);
        }

        if (bar.datetime.minute() + 1) % self.window == 0 {
            return self.window_bar.take();
        }

        None
    }
}

/// Aggregates one-minute bars into daily bars, then into N-day bars
///
/// A daily bar is stamped at midnight of its date and completes when the
/// first minute bar of another date arrives.
#[derive(Debug, Clone)]
pub struct DailyBarGenerator {
    window: u32,
    interval_count: u32,
    daily_bar: Option<Bar>,
    window_bar: Option<Bar>,
}

impl DailyBarGenerator {
    pub fn new(window: u32) -> Self {
        Self {
            window: window.max(1),
            interval_count: 0,
            daily_bar: None,
            window_bar: None,
        }
    }

    pub fn window(&self) -> u32 {
        self.window
    }

    /// Feed a minute bar; returns an N-day bar when one completes
    pub fn update_bar(&mut self, bar: &Bar) -> Option<Bar> {
        let Some(daily_bar) = self.daily_bar.as_mut() else {
            self.daily_bar = Some(start_daily_bar(bar));
            return None;
        };

        if bar.date() != daily_bar.date() {
            let finished = std::mem::replace(daily_bar, start_daily_bar(bar));
            return self.on_daily_bar(finished);
        }

        daily_bar.high = daily_bar.high.max(bar.high);
        daily_bar.low = daily_bar.low.min(bar.low);
        accumulate(daily_bar, bar);

        None
    }

    fn on_daily_bar(&mut self, bar: Bar) -> Option<Bar> {
        if self.window == 1 {
            return Some(bar);
        }

        match self.window_bar.as_mut() {
            Some(window_bar) => {
                window_bar.high = window_bar.high.max(bar.high);
                window_bar.low = window_bar.low.min(bar.low);
            }
            None => {
                let mut window_bar = bar.clone();
                window_bar.volume = 0.0;
                window_bar.turnover = 0.0;
                self.window_bar = Some(window_bar);
            }
        }

        if let Some(window_bar) = self.window_bar.as_mut() {
            accumulate(window_bar, &bar);
        }

        self.interval_count += 1;
        if self.interval_count % self.window == 0 {
            self.interval_count = 0;
            return self.window_bar.take();
        }

        None
    }
}

fn start_daily_bar(bar: &Bar) -> Bar {
    let mut daily_bar = bar.clone();
    daily_bar.datetime = bar.date().and_time(NaiveTime::MIN);
    daily_bar
}

fn accumulate(target: &mut Bar, bar: &Bar) {
    target.close = bar.close;
    target.volume += bar.volume;
    target.turnover += bar.turnover;
    target.open_interest = bar.open_interest;
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, NaiveDate, NaiveDateTime};

    fn start() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 1, 2)
            .unwrap()
            .and_hms_opt(9, 0, 0)
            .unwrap()
    }

    fn minute_bar(datetime: NaiveDateTime, close: f64) -> Bar {
        Bar {
            symbol: "RB888.SHFE".to_string(),
            datetime,
            open: close,
            high: close + 1.0,
            low: close - 1.0,
            close,
            volume: 10.0,
            turnover: close * 10.0,
            open_interest: 1000.0 + close,
        }
    }

    #[test]
    fn test_five_minute_window() {
        let mut generator = BarGenerator::new(5);
        let mut finished = Vec::new();

        for i in 0..10 {
            let bar = minute_bar(start() + Duration::minutes(i), 100.0 + i as f64);
            if let Some(window_bar) = generator.update_bar(&bar) {
                finished.push(window_bar);
            }
        }

        assert_eq!(finished.len(), 2);

        let first = &finished[0];
        assert_eq!(first.datetime, start());
        assert_eq!(first.open, 100.0);
        assert_eq!(first.high, 105.0);
        assert_eq!(first.low, 99.0);
        assert_eq!(first.close, 104.0);
        assert_eq!(first.volume, 50.0);
        assert_eq!(first.open_interest, 1104.0);

        assert_eq!(finished[1].datetime, start() + Duration::minutes(5));
        assert_eq!(finished[1].open, 105.0);
    }

    #[test]
    fn test_one_minute_window_passes_through() {
        let mut generator = BarGenerator::new(1);
        let bar = minute_bar(start(), 100.0);

        let out = generator.update_bar(&bar).unwrap();
        assert_eq!(out, bar);
    }

    #[test]
    fn test_daily_bar_emitted_on_new_day() {
        let mut generator = DailyBarGenerator::new(1);

        assert!(generator.update_bar(&minute_bar(start(), 100.0)).is_none());
        assert!(generator
            .update_bar(&minute_bar(start() + Duration::minutes(1), 103.0))
            .is_none());

        let next_day = start() + Duration::days(1);
        let daily = generator.update_bar(&minute_bar(next_day, 90.0)).unwrap();

        assert_eq!(daily.datetime, start().date().and_time(NaiveTime::MIN));
        assert_eq!(daily.open, 100.0);
        assert_eq!(daily.high, 104.0);
        assert_eq!(daily.low, 99.0);
        assert_eq!(daily.close, 103.0);
        assert_eq!(daily.volume, 20.0);
    }

    #[test]
    fn test_multi_day_window() {
        let mut generator = DailyBarGenerator::new(2);
        let mut finished = Vec::new();

        for day in 0..5 {
            let bar = minute_bar(start() + Duration::days(day), 100.0 + day as f64);
            if let Some(window_bar) = generator.update_bar(&bar) {
                finished.push(window_bar);
            }
        }

        // Days 0..=3 complete; two 2-day bars
        assert_eq!(finished.len(), 2);
        assert_eq!(finished[0].open, 100.0);
        assert_eq!(finished[0].close, 101.0);
        assert_eq!(finished[0].volume, 20.0);
        assert_eq!(finished[1].open, 102.0);
        assert_eq!(finished[1].high, 104.0);
    }
}
