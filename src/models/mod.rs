use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

/// OHLCV bar with open interest, stamped in exchange local time
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Bar {
    pub symbol: String,
    pub datetime: NaiveDateTime,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
    pub turnover: f64,
    pub open_interest: f64,
}

impl Bar {
    /// Trading date of the bar (calendar date of its timestamp)
    pub fn date(&self) -> NaiveDate {
        self.datetime.date()
    }
}

/// Order side
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum Direction {
    Long,
    Short,
}

impl Direction {
    /// Signed unit used by breakout counters: +1 for long, -1 for short
    pub fn sign(self) -> i64 {
        match self {
            Direction::Long => 1,
            Direction::Short => -1,
        }
    }

    pub fn opposite(self) -> Self {
        match self {
            Direction::Long => Direction::Short,
            Direction::Short => Direction::Long,
        }
    }
}

/// Whether an order opens or closes exposure
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum Offset {
    Open,
    Close,
}

/// Order request as sent by a strategy
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OrderRequest {
    pub order_id: String,
    pub symbol: String,
    pub direction: Direction,
    pub offset: Offset,
    pub price: f64,
    pub volume: i64,
    pub stop: bool,
    pub datetime: Option<NaiveDateTime>,
}

/// Fill reported back to a strategy
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TradeData {
    pub trade_id: String,
    pub order_id: String,
    pub symbol: String,
    pub direction: Direction,
    pub offset: Offset,
    pub price: f64,
    pub volume: i64,
    pub datetime: Option<NaiveDateTime>,
}

impl TradeData {
    /// Position change caused by this fill
    pub fn signed_volume(&self) -> i64 {
        self.direction.sign() * self.volume
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum StopOrderStatus {
    Waiting,
    Triggered,
    Cancelled,
}

/// Locally held stop order
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StopOrder {
    pub stop_order_id: String,
    pub symbol: String,
    pub direction: Direction,
    pub offset: Offset,
    pub price: f64,
    pub volume: i64,
    pub status: StopOrderStatus,
}

/// Directional verdict of a signal accumulator
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum Decision {
    Long,
    Short,
    Neutral,
}

/// The four ways a strategy reacts to a directional signal
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum OrderAction {
    OpenLong,
    FlipToLong,
    OpenShort,
    FlipToShort,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_direction_sign() {
        assert_eq!(Direction::Long.sign(), 1);
        assert_eq!(Direction::Short.sign(), -1);
        assert_eq!(Direction::Long.opposite(), Direction::Short);
    }

    #[test]
    fn test_trade_signed_volume() {
        let trade = TradeData {
            trade_id: "t1".to_string(),
            order_id: "o1".to_string(),
            symbol: "RB888.SHFE".to_string(),
            direction: Direction::Short,
            offset: Offset::Open,
            price: 3500.0,
            volume: 3,
            datetime: None,
        };

        assert_eq!(trade.signed_volume(), -3);
    }
}
