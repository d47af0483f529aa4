use std::collections::{BTreeMap, VecDeque};

use chrono::NaiveDateTime;
use uuid::Uuid;

use crate::execution::context::{PortfolioContext, StrategyContext};
use crate::models::{Bar, Direction, Offset, OrderRequest, StopOrder, StopOrderStatus, TradeData};

/// Order log and position book shared by the paper contexts
///
/// Limit orders fill immediately at their own price. Stop orders wait until
/// [`PaperBook::check_stop_orders`] sees a bar cross them. Nothing else is
/// simulated: no queue position, partial fills, fees or slippage.
#[derive(Debug, Default)]
pub struct PaperBook {
    trading: bool,
    datetime: Option<NaiveDateTime>,
    positions: BTreeMap<String, i64>,
    orders: Vec<OrderRequest>,
    trades: Vec<TradeData>,
    waiting_stops: Vec<StopOrder>,
    pending_trades: VecDeque<TradeData>,
    pending_stop_updates: VecDeque<StopOrder>,
    load_days: Option<u32>,
    events: usize,
    last_variables: serde_json::Value,
}

impl PaperBook {
    pub fn new() -> Self {
        Self::default()
    }

    /// Orders are rejected until trading is switched on
    pub fn set_trading(&mut self, trading: bool) {
        self.trading = trading;
    }

    pub fn trading(&self) -> bool {
        self.trading
    }

    /// Timestamp stamped onto orders and fills
    pub fn set_datetime(&mut self, datetime: NaiveDateTime) {
        self.datetime = Some(datetime);
    }

    pub fn pos(&self, symbol: &str) -> i64 {
        self.positions.get(symbol).copied().unwrap_or(0)
    }

    pub fn positions(&self) -> &BTreeMap<String, i64> {
        &self.positions
    }

    pub fn orders(&self) -> &[OrderRequest] {
        &self.orders
    }

    pub fn trades(&self) -> &[TradeData] {
        &self.trades
    }

    pub fn waiting_stop_orders(&self) -> &[StopOrder] {
        &self.waiting_stops
    }

    pub fn load_days(&self) -> Option<u32> {
        self.load_days
    }

    pub fn events(&self) -> usize {
        self.events
    }

    pub fn last_variables(&self) -> &serde_json::Value {
        &self.last_variables
    }

    /// Fills produced since the last call
    pub fn take_trades(&mut self) -> Vec<TradeData> {
        self.pending_trades.drain(..).collect()
    }

    /// Stop-order status changes produced since the last call
    pub fn take_stop_order_updates(&mut self) -> Vec<StopOrder> {
        self.pending_stop_updates.drain(..).collect()
    }

    pub fn send_order(
        &mut self,
        symbol: &str,
        direction: Direction,
        offset: Offset,
        price: f64,
        volume: i64,
        stop: bool,
    ) -> Vec<String> {
        if !self.trading {
            tracing::debug!(symbol, ?direction, ?offset, "order rejected: not trading");
            return Vec::new();
        }

        if volume <= 0 || !price.is_finite() {
            tracing::warn!(symbol, price, volume, "order rejected: invalid price or volume");
            return Vec::new();
        }

        let order_id = Uuid::new_v4().to_string();
        self.orders.push(OrderRequest {
            order_id: order_id.clone(),
            symbol: symbol.to_string(),
            direction,
            offset,
            price,
            volume,
            stop,
            datetime: self.datetime,
        });

        tracing::debug!(
            symbol,
            ?direction,
            ?offset,
            price,
            volume,
            stop,
            "order sent"
        );

        if stop {
            self.waiting_stops.push(StopOrder {
                stop_order_id: order_id.clone(),
                symbol: symbol.to_string(),
                direction,
                offset,
                price,
                volume,
                status: StopOrderStatus::Waiting,
            });
        } else {
            self.fill(&order_id, symbol, direction, offset, price, volume);
        }

        vec![order_id]
    }

    /// Cancel waiting stop orders, optionally only those of one symbol
    pub fn cancel_all(&mut self, symbol: Option<&str>) {
        let (cancelled, kept): (Vec<StopOrder>, Vec<StopOrder>) = self
            .waiting_stops
            .drain(..)
            .partition(|order| symbol.map_or(true, |s| order.symbol == s));
        self.waiting_stops = kept;

        for mut order in cancelled {
            order.status = StopOrderStatus::Cancelled;
            self.pending_stop_updates.push_back(order);
        }
    }

    /// Trigger stop orders crossed by `bar`
    ///
    /// A long stop triggers when the high reaches its price, a short stop when
    /// the low does. The fill price is the worse of the stop price and the open.
    pub fn check_stop_orders(&mut self, bar: &Bar) {
        let (triggered, waiting): (Vec<StopOrder>, Vec<StopOrder>) =
            self.waiting_stops.drain(..).partition(|order| {
                order.symbol == bar.symbol
                    && match order.direction {
                        Direction::Long => bar.high >= order.price,
                        Direction::Short => bar.low <= order.price,
                    }
            });
        self.waiting_stops = waiting;

        for mut order in triggered {
            let price = match order.direction {
                Direction::Long => order.price.max(bar.open),
                Direction::Short => order.price.min(bar.open),
            };

            order.status = StopOrderStatus::Triggered;
            self.fill(
                &order.stop_order_id,
                &order.symbol,
                order.direction,
                order.offset,
                price,
                order.volume,
            );
            self.pending_stop_updates.push_back(order);
        }
    }

    fn fill(
        &mut self,
        order_id: &str,
        symbol: &str,
        direction: Direction,
        offset: Offset,
        price: f64,
        volume: i64,
    ) {
        let trade = TradeData {
            trade_id: Uuid::new_v4().to_string(),
            order_id: order_id.to_string(),
            symbol: symbol.to_string(),
            direction,
            offset,
            price,
            volume,
            datetime: self.datetime,
        };

        *self.positions.entry(symbol.to_string()).or_insert(0) += trade.signed_volume();

        self.trades.push(trade.clone());
        self.pending_trades.push_back(trade);
    }

    fn request_history(&mut self, days: u32) {
        self.load_days = Some(self.load_days.map_or(days, |d| d.max(days)));
    }

    fn record_event(&mut self, variables: serde_json::Value) {
        self.events += 1;
        self.last_variables = variables;
    }
}

/// Paper context for a single-instrument strategy
#[derive(Debug)]
pub struct PaperContext {
    symbol: String,
    book: PaperBook,
}

impl PaperContext {
    pub fn new(symbol: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            book: PaperBook::new(),
        }
    }

    pub fn book(&self) -> &PaperBook {
        &self.book
    }

    pub fn book_mut(&mut self) -> &mut PaperBook {
        &mut self.book
    }
}

impl StrategyContext for PaperContext {
    fn symbol(&self) -> &str {
        &self.symbol
    }

    fn pos(&self) -> i64 {
        self.book.pos(&self.symbol)
    }

    fn send_order(
        &mut self,
        direction: Direction,
        offset: Offset,
        price: f64,
        volume: i64,
        stop: bool,
    ) -> Vec<String> {
        self.book
            .send_order(&self.symbol, direction, offset, price, volume, stop)
    }

    fn cancel_all(&mut self) {
        self.book.cancel_all(Some(&self.symbol));
    }

    fn load_bar(&mut self, days: u32) {
        self.book.request_history(days);
    }

    fn put_event(&mut self, variables: serde_json::Value) {
        self.book.record_event(variables);
    }
}

/// Paper context for a portfolio strategy
#[derive(Debug)]
pub struct PaperPortfolioContext {
    symbols: Vec<String>,
    book: PaperBook,
}

impl PaperPortfolioContext {
    pub fn new(symbols: Vec<String>) -> Self {
        Self {
            symbols,
            book: PaperBook::new(),
        }
    }

    pub fn book(&self) -> &PaperBook {
        &self.book
    }

    pub fn book_mut(&mut self) -> &mut PaperBook {
        &mut self.book
    }
}

impl PortfolioContext for PaperPortfolioContext {
    fn symbols(&self) -> Vec<String> {
        self.symbols.clone()
    }

    fn pos(&self, symbol: &str) -> i64 {
        self.book.pos(symbol)
    }

    fn send_order(
        &mut self,
        symbol: &str,
        direction: Direction,
        offset: Offset,
        price: f64,
        volume: i64,
    ) -> Vec<String> {
        self.book
            .send_order(symbol, direction, offset, price, volume, false)
    }

    fn cancel_all(&mut self) {
        self.book.cancel_all(None);
    }

    fn load_bars(&mut self, days: u32) {
        self.book.request_history(days);
    }

    fn put_event(&mut self, variables: serde_json::Value) {
        self.book.record_event(variables);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn trading_context() -> PaperContext {
        let mut ctx = PaperContext::new("RB888.SHFE");
        ctx.book_mut().set_trading(true);
        ctx
    }

    fn bar(open: f64, high: f64, low: f64) -> Bar {
        Bar {
            symbol: "RB888.SHFE".to_string(),
            datetime: NaiveDate::from_ymd_opt(2024, 1, 2)
                .unwrap()
                .and_hms_opt(9, 30, 0)
                .unwrap(),
            open,
            high,
            low,
            close: open,
            volume: 100.0,
            turnover: 0.0,
            open_interest: 0.0,
        }
    }

    #[test]
    fn test_orders_rejected_before_trading() {
        let mut ctx = PaperContext::new("RB888.SHFE");

        let ids = ctx.buy(3500.0, 1, false);
        assert!(ids.is_empty());
        assert_eq!(ctx.pos(), 0);
        assert!(ctx.book().orders().is_empty());
    }

    #[test]
    fn test_limit_orders_fill_immediately() {
        let mut ctx = trading_context();

        ctx.short(3500.0, 2, false);
        assert_eq!(ctx.pos(), -2);

        ctx.cover(3510.0, 2, false);
        ctx.buy(3510.0, 1, false);
        assert_eq!(ctx.pos(), 1);

        let trades = ctx.book_mut().take_trades();
        assert_eq!(trades.len(), 3);
        assert!(ctx.book_mut().take_trades().is_empty());
        assert_eq!(ctx.book().trades().len(), 3);
    }

    #[test]
    fn test_invalid_volume_rejected() {
        let mut ctx = trading_context();
        assert!(ctx.buy(3500.0, 0, false).is_empty());
        assert!(ctx.buy(f64::NAN, 1, false).is_empty());
    }

    #[test]
    fn test_stop_order_triggers_on_cross() {
        let mut ctx = trading_context();
        ctx.buy(3520.0, 1, true);
        ctx.short(3480.0, 1, true);
        assert_eq!(ctx.pos(), 0);
        assert_eq!(ctx.book().waiting_stop_orders().len(), 2);

        // Neither level reached
        ctx.book_mut().check_stop_orders(&bar(3500.0, 3510.0, 3490.0));
        assert_eq!(ctx.pos(), 0);

        // Gap above the buy stop fills at the open
        ctx.book_mut().check_stop_orders(&bar(3530.0, 3535.0, 3525.0));
        assert_eq!(ctx.pos(), 1);

        let trades = ctx.book_mut().take_trades();
        assert_eq!(trades.len(), 1);
        assert_eq!(trades[0].price, 3530.0);

        let updates = ctx.book_mut().take_stop_order_updates();
        assert_eq!(updates.len(), 1);
        assert_eq!(updates[0].status, StopOrderStatus::Triggered);
    }

    #[test]
    fn test_cancel_all_cancels_waiting_stops() {
        let mut ctx = trading_context();
        ctx.buy(3520.0, 1, true);

        ctx.cancel_all();

        assert!(ctx.book().waiting_stop_orders().is_empty());
        let updates = ctx.book_mut().take_stop_order_updates();
        assert_eq!(updates[0].status, StopOrderStatus::Cancelled);
    }

    #[test]
    fn test_load_bar_keeps_longest_request() {
        let mut ctx = PaperContext::new("RB888.SHFE");
        ctx.load_bar(10);
        ctx.load_bar(5);
        assert_eq!(ctx.book().load_days(), Some(10));
    }

    #[test]
    fn test_portfolio_positions_per_symbol() {
        let mut ctx = PaperPortfolioContext::new(vec!["A".to_string(), "B".to_string()]);
        ctx.book_mut().set_trading(true);

        ctx.buy("A", 10.0, 3);
        ctx.short("B", 20.0, 2);

        assert_eq!(ctx.pos("A"), 3);
        assert_eq!(ctx.pos("B"), -2);
        assert_eq!(ctx.pos("C"), 0);
    }
}
