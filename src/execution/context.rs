use crate::models::{Direction, Offset};

/// Services a host provides to a single-instrument strategy
///
/// Strategies never route orders or track fills themselves; they ask the
/// context. Every order method returns the ids the host assigned, which is
/// empty when the request was rejected (for example during warm-up).
pub trait StrategyContext {
    /// Instrument the strategy trades
    fn symbol(&self) -> &str;

    /// Current net position in contracts (positive = long)
    fn pos(&self) -> i64;

    fn send_order(
        &mut self,
        direction: Direction,
        offset: Offset,
        price: f64,
        volume: i64,
        stop: bool,
    ) -> Vec<String>;

    /// Cancel every working order of this strategy
    fn cancel_all(&mut self);

    /// Ask the host to replay `days` of history before trading starts
    fn load_bar(&mut self, days: u32);

    /// Publish a snapshot of the strategy's variables
    fn put_event(&mut self, variables: serde_json::Value);

    fn write_log(&mut self, msg: &str) {
        tracing::info!(symbol = %self.symbol(), "{}", msg);
    }

    fn buy(&mut self, price: f64, volume: i64, stop: bool) -> Vec<String> {
        self.send_order(Direction::Long, Offset::Open, price, volume, stop)
    }

    fn sell(&mut self, price: f64, volume: i64, stop: bool) -> Vec<String> {
        self.send_order(Direction::Short, Offset::Close, price, volume, stop)
    }

    fn short(&mut self, price: f64, volume: i64, stop: bool) -> Vec<String> {
        self.send_order(Direction::Short, Offset::Open, price, volume, stop)
    }

    fn cover(&mut self, price: f64, volume: i64, stop: bool) -> Vec<String> {
        self.send_order(Direction::Long, Offset::Close, price, volume, stop)
    }
}

/// Services a host provides to a multi-instrument strategy
pub trait PortfolioContext {
    fn symbols(&self) -> Vec<String>;

    fn pos(&self, symbol: &str) -> i64;

    fn send_order(
        &mut self,
        symbol: &str,
        direction: Direction,
        offset: Offset,
        price: f64,
        volume: i64,
    ) -> Vec<String>;

    fn cancel_all(&mut self);

    fn load_bars(&mut self, days: u32);

    fn put_event(&mut self, variables: serde_json::Value);

    fn write_log(&mut self, msg: &str) {
        tracing::info!("{}", msg);
    }

    fn buy(&mut self, symbol: &str, price: f64, volume: i64) -> Vec<String> {
        self.send_order(symbol, Direction::Long, Offset::Open, price, volume)
    }

    fn sell(&mut self, symbol: &str, price: f64, volume: i64) -> Vec<String> {
        self.send_order(symbol, Direction::Short, Offset::Close, price, volume)
    }

    fn short(&mut self, symbol: &str, price: f64, volume: i64) -> Vec<String> {
        self.send_order(symbol, Direction::Short, Offset::Open, price, volume)
    }

    fn cover(&mut self, symbol: &str, price: f64, volume: i64) -> Vec<String> {
        self.send_order(symbol, Direction::Long, Offset::Close, price, volume)
    }
}
