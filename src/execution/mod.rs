// Execution module
// Bar history, bar aggregation and the contexts strategies trade through

pub mod bar_generator;
pub mod bar_series;
pub mod context;
pub mod paper;

pub use bar_generator::{BarGenerator, DailyBarGenerator};
pub use bar_series::{tail_window, BarSeries};
pub use context::{PortfolioContext, StrategyContext};
pub use paper::{PaperBook, PaperContext, PaperPortfolioContext};
