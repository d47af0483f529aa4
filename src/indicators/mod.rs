// Technical indicators module
// Moving averages, ATR and the rolling statistics the strategies need

pub mod atr;
pub mod moving_average;
pub mod statistics;

pub use atr::{calculate_atr, calculate_atr_series};
pub use moving_average::{calculate_ema, calculate_sma, ema_series, sma_series, wma_series};
pub use statistics::{cumulative_sum, highest, lowest, mean, pearson_correlation, std_dev};
