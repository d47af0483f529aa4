// Replay module
// Drives strategies offline over recorded or synthetic minute bars

pub mod csv_io;
pub mod runner;
pub mod synthetic;

pub use csv_io::{read_bars, read_bars_from, write_bars, write_bars_to, DATETIME_FORMAT};
pub use runner::{PortfolioReplayReport, PortfolioReplayRunner, ReplayReport, ReplayRunner};
pub use synthetic::{MarketScenario, SyntheticBarGenerator, BARS_PER_DAY};
