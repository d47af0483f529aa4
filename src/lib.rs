// Core modules
pub mod config;
pub mod error;
pub mod execution;
pub mod indicators;
pub mod models;
pub mod portfolio;
pub mod replay;
pub mod strategy;

// Re-export commonly used types
pub use error::StrategyError;
pub use models::*;
pub use portfolio::PortfolioStrategy;
pub use strategy::{CtaStrategy, SignalWindow};

// Error handling
pub type Result<T> = std::result::Result<T, StrategyError>;
