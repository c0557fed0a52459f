// Core modules
pub mod api;
pub mod config;
pub mod error;
pub mod execution;
pub mod indicators;
pub mod models;
pub mod risk;

// Re-export commonly used types
pub use api::{BitbankClient, CandleSource, Exchange, LineNotifier, MarketData, Notifier};
pub use config::{Credentials, Settings, TradingConfig, WatchConfig};
pub use error::{ApiError, ConfigError, TradeError};
pub use models::*;

// Error handling
pub type Result<T> = anyhow::Result<T>;
