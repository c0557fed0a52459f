// Technical indicators module
// RSI drives buy timing; RCI is reported alongside RSI alerts

pub mod rci;
pub mod rsi;
pub mod source;

pub use rci::calculate_rci;
pub use rsi::calculate_rsi;
pub use source::CandleIndicators;

use crate::Result;
use async_trait::async_trait;

/// Indicator values for a pair at a candle interval (e.g. "1min", "1hour")
#[async_trait]
pub trait IndicatorSource: Send + Sync {
    async fn rsi(&self, pair: &str, interval: &str, period: usize) -> Result<f64>;
    async fn rci(&self, pair: &str, interval: &str, period: usize) -> Result<f64>;
}
