pub mod bitbank;
pub mod line;

pub use bitbank::BitbankClient;
pub use line::LineNotifier;

use crate::models::{Candle, Order, OrderRequest, Quote, Sticker};
use crate::Result;
use async_trait::async_trait;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use std::collections::BTreeMap;

/// Current ticker for a pair
#[async_trait]
pub trait MarketData: Send + Sync {
    async fn quote(&self, pair: &str) -> Result<Quote>;
}

/// Candlestick history, one exchange "day page" at a time
#[async_trait]
pub trait CandleSource: Send + Sync {
    async fn candles(&self, pair: &str, interval: &str, date: NaiveDate) -> Result<Vec<Candle>>;
}

/// Order placement and account queries
#[async_trait]
pub trait Exchange: MarketData {
    async fn place_order(&self, request: &OrderRequest) -> Result<Order>;
    async fn get_order(&self, pair: &str, order_id: u64) -> Result<Order>;
    async fn cancel_order(&self, pair: &str, order_id: u64) -> Result<Order>;
    async fn balances(&self) -> Result<BTreeMap<String, Decimal>>;
    async fn active_orders(&self, pair: &str) -> Result<Vec<Order>>;
}

/// Outbound chat message
///
/// Fire-and-forget: implementations log delivery failures and never return them.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, message: &str, sticker: Option<Sticker>);
}
