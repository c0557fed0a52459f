use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Ticker snapshot for one pair
///
/// Always re-fetched at the point of a decision, never cached.
#[derive(Debug, Clone, PartialEq)]
pub struct Quote {
    pub last: Decimal,
    pub best_bid: Decimal,
    pub best_ask: Decimal,
}

/// OHLCV candlestick
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Candle {
    pub timestamp: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum OrderSide {
    Buy,
    Sell,
}

impl OrderSide {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderSide::Buy => "buy",
            OrderSide::Sell => "sell",
        }
    }
}

impl fmt::Display for OrderSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Order type; types this crate never places (e.g. `take_profit`) are kept verbatim
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OrderType {
    Limit,
    Market,
    Stop,
    StopLimit,
    Other(String),
}

impl OrderType {
    pub fn as_str(&self) -> &str {
        match self {
            OrderType::Limit => "limit",
            OrderType::Market => "market",
            OrderType::Stop => "stop",
            OrderType::StopLimit => "stop_limit",
            OrderType::Other(raw) => raw,
        }
    }
}

impl From<&str> for OrderType {
    fn from(raw: &str) -> Self {
        match raw {
            "limit" => OrderType::Limit,
            "market" => OrderType::Market,
            "stop" => OrderType::Stop,
            "stop_limit" => OrderType::StopLimit,
            other => OrderType::Other(other.to_string()),
        }
    }
}

/// Order status as reported by the exchange
///
/// Unknown statuses are kept verbatim and treated as still open.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OrderStatus {
    Unfilled,
    PartiallyFilled,
    FullyFilled,
    CanceledUnfilled,
    CanceledPartiallyFilled,
    Other(String),
}

impl OrderStatus {
    /// Terminal means no further polling: filled, or cancelled before any fill.
    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::FullyFilled | OrderStatus::CanceledUnfilled)
    }

    pub fn as_str(&self) -> &str {
        match self {
            OrderStatus::Unfilled => "UNFILLED",
            OrderStatus::PartiallyFilled => "PARTIALLY_FILLED",
            OrderStatus::FullyFilled => "FULLY_FILLED",
            OrderStatus::CanceledUnfilled => "CANCELED_UNFILLED",
            OrderStatus::CanceledPartiallyFilled => "CANCELED_PARTIALLY_FILLED",
            OrderStatus::Other(raw) => raw,
        }
    }
}

impl From<&str> for OrderStatus {
    fn from(raw: &str) -> Self {
        match raw {
            "UNFILLED" => OrderStatus::Unfilled,
            "PARTIALLY_FILLED" => OrderStatus::PartiallyFilled,
            "FULLY_FILLED" => OrderStatus::FullyFilled,
            "CANCELED_UNFILLED" => OrderStatus::CanceledUnfilled,
            "CANCELED_PARTIALLY_FILLED" => OrderStatus::CanceledPartiallyFilled,
            other => OrderStatus::Other(other.to_string()),
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Order snapshot returned by the exchange
///
/// Never mutated locally; every poll replaces the previous snapshot.
#[derive(Debug, Clone, PartialEq)]
pub struct Order {
    pub pair: String,
    pub order_id: u64,
    pub side: OrderSide,
    pub order_type: OrderType,
    pub status: OrderStatus,
    pub price: Option<Decimal>, // None for market orders
    pub average_price: Option<Decimal>,
    pub start_amount: Decimal,
    pub remaining_amount: Decimal,
    pub executed_amount: Decimal,
}

impl Order {
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Price used for P&L: the limit price, or the average fill for market orders.
    pub fn fill_price(&self) -> Option<Decimal> {
        self.price
            .or_else(|| self.average_price.filter(|p| !p.is_zero()))
    }
}

/// Parameters for a new order
#[derive(Debug, Clone, PartialEq)]
pub struct OrderRequest {
    pub pair: String,
    pub side: OrderSide,
    pub order_type: OrderType,
    pub amount: Decimal,
    pub price: Option<Decimal>,
}

impl OrderRequest {
    pub fn limit(pair: &str, side: OrderSide, price: Decimal, amount: Decimal) -> Self {
        Self {
            pair: pair.to_string(),
            side,
            order_type: OrderType::Limit,
            amount,
            price: Some(price),
        }
    }

    pub fn market(pair: &str, side: OrderSide, amount: Decimal) -> Self {
        Self {
            pair: pair.to_string(),
            side,
            order_type: OrderType::Market,
            amount,
            price: None,
        }
    }
}

/// LINE sticker attached to a notification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Sticker {
    pub package_id: u32,
    pub sticker_id: u32,
}

impl Sticker {
    pub const ORDER_FILLED: Sticker = Sticker::new(1, 10);
    pub const STOP_LOSS: Sticker = Sticker::new(1, 104);
    pub const ORDER_MISMATCH: Sticker = Sticker::new(1, 422);
    pub const RUN_COMPLETE: Sticker = Sticker::new(2, 516);
    pub const INTERRUPTED: Sticker = Sticker::new(1, 3);
    pub const SYSTEM_ERROR: Sticker = Sticker::new(1, 17);
    pub const RSI_ALERT: Sticker = Sticker::new(2, 514);

    pub const fn new(package_id: u32, sticker_id: u32) -> Self {
        Self {
            package_id,
            sticker_id,
        }
    }
}

/// How the sell phase of a cycle ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleExit {
    Filled,
    StopLoss,
}

/// One completed buy→sell cycle
#[derive(Debug, Clone)]
pub struct CycleResult {
    pub buy: Order,
    pub sell: Order,
    pub exit: CycleExit,
}

impl CycleResult {
    /// Amount actually sold; market orders that report no execution yet fall back to the requested amount
    pub fn amount(&self) -> Decimal {
        if self.sell.executed_amount.is_zero() && self.sell.order_type == OrderType::Market {
            self.sell.start_amount
        } else {
            self.sell.executed_amount
        }
    }

    /// Realized P&L: `(sell_price - buy_price) * amount`
    ///
    /// The baseline is always the buy order, including for stop-loss exits.
    pub fn profit(&self) -> Option<Decimal> {
        let buy_price = self.buy.fill_price()?;
        let sell_price = self.sell.fill_price()?;
        Some((sell_price - buy_price) * self.amount())
    }
}
