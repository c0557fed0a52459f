#![allow(dead_code)]

use async_trait::async_trait;
use autotrader::api::{Exchange, MarketData, Notifier};
use autotrader::config::TradingConfig;
use autotrader::indicators::IndicatorSource;
use autotrader::models::{Order, OrderRequest, OrderStatus, OrderType, Quote, Sticker};
use rust_decimal::Decimal;
use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::str::FromStr;
use std::sync::Mutex;

pub fn d(value: &str) -> Decimal {
    Decimal::from_str(value).unwrap()
}

pub fn quote(last: &str, bid: &str, ask: &str) -> Quote {
    Quote {
        last: d(last),
        best_bid: d(bid),
        best_ask: d(ask),
    }
}

/// Zero-delay config with a poll cap so a broken script cannot hang a test
pub fn fast_config() -> TradingConfig {
    TradingConfig {
        cycles: 1,
        signal_poll_ms: 0,
        buy_poll_ms: 0,
        sell_poll_ms: 0,
        cycle_interval_secs: 0,
        max_polls: Some(50),
        ..Default::default()
    }
}

/// Pops the next scripted value; the last one repeats forever
fn next_scripted<T: Clone>(queue: &mut VecDeque<T>) -> Option<T> {
    if queue.len() > 1 {
        queue.pop_front()
    } else {
        queue.front().cloned()
    }
}

struct Tracked {
    order: Order,
    script: VecDeque<OrderStatus>,
}

#[derive(Default)]
struct ExchangeState {
    quotes: VecDeque<Quote>,
    last_quote: Option<Quote>,
    limit_scripts: VecDeque<Vec<OrderStatus>>,
    orders: HashMap<u64, Tracked>,
    next_id: u64,
    placed: Vec<OrderRequest>,
    cancelled: Vec<u64>,
    fill_on_cancel: HashSet<u64>,
    active: Vec<Order>,
    balances: BTreeMap<String, Decimal>,
}

/// Scripted exchange
///
/// Limit orders take their status scripts in placement order; each
/// `get_order` advances the script by one. Market orders fill at once at the
/// most recent quote's last price.
#[derive(Default)]
pub struct FakeExchange {
    state: Mutex<ExchangeState>,
}

impl FakeExchange {
    pub fn new(quotes: Vec<Quote>, limit_scripts: Vec<Vec<OrderStatus>>) -> Self {
        let exchange = Self::default();
        {
            let mut state = exchange.state.lock().unwrap();
            state.quotes = quotes.into();
            state.limit_scripts = limit_scripts.into();
        }
        exchange
    }

    pub fn with_active_orders(self, orders: Vec<Order>) -> Self {
        self.state.lock().unwrap().active = orders;
        self
    }

    pub fn with_balance(self, asset: &str, amount: &str) -> Self {
        self.state
            .lock()
            .unwrap()
            .balances
            .insert(asset.to_string(), d(amount));
        self
    }

    /// Order `order_id` fills completely just before its cancel lands
    pub fn filling_on_cancel(self, order_id: u64) -> Self {
        self.state.lock().unwrap().fill_on_cancel.insert(order_id);
        self
    }

    pub fn placed(&self) -> Vec<OrderRequest> {
        self.state.lock().unwrap().placed.clone()
    }

    pub fn cancelled(&self) -> Vec<u64> {
        self.state.lock().unwrap().cancelled.clone()
    }
}

/// `PartiallyFilled` fills half the order, `FullyFilled` all of it
fn apply_status(order: &mut Order, status: OrderStatus) {
    match status {
        OrderStatus::FullyFilled => {
            order.executed_amount = order.start_amount;
            order.remaining_amount = Decimal::ZERO;
        }
        OrderStatus::PartiallyFilled => {
            order.executed_amount = order.start_amount / Decimal::TWO;
            order.remaining_amount = order.start_amount - order.executed_amount;
        }
        _ => {}
    }
    order.status = status;
}

#[async_trait]
impl MarketData for FakeExchange {
    async fn quote(&self, _pair: &str) -> autotrader::Result<Quote> {
        let mut state = self.state.lock().unwrap();
        let quote = next_scripted(&mut state.quotes)
            .ok_or_else(|| anyhow::anyhow!("no quotes scripted"))?;
        state.last_quote = Some(quote.clone());
        Ok(quote)
    }
}

#[async_trait]
impl Exchange for FakeExchange {
    async fn place_order(&self, request: &OrderRequest) -> autotrader::Result<Order> {
        let mut state = self.state.lock().unwrap();
        state.next_id += 1;
        let order_id = state.next_id;
        state.placed.push(request.clone());

        let mut order = Order {
            pair: request.pair.clone(),
            order_id,
            side: request.side,
            order_type: request.order_type.clone(),
            status: OrderStatus::Unfilled,
            price: request.price,
            average_price: None,
            start_amount: request.amount,
            remaining_amount: request.amount,
            executed_amount: Decimal::ZERO,
        };

        let script = match &request.order_type {
            OrderType::Market => {
                order.average_price = state.last_quote.as_ref().map(|q| q.last);
                apply_status(&mut order, OrderStatus::FullyFilled);
                VecDeque::new()
            }
            _ => state
                .limit_scripts
                .pop_front()
                .ok_or_else(|| anyhow::anyhow!("no status script for order {}", order_id))?
                .into(),
        };

        state.orders.insert(
            order_id,
            Tracked {
                order: order.clone(),
                script,
            },
        );
        Ok(order)
    }

    async fn get_order(&self, _pair: &str, order_id: u64) -> autotrader::Result<Order> {
        let mut state = self.state.lock().unwrap();
        let tracked = state
            .orders
            .get_mut(&order_id)
            .ok_or_else(|| anyhow::anyhow!("unknown order {}", order_id))?;
        if let Some(status) = next_scripted(&mut tracked.script) {
            apply_status(&mut tracked.order, status);
        }
        Ok(tracked.order.clone())
    }

    async fn cancel_order(&self, _pair: &str, order_id: u64) -> autotrader::Result<Order> {
        let mut state = self.state.lock().unwrap();
        state.cancelled.push(order_id);
        let fills_first = state.fill_on_cancel.contains(&order_id);
        let tracked = state
            .orders
            .get_mut(&order_id)
            .ok_or_else(|| anyhow::anyhow!("unknown order {}", order_id))?;
        if fills_first {
            apply_status(&mut tracked.order, OrderStatus::FullyFilled);
        }
        if tracked.order.status != OrderStatus::FullyFilled {
            let status = if tracked.order.executed_amount.is_zero() {
                OrderStatus::CanceledUnfilled
            } else {
                OrderStatus::CanceledPartiallyFilled
            };
            tracked.order.status = status;
            tracked.script.clear();
        }
        Ok(tracked.order.clone())
    }

    async fn balances(&self) -> autotrader::Result<BTreeMap<String, Decimal>> {
        Ok(self.state.lock().unwrap().balances.clone())
    }

    async fn active_orders(&self, _pair: &str) -> autotrader::Result<Vec<Order>> {
        Ok(self.state.lock().unwrap().active.clone())
    }
}

/// Scripted RSI values (last repeats); RCI is constant
pub struct FakeIndicators {
    rsi: Mutex<VecDeque<f64>>,
    rci: f64,
    fail: bool,
}

impl FakeIndicators {
    pub fn new(rsi: Vec<f64>) -> Self {
        Self {
            rsi: Mutex::new(rsi.into()),
            rci: -50.0,
            fail: false,
        }
    }

    pub fn failing() -> Self {
        Self {
            rsi: Mutex::new(VecDeque::new()),
            rci: 0.0,
            fail: true,
        }
    }
}

#[async_trait]
impl IndicatorSource for FakeIndicators {
    async fn rsi(&self, pair: &str, interval: &str, _period: usize) -> autotrader::Result<f64> {
        if self.fail {
            anyhow::bail!("candles unavailable for {} {}", pair, interval);
        }
        let mut rsi = self.rsi.lock().unwrap();
        next_scripted(&mut *rsi).ok_or_else(|| anyhow::anyhow!("no RSI scripted"))
    }

    async fn rci(&self, _pair: &str, _interval: &str, _period: usize) -> autotrader::Result<f64> {
        Ok(self.rci)
    }
}

#[derive(Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<(String, Option<Sticker>)>>,
}

impl RecordingNotifier {
    pub fn messages(&self) -> Vec<(String, Option<Sticker>)> {
        self.sent.lock().unwrap().clone()
    }

    pub fn stickers(&self) -> Vec<Sticker> {
        self.messages().into_iter().filter_map(|(_, s)| s).collect()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(&self, message: &str, sticker: Option<Sticker>) {
        self.sent.lock().unwrap().push((message.to_string(), sticker));
    }
}
