use crate::api::{Exchange, Notifier};
use crate::config::{PollSettings, TradingConfig};
use crate::error::TradeError;
use crate::indicators::IndicatorSource;
use crate::models::{
    CycleExit, CycleResult, Order, OrderRequest, OrderSide, OrderStatus, Quote, Sticker,
};
use crate::risk::StopLoss;
use crate::Result;
use rust_decimal::Decimal;

/// Limit buy price: `best_ask - buy_order_range`
pub fn buy_price(quote: &Quote, buy_order_range: Decimal) -> Decimal {
    quote.best_ask - buy_order_range
}

/// Limit sell price: `best_bid + sell_order_range`
pub fn sell_price(quote: &Quote, sell_order_range: Decimal) -> Decimal {
    quote.best_bid + sell_order_range
}

/// Price above which an unfilled buy is considered stale
pub fn reprice_price(order_price: Decimal, reprice_threshold: Decimal) -> Decimal {
    order_price + reprice_threshold
}

pub fn should_reprice(last: Decimal, order_price: Decimal, reprice_threshold: Decimal) -> bool {
    last > reprice_price(order_price, reprice_threshold)
}

/// Sleeps before every poll and enforces the optional poll cap
pub(crate) struct PollBudget {
    settings: PollSettings,
    polls: u32,
    what: &'static str,
}

impl PollBudget {
    pub(crate) fn new(settings: PollSettings, what: &'static str) -> Self {
        Self {
            settings,
            polls: 0,
            what,
        }
    }

    pub(crate) async fn wait(&mut self) -> std::result::Result<(), TradeError> {
        if let Some(max) = self.settings.max_polls {
            if self.polls >= max {
                return Err(TradeError::PollLimitExceeded {
                    what: self.what,
                    polls: self.polls,
                });
            }
        }
        self.polls += 1;
        tokio::time::sleep(self.settings.interval).await;
        Ok(())
    }
}

/// Buy→sell state machine for a single pair
///
/// BUY:  wait for RSI signal → place limit buy → poll until terminal,
///       cancelling and re-placing whenever the market runs away from the order.
/// SELL: place limit sell → poll until terminal, or cancel and dump at market
///       once the stop-loss price is breached. A fill always wins over stop-loss.
pub struct OrderLifecycle<X, I, N> {
    exchange: X,
    indicators: I,
    notifier: N,
    config: TradingConfig,
    stop_loss: StopLoss,
}

impl<X, I, N> OrderLifecycle<X, I, N>
where
    X: Exchange,
    I: IndicatorSource,
    N: Notifier,
{
    pub fn new(exchange: X, indicators: I, notifier: N, config: TradingConfig) -> Self {
        let stop_loss = StopLoss::from_config(&config);
        Self {
            exchange,
            indicators,
            notifier,
            config,
            stop_loss,
        }
    }

    pub fn config(&self) -> &TradingConfig {
        &self.config
    }

    pub fn exchange(&self) -> &X {
        &self.exchange
    }

    pub fn notifier(&self) -> &N {
        &self.notifier
    }

    /// One full buy→sell cycle
    ///
    /// A buy that ends with nothing filled has nothing to sell; the cycle goes
    /// back to waiting for the next signal.
    pub async fn run_cycle(&self) -> Result<CycleResult> {
        loop {
            let buy = self.buy_phase().await?;
            if !buy.executed_amount.is_zero() {
                return self.sell_phase(buy).await;
            }

            let message = format!(
                "Buy order ended {} with nothing filled, waiting for next signal ID: {}",
                buy.status, buy.order_id
            );
            tracing::warn!("{}", message);
            self.notifier.notify(&message, None).await;
        }
    }

    /// Poll RSI until it drops below the buy threshold
    pub async fn wait_for_buy_signal(&self) -> Result<f64> {
        let cfg = &self.config;
        let mut budget = PollBudget::new(cfg.signal_poll(), "buy signal");

        loop {
            budget.wait().await?;

            let rsi = self
                .indicators
                .rsi(&cfg.pair, &cfg.rsi_interval, cfg.rsi_period)
                .await?;
            tracing::debug!(
                "Waiting for buy signal: RSI {:.3} (threshold {})",
                rsi,
                cfg.rsi_buy_threshold
            );

            if rsi < cfg.rsi_buy_threshold {
                tracing::info!("Buy signal: RSI {:.3} < {}", rsi, cfg.rsi_buy_threshold);
                return Ok(rsi);
            }
        }
    }

    /// Returns the terminal buy order
    ///
    /// Its `executed_amount` includes whatever earlier orders filled before
    /// being cancelled for re-pricing; each replacement only buys the rest.
    pub async fn buy_phase(&self) -> Result<Order> {
        self.wait_for_buy_signal().await?;

        // Filled by buy orders already cancelled for re-pricing
        let mut carried = Decimal::ZERO;
        let mut order = self.place_buy(self.config.amount).await?;
        let mut budget = PollBudget::new(self.config.buy_poll(), "buy order fill");

        loop {
            budget.wait().await?;

            let status = self
                .exchange
                .get_order(&order.pair, order.order_id)
                .await?;
            if status.is_terminal() {
                log_terminal(&status);
                return Ok(with_carried_fill(status, carried));
            }

            let limit = limit_price(&status)?;
            let quote = self.exchange.quote(&self.config.pair).await?;

            if !should_reprice(quote.last, limit, self.config.reprice_threshold) {
                log_waiting(&status, quote.last, reprice_price(limit, self.config.reprice_threshold));
                continue;
            }

            tracing::info!(
                "Last {} > re-price level {} (order {} @ {}), cancelling",
                quote.last,
                reprice_price(limit, self.config.reprice_threshold),
                status.order_id,
                limit
            );
            let cancelled = self
                .exchange
                .cancel_order(&status.pair, status.order_id)
                .await?;

            if cancelled.status == OrderStatus::FullyFilled {
                // Filled between the status poll and the cancel
                log_terminal(&cancelled);
                return Ok(with_carried_fill(cancelled, carried));
            }

            carried += cancelled.executed_amount;
            let remaining = self.config.amount - carried;

            self.notifier
                .notify(
                    &format!(
                        "Buy order cancelled for re-pricing: {} @ {} (last {}, filled {}) ID: {}",
                        cancelled.pair,
                        limit,
                        quote.last,
                        cancelled.executed_amount,
                        cancelled.order_id
                    ),
                    None,
                )
                .await;

            if !cancelled.executed_amount.is_zero() {
                tracing::info!(
                    "Carrying {} already bought; re-placing buy for remaining {}",
                    carried,
                    remaining
                );
            }

            order = self.place_buy(remaining).await?;
        }
    }

    /// Sell what `buy` filled; returns the finished cycle
    pub async fn sell_phase(&self, buy: Order) -> Result<CycleResult> {
        let quote = self.exchange.quote(&self.config.pair).await?;
        let price = sell_price(&quote, self.config.sell_order_range);
        let request =
            OrderRequest::limit(&self.config.pair, OrderSide::Sell, price, buy.executed_amount);

        let order = self.exchange.place_order(&request).await?;
        tracing::info!(
            "Placed limit sell {} {} @ {} (bid {}) ID: {}",
            request.amount,
            request.pair,
            price,
            quote.best_bid,
            order.order_id
        );
        self.notifier
            .notify(
                &format!(
                    "Sell order placed: {} {} @ {} ID: {}",
                    request.amount, request.pair, price, order.order_id
                ),
                None,
            )
            .await;

        let mut budget = PollBudget::new(self.config.sell_poll(), "sell order fill");

        loop {
            budget.wait().await?;

            let status = self
                .exchange
                .get_order(&order.pair, order.order_id)
                .await?;
            if status.is_terminal() {
                log_terminal(&status);
                return Ok(self.finish(buy, status, CycleExit::Filled).await);
            }

            let limit = limit_price(&status)?;
            let quote = self.exchange.quote(&self.config.pair).await?;

            if !self.stop_loss.is_triggered(quote.last, limit) {
                log_waiting(&status, quote.last, self.stop_loss.trigger_price(limit));
                continue;
            }

            tracing::warn!(
                "Stop-loss: last {} < {} (sell order {} @ {})",
                quote.last,
                self.stop_loss.trigger_price(limit),
                status.order_id,
                limit
            );

            // Cancel result status is not checked beyond a late fill
            let cancelled = self
                .exchange
                .cancel_order(&status.pair, status.order_id)
                .await?;
            tracing::debug!("Cancelled sell order {} ({})", cancelled.order_id, cancelled.status);

            if cancelled.status == OrderStatus::FullyFilled {
                return Ok(self.finish(buy, cancelled, CycleExit::Filled).await);
            }

            let market_request = OrderRequest::market(
                &self.config.pair,
                OrderSide::Sell,
                cancelled.remaining_amount,
            );
            let market = self.exchange.place_order(&market_request).await?;
            tracing::info!(
                "Placed market sell {} {} ID: {}",
                market_request.amount,
                market_request.pair,
                market.order_id
            );

            // Market orders are assumed to fill at once; one refresh picks up the average price
            let market = self
                .exchange
                .get_order(&market.pair, market.order_id)
                .await?;

            return Ok(self.finish(buy, market, CycleExit::StopLoss).await);
        }
    }

    async fn place_buy(&self, amount: Decimal) -> Result<Order> {
        let quote = self.exchange.quote(&self.config.pair).await?;
        let price = buy_price(&quote, self.config.buy_order_range);
        let request = OrderRequest::limit(&self.config.pair, OrderSide::Buy, price, amount);

        let order = self.exchange.place_order(&request).await?;
        tracing::info!(
            "Placed limit buy {} {} @ {} (ask {}) ID: {}",
            request.amount,
            request.pair,
            price,
            quote.best_ask,
            order.order_id
        );
        self.notifier
            .notify(
                &format!(
                    "Buy order placed: {} {} @ {} ID: {}",
                    request.amount, request.pair, price, order.order_id
                ),
                None,
            )
            .await;

        Ok(order)
    }

    async fn finish(&self, buy: Order, sell: Order, exit: CycleExit) -> CycleResult {
        let result = CycleResult { buy, sell, exit };
        let amount = result.amount();
        let id = result.sell.order_id;

        let (message, sticker) = match (exit, result.profit()) {
            (CycleExit::Filled, _) if result.sell.status == OrderStatus::CanceledUnfilled => (
                format!("Sell order was cancelled before filling ID: {}", id),
                None,
            ),
            (CycleExit::Filled, Some(profit)) => (
                format!(
                    "Sell order filled! Profit: {} x {} ({}) ID: {}",
                    profit.round_dp(3),
                    amount,
                    result.sell.pair,
                    id
                ),
                Some(Sticker::ORDER_FILLED),
            ),
            (CycleExit::StopLoss, Some(profit)) => (
                format!(
                    "Stop-loss sell executed! Loss: {} x {} ({}) ID: {}",
                    profit.round_dp(3),
                    amount,
                    result.sell.pair,
                    id
                ),
                Some(Sticker::STOP_LOSS),
            ),
            (CycleExit::Filled, None) => (
                format!("Sell order filled (P&L unknown) ID: {}", id),
                Some(Sticker::ORDER_FILLED),
            ),
            (CycleExit::StopLoss, None) => (
                format!("Stop-loss sell executed (P&L unknown) ID: {}", id),
                Some(Sticker::STOP_LOSS),
            ),
        };

        tracing::info!("{}", message);
        self.notifier.notify(&message, sticker).await;
        result
    }
}

/// Terminal buy snapshot with fills from earlier re-priced orders added in
fn with_carried_fill(mut order: Order, carried: Decimal) -> Order {
    order.executed_amount += carried;
    order
}

fn limit_price(order: &Order) -> std::result::Result<Decimal, TradeError> {
    order.price.ok_or(TradeError::MissingPrice {
        order_id: order.order_id,
    })
}

fn log_terminal(order: &Order) {
    tracing::info!(
        "{} order {} {}: {:?} x {} ({})",
        order.side,
        order.order_id,
        order.status,
        order.price,
        order.executed_amount,
        order.pair
    );
}

fn log_waiting(order: &Order, last: Decimal, threshold: Decimal) {
    tracing::debug!(
        "{} order {} waiting ({}): {:?} x {} remaining [last {}] [threshold {}]",
        order.side,
        order.order_id,
        order.status,
        order.price,
        order.remaining_amount,
        last,
        threshold
    );
}
