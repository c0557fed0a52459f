use crate::config::TradingConfig;
use rust_decimal::Decimal;

/// Stop-loss for an open limit sell
///
/// Triggers once `last` drops strictly below
/// `sell_order_price - sell_order_range * multiplier`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StopLoss {
    pub sell_order_range: Decimal,
    pub multiplier: Decimal,
}

impl StopLoss {
    pub fn new(sell_order_range: Decimal, multiplier: Decimal) -> Self {
        Self {
            sell_order_range,
            multiplier,
        }
    }

    pub fn from_config(config: &TradingConfig) -> Self {
        Self::new(config.sell_order_range, config.stop_loss_multiplier)
    }

    pub fn trigger_price(&self, sell_order_price: Decimal) -> Decimal {
        sell_order_price - self.sell_order_range * self.multiplier
    }

    pub fn is_triggered(&self, last: Decimal, sell_order_price: Decimal) -> bool {
        last < self.trigger_price(sell_order_price)
    }
}
