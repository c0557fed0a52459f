use super::{calculate_rci, calculate_rsi, IndicatorSource};
use crate::api::bitbank::{candle_page_key, is_yearly_page};
use crate::api::CandleSource;
use crate::error::TradeError;
use crate::Result;
use async_trait::async_trait;
use chrono::{Datelike, NaiveDate, Utc};

/// Indicators computed from exchange candlesticks
///
/// Candles come in per-day pages (per-year for 4hour and longer), so early in
/// the UTC day the current page is too short for a 14-period RSI. When that
/// happens the previous page is fetched and prepended.
pub struct CandleIndicators<C> {
    source: C,
}

impl<C: CandleSource> CandleIndicators<C> {
    pub fn new(source: C) -> Self {
        Self { source }
    }

    /// Closing prices (oldest first), at least `needed` of them
    pub async fn closes(
        &self,
        pair: &str,
        interval: &str,
        needed: usize,
        today: NaiveDate,
    ) -> Result<Vec<f64>> {
        let mut candles = self.source.candles(pair, interval, today).await?;

        if candles.len() < needed {
            let previous = previous_page(interval, today);
            tracing::debug!(
                "{} {}: {} candles on {}, backfilling from {}",
                pair,
                interval,
                candles.len(),
                candle_page_key(interval, today),
                candle_page_key(interval, previous)
            );
            let mut older = self.source.candles(pair, interval, previous).await?;
            older.append(&mut candles);
            candles = older;
        }

        candles.sort_by_key(|c| c.timestamp);
        candles.dedup_by_key(|c| c.timestamp);

        if candles.len() < needed {
            return Err(TradeError::InsufficientCandles {
                pair: pair.to_string(),
                interval: interval.to_string(),
                have: candles.len(),
                need: needed,
            }
            .into());
        }

        Ok(candles.iter().map(|c| c.close).collect())
    }

    pub async fn rsi_on(
        &self,
        pair: &str,
        interval: &str,
        period: usize,
        today: NaiveDate,
    ) -> Result<f64> {
        let closes = self.closes(pair, interval, period + 1, today).await?;
        calculate_rsi(&closes, period).ok_or_else(|| insufficient(pair, interval, &closes, period + 1))
    }

    pub async fn rci_on(
        &self,
        pair: &str,
        interval: &str,
        period: usize,
        today: NaiveDate,
    ) -> Result<f64> {
        let closes = self.closes(pair, interval, period, today).await?;
        calculate_rci(&closes, period).ok_or_else(|| insufficient(pair, interval, &closes, period))
    }
}

#[async_trait]
impl<C: CandleSource> IndicatorSource for CandleIndicators<C> {
    async fn rsi(&self, pair: &str, interval: &str, period: usize) -> Result<f64> {
        self.rsi_on(pair, interval, period, Utc::now().date_naive()).await
    }

    async fn rci(&self, pair: &str, interval: &str, period: usize) -> Result<f64> {
        self.rci_on(pair, interval, period, Utc::now().date_naive()).await
    }
}

/// Page that precedes `today`'s page for this interval
fn previous_page(interval: &str, today: NaiveDate) -> NaiveDate {
    if is_yearly_page(interval) {
        NaiveDate::from_ymd_opt(today.year() - 1, 1, 1).unwrap_or(today)
    } else {
        today.pred_opt().unwrap_or(today)
    }
}

fn insufficient(pair: &str, interval: &str, closes: &[f64], need: usize) -> anyhow::Error {
    TradeError::InsufficientCandles {
        pair: pair.to_string(),
        interval: interval.to_string(),
        have: closes.len(),
        need,
    }
    .into()
}
