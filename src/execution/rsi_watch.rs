use crate::api::Notifier;
use crate::config::WatchConfig;
use crate::indicators::IndicatorSource;
use crate::models::Sticker;
use crate::Result;

/// Oversold reading for one (pair, interval)
#[derive(Debug, Clone, PartialEq)]
pub struct RsiAlert {
    pub pair: String,
    pub interval: String,
    pub rsi: f64,
    pub rci: f64,
}

impl RsiAlert {
    pub fn message(&self) -> String {
        format!(
            "[{} {} buy signal] RSI = {:.3} % RCI = {:.3} %",
            self.pair, self.interval, self.rsi, self.rci
        )
    }
}

/// Check one (pair, interval) and notify when RSI is below the alert threshold
pub async fn check_pair<I, N>(
    indicators: &I,
    notifier: &N,
    config: &WatchConfig,
    pair: &str,
    interval: &str,
) -> Result<Option<RsiAlert>>
where
    I: IndicatorSource + ?Sized,
    N: Notifier + ?Sized,
{
    let rsi = indicators.rsi(pair, interval, config.rsi_period).await?;
    tracing::debug!("{} {} RSI {:.3}", pair, interval, rsi);

    if rsi >= config.rsi_alert_threshold {
        return Ok(None);
    }

    let rci = indicators.rci(pair, interval, config.rci_period).await?;
    let alert = RsiAlert {
        pair: pair.to_string(),
        interval: interval.to_string(),
        rsi,
        rci,
    };

    tracing::info!("{}", alert.message());
    notifier.notify(&alert.message(), Some(Sticker::RSI_ALERT)).await;

    Ok(Some(alert))
}

/// Poll every configured (pair, interval) for oversold RSI
///
/// Runs `config.rounds` passes, or forever when unset. The first failed
/// check ends the watch. Returns the number of alerts sent.
pub async fn watch_rsi<I, N>(indicators: &I, notifier: &N, config: &WatchConfig) -> Result<u64>
where
    I: IndicatorSource + ?Sized,
    N: Notifier + ?Sized,
{
    let mut alerts = 0u64;
    let mut round = 0u32;

    tracing::info!(
        "Watching RSI on {:?} x {:?} (alert below {})",
        config.pairs,
        config.intervals,
        config.rsi_alert_threshold
    );

    while config.rounds.map_or(true, |max| round < max) {
        round += 1;

        for pair in &config.pairs {
            for interval in &config.intervals {
                if check_pair(indicators, notifier, config, pair, interval)
                    .await?
                    .is_some()
                {
                    alerts += 1;
                }
                tokio::time::sleep(config.check_delay()).await;
            }
        }
    }

    Ok(alerts)
}
