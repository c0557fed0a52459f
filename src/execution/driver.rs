use super::lifecycle::OrderLifecycle;
use crate::api::{Exchange, Notifier};
use crate::indicators::IndicatorSource;
use crate::models::{CycleExit, Order, Sticker};
use crate::Result;
use rust_decimal::Decimal;
use std::collections::BTreeMap;

/// How a trading session stopped
#[derive(Debug, Clone, PartialEq)]
pub enum RunOutcome {
    /// Every configured cycle ran
    Completed,
    /// The book was not clean after a cycle; trading stopped early
    ActiveOrdersRemain { open_orders: Vec<Order> },
}

#[derive(Debug, Clone)]
pub struct SessionReport {
    pub cycles_run: u32,
    pub outcome: RunOutcome,
    pub total_profit: Decimal,
    pub stop_losses: u32,
    pub balances: BTreeMap<String, Decimal>,
}

/// Run up to `cycles` buy→sell cycles back to back
///
/// After every cycle the pair must have no open orders; otherwise the run
/// stops with [`RunOutcome::ActiveOrdersRemain`] and a mismatch notification.
pub async fn run_session<X, I, N>(lifecycle: &OrderLifecycle<X, I, N>) -> Result<SessionReport>
where
    X: Exchange,
    I: IndicatorSource,
    N: Notifier,
{
    let config = lifecycle.config();
    let exchange = lifecycle.exchange();
    let notifier = lifecycle.notifier();

    let mut cycles_run = 0;
    let mut total_profit = Decimal::ZERO;
    let mut stop_losses = 0;
    let mut outcome = RunOutcome::Completed;

    tracing::info!(
        "Starting {} cycle(s) on {} with amount {}",
        config.cycles,
        config.pair,
        config.amount
    );

    for cycle in 1..=config.cycles {
        tracing::info!("=== Cycle {}/{} ===", cycle, config.cycles);

        let result = lifecycle.run_cycle().await?;
        cycles_run += 1;

        if let Some(profit) = result.profit() {
            total_profit += profit;
        }
        if result.exit == CycleExit::StopLoss {
            stop_losses += 1;
        }

        tokio::time::sleep(config.cycle_interval()).await;

        let open_orders = exchange.active_orders(&config.pair).await?;
        if !open_orders.is_empty() {
            tracing::error!(
                "{} active order(s) remain on {} after cycle {}",
                open_orders.len(),
                config.pair,
                cycle
            );
            for order in &open_orders {
                tracing::error!(
                    "  open {} order {} ({}): {:?} x {}",
                    order.side,
                    order.order_id,
                    order.status,
                    order.price,
                    order.remaining_amount
                );
            }
            notifier
                .notify(
                    &format!(
                        "Active orders remain on {} after cycle {}, stopping",
                        config.pair, cycle
                    ),
                    Some(Sticker::ORDER_MISMATCH),
                )
                .await;
            outcome = RunOutcome::ActiveOrdersRemain { open_orders };
            break;
        }
    }

    let balances = report_balances(exchange, &config.report_assets).await?;

    let mut summary = format!(
        "Trading finished: {} cycle(s), P&L {} ({} stop-loss)",
        cycles_run,
        total_profit.round_dp(3),
        stop_losses
    );
    for (asset, amount) in &balances {
        summary.push_str(&format!("\n{}: {}", asset, amount));
    }
    tracing::info!("{}", summary);
    notifier.notify(&summary, Some(Sticker::RUN_COMPLETE)).await;

    Ok(SessionReport {
        cycles_run,
        outcome,
        total_profit,
        stop_losses,
        balances,
    })
}

/// Free balances for `assets`; assets the account does not hold report zero
pub async fn report_balances<X>(
    exchange: &X,
    assets: &[String],
) -> Result<BTreeMap<String, Decimal>>
where
    X: Exchange + ?Sized,
{
    let all = exchange.balances().await?;

    let selected = assets
        .iter()
        .map(|asset| {
            let amount = all.get(asset).copied().unwrap_or(Decimal::ZERO);
            (asset.clone(), amount)
        })
        .collect::<BTreeMap<_, _>>();

    for (asset, amount) in &selected {
        tracing::info!("Balance {}: {}", asset, amount);
    }

    Ok(selected)
}
