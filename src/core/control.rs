// src/core/control.rs
use crate::config::ConfigOverrides;
use crate::storage::position::{Ledger, PositionStore};
use crate::types::EngineSnapshot;
use crate::utils::precision::round_persisted;
use std::fmt::Write as _;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot, RwLock};

/// Runtime commands accepted by the engine task. Every command carries a
/// reply slot for its human-readable report.
#[derive(Debug)]
pub enum ControlCommand {
    Start(oneshot::Sender<String>),
    Stop(oneshot::Sender<String>),
    Configure(ConfigOverrides, oneshot::Sender<String>),
    Reset(oneshot::Sender<String>),
}

/// Client side of the control surface. Cloneable. Mutating commands are
/// queued into the engine task; `status` reads the published snapshot and
/// the ledger directly, so it stays responsive while an order submission is
/// outstanding.
#[derive(Clone)]
pub struct ControlHandle {
    commands: mpsc::Sender<ControlCommand>,
    snapshot: Arc<RwLock<EngineSnapshot>>,
    store: PositionStore,
}

impl ControlHandle {
    pub fn new(
        commands: mpsc::Sender<ControlCommand>,
        snapshot: Arc<RwLock<EngineSnapshot>>,
        store: PositionStore,
    ) -> Self {
        Self {
            commands,
            snapshot,
            store,
        }
    }

    pub async fn start(&self) -> String {
        self.request(ControlCommand::Start).await
    }

    pub async fn stop(&self) -> String {
        self.request(ControlCommand::Stop).await
    }

    pub async fn reset(&self) -> String {
        self.request(ControlCommand::Reset).await
    }

    pub async fn configure(&self, overrides: ConfigOverrides) -> String {
        self.request(|reply| ControlCommand::Configure(overrides, reply))
            .await
    }

    pub async fn status(&self) -> String {
        let snapshot = self.snapshot.read().await.clone();
        let ledger = self.store.load().await;
        render_status(&snapshot, &ledger)
    }

    async fn request<F>(&self, make: F) -> String
    where
        F: FnOnce(oneshot::Sender<String>) -> ControlCommand,
    {
        let (reply_tx, reply_rx) = oneshot::channel();
        if self.commands.send(make(reply_tx)).await.is_err() {
            return "Engine is gone.".to_string();
        }
        reply_rx
            .await
            .unwrap_or_else(|_| "Engine dropped the command.".to_string())
    }
}

pub(crate) fn render_status(snapshot: &EngineSnapshot, ledger: &Ledger) -> String {
    let config = &snapshot.config;
    let position = &ledger.position;
    let average_cost = position.average_cost();

    let mut out = String::new();
    let _ = writeln!(
        out,
        "Status {}: {}",
        config.symbol(),
        if snapshot.running { "running" } else { "stopped" },
    );
    match snapshot.last_price {
        Some(price) => {
            let _ = writeln!(out, "Current market price:  {price}");
        }
        None => {
            let _ = writeln!(out, "Current market price:  unknown");
        }
    }
    let _ = writeln!(out, "Average cost:          {}", round_persisted(average_cost));
    let _ = writeln!(
        out,
        "Accumulated quantity:  {} (limit {})",
        position.quantity, config.max_volume,
    );
    let _ = writeln!(out, "Accumulated fee:       {}", position.fee);
    let _ = writeln!(
        out,
        "Realized profit:       {} over {} closed trades",
        ledger.realized_profit, ledger.closed_trades,
    );
    let _ = writeln!(out, "Ticks:                 {}", snapshot.tick_count);
    let _ = writeln!(
        out,
        "Awaiting sell [{}]:  {}",
        config.sell_clearance,
        round_persisted(average_cost + config.sell_clearance),
    );
    let _ = writeln!(
        out,
        "Awaiting buy  [{}]:  {}",
        config.buy_clearance,
        round_persisted(average_cost - config.buy_clearance),
    );
    if let Some(outcome) = &snapshot.last_outcome {
        let _ = writeln!(out, "Last action:           {outcome}");
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::storage::position::Position;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;
    use std::time::Duration;

    fn snapshot() -> EngineSnapshot {
        EngineSnapshot {
            running: true,
            tick_count: 7,
            last_price: Some(dec!(99.2)),
            last_outcome: None,
            config: EngineConfig {
                base_asset: "USDT".to_string(),
                quote_asset: "EUR".to_string(),
                step_size: dec!(20),
                max_volume: dec!(500),
                sell_clearance: dec!(1.5),
                buy_clearance: dec!(1),
                liquidity_buffer: Decimal::ZERO,
                poll_interval: Duration::from_secs(10),
                fee_rate: dec!(0.002),
            },
        }
    }

    #[test]
    fn status_shows_trigger_prices_around_average() {
        let ledger = Ledger {
            position: Position {
                cost_basis: dec!(3940),
                quantity: dec!(40),
                fee: dec!(0.08),
            },
            realized_profit: dec!(12.5),
            closed_trades: 3,
        };

        let report = render_status(&snapshot(), &ledger);

        assert!(report.contains("Status USDTEUR: running"));
        assert!(report.contains("100.0"), "sell trigger 98.5 + 1.5");
        assert!(report.contains("97.5"), "buy trigger 98.5 - 1");
        assert!(report.contains("12.5"));
        assert!(report.contains("closed trades"));
    }

    #[test]
    fn status_renders_empty_ledger_without_surprises() {
        let mut snapshot = snapshot();
        snapshot.running = false;
        snapshot.last_price = None;

        let report = render_status(&snapshot, &Ledger::default());

        assert!(report.contains("stopped"));
        assert!(report.contains("unknown"));
        // Empty ledger: triggers sit at 0 ± clearance.
        assert!(report.contains("Awaiting sell [1.5]:  1.5"));
        assert!(report.contains("Awaiting buy  [1]:  -1"));
    }
}
