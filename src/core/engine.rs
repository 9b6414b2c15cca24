// src/core/engine.rs
use crate::config::{ConfigOverrides, EngineConfig};
use crate::connectors::traits::MarketGateway;
use crate::core::control::ControlCommand;
use crate::storage::position::{Position, PositionStore};
use crate::strategies::traits::Strategy;
use crate::types::{EngineSnapshot, OrderFill, OrderStatus, Side, Signal, TickOutcome};
use crate::utils::precision::round_persisted;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::sync::Arc;
use tokio::sync::{mpsc, RwLock};
use tokio::time::{interval_at, Instant, Interval, MissedTickBehavior};
use tracing::{error, info, warn};

/// Order-book levels inspected for the sell-side depth check.
const DEPTH_LEVELS: usize = 20;
/// Balance safety margin over one buy step, covering fees and slippage.
const BALANCE_MARGIN: Decimal = dec!(1.5);

#[derive(Debug, Default)]
struct EngineState {
    running: bool,
    tick_count: u64,
    last_price: Option<Decimal>,
    last_outcome: Option<TickOutcome>,
}

/// The trading engine, run as a single task consuming control commands and
/// a poll timer from one `select!` loop. Because every command and every
/// tick goes through the same task, a tick is never interleaved with a
/// configuration change and no two orders can ever be in flight at once.
pub struct Engine<S> {
    config: EngineConfig,
    state: EngineState,
    gateway: Box<dyn MarketGateway>,
    store: PositionStore,
    strategy: S,
    commands: mpsc::Receiver<ControlCommand>,
    snapshot: Arc<RwLock<EngineSnapshot>>,
}

impl<S> Engine<S>
where
    S: Strategy,
{
    pub fn new(
        config: EngineConfig,
        gateway: Box<dyn MarketGateway>,
        store: PositionStore,
        strategy: S,
        commands: mpsc::Receiver<ControlCommand>,
        snapshot: Arc<RwLock<EngineSnapshot>>,
    ) -> Self {
        Self {
            config,
            state: EngineState::default(),
            gateway,
            store,
            strategy,
            commands,
            snapshot,
        }
    }

    pub async fn run(mut self) {
        info!(
            strategy = self.strategy.name(),
            symbol = %self.config.symbol(),
            "engine task started"
        );
        self.publish().await;
        let mut ticker = self.new_ticker();

        loop {
            tokio::select! {
                command = self.commands.recv() => {
                    match command {
                        Some(command) => {
                            if self.handle_command(command).await {
                                ticker = self.new_ticker();
                            }
                        }
                        // All control handles are gone; shut down.
                        None => break,
                    }
                }
                _ = ticker.tick(), if self.state.running => {
                    let outcome = self.tick().await;
                    info!(tick = self.state.tick_count, %outcome, "tick finished");
                    self.state.last_outcome = Some(outcome);
                    self.publish().await;
                }
            }
        }

        info!("engine task stopped");
    }

    // First tick fires only after one full interval, so a decision never
    // lands at the instant of `start`.
    fn new_ticker(&self) -> Interval {
        let period = self.config.poll_interval;
        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        ticker
    }

    /// Handles one control command; returns true when the poll timer must
    /// be rebuilt (a fresh `start`, possibly under a new interval).
    async fn handle_command(&mut self, command: ControlCommand) -> bool {
        let mut restart = false;
        let (reply, report) = match command {
            ControlCommand::Start(reply) => {
                let report = if self.state.running {
                    "Already running.".to_string()
                } else {
                    self.state.running = true;
                    restart = true;
                    format!("Trading started on {}.", self.config.symbol())
                };
                (reply, report)
            }
            ControlCommand::Stop(reply) => {
                let report = if self.state.running {
                    self.state.running = false;
                    "Trading stopped.".to_string()
                } else {
                    "Already stopped.".to_string()
                };
                (reply, report)
            }
            ControlCommand::Configure(overrides, reply) => {
                let report = self.apply_overrides(&overrides);
                (reply, report)
            }
            ControlCommand::Reset(reply) => {
                let report = match self.store.reset().await {
                    Ok(()) => "Position cleared. Realized profit kept.".to_string(),
                    Err(error) => {
                        error!(%error, "position reset failed");
                        format!("Reset failed: {error}")
                    }
                };
                (reply, report)
            }
        };

        self.publish().await;
        if reply.send(report).is_err() {
            warn!("control reply dropped before delivery");
        }
        restart
    }

    fn apply_overrides(&mut self, overrides: &ConfigOverrides) -> String {
        let outcome = self.config.apply(overrides);

        if outcome.applied.is_empty() {
            if outcome.rejected.is_empty() {
                return "Nothing to change.".to_string();
            }
            return format!("No valid fields; rejected: {}.", outcome.rejected.join(", "));
        }

        // An accepted change must never be observed mid-run; resuming takes
        // an explicit `start` under the new parameters.
        self.state.running = false;
        info!(applied = ?outcome.applied, rejected = ?outcome.rejected, "configuration changed, trading stopped");

        let mut report = format!(
            "Updated {}. Trading stopped; run `start` to resume.",
            outcome.applied.join(", "),
        );
        if !outcome.rejected.is_empty() {
            report.push_str(&format!(" Rejected: {}.", outcome.rejected.join(", ")));
        }
        report
    }

    /// One full decide-then-act cycle. At most one order leaves here.
    async fn tick(&mut self) -> TickOutcome {
        self.state.tick_count += 1;
        let symbol = self.config.symbol();

        let price = match self.gateway.fetch_last_price(&symbol).await {
            Ok(price) => price,
            Err(error) => {
                warn!(%error, "price unavailable, skipping tick");
                return TickOutcome::NoPrice;
            }
        };
        self.state.last_price = Some(price);

        let position = self.store.get().await;
        match self.strategy.evaluate(price, &position, &self.config) {
            Signal::Hold => TickOutcome::Held,
            Signal::Advice(Side::Buy, quantity) => {
                self.execute_buy(&symbol, quantity, &position).await
            }
            Signal::Advice(Side::Sell, quantity) => {
                self.execute_sell(&symbol, quantity, &position).await
            }
        }
    }

    async fn execute_buy(
        &mut self,
        symbol: &str,
        quantity: Decimal,
        position: &Position,
    ) -> TickOutcome {
        // The opening buy of an empty position goes through regardless;
        // adding to a held position requires spare balance over one step.
        if !position.is_empty() {
            let required = quantity * BALANCE_MARGIN;
            match self.gateway.fetch_base_balance(&self.config.base_asset).await {
                Ok(balance) if balance >= required => {}
                Ok(balance) => {
                    info!(%balance, %required, "balance below buy margin, holding");
                    return TickOutcome::BalanceShort;
                }
                Err(error) => {
                    warn!(%error, "balance unavailable, holding");
                    return TickOutcome::BalanceShort;
                }
            }
        }

        let fill = match self.gateway.submit_market_order(symbol, Side::Buy, quantity).await {
            Ok(fill) => fill,
            Err(error) => {
                error!(%error, "buy submission failed");
                return TickOutcome::Rejected(error.to_string());
            }
        };
        let fill_price = match confirmed_price(&fill) {
            Ok(fill_price) => fill_price,
            Err(outcome) => return outcome,
        };
        if fill.executed_qty != quantity {
            warn!(requested = %quantity, executed = %fill.executed_qty, "market buy reported a different executed quantity");
        }

        match self
            .store
            .apply_buy(quantity, fill_price, self.config.fee_rate)
            .await
        {
            Ok(position) => {
                info!(
                    %quantity,
                    %fill_price,
                    average_cost = %position.average_cost(),
                    "buy filled"
                );
                TickOutcome::Bought {
                    quantity,
                    price: fill_price,
                }
            }
            Err(error) => {
                error!(%error, "buy filled but the ledger write failed");
                TickOutcome::Failed(error.to_string())
            }
        }
    }

    async fn execute_sell(
        &mut self,
        symbol: &str,
        quantity: Decimal,
        position: &Position,
    ) -> TickOutcome {
        let average_cost = position.average_cost();

        // The sell must be absorbable near our cost: sum bid volume at or
        // above average_cost - buffer across the top levels.
        let floor = average_cost - self.config.liquidity_buffer;
        let depth = match self.gateway.fetch_order_book_bids(symbol, DEPTH_LEVELS).await {
            Ok(bids) => bids
                .iter()
                .filter(|level| level.price >= floor)
                .map(|level| level.volume)
                .sum::<Decimal>(),
            Err(error) => {
                warn!(%error, "order book unavailable, holding");
                return TickOutcome::LiquidityShort;
            }
        };
        if depth < quantity {
            info!(%depth, %quantity, "bid depth below position size, holding");
            return TickOutcome::LiquidityShort;
        }

        let fill = match self.gateway.submit_market_order(symbol, Side::Sell, quantity).await {
            Ok(fill) => fill,
            Err(error) => {
                error!(%error, "sell submission failed");
                return TickOutcome::Rejected(error.to_string());
            }
        };
        let fill_price = match confirmed_price(&fill) {
            Ok(fill_price) => fill_price,
            Err(outcome) => return outcome,
        };
        if fill.executed_qty != quantity {
            warn!(requested = %quantity, executed = %fill.executed_qty, "market sell reported a different executed quantity");
        }

        let profit = (fill_price - average_cost) * quantity - position.fee;
        match self.store.apply_sell(profit).await {
            Ok(total) => {
                info!(%quantity, %fill_price, %profit, realized = %total, "position liquidated");
                TickOutcome::Sold {
                    quantity,
                    price: fill_price,
                    profit: round_persisted(profit),
                }
            }
            Err(error) => {
                error!(%error, "sell filled but the ledger write failed");
                TickOutcome::Failed(error.to_string())
            }
        }
    }

    async fn publish(&self) {
        let mut snapshot = self.snapshot.write().await;
        *snapshot = EngineSnapshot {
            running: self.state.running,
            tick_count: self.state.tick_count,
            last_price: self.state.last_price,
            last_outcome: self.state.last_outcome.clone(),
            config: self.config.clone(),
        };
    }
}

/// The ledger is only touched on a closed order with a known fill price;
/// anything else reports and leaves the books alone.
fn confirmed_price(fill: &OrderFill) -> Result<Decimal, TickOutcome> {
    match (fill.status, fill.fill_price) {
        (OrderStatus::Closed, Some(price)) => Ok(price),
        (OrderStatus::Rejected, _) => {
            Err(TickOutcome::Rejected("exchange rejected the order".to_string()))
        }
        _ => {
            warn!("order finished without a confirmed fill, ledger untouched");
            Err(TickOutcome::Rejected("fill unconfirmed".to_string()))
        }
    }
}
