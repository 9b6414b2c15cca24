// src/strategies/averager.rs
use crate::config::EngineConfig;
use crate::storage::position::Position;
use crate::strategies::traits::Strategy;
use crate::types::{Side, Signal};
use rust_decimal::Decimal;

/// Accumulation/distribution around the weighted average cost.
///
/// With nothing accumulated, open with one step at whatever the market
/// offers. While holding, add a step once the price has fallen at least
/// `buy_clearance` below the average, and liquidate the whole position once
/// it has risen more than `sell_clearance` above it (while the quantity is
/// still under `max_volume`). Everything in between is a hold.
pub struct CostAverager;

impl Strategy for CostAverager {
    fn name(&self) -> &'static str {
        "cost-averager"
    }

    fn evaluate(&self, price: Decimal, position: &Position, config: &EngineConfig) -> Signal {
        if position.is_empty() {
            return Signal::Advice(Side::Buy, config.step_size);
        }

        let average_cost = position.average_cost();
        let diff = price - average_cost;

        if diff > Decimal::ZERO
            && position.quantity < config.max_volume
            && price > average_cost + config.sell_clearance
        {
            return Signal::Advice(Side::Sell, position.quantity);
        }

        if diff < Decimal::ZERO && price <= average_cost - config.buy_clearance {
            return Signal::Advice(Side::Buy, config.step_size);
        }

        Signal::Hold
    }
}
