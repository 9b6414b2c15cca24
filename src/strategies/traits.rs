// src/strategies/traits.rs
use crate::config::EngineConfig;
use crate::storage::position::Position;
use crate::types::Signal;
use rust_decimal::Decimal;

/// A pure decision rule: no I/O, no clock. Feasibility checks (balance,
/// order-book depth) belong to the engine, which is why an advice here is
/// a request rather than a commitment.
pub trait Strategy: Send {
    fn name(&self) -> &'static str;

    fn evaluate(&self, price: Decimal, position: &Position, config: &EngineConfig) -> Signal;
}
