// src/types.rs
use crate::config::EngineConfig;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    pub fn as_str(&self) -> &'static str {
        match self {
            Side::Buy => "BUY",
            Side::Sell => "SELL",
        }
    }
}

/// Decision produced by a strategy for one tick. The quantity in an advice
/// is a request; feasibility checks happen in the engine.
#[derive(Debug, Clone, PartialEq)]
pub enum Signal {
    Advice(Side, Decimal),
    Hold,
}

/// Terminal state of a submitted order as reported by the exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderStatus {
    Closed,
    Rejected,
    Unknown,
}

#[derive(Debug, Clone)]
pub struct OrderFill {
    pub status: OrderStatus,
    /// Quantity-weighted fill price. Absent means the fill could not be
    /// confirmed, and the ledger must not be touched.
    pub fill_price: Option<Decimal>,
    pub executed_qty: Decimal,
}

/// One bid level of the order book.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BidLevel {
    pub price: Decimal,
    pub volume: Decimal,
}

/// What a single tick did, surfaced to the control surface. Every variant
/// is non-fatal; the loop always proceeds to the next scheduled tick.
#[derive(Debug, Clone, PartialEq)]
pub enum TickOutcome {
    Bought { quantity: Decimal, price: Decimal },
    Sold { quantity: Decimal, price: Decimal, profit: Decimal },
    Held,
    /// Market price unavailable: the tick was skipped with no mutation.
    NoPrice,
    /// Free balance below the buy margin.
    BalanceShort,
    /// Bid depth near the average cost cannot absorb the position.
    LiquidityShort,
    /// Exchange rejection or submission failure; ledger untouched.
    Rejected(String),
    /// Order filled but the ledger write failed.
    Failed(String),
}

impl fmt::Display for TickOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TickOutcome::Bought { quantity, price } => write!(f, "bought {quantity} @ {price}"),
            TickOutcome::Sold {
                quantity,
                price,
                profit,
            } => write!(f, "sold {quantity} @ {price} (profit {profit})"),
            TickOutcome::Held => write!(f, "held"),
            TickOutcome::NoPrice => write!(f, "skipped: market price unavailable"),
            TickOutcome::BalanceShort => write!(f, "skipped: balance below buy margin"),
            TickOutcome::LiquidityShort => write!(f, "skipped: insufficient bid depth"),
            TickOutcome::Rejected(reason) => write!(f, "order not executed: {reason}"),
            TickOutcome::Failed(reason) => write!(f, "error: {reason}"),
        }
    }
}

/// Published by the engine after every state change; `status` renders it
/// without entering the engine task.
#[derive(Debug, Clone)]
pub struct EngineSnapshot {
    pub running: bool,
    pub tick_count: u64,
    pub last_price: Option<Decimal>,
    pub last_outcome: Option<TickOutcome>,
    pub config: EngineConfig,
}

impl EngineSnapshot {
    pub fn initial(config: EngineConfig) -> Self {
        Self {
            running: false,
            tick_count: 0,
            last_price: None,
            last_outcome: None,
            config,
        }
    }
}
