// src/storage/position.rs
use crate::utils::precision::round_persisted;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;
use tokio::fs;
use tracing::warn;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("state file i/o: {0}")]
    Io(#[from] std::io::Error),
    #[error("state serialization: {0}")]
    Serde(#[from] serde_json::Error),
}

/// Weighted-average-cost position, as persisted.
///
/// `cost_basis` carries the exact accumulated cost (sum of quantity × fill
/// price) so that repeated averaging never compounds rounding error; the
/// average itself is derived on read.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Position {
    #[serde(default)]
    pub cost_basis: Decimal,
    #[serde(default)]
    pub quantity: Decimal,
    #[serde(default)]
    pub fee: Decimal,
}

impl Position {
    pub fn is_empty(&self) -> bool {
        self.quantity.is_zero()
    }

    /// Quantity-weighted mean entry price; zero exactly when empty.
    pub fn average_cost(&self) -> Decimal {
        if self.quantity.is_zero() {
            Decimal::ZERO
        } else {
            self.cost_basis / self.quantity
        }
    }
}

/// The whole persisted document: the open position plus the realized-profit
/// ledger, written as one JSON file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Ledger {
    #[serde(default)]
    pub position: Position,
    /// Cumulative profit over all full liquidations.
    #[serde(default)]
    pub realized_profit: Decimal,
    #[serde(default)]
    pub closed_trades: u64,
}

impl Ledger {
    /// Folds one confirmed buy fill into the position.
    pub fn record_buy(&mut self, quantity: Decimal, price: Decimal, fee_rate: Decimal) {
        self.position.cost_basis += quantity * price;
        self.position.quantity += quantity;
        self.position.fee = round_persisted(self.position.fee + quantity * fee_rate);
    }

    /// Full liquidation: realize `profit`, empty the position.
    pub fn record_sell(&mut self, profit: Decimal) {
        self.realized_profit = round_persisted(self.realized_profit + profit);
        self.closed_trades += 1;
        self.position = Position::default();
    }
}

/// File-backed position ledger. The engine task is the only writer; status
/// reads may run concurrently since every write is a whole-file replace.
#[derive(Debug, Clone)]
pub struct PositionStore {
    path: PathBuf,
}

impl PositionStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Loads the ledger. Absent or unreadable state falls back to the empty
    /// default: losing the file loses the accounting, never the bot.
    pub async fn load(&self) -> Ledger {
        let data = match fs::read_to_string(&self.path).await {
            Ok(data) => data,
            Err(error) => {
                if error.kind() != std::io::ErrorKind::NotFound {
                    warn!(path = %self.path.display(), %error, "state file unreadable, starting empty");
                }
                return Ledger::default();
            }
        };

        match serde_json::from_str(&data) {
            Ok(ledger) => ledger,
            Err(error) => {
                warn!(path = %self.path.display(), %error, "state file corrupt, starting empty");
                Ledger::default()
            }
        }
    }

    pub async fn get(&self) -> Position {
        self.load().await.position
    }

    pub async fn apply_buy(
        &self,
        quantity: Decimal,
        price: Decimal,
        fee_rate: Decimal,
    ) -> Result<Position, StoreError> {
        let mut ledger = self.load().await;
        ledger.record_buy(quantity, price, fee_rate);
        self.save(&ledger).await?;
        Ok(ledger.position)
    }

    /// Records a full liquidation and returns the cumulative realized
    /// profit.
    pub async fn apply_sell(&self, profit: Decimal) -> Result<Decimal, StoreError> {
        let mut ledger = self.load().await;
        ledger.record_sell(profit);
        self.save(&ledger).await?;
        Ok(ledger.realized_profit)
    }

    /// Administrative clear of the open position. The realized-profit
    /// ledger is left alone.
    pub async fn reset(&self) -> Result<(), StoreError> {
        let mut ledger = self.load().await;
        ledger.position = Position::default();
        self.save(&ledger).await
    }

    // Single replace: write a sibling temp file, then rename it over the
    // target so readers only ever see a complete document.
    async fn save(&self, ledger: &Ledger) -> Result<(), StoreError> {
        let data = serde_json::to_string_pretty(ledger)?;
        let tmp = self.path.with_extension("tmp");
        fs::write(&tmp, data).await?;
        fs::rename(&tmp, &self.path).await?;
        Ok(())
    }
}
