use crate::types::{BidLevel, OrderFill, Side};
use async_trait::async_trait;
use rust_decimal::Decimal;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("http transport: {0}")]
    Http(#[from] reqwest::Error),
    #[error("exchange api error {code}: {msg}")]
    Api { code: i64, msg: String },
    #[error("request signing failed")]
    Signature,
    #[error("bad endpoint url: {0}")]
    Url(#[from] url::ParseError),
    #[error("query encoding: {0}")]
    Encode(#[from] serde_urlencoded::ser::Error),
    #[error("undecodable decimal in exchange response: {0}")]
    BadDecimal(#[from] rust_decimal::Error),
    #[error("missing field in exchange response: {0}")]
    MissingField(&'static str),
}

/// Capability surface the engine consumes from an exchange. Everything the
/// decision loop needs, nothing more: last price, bid depth, free balance,
/// market-order submission.
#[async_trait]
pub trait MarketGateway: Send + Sync {
    async fn fetch_last_price(&self, symbol: &str) -> Result<Decimal, GatewayError>;

    /// Top-of-book bids, descending by price, at most `depth` levels.
    async fn fetch_order_book_bids(
        &self,
        symbol: &str,
        depth: usize,
    ) -> Result<Vec<BidLevel>, GatewayError>;

    /// Free balance of `asset`.
    async fn fetch_base_balance(&self, asset: &str) -> Result<Decimal, GatewayError>;

    async fn submit_market_order(
        &self,
        symbol: &str,
        side: Side,
        quantity: Decimal,
    ) -> Result<OrderFill, GatewayError>;
}
