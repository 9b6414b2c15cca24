// src/connectors/binance.rs
use crate::connectors::messages::{AccountInfo, ApiError, DepthSnapshot, OrderAck, TickerPrice};
use crate::connectors::traits::{GatewayError, MarketGateway};
use crate::types::{BidLevel, OrderFill, OrderStatus, Side};
use crate::utils::precision::normalize_quantity;
use async_trait::async_trait;
use chrono::Utc;
use hmac::{Hmac, Mac};
use reqwest::{Client, Method};
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use sha2::Sha256;
use std::str::FromStr;
use tracing::{info, warn};
use url::Url;
use uuid::Uuid;

type HmacSha256 = Hmac<Sha256>;

pub struct BinanceGateway {
    api_key: String,
    secret_key: String,
    http_client: Client,
    base_rest_url: Url,
    /// Exchange lot step; outbound quantities are floored to it when set.
    lot_step: Option<Decimal>,
}

impl BinanceGateway {
    pub fn new(
        api_key: String,
        secret_key: String,
        base_rest_url: Url,
        lot_step: Option<Decimal>,
    ) -> Self {
        Self {
            api_key,
            secret_key,
            http_client: Client::new(),
            base_rest_url,
            lot_step,
        }
    }

    fn sign_and_build_query(&self, params: Vec<(&str, String)>) -> Result<String, GatewayError> {
        let mut params = params;
        let timestamp = Utc::now().timestamp_millis().to_string();
        params.push(("timestamp", timestamp));

        let query_string = serde_urlencoded::to_string(&params)?;

        let mut mac = HmacSha256::new_from_slice(self.secret_key.as_bytes())
            .map_err(|_| GatewayError::Signature)?;
        mac.update(query_string.as_bytes());
        let signature = hex::encode(mac.finalize().into_bytes());

        Ok(format!("{query_string}&signature={signature}"))
    }

    async fn send_signed<T: DeserializeOwned>(
        &self,
        method: Method,
        endpoint: &str,
        params: Vec<(&str, String)>,
    ) -> Result<T, GatewayError> {
        let query = self.sign_and_build_query(params)?;
        let mut url = self.base_rest_url.join(endpoint)?;
        url.set_query(Some(&query));

        let response = self
            .http_client
            .request(method, url)
            .header("X-MBX-APIKEY", &self.api_key)
            .send()
            .await?;

        Self::decode(response).await
    }

    async fn send_public<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        params: &[(&str, String)],
    ) -> Result<T, GatewayError> {
        let url = self.base_rest_url.join(endpoint)?;
        let response = self.http_client.get(url).query(params).send().await?;
        Self::decode(response).await
    }

    async fn decode<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, GatewayError> {
        if response.status().is_success() {
            return Ok(response.json::<T>().await?);
        }
        match response.json::<ApiError>().await {
            Ok(body) => Err(GatewayError::Api {
                code: body.code,
                msg: body.msg,
            }),
            Err(error) => Err(GatewayError::Http(error)),
        }
    }
}

#[async_trait]
impl MarketGateway for BinanceGateway {
    async fn fetch_last_price(&self, symbol: &str) -> Result<Decimal, GatewayError> {
        let ticker: TickerPrice = self
            .send_public("/api/v3/ticker/price", &[("symbol", symbol.to_string())])
            .await?;
        Ok(ticker.price)
    }

    async fn fetch_order_book_bids(
        &self,
        symbol: &str,
        depth: usize,
    ) -> Result<Vec<BidLevel>, GatewayError> {
        let snapshot: DepthSnapshot = self
            .send_public(
                "/api/v3/depth",
                &[
                    ("symbol", symbol.to_string()),
                    ("limit", depth.to_string()),
                ],
            )
            .await?;

        let mut bids = Vec::with_capacity(snapshot.bids.len());
        for [price, volume] in &snapshot.bids {
            bids.push(BidLevel {
                price: Decimal::from_str(price)?,
                volume: Decimal::from_str(volume)?,
            });
        }
        Ok(bids)
    }

    async fn fetch_base_balance(&self, asset: &str) -> Result<Decimal, GatewayError> {
        let account: AccountInfo = self
            .send_signed(Method::GET, "/api/v3/account", vec![])
            .await?;

        account
            .balances
            .iter()
            .find(|balance| balance.asset == asset)
            .map(|balance| balance.free)
            .ok_or(GatewayError::MissingField("balance"))
    }

    async fn submit_market_order(
        &self,
        symbol: &str,
        side: Side,
        quantity: Decimal,
    ) -> Result<OrderFill, GatewayError> {
        let quantity = match self.lot_step {
            Some(step) => normalize_quantity(quantity, step),
            None => quantity,
        };
        let client_order_id = Uuid::new_v4().to_string();

        let params = vec![
            ("symbol", symbol.to_string()),
            ("side", side.as_str().to_string()),
            ("type", "MARKET".to_string()),
            ("quantity", quantity.to_string()),
            ("newClientOrderId", client_order_id.clone()),
            ("newOrderRespType", "FULL".to_string()),
        ];

        info!(symbol, side = side.as_str(), %quantity, %client_order_id, "submitting market order");

        let ack: OrderAck = self.send_signed(Method::POST, "/api/v3/order", params).await?;

        let status = match ack.status.as_str() {
            "FILLED" => OrderStatus::Closed,
            "REJECTED" | "CANCELED" | "EXPIRED" => OrderStatus::Rejected,
            other => {
                warn!(status = other, order_id = ack.order_id, "order finished in an unexpected state");
                OrderStatus::Unknown
            }
        };

        Ok(OrderFill {
            status,
            fill_price: ack.average_fill_price(),
            executed_qty: ack.executed_qty,
        })
    }
}
