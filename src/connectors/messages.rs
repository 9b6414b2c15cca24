// src/connectors/messages.rs
use rust_decimal::Decimal;
use serde::Deserialize;

/// GET /api/v3/ticker/price. Binance sends the price as a string.
#[derive(Debug, Deserialize)]
pub struct TickerPrice {
    pub price: Decimal,
}

/// GET /api/v3/depth, bid side only; price/quantity pairs arrive as
/// strings and are decoded by the gateway.
#[derive(Debug, Deserialize)]
pub struct DepthSnapshot {
    pub bids: Vec<[String; 2]>,
}

/// GET /api/v3/account
#[derive(Debug, Deserialize)]
pub struct AccountInfo {
    pub balances: Vec<AssetBalance>,
}

#[derive(Debug, Deserialize)]
pub struct AssetBalance {
    pub asset: String,
    pub free: Decimal,
}

/// POST /api/v3/order with newOrderRespType=FULL: terminal status plus the
/// individual fills.
#[derive(Debug, Deserialize)]
pub struct OrderAck {
    #[serde(rename = "orderId")]
    pub order_id: u64,
    pub status: String,
    #[serde(rename = "executedQty")]
    pub executed_qty: Decimal,
    #[serde(rename = "cummulativeQuoteQty")]
    pub cummulative_quote_qty: Decimal,
    #[serde(default)]
    pub fills: Vec<Fill>,
}

#[derive(Debug, Deserialize)]
pub struct Fill {
    pub price: Decimal,
    pub qty: Decimal,
}

impl OrderAck {
    /// Quantity-weighted price across the fills, falling back to
    /// quote-volume over executed quantity when no fills are listed.
    pub fn average_fill_price(&self) -> Option<Decimal> {
        let filled: Decimal = self.fills.iter().map(|fill| fill.qty).sum();
        if filled > Decimal::ZERO {
            let notional: Decimal = self.fills.iter().map(|fill| fill.price * fill.qty).sum();
            return Some(notional / filled);
        }
        if self.executed_qty > Decimal::ZERO {
            return Some(self.cummulative_quote_qty / self.executed_qty);
        }
        None
    }
}

/// Error body Binance attaches to non-2xx responses.
#[derive(Debug, Deserialize)]
pub struct ApiError {
    pub code: i64,
    pub msg: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn ack(executed: Decimal, quote: Decimal, fills: Vec<Fill>) -> OrderAck {
        OrderAck {
            order_id: 1,
            status: "FILLED".to_string(),
            executed_qty: executed,
            cummulative_quote_qty: quote,
            fills,
        }
    }

    #[test]
    fn fill_price_weights_partial_fills() {
        let ack = ack(
            dec!(30),
            dec!(3010),
            vec![
                Fill { price: dec!(100), qty: dec!(20) },
                Fill { price: dec!(101), qty: dec!(10) },
            ],
        );

        assert_eq!(
            ack.average_fill_price(),
            Some((dec!(100) * dec!(20) + dec!(101) * dec!(10)) / dec!(30)),
        );
    }

    #[test]
    fn fill_price_falls_back_to_quote_volume() {
        let ack = ack(dec!(20), dec!(1970), vec![]);
        assert_eq!(ack.average_fill_price(), Some(dec!(98.5)));
    }

    #[test]
    fn no_execution_means_no_price() {
        let ack = ack(Decimal::ZERO, Decimal::ZERO, vec![]);
        assert_eq!(ack.average_fill_price(), None);
    }

    #[test]
    fn depth_payload_decodes_string_pairs() {
        let raw = r#"{"lastUpdateId": 42, "bids": [["100.40", "30.0"], ["100.00", "25.5"]], "asks": []}"#;
        let snapshot: DepthSnapshot = serde_json::from_str(raw).unwrap();

        assert_eq!(snapshot.bids.len(), 2);
        assert_eq!(snapshot.bids[0], ["100.40".to_string(), "30.0".to_string()]);
    }
}
