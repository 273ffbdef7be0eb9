//! Alpaca REST brokerage client (live execution mode).

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::domain::entities::fill::FillSide;
use crate::domain::repositories::brokerage::{
    AccountSnapshot, BrokerageClient, BrokerageError, BrokerageResult, OrderAck,
};

pub const ALPACA_PAPER_BASE: &str = "https://paper-api.alpaca.markets";

const KEY_HEADER: &str = "APCA-API-KEY-ID";
const SECRET_HEADER: &str = "APCA-API-SECRET-KEY";

#[derive(Debug, Clone)]
pub struct AlpacaConfig {
    pub base_url: String,
    pub api_key: String,
    pub secret_key: String,
}

pub struct AlpacaClient {
    client: Client,
    config: AlpacaConfig,
}

/// Alpaca returns numeric fields as JSON strings.
#[derive(Debug, Deserialize)]
struct AlpacaAccount {
    equity: String,
    cash: String,
    buying_power: String,
    portfolio_value: String,
    #[serde(default)]
    unrealized_pl: Option<String>,
    status: String,
}

#[derive(Debug, Serialize)]
struct MarketOrderBody<'a> {
    symbol: &'a str,
    qty: String,
    side: &'a str,
    #[serde(rename = "type")]
    order_type: &'a str,
    time_in_force: &'a str,
}

#[derive(Debug, Deserialize)]
struct AlpacaOrder {
    id: String,
    status: String,
}

fn parse_money(field: &str, value: &str) -> BrokerageResult<f64> {
    value
        .parse::<f64>()
        .map_err(|_| BrokerageError::AccountQueryFailed(format!("bad {field}: {value}")))
}

impl AlpacaClient {
    pub fn new(config: AlpacaConfig) -> Self {
        info!(base_url = %config.base_url, "Alpaca client initialised");
        Self {
            client: Client::new(),
            config,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url, path)
    }

    fn authed(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        request
            .header(KEY_HEADER, &self.config.api_key)
            .header(SECRET_HEADER, &self.config.secret_key)
    }
}

#[async_trait]
impl BrokerageClient for AlpacaClient {
    fn name(&self) -> &str {
        "Alpaca"
    }

    async fn get_account(&self) -> BrokerageResult<AccountSnapshot> {
        let response = self
            .authed(self.client.get(self.url("/v2/account")))
            .send()
            .await
            .map_err(|e| BrokerageError::Network(e.to_string()))?;

        if !response.status().is_success() {
            return Err(BrokerageError::AccountQueryFailed(format!(
                "HTTP {}",
                response.status()
            )));
        }

        let account: AlpacaAccount = response
            .json()
            .await
            .map_err(|e| BrokerageError::AccountQueryFailed(e.to_string()))?;

        Ok(AccountSnapshot {
            equity: parse_money("equity", &account.equity)?,
            cash: parse_money("cash", &account.cash)?,
            buying_power: parse_money("buying_power", &account.buying_power)?,
            portfolio_value: parse_money("portfolio_value", &account.portfolio_value)?,
            unrealized_pl: account
                .unrealized_pl
                .as_deref()
                .map(|v| parse_money("unrealized_pl", v))
                .transpose()?
                .unwrap_or(0.0),
            status: account.status,
        })
    }

    async fn submit_market_order(
        &self,
        symbol: &str,
        qty: u32,
        side: FillSide,
    ) -> BrokerageResult<OrderAck> {
        let body = MarketOrderBody {
            symbol,
            qty: qty.to_string(),
            side: match side {
                FillSide::Buy => "buy",
                FillSide::Sell => "sell",
            },
            order_type: "market",
            time_in_force: "day",
        };

        let response = self
            .authed(self.client.post(self.url("/v2/orders")))
            .json(&body)
            .send()
            .await
            .map_err(|e| BrokerageError::Network(e.to_string()))?;

        if !response.status().is_success() {
            return Err(BrokerageError::OrderSubmissionFailed(format!(
                "HTTP {}",
                response.status()
            )));
        }

        let order: AlpacaOrder = response
            .json()
            .await
            .map_err(|e| BrokerageError::OrderSubmissionFailed(e.to_string()))?;
        info!(order_id = %order.id, %symbol, qty, side = %side, "Order submitted to Alpaca");
        Ok(OrderAck {
            order_id: order.id,
            status: order.status,
        })
    }

    async fn liquidate_all(&self) -> BrokerageResult<()> {
        warn!("Liquidating all positions and cancelling open orders");
        let response = self
            .authed(
                self.client
                    .delete(self.url("/v2/positions"))
                    .query(&[("cancel_orders", "true")]),
            )
            .send()
            .await
            .map_err(|e| BrokerageError::Network(e.to_string()))?;

        if !response.status().is_success() {
            return Err(BrokerageError::LiquidationFailed(format!(
                "HTTP {}",
                response.status()
            )));
        }
        Ok(())
    }

    async fn close_all_positions(&self) -> BrokerageResult<()> {
        let response = self
            .authed(self.client.delete(self.url("/v2/positions")))
            .send()
            .await
            .map_err(|e| BrokerageError::Network(e.to_string()))?;

        if !response.status().is_success() {
            return Err(BrokerageError::LiquidationFailed(format!(
                "HTTP {}",
                response.status()
            )));
        }
        Ok(())
    }

    async fn is_healthy(&self) -> bool {
        self.get_account().await.is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_market_order_body_shape() {
        let body = MarketOrderBody {
            symbol: "AAPL",
            qty: 33.to_string(),
            side: "buy",
            order_type: "market",
            time_in_force: "day",
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["symbol"], "AAPL");
        assert_eq!(json["qty"], "33");
        assert_eq!(json["type"], "market");
        assert_eq!(json["time_in_force"], "day");
    }

    #[test]
    fn test_account_parsing_with_string_numbers() {
        let raw = r#"{
            "equity": "100000.25",
            "cash": "50000.00",
            "buying_power": "200000.50",
            "portfolio_value": "100000.25",
            "unrealized_pl": "-123.45",
            "status": "ACTIVE"
        }"#;
        let account: AlpacaAccount = serde_json::from_str(raw).unwrap();
        assert_eq!(parse_money("equity", &account.equity).unwrap(), 100_000.25);
        assert_eq!(
            parse_money("unrealized_pl", account.unrealized_pl.as_deref().unwrap()).unwrap(),
            -123.45
        );
    }

    #[test]
    fn test_parse_money_rejects_garbage() {
        assert!(parse_money("equity", "not-a-number").is_err());
    }
}
