//! JSON-RPC transport for EVM chains.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;

use super::{ChainError, ChainResult};
use crate::gating::{Address, Amount};

#[derive(Debug, Deserialize)]
struct RpcErrorObject {
    code: i64,
    message: String,
}

#[derive(Debug, Deserialize)]
struct RpcResponse<T> {
    result: Option<T>,
    error: Option<RpcErrorObject>,
}

/// Minimal Ethereum JSON-RPC client
pub struct JsonRpcClient {
    url: String,
    client: Client,
    next_id: AtomicU64,
}

impl JsonRpcClient {
    pub fn new(url: impl Into<String>, timeout: Duration) -> ChainResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ChainError::Transport(e.to_string()))?;
        Ok(Self {
            url: url.into(),
            client,
            next_id: AtomicU64::new(1),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    async fn request<T: DeserializeOwned>(&self, method: &str, params: Value) -> ChainResult<T> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let body = json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": method,
            "params": params,
        });

        debug!(method, id, "rpc request");
        let response = self.client.post(&self.url).json(&body).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ChainError::Http(status.as_u16()));
        }

        let parsed: RpcResponse<T> = response.json().await?;
        if let Some(error) = parsed.error {
            return Err(ChainError::Rpc {
                code: error.code,
                message: error.message,
            });
        }
        parsed
            .result
            .ok_or_else(|| ChainError::Decode(format!("{} returned no result", method)))
    }

    /// `eth_getBalance` at the latest block
    pub async fn get_balance(&self, account: Address) -> ChainResult<Amount> {
        let quantity: String = self
            .request("eth_getBalance", json!([account.to_lower_hex(), "latest"]))
            .await?;
        parse_quantity(&quantity)
    }

    /// `eth_call` at the latest block, returning raw return data
    pub async fn call(&self, to: Address, data: &[u8]) -> ChainResult<Vec<u8>> {
        let params = json!([
            { "to": to.to_lower_hex(), "data": format!("0x{}", hex::encode(data)) },
            "latest"
        ]);
        let result: String = self.request("eth_call", params).await?;
        parse_data(&result)
    }
}

/// Parse a hex quantity (`0x1bc16d674ec80000`), saturating above 128 bits
pub fn parse_quantity(quantity: &str) -> ChainResult<Amount> {
    let digits = quantity
        .strip_prefix("0x")
        .ok_or_else(|| ChainError::Decode(format!("bad quantity '{}'", quantity)))?;
    let digits = digits.trim_start_matches('0');
    if digits.is_empty() {
        return Ok(Amount::ZERO);
    }
    if digits.len() > 32 {
        return Ok(Amount(u128::MAX));
    }
    u128::from_str_radix(digits, 16)
        .map(Amount)
        .map_err(|_| ChainError::Decode(format!("bad quantity '{}'", quantity)))
}

/// Parse `0x`-prefixed hex data
pub fn parse_data(data: &str) -> ChainResult<Vec<u8>> {
    let digits = data
        .strip_prefix("0x")
        .ok_or_else(|| ChainError::Decode("data must be 0x-prefixed".to_string()))?;
    hex::decode(digits).map_err(|e| ChainError::Decode(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_quantity() {
        assert_eq!(parse_quantity("0x0").unwrap(), Amount::ZERO);
        assert_eq!(
            parse_quantity("0x1bc16d674ec80000").unwrap(),
            Amount(2_000_000_000_000_000_000)
        );
        assert_eq!(
            parse_quantity(&format!("0x1{}", "0".repeat(32))).unwrap(),
            Amount(u128::MAX)
        );
        assert!(parse_quantity("12").is_err());
    }

    #[test]
    fn test_parse_data() {
        assert_eq!(parse_data("0x").unwrap(), Vec::<u8>::new());
        assert_eq!(parse_data("0x0a0b").unwrap(), vec![10, 11]);
        assert!(parse_data("0a0b").is_err());
    }

    #[test]
    fn test_client_construction() {
        let client = JsonRpcClient::new("http://localhost:8545", Duration::from_secs(5)).unwrap();
        assert_eq!(client.url(), "http://localhost:8545");
    }
}
