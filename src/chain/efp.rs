//! Ethereum Follow Protocol (EFP) HTTP API client.
//!
//! Follower counts and follow edges for Ethereum wallets live in EFP list
//! records indexed by the public API rather than in a single contract.

use std::fmt;
use std::time::Duration;

use reqwest::{Client, StatusCode};
use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer};

use super::{ChainError, ChainResult};
use crate::gating::Address;

pub const DEFAULT_API_URL: &str = "https://api.ethfollow.xyz/api/v1";

/// Count that the API may render as number or string
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct FlexCount(u64);

impl<'de> Deserialize<'de> for FlexCount {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct CountVisitor;

        impl<'de> Visitor<'de> for CountVisitor {
            type Value = FlexCount;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a count as number or string")
            }

            fn visit_u64<E: de::Error>(self, v: u64) -> Result<FlexCount, E> {
                Ok(FlexCount(v))
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<FlexCount, E> {
                v.trim().parse().map(FlexCount).map_err(E::custom)
            }
        }

        deserializer.deserialize_any(CountVisitor)
    }
}

#[derive(Debug, Deserialize)]
struct StatsResponse {
    followers_count: FlexCount,
}

#[derive(Debug, Default, Deserialize)]
struct ButtonState {
    #[serde(default)]
    follow: bool,
}

#[derive(Debug, Deserialize)]
struct ButtonStateResponse {
    #[serde(default)]
    state: ButtonState,
}

/// EFP API client
pub struct EfpClient {
    base_url: String,
    client: Client,
}

impl EfpClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> ChainResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ChainError::Transport(e.to_string()))?;
        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
        })
    }

    pub fn stats_url(&self, account: &Address) -> String {
        format!("{}/users/{}/stats", self.base_url, account.to_lower_hex())
    }

    pub fn relationship_url(&self, follower: &Address, followee: &Address) -> String {
        format!(
            "{}/users/{}/{}/buttonState",
            self.base_url,
            follower.to_lower_hex(),
            followee.to_lower_hex()
        )
    }

    pub async fn follower_count(&self, account: Address) -> ChainResult<u64> {
        let response = self.client.get(self.stats_url(&account)).send().await?;
        match response.status() {
            // accounts without an EFP list have no stats
            StatusCode::NOT_FOUND => Ok(0),
            status if status.is_success() => {
                let stats: StatsResponse = response.json().await?;
                Ok(stats.followers_count.0)
            }
            status => Err(ChainError::Http(status.as_u16())),
        }
    }

    pub async fn is_following(&self, follower: Address, followee: Address) -> ChainResult<bool> {
        let response = self
            .client
            .get(self.relationship_url(&follower, &followee))
            .send()
            .await?;
        match response.status() {
            StatusCode::NOT_FOUND => Ok(false),
            status if status.is_success() => {
                let body: ButtonStateResponse = response.json().await?;
                Ok(body.state.follow)
            }
            status => Err(ChainError::Http(status.as_u16())),
        }
    }
}
