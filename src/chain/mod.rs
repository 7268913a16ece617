//! # Chain Access
//!
//! Reads the on-chain and social-graph state that gating requirements are
//! evaluated against.
//!
//! - **abi** / **ens**: call encoding and ENS name hashing
//! - **rpc**: JSON-RPC transport
//! - **efp**: Ethereum Follow Protocol HTTP client
//! - **evm**: [`ChainReader`] over JSON-RPC
//! - **mock**: in-memory [`ChainReader`]
//! - **collector**: executes a snapshot plan against a reader

pub mod abi;
pub mod collector;
pub mod efp;
pub mod ens;
pub mod evm;
pub mod mock;
pub mod rpc;

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::gating::{Address, Amount, TokenId};

pub use collector::SnapshotCollector;
pub use evm::{EvmChainReader, FollowerSource};
pub use mock::{MockAccount, MockChainReader, MockChainState};
pub use rpc::JsonRpcClient;

/// Result type for chain reads
pub type ChainResult<T> = Result<T, ChainError>;

/// Chain read failures
#[derive(Debug, Clone, Error)]
pub enum ChainError {
    /// Network or HTTP failure
    #[error("transport error: {0}")]
    Transport(String),

    /// Upstream answered with a non-success HTTP status
    #[error("upstream returned HTTP {0}")]
    Http(u16),

    /// JSON-RPC error object
    #[error("rpc error {code}: {message}")]
    Rpc { code: i64, message: String },

    /// Response could not be decoded
    #[error("decode error: {0}")]
    Decode(String),

    /// Request exceeded the configured timeout
    #[error("request timed out")]
    Timeout,

    /// Operation has no meaning on this chain or is not configured
    #[error("{operation} is not supported on {chain}")]
    Unsupported { chain: Chain, operation: &'static str },
}

impl ChainError {
    /// Whether the error is an EVM execution revert
    pub fn is_revert(&self) -> bool {
        match self {
            ChainError::Rpc { code, message } => {
                *code == 3 || message.to_lowercase().contains("revert")
            }
            _ => false,
        }
    }
}

impl From<reqwest::Error> for ChainError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ChainError::Timeout
        } else if let Some(status) = err.status() {
            ChainError::Http(status.as_u16())
        } else if err.is_decode() {
            ChainError::Decode(err.to_string())
        } else {
            ChainError::Transport(err.to_string())
        }
    }
}

/// Supported chains
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Chain {
    Ethereum,
    Lukso,
}

impl Chain {
    pub fn chain_id(&self) -> u64 {
        match self {
            Chain::Ethereum => 1,
            Chain::Lukso => 42,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Chain::Ethereum => "ethereum",
            Chain::Lukso => "lukso",
        }
    }

    pub fn native_symbol(&self) -> &'static str {
        match self {
            Chain::Ethereum => "ETH",
            Chain::Lukso => "LYX",
        }
    }
}

impl fmt::Display for Chain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Typed reads against one chain and its social graph
#[async_trait]
pub trait ChainReader: Send + Sync {
    fn chain(&self) -> Chain;

    async fn native_balance(&self, account: Address) -> ChainResult<Amount>;

    /// ERC-20 / LSP7 `balanceOf(address)`
    async fn fungible_balance(&self, contract: Address, account: Address) -> ChainResult<Amount>;

    /// ERC-721 / LSP8 `balanceOf(address)`
    async fn nft_count(&self, contract: Address, account: Address) -> ChainResult<Amount>;

    /// Owner of a specific token; `None` if it does not exist
    async fn nft_owner(&self, contract: Address, token_id: TokenId)
        -> ChainResult<Option<Address>>;

    /// ERC-1155 `balanceOf(address,uint256)`
    async fn multi_token_balance(
        &self,
        contract: Address,
        account: Address,
        token_id: TokenId,
    ) -> ChainResult<Amount>;

    /// Forward resolution of a name
    async fn resolve_name(&self, name: &str) -> ChainResult<Option<Address>>;

    /// Reverse record of an account, confirmed by forward resolution
    async fn primary_name(&self, account: Address) -> ChainResult<Option<String>>;

    async fn follower_count(&self, account: Address) -> ChainResult<u64>;

    async fn is_following(&self, follower: Address, followee: Address) -> ChainResult<bool>;

    /// ERC-1271 `isValidSignature` on a contract account
    async fn is_valid_signature(
        &self,
        contract: Address,
        hash: [u8; 32],
        signature: &[u8],
    ) -> ChainResult<bool>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_revert_detection() {
        let revert = ChainError::Rpc {
            code: -32000,
            message: "execution reverted: ERC721: invalid token ID".to_string(),
        };
        assert!(revert.is_revert());
        assert!(ChainError::Rpc { code: 3, message: String::new() }.is_revert());
        assert!(!ChainError::Timeout.is_revert());
    }

    #[test]
    fn test_chain_ids() {
        assert_eq!(Chain::Ethereum.chain_id(), 1);
        assert_eq!(Chain::Lukso.chain_id(), 42);
        assert_eq!(Chain::Lukso.to_string(), "lukso");
    }
}
