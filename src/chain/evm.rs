//! [`ChainReader`] over JSON-RPC, with ENS on Ethereum and follower data
//! from EFP (Ethereum) or the LSP26 follower registry (LUKSO).

use async_trait::async_trait;
use tracing::debug;

use super::abi::{self, Token};
use super::efp::EfpClient;
use super::ens;
use super::rpc::JsonRpcClient;
use super::{Chain, ChainError, ChainReader, ChainResult};
use crate::gating::{Address, Amount, TokenId};

/// LSP26 follower system registry on LUKSO mainnet
pub const LSP26_REGISTRY: &str = "0xf01103E5a9909Fc0DBe8166dA7085e0285daDDcA";

/// ERC-1271 magic value returned for a valid signature
pub const ERC1271_MAGIC: [u8; 4] = [0x16, 0x26, 0xba, 0x7e];

/// Where follower relationships are read from
pub enum FollowerSource {
    Efp(EfpClient),
    Lsp26 { registry: Address },
    Unavailable,
}

/// JSON-RPC backed chain reader
pub struct EvmChainReader {
    chain: Chain,
    rpc: JsonRpcClient,
    ens_registry: Option<Address>,
    followers: FollowerSource,
}

impl EvmChainReader {
    pub fn new(chain: Chain, rpc: JsonRpcClient) -> Self {
        Self {
            chain,
            rpc,
            ens_registry: None,
            followers: FollowerSource::Unavailable,
        }
    }

    pub fn with_ens_registry(mut self, registry: Address) -> Self {
        self.ens_registry = Some(registry);
        self
    }

    pub fn with_followers(mut self, source: FollowerSource) -> Self {
        self.followers = source;
        self
    }

    fn unsupported(&self, operation: &'static str) -> ChainError {
        ChainError::Unsupported {
            chain: self.chain,
            operation,
        }
    }

    async fn call(&self, contract: Address, signature: &str, args: &[Token]) -> ChainResult<Vec<u8>> {
        let data = abi::encode_call(signature, args);
        self.rpc.call(contract, &data).await
    }

    async fn resolver_of(&self, node: [u8; 32]) -> ChainResult<Option<Address>> {
        let registry = self
            .ens_registry
            .ok_or_else(|| self.unsupported("name resolution"))?;
        let data = self
            .call(registry, "resolver(bytes32)", &[Token::FixedBytes(node)])
            .await?;
        let resolver = abi::decode_address(&data)?;
        Ok((resolver != Address::ZERO).then_some(resolver))
    }
}

#[async_trait]
impl ChainReader for EvmChainReader {
    fn chain(&self) -> Chain {
        self.chain
    }

    async fn native_balance(&self, account: Address) -> ChainResult<Amount> {
        self.rpc.get_balance(account).await
    }

    async fn fungible_balance(&self, contract: Address, account: Address) -> ChainResult<Amount> {
        let data = self
            .call(contract, "balanceOf(address)", &[Token::Address(account)])
            .await?;
        abi::decode_uint(&data)
    }

    async fn nft_count(&self, contract: Address, account: Address) -> ChainResult<Amount> {
        self.fungible_balance(contract, account).await
    }

    async fn nft_owner(
        &self,
        contract: Address,
        token_id: TokenId,
    ) -> ChainResult<Option<Address>> {
        let signature = match self.chain {
            Chain::Ethereum => "ownerOf(uint256)",
            Chain::Lukso => "tokenOwnerOf(bytes32)",
        };
        match self.call(contract, signature, &[Token::from(token_id)]).await {
            Ok(data) => {
                let owner = abi::decode_address(&data)?;
                Ok((owner != Address::ZERO).then_some(owner))
            }
            // nonexistent tokens revert
            Err(e) if e.is_revert() => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn multi_token_balance(
        &self,
        contract: Address,
        account: Address,
        token_id: TokenId,
    ) -> ChainResult<Amount> {
        if self.chain != Chain::Ethereum {
            return Err(self.unsupported("ERC-1155 balances"));
        }
        let data = self
            .call(
                contract,
                "balanceOf(address,uint256)",
                &[Token::Address(account), Token::from(token_id)],
            )
            .await?;
        abi::decode_uint(&data)
    }

    async fn resolve_name(&self, name: &str) -> ChainResult<Option<Address>> {
        let node = ens::namehash(name);
        let Some(resolver) = self.resolver_of(node).await? else {
            return Ok(None);
        };
        match self.call(resolver, "addr(bytes32)", &[Token::FixedBytes(node)]).await {
            Ok(data) => {
                let address = abi::decode_address(&data)?;
                Ok((address != Address::ZERO).then_some(address))
            }
            Err(e) if e.is_revert() => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn primary_name(&self, account: Address) -> ChainResult<Option<String>> {
        let node = ens::namehash(&ens::reverse_name(&account));
        let Some(resolver) = self.resolver_of(node).await? else {
            return Ok(None);
        };
        let name = match self.call(resolver, "name(bytes32)", &[Token::FixedBytes(node)]).await {
            Ok(data) => abi::decode_string(&data)?,
            Err(e) if e.is_revert() => return Ok(None),
            Err(e) => return Err(e),
        };
        if name.is_empty() {
            return Ok(None);
        }
        // reverse records are self-asserted; only trust them when the name points back
        let forward = self.resolve_name(&name).await?;
        debug!(%account, name = %name, confirmed = forward == Some(account), "reverse record");
        Ok((forward == Some(account)).then_some(name))
    }

    async fn follower_count(&self, account: Address) -> ChainResult<u64> {
        match &self.followers {
            FollowerSource::Efp(client) => client.follower_count(account).await,
            FollowerSource::Lsp26 { registry } => {
                let data = self
                    .call(*registry, "followerCount(address)", &[Token::Address(account)])
                    .await?;
                let count = abi::decode_uint(&data)?;
                Ok(u64::try_from(count.0).unwrap_or(u64::MAX))
            }
            FollowerSource::Unavailable => Err(self.unsupported("follower counts")),
        }
    }

    async fn is_following(&self, follower: Address, followee: Address) -> ChainResult<bool> {
        match &self.followers {
            FollowerSource::Efp(client) => client.is_following(follower, followee).await,
            FollowerSource::Lsp26 { registry } => {
                let data = self
                    .call(
                        *registry,
                        "isFollowing(address,address)",
                        &[Token::Address(follower), Token::Address(followee)],
                    )
                    .await?;
                abi::decode_bool(&data)
            }
            FollowerSource::Unavailable => Err(self.unsupported("follow relationships")),
        }
    }

    async fn is_valid_signature(
        &self,
        contract: Address,
        hash: [u8; 32],
        signature: &[u8],
    ) -> ChainResult<bool> {
        let result = self
            .call(
                contract,
                "isValidSignature(bytes32,bytes)",
                &[Token::FixedBytes(hash), Token::Bytes(signature.to_vec())],
            )
            .await;
        match result {
            Ok(data) => Ok(abi::decode_bytes4(&data)? == ERC1271_MAGIC),
            // EOAs return empty data; failing contracts revert
            Err(ChainError::Decode(_)) => Ok(false),
            Err(e) if e.is_revert() => Ok(false),
            Err(e) => Err(e),
        }
    }
}
