//! In-memory [`ChainReader`].
//!
//! Backs the test suite and the offline `check --ethereum-state` /
//! `--lukso-state` mode. State is plain serde data so it can be loaded from
//! a JSON file.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::RwLock;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::{Chain, ChainError, ChainReader, ChainResult};
use crate::challenge::signature::recover_address;
use crate::gating::ethereum::normalize_name;
use crate::gating::{Address, Amount, TokenId};

/// One account's state
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MockAccount {
    pub native_balance: Amount,
    /// Fungible token contract -> balance
    pub fungible: BTreeMap<Address, Amount>,
    /// NFT collection -> number of tokens held
    pub nft_counts: BTreeMap<Address, Amount>,
    pub primary_name: Option<String>,
    /// Accounts this account follows
    pub following: BTreeSet<Address>,
    /// Keys allowed to sign for this account (contract accounts only)
    pub controllers: BTreeSet<Address>,
    /// Raw signatures (lowercase hex, no `0x`) the account accepts as-is
    pub accepted_signatures: BTreeSet<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MockNftOwner {
    pub contract: Address,
    pub token_id: TokenId,
    pub owner: Address,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MockMultiBalance {
    pub contract: Address,
    pub token_id: TokenId,
    pub account: Address,
    pub balance: Amount,
}

/// Whole-chain state
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MockChainState {
    pub accounts: BTreeMap<Address, MockAccount>,
    pub nft_owners: Vec<MockNftOwner>,
    pub multi_balances: Vec<MockMultiBalance>,
    /// Normalized name -> address it resolves to
    pub names: BTreeMap<String, Address>,
}

impl MockChainState {
    /// Load state from a JSON file
    pub fn load(path: &Path) -> ChainResult<Self> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| ChainError::Transport(format!("{}: {}", path.display(), e)))?;
        serde_json::from_str(&contents)
            .map_err(|e| ChainError::Decode(format!("{}: {}", path.display(), e)))
    }

    pub fn account_mut(&mut self, address: Address) -> &mut MockAccount {
        self.accounts.entry(address).or_default()
    }

    pub fn set_nft_owner(&mut self, contract: Address, token_id: TokenId, owner: Address) {
        self.nft_owners
            .retain(|n| !(n.contract == contract && n.token_id == token_id));
        self.nft_owners.push(MockNftOwner {
            contract,
            token_id,
            owner,
        });
    }

    pub fn set_multi_balance(
        &mut self,
        contract: Address,
        token_id: TokenId,
        account: Address,
        balance: Amount,
    ) {
        self.multi_balances.retain(|m| {
            !(m.contract == contract && m.token_id == token_id && m.account == account)
        });
        self.multi_balances.push(MockMultiBalance {
            contract,
            token_id,
            account,
            balance,
        });
    }

    pub fn set_name(&mut self, name: &str, address: Address) {
        self.names.insert(normalize_name(name), address);
    }
}

/// [`ChainReader`] over [`MockChainState`]
pub struct MockChainReader {
    chain: Chain,
    state: RwLock<MockChainState>,
    offline: AtomicBool,
    reads: AtomicU64,
}

impl MockChainReader {
    pub fn new(chain: Chain) -> Self {
        Self::with_state(chain, MockChainState::default())
    }

    pub fn with_state(chain: Chain, state: MockChainState) -> Self {
        Self {
            chain,
            state: RwLock::new(state),
            offline: AtomicBool::new(false),
            reads: AtomicU64::new(0),
        }
    }

    /// Mutate the state in place
    pub fn update<F: FnOnce(&mut MockChainState)>(&self, f: F) -> ChainResult<()> {
        let mut state = self
            .state
            .write()
            .map_err(|_| ChainError::Transport("Lock poisoned".to_string()))?;
        f(&mut state);
        Ok(())
    }

    /// Make every read fail with a transport error
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::Relaxed);
    }

    /// Number of reads served since construction
    pub fn read_count(&self) -> u64 {
        self.reads.load(Ordering::Relaxed)
    }

    fn read<T, F: FnOnce(&MockChainState) -> ChainResult<T>>(&self, f: F) -> ChainResult<T> {
        self.reads.fetch_add(1, Ordering::Relaxed);
        if self.offline.load(Ordering::Relaxed) {
            return Err(ChainError::Transport(format!("{} mock is offline", self.chain)));
        }
        let state = self
            .state
            .read()
            .map_err(|_| ChainError::Transport("Lock poisoned".to_string()))?;
        f(&state)
    }
}

#[async_trait]
impl ChainReader for MockChainReader {
    fn chain(&self) -> Chain {
        self.chain
    }

    async fn native_balance(&self, account: Address) -> ChainResult<Amount> {
        self.read(|s| {
            Ok(s.accounts
                .get(&account)
                .map(|a| a.native_balance)
                .unwrap_or_default())
        })
    }

    async fn fungible_balance(&self, contract: Address, account: Address) -> ChainResult<Amount> {
        self.read(|s| {
            Ok(s.accounts
                .get(&account)
                .and_then(|a| a.fungible.get(&contract).copied())
                .unwrap_or_default())
        })
    }

    async fn nft_count(&self, contract: Address, account: Address) -> ChainResult<Amount> {
        self.read(|s| {
            let explicit = s
                .accounts
                .get(&account)
                .and_then(|a| a.nft_counts.get(&contract).copied());
            let owned = s
                .nft_owners
                .iter()
                .filter(|n| n.contract == contract && n.owner == account)
                .count() as u128;
            Ok(explicit.unwrap_or(Amount(owned)))
        })
    }

    async fn nft_owner(
        &self,
        contract: Address,
        token_id: TokenId,
    ) -> ChainResult<Option<Address>> {
        self.read(|s| {
            Ok(s.nft_owners
                .iter()
                .find(|n| n.contract == contract && n.token_id == token_id)
                .map(|n| n.owner))
        })
    }

    async fn multi_token_balance(
        &self,
        contract: Address,
        account: Address,
        token_id: TokenId,
    ) -> ChainResult<Amount> {
        if self.chain != Chain::Ethereum {
            return Err(ChainError::Unsupported {
                chain: self.chain,
                operation: "ERC-1155 balances",
            });
        }
        self.read(|s| {
            Ok(s.multi_balances
                .iter()
                .find(|m| m.contract == contract && m.token_id == token_id && m.account == account)
                .map(|m| m.balance)
                .unwrap_or_default())
        })
    }

    async fn resolve_name(&self, name: &str) -> ChainResult<Option<Address>> {
        let name = normalize_name(name);
        self.read(|s| Ok(s.names.get(&name).copied()))
    }

    async fn primary_name(&self, account: Address) -> ChainResult<Option<String>> {
        self.read(|s| {
            let name = s.accounts.get(&account).and_then(|a| a.primary_name.clone());
            Ok(name.filter(|n| s.names.get(&normalize_name(n)) == Some(&account)))
        })
    }

    async fn follower_count(&self, account: Address) -> ChainResult<u64> {
        self.read(|s| {
            Ok(s.accounts
                .values()
                .filter(|a| a.following.contains(&account))
                .count() as u64)
        })
    }

    async fn is_following(&self, follower: Address, followee: Address) -> ChainResult<bool> {
        self.read(|s| {
            Ok(s.accounts
                .get(&follower)
                .map(|a| a.following.contains(&followee))
                .unwrap_or(false))
        })
    }

    async fn is_valid_signature(
        &self,
        contract: Address,
        hash: [u8; 32],
        signature: &[u8],
    ) -> ChainResult<bool> {
        let signer = recover_address(&hash, signature).ok();
        let raw = hex::encode(signature);
        self.read(|s| {
            Ok(s.accounts.get(&contract).is_some_and(|a| {
                a.accepted_signatures.contains(&raw)
                    || signer.is_some_and(|signer| a.controllers.contains(&signer))
            }))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(byte: u8) -> Address {
        Address::from_bytes([byte; 20])
    }

    #[tokio::test]
    async fn test_follower_count_derived_from_edges() {
        let reader = MockChainReader::new(Chain::Lukso);
        reader
            .update(|s| {
                s.account_mut(addr(1)).following.insert(addr(3));
                s.account_mut(addr(2)).following.insert(addr(3));
            })
            .unwrap();
        assert_eq!(reader.follower_count(addr(3)).await.unwrap(), 2);
        assert!(reader.is_following(addr(1), addr(3)).await.unwrap());
        assert!(!reader.is_following(addr(3), addr(1)).await.unwrap());
    }

    #[tokio::test]
    async fn test_primary_name_requires_forward_match() {
        let reader = MockChainReader::new(Chain::Ethereum);
        reader
            .update(|s| {
                s.account_mut(addr(1)).primary_name = Some("alice.eth".to_string());
                s.set_name("alice.eth", addr(2));
            })
            .unwrap();
        assert_eq!(reader.primary_name(addr(1)).await.unwrap(), None);

        reader.update(|s| s.set_name("Alice.eth", addr(1))).unwrap();
        assert_eq!(
            reader.primary_name(addr(1)).await.unwrap(),
            Some("alice.eth".to_string())
        );
    }

    #[tokio::test]
    async fn test_offline_reads_fail() {
        let reader = MockChainReader::new(Chain::Ethereum);
        reader.set_offline(true);
        assert!(matches!(
            reader.native_balance(addr(1)).await,
            Err(ChainError::Transport(_))
        ));
        assert_eq!(reader.read_count(), 1);
    }

    #[test]
    fn test_state_loads_from_json() {
        let json = r#"{
            "accounts": {
                "0x1111111111111111111111111111111111111111": {
                    "native_balance": "1000",
                    "following": ["0x2222222222222222222222222222222222222222"]
                }
            },
            "names": { "bob.eth": "0x2222222222222222222222222222222222222222" }
        }"#;
        let state: MockChainState = serde_json::from_str(json).unwrap();
        assert_eq!(state.accounts[&addr(0x11)].native_balance, Amount(1000));
        assert_eq!(state.names["bob.eth"], addr(0x22));
    }
}
