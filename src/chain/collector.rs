//! Executes a [`SnapshotPlan`] against the reader for a chain.
//!
//! ## Invariants
//!
//! - Only reads named in the plan are issued
//! - Reads run concurrently; the first error aborts the collection
//! - A failed collection never yields a partial snapshot

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use futures_util::future::try_join_all;
use tracing::debug;

use super::{Chain, ChainError, ChainReader, ChainResult};
use crate::gating::{Address, SnapshotPlan, WalletSnapshot};

/// Per-chain readers used to build wallet snapshots
#[derive(Clone, Default)]
pub struct SnapshotCollector {
    readers: HashMap<Chain, Arc<dyn ChainReader>>,
}

impl SnapshotCollector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the reader for its chain, replacing any previous one
    pub fn with_reader(mut self, reader: Arc<dyn ChainReader>) -> Self {
        self.readers.insert(reader.chain(), reader);
        self
    }

    pub fn reader(&self, chain: Chain) -> ChainResult<Arc<dyn ChainReader>> {
        self.readers
            .get(&chain)
            .cloned()
            .ok_or(ChainError::Unsupported {
                chain,
                operation: "chain reads",
            })
    }

    pub fn chains(&self) -> Vec<Chain> {
        let mut chains: Vec<Chain> = self.readers.keys().copied().collect();
        chains.sort();
        chains
    }

    pub async fn collect(
        &self,
        chain: Chain,
        address: Address,
        plan: &SnapshotPlan,
    ) -> ChainResult<WalletSnapshot> {
        let reader = self.reader(chain)?;
        let reader = reader.as_ref();
        let started = Instant::now();

        let native = async {
            if plan.native_balance {
                reader.native_balance(address).await.map(Some)
            } else {
                Ok(None)
            }
        };
        let fungible = try_join_all(plan.fungible_balances.iter().map(|contract| async move {
            let balance = reader.fungible_balance(*contract, address).await?;
            Ok::<_, ChainError>((*contract, balance))
        }));
        let nft_counts = try_join_all(plan.nft_counts.iter().map(|contract| async move {
            let count = reader.nft_count(*contract, address).await?;
            Ok::<_, ChainError>((*contract, count))
        }));
        let nft_owners = try_join_all(plan.nft_owners.iter().map(|key| async move {
            let owner = reader.nft_owner(key.0, key.1).await?;
            Ok::<_, ChainError>((*key, owner))
        }));
        let multi = try_join_all(plan.multi_balances.iter().map(|key| async move {
            let balance = reader.multi_token_balance(key.0, address, key.1).await?;
            Ok::<_, ChainError>((*key, balance))
        }));
        let names = try_join_all(plan.resolve_names.iter().map(|name| async move {
            let resolved = reader.resolve_name(name).await?;
            Ok::<_, ChainError>((name.clone(), resolved))
        }));
        let primary = async {
            if plan.primary_name {
                reader.primary_name(address).await.map(Some)
            } else {
                Ok(None)
            }
        };
        let followers = async {
            if plan.follower_count {
                reader.follower_count(address).await.map(Some)
            } else {
                Ok(None)
            }
        };
        let follows = try_join_all(plan.follows.iter().map(|target| async move {
            let edge = reader.is_following(address, *target).await?;
            Ok::<_, ChainError>((*target, edge))
        }));
        let followed_by = try_join_all(plan.followed_by.iter().map(|source| async move {
            let edge = reader.is_following(*source, address).await?;
            Ok::<_, ChainError>((*source, edge))
        }));

        let (
            native,
            fungible,
            nft_counts,
            nft_owners,
            multi,
            names,
            primary,
            followers,
            follows,
            followed_by,
        ) = tokio::try_join!(
            native,
            fungible,
            nft_counts,
            nft_owners,
            multi,
            names,
            primary,
            followers,
            follows,
            followed_by
        )?;

        let mut snapshot = WalletSnapshot::new(address);
        snapshot.native_balance = native;
        snapshot.fungible_balances = fungible.into_iter().collect();
        snapshot.nft_counts = nft_counts.into_iter().collect();
        snapshot.nft_owners = nft_owners.into_iter().collect();
        snapshot.multi_balances = multi.into_iter().collect();
        snapshot.resolved_names = names.into_iter().collect();
        snapshot.primary_name = primary;
        snapshot.follower_count = followers;
        snapshot.follows = follows.into_iter().collect();
        snapshot.followed_by = followed_by.into_iter().collect();

        debug!(
            %chain,
            %address,
            reads = plan.read_count(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "snapshot collected"
        );
        Ok(snapshot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::MockChainReader;
    use crate::gating::{Amount, TokenId};

    fn addr(byte: u8) -> Address {
        Address::from_bytes([byte; 20])
    }

    fn collector(reader: Arc<MockChainReader>) -> SnapshotCollector {
        SnapshotCollector::new().with_reader(reader)
    }

    #[tokio::test]
    async fn test_collects_only_planned_reads() {
        let reader = Arc::new(MockChainReader::new(Chain::Ethereum));
        reader
            .update(|s| {
                s.account_mut(addr(1)).native_balance = Amount(5);
                s.account_mut(addr(1)).fungible.insert(addr(9), Amount(7));
                s.set_nft_owner(addr(8), TokenId::from_u128(3), addr(1));
            })
            .unwrap();

        let mut plan = SnapshotPlan::new();
        plan.fungible_balances.insert(addr(9));
        plan.nft_owners.insert((addr(8), TokenId::from_u128(3)));

        let snapshot = collector(reader.clone())
            .collect(Chain::Ethereum, addr(1), &plan)
            .await
            .unwrap();

        assert_eq!(snapshot.native_balance, None);
        assert_eq!(snapshot.fungible_balances[&addr(9)], Amount(7));
        assert_eq!(
            snapshot.nft_owners[&(addr(8), TokenId::from_u128(3))],
            Some(addr(1))
        );
        assert_eq!(reader.read_count(), 2);
    }

    #[tokio::test]
    async fn test_follow_edges_in_both_directions() {
        let reader = Arc::new(MockChainReader::new(Chain::Lukso));
        reader
            .update(|s| {
                s.account_mut(addr(1)).following.insert(addr(2));
                s.account_mut(addr(3)).following.insert(addr(1));
            })
            .unwrap();

        let mut plan = SnapshotPlan::new();
        plan.follower_count = true;
        plan.follows.insert(addr(2));
        plan.followed_by.insert(addr(3));
        plan.followed_by.insert(addr(4));

        let snapshot = collector(reader)
            .collect(Chain::Lukso, addr(1), &plan)
            .await
            .unwrap();
        assert_eq!(snapshot.follower_count, Some(1));
        assert_eq!(snapshot.follows[&addr(2)], true);
        assert_eq!(snapshot.followed_by[&addr(3)], true);
        assert_eq!(snapshot.followed_by[&addr(4)], false);
    }

    #[tokio::test]
    async fn test_read_failure_fails_collection() {
        let reader = Arc::new(MockChainReader::new(Chain::Ethereum));
        reader.set_offline(true);
        let mut plan = SnapshotPlan::new();
        plan.native_balance = true;

        let result = collector(reader).collect(Chain::Ethereum, addr(1), &plan).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_missing_reader_is_unsupported() {
        let result = SnapshotCollector::new()
            .collect(Chain::Lukso, addr(1), &SnapshotPlan::new())
            .await;
        assert!(matches!(result, Err(ChainError::Unsupported { .. })));
    }
}
