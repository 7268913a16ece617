//! Read plans and the wallet state collected for them.
//!
//! A [`SnapshotPlan`] lists the reads a requirement set needs; the
//! collector turns it into a [`WalletSnapshot`]. Keyed maps only hold
//! entries that were actually read, so verifiers can tell "not read" from
//! "read and zero".

use std::collections::{BTreeMap, BTreeSet};

use super::address::{Address, Amount, TokenId};

/// Reads required to evaluate a requirement set for one address
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SnapshotPlan {
    pub native_balance: bool,
    pub fungible_balances: BTreeSet<Address>,
    pub nft_counts: BTreeSet<Address>,
    pub nft_owners: BTreeSet<(Address, TokenId)>,
    pub multi_balances: BTreeSet<(Address, TokenId)>,
    pub resolve_names: BTreeSet<String>,
    pub primary_name: bool,
    pub follower_count: bool,
    /// Accounts the wallet must follow
    pub follows: BTreeSet<Address>,
    /// Accounts that must follow the wallet
    pub followed_by: BTreeSet<Address>,
}

impl SnapshotPlan {
    pub fn new() -> Self {
        Self::default()
    }

    /// Union of two plans
    pub fn merge(&mut self, other: SnapshotPlan) {
        self.native_balance |= other.native_balance;
        self.fungible_balances.extend(other.fungible_balances);
        self.nft_counts.extend(other.nft_counts);
        self.nft_owners.extend(other.nft_owners);
        self.multi_balances.extend(other.multi_balances);
        self.resolve_names.extend(other.resolve_names);
        self.primary_name |= other.primary_name;
        self.follower_count |= other.follower_count;
        self.follows.extend(other.follows);
        self.followed_by.extend(other.followed_by);
    }

    /// Number of individual reads the plan will issue
    pub fn read_count(&self) -> usize {
        usize::from(self.native_balance)
            + self.fungible_balances.len()
            + self.nft_counts.len()
            + self.nft_owners.len()
            + self.multi_balances.len()
            + self.resolve_names.len()
            + usize::from(self.primary_name)
            + usize::from(self.follower_count)
            + self.follows.len()
            + self.followed_by.len()
    }

    pub fn is_empty(&self) -> bool {
        self.read_count() == 0
    }
}

/// On-chain and social state of one address on one chain
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WalletSnapshot {
    pub address: Address,
    pub native_balance: Option<Amount>,
    pub fungible_balances: BTreeMap<Address, Amount>,
    pub nft_counts: BTreeMap<Address, Amount>,
    /// `None` value: token has no owner (never minted or burned)
    pub nft_owners: BTreeMap<(Address, TokenId), Option<Address>>,
    pub multi_balances: BTreeMap<(Address, TokenId), Amount>,
    /// Lowercased name -> resolved address
    pub resolved_names: BTreeMap<String, Option<Address>>,
    /// Outer `None`: not read. Inner `None`: no primary name set.
    pub primary_name: Option<Option<String>>,
    pub follower_count: Option<u64>,
    pub follows: BTreeMap<Address, bool>,
    pub followed_by: BTreeMap<Address, bool>,
}

impl WalletSnapshot {
    pub fn new(address: Address) -> Self {
        Self {
            address,
            native_balance: None,
            fungible_balances: BTreeMap::new(),
            nft_counts: BTreeMap::new(),
            nft_owners: BTreeMap::new(),
            multi_balances: BTreeMap::new(),
            resolved_names: BTreeMap::new(),
            primary_name: None,
            follower_count: None,
            follows: BTreeMap::new(),
            followed_by: BTreeMap::new(),
        }
    }
}
