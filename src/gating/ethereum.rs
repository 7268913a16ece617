//! # Ethereum Profile Category
//!
//! Requirements checked against an Ethereum mainnet wallet: ENS names,
//! ETH balance, ERC-20/721/1155 holdings and Ethereum Follow Protocol
//! relationships.

use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use super::address::{Address, Amount, TokenId};
use super::category::{CategoryInfo, Check, Requirement, TypedCategory};
use super::snapshot::{SnapshotPlan, WalletSnapshot};
use crate::chain::Chain;

pub const CATEGORY_TYPE: &str = "ethereum_profile";

const KINDS: &[&str] = &[
    "ens_domain",
    "eth_balance",
    "erc20",
    "erc721",
    "erc1155",
    "efp_followers",
    "efp_must_follow",
    "efp_must_be_followed_by",
];

fn default_count() -> u64 {
    1
}

fn default_min_one() -> Amount {
    Amount(1)
}

/// Requirement kinds of the Ethereum profile category
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EthereumRequirement {
    /// Own one of `names`; an empty list accepts any primary name
    EnsDomain {
        #[serde(default)]
        names: Vec<String>,
    },
    EthBalance {
        min: Amount,
    },
    Erc20 {
        contract: Address,
        min: Amount,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        symbol: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        decimals: Option<u32>,
    },
    Erc721 {
        contract: Address,
        #[serde(default = "default_count")]
        min_count: u64,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        token_id: Option<TokenId>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        name: Option<String>,
    },
    Erc1155 {
        contract: Address,
        token_id: TokenId,
        #[serde(default = "default_min_one")]
        min: Amount,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        name: Option<String>,
    },
    EfpFollowers {
        min: u64,
    },
    EfpMustFollow {
        address: Address,
    },
    EfpMustBeFollowedBy {
        address: Address,
    },
}

fn ens_name_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        // labels without whitespace or dots, at least two labels
        Regex::new(r"^[^\s.]+(\.[^\s.]+)+$").expect("valid ENS name pattern")
    })
}

/// Lowercase and trim a name for comparison
pub fn normalize_name(name: &str) -> String {
    name.trim().to_lowercase()
}

/// Whether `name` looks like a resolvable ENS name
pub fn is_valid_ens_name(name: &str) -> bool {
    ens_name_pattern().is_match(&normalize_name(name))
}

fn token_label(contract: &Address, symbol: &Option<String>) -> String {
    match symbol {
        Some(symbol) => symbol.clone(),
        None => format!("tokens of {}", contract),
    }
}

impl Requirement for EthereumRequirement {
    fn kind(&self) -> &'static str {
        match self {
            EthereumRequirement::EnsDomain { .. } => "ens_domain",
            EthereumRequirement::EthBalance { .. } => "eth_balance",
            EthereumRequirement::Erc20 { .. } => "erc20",
            EthereumRequirement::Erc721 { .. } => "erc721",
            EthereumRequirement::Erc1155 { .. } => "erc1155",
            EthereumRequirement::EfpFollowers { .. } => "efp_followers",
            EthereumRequirement::EfpMustFollow { .. } => "efp_must_follow",
            EthereumRequirement::EfpMustBeFollowedBy { .. } => "efp_must_be_followed_by",
        }
    }

    fn validate(&self) -> Result<(), String> {
        match self {
            EthereumRequirement::EnsDomain { names } => {
                match names.iter().find(|n| !is_valid_ens_name(n)) {
                    Some(bad) => Err(format!("invalid ENS name '{}'", bad)),
                    None => Ok(()),
                }
            }
            EthereumRequirement::Erc20 { decimals, .. } => match decimals {
                Some(d) if *d > 38 => Err("decimals must be at most 38".to_string()),
                _ => Ok(()),
            },
            EthereumRequirement::Erc721 { min_count, .. } if *min_count == 0 => {
                Err("min_count must be at least 1".to_string())
            }
            EthereumRequirement::EfpMustFollow { address }
            | EthereumRequirement::EfpMustBeFollowedBy { address }
                if *address == Address::ZERO =>
            {
                Err("address must not be the zero address".to_string())
            }
            _ => Ok(()),
        }
    }

    fn plan(&self, plan: &mut SnapshotPlan) {
        match self {
            EthereumRequirement::EnsDomain { names } if names.is_empty() => {
                plan.primary_name = true;
            }
            EthereumRequirement::EnsDomain { names } => {
                plan.resolve_names
                    .extend(names.iter().map(|n| normalize_name(n)));
            }
            EthereumRequirement::EthBalance { .. } => plan.native_balance = true,
            EthereumRequirement::Erc20 { contract, .. } => {
                plan.fungible_balances.insert(*contract);
            }
            EthereumRequirement::Erc721 {
                contract,
                token_id: Some(token_id),
                ..
            } => {
                plan.nft_owners.insert((*contract, *token_id));
            }
            EthereumRequirement::Erc721 { contract, .. } => {
                plan.nft_counts.insert(*contract);
            }
            EthereumRequirement::Erc1155 {
                contract, token_id, ..
            } => {
                plan.multi_balances.insert((*contract, *token_id));
            }
            EthereumRequirement::EfpFollowers { .. } => plan.follower_count = true,
            EthereumRequirement::EfpMustFollow { address } => {
                plan.follows.insert(*address);
            }
            EthereumRequirement::EfpMustBeFollowedBy { address } => {
                plan.followed_by.insert(*address);
            }
        }
    }

    fn check(&self, snapshot: &WalletSnapshot) -> Check {
        match self {
            EthereumRequirement::EnsDomain { names } if names.is_empty() => {
                match &snapshot.primary_name {
                    None => Check::Unavailable,
                    Some(name) => Check::from_bool(name.is_some(), || {
                        "no primary ENS name set".to_string()
                    }),
                }
            }
            EthereumRequirement::EnsDomain { names } => {
                let mut missing = false;
                for name in names {
                    match snapshot.resolved_names.get(&normalize_name(name)) {
                        Some(Some(owner)) if *owner == snapshot.address => return Check::Pass,
                        Some(_) => {}
                        None => missing = true,
                    }
                }
                if missing {
                    Check::Unavailable
                } else {
                    Check::Fail("none of the listed names resolve to this wallet".to_string())
                }
            }
            EthereumRequirement::EthBalance { min } => match snapshot.native_balance {
                None => Check::Unavailable,
                Some(balance) => Check::from_bool(balance >= *min, || {
                    format!("balance is {} ETH", balance.format_units(18))
                }),
            },
            EthereumRequirement::Erc20 {
                contract, min, decimals, ..
            } => match snapshot.fungible_balances.get(contract) {
                None => Check::Unavailable,
                Some(balance) => Check::from_bool(balance >= min, || {
                    format!("balance is {}", balance.format_units(decimals.unwrap_or(0)))
                }),
            },
            EthereumRequirement::Erc721 {
                contract,
                token_id: Some(token_id),
                ..
            } => match snapshot.nft_owners.get(&(*contract, *token_id)) {
                None => Check::Unavailable,
                Some(owner) => Check::from_bool(*owner == Some(snapshot.address), || {
                    format!("token {} is not owned by this wallet", token_id)
                }),
            },
            EthereumRequirement::Erc721 {
                contract, min_count, ..
            } => match snapshot.nft_counts.get(contract) {
                None => Check::Unavailable,
                Some(count) => Check::from_bool(*count >= Amount(u128::from(*min_count)), || {
                    format!("holds {}", count)
                }),
            },
            EthereumRequirement::Erc1155 {
                contract,
                token_id,
                min,
                ..
            } => match snapshot.multi_balances.get(&(*contract, *token_id)) {
                None => Check::Unavailable,
                Some(balance) => {
                    Check::from_bool(balance >= min, || format!("holds {}", balance))
                }
            },
            EthereumRequirement::EfpFollowers { min } => match snapshot.follower_count {
                None => Check::Unavailable,
                Some(count) => {
                    Check::from_bool(count >= *min, || format!("has {} followers", count))
                }
            },
            EthereumRequirement::EfpMustFollow { address } => {
                match snapshot.follows.get(address) {
                    None => Check::Unavailable,
                    Some(follows) => {
                        Check::from_bool(*follows, || format!("does not follow {}", address))
                    }
                }
            }
            EthereumRequirement::EfpMustBeFollowedBy { address } => {
                match snapshot.followed_by.get(address) {
                    None => Check::Unavailable,
                    Some(followed) => {
                        Check::from_bool(*followed, || format!("not followed by {}", address))
                    }
                }
            }
        }
    }

    fn label(&self) -> String {
        match self {
            EthereumRequirement::EnsDomain { names } if names.is_empty() => {
                "Have an ENS name".to_string()
            }
            EthereumRequirement::EnsDomain { names } => format!("Own {}", names.join(" or ")),
            EthereumRequirement::EthBalance { min } => {
                format!("Hold at least {} ETH", min.format_units(18))
            }
            EthereumRequirement::Erc20 {
                contract,
                min,
                symbol,
                decimals,
            } => format!(
                "Hold at least {} {}",
                min.format_units(decimals.unwrap_or(0)),
                token_label(contract, symbol)
            ),
            EthereumRequirement::Erc721 {
                contract,
                token_id: Some(token_id),
                name,
                ..
            } => format!(
                "Own token #{} of {}",
                token_id,
                name.clone().unwrap_or_else(|| contract.to_string())
            ),
            EthereumRequirement::Erc721 {
                contract,
                min_count,
                name,
                ..
            } => format!(
                "Own at least {} NFT{} of {}",
                min_count,
                if *min_count == 1 { "" } else { "s" },
                name.clone().unwrap_or_else(|| contract.to_string())
            ),
            EthereumRequirement::Erc1155 {
                contract,
                token_id,
                min,
                name,
            } => format!(
                "Hold at least {} of token #{} of {}",
                min,
                token_id,
                name.clone().unwrap_or_else(|| contract.to_string())
            ),
            EthereumRequirement::EfpFollowers { min } => {
                format!("Have at least {} EFP followers", min)
            }
            EthereumRequirement::EfpMustFollow { address } => {
                format!("Follow {} on EFP", address)
            }
            EthereumRequirement::EfpMustBeFollowedBy { address } => {
                format!("Be followed by {} on EFP", address)
            }
        }
    }
}

/// The Ethereum profile category
pub fn category() -> TypedCategory<EthereumRequirement> {
    TypedCategory::new(CategoryInfo {
        category_type: CATEGORY_TYPE,
        display_name: "Ethereum Profile",
        chain: Chain::Ethereum,
        requirement_kinds: KINDS,
    })
}
