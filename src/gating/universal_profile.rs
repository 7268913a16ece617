//! # Universal Profile Category
//!
//! Requirements checked against a LUKSO Universal Profile: LYX balance,
//! LSP7 / LSP8 asset holdings and LSP26 follower relationships.

use serde::{Deserialize, Serialize};

use super::address::{Address, Amount, TokenId};
use super::category::{CategoryInfo, Check, Requirement, TypedCategory};
use super::snapshot::{SnapshotPlan, WalletSnapshot};
use crate::chain::Chain;

pub const CATEGORY_TYPE: &str = "universal_profile";

const KINDS: &[&str] = &[
    "lyx_balance",
    "lsp7",
    "lsp8",
    "followers",
    "must_follow",
    "must_be_followed_by",
];

fn default_count() -> u64 {
    1
}

/// Requirement kinds of the Universal Profile category
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum UniversalProfileRequirement {
    LyxBalance {
        min: Amount,
    },
    /// Fungible digital asset
    Lsp7 {
        contract: Address,
        min: Amount,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        symbol: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        decimals: Option<u32>,
    },
    /// Identifiable digital asset
    Lsp8 {
        contract: Address,
        #[serde(default = "default_count")]
        min_count: u64,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        token_id: Option<TokenId>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        name: Option<String>,
    },
    Followers {
        min: u64,
    },
    MustFollow {
        address: Address,
    },
    MustBeFollowedBy {
        address: Address,
    },
}

impl Requirement for UniversalProfileRequirement {
    fn kind(&self) -> &'static str {
        match self {
            UniversalProfileRequirement::LyxBalance { .. } => "lyx_balance",
            UniversalProfileRequirement::Lsp7 { .. } => "lsp7",
            UniversalProfileRequirement::Lsp8 { .. } => "lsp8",
            UniversalProfileRequirement::Followers { .. } => "followers",
            UniversalProfileRequirement::MustFollow { .. } => "must_follow",
            UniversalProfileRequirement::MustBeFollowedBy { .. } => "must_be_followed_by",
        }
    }

    fn validate(&self) -> Result<(), String> {
        match self {
            UniversalProfileRequirement::Lsp7 {
                decimals: Some(d), ..
            } if *d > 38 => Err("decimals must be at most 38".to_string()),
            UniversalProfileRequirement::Lsp8 { min_count, .. } if *min_count == 0 => {
                Err("min_count must be at least 1".to_string())
            }
            UniversalProfileRequirement::MustFollow { address }
            | UniversalProfileRequirement::MustBeFollowedBy { address }
                if *address == Address::ZERO =>
            {
                Err("address must not be the zero address".to_string())
            }
            _ => Ok(()),
        }
    }

    fn plan(&self, plan: &mut SnapshotPlan) {
        match self {
            UniversalProfileRequirement::LyxBalance { .. } => plan.native_balance = true,
            UniversalProfileRequirement::Lsp7 { contract, .. } => {
                plan.fungible_balances.insert(*contract);
            }
            UniversalProfileRequirement::Lsp8 {
                contract,
                token_id: Some(token_id),
                ..
            } => {
                plan.nft_owners.insert((*contract, *token_id));
            }
            UniversalProfileRequirement::Lsp8 { contract, .. } => {
                plan.nft_counts.insert(*contract);
            }
            UniversalProfileRequirement::Followers { .. } => plan.follower_count = true,
            UniversalProfileRequirement::MustFollow { address } => {
                plan.follows.insert(*address);
            }
            UniversalProfileRequirement::MustBeFollowedBy { address } => {
                plan.followed_by.insert(*address);
            }
        }
    }

    fn check(&self, snapshot: &WalletSnapshot) -> Check {
        match self {
            UniversalProfileRequirement::LyxBalance { min } => match snapshot.native_balance {
                None => Check::Unavailable,
                Some(balance) => Check::from_bool(balance >= *min, || {
                    format!("balance is {} LYX", balance.format_units(18))
                }),
            },
            UniversalProfileRequirement::Lsp7 {
                contract,
                min,
                decimals,
                ..
            } => match snapshot.fungible_balances.get(contract) {
                None => Check::Unavailable,
                Some(balance) => Check::from_bool(balance >= min, || {
                    format!("balance is {}", balance.format_units(decimals.unwrap_or(0)))
                }),
            },
            UniversalProfileRequirement::Lsp8 {
                contract,
                token_id: Some(token_id),
                ..
            } => match snapshot.nft_owners.get(&(*contract, *token_id)) {
                None => Check::Unavailable,
                Some(owner) => Check::from_bool(*owner == Some(snapshot.address), || {
                    format!("token {} is not owned by this profile", token_id)
                }),
            },
            UniversalProfileRequirement::Lsp8 {
                contract,
                min_count,
                ..
            } => match snapshot.nft_counts.get(contract) {
                None => Check::Unavailable,
                Some(count) => Check::from_bool(*count >= Amount(u128::from(*min_count)), || {
                    format!("holds {}", count)
                }),
            },
            UniversalProfileRequirement::Followers { min } => match snapshot.follower_count {
                None => Check::Unavailable,
                Some(count) => {
                    Check::from_bool(count >= *min, || format!("has {} followers", count))
                }
            },
            UniversalProfileRequirement::MustFollow { address } => {
                match snapshot.follows.get(address) {
                    None => Check::Unavailable,
                    Some(follows) => {
                        Check::from_bool(*follows, || format!("does not follow {}", address))
                    }
                }
            }
            UniversalProfileRequirement::MustBeFollowedBy { address } => {
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
            UniversalProfileRequirement::LyxBalance { min } => {
                format!("Hold at least {} LYX", min.format_units(18))
            }
            UniversalProfileRequirement::Lsp7 {
                contract,
                min,
                symbol,
                decimals,
            } => format!(
                "Hold at least {} {}",
                min.format_units(decimals.unwrap_or(0)),
                symbol
                    .clone()
                    .unwrap_or_else(|| format!("tokens of {}", contract))
            ),
            UniversalProfileRequirement::Lsp8 {
                contract,
                token_id: Some(token_id),
                name,
                ..
            } => format!(
                "Own asset {} of {}",
                token_id,
                name.clone().unwrap_or_else(|| contract.to_string())
            ),
            UniversalProfileRequirement::Lsp8 {
                contract,
                min_count,
                name,
                ..
            } => format!(
                "Own at least {} of {}",
                min_count,
                name.clone().unwrap_or_else(|| contract.to_string())
            ),
            UniversalProfileRequirement::Followers { min } => {
                format!("Have at least {} followers", min)
            }
            UniversalProfileRequirement::MustFollow { address } => format!("Follow {}", address),
            UniversalProfileRequirement::MustBeFollowedBy { address } => {
                format!("Be followed by {}", address)
            }
        }
    }
}

/// The Universal Profile category
pub fn category() -> TypedCategory<UniversalProfileRequirement> {
    TypedCategory::new(CategoryInfo {
        category_type: CATEGORY_TYPE,
        display_name: "Universal Profile",
        chain: Chain::Lukso,
        requirement_kinds: KINDS,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gating::category::GatingCategory;
    use serde_json::json;

    const PROFILE: &str = "0xaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa";
    const ASSET: &str = "0xbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbb";

    fn profile() -> Address {
        PROFILE.parse().unwrap()
    }

    #[test]
    fn test_lyx_label_uses_18_decimals() {
        let req = UniversalProfileRequirement::LyxBalance {
            min: Amount(250_000_000_000_000_000),
        };
        assert_eq!(req.label(), "Hold at least 0.25 LYX");
    }

    #[test]
    fn test_lsp8_specific_token_plans_owner_read() {
        let config = json!({
            "requirements": [
                { "type": "lsp8", "contract": ASSET, "token_id": "0x01" }
            ]
        });
        let plan = category().plan(&config).unwrap();
        assert_eq!(plan.nft_owners.len(), 1);
        assert!(plan.nft_counts.is_empty());
    }

    #[test]
    fn test_follow_edges() {
        let other: Address = ASSET.parse().unwrap();
        let follow = UniversalProfileRequirement::MustFollow { address: other };
        let followed = UniversalProfileRequirement::MustBeFollowedBy { address: other };

        let mut snap = WalletSnapshot::new(profile());
        snap.follows.insert(other, true);
        snap.followed_by.insert(other, false);

        assert_eq!(follow.check(&snap), Check::Pass);
        assert!(matches!(followed.check(&snap), Check::Fail(_)));
    }

    #[test]
    fn test_verify_all_mode() {
        let config = json!({
            "fulfillment": "all",
            "requirements": [
                { "type": "lsp7", "contract": ASSET, "min": "100" },
                { "type": "followers", "min": 3 }
            ]
        });
        let mut snap = WalletSnapshot::new(profile());
        snap.fungible_balances
            .insert(ASSET.parse().unwrap(), Amount(150));
        snap.follower_count = Some(3);

        let result = category().verify(&config, &snap).unwrap();
        assert!(result.passed);
        assert_eq!(result.category_type, CATEGORY_TYPE);

        snap.follower_count = Some(2);
        let result = category().verify(&config, &snap).unwrap();
        assert!(!result.passed);
    }

    #[test]
    fn test_zero_address_follow_rejected() {
        let config = json!({
            "requirements": [
                { "type": "must_follow", "address": "0x0000000000000000000000000000000000000000" }
            ]
        });
        assert!(category().validate(&config).is_err());
    }
}
