//! # Gating Categories
//!
//! A category groups the requirements checked against one connected
//! account (an Ethereum wallet, a Universal Profile). Each category owns
//! the parsing, planning, evaluation and labelling of its requirement
//! kinds; the registry stores them behind [`GatingCategory`].
//!
//! Concrete categories implement the typed [`Requirement`] trait and are
//! lifted into `dyn GatingCategory` by [`TypedCategory`].

use std::fmt;
use std::marker::PhantomData;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::address::Address;
use super::errors::{GatingError, GatingResult};
use super::snapshot::{SnapshotPlan, WalletSnapshot};
use crate::chain::Chain;

/// Whether one or every item must be satisfied
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Fulfillment {
    Any,
    #[default]
    All,
}

impl Fulfillment {
    /// Combine pass/fail outcomes. An empty set is satisfied in both modes.
    pub fn evaluate<I: IntoIterator<Item = bool>>(&self, outcomes: I) -> bool {
        let mut seen = false;
        let mut any = false;
        let mut all = true;
        for passed in outcomes {
            seen = true;
            any |= passed;
            all &= passed;
        }
        if !seen {
            return true;
        }
        match self {
            Fulfillment::Any => any,
            Fulfillment::All => all,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Fulfillment::Any => "any",
            Fulfillment::All => "all",
        }
    }
}

impl fmt::Display for Fulfillment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of checking one requirement against a snapshot
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Check {
    Pass,
    Fail(String),
    /// The datum was not part of the snapshot
    Unavailable,
}

impl Check {
    pub fn from_bool(passed: bool, reason: impl FnOnce() -> String) -> Self {
        if passed {
            Check::Pass
        } else {
            Check::Fail(reason())
        }
    }
}

/// A typed requirement of one category
pub trait Requirement: DeserializeOwned + Serialize + Send + Sync + 'static {
    /// Serialized `type` tag
    fn kind(&self) -> &'static str;

    /// Reject values that parse but cannot be evaluated meaningfully
    fn validate(&self) -> Result<(), String>;

    /// Add the reads this requirement needs
    fn plan(&self, plan: &mut SnapshotPlan);

    fn check(&self, snapshot: &WalletSnapshot) -> Check;

    /// Human-readable label shown next to the pass/fail indicator
    fn label(&self) -> String;
}

/// Parsed category configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CategoryConfig<R> {
    #[serde(default)]
    pub fulfillment: Fulfillment,
    #[serde(default = "Vec::new")]
    pub requirements: Vec<R>,
}

/// Result of one requirement
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RequirementResult {
    pub index: usize,
    pub kind: String,
    pub label: String,
    pub passed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// Result of one category for one address
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CategoryVerification {
    pub category_type: String,
    pub address: Address,
    pub fulfillment: Fulfillment,
    pub requirements: Vec<RequirementResult>,
    pub passed: bool,
}

impl CategoryVerification {
    pub fn passed_count(&self) -> usize {
        self.requirements.iter().filter(|r| r.passed).count()
    }
}

/// Static description of a category, as listed to clients
#[derive(Debug, Clone, Serialize)]
pub struct CategoryInfo {
    pub category_type: &'static str,
    pub display_name: &'static str,
    pub chain: Chain,
    pub requirement_kinds: &'static [&'static str],
}

/// A gating category as stored in the registry
pub trait GatingCategory: Send + Sync {
    fn info(&self) -> CategoryInfo;

    fn category_type(&self) -> &'static str {
        self.info().category_type
    }

    fn chain(&self) -> Chain {
        self.info().chain
    }

    /// Parse and validate a raw config
    fn validate(&self, config: &Value) -> GatingResult<()>;

    /// Reads needed for the config
    fn plan(&self, config: &Value) -> GatingResult<SnapshotPlan>;

    /// Evaluate the config against a snapshot
    fn verify(&self, config: &Value, snapshot: &WalletSnapshot)
        -> GatingResult<CategoryVerification>;

    /// Labels of the configured requirements, in order
    fn describe(&self, config: &Value) -> GatingResult<Vec<String>>;
}

/// Adapter from a typed [`Requirement`] enum to [`GatingCategory`]
pub struct TypedCategory<R> {
    info: CategoryInfo,
    _requirement: PhantomData<fn() -> R>,
}

impl<R: Requirement> TypedCategory<R> {
    pub fn new(info: CategoryInfo) -> Self {
        Self {
            info,
            _requirement: PhantomData,
        }
    }

    fn parse(&self, config: &Value) -> GatingResult<CategoryConfig<R>> {
        let parsed: CategoryConfig<R> = serde_json::from_value(config.clone())
            .map_err(|e| GatingError::invalid_config(self.info.category_type, e.to_string()))?;
        for (index, requirement) in parsed.requirements.iter().enumerate() {
            requirement.validate().map_err(|reason| {
                GatingError::invalid_config(
                    self.info.category_type,
                    format!("requirement {} ({}): {}", index, requirement.kind(), reason),
                )
            })?;
        }
        Ok(parsed)
    }
}

impl<R: Requirement> GatingCategory for TypedCategory<R> {
    fn info(&self) -> CategoryInfo {
        self.info.clone()
    }

    fn validate(&self, config: &Value) -> GatingResult<()> {
        self.parse(config).map(|_| ())
    }

    fn plan(&self, config: &Value) -> GatingResult<SnapshotPlan> {
        let parsed = self.parse(config)?;
        let mut plan = SnapshotPlan::new();
        for requirement in &parsed.requirements {
            requirement.plan(&mut plan);
        }
        Ok(plan)
    }

    fn verify(
        &self,
        config: &Value,
        snapshot: &WalletSnapshot,
    ) -> GatingResult<CategoryVerification> {
        let parsed = self.parse(config)?;
        let requirements: Vec<RequirementResult> = parsed
            .requirements
            .iter()
            .enumerate()
            .map(|(index, requirement)| {
                let (passed, reason) = match requirement.check(snapshot) {
                    Check::Pass => (true, None),
                    Check::Fail(reason) => (false, Some(reason)),
                    Check::Unavailable => (false, Some("data unavailable".to_string())),
                };
                RequirementResult {
                    index,
                    kind: requirement.kind().to_string(),
                    label: requirement.label(),
                    passed,
                    reason,
                }
            })
            .collect();

        let passed = parsed
            .fulfillment
            .evaluate(requirements.iter().map(|r| r.passed));

        Ok(CategoryVerification {
            category_type: self.info.category_type.to_string(),
            address: snapshot.address,
            fulfillment: parsed.fulfillment,
            requirements,
            passed,
        })
    }

    fn describe(&self, config: &Value) -> GatingResult<Vec<String>> {
        let parsed = self.parse(config)?;
        Ok(parsed.requirements.iter().map(|r| r.label()).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fulfillment_any() {
        assert!(Fulfillment::Any.evaluate([false, true, false]));
        assert!(!Fulfillment::Any.evaluate([false, false]));
    }

    #[test]
    fn test_fulfillment_all() {
        assert!(Fulfillment::All.evaluate([true, true]));
        assert!(!Fulfillment::All.evaluate([true, false]));
    }

    #[test]
    fn test_empty_set_is_satisfied() {
        assert!(Fulfillment::Any.evaluate(Vec::<bool>::new()));
        assert!(Fulfillment::All.evaluate(Vec::<bool>::new()));
    }

    #[test]
    fn test_fulfillment_serde() {
        assert_eq!(serde_json::to_string(&Fulfillment::Any).unwrap(), "\"any\"");
        let f: Fulfillment = serde_json::from_str("\"all\"").unwrap();
        assert_eq!(f, Fulfillment::All);
    }
}
