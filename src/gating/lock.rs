//! # Gating Locks
//!
//! The gating configuration attached to a post, and its storage.
//!
//! ## Invariants
//! - A lock names each category type at most once
//! - Every category config parses with its registered verifier
//! - The fingerprint changes whenever any field of the lock changes

use std::collections::{BTreeSet, HashMap};
use std::sync::RwLock;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::category::Fulfillment;
use super::errors::{GatingError, GatingResult};
use super::registry::CategoryRegistry;
use crate::crypto::sha256_base64;

fn default_enabled() -> bool {
    true
}

fn empty_config() -> Value {
    Value::Object(serde_json::Map::new())
}

/// One category inside a lock
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LockCategory {
    pub category_type: String,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default = "empty_config")]
    pub config: Value,
}

/// Gating configuration of a post
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GatingLock {
    /// How enabled categories combine
    #[serde(default)]
    pub fulfillment: Fulfillment,
    #[serde(default)]
    pub categories: Vec<LockCategory>,
}

impl GatingLock {
    pub fn new(fulfillment: Fulfillment) -> Self {
        Self {
            fulfillment,
            categories: Vec::new(),
        }
    }

    /// Builder-style category addition
    pub fn with_category(mut self, category_type: &str, config: Value) -> Self {
        self.categories.push(LockCategory {
            category_type: category_type.to_string(),
            enabled: true,
            config,
        });
        self
    }

    pub fn enabled_categories(&self) -> impl Iterator<Item = &LockCategory> {
        self.categories.iter().filter(|c| c.enabled)
    }

    pub fn category(&self, category_type: &str) -> Option<&LockCategory> {
        self.categories
            .iter()
            .find(|c| c.category_type == category_type)
    }

    /// A lock without enabled categories does not gate anything
    pub fn is_gated(&self) -> bool {
        self.enabled_categories().next().is_some()
    }

    /// Check the lock against the registry
    pub fn validate(&self, registry: &CategoryRegistry) -> GatingResult<()> {
        let mut seen = BTreeSet::new();
        for category in &self.categories {
            if !seen.insert(category.category_type.as_str()) {
                return Err(GatingError::InvalidLock(format!(
                    "category '{}' appears more than once",
                    category.category_type
                )));
            }
            registry
                .get(&category.category_type)?
                .validate(&category.config)?;
        }
        Ok(())
    }

    /// Hash of the canonical JSON form
    pub fn fingerprint(&self) -> String {
        // serde_json objects are key-sorted, so equal locks serialize equally
        let canonical = serde_json::to_vec(self).unwrap_or_default();
        sha256_base64(&canonical)
    }
}

/// Lock storage keyed by post id
pub trait LockRepository: Send + Sync {
    fn get(&self, post_id: &str) -> GatingResult<Option<GatingLock>>;

    fn put(&self, post_id: &str, lock: GatingLock) -> GatingResult<()>;

    /// Returns whether a lock was removed
    fn delete(&self, post_id: &str) -> GatingResult<bool>;
}

/// In-memory lock repository
#[derive(Debug, Default)]
pub struct InMemoryLockRepository {
    locks: RwLock<HashMap<String, GatingLock>>,
}

impl InMemoryLockRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

impl LockRepository for InMemoryLockRepository {
    fn get(&self, post_id: &str) -> GatingResult<Option<GatingLock>> {
        let locks = self
            .locks
            .read()
            .map_err(|_| GatingError::StorageError("Lock poisoned".to_string()))?;
        Ok(locks.get(post_id).cloned())
    }

    fn put(&self, post_id: &str, lock: GatingLock) -> GatingResult<()> {
        let mut locks = self
            .locks
            .write()
            .map_err(|_| GatingError::StorageError("Lock poisoned".to_string()))?;
        locks.insert(post_id.to_string(), lock);
        Ok(())
    }

    fn delete(&self, post_id: &str) -> GatingResult<bool> {
        let mut locks = self
            .locks
            .write()
            .map_err(|_| GatingError::StorageError("Lock poisoned".to_string()))?;
        Ok(locks.remove(post_id).is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_lock() -> GatingLock {
        GatingLock::new(Fulfillment::Any)
            .with_category(
                "ethereum_profile",
                json!({ "requirements": [{ "type": "eth_balance", "min": "1" }] }),
            )
            .with_category(
                "universal_profile",
                json!({ "requirements": [{ "type": "followers", "min": 1 }] }),
            )
    }

    #[test]
    fn test_valid_lock() {
        let registry = CategoryRegistry::with_defaults();
        assert!(sample_lock().validate(&registry).is_ok());
        assert!(sample_lock().is_gated());
    }

    #[test]
    fn test_duplicate_category_rejected() {
        let registry = CategoryRegistry::with_defaults();
        let lock = sample_lock().with_category("ethereum_profile", json!({}));
        assert!(matches!(
            lock.validate(&registry),
            Err(GatingError::InvalidLock(_))
        ));
    }

    #[test]
    fn test_unknown_category_rejected() {
        let registry = CategoryRegistry::with_defaults();
        let lock = GatingLock::new(Fulfillment::All).with_category("lens_profile", json!({}));
        assert!(matches!(
            lock.validate(&registry),
            Err(GatingError::UnknownCategory(_))
        ));
    }

    #[test]
    fn test_defaults_when_deserializing() {
        let lock: GatingLock =
            serde_json::from_value(json!({ "categories": [{ "category_type": "ethereum_profile" }] }))
                .unwrap();
        assert_eq!(lock.fulfillment, Fulfillment::All);
        assert!(lock.categories[0].enabled);
        assert_eq!(lock.categories[0].config, json!({}));
        assert!(lock.validate(&CategoryRegistry::with_defaults()).is_ok());
    }

    #[test]
    fn test_disabled_categories_do_not_gate() {
        let mut lock = sample_lock();
        for category in &mut lock.categories {
            category.enabled = false;
        }
        assert!(!lock.is_gated());
    }

    #[test]
    fn test_fingerprint_tracks_changes() {
        let lock = sample_lock();
        assert_eq!(lock.fingerprint(), sample_lock().fingerprint());

        let mut changed = sample_lock();
        changed.fulfillment = Fulfillment::All;
        assert_ne!(lock.fingerprint(), changed.fingerprint());
    }

    #[test]
    fn test_repository_roundtrip() {
        let repo = InMemoryLockRepository::new();
        assert!(repo.get("post-1").unwrap().is_none());

        repo.put("post-1", sample_lock()).unwrap();
        assert_eq!(repo.get("post-1").unwrap(), Some(sample_lock()));

        assert!(repo.delete("post-1").unwrap());
        assert!(!repo.delete("post-1").unwrap());
    }
}
