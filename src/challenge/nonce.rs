//! Single-use challenge nonces.
//!
//! ## Invariants
//!
//! - Only the SHA-256 hash of a nonce is stored
//! - A nonce is consumed at most once, whether or not it has expired
//! - Lookup compares hashes in constant time

use std::collections::HashMap;
use std::sync::RwLock;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::crypto::{constant_time_str_eq, generate_token, hash_token};
use crate::gating::{Address, GatingError, GatingResult};

/// A (category, address) pair the client asked to prove
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ClaimTarget {
    pub category_type: String,
    pub address: Address,
}

/// What a nonce was issued for
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChallengeRecord {
    pub post_id: String,
    pub claims: Vec<ClaimTarget>,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl ChallengeRecord {
    pub fn is_expired(&self) -> bool {
        self.expires_at <= Utc::now()
    }
}

/// Outstanding challenges keyed by nonce hash
pub struct NonceStore {
    records: RwLock<HashMap<String, ChallengeRecord>>,
    ttl: Duration,
}

impl Default for NonceStore {
    fn default() -> Self {
        Self::new(Duration::minutes(5))
    }
}

impl NonceStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            records: RwLock::new(HashMap::new()),
            ttl,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Issue a nonce (stores hash, returns raw nonce)
    pub fn issue(
        &self,
        post_id: &str,
        claims: Vec<ClaimTarget>,
    ) -> GatingResult<(String, ChallengeRecord)> {
        let raw_nonce = generate_token();
        let issued_at = Utc::now();
        let record = ChallengeRecord {
            post_id: post_id.to_string(),
            claims,
            issued_at,
            expires_at: issued_at + self.ttl,
        };

        self.records
            .write()
            .map_err(|_| GatingError::StorageError("Lock poisoned".to_string()))?
            .insert(hash_token(&raw_nonce), record.clone());
        Ok((raw_nonce, record))
    }

    /// Remove the nonce and return its record if it was live
    pub fn consume(&self, raw_nonce: &str) -> GatingResult<ChallengeRecord> {
        let nonce_hash = hash_token(raw_nonce);
        let mut records = self
            .records
            .write()
            .map_err(|_| GatingError::StorageError("Lock poisoned".to_string()))?;

        let key = records
            .keys()
            .find(|stored| constant_time_str_eq(stored, &nonce_hash))
            .cloned()
            .ok_or(GatingError::InvalidNonce)?;
        let record = records.remove(&key).ok_or(GatingError::InvalidNonce)?;

        if record.is_expired() {
            return Err(GatingError::InvalidNonce);
        }
        Ok(record)
    }

    /// Drop expired records, returning how many were removed
    pub fn purge_expired(&self) -> GatingResult<usize> {
        let now = Utc::now();
        let mut records = self
            .records
            .write()
            .map_err(|_| GatingError::StorageError("Lock poisoned".to_string()))?;
        let before = records.len();
        records.retain(|_, record| record.expires_at > now);
        Ok(before - records.len())
    }

    pub fn len(&self) -> usize {
        self.records.read().map(|r| r.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn claim() -> Vec<ClaimTarget> {
        vec![ClaimTarget {
            category_type: "ethereum_profile".to_string(),
            address: Address::from_bytes([1; 20]),
        }]
    }

    #[test]
    fn test_nonce_is_single_use() {
        let store = NonceStore::default();
        let (nonce, issued) = store.issue("post-1", claim()).unwrap();

        let record = store.consume(&nonce).unwrap();
        assert_eq!(record, issued);
        assert!(matches!(store.consume(&nonce), Err(GatingError::InvalidNonce)));
    }

    #[test]
    fn test_unknown_nonce_rejected() {
        let store = NonceStore::default();
        store.issue("post-1", claim()).unwrap();
        assert!(matches!(store.consume("nope"), Err(GatingError::InvalidNonce)));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_expired_nonce_rejected_and_removed() {
        let store = NonceStore::new(Duration::zero());
        let (nonce, _) = store.issue("post-1", claim()).unwrap();
        assert!(matches!(store.consume(&nonce), Err(GatingError::InvalidNonce)));
        assert!(store.is_empty());
    }

    #[test]
    fn test_purge_expired() {
        let store = NonceStore::new(Duration::zero());
        store.issue("post-1", claim()).unwrap();
        store.issue("post-2", claim()).unwrap();
        assert_eq!(store.purge_expired().unwrap(), 2);
        assert!(store.is_empty());
    }

    #[test]
    fn test_only_hash_is_stored() {
        let store = NonceStore::default();
        let (nonce, _) = store.issue("post-1", claim()).unwrap();
        let records = store.records.read().unwrap();
        assert!(!records.contains_key(&nonce));
        assert!(records.contains_key(&hash_token(&nonce)));
    }
}
