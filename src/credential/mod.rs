//! # Verified Credentials
//!
//! A credential records that a set of addresses satisfied a post's gating
//! lock at a point in time. Clients hold it as a signed bearer token.
//!
//! ## Invariants
//!
//! - A credential is bound to one post and to the lock fingerprint in force
//!   when it was issued
//! - Revocation takes effect immediately
//! - Credentials are only created from server-side re-verification

pub mod service;
pub mod token;

use std::collections::{BTreeMap, HashMap};
use std::sync::RwLock;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::gating::{Address, GatingError, GatingResult};

pub use service::{AccessDecision, VerificationService, VerifyResponse};
pub use token::{CredentialClaims, CredentialTokenConfig, CredentialTokenManager};

/// Proof that a wallet set passed a post's lock
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerifiedCredential {
    pub id: Uuid,
    pub post_id: String,
    /// Category type -> verified address
    pub addresses: BTreeMap<String, Address>,
    pub categories_passed: Vec<String>,
    pub lock_fingerprint: String,
    pub verified_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub revoked: bool,
}

impl VerifiedCredential {
    pub fn is_expired(&self) -> bool {
        self.expires_at <= Utc::now()
    }

    pub fn is_active(&self) -> bool {
        !self.revoked && !self.is_expired()
    }
}

/// Credential storage
pub trait CredentialRepository: Send + Sync {
    fn create(&self, credential: &VerifiedCredential) -> GatingResult<()>;

    fn find_by_id(&self, id: Uuid) -> GatingResult<Option<VerifiedCredential>>;

    /// Active credentials for a post
    fn find_for_post(&self, post_id: &str) -> GatingResult<Vec<VerifiedCredential>>;

    fn revoke(&self, id: Uuid) -> GatingResult<()>;

    /// Revoke every credential of a post, returning how many changed
    fn revoke_all_for_post(&self, post_id: &str) -> GatingResult<usize>;

    fn delete_expired(&self) -> GatingResult<usize>;
}

/// In-memory credential repository
#[derive(Debug, Default)]
pub struct InMemoryCredentialRepository {
    credentials: RwLock<HashMap<Uuid, VerifiedCredential>>,
}

impl InMemoryCredentialRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

fn poisoned<T>(_: T) -> GatingError {
    GatingError::StorageError("Lock poisoned".to_string())
}

impl CredentialRepository for InMemoryCredentialRepository {
    fn create(&self, credential: &VerifiedCredential) -> GatingResult<()> {
        let mut credentials = self.credentials.write().map_err(poisoned)?;
        credentials.insert(credential.id, credential.clone());
        Ok(())
    }

    fn find_by_id(&self, id: Uuid) -> GatingResult<Option<VerifiedCredential>> {
        let credentials = self.credentials.read().map_err(poisoned)?;
        Ok(credentials.get(&id).cloned())
    }

    fn find_for_post(&self, post_id: &str) -> GatingResult<Vec<VerifiedCredential>> {
        let credentials = self.credentials.read().map_err(poisoned)?;
        let mut found: Vec<VerifiedCredential> = credentials
            .values()
            .filter(|c| c.post_id == post_id && c.is_active())
            .cloned()
            .collect();
        found.sort_by_key(|c| c.verified_at);
        Ok(found)
    }

    fn revoke(&self, id: Uuid) -> GatingResult<()> {
        let mut credentials = self.credentials.write().map_err(poisoned)?;
        match credentials.get_mut(&id) {
            Some(credential) => {
                credential.revoked = true;
                Ok(())
            }
            None => Err(GatingError::CredentialInvalid),
        }
    }

    fn revoke_all_for_post(&self, post_id: &str) -> GatingResult<usize> {
        let mut credentials = self.credentials.write().map_err(poisoned)?;
        let mut count = 0;
        for credential in credentials.values_mut() {
            if credential.post_id == post_id && !credential.revoked {
                credential.revoked = true;
                count += 1;
            }
        }
        Ok(count)
    }

    fn delete_expired(&self) -> GatingResult<usize> {
        let mut credentials = self.credentials.write().map_err(poisoned)?;
        let before = credentials.len();
        credentials.retain(|_, c| !c.is_expired());
        Ok(before - credentials.len())
    }
}
