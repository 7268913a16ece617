//! # Verification Service
//!
//! Ties locks, chain reads, challenges and credentials together.
//!
//! ## Invariants
//!
//! - The nonce is consumed before any other verification step
//! - Re-verification uses only state read by the server
//! - Enabled categories without a verified address count as failed
//! - Access requires an active credential for the same post and the lock
//!   fingerprint currently in force

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures_util::future::try_join_all;
use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

use super::token::{CredentialTokenConfig, CredentialTokenManager};
use super::{CredentialRepository, VerifiedCredential};
use crate::chain::SnapshotCollector;
use crate::challenge::signature::parse_signature;
use crate::challenge::{
    ChallengeConfig, ChallengeEntry, ChallengeMessage, ChallengeRecord, ChallengeResponse,
    ClaimTarget, NonceStore, SignatureVerifier, VerifyRequest,
};
use crate::gating::{
    aggregate, Address, CategoryInfo, CategoryRegistry, CategoryVerification, GatingError,
    GatingLock, GatingResult, LockRepository, VerificationStatus,
};
use crate::observability::{Event, MetricsRegistry};

const MAX_POST_ID_LEN: usize = 256;

/// Successful verification
#[derive(Debug, Clone, Serialize)]
pub struct VerifyResponse {
    pub token: String,
    pub token_type: String,
    pub expires_at: DateTime<Utc>,
    pub credential: VerifiedCredential,
    pub status: VerificationStatus,
}

/// Outcome of an access check
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AccessDecision {
    pub can_comment: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub credential_id: Option<Uuid>,
}

fn validate_post_id(post_id: &str) -> GatingResult<()> {
    if post_id.is_empty() {
        return Err(GatingError::InvalidPostId("empty".to_string()));
    }
    if post_id.len() > MAX_POST_ID_LEN {
        return Err(GatingError::InvalidPostId(format!(
            "longer than {} bytes",
            MAX_POST_ID_LEN
        )));
    }
    if post_id.chars().any(char::is_control) {
        return Err(GatingError::InvalidPostId(
            "contains control characters".to_string(),
        ));
    }
    Ok(())
}

/// Gating service combining lock storage, verification and credentials
pub struct VerificationService<L: LockRepository, C: CredentialRepository> {
    registry: CategoryRegistry,
    locks: L,
    credentials: C,
    collector: SnapshotCollector,
    signatures: SignatureVerifier,
    nonces: NonceStore,
    tokens: CredentialTokenManager,
    challenge: ChallengeConfig,
    metrics: Arc<MetricsRegistry>,
}

impl<L: LockRepository, C: CredentialRepository> VerificationService<L, C> {
    pub fn new(
        registry: CategoryRegistry,
        locks: L,
        credentials: C,
        collector: SnapshotCollector,
        token_config: CredentialTokenConfig,
        challenge: ChallengeConfig,
    ) -> Self {
        Self::with_metrics(
            registry,
            locks,
            credentials,
            collector,
            token_config,
            challenge,
            Arc::new(MetricsRegistry::new()),
        )
    }

    pub fn with_metrics(
        registry: CategoryRegistry,
        locks: L,
        credentials: C,
        collector: SnapshotCollector,
        token_config: CredentialTokenConfig,
        challenge: ChallengeConfig,
        metrics: Arc<MetricsRegistry>,
    ) -> Self {
        let nonce_ttl = challenge.nonce_ttl();
        Self {
            registry,
            locks,
            credentials,
            signatures: SignatureVerifier::new(collector.clone()),
            collector,
            nonces: NonceStore::new(nonce_ttl),
            tokens: CredentialTokenManager::new(token_config),
            challenge,
            metrics,
        }
    }

    pub fn metrics(&self) -> &Arc<MetricsRegistry> {
        &self.metrics
    }

    /// Registered categories
    pub fn categories(&self) -> Vec<CategoryInfo> {
        self.registry.list()
    }

    // ==================
    // Locks
    // ==================

    /// Validate and store a lock, returning its fingerprint
    pub fn set_lock(&self, post_id: &str, lock: GatingLock) -> GatingResult<String> {
        validate_post_id(post_id)?;
        lock.validate(&self.registry)?;
        let fingerprint = lock.fingerprint();
        let categories = lock.enabled_categories().count();
        self.locks.put(post_id, lock)?;
        self.metrics.increment_locks_updated();
        info!(event = Event::LockSet.as_str(), post_id, %fingerprint, categories, "lock stored");
        Ok(fingerprint)
    }

    pub fn get_lock(&self, post_id: &str) -> GatingResult<GatingLock> {
        self.locks
            .get(post_id)?
            .ok_or_else(|| GatingError::LockNotFound(post_id.to_string()))
    }

    /// Remove a lock and revoke the post's credentials
    pub fn remove_lock(&self, post_id: &str) -> GatingResult<()> {
        if !self.locks.delete(post_id)? {
            return Err(GatingError::LockNotFound(post_id.to_string()));
        }
        let revoked = self.credentials.revoke_all_for_post(post_id)?;
        self.metrics.increment_locks_updated();
        info!(event = Event::LockRemoved.as_str(), post_id, revoked, "lock removed");
        Ok(())
    }

    // ==================
    // Verification
    // ==================

    /// Evaluate every enabled lock category that has an address
    async fn evaluate(
        &self,
        lock: &GatingLock,
        addresses: &BTreeMap<String, Address>,
    ) -> GatingResult<VerificationStatus> {
        for category_type in addresses.keys() {
            if lock.category(category_type).is_none() {
                return Err(GatingError::ClaimMismatch(format!(
                    "category '{}' is not part of this lock",
                    category_type
                )));
            }
        }

        let checks = lock.enabled_categories().filter_map(|entry| {
            let address = *addresses.get(&entry.category_type)?;
            Some(async move {
                let category = self.registry.get(&entry.category_type)?;
                let plan = category.plan(&entry.config)?;
                let snapshot = self
                    .collector
                    .collect(category.chain(), address, &plan)
                    .await
                    .map_err(|e| {
                        self.metrics.increment_chain_errors();
                        warn!(
                            event = Event::ChainReadFailed.as_str(),
                            category = entry.category_type.as_str(),
                            %address,
                            error = %e,
                            "snapshot collection failed"
                        );
                        GatingError::from(e)
                    })?;
                category.verify(&entry.config, &snapshot)
            })
        });
        let results: Vec<CategoryVerification> = try_join_all(checks).await?;
        Ok(aggregate(lock, &results))
    }

    /// Status for the supplied addresses without any signature
    pub async fn pre_verify(
        &self,
        post_id: &str,
        addresses: &BTreeMap<String, Address>,
    ) -> GatingResult<VerificationStatus> {
        validate_post_id(post_id)?;
        self.metrics.increment_status_checks();
        let Some(lock) = self.locks.get(post_id)? else {
            return Ok(VerificationStatus::ungated());
        };
        let status = self.evaluate(&lock, addresses).await?;
        info!(
            event = Event::StatusChecked.as_str(),
            post_id,
            can_comment = status.can_comment,
            message = status.message.as_str(),
        );
        Ok(status)
    }

    /// Issue a nonce and one message per claim
    pub fn issue_challenge(
        &self,
        post_id: &str,
        claims: Vec<ClaimTarget>,
    ) -> GatingResult<ChallengeResponse> {
        validate_post_id(post_id)?;
        let lock = self.get_lock(post_id)?;
        if claims.is_empty() {
            return Err(GatingError::ClaimMismatch("no claims".to_string()));
        }
        let mut seen = BTreeSet::new();
        for claim in &claims {
            match lock.category(&claim.category_type) {
                Some(entry) if entry.enabled => {}
                _ => {
                    return Err(GatingError::ClaimMismatch(format!(
                        "category '{}' is not enabled for this post",
                        claim.category_type
                    )))
                }
            }
            if !seen.insert(claim.category_type.as_str()) {
                return Err(GatingError::ClaimMismatch(format!(
                    "category '{}' claimed twice",
                    claim.category_type
                )));
            }
        }

        let (nonce, record) = self.nonces.issue(post_id, claims)?;
        let messages = record
            .claims
            .iter()
            .map(|claim| ChallengeEntry {
                category_type: claim.category_type.clone(),
                address: claim.address,
                message: self.challenge_message(&record, &nonce, claim).render(),
            })
            .collect();

        self.metrics.increment_challenges();
        info!(
            event = Event::ChallengeIssued.as_str(),
            post_id,
            claims = record.claims.len(),
            expires_at = %record.expires_at,
        );
        Ok(ChallengeResponse {
            nonce,
            expires_at: record.expires_at,
            messages,
        })
    }

    fn challenge_message(
        &self,
        record: &ChallengeRecord,
        nonce: &str,
        claim: &ClaimTarget,
    ) -> ChallengeMessage {
        ChallengeMessage {
            domain: self.challenge.domain.clone(),
            address: claim.address,
            category_type: claim.category_type.clone(),
            post_id: record.post_id.clone(),
            nonce: nonce.to_string(),
            issued_at: record.issued_at,
            expires_at: record.expires_at,
        }
    }

    /// Check signatures, re-verify requirements and issue a credential
    pub async fn submit_verification(
        &self,
        post_id: &str,
        request: VerifyRequest,
    ) -> GatingResult<VerifyResponse> {
        let result = self.verify_and_issue(post_id, request).await;
        match &result {
            Ok(response) => {
                self.metrics.increment_verifications_passed();
                info!(
                    event = Event::VerificationPassed.as_str(),
                    post_id,
                    credential_id = %response.credential.id,
                    categories = ?response.credential.categories_passed,
                );
            }
            Err(e) => {
                self.metrics.increment_verifications_rejected();
                warn!(
                    event = Event::VerificationRejected.as_str(),
                    post_id,
                    error = %e,
                );
            }
        }
        result
    }

    async fn verify_and_issue(
        &self,
        post_id: &str,
        request: VerifyRequest,
    ) -> GatingResult<VerifyResponse> {
        let record = self.nonces.consume(&request.nonce)?;

        if record.post_id != post_id {
            return Err(GatingError::ClaimMismatch(
                "challenge was issued for another post".to_string(),
            ));
        }
        let submitted: BTreeSet<ClaimTarget> = request
            .claims
            .iter()
            .map(|c| ClaimTarget {
                category_type: c.category_type.clone(),
                address: c.address,
            })
            .collect();
        let challenged: BTreeSet<ClaimTarget> = record.claims.iter().cloned().collect();
        if request.claims.len() != record.claims.len() || submitted != challenged {
            return Err(GatingError::ClaimMismatch(
                "submitted claims differ from the challenge".to_string(),
            ));
        }

        let lock = self.get_lock(post_id)?;

        let signature_checks = request.claims.iter().map(|claim| {
            let target = ClaimTarget {
                category_type: claim.category_type.clone(),
                address: claim.address,
            };
            let message = self.challenge_message(&record, &request.nonce, &target).render();
            async move {
                let category = self.registry.get(&claim.category_type)?;
                let signature = parse_signature(&claim.signature)?;
                self.signatures
                    .verify(category.chain(), &message, claim.address, &signature)
                    .await
            }
        });
        try_join_all(signature_checks).await?;

        let addresses: BTreeMap<String, Address> = request
            .claims
            .iter()
            .map(|c| (c.category_type.clone(), c.address))
            .collect();
        let status = self.evaluate(&lock, &addresses).await?;
        if !status.can_comment {
            return Err(GatingError::RequirementsNotMet(status.message));
        }

        let credential = VerifiedCredential {
            id: Uuid::new_v4(),
            post_id: post_id.to_string(),
            addresses,
            categories_passed: status.passed_types(),
            lock_fingerprint: lock.fingerprint(),
            verified_at: Utc::now(),
            expires_at: self.tokens.expiration(),
            revoked: false,
        };
        self.credentials.create(&credential)?;
        let token = self.tokens.generate(&credential)?;
        info!(
            event = Event::CredentialIssued.as_str(),
            post_id,
            credential_id = %credential.id,
            expires_at = %credential.expires_at,
        );

        Ok(VerifyResponse {
            token,
            token_type: "bearer".to_string(),
            expires_at: credential.expires_at,
            credential,
            status,
        })
    }

    // ==================
    // Access
    // ==================

    /// Whether the bearer of `token` may comment on `post_id`
    pub fn check_access(&self, post_id: &str, token: Option<&str>) -> GatingResult<AccessDecision> {
        let result = self.authorize(post_id, token);
        self.metrics.increment_access(result.is_ok());
        match &result {
            Ok(decision) => info!(
                event = Event::AccessGranted.as_str(),
                post_id,
                credential_id = ?decision.credential_id,
            ),
            Err(e) => warn!(event = Event::AccessDenied.as_str(), post_id, error = %e),
        }
        result
    }

    fn authorize(&self, post_id: &str, token: Option<&str>) -> GatingResult<AccessDecision> {
        let lock = match self.locks.get(post_id)? {
            Some(lock) if lock.is_gated() => lock,
            _ => {
                return Ok(AccessDecision {
                    can_comment: true,
                    credential_id: None,
                })
            }
        };

        let token = token.ok_or(GatingError::CredentialInvalid)?;
        let claims = self.tokens.validate(token)?;
        if claims.post != post_id {
            return Err(GatingError::CredentialScope);
        }

        let credential = self
            .credentials
            .find_by_id(claims.credential_id()?)?
            .ok_or(GatingError::CredentialInvalid)?;
        if credential.revoked {
            return Err(GatingError::CredentialRevoked);
        }
        if credential.is_expired() {
            return Err(GatingError::TokenExpired);
        }
        if credential.post_id != post_id {
            return Err(GatingError::CredentialScope);
        }
        if credential.lock_fingerprint != lock.fingerprint() {
            return Err(GatingError::LockChanged);
        }

        Ok(AccessDecision {
            can_comment: true,
            credential_id: Some(credential.id),
        })
    }

    pub fn revoke_credential(&self, id: Uuid) -> GatingResult<()> {
        self.credentials.revoke(id)?;
        self.metrics.increment_credentials_revoked();
        info!(event = Event::CredentialRevoked.as_str(), credential_id = %id);
        Ok(())
    }

    /// Drop expired nonces and credentials, returning (nonces, credentials)
    pub fn purge_expired(&self) -> GatingResult<(usize, usize)> {
        let nonces = self.nonces.purge_expired()?;
        let credentials = self.credentials.delete_expired()?;
        Ok((nonces, credentials))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::{Chain, MockChainReader};
    use crate::challenge::signature::{address_of, sign_personal_message};
    use crate::challenge::SignedClaim;
    use crate::credential::InMemoryCredentialRepository;
    use crate::gating::{Amount, Fulfillment, InMemoryLockRepository};
    use k256::ecdsa::SigningKey;
    use serde_json::json;

    type Service = VerificationService<InMemoryLockRepository, InMemoryCredentialRepository>;

    const ETH: u128 = 1_000_000_000_000_000_000;

    fn service(reader: Arc<MockChainReader>) -> Service {
        VerificationService::new(
            CategoryRegistry::with_defaults(),
            InMemoryLockRepository::new(),
            InMemoryCredentialRepository::new(),
            SnapshotCollector::new().with_reader(reader),
            CredentialTokenConfig {
                secret: "service_test_secret".to_string(),
                ..Default::default()
            },
            ChallengeConfig::default(),
        )
    }

    fn eth_lock(min: &str) -> GatingLock {
        GatingLock::new(Fulfillment::All).with_category(
            "ethereum_profile",
            json!({ "requirements": [{ "type": "eth_balance", "min": min }] }),
        )
    }

    fn funded_wallet(reader: &MockChainReader) -> (SigningKey, Address) {
        let key = SigningKey::from_slice(&[0x42; 32]).unwrap();
        let address = address_of(key.verifying_key());
        reader
            .update(|s| s.account_mut(address).native_balance = Amount(2 * ETH))
            .unwrap();
        (key, address)
    }

    async fn verify(
        service: &Service,
        key: &SigningKey,
        address: Address,
    ) -> GatingResult<VerifyResponse> {
        let challenge = service.issue_challenge(
            "post-1",
            vec![ClaimTarget {
                category_type: "ethereum_profile".to_string(),
                address,
            }],
        )?;
        let signature = sign_personal_message(key, &challenge.messages[0].message)?;
        service
            .submit_verification(
                "post-1",
                VerifyRequest {
                    nonce: challenge.nonce,
                    claims: vec![SignedClaim {
                        category_type: "ethereum_profile".to_string(),
                        address,
                        signature,
                    }],
                },
            )
            .await
    }

    #[tokio::test]
    async fn test_full_flow_grants_access() {
        let reader = Arc::new(MockChainReader::new(Chain::Ethereum));
        let (key, address) = funded_wallet(&reader);
        let service = service(reader);
        service.set_lock("post-1", eth_lock("1000000000000000000")).unwrap();

        let response = verify(&service, &key, address).await.unwrap();
        assert!(response.status.can_comment);
        assert_eq!(response.credential.categories_passed, vec!["ethereum_profile"]);

        let decision = service.check_access("post-1", Some(&response.token)).unwrap();
        assert_eq!(decision.credential_id, Some(response.credential.id));
        assert!(matches!(
            service.check_access("post-1", None),
            Err(GatingError::CredentialInvalid)
        ));
    }

    #[tokio::test]
    async fn test_requirements_not_met() {
        let reader = Arc::new(MockChainReader::new(Chain::Ethereum));
        let (key, address) = funded_wallet(&reader);
        let service = service(reader);
        service.set_lock("post-1", eth_lock("5000000000000000000")).unwrap();

        assert!(matches!(
            verify(&service, &key, address).await,
            Err(GatingError::RequirementsNotMet(_))
        ));
        assert_eq!(service.metrics().snapshot().verifications_rejected, 1);
    }

    #[tokio::test]
    async fn test_wrong_signer_rejected() {
        let reader = Arc::new(MockChainReader::new(Chain::Ethereum));
        let (_, address) = funded_wallet(&reader);
        let service = service(reader);
        service.set_lock("post-1", eth_lock("1")).unwrap();

        let other = SigningKey::from_slice(&[0x43; 32]).unwrap();
        assert!(matches!(
            verify(&service, &other, address).await,
            Err(GatingError::SignatureMismatch(_))
        ));
    }

    #[tokio::test]
    async fn test_lock_change_invalidates_credential() {
        let reader = Arc::new(MockChainReader::new(Chain::Ethereum));
        let (key, address) = funded_wallet(&reader);
        let service = service(reader);
        service.set_lock("post-1", eth_lock("1")).unwrap();
        let response = verify(&service, &key, address).await.unwrap();

        service.set_lock("post-1", eth_lock("2")).unwrap();
        assert!(matches!(
            service.check_access("post-1", Some(&response.token)),
            Err(GatingError::LockChanged)
        ));
    }

    #[tokio::test]
    async fn test_revoked_credential_denied() {
        let reader = Arc::new(MockChainReader::new(Chain::Ethereum));
        let (key, address) = funded_wallet(&reader);
        let service = service(reader);
        service.set_lock("post-1", eth_lock("1")).unwrap();
        let response = verify(&service, &key, address).await.unwrap();

        service.revoke_credential(response.credential.id).unwrap();
        assert!(matches!(
            service.check_access("post-1", Some(&response.token)),
            Err(GatingError::CredentialRevoked)
        ));
    }

    #[tokio::test]
    async fn test_ungated_post_allows_everyone() {
        let service = service(Arc::new(MockChainReader::new(Chain::Ethereum)));
        assert!(service.check_access("open-post", None).unwrap().can_comment);
        let status = service.pre_verify("open-post", &BTreeMap::new()).await.unwrap();
        assert!(status.can_comment);
        assert_eq!(status.message, "No requirements");
    }

    #[tokio::test]
    async fn test_pre_verify_fails_closed_on_chain_error() {
        let reader = Arc::new(MockChainReader::new(Chain::Ethereum));
        let (_, address) = funded_wallet(&reader);
        reader.set_offline(true);
        let service = service(reader);
        service.set_lock("post-1", eth_lock("1")).unwrap();

        let mut addresses = BTreeMap::new();
        addresses.insert("ethereum_profile".to_string(), address);
        assert!(matches!(
            service.pre_verify("post-1", &addresses).await,
            Err(GatingError::ChainUnavailable(_))
        ));
        assert_eq!(service.metrics().snapshot().chain_errors, 1);
    }

    #[test]
    fn test_challenge_rejects_foreign_category() {
        let service = service(Arc::new(MockChainReader::new(Chain::Ethereum)));
        service.set_lock("post-1", eth_lock("1")).unwrap();
        let result = service.issue_challenge(
            "post-1",
            vec![ClaimTarget {
                category_type: "universal_profile".to_string(),
                address: Address::from_bytes([1; 20]),
            }],
        );
        assert!(matches!(result, Err(GatingError::ClaimMismatch(_))));
    }

    #[test]
    fn test_post_id_validation() {
        let service = service(Arc::new(MockChainReader::new(Chain::Ethereum)));
        assert!(matches!(
            service.set_lock("", eth_lock("1")),
            Err(GatingError::InvalidPostId(_))
        ));
        assert!(matches!(
            service.set_lock("a\nb", eth_lock("1")),
            Err(GatingError::InvalidPostId(_))
        ));
    }

    #[test]
    fn test_remove_lock() {
        let service = service(Arc::new(MockChainReader::new(Chain::Ethereum)));
        service.set_lock("post-1", eth_lock("1")).unwrap();
        service.remove_lock("post-1").unwrap();
        assert!(matches!(
            service.remove_lock("post-1"),
            Err(GatingError::LockNotFound(_))
        ));
    }
}
