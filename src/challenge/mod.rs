//! # Challenge-Response
//!
//! Proves that the caller controls the addresses they claim before the
//! server re-verifies gating requirements for them.
//!
//! 1. Client requests a challenge for a set of (category, address) claims
//! 2. Server issues one nonce and one [`ChallengeMessage`] per claim
//! 3. Each wallet signs its message with `personal_sign`
//! 4. Client submits the nonce and signatures; the nonce is consumed first
//!
//! ## Invariants
//!
//! - Nonces are single-use and expire after `nonce_ttl_secs`
//! - Submitted claims must be exactly the challenged claims

pub mod message;
pub mod nonce;
pub mod signature;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::gating::Address;

pub use message::ChallengeMessage;
pub use nonce::{ChallengeRecord, ClaimTarget, NonceStore};
pub use signature::{SignatureKind, SignatureVerifier};

/// Challenge configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChallengeConfig {
    /// Shown at the top of every message
    pub domain: String,
    pub nonce_ttl_secs: u64,
}

impl ChallengeConfig {
    pub fn nonce_ttl(&self) -> chrono::Duration {
        crate::config::ttl_from_secs(self.nonce_ttl_secs)
    }
}

impl Default for ChallengeConfig {
    fn default() -> Self {
        Self {
            domain: "localhost".to_string(),
            nonce_ttl_secs: 300,
        }
    }
}

/// Request body for a challenge
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ChallengeRequest {
    pub claims: Vec<ClaimTarget>,
}

/// Message to be signed for one claim
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChallengeEntry {
    pub category_type: String,
    pub address: Address,
    pub message: String,
}

/// Issued challenge
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChallengeResponse {
    pub nonce: String,
    pub expires_at: DateTime<Utc>,
    pub messages: Vec<ChallengeEntry>,
}

/// One signed claim
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SignedClaim {
    pub category_type: String,
    pub address: Address,
    /// 65-byte `r || s || v` hex
    pub signature: String,
}

/// Request body for verification
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct VerifyRequest {
    pub nonce: String,
    pub claims: Vec<SignedClaim>,
}
