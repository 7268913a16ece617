//! # Credential Tokens
//!
//! HS256 JSON Web Tokens carrying a credential reference.
//!
//! ## Invariants
//!
//! - Token expiry equals the credential's expiry
//! - A valid token is necessary but not sufficient; the credential is still
//!   looked up so revocation and lock changes apply

use std::collections::BTreeMap;

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::VerifiedCredential;
use crate::gating::{Address, GatingError, GatingResult};

/// Claims of a credential token
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialClaims {
    /// Credential ID
    pub sub: String,

    /// Post the credential is valid for
    pub post: String,

    /// Category type -> verified address
    pub addr: BTreeMap<String, Address>,

    /// Lock fingerprint at issue time
    pub lock: String,

    pub iat: i64,
    pub exp: i64,
    pub aud: String,
    pub iss: String,
}

impl CredentialClaims {
    pub fn credential_id(&self) -> GatingResult<Uuid> {
        Uuid::parse_str(&self.sub).map_err(|_| GatingError::MalformedToken)
    }
}

/// Token configuration
#[derive(Debug, Clone)]
pub struct CredentialTokenConfig {
    pub secret: String,

    /// Credential and token lifetime
    pub ttl: Duration,

    pub issuer: String,
    pub audience: String,
}

impl Default for CredentialTokenConfig {
    fn default() -> Self {
        Self {
            secret: "CHANGE_THIS_SECRET_IN_PRODUCTION".to_string(),
            ttl: Duration::hours(24),
            issuer: "gatepost".to_string(),
            audience: "gatepost".to_string(),
        }
    }
}

/// Issues and validates credential tokens
#[derive(Clone)]
pub struct CredentialTokenManager {
    config: CredentialTokenConfig,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
}

impl CredentialTokenManager {
    pub fn new(config: CredentialTokenConfig) -> Self {
        let encoding_key = EncodingKey::from_secret(config.secret.as_bytes());
        let decoding_key = DecodingKey::from_secret(config.secret.as_bytes());

        Self {
            config,
            encoding_key,
            decoding_key,
        }
    }

    /// Expiry for a credential issued now
    pub fn expiration(&self) -> DateTime<Utc> {
        Utc::now() + self.config.ttl
    }

    pub fn generate(&self, credential: &VerifiedCredential) -> GatingResult<String> {
        let claims = CredentialClaims {
            sub: credential.id.to_string(),
            post: credential.post_id.clone(),
            addr: credential.addresses.clone(),
            lock: credential.lock_fingerprint.clone(),
            iat: credential.verified_at.timestamp(),
            exp: credential.expires_at.timestamp(),
            aud: self.config.audience.clone(),
            iss: self.config.issuer.clone(),
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|_| GatingError::TokenGenerationFailed)
    }

    pub fn validate(&self, token: &str) -> GatingResult<CredentialClaims> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_audience(&[&self.config.audience]);
        validation.set_issuer(&[&self.config.issuer]);
        validation.leeway = 0;

        let token_data = decode::<CredentialClaims>(token, &self.decoding_key, &validation)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => GatingError::TokenExpired,
                ErrorKind::InvalidSignature => GatingError::InvalidTokenSignature,
                _ => GatingError::MalformedToken,
            })?;

        Ok(token_data.claims)
    }
}
