//! # Configuration
//!
//! JSON configuration file with one section per concern. Every field has a
//! default, so `{}` is a valid (development) config.
//!
//! `GATEPOST_JWT_SECRET` and `GATEPOST_ADMIN_TOKEN` override the file so
//! secrets can stay out of it.

use std::fs;
use std::path::Path;

use chrono::Duration;
use reqwest::Url;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::chain::{ens, evm};
use crate::challenge::ChallengeConfig;
use crate::credential::CredentialTokenConfig;
use crate::gating::Address;
use crate::http_server::HttpServerConfig;
use crate::observability::LoggingConfig;

pub const JWT_SECRET_ENV: &str = "GATEPOST_JWT_SECRET";
pub const ADMIN_TOKEN_ENV: &str = "GATEPOST_ADMIN_TOKEN";

const DEV_SECRET: &str = "CHANGE_THIS_SECRET_IN_PRODUCTION";
const MIN_SECRET_LEN: usize = 16;

/// Longest accepted credential or nonce lifetime (10 years)
pub const MAX_TTL_SECS: u64 = 10 * 365 * 86_400;

/// Lifetime in seconds as a `Duration`, capped at [`MAX_TTL_SECS`]
pub fn ttl_from_secs(secs: u64) -> Duration {
    i64::try_from(secs.min(MAX_TTL_SECS))
        .ok()
        .and_then(Duration::try_seconds)
        .unwrap_or_else(|| Duration::days(3650))
}

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },

    #[error("Invalid config JSON: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid config: {0}")]
    Invalid(String),
}

/// Chain endpoints and contract addresses
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChainsConfig {
    /// Ethereum JSON-RPC endpoint; Ethereum categories are unavailable without it
    pub ethereum_rpc_url: Option<String>,
    /// LUKSO JSON-RPC endpoint; Universal Profile categories are unavailable without it
    pub lukso_rpc_url: Option<String>,
    pub ens_registry: Address,
    pub lsp26_registry: Address,
    pub efp_api_url: String,
    pub request_timeout_secs: u64,
}

impl Default for ChainsConfig {
    fn default() -> Self {
        Self {
            ethereum_rpc_url: None,
            lukso_rpc_url: None,
            ens_registry: parse_builtin(ens::DEFAULT_REGISTRY),
            lsp26_registry: parse_builtin(evm::LSP26_REGISTRY),
            efp_api_url: crate::chain::efp::DEFAULT_API_URL.to_string(),
            request_timeout_secs: 10,
        }
    }
}

fn parse_builtin(address: &str) -> Address {
    address.parse().unwrap_or(Address::ZERO)
}

impl ChainsConfig {
    pub fn request_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.request_timeout_secs)
    }
}

/// Credential token settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CredentialConfig {
    pub jwt_secret: String,
    pub issuer: String,
    pub audience: String,
    pub ttl_secs: u64,
}

impl Default for CredentialConfig {
    fn default() -> Self {
        Self {
            jwt_secret: DEV_SECRET.to_string(),
            issuer: "gatepost".to_string(),
            audience: "gatepost".to_string(),
            ttl_secs: 86_400,
        }
    }
}

impl CredentialConfig {
    pub fn token_config(&self) -> CredentialTokenConfig {
        CredentialTokenConfig {
            secret: self.jwt_secret.clone(),
            ttl: ttl_from_secs(self.ttl_secs),
            issuer: self.issuer.clone(),
            audience: self.audience.clone(),
        }
    }
}

/// Top-level configuration file
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GateConfig {
    pub server: HttpServerConfig,
    pub chains: ChainsConfig,
    pub credential: CredentialConfig,
    pub challenge: ChallengeConfig,
    pub logging: LoggingConfig,
}

impl GateConfig {
    /// Load from file, apply environment overrides and validate
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        let mut config: GateConfig = serde_json::from_str(&content)?;
        config.apply_overrides(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Apply overrides from a variable lookup
    pub fn apply_overrides<F: Fn(&str) -> Option<String>>(&mut self, lookup: F) {
        if let Some(secret) = lookup(JWT_SECRET_ENV).filter(|s| !s.is_empty()) {
            self.credential.jwt_secret = secret;
        }
        if let Some(token) = lookup(ADMIN_TOKEN_ENV).filter(|s| !s.is_empty()) {
            self.server.admin_token = Some(token);
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.credential.jwt_secret.len() < MIN_SECRET_LEN {
            return Err(ConfigError::Invalid(format!(
                "credential.jwt_secret must be at least {} bytes",
                MIN_SECRET_LEN
            )));
        }
        let ttls = [
            ("credential.ttl_secs", self.credential.ttl_secs),
            ("challenge.nonce_ttl_secs", self.challenge.nonce_ttl_secs),
        ];
        for (field, secs) in ttls {
            if secs == 0 || secs > MAX_TTL_SECS {
                return Err(ConfigError::Invalid(format!(
                    "{} must be between 1 and {}",
                    field, MAX_TTL_SECS
                )));
            }
        }
        if self.challenge.domain.trim().is_empty() || self.challenge.domain.contains('\n') {
            return Err(ConfigError::Invalid(
                "challenge.domain must be a single non-empty line".to_string(),
            ));
        }
        if self.chains.request_timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "chains.request_timeout_secs must be > 0".to_string(),
            ));
        }
        if matches!(&self.server.admin_token, Some(token) if token.is_empty()) {
            return Err(ConfigError::Invalid(
                "server.admin_token must not be empty".to_string(),
            ));
        }

        let urls = [
            ("chains.ethereum_rpc_url", self.chains.ethereum_rpc_url.as_deref()),
            ("chains.lukso_rpc_url", self.chains.lukso_rpc_url.as_deref()),
            ("chains.efp_api_url", Some(self.chains.efp_api_url.as_str())),
        ];
        for (field, url) in urls {
            if let Some(url) = url {
                let parsed = Url::parse(url)
                    .map_err(|e| ConfigError::Invalid(format!("{}: {}", field, e)))?;
                if !matches!(parsed.scheme(), "http" | "https") {
                    return Err(ConfigError::Invalid(format!(
                        "{} must be http or https",
                        field
                    )));
                }
            }
        }
        Ok(())
    }

    /// Whether the JWT secret is still the built-in development value
    pub fn uses_dev_secret(&self) -> bool {
        self.credential.jwt_secret == DEV_SECRET
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_empty_config_is_valid() {
        let config: GateConfig = serde_json::from_str("{}").unwrap();
        assert!(config.validate().is_ok());
        assert!(config.uses_dev_secret());
        assert_eq!(config.challenge.nonce_ttl_secs, 300);
        assert_eq!(
            config.chains.ens_registry.to_checksum(),
            ens::DEFAULT_REGISTRY
        );
    }

    #[test]
    fn test_env_overrides() {
        let mut vars = HashMap::new();
        vars.insert(JWT_SECRET_ENV, "override_secret_value_123");
        vars.insert(ADMIN_TOKEN_ENV, "admin");

        let mut config = GateConfig::default();
        config.apply_overrides(|key| vars.get(key).map(|v| v.to_string()));
        assert_eq!(config.credential.jwt_secret, "override_secret_value_123");
        assert_eq!(config.server.admin_token.as_deref(), Some("admin"));
    }

    #[test]
    fn test_validation_failures() {
        let mut config = GateConfig::default();
        config.credential.jwt_secret = "short".to_string();
        assert!(config.validate().is_err());

        let mut config = GateConfig::default();
        config.challenge.nonce_ttl_secs = 0;
        assert!(config.validate().is_err());

        let mut config = GateConfig::default();
        config.chains.ethereum_rpc_url = Some("ftp://node".to_string());
        assert!(config.validate().is_err());

        let mut config = GateConfig::default();
        config.chains.lukso_rpc_url = Some("not a url".to_string());
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_ttl_upper_bound() {
        let mut config = GateConfig::default();
        config.credential.ttl_secs = MAX_TTL_SECS;
        assert!(config.validate().is_ok());

        config.credential.ttl_secs = 10_000_000_000_000_000;
        assert!(config.validate().is_err());

        let mut config = GateConfig::default();
        config.challenge.nonce_ttl_secs = u64::MAX;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_ttl_conversion_never_negative() {
        assert_eq!(ttl_from_secs(300), Duration::seconds(300));
        assert_eq!(ttl_from_secs(u64::MAX), Duration::seconds(MAX_TTL_SECS as i64));

        let credential = CredentialConfig {
            ttl_secs: u64::MAX,
            ..Default::default()
        };
        assert!(credential.token_config().ttl > Duration::zero());
    }
}
