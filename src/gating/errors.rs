//! # Gating Errors
//!
//! Error types for lock validation, challenge handling and credentials.

use thiserror::Error;

use crate::chain::ChainError;

/// Result type for gating operations
pub type GatingResult<T> = Result<T, GatingError>;

/// Gating and verification errors
#[derive(Debug, Clone, Error)]
pub enum GatingError {
    // ==================
    // Configuration Errors
    // ==================

    /// Category type has no registered verifier
    #[error("Unknown gating category: {0}")]
    UnknownCategory(String),

    /// Category type registered twice
    #[error("Gating category already registered: {0}")]
    DuplicateCategory(String),

    /// Category config does not parse or is inconsistent
    #[error("Invalid {category} config: {reason}")]
    InvalidConfig { category: String, reason: String },

    /// Lock is structurally invalid
    #[error("Invalid gating lock: {0}")]
    InvalidLock(String),

    /// Address is not 0x-prefixed 40 hex digits
    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    /// Amount or token id does not parse
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    /// Post id is empty, too long or contains control characters
    #[error("Invalid post id: {0}")]
    InvalidPostId(String),

    /// Post has no gating lock
    #[error("No gating lock for post {0}")]
    LockNotFound(String),

    // ==================
    // Challenge Errors
    // ==================

    /// Nonce unknown, already consumed or expired
    #[error("Invalid or expired nonce")]
    InvalidNonce,

    /// Submitted claims differ from the challenged claims
    #[error("Claims do not match the challenge: {0}")]
    ClaimMismatch(String),

    /// Signature is not 65 bytes of hex or has a bad recovery byte
    #[error("Malformed signature")]
    MalformedSignature,

    /// Signature does not belong to the claimed address
    #[error("Signature does not match address {0}")]
    SignatureMismatch(String),

    /// Challenge message text does not follow the expected layout
    #[error("Malformed challenge message: {0}")]
    MalformedMessage(String),

    /// Server-side re-verification failed
    #[error("Gating requirements not met: {0}")]
    RequirementsNotMet(String),

    // ==================
    // Credential Errors
    // ==================

    /// Credential not found
    #[error("Credential invalid")]
    CredentialInvalid,

    /// Credential has been revoked
    #[error("Credential has been revoked")]
    CredentialRevoked,

    /// Credential belongs to another post
    #[error("Credential not valid for this post")]
    CredentialScope,

    /// Lock changed after the credential was issued
    #[error("Gating lock changed; verify again")]
    LockChanged,

    /// Token is malformed
    #[error("Malformed token")]
    MalformedToken,

    /// Token has expired
    #[error("Token expired")]
    TokenExpired,

    /// Token signature is invalid
    #[error("Invalid token signature")]
    InvalidTokenSignature,

    /// Admin token missing or wrong
    #[error("Admin token required")]
    AdminTokenRequired,

    // ==================
    // Upstream / Internal Errors
    // ==================

    /// Chain or social-graph read failed
    #[error("Chain unavailable: {0}")]
    ChainUnavailable(String),

    /// Token generation failed
    #[error("Internal error: token generation failed")]
    TokenGenerationFailed,

    /// Storage operation failed
    #[error("Storage error: {0}")]
    StorageError(String),
}

impl GatingError {
    /// Returns the HTTP status code for this error
    pub fn status_code(&self) -> u16 {
        match self {
            // 400 Bad Request
            GatingError::UnknownCategory(_) => 400,
            GatingError::InvalidConfig { .. } => 400,
            GatingError::InvalidLock(_) => 400,
            GatingError::InvalidAddress(_) => 400,
            GatingError::InvalidAmount(_) => 400,
            GatingError::InvalidPostId(_) => 400,
            GatingError::ClaimMismatch(_) => 400,
            GatingError::MalformedSignature => 400,
            GatingError::MalformedMessage(_) => 400,
            GatingError::MalformedToken => 400,

            // 401 Unauthorized
            GatingError::InvalidNonce => 401,
            GatingError::SignatureMismatch(_) => 401,
            GatingError::CredentialInvalid => 401,
            GatingError::CredentialRevoked => 401,
            GatingError::TokenExpired => 401,
            GatingError::InvalidTokenSignature => 401,
            GatingError::AdminTokenRequired => 401,

            // 403 Forbidden
            GatingError::RequirementsNotMet(_) => 403,
            GatingError::CredentialScope => 403,
            GatingError::LockChanged => 403,

            // 404 Not Found
            GatingError::LockNotFound(_) => 404,

            // 409 Conflict
            GatingError::DuplicateCategory(_) => 409,

            // 502 Bad Gateway
            GatingError::ChainUnavailable(_) => 502,

            // 500 Internal Server Error
            GatingError::TokenGenerationFailed => 500,
            GatingError::StorageError(_) => 500,
        }
    }

    /// Returns whether this error should be logged at warn level
    pub fn is_client_error(&self) -> bool {
        self.status_code() < 500
    }

    pub(crate) fn invalid_config(category: &str, reason: impl Into<String>) -> Self {
        GatingError::InvalidConfig {
            category: category.to_string(),
            reason: reason.into(),
        }
    }
}

impl From<ChainError> for GatingError {
    fn from(err: ChainError) -> Self {
        GatingError::ChainUnavailable(err.to_string())
    }
}
