//! Observable events.
//!
//! Every log line the service emits for a lifecycle or verification step
//! carries one of these names in its `event` field.

use std::fmt;

/// Observable events in gatepost
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    // Boot & Lifecycle
    /// Startup begins
    BootStart,
    /// Configuration loaded
    ConfigLoaded,
    /// Server bound and accepting requests
    Serving,
    /// Shutdown complete
    ShutdownComplete,

    // Locks
    /// Lock stored for a post
    LockSet,
    /// Lock removed from a post
    LockRemoved,

    // Verification
    /// Pre-verification status computed
    StatusChecked,
    /// Challenge nonce issued
    ChallengeIssued,
    /// Signatures and requirements verified
    VerificationPassed,
    /// Verification rejected (nonce, signature or requirements)
    VerificationRejected,

    // Credentials
    /// Credential persisted and token issued
    CredentialIssued,
    /// Credential revoked
    CredentialRevoked,
    /// Access check granted
    AccessGranted,
    /// Access check denied
    AccessDenied,

    // Upstream
    /// Chain or social-graph read failed
    ChainReadFailed,
}

impl Event {
    /// Returns the string representation of the event
    pub fn as_str(&self) -> &'static str {
        match self {
            Event::BootStart => "GATEPOST_STARTUP_BEGIN",
            Event::ConfigLoaded => "CONFIG_LOADED",
            Event::Serving => "GATEPOST_SERVING",
            Event::ShutdownComplete => "SHUTDOWN_COMPLETE",

            Event::LockSet => "LOCK_SET",
            Event::LockRemoved => "LOCK_REMOVED",

            Event::StatusChecked => "STATUS_CHECKED",
            Event::ChallengeIssued => "CHALLENGE_ISSUED",
            Event::VerificationPassed => "VERIFICATION_PASSED",
            Event::VerificationRejected => "VERIFICATION_REJECTED",

            Event::CredentialIssued => "CREDENTIAL_ISSUED",
            Event::CredentialRevoked => "CREDENTIAL_REVOKED",
            Event::AccessGranted => "ACCESS_GRANTED",
            Event::AccessDenied => "ACCESS_DENIED",

            Event::ChainReadFailed => "CHAIN_READ_FAILED",
        }
    }

    /// Whether the event is logged at warn level
    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            Event::VerificationRejected | Event::AccessDenied | Event::ChainReadFailed
        )
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_names_are_unique() {
        let events = [
            Event::BootStart,
            Event::ConfigLoaded,
            Event::Serving,
            Event::ShutdownComplete,
            Event::LockSet,
            Event::LockRemoved,
            Event::StatusChecked,
            Event::ChallengeIssued,
            Event::VerificationPassed,
            Event::VerificationRejected,
            Event::CredentialIssued,
            Event::CredentialRevoked,
            Event::AccessGranted,
            Event::AccessDenied,
            Event::ChainReadFailed,
        ];
        let names: std::collections::HashSet<_> = events.iter().map(|e| e.as_str()).collect();
        assert_eq!(names.len(), events.len());
    }

    #[test]
    fn test_failure_events() {
        assert!(Event::AccessDenied.is_failure());
        assert!(!Event::AccessGranted.is_failure());
        assert_eq!(Event::Serving.to_string(), "GATEPOST_SERVING");
    }
}
