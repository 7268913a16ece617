//! Counters for the gating service.
//!
//! - Counters only, monotonic, reset on process start
//! - Relaxed atomics; exact per counter, not across counters

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// Operational counters
#[derive(Debug, Default)]
pub struct MetricsRegistry {
    locks_updated: AtomicU64,
    status_checks: AtomicU64,
    challenges_issued: AtomicU64,
    verifications_passed: AtomicU64,
    verifications_rejected: AtomicU64,
    credentials_revoked: AtomicU64,
    access_granted: AtomicU64,
    access_denied: AtomicU64,
    chain_errors: AtomicU64,
}

impl MetricsRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn increment_locks_updated(&self) {
        self.locks_updated.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_status_checks(&self) {
        self.status_checks.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_challenges(&self) {
        self.challenges_issued.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_verifications_passed(&self) {
        self.verifications_passed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_verifications_rejected(&self) {
        self.verifications_rejected.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_credentials_revoked(&self) {
        self.credentials_revoked.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_access(&self, granted: bool) {
        let counter = if granted {
            &self.access_granted
        } else {
            &self.access_denied
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_chain_errors(&self) {
        self.chain_errors.fetch_add(1, Ordering::Relaxed);
    }

    /// Current values of all counters
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            locks_updated: self.locks_updated.load(Ordering::Relaxed),
            status_checks: self.status_checks.load(Ordering::Relaxed),
            challenges_issued: self.challenges_issued.load(Ordering::Relaxed),
            verifications_passed: self.verifications_passed.load(Ordering::Relaxed),
            verifications_rejected: self.verifications_rejected.load(Ordering::Relaxed),
            credentials_revoked: self.credentials_revoked.load(Ordering::Relaxed),
            access_granted: self.access_granted.load(Ordering::Relaxed),
            access_denied: self.access_denied.load(Ordering::Relaxed),
            chain_errors: self.chain_errors.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of all counters
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub locks_updated: u64,
    pub status_checks: u64,
    pub challenges_issued: u64,
    pub verifications_passed: u64,
    pub verifications_rejected: u64,
    pub credentials_revoked: u64,
    pub access_granted: u64,
    pub access_denied: u64,
    pub chain_errors: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_registry_is_zero() {
        assert_eq!(MetricsRegistry::new().snapshot(), MetricsSnapshot::default());
    }

    #[test]
    fn test_increment_counters() {
        let registry = MetricsRegistry::new();
        registry.increment_challenges();
        registry.increment_challenges();
        registry.increment_verifications_passed();
        registry.increment_access(true);
        registry.increment_access(false);
        registry.increment_access(false);

        let snapshot = registry.snapshot();
        assert_eq!(snapshot.challenges_issued, 2);
        assert_eq!(snapshot.verifications_passed, 1);
        assert_eq!(snapshot.access_granted, 1);
        assert_eq!(snapshot.access_denied, 2);
    }

    #[test]
    fn test_snapshot_serializes() {
        let registry = MetricsRegistry::new();
        registry.increment_chain_errors();
        let json = serde_json::to_value(registry.snapshot()).unwrap();
        assert_eq!(json["chain_errors"], 1);
        assert_eq!(json["status_checks"], 0);
    }

    #[test]
    fn test_concurrent_increments() {
        use std::sync::Arc;
        use std::thread;

        let registry = Arc::new(MetricsRegistry::new());
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let r = Arc::clone(&registry);
                thread::spawn(move || {
                    for _ in 0..100 {
                        r.increment_status_checks();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(registry.snapshot().status_checks, 400);
    }
}
