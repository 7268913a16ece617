//! Observability for gatepost
//!
//! - Structured logging through `tracing` (text or JSON)
//! - Typed lifecycle and verification events
//! - Monotonic counters exposed on `/metrics`
//!
//! # Usage
//!
//! ```ignore
//! use gatepost::observability::{log_event, Event, MetricsRegistry};
//!
//! log_event(Event::BootStart);
//!
//! let metrics = MetricsRegistry::new();
//! metrics.increment_challenges();
//! ```

mod events;
pub mod logging;
mod metrics;

pub use events::Event;
pub use logging::{LogFormat, LoggingConfig};
pub use metrics::{MetricsRegistry, MetricsSnapshot};

use std::fmt;

use tracing::{info, warn};

/// Observability error
///
/// Observability failure must never stop the service.
#[derive(Debug)]
pub struct ObservabilityError {
    message: String,
}

impl ObservabilityError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for ObservabilityError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "observability: {}", self.message)
    }
}

impl std::error::Error for ObservabilityError {}

/// Result type for observability operations
pub type ObservabilityResult<T> = Result<T, ObservabilityError>;

/// Log a lifecycle event
pub fn log_event(event: Event) {
    if event.is_failure() {
        warn!(event = event.as_str());
    } else {
        info!(event = event.as_str());
    }
}
