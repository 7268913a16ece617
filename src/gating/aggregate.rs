//! # Verification Status Aggregation
//!
//! Combines per-category results under the lock's global fulfillment mode
//! into a single `can_comment` decision and a progress message.
//!
//! ## Rules
//! - Disabled categories are ignored
//! - A lock without enabled categories lets everyone comment
//! - An enabled category without a result (no address supplied) fails

use serde::Serialize;

use super::address::Address;
use super::category::{CategoryVerification, Fulfillment, RequirementResult};
use super::lock::GatingLock;

/// Per-category state in a status report
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CategoryState {
    Passed,
    Failed,
    NotConnected,
    Disabled,
}

/// Status of one lock category
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CategoryStatus {
    pub category_type: String,
    pub state: CategoryState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<Address>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fulfillment: Option<Fulfillment>,
    pub requirements: Vec<RequirementResult>,
}

/// Aggregated verification status of a lock
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VerificationStatus {
    pub can_comment: bool,
    pub fulfillment: Fulfillment,
    pub categories: Vec<CategoryStatus>,
    pub message: String,
}

impl VerificationStatus {
    /// Status for a post without a lock
    pub fn ungated() -> Self {
        Self {
            can_comment: true,
            fulfillment: Fulfillment::default(),
            categories: Vec::new(),
            message: "No requirements".to_string(),
        }
    }

    /// Types of the categories that passed
    pub fn passed_types(&self) -> Vec<String> {
        self.categories
            .iter()
            .filter(|c| c.state == CategoryState::Passed)
            .map(|c| c.category_type.clone())
            .collect()
    }
}

/// Aggregate category results for `lock`
///
/// Results for categories not in the lock are ignored.
pub fn aggregate(lock: &GatingLock, results: &[CategoryVerification]) -> VerificationStatus {
    if !lock.is_gated() {
        return VerificationStatus {
            fulfillment: lock.fulfillment,
            ..VerificationStatus::ungated()
        };
    }

    let categories: Vec<CategoryStatus> = lock
        .categories
        .iter()
        .map(|category| {
            let result = results
                .iter()
                .find(|r| r.category_type == category.category_type);
            match (category.enabled, result) {
                (false, _) => CategoryStatus {
                    category_type: category.category_type.clone(),
                    state: CategoryState::Disabled,
                    address: None,
                    fulfillment: None,
                    requirements: Vec::new(),
                },
                (true, None) => CategoryStatus {
                    category_type: category.category_type.clone(),
                    state: CategoryState::NotConnected,
                    address: None,
                    fulfillment: None,
                    requirements: Vec::new(),
                },
                (true, Some(result)) => CategoryStatus {
                    category_type: category.category_type.clone(),
                    state: if result.passed {
                        CategoryState::Passed
                    } else {
                        CategoryState::Failed
                    },
                    address: Some(result.address),
                    fulfillment: Some(result.fulfillment),
                    requirements: result.requirements.clone(),
                },
            }
        })
        .collect();

    let enabled: Vec<&CategoryStatus> = categories
        .iter()
        .filter(|c| c.state != CategoryState::Disabled)
        .collect();

    let can_comment = lock
        .fulfillment
        .evaluate(enabled.iter().map(|c| c.state == CategoryState::Passed));

    let message = progress_message(lock.fulfillment, can_comment, &enabled);

    VerificationStatus {
        can_comment,
        fulfillment: lock.fulfillment,
        categories,
        message,
    }
}

fn progress_message(
    fulfillment: Fulfillment,
    can_comment: bool,
    enabled: &[&CategoryStatus],
) -> String {
    let passed: Vec<&str> = enabled
        .iter()
        .filter(|c| c.state == CategoryState::Passed)
        .map(|c| c.category_type.as_str())
        .collect();

    if can_comment {
        return match fulfillment {
            Fulfillment::All => "All requirements met".to_string(),
            Fulfillment::Any => format!("Requirements met via {}", passed.join(", ")),
        };
    }

    let needed = match fulfillment {
        Fulfillment::Any => 1,
        Fulfillment::All => enabled.len(),
    };
    let mut message = format!("{}/{} categories fulfilled", passed.len(), needed);

    let unconnected: Vec<&str> = enabled
        .iter()
        .filter(|c| c.state == CategoryState::NotConnected)
        .map(|c| c.category_type.as_str())
        .collect();
    if !unconnected.is_empty() {
        message.push_str("; connect ");
        message.push_str(&unconnected.join(", "));
    }
    message
}
