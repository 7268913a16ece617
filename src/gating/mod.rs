//! # Gating Verification Engine
//!
//! Decides whether a connected wallet satisfies the on-chain and social
//! requirements attached to a post.
//!
//! - **registry**: category type -> verifier
//! - **ethereum** / **universal_profile**: per-category requirement verifiers
//! - **lock**: per-post gating configuration and its storage
//! - **aggregate**: combines category results into `can_comment`

pub mod address;
pub mod aggregate;
pub mod category;
pub mod errors;
pub mod ethereum;
pub mod lock;
pub mod registry;
pub mod snapshot;
pub mod universal_profile;

pub use address::{Address, Amount, TokenId};
pub use aggregate::{aggregate, CategoryState, CategoryStatus, VerificationStatus};
pub use category::{
    CategoryInfo, CategoryVerification, Check, Fulfillment, GatingCategory, Requirement,
    RequirementResult, TypedCategory,
};
pub use errors::{GatingError, GatingResult};
pub use ethereum::EthereumRequirement;
pub use lock::{GatingLock, InMemoryLockRepository, LockCategory, LockRepository};
pub use registry::CategoryRegistry;
pub use snapshot::{SnapshotPlan, WalletSnapshot};
pub use universal_profile::UniversalProfileRequirement;
