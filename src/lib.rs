//! gatepost - wallet-gated commenting
//!
//! Posts carry a gating lock: categories of on-chain requirements
//! (balances, NFTs, names, followers) that a commenter must meet. Wallets
//! prove ownership by signing a challenge, and a passing verification
//! yields a credential token scoped to the post and the lock it satisfied.

pub mod chain;
pub mod challenge;
pub mod cli;
pub mod config;
pub mod credential;
pub mod crypto;
pub mod gating;
pub mod http_server;
pub mod observability;
