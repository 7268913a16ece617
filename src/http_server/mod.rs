//! # HTTP Server Module
//!
//! axum API in front of the verification service.
//!
//! # Endpoints
//!
//! - `/health`, `/metrics` - Health check and counters
//! - `/gating/categories` - Registered categories
//! - `/gating/posts/:post_id/lock` - Read, replace or remove a post's lock
//! - `/gating/posts/:post_id/status` - Pre-verification status
//! - `/gating/posts/:post_id/challenge` - Issue a signing challenge
//! - `/gating/posts/:post_id/verify` - Submit signatures, receive a credential
//! - `/gating/posts/:post_id/access` - Check a bearer credential
//! - `/gating/credentials/:id` - Revoke a credential

pub mod config;
pub mod gating_routes;
pub mod observability_routes;
pub mod server;

pub use config::HttpServerConfig;
pub use gating_routes::{GateService, GatingState};
pub use server::HttpServer;
