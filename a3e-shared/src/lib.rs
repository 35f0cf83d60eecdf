//! # A³E Shared Library
//!
//! Types, persistence and business logic shared by the A³E API server and
//! the background worker.
//!
//! ## Module Organization
//!
//! - `models`: Database models and queries
//! - `auth`: Passwords, JWTs, sessions and the auth middleware
//! - `billing`: Plans, trials, Stripe and webhooks
//! - `email`: Templates, providers and the fallback mailer
//! - `storage`: Local and S3 document storage
//! - `standards`: Standards catalog, mapping and compliance scoring
//! - `reports`: Report assembly from stored analyses
//! - `quota`: Plan limits
//! - `redis`: Redis client and rate limiting
//! - `db`: Pool and migrations

pub mod auth;
pub mod billing;
pub mod db;
pub mod email;
pub mod models;
pub mod quota;
pub mod redis;
pub mod reports;
pub mod standards;
pub mod storage;

/// Current version of the A³E shared library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_is_set() {
        assert!(!VERSION.is_empty());
    }
}
