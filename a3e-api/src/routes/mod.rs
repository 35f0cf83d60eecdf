/// API route handlers
///
/// Handlers are grouped by resource:
///
/// - `health`: liveness and dependency status
/// - `auth`: registration, login, sessions and password flows
/// - `documents`: evidence upload, listing and download
/// - `standards`: the accreditation standards catalog
/// - `compliance`: analysis requests, results and the compliance summary
/// - `reports`: generated compliance and gap reports
/// - `billing`: plans, subscriptions and the Stripe webhook
/// - `usage`: monthly usage and quota snapshot

pub mod auth;
pub mod billing;
pub mod compliance;
pub mod documents;
pub mod health;
pub mod reports;
pub mod standards;
pub mod usage;

use serde::Deserialize;

/// Default page size for list endpoints
pub const DEFAULT_PAGE_SIZE: i64 = 20;

/// Largest page a client may ask for
pub const MAX_PAGE_SIZE: i64 = 100;

/// `?limit=&offset=` query parameters
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct Pagination {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

impl Pagination {
    /// Clamped `(limit, offset)`
    pub fn resolve(&self) -> (i64, i64) {
        let limit = self.limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE);
        let offset = self.offset.unwrap_or(0).max(0);
        (limit, offset)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pagination_defaults_and_clamps() {
        assert_eq!(Pagination::default().resolve(), (20, 0));

        let wild = Pagination {
            limit: Some(10_000),
            offset: Some(-5),
        };
        assert_eq!(wild.resolve(), (100, 0));

        let zero = Pagination {
            limit: Some(0),
            offset: Some(40),
        };
        assert_eq!(zero.resolve(), (1, 40));
    }
}
