/// Middleware modules for the API server
///
/// - `security`: Security response headers
/// - `rate_limit`: Per-IP limits on credential endpoints

pub mod rate_limit;
pub mod security;
