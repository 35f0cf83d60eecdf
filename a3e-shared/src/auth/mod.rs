/// Authentication primitives
///
/// The one canonical auth stack for every route:
///
/// - [`password`]: Argon2id hashing and the password policy
/// - [`jwt`]: HS256 access/refresh tokens bound to a session
/// - [`tokens`]: opaque random tokens and their SHA-256 digests
/// - [`middleware`]: bearer-token + session check for axum routers
///
/// # Example
///
/// ```no_run
/// use a3e_shared::auth::password::{hash_password, verify_password};
/// use a3e_shared::auth::jwt::TokenIssuer;
/// use uuid::Uuid;
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let hash = hash_password("Accredit3d!")?;
/// assert!(verify_password("Accredit3d!", &hash)?);
///
/// let issuer = TokenIssuer::new("an-hs256-secret-of-at-least-32-bytes!!");
/// let pair = issuer.issue_pair(Uuid::new_v4(), Uuid::new_v4(), "a@b.edu")?;
/// # Ok(())
/// # }
/// ```

pub mod jwt;
pub mod middleware;
pub mod password;
pub mod tokens;
