/// JWT issuing and validation (HS256)
///
/// Every token is bound to a session (`sid`). Access tokens are short-lived
/// and checked against the session on each request; refresh tokens are
/// long-lived, single-use, and rotated by the session store.
///
/// # Claims
///
/// ```json
/// {
///   "sub": "user uuid",
///   "sid": "session uuid",
///   "email": "registrar@college.edu",
///   "iss": "a3e",
///   "iat": 1735689600,
///   "nbf": 1735689600,
///   "exp": 1735693200,
///   "jti": "unique per token",
///   "token_type": "access"
/// }
/// ```
///
/// # Example
///
/// ```
/// use a3e_shared::auth::jwt::{TokenIssuer, TokenType};
/// use uuid::Uuid;
///
/// let issuer = TokenIssuer::new("an-hs256-secret-of-at-least-32-bytes!!");
/// let pair = issuer.issue_pair(Uuid::new_v4(), Uuid::new_v4(), "a@b.edu").unwrap();
///
/// let claims = issuer.validate_access_token(&pair.access_token).unwrap();
/// assert_eq!(claims.token_type, TokenType::Access);
/// assert!(issuer.validate_access_token(&pair.refresh_token).is_err());
/// ```

use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const ISSUER: &str = "a3e";

/// Default lifetimes
pub const ACCESS_TOKEN_TTL_SECONDS: i64 = 60 * 60;
pub const REFRESH_TOKEN_TTL_SECONDS: i64 = 30 * 24 * 60 * 60;

#[derive(Debug, thiserror::Error)]
pub enum JwtError {
    #[error("Failed to create token: {0}")]
    Create(String),

    #[error("Token has expired")]
    Expired,

    #[error("Invalid token: {0}")]
    Invalid(String),

    #[error("Expected {expected} token")]
    WrongType { expected: &'static str },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenType {
    Access,
    Refresh,
}

impl TokenType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TokenType::Access => "access",
            TokenType::Refresh => "refresh",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Claims {
    /// User id
    pub sub: Uuid,

    /// Session id
    pub sid: Uuid,

    pub email: String,
    pub iss: String,
    pub iat: i64,
    pub nbf: i64,
    pub exp: i64,

    /// Makes two tokens minted in the same second distinct
    pub jti: Uuid,

    pub token_type: TokenType,
}

impl Claims {
    pub fn new(user_id: Uuid, session_id: Uuid, email: &str, token_type: TokenType, ttl: Duration) -> Self {
        let now = Utc::now();

        Self {
            sub: user_id,
            sid: session_id,
            email: email.to_string(),
            iss: ISSUER.to_string(),
            iat: now.timestamp(),
            nbf: now.timestamp(),
            exp: (now + ttl).timestamp(),
            jti: Uuid::new_v4(),
            token_type,
        }
    }

    pub fn is_expired(&self) -> bool {
        Utc::now().timestamp() >= self.exp
    }
}

/// Access + refresh token pair returned on login, register and refresh
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: String,

    /// Access token lifetime in seconds
    pub expires_in: i64,
}

/// Signs and validates tokens with one HS256 secret
#[derive(Clone)]
pub struct TokenIssuer {
    encoding: EncodingKey,
    decoding: DecodingKey,
    access_ttl: Duration,
    refresh_ttl: Duration,
}

impl std::fmt::Debug for TokenIssuer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenIssuer")
            .field("access_ttl", &self.access_ttl)
            .field("refresh_ttl", &self.refresh_ttl)
            .finish_non_exhaustive()
    }
}

impl TokenIssuer {
    pub fn new(secret: &str) -> Self {
        Self::with_ttls(
            secret,
            Duration::seconds(ACCESS_TOKEN_TTL_SECONDS),
            Duration::seconds(REFRESH_TOKEN_TTL_SECONDS),
        )
    }

    pub fn with_ttls(secret: &str, access_ttl: Duration, refresh_ttl: Duration) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            access_ttl,
            refresh_ttl,
        }
    }

    pub fn access_ttl(&self) -> Duration {
        self.access_ttl
    }

    pub fn refresh_ttl(&self) -> Duration {
        self.refresh_ttl
    }

    pub fn sign(&self, claims: &Claims) -> Result<String, JwtError> {
        encode(&Header::new(Algorithm::HS256), claims, &self.encoding)
            .map_err(|e| JwtError::Create(e.to_string()))
    }

    pub fn issue(
        &self,
        user_id: Uuid,
        session_id: Uuid,
        email: &str,
        token_type: TokenType,
    ) -> Result<String, JwtError> {
        let ttl = match token_type {
            TokenType::Access => self.access_ttl,
            TokenType::Refresh => self.refresh_ttl,
        };
        self.sign(&Claims::new(user_id, session_id, email, token_type, ttl))
    }

    pub fn issue_pair(&self, user_id: Uuid, session_id: Uuid, email: &str) -> Result<TokenPair, JwtError> {
        Ok(TokenPair {
            access_token: self.issue(user_id, session_id, email, TokenType::Access)?,
            refresh_token: self.issue(user_id, session_id, email, TokenType::Refresh)?,
            token_type: "Bearer".to_string(),
            expires_in: self.access_ttl.num_seconds(),
        })
    }

    /// Verifies signature, issuer, `exp` and `nbf`
    pub fn validate(&self, token: &str) -> Result<Claims, JwtError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[ISSUER]);
        validation.validate_nbf = true;
        validation.leeway = 0;

        decode::<Claims>(token, &self.decoding, &validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => JwtError::Expired,
                _ => JwtError::Invalid(e.to_string()),
            })
    }

    pub fn validate_access_token(&self, token: &str) -> Result<Claims, JwtError> {
        let claims = self.validate(token)?;
        if claims.token_type != TokenType::Access {
            return Err(JwtError::WrongType { expected: "access" });
        }
        Ok(claims)
    }

    pub fn validate_refresh_token(&self, token: &str) -> Result<Claims, JwtError> {
        let claims = self.validate(token)?;
        if claims.token_type != TokenType::Refresh {
            return Err(JwtError::WrongType { expected: "refresh" });
        }
        Ok(claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "test-secret-key-at-least-32-bytes-long";

    #[test]
    fn test_pair_roundtrip() {
        let issuer = TokenIssuer::new(SECRET);
        let (user, session) = (Uuid::new_v4(), Uuid::new_v4());
        let pair = issuer.issue_pair(user, session, "qa@college.edu").unwrap();

        let access = issuer.validate_access_token(&pair.access_token).unwrap();
        assert_eq!(access.sub, user);
        assert_eq!(access.sid, session);
        assert_eq!(access.email, "qa@college.edu");
        assert_eq!(access.iss, ISSUER);
        assert_eq!(access.exp - access.iat, ACCESS_TOKEN_TTL_SECONDS);

        let refresh = issuer.validate_refresh_token(&pair.refresh_token).unwrap();
        assert_eq!(refresh.exp - refresh.iat, REFRESH_TOKEN_TTL_SECONDS);
        assert_eq!(pair.expires_in, 3600);
    }

    #[test]
    fn test_type_is_enforced() {
        let issuer = TokenIssuer::new(SECRET);
        let pair = issuer.issue_pair(Uuid::new_v4(), Uuid::new_v4(), "x@y.edu").unwrap();

        assert!(matches!(
            issuer.validate_access_token(&pair.refresh_token),
            Err(JwtError::WrongType { expected: "access" })
        ));
        assert!(matches!(
            issuer.validate_refresh_token(&pair.access_token),
            Err(JwtError::WrongType { expected: "refresh" })
        ));
    }

    #[test]
    fn test_tokens_minted_together_differ() {
        let issuer = TokenIssuer::new(SECRET);
        let (user, session) = (Uuid::new_v4(), Uuid::new_v4());
        let a = issuer.issue(user, session, "x@y.edu", TokenType::Refresh).unwrap();
        let b = issuer.issue(user, session, "x@y.edu", TokenType::Refresh).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let token = TokenIssuer::new(SECRET)
            .issue(Uuid::new_v4(), Uuid::new_v4(), "x@y.edu", TokenType::Access)
            .unwrap();
        let other = TokenIssuer::new("another-secret-key-that-is-32-bytes-plus");
        assert!(matches!(other.validate(&token), Err(JwtError::Invalid(_))));
    }

    #[test]
    fn test_expired_token() {
        let issuer = TokenIssuer::new(SECRET);
        let claims = Claims::new(
            Uuid::new_v4(),
            Uuid::new_v4(),
            "x@y.edu",
            TokenType::Access,
            Duration::seconds(-3600),
        );
        assert!(claims.is_expired());

        let token = issuer.sign(&claims).unwrap();
        assert!(matches!(issuer.validate(&token), Err(JwtError::Expired)));
    }

    #[test]
    fn test_foreign_issuer_rejected() {
        let issuer = TokenIssuer::new(SECRET);
        let mut claims = Claims::new(
            Uuid::new_v4(),
            Uuid::new_v4(),
            "x@y.edu",
            TokenType::Access,
            Duration::hours(1),
        );
        claims.iss = "someone-else".to_string();

        let token = issuer.sign(&claims).unwrap();
        assert!(issuer.validate(&token).is_err());
    }

    #[test]
    fn test_garbage_rejected() {
        let issuer = TokenIssuer::new(SECRET);
        assert!(issuer.validate("not.a.jwt").is_err());
        assert!(issuer.validate("").is_err());
    }
}
