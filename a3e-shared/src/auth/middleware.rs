/// Bearer-token authentication middleware
///
/// Validates the access token, then confirms the session named by its `sid`
/// claim is still open, so logout takes effect before the token expires.
/// On success an [`AuthContext`] is inserted into request extensions.
///
/// # Example
///
/// ```no_run
/// use a3e_shared::auth::jwt::TokenIssuer;
/// use a3e_shared::auth::middleware::{create_session_middleware, AuthContext};
/// use axum::{middleware, routing::get, Extension, Router};
/// # use sqlx::PgPool;
///
/// async fn me(Extension(auth): Extension<AuthContext>) -> String {
///     auth.email
/// }
///
/// # fn build(pool: PgPool) -> Router {
/// let issuer = TokenIssuer::new("an-hs256-secret-of-at-least-32-bytes!!");
/// Router::new()
///     .route("/me", get(me))
///     .layer(middleware::from_fn(create_session_middleware(issuer, pool)))
/// # }
/// ```

use axum::{
    extract::Request,
    http::{header, HeaderMap, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

use super::jwt::{JwtError, TokenIssuer};
use crate::models::session::UserSession;

/// Identity of the authenticated caller
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthContext {
    pub user_id: Uuid,
    pub session_id: Uuid,
    pub email: String,
}

#[derive(Debug)]
pub enum AuthError {
    MissingCredentials,
    InvalidFormat(&'static str),
    InvalidToken(String),
    SessionRevoked,
    Database(String),
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let (status, error, message) = match self {
            AuthError::MissingCredentials => (
                StatusCode::UNAUTHORIZED,
                "unauthorized",
                "Missing bearer token".to_string(),
            ),
            AuthError::InvalidFormat(msg) => (StatusCode::UNAUTHORIZED, "unauthorized", msg.to_string()),
            AuthError::InvalidToken(msg) => (StatusCode::UNAUTHORIZED, "unauthorized", msg),
            AuthError::SessionRevoked => (
                StatusCode::UNAUTHORIZED,
                "unauthorized",
                "Session is no longer active".to_string(),
            ),
            AuthError::Database(e) => {
                tracing::error!(error = %e, "Session lookup failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "An internal error occurred".to_string(),
                )
            }
        };

        let body = Json(serde_json::json!({ "error": error, "message": message }));
        let mut response = (status, body).into_response();
        if status == StatusCode::UNAUTHORIZED {
            response
                .headers_mut()
                .insert(header::WWW_AUTHENTICATE, header::HeaderValue::from_static("Bearer"));
        }
        response
    }
}

/// Pulls the token out of `Authorization: Bearer <token>`
pub fn bearer_token(headers: &HeaderMap) -> Result<&str, AuthError> {
    let value = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or(AuthError::MissingCredentials)?;

    let token = value
        .strip_prefix("Bearer ")
        .ok_or(AuthError::InvalidFormat("Expected Bearer token"))?
        .trim();

    if token.is_empty() {
        return Err(AuthError::MissingCredentials);
    }
    Ok(token)
}

/// Validates the bearer token and the session behind it
pub async fn authenticate(
    issuer: &TokenIssuer,
    pool: &PgPool,
    headers: &HeaderMap,
) -> Result<AuthContext, AuthError> {
    let token = bearer_token(headers)?;

    let claims = issuer.validate_access_token(token).map_err(|e| match e {
        JwtError::Expired => AuthError::InvalidToken("Token expired".to_string()),
        other => AuthError::InvalidToken(other.to_string()),
    })?;

    let active = UserSession::is_session_active(pool, claims.sid, claims.sub)
        .await
        .map_err(|e| AuthError::Database(e.to_string()))?;
    if !active {
        return Err(AuthError::SessionRevoked);
    }

    Ok(AuthContext {
        user_id: claims.sub,
        session_id: claims.sid,
        email: claims.email,
    })
}

pub async fn session_auth_middleware(
    issuer: TokenIssuer,
    pool: PgPool,
    mut req: Request,
    next: Next,
) -> Result<Response, AuthError> {
    let ctx = authenticate(&issuer, &pool, req.headers()).await?;
    tracing::Span::current().record("user_id", tracing::field::display(ctx.user_id));
    req.extensions_mut().insert(ctx);

    Ok(next.run(req).await)
}

/// Wraps [`session_auth_middleware`] for `axum::middleware::from_fn`
pub fn create_session_middleware(
    issuer: TokenIssuer,
    pool: PgPool,
) -> impl Fn(Request, Next) -> std::pin::Pin<Box<dyn std::future::Future<Output = Result<Response, AuthError>> + Send>>
       + Clone {
    move |req, next| {
        let issuer = issuer.clone();
        let pool = pool.clone();
        Box::pin(session_auth_middleware(issuer, pool, req, next))
    }
}
