/// Authentication endpoints
///
/// Every successful registration or login opens a server-side session; the
/// access and refresh tokens both carry its id. Refreshing rotates the
/// session's refresh-token hash, and presenting an already-rotated refresh
/// token revokes the session.
///
/// # Endpoints
///
/// - `POST /api/auth/register` - Create an account and start the trial
/// - `POST /api/auth/login` - Exchange credentials for tokens
/// - `POST /api/auth/refresh` - Rotate the refresh token
/// - `POST /api/auth/logout` - Revoke the current session
/// - `POST /api/auth/logout-all` - Revoke every session
/// - `GET /api/auth/me` / `PATCH /api/auth/me` - Profile
/// - `GET /api/auth/sessions` - Open sessions
/// - `POST /api/auth/password/change` - Change password, revoke other sessions
/// - `POST /api/auth/password/forgot` - Request a reset email (always 202)
/// - `POST /api/auth/password/reset` - Set a new password with a reset token

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
    middleware::rate_limit::client_ip,
};
use a3e_shared::{
    auth::{jwt::TokenPair, middleware::AuthContext, password},
    billing::trial::{TrialWindow, TRIAL_DAYS},
    email::templates::EmailTemplate,
    models::{
        email_delivery::dedupe_key,
        job::{Job, JobPayload},
        password_reset::{PasswordReset, RESET_TOKEN_TTL_MINUTES},
        session::{CreateSession, RotationOutcome, UserSession},
        usage_event::{MonthlyUsage, UsageEvent, UsageKind},
        user::{CreateUser, Plan, UpdateProfile, User},
    },
};
use axum::{
    extract::{ConnectInfo, State},
    http::{header, HeaderMap, StatusCode},
    Extension, Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use uuid::Uuid;
use validator::Validate;

/// Register request
#[derive(Debug, Deserialize, Validate)]
pub struct RegisterRequest {
    #[validate(email(message = "Invalid email format"))]
    pub email: String,

    /// Checked against the password policy after field validation
    pub password: String,

    #[validate(length(max = 100, message = "Name must be at most 100 characters"))]
    pub name: Option<String>,

    #[validate(length(max = 200, message = "Institution name must be at most 200 characters"))]
    pub institution_name: Option<String>,

    /// Plan the user intends to buy after the trial
    pub plan: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(email(message = "Invalid email format"))]
    pub email: String,

    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateProfileRequest {
    /// Empty string clears the value
    #[validate(length(max = 100, message = "Name must be at most 100 characters"))]
    pub name: Option<String>,

    #[validate(length(max = 200, message = "Institution name must be at most 200 characters"))]
    pub institution_name: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ChangePasswordRequest {
    pub current_password: String,
    pub new_password: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct ForgotPasswordRequest {
    #[validate(email(message = "Invalid email format"))]
    pub email: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct ResetPasswordRequest {
    #[validate(length(min = 1, message = "Reset token is required"))]
    pub token: String,

    pub new_password: String,
}

/// Trial state as shown to the client
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrialInfo {
    pub started_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
    pub days_remaining: i64,
    pub active: bool,
}

/// Lifetime counters from the `users` row
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UsageCounters {
    pub documents_uploaded: i32,
    pub analyses_run: i32,
    pub reports_generated: i32,
}

/// Public view of a user
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: Uuid,
    pub email: String,
    pub name: Option<String>,
    pub institution_name: Option<String>,
    pub role: String,
    pub email_verified: bool,
    pub plan: String,
    pub subscription_status: String,

    /// Whether uploads, analyses and reports are currently allowed
    pub has_access: bool,

    pub trial: TrialInfo,
    pub usage: UsageCounters,
    pub created_at: DateTime<Utc>,
    pub last_login_at: Option<DateTime<Utc>>,
}

impl UserProfile {
    pub fn from_user(user: &User, now: DateTime<Utc>) -> Self {
        let trial = user.trial_window();

        UserProfile {
            id: user.id,
            email: user.email.clone(),
            name: user.name.clone(),
            institution_name: user.institution_name.clone(),
            role: user.get_role().as_str().to_string(),
            email_verified: user.email_verified,
            plan: user.get_plan().as_str().to_string(),
            subscription_status: user.get_subscription_status().as_str().to_string(),
            has_access: user.has_access(now),
            trial: TrialInfo {
                started_at: trial.started_at(),
                ends_at: trial.ends_at(),
                days_remaining: trial.days_remaining(now),
                active: trial.is_active(now),
            },
            usage: UsageCounters {
                documents_uploaded: user.documents_uploaded,
                analyses_run: user.analyses_run,
                reports_generated: user.reports_generated,
            },
            created_at: user.created_at,
            last_login_at: user.last_login_at,
        }
    }
}

/// Body returned by register and login
#[derive(Debug, Serialize, Deserialize)]
pub struct AuthResponse {
    pub user: UserProfile,

    #[serde(flatten)]
    pub tokens: TokenPair,

    /// Echo of the plan chosen at registration
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub intended_plan: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct MeResponse {
    #[serde(flatten)]
    pub profile: UserProfile,

    /// Usage since the first of the month (UTC)
    pub this_month: MonthlyUsage,
}

#[derive(Debug, Serialize)]
pub struct SessionView {
    pub id: Uuid,
    pub user_agent: Option<String>,
    pub ip_address: Option<String>,
    pub created_at: DateTime<Utc>,
    pub last_used_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,

    /// The session the request was made with
    pub current: bool,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct RevokedResponse {
    pub revoked_sessions: u64,
}

/// Trimmed value, or `None` when blank
fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// `Some(None)` clears a profile field; `None` leaves it unchanged
fn profile_change(value: Option<String>) -> Option<Option<String>> {
    value.map(|v| non_blank(Some(v)))
}

/// Parses the optional `plan` on registration; only paid plans are accepted
pub fn parse_intended_plan(raw: Option<&str>) -> ApiResult<Option<Plan>> {
    let Some(raw) = raw.map(str::trim).filter(|p| !p.is_empty()) else {
        return Ok(None);
    };

    match Plan::from_str(&raw.to_ascii_lowercase()) {
        Some(plan) if Plan::paid().contains(&plan) => Ok(Some(plan)),
        _ => Err(ApiError::BadRequest(format!(
            "Unknown plan '{}'; expected starter, professional or institution",
            raw
        ))),
    }
}

/// Creates the session row and the token pair bound to it
async fn open_session(
    state: &AppState,
    user: &User,
    headers: &HeaderMap,
    connect_info: Option<&ConnectInfo<SocketAddr>>,
) -> ApiResult<TokenPair> {
    let session_id = Uuid::new_v4();
    let tokens = state.issuer.issue_pair(user.id, session_id, &user.email)?;

    let user_agent = headers
        .get(header::USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .map(|ua| ua.chars().take(512).collect::<String>());

    UserSession::create(
        &state.db,
        CreateSession {
            id: session_id,
            user_id: user.id,
            refresh_token: tokens.refresh_token.clone(),
            user_agent,
            ip_address: Some(client_ip(headers, connect_info, state.config.api.trust_proxy)),
            expires_at: Utc::now() + state.issuer.refresh_ttl(),
        },
    )
    .await?;

    Ok(tokens)
}

/// Queues an email; a failure here is logged rather than failing the request
async fn enqueue_email(state: &AppState, payload: JobPayload) {
    if let Err(e) = Job::enqueue(&state.db, &payload).await {
        tracing::warn!(error = %e, "Failed to enqueue email job");
    }
}

/// Register a new user
///
/// # Endpoint
///
/// ```text
/// POST /api/auth/register
/// Content-Type: application/json
///
/// {
///   "email": "provost@college.edu",
///   "password": "Accredit3d!",
///   "name": "Dana Reyes",
///   "institution_name": "Example College",
///   "plan": "professional"
/// }
/// ```
///
/// # Errors
///
/// - `400 Bad Request`: Validation failed or unknown plan
/// - `409 Conflict`: Email already registered
pub async fn register(
    State(state): State<AppState>,
    connect_info: Option<ConnectInfo<SocketAddr>>,
    headers: HeaderMap,
    Json(req): Json<RegisterRequest>,
) -> ApiResult<(StatusCode, Json<AuthResponse>)> {
    req.validate()?;
    password::validate_password_strength(&req.password)?;
    let intended_plan = parse_intended_plan(req.plan.as_deref())?;

    let password_hash = password::hash_password(&req.password)?;
    let trial = TrialWindow::starting_now(TRIAL_DAYS)
        .map_err(|e| ApiError::InternalError(e.to_string()))?;

    let user = User::create(
        &state.db,
        CreateUser {
            email: req.email.trim().to_string(),
            password_hash,
            name: non_blank(req.name),
            institution_name: non_blank(req.institution_name),
            trial,
        },
    )
    .await?;

    let tokens = open_session(&state, &user, &headers, connect_info.as_ref()).await?;

    enqueue_email(
        &state,
        JobPayload::SendEmail {
            to: user.email.clone(),
            user_id: Some(user.id),
            template: EmailTemplate::Welcome {
                name: user.name.clone(),
                trial_ends_at: user.trial_ends_at,
            },
            dedupe_key: Some(dedupe_key(user.id, "welcome")),
        },
    )
    .await;

    tracing::info!(
        user_id = %user.id,
        intended_plan = intended_plan.map(|p| p.as_str()).unwrap_or("none"),
        "User registered"
    );

    Ok((
        StatusCode::CREATED,
        Json(AuthResponse {
            user: UserProfile::from_user(&user, Utc::now()),
            tokens,
            intended_plan: intended_plan.map(|p| p.as_str().to_string()),
        }),
    ))
}

/// Login endpoint
///
/// Unknown email and wrong password produce the same 401, and both pay for
/// one Argon2 verification.
///
/// # Errors
///
/// - `400 Bad Request`: Validation failed
/// - `401 Unauthorized`: Invalid credentials
pub async fn login(
    State(state): State<AppState>,
    connect_info: Option<ConnectInfo<SocketAddr>>,
    headers: HeaderMap,
    Json(req): Json<LoginRequest>,
) -> ApiResult<Json<AuthResponse>> {
    req.validate()?;

    let invalid = || ApiError::Unauthorized("Invalid email or password".to_string());

    let Some(user) = User::find_by_email(&state.db, &req.email).await? else {
        let _ = password::verify_password(&req.password, password::dummy_hash());
        return Err(invalid());
    };

    if !password::verify_password(&req.password, &user.password_hash)? {
        tracing::info!(user_id = %user.id, "Login rejected: wrong password");
        return Err(invalid());
    }

    User::update_last_login(&state.db, user.id).await?;
    let tokens = open_session(&state, &user, &headers, connect_info.as_ref()).await?;

    UsageEvent::record(
        &state.db,
        user.id,
        UsageKind::Login,
        serde_json::json!({ "ip": client_ip(&headers, connect_info.as_ref(), state.config.api.trust_proxy) }),
    )
    .await?;

    tracing::info!(user_id = %user.id, "User logged in");

    Ok(Json(AuthResponse {
        user: UserProfile::from_user(&user, Utc::now()),
        tokens,
        intended_plan: None,
    }))
}

/// Token refresh endpoint
///
/// Returns a new access/refresh pair for the same session. The presented
/// refresh token stops working immediately.
///
/// # Errors
///
/// - `401 Unauthorized`: Invalid, expired, reused or revoked refresh token
pub async fn refresh(
    State(state): State<AppState>,
    Json(req): Json<RefreshRequest>,
) -> ApiResult<Json<TokenPair>> {
    let claims = state.issuer.validate_refresh_token(&req.refresh_token)?;
    let tokens = state.issuer.issue_pair(claims.sub, claims.sid, &claims.email)?;

    match UserSession::rotate(&state.db, claims.sid, &req.refresh_token, &tokens.refresh_token).await? {
        RotationOutcome::Rotated => Ok(Json(tokens)),
        RotationOutcome::Inactive => Err(ApiError::Unauthorized("Session is no longer active".to_string())),
        RotationOutcome::ReuseDetected => {
            tracing::warn!(
                user_id = %claims.sub,
                session_id = %claims.sid,
                "Refresh token reuse detected; session revoked"
            );
            Err(ApiError::Unauthorized(
                "Refresh token has already been used; please log in again".to_string(),
            ))
        }
    }
}

pub async fn logout(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> ApiResult<StatusCode> {
    UserSession::revoke(&state.db, auth.session_id).await?;
    tracing::info!(user_id = %auth.user_id, session_id = %auth.session_id, "Logged out");
    Ok(StatusCode::NO_CONTENT)
}

pub async fn logout_all(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> ApiResult<Json<RevokedResponse>> {
    let revoked = UserSession::revoke_all_for_user(&state.db, auth.user_id, None).await?;
    tracing::info!(user_id = %auth.user_id, revoked, "Logged out everywhere");
    Ok(Json(RevokedResponse {
        revoked_sessions: revoked,
    }))
}

async fn current_user(state: &AppState, auth: &AuthContext) -> ApiResult<User> {
    User::find_by_id(&state.db, auth.user_id)
        .await?
        .ok_or_else(|| ApiError::Unauthorized("Account no longer exists".to_string()))
}

/// Profile with trial, subscription and usage
pub async fn me(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> ApiResult<Json<MeResponse>> {
    let user = current_user(&state, &auth).await?;
    let this_month = UsageEvent::monthly_summary(&state.db, user.id).await?;

    Ok(Json(MeResponse {
        profile: UserProfile::from_user(&user, Utc::now()),
        this_month,
    }))
}

pub async fn update_me(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(req): Json<UpdateProfileRequest>,
) -> ApiResult<Json<UserProfile>> {
    req.validate()?;

    let user = User::update_profile(
        &state.db,
        auth.user_id,
        UpdateProfile {
            name: profile_change(req.name),
            institution_name: profile_change(req.institution_name),
        },
    )
    .await?
    .ok_or_else(|| ApiError::Unauthorized("Account no longer exists".to_string()))?;

    Ok(Json(UserProfile::from_user(&user, Utc::now())))
}

pub async fn list_sessions(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> ApiResult<Json<Vec<SessionView>>> {
    let sessions = UserSession::list_active_for_user(&state.db, auth.user_id).await?;

    Ok(Json(
        sessions
            .into_iter()
            .map(|s| SessionView {
                current: s.id == auth.session_id,
                id: s.id,
                user_agent: s.user_agent,
                ip_address: s.ip_address,
                created_at: s.created_at,
                last_used_at: s.last_used_at,
                expires_at: s.expires_at,
            })
            .collect(),
    ))
}

/// Changes the password and revokes every other session
///
/// # Errors
///
/// - `400 Bad Request`: New password fails the policy
/// - `401 Unauthorized`: Current password is wrong
pub async fn change_password(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(req): Json<ChangePasswordRequest>,
) -> ApiResult<Json<RevokedResponse>> {
    password::validate_password_strength(&req.new_password)?;

    let user = current_user(&state, &auth).await?;
    if !password::verify_password(&req.current_password, &user.password_hash)? {
        return Err(ApiError::Unauthorized("Current password is incorrect".to_string()));
    }

    let password_hash = password::hash_password(&req.new_password)?;
    User::update_password(&state.db, user.id, &password_hash).await?;
    let revoked = UserSession::revoke_all_for_user(&state.db, user.id, Some(auth.session_id)).await?;

    tracing::info!(user_id = %user.id, revoked, "Password changed");

    Ok(Json(RevokedResponse {
        revoked_sessions: revoked,
    }))
}

const FORGOT_PASSWORD_MESSAGE: &str =
    "If an account exists for that email, a password reset link has been sent";

async fn issue_reset(state: &AppState, email: &str) -> ApiResult<()> {
    let Some(user) = User::find_by_email(&state.db, email).await? else {
        tracing::debug!("Password reset requested for unknown email");
        return Ok(());
    };

    let (_, token) = PasswordReset::issue(&state.db, user.id).await?;

    Job::enqueue(
        &state.db,
        &JobPayload::SendEmail {
            to: user.email.clone(),
            user_id: Some(user.id),
            template: EmailTemplate::PasswordReset {
                token,
                expires_minutes: RESET_TOKEN_TTL_MINUTES,
            },
            dedupe_key: None,
        },
    )
    .await?;

    tracing::info!(user_id = %user.id, "Password reset issued");
    Ok(())
}

/// Requests a reset email
///
/// Always answers 202 once the body is valid, whether or not the account
/// exists or the email could be queued.
pub async fn forgot_password(
    State(state): State<AppState>,
    Json(req): Json<ForgotPasswordRequest>,
) -> ApiResult<(StatusCode, Json<MessageResponse>)> {
    req.validate()?;

    if let Err(e) = issue_reset(&state, &req.email).await {
        tracing::error!(error = %e, "Password reset request failed");
    }

    Ok((
        StatusCode::ACCEPTED,
        Json(MessageResponse {
            message: FORGOT_PASSWORD_MESSAGE.to_string(),
        }),
    ))
}

/// Sets a new password with a reset token and revokes every session
///
/// # Errors
///
/// - `400 Bad Request`: Weak password, or unknown/expired/used token
pub async fn reset_password(
    State(state): State<AppState>,
    Json(req): Json<ResetPasswordRequest>,
) -> ApiResult<Json<MessageResponse>> {
    req.validate()?;
    password::validate_password_strength(&req.new_password)?;

    let user_id = PasswordReset::consume(&state.db, req.token.trim())
        .await?
        .ok_or_else(|| ApiError::BadRequest("Invalid or expired reset token".to_string()))?;

    let password_hash = password::hash_password(&req.new_password)?;
    User::update_password(&state.db, user_id, &password_hash).await?;
    let revoked = UserSession::revoke_all_for_user(&state.db, user_id, None).await?;

    tracing::info!(%user_id, revoked, "Password reset completed");

    Ok(Json(MessageResponse {
        message: "Password has been reset; please log in again".to_string(),
    }))
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use chrono::Duration;

    pub(crate) fn sample_user(now: DateTime<Utc>) -> User {
        User {
            id: Uuid::new_v4(),
            email: "provost@college.edu".to_string(),
            password_hash: "$argon2id$v=19$fake".to_string(),
            name: Some("Dana".to_string()),
            institution_name: Some("Example College".to_string()),
            role: "user".to_string(),
            email_verified: false,
            plan: "trial".to_string(),
            subscription_status: "trialing".to_string(),
            stripe_customer_id: Some("cus_secret".to_string()),
            stripe_subscription_id: None,
            trial_started_at: now - Duration::days(1),
            trial_ends_at: now + Duration::days(13),
            documents_uploaded: 2,
            analyses_run: 1,
            reports_generated: 0,
            created_at: now - Duration::days(1),
            updated_at: now,
            last_login_at: None,
        }
    }

    #[test]
    fn test_parse_intended_plan() {
        assert_eq!(parse_intended_plan(None).unwrap(), None);
        assert_eq!(parse_intended_plan(Some("  ")).unwrap(), None);
        assert_eq!(
            parse_intended_plan(Some("Professional")).unwrap(),
            Some(Plan::Professional)
        );
        assert!(matches!(
            parse_intended_plan(Some("trial")),
            Err(ApiError::BadRequest(_))
        ));
        assert!(matches!(
            parse_intended_plan(Some("enterprise")),
            Err(ApiError::BadRequest(_))
        ));
    }

    #[test]
    fn test_profile_change() {
        assert_eq!(profile_change(None), None);
        assert_eq!(profile_change(Some("  ".to_string())), Some(None));
        assert_eq!(
            profile_change(Some(" Example College ".to_string())),
            Some(Some("Example College".to_string()))
        );
    }

    #[test]
    fn test_profile_reflects_trial() {
        let now = Utc::now();
        let mut user = sample_user(now);

        let profile = UserProfile::from_user(&user, now);
        assert!(profile.has_access);
        assert!(profile.trial.active);
        assert_eq!(profile.plan, "trial");

        user.trial_started_at = now - Duration::days(30);
        user.trial_ends_at = now - Duration::days(16);
        let expired = UserProfile::from_user(&user, now);
        assert!(!expired.has_access);
        assert!(!expired.trial.active);
        assert_eq!(expired.trial.days_remaining, 0);
    }

    #[test]
    fn test_profile_hides_secrets() {
        let user = sample_user(Utc::now());
        let json = serde_json::to_value(UserProfile::from_user(&user, Utc::now())).unwrap();
        assert!(json.get("password_hash").is_none());
        assert!(json.get("stripe_customer_id").is_none());
    }

    #[test]
    fn test_register_request_validation() {
        let bad: RegisterRequest = serde_json::from_value(serde_json::json!({
            "email": "not-an-email",
            "password": "Accredit3d!"
        }))
        .unwrap();
        assert!(bad.validate().is_err());

        let good: RegisterRequest = serde_json::from_value(serde_json::json!({
            "email": "provost@college.edu",
            "password": "Accredit3d!",
            "institution_name": "Example College"
        }))
        .unwrap();
        assert!(good.validate().is_ok());
    }
}
