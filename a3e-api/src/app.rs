/// Application state and router builder
///
/// This module defines the shared application state and provides
/// a function to build the Axum router with all routes and middleware.
///
/// # Example
///
/// ```no_run
/// use a3e_api::{app::AppState, config::Config};
/// use a3e_shared::billing::mock::MockPaymentProvider;
/// use sqlx::PgPool;
/// use std::sync::Arc;
///
/// # async fn example() -> anyhow::Result<()> {
/// let config = Config::from_env()?;
/// let pool = PgPool::connect(&config.database.url).await?;
/// let storage = config.storage.build()?;
/// let state = AppState::new(pool, config, storage, Arc::new(MockPaymentProvider::new()));
/// let app = a3e_api::app::build_router(state);
/// # Ok(())
/// # }
/// ```

use crate::{
    config::Config,
    middleware::{rate_limit::auth_rate_limit, security::SecurityHeadersLayer},
};
use a3e_shared::{
    auth::{jwt::TokenIssuer, middleware::create_session_middleware},
    billing::{PaymentProvider, PlanCatalog},
    quota::QuotaEnforcer,
    redis::FixedWindowLimiter,
    storage::StorageBackend,
};
use axum::{
    extract::DefaultBodyLimit,
    http::{header, HeaderValue, Method},
    routing::{get, post},
    Router,
};
use chrono::Duration;
use sqlx::PgPool;
use std::sync::Arc;
use tower_http::{
    compression::CompressionLayer,
    cors::CorsLayer,
    limit::RequestBodyLimitLayer,
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};
use tracing::Level;

/// Request body ceiling; uploads are capped separately at 25 MiB
pub const MAX_BODY_BYTES: usize = 30 * 1024 * 1024;

/// Shared application state
///
/// This is cloned for each request handler via Axum's `State` extractor.
/// Uses Arc internally for cheap cloning.
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool
    pub db: PgPool,

    /// Application configuration
    pub config: Arc<Config>,

    /// Signs and validates access/refresh tokens
    pub issuer: TokenIssuer,

    /// Where document bytes live
    pub storage: Arc<dyn StorageBackend>,

    /// Stripe, or the mock provider in development
    pub payments: Arc<dyn PaymentProvider>,

    pub catalog: Arc<PlanCatalog>,

    pub quota: QuotaEnforcer,

    /// `None` when Redis is not configured
    pub limiter: Option<FixedWindowLimiter>,
}

impl AppState {
    /// Creates new application state
    pub fn new(
        db: PgPool,
        config: Config,
        storage: Arc<dyn StorageBackend>,
        payments: Arc<dyn PaymentProvider>,
    ) -> Self {
        let issuer = TokenIssuer::with_ttls(
            &config.jwt.secret,
            Duration::seconds(config.jwt.access_ttl_seconds),
            Duration::seconds(config.jwt.refresh_ttl_seconds),
        );
        let catalog = PlanCatalog::new(config.stripe.prices.clone());

        Self {
            quota: QuotaEnforcer::new(db.clone()),
            db,
            config: Arc::new(config),
            issuer,
            storage,
            payments,
            catalog: Arc::new(catalog),
            limiter: None,
        }
    }

    /// Enables Redis-backed rate limiting on the public auth routes
    pub fn with_limiter(mut self, limiter: FixedWindowLimiter) -> Self {
        self.limiter = Some(limiter);
        self
    }
}

/// Builds the complete Axum router with all routes and middleware
///
/// # Architecture
///
/// ```text
/// /
/// ├── GET  /health                          # public
/// └── /api
///     ├── /auth                             # register/login/refresh/forgot/reset are public
///     ├── /documents[/:id[/download|/analyze|/analysis]]
///     ├── /standards[/:id]
///     ├── /compliance/summary
///     ├── /reports[/:id]
///     ├── /billing                          # /plans and /webhook are public
///     └── /usage
/// ```
///
/// # Middleware Stack
///
/// Applied in order (outermost first):
/// 1. Security headers
/// 2. CORS (tower-http CorsLayer)
/// 3. Logging (tower-http TraceLayer)
/// 4. Response compression (gzip, br)
/// 5. Body limit
/// 6. Authentication and rate limiting (per-route basis)
pub fn build_router(state: AppState) -> Router {
    use crate::routes;

    let require_auth = axum::middleware::from_fn(create_session_middleware(
        state.issuer.clone(),
        state.db.clone(),
    ));

    // Health check (public, no auth)
    let health_routes = Router::new().route("/health", get(routes::health::health_check));

    // Credential endpoints, rate limited per client
    let auth_public = Router::new()
        .route("/register", post(routes::auth::register))
        .route("/login", post(routes::auth::login))
        .route("/password/forgot", post(routes::auth::forgot_password))
        .route("/password/reset", post(routes::auth::reset_password))
        .layer(axum::middleware::from_fn_with_state(state.clone(), auth_rate_limit))
        .route("/refresh", post(routes::auth::refresh));

    let auth_private = Router::new()
        .route("/logout", post(routes::auth::logout))
        .route("/logout-all", post(routes::auth::logout_all))
        .route("/me", get(routes::auth::me).patch(routes::auth::update_me))
        .route("/sessions", get(routes::auth::list_sessions))
        .route("/password/change", post(routes::auth::change_password))
        .layer(require_auth.clone());

    let document_routes = Router::new()
        .route(
            "/",
            post(routes::documents::upload_document)
                .get(routes::documents::list_documents)
                .layer(DefaultBodyLimit::max(MAX_BODY_BYTES)),
        )
        .route(
            "/:id",
            get(routes::documents::get_document).delete(routes::documents::delete_document),
        )
        .route("/:id/download", get(routes::documents::download_document))
        .route("/:id/analyze", post(routes::compliance::analyze_document))
        .route("/:id/analysis", get(routes::compliance::get_analysis))
        .layer(require_auth.clone());

    let standards_routes = Router::new()
        .route("/", get(routes::standards::list_standards))
        .route("/:id", get(routes::standards::get_standard))
        .layer(require_auth.clone());

    let compliance_routes = Router::new()
        .route("/summary", get(routes::compliance::compliance_summary))
        .layer(require_auth.clone());

    let report_routes = Router::new()
        .route(
            "/",
            post(routes::reports::create_report).get(routes::reports::list_reports),
        )
        .route(
            "/:id",
            get(routes::reports::get_report).delete(routes::reports::delete_report),
        )
        .layer(require_auth.clone());

    let billing_private = Router::new()
        .route("/subscribe", post(routes::billing::subscribe))
        .route("/subscription", get(routes::billing::get_subscription))
        .route("/cancel", post(routes::billing::cancel))
        .layer(require_auth.clone());

    let billing_routes = Router::new()
        .route("/plans", get(routes::billing::list_plans))
        .route("/webhook", post(routes::billing::webhook))
        .merge(billing_private);

    let usage_routes = Router::new()
        .route("/", get(routes::usage::usage_summary))
        .layer(require_auth);

    let api_routes = Router::new()
        .nest("/auth", auth_public.merge(auth_private))
        .nest("/documents", document_routes)
        .nest("/standards", standards_routes)
        .nest("/compliance", compliance_routes)
        .nest("/reports", report_routes)
        .nest("/billing", billing_routes)
        .nest("/usage", usage_routes);

    // Configure CORS based on environment
    let cors = if state.config.api.cors_origins.iter().any(|o| o == "*") {
        // Development mode: permissive CORS
        CorsLayer::permissive()
    } else {
        // Production mode: configure allowed origins
        let origins: Vec<HeaderValue> = state
            .config
            .api
            .cors_origins
            .iter()
            .filter_map(|origin| origin.parse().ok())
            .collect();

        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods([
                Method::GET,
                Method::POST,
                Method::PATCH,
                Method::DELETE,
                Method::OPTIONS,
            ])
            .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
            .allow_credentials(true)
            .max_age(std::time::Duration::from_secs(3600))
    };

    let production = state.config.api.production;

    // Combine all routes with middleware stack
    Router::new()
        .merge(health_routes)
        .nest("/api", api_routes)
        .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES))
        .layer(CompressionLayer::new())
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(cors)
        .layer(SecurityHeadersLayer::new(production))
        .with_state(state)
}
