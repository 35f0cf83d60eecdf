/// Plans, subscriptions and the Stripe webhook
///
/// Subscribing creates the Stripe customer on first use and carries the
/// remaining trial days over, so nobody is charged before their trial ends.
/// Stripe then reports state changes through the webhook, which is the only
/// place `subscription_status` moves after the initial subscribe.
///
/// # Endpoints
///
/// - `GET /api/billing/plans` - Public price list
/// - `POST /api/billing/subscribe` - `{ "plan": "professional" }`
/// - `GET /api/billing/subscription` - Local state plus the provider's view
/// - `POST /api/billing/cancel` - `{ "at_period_end": true }`
/// - `POST /api/billing/webhook` - Signed Stripe events (no bearer token)

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
};
use a3e_shared::{
    auth::middleware::AuthContext,
    billing::{
        trial::TRIAL_DAYS,
        webhook::{parse_event, verify_signature, WebhookAction, DEFAULT_TOLERANCE_SECS},
        BillingError, PlanCatalog, PlanOffer, Subscription,
    },
    models::user::{Plan, SubscriptionStatus, User},
};
use axum::{extract::State, http::HeaderMap, Extension, Json};
use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize)]
pub struct PlansResponse {
    pub trial_days: i64,
    pub plans: Vec<PlanOffer>,
}

#[derive(Debug, Deserialize)]
pub struct SubscribeRequest {
    pub plan: String,
}

#[derive(Debug, Deserialize)]
pub struct CancelRequest {
    #[serde(default = "default_at_period_end")]
    pub at_period_end: bool,
}

fn default_at_period_end() -> bool {
    true
}

#[derive(Debug, Serialize)]
pub struct SubscriptionView {
    pub plan: String,
    pub status: String,
    pub has_access: bool,
    pub trial_ends_at: DateTime<Utc>,
    pub trial_days_remaining: i64,

    /// Provider-side subscription, when there is one
    pub subscription: Option<Subscription>,
}

impl SubscriptionView {
    fn new(user: &User, subscription: Option<Subscription>, now: DateTime<Utc>) -> Self {
        let trial = user.trial_window();
        SubscriptionView {
            plan: user.get_plan().as_str().to_string(),
            status: user.get_subscription_status().as_str().to_string(),
            has_access: user.has_access(now),
            trial_ends_at: trial.ends_at(),
            trial_days_remaining: trial.days_remaining(now),
            subscription,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct WebhookAck {
    pub received: bool,
}

/// Local state a webhook event asks for
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscriptionUpdate {
    pub plan: Plan,
    pub status: SubscriptionStatus,
    pub subscription_id: Option<String>,
}

/// Stripe customer an event concerns
pub fn event_customer(action: &WebhookAction) -> Option<&str> {
    match action {
        WebhookAction::SubscriptionChanged(sub) | WebhookAction::SubscriptionDeleted(sub) => {
            Some(sub.customer_id.as_str())
        }
        WebhookAction::PaymentFailed { customer_id, .. } => Some(customer_id.as_str()),
        WebhookAction::Ignored(_) => None,
    }
}

fn event_subscription(action: &WebhookAction) -> Option<&str> {
    match action {
        WebhookAction::SubscriptionChanged(sub) | WebhookAction::SubscriptionDeleted(sub) => Some(sub.id.as_str()),
        WebhookAction::PaymentFailed { subscription_id, .. } => subscription_id.as_deref(),
        WebhookAction::Ignored(_) => None,
    }
}

/// Maps an event onto the user's plan and status
///
/// Unknown price ids keep the current plan. A deleted subscription drops
/// the user back to the trial plan, which only grants access while the
/// original trial window is still open. Events about a subscription other
/// than the one on record are stale and change nothing.
pub fn subscription_update(catalog: &PlanCatalog, user: &User, action: &WebhookAction) -> Option<SubscriptionUpdate> {
    if let Some(event_subscription) = event_subscription(action) {
        if user
            .stripe_subscription_id
            .as_deref()
            .is_some_and(|current| current != event_subscription)
        {
            return None;
        }
    }

    match action {
        WebhookAction::SubscriptionChanged(sub) => Some(SubscriptionUpdate {
            plan: sub
                .price_id
                .as_deref()
                .and_then(|price| catalog.plan_for_price(price))
                .unwrap_or_else(|| user.get_plan()),
            status: SubscriptionStatus::from_str(&sub.status),
            subscription_id: Some(sub.id.clone()),
        }),
        WebhookAction::SubscriptionDeleted(_) => Some(SubscriptionUpdate {
            plan: Plan::Trial,
            status: SubscriptionStatus::Canceled,
            subscription_id: None,
        }),
        WebhookAction::PaymentFailed { subscription_id, .. } => Some(SubscriptionUpdate {
            plan: user.get_plan(),
            status: SubscriptionStatus::PastDue,
            subscription_id: subscription_id
                .clone()
                .or_else(|| user.stripe_subscription_id.clone()),
        }),
        WebhookAction::Ignored(_) => None,
    }
}

pub fn parse_paid_plan(raw: &str) -> ApiResult<Plan> {
    match Plan::from_str(&raw.trim().to_ascii_lowercase()) {
        Some(plan) if Plan::paid().contains(&plan) => Ok(plan),
        _ => Err(ApiError::BadRequest(format!(
            "Unknown plan '{}'; expected starter, professional or institution",
            raw.trim()
        ))),
    }
}

async fn current_user(state: &AppState, auth: &AuthContext) -> ApiResult<User> {
    User::find_by_id(&state.db, auth.user_id)
        .await?
        .ok_or_else(|| ApiError::Unauthorized("Account no longer exists".to_string()))
}

pub async fn list_plans(State(state): State<AppState>) -> Json<PlansResponse> {
    Json(PlansResponse {
        trial_days: TRIAL_DAYS,
        plans: state.catalog.offers().to_vec(),
    })
}

/// Start a paid subscription
///
/// # Errors
///
/// - `400 Bad Request`: Unknown plan
/// - `409 Conflict`: A live subscription already exists
/// - `502 Bad Gateway`: Payment provider failure
/// - `503 Service Unavailable`: No price id configured for the plan
pub async fn subscribe(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(req): Json<SubscribeRequest>,
) -> ApiResult<Json<SubscriptionView>> {
    let plan = parse_paid_plan(&req.plan)?;
    let price_id = state.catalog.price_for(plan)?.to_string();
    let user = current_user(&state, &auth).await?;

    let live = matches!(
        user.get_subscription_status(),
        SubscriptionStatus::Active | SubscriptionStatus::Trialing | SubscriptionStatus::PastDue
    );
    if live && user.stripe_subscription_id.is_some() {
        return Err(ApiError::Conflict("A subscription is already active".to_string()));
    }

    let customer_id = match &user.stripe_customer_id {
        Some(id) => id.clone(),
        None => {
            let display_name = user.institution_name.as_deref().or(user.name.as_deref());
            let customer = state.payments.create_customer(&user.email, display_name).await?;
            User::set_stripe_customer(&state.db, user.id, &customer.id).await?;
            customer.id
        }
    };

    let now = Utc::now();
    let trial_days = user.trial_window().days_remaining(now);
    let subscription = state
        .payments
        .create_subscription(&customer_id, &price_id, trial_days)
        .await?;

    let updated = User::update_subscription(
        &state.db,
        user.id,
        plan,
        SubscriptionStatus::from_str(&subscription.status),
        Some(&subscription.id),
    )
    .await?
    .ok_or_else(|| ApiError::Unauthorized("Account no longer exists".to_string()))?;

    tracing::info!(
        user_id = %user.id,
        plan = plan.as_str(),
        subscription_id = %subscription.id,
        trial_days,
        provider = state.payments.name(),
        "Subscription created"
    );

    Ok(Json(SubscriptionView::new(&updated, Some(subscription), now)))
}

pub async fn get_subscription(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> ApiResult<Json<SubscriptionView>> {
    let user = current_user(&state, &auth).await?;

    let subscription = match &user.stripe_subscription_id {
        None => None,
        Some(id) => match state.payments.retrieve_subscription(id).await {
            Ok(sub) => Some(sub),
            Err(BillingError::NotFound(_)) => {
                tracing::warn!(user_id = %user.id, subscription_id = %id, "Stored subscription unknown to provider");
                None
            }
            Err(e) => return Err(e.into()),
        },
    };

    Ok(Json(SubscriptionView::new(&user, subscription, Utc::now())))
}

/// Plan and subscription id to keep once the provider has answered a cancel
///
/// A subscription that ended right away leaves the user on the trial plan,
/// the same state a `customer.subscription.deleted` event produces.
pub fn after_cancel(plan: Plan, status: SubscriptionStatus, subscription_id: &str) -> (Plan, Option<&str>) {
    match status {
        SubscriptionStatus::Canceled => (Plan::Trial, None),
        _ => (plan, Some(subscription_id)),
    }
}

/// Cancel at period end (default) or immediately
pub async fn cancel(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(req): Json<CancelRequest>,
) -> ApiResult<Json<SubscriptionView>> {
    let user = current_user(&state, &auth).await?;
    let subscription_id = user
        .stripe_subscription_id
        .clone()
        .ok_or_else(|| ApiError::NotFound("No subscription to cancel".to_string()))?;

    let subscription = state
        .payments
        .cancel_subscription(&subscription_id, req.at_period_end)
        .await?;

    let status = SubscriptionStatus::from_str(&subscription.status);
    let (plan, kept_subscription) = after_cancel(user.get_plan(), status, &subscription.id);

    let user = User::update_subscription(&state.db, user.id, plan, status, kept_subscription)
    .await?
    .ok_or_else(|| ApiError::Unauthorized("Account no longer exists".to_string()))?;

    tracing::info!(
        user_id = %user.id,
        subscription_id = %subscription_id,
        at_period_end = req.at_period_end,
        "Subscription canceled"
    );

    Ok(Json(SubscriptionView::new(&user, Some(subscription), Utc::now())))
}

/// Stripe webhook receiver
///
/// The raw body is verified against `Stripe-Signature` before it is parsed.
/// Events for unknown customers and unhandled event types are acknowledged
/// so Stripe stops retrying them.
///
/// # Errors
///
/// - `400 Bad Request`: Missing/invalid signature or malformed payload
/// - `503 Service Unavailable`: `STRIPE_WEBHOOK_SECRET` not configured
pub async fn webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult<Json<WebhookAck>> {
    let secret = state
        .config
        .stripe
        .webhook_secret
        .as_deref()
        .ok_or_else(|| ApiError::ServiceUnavailable("Webhooks are not configured".to_string()))?;

    let signature = headers
        .get("stripe-signature")
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| ApiError::BadRequest("Missing Stripe-Signature header".to_string()))?;

    verify_signature(&body, signature, secret, Utc::now().timestamp(), DEFAULT_TOLERANCE_SECS)?;
    let event = parse_event(&body)?;

    let Some(customer_id) = event_customer(&event.action) else {
        tracing::debug!(event_id = %event.id, event_type = %event.event_type, "Ignoring webhook event");
        return Ok(Json(WebhookAck { received: true }));
    };

    let Some(user) = User::find_by_stripe_customer(&state.db, customer_id).await? else {
        tracing::warn!(event_id = %event.id, %customer_id, "Webhook for unknown customer");
        return Ok(Json(WebhookAck { received: true }));
    };

    if let Some(update) = subscription_update(&state.catalog, &user, &event.action) {
        User::update_subscription(
            &state.db,
            user.id,
            update.plan,
            update.status,
            update.subscription_id.as_deref(),
        )
        .await?;

        tracing::info!(
            event_id = %event.id,
            event_type = %event.event_type,
            user_id = %user.id,
            plan = update.plan.as_str(),
            status = update.status.as_str(),
            "Subscription updated from webhook"
        );
    }

    Ok(Json(WebhookAck { received: true }))
}
