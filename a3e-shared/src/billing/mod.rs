/// Billing: plans, trials and the payment provider seam
///
/// Stripe is reached through the [`PaymentProvider`] trait so the API can run
/// against [`mock::MockPaymentProvider`] in development and tests. Only the
/// handful of fields A³E needs are mapped: ids, status, trial end and period
/// end.
///
/// # Modules
///
/// - [`trial`]: the 14-day trial window
/// - [`stripe`]: REST client for `api.stripe.com/v1`
/// - [`mock`]: in-memory provider
/// - [`webhook`]: `Stripe-Signature` verification and event parsing
///
/// # Example
///
/// ```no_run
/// use a3e_shared::billing::{mock::MockPaymentProvider, PaymentProvider};
///
/// # async fn example() -> Result<(), a3e_shared::billing::BillingError> {
/// let provider = MockPaymentProvider::new();
/// let customer = provider.create_customer("bursar@college.edu", Some("Example College")).await?;
/// let sub = provider.create_subscription(&customer.id, "price_starter", 10).await?;
/// assert_eq!(sub.status, "trialing");
/// # Ok(())
/// # }
/// ```

pub mod mock;
pub mod stripe;
pub mod trial;
pub mod webhook;

use crate::models::user::Plan;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, thiserror::Error)]
pub enum BillingError {
    #[error("Payment provider request failed: {0}")]
    Network(String),

    #[error("Payment provider returned {status}: {message}")]
    Api { status: u16, message: String },

    #[error("Could not parse payment provider response: {0}")]
    Parse(String),

    #[error("Subscription not found: {0}")]
    NotFound(String),

    #[error("Plan {0} is not purchasable")]
    UnknownPlan(String),

    #[error("No price configured for plan {0}")]
    PriceNotConfigured(&'static str),
}

/// Provider-side customer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Customer {
    pub id: String,
    pub email: String,
}

/// Provider-side subscription, reduced to what A³E stores
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subscription {
    pub id: String,
    pub customer_id: String,

    /// Raw provider status (`trialing`, `active`, `past_due`, ...)
    pub status: String,

    /// Price id of the first item
    pub price_id: Option<String>,

    pub trial_end: Option<DateTime<Utc>>,
    pub current_period_end: Option<DateTime<Utc>>,
    pub cancel_at_period_end: bool,
}

#[async_trait]
pub trait PaymentProvider: Send + Sync {
    fn name(&self) -> &'static str;

    async fn create_customer(&self, email: &str, name: Option<&str>) -> Result<Customer, BillingError>;

    /// Starts a subscription; `trial_days = 0` charges immediately
    async fn create_subscription(
        &self,
        customer_id: &str,
        price_id: &str,
        trial_days: i64,
    ) -> Result<Subscription, BillingError>;

    async fn cancel_subscription(
        &self,
        subscription_id: &str,
        at_period_end: bool,
    ) -> Result<Subscription, BillingError>;

    async fn retrieve_subscription(&self, subscription_id: &str) -> Result<Subscription, BillingError>;
}

/// A purchasable plan with its price
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlanOffer {
    pub plan: Plan,
    pub name: &'static str,
    pub monthly_price_cents: u32,
    pub currency: &'static str,
    pub features: Vec<&'static str>,

    /// Stripe price id; hidden from clients
    #[serde(skip)]
    pub price_id: Option<String>,
}

/// Price ids for the paid plans, from configuration
#[derive(Debug, Clone, Default)]
pub struct PriceIds {
    pub starter: Option<String>,
    pub professional: Option<String>,
    pub institution: Option<String>,
}

/// The three paid plans
#[derive(Debug, Clone)]
pub struct PlanCatalog {
    offers: Vec<PlanOffer>,
}

impl PlanCatalog {
    pub fn new(prices: PriceIds) -> Self {
        let offers = vec![
            PlanOffer {
                plan: Plan::Starter,
                name: "Starter",
                monthly_price_cents: 9_900,
                currency: "usd",
                features: vec!["50 documents", "100 analyses per month", "20 reports per month"],
                price_id: prices.starter,
            },
            PlanOffer {
                plan: Plan::Professional,
                name: "Professional",
                monthly_price_cents: 29_900,
                currency: "usd",
                features: vec!["500 documents", "1,000 analyses per month", "100 reports per month"],
                price_id: prices.professional,
            },
            PlanOffer {
                plan: Plan::Institution,
                name: "Institution",
                monthly_price_cents: 89_900,
                currency: "usd",
                features: vec!["Unlimited documents", "Unlimited analyses", "Unlimited reports"],
                price_id: prices.institution,
            },
        ];

        Self { offers }
    }

    pub fn offers(&self) -> &[PlanOffer] {
        &self.offers
    }

    pub fn offer(&self, plan: Plan) -> Option<&PlanOffer> {
        self.offers.iter().find(|o| o.plan == plan)
    }

    /// Price id to charge for `plan`
    pub fn price_for(&self, plan: Plan) -> Result<&str, BillingError> {
        let offer = self
            .offer(plan)
            .ok_or_else(|| BillingError::UnknownPlan(plan.as_str().to_string()))?;

        offer
            .price_id
            .as_deref()
            .ok_or(BillingError::PriceNotConfigured(plan.as_str()))
    }

    /// Reverse lookup used by webhooks
    pub fn plan_for_price(&self, price_id: &str) -> Option<Plan> {
        self.offers
            .iter()
            .find(|o| o.price_id.as_deref() == Some(price_id))
            .map(|o| o.plan)
    }
}
