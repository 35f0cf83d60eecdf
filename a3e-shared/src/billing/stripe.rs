/// Stripe REST client
///
/// Form-encoded requests against `https://api.stripe.com/v1`, authenticated
/// with the secret key as a bearer token. Responses are decoded into the
/// small [`StripeSubscription`] shape and converted to
/// [`Subscription`](super::Subscription).

use super::{BillingError, Customer, PaymentProvider, Subscription};
use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use serde::Deserialize;
use std::time::Duration;

pub const STRIPE_API_BASE: &str = "https://api.stripe.com/v1";

/// Wire shape of a Stripe subscription object
#[derive(Debug, Clone, Deserialize)]
pub struct StripeSubscription {
    pub id: String,
    pub customer: String,
    pub status: String,
    #[serde(default)]
    pub trial_end: Option<i64>,
    #[serde(default)]
    pub current_period_end: Option<i64>,
    #[serde(default)]
    pub cancel_at_period_end: bool,
    #[serde(default)]
    pub items: Option<StripeList<StripeItem>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StripeList<T> {
    pub data: Vec<T>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StripeItem {
    pub price: StripePrice,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StripePrice {
    pub id: String,
}

#[derive(Debug, Deserialize)]
struct StripeCustomer {
    id: String,
    #[serde(default)]
    email: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StripeErrorBody {
    error: StripeErrorDetail,
}

#[derive(Debug, Deserialize)]
struct StripeErrorDetail {
    #[serde(default)]
    message: Option<String>,
}

fn from_unix(ts: Option<i64>) -> Option<DateTime<Utc>> {
    ts.and_then(|t| Utc.timestamp_opt(t, 0).single())
}

impl From<StripeSubscription> for Subscription {
    fn from(s: StripeSubscription) -> Self {
        let price_id = s
            .items
            .and_then(|items| items.data.into_iter().next())
            .map(|item| item.price.id);

        Subscription {
            id: s.id,
            customer_id: s.customer,
            status: s.status,
            price_id,
            trial_end: from_unix(s.trial_end),
            current_period_end: from_unix(s.current_period_end),
            cancel_at_period_end: s.cancel_at_period_end,
        }
    }
}

pub struct StripeClient {
    http: reqwest::Client,
    secret_key: String,
    base_url: String,
}

impl StripeClient {
    pub fn new(secret_key: impl Into<String>) -> Result<Self, BillingError> {
        Self::with_base_url(secret_key, STRIPE_API_BASE)
    }

    /// Points the client at another host (stripe-mock, tests)
    pub fn with_base_url(secret_key: impl Into<String>, base_url: &str) -> Result<Self, BillingError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(20))
            .user_agent(concat!("a3e/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| BillingError::Network(e.to_string()))?;

        Ok(Self {
            http,
            secret_key: secret_key.into(),
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    async fn send<T: for<'de> Deserialize<'de>>(
        &self,
        request: reqwest::RequestBuilder,
        what: &str,
    ) -> Result<T, BillingError> {
        let response = request
            .bearer_auth(&self.secret_key)
            .send()
            .await
            .map_err(|e| BillingError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<StripeErrorBody>(&text)
                .ok()
                .and_then(|b| b.error.message)
                .unwrap_or(text);

            tracing::warn!(status = status.as_u16(), %what, %message, "Stripe request failed");

            if status == reqwest::StatusCode::NOT_FOUND {
                return Err(BillingError::NotFound(what.to_string()));
            }
            return Err(BillingError::Api {
                status: status.as_u16(),
                message,
            });
        }

        response
            .json::<T>()
            .await
            .map_err(|e| BillingError::Parse(e.to_string()))
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }
}

#[async_trait]
impl PaymentProvider for StripeClient {
    fn name(&self) -> &'static str {
        "stripe"
    }

    async fn create_customer(&self, email: &str, name: Option<&str>) -> Result<Customer, BillingError> {
        let mut form = vec![("email", email.to_string())];
        if let Some(name) = name {
            form.push(("name", name.to_string()));
        }

        let customer: StripeCustomer = self
            .send(self.http.post(self.url("customers")).form(&form), "customer")
            .await?;

        tracing::info!(customer_id = %customer.id, "Created Stripe customer");

        Ok(Customer {
            id: customer.id,
            email: customer.email.unwrap_or_else(|| email.to_string()),
        })
    }

    async fn create_subscription(
        &self,
        customer_id: &str,
        price_id: &str,
        trial_days: i64,
    ) -> Result<Subscription, BillingError> {
        let mut form = vec![
            ("customer", customer_id.to_string()),
            ("items[0][price]", price_id.to_string()),
        ];
        if trial_days > 0 {
            form.push(("trial_period_days", trial_days.to_string()));
        }

        let sub: StripeSubscription = self
            .send(self.http.post(self.url("subscriptions")).form(&form), "subscription")
            .await?;

        tracing::info!(subscription_id = %sub.id, status = %sub.status, "Created Stripe subscription");
        Ok(sub.into())
    }

    async fn cancel_subscription(
        &self,
        subscription_id: &str,
        at_period_end: bool,
    ) -> Result<Subscription, BillingError> {
        let path = format!("subscriptions/{subscription_id}");

        let request = if at_period_end {
            self.http
                .post(self.url(&path))
                .form(&[("cancel_at_period_end", "true")])
        } else {
            self.http.delete(self.url(&path))
        };

        let sub: StripeSubscription = self.send(request, subscription_id).await?;
        Ok(sub.into())
    }

    async fn retrieve_subscription(&self, subscription_id: &str) -> Result<Subscription, BillingError> {
        let path = format!("subscriptions/{subscription_id}");
        let sub: StripeSubscription = self.send(self.http.get(self.url(&path)), subscription_id).await?;
        Ok(sub.into())
    }
}
