/// In-memory payment provider
///
/// Used whenever `STRIPE_SECRET_KEY` is unset. Ids are deterministic
/// counters (`cus_mock_1`, `sub_mock_1`, ...).

use super::{BillingError, Customer, PaymentProvider, Subscription};
use async_trait::async_trait;
use chrono::{Duration, Utc};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

#[derive(Default)]
pub struct MockPaymentProvider {
    next_id: AtomicU64,
    subscriptions: Mutex<HashMap<String, Subscription>>,
}

impl MockPaymentProvider {
    pub fn new() -> Self {
        Self::default()
    }

    fn next(&self, prefix: &str) -> String {
        format!("{}_mock_{}", prefix, self.next_id.fetch_add(1, Ordering::Relaxed) + 1)
    }

    fn store(&self) -> Result<std::sync::MutexGuard<'_, HashMap<String, Subscription>>, BillingError> {
        self.subscriptions
            .lock()
            .map_err(|_| BillingError::Network("mock store poisoned".to_string()))
    }
}

#[async_trait]
impl PaymentProvider for MockPaymentProvider {
    fn name(&self) -> &'static str {
        "mock"
    }

    async fn create_customer(&self, email: &str, _name: Option<&str>) -> Result<Customer, BillingError> {
        Ok(Customer {
            id: self.next("cus"),
            email: email.to_string(),
        })
    }

    async fn create_subscription(
        &self,
        customer_id: &str,
        price_id: &str,
        trial_days: i64,
    ) -> Result<Subscription, BillingError> {
        let now = Utc::now();
        let trial_end = (trial_days > 0).then(|| now + Duration::days(trial_days));

        let sub = Subscription {
            id: self.next("sub"),
            customer_id: customer_id.to_string(),
            status: if trial_end.is_some() { "trialing" } else { "active" }.to_string(),
            price_id: Some(price_id.to_string()),
            trial_end,
            current_period_end: Some(trial_end.unwrap_or(now) + Duration::days(30)),
            cancel_at_period_end: false,
        };

        self.store()?.insert(sub.id.clone(), sub.clone());
        Ok(sub)
    }

    async fn cancel_subscription(
        &self,
        subscription_id: &str,
        at_period_end: bool,
    ) -> Result<Subscription, BillingError> {
        let mut store = self.store()?;
        let sub = store
            .get_mut(subscription_id)
            .ok_or_else(|| BillingError::NotFound(subscription_id.to_string()))?;

        if at_period_end {
            sub.cancel_at_period_end = true;
        } else {
            sub.status = "canceled".to_string();
        }
        Ok(sub.clone())
    }

    async fn retrieve_subscription(&self, subscription_id: &str) -> Result<Subscription, BillingError> {
        self.store()?
            .get(subscription_id)
            .cloned()
            .ok_or_else(|| BillingError::NotFound(subscription_id.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_subscription_lifecycle() {
        let provider = MockPaymentProvider::new();
        let customer = provider.create_customer("a@b.edu", None).await.unwrap();
        assert_eq!(customer.id, "cus_mock_1");

        let sub = provider
            .create_subscription(&customer.id, "price_s", 7)
            .await
            .unwrap();
        assert_eq!(sub.status, "trialing");
        assert!(sub.trial_end.is_some());

        let pending = provider.cancel_subscription(&sub.id, true).await.unwrap();
        assert!(pending.cancel_at_period_end);
        assert_eq!(pending.status, "trialing");

        let canceled = provider.cancel_subscription(&sub.id, false).await.unwrap();
        assert_eq!(canceled.status, "canceled");
        assert_eq!(provider.retrieve_subscription(&sub.id).await.unwrap().status, "canceled");
    }

    #[tokio::test]
    async fn test_no_trial_is_active() {
        let provider = MockPaymentProvider::new();
        let sub = provider.create_subscription("cus_x", "price_p", 0).await.unwrap();
        assert_eq!(sub.status, "active");
        assert!(sub.trial_end.is_none());
    }

    #[tokio::test]
    async fn test_unknown_subscription() {
        let provider = MockPaymentProvider::new();
        assert!(matches!(
            provider.retrieve_subscription("sub_nope").await,
            Err(BillingError::NotFound(_))
        ));
    }
}
