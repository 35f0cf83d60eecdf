/// Sequential provider fallback
///
/// Providers are tried in the configured order. The first one that accepts
/// the message wins; each failure is logged and the next provider is tried.
/// When every provider fails the caller gets all of their errors.

use super::providers::{LogProvider, MailerSendProvider, PostmarkProvider, SendGridProvider};
use super::{EmailError, EmailMessage, EmailProvider};
use std::sync::Arc;
use tracing::{info, warn};

/// Provider order and credentials
#[derive(Debug, Clone, Default)]
pub struct EmailSettings {
    /// Names in priority order: `sendgrid`, `mailersend`, `postmark`, `log`
    pub providers: Vec<String>,
    pub sendgrid_api_key: Option<String>,
    pub mailersend_api_key: Option<String>,
    pub postmark_server_token: Option<String>,
}

#[derive(Clone)]
pub struct FallbackMailer {
    providers: Vec<Arc<dyn EmailProvider>>,
}

impl FallbackMailer {
    pub fn new(providers: Vec<Arc<dyn EmailProvider>>) -> Self {
        Self { providers }
    }

    /// Builds the chain from settings
    ///
    /// Names without credentials are skipped with a warning. An empty chain
    /// falls back to [`LogProvider`].
    pub fn from_settings(settings: &EmailSettings) -> Result<Self, EmailError> {
        let mut providers: Vec<Arc<dyn EmailProvider>> = Vec::new();

        for name in &settings.providers {
            match (name.trim().to_ascii_lowercase().as_str(), settings) {
                ("sendgrid", EmailSettings { sendgrid_api_key: Some(key), .. }) => {
                    providers.push(Arc::new(SendGridProvider::new(key.clone())?));
                }
                ("mailersend", EmailSettings { mailersend_api_key: Some(key), .. }) => {
                    providers.push(Arc::new(MailerSendProvider::new(key.clone())?));
                }
                ("postmark", EmailSettings { postmark_server_token: Some(token), .. }) => {
                    providers.push(Arc::new(PostmarkProvider::new(token.clone())?));
                }
                ("log", _) => providers.push(Arc::new(LogProvider)),
                (other, _) => warn!(provider = other, "Email provider skipped: unknown or missing credentials"),
            }
        }

        if providers.is_empty() {
            warn!("No email provider configured, emails will only be logged");
            providers.push(Arc::new(LogProvider));
        }

        Ok(Self::new(providers))
    }

    pub fn provider_names(&self) -> Vec<&'static str> {
        self.providers.iter().map(|p| p.name()).collect()
    }

    /// Sends through the first provider that succeeds and returns its name
    pub async fn send(&self, message: &EmailMessage) -> Result<&'static str, EmailError> {
        if self.providers.is_empty() {
            return Err(EmailError::NoProviders);
        }

        let mut failures = Vec::with_capacity(self.providers.len());

        for provider in &self.providers {
            match provider.send(message).await {
                Ok(()) => {
                    info!(provider = provider.name(), to = %message.to, "Email sent");
                    return Ok(provider.name());
                }
                Err(e) => {
                    warn!(provider = provider.name(), error = %e, "Email provider failed, trying next");
                    failures.push(e.to_string());
                }
            }
        }

        Err(EmailError::AllProvidersFailed(failures))
    }
}
