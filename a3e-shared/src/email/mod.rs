/// Transactional email
///
/// Providers sit behind [`EmailProvider`]; [`fallback::FallbackMailer`] tries
/// them in order until one accepts the message. Bodies are plain text.
///
/// # Example
///
/// ```no_run
/// use a3e_shared::email::{EmailMessage, EmailProvider, fallback::FallbackMailer, providers::LogProvider};
/// use std::sync::Arc;
///
/// # async fn example() -> Result<(), a3e_shared::email::EmailError> {
/// let providers: Vec<Arc<dyn EmailProvider>> = vec![Arc::new(LogProvider)];
/// let mailer = FallbackMailer::new(providers);
/// let provider = mailer
///     .send(&EmailMessage {
///         to: "dean@college.edu".into(),
///         from: "A³E <hello@mapmystandards.ai>".into(),
///         subject: "Hello".into(),
///         text: "Plain text body".into(),
///     })
///     .await?;
/// assert_eq!(provider, "log");
/// # Ok(())
/// # }
/// ```

pub mod fallback;
pub mod providers;
pub mod templates;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmailMessage {
    pub to: String,

    /// `Name <address>` or a bare address
    pub from: String,

    pub subject: String,
    pub text: String,
}

#[derive(Debug, thiserror::Error)]
pub enum EmailError {
    #[error("{provider}: request failed: {message}")]
    Network { provider: &'static str, message: String },

    #[error("{provider}: rejected with status {status}: {message}")]
    Rejected {
        provider: &'static str,
        status: u16,
        message: String,
    },

    #[error("No email provider is configured")]
    NoProviders,

    #[error("All email providers failed: {}", .0.join("; "))]
    AllProvidersFailed(Vec<String>),
}

#[async_trait]
pub trait EmailProvider: Send + Sync {
    fn name(&self) -> &'static str;

    async fn send(&self, message: &EmailMessage) -> Result<(), EmailError>;
}

/// Splits `Name <addr>` into its parts
pub fn parse_address(raw: &str) -> (Option<&str>, &str) {
    let raw = raw.trim();
    match (raw.find('<'), raw.rfind('>')) {
        (Some(open), Some(close)) if open < close => {
            let name = raw[..open].trim().trim_matches('"');
            let address = raw[open + 1..close].trim();
            ((!name.is_empty()).then_some(name), address)
        }
        _ => (None, raw),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_address() {
        assert_eq!(
            parse_address("A³E <hello@mapmystandards.ai>"),
            (Some("A³E"), "hello@mapmystandards.ai")
        );
        assert_eq!(parse_address("\"Ops\" <ops@x.io>"), (Some("Ops"), "ops@x.io"));
        assert_eq!(parse_address("plain@x.io"), (None, "plain@x.io"));
        assert_eq!(parse_address("<only@x.io>"), (None, "only@x.io"));
    }

    #[test]
    fn test_all_failed_lists_each_error() {
        let err = EmailError::AllProvidersFailed(vec!["sendgrid: 500".into(), "postmark: timeout".into()]);
        assert_eq!(
            err.to_string(),
            "All email providers failed: sendgrid: 500; postmark: timeout"
        );
    }
}
