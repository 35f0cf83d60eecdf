/// HTTP email providers
///
/// Each provider is one JSON POST. Base URLs are overridable so tests and
/// sandboxes can point elsewhere.

use super::{parse_address, EmailError, EmailMessage, EmailProvider};
use async_trait::async_trait;
use serde_json::json;
use std::time::Duration;

pub const SENDGRID_URL: &str = "https://api.sendgrid.com/v3/mail/send";
pub const MAILERSEND_URL: &str = "https://api.mailersend.com/v1/email";
pub const POSTMARK_URL: &str = "https://api.postmarkapp.com/email";

fn http_client(provider: &'static str) -> Result<reqwest::Client, EmailError> {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(15))
        .build()
        .map_err(|e| EmailError::Network {
            provider,
            message: e.to_string(),
        })
}

async fn dispatch(provider: &'static str, request: reqwest::RequestBuilder) -> Result<(), EmailError> {
    let response = request.send().await.map_err(|e| EmailError::Network {
        provider,
        message: e.to_string(),
    })?;

    let status = response.status();
    if status.is_success() {
        return Ok(());
    }

    let body = response.text().await.unwrap_or_default();
    Err(EmailError::Rejected {
        provider,
        status: status.as_u16(),
        message: body.chars().take(500).collect(),
    })
}

pub struct SendGridProvider {
    http: reqwest::Client,
    api_key: String,
    url: String,
}

impl SendGridProvider {
    pub fn new(api_key: impl Into<String>) -> Result<Self, EmailError> {
        Self::with_url(api_key, SENDGRID_URL)
    }

    pub fn with_url(api_key: impl Into<String>, url: &str) -> Result<Self, EmailError> {
        Ok(Self {
            http: http_client("sendgrid")?,
            api_key: api_key.into(),
            url: url.to_string(),
        })
    }

    pub fn body(message: &EmailMessage) -> serde_json::Value {
        let (from_name, from_email) = parse_address(&message.from);
        json!({
            "personalizations": [ { "to": [ { "email": message.to } ] } ],
            "from": { "email": from_email, "name": from_name },
            "subject": message.subject,
            "content": [ { "type": "text/plain", "value": message.text } ],
        })
    }
}

#[async_trait]
impl EmailProvider for SendGridProvider {
    fn name(&self) -> &'static str {
        "sendgrid"
    }

    async fn send(&self, message: &EmailMessage) -> Result<(), EmailError> {
        let request = self
            .http
            .post(&self.url)
            .bearer_auth(&self.api_key)
            .json(&Self::body(message));
        dispatch(self.name(), request).await
    }
}

pub struct MailerSendProvider {
    http: reqwest::Client,
    api_key: String,
    url: String,
}

impl MailerSendProvider {
    pub fn new(api_key: impl Into<String>) -> Result<Self, EmailError> {
        Self::with_url(api_key, MAILERSEND_URL)
    }

    pub fn with_url(api_key: impl Into<String>, url: &str) -> Result<Self, EmailError> {
        Ok(Self {
            http: http_client("mailersend")?,
            api_key: api_key.into(),
            url: url.to_string(),
        })
    }

    pub fn body(message: &EmailMessage) -> serde_json::Value {
        let (from_name, from_email) = parse_address(&message.from);
        json!({
            "from": { "email": from_email, "name": from_name },
            "to": [ { "email": message.to } ],
            "subject": message.subject,
            "text": message.text,
        })
    }
}

#[async_trait]
impl EmailProvider for MailerSendProvider {
    fn name(&self) -> &'static str {
        "mailersend"
    }

    async fn send(&self, message: &EmailMessage) -> Result<(), EmailError> {
        let request = self
            .http
            .post(&self.url)
            .bearer_auth(&self.api_key)
            .json(&Self::body(message));
        dispatch(self.name(), request).await
    }
}

pub struct PostmarkProvider {
    http: reqwest::Client,
    server_token: String,
    url: String,
}

impl PostmarkProvider {
    pub fn new(server_token: impl Into<String>) -> Result<Self, EmailError> {
        Self::with_url(server_token, POSTMARK_URL)
    }

    pub fn with_url(server_token: impl Into<String>, url: &str) -> Result<Self, EmailError> {
        Ok(Self {
            http: http_client("postmark")?,
            server_token: server_token.into(),
            url: url.to_string(),
        })
    }

    pub fn body(message: &EmailMessage) -> serde_json::Value {
        json!({
            "From": message.from,
            "To": message.to,
            "Subject": message.subject,
            "TextBody": message.text,
            "MessageStream": "outbound",
        })
    }
}

#[async_trait]
impl EmailProvider for PostmarkProvider {
    fn name(&self) -> &'static str {
        "postmark"
    }

    async fn send(&self, message: &EmailMessage) -> Result<(), EmailError> {
        let request = self
            .http
            .post(&self.url)
            .header("X-Postmark-Server-Token", &self.server_token)
            .header(reqwest::header::ACCEPT, "application/json")
            .json(&Self::body(message));
        dispatch(self.name(), request).await
    }
}

/// Writes messages to the log instead of sending them
pub struct LogProvider;

#[async_trait]
impl EmailProvider for LogProvider {
    fn name(&self) -> &'static str {
        "log"
    }

    async fn send(&self, message: &EmailMessage) -> Result<(), EmailError> {
        tracing::info!(
            to = %message.to,
            subject = %message.subject,
            body = %message.text,
            "Email (log provider)"
        );
        Ok(())
    }
}
