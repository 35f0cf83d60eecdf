/// `send_email` jobs
///
/// Renders the template and hands it to the fallback mailer. Jobs that carry
/// a `dedupe_key` are tracked in `email_deliveries`: the key is claimed if
/// the enqueuer has not already done so, a key already marked `sent` is
/// skipped, and the outcome is written back after the attempt.

use super::{HandlerError, JobHandler};
use a3e_shared::email::{fallback::FallbackMailer, templates::EmailTemplate, EmailMessage};
use a3e_shared::models::{
    email_delivery::EmailDelivery,
    job::{JobKind, JobPayload},
};
use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

pub struct SendEmailHandler {
    db: PgPool,
    mailer: FallbackMailer,
    from: String,
    app_url: String,
}

pub fn build_message(to: &str, from: &str, template: &EmailTemplate, app_url: &str) -> EmailMessage {
    let rendered = template.render(app_url);
    EmailMessage {
        to: to.to_string(),
        from: from.to_string(),
        subject: rendered.subject,
        text: rendered.text,
    }
}

impl SendEmailHandler {
    pub fn new(db: PgPool, mailer: FallbackMailer, from: impl Into<String>, app_url: impl Into<String>) -> Self {
        Self {
            db,
            mailer,
            from: from.into(),
            app_url: app_url.into(),
        }
    }

    /// True when this key has already gone out
    async fn already_sent(&self, user_id: Option<Uuid>, template: &EmailTemplate, key: &str) -> Result<bool, HandlerError> {
        if EmailDelivery::claim(&self.db, user_id, &template.key(), key).await?.is_some() {
            return Ok(false);
        }

        Ok(EmailDelivery::find_by_key(&self.db, key)
            .await?
            .is_some_and(|delivery| delivery.status == "sent"))
    }

    async fn run(
        &self,
        to: &str,
        user_id: Option<Uuid>,
        template: &EmailTemplate,
        dedupe_key: Option<&str>,
    ) -> Result<(), HandlerError> {
        if let Some(key) = dedupe_key {
            if self.already_sent(user_id, template, key).await? {
                tracing::debug!(dedupe_key = key, "Email already sent, skipping");
                return Ok(());
            }
        }

        let message = build_message(to, &self.from, template, &self.app_url);

        match self.mailer.send(&message).await {
            Ok(provider) => {
                if let Some(key) = dedupe_key {
                    EmailDelivery::mark_sent(&self.db, key, provider).await?;
                }
                tracing::info!(template = %template.key(), ?user_id, provider, "Email sent");
                Ok(())
            }
            Err(e) => {
                if let Some(key) = dedupe_key {
                    EmailDelivery::mark_failed(&self.db, key).await?;
                }
                Err(e.into())
            }
        }
    }
}

#[async_trait]
impl JobHandler for SendEmailHandler {
    fn kind(&self) -> JobKind {
        JobKind::SendEmail
    }

    async fn handle(&self, payload: &JobPayload) -> Result<(), HandlerError> {
        match payload {
            JobPayload::SendEmail {
                to,
                user_id,
                template,
                dedupe_key,
            } => self.run(to, *user_id, template, dedupe_key.as_deref()).await,
            other => Err(HandlerError::wrong_payload(self.kind(), other)),
        }
    }
}
