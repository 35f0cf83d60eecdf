/// Job handlers
///
/// Each job kind has one [`JobHandler`]. The orchestrator decodes the job's
/// payload, looks the handler up in a [`HandlerRegistry`] and maps the
/// result onto the queue:
///
/// ```text
/// Ok(())                       -> succeeded
/// Err(e) if e.is_retryable()   -> pending again with backoff, or failed when out of attempts
/// Err(e)                       -> failed
/// ```
///
/// After the last attempt fails, [`JobHandler::on_exhausted`] gives the
/// handler a chance to leave its records in a final state.
///
/// # Example
///
/// ```no_run
/// use a3e_shared::models::job::{JobKind, JobPayload};
/// use a3e_worker::handlers::{HandlerError, JobHandler};
/// use async_trait::async_trait;
///
/// struct Noop;
///
/// #[async_trait]
/// impl JobHandler for Noop {
///     fn kind(&self) -> JobKind {
///         JobKind::SendEmail
///     }
///
///     async fn handle(&self, _payload: &JobPayload) -> Result<(), HandlerError> {
///         Ok(())
///     }
/// }
/// ```

pub mod analyze;
pub mod email;

pub use analyze::AnalyzeDocumentHandler;
pub use email::SendEmailHandler;

use a3e_shared::email::EmailError;
use a3e_shared::models::job::{JobKind, JobPayload};
use a3e_shared::storage::StorageError;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Debug, thiserror::Error)]
pub enum HandlerError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Email error: {0}")]
    Email(#[from] EmailError),

    /// Payload does not belong to this handler
    #[error("Unexpected payload for {expected}: {found}")]
    WrongPayload { expected: &'static str, found: &'static str },

    /// Retrying cannot help
    #[error("{0}")]
    Permanent(String),
}

impl HandlerError {
    pub fn is_retryable(&self) -> bool {
        match self {
            HandlerError::Database(_) | HandlerError::Email(_) => true,
            HandlerError::Storage(e) => !matches!(e, StorageError::NotFound(_) | StorageError::InvalidKey(_)),
            HandlerError::WrongPayload { .. } | HandlerError::Permanent(_) => false,
        }
    }

    pub fn wrong_payload(expected: JobKind, payload: &JobPayload) -> Self {
        HandlerError::WrongPayload {
            expected: expected.as_str(),
            found: payload.kind().as_str(),
        }
    }
}

#[async_trait]
pub trait JobHandler: Send + Sync {
    fn kind(&self) -> JobKind;

    async fn handle(&self, payload: &JobPayload) -> Result<(), HandlerError>;

    /// Called once when a job of this kind has failed for good
    async fn on_exhausted(&self, _payload: &JobPayload, _error: &HandlerError) {}
}

/// Handlers by job kind
#[derive(Clone, Default)]
pub struct HandlerRegistry {
    handlers: HashMap<JobKind, Arc<dyn JobHandler>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a handler, replacing any previous one for its kind
    pub fn register(&mut self, handler: Arc<dyn JobHandler>) {
        let kind = handler.kind();
        tracing::info!(kind = kind.as_str(), "Registering job handler");
        self.handlers.insert(kind, handler);
    }

    pub fn with(mut self, handler: Arc<dyn JobHandler>) -> Self {
        self.register(handler);
        self
    }

    pub fn get(&self, kind: JobKind) -> Option<Arc<dyn JobHandler>> {
        self.handlers.get(&kind).cloned()
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixed(JobKind);

    #[async_trait]
    impl JobHandler for Fixed {
        fn kind(&self) -> JobKind {
            self.0
        }

        async fn handle(&self, _payload: &JobPayload) -> Result<(), HandlerError> {
            Ok(())
        }
    }

    #[test]
    fn test_registry_lookup_by_kind() {
        let registry = HandlerRegistry::new()
            .with(Arc::new(Fixed(JobKind::SendEmail)))
            .with(Arc::new(Fixed(JobKind::SendEmail)));

        assert_eq!(registry.len(), 1);
        assert!(registry.get(JobKind::SendEmail).is_some());
        assert!(registry.get(JobKind::AnalyzeDocument).is_none());
    }

    #[test]
    fn test_retryable_errors() {
        assert!(HandlerError::Email(EmailError::NoProviders).is_retryable());
        assert!(HandlerError::Storage(StorageError::Backend("503".into())).is_retryable());
        assert!(!HandlerError::Storage(StorageError::NotFound("k".into())).is_retryable());
        assert!(!HandlerError::Permanent("gone".into()).is_retryable());

        let payload = JobPayload::AnalyzeDocument { document_id: uuid::Uuid::new_v4() };
        let err = HandlerError::wrong_payload(JobKind::SendEmail, &payload);
        assert!(!err.is_retryable());
        assert_eq!(err.to_string(), "Unexpected payload for send_email: analyze_document");
    }
}
