/// `analyze_document` jobs
///
/// Reads the stored bytes, maps them to the document's standard set, stores
/// the analysis and moves the document to `analyzed`. The analysis counts
/// toward the owner's usage only once it has been stored.

use super::{HandlerError, JobHandler};
use a3e_shared::models::{
    analysis::DocumentAnalysis,
    document::{Document, DocumentStatus},
    job::{JobKind, JobPayload},
    usage_event::{UsageEvent, UsageKind},
};
use a3e_shared::standards::analyze;
use a3e_shared::storage::{extension, StorageBackend, StorageError};
use async_trait::async_trait;
use sqlx::PgPool;
use std::sync::Arc;
use uuid::Uuid;

pub struct AnalyzeDocumentHandler {
    db: PgPool,
    storage: Arc<dyn StorageBackend>,
}

impl AnalyzeDocumentHandler {
    pub fn new(db: PgPool, storage: Arc<dyn StorageBackend>) -> Self {
        Self { db, storage }
    }

    async fn run(&self, document_id: Uuid) -> Result<(), HandlerError> {
        let Some(document) = Document::find_by_id(&self.db, document_id).await? else {
            tracing::info!(%document_id, "Document deleted before analysis, skipping");
            return Ok(());
        };

        let data = match self.storage.get(&document.storage_key).await {
            Ok(data) => data,
            Err(StorageError::NotFound(key)) => {
                Document::set_status(&self.db, document.id, DocumentStatus::Failed).await?;
                return Err(HandlerError::Permanent(format!("Stored bytes missing: {key}")));
            }
            Err(e) => return Err(e.into()),
        };

        let set = document.get_standard_set();
        let ext = extension(&document.filename);
        let result = analyze(&data, ext.as_deref(), set);

        let analysis = DocumentAnalysis::upsert(
            &self.db,
            document.id,
            set.as_str(),
            result.mappings,
            &result.score,
            &result.summary,
        )
        .await?;

        Document::set_status(&self.db, document.id, DocumentStatus::Analyzed).await?;

        UsageEvent::record_with_counter(
            &self.db,
            document.user_id,
            UsageKind::Analysis,
            serde_json::json!({
                "document_id": document.id,
                "standard_set": set.as_str(),
                "compliance_score": analysis.compliance_score,
            }),
        )
        .await?;

        tracing::info!(
            document_id = %document.id,
            user_id = %document.user_id,
            standard_set = set.as_str(),
            compliance_score = analysis.compliance_score,
            "Document analyzed"
        );

        Ok(())
    }
}

#[async_trait]
impl JobHandler for AnalyzeDocumentHandler {
    fn kind(&self) -> JobKind {
        JobKind::AnalyzeDocument
    }

    async fn handle(&self, payload: &JobPayload) -> Result<(), HandlerError> {
        match payload {
            JobPayload::AnalyzeDocument { document_id } => self.run(*document_id).await,
            other => Err(HandlerError::wrong_payload(self.kind(), other)),
        }
    }

    async fn on_exhausted(&self, payload: &JobPayload, error: &HandlerError) {
        let JobPayload::AnalyzeDocument { document_id } = payload else {
            return;
        };

        if let Err(e) = Document::set_status(&self.db, *document_id, DocumentStatus::Failed).await {
            tracing::error!(%document_id, error = %e, "Could not mark document failed");
        } else {
            tracing::warn!(%document_id, %error, "Analysis gave up");
        }
    }
}
