use std::sync::Arc;

use fabric::prelude::*;
use ragflow_ingestion::repository::DocumentRepository;
use ragflow_ingestion::{DocumentStatus, IngestionService};
use ragflow_storage::BlobStore;

use crate::state::AppState;

const STALE_PROCESSING_TIMEOUT: chrono::Duration = chrono::Duration::minutes(15);

/// Background work with no HTTP surface: draining documents out of PENDING
/// and reaping documents stuck in PROCESSING. Both poll the document table
/// rather than react to an event, since nothing publishes "a document was
/// uploaded" onto the bus — upload is a synchronous write.
#[derive(Controller)]
#[controller(state = AppState)]
pub struct ScheduledJobs {
    #[inject]
    ingestion: Arc<IngestionService>,
    #[inject]
    documents: Arc<dyn DocumentRepository>,
    #[inject]
    blob: Arc<dyn BlobStore>,
}

#[routes]
impl ScheduledJobs {
    #[scheduled(every = 5)]
    async fn process_pending_documents(&self) {
        let pending = match self.documents.find_all().await {
            Ok(all) => all.into_iter().filter(|d| d.status == DocumentStatus::Pending).collect::<Vec<_>>(),
            Err(e) => {
                tracing::warn!(error = %e, "failed to list documents for pending scan");
                return;
            }
        };

        for document in pending {
            let bytes = match self.blob.get(document.tenant_id, document.id).await {
                Ok(bytes) => bytes,
                Err(e) => {
                    tracing::warn!(document_id = %document.id, error = %e, "failed to read blob for pending document");
                    continue;
                }
            };
            let text = String::from_utf8_lossy(&bytes).into_owned();
            if let Err(e) = self.ingestion.process_document(document.id, &text).await {
                tracing::warn!(document_id = %document.id, error = %e, "document processing failed");
            }
        }
    }

    #[scheduled(every = 60)]
    async fn reap_stale_processing(&self) {
        let all = match self.documents.find_all().await {
            Ok(all) => all,
            Err(e) => {
                tracing::warn!(error = %e, "failed to list documents for stale-processing scan");
                return;
            }
        };

        let cutoff = chrono::Utc::now() - STALE_PROCESSING_TIMEOUT;
        let stale = all.into_iter().filter(|d| d.status == DocumentStatus::Processing && d.updated_at < cutoff);

        for document in stale {
            if let Err(e) = self
                .documents
                .set_status(document.id, DocumentStatus::Failed, Some("indexing_timeout".to_string()))
                .await
            {
                tracing::warn!(document_id = %document.id, error = %e, "failed to mark stale document as failed");
            }
        }
    }
}
