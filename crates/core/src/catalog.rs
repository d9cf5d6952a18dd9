use crate::traits::DirectProcessor;
use crate::{
    BackendHealth, ClientError, DocumentCategory, DocumentRecord, ModelInfo, PdfIngestReport,
    PdfUpload, ProcessReport,
};
use std::sync::Arc;
use tracing::info;

/// Document store and model listing on the direct-processing service.
pub struct DocumentCatalog<D> {
    direct: Arc<D>,
}

impl<D> DocumentCatalog<D>
where
    D: DirectProcessor + Send + Sync,
{
    pub fn new(direct: Arc<D>) -> Self {
        Self { direct }
    }

    pub async fn documents(&self) -> Result<Vec<DocumentRecord>, ClientError> {
        self.direct.list_documents().await
    }

    pub async fn models(&self) -> Result<Vec<ModelInfo>, ClientError> {
        self.direct.list_models().await
    }

    pub async fn delete(&self, document_id: &str) -> Result<(), ClientError> {
        self.direct.delete_document(document_id.trim()).await
    }

    pub async fn ingest_text(
        &self,
        content: &str,
        category: DocumentCategory,
    ) -> Result<ProcessReport, ClientError> {
        let report = self.direct.process_text(content, category).await?;
        info!(category = %category, chunks = ?report.chunk_count(), "text document ingested");
        Ok(report)
    }

    pub async fn ingest_pdf(
        &self,
        upload: &PdfUpload,
        category: DocumentCategory,
    ) -> Result<PdfIngestReport, ClientError> {
        let report = self.direct.process_pdf(upload, category).await?;
        info!(
            file = %upload.file_name,
            category = %category,
            pages = ?report.page_count,
            chunks = ?report.chunks_added,
            "pdf document ingested"
        );
        Ok(report)
    }

    pub async fn health(&self) -> Result<BackendHealth, ClientError> {
        let (models, documents) =
            tokio::try_join!(self.direct.list_models(), self.direct.list_documents())?;
        Ok(BackendHealth {
            models: models.len(),
            documents: documents.len(),
        })
    }
}
