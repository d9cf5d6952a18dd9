use crate::{
    ClientError, DocumentCategory, DocumentRecord, JobId, ModelInfo, PdfDetails, PdfIngestReport,
    PdfUpload, ProcessReport, StatusProbe, TreatmentId, UploadReceipt,
};
use async_trait::async_trait;

#[derive(Debug, Clone, PartialEq)]
pub struct QueuedJob {
    pub job_id: JobId,
    pub treatment_id: Option<TreatmentId>,
    pub receipt: Option<UploadReceipt>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DirectAnswer {
    pub content: String,
    pub pdf: Option<PdfDetails>,
}

/// The job-broker service: fire-and-forget submissions plus per-pipeline status.
#[async_trait]
pub trait JobBroker {
    async fn submit_question(
        &self,
        question: &str,
        treatment: Option<&TreatmentId>,
    ) -> Result<QueuedJob, ClientError>;

    async fn submit_pdf(
        &self,
        upload: &PdfUpload,
        treatment: Option<&TreatmentId>,
    ) -> Result<QueuedJob, ClientError>;

    async fn rag_status(&self, job_id: &JobId) -> Result<StatusProbe, ClientError>;

    async fn pdf_status(&self, job_id: &JobId) -> Result<StatusProbe, ClientError>;
}

/// The direct-processing service: inline answers and the document store.
#[async_trait]
pub trait DirectProcessor {
    async fn query_text(
        &self,
        category: DocumentCategory,
        question: &str,
        treatment: Option<&TreatmentId>,
    ) -> Result<DirectAnswer, ClientError>;

    async fn query_pdf(&self, upload: &PdfUpload) -> Result<DirectAnswer, ClientError>;

    async fn list_documents(&self) -> Result<Vec<DocumentRecord>, ClientError>;

    async fn list_models(&self) -> Result<Vec<ModelInfo>, ClientError>;

    async fn delete_document(&self, document_id: &str) -> Result<(), ClientError>;

    async fn process_text(
        &self,
        content: &str,
        category: DocumentCategory,
    ) -> Result<ProcessReport, ClientError>;

    async fn process_pdf(
        &self,
        upload: &PdfUpload,
        category: DocumentCategory,
    ) -> Result<PdfIngestReport, ClientError>;
}
