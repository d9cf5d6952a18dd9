use crate::traits::{DirectAnswer, DirectProcessor};
use crate::transport::{field_str, pdf_part, HttpTransport};
use crate::{
    ClientConfig, ClientError, DocumentCategory, DocumentRecord, ModelInfo, PdfDetails,
    PdfIngestReport, PdfUpload, ProcessReport, TreatmentId,
};
use async_trait::async_trait;
use reqwest::multipart::Form;
use serde::de::DeserializeOwned;
use serde_json::{json, Map, Value};
use tracing::{info, warn};

/// Client for the direct-processing service.
pub struct HttpDirectProcessor {
    transport: HttpTransport,
}

impl HttpDirectProcessor {
    pub fn new(endpoint: &str, config: &ClientConfig) -> Result<Self, ClientError> {
        Ok(Self {
            transport: HttpTransport::new(endpoint, config.request_timeout)?,
        })
    }

    pub fn from_config(config: &ClientConfig) -> Result<Self, ClientError> {
        Self::new(&config.direct_url, config)
    }
}

#[async_trait]
impl DirectProcessor for HttpDirectProcessor {
    async fn query_text(
        &self,
        category: DocumentCategory,
        question: &str,
        treatment: Option<&TreatmentId>,
    ) -> Result<DirectAnswer, ClientError> {
        let route = category.query_route();
        let mut body = Map::new();
        body.insert("question".to_string(), json!(question));
        if let Some(treatment) = treatment {
            body.insert("RequestTreatmentId".to_string(), json!(treatment.as_str()));
        }

        let response = self
            .transport
            .post_json(&["query", route], &Value::Object(body))
            .await?;
        let content = answer_text(&response, &format!("/query/{route}"))?;
        info!(route, category = %category, "direct answer received");
        Ok(DirectAnswer { content, pdf: None })
    }

    async fn query_pdf(&self, upload: &PdfUpload) -> Result<DirectAnswer, ClientError> {
        let form = Form::new().part("file", pdf_part(upload)?);
        let response = self.transport.post_form(&["query", "pdf"], form).await?;
        let content = answer_text(&response, "/query/pdf")?;
        let details = PdfDetails {
            page_count: response
                .get("page_count")
                .and_then(Value::as_u64)
                .and_then(|count| u32::try_from(count).ok()),
            extraction_method: field_str(&response, &["extraction_method"]).map(str::to_string),
        };
        info!(file = %upload.file_name, pages = ?details.page_count, "direct pdf answer received");
        Ok(DirectAnswer {
            content,
            pdf: Some(details),
        })
    }

    async fn list_documents(&self) -> Result<Vec<DocumentRecord>, ClientError> {
        let response = self.transport.get_json(&["documents"]).await?;
        list_field(&response, "documents", "/documents")
    }

    async fn list_models(&self) -> Result<Vec<ModelInfo>, ClientError> {
        let response = self.transport.get_json(&["models"]).await?;
        list_field(&response, "models", "/models")
    }

    async fn delete_document(&self, document_id: &str) -> Result<(), ClientError> {
        if document_id.trim().is_empty() {
            return Err(ClientError::validation("document id is empty"));
        }
        self.transport.delete(&["documents", document_id]).await?;
        info!(document_id, "document deleted");
        Ok(())
    }

    async fn process_text(
        &self,
        content: &str,
        category: DocumentCategory,
    ) -> Result<ProcessReport, ClientError> {
        if content.trim().is_empty() {
            return Err(ClientError::validation("document content is empty"));
        }
        let response = self
            .transport
            .post_json(
                &["process"],
                &json!({ "content": content, "doc_type": category.as_str() }),
            )
            .await?;
        let report: ProcessReport = decode(response, "/process")?;
        if report.chunk_count().is_none() {
            warn!("process response did not report optimized_chunks");
        }
        Ok(report)
    }

    async fn process_pdf(
        &self,
        upload: &PdfUpload,
        category: DocumentCategory,
    ) -> Result<PdfIngestReport, ClientError> {
        if upload.bytes.is_empty() {
            return Err(ClientError::validation(format!(
                "pdf '{}' is empty",
                upload.file_name
            )));
        }
        let form = Form::new()
            .part("file", pdf_part(upload)?)
            .text("doc_type", category.as_str());
        let response = self.transport.post_form(&["process", "pdf"], form).await?;
        decode(response, "/process/pdf")
    }
}

fn answer_text(body: &Value, endpoint: &str) -> Result<String, ClientError> {
    match body.get("result").or_else(|| body.get("Result")) {
        Some(Value::String(text)) => Ok(text.clone()),
        Some(Value::Null) | None => Err(ClientError::protocol(endpoint, "missing field result")),
        Some(other) => Ok(other.to_string()),
    }
}

fn list_field<T: DeserializeOwned>(
    body: &Value,
    key: &str,
    endpoint: &str,
) -> Result<Vec<T>, ClientError> {
    match body.get(key) {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(items) => decode(items.clone(), endpoint),
    }
}

fn decode<T: DeserializeOwned>(body: Value, endpoint: &str) -> Result<T, ClientError> {
    serde_json::from_value(body).map_err(|error| ClientError::protocol(endpoint, error.to_string()))
}
