use crate::traits::{JobBroker, QueuedJob};
use crate::transport::{field_str, pdf_part, required_str, HttpTransport};
use crate::{ClientConfig, ClientError, JobId, PdfUpload, StatusProbe, TreatmentId, UploadReceipt};
use async_trait::async_trait;
use reqwest::multipart::Form;
use serde_json::{json, Map, Value};
use tracing::{debug, info};

const TREATMENT_KEYS: [&str; 2] = ["RequestTreatmentId", "requestTreatmentId"];
const PENDING_STATUSES: [&str; 4] = ["pending", "queued", "processing", "in_progress"];

/// Client for the job-broker API (`/rag/*` and `/pdf/*`).
pub struct HttpJobBroker {
    transport: HttpTransport,
}

impl HttpJobBroker {
    pub fn new(endpoint: &str, config: &ClientConfig) -> Result<Self, ClientError> {
        Ok(Self {
            transport: HttpTransport::new(endpoint, config.request_timeout)?,
        })
    }

    pub fn from_config(config: &ClientConfig) -> Result<Self, ClientError> {
        Self::new(&config.broker_url, config)
    }

    async fn status(&self, pipeline: &str, job_id: &JobId) -> Result<StatusProbe, ClientError> {
        let body = self
            .transport
            .get_optional_json(&[pipeline, "status", job_id.as_str()])
            .await?;
        let probe = normalize_status(body.as_ref());
        debug!(pipeline, job_id = %job_id, ?probe, "status probe");
        Ok(probe)
    }
}

#[async_trait]
impl JobBroker for HttpJobBroker {
    async fn submit_question(
        &self,
        question: &str,
        treatment: Option<&TreatmentId>,
    ) -> Result<QueuedJob, ClientError> {
        let mut body = Map::new();
        body.insert("Question".to_string(), json!(question));
        if let Some(treatment) = treatment {
            body.insert("RequestTreatmentId".to_string(), json!(treatment.as_str()));
        }

        let response = self
            .transport
            .post_json(&["rag", "analyze"], &Value::Object(body))
            .await?;
        let queued = parse_queued(&response, "/rag/analyze", false)?;
        info!(job_id = %queued.job_id, "question queued");
        Ok(queued)
    }

    async fn submit_pdf(
        &self,
        upload: &PdfUpload,
        treatment: Option<&TreatmentId>,
    ) -> Result<QueuedJob, ClientError> {
        let mut form = Form::new().part("file", pdf_part(upload)?);
        if let Some(treatment) = treatment {
            form = form.text("requestTreatmentId", treatment.as_str().to_string());
        }

        let response = self.transport.post_form(&["pdf", "analyze"], form).await?;
        let queued = parse_queued(&response, "/pdf/analyze", true)?;
        info!(job_id = %queued.job_id, file = %upload.file_name, "pdf queued");
        Ok(queued)
    }

    async fn rag_status(&self, job_id: &JobId) -> Result<StatusProbe, ClientError> {
        self.status("rag", job_id).await
    }

    async fn pdf_status(&self, job_id: &JobId) -> Result<StatusProbe, ClientError> {
        self.status("pdf", job_id).await
    }
}

fn parse_queued(body: &Value, endpoint: &str, with_receipt: bool) -> Result<QueuedJob, ClientError> {
    let job_id = required_str(body, &["QueryId", "queryId"], endpoint)?;
    let receipt = with_receipt.then(|| UploadReceipt {
        file_name: field_str(body, &["FileName", "fileName"]).map(str::to_string),
        file_size: ["FileSize", "fileSize"]
            .iter()
            .find_map(|key| body.get(*key).and_then(Value::as_u64)),
    });

    Ok(QueuedJob {
        job_id: JobId::new(job_id),
        treatment_id: field_str(body, &TREATMENT_KEYS).and_then(TreatmentId::parse),
        receipt,
    })
}

/// Folds both status shapes into one probe. A non-empty `Result` wins; a
/// `ProcessedAt: null` or an in-flight `Status` means pending; anything else,
/// including a missing body, is absent.
pub fn normalize_status(body: Option<&Value>) -> StatusProbe {
    let Some(body) = body else {
        return StatusProbe::Absent;
    };
    let treatment_id = field_str(body, &TREATMENT_KEYS).and_then(TreatmentId::parse);

    if let Some(content) = payload_text(body) {
        return StatusProbe::Completed {
            content,
            treatment_id,
            processed_at: field_str(body, &["ProcessedAt", "processedAt"]).map(str::to_string),
        };
    }

    let unprocessed = ["ProcessedAt", "processedAt"]
        .iter()
        .any(|key| matches!(body.get(*key), Some(Value::Null)));
    let in_flight = field_str(body, &["Status", "status"]).is_some_and(|status| {
        let status = status.to_ascii_lowercase();
        PENDING_STATUSES.contains(&status.as_str())
    });

    if unprocessed || in_flight {
        StatusProbe::Pending { treatment_id }
    } else {
        StatusProbe::Absent
    }
}

fn payload_text(body: &Value) -> Option<String> {
    ["Result", "result"]
        .iter()
        .find_map(|key| body.get(*key))
        .and_then(|value| match value {
            Value::Null => None,
            Value::String(text) if text.is_empty() => None,
            Value::String(text) => Some(text.clone()),
            other => Some(other.to_string()),
        })
}
