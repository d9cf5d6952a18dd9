use crate::ClientError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Backend-assigned name of one asynchronous request. Opaque and
/// case-preserving.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(String);

impl JobId {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Correlation token linking a request to an external case or record.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TreatmentId(String);

impl TreatmentId {
    /// Returns `None` for blank values; those never count as an observation.
    pub fn parse(value: &str) -> Option<Self> {
        if value.trim().is_empty() {
            None
        } else {
            Some(Self(value.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TreatmentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Holds the last non-empty treatment id seen for a job. Absent or blank
/// observations leave the held value in place.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TreatmentSlot {
    current: Option<TreatmentId>,
}

impl TreatmentSlot {
    pub fn seeded(value: Option<&str>) -> Self {
        Self {
            current: value.and_then(TreatmentId::parse),
        }
    }

    /// Records an observation and reports whether the held value changed.
    pub fn observe(&mut self, candidate: Option<&TreatmentId>) -> bool {
        match candidate {
            Some(value) if self.current.as_ref() != Some(value) => {
                self.current = Some(value.clone());
                true
            }
            _ => false,
        }
    }

    pub fn get(&self) -> Option<&TreatmentId> {
        self.current.as_ref()
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum JobKind {
    TextAsync,
    PdfAsync,
}

impl JobKind {
    pub fn label(self) -> &'static str {
        match self {
            Self::TextAsync => "rag",
            Self::PdfAsync => "pdf",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct JobDescriptor {
    pub job_id: JobId,
    pub treatment_id: Option<TreatmentId>,
    pub kind: JobKind,
    pub created_at: DateTime<Utc>,
}

impl JobDescriptor {
    pub fn new(job_id: JobId, kind: JobKind, treatment_id: Option<TreatmentId>) -> Self {
        Self {
            job_id,
            treatment_id,
            kind,
            created_at: Utc::now(),
        }
    }

    /// Attaches a treatment id discovered after creation. Follows the same
    /// retention rule as [`TreatmentSlot`].
    pub fn attach_treatment(&mut self, candidate: Option<&TreatmentId>) -> bool {
        let mut slot = TreatmentSlot {
            current: self.treatment_id.take(),
        };
        let changed = slot.observe(candidate);
        self.treatment_id = slot.current;
        changed
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct PdfDetails {
    pub page_count: Option<u32>,
    pub extraction_method: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CompletedPayload {
    pub job_id: Option<JobId>,
    /// Pre-formatted markup from the backend. Displayed verbatim.
    pub content: String,
    pub treatment_id: Option<TreatmentId>,
    pub processed_at: Option<String>,
    pub pdf: Option<PdfDetails>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum JobResult {
    Pending {
        job_id: JobId,
        treatment_id: Option<TreatmentId>,
    },
    NotFound {
        job_id: JobId,
    },
    Completed(CompletedPayload),
    TimedOut {
        job_id: JobId,
        treatment_id: Option<TreatmentId>,
        attempts: u32,
    },
}

impl JobResult {
    pub fn job_id(&self) -> Option<&JobId> {
        match self {
            Self::Pending { job_id, .. }
            | Self::NotFound { job_id }
            | Self::TimedOut { job_id, .. } => Some(job_id),
            Self::Completed(payload) => payload.job_id.as_ref(),
        }
    }

    pub fn treatment_id(&self) -> Option<&TreatmentId> {
        match self {
            Self::Pending { treatment_id, .. } | Self::TimedOut { treatment_id, .. } => {
                treatment_id.as_ref()
            }
            Self::Completed(payload) => payload.treatment_id.as_ref(),
            Self::NotFound { .. } => None,
        }
    }

    pub fn is_completed(&self) -> bool {
        matches!(self, Self::Completed(_))
    }
}

/// A status response normalized across the RAG and PDF pipelines.
#[derive(Debug, Clone, PartialEq)]
pub enum StatusProbe {
    Completed {
        content: String,
        treatment_id: Option<TreatmentId>,
        processed_at: Option<String>,
    },
    Pending {
        treatment_id: Option<TreatmentId>,
    },
    Absent,
}

impl StatusProbe {
    pub fn treatment_id(&self) -> Option<&TreatmentId> {
        match self {
            Self::Completed { treatment_id, .. } | Self::Pending { treatment_id } => {
                treatment_id.as_ref()
            }
            Self::Absent => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct UploadReceipt {
    pub file_name: Option<String>,
    pub file_size: Option<u64>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Submission {
    Queued {
        descriptor: JobDescriptor,
        receipt: Option<UploadReceipt>,
    },
    Immediate(JobResult),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PdfUpload {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

impl PdfUpload {
    pub fn new(file_name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            file_name: file_name.into(),
            bytes,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmissionInput {
    Question(String),
    Pdf(PdfUpload),
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
pub enum QueryMode {
    Sync,
    #[default]
    Async,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmissionRequest {
    pub input: SubmissionInput,
    pub mode: QueryMode,
    pub category: DocumentCategory,
    pub treatment_hint: Option<String>,
}

impl SubmissionRequest {
    pub fn question(text: impl Into<String>) -> Self {
        Self::from_input(SubmissionInput::Question(text.into()))
    }

    pub fn pdf(upload: PdfUpload) -> Self {
        Self::from_input(SubmissionInput::Pdf(upload))
    }

    fn from_input(input: SubmissionInput) -> Self {
        Self {
            input,
            mode: QueryMode::default(),
            category: DocumentCategory::default(),
            treatment_hint: None,
        }
    }

    pub fn with_mode(mut self, mode: QueryMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_category(mut self, category: DocumentCategory) -> Self {
        self.category = category;
        self
    }

    pub fn with_treatment_hint(mut self, hint: Option<String>) -> Self {
        self.treatment_hint = hint;
        self
    }

    /// The hint as it goes on the wire: blank hints are dropped.
    pub fn treatment(&self) -> Option<TreatmentId> {
        self.treatment_hint.as_deref().and_then(TreatmentId::parse)
    }

    pub fn validate(&self) -> Result<(), ClientError> {
        match &self.input {
            SubmissionInput::Question(text) if text.trim().is_empty() => {
                Err(ClientError::validation("question is empty"))
            }
            SubmissionInput::Pdf(upload) if upload.bytes.is_empty() => Err(
                ClientError::validation(format!("pdf '{}' is empty", upload.file_name)),
            ),
            _ => Ok(()),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
pub enum DocumentCategory {
    #[default]
    #[serde(rename = "DUT")]
    Dut,
    #[serde(rename = "DUT_MANUAL")]
    DutManual,
    #[serde(rename = "REPORT")]
    Report,
    #[serde(rename = "OTHER")]
    Other,
}

impl DocumentCategory {
    pub const ALL: [DocumentCategory; 4] = [Self::Dut, Self::DutManual, Self::Report, Self::Other];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Dut => "DUT",
            Self::DutManual => "DUT_MANUAL",
            Self::Report => "REPORT",
            Self::Other => "OTHER",
        }
    }

    /// Direct-processing route for synchronous questions.
    pub fn query_route(self) -> &'static str {
        match self {
            Self::Dut => "dut",
            _ => "full",
        }
    }
}

impl fmt::Display for DocumentCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DocumentCategory {
    type Err = ClientError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().to_ascii_uppercase().replace('-', "_");
        Self::ALL
            .into_iter()
            .find(|category| category.as_str() == normalized)
            .ok_or_else(|| ClientError::validation(format!("unknown document type '{value}'")))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct DocumentMetadata {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub doc_type: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DocumentRecord {
    pub id: String,
    #[serde(default)]
    pub metadata: DocumentMetadata,
}

impl DocumentRecord {
    pub fn display_name(&self) -> String {
        match self.metadata.name.as_deref() {
            Some(name) if !name.trim().is_empty() => name.to_string(),
            _ => format!("Doc-{}", self.id.chars().take(8).collect::<String>()),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ModelInfo {
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProcessReport {
    #[serde(default)]
    pub optimized_chunks: serde_json::Value,
}

impl ProcessReport {
    /// The service reports either a count or the chunk list itself.
    pub fn chunk_count(&self) -> Option<u64> {
        match &self.optimized_chunks {
            serde_json::Value::Number(number) => number.as_u64(),
            serde_json::Value::Array(items) => Some(items.len() as u64),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PdfIngestReport {
    #[serde(default)]
    pub page_count: Option<u32>,
    #[serde(default)]
    pub chunks_added: Option<u64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BackendHealth {
    pub models: usize,
    pub documents: usize,
}
