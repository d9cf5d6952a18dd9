pub mod backends;
pub mod catalog;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod models;
pub mod orchestrator;
pub mod poller;
pub mod resolver;
pub mod traits;
pub mod transport;

pub use backends::{normalize_status, HttpDirectProcessor, HttpJobBroker};
pub use catalog::DocumentCatalog;
pub use config::{ClientConfig, PollPolicy, DEFAULT_BROKER_URL, DEFAULT_DIRECT_URL};
pub use dispatcher::SubmissionDispatcher;
pub use error::ClientError;
pub use models::{
    BackendHealth, CompletedPayload, DocumentCategory, DocumentMetadata, DocumentRecord, JobDescriptor,
    JobId, JobKind, JobResult, ModelInfo, PdfDetails, PdfIngestReport, PdfUpload,
    ProcessReport, QueryMode, StatusProbe, Submission, SubmissionInput, SubmissionRequest,
    TreatmentId, TreatmentSlot, UploadReceipt,
};
pub use orchestrator::{Activity, DisplayState, JobCoordinator};
pub use poller::{PollEvent, PollPhase, PollSink, PollState, Poller, TickStep};
pub use resolver::StatusResolver;
pub use traits::{DirectAnswer, DirectProcessor, JobBroker, QueuedJob};
pub use transport::HttpTransport;
