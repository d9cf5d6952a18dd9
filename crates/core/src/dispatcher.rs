use crate::traits::{DirectProcessor, JobBroker, QueuedJob};
use crate::{
    ClientError, CompletedPayload, JobDescriptor, JobKind, JobResult, QueryMode, Submission,
    SubmissionInput, SubmissionRequest,
};
use std::sync::Arc;
use tracing::info;

/// Routes a request to exactly one backend call. Never retries.
pub struct SubmissionDispatcher<B, D> {
    broker: Arc<B>,
    direct: Arc<D>,
}

impl<B, D> SubmissionDispatcher<B, D>
where
    B: JobBroker + Send + Sync,
    D: DirectProcessor + Send + Sync,
{
    pub fn new(broker: Arc<B>, direct: Arc<D>) -> Self {
        Self { broker, direct }
    }

    pub async fn submit(&self, request: &SubmissionRequest) -> Result<Submission, ClientError> {
        request.validate()?;
        let treatment = request.treatment();

        match (&request.input, request.mode) {
            (SubmissionInput::Question(question), QueryMode::Sync) => {
                let answer = self
                    .direct
                    .query_text(request.category, question, treatment.as_ref())
                    .await?;
                Ok(Submission::Immediate(JobResult::Completed(CompletedPayload {
                    job_id: None,
                    content: answer.content,
                    treatment_id: treatment,
                    processed_at: None,
                    pdf: None,
                })))
            }
            (SubmissionInput::Question(question), QueryMode::Async) => {
                let queued = self
                    .broker
                    .submit_question(question, treatment.as_ref())
                    .await?;
                Ok(queue(queued, JobKind::TextAsync, request))
            }
            (SubmissionInput::Pdf(upload), QueryMode::Sync) => {
                let answer = self.direct.query_pdf(upload).await?;
                Ok(Submission::Immediate(JobResult::Completed(CompletedPayload {
                    job_id: None,
                    content: answer.content,
                    treatment_id: None,
                    processed_at: None,
                    pdf: answer.pdf,
                })))
            }
            (SubmissionInput::Pdf(upload), QueryMode::Async) => {
                let queued = self.broker.submit_pdf(upload, treatment.as_ref()).await?;
                Ok(queue(queued, JobKind::PdfAsync, request))
            }
        }
    }
}

fn queue(queued: QueuedJob, kind: JobKind, request: &SubmissionRequest) -> Submission {
    // The backend echo wins; otherwise keep what was sent.
    let treatment_id = queued.treatment_id.or_else(|| request.treatment());
    let descriptor = JobDescriptor::new(queued.job_id, kind, treatment_id);
    info!(
        job_id = %descriptor.job_id,
        kind = descriptor.kind.label(),
        treatment = ?descriptor.treatment_id,
        "job descriptor created"
    );
    Submission::Queued {
        descriptor,
        receipt: queued.receipt,
    }
}
