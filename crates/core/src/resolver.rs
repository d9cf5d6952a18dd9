use crate::traits::JobBroker;
use crate::{
    ClientError, CompletedPayload, JobId, JobKind, JobResult, StatusProbe, TreatmentSlot,
};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Classifies an identifier of unknown origin by probing the RAG pipeline
/// first, then the PDF pipeline. Read-only.
pub struct StatusResolver<B> {
    broker: Arc<B>,
}

impl<B> StatusResolver<B>
where
    B: JobBroker + Send + Sync,
{
    pub fn new(broker: Arc<B>) -> Self {
        Self { broker }
    }

    pub async fn resolve(&self, identifier: &str) -> Result<JobResult, ClientError> {
        let identifier = identifier.trim();
        if identifier.is_empty() {
            return Err(ClientError::validation("identifier is empty"));
        }
        let job_id = JobId::new(identifier);
        let mut treatment = TreatmentSlot::default();
        let mut pending = false;
        let mut first_error = None;
        let mut answered = false;

        for kind in [JobKind::TextAsync, JobKind::PdfAsync] {
            let pipeline = kind.label();
            let outcome = match kind {
                JobKind::TextAsync => self.broker.rag_status(&job_id).await,
                JobKind::PdfAsync => self.broker.pdf_status(&job_id).await,
            };

            match outcome {
                Ok(probe) => {
                    answered = true;
                    treatment.observe(probe.treatment_id());
                    match probe {
                        StatusProbe::Completed {
                            content,
                            processed_at,
                            ..
                        } => {
                            info!(job_id = %job_id, pipeline, "identifier resolved");
                            return Ok(JobResult::Completed(CompletedPayload {
                                job_id: Some(job_id),
                                content,
                                treatment_id: treatment.get().cloned(),
                                processed_at,
                                pdf: None,
                            }));
                        }
                        StatusProbe::Pending { .. } => pending = true,
                        StatusProbe::Absent => {}
                    }
                    debug!(job_id = %job_id, pipeline, pending, "no payload from pipeline");
                }
                Err(error) => {
                    warn!(job_id = %job_id, pipeline, %error, "status probe failed");
                    first_error.get_or_insert(error);
                }
            }
        }

        if let (false, Some(error)) = (answered, first_error) {
            return Err(error);
        }

        if pending {
            Ok(JobResult::Pending {
                treatment_id: treatment.get().cloned(),
                job_id,
            })
        } else {
            Ok(JobResult::NotFound { job_id })
        }
    }
}
