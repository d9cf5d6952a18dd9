use crate::backends::{HttpDirectProcessor, HttpJobBroker};
use crate::dispatcher::SubmissionDispatcher;
use crate::poller::{PollEvent, PollSink, Poller};
use crate::resolver::StatusResolver;
use crate::traits::{DirectProcessor, JobBroker};
use crate::{
    ClientConfig, ClientError, JobDescriptor, JobResult, PollPolicy, Submission,
    SubmissionRequest, TreatmentSlot, UploadReceipt,
};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Activity {
    #[default]
    Idle,
    Submitting,
    Polling {
        attempt: u32,
    },
    Resolving,
    Settled,
}

impl Activity {
    pub fn is_busy(self) -> bool {
        matches!(
            self,
            Self::Submitting | Self::Polling { .. } | Self::Resolving
        )
    }
}

/// The single "currently displayed" slot. Only the operation that owns
/// `generation` may write it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DisplayState {
    pub generation: u64,
    pub activity: Activity,
    pub descriptor: Option<JobDescriptor>,
    pub receipt: Option<UploadReceipt>,
    pub treatment: TreatmentSlot,
    pub result: Option<JobResult>,
    pub error: Option<String>,
}

impl DisplayState {
    fn observe_result(&mut self, result: &JobResult) {
        let treatment = result.treatment_id();
        self.treatment.observe(treatment);
        if let Some(descriptor) = self.descriptor.as_mut() {
            descriptor.attach_treatment(treatment);
        }
    }
}

type Display = Arc<watch::Sender<DisplayState>>;

/// Writes `update` only while `generation` is still current.
fn apply_if_current(
    display: &Display,
    generation: u64,
    update: impl FnOnce(&mut DisplayState),
) -> bool {
    display.send_if_modified(|state| {
        if state.generation != generation {
            return false;
        }
        update(state);
        true
    })
}

struct DisplaySink {
    display: Display,
    generation: u64,
}

impl PollSink for DisplaySink {
    fn emit(&self, event: PollEvent) {
        let applied = apply_if_current(&self.display, self.generation, |state| match event {
            PollEvent::Pending {
                job_id,
                attempt,
                treatment_id,
            } => {
                let result = JobResult::Pending {
                    job_id,
                    treatment_id,
                };
                state.observe_result(&result);
                state.activity = Activity::Polling { attempt };
                state.result = Some(result);
            }
            PollEvent::Finished(result) => {
                state.observe_result(&result);
                state.activity = Activity::Settled;
                state.result = Some(result);
            }
        });
        if !applied {
            debug!(generation = self.generation, "dropping poll event from superseded session");
        }
    }
}

/// Wires the dispatcher, the poller and the resolver to one display slot.
/// Every operation starts a new generation and cancels the live poll session
/// first; results from older generations are dropped.
pub struct JobCoordinator<B, D> {
    dispatcher: SubmissionDispatcher<B, D>,
    poller: Poller<B>,
    resolver: StatusResolver<B>,
    display: Display,
}

impl JobCoordinator<HttpJobBroker, HttpDirectProcessor> {
    pub fn from_config(config: &ClientConfig) -> Result<Self, ClientError> {
        let broker = Arc::new(HttpJobBroker::from_config(config)?);
        let direct = Arc::new(HttpDirectProcessor::from_config(config)?);
        Ok(Self::new(broker, direct, config.poll))
    }
}

impl<B, D> JobCoordinator<B, D>
where
    B: JobBroker + Send + Sync + 'static,
    D: DirectProcessor + Send + Sync,
{
    pub fn new(broker: Arc<B>, direct: Arc<D>, policy: PollPolicy) -> Self {
        let (display, _) = watch::channel(DisplayState::default());
        Self {
            dispatcher: SubmissionDispatcher::new(broker.clone(), direct),
            poller: Poller::new(broker.clone(), policy),
            resolver: StatusResolver::new(broker),
            display: Arc::new(display),
        }
    }

    pub fn snapshot(&self) -> DisplayState {
        self.display.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<DisplayState> {
        self.display.subscribe()
    }

    pub fn poller(&self) -> &Poller<B> {
        &self.poller
    }

    /// Validation happens before anything is cancelled, so a rejected request
    /// leaves the current job and its poll session alone. Returns the state
    /// this submission wrote, or `ClientError::Superseded` when a newer
    /// operation took the display slot first.
    pub async fn submit(&self, request: SubmissionRequest) -> Result<DisplayState, ClientError> {
        request.validate()?;
        let generation = self.begin(Activity::Submitting);

        let hint = request.treatment_hint.as_deref();
        let mut written = None;
        match self.dispatcher.submit(&request).await {
            Ok(Submission::Queued {
                descriptor,
                receipt,
            }) => {
                apply_if_current(&self.display, generation, |state| {
                    state.treatment = TreatmentSlot::seeded(hint);
                    state.treatment.observe(descriptor.treatment_id.as_ref());
                    state.descriptor = Some(descriptor.clone());
                    state.receipt = receipt;
                    state.activity = Activity::Polling { attempt: 0 };
                    // Starting under the slot lock: a newer operation either
                    // bumped the generation already or will cancel this session.
                    self.poller.start(
                        descriptor,
                        Arc::new(DisplaySink {
                            display: self.display.clone(),
                            generation,
                        }),
                    );
                    written = Some(state.clone());
                });
            }
            Ok(Submission::Immediate(result)) => {
                apply_if_current(&self.display, generation, |state| {
                    state.descriptor = None;
                    state.receipt = None;
                    state.treatment = TreatmentSlot::seeded(hint);
                    state.observe_result(&result);
                    state.result = Some(result);
                    state.activity = Activity::Settled;
                    written = Some(state.clone());
                });
            }
            Err(error) => {
                warn!(generation, %error, "submission failed");
                self.fail(generation, &error);
                return Err(error);
            }
        }

        written.ok_or_else(|| {
            info!(generation, "submission superseded by a newer operation");
            ClientError::Superseded
        })
    }

    /// Manual lookup of an identifier from either pipeline.
    pub async fn resolve(&self, identifier: &str) -> Result<DisplayState, ClientError> {
        if identifier.trim().is_empty() {
            return Err(ClientError::validation("identifier is empty"));
        }
        let generation = self.begin(Activity::Resolving);

        match self.resolver.resolve(identifier).await {
            Ok(result) => {
                let mut written = None;
                apply_if_current(&self.display, generation, |state| {
                    let same_job = state
                        .descriptor
                        .as_ref()
                        .is_some_and(|descriptor| Some(&descriptor.job_id) == result.job_id());
                    if !same_job {
                        state.treatment = TreatmentSlot::default();
                    }
                    state.observe_result(&result);
                    state.result = Some(result);
                    state.activity = Activity::Settled;
                    written = Some(state.clone());
                });
                written.ok_or_else(|| {
                    info!(generation, "lookup superseded by a newer operation");
                    ClientError::Superseded
                })
            }
            Err(error) => {
                warn!(generation, %error, "lookup failed");
                self.fail(generation, &error);
                Err(error)
            }
        }
    }

    /// Resolves once the current generation is no longer busy.
    pub async fn wait_settled(&self) -> DisplayState {
        let mut receiver = self.display.subscribe();
        loop {
            let state = receiver.borrow_and_update().clone();
            if !state.activity.is_busy() || receiver.changed().await.is_err() {
                return state;
            }
        }
    }

    pub fn shutdown(&self) {
        self.display.send_modify(|state| {
            self.poller.cancel();
            state.generation += 1;
            state.activity = Activity::Idle;
            state.descriptor = None;
            state.receipt = None;
        });
        info!("coordinator shut down");
    }

    fn begin(&self, activity: Activity) -> u64 {
        let mut generation = 0;
        self.display.send_modify(|state| {
            self.poller.cancel();
            state.generation += 1;
            state.activity = activity;
            state.result = None;
            state.error = None;
            generation = state.generation;
        });
        debug!(generation, ?activity, "operation started");
        generation
    }

    fn fail(&self, generation: u64, error: &ClientError) {
        apply_if_current(&self.display, generation, |state| {
            state.error = Some(error.to_string());
            state.activity = Activity::Settled;
        });
    }
}

impl<B, D> Drop for JobCoordinator<B, D> {
    fn drop(&mut self) {
        self.display.send_modify(|state| state.generation += 1);
    }
}
