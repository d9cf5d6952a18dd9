use crate::traits::JobBroker;
use crate::{
    ClientError, CompletedPayload, JobDescriptor, JobId, JobKind, JobResult, PollPolicy,
    StatusProbe, TreatmentId,
};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollPhase {
    Idle,
    Polling,
    Completed,
    NotFoundTerminal,
    TimedOut,
    Cancelled,
}

impl PollPhase {
    pub fn is_terminal(self) -> bool {
        !matches!(self, Self::Idle | Self::Polling)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum PollEvent {
    /// A tick did not finish the job; another one is scheduled.
    Pending {
        job_id: JobId,
        attempt: u32,
        treatment_id: Option<TreatmentId>,
    },
    Finished(JobResult),
}

pub trait PollSink: Send + Sync {
    fn emit(&self, event: PollEvent);
}

#[derive(Debug, Clone, PartialEq)]
pub enum TickStep {
    Retry(PollEvent),
    Done(JobResult),
}

/// Attempt accounting for one session. Holds no timers, so every transition
/// can be driven directly.
#[derive(Debug, Clone)]
pub struct PollState {
    descriptor: JobDescriptor,
    policy: PollPolicy,
    attempts: u32,
    consecutive_errors: u32,
    phase: PollPhase,
}

impl PollState {
    pub fn new(descriptor: JobDescriptor, policy: PollPolicy) -> Self {
        Self {
            descriptor,
            policy,
            attempts: 0,
            consecutive_errors: 0,
            phase: PollPhase::Polling,
        }
    }

    pub fn descriptor(&self) -> &JobDescriptor {
        &self.descriptor
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn phase(&self) -> PollPhase {
        self.phase
    }

    pub fn on_tick(&mut self, outcome: Result<StatusProbe, ClientError>) -> TickStep {
        debug_assert_eq!(self.phase, PollPhase::Polling, "tick after terminal state");

        match outcome {
            Ok(probe) => {
                self.consecutive_errors = 0;
                self.descriptor.attach_treatment(probe.treatment_id());
                match probe {
                    StatusProbe::Completed {
                        content,
                        processed_at,
                        ..
                    } => {
                        self.phase = PollPhase::Completed;
                        TickStep::Done(JobResult::Completed(CompletedPayload {
                            job_id: Some(self.descriptor.job_id.clone()),
                            content,
                            treatment_id: self.descriptor.treatment_id.clone(),
                            processed_at,
                            pdf: None,
                        }))
                    }
                    StatusProbe::Pending { .. } => self.count_attempt(),
                    StatusProbe::Absent => self.not_found(),
                }
            }
            Err(error) if !error.is_transient() => {
                warn!(job_id = %self.descriptor.job_id, %error, "status tick failed permanently");
                self.not_found()
            }
            Err(error) => {
                self.consecutive_errors += 1;
                warn!(
                    job_id = %self.descriptor.job_id,
                    consecutive = self.consecutive_errors,
                    %error,
                    "status tick failed"
                );
                let limit = self.policy.max_consecutive_errors;
                if limit > 0 && self.consecutive_errors >= limit {
                    self.not_found()
                } else {
                    self.count_attempt()
                }
            }
        }
    }

    fn count_attempt(&mut self) -> TickStep {
        self.attempts += 1;
        if self.attempts < self.policy.max_attempts {
            return TickStep::Retry(PollEvent::Pending {
                job_id: self.descriptor.job_id.clone(),
                attempt: self.attempts,
                treatment_id: self.descriptor.treatment_id.clone(),
            });
        }
        self.phase = PollPhase::TimedOut;
        TickStep::Done(JobResult::TimedOut {
            job_id: self.descriptor.job_id.clone(),
            treatment_id: self.descriptor.treatment_id.clone(),
            attempts: self.attempts,
        })
    }

    fn not_found(&mut self) -> TickStep {
        self.phase = PollPhase::NotFoundTerminal;
        TickStep::Done(JobResult::NotFound {
            job_id: self.descriptor.job_id.clone(),
        })
    }
}

struct ActiveSession {
    job_id: JobId,
    token: CancellationToken,
    phase: Arc<Mutex<PollPhase>>,
}

impl ActiveSession {
    fn cancel(&self) -> bool {
        self.token.cancel();
        let mut phase = lock(&self.phase);
        if phase.is_terminal() {
            return false;
        }
        *phase = PollPhase::Cancelled;
        info!(job_id = %self.job_id, "poll session cancelled");
        true
    }
}

/// Owns at most one live poll session. Starting a session cancels the
/// previous one first.
pub struct Poller<B> {
    broker: Arc<B>,
    policy: PollPolicy,
    active: Mutex<Option<ActiveSession>>,
}

impl<B> Poller<B>
where
    B: JobBroker + Send + Sync + 'static,
{
    pub fn new(broker: Arc<B>, policy: PollPolicy) -> Self {
        Self {
            broker,
            policy,
            active: Mutex::new(None),
        }
    }

    /// Must be called from within a tokio runtime. The first tick runs
    /// immediately.
    pub fn start(&self, descriptor: JobDescriptor, sink: Arc<dyn PollSink>) {
        let mut active = lock(&self.active);
        if let Some(previous) = active.as_ref() {
            previous.cancel();
        }

        let token = CancellationToken::new();
        let phase = Arc::new(Mutex::new(PollPhase::Polling));
        info!(
            job_id = %descriptor.job_id,
            kind = descriptor.kind.label(),
            max_attempts = self.policy.max_attempts,
            interval_ms = self.policy.interval.as_millis() as u64,
            budget_secs = self.policy.budget().as_secs(),
            "poll session started"
        );
        *active = Some(ActiveSession {
            job_id: descriptor.job_id.clone(),
            token: token.clone(),
            phase: phase.clone(),
        });

        let session = Session {
            broker: self.broker.clone(),
            state: PollState::new(descriptor, self.policy),
            sink,
            token,
            phase,
        };
        tokio::spawn(session.run());
    }

    /// Cancels the live session, if any. Returns whether one was running.
    ///
    /// On a multi-thread runtime a tick that was already publishing may still
    /// reach the sink once after this returns. Sinks that must not see late
    /// events need their own guard, such as the coordinator's generation check.
    pub fn cancel(&self) -> bool {
        lock(&self.active)
            .as_ref()
            .is_some_and(ActiveSession::cancel)
    }

    pub fn phase(&self) -> PollPhase {
        lock(&self.active)
            .as_ref()
            .map_or(PollPhase::Idle, |session| *lock(&session.phase))
    }

    pub fn active_job(&self) -> Option<JobId> {
        lock(&self.active)
            .as_ref()
            .filter(|session| !lock(&session.phase).is_terminal())
            .map(|session| session.job_id.clone())
    }
}

impl<B> Drop for Poller<B> {
    fn drop(&mut self) {
        if let Some(session) = lock(&self.active).as_ref() {
            session.cancel();
        }
    }
}

struct Session<B> {
    broker: Arc<B>,
    state: PollState,
    sink: Arc<dyn PollSink>,
    token: CancellationToken,
    phase: Arc<Mutex<PollPhase>>,
}

impl<B> Session<B>
where
    B: JobBroker + Send + Sync + 'static,
{
    async fn run(mut self) {
        let interval = self.state.policy.interval;
        loop {
            let outcome = tokio::select! {
                biased;
                _ = self.token.cancelled() => return,
                outcome = probe(self.broker.as_ref(), self.state.descriptor()) => outcome,
            };

            match self.state.on_tick(outcome) {
                TickStep::Retry(event) => {
                    debug!(job_id = %self.state.descriptor().job_id, attempt = self.state.attempts(), "job still pending");
                    if !self.publish(event, PollPhase::Polling) {
                        return;
                    }
                    tokio::select! {
                        biased;
                        _ = self.token.cancelled() => return,
                        _ = tokio::time::sleep(interval) => {}
                    }
                }
                TickStep::Done(result) => {
                    let phase = self.state.phase();
                    info!(job_id = %self.state.descriptor().job_id, ?phase, attempts = self.state.attempts(), "poll session finished");
                    self.publish(PollEvent::Finished(result), phase);
                    return;
                }
            }
        }
    }

    /// The phase lock is released before emitting; sinks that share state
    /// with other operations must guard their own writes.
    fn publish(&self, event: PollEvent, next: PollPhase) -> bool {
        {
            let mut phase = lock(&self.phase);
            if *phase == PollPhase::Cancelled || self.token.is_cancelled() {
                debug!("dropping poll event from cancelled session");
                return false;
            }
            *phase = next;
        }
        self.sink.emit(event);
        true
    }
}

async fn probe<B: JobBroker + Send + Sync>(
    broker: &B,
    descriptor: &JobDescriptor,
) -> Result<StatusProbe, ClientError> {
    match descriptor.kind {
        JobKind::TextAsync => broker.rag_status(&descriptor.job_id).await,
        JobKind::PdfAsync => broker.pdf_status(&descriptor.job_id).await,
    }
}

pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn descriptor() -> JobDescriptor {
        JobDescriptor::new(JobId::new("Q1"), JobKind::TextAsync, None)
    }

    fn policy(max_attempts: u32) -> PollPolicy {
        PollPolicy {
            max_attempts,
            interval: Duration::from_millis(10),
            max_consecutive_errors: 3,
        }
    }

    fn pending() -> Result<StatusProbe, ClientError> {
        Ok(StatusProbe::Pending { treatment_id: None })
    }

    fn transport_error() -> Result<StatusProbe, ClientError> {
        Err(ClientError::Transport {
            endpoint: "/rag/status/Q1".to_string(),
            status: 503,
        })
    }

    #[test]
    fn pending_tick_schedules_retry() {
        let mut state = PollState::new(descriptor(), policy(60));
        let step = state.on_tick(pending());
        assert!(matches!(step, TickStep::Retry(PollEvent::Pending { attempt: 1, .. })));
        assert_eq!(state.phase(), PollPhase::Polling);
    }

    #[test]
    fn exhausting_attempts_times_out_with_job_id() {
        let mut state = PollState::new(descriptor(), policy(3));
        state.on_tick(pending());
        state.on_tick(pending());
        let step = state.on_tick(pending());
        assert_eq!(
            step,
            TickStep::Done(JobResult::TimedOut {
                job_id: JobId::new("Q1"),
                treatment_id: None,
                attempts: 3,
            })
        );
        assert_eq!(state.phase(), PollPhase::TimedOut);
    }

    #[test]
    fn three_consecutive_errors_end_as_not_found() {
        let mut state = PollState::new(descriptor(), policy(60));
        assert!(matches!(state.on_tick(transport_error()), TickStep::Retry(_)));
        assert!(matches!(state.on_tick(transport_error()), TickStep::Retry(_)));
        assert!(matches!(
            state.on_tick(transport_error()),
            TickStep::Done(JobResult::NotFound { .. })
        ));
        assert_eq!(state.phase(), PollPhase::NotFoundTerminal);
    }

    #[test]
    fn successful_tick_resets_error_streak() {
        let mut state = PollState::new(descriptor(), policy(60));
        state.on_tick(transport_error());
        state.on_tick(transport_error());
        state.on_tick(pending());
        state.on_tick(transport_error());
        assert!(matches!(state.on_tick(transport_error()), TickStep::Retry(_)));
        assert_eq!(state.attempts(), 5);
    }

    #[test]
    fn disabled_error_limit_only_counts_attempts() {
        let mut state = PollState::new(
            descriptor(),
            PollPolicy {
                max_consecutive_errors: 0,
                ..policy(4)
            },
        );
        for _ in 0..3 {
            assert!(matches!(state.on_tick(transport_error()), TickStep::Retry(_)));
        }
        assert!(matches!(
            state.on_tick(transport_error()),
            TickStep::Done(JobResult::TimedOut { attempts: 4, .. })
        ));
    }

    #[test]
    fn non_transient_error_ends_session_at_once() {
        let mut state = PollState::new(descriptor(), policy(60));
        let step = state.on_tick(Err(ClientError::validation("job id is empty")));
        assert_eq!(
            step,
            TickStep::Done(JobResult::NotFound {
                job_id: JobId::new("Q1"),
            })
        );
        assert_eq!(state.phase(), PollPhase::NotFoundTerminal);
        assert_eq!(state.attempts(), 0);
    }

    #[test]
    fn absent_status_is_terminal() {
        let mut state = PollState::new(descriptor(), policy(60));
        assert!(matches!(
            state.on_tick(Ok(StatusProbe::Absent)),
            TickStep::Done(JobResult::NotFound { .. })
        ));
    }

    #[test]
    fn completion_keeps_treatment_seen_on_earlier_tick() {
        let mut state = PollState::new(descriptor(), policy(60));
        state.on_tick(Ok(StatusProbe::Pending {
            treatment_id: TreatmentId::parse("T1"),
        }));
        let step = state.on_tick(Ok(StatusProbe::Completed {
            content: "<p>ok</p>".to_string(),
            treatment_id: None,
            processed_at: None,
        }));
        let TickStep::Done(JobResult::Completed(payload)) = step else {
            panic!("expected completion");
        };
        assert_eq!(payload.treatment_id, TreatmentId::parse("T1"));
        assert_eq!(payload.job_id, Some(JobId::new("Q1")));
        assert_eq!(state.descriptor().treatment_id, TreatmentId::parse("T1"));
    }
}
