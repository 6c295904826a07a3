use std::sync::Arc;

use thiserror::Error;
use tokio::{
    sync::{watch, Mutex},
    task::JoinHandle,
};
use tokio_util::sync::CancellationToken;

use crate::backend::{BackendError, JobRequest, SearchBackend};
use crate::capture::CaptureContext;
use crate::config::ClientConfig;
use crate::geometry::{map_selection, GeometryError};
use crate::identity::IdentityStore;
use crate::poller::{poll_until_processed, PollOutcome, PollPolicy};
use crate::refinement::{
    controller::normalize_text, RefinementController, RefinementError, RefinementSlot,
};
use crate::selection::{InputEvent, InputStream, Transition};

use super::{SessionPhase, SessionSnapshot, SessionState};

// Set to true to enable verbose logging in this module
const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_error, log_info, log_warn};

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("cannot {operation} while the session is {phase}")]
    InvalidPhase {
        operation: &'static str,
        phase: SessionPhase,
    },

    #[error("selection could not be mapped onto the screenshot: {0}")]
    Geometry(#[from] GeometryError),

    #[error("job submission failed: {0}")]
    Submission(#[from] BackendError),

    #[error(transparent)]
    Refinement(#[from] RefinementError),
}

/// Work a background task polls for.
enum PollWork {
    Job(String),
    Refinement { slot: RefinementSlot, text: String },
}

struct ActivePoll {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
    generation: u64,
}

/// One activation of the overlay, from screenshot to close.
///
/// Cloning hands out another handle to the same session. Session state sits
/// behind an async mutex that is never held across a backend call; every
/// change is published on a watch channel for the rendering layer.
#[derive(Clone)]
pub struct SessionOrchestrator {
    state: Arc<Mutex<SessionState>>,
    backend: Arc<dyn SearchBackend>,
    identity: Arc<dyn IdentityStore>,
    policy: PollPolicy,
    channel: Option<String>,
    refinement: RefinementController,
    poll: Arc<Mutex<Option<ActivePoll>>>,
    updates: Arc<watch::Sender<SessionSnapshot>>,
    closed: CancellationToken,
}

impl SessionOrchestrator {
    pub fn new(
        backend: Arc<dyn SearchBackend>,
        identity: Arc<dyn IdentityStore>,
        config: &ClientConfig,
        channel: Option<String>,
    ) -> Self {
        let policy = PollPolicy::from(config);
        let state = SessionState::new();
        let (updates, _) = watch::channel(state.snapshot());

        Self {
            state: Arc::new(Mutex::new(state)),
            refinement: RefinementController::new(backend.clone(), policy),
            backend,
            identity,
            policy,
            channel,
            poll: Arc::new(Mutex::new(None)),
            updates: Arc::new(updates),
            closed: CancellationToken::new(),
        }
    }

    pub async fn snapshot(&self) -> SessionSnapshot {
        self.state.lock().await.snapshot()
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.updates.subscribe()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.is_cancelled()
    }

    fn publish(&self, state: &SessionState) {
        self.updates.send_replace(state.snapshot());
    }

    /// Attach the session's screenshot and arm point selection.
    pub async fn screenshot_ready(&self, capture: CaptureContext) -> Result<(), SessionError> {
        let mut state = self.state.lock().await;
        if state.phase != SessionPhase::AwaitingScreenshot {
            return Err(SessionError::InvalidPhase {
                operation: "accept a screenshot",
                phase: state.phase.clone(),
            });
        }

        log_info!(
            "screenshot ready: {}x{} image over {}x{} viewport",
            capture.natural_width,
            capture.natural_height,
            capture.viewport_width,
            capture.viewport_height
        );
        state.capture = Some(capture);
        state.machine.arm();
        state.set_phase(SessionPhase::Selecting);
        self.publish(&state);
        Ok(())
    }

    /// Feed one input event. A finalized selection is mapped, submitted and
    /// handed to a background poll before this returns.
    pub async fn handle_input(&self, event: InputEvent) -> Result<Transition, SessionError> {
        let finalized = {
            let mut state = self.state.lock().await;
            let phase = state.phase.clone();
            match phase {
                SessionPhase::Closed => return Ok(Transition::Ignored),
                SessionPhase::Selecting => {}
                _ => {
                    if matches!(event, InputEvent::Escape | InputEvent::CloseRequested) {
                        drop(state);
                        self.close().await;
                        return Ok(Transition::Closed);
                    }
                    return Ok(Transition::Ignored);
                }
            }

            let transition = state.machine.handle(event);
            match transition {
                Transition::Closed => {
                    drop(state);
                    self.close().await;
                    return Ok(Transition::Closed);
                }
                Transition::Finalized(selection) => selection,
                Transition::Ignored => return Ok(transition),
                _ => {
                    state.updated_at = chrono::Utc::now();
                    self.publish(&state);
                    return Ok(transition);
                }
            }
        };

        let request = {
            let mut state = self.state.lock().await;
            let mapped = match &state.capture {
                Some(capture) => map_selection(&finalized, capture).map(|selection| {
                    (selection, JobRequest::new(capture, &selection))
                }),
                None => Err(GeometryError::ImageNotDecoded),
            };
            match mapped {
                Ok((selection, request)) => {
                    log_info!("selection finalized: {:?}", selection);
                    state.selection = Some(selection);
                    state.set_phase(SessionPhase::Submitting);
                    self.publish(&state);
                    request
                }
                Err(err) => {
                    log_warn!("failed to map selection {:?}: {err}", finalized);
                    state.set_phase(SessionPhase::Error {
                        message: err.to_string(),
                    });
                    self.publish(&state);
                    return Err(err.into());
                }
            }
        };

        let user_id = match self.identity.get_or_create() {
            Ok(user_id) => Some(user_id),
            Err(err) => {
                log_warn!("submitting without a user id: {err:#}");
                None
            }
        };
        let request = request
            .with_user_id(user_id)
            .with_channel(self.channel.clone());

        let submitted = self.backend.submit_job(&request).await;

        let job_id = {
            let mut state = self.state.lock().await;
            if state.phase.is_closed() {
                log_debug!("session closed during submission; dropping response");
                return Ok(Transition::Finalized(finalized));
            }
            match submitted {
                Ok(job) => {
                    log_info!("job {} submitted", job.job_id);
                    let job_id = job.job_id.clone();
                    state.job = Some(job);
                    state.set_phase(SessionPhase::Polling);
                    self.publish(&state);
                    job_id
                }
                Err(err) => {
                    log_error!("job submission failed: {err}");
                    state.set_phase(SessionPhase::Error {
                        message: err.to_string(),
                    });
                    self.publish(&state);
                    return Err(err.into());
                }
            }
        };

        self.spawn_poll(PollWork::Job(job_id)).await;
        Ok(Transition::Finalized(finalized))
    }

    /// Send a natural-language edit for the current job. Results are replaced
    /// once the backend has processed the edited job.
    pub async fn refine(&self, text: &str) -> Result<(), SessionError> {
        let text = normalize_text(text)?;

        let slot = {
            let mut state = self.state.lock().await;
            if !state.phase.accepts_refinement() {
                return Err(SessionError::InvalidPhase {
                    operation: "refine",
                    phase: state.phase.clone(),
                });
            }
            let job_id = match &state.job {
                Some(job) => job.job_id.clone(),
                None => {
                    return Err(SessionError::InvalidPhase {
                        operation: "refine without a job",
                        phase: state.phase.clone(),
                    })
                }
            };
            let slot = self.refinement.acquire(&job_id)?;

            log_info!("refining job {} with '{}'", job_id, text);
            state.resume_phase = Some(state.phase.clone());
            state.set_phase(SessionPhase::Refining);
            self.publish(&state);
            slot
        };

        self.spawn_poll(PollWork::Refinement { slot, text }).await;
        Ok(())
    }

    /// Cancel any background poll, wait for it to stop and mark the session
    /// closed. Safe to call more than once.
    pub async fn close(&self) {
        {
            let mut state = self.state.lock().await;
            if state.phase.is_closed() {
                return;
            }
            state.machine.handle(InputEvent::CloseRequested);
            state.set_phase(SessionPhase::Closed);
            self.publish(&state);
        }
        self.closed.cancel();

        self.cancel_poll().await;
        log_info!("session closed");
    }

    /// Consume input until the session closes, then release the subscription.
    pub async fn drive(&self, mut input: InputStream) {
        loop {
            tokio::select! {
                biased;
                _ = self.closed.cancelled() => break,
                event = input.next() => {
                    let Some(event) = event else {
                        log_debug!("input stream ended");
                        break;
                    };
                    if let Err(err) = self.handle_input(event).await {
                        log_warn!("input {:?} failed: {err}", event);
                    }
                }
            }
        }
        input.release();
    }

    async fn spawn_poll(&self, work: PollWork) {
        let mut poll_guard = self.poll.lock().await;
        if let Some(previous) = poll_guard.take() {
            log_debug!("superseding poll generation {}", previous.generation);
            previous.cancel.cancel();
            let _ = previous.handle.await;
        }

        let generation = {
            let mut state = self.state.lock().await;
            if state.phase.is_closed() {
                return;
            }
            state.generation += 1;
            state.generation
        };

        let cancel = CancellationToken::new();
        let task_cancel = cancel.clone();
        let session = self.clone();

        let handle = tokio::spawn(async move {
            let outcome = match work {
                PollWork::Job(job_id) => Ok(poll_until_processed(
                    session.backend.as_ref(),
                    &job_id,
                    &session.policy,
                    &task_cancel,
                )
                .await),
                PollWork::Refinement { slot, text } => {
                    session.refinement.run(slot, text, &task_cancel).await
                }
            };
            session.apply_outcome(generation, outcome).await;
        });

        *poll_guard = Some(ActivePoll {
            cancel,
            handle,
            generation,
        });
    }

    async fn cancel_poll(&self) {
        let mut poll_guard = self.poll.lock().await;
        if let Some(active) = poll_guard.take() {
            active.cancel.cancel();
            if let Err(err) = active.handle.await {
                log_warn!("poll generation {} ended abnormally: {err}", active.generation);
            }
        }
    }

    async fn apply_outcome(
        &self,
        generation: u64,
        outcome: Result<PollOutcome, RefinementError>,
    ) {
        let mut state = self.state.lock().await;
        if state.phase.is_closed() || state.generation != generation {
            log_debug!(
                "discarding outcome of poll generation {} (current {}, {})",
                generation,
                state.generation,
                state.phase
            );
            return;
        }

        match outcome {
            Ok(PollOutcome::Processed(job)) => {
                state.items = job.items.clone().unwrap_or_default();
                log_info!(
                    "showing {} item(s) for job {} (version {:?})",
                    state.items.len(),
                    job.job_id,
                    job.version
                );
                state.job = Some(job);
                state.notice = None;
                state.resume_phase = None;
                state.set_phase(SessionPhase::ResultsShown);
            }
            Ok(PollOutcome::TimedOut { attempts }) => {
                log_warn!("giving up on results after {} attempts", attempts);
                state.resume_phase = None;
                state.set_phase(SessionPhase::TimedOut);
            }
            Ok(PollOutcome::Cancelled) => return,
            Err(err) => {
                log_warn!("refinement failed: {err}");
                state.notice = Some(err.to_string());
                let resume = state
                    .resume_phase
                    .take()
                    .unwrap_or(SessionPhase::ResultsShown);
                state.set_phase(resume);
            }
        }
        self.publish(&state);
    }
}
