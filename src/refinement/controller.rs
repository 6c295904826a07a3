use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::backend::{BackendError, RefinementRequest, SearchBackend};
use crate::poller::{poll_until_processed, PollOutcome, PollPolicy};

// Set to true to enable verbose logging in this module
const ENABLE_LOGS: bool = true;

use crate::{log_info, log_warn};

#[derive(Debug, Error)]
pub enum RefinementError {
    #[error("refinement text is empty")]
    EmptyText,

    #[error("a refinement for job {job_id} is already being processed")]
    InFlight { job_id: String },

    #[error("refinement submission failed: {0}")]
    Submission(#[from] BackendError),
}

type InFlightSet = Arc<Mutex<HashSet<String>>>;

fn lock(set: &InFlightSet) -> std::sync::MutexGuard<'_, HashSet<String>> {
    match set.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

/// Exclusive right to refine one job. Released on drop, whichever way the
/// refinement ends.
#[derive(Debug)]
pub struct RefinementSlot {
    job_id: String,
    in_flight: InFlightSet,
}

impl RefinementSlot {
    pub fn job_id(&self) -> &str {
        &self.job_id
    }
}

impl Drop for RefinementSlot {
    fn drop(&mut self) {
        lock(&self.in_flight).remove(&self.job_id);
    }
}

/// Sends natural-language edits and re-polls the job they reset.
///
/// At most one refinement per job id is outstanding: a second request while
/// the first is still polling is rejected, never interleaved, so two poll
/// loops can not race on which answer is current.
#[derive(Clone)]
pub struct RefinementController {
    backend: Arc<dyn SearchBackend>,
    policy: PollPolicy,
    in_flight: InFlightSet,
}

impl RefinementController {
    pub fn new(backend: Arc<dyn SearchBackend>, policy: PollPolicy) -> Self {
        Self {
            backend,
            policy,
            in_flight: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    pub fn is_in_flight(&self, job_id: &str) -> bool {
        lock(&self.in_flight).contains(job_id)
    }

    /// Claim the job's single-flight slot.
    pub fn acquire(&self, job_id: &str) -> Result<RefinementSlot, RefinementError> {
        let mut guard = lock(&self.in_flight);
        if !guard.insert(job_id.to_string()) {
            return Err(RefinementError::InFlight {
                job_id: job_id.to_string(),
            });
        }
        Ok(RefinementSlot {
            job_id: job_id.to_string(),
            in_flight: self.in_flight.clone(),
        })
    }

    /// Validate, claim the slot, send the edit and poll until the job is
    /// processed again.
    pub async fn submit_refinement(
        &self,
        job_id: &str,
        edit_text: &str,
        cancel: &CancellationToken,
    ) -> Result<PollOutcome, RefinementError> {
        let text = normalize_text(edit_text)?;
        let slot = self.acquire(job_id)?;
        self.run(slot, text, cancel).await
    }

    /// Second half of [`submit_refinement`](Self::submit_refinement) for
    /// callers that claimed the slot up front.
    pub async fn run(
        &self,
        slot: RefinementSlot,
        text: String,
        cancel: &CancellationToken,
    ) -> Result<PollOutcome, RefinementError> {
        let request = RefinementRequest {
            job_id: slot.job_id().to_string(),
            text,
        };

        let (job, refinement) = match self.backend.submit_refinement(&request).await {
            Ok(response) => response,
            Err(err) => {
                log_warn!("refinement for job {} rejected: {err}", request.job_id);
                return Err(err.into());
            }
        };
        log_info!(
            "refinement accepted for job {} (version {:?}): '{}' -> '{}'",
            job.job_id,
            job.version,
            refinement.pre_description,
            refinement.post_description
        );

        if job.job_id != slot.job_id() {
            log_warn!(
                "refinement answered for job {} instead of {}; polling the latter",
                job.job_id,
                slot.job_id()
            );
        }

        let outcome =
            poll_until_processed(self.backend.as_ref(), slot.job_id(), &self.policy, cancel).await;
        drop(slot);
        Ok(outcome)
    }
}

pub(crate) fn normalize_text(edit_text: &str) -> Result<String, RefinementError> {
    let trimmed = edit_text.trim();
    if trimmed.is_empty() {
        return Err(RefinementError::EmptyText);
    }
    Ok(trimmed.to_string())
}
