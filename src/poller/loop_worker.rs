use tokio::time::{self, Instant};
use tokio_util::sync::CancellationToken;

use crate::backend::{BackendResult, Job, JobStatus, SearchBackend};

use super::{PollOutcome, PollPolicy};

// Set to true to enable per-attempt logging in this module
const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_info, log_warn};

/// Poll `job_id` until it is processed, the attempt budget runs out, or
/// `cancel` fires.
///
/// The first status call is immediate; every later one follows a sleep of
/// `policy.interval`. A failed call (status or the dependent item listing)
/// is logged and costs one attempt; it never aborts the loop. Cancellation
/// is checked before each sleep, races the sleep itself, and is re-checked
/// after each call so that a late answer is not reported.
pub async fn poll_until_processed(
    backend: &dyn SearchBackend,
    job_id: &str,
    policy: &PollPolicy,
    cancel: &CancellationToken,
) -> PollOutcome {
    let started = Instant::now();

    for attempt in 1..=policy.max_attempts {
        if cancel.is_cancelled() {
            log_info!("polling for job {} cancelled before attempt {}", job_id, attempt);
            return PollOutcome::Cancelled;
        }

        let result = check_once(backend, job_id, policy.item_limit).await;

        if cancel.is_cancelled() {
            log_info!("discarding attempt {} for job {}: polling cancelled", attempt, job_id);
            return PollOutcome::Cancelled;
        }

        match result {
            Ok(Some(job)) => {
                log_info!(
                    "job {} processed after {} attempt(s) in {}ms",
                    job_id,
                    attempt,
                    started.elapsed().as_millis()
                );
                return PollOutcome::Processed(job);
            }
            Ok(None) => log_debug!("job {} still pending (attempt {})", job_id, attempt),
            Err(err) => log_warn!("poll attempt {} for job {} failed: {err}", attempt, job_id),
        }

        if attempt == policy.max_attempts {
            break;
        }

        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                log_info!("polling for job {} cancelled while waiting", job_id);
                return PollOutcome::Cancelled;
            }
            _ = time::sleep(policy.interval) => {}
        }
    }

    log_warn!(
        "job {} not processed after {} attempts ({}ms); giving up",
        job_id,
        policy.max_attempts,
        started.elapsed().as_millis()
    );
    PollOutcome::TimedOut {
        attempts: policy.max_attempts,
    }
}

/// One status round trip. `Ok(None)` while pending; on `processed` the
/// result listing is fetched as part of the same attempt.
async fn check_once(
    backend: &dyn SearchBackend,
    job_id: &str,
    item_limit: u32,
) -> BackendResult<Option<Job>> {
    let mut job = backend.fetch_job(job_id).await?;
    if job.status() != JobStatus::Processed {
        return Ok(None);
    }

    let items = backend.list_items(job_id, item_limit).await?;
    job.items = Some(items);
    Ok(Some(job))
}
