pub mod loop_worker;

use std::time::Duration;

use serde::Serialize;

use crate::backend::Job;
use crate::config::ClientConfig;

pub use loop_worker::poll_until_processed;

/// Fixed-interval, bounded polling. No backoff or jitter: each user action
/// produces exactly one background job to wait on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    pub interval: Duration,
    pub max_attempts: u32,
    /// `limit` passed to the result listing once the job is processed.
    pub item_limit: u32,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(1),
            max_attempts: 600,
            item_limit: 10,
        }
    }
}

impl From<&ClientConfig> for PollPolicy {
    fn from(config: &ClientConfig) -> Self {
        Self {
            interval: config.poll_interval(),
            max_attempts: config.max_poll_attempts,
            item_limit: config.item_limit,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "camelCase")]
pub enum PollOutcome {
    /// The job reached `processed`; `items` holds the listed results.
    Processed(Job),
    /// Every attempt was spent without seeing `processed`.
    TimedOut { attempts: u32 },
    Cancelled,
}
