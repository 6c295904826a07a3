pub mod error;
pub mod http;
pub mod models;

#[cfg(test)]
pub(crate) mod testing;

use async_trait::async_trait;

pub use error::{BackendError, BackendResult};
pub use http::HttpBackend;
pub use models::{Item, Job, JobRequest, JobStatus, Refinement, RefinementRequest};

/// The endpoints the selection/result loop depends on.
///
/// Calls may take arbitrarily long and complete in any order; callers must not
/// hold locks across them.
#[async_trait]
pub trait SearchBackend: Send + Sync {
    /// Create a job for a screenshot and a selection. The returned job is
    /// normally still pending.
    async fn submit_job(&self, request: &JobRequest) -> BackendResult<Job>;

    /// Current status of a job.
    async fn fetch_job(&self, job_id: &str) -> BackendResult<Job>;

    /// Result items of the job's current version, best first.
    async fn list_items(&self, job_id: &str, limit: u32) -> BackendResult<Vec<Item>>;

    /// Send a natural-language edit. The backend resets the job to pending and
    /// bumps its version before answering.
    async fn submit_refinement(
        &self,
        request: &RefinementRequest,
    ) -> BackendResult<(Job, Refinement)>;
}
