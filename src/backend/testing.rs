//! Scripted in-memory backend for poller, refinement and session tests.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use super::{
    BackendError, BackendResult, Item, Job, JobRequest, Refinement, RefinementRequest,
    SearchBackend,
};

pub(crate) const JOB_ID: &str = "job-1";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Step {
    Pending,
    Processed,
    Fail,
}

/// Answers status calls from a queue of [`Step`]s; an empty queue answers
/// `Pending` forever.
#[derive(Default)]
pub(crate) struct ScriptedBackend {
    steps: Mutex<VecDeque<Step>>,
    status_delay: Mutex<Option<Duration>>,
    fail_submit: AtomicBool,
    fail_refinement: AtomicBool,
    fail_items_once: AtomicBool,
    pub submit_calls: AtomicUsize,
    pub status_calls: AtomicUsize,
    pub item_calls: AtomicUsize,
    pub refine_calls: AtomicUsize,
    pub last_request: Mutex<Option<JobRequest>>,
    last_status_job: Mutex<Option<String>>,
    refinement_job_id: Mutex<Option<String>>,
}

impl ScriptedBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_steps(steps: &[Step]) -> Self {
        let backend = Self::new();
        backend.push_steps(steps);
        backend
    }

    pub fn push_steps(&self, steps: &[Step]) {
        self.steps.lock().unwrap().extend(steps.iter().copied());
    }

    pub fn failing_submit(self) -> Self {
        self.fail_submit.store(true, Ordering::SeqCst);
        self
    }

    pub fn failing_refinement(self) -> Self {
        self.fail_refinement.store(true, Ordering::SeqCst);
        self
    }

    pub fn failing_items_once(self) -> Self {
        self.fail_items_once.store(true, Ordering::SeqCst);
        self
    }

    pub fn with_status_delay(self, delay: Duration) -> Self {
        *self.status_delay.lock().unwrap() = Some(delay);
        self
    }

    /// Answer refinements with a job id other than the one refined.
    pub fn answering_refinement_for(self, job_id: &str) -> Self {
        *self.refinement_job_id.lock().unwrap() = Some(job_id.to_string());
        self
    }

    pub fn last_status_job(&self) -> Option<String> {
        self.last_status_job.lock().unwrap().clone()
    }

    pub fn status_calls(&self) -> usize {
        self.status_calls.load(Ordering::SeqCst)
    }

    pub fn refine_calls(&self) -> usize {
        self.refine_calls.load(Ordering::SeqCst)
    }

    fn version(&self) -> u32 {
        self.refine_calls() as u32 + 1
    }
}

pub(crate) fn item(job_id: &str, version: u32, index: usize) -> Item {
    Item {
        id: format!("item-v{version}-{index}"),
        job_id: job_id.to_string(),
        title: format!("Result {index} (v{version})"),
        link: format!("https://shop.example/{version}/{index}"),
        source_label: "shop.example".into(),
        source_icon: None,
        price_value: 10.0 + index as f64,
        price_currency: "$".into(),
        thumbnail_ref: None,
        in_stock: true,
        is_favorite: false,
        version: Some(version),
        created_at: 0,
        updated_at: 0,
    }
}

#[async_trait]
impl SearchBackend for ScriptedBackend {
    async fn submit_job(&self, request: &JobRequest) -> BackendResult<Job> {
        self.submit_calls.fetch_add(1, Ordering::SeqCst);
        *self.last_request.lock().unwrap() = Some(request.clone());
        if self.fail_submit.load(Ordering::SeqCst) {
            return Err(BackendError::api(500, "submission rejected"));
        }
        Ok(Job::pending(JOB_ID))
    }

    async fn fetch_job(&self, job_id: &str) -> BackendResult<Job> {
        self.status_calls.fetch_add(1, Ordering::SeqCst);
        *self.last_status_job.lock().unwrap() = Some(job_id.to_string());
        let delay = *self.status_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let step = self.steps.lock().unwrap().pop_front().unwrap_or(Step::Pending);
        let mut job = Job::pending(job_id);
        job.version = Some(self.version());
        match step {
            Step::Pending => Ok(job),
            Step::Processed => {
                job.processed = true;
                job.description = Some(format!("object v{}", self.version()));
                Ok(job)
            }
            Step::Fail => Err(BackendError::api(503, "status unavailable")),
        }
    }

    async fn list_items(&self, job_id: &str, limit: u32) -> BackendResult<Vec<Item>> {
        self.item_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_items_once.swap(false, Ordering::SeqCst) {
            return Err(BackendError::api(502, "items unavailable"));
        }
        let version = self.version();
        Ok((0..limit.min(3) as usize)
            .map(|index| item(job_id, version, index))
            .collect())
    }

    async fn submit_refinement(
        &self,
        request: &RefinementRequest,
    ) -> BackendResult<(Job, Refinement)> {
        if self.fail_refinement.load(Ordering::SeqCst) {
            return Err(BackendError::api(400, "description is not available"));
        }
        self.refine_calls.fetch_add(1, Ordering::SeqCst);

        let answered_id = self
            .refinement_job_id
            .lock()
            .unwrap()
            .clone()
            .unwrap_or_else(|| request.job_id.clone());
        let mut job = Job::pending(answered_id);
        job.version = Some(self.version());
        let chat = Refinement {
            chat_id: Some(format!("chat-{}", self.refine_calls())),
            job_id: request.job_id.clone(),
            text: request.text.clone(),
            pre_description: "before".into(),
            post_description: "after".into(),
            created_at: 0,
            updated_at: 0,
        };
        Ok((job, chat))
    }
}
