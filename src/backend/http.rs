//! HTTP client for the visual search backend.
//!
//! Every endpoint is a `POST`, including the reads.

use std::time::Duration;

use async_trait::async_trait;
use log::debug;
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use super::error::{BackendError, BackendResult};
use super::models::{Item, Job, JobRequest, Refinement, RefinementRequest};
use super::SearchBackend;

const CONNECT_TIMEOUT_SECS: u64 = 8;

/// FastAPI-style error payload, `{"detail": "..."}`.
#[derive(Deserialize)]
struct ErrorBody {
    detail: Option<serde_json::Value>,
}

#[derive(Clone)]
pub struct HttpBackend {
    base_url: String,
    http: Client,
}

impl HttpBackend {
    pub fn new(base_url: impl Into<String>, request_timeout: Duration) -> BackendResult<Self> {
        let http = Client::builder()
            .timeout(request_timeout)
            .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
            .build()?;
        Ok(Self {
            base_url: base_url.into(),
            http,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        let base = self.base_url.trim_end_matches('/');
        let path = path.trim_start_matches('/');
        format!("{base}/{path}")
    }

    async fn post<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> BackendResult<T> {
        let url = self.url(path);
        debug!("POST {url}");
        let mut request = self
            .http
            .post(&url)
            .header(reqwest::header::CONTENT_TYPE, "application/json");
        if !query.is_empty() {
            request = request.query(query);
        }
        self.send(request).await
    }

    async fn post_json<B, T>(&self, path: &str, body: &B) -> BackendResult<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let url = self.url(path);
        debug!("POST {url} (json body)");
        self.send(self.http.post(&url).json(body)).await
    }

    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> BackendResult<T> {
        let response = request.send().await?;
        let status = response.status();
        let text = response.text().await?;
        if !status.is_success() {
            let detail = serde_json::from_str::<ErrorBody>(&text)
                .ok()
                .and_then(|body| body.detail)
                .map(|detail| match detail {
                    serde_json::Value::String(message) => message,
                    other => other.to_string(),
                })
                .unwrap_or(text);
            return Err(BackendError::api(status.as_u16(), detail));
        }

        Ok(serde_json::from_str(&text)?)
    }

    pub async fn fetch_item(&self, item_id: &str) -> BackendResult<Item> {
        self.post(&format!("item/{item_id}"), &[]).await
    }

    /// Mark or unmark an item as a favorite; returns the updated item.
    pub async fn set_favorite(&self, item_id: &str, favorite: bool) -> BackendResult<Item> {
        let action = if favorite { "favorite" } else { "unfavorite" };
        self.post(&format!("item/{item_id}/{action}"), &[])
            .await
    }

    /// Favorites across every version of a job's results.
    pub async fn list_favorite_items(&self, job_id: &str, limit: u32) -> BackendResult<Vec<Item>> {
        self.post(
            &format!("click/{job_id}/items/favorites"),
            &[("limit", limit.to_string())],
        )
        .await
    }

    pub async fn recent_jobs(&self, user_id: &str, limit: u32) -> BackendResult<Vec<Job>> {
        self.post(
            &format!("user/{user_id}/clicks"),
            &[("limit", limit.to_string())],
        )
        .await
    }
}

#[async_trait]
impl SearchBackend for HttpBackend {
    async fn submit_job(&self, request: &JobRequest) -> BackendResult<Job> {
        self.post_json("click", request).await
    }

    async fn fetch_job(&self, job_id: &str) -> BackendResult<Job> {
        self.post(&format!("click/{job_id}"), &[]).await
    }

    async fn list_items(&self, job_id: &str, limit: u32) -> BackendResult<Vec<Item>> {
        self.post(
            &format!("click/{job_id}/items"),
            &[("limit", limit.to_string())],
        )
        .await
    }

    async fn submit_refinement(
        &self,
        request: &RefinementRequest,
    ) -> BackendResult<(Job, Refinement)> {
        self.post_json("chat", request).await
    }
}
