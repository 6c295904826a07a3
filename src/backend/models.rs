//! Wire records of the visual search backend.
//!
//! Field names follow the backend's JSON. A job travels as a "click"
//! (`click_id`, `is_processed`); refinements travel as "chats".

use serde::{Deserialize, Serialize};

use crate::capture::CaptureContext;
use crate::geometry::Selection;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum JobStatus {
    Pending,
    Processed,
}

/// Body of the job submission endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobRequest {
    pub base64_image: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub click: Option<[u32; 2]>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selection: Option<[u32; 4]>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel: Option<String>,
}

impl JobRequest {
    pub fn new(capture: &CaptureContext, selection: &Selection) -> Self {
        Self {
            base64_image: capture.base64_image(),
            click: selection.click(),
            selection: selection.region(),
            user_id: None,
            channel: None,
        }
    }

    pub fn with_user_id(mut self, user_id: Option<String>) -> Self {
        self.user_id = user_id;
        self
    }

    pub fn with_channel(mut self, channel: Option<String>) -> Self {
        self.channel = channel;
        self
    }
}

/// Client-side mirror of a backend job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    #[serde(rename = "click_id")]
    pub job_id: String,
    #[serde(rename = "is_processed", default)]
    pub processed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_size: Option<[u32; 2]>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub click: Option<[u32; 2]>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selection: Option<[u32; 4]>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub masked_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub masked_size: Option<[u32; 2]>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bbox: Option<[u32; 4]>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel: Option<String>,
    /// Bumped by the backend on every accepted refinement.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<u32>,
    #[serde(default)]
    pub created_at: i64,
    #[serde(default)]
    pub updated_at: i64,
    /// Filled in by the poller from the result listing endpoint; absent on the
    /// wire.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub items: Option<Vec<Item>>,
}

impl Job {
    /// Minimal pending job, as returned right after submission.
    pub fn pending(job_id: impl Into<String>) -> Self {
        Self {
            job_id: job_id.into(),
            processed: false,
            image_url: None,
            image_size: None,
            click: None,
            selection: None,
            user_id: None,
            masked_url: None,
            masked_size: None,
            bbox: None,
            description: None,
            channel: None,
            version: Some(1),
            created_at: 0,
            updated_at: 0,
            items: None,
        }
    }

    pub fn status(&self) -> JobStatus {
        if self.processed {
            JobStatus::Processed
        } else {
            JobStatus::Pending
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    #[serde(rename = "item_id", default)]
    pub id: String,
    #[serde(rename = "click_id", default)]
    pub job_id: String,
    pub title: String,
    pub link: String,
    #[serde(rename = "source")]
    pub source_label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_icon: Option<String>,
    pub price_value: f64,
    pub price_currency: String,
    #[serde(rename = "thumbnail", default, skip_serializing_if = "Option::is_none")]
    pub thumbnail_ref: Option<String>,
    pub in_stock: bool,
    #[serde(default)]
    pub is_favorite: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<u32>,
    #[serde(default)]
    pub created_at: i64,
    #[serde(default)]
    pub updated_at: i64,
}

impl Item {
    /// Price as shown next to a result, e.g. `$19.99`.
    pub fn price_label(&self) -> String {
        format!("{}{:.2}", self.price_currency, self.price_value)
    }

    /// Store name without the domain suffix (`amazon.com` -> `amazon`).
    pub fn store_name(&self) -> &str {
        self.source_label
            .split('.')
            .next()
            .unwrap_or(self.source_label.as_str())
    }
}

/// Body of the refinement endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RefinementRequest {
    #[serde(rename = "click_id")]
    pub job_id: String,
    pub text: String,
}

/// Record the backend keeps for every accepted refinement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Refinement {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chat_id: Option<String>,
    #[serde(rename = "click_id")]
    pub job_id: String,
    pub text: String,
    pub pre_description: String,
    pub post_description: String,
    #[serde(default)]
    pub created_at: i64,
    #[serde(default)]
    pub updated_at: i64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn job_parses_backend_click() {
        let raw = json!({
            "click_id": "c1",
            "image_url": "https://cdn/x.png",
            "image_size": [2000, 1600],
            "click": [200, 200],
            "user_id": "u1",
            "segm": [1, 2, 3],
            "version": 2,
            "is_processed": true,
            "created_at": 1700000000,
            "updated_at": 1700000005
        });
        let job: Job = serde_json::from_value(raw).unwrap();
        assert_eq!(job.job_id, "c1");
        assert_eq!(job.status(), JobStatus::Processed);
        assert_eq!(job.image_size, Some([2000, 1600]));
        assert_eq!(job.version, Some(2));
        assert!(job.items.is_none());
    }

    #[test]
    fn missing_flag_means_pending() {
        let job: Job = serde_json::from_value(json!({ "click_id": "c2" })).unwrap();
        assert_eq!(job.status(), JobStatus::Pending);
    }

    #[test]
    fn point_request_omits_region_and_absent_fields() {
        let capture = CaptureContext::new(b"png".to_vec(), 2, 2, 1, 1);
        let request = JobRequest::new(&capture, &Selection::Point { x: 200, y: 125 })
            .with_channel(Some("shop.example".into()));
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(
            value,
            json!({
                "base64_image": "cG5n",
                "click": [200, 125],
                "channel": "shop.example"
            })
        );
    }

    #[test]
    fn region_request_sends_selection_array() {
        let capture = CaptureContext::new(Vec::new(), 2, 2, 1, 1);
        let request = JobRequest::new(
            &capture,
            &Selection::Region {
                x0: 50,
                y0: 50,
                x1: 60,
                y1: 80,
            },
        )
        .with_user_id(Some("u1".into()));
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["selection"], json!([50, 50, 60, 80]));
        assert_eq!(value["user_id"], json!("u1"));
        assert!(value.get("click").is_none());
    }

    #[test]
    fn item_display_helpers() {
        let item: Item = serde_json::from_value(json!({
            "item_id": "i1",
            "click_id": "c1",
            "title": "Lamp",
            "link": "https://amazon.com/lamp",
            "source": "amazon.com",
            "price_value": 19.5,
            "price_currency": "$",
            "in_stock": true
        }))
        .unwrap();
        assert_eq!(item.price_label(), "$19.50");
        assert_eq!(item.store_name(), "amazon");
        assert!(!item.is_favorite);
    }

    #[test]
    fn refinement_response_is_a_pair() {
        let raw = json!([
            { "click_id": "c1", "is_processed": false, "version": 3 },
            {
                "chat_id": "h1",
                "click_id": "c1",
                "text": "in red",
                "pre_description": "a lamp",
                "post_description": "a red lamp",
                "created_at": 1,
                "updated_at": 1
            }
        ]);
        let (job, chat): (Job, Refinement) = serde_json::from_value(raw).unwrap();
        assert_eq!(job.status(), JobStatus::Pending);
        assert_eq!(chat.post_description, "a red lamp");
    }
}
