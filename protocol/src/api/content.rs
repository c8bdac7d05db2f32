//! Content API DTOs
//!
//! Listing queries and the create-payload check shared by every content kind.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use validator::Validate;

use crate::common::{
    Certificate, ContentKind, Counter, Faq, GalleryItem, News, Partner, Project, Service,
    TeamMember, Testimonial,
};

/// Query string for collection listings
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct ListQuery {
    #[validate(range(min = 1))]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page: Option<u32>,
    #[validate(range(min = 1, max = 500))]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub search: Option<String>,
}

impl ListQuery {
    pub fn to_pairs(&self) -> Vec<(String, String)> {
        let mut pairs = Vec::new();
        if let Some(page) = self.page {
            pairs.push(("page".to_string(), page.to_string()));
        }
        if let Some(limit) = self.limit {
            pairs.push(("limit".to_string(), limit.to_string()));
        }
        if let Some(search) = self.search.as_deref().filter(|s| !s.trim().is_empty()) {
            pairs.push(("search".to_string(), search.trim().to_string()));
        }
        pairs
    }
}

/// One page of a collection listing
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub page: u32,
}

/// Check a create payload against the record shape of its kind.
///
/// Returns a human readable reason on failure.
pub fn validate_new_record(kind: ContentKind, payload: &Value) -> Result<(), String> {
    match kind {
        ContentKind::Certificates => check::<Certificate>(payload),
        ContentKind::Partners => check::<Partner>(payload),
        ContentKind::Faqs => check::<Faq>(payload),
        ContentKind::Counters => check::<Counter>(payload),
        ContentKind::Team => check::<TeamMember>(payload),
        ContentKind::Testimonials => check::<Testimonial>(payload),
        ContentKind::Services => check::<Service>(payload),
        ContentKind::Projects => check::<Project>(payload),
        ContentKind::News => check::<News>(payload),
        ContentKind::Gallery => check::<GalleryItem>(payload),
    }
}

fn check<T: DeserializeOwned + Validate>(payload: &Value) -> Result<(), String> {
    let record: T = serde_json::from_value(payload.clone()).map_err(|e| e.to_string())?;
    record.validate().map_err(|e| e.to_string())
}
