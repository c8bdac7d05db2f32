//! Content collections managed from the console
//!
//! Each kind maps to one REST collection on the backend. The record structs
//! describe what the backend requires on creation; media fields are optional
//! here because they travel as multipart file parts rather than JSON.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use validator::Validate;

// ============================================================================
// Content kinds
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ContentKind {
    Certificates,
    Partners,
    Faqs,
    Counters,
    Team,
    Testimonials,
    Services,
    Projects,
    News,
    Gallery,
}

impl ContentKind {
    pub const ALL: [ContentKind; 10] = [
        ContentKind::Certificates,
        ContentKind::Partners,
        ContentKind::Faqs,
        ContentKind::Counters,
        ContentKind::Team,
        ContentKind::Testimonials,
        ContentKind::Services,
        ContentKind::Projects,
        ContentKind::News,
        ContentKind::Gallery,
    ];

    /// Collection path relative to the API base
    pub fn path(&self) -> &'static str {
        match self {
            ContentKind::Certificates => "/certificates",
            ContentKind::Partners => "/partners",
            ContentKind::Faqs => "/faqs",
            ContentKind::Counters => "/counters",
            ContentKind::Team => "/team",
            ContentKind::Testimonials => "/testimonials",
            ContentKind::Services => "/services",
            ContentKind::Projects => "/projects",
            ContentKind::News => "/news",
            ContentKind::Gallery => "/gallery",
        }
    }

    /// Envelope member holding the collection when `data` is absent
    pub fn plural_key(&self) -> &'static str {
        match self {
            ContentKind::Certificates => "certificates",
            ContentKind::Partners => "partners",
            ContentKind::Faqs => "faqs",
            ContentKind::Counters => "counters",
            ContentKind::Team => "teamMembers",
            ContentKind::Testimonials => "testimonials",
            ContentKind::Services => "services",
            ContentKind::Projects => "projects",
            ContentKind::News => "news",
            ContentKind::Gallery => "gallery",
        }
    }

    /// Whether records of this kind carry uploaded media
    pub fn has_media(&self) -> bool {
        !matches!(self, ContentKind::Faqs | ContentKind::Counters)
    }

    pub fn as_str(&self) -> &'static str {
        self.path().trim_start_matches('/')
    }
}

impl fmt::Display for ContentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ContentKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lowered = s.trim().to_ascii_lowercase();
        let kind = match lowered.as_str() {
            "certificates" | "certificate" => ContentKind::Certificates,
            "partners" | "partner" => ContentKind::Partners,
            "faqs" | "faq" => ContentKind::Faqs,
            "counters" | "counter" => ContentKind::Counters,
            "team" | "team-members" | "members" => ContentKind::Team,
            "testimonials" | "testimonial" => ContentKind::Testimonials,
            "services" | "service" => ContentKind::Services,
            "projects" | "project" => ContentKind::Projects,
            "news" => ContentKind::News,
            "gallery" | "media" => ContentKind::Gallery,
            other => return Err(format!("unknown content kind '{}'", other)),
        };
        Ok(kind)
    }
}

// ============================================================================
// Records
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct Certificate {
    #[validate(length(min = 1, max = 255))]
    pub title: String,
    pub issuer: Option<String>,
    pub issued_at: Option<String>,
    pub image: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct Partner {
    #[validate(length(min = 1, max = 255))]
    pub name: String,
    #[validate(url)]
    pub website: Option<String>,
    pub logo: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct Faq {
    #[validate(length(min = 1))]
    pub question: String,
    #[validate(length(min = 1))]
    pub answer: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct Counter {
    #[validate(length(min = 1, max = 100))]
    pub label: String,
    #[validate(range(min = 0))]
    pub value: i64,
    pub suffix: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct TeamMember {
    #[validate(length(min = 1, max = 255))]
    pub name: String,
    #[validate(length(min = 1, max = 255))]
    pub position: String,
    pub bio: Option<String>,
    pub photo: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct Testimonial {
    #[validate(length(min = 1, max = 255))]
    pub author: String,
    pub company: Option<String>,
    #[validate(length(min = 1))]
    pub content: String,
    #[validate(range(min = 1, max = 5))]
    pub rating: Option<u8>,
    pub photo: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct Service {
    #[validate(length(min = 1, max = 255))]
    pub title: String,
    #[validate(length(min = 1))]
    pub description: String,
    pub icon: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    #[validate(length(min = 1, max = 255))]
    pub title: String,
    #[validate(length(min = 1))]
    pub description: String,
    pub client: Option<String>,
    pub category: Option<String>,
    #[serde(default)]
    pub images: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct News {
    #[validate(length(min = 1, max = 255))]
    pub title: String,
    #[validate(length(min = 1))]
    pub content: String,
    pub published_at: Option<String>,
    pub cover: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct GalleryItem {
    pub title: Option<String>,
    #[validate(custom(function = "validate_media_type"))]
    pub media_type: String,
    pub url: Option<String>,
}

fn validate_media_type(media_type: &str) -> Result<(), validator::ValidationError> {
    match media_type {
        "image" | "video" => Ok(()),
        _ => Err(validator::ValidationError::new("media_type")),
    }
}
