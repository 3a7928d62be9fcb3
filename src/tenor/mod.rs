use chrono::{DateTime, Utc};
use serde::Serialize;
use strum_macros::{Display, EnumIter, EnumString};

pub use client::*;
pub use error::*;
pub use manager::*;

pub mod client;
mod error;
pub mod manager;

/// How strictly tenor filters adult content out of results.
/// Sent as the lowercase variant name
#[derive(Display, EnumString, EnumIter, Debug, Copy, Clone, PartialEq, Eq, Serialize)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ContentFilter {
    High,
    Medium,
    Low,
    Off,
}

impl Default for ContentFilter {
    fn default() -> Self {
        ContentFilter::Medium
    }
}

/// Lower resolution rendition of an [`Image`]
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ImagePreview {
    pub url: String,
    pub height: u32,
    pub width: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Image {
    pub id: String,
    /// page on tenor's site the gif lives on
    pub remote_url: String,
    pub short_remote_url: String,
    pub description: String,
    pub created_at: DateTime<Utc>,
    pub tags: Vec<String>,
    pub url: String,
    pub height: u32,
    pub width: u32,
    pub preview: ImagePreview,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Category {
    pub name: String,
    pub search_term: String,
    pub path: String,
    pub image: String,
}

/// A single page of images in the order tenor ranked them
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SearchResult {
    pub images: Vec<Image>,
    /// Cursor for the following page. Only the first page is ever fetched
    pub next: Option<String>,
}
