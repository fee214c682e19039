//! Core domain types for dailydigest.
//!
//! Field names on [`Story`] follow the wire format of the daily API
//! (camelCase), so a digest payload deserializes directly.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::{DigestError, Result};

/// Maximum number of digests held in the cache before eviction kicks in.
pub const MAX_CACHE_SIZE: usize = 5;

// ---------------------------------------------------------------------------
// Story
// ---------------------------------------------------------------------------

/// A single news story within a daily digest.
///
/// `image_blob` and `body` start empty and are filled in-place, at most once
/// each, by the enrichment pipeline. They are never cleared afterward.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Story {
    /// Story identifier, unique within one digest.
    pub id: i64,
    /// Display title.
    pub title: String,
    /// URL of the full article body.
    pub url: String,
    /// Candidate lead-image URLs, in preference order.
    #[serde(default)]
    pub images: Vec<String>,
    /// Base64-encoded lead image bytes, once fetched.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_blob: Option<String>,
    /// Full article body text, once fetched.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
}

impl Story {
    /// Whether the lead image has already been fetched (non-blank blob).
    pub fn has_image(&self) -> bool {
        self.image_blob
            .as_deref()
            .is_some_and(|b| !b.trim().is_empty())
    }

    /// Whether the body text has already been fetched (non-blank).
    pub fn has_body(&self) -> bool {
        self.body.as_deref().is_some_and(|b| !b.trim().is_empty())
    }

    /// First non-blank image candidate URL, if any.
    pub fn first_image_candidate(&self) -> Option<&str> {
        self.images
            .first()
            .map(String::as_str)
            .filter(|u| !u.trim().is_empty())
    }
}

// ---------------------------------------------------------------------------
// Stories (digest)
// ---------------------------------------------------------------------------

/// The full set of stories for one date, in display order.
///
/// The set of story identities is immutable after creation; the individual
/// stories are mutated in place by enrichment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Stories {
    /// Date key in `YYYYMMDD` form.
    pub date: String,
    /// Stories in display order.
    pub stories: Vec<Story>,
}

impl Stories {
    /// Look up a story by id.
    pub fn story(&self, id: i64) -> Option<&Story> {
        self.stories.iter().find(|s| s.id == id)
    }
}

// ---------------------------------------------------------------------------
// CacheSnapshot
// ---------------------------------------------------------------------------

/// A consistent point-in-time copy of cache state.
///
/// This is both the value handed to observers of `snapshot()` and the on-disk
/// persistence format. `lru` is ordered oldest-first; its elements are exactly
/// the keys of `by_date`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CacheSnapshot {
    /// Latest date the user has seen, as an 8-digit integer. 0 = unset.
    #[serde(default)]
    pub latest_date: u32,
    /// Date currently being viewed, as an 8-digit integer. 0 = unset.
    #[serde(default)]
    pub current_date: u32,
    /// Date keys in insertion order, oldest first.
    #[serde(default)]
    pub lru: Vec<String>,
    /// Cached digests by date key.
    #[serde(default)]
    pub by_date: BTreeMap<String, Stories>,
}

// ---------------------------------------------------------------------------
// Date keys
// ---------------------------------------------------------------------------

/// Validate a `YYYYMMDD` date key and return it as an integer.
///
/// Rejects non-numeric input, wrong lengths, and impossible calendar dates
/// before any network fetch happens.
pub fn parse_date_key(date: &str) -> Result<u32> {
    if date.len() != 8 || !date.bytes().all(|b| b.is_ascii_digit()) {
        return Err(DigestError::validation(format!(
            "date should be \"YYYYMMDD\" but got {date:?}"
        )));
    }

    NaiveDate::parse_from_str(date, "%Y%m%d").map_err(|_| {
        DigestError::validation(format!("{date:?} is not a real calendar date"))
    })?;

    date.parse::<u32>().map_err(|_| {
        DigestError::validation(format!("date {date:?} out of range"))
    })
}

/// Resolve the "latest date seen" supplied to a sync operation.
///
/// A blank, malformed, or non-date value falls back to `current`, as does
/// any value not strictly greater than `current` — syncing can only move
/// the latest date forward.
pub fn resolve_latest(latest: Option<&str>, current: u32) -> u32 {
    latest
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .and_then(|s| parse_date_key(s).ok())
        .filter(|&v| v > current)
        .unwrap_or(current)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn story(id: i64) -> Story {
        Story {
            id,
            title: format!("story {id}"),
            url: format!("https://daily.example.com/story/{id}"),
            images: vec![format!("https://img.example.com/{id}.jpg")],
            image_blob: None,
            body: None,
        }
    }

    #[test]
    fn digest_wire_format() {
        let json = r#"{
            "date": "20240101",
            "stories": [
                {
                    "id": 7,
                    "title": "Hello",
                    "url": "https://daily.example.com/story/7",
                    "images": ["https://img.example.com/7.jpg"],
                    "imageBlob": null,
                    "body": null
                }
            ]
        }"#;

        let digest: Stories = serde_json::from_str(json).expect("decode digest");
        assert_eq!(digest.date, "20240101");
        assert_eq!(digest.stories.len(), 1);
        assert_eq!(digest.stories[0].id, 7);
        assert!(!digest.stories[0].has_image());
    }

    #[test]
    fn image_blob_uses_camel_case_on_the_wire() {
        let mut s = story(1);
        s.image_blob = Some("QUJD".into());
        let json = serde_json::to_string(&s).expect("serialize");
        assert!(json.contains("imageBlob"));
        assert!(!json.contains("image_blob"));
    }

    #[test]
    fn blank_fields_count_as_empty() {
        let mut s = story(1);
        assert!(!s.has_image());
        assert!(!s.has_body());

        s.image_blob = Some("   ".into());
        s.body = Some(String::new());
        assert!(!s.has_image());
        assert!(!s.has_body());

        s.image_blob = Some("QUJD".into());
        s.body = Some("text".into());
        assert!(s.has_image());
        assert!(s.has_body());
    }

    #[test]
    fn first_image_candidate_skips_blank() {
        let mut s = story(1);
        assert_eq!(
            s.first_image_candidate(),
            Some("https://img.example.com/1.jpg")
        );

        s.images = vec!["  ".into()];
        assert_eq!(s.first_image_candidate(), None);

        s.images.clear();
        assert_eq!(s.first_image_candidate(), None);
    }

    #[test]
    fn date_key_validation() {
        assert_eq!(parse_date_key("20240101").expect("valid"), 20240101);
        assert_eq!(parse_date_key("20240229").expect("leap day"), 20240229);

        assert!(parse_date_key("2024010").is_err());
        assert!(parse_date_key("2024-01-01").is_err());
        assert!(parse_date_key("20240132").is_err());
        assert!(parse_date_key("abcdefgh").is_err());
        assert!(parse_date_key("").is_err());
    }

    #[test]
    fn resolve_latest_accepts_only_later_valid_dates() {
        assert_eq!(resolve_latest(Some("20240102"), 20240101), 20240102);
        // Not strictly greater than current.
        assert_eq!(resolve_latest(Some("20240101"), 20240101), 20240101);
        assert_eq!(resolve_latest(Some("20231231"), 20240101), 20240101);
    }

    #[test]
    fn resolve_latest_falls_back_on_blank_or_malformed_input() {
        assert_eq!(resolve_latest(None, 20240101), 20240101);
        assert_eq!(resolve_latest(Some(""), 20240101), 20240101);
        assert_eq!(resolve_latest(Some("   "), 20240101), 20240101);
        assert_eq!(resolve_latest(Some("next week"), 20240101), 20240101);
        assert_eq!(resolve_latest(Some("20240230"), 20240101), 20240101);
        // With no current date set, bad input resolves to unset.
        assert_eq!(resolve_latest(Some("abc"), 0), 0);
    }

    #[test]
    fn snapshot_tolerates_missing_fields() {
        let snap: CacheSnapshot = serde_json::from_str("{}").expect("empty object");
        assert_eq!(snap.latest_date, 0);
        assert_eq!(snap.current_date, 0);
        assert!(snap.lru.is_empty());
        assert!(snap.by_date.is_empty());
    }
}
