//! Core data models for the media organizer

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use uuid::Uuid;

use crate::error::ImportError;

/// Stable identity of a media record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MediaId(Uuid);

impl MediaId {
    /// Generate a fresh identity
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for MediaId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for MediaId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for MediaId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

/// Media kind classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    /// Still images (jpg, png, webp, etc.)
    Image,
    /// Video files (mp4, mov, mkv, etc.)
    Video,
}

impl MediaKind {
    /// Get the string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaKind::Image => "image",
            MediaKind::Video => "video",
        }
    }

    /// Parse the stored string representation
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "image" => Some(MediaKind::Image),
            "video" => Some(MediaKind::Video),
            _ => None,
        }
    }
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Generated preview asset owned by a record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Thumbnail {
    /// Path to the preview JPEG
    pub file_path: PathBuf,
    pub width: u32,
    pub height: u32,
}

/// A single media item with its owned thumbnail
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaRecord {
    pub id: MediaId,
    /// Display name
    pub name: String,
    pub kind: MediaKind,
    /// Managed copy inside the library
    pub file_path: PathBuf,
    /// Last known external location (may be stale)
    pub original_file_path: PathBuf,
    /// File size in bytes
    pub file_size: u64,
    pub mime_type: String,
    pub thumbnail: Thumbnail,
    pub creation_date: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub modification_date: Option<DateTime<Utc>>,
    /// Provenance URL, if the source filesystem recorded one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub where_from: Option<String>,
    pub is_favorite: bool,
}

impl MediaRecord {
    /// Set the favorite flag
    pub fn with_favorite(mut self, is_favorite: bool) -> Self {
        self.is_favorite = is_favorite;
        self
    }

    /// Set the display name
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }
}

/// Catalog ordering criteria
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    /// Newest creation date first
    #[default]
    CreatedAt,
    /// Name, descending
    Name,
    /// Favorites before the rest
    Favorites,
}

impl SortOrder {
    pub const ALL: [SortOrder; 3] = [SortOrder::CreatedAt, SortOrder::Name, SortOrder::Favorites];

    /// Menu title
    pub fn title(&self) -> &'static str {
        match self {
            SortOrder::CreatedAt => "Date",
            SortOrder::Name => "Name",
            SortOrder::Favorites => "Favorites",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SortOrder::CreatedAt => "date",
            SortOrder::Name => "name",
            SortOrder::Favorites => "favorites",
        }
    }

    /// Ordering of two records under this criterion. `Less` means `a` comes first.
    pub fn compare(&self, a: &MediaRecord, b: &MediaRecord) -> std::cmp::Ordering {
        match self {
            SortOrder::CreatedAt => b.creation_date.cmp(&a.creation_date),
            SortOrder::Name => b.name.cmp(&a.name),
            // Favorites only; ties keep their relative order.
            SortOrder::Favorites => b.is_favorite.cmp(&a.is_favorite),
        }
    }
}

impl fmt::Display for SortOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for SortOrder {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "date" | "created" | "createdat" | "created_at" => Ok(SortOrder::CreatedAt),
            "name" => Ok(SortOrder::Name),
            "favorites" | "favourites" | "favorite" => Ok(SortOrder::Favorites),
            other => Err(format!("unknown sort order '{}'", other)),
        }
    }
}

/// Progress of an import batch, delivered after each finished file
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImportProgress {
    /// Files finished so far (successful or not)
    pub completed: usize,
    /// Fixed batch size
    pub total: usize,
    /// Source path of the file that just finished
    pub path: PathBuf,
    /// Whether that file was imported
    pub succeeded: bool,
}

impl ImportProgress {
    /// Completed fraction in `0.0..=1.0`
    pub fn fraction(&self) -> f64 {
        if self.total == 0 {
            return 1.0;
        }
        self.completed as f64 / self.total as f64
    }
}

/// Result of an import batch that was not aborted
#[derive(Debug, Clone, Default)]
pub struct ImportOutcome {
    /// Successfully imported records, in input order
    pub records: Vec<MediaRecord>,
    /// Per-file failures
    pub failures: Vec<ImportError>,
    /// Number of paths in the batch
    pub total: usize,
    /// Whether the batch was cancelled before every file was processed
    pub cancelled: bool,
    /// Batch duration in milliseconds
    pub duration_ms: u64,
}

impl ImportOutcome {
    /// Create a new empty outcome
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the number of failures
    pub fn error_count(&self) -> usize {
        self.failures.len()
    }

    /// Check if every file was imported
    pub fn is_success(&self) -> bool {
        self.failures.is_empty() && !self.cancelled
    }

    /// A single message describing what failed, suitable for direct display
    pub fn error_summary(&self) -> Option<String> {
        if self.failures.is_empty() {
            return None;
        }

        let mut summary = if self.failures.len() == 1 {
            format!("1 of {} files could not be imported:", self.total)
        } else {
            format!(
                "{} of {} files could not be imported:",
                self.failures.len(),
                self.total
            )
        };
        for failure in &self.failures {
            let name = failure
                .path
                .as_ref()
                .and_then(|p| p.file_name())
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_else(|| "<unknown>".to_string());
            summary.push_str(&format!("\n- {}: {}", name, failure.message));
        }
        Some(summary)
    }
}
