//! Error types for the media organizer

use std::path::PathBuf;
use thiserror::Error;

use crate::models::MediaId;

/// Failure to produce a preview image for a source file
#[derive(Debug, Error)]
pub enum ThumbnailError {
    /// The source could not be opened or read
    #[error("cannot read {path:?}: {source}")]
    Unreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// The source is not a decodable image
    #[error("cannot decode {path:?}: {message}")]
    Undecodable { path: PathBuf, message: String },
    /// No representative frame could be extracted from a video
    #[error("cannot extract a frame from {path:?}: {message}")]
    FrameExtraction { path: PathBuf, message: String },
    /// Resizing or JPEG encoding failed
    #[error("cannot encode preview of {path:?}: {message}")]
    Encode { path: PathBuf, message: String },
    /// The encoded preview could not be stored
    #[error("cannot write thumbnail {path:?}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Error kinds that can occur while importing a single file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImportErrorKind {
    /// The source file could not be read
    Unreadable,
    /// The content is neither a supported image nor a supported video
    UnsupportedKind,
    /// Copying into managed storage failed
    Copy,
    /// Preview generation failed
    Thumbnail,
    /// File metadata could not be extracted
    Metadata,
    /// The record could not be persisted
    Persistence,
}

impl ImportErrorKind {
    /// Get string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            ImportErrorKind::Unreadable => "unreadable",
            ImportErrorKind::UnsupportedKind => "unsupported",
            ImportErrorKind::Copy => "copy",
            ImportErrorKind::Thumbnail => "thumbnail",
            ImportErrorKind::Metadata => "metadata",
            ImportErrorKind::Persistence => "persistence",
        }
    }
}

/// A per-file import failure. Recorded in the batch outcome, never fatal to the batch.
#[derive(Debug, Clone, Error)]
#[error("{kind:?}: {message} (path: {path:?})")]
pub struct ImportError {
    /// The kind of error
    pub kind: ImportErrorKind,
    /// The source path that failed
    pub path: Option<PathBuf>,
    /// Human-readable error message
    pub message: String,
}

impl ImportError {
    /// Create a new import error
    pub fn new(kind: ImportErrorKind, path: Option<PathBuf>, message: impl Into<String>) -> Self {
        Self {
            kind,
            path,
            message: message.into(),
        }
    }

    /// Create an unreadable-source error
    pub fn unreadable(path: PathBuf, message: impl Into<String>) -> Self {
        Self::new(ImportErrorKind::Unreadable, Some(path), message)
    }

    /// Create an unsupported-content error
    pub fn unsupported(path: PathBuf) -> Self {
        Self::new(
            ImportErrorKind::UnsupportedKind,
            Some(path.clone()),
            format!("Not an image or video: {:?}", path),
        )
    }

    /// Create a copy error
    pub fn copy(path: PathBuf, err: &std::io::Error) -> Self {
        Self::new(ImportErrorKind::Copy, Some(path), err.to_string())
    }

    /// Create a thumbnail error
    pub fn thumbnail(path: PathBuf, err: &ThumbnailError) -> Self {
        Self::new(ImportErrorKind::Thumbnail, Some(path), err.to_string())
    }

    /// Create a persistence error
    pub fn persistence(path: PathBuf, err: &StoreError) -> Self {
        Self::new(ImportErrorKind::Persistence, Some(path), err.to_string())
    }
}

/// A systemic failure that aborts a whole import batch
#[derive(Debug, Error)]
pub enum ImportBatchError {
    /// Managed storage cannot be created or written
    #[error("media library at {path:?} is not accessible: {source}")]
    StorageUnavailable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Persistence collaborator failures
#[derive(Debug, Error)]
pub enum StoreError {
    /// SQLite reported an error
    #[error("database error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    /// No stored record has this id
    #[error("media {0} is not stored")]
    NotFound(MediaId),
    /// A stored column could not be converted back into a record field
    #[error("corrupt value {value:?} in column {column}")]
    Corrupt { column: &'static str, value: String },
}

/// Configuration loading failures
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config {path:?}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Errors surfaced by the library facade
#[derive(Debug, Error)]
pub enum LibraryError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Thumbnail(#[from] ThumbnailError),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("cannot start worker pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
    /// The coordination context has shut down
    #[error("catalog coordinator is no longer running")]
    CoordinatorClosed,
}

impl From<rusqlite::Error> for LibraryError {
    fn from(err: rusqlite::Error) -> Self {
        LibraryError::Store(StoreError::Sqlite(err))
    }
}
