//! Configuration for the media library

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::ConfigError;
use crate::models::SortOrder;

/// Default thumbnail width in pixels
pub const DEFAULT_THUMBNAIL_WIDTH: u32 = 460;

/// Default thumbnail height in pixels
pub const DEFAULT_THUMBNAIL_HEIGHT: u32 = 360;

/// Default thumbnail encoding quality (0.0 - 1.0)
pub const DEFAULT_THUMBNAIL_QUALITY: f32 = 0.7;

/// Subdirectory of the library holding imported media
pub const MEDIA_DIR_NAME: &str = "Media";

/// Subdirectory of the library holding generated previews
pub const THUMBNAIL_DIR_NAME: &str = "Thumbnails";

/// Database file name inside the library
pub const DB_FILE_NAME: &str = "library.db";

/// Configuration for the media library
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LibraryConfig {
    /// Root of managed storage
    pub library_dir: PathBuf,

    /// Database path; defaults to `library.db` inside the library
    pub db_path: Option<PathBuf>,

    /// Thumbnail target width
    pub thumbnail_width: u32,

    /// Thumbnail target height
    pub thumbnail_height: u32,

    /// JPEG quality factor for thumbnails, 0.0 - 1.0
    pub thumbnail_quality: f32,

    /// Number of background worker threads
    /// 0 means auto-detect (CPU cores)
    pub num_threads: usize,

    /// ffmpeg binary used to extract video frames
    pub ffmpeg_path: PathBuf,

    /// Sort order applied when the catalog is first loaded
    pub default_sort: SortOrder,
}

impl Default for LibraryConfig {
    fn default() -> Self {
        Self {
            library_dir: Self::default_library_dir(),
            db_path: None,
            thumbnail_width: DEFAULT_THUMBNAIL_WIDTH,
            thumbnail_height: DEFAULT_THUMBNAIL_HEIGHT,
            thumbnail_quality: DEFAULT_THUMBNAIL_QUALITY,
            num_threads: 0,
            ffmpeg_path: PathBuf::from("ffmpeg"),
            default_sort: SortOrder::default(),
        }
    }
}

impl LibraryConfig {
    /// Create a new config rooted at the given library directory
    pub fn new(library_dir: PathBuf) -> Self {
        Self {
            library_dir,
            ..Default::default()
        }
    }

    /// Create a config builder
    pub fn builder() -> LibraryConfigBuilder {
        LibraryConfigBuilder::new()
    }

    /// Load a config from a JSON file. Missing fields take their defaults.
    pub fn from_json_file(path: &Path) -> Result<Self, ConfigError> {
        let file = std::fs::File::open(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_reader(std::io::BufReader::new(file)).map_err(|source| {
            ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            }
        })
    }

    /// Platform data directory, e.g. ~/.local/share/media-organizer on Linux
    pub fn default_library_dir() -> PathBuf {
        dirs::data_dir()
            .or_else(dirs::home_dir)
            .unwrap_or_else(|| PathBuf::from("."))
            .join("media-organizer")
    }

    /// Directory for copied-in media
    pub fn media_dir(&self) -> PathBuf {
        self.library_dir.join(MEDIA_DIR_NAME)
    }

    /// Directory for generated thumbnails
    pub fn thumbnail_dir(&self) -> PathBuf {
        self.library_dir.join(THUMBNAIL_DIR_NAME)
    }

    /// Get the effective database path
    pub fn effective_db_path(&self) -> PathBuf {
        self.db_path
            .clone()
            .unwrap_or_else(|| self.library_dir.join(DB_FILE_NAME))
    }

    /// Get the effective number of threads
    pub fn effective_threads(&self) -> usize {
        if self.num_threads == 0 {
            std::thread::available_parallelism()
                .map(|p| p.get())
                .unwrap_or(4)
        } else {
            self.num_threads
        }
    }

    /// Quality factor mapped to the 1 - 100 scale of the JPEG encoder
    pub fn jpeg_quality(&self) -> u8 {
        let quality = if self.thumbnail_quality.is_finite() {
            self.thumbnail_quality
        } else {
            DEFAULT_THUMBNAIL_QUALITY
        };
        (quality.clamp(0.0, 1.0) * 100.0).round().max(1.0) as u8
    }
}

/// Builder for LibraryConfig
#[derive(Debug, Default)]
pub struct LibraryConfigBuilder {
    config: LibraryConfig,
}

impl LibraryConfigBuilder {
    /// Create a new builder
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the library directory
    pub fn library_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.library_dir = dir.into();
        self
    }

    /// Set the database path
    pub fn db_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.db_path = Some(path.into());
        self
    }

    /// Set the thumbnail target size
    pub fn thumbnail_size(mut self, width: u32, height: u32) -> Self {
        self.config.thumbnail_width = width;
        self.config.thumbnail_height = height;
        self
    }

    /// Set the thumbnail quality factor
    pub fn thumbnail_quality(mut self, quality: f32) -> Self {
        self.config.thumbnail_quality = quality;
        self
    }

    /// Set the number of threads
    pub fn num_threads(mut self, threads: usize) -> Self {
        self.config.num_threads = threads;
        self
    }

    /// Set the ffmpeg binary
    pub fn ffmpeg_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.ffmpeg_path = path.into();
        self
    }

    /// Set the initial sort order
    pub fn default_sort(mut self, order: SortOrder) -> Self {
        self.config.default_sort = order;
        self
    }

    /// Build the config
    pub fn build(self) -> LibraryConfig {
        self.config
    }
}
