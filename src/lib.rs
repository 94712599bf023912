//! Media library core: observable catalog, parallel import pipeline and
//! thumbnail generation
//!
//! Imports and previews run on a rayon worker pool; the catalog lives on a
//! single coordination thread that serializes every mutation and observer
//! notification.

pub mod catalog;
pub mod config;
pub mod coordinator;
pub mod db;
pub mod error;
pub mod import;
pub mod inspect;
pub mod library;
pub mod models;
pub mod progress;
pub mod provenance;
pub mod thumbnail;

pub use catalog::{Catalog, CatalogObserver, Observers};
pub use config::{LibraryConfig, LibraryConfigBuilder};
pub use coordinator::{Coordinator, CoordinatorHandle};
pub use db::{MediaDatabase, MediaRepository};
pub use error::{
    ConfigError, ImportBatchError, ImportError, ImportErrorKind, LibraryError, StoreError,
    ThumbnailError,
};
pub use import::{CancellationToken, ImportHandle, Importer};
pub use library::MediaLibrary;
pub use models::{
    ImportOutcome, ImportProgress, MediaId, MediaKind, MediaRecord, SortOrder, Thumbnail,
};
pub use progress::{DoneMessage, ErrorProgressMessage, ProgressMessage, ProgressReporter, StartMessage};
pub use thumbnail::{PreviewImage, ThumbnailPipeline, ThumbnailSpec, Thumbnailer};
