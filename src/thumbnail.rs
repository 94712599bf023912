//! Thumbnail pipeline: fixed-size JPEG previews for images and videos
//!
//! Two strategies share one contract. Stills are decoded and resized
//! directly; videos first have a representative frame extracted with ffmpeg.
//! Work runs on the shared worker pool and every request is independent.

use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, ImageReader};
use log::debug;
use rayon::ThreadPool;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::sync::Arc;

use crate::config::LibraryConfig;
use crate::error::ThumbnailError;
use crate::models::{MediaKind, Thumbnail};

/// Target geometry and encoding quality of a preview
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThumbnailSpec {
    pub width: u32,
    pub height: u32,
    /// JPEG quality, 1 - 100
    pub quality: u8,
}

impl ThumbnailSpec {
    pub fn from_config(config: &LibraryConfig) -> Self {
        Self {
            width: config.thumbnail_width.max(1),
            height: config.thumbnail_height.max(1),
            quality: config.jpeg_quality(),
        }
    }
}

/// An encoded preview that has not been written anywhere yet
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreviewImage {
    pub width: u32,
    pub height: u32,
    /// JPEG bytes
    pub data: Vec<u8>,
}

impl PreviewImage {
    /// Store the preview and describe it as a record thumbnail
    pub fn write_to(&self, path: &Path) -> Result<Thumbnail, ThumbnailError> {
        std::fs::write(path, &self.data).map_err(|source| ThumbnailError::Write {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Thumbnail {
            file_path: path.to_path_buf(),
            width: self.width,
            height: self.height,
        })
    }
}

/// Produces a preview for one source file on the calling thread
pub trait Thumbnailer: Send + Sync {
    fn render(&self, source: &Path, spec: &ThumbnailSpec) -> Result<PreviewImage, ThumbnailError>;
}

/// Still images: decode, scale to fill the target, center-crop, encode
#[derive(Debug, Default, Clone, Copy)]
pub struct ImageThumbnailer;

impl ImageThumbnailer {
    fn decode(source: &Path) -> Result<DynamicImage, ThumbnailError> {
        let reader = ImageReader::open(source)
            .and_then(|reader| reader.with_guessed_format())
            .map_err(|err| ThumbnailError::Unreadable {
                path: source.to_path_buf(),
                source: err,
            })?;
        reader.decode().map_err(|err| ThumbnailError::Undecodable {
            path: source.to_path_buf(),
            message: err.to_string(),
        })
    }

    fn encode(
        source: &Path,
        image: &DynamicImage,
        spec: &ThumbnailSpec,
    ) -> Result<PreviewImage, ThumbnailError> {
        let resized = image.resize_to_fill(spec.width, spec.height, FilterType::Lanczos3);
        let rgb = DynamicImage::ImageRgb8(resized.to_rgb8());

        let mut data = Vec::new();
        rgb.write_with_encoder(JpegEncoder::new_with_quality(&mut data, spec.quality))
            .map_err(|err| ThumbnailError::Encode {
                path: source.to_path_buf(),
                message: err.to_string(),
            })?;

        Ok(PreviewImage {
            width: rgb.width(),
            height: rgb.height(),
            data,
        })
    }
}

impl Thumbnailer for ImageThumbnailer {
    fn render(&self, source: &Path, spec: &ThumbnailSpec) -> Result<PreviewImage, ThumbnailError> {
        let image = Self::decode(source)?;
        Self::encode(source, &image, spec)
    }
}

/// Videos: grab the first frame with ffmpeg, then treat it as a still
#[derive(Debug, Clone)]
pub struct VideoThumbnailer {
    ffmpeg: PathBuf,
}

impl VideoThumbnailer {
    pub fn new(ffmpeg: impl Into<PathBuf>) -> Self {
        Self {
            ffmpeg: ffmpeg.into(),
        }
    }

    fn extract_frame(&self, source: &Path, output: &Path) -> Result<(), ThumbnailError> {
        let frame_error = |message: String| ThumbnailError::FrameExtraction {
            path: source.to_path_buf(),
            message,
        };

        let status = Command::new(&self.ffmpeg)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .arg("-nostdin")
            .arg("-y")
            .arg("-i")
            .arg(source)
            .args(["-ss", "00:00:00.00", "-frames:v", "1"])
            .arg(output)
            .status()
            .map_err(|err| frame_error(format!("failed to call {:?}: {}", self.ffmpeg, err)))?;

        match status.code() {
            Some(0) if output.exists() => Ok(()),
            Some(0) => Err(frame_error("ffmpeg produced no frame".to_string())),
            Some(code) => Err(frame_error(format!("ffmpeg exited with code {}", code))),
            None => Err(frame_error("ffmpeg exited by signal".to_string())),
        }
    }
}

impl Thumbnailer for VideoThumbnailer {
    fn render(&self, source: &Path, spec: &ThumbnailSpec) -> Result<PreviewImage, ThumbnailError> {
        if !source.is_file() {
            return Err(ThumbnailError::Unreadable {
                path: source.to_path_buf(),
                source: std::io::Error::new(std::io::ErrorKind::NotFound, "no such file"),
            });
        }

        let scratch = tempfile::Builder::new()
            .prefix("media-frame-")
            .tempdir()
            .map_err(|err| ThumbnailError::FrameExtraction {
                path: source.to_path_buf(),
                message: err.to_string(),
            })?;
        let frame = scratch.path().join("frame.png");
        self.extract_frame(source, &frame)?;

        // Decode errors refer to the video, not the scratch frame.
        let image = ImageThumbnailer::decode(&frame).map_err(|err| {
            ThumbnailError::FrameExtraction {
                path: source.to_path_buf(),
                message: err.to_string(),
            }
        })?;
        ImageThumbnailer::encode(source, &image, spec)
    }
}

/// Schedules preview generation on the worker pool
#[derive(Clone)]
pub struct ThumbnailPipeline {
    spec: ThumbnailSpec,
    images: Arc<dyn Thumbnailer>,
    videos: Arc<dyn Thumbnailer>,
    pool: Arc<ThreadPool>,
}

impl ThumbnailPipeline {
    pub fn new(config: &LibraryConfig, pool: Arc<ThreadPool>) -> Self {
        Self::with_strategies(
            ThumbnailSpec::from_config(config),
            Arc::new(ImageThumbnailer),
            Arc::new(VideoThumbnailer::new(&config.ffmpeg_path)),
            pool,
        )
    }

    pub fn with_strategies(
        spec: ThumbnailSpec,
        images: Arc<dyn Thumbnailer>,
        videos: Arc<dyn Thumbnailer>,
        pool: Arc<ThreadPool>,
    ) -> Self {
        Self {
            spec,
            images,
            videos,
            pool,
        }
    }

    pub fn spec(&self) -> &ThumbnailSpec {
        &self.spec
    }

    fn strategy(&self, kind: MediaKind) -> &dyn Thumbnailer {
        match kind {
            MediaKind::Image => self.images.as_ref(),
            MediaKind::Video => self.videos.as_ref(),
        }
    }

    /// Generate a preview on the calling thread
    pub fn render(&self, source: &Path, kind: MediaKind) -> Result<PreviewImage, ThumbnailError> {
        debug!("Rendering {} thumbnail for {:?}", kind, source);
        self.strategy(kind).render(source, &self.spec)
    }

    /// Generate a preview on the worker pool. `callback` runs exactly once, on
    /// a worker thread, with the result.
    pub fn request<F>(&self, source: PathBuf, kind: MediaKind, callback: F)
    where
        F: FnOnce(Result<PreviewImage, ThumbnailError>) + Send + 'static,
    {
        let pipeline = self.clone();
        self.pool.spawn(move || {
            let result = pipeline.render(&source, kind);
            callback(result);
        });
    }
}

impl std::fmt::Debug for ThumbnailPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ThumbnailPipeline")
            .field("spec", &self.spec)
            .finish_non_exhaustive()
    }
}
