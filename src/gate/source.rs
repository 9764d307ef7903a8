//! Camera frame sources
//!
//! The gateway does not talk to camera hardware itself. A capture process
//! (or the browser bridge) keeps overwriting a snapshot file with the
//! latest frame, and [`SnapshotFileSource`] decodes it on demand.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use image::RgbaImage;

use crate::{Error, Result};

/// A single decoded frame
#[derive(Debug, Clone)]
pub struct FrameSample {
    pub image: RgbaImage,
    pub captured_at: DateTime<Utc>,
}

impl FrameSample {
    #[must_use]
    pub fn now(image: RgbaImage) -> Self {
        Self {
            image,
            captured_at: Utc::now(),
        }
    }
}

/// Something that can produce camera frames
#[async_trait]
pub trait FrameSource: Send {
    /// Capture the current frame
    ///
    /// # Errors
    ///
    /// Returns error if no frame is available
    async fn capture(&mut self) -> Result<FrameSample>;

    /// Stop all tracks and release the device
    fn release(&mut self);

    /// Source name for logging
    fn name(&self) -> &'static str;
}

/// Reads the newest frame from a snapshot file
#[derive(Debug)]
pub struct SnapshotFileSource {
    path: PathBuf,
    released: bool,
}

impl SnapshotFileSource {
    /// Acquire the snapshot file
    ///
    /// # Errors
    ///
    /// Returns error if the file does not exist yet
    pub fn acquire(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        if !path.is_file() {
            return Err(Error::Camera(format!(
                "no camera frame at {}",
                path.display()
            )));
        }
        tracing::info!(path = %path.display(), "camera snapshot source acquired");
        Ok(Self {
            path,
            released: false,
        })
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl FrameSource for SnapshotFileSource {
    async fn capture(&mut self) -> Result<FrameSample> {
        if self.released {
            return Err(Error::Camera("source released".to_string()));
        }

        let bytes = tokio::fs::read(&self.path)
            .await
            .map_err(|e| Error::Camera(format!("{}: {e}", self.path.display())))?;

        let image = tokio::task::spawn_blocking(move || {
            image::load_from_memory(&bytes).map(|img| img.to_rgba8())
        })
        .await
        .map_err(|e| Error::Camera(format!("frame decode worker failed: {e}")))??;

        Ok(FrameSample::now(image))
    }

    fn release(&mut self) {
        if !self.released {
            self.released = true;
            tracing::debug!(path = %self.path.display(), "camera snapshot source released");
        }
    }

    fn name(&self) -> &'static str {
        "snapshot-file"
    }
}

/// Always yields the same frame
#[derive(Debug, Clone)]
pub struct StaticFrameSource {
    image: RgbaImage,
    released: bool,
}

impl StaticFrameSource {
    #[must_use]
    pub const fn new(image: RgbaImage) -> Self {
        Self {
            image,
            released: false,
        }
    }

    /// Decode a frame from disk
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be read or decoded
    pub fn open(path: &Path) -> Result<Self> {
        Ok(Self::new(image::open(path)?.to_rgba8()))
    }

    #[must_use]
    pub const fn is_released(&self) -> bool {
        self.released
    }
}

#[async_trait]
impl FrameSource for StaticFrameSource {
    async fn capture(&mut self) -> Result<FrameSample> {
        if self.released {
            return Err(Error::Camera("source released".to_string()));
        }
        Ok(FrameSample::now(self.image.clone()))
    }

    fn release(&mut self) {
        self.released = true;
    }

    fn name(&self) -> &'static str {
        "static"
    }
}

#[cfg(test)]
mod tests {
    use image::Rgba;

    use super::*;

    #[test]
    fn acquire_fails_without_frame_file() {
        let err = SnapshotFileSource::acquire("/nonexistent/latest.jpeg").unwrap_err();
        assert!(matches!(err, Error::Camera(_)));
    }

    #[tokio::test]
    async fn snapshot_source_decodes_latest_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("latest.png");
        RgbaImage::from_pixel(3, 2, Rgba([9, 8, 7, 255]))
            .save(&path)
            .unwrap();

        let mut source = SnapshotFileSource::acquire(&path).unwrap();
        let frame = source.capture().await.unwrap();
        assert_eq!(frame.image.dimensions(), (3, 2));

        source.release();
        assert!(source.capture().await.is_err());
    }

    #[tokio::test]
    async fn snapshot_source_reports_corrupt_frames() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("latest.png");
        std::fs::write(&path, b"not an image").unwrap();

        let mut source = SnapshotFileSource::acquire(&path).unwrap();
        assert!(source.capture().await.is_err());
    }
}
