//! Reference images the gate compares frames against

use std::path::{Path, PathBuf};

use image::RgbaImage;

use crate::{Error, Result};

/// A decoded reference image, immutable once loaded
#[derive(Debug, Clone)]
pub struct ReferenceImage {
    pub path: PathBuf,
    pub image: RgbaImage,
}

impl ReferenceImage {
    /// Decode a reference image from disk
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be read or decoded
    pub fn load(path: &Path) -> Result<Self> {
        let image = image::open(path)?.to_rgba8();
        Ok(Self {
            path: path.to_path_buf(),
            image,
        })
    }
}

/// Load every reference in order, skipping ones that fail to decode
///
/// # Errors
///
/// Returns error if none of the paths yields a usable image
pub fn load_all(paths: &[PathBuf]) -> Result<Vec<ReferenceImage>> {
    let mut loaded = Vec::with_capacity(paths.len());
    for path in paths {
        match ReferenceImage::load(path) {
            Ok(reference) => {
                tracing::debug!(
                    path = %path.display(),
                    width = reference.image.width(),
                    height = reference.image.height(),
                    "loaded reference image"
                );
                loaded.push(reference);
            }
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "skipping reference image");
            }
        }
    }

    if loaded.is_empty() {
        return Err(Error::Gate("no usable reference images".to_string()));
    }

    tracing::info!(count = loaded.len(), "reference images loaded");
    Ok(loaded)
}

#[cfg(test)]
mod tests {
    use image::Rgba;

    use super::*;

    #[test]
    fn unreadable_references_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let good = dir.path().join("good.png");
        RgbaImage::from_pixel(2, 2, Rgba([1, 2, 3, 255]))
            .save(&good)
            .unwrap();
        let missing = dir.path().join("missing.png");

        let loaded = load_all(&[missing, good.clone()]).unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].path, good);
    }

    #[test]
    fn no_usable_references_is_an_error() {
        let err = load_all(&[PathBuf::from("/nonexistent/ref.jpeg")]).unwrap_err();
        assert!(matches!(err, Error::Gate(_)));
    }
}
