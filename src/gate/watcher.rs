//! Polls a frame source until the gate opens

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use image::RgbaImage;
use tokio::sync::oneshot;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use super::ReferenceImage;
use super::similarity;
use super::source::FrameSource;

/// Fixed period between frame comparisons
pub const GATE_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Fired once when a frame first matches a reference
#[derive(Debug, Clone, PartialEq)]
pub struct GateOpened {
    /// Index of the matching reference
    pub reference: usize,
    pub score: f64,
    pub at: DateTime<Utc>,
}

/// Compares frames from a source against the references once per tick
pub struct GateWatcher<S: FrameSource> {
    source: S,
    references: Arc<Vec<RgbaImage>>,
    /// References stretched to the last seen frame size
    scaled: Option<ScaledReferences>,
    failing: bool,
}

#[derive(Clone)]
struct ScaledReferences {
    dimensions: (u32, u32),
    images: Arc<Vec<RgbaImage>>,
}

impl ScaledReferences {
    fn build(references: &[RgbaImage], dimensions: (u32, u32)) -> Self {
        let (width, height) = dimensions;
        let images = references
            .iter()
            .map(|reference| similarity::fit_to_frame(reference, width, height).into_owned())
            .collect();
        tracing::debug!(width, height, "references scaled to frame size");
        Self {
            dimensions,
            images: Arc::new(images),
        }
    }
}

impl<S: FrameSource + 'static> GateWatcher<S> {
    #[must_use]
    pub fn new(source: S, references: Vec<ReferenceImage>) -> Self {
        Self {
            source,
            references: Arc::new(references.into_iter().map(|r| r.image).collect()),
            scaled: None,
            failing: false,
        }
    }

    /// Run one comparison cycle
    ///
    /// Capture failures yield `None`; they are logged on the first failure
    /// of a streak only.
    pub async fn poll_once(&mut self) -> Option<GateOpened> {
        let frame = match self.source.capture().await {
            Ok(frame) => {
                if self.failing {
                    tracing::info!(source = self.source.name(), "camera frames available again");
                    self.failing = false;
                }
                frame
            }
            Err(e) => {
                if !self.failing {
                    tracing::warn!(source = self.source.name(), error = %e, "camera frame unavailable");
                    self.failing = true;
                }
                return None;
            }
        };

        let references = Arc::clone(&self.references);
        let cached = self.scaled.clone();
        let compared = tokio::task::spawn_blocking(move || {
            let dimensions = frame.image.dimensions();
            let scaled = match cached {
                Some(scaled) if scaled.dimensions == dimensions => scaled,
                _ => ScaledReferences::build(&references, dimensions),
            };
            let decision = similarity::decide(&frame.image, scaled.images.iter());
            (decision, scaled)
        })
        .await;

        match compared {
            Ok((decision, scaled)) => {
                self.scaled = Some(scaled);
                decision.matched.map(|reference| GateOpened {
                    reference,
                    score: decision.scores.last().copied().unwrap_or_default(),
                    at: Utc::now(),
                })
            }
            Err(e) => {
                tracing::error!(error = %e, "frame comparison worker failed");
                None
            }
        }
    }

    /// Poll until a frame matches or `cancel` fires
    ///
    /// The source is released on exit either way.
    pub async fn run(mut self, cancel: CancellationToken) -> Option<GateOpened> {
        let mut ticker = tokio::time::interval(GATE_POLL_INTERVAL);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        tracing::info!(
            source = self.source.name(),
            references = self.references.len(),
            "gate watcher started"
        );

        let opened = loop {
            tokio::select! {
                () = cancel.cancelled() => {
                    tracing::debug!("gate watcher cancelled");
                    break None;
                }
                _ = ticker.tick() => {
                    if let Some(opened) = self.poll_once().await {
                        tracing::info!(
                            reference = opened.reference,
                            score = opened.score,
                            "gate opened"
                        );
                        break Some(opened);
                    }
                }
            }
        };

        self.source.release();
        opened
    }

    /// Run on a background task, delivering the first match through a oneshot
    ///
    /// The receiver errors if the watcher is cancelled before a match.
    pub fn spawn(self, cancel: CancellationToken) -> oneshot::Receiver<GateOpened> {
        let (tx, rx) = oneshot::channel();
        tokio::spawn(async move {
            if let Some(opened) = self.run(cancel).await {
                let _ = tx.send(opened);
            }
        });
        rx
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use image::Rgba;

    use super::*;
    use crate::gate::StaticFrameSource;

    fn solid(width: u32, height: u32, rgb: [u8; 3]) -> RgbaImage {
        RgbaImage::from_pixel(width, height, Rgba([rgb[0], rgb[1], rgb[2], 255]))
    }

    fn reference(image: RgbaImage) -> ReferenceImage {
        ReferenceImage {
            path: PathBuf::from("reference.png"),
            image,
        }
    }

    #[tokio::test]
    async fn scaled_references_are_reused_across_polls() {
        let mut watcher = GateWatcher::new(
            StaticFrameSource::new(solid(32, 24, [0, 200, 0])),
            vec![reference(solid(64, 48, [200, 0, 0]))],
        );

        assert!(watcher.poll_once().await.is_none());
        let first = watcher.scaled.clone().expect("references scaled");
        assert_eq!(first.dimensions, (32, 24));
        assert_eq!(first.images[0].dimensions(), (32, 24));

        assert!(watcher.poll_once().await.is_none());
        let second = watcher.scaled.clone().expect("references scaled");
        assert!(Arc::ptr_eq(&first.images, &second.images));
    }

    #[tokio::test]
    async fn frame_size_change_rescales_references() {
        let mut watcher = GateWatcher::new(
            StaticFrameSource::new(solid(32, 24, [0, 0, 200])),
            vec![reference(solid(64, 48, [0, 0, 200]))],
        );
        assert!(watcher.poll_once().await.is_some());

        watcher.source = StaticFrameSource::new(solid(16, 12, [0, 0, 200]));
        assert!(watcher.poll_once().await.is_some());
        let scaled = watcher.scaled.clone().expect("references scaled");
        assert_eq!(scaled.dimensions, (16, 12));
    }
}
