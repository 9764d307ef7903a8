//! Frame similarity gate
//!
//! Decides whether the person in front of the camera looks like one of a
//! fixed set of reference photos. This is average colour-distance sampling,
//! not face recognition: a coarse admission check before the avatar
//! session starts.

mod reference;
mod similarity;
mod source;
mod watcher;

use serde::Serialize;

pub use reference::{ReferenceImage, load_all as load_references};
pub use similarity::{
    GateDecision, MATCH_THRESHOLD, PIXEL_DIFF_THRESHOLD, SAMPLE_STRIDE_BYTES, decide, evaluate,
    fit_to_frame, similarity_score,
};
pub use source::{FrameSample, FrameSource, SnapshotFileSource, StaticFrameSource};
pub use watcher::{GATE_POLL_INTERVAL, GateOpened, GateWatcher};

/// Gate state as reported by the API
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "state", rename_all = "lowercase")]
pub enum GateStatus {
    /// Gate not in use, sessions start without a match
    Disabled,
    /// Watching frames
    Waiting,
    /// A frame matched
    Open { reference: usize, score: f64 },
}

impl GateStatus {
    /// Whether a session may start (a disabled gate is always open)
    #[must_use]
    pub const fn is_open(self) -> bool {
        !matches!(self, Self::Waiting)
    }
}

impl From<&GateOpened> for GateStatus {
    fn from(opened: &GateOpened) -> Self {
        Self::Open {
            reference: opened.reference,
            score: opened.score,
        }
    }
}
