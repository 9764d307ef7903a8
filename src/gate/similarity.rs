//! Naive colour-distance similarity between a frame and a reference
//!
//! Every 4th pixel is sampled. A sampled pixel matches when the summed
//! absolute RGB difference is below [`PIXEL_DIFF_THRESHOLD`]; alpha is
//! ignored. The score is the matching count over the number of sampled
//! positions, so identical images score 1.0.

use std::borrow::Cow;

use image::RgbaImage;
use image::imageops::{self, FilterType};

/// Byte distance between sampled pixels (4 pixels × 4 channels)
pub const SAMPLE_STRIDE_BYTES: usize = 16;

/// Summed |ΔR|+|ΔG|+|ΔB| below which a sampled pixel counts as matching
pub const PIXEL_DIFF_THRESHOLD: u32 = 200;

/// Score a reference must exceed for the gate to open
pub const MATCH_THRESHOLD: f64 = 0.3;

/// Outcome of comparing one frame against an ordered reference list
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GateDecision {
    /// Index of the first reference whose score exceeded the threshold
    pub matched: Option<usize>,
    /// Scores of the references actually compared, in order
    pub scores: Vec<f64>,
}

impl GateDecision {
    #[must_use]
    pub const fn is_match(&self) -> bool {
        self.matched.is_some()
    }
}

/// Similarity of `frame` to `reference`
///
/// The reference is stretched to the frame's dimensions first. An empty
/// frame scores 0.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn similarity_score(frame: &RgbaImage, reference: &RgbaImage) -> f64 {
    let (width, height) = frame.dimensions();
    if width == 0 || height == 0 {
        return 0.0;
    }

    let reference = fit_to_frame(reference, width, height);

    let current = frame.as_raw();
    let other = reference.as_raw();

    let matching = current
        .chunks(SAMPLE_STRIDE_BYTES)
        .zip(other.chunks(SAMPLE_STRIDE_BYTES))
        .filter(|(a, b)| a.len() >= 3 && b.len() >= 3 && rgb_distance(a, b) < PIXEL_DIFF_THRESHOLD)
        .count();

    let total_pixels = (current.len() / 4) as f64;
    matching as f64 / (total_pixels / 4.0)
}

/// `reference` stretched to `width` x `height`, borrowed when it already fits
#[must_use]
pub fn fit_to_frame(reference: &RgbaImage, width: u32, height: u32) -> Cow<'_, RgbaImage> {
    if reference.dimensions() == (width, height) {
        Cow::Borrowed(reference)
    } else {
        Cow::Owned(imageops::resize(reference, width, height, FilterType::Triangle))
    }
}

fn rgb_distance(a: &[u8], b: &[u8]) -> u32 {
    a[..3]
        .iter()
        .zip(&b[..3])
        .map(|(x, y)| u32::from(x.abs_diff(*y)))
        .sum()
}

/// Compare `frame` against `references` in order, stopping at the first match
#[must_use]
pub fn decide<'a, I>(frame: &RgbaImage, references: I) -> GateDecision
where
    I: IntoIterator<Item = &'a RgbaImage>,
{
    let mut decision = GateDecision::default();
    for (index, reference) in references.into_iter().enumerate() {
        let score = similarity_score(frame, reference);
        tracing::debug!(reference = index, score, "similarity score");
        decision.scores.push(score);
        if score > MATCH_THRESHOLD {
            decision.matched = Some(index);
            break;
        }
    }
    decision
}

/// Whether any reference matches `frame`
#[must_use]
pub fn evaluate<'a, I>(frame: &RgbaImage, references: I) -> bool
where
    I: IntoIterator<Item = &'a RgbaImage>,
{
    decide(frame, references).is_match()
}
