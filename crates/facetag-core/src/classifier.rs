//! Nearest-neighbour classification by histogram correlation.

use crate::registry::FaceRegistry;
use crate::types::{ClassificationResult, Signature};
use image::RgbImage;

/// Scores below or equal to this never select a registry entry.
const SCORE_FLOOR: f64 = 0.0;

/// Strategy for choosing a registry name for a probe signature.
pub trait Matcher {
    fn best_match(&self, probe: &Signature, registry: &FaceRegistry) -> ClassificationResult;
}

/// Linear scan with a running maximum starting at 0.0.
///
/// Entries are visited in registry order and only a strictly greater score
/// replaces the current best, so the earliest entry wins ties and
/// non-positive correlations always leave the result at "Unknown".
pub struct CorrelationMatcher;

impl Matcher for CorrelationMatcher {
    fn best_match(&self, probe: &Signature, registry: &FaceRegistry) -> ClassificationResult {
        let mut best_score = SCORE_FLOOR;
        let mut best: Option<&str> = None;

        for face in registry.iter() {
            let score = probe.correlation(&face.signature);
            if score > best_score {
                best_score = score;
                best = Some(&face.name);
            }
        }

        match best {
            Some(name) => ClassificationResult {
                label: name.to_string(),
                score: Some(best_score),
            },
            None => ClassificationResult::unknown(),
        }
    }
}

/// Classify a region crop against the registry.
pub fn classify(crop: &RgbImage, registry: &FaceRegistry) -> ClassificationResult {
    CorrelationMatcher.best_match(&Signature::of(crop), registry)
}
