//! Frontal face region detector.
//!
//! Wraps the SeetaFace funnel-structured cascade (via `rustface`), which
//! operates on grayscale intensity. Frames are converted before detection.

use crate::types::FaceRegion;
use image::RgbImage;
use serde::Deserialize;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use thiserror::Error;

// --- Named constants ---
const DEFAULT_MIN_FACE_SIZE: u32 = 40;
const DEFAULT_SCORE_THRESH: f64 = 2.0;
const DEFAULT_PYRAMID_SCALE_FACTOR: f32 = 0.8;
const DEFAULT_SLIDE_WINDOW_STEP: u32 = 4;
/// The cascade rejects windows smaller than this.
const MIN_SUPPORTED_FACE_SIZE: u32 = 20;
/// Pyramid scale factors the cascade accepts.
const PYRAMID_SCALE_RANGE: std::ops::RangeInclusive<f32> = 0.01..=0.99;

#[derive(Error, Debug)]
pub enum DetectorError {
    #[error("model file not found: {0} — place seeta_fd_frontal_v1.0.bin in the model directory")]
    ModelNotFound(String),
    #[error("failed to read model {path}: {reason}")]
    ModelUnreadable { path: String, reason: String },
    #[error("invalid detector settings: {0}")]
    InvalidSettings(String),
    #[error("image too small for detection: {width}x{height}")]
    ImageTooSmall { width: u32, height: u32 },
}

/// Locates candidate face boxes in a frame.
pub trait RegionDetector {
    /// Detect faces in `image`. Ordering is backend-defined.
    fn detect(&mut self, image: &RgbImage) -> Result<Vec<FaceRegion>, DetectorError>;
}

/// Cascade tunables, loaded from the `[detector]` config section.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DetectorSettings {
    pub min_face_size: u32,
    pub score_thresh: f64,
    pub pyramid_scale_factor: f32,
    pub slide_window_step: u32,
}

impl DetectorSettings {
    /// Reject values the cascade cannot run with.
    pub fn validate(&self) -> Result<(), DetectorError> {
        let invalid = |msg: String| Err(DetectorError::InvalidSettings(msg));
        if self.min_face_size < MIN_SUPPORTED_FACE_SIZE {
            return invalid(format!(
                "min_face_size {} is below {MIN_SUPPORTED_FACE_SIZE}",
                self.min_face_size
            ));
        }
        if self.score_thresh.is_nan() || self.score_thresh <= 0.0 {
            return invalid(format!("score_thresh {} must be positive", self.score_thresh));
        }
        if !PYRAMID_SCALE_RANGE.contains(&self.pyramid_scale_factor) {
            return invalid(format!(
                "pyramid_scale_factor {} must be within [0.01, 0.99]",
                self.pyramid_scale_factor
            ));
        }
        if self.slide_window_step == 0 {
            return invalid("slide_window_step must be at least 1".to_string());
        }
        Ok(())
    }
}

impl Default for DetectorSettings {
    fn default() -> Self {
        Self {
            min_face_size: DEFAULT_MIN_FACE_SIZE,
            score_thresh: DEFAULT_SCORE_THRESH,
            pyramid_scale_factor: DEFAULT_PYRAMID_SCALE_FACTOR,
            slide_window_step: DEFAULT_SLIDE_WINDOW_STEP,
        }
    }
}

/// SeetaFace-based frontal face detector.
pub struct FrontalFaceDetector {
    detector: Box<dyn rustface::Detector>,
}

impl FrontalFaceDetector {
    /// Load the SeetaFace frontal model from the given path.
    pub fn load(model_path: &str, settings: &DetectorSettings) -> Result<Self, DetectorError> {
        settings.validate()?;
        if !Path::new(model_path).exists() {
            return Err(DetectorError::ModelNotFound(model_path.to_string()));
        }

        let unreadable = |reason: String| DetectorError::ModelUnreadable {
            path: model_path.to_string(),
            reason,
        };

        let file = File::open(model_path).map_err(|e| unreadable(e.to_string()))?;
        let model = rustface::read_model(BufReader::new(file)).map_err(|e| unreadable(e.to_string()))?;

        let mut detector = rustface::create_detector_with_model(model);
        detector.set_min_face_size(settings.min_face_size);
        detector.set_score_thresh(settings.score_thresh);
        detector.set_pyramid_scale_factor(settings.pyramid_scale_factor);
        detector.set_slide_window_step(settings.slide_window_step, settings.slide_window_step);

        tracing::info!(
            path = model_path,
            min_face_size = settings.min_face_size,
            score_thresh = settings.score_thresh,
            "loaded SeetaFace frontal model"
        );

        Ok(Self { detector })
    }
}

impl RegionDetector for FrontalFaceDetector {
    fn detect(&mut self, image: &RgbImage) -> Result<Vec<FaceRegion>, DetectorError> {
        let (width, height) = image.dimensions();
        if width < MIN_SUPPORTED_FACE_SIZE || height < MIN_SUPPORTED_FACE_SIZE {
            return Err(DetectorError::ImageTooSmall { width, height });
        }

        let gray = image::imageops::grayscale(image);
        let faces = self
            .detector
            .detect(&rustface::ImageData::new(gray.as_raw(), width, height));

        Ok(faces
            .iter()
            .map(|face| {
                let bbox = face.bbox();
                FaceRegion {
                    x: bbox.x(),
                    y: bbox.y(),
                    width: bbox.width(),
                    height: bbox.height(),
                    score: face.score() as f32,
                }
            })
            .collect())
    }
}

/// Pick the largest region by area; ties keep the earliest one.
pub fn largest_region(regions: &[FaceRegion]) -> Option<&FaceRegion> {
    let mut best: Option<&FaceRegion> = None;
    for region in regions {
        match best {
            Some(b) if region.area() <= b.area() => {}
            _ => best = Some(region),
        }
    }
    best
}
