//! SSD confidence gate via ONNX Runtime.
//!
//! Runs a cropped region through the res10 300×300 SSD face network and
//! reports the confidence of its first candidate box. The gate only decides
//! whether a region gets labelled; it never picks the label.

use image::imageops::FilterType;
use image::RgbImage;
use ndarray::Array4;
use ort::session::Session;
use ort::value::TensorRef;
use std::path::Path;
use thiserror::Error;

// --- Named constants ---
const SSD_INPUT_SIZE: u32 = 300;
/// Per-channel means in BGR order, subtracted with unit scale.
const SSD_MEAN_BGR: [f32; 3] = [104.0, 177.0, 123.0];
/// Each candidate row is [image_id, label, confidence, x1, y1, x2, y2].
const SSD_DETECTION_WIDTH: usize = 7;
const SSD_CONFIDENCE_FIELD: usize = 2;

/// Default acceptance threshold; confidence must be strictly greater.
pub const DEFAULT_CONFIDENCE_THRESHOLD: f32 = 0.5;

#[derive(Error, Debug)]
pub enum GateError {
    #[error("model file not found: {0} — export res10_300x300_ssd to ONNX and place it in the model directory")]
    ModelNotFound(String),
    #[error("empty crop")]
    EmptyCrop,
    #[error("inference failed: {0}")]
    InferenceFailed(String),
    #[error("ort: {0}")]
    Ort(#[from] ort::Error),
}

/// Scores how plausible it is that a crop contains a face.
pub trait ConfidenceGate {
    /// Confidence in [0, 1] for `crop`.
    fn confidence(&mut self, crop: &RgbImage) -> Result<f32, GateError>;
}

/// Whether a gate confidence passes `threshold` (strict `>`).
pub fn accepts(confidence: f32, threshold: f32) -> bool {
    confidence > threshold
}

/// res10 SSD network gate.
pub struct SsdConfidenceGate {
    session: Session,
}

impl SsdConfidenceGate {
    /// Load the SSD ONNX model from the given path.
    pub fn load(model_path: &str) -> Result<Self, GateError> {
        if !Path::new(model_path).exists() {
            return Err(GateError::ModelNotFound(model_path.to_string()));
        }

        let session = Session::builder()?
            .with_intra_threads(2)?
            .commit_from_file(model_path)?;

        tracing::info!(
            path = model_path,
            inputs = ?session.inputs().iter().map(|i| (i.name(), i.dtype())).collect::<Vec<_>>(),
            outputs = ?session.outputs().iter().map(|o| o.name()).collect::<Vec<_>>(),
            "loaded SSD gate model"
        );

        Ok(Self { session })
    }

    /// Resize to 300×300 and build a BGR NCHW tensor with mean subtraction.
    fn preprocess(crop: &RgbImage) -> Array4<f32> {
        let size = SSD_INPUT_SIZE as usize;
        let resized = image::imageops::resize(crop, SSD_INPUT_SIZE, SSD_INPUT_SIZE, FilterType::Triangle);

        let mut tensor = Array4::<f32>::zeros((1, 3, size, size));
        for (x, y, pixel) in resized.enumerate_pixels() {
            let [r, g, b] = pixel.0;
            let (x, y) = (x as usize, y as usize);
            tensor[[0, 0, y, x]] = b as f32 - SSD_MEAN_BGR[0];
            tensor[[0, 1, y, x]] = g as f32 - SSD_MEAN_BGR[1];
            tensor[[0, 2, y, x]] = r as f32 - SSD_MEAN_BGR[2];
        }

        tensor
    }
}

impl ConfidenceGate for SsdConfidenceGate {
    fn confidence(&mut self, crop: &RgbImage) -> Result<f32, GateError> {
        if crop.width() == 0 || crop.height() == 0 {
            return Err(GateError::EmptyCrop);
        }

        let input = Self::preprocess(crop);
        let outputs = self.session.run(ort::inputs![TensorRef::from_array_view(input.view())?])?;

        let (_, detections) = outputs[0]
            .try_extract_tensor::<f32>()
            .map_err(|e| GateError::InferenceFailed(format!("detections: {e}")))?;

        Ok(first_candidate_confidence(detections))
    }
}

/// Confidence field of the first candidate in a flattened `[1, 1, N, 7]`
/// SSD output. No candidates reads as 0.0.
fn first_candidate_confidence(detections: &[f32]) -> f32 {
    if detections.len() < SSD_DETECTION_WIDTH {
        return 0.0;
    }
    let confidence = detections[SSD_CONFIDENCE_FIELD];
    if confidence.is_nan() {
        0.0
    } else {
        confidence.clamp(0.0, 1.0)
    }
}
