//! facetag-core — Face detection, gating and registry matching.
//!
//! Regions come from the SeetaFace frontal cascade, are gated by the res10
//! SSD network via ONNX Runtime, and are labelled by histogram correlation
//! against a small registry of reference faces.

pub mod classifier;
pub mod detector;
pub mod gate;
pub mod overlay;
pub mod registry;
pub mod types;

pub use classifier::{classify, CorrelationMatcher, Matcher};
pub use detector::{DetectorError, DetectorSettings, FrontalFaceDetector, RegionDetector};
pub use gate::{accepts, ConfidenceGate, GateError, SsdConfidenceGate, DEFAULT_CONFIDENCE_THRESHOLD};
pub use overlay::{OverlayError, OverlayRenderer};
pub use registry::{FaceRegistry, RegisteredFace, RegistryEntry, SkipReason, SkippedEntry};
pub use types::{ClassificationResult, FaceRegion, Signature, UNKNOWN_LABEL};
