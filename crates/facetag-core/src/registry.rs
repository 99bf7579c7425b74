//! Registry of named reference faces.
//!
//! Built once at startup from `(name, image path)` pairs. Each source image
//! is reduced to its largest detected face; entries without a usable face
//! are skipped with a warning rather than failing the load.

use crate::detector::{largest_region, RegionDetector};
use crate::types::Signature;
use image::RgbImage;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::PathBuf;

/// One configured registry source.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RegistryEntry {
    pub name: String,
    pub path: PathBuf,
}

/// A reference face: the cropped face region and its precomputed signature.
#[derive(Debug, Clone)]
pub struct RegisteredFace {
    pub name: String,
    pub crop: RgbImage,
    pub signature: Signature,
}

impl RegisteredFace {
    /// Build an entry from an already-cropped face image.
    pub fn from_crop(name: impl Into<String>, crop: RgbImage) -> Self {
        let signature = Signature::of(&crop);
        Self {
            name: name.into(),
            crop,
            signature,
        }
    }
}

/// Why a configured entry was left out of the registry.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum SkipReason {
    Unreadable { error: String },
    NoFaceDetected,
    DetectionFailed { error: String },
    EmptyCrop,
    DuplicateName,
}

#[derive(Debug, Clone, Serialize)]
pub struct SkippedEntry {
    pub name: String,
    pub path: PathBuf,
    #[serde(flatten)]
    pub reason: SkipReason,
}

/// Read-only set of reference faces, iterated in load order.
#[derive(Debug, Clone, Default)]
pub struct FaceRegistry {
    faces: Vec<RegisteredFace>,
    skipped: Vec<SkippedEntry>,
}

impl FaceRegistry {
    /// Load every entry, in order, using `detector` to find each face.
    ///
    /// Never fails: problem entries are recorded in [`skipped`](Self::skipped)
    /// and logged. An empty result is a valid (all-Unknown) registry.
    pub fn load(entries: &[RegistryEntry], detector: &mut impl RegionDetector) -> Self {
        let mut faces: Vec<RegisteredFace> = Vec::with_capacity(entries.len());
        let mut skipped = Vec::new();
        let mut seen = HashSet::new();

        for entry in entries {
            let result = if seen.contains(entry.name.as_str()) {
                Err(SkipReason::DuplicateName)
            } else {
                load_face(entry, detector)
            };

            match result {
                Ok(face) => {
                    tracing::info!(
                        name = %face.name,
                        width = face.crop.width(),
                        height = face.crop.height(),
                        "registered face"
                    );
                    seen.insert(face.name.clone());
                    faces.push(face);
                }
                Err(reason) => {
                    tracing::warn!(
                        name = %entry.name,
                        path = %entry.path.display(),
                        ?reason,
                        "skipping registry entry"
                    );
                    skipped.push(SkippedEntry {
                        name: entry.name.clone(),
                        path: entry.path.clone(),
                        reason,
                    });
                }
            }
        }

        if faces.is_empty() {
            tracing::warn!("no registry faces loaded; every face will be reported as Unknown");
        } else {
            tracing::info!(loaded = faces.len(), skipped = skipped.len(), "registry loaded");
        }

        Self { faces, skipped }
    }

    /// Registry from prepared faces, in the given order.
    pub fn from_faces(faces: Vec<RegisteredFace>) -> Self {
        Self {
            faces,
            skipped: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.faces.len()
    }

    pub fn is_empty(&self) -> bool {
        self.faces.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &RegisteredFace> {
        self.faces.iter()
    }

    pub fn names(&self) -> Vec<&str> {
        self.faces.iter().map(|f| f.name.as_str()).collect()
    }

    pub fn get(&self, name: &str) -> Option<&RegisteredFace> {
        self.faces.iter().find(|f| f.name == name)
    }

    /// Entries omitted during [`load`](Self::load).
    pub fn skipped(&self) -> &[SkippedEntry] {
        &self.skipped
    }
}

fn load_face(
    entry: &RegistryEntry,
    detector: &mut impl RegionDetector,
) -> Result<RegisteredFace, SkipReason> {
    let image = image::open(&entry.path)
        .map_err(|e| SkipReason::Unreadable { error: e.to_string() })?
        .to_rgb8();

    let regions = detector
        .detect(&image)
        .map_err(|e| SkipReason::DetectionFailed { error: e.to_string() })?;

    let face = largest_region(&regions).ok_or(SkipReason::NoFaceDetected)?;
    let clamped = face
        .clamp(image.width(), image.height())
        .ok_or(SkipReason::EmptyCrop)?;

    Ok(RegisteredFace::from_crop(entry.name.clone(), clamped.crop(&image)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detector::DetectorError;
    use crate::types::FaceRegion;
    use image::Rgb;

    /// Returns the same fixed regions for every image.
    struct FixedDetector(Vec<FaceRegion>);

    impl RegionDetector for FixedDetector {
        fn detect(&mut self, _image: &RgbImage) -> Result<Vec<FaceRegion>, DetectorError> {
            Ok(self.0.clone())
        }
    }

    fn write_image(dir: &tempfile::TempDir, name: &str, img: &RgbImage) -> PathBuf {
        let path = dir.path().join(name);
        img.save(&path).unwrap();
        path
    }

    fn entry(name: &str, path: PathBuf) -> RegistryEntry {
        RegistryEntry {
            name: name.to_string(),
            path,
        }
    }

    #[test]
    fn test_load_crops_largest_face() {
        let dir = tempfile::tempdir().unwrap();
        let mut img = RgbImage::from_pixel(64, 64, Rgb([0, 0, 0]));
        for y in 20..40 {
            for x in 10..40 {
                img.put_pixel(x, y, Rgb([0, 0, 200]));
            }
        }
        let path = write_image(&dir, "a.png", &img);

        let mut detector = FixedDetector(vec![
            FaceRegion::new(0, 0, 5, 5),
            FaceRegion::new(10, 20, 30, 20),
        ]);
        let registry = FaceRegistry::load(&[entry("alice", path)], &mut detector);

        assert_eq!(registry.len(), 1);
        let face = registry.get("alice").unwrap();
        assert_eq!(face.crop.dimensions(), (30, 20));
        assert_eq!(face.signature.bins()[200], 600.0);
    }

    #[test]
    fn test_load_clamps_to_image_bounds() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_image(&dir, "a.png", &RgbImage::new(32, 32));
        let mut detector = FixedDetector(vec![FaceRegion::new(-8, 20, 20, 40)]);
        let registry = FaceRegistry::load(&[entry("a", path)], &mut detector);
        assert_eq!(registry.get("a").unwrap().crop.dimensions(), (12, 12));
    }

    #[test]
    fn test_load_skips_image_without_face() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_image(&dir, "a.png", &RgbImage::new(32, 32));
        let mut detector = FixedDetector(vec![]);
        let registry = FaceRegistry::load(&[entry("nobody", path)], &mut detector);

        assert!(registry.is_empty());
        assert_eq!(registry.skipped().len(), 1);
        assert_eq!(registry.skipped()[0].reason, SkipReason::NoFaceDetected);
    }

    #[test]
    fn test_load_skips_unreadable_image() {
        let mut detector = FixedDetector(vec![FaceRegion::new(0, 0, 4, 4)]);
        let registry = FaceRegistry::load(
            &[entry("ghost", PathBuf::from("/nonexistent/ghost.png"))],
            &mut detector,
        );
        assert!(registry.is_empty());
        assert!(matches!(registry.skipped()[0].reason, SkipReason::Unreadable { .. }));
    }

    #[test]
    fn test_load_skips_face_outside_image() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_image(&dir, "a.png", &RgbImage::new(16, 16));
        let mut detector = FixedDetector(vec![FaceRegion::new(100, 100, 10, 10)]);
        let registry = FaceRegistry::load(&[entry("a", path)], &mut detector);
        assert_eq!(registry.skipped()[0].reason, SkipReason::EmptyCrop);
    }

    #[test]
    fn test_load_keeps_order_and_first_duplicate() {
        let dir = tempfile::tempdir().unwrap();
        let a = write_image(&dir, "a.png", &RgbImage::from_pixel(16, 16, Rgb([0, 0, 10])));
        let b = write_image(&dir, "b.png", &RgbImage::from_pixel(16, 16, Rgb([0, 0, 20])));
        let c = write_image(&dir, "c.png", &RgbImage::from_pixel(16, 16, Rgb([0, 0, 30])));
        let mut detector = FixedDetector(vec![FaceRegion::new(0, 0, 16, 16)]);

        let registry = FaceRegistry::load(
            &[entry("b", b), entry("a", a), entry("b", c)],
            &mut detector,
        );

        assert_eq!(registry.names(), vec!["b", "a"]);
        assert_eq!(registry.get("b").unwrap().signature.bins()[20], 256.0);
        assert_eq!(registry.skipped()[0].reason, SkipReason::DuplicateName);
    }

    #[test]
    fn test_empty_entries_is_valid() {
        let mut detector = FixedDetector(vec![]);
        let registry = FaceRegistry::load(&[], &mut detector);
        assert!(registry.is_empty());
        assert!(registry.skipped().is_empty());
    }
}
