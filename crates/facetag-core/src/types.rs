use image::RgbImage;
use serde::{Deserialize, Serialize};

/// Label reported when no registry entry scores above the 0.0 floor.
pub const UNKNOWN_LABEL: &str = "Unknown";

/// Number of histogram bins in a [`Signature`].
pub const SIGNATURE_BINS: usize = 256;

/// Index into an RGB pixel of BGR channel 0 (blue).
///
/// Frames are RGB in memory; the reference pipeline histograms channel 0 of
/// a BGR image, which is the blue plane.
pub const BGR_CHANNEL_0: usize = 2;

/// Axis-aligned face bounding box in frame pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FaceRegion {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
    /// Detector score for this region (backend-specific scale).
    pub score: f32,
}

impl FaceRegion {
    pub fn new(x: i32, y: i32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
            score: 0.0,
        }
    }

    /// Area in pixels (`width × height`).
    pub fn area(&self) -> u64 {
        self.width as u64 * self.height as u64
    }

    /// Clip the region to a `width × height` frame.
    ///
    /// Returns `None` when nothing of the region remains inside the frame.
    pub fn clamp(&self, width: u32, height: u32) -> Option<FaceRegion> {
        let x1 = (self.x as i64).max(0);
        let y1 = (self.y as i64).max(0);
        let x2 = (self.x as i64 + self.width as i64).min(width as i64);
        let y2 = (self.y as i64 + self.height as i64).min(height as i64);

        if x2 <= x1 || y2 <= y1 {
            return None;
        }

        Some(FaceRegion {
            x: x1 as i32,
            y: y1 as i32,
            width: (x2 - x1) as u32,
            height: (y2 - y1) as u32,
            score: self.score,
        })
    }

    /// Copy the pixels under this region out of `image`.
    ///
    /// The region should already be clamped to the image; `crop_imm` clips
    /// anything outside, so an unclamped region yields a smaller crop.
    pub fn crop(&self, image: &RgbImage) -> RgbImage {
        image::imageops::crop_imm(
            image,
            self.x.max(0) as u32,
            self.y.max(0) as u32,
            self.width,
            self.height,
        )
        .to_image()
    }
}

/// 256-bin frequency histogram over BGR channel 0 of an image crop.
///
/// Bins hold raw pixel counts (no normalization), matching the registry
/// signatures built at startup.
#[derive(Debug, Clone, PartialEq)]
pub struct Signature {
    bins: [f64; SIGNATURE_BINS],
}

impl Signature {
    /// Histogram BGR channel 0 of `image`.
    pub fn of(image: &RgbImage) -> Self {
        let mut bins = [0.0f64; SIGNATURE_BINS];
        for pixel in image.pixels() {
            bins[pixel.0[BGR_CHANNEL_0] as usize] += 1.0;
        }
        Self { bins }
    }

    pub fn from_bins(bins: [f64; SIGNATURE_BINS]) -> Self {
        Self { bins }
    }

    pub fn bins(&self) -> &[f64; SIGNATURE_BINS] {
        &self.bins
    }

    /// Pearson correlation between two histograms over their bin vectors.
    ///
    /// Returns a value in [-1, 1]; higher = more similar. When either
    /// histogram has zero variance the result is 1.0, which is what the
    /// reference histogram comparison reports for that case.
    pub fn correlation(&self, other: &Signature) -> f64 {
        let n = SIGNATURE_BINS as f64;
        let mut s1 = 0.0f64;
        let mut s2 = 0.0f64;
        let mut s11 = 0.0f64;
        let mut s22 = 0.0f64;
        let mut s12 = 0.0f64;

        for (&a, &b) in self.bins.iter().zip(other.bins.iter()) {
            s1 += a;
            s2 += b;
            s11 += a * a;
            s22 += b * b;
            s12 += a * b;
        }

        let num = s12 - s1 * s2 / n;
        let denom2 = (s11 - s1 * s1 / n) * (s22 - s2 * s2 / n);
        if denom2.abs() > f64::EPSILON {
            num / denom2.sqrt()
        } else {
            1.0
        }
    }
}

/// Outcome of classifying one region against the registry.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassificationResult {
    /// A registry name, or [`UNKNOWN_LABEL`].
    pub label: String,
    /// Correlation of the selected entry; `None` when nothing beat the floor.
    pub score: Option<f64>,
}

impl ClassificationResult {
    pub fn unknown() -> Self {
        Self {
            label: UNKNOWN_LABEL.to_string(),
            score: None,
        }
    }

    pub fn is_unknown(&self) -> bool {
        self.score.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    fn signature_from(values: &[(usize, f64)]) -> Signature {
        let mut bins = [0.0f64; SIGNATURE_BINS];
        for &(i, v) in values {
            bins[i] = v;
        }
        Signature::from_bins(bins)
    }

    #[test]
    fn test_clamp_inside() {
        let r = FaceRegion::new(10, 20, 30, 40);
        assert_eq!(r.clamp(100, 100), Some(r));
    }

    #[test]
    fn test_clamp_negative_origin() {
        let r = FaceRegion::new(-5, -10, 20, 30);
        let c = r.clamp(100, 100).unwrap();
        assert_eq!((c.x, c.y, c.width, c.height), (0, 0, 15, 20));
    }

    #[test]
    fn test_clamp_overflowing_edge() {
        let r = FaceRegion::new(90, 95, 20, 20);
        let c = r.clamp(100, 100).unwrap();
        assert_eq!((c.x, c.y, c.width, c.height), (90, 95, 10, 5));
    }

    #[test]
    fn test_clamp_outside_is_none() {
        assert!(FaceRegion::new(120, 10, 10, 10).clamp(100, 100).is_none());
        assert!(FaceRegion::new(-30, 10, 20, 10).clamp(100, 100).is_none());
    }

    #[test]
    fn test_clamp_zero_size_is_none() {
        assert!(FaceRegion::new(10, 10, 0, 10).clamp(100, 100).is_none());
        assert!(FaceRegion::new(10, 10, 10, 0).clamp(100, 100).is_none());
    }

    #[test]
    fn test_crop_copies_region() {
        let mut img = RgbImage::new(8, 8);
        img.put_pixel(3, 4, Rgb([1, 2, 3]));
        let crop = FaceRegion::new(2, 3, 4, 4).crop(&img);
        assert_eq!(crop.dimensions(), (4, 4));
        assert_eq!(crop.get_pixel(1, 1), &Rgb([1, 2, 3]));
    }

    #[test]
    fn test_signature_uses_blue_plane() {
        let img = RgbImage::from_pixel(4, 4, Rgb([10, 20, 30]));
        let sig = Signature::of(&img);
        assert_eq!(sig.bins()[30], 16.0);
        assert_eq!(sig.bins()[10], 0.0);
        assert_eq!(sig.bins().iter().sum::<f64>(), 16.0);
    }

    #[test]
    fn test_correlation_self_is_one() {
        let sig = signature_from(&[(0, 3.0), (10, 7.0), (200, 1.0)]);
        assert!((sig.correlation(&sig) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_correlation_is_symmetric() {
        let a = signature_from(&[(0, 3.0), (10, 7.0), (200, 1.0)]);
        let b = signature_from(&[(0, 1.0), (11, 7.0), (200, 4.0)]);
        assert!((a.correlation(&b) - b.correlation(&a)).abs() < 1e-12);
    }

    #[test]
    fn test_correlation_disjoint_is_negative() {
        let a = signature_from(&[(0, 100.0)]);
        let b = signature_from(&[(255, 100.0)]);
        assert!(a.correlation(&b) < 0.0);
    }

    #[test]
    fn test_correlation_flat_histogram_is_one() {
        let flat = Signature::from_bins([2.0; SIGNATURE_BINS]);
        let other = signature_from(&[(5, 9.0)]);
        assert_eq!(flat.correlation(&other), 1.0);
    }

    #[test]
    fn test_unknown_result() {
        let r = ClassificationResult::unknown();
        assert_eq!(r.label, UNKNOWN_LABEL);
        assert!(r.is_unknown());
    }
}
