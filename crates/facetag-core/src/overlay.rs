//! Bounding box and label overlays drawn onto frames before display.

use crate::types::FaceRegion;
use ab_glyph::{Font, FontArc, PxScale, ScaleFont};
use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_hollow_rect_mut, draw_text_mut};
use imageproc::rect::Rect;
use std::path::Path;
use thiserror::Error;

/// Box and text colour; BGR (255, 0, 0) in the reference pipeline.
const OVERLAY_COLOR: Rgb<u8> = Rgb([0, 0, 255]);
const BOX_THICKNESS: u32 = 2;
/// Gap between the label baseline and the top of the box.
const LABEL_MARGIN: i32 = 10;
const LABEL_SCALE: f32 = 24.0;

/// DejaVu Sans, embedded so labels render without any runtime files.
static BUNDLED_FONT: &[u8] = include_bytes!(concat!(env!("CARGO_MANIFEST_DIR"), "/assets/DejaVuSans.ttf"));

#[derive(Error, Debug)]
pub enum OverlayError {
    #[error("failed to read font {path}: {source}")]
    FontUnreadable {
        path: String,
        source: std::io::Error,
    },
    #[error("invalid font file: {0}")]
    InvalidFont(String),
}

/// Draws region boxes and labels in place.
pub struct OverlayRenderer {
    font: Option<FontArc>,
}

impl OverlayRenderer {
    /// Renderer that draws labels with the embedded DejaVu Sans font.
    pub fn bundled() -> Result<Self, OverlayError> {
        let font = FontArc::try_from_slice(BUNDLED_FONT)
            .map_err(|e| OverlayError::InvalidFont(format!("bundled font: {e}")))?;
        Ok(Self { font: Some(font) })
    }

    /// Renderer that draws labels with the TrueType/OpenType font at `path`.
    pub fn with_font(path: &Path) -> Result<Self, OverlayError> {
        let bytes = std::fs::read(path).map_err(|source| OverlayError::FontUnreadable {
            path: path.display().to_string(),
            source,
        })?;
        let font = FontArc::try_from_vec(bytes)
            .map_err(|e| OverlayError::InvalidFont(format!("{}: {e}", path.display())))?;

        tracing::info!(path = %path.display(), "loaded label font");
        Ok(Self { font: Some(font) })
    }

    /// Renderer that never draws labels, only boxes.
    pub fn boxes_only() -> Self {
        Self { font: None }
    }

    /// Draw `region` and, if given, `label` above it.
    pub fn render(&self, image: &mut RgbImage, region: &FaceRegion, label: Option<&str>) {
        draw_box(image, region);

        let (Some(label), Some(font)) = (label, &self.font) else {
            return;
        };
        let (x, y) = label_origin(font, region);
        draw_text_mut(image, OVERLAY_COLOR, x, y, PxScale::from(LABEL_SCALE), font, label);
    }
}

fn draw_box(image: &mut RgbImage, region: &FaceRegion) {
    for inset in 0..BOX_THICKNESS {
        let w = region.width.saturating_sub(2 * inset);
        let h = region.height.saturating_sub(2 * inset);
        if w == 0 || h == 0 {
            break;
        }
        let rect = Rect::at(region.x + inset as i32, region.y + inset as i32).of_size(w, h);
        draw_hollow_rect_mut(image, rect, OVERLAY_COLOR);
    }
}

/// Top-left corner for label text whose baseline sits `LABEL_MARGIN` above
/// the region. `draw_text_mut` places the baseline one ascent below `y`.
fn label_origin(font: &impl Font, region: &FaceRegion) -> (i32, i32) {
    let ascent = font.as_scaled(PxScale::from(LABEL_SCALE)).ascent().round() as i32;
    (region.x, region.y - LABEL_MARGIN - ascent)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn changed_rows(a: &RgbImage, b: &RgbImage) -> Vec<u32> {
        let mut rows: Vec<u32> = a
            .enumerate_pixels()
            .filter(|(x, y, p)| b.get_pixel(*x, *y) != *p)
            .map(|(_, y, _)| y)
            .collect();
        rows.dedup();
        rows
    }

    #[test]
    fn test_box_drawn_on_edges() {
        let mut img = RgbImage::new(40, 40);
        let region = FaceRegion::new(5, 5, 20, 10);
        OverlayRenderer::boxes_only().render(&mut img, &region, None);

        assert_eq!(img.get_pixel(5, 5), &OVERLAY_COLOR);
        assert_eq!(img.get_pixel(24, 14), &OVERLAY_COLOR);
        // second ring
        assert_eq!(img.get_pixel(6, 6), &OVERLAY_COLOR);
        // interior and outside untouched
        assert_eq!(img.get_pixel(15, 10), &Rgb([0, 0, 0]));
        assert_eq!(img.get_pixel(30, 30), &Rgb([0, 0, 0]));
    }

    #[test]
    fn test_bundled_font_draws_label_above_box() {
        let renderer = OverlayRenderer::bundled().unwrap();
        let region = FaceRegion::new(10, 60, 40, 30);
        let mut with_label = RgbImage::new(100, 100);
        let mut without_label = RgbImage::new(100, 100);
        renderer.render(&mut with_label, &region, Some("Ana"));
        renderer.render(&mut without_label, &region, None);

        let rows = changed_rows(&with_label, &without_label);
        assert!(!rows.is_empty());
        // "Ana" has no descenders: the whole label sits in the margin above the box
        assert!(rows.iter().all(|&y| y < 60));
        assert!(rows.iter().any(|&y| y as i32 >= 60 - LABEL_MARGIN - 2));
    }

    #[test]
    fn test_boxes_only_ignores_label() {
        let mut with_label = RgbImage::new(40, 40);
        let mut without_label = RgbImage::new(40, 40);
        let region = FaceRegion::new(5, 15, 20, 10);
        let renderer = OverlayRenderer::boxes_only();
        renderer.render(&mut with_label, &region, Some("alice"));
        renderer.render(&mut without_label, &region, None);
        assert_eq!(with_label, without_label);
    }

    #[test]
    fn test_one_pixel_region() {
        let mut img = RgbImage::new(4, 4);
        OverlayRenderer::boxes_only().render(&mut img, &FaceRegion::new(1, 1, 1, 1), None);
        assert_eq!(img.get_pixel(1, 1), &OVERLAY_COLOR);
    }

    #[test]
    fn test_label_baseline_sits_margin_above_box() {
        let font = FontArc::try_from_slice(BUNDLED_FONT).unwrap();
        let ascent = font.as_scaled(PxScale::from(LABEL_SCALE)).ascent().round() as i32;
        let (x, y) = label_origin(&font, &FaceRegion::new(30, 100, 50, 50));
        assert_eq!(x, 30);
        assert_eq!(y + ascent, 100 - LABEL_MARGIN);
        assert!(ascent > 0);
    }

    #[test]
    fn test_label_clipped_at_frame_top() {
        let renderer = OverlayRenderer::bundled().unwrap();
        let mut img = RgbImage::new(30, 30);
        renderer.render(&mut img, &FaceRegion::new(2, 2, 10, 10), Some("Bob"));
        assert_eq!(img.get_pixel(2, 2), &OVERLAY_COLOR);
    }

    #[test]
    fn test_missing_font_file() {
        let result = OverlayRenderer::with_font(Path::new("/nonexistent/font.ttf"));
        assert!(matches!(result, Err(OverlayError::FontUnreadable { .. })));
    }

    #[test]
    fn test_invalid_font_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bogus.ttf");
        std::fs::write(&path, b"not a font").unwrap();
        let result = OverlayRenderer::with_font(&path);
        assert!(matches!(result, Err(OverlayError::InvalidFont(_))));
    }
}
