//! Frame source over still image files, for headless runs.

use crate::frame::{CaptureError, Frame, FrameSource};
use std::collections::VecDeque;
use std::path::PathBuf;

/// Yields each image once, in order, then reports end of stream.
pub struct StillImageSource {
    paths: VecDeque<PathBuf>,
    sequence: u32,
}

impl StillImageSource {
    pub fn new(paths: impl IntoIterator<Item = PathBuf>) -> Self {
        Self {
            paths: paths.into_iter().collect(),
            sequence: 0,
        }
    }
}

impl FrameSource for StillImageSource {
    fn next_frame(&mut self) -> Result<Option<Frame>, CaptureError> {
        let Some(path) = self.paths.pop_front() else {
            return Ok(None);
        };

        let image = image::open(&path)
            .map_err(|source| CaptureError::Image {
                path: path.display().to_string(),
                source,
            })?
            .to_rgb8();

        tracing::debug!(path = %path.display(), seq = self.sequence, "read still frame");
        let frame = Frame::new(image, self.sequence);
        self.sequence += 1;
        Ok(Some(frame))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    #[test]
    fn test_yields_images_in_order_then_none() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a.png");
        let b = dir.path().join("b.png");
        RgbImage::from_pixel(3, 2, Rgb([1, 2, 3])).save(&a).unwrap();
        RgbImage::from_pixel(5, 4, Rgb([4, 5, 6])).save(&b).unwrap();

        let mut source = StillImageSource::new([a, b]);

        let first = source.next_frame().unwrap().unwrap();
        assert_eq!(first.image.dimensions(), (3, 2));
        assert_eq!(first.sequence, 0);

        let second = source.next_frame().unwrap().unwrap();
        assert_eq!(second.image.get_pixel(0, 0), &Rgb([4, 5, 6]));
        assert_eq!(second.sequence, 1);

        assert!(source.next_frame().unwrap().is_none());
        assert!(source.next_frame().unwrap().is_none());
    }

    #[test]
    fn test_unreadable_image_is_error() {
        let mut source = StillImageSource::new([PathBuf::from("/nonexistent/frame.png")]);
        assert!(matches!(source.next_frame(), Err(CaptureError::Image { .. })));
    }
}
