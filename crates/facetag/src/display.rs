//! Display sinks for annotated frames.

use facetag_hw::Frame;
use image::RgbImage;
use minifb::{Key, Window, WindowOptions};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Window refresh rate; also the per-frame key polling interval (10 ms).
const WINDOW_TARGET_FPS: usize = 100;

#[derive(Error, Debug)]
pub enum DisplayError {
    #[error("window: {0}")]
    Window(#[from] minifb::Error),
    #[error("failed to write {path}: {source}")]
    Write {
        path: String,
        source: image::ImageError,
    },
    #[error("failed to create output directory {path}: {source}")]
    CreateDir {
        path: String,
        source: std::io::Error,
    },
}

/// Receives each annotated frame and reports whether the user asked to stop.
pub trait DisplaySink {
    fn show(&mut self, frame: &Frame) -> Result<(), DisplayError>;

    /// Non-blocking check for the termination input.
    fn termination_requested(&mut self) -> bool;
}

/// Live window; Escape (or closing the window) terminates.
pub struct WindowSink {
    title: String,
    window: Option<Window>,
    buffer: Vec<u32>,
}

impl WindowSink {
    /// The window opens on the first frame, sized to it.
    pub fn new(title: &str) -> Self {
        Self {
            title: title.to_string(),
            window: None,
            buffer: Vec::new(),
        }
    }
}

impl DisplaySink for WindowSink {
    fn show(&mut self, frame: &Frame) -> Result<(), DisplayError> {
        let (width, height) = (frame.width() as usize, frame.height() as usize);

        if self.window.is_none() {
            let mut window = Window::new(&self.title, width, height, WindowOptions::default())?;
            window.set_target_fps(WINDOW_TARGET_FPS);
            tracing::info!(width, height, title = %self.title, "display window opened");
            self.window = Some(window);
        }
        let Some(window) = self.window.as_mut() else {
            return Ok(());
        };

        pack_0rgb(&frame.image, &mut self.buffer);
        window.update_with_buffer(&self.buffer, width, height)?;
        Ok(())
    }

    fn termination_requested(&mut self) -> bool {
        match &self.window {
            Some(w) => !w.is_open() || w.is_key_down(Key::Escape),
            None => false,
        }
    }
}

/// Writes every frame as a PNG into a directory. Never requests termination.
pub struct FileSink {
    dir: PathBuf,
    written: usize,
}

impl FileSink {
    pub fn new(dir: &Path) -> Result<Self, DisplayError> {
        std::fs::create_dir_all(dir).map_err(|source| DisplayError::CreateDir {
            path: dir.display().to_string(),
            source,
        })?;
        Ok(Self {
            dir: dir.to_path_buf(),
            written: 0,
        })
    }

    /// Path a frame with `sequence` is written to.
    pub fn frame_path(&self, sequence: u32) -> PathBuf {
        frame_path_in(&self.dir, sequence)
    }

    pub fn written(&self) -> usize {
        self.written
    }
}

impl DisplaySink for FileSink {
    fn show(&mut self, frame: &Frame) -> Result<(), DisplayError> {
        let path = self.frame_path(frame.sequence);
        frame.image.save(&path).map_err(|source| DisplayError::Write {
            path: path.display().to_string(),
            source,
        })?;
        self.written += 1;
        tracing::debug!(path = %path.display(), "wrote annotated frame");
        Ok(())
    }

    fn termination_requested(&mut self) -> bool {
        false
    }
}

/// Output file name for frame `sequence` under `dir`.
pub fn frame_path_in(dir: &Path, sequence: u32) -> PathBuf {
    dir.join(format!("frame_{sequence:06}.png"))
}

/// Discards frames; for headless runs with no output.
pub struct NullSink;

impl DisplaySink for NullSink {
    fn show(&mut self, _frame: &Frame) -> Result<(), DisplayError> {
        Ok(())
    }

    fn termination_requested(&mut self) -> bool {
        false
    }
}

/// Pack RGB pixels into minifb's 0RGB `u32` layout.
fn pack_0rgb(image: &RgbImage, out: &mut Vec<u32>) {
    out.clear();
    out.extend(
        image
            .pixels()
            .map(|p| ((p.0[0] as u32) << 16) | ((p.0[1] as u32) << 8) | p.0[2] as u32),
    );
}
