//! facetag-hw — Frame acquisition.
//!
//! Provides V4L2-based camera capture with colour conversion, and a still
//! image source for headless runs, behind a common `FrameSource` trait.

pub mod camera;
pub mod frame;
pub mod still;

pub use camera::{Camera, CameraError, CameraStream, DeviceInfo, PixelFormat};
pub use frame::{CaptureError, Frame, FrameError, FrameSource};
pub use still::StillImageSource;
