// SPDX-License-Identifier: GPL-3.0-only

//! Frame sources for the virtual capture engine

use crate::backends::camera::types::{CameraFrame, PixelFormat};
use crate::constants::file_formats;
use crate::errors::{CaptureError, CaptureResult};
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tracing::info;

/// Where virtual frames come from
#[derive(Debug, Clone)]
pub enum FrameSource {
    /// Animated BGRA gradient
    TestPattern { width: u32, height: u32 },
    /// The same image on every frame
    Still(Arc<CameraFrame>),
}

impl FrameSource {
    /// Still source backed by an image file
    pub fn from_image(path: &Path) -> CaptureResult<Self> {
        load_image_as_frame(path).map(|frame| FrameSource::Still(Arc::new(frame)))
    }

    pub fn pixel_format(&self) -> PixelFormat {
        match self {
            FrameSource::TestPattern { .. } => PixelFormat::Bgra,
            FrameSource::Still(frame) => frame.format,
        }
    }

    /// Produce the frame with the given sequence number
    pub fn frame(&self, sequence: u64) -> CameraFrame {
        let mut frame = match self {
            FrameSource::TestPattern { width, height } => test_pattern(*width, *height, sequence),
            FrameSource::Still(frame) => CameraFrame::clone(frame),
        };
        frame.sequence = sequence;
        frame.captured_at = Instant::now();
        frame
    }
}

impl Default for FrameSource {
    fn default() -> Self {
        FrameSource::TestPattern {
            width: crate::constants::virtual_camera::PATTERN_WIDTH,
            height: crate::constants::virtual_camera::PATTERN_HEIGHT,
        }
    }
}

/// Load an image file as a single RGBA frame
pub fn load_image_as_frame(path: &Path) -> CaptureResult<CameraFrame> {
    info!(path = %path.display(), "Loading image file");

    let supported = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(file_formats::is_image_extension);
    if !supported {
        return Err(CaptureError::Engine(format!(
            "Unsupported image format: {}",
            path.display()
        )));
    }

    let img = image::open(path).map_err(|e| {
        CaptureError::Engine(format!("Failed to load image '{}': {}", path.display(), e))
    })?;

    let rgba = img.to_rgba8();
    let (width, height) = rgba.dimensions();

    info!(width, height, "Image loaded successfully");

    CameraFrame::from_packed(width, height, PixelFormat::Rgba, rgba.into_raw())
        .ok_or_else(|| CaptureError::Engine(format!("Image '{}' has no pixel data", path.display())))
}

/// Diagonal gradient that scrolls one pixel per frame
fn test_pattern(width: u32, height: u32, sequence: u64) -> CameraFrame {
    let shift = sequence as u32;
    let mut data = Vec::with_capacity((width * height * 4) as usize);
    for y in 0..height {
        for x in 0..width {
            let v = (x.wrapping_add(y).wrapping_add(shift) & 0xff) as u8;
            data.extend_from_slice(&[v, v / 2, 255 - v, 255]);
        }
    }

    CameraFrame {
        width,
        height,
        data: Arc::from(data.into_boxed_slice()),
        format: PixelFormat::Bgra,
        stride: width * 4,
        sequence,
        captured_at: Instant::now(),
    }
}
