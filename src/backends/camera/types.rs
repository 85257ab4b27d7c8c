// SPDX-License-Identifier: GPL-3.0-only
// Shared types for the capture engine abstraction

//! Shared types for capture engines

use image::RgbaImage;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

static NEXT_SESSION_ID: AtomicU64 = AtomicU64::new(1);

/// Identifier of one logical capture session
///
/// Minted from a process-wide counter, so identifiers are unique and
/// monotonically increasing for the lifetime of the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionId(u64);

impl SessionId {
    /// Mint a fresh identifier
    pub fn next() -> Self {
        Self(NEXT_SESSION_ID.fetch_add(1, Ordering::SeqCst))
    }

    /// The identifier the next call to `next` will hand out
    ///
    /// Every session minted so far compares less than the watermark; every
    /// session minted afterwards compares greater or equal.
    pub fn watermark() -> Self {
        Self(NEXT_SESSION_ID.load(Ordering::SeqCst))
    }

    /// Wrap a raw value (engines and tests)
    pub fn from_raw(value: u64) -> Self {
        Self(value)
    }

    pub fn value(&self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Which side of the device the camera faces
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum CameraPosition {
    /// Selfie camera
    Front,
    /// Rear camera
    #[default]
    Back,
}

impl CameraPosition {
    pub const ALL: [CameraPosition; 2] = [CameraPosition::Front, CameraPosition::Back];

    /// The opposite position
    pub fn toggled(self) -> Self {
        match self {
            CameraPosition::Front => CameraPosition::Back,
            CameraPosition::Back => CameraPosition::Front,
        }
    }

    pub fn toggle(&mut self) {
        *self = self.toggled();
    }
}

impl std::fmt::Display for CameraPosition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CameraPosition::Front => write!(f, "front"),
            CameraPosition::Back => write!(f, "back"),
        }
    }
}

impl std::str::FromStr for CameraPosition {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "front" => Ok(CameraPosition::Front),
            "back" | "rear" => Ok(CameraPosition::Back),
            other => Err(format!("unknown camera position '{}'", other)),
        }
    }
}

/// A capture device as reported by the engine
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CameraDevice {
    /// Engine-specific device identifier
    pub id: String,
    /// Human-readable name
    pub name: String,
    pub position: CameraPosition,
}

/// Engine-side handle to a native capture session
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SessionHandle {
    /// Session this handle belongs to
    pub session: SessionId,
    /// Engine-specific native session number
    pub native_id: u64,
}

/// Description of the frame output attached to a session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputSink {
    /// Format frames are delivered in
    pub pixel_format: PixelFormat,
    /// Late frames are dropped instead of queued
    pub discards_late_frames: bool,
}

/// Pixel format of frame data
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PixelFormat {
    /// RGBA - 32-bit with alpha (4 bytes per pixel)
    Rgba,
    /// BGRA - 32-bit with alpha (B G R A byte order), the usual capture output
    Bgra,
    /// Gray8 - 8-bit grayscale (single channel)
    Gray8,
}

impl PixelFormat {
    pub fn bytes_per_pixel(&self) -> u32 {
        match self {
            Self::Rgba | Self::Bgra => 4,
            Self::Gray8 => 1,
        }
    }
}

impl std::fmt::Display for PixelFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Rgba => write!(f, "RGBA"),
            Self::Bgra => write!(f, "BGRA"),
            Self::Gray8 => write!(f, "GRAY8"),
        }
    }
}

/// A single frame from the capture engine
///
/// Frames are immutable once produced and travel through the controller as
/// `Arc<CameraFrame>`, so a frame handed to a detector can never be mutated
/// by the capture side.
#[derive(Debug, Clone)]
pub struct CameraFrame {
    pub width: u32,
    pub height: u32,
    /// Pixel data, `stride` bytes per row
    pub data: Arc<[u8]>,
    pub format: PixelFormat,
    /// Row stride in bytes (may include padding)
    pub stride: u32,
    /// Delivery sequence number within a stream
    pub sequence: u64,
    /// When the frame was produced
    pub captured_at: Instant,
}

impl CameraFrame {
    /// Build a tightly packed frame, returning `None` if `data` is too short
    pub fn from_packed(width: u32, height: u32, format: PixelFormat, data: Vec<u8>) -> Option<Self> {
        let stride = width * format.bytes_per_pixel();
        if data.len() < stride as usize * height as usize {
            return None;
        }
        Some(Self {
            width,
            height,
            data: Arc::from(data.into_boxed_slice()),
            format,
            stride,
            sequence: 0,
            captured_at: Instant::now(),
        })
    }

    /// Bytes of row `y` without stride padding
    pub fn row(&self, y: u32) -> &[u8] {
        let start = (y * self.stride) as usize;
        let len = (self.width * self.format.bytes_per_pixel()) as usize;
        &self.data[start..start + len]
    }

    /// Luma of one pixel (BT.601 weights)
    pub fn luma(&self, x: u32, y: u32) -> u8 {
        let bpp = self.format.bytes_per_pixel() as usize;
        let px = &self.row(y)[x as usize * bpp..];
        let (r, g, b) = match self.format {
            PixelFormat::Rgba => (px[0], px[1], px[2]),
            PixelFormat::Bgra => (px[2], px[1], px[0]),
            PixelFormat::Gray8 => return px[0],
        };
        ((r as u32 * 299 + g as u32 * 587 + b as u32 * 114) / 1000) as u8
    }

    /// Convert to an RGBA image (copies pixel data)
    pub fn to_rgba_image(&self) -> Option<RgbaImage> {
        let mut rgba = Vec::with_capacity((self.width * self.height * 4) as usize);
        for y in 0..self.height {
            let row = self.row(y);
            match self.format {
                PixelFormat::Rgba => rgba.extend_from_slice(row),
                PixelFormat::Bgra => {
                    for px in row.chunks_exact(4) {
                        rgba.extend_from_slice(&[px[2], px[1], px[0], px[3]]);
                    }
                }
                PixelFormat::Gray8 => {
                    for &v in row {
                        rgba.extend_from_slice(&[v, v, v, 255]);
                    }
                }
            }
        }
        RgbaImage::from_raw(self.width, self.height, rgba)
    }
}

/// Frame receiver type for streaming sessions
pub type FrameReceiver = futures::channel::mpsc::Receiver<CameraFrame>;

/// Frame sender type for streaming sessions
pub type FrameSender = futures::channel::mpsc::Sender<CameraFrame>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_ids_increase() {
        let a = SessionId::next();
        let b = SessionId::next();
        assert!(b > a);
    }

    #[test]
    fn test_watermark_separates_old_and_new_ids() {
        let old = SessionId::next();
        let mark = SessionId::watermark();
        let new = SessionId::next();
        assert!(old < mark);
        assert!(new >= mark);
    }

    #[test]
    fn test_position_toggle() {
        let mut position = CameraPosition::Front;
        position.toggle();
        assert_eq!(position, CameraPosition::Back);
        position.toggle();
        assert_eq!(position, CameraPosition::Front);
        assert_eq!("rear".parse::<CameraPosition>(), Ok(CameraPosition::Back));
    }

    #[test]
    fn test_bgra_to_rgba_image() {
        let frame = CameraFrame::from_packed(1, 1, PixelFormat::Bgra, vec![10, 20, 30, 255]).unwrap();
        let image = frame.to_rgba_image().unwrap();
        assert_eq!(image.get_pixel(0, 0).0, [30, 20, 10, 255]);
    }

    #[test]
    fn test_short_buffer_rejected() {
        assert!(CameraFrame::from_packed(4, 4, PixelFormat::Rgba, vec![0; 10]).is_none());
    }

    #[test]
    fn test_luma_of_gray_frame() {
        let frame = CameraFrame::from_packed(2, 1, PixelFormat::Gray8, vec![0, 200]).unwrap();
        assert_eq!(frame.luma(1, 0), 200);
    }
}
