// SPDX-License-Identifier: MPL-2.0

//! Coordinate conversion between detector space and camera space
//!
//! Detector space: unit rectangle, bottom-left origin, in the current device
//! orientation. Camera space: unit rectangle, top-left origin, in the
//! orientation of the sensor.

use super::types::BoundingBox;
use crate::backends::camera::types::CameraFrame;
use crate::backends::orientation::Orientation;
use crate::errors::{DetectorError, DetectorResult};
use std::sync::Arc;
use std::time::Instant;

/// Which corner a unit rectangle's `y` is measured from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RectOrigin {
    TopLeft,
    BottomLeft,
}

/// Convert a detector-space box to camera space
///
/// Flips the vertical axis, then rotates about the frame center by the
/// orientation's angle and returns the bounding rectangle of the rotated
/// corners.
pub fn convert_bounding_box(bounds: BoundingBox, orientation: Orientation) -> BoundingBox {
    let flipped = flip_vertical(bounds);
    let degrees = orientation.rotation_degrees();
    if degrees == 0.0 {
        flipped
    } else {
        rotate_about_center(flipped, degrees)
    }
}

/// Convert a camera-space box to detector space
///
/// Inverse of `convert_bounding_box`: rotates back by the orientation's angle,
/// then flips the vertical axis. Detectors that locate things in sensor
/// pixels use this so their boxes survive the conversion to camera space.
pub fn to_detector_space(bounds: BoundingBox, orientation: Orientation) -> BoundingBox {
    let degrees = orientation.rotation_degrees();
    let unrotated = if degrees == 0.0 {
        bounds
    } else {
        rotate_about_center(bounds, -degrees)
    };
    flip_vertical(unrotated)
}

/// Mirror a unit rectangle between bottom-left and top-left origin
pub fn flip_vertical(bounds: BoundingBox) -> BoundingBox {
    BoundingBox {
        y: 1.0 - bounds.y - bounds.height,
        ..bounds
    }
}

/// Rotate a unit rectangle about (0.5, 0.5)
///
/// Positive angles turn the content clockwise in top-left space.
pub fn rotate_about_center(bounds: BoundingBox, degrees: f64) -> BoundingBox {
    let (sin, cos) = degrees.to_radians().sin_cos();
    let corners = [
        (bounds.x, bounds.y),
        (bounds.max_x(), bounds.y),
        (bounds.x, bounds.max_y()),
        (bounds.max_x(), bounds.max_y()),
    ];

    let mut min = (f64::INFINITY, f64::INFINITY);
    let mut max = (f64::NEG_INFINITY, f64::NEG_INFINITY);
    for (x, y) in corners {
        let (dx, dy) = (x - 0.5, y - 0.5);
        let rx = dx * cos + dy * sin + 0.5;
        let ry = -dx * sin + dy * cos + 0.5;
        min = (min.0.min(rx), min.1.min(ry));
        max = (max.0.max(rx), max.1.max(ry));
    }

    BoundingBox::new(min.0, min.1, max.0 - min.0, max.1 - min.1)
}

/// Crop the region of a detector-space box out of a frame
pub fn crop_region(
    frame: &CameraFrame,
    detector_bounds: BoundingBox,
    orientation: Orientation,
) -> DetectorResult<CameraFrame> {
    crop_unit_rect(
        frame,
        convert_bounding_box(detector_bounds, orientation),
        RectOrigin::TopLeft,
    )
}

/// Crop a unit rectangle out of a frame
///
/// The rectangle is scaled to pixels and rounded. Zero-area rectangles and
/// rectangles reaching outside the frame fail with `DetectionFailed`. The
/// crop keeps the source pixel format, is tightly packed and carries a fresh
/// capture timestamp.
pub fn crop_unit_rect(
    frame: &CameraFrame,
    rect: BoundingBox,
    origin: RectOrigin,
) -> DetectorResult<CameraFrame> {
    let top_left = match origin {
        RectOrigin::TopLeft => rect,
        RectOrigin::BottomLeft => flip_vertical(rect),
    };

    let to_px = |value: f64, extent: u32| (value * extent as f64).round();
    let x = to_px(top_left.x, frame.width);
    let y = to_px(top_left.y, frame.height);
    let w = to_px(top_left.width, frame.width);
    let h = to_px(top_left.height, frame.height);

    let valid = [x, y, w, h].iter().all(|v| v.is_finite())
        && x >= 0.0
        && y >= 0.0
        && w >= 1.0
        && h >= 1.0
        && x + w <= frame.width as f64
        && y + h <= frame.height as f64;
    if !valid {
        return Err(DetectorError::DetectionFailed);
    }

    let (x, y, w, h) = (x as u32, y as u32, w as u32, h as u32);
    let bpp = frame.format.bytes_per_pixel() as usize;
    let row_start = x as usize * bpp;
    let row_len = w as usize * bpp;

    let mut data = Vec::with_capacity(row_len * h as usize);
    for row in y..y + h {
        data.extend_from_slice(&frame.row(row)[row_start..row_start + row_len]);
    }

    Ok(CameraFrame {
        width: w,
        height: h,
        data: Arc::from(data.into_boxed_slice()),
        format: frame.format,
        stride: w * frame.format.bytes_per_pixel(),
        sequence: frame.sequence,
        captured_at: Instant::now(),
    })
}
