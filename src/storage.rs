// SPDX-License-Identifier: MPL-2.0

//! Storage utilities for cropped text images

use crate::errors::{AppError, AppResult};
use chrono::Local;
use image::RgbaImage;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

/// Default folder name for saved crops
const DEFAULT_SAVE_FOLDER: &str = "camera-detector";

/// Default directory for saved crops (`~/Pictures/camera-detector`)
pub fn default_crop_dir() -> PathBuf {
    dirs::picture_dir()
        .unwrap_or_else(|| dirs::home_dir().unwrap_or_else(|| PathBuf::from(".")))
        .join(DEFAULT_SAVE_FOLDER)
}

/// File name for the `index`-th crop of a detection pass
pub fn crop_file_name(timestamp: &str, index: usize) -> String {
    format!("text_{}_{:02}.png", timestamp, index)
}

/// Save cropped text images as PNG files in `dir`
///
/// Files share one timestamp and are numbered in detection order.
/// Encoding runs on the blocking pool.
pub async fn save_crops(images: Vec<Arc<RgbaImage>>, dir: PathBuf) -> AppResult<Vec<PathBuf>> {
    if images.is_empty() {
        return Ok(Vec::new());
    }
    let timestamp = Local::now().format("%Y%m%d_%H%M%S").to_string();

    tokio::task::spawn_blocking(move || save_crops_sync(&images, &dir, &timestamp))
        .await
        .map_err(|e| AppError::Storage(format!("Crop save task failed: {}", e)))?
}

fn save_crops_sync(
    images: &[Arc<RgbaImage>],
    dir: &Path,
    timestamp: &str,
) -> AppResult<Vec<PathBuf>> {
    std::fs::create_dir_all(dir)?;

    let mut paths = Vec::with_capacity(images.len());
    for (index, image) in images.iter().enumerate() {
        let path = dir.join(crop_file_name(timestamp, index));
        image
            .save(&path)
            .map_err(|e| AppError::Storage(format!("Failed to save {}: {}", path.display(), e)))?;
        debug!(path = %path.display(), width = image.width(), height = image.height(), "Saved crop");
        paths.push(path);
    }
    Ok(paths)
}
