// SPDX-License-Identifier: GPL-3.0-only

//! CLI commands
//!
//! This module provides command-line functionality for:
//! - Listing the virtual capture devices
//! - Running live detection against the virtual camera
//! - Running one detection pass on a still image
//! - Showing the effective configuration

use camera_detector::app::frame_processor::tasks::{PipelineSettings, detect};
use camera_detector::app::frame_processor::types::DetectionResult;
use camera_detector::app::{
    AppModel, CaptureMessage, DetectMode, SessionState, Snapshot, Store,
};
use camera_detector::backends::camera::{CameraPosition, CaptureEngine, SessionRegistry};
use camera_detector::backends::detector::Detectors;
use camera_detector::backends::orientation::{FixedOrientation, Orientation};
use camera_detector::backends::virtual_camera::{
    FrameSource, VirtualCaptureEngine, load_image_as_frame,
};
use camera_detector::config::Config;
use camera_detector::storage;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Time allowed for a session to come up or shut down
const SESSION_TIMEOUT: Duration = Duration::from_secs(5);

/// Options for `run`
pub struct RunOptions {
    pub mode: Option<DetectMode>,
    pub position: Option<CameraPosition>,
    pub image: Option<PathBuf>,
    pub frames: Option<u64>,
    pub orientation: Orientation,
}

/// List the devices of the virtual capture engine
pub fn list_cameras() -> Result<(), Box<dyn std::error::Error>> {
    let engine = VirtualCaptureEngine::new();
    let devices = engine.devices();

    if devices.is_empty() {
        println!("No cameras found.");
        return Ok(());
    }

    println!("Available cameras ({} engine):", engine.name());
    println!();
    for device in &devices {
        println!("  [{}] {} ({})", device.position, device.name, device.id);
    }
    println!();

    Ok(())
}

/// Open a session on the virtual camera and print detection changes
pub async fn run(options: RunOptions) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = Config::load();
    if let Some(mode) = options.mode {
        config.detect_mode = mode;
    }
    if let Some(position) = options.position {
        config.camera_position = position;
    }

    let source = match &options.image {
        Some(path) => FrameSource::from_image(path)?,
        None => FrameSource::default(),
    };
    let engine = VirtualCaptureEngine::new()
        .with_source(source)
        .with_frame_interval(config.virtual_frame_interval());

    let store = Store::new(AppModel::new(
        SessionRegistry::new(Arc::new(engine)),
        Arc::new(FixedOrientation::new(options.orientation)),
        Detectors::qr(),
        &config,
    ));

    println!(
        "Detecting in {} mode with the {} camera (Ctrl+C to stop)",
        config.detect_mode, config.camera_position
    );
    store.send(CaptureMessage::MakeSession)?;

    if store
        .wait_for(SESSION_TIMEOUT, |s| s.session_state.is_running())
        .await
        .is_none()
    {
        store.send(CaptureMessage::RemoveSession)?;
        store.shutdown().await;
        return Err("Capture session did not start".into());
    }

    let mut snapshots = store.subscribe();
    let mut last_printed: Option<(usize, Vec<String>)> = None;
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            _ = &mut ctrl_c => {
                println!();
                println!("Interrupted");
                break;
            }
            changed = snapshots.changed() => {
                if changed.is_err() {
                    break;
                }
                let snapshot = snapshots.borrow_and_update().clone();
                let summary = (snapshot.detection.len(), snapshot.detected_texts());
                if last_printed.as_ref() != Some(&summary) {
                    print_snapshot(&snapshot);
                    last_printed = Some(summary);
                }
                if options.frames.is_some_and(|limit| snapshot.detections_finished() >= limit) {
                    break;
                }
            }
        }
    }

    store.send(CaptureMessage::StopSession)?;
    store
        .wait_for(SESSION_TIMEOUT, |s| !s.session_state.is_running())
        .await;
    store.send(CaptureMessage::RemoveSession)?;
    store
        .wait_for(SESSION_TIMEOUT, |s| s.session_state == SessionState::NoSession)
        .await;

    let state = store.state();
    println!(
        "Detections: {} completed, {} failed",
        state.detections_completed, state.detections_failed
    );
    store.shutdown().await;
    Ok(())
}

/// Run one detection pass on a still image
pub async fn detect_image(
    path: PathBuf,
    mode: Option<DetectMode>,
    orientation: Orientation,
    save_crops: Option<Option<PathBuf>>,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::load();
    let mode = mode.unwrap_or(config.detect_mode);

    let frame = load_image_as_frame(&path)?;
    println!(
        "Image: {} ({}x{}), mode: {}, orientation: {}",
        path.display(),
        frame.width,
        frame.height,
        mode,
        orientation
    );

    let result = detect(
        &Detectors::qr(),
        Arc::new(frame),
        orientation,
        mode,
        &PipelineSettings::from(&config),
    )
    .await?;
    print_result(&result);

    if let Some(dir) = save_crops {
        let dir = dir.unwrap_or_else(storage::default_crop_dir);
        let saved = storage::save_crops(result.detected_text_images(), dir).await?;
        for path in &saved {
            println!("Saved: {}", path.display());
        }
        if saved.is_empty() {
            println!("No cropped images to save");
        }
    }

    Ok(())
}

/// Print the configuration path and the effective configuration
///
/// With `write`, the effective configuration is saved back, which fills in
/// any missing fields.
pub fn show_config(write: bool) -> Result<(), Box<dyn std::error::Error>> {
    if write {
        let path = Config::load().save()?;
        println!("Wrote {}", path.display());
    }
    match Config::path() {
        Some(path) if path.exists() => println!("Config file: {}", path.display()),
        Some(path) => println!("Config file: {} (not found, using defaults)", path.display()),
        None => println!("Config file: unavailable (no config directory)"),
    }
    println!("{}", serde_json::to_string_pretty(&Config::load())?);
    Ok(())
}

fn print_snapshot(snapshot: &Snapshot) {
    println!(
        "[{} | {} | {}]",
        snapshot.session_state, snapshot.camera_position, snapshot.device_orientation
    );
    print_result(&snapshot.detection);
}

fn print_result(result: &DetectionResult) {
    if result.is_empty() {
        println!("  nothing detected");
        return;
    }
    for (index, entry) in result.entries.iter().enumerate() {
        let b = &entry.bounds;
        print!(
            "  {:>2}: x={:.3} y={:.3} w={:.3} h={:.3}",
            index, b.x, b.y, b.width, b.height
        );
        match &entry.text {
            Some(text) => println!("  \"{}\"", text),
            None => println!(),
        }
    }
}

