// SPDX-License-Identifier: GPL-3.0-only

//! CLI commands for driving the pipeline without a capture device

use chrono::Local;
use detection_overlay::config::PipelineConfig;
use detection_overlay::constants::{OverlayKind, demo};
use detection_overlay::events::ChannelObserver;
use detection_overlay::frame_processor::BrightRegionDetector;
use detection_overlay::media::convert::to_packed_color;
use detection_overlay::media::frame::{I420Buffer, Plane, VideoFrame, chroma_dim};
use detection_overlay::pipeline::FramePipeline;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use tracing::warn;

/// Options for the `run` command
#[derive(Debug, Clone)]
pub struct RunOptions {
    pub width: u32,
    pub height: u32,
    pub rotation: i32,
    pub fps: u32,
    pub frames: u64,
    pub config: Option<PathBuf>,
    pub no_overlay: bool,
    pub color: bool,
    pub snapshot: Option<PathBuf>,
}

/// Feed synthetic frames through a pipeline and print its events
pub fn run(options: RunOptions) -> Result<(), Box<dyn std::error::Error>> {
    if options.width == 0 || options.height == 0 {
        return Err("Frame size must be non-zero".into());
    }

    let mut config = match &options.config {
        Some(path) => PipelineConfig::from_file(path)?,
        None => PipelineConfig::default(),
    };
    if options.no_overlay {
        config.overlay.enabled = false;
    }
    if options.color {
        config.overlay.kind = OverlayKind::ColorBox;
    }

    let pipeline = FramePipeline::new(Arc::new(BrightRegionDetector::default()), config)?;
    let (observer, mut events) = ChannelObserver::channel();
    pipeline.event_sink().attach(Arc::new(observer));

    println!(
        "Running {} frames of {}x{} @ {}fps, rotation {}",
        options.frames, options.width, options.height, options.fps, options.rotation
    );
    println!("Press Ctrl+C to stop early");

    let stop_flag = Arc::new(AtomicBool::new(false));
    let stop_flag_clone = stop_flag.clone();
    ctrlc::set_handler(move || {
        stop_flag_clone.store(true, Ordering::SeqCst);
    })?;

    let frame_period = Duration::from_secs_f64(1.0 / options.fps.max(1) as f64);
    let started = Instant::now();
    let mut last_frame = None;

    for index in 0..options.frames {
        if stop_flag.load(Ordering::SeqCst) {
            println!("Stopping early...");
            break;
        }

        let tick = Instant::now();
        let frame = synthetic_frame(index, &options);
        let output = pipeline.on_frame(frame);
        last_frame = Some(output);

        while let Ok(event) = events.try_recv() {
            println!("{}", event.to_json()?);
        }

        let elapsed = tick.elapsed();
        if elapsed > demo::SLOW_FRAME {
            warn!(frame = index, elapsed_ms = elapsed.as_millis(), "Slow frame");
        }
        if let Some(remaining) = frame_period.checked_sub(elapsed) {
            std::thread::sleep(remaining);
        }
    }

    pipeline.dispose();
    while let Ok(event) = events.try_recv() {
        println!("{}", event.to_json()?);
    }

    let stats = pipeline.stats();
    println!(
        "Processed {} frames in {:.1}s",
        stats.frame_count,
        started.elapsed().as_secs_f32()
    );
    println!("{}", serde_json::to_string_pretty(&stats)?);

    if let Some(path) = options.snapshot
        && let Some(frame) = last_frame
    {
        save_snapshot(&frame, path)?;
    }

    Ok(())
}

/// Print the default configuration as JSON
pub fn print_default_config() -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", PipelineConfig::default().to_json_pretty()?);
    Ok(())
}

fn save_snapshot(frame: &VideoFrame, path: PathBuf) -> Result<(), Box<dyn std::error::Error>> {
    let path = if path.is_dir() {
        let timestamp = Local::now().format("%Y%m%d_%H%M%S");
        path.join(format!("snapshot_{}.png", timestamp))
    } else {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }
        path
    };

    to_packed_color(frame)?.save(&path)?;
    println!("Snapshot saved: {}", path.display());
    Ok(())
}

/// Gray frame with a bright square sweeping left to right
///
/// The square disappears for part of every cycle so empty detections and
/// the throttled `noFaces` event show up as well.
fn synthetic_frame(index: u64, options: &RunOptions) -> VideoFrame {
    let width = options.width;
    let height = options.height;
    let size = ((width.min(height) as f32 * demo::SQUARE_FRACTION) as u32).max(1);
    let mut y = vec![demo::BACKGROUND_LUMA; width as usize * height as usize];

    let visible = index % demo::CYCLE_FRAMES < demo::CYCLE_FRAMES - demo::HIDDEN_FRAMES;
    if visible {
        let travel = (width - size.min(width)).max(1) as u64;
        let x0 = ((index * 4) % travel) as u32;
        let y0 = (height - size.min(height)) / 2;
        for row in y0..(y0 + size).min(height) {
            let start = row as usize * width as usize;
            for col in x0..(x0 + size).min(width) {
                y[start + col as usize] = demo::SQUARE_LUMA;
            }
        }
    }

    let cw = chroma_dim(width);
    let ch = chroma_dim(height);
    let chroma = vec![128u8; cw as usize * ch as usize];
    let buffer = I420Buffer::new(
        width,
        height,
        Plane::new(y, width),
        Plane::new(chroma.clone(), cw),
        Plane::new(chroma, cw),
    );

    let timestamp_ns = (index as i64).saturating_mul(1_000_000_000 / options.fps.max(1) as i64);
    VideoFrame::new(buffer, options.rotation, timestamp_ns)
}
