use std::{env, time::Duration};

use anyhow::{Context, Result};
use crossbeam_channel::{bounded, unbounded};
use sensor_pipeline::{
    FramePipeline, PipelineConfig, RenderSink,
    pipeline::{LoopExit, SyntheticSensor, run_pipeline_loop, start_sensor_stream},
    types::{ColorFrame, CursorTarget, ElementId, Rect, TargetId},
};

const FRAME_QUEUE_DEPTH: usize = 2;
const SENSOR_WIDTH: u32 = 320;
const SENSOR_HEIGHT: u32 = 240;
const DEMO_TICKS: u64 = 90;
const SNAPSHOT_PATH: &str = "depth_snapshot.png";

/// Logs what a UI would draw and keeps the latest frame.
#[derive(Default)]
struct LoggingSink {
    last_frame: Option<ColorFrame>,
}

impl RenderSink for LoggingSink {
    fn render_color_frame(&mut self, frame: ColorFrame) {
        log::trace!("frame {}x{}", frame.width, frame.height);
        self.last_frame = Some(frame);
    }

    fn position_element(&mut self, element: &ElementId, x: f32, y: f32) {
        log::debug!("{element} -> ({x:.1}, {y:.1})");
    }

    fn on_hover_changed(&mut self, target: Option<&TargetId>) {
        match target {
            Some(id) => log::info!("hovering {id}"),
            None => log::info!("hover cleared"),
        }
    }

    fn on_target_selected(&mut self, target: &TargetId) {
        log::info!("selected {target}");
    }
}

fn demo_config() -> PipelineConfig {
    let mut config = PipelineConfig::default();
    config.cursor.targets = vec![
        CursorTarget::new("edward", Rect::new(1000.0, 300.0, 200.0, 160.0)),
        CursorTarget::new("jacob", Rect::new(1400.0, 300.0, 200.0, 160.0)),
    ];
    config
}

fn main() -> Result<()> {
    env_logger::init();

    let config = match env::args().nth(1) {
        Some(path) => PipelineConfig::load(path)?,
        None => demo_config(),
    };

    let (frame_tx, frame_rx) = bounded(FRAME_QUEUE_DEPTH);
    let (control_tx, control_rx) = unbounded();

    let sensor = SyntheticSensor::new(SENSOR_WIDTH, SENSOR_HEIGHT)
        .with_frame_interval(Duration::from_millis(33))
        .with_ticks(DEMO_TICKS)
        .with_click_every(10);
    let mut pipeline =
        FramePipeline::new(config, LoggingSink::default()).context("invalid pipeline config")?;
    let stream = start_sensor_stream(sensor, frame_tx, control_tx)?;

    let exit = run_pipeline_loop(&mut pipeline, frame_rx, control_rx);
    stream.stop();
    if exit == LoopExit::Disconnected {
        log::warn!("sensor stream ended without a shutdown signal");
    }

    let stats = pipeline.stats();
    log::info!(
        "depth frames: {} ({} dropped), skeleton frames: {} ({} without skeleton), selections: {}",
        stats.depth_frames,
        stats.dropped_depth_frames,
        stats.skeleton_frames,
        stats.frames_without_skeleton,
        stats.selections
    );

    if let Some(image) = pipeline.into_sink().last_frame.and_then(|f| f.to_rgba_image()) {
        image
            .save(SNAPSHOT_PATH)
            .with_context(|| format!("failed to save {SNAPSHOT_PATH}"))?;
        log::info!("saved last frame to {SNAPSHOT_PATH}");
    }

    Ok(())
}
