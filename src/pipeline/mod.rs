pub mod cursor;
pub mod depth_decoder;
pub mod projection;
pub mod sensor;
pub mod skeleton;
pub mod smoothing;
pub mod synthetic;
pub mod worker;

// Re-exports for convenience
pub use cursor::{CursorEngine, CursorEvent, CursorPhase};
pub use projection::{ProjectedJoint, ScreenProjector, project};
pub use sensor::{
    ControlSignal, SensorEvent, SensorFrame, SensorSource, SensorStream, start_sensor_stream,
};
pub use skeleton::{ElementBinding, MarkerStyle, PrimarySkeletonPolicy, SelectionPolicy};
pub use smoothing::{JointSmoothingFilter, SmoothingParameters, SmoothingState};
pub use synthetic::SyntheticSensor;
pub use worker::{LoopExit, run_pipeline_loop};

use crate::{
    config::PipelineConfig,
    error::Result,
    types::{Color, ColorFrame, ElementId, JOINT_COUNT, RawDepthFrame, Skeleton, TargetId},
};

/// Receives everything the pipeline produces.
pub trait RenderSink {
    fn render_color_frame(&mut self, frame: ColorFrame);
    fn position_element(&mut self, element: &ElementId, x: f32, y: f32);
    fn on_hover_changed(&mut self, target: Option<&TargetId>);
    fn on_target_selected(&mut self, target: &TargetId);
}

/// How depth frames are turned into color frames.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum DepthView {
    /// One palette color per player, background transparent.
    #[default]
    Players,
    /// Grayscale distance image.
    Intensity,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PipelineStats {
    pub color_frames: u64,
    pub dropped_color_frames: u64,
    pub depth_frames: u64,
    pub dropped_depth_frames: u64,
    pub skeleton_frames: u64,
    pub frames_without_skeleton: u64,
    pub selections: u64,
}

/// Per-session frame processing: decodes depth frames, smooths and places the
/// primary skeleton, and drives the hand cursor.
///
/// Callbacks of one modality must not overlap; the pipeline does no internal
/// locking.
pub struct FramePipeline<S: RenderSink> {
    config: PipelineConfig,
    sink: S,
    depth_view: DepthView,
    selector: Box<dyn PrimarySkeletonPolicy>,
    smoother: JointSmoothingFilter,
    cursor: Option<CursorEngine>,
    marker_color: Option<Color>,
    window_active: bool,
    shut_down: bool,
    stats: PipelineStats,
}

impl<S: RenderSink> FramePipeline<S> {
    pub fn new(config: PipelineConfig, sink: S) -> Result<Self> {
        config.validate()?;

        let cursor = config.cursor.enabled.then(|| {
            CursorEngine::new(
                config.cursor.targets.clone(),
                (config.cursor.glyph_width, config.cursor.glyph_height),
            )
        });

        Ok(Self {
            selector: config.selection.build(),
            smoother: JointSmoothingFilter::new(
                config.smoothing,
                config.reset_after_untracked_frames,
            ),
            cursor,
            marker_color: None,
            depth_view: DepthView::default(),
            window_active: true,
            shut_down: false,
            stats: PipelineStats::default(),
            config,
            sink,
        })
    }

    pub fn with_depth_view(mut self, view: DepthView) -> Self {
        self.depth_view = view;
        self
    }

    /// Replaces the primary-skeleton policy chosen by the config.
    pub fn with_selector(mut self, selector: Box<dyn PrimarySkeletonPolicy>) -> Self {
        self.selector = selector;
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn sink_mut(&mut self) -> &mut S {
        &mut self.sink
    }

    pub fn into_sink(self) -> S {
        self.sink
    }

    pub fn stats(&self) -> PipelineStats {
        self.stats
    }

    pub fn cursor(&self) -> Option<&CursorEngine> {
        self.cursor.as_ref()
    }

    pub fn smoother(&self) -> &JointSmoothingFilter {
        &self.smoother
    }

    pub fn is_shut_down(&self) -> bool {
        self.shut_down
    }

    pub fn set_window_active(&mut self, active: bool) {
        self.window_active = active;
    }

    /// Overrides the marker color from the config, e.g. on a voice command.
    pub fn set_marker_color(&mut self, color: Color) {
        self.marker_color = Some(color);
    }

    /// Passes a camera color frame straight through to the sink. A frame whose
    /// buffer does not match its dimensions is dropped and reported.
    pub fn on_color_frame(&mut self, frame: ColorFrame) -> Result<()> {
        if self.shut_down {
            return Ok(());
        }
        self.stats.color_frames += 1;

        if let Err(err) = frame.validate() {
            self.stats.dropped_color_frames += 1;
            return Err(err);
        }
        self.sink.render_color_frame(frame);
        Ok(())
    }

    /// Decodes one depth frame and hands it to the sink. A malformed frame is
    /// dropped and reported; nothing is rendered for it.
    pub fn on_depth_frame(&mut self, frame: &RawDepthFrame) -> Result<()> {
        if self.shut_down {
            return Ok(());
        }
        self.stats.depth_frames += 1;

        let decoded = match self.depth_view {
            DepthView::Players => depth_decoder::decode(frame),
            DepthView::Intensity => depth_decoder::decode_intensity(frame),
        };
        match decoded {
            Ok(color) => {
                self.sink.render_color_frame(color);
                Ok(())
            }
            Err(err) => {
                self.stats.dropped_depth_frames += 1;
                Err(err)
            }
        }
    }

    /// Follows the primary skeleton of this tick. Returns the smoothed
    /// skeleton, or `None` when nobody is tracked.
    pub fn on_skeleton_frame(&mut self, skeletons: &[Skeleton]) -> Result<Option<Skeleton>> {
        if self.shut_down {
            return Ok(None);
        }
        self.stats.skeleton_frames += 1;

        let Some(primary) = self.selector.select(skeletons) else {
            self.stats.frames_without_skeleton += 1;
            self.smoother.mark_untracked();
            return Ok(None);
        };

        let mut skeleton = primary.clone();
        self.smoother.smooth(&mut skeleton);

        self.place_elements(&skeleton)?;
        self.render_markers(&skeleton)?;
        self.track_cursor(&skeleton)?;

        Ok(Some(skeleton))
    }

    pub fn on_click_signal(&mut self) {
        if self.shut_down {
            return;
        }
        let Some(engine) = self.cursor.as_mut() else {
            return;
        };
        if let Some(event) = engine.click() {
            self.stats.selections += 1;
            dispatch_cursor_event(&mut self.sink, event);
            self.sink.on_hover_changed(None);
        }
    }

    pub fn on_shutdown(&mut self) {
        if self.shut_down {
            return;
        }
        log::info!("frame pipeline shutting down");
        self.shut_down = true;
        if let Some(engine) = self.cursor.as_mut() {
            engine.shutdown();
        }
    }

    fn place_elements(&mut self, skeleton: &Skeleton) -> Result<()> {
        for binding in &self.config.bindings {
            let joint = skeleton.joint(binding.joint);
            let seen = self
                .smoother
                .state(binding.joint)
                .is_some_and(|s| s.has_history());
            if !joint.state.is_usable() && !seen {
                log::trace!("{} not seen yet, leaving {} in place", binding.joint, binding.element);
                continue;
            }
            let point = self.config.layout.project(joint.position)?;
            self.sink
                .position_element(&binding.element, point.x, point.y - binding.y_offset);
        }
        Ok(())
    }

    fn render_markers(&mut self, skeleton: &Skeleton) -> Result<()> {
        let Some(markers) = &self.config.markers else {
            return Ok(());
        };

        let projector = ScreenProjector {
            width: markers.width as f32,
            height: markers.height as f32,
            ..self.config.layout
        };
        let mut points = [None; JOINT_COUNT];
        for joint in skeleton.joints().filter(|j| j.state.is_usable()) {
            let p = projector.project(joint.position)?;
            points[joint.id.index()] = Some((p.x, p.y));
        }

        let mut style = markers.style;
        if let Some(color) = self.marker_color {
            style.color = color;
        }
        let mut canvas = ColorFrame::blank(markers.width, markers.height);
        skeleton::draw_markers(&mut canvas, &points, &style);
        self.sink.render_color_frame(canvas);
        Ok(())
    }

    fn track_cursor(&mut self, skeleton: &Skeleton) -> Result<()> {
        let Some(engine) = self.cursor.as_mut() else {
            return Ok(());
        };
        let Some(hand) = skeleton::cursor_hand(skeleton) else {
            return Ok(());
        };

        let point = self.config.cursor.screen.project(hand.position)?;
        let event = engine.update((point.x, point.y), self.window_active);
        if let Some((x, y)) = engine.glyph_origin() {
            self.sink.position_element(&self.config.cursor.element, x, y);
        }
        if let Some(event) = event {
            dispatch_cursor_event(&mut self.sink, event);
        }
        Ok(())
    }
}

fn dispatch_cursor_event<S: RenderSink>(sink: &mut S, event: CursorEvent) {
    match event {
        CursorEvent::HoverChanged(target) => sink.on_hover_changed(target.as_ref()),
        CursorEvent::Selected(target) => sink.on_target_selected(&target),
    }
}
