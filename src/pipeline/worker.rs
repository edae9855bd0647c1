use crossbeam_channel::{Receiver, TryRecvError, never, select};

use super::{ControlSignal, FramePipeline, RenderSink, SensorFrame};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LoopExit {
    Shutdown,
    Disconnected,
}

/// Latest frame of each modality received since the last pass.
#[derive(Default)]
struct PendingFrames {
    color: Option<SensorFrame>,
    depth: Option<SensorFrame>,
    skeletons: Option<SensorFrame>,
}

impl PendingFrames {
    fn push(&mut self, frame: SensorFrame) {
        match frame {
            SensorFrame::Color(_) => self.color = Some(frame),
            SensorFrame::Depth(_) => self.depth = Some(frame),
            SensorFrame::Skeletons(_) => self.skeletons = Some(frame),
        }
    }

    fn drain(self) -> impl Iterator<Item = SensorFrame> {
        self.color
            .into_iter()
            .chain(self.depth)
            .chain(self.skeletons)
    }
}

/// Drives `pipeline` from the sensor channels until a shutdown signal
/// arrives or both channels disconnect.
///
/// Control signals are handled before any queued frame. When frames pile up
/// only the newest of each kind is processed.
pub fn run_pipeline_loop<S: RenderSink>(
    pipeline: &mut FramePipeline<S>,
    frame_rx: Receiver<SensorFrame>,
    control_rx: Receiver<ControlSignal>,
) -> LoopExit {
    let mut frame_rx = frame_rx;
    let mut control_rx = control_rx;
    let mut frames_open = true;
    let mut controls_open = true;

    while frames_open || controls_open {
        loop {
            match control_rx.try_recv() {
                Ok(signal) => {
                    if handle_control(pipeline, signal) {
                        return LoopExit::Shutdown;
                    }
                }
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    controls_open = false;
                    control_rx = never();
                    break;
                }
            }
        }
        if !frames_open && !controls_open {
            break;
        }

        select! {
            recv(control_rx) -> msg => match msg {
                Ok(signal) => {
                    if handle_control(pipeline, signal) {
                        return LoopExit::Shutdown;
                    }
                }
                Err(_) => controls_open = false,
            },
            recv(frame_rx) -> msg => match msg {
                Ok(frame) => {
                    let mut pending = PendingFrames::default();
                    pending.push(frame);
                    while let Ok(newer) = frame_rx.try_recv() {
                        pending.push(newer);
                    }
                    for frame in pending.drain() {
                        process_frame(pipeline, frame);
                    }
                }
                Err(_) => frames_open = false,
            },
        }

        // A closed channel would be ready forever; park it.
        if !controls_open {
            control_rx = never();
        }
        if !frames_open {
            frame_rx = never();
        }
    }

    log::info!("sensor channels closed, pipeline loop exiting");
    LoopExit::Disconnected
}

fn process_frame<S: RenderSink>(pipeline: &mut FramePipeline<S>, frame: SensorFrame) {
    let result = match frame {
        SensorFrame::Color(color) => pipeline.on_color_frame(color),
        SensorFrame::Depth(depth) => pipeline.on_depth_frame(&depth),
        SensorFrame::Skeletons(skeletons) => pipeline.on_skeleton_frame(&skeletons).map(|_| ()),
    };
    if let Err(err) = result {
        log::warn!("frame dropped: {err}");
    }
}

// Returns true when the loop should stop.
fn handle_control<S: RenderSink>(pipeline: &mut FramePipeline<S>, signal: ControlSignal) -> bool {
    match signal {
        ControlSignal::Click => pipeline.on_click_signal(),
        ControlSignal::WindowActive(active) => pipeline.set_window_active(active),
        ControlSignal::Shutdown => {
            pipeline.on_shutdown();
            return true;
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::PipelineConfig,
        types::{ColorFrame, ElementId, RawDepthFrame, TargetId},
    };
    use crossbeam_channel::{bounded, unbounded};

    #[derive(Default)]
    struct CountingSink {
        frames: usize,
    }

    impl RenderSink for CountingSink {
        fn render_color_frame(&mut self, _frame: ColorFrame) {
            self.frames += 1;
        }

        fn position_element(&mut self, _element: &ElementId, _x: f32, _y: f32) {}

        fn on_hover_changed(&mut self, _target: Option<&TargetId>) {}

        fn on_target_selected(&mut self, _target: &TargetId) {}
    }

    fn pipeline() -> FramePipeline<CountingSink> {
        FramePipeline::new(PipelineConfig::default(), CountingSink::default()).unwrap()
    }

    #[test]
    fn shutdown_signal_wins_over_queued_frames() {
        let mut pipeline = pipeline();
        let (frame_tx, frame_rx) = bounded(4);
        let (control_tx, control_rx) = unbounded();

        frame_tx
            .send(SensorFrame::Depth(RawDepthFrame::new(1, 1, vec![1, 0])))
            .unwrap();
        control_tx.send(ControlSignal::Shutdown).unwrap();

        let exit = run_pipeline_loop(&mut pipeline, frame_rx, control_rx);
        assert_eq!(exit, LoopExit::Shutdown);
        assert!(pipeline.is_shut_down());
        assert_eq!(pipeline.sink().frames, 0);
    }

    #[test]
    fn closed_channels_end_the_loop() {
        let mut pipeline = pipeline();
        let (frame_tx, frame_rx) = bounded(4);
        let (control_tx, control_rx) = unbounded::<ControlSignal>();

        frame_tx
            .send(SensorFrame::Depth(RawDepthFrame::new(1, 1, vec![1, 0])))
            .unwrap();
        drop(frame_tx);
        drop(control_tx);

        let exit = run_pipeline_loop(&mut pipeline, frame_rx, control_rx);
        assert_eq!(exit, LoopExit::Disconnected);
        assert_eq!(pipeline.sink().frames, 1);
    }

    #[test]
    fn queued_frames_collapse_to_the_newest() {
        let mut pipeline = pipeline();
        let (frame_tx, frame_rx) = bounded(8);
        let (control_tx, control_rx) = unbounded::<ControlSignal>();

        for _ in 0..3 {
            frame_tx
                .send(SensorFrame::Depth(RawDepthFrame::new(1, 1, vec![1, 0])))
                .unwrap();
        }
        frame_tx.send(SensorFrame::Skeletons(Vec::new())).unwrap();
        drop(frame_tx);
        drop(control_tx);

        run_pipeline_loop(&mut pipeline, frame_rx, control_rx);
        assert_eq!(pipeline.sink().frames, 1);
        assert_eq!(pipeline.stats().skeleton_frames, 1);
    }

    #[test]
    fn color_and_depth_frames_are_both_rendered() {
        let mut pipeline = pipeline();
        let (frame_tx, frame_rx) = bounded(4);
        let (control_tx, control_rx) = unbounded::<ControlSignal>();

        frame_tx
            .send(SensorFrame::Color(ColorFrame::blank(4, 3)))
            .unwrap();
        frame_tx
            .send(SensorFrame::Depth(RawDepthFrame::new(1, 1, vec![1, 0])))
            .unwrap();
        drop(frame_tx);
        drop(control_tx);

        run_pipeline_loop(&mut pipeline, frame_rx, control_rx);
        assert_eq!(pipeline.sink().frames, 2);
        assert_eq!(pipeline.stats().color_frames, 1);
        assert_eq!(pipeline.stats().depth_frames, 1);
    }

    #[test]
    fn malformed_frames_do_not_stop_the_loop() {
        let mut pipeline = pipeline();
        let (frame_tx, frame_rx) = bounded(4);
        let (control_tx, control_rx) = unbounded::<ControlSignal>();

        frame_tx
            .send(SensorFrame::Depth(RawDepthFrame::new(2, 2, vec![0; 3])))
            .unwrap();
        drop(frame_tx);
        drop(control_tx);

        assert_eq!(
            run_pipeline_loop(&mut pipeline, frame_rx, control_rx),
            LoopExit::Disconnected
        );
        assert_eq!(pipeline.stats().dropped_depth_frames, 1);
    }
}
