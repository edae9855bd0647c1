use std::{collections::VecDeque, thread, time::Duration};

use anyhow::Result;

use super::{ControlSignal, SensorEvent, SensorFrame, SensorSource};
use crate::types::{
    BYTES_PER_COLOR_PIXEL, Color, ColorFrame, JointId, Position, RawDepthFrame, RawJoint, Skeleton,
    SkeletonTrackingState, TrackingState,
};

const BACKGROUND_DEPTH_MM: u16 = 3500;
const NEAR_PLAYER_DEPTH_MM: u16 = 1500;
const FAR_PLAYER_DEPTH_MM: u16 = 2500;
const WAVE_RATE: f32 = 0.2;

// Standing pose in metres relative to the sensor, hands filled in per tick.
const BODY: &[(JointId, Position)] = &[
    (JointId::HipCenter, Position::new(0.0, -0.1, 2.0)),
    (JointId::Spine, Position::new(0.0, 0.1, 2.0)),
    (JointId::ShoulderCenter, Position::new(0.0, 0.4, 2.0)),
    (JointId::Head, Position::new(0.0, 0.6, 2.0)),
    (JointId::ShoulderLeft, Position::new(-0.2, 0.35, 2.0)),
    (JointId::ElbowLeft, Position::new(-0.3, 0.1, 2.0)),
    (JointId::WristLeft, Position::new(-0.32, -0.1, 2.0)),
    (JointId::ShoulderRight, Position::new(0.2, 0.35, 2.0)),
    (JointId::ElbowRight, Position::new(0.3, 0.3, 1.8)),
    (JointId::WristRight, Position::new(0.3, 0.3, 1.65)),
    (JointId::HipLeft, Position::new(-0.1, -0.2, 2.0)),
    (JointId::KneeLeft, Position::new(-0.12, -0.6, 2.0)),
    (JointId::AnkleLeft, Position::new(-0.12, -0.95, 2.0)),
    (JointId::FootLeft, Position::new(-0.12, -1.0, 1.95)),
    (JointId::HipRight, Position::new(0.1, -0.2, 2.0)),
    (JointId::KneeRight, Position::new(0.12, -0.6, 2.0)),
    (JointId::AnkleRight, Position::new(0.12, -0.95, 2.0)),
    (JointId::FootRight, Position::new(0.12, -1.0, 1.95)),
];

/// Deterministic stand-in for a depth sensor: one waving player and one
/// bystander, plus periodic click signals.
pub struct SyntheticSensor {
    width: u32,
    height: u32,
    frame_interval: Duration,
    max_ticks: Option<u64>,
    click_every: Option<u64>,
    color_frames: bool,
    tick: u64,
    pending: VecDeque<SensorEvent>,
    finished: bool,
}

impl SyntheticSensor {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            frame_interval: Duration::ZERO,
            max_ticks: None,
            click_every: None,
            color_frames: false,
            tick: 0,
            pending: VecDeque::new(),
            finished: false,
        }
    }

    pub fn with_frame_interval(mut self, interval: Duration) -> Self {
        self.frame_interval = interval;
        self
    }

    /// Sends a shutdown signal after `ticks` ticks.
    pub fn with_ticks(mut self, ticks: u64) -> Self {
        self.max_ticks = Some(ticks);
        self
    }

    pub fn with_click_every(mut self, ticks: u64) -> Self {
        self.click_every = (ticks > 0).then_some(ticks);
        self
    }

    /// Also emits a camera color frame every tick.
    pub fn with_color_frames(mut self) -> Self {
        self.color_frames = true;
        self
    }

    /// Opaque gradient that scrolls one column per tick.
    pub fn color_frame(&self, tick: u64) -> ColorFrame {
        let mut frame = ColorFrame::blank(self.width, self.height);
        let (w, h) = (self.width.max(1) as u64, self.height.max(1) as u64);
        for (i, px) in frame.bgra.chunks_exact_mut(BYTES_PER_COLOR_PIXEL).enumerate() {
            let (x, y) = (i as u64 % w, i as u64 / w);
            let r = ((x + tick) % w * 255 / w) as u8;
            let g = (y * 255 / h) as u8;
            px.copy_from_slice(&Color::rgba(r, g, 96, 255).to_bgra());
        }
        frame
    }

    pub fn depth_frame(&self, tick: u64) -> RawDepthFrame {
        let (w, h) = (self.width as f32, self.height as f32);
        let phase = (tick as f32 * WAVE_RATE).sin();
        let (cx, cy) = (w / 2.0 + w / 4.0 * phase, h / 2.0);
        let radius = h / 6.0;
        let (bx0, bx1) = (w / 8.0, w / 4.0);
        let (by0, by1) = (h / 2.0, h * 0.75);

        let mut samples = Vec::with_capacity(self.width as usize * self.height as usize);
        for y in 0..self.height {
            for x in 0..self.width {
                let (fx, fy) = (x as f32, y as f32);
                let (player, depth) = if (fx - cx).powi(2) + (fy - cy).powi(2) <= radius * radius {
                    (1, NEAR_PLAYER_DEPTH_MM)
                } else if fx >= bx0 && fx < bx1 && fy >= by0 && fy < by1 {
                    (2, FAR_PLAYER_DEPTH_MM)
                } else {
                    (0, BACKGROUND_DEPTH_MM)
                };
                samples.push((depth << 3) | player);
            }
        }
        RawDepthFrame::from_samples(self.width, self.height, &samples)
    }

    pub fn skeletons(&self, tick: u64) -> Vec<Skeleton> {
        let wave = (tick as f32 * WAVE_RATE).sin();
        let hands = [
            (JointId::HandRight, Position::new(0.3 + 0.4 * wave, 0.3, 1.6)),
            (JointId::HandLeft, Position::new(-0.35, -0.15, 2.0)),
        ];
        let raw: Vec<RawJoint> = BODY
            .iter()
            .chain(hands.iter())
            .map(|&(id, position)| RawJoint {
                index: id.index() as u8,
                position,
                state: TrackingState::Tracked,
            })
            .collect();

        vec![
            Skeleton::from_raw_joints(0, SkeletonTrackingState::Tracked, &raw),
            Skeleton::new(1, SkeletonTrackingState::NotTracked),
        ]
    }

    fn queue_tick(&mut self) {
        let tick = self.tick;
        if self.color_frames {
            let color = SensorFrame::Color(self.color_frame(tick));
            self.pending.push_back(SensorEvent::Frame(color));
        }
        let depth = SensorFrame::Depth(self.depth_frame(tick));
        self.pending.push_back(SensorEvent::Frame(depth));
        let skeletons = SensorFrame::Skeletons(self.skeletons(tick));
        self.pending.push_back(SensorEvent::Frame(skeletons));
        if self.click_every.is_some_and(|n| tick > 0 && tick % n == 0) {
            self.pending.push_back(SensorEvent::Control(ControlSignal::Click));
        }
        self.tick += 1;
    }
}

impl SensorSource for SyntheticSensor {
    fn label(&self) -> String {
        format!("synthetic {}x{}", self.width, self.height)
    }

    fn next_event(&mut self) -> Result<Option<SensorEvent>> {
        if let Some(event) = self.pending.pop_front() {
            return Ok(Some(event));
        }
        if self.finished {
            return Ok(None);
        }
        if self.max_ticks.is_some_and(|max| self.tick >= max) {
            self.finished = true;
            return Ok(Some(SensorEvent::Control(ControlSignal::Shutdown)));
        }

        if !self.frame_interval.is_zero() {
            thread::sleep(self.frame_interval);
        }
        self.queue_tick();
        Ok(self.pending.pop_front())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{JOINT_COUNT, player_index};

    fn drain(mut sensor: SyntheticSensor) -> Vec<SensorEvent> {
        let mut events = Vec::new();
        while let Some(event) = sensor.next_event().unwrap() {
            events.push(event);
        }
        events
    }

    #[test]
    fn emits_frames_then_shuts_down() {
        let events = drain(SyntheticSensor::new(16, 12).with_ticks(3));

        let depth = events
            .iter()
            .filter(|e| matches!(e, SensorEvent::Frame(SensorFrame::Depth(_))))
            .count();
        let skeletons = events
            .iter()
            .filter(|e| matches!(e, SensorEvent::Frame(SensorFrame::Skeletons(_))))
            .count();
        assert_eq!((depth, skeletons), (3, 3));
        assert!(matches!(
            events.last(),
            Some(SensorEvent::Control(ControlSignal::Shutdown))
        ));
    }

    #[test]
    fn clicks_arrive_at_the_configured_interval() {
        let events = drain(SyntheticSensor::new(8, 8).with_ticks(7).with_click_every(3));
        let clicks = events
            .iter()
            .filter(|e| matches!(e, SensorEvent::Control(ControlSignal::Click)))
            .count();
        assert_eq!(clicks, 2);
    }

    #[test]
    fn depth_frames_are_valid_and_contain_both_players() {
        let sensor = SyntheticSensor::new(64, 48);
        let frame = sensor.depth_frame(0);
        assert!(frame.validate().is_ok());

        let samples: Vec<u16> = frame
            .data
            .chunks_exact(2)
            .map(|b| u16::from_le_bytes([b[0], b[1]]))
            .collect();
        assert!(samples.iter().any(|&s| player_index(s) == 1));
        assert!(samples.iter().any(|&s| player_index(s) == 2));
        assert_eq!(frame.player_index_at(0, 0), Some(0));
        assert_eq!(frame.depth_at(32, 24), Some(NEAR_PLAYER_DEPTH_MM));
    }

    #[test]
    fn color_frames_are_opt_in_and_opaque() {
        let plain = drain(SyntheticSensor::new(4, 4).with_ticks(2));
        assert!(
            !plain
                .iter()
                .any(|e| matches!(e, SensorEvent::Frame(SensorFrame::Color(_))))
        );

        let sensor = SyntheticSensor::new(6, 4).with_color_frames();
        let frame = sensor.color_frame(3);
        assert!(frame.validate().is_ok());
        assert!(frame.bgra.chunks_exact(4).all(|px| px[3] == 255));
        assert_ne!(frame.bgra, sensor.color_frame(4).bgra);

        let events = drain(sensor.with_ticks(2));
        let colors = events
            .iter()
            .filter(|e| matches!(e, SensorEvent::Frame(SensorFrame::Color(_))))
            .count();
        assert_eq!(colors, 2);
    }

    #[test]
    fn output_is_deterministic() {
        let a = SyntheticSensor::new(20, 10);
        let b = SyntheticSensor::new(20, 10);
        assert_eq!(a.depth_frame(5).data, b.depth_frame(5).data);
        assert_eq!(a.skeletons(5), b.skeletons(5));
    }

    #[test]
    fn primary_skeleton_is_complete_and_waves_its_right_hand() {
        let sensor = SyntheticSensor::new(8, 8);
        let first = sensor.skeletons(0);
        let later = sensor.skeletons(4);

        assert_eq!(first.len(), 2);
        assert!(first[0].is_tracked());
        assert!(!first[1].is_tracked());
        assert_eq!(
            first[0].joints().filter(|j| j.state == TrackingState::Tracked).count(),
            JOINT_COUNT
        );

        let right = |s: &Skeleton| s.joint(JointId::HandRight).position;
        assert!((right(&first[0]).x - 0.3).abs() < 1e-6);
        assert!(right(&later[0]).x > right(&first[0]).x);
        assert!(right(&first[0]).z < first[0].joint(JointId::HandLeft).position.z);
    }
}
