use std::fmt;

use image::RgbaImage;
use serde::{Deserialize, Serialize};

use crate::error::{PipelineError, Result};

/// Packed depth frame as delivered by the sensor runtime.
///
/// Every pixel is a little-endian 16-bit sample: the low 3 bits carry the
/// player index, the remaining 13 bits the distance in millimetres.
#[derive(Clone, Debug)]
pub struct RawDepthFrame {
    pub width: u32,
    pub height: u32,
    pub data: Vec<u8>,
}

pub const BYTES_PER_DEPTH_SAMPLE: usize = 2;
pub const BYTES_PER_COLOR_PIXEL: usize = 4;

impl RawDepthFrame {
    pub fn new(width: u32, height: u32, data: Vec<u8>) -> Self {
        Self {
            width,
            height,
            data,
        }
    }

    /// Builds a frame from 16-bit samples (player index in the low 3 bits).
    pub fn from_samples(width: u32, height: u32, samples: &[u16]) -> Self {
        let data = samples.iter().flat_map(|s| s.to_le_bytes()).collect();
        Self::new(width, height, data)
    }

    pub fn pixel_count(&self) -> usize {
        self.width as usize * self.height as usize
    }

    pub fn validate(&self) -> Result<()> {
        if self.width == 0 || self.height == 0 {
            return Err(PipelineError::InvalidFrame(format!(
                "empty dimensions {}x{}",
                self.width, self.height
            )));
        }
        let expected_len = self.pixel_count() * BYTES_PER_DEPTH_SAMPLE;
        if self.data.len() != expected_len {
            return Err(PipelineError::InvalidFrame(format!(
                "depth buffer size mismatch: got {}, expected {}",
                self.data.len(),
                expected_len
            )));
        }
        Ok(())
    }

    fn sample_at(&self, x: u32, y: u32) -> Option<u16> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let idx = (y as usize * self.width as usize + x as usize) * BYTES_PER_DEPTH_SAMPLE;
        let bytes = self.data.get(idx..idx + BYTES_PER_DEPTH_SAMPLE)?;
        Some(u16::from_le_bytes([bytes[0], bytes[1]]))
    }

    pub fn player_index_at(&self, x: u32, y: u32) -> Option<u8> {
        self.sample_at(x, y).map(player_index)
    }

    pub fn depth_at(&self, x: u32, y: u32) -> Option<u16> {
        self.sample_at(x, y).map(depth_millimetres)
    }
}

pub fn player_index(sample: u16) -> u8 {
    (sample & 0x07) as u8
}

pub fn depth_millimetres(sample: u16) -> u16 {
    sample >> 3
}

/// Decoded frame ready for a render sink, stored as B, G, R, A bytes.
#[derive(Clone, Debug, PartialEq)]
pub struct ColorFrame {
    pub width: u32,
    pub height: u32,
    pub bgra: Vec<u8>,
}

impl ColorFrame {
    /// Fully transparent canvas.
    pub fn blank(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            bgra: vec![0u8; width as usize * height as usize * BYTES_PER_COLOR_PIXEL],
        }
    }

    pub fn validate(&self) -> Result<()> {
        let expected_len = self.width as usize * self.height as usize * BYTES_PER_COLOR_PIXEL;
        if self.width == 0 || self.height == 0 || self.bgra.len() != expected_len {
            return Err(PipelineError::InvalidFrame(format!(
                "color buffer of {} bytes does not fit {}x{}",
                self.bgra.len(),
                self.width,
                self.height
            )));
        }
        Ok(())
    }

    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let idx = (y as usize * self.width as usize + x as usize) * BYTES_PER_COLOR_PIXEL;
        let px = self.bgra.get(idx..idx + BYTES_PER_COLOR_PIXEL)?;
        Some([px[0], px[1], px[2], px[3]])
    }

    /// Pixel as a color, undoing the B, G, R, A byte order.
    pub fn color_at(&self, x: u32, y: u32) -> Option<Color> {
        self.pixel(x, y).map(Color::from_bgra)
    }

    pub fn to_rgba_image(&self) -> Option<RgbaImage> {
        let mut rgba = self.bgra.clone();
        for px in rgba.chunks_exact_mut(BYTES_PER_COLOR_PIXEL) {
            px.swap(0, 2);
        }
        RgbaImage::from_raw(self.width, self.height, rgba)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Color {
    pub const TRANSPARENT: Color = Color::rgba(0, 0, 0, 0);
    pub const RED: Color = Color::rgba(255, 0, 0, 255);
    pub const GREEN: Color = Color::rgba(0, 128, 0, 255);
    pub const BLUE: Color = Color::rgba(0, 0, 255, 255);
    pub const WHITE: Color = Color::rgba(255, 255, 255, 255);
    pub const GOLD: Color = Color::rgba(255, 215, 0, 255);
    pub const CYAN: Color = Color::rgba(0, 255, 255, 255);
    pub const PLUM: Color = Color::rgba(221, 160, 221, 255);
    pub const HOT_PINK: Color = Color::rgba(255, 105, 180, 255);

    pub const fn rgba(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    pub const fn to_bgra(self) -> [u8; 4] {
        [self.b, self.g, self.r, self.a]
    }

    pub const fn from_bgra(px: [u8; 4]) -> Self {
        Self::rgba(px[2], px[1], px[0], px[3])
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Position {
    pub const ORIGIN: Position = Position::new(0.0, 0.0, 0.0);

    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    pub fn add(self, other: Position) -> Position {
        Position::new(self.x + other.x, self.y + other.y, self.z + other.z)
    }

    pub fn sub(self, other: Position) -> Position {
        Position::new(self.x - other.x, self.y - other.y, self.z - other.z)
    }

    pub fn scale(self, factor: f32) -> Position {
        Position::new(self.x * factor, self.y * factor, self.z * factor)
    }

    pub fn length(self) -> f32 {
        (self.x * self.x + self.y * self.y + self.z * self.z).sqrt()
    }

    pub fn distance(self, other: Position) -> f32 {
        self.sub(other).length()
    }

    /// Applies `f` to each axis pair independently.
    pub fn zip_with(self, other: Position, f: impl Fn(f32, f32) -> f32) -> Position {
        Position::new(f(self.x, other.x), f(self.y, other.y), f(self.z, other.z))
    }
}

pub const JOINT_COUNT: usize = 20;

/// Body joints in the sensor's index order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum JointId {
    HipCenter,
    Spine,
    ShoulderCenter,
    Head,
    ShoulderLeft,
    ElbowLeft,
    WristLeft,
    HandLeft,
    ShoulderRight,
    ElbowRight,
    WristRight,
    HandRight,
    HipLeft,
    KneeLeft,
    AnkleLeft,
    FootLeft,
    HipRight,
    KneeRight,
    AnkleRight,
    FootRight,
}

impl JointId {
    pub const ALL: [JointId; JOINT_COUNT] = [
        JointId::HipCenter,
        JointId::Spine,
        JointId::ShoulderCenter,
        JointId::Head,
        JointId::ShoulderLeft,
        JointId::ElbowLeft,
        JointId::WristLeft,
        JointId::HandLeft,
        JointId::ShoulderRight,
        JointId::ElbowRight,
        JointId::WristRight,
        JointId::HandRight,
        JointId::HipLeft,
        JointId::KneeLeft,
        JointId::AnkleLeft,
        JointId::FootLeft,
        JointId::HipRight,
        JointId::KneeRight,
        JointId::AnkleRight,
        JointId::FootRight,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn label(&self) -> &'static str {
        match self {
            JointId::HipCenter => "hip_center",
            JointId::Spine => "spine",
            JointId::ShoulderCenter => "shoulder_center",
            JointId::Head => "head",
            JointId::ShoulderLeft => "shoulder_left",
            JointId::ElbowLeft => "elbow_left",
            JointId::WristLeft => "wrist_left",
            JointId::HandLeft => "hand_left",
            JointId::ShoulderRight => "shoulder_right",
            JointId::ElbowRight => "elbow_right",
            JointId::WristRight => "wrist_right",
            JointId::HandRight => "hand_right",
            JointId::HipLeft => "hip_left",
            JointId::KneeLeft => "knee_left",
            JointId::AnkleLeft => "ankle_left",
            JointId::FootLeft => "foot_left",
            JointId::HipRight => "hip_right",
            JointId::KneeRight => "knee_right",
            JointId::AnkleRight => "ankle_right",
            JointId::FootRight => "foot_right",
        }
    }
}

impl TryFrom<u8> for JointId {
    type Error = PipelineError;

    fn try_from(index: u8) -> Result<Self> {
        JointId::ALL
            .get(index as usize)
            .copied()
            .ok_or(PipelineError::UnknownJoint(index))
    }
}

impl fmt::Display for JointId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TrackingState {
    Tracked,
    Inferred,
    NotTracked,
}

impl TrackingState {
    /// Inferred joints still feed the smoothing filter.
    pub fn is_usable(self) -> bool {
        !matches!(self, TrackingState::NotTracked)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SkeletonTrackingState {
    Tracked,
    PositionOnly,
    NotTracked,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Joint {
    pub id: JointId,
    pub position: Position,
    pub state: TrackingState,
}

impl Joint {
    pub fn new(id: JointId, position: Position, state: TrackingState) -> Self {
        Self {
            id,
            position,
            state,
        }
    }

    pub fn untracked(id: JointId) -> Self {
        Self::new(id, Position::ORIGIN, TrackingState::NotTracked)
    }
}

/// Joint record as reported by the skeleton tracker, before validation.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RawJoint {
    pub index: u8,
    pub position: Position,
    pub state: TrackingState,
}

/// One tracked body. Always holds the full joint set; joints the tracker did
/// not report stay `NotTracked` at the origin.
#[derive(Clone, Debug, PartialEq)]
pub struct Skeleton {
    pub slot: u8,
    pub tracking_state: SkeletonTrackingState,
    joints: [Joint; JOINT_COUNT],
}

impl Skeleton {
    pub fn new(slot: u8, tracking_state: SkeletonTrackingState) -> Self {
        Self {
            slot,
            tracking_state,
            joints: JointId::ALL.map(Joint::untracked),
        }
    }

    /// Unknown joint indices are logged and skipped; the rest of the skeleton
    /// is kept.
    pub fn from_raw_joints(
        slot: u8,
        tracking_state: SkeletonTrackingState,
        raw_joints: &[RawJoint],
    ) -> Self {
        let mut skeleton = Self::new(slot, tracking_state);
        for raw in raw_joints {
            match JointId::try_from(raw.index) {
                Ok(id) => skeleton.set_joint(id, raw.position, raw.state),
                Err(err) => log::warn!("skeleton slot {slot}: skipping joint: {err}"),
            }
        }
        skeleton
    }

    pub fn is_tracked(&self) -> bool {
        self.tracking_state == SkeletonTrackingState::Tracked
    }

    pub fn joint(&self, id: JointId) -> &Joint {
        &self.joints[id.index()]
    }

    pub fn set_joint(&mut self, id: JointId, position: Position, state: TrackingState) {
        self.joints[id.index()] = Joint::new(id, position, state);
    }

    pub fn joints(&self) -> impl Iterator<Item = &Joint> {
        self.joints.iter()
    }

    /// Root position of the body, used for distance-based selection.
    pub fn position(&self) -> Position {
        self.joint(JointId::HipCenter).position
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    pub left: f32,
    pub top: f32,
    pub width: f32,
    pub height: f32,
}

impl Rect {
    pub fn new(left: f32, top: f32, width: f32, height: f32) -> Self {
        Self {
            left,
            top,
            width,
            height,
        }
    }

    pub fn from_corners(x1: f32, y1: f32, x2: f32, y2: f32) -> Self {
        Self::new(x1.min(x2), y1.min(y2), (x2 - x1).abs(), (y2 - y1).abs())
    }

    pub fn right(&self) -> f32 {
        self.left + self.width
    }

    pub fn bottom(&self) -> f32 {
        self.top + self.height
    }

    /// Strict containment: points on the border are outside.
    pub fn contains_strict(&self, x: f32, y: f32) -> bool {
        x > self.left && x < self.right() && y > self.top && y < self.bottom()
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TargetId(pub String);

impl From<&str> for TargetId {
    fn from(value: &str) -> Self {
        TargetId(value.to_string())
    }
}

impl fmt::Display for TargetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CursorTarget {
    pub id: TargetId,
    pub bounds: Rect,
}

impl CursorTarget {
    pub fn new(id: impl Into<TargetId>, bounds: Rect) -> Self {
        Self {
            id: id.into(),
            bounds,
        }
    }
}

/// Identifier of an on-screen element positioned by the pipeline.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ElementId(pub String);

impl From<&str> for ElementId {
    fn from(value: &str) -> Self {
        ElementId(value.to_string())
    }
}

impl fmt::Display for ElementId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
