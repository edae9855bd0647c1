use serde::{Deserialize, Serialize};

use crate::types::{
    BYTES_PER_COLOR_PIXEL, Color, ColorFrame, ElementId, JOINT_COUNT, Joint, JointId, Skeleton,
};

/// Bones drawn between joints on the marker overlay.
pub const BONES: &[(JointId, JointId)] = &[
    (JointId::HipCenter, JointId::Spine),
    (JointId::Spine, JointId::ShoulderCenter),
    (JointId::ShoulderCenter, JointId::Head),
    (JointId::ShoulderCenter, JointId::ShoulderLeft),
    (JointId::ShoulderLeft, JointId::ElbowLeft),
    (JointId::ElbowLeft, JointId::WristLeft),
    (JointId::WristLeft, JointId::HandLeft),
    (JointId::ShoulderCenter, JointId::ShoulderRight),
    (JointId::ShoulderRight, JointId::ElbowRight),
    (JointId::ElbowRight, JointId::WristRight),
    (JointId::WristRight, JointId::HandRight),
    (JointId::HipCenter, JointId::HipLeft),
    (JointId::HipLeft, JointId::KneeLeft),
    (JointId::KneeLeft, JointId::AnkleLeft),
    (JointId::AnkleLeft, JointId::FootLeft),
    (JointId::HipCenter, JointId::HipRight),
    (JointId::HipRight, JointId::KneeRight),
    (JointId::KneeRight, JointId::AnkleRight),
    (JointId::AnkleRight, JointId::FootRight),
];

/// Chooses the one skeleton the pipeline follows in a frame.
pub trait PrimarySkeletonPolicy: Send {
    fn select<'a>(&mut self, skeletons: &'a [Skeleton]) -> Option<&'a Skeleton>;
}

/// First fully tracked skeleton in delivery order.
#[derive(Clone, Copy, Debug, Default)]
pub struct FirstTracked;

impl PrimarySkeletonPolicy for FirstTracked {
    fn select<'a>(&mut self, skeletons: &'a [Skeleton]) -> Option<&'a Skeleton> {
        skeletons.iter().find(|s| s.is_tracked())
    }
}

/// Tracked skeleton standing closest to the sensor.
#[derive(Clone, Copy, Debug, Default)]
pub struct Nearest;

impl PrimarySkeletonPolicy for Nearest {
    fn select<'a>(&mut self, skeletons: &'a [Skeleton]) -> Option<&'a Skeleton> {
        skeletons
            .iter()
            .filter(|s| s.is_tracked())
            .min_by(|a, b| a.position().z.total_cmp(&b.position().z))
    }
}

/// Sticks to the slot it followed last, falling back to the first tracked
/// skeleton when that slot disappears.
#[derive(Clone, Copy, Debug, Default)]
pub struct PreviouslyTracked {
    slot: Option<u8>,
}

impl PrimarySkeletonPolicy for PreviouslyTracked {
    fn select<'a>(&mut self, skeletons: &'a [Skeleton]) -> Option<&'a Skeleton> {
        let sticky = self.slot.and_then(|slot| {
            skeletons
                .iter()
                .find(|s| s.slot == slot && s.is_tracked())
        });
        let chosen = sticky.or_else(|| FirstTracked.select(skeletons));
        self.slot = chosen.map(|s| s.slot);
        chosen
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectionPolicy {
    #[default]
    FirstTracked,
    Nearest,
    PreviouslyTracked,
}

impl SelectionPolicy {
    pub fn build(self) -> Box<dyn PrimarySkeletonPolicy> {
        match self {
            SelectionPolicy::FirstTracked => Box::new(FirstTracked),
            SelectionPolicy::Nearest => Box::new(Nearest),
            SelectionPolicy::PreviouslyTracked => Box::new(PreviouslyTracked::default()),
        }
    }
}

/// The tracked hand nearer the sensor drives the cursor; the right hand is
/// used only when strictly nearer. `None` when neither hand is tracked.
pub fn cursor_hand(skeleton: &Skeleton) -> Option<&Joint> {
    let right = skeleton.joint(JointId::HandRight);
    let left = skeleton.joint(JointId::HandLeft);
    match (right.state.is_usable(), left.state.is_usable()) {
        (true, true) if right.position.z < left.position.z => Some(right),
        (true, true) => Some(left),
        (true, false) => Some(right),
        (false, true) => Some(left),
        (false, false) => None,
    }
}

/// Places a UI element on a joint, lifted by `y_offset` pixels.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ElementBinding {
    pub element: ElementId,
    pub joint: JointId,
    #[serde(default)]
    pub y_offset: f32,
}

impl ElementBinding {
    pub fn new(element: impl Into<ElementId>, joint: JointId, y_offset: f32) -> Self {
        Self {
            element: element.into(),
            joint,
            y_offset,
        }
    }

    /// Head, hands and boots, with the boots lifted so they sit on the feet.
    pub fn body_images() -> Vec<ElementBinding> {
        vec![
            ElementBinding::new("head", JointId::Head, 0.0),
            ElementBinding::new("left_hand", JointId::HandLeft, 0.0),
            ElementBinding::new("right_hand", JointId::HandRight, 0.0),
            ElementBinding::new("left_boot", JointId::FootLeft, 50.0),
            ElementBinding::new("right_boot", JointId::FootRight, 50.0),
        ]
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MarkerStyle {
    pub radius: i32,
    pub color: Color,
    pub bone_color: Option<Color>,
    pub bone_thickness: i32,
}

impl Default for MarkerStyle {
    fn default() -> Self {
        Self {
            radius: 6,
            color: Color::BLUE,
            bone_color: None,
            bone_thickness: 3,
        }
    }
}

/// Draws one disc per screen point plus optional bones between them.
/// `points` is indexed by joint; `None` entries are skipped.
pub fn draw_markers(
    canvas: &mut ColorFrame,
    points: &[Option<(f32, f32)>; JOINT_COUNT],
    style: &MarkerStyle,
) {
    if let Some(bone_color) = style.bone_color {
        for &(a, b) in BONES {
            if let (Some(pa), Some(pb)) = (points[a.index()], points[b.index()]) {
                draw_line(canvas, pa, pb, bone_color, style.bone_thickness);
            }
        }
    }

    for &(x, y) in points.iter().flatten() {
        draw_disc(canvas, (x as i32, y as i32), style.radius, style.color);
    }
}

fn draw_line(
    canvas: &mut ColorFrame,
    p0: (f32, f32),
    p1: (f32, f32),
    color: Color,
    thickness: i32,
) {
    let (mut x0, mut y0) = (p0.0 as i32, p0.1 as i32);
    let (x1, y1) = (p1.0 as i32, p1.1 as i32);
    let dx = (x1 - x0).abs();
    let sx = if x0 < x1 { 1 } else { -1 };
    let dy = -(y1 - y0).abs();
    let sy = if y0 < y1 { 1 } else { -1 };
    let mut err = dx + dy;
    let radius = (thickness.max(1) - 1) / 2;

    loop {
        draw_disc(canvas, (x0, y0), radius, color);
        if x0 == x1 && y0 == y1 {
            break;
        }
        let e2 = 2 * err;
        if e2 >= dy {
            err += dy;
            x0 += sx;
        }
        if e2 <= dx {
            err += dx;
            y0 += sy;
        }
    }
}

fn draw_disc(canvas: &mut ColorFrame, center: (i32, i32), radius: i32, color: Color) {
    let (cx, cy) = center;
    for dy in -radius..=radius {
        for dx in -radius..=radius {
            if dx * dx + dy * dy <= radius * radius {
                put_pixel(canvas, cx + dx, cy + dy, color);
            }
        }
    }
}

fn put_pixel(canvas: &mut ColorFrame, x: i32, y: i32, color: Color) {
    if x < 0 || y < 0 || x as u32 >= canvas.width || y as u32 >= canvas.height {
        return;
    }
    let idx = (y as usize * canvas.width as usize + x as usize) * BYTES_PER_COLOR_PIXEL;
    if let Some(px) = canvas.bgra.get_mut(idx..idx + BYTES_PER_COLOR_PIXEL) {
        px.copy_from_slice(&color.to_bgra());
    }
}
