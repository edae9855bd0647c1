use serde::{Deserialize, Serialize};

use crate::{
    error::{PipelineError, Result},
    types::Position,
};

/// Screen-space point with the joint's depth carried through.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ProjectedJoint {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

/// Maps a skeleton-space position (x/y roughly in [-1, 1], y up) into pixel
/// space (y down). Margins shrink the usable range so tracked points stay away
/// from the edges; points outside the frame are returned as-is.
pub fn project(
    position: Position,
    target_width: f32,
    target_height: f32,
    margin_x: f32,
    margin_y: f32,
) -> Result<(f32, f32)> {
    check_dimensions(target_width, target_height)?;

    let half_w = target_width / 2.0;
    let half_h = target_height / 2.0;
    let scale_x = half_w * (1.0 - clamp_margin(margin_x));
    let scale_y = half_h * (1.0 - clamp_margin(margin_y));

    Ok((half_w + position.x * scale_x, half_h - position.y * scale_y))
}

fn check_dimensions(width: f32, height: f32) -> Result<()> {
    if !(width.is_finite() && width > 0.0) || !(height.is_finite() && height > 0.0) {
        return Err(PipelineError::OutOfRange(format!(
            "projection target must be positive, got {width}x{height}"
        )));
    }
    Ok(())
}

fn clamp_margin(margin: f32) -> f32 {
    if margin.is_nan() {
        0.0
    } else {
        margin.clamp(0.0, 1.0)
    }
}

/// Projection target and margins, validated once at construction.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScreenProjector {
    pub width: f32,
    pub height: f32,
    pub margin_x: f32,
    pub margin_y: f32,
    pub clamp_to_bounds: bool,
}

impl Default for ScreenProjector {
    fn default() -> Self {
        Self {
            width: 1024.0,
            height: 768.0,
            margin_x: 0.01,
            margin_y: 0.01,
            clamp_to_bounds: false,
        }
    }
}

impl ScreenProjector {
    pub fn new(width: f32, height: f32, margin_x: f32, margin_y: f32) -> Result<Self> {
        let projector = Self {
            width,
            height,
            margin_x,
            margin_y,
            clamp_to_bounds: false,
        };
        projector.validate()?;
        Ok(projector)
    }

    pub fn with_clamping(mut self, clamp_to_bounds: bool) -> Self {
        self.clamp_to_bounds = clamp_to_bounds;
        self
    }

    pub fn validate(&self) -> Result<()> {
        check_dimensions(self.width, self.height)
    }

    pub fn project(&self, position: Position) -> Result<ProjectedJoint> {
        let (mut x, mut y) = project(
            position,
            self.width,
            self.height,
            self.margin_x,
            self.margin_y,
        )?;
        if self.clamp_to_bounds {
            x = x.clamp(0.0, self.width);
            y = y.clamp(0.0, self.height);
        }
        Ok(ProjectedJoint {
            x,
            y,
            z: position.z,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn origin_lands_in_the_centre() {
        let (x, y) = project(Position::new(0.0, 0.0, 2.0), 640.0, 480.0, 0.0, 0.0).unwrap();
        assert_eq!((x, y), (320.0, 240.0));
    }

    #[test]
    fn unit_extents_reach_the_edges_without_margin() {
        let (x, y) = project(Position::new(1.0, 1.0, 2.0), 640.0, 480.0, 0.0, 0.0).unwrap();
        assert_eq!((x, y), (640.0, 0.0));
        let (x, y) = project(Position::new(-1.0, -1.0, 2.0), 640.0, 480.0, 0.0, 0.0).unwrap();
        assert_eq!((x, y), (0.0, 480.0));
    }

    #[test]
    fn margins_pull_points_inward() {
        let (x, _) = project(Position::new(1.0, 0.0, 2.0), 1000.0, 1000.0, 0.2, 0.0).unwrap();
        assert!((x - 900.0).abs() < 1e-3);
    }

    #[test]
    fn out_of_frame_points_are_not_clamped() {
        let (x, y) = project(Position::new(1.5, -1.5, 2.0), 100.0, 100.0, 0.0, 0.0).unwrap();
        assert!(x > 100.0);
        assert!(y > 100.0);
    }

    #[test]
    fn non_positive_dimensions_fail() {
        for (w, h) in [(0.0, 10.0), (10.0, 0.0), (-5.0, 10.0), (f32::NAN, 10.0)] {
            assert!(matches!(
                project(Position::ORIGIN, w, h, 0.0, 0.0),
                Err(PipelineError::OutOfRange(_))
            ));
        }
        assert!(ScreenProjector::new(0.0, 768.0, 0.0, 0.0).is_err());
    }

    #[test]
    fn x_is_monotonic_in_width() {
        for x in [-1.0f32, -0.5, 0.0, 0.3, 1.0] {
            for margin in [0.0, 0.01, 0.5] {
                let mut last = f32::MIN;
                for width in (1..200).map(|w| w as f32 * 7.5) {
                    let (sx, _) =
                        project(Position::new(x, 0.0, 1.0), width, 100.0, margin, 0.0).unwrap();
                    assert!(sx >= last);
                    last = sx;
                }
            }
        }
    }

    #[test]
    fn projector_carries_depth_and_clamps_on_request() {
        let projector = ScreenProjector::new(200.0, 100.0, 0.0, 0.0)
            .unwrap()
            .with_clamping(true);
        let joint = projector.project(Position::new(2.0, 0.0, 1.7)).unwrap();
        assert_eq!(joint.x, 200.0);
        assert_eq!(joint.z, 1.7);
    }
}
