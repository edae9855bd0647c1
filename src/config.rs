use std::{fs, path::Path};

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::{
    error::{PipelineError, Result},
    pipeline::{
        projection::ScreenProjector,
        skeleton::{ElementBinding, MarkerStyle, SelectionPolicy},
        smoothing::SmoothingParameters,
    },
    types::{CursorTarget, ElementId},
};

// About one second of frames at the sensor's 30 fps.
pub const DEFAULT_RESET_AFTER_UNTRACKED_FRAMES: u32 = 30;

// Keeps squared marker radii well inside i32.
pub const MAX_MARKER_EXTENT: i32 = 4096;

/// Everything the frame pipeline needs, loadable from JSON. Missing fields
/// fall back to their defaults.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub smoothing: SmoothingParameters,
    pub reset_after_untracked_frames: u32,
    pub selection: SelectionPolicy,
    pub layout: ScreenProjector,
    pub bindings: Vec<ElementBinding>,
    pub cursor: CursorConfig,
    pub markers: Option<MarkerConfig>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            smoothing: SmoothingParameters::default(),
            reset_after_untracked_frames: DEFAULT_RESET_AFTER_UNTRACKED_FRAMES,
            selection: SelectionPolicy::default(),
            layout: ScreenProjector::default(),
            bindings: ElementBinding::body_images(),
            cursor: CursorConfig::default(),
            markers: None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CursorConfig {
    pub enabled: bool,
    pub element: ElementId,
    pub screen: ScreenProjector,
    pub glyph_width: f32,
    pub glyph_height: f32,
    pub targets: Vec<CursorTarget>,
}

impl Default for CursorConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            element: ElementId::from("hand_cursor"),
            screen: ScreenProjector {
                width: 1920.0,
                height: 1080.0,
                margin_x: 0.0,
                margin_y: 0.0,
                clamp_to_bounds: true,
            },
            glyph_width: 80.0,
            glyph_height: 80.0,
            targets: Vec::new(),
        }
    }
}

/// Overlay canvas on which every joint is drawn as a marker.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MarkerConfig {
    pub width: u32,
    pub height: u32,
    pub style: MarkerStyle,
}

impl Default for MarkerConfig {
    fn default() -> Self {
        Self {
            width: 1024,
            height: 768,
            style: MarkerStyle::default(),
        }
    }
}

impl PipelineConfig {
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: PipelineConfig = serde_json::from_str(json)
            .map_err(|err| PipelineError::Config(format!("invalid config json: {err}")))?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let json = fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        let config = Self::from_json_str(&json)
            .with_context(|| format!("failed to load config {}", path.display()))?;
        log::info!("loaded pipeline config from {}", path.display());
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.smoothing.validate()?;
        self.layout.validate()?;
        if self.cursor.enabled {
            self.cursor.screen.validate()?;
            let (w, h) = (self.cursor.glyph_width, self.cursor.glyph_height);
            if !(w.is_finite() && w >= 0.0 && h.is_finite() && h >= 0.0) {
                return Err(PipelineError::Config(format!(
                    "cursor glyph size must be finite and not negative, got {}x{}",
                    self.cursor.glyph_width, self.cursor.glyph_height
                )));
            }
        }
        if let Some(markers) = &self.markers {
            if markers.width == 0 || markers.height == 0 {
                return Err(PipelineError::Config(format!(
                    "marker canvas must not be empty, got {}x{}",
                    markers.width, markers.height
                )));
            }
            let style = &markers.style;
            let extents = [("radius", style.radius), ("bone_thickness", style.bone_thickness)];
            for (name, value) in extents {
                if !(0..=MAX_MARKER_EXTENT).contains(&value) {
                    return Err(PipelineError::Config(format!(
                        "marker {name} must be within 0..={MAX_MARKER_EXTENT}, got {value}"
                    )));
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{JointId, Rect, TargetId};

    #[test]
    fn defaults_are_valid() {
        let config = PipelineConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.reset_after_untracked_frames, 30);
        assert_eq!(config.bindings.len(), 5);
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let config = PipelineConfig::from_json_str(
            r#"{
                "smoothing": { "max_deviation_radius": 0.99 },
                "selection": "nearest",
                "cursor": {
                    "targets": [
                        { "id": "edward", "bounds": { "left": 90, "top": 90, "width": 20, "height": 20 } }
                    ]
                },
                "bindings": [ { "element": "head", "joint": "Head" } ]
            }"#,
        )
        .unwrap();

        assert_eq!(config.smoothing, SmoothingParameters::joint_markers());
        assert_eq!(config.selection, SelectionPolicy::Nearest);
        assert_eq!(config.cursor.targets[0].id, TargetId::from("edward"));
        assert_eq!(
            config.cursor.targets[0].bounds,
            Rect::new(90.0, 90.0, 20.0, 20.0)
        );
        assert_eq!(config.bindings[0].joint, JointId::Head);
        assert_eq!(config.bindings[0].y_offset, 0.0);
        assert_eq!(config.layout, ScreenProjector::default());
    }

    #[test]
    fn invalid_values_are_rejected() {
        let err = PipelineConfig::from_json_str(r#"{ "smoothing": { "correction": 2.0 } }"#)
            .unwrap_err();
        assert!(matches!(err, PipelineError::Config(_)));

        let err = PipelineConfig::from_json_str(r#"{ "layout": { "width": 0 } }"#).unwrap_err();
        assert!(matches!(err, PipelineError::OutOfRange(_)));

        let err = PipelineConfig::from_json_str("not json").unwrap_err();
        assert!(matches!(err, PipelineError::Config(_)));
    }

    #[test]
    fn marker_and_glyph_sizes_are_bounded() {
        let mut config = PipelineConfig {
            markers: Some(MarkerConfig::default()),
            ..PipelineConfig::default()
        };
        assert!(config.validate().is_ok());

        if let Some(markers) = config.markers.as_mut() {
            markers.style.radius = 50_000;
        }
        assert!(matches!(config.validate(), Err(PipelineError::Config(_))));

        if let Some(markers) = config.markers.as_mut() {
            markers.style.radius = 6;
            markers.style.bone_thickness = -1;
        }
        assert!(config.validate().is_err());

        let mut config = PipelineConfig::default();
        config.cursor.glyph_width = f32::NAN;
        assert!(matches!(config.validate(), Err(PipelineError::Config(_))));
        config.cursor.glyph_width = 80.0;
        config.cursor.glyph_height = f32::INFINITY;
        assert!(config.validate().is_err());
    }

    #[test]
    fn load_reports_missing_files() {
        let err = PipelineConfig::load("/definitely/not/here.json").unwrap_err();
        assert!(format!("{err:#}").contains("failed to read config"));
    }
}
