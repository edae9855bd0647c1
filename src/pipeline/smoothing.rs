use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::{
    error::{PipelineError, Result},
    types::{JointId, Position, Skeleton, TrackingState},
};

/// Weights and radii of the double-exponential joint filter.
///
/// `smoothing` is the weight given to the new (jitter-filtered) measurement;
/// the remainder goes to the previous estimate extrapolated by its trend.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SmoothingParameters {
    pub smoothing: f32,
    pub correction: f32,
    pub prediction: f32,
    pub jitter_radius: f32,
    pub max_deviation_radius: f32,
}

impl Default for SmoothingParameters {
    fn default() -> Self {
        Self {
            smoothing: 0.5,
            correction: 0.3,
            prediction: 0.2,
            jitter_radius: 0.2,
            max_deviation_radius: 0.5,
        }
    }
}

impl SmoothingParameters {
    /// Looser deviation clamp used when every joint is drawn as a marker.
    pub fn joint_markers() -> Self {
        Self {
            max_deviation_radius: 0.99,
            ..Self::default()
        }
    }

    /// Parameters that pass raw positions through untouched.
    pub fn passthrough() -> Self {
        Self {
            smoothing: 1.0,
            correction: 0.0,
            prediction: 0.0,
            jitter_radius: 0.0,
            max_deviation_radius: 0.0,
        }
    }

    pub fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("smoothing", self.smoothing),
            ("correction", self.correction),
            ("prediction", self.prediction),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(PipelineError::Config(format!(
                    "{name} must be within [0, 1], got {value}"
                )));
            }
        }
        for (name, value) in [
            ("jitter_radius", self.jitter_radius),
            ("max_deviation_radius", self.max_deviation_radius),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(PipelineError::Config(format!(
                    "{name} must be a non-negative distance, got {value}"
                )));
            }
        }
        Ok(())
    }
}

/// Filter history for one joint.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SmoothingState {
    raw: Position,
    filtered: Position,
    trend: Position,
    output: Position,
    frame_count: u32,
}

impl SmoothingState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Forgets the history; the next sighting seeds the filter again.
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn has_history(&self) -> bool {
        self.frame_count > 0
    }

    pub fn frame_count(&self) -> u32 {
        self.frame_count
    }

    pub fn last_output(&self) -> Option<Position> {
        self.has_history().then_some(self.output)
    }

    pub fn last_raw(&self) -> Option<Position> {
        self.has_history().then_some(self.raw)
    }
}

/// Runs one filter step for `joint` and returns the stabilised position.
///
/// Untracked joints leave `state` alone and repeat the last output (or the
/// raw position when the joint has never been seen).
pub fn update(
    joint: JointId,
    raw: Position,
    tracking: TrackingState,
    params: &SmoothingParameters,
    state: &mut SmoothingState,
) -> Position {
    if !tracking.is_usable() {
        log::trace!("{joint} not tracked, holding last position");
        return state.last_output().unwrap_or(raw);
    }

    if !state.has_history() {
        *state = SmoothingState {
            raw,
            filtered: raw,
            trend: Position::ORIGIN,
            output: raw,
            frame_count: 1,
        };
        return raw;
    }

    let prev_filtered = state.filtered;
    let prev_trend = state.trend;

    let basis = raw.zip_with(prev_filtered, |r, f| {
        if (r - f).abs() < params.jitter_radius {
            f
        } else {
            r
        }
    });

    let blended = basis
        .scale(params.smoothing)
        .add(prev_filtered.add(prev_trend).scale(1.0 - params.smoothing));

    let trend = blended
        .sub(prev_filtered)
        .scale(params.correction)
        .add(prev_trend.scale(1.0 - params.correction));

    let predicted = blended.add(trend.scale(params.prediction));
    let output = clamp_deviation(predicted, raw, params.max_deviation_radius);

    state.raw = raw;
    state.filtered = blended;
    state.trend = trend;
    state.output = output;
    state.frame_count = state.frame_count.saturating_add(1);

    output
}

// Pulls `predicted` back onto the sphere of `radius` around `raw`.
fn clamp_deviation(predicted: Position, raw: Position, radius: f32) -> Position {
    let offset = predicted.sub(raw);
    let distance = offset.length();
    if distance <= radius {
        return predicted;
    }
    if radius <= 0.0 {
        return raw;
    }
    raw.add(offset.scale(radius / distance))
}

/// Owns the per-joint filter history for the primary skeleton.
pub struct JointSmoothingFilter {
    params: SmoothingParameters,
    reset_after_untracked_frames: u32,
    states: HashMap<JointId, SmoothingState>,
    untracked_frames: u32,
    slot: Option<u8>,
}

impl JointSmoothingFilter {
    pub fn new(params: SmoothingParameters, reset_after_untracked_frames: u32) -> Self {
        Self {
            params,
            reset_after_untracked_frames,
            states: HashMap::new(),
            untracked_frames: 0,
            slot: None,
        }
    }

    pub fn params(&self) -> &SmoothingParameters {
        &self.params
    }

    pub fn state(&self, joint: JointId) -> Option<&SmoothingState> {
        self.states.get(&joint)
    }

    pub fn untracked_frames(&self) -> u32 {
        self.untracked_frames
    }

    /// Smooths every joint of `skeleton` in place. A skeleton from a different
    /// slot than the last one starts from fresh history.
    pub fn smooth(&mut self, skeleton: &mut Skeleton) {
        self.untracked_frames = 0;
        if self.slot.is_some_and(|slot| slot != skeleton.slot) {
            log::debug!(
                "primary skeleton moved to slot {}, resetting joint filters",
                skeleton.slot
            );
            self.reset();
        }
        self.slot = Some(skeleton.slot);

        for joint in JointId::ALL {
            let current = *skeleton.joint(joint);
            let state = self.states.entry(joint).or_default();
            let filtered = update(joint, current.position, current.state, &self.params, state);
            skeleton.set_joint(joint, filtered, current.state);
        }
    }

    /// Records a frame without a primary skeleton and applies the reset
    /// policy once the gap exceeds the configured threshold.
    pub fn mark_untracked(&mut self) {
        self.untracked_frames = self.untracked_frames.saturating_add(1);
        if self.untracked_frames == self.reset_after_untracked_frames.saturating_add(1) {
            log::debug!(
                "skeleton lost for {} frames, resetting joint filters",
                self.untracked_frames
            );
            self.reset();
        }
    }

    pub fn reset(&mut self) {
        for state in self.states.values_mut() {
            state.reset();
        }
    }
}
