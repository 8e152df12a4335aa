//! Tracker-space to target-space coordinate conversion.
//!
//! The tracker reports `x`/`y` in webcam pixels (origin top-left) and `z`
//! as a normalized depth estimate. The target skeleton lives in a
//! right-handed world space where `x` is depth, `y` is lateral, and `z`
//! is up. [`to_target_space`] converts one landmark between the two,
//! driven entirely by a [`MappingProfile`]; every calibration constant
//! that previous iterations of this pipeline buried in code is a profile
//! field here.
//!
//! Conversion order: subtract the tracker-space center, scale per tracker
//! axis, then remap tracker axes onto target axes with optional inversion.
//! The function is pure; callers can unit test calibration profiles
//! without a live connection.

use nalgebra::Vector3;
use serde::{Deserialize, Serialize};

use crate::decode::Landmark;

/// One of the three tracker axes, as a remap source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrackerAxis {
    /// Tracker horizontal (pixels, left → right).
    X,
    /// Tracker vertical (pixels, top → bottom).
    Y,
    /// Tracker depth (normalized, toward camera is negative).
    Z,
}

/// Which tracker axis feeds one target axis, and whether to flip it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AxisMap {
    /// Source tracker axis.
    pub source: TrackerAxis,
    /// Negate the scaled source value.
    pub invert: bool,
}

impl AxisMap {
    /// Non-inverting map from `source`.
    pub const fn direct(source: TrackerAxis) -> Self {
        Self { source, invert: false }
    }

    /// Inverting map from `source`.
    pub const fn inverted(source: TrackerAxis) -> Self {
        Self { source, invert: true }
    }
}

/// Immutable calibration record governing coordinate conversion and pose
/// application.
///
/// Never mutated during a session; recalibration swaps the whole profile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MappingProfile {
    /// Tracker-space center, horizontal (pixels).
    pub center_x: f32,
    /// Tracker-space center, vertical (pixels).
    pub center_y: f32,

    /// Scale applied to the centered tracker `x` (world units per pixel).
    pub scale_x: f32,
    /// Scale applied to the centered tracker `y` (world units per pixel).
    pub scale_y: f32,
    /// Scale applied to tracker `z` (world units per normalized depth).
    pub scale_z: f32,

    /// Which scaled tracker axis feeds target `x`.
    pub map_x: AxisMap,
    /// Which scaled tracker axis feeds target `y`.
    pub map_y: AxisMap,
    /// Which scaled tracker axis feeds target `z`.
    pub map_z: AxisMap,

    /// Rotation smoothing factor in [0, 1): slerp alpha per tick at the
    /// reference rate ([`crate::constants::SMOOTHING_REFERENCE_HZ`]).
    pub smoothing: f32,

    /// Latch the first wrist landmark of the session as a reference
    /// position; subsequent positions are expressed relative to it.
    pub latch_reference: bool,
    /// Fixed offset added to every mapped position (hand rest position
    /// relative to the viewpoint).
    pub view_offset: Option<[f32; 3]>,
    /// Negate the left hand's lateral (target `y`) axis.
    pub mirror_left: bool,
}

impl Default for MappingProfile {
    fn default() -> Self {
        // The calibration the working revisions converged on: a 600x580
        // usable webcam region centered at (300, 290), 0.05 world units
        // per pixel, tracker x feeding lateral, tracker y feeding up
        // (flipped: pixel y grows downward), tracker z feeding depth.
        Self {
            center_x: 300.0,
            center_y: 290.0,
            scale_x: 0.05,
            scale_y: 0.05,
            scale_z: 100.0,
            map_x: AxisMap::direct(TrackerAxis::Z),
            map_y: AxisMap::direct(TrackerAxis::X),
            map_z: AxisMap::inverted(TrackerAxis::Y),
            smoothing: 0.25,
            latch_reference: false,
            view_offset: None,
            mirror_left: false,
        }
    }
}

/// Convert one landmark from tracker space to target space.
///
/// Pure and deterministic: identical inputs always yield identical
/// output. A zero scale collapses that axis to the center value; NaN or
/// infinite inputs propagate unchanged (the pose applier rejects
/// non-finite updates before they reach a sink).
pub fn to_target_space(landmark: &Landmark, profile: &MappingProfile) -> Vector3<f32> {
    let scaled = Vector3::new(
        (landmark.x - profile.center_x) * profile.scale_x,
        (landmark.y - profile.center_y) * profile.scale_y,
        landmark.z * profile.scale_z,
    );

    Vector3::new(
        pick(&scaled, profile.map_x),
        pick(&scaled, profile.map_y),
        pick(&scaled, profile.map_z),
    )
}

fn pick(scaled: &Vector3<f32>, map: AxisMap) -> f32 {
    let v = match map.source {
        TrackerAxis::X => scaled.x,
        TrackerAxis::Y => scaled.y,
        TrackerAxis::Z => scaled.z,
    };
    if map.invert {
        -v
    } else {
        v
    }
}

// ─── Tests ─────────────────────────────────────────────────────────────────
