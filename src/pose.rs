//! Landmark-to-bone resolution and pose application.
//!
//! [`resolve_bone`] is the fixed lookup from `(landmark id, side)` to a
//! side-qualified skeleton bone. Coverage is intentionally sparse: the
//! wrist plus three joints per finger. Fingertip ids 4, 8, 12, 16 have no
//! bone and resolve to `None`, as does anything outside the known set;
//! unknown landmarks are skipped, never an error.
//!
//! [`PoseApplier`] turns a decoded [`TrackingMessage`] into per-bone
//! updates on a [`PoseSink`]: positions are mapped through the profile
//! and replaced directly; rotations are derived from the wrist→landmark
//! direction and slerped from the previous orientation with a
//! frame-rate-independent factor. Updates with non-finite components
//! never reach the sink.

use std::collections::HashMap;

use nalgebra::{UnitQuaternion, Vector3};

use crate::constants::SMOOTHING_REFERENCE_HZ;
use crate::decode::{HandSide, TrackingMessage};
use crate::mapping::{to_target_space, MappingProfile};

/// Wrist landmark id, the rotation reference point for every other
/// landmark on the same hand.
pub const WRIST_LANDMARK: u32 = 0;

/// A side-qualified skeleton bone identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BoneId(pub &'static str);

impl std::fmt::Display for BoneId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.0)
    }
}

/// Resolve a landmark id and hand side to a skeleton bone.
///
/// Fixed table distilled from the target rig; ids 4, 8, 12, 16 and any
/// id outside the known set return `None` and must be skipped silently.
pub fn resolve_bone(landmark_id: u32, side: HandSide) -> Option<BoneId> {
    let name = match side {
        HandSide::Right => match landmark_id {
            0 => "wrist_inner_r",
            1 => "thumb_01_r",
            2 => "thumb_02_r",
            3 => "thumb_03_r",
            5 => "index_01_r",
            6 => "index_02_r",
            7 => "index_03_r",
            9 => "middle_01_r",
            10 => "middle_02_r",
            11 => "middle_03_r",
            13 => "pinky_01_r",
            14 => "pinky_02_r",
            15 => "pinky_03_r",
            17 => "ring_01_r",
            18 => "ring_02_r",
            19 => "ring_03_r",
            _ => return None,
        },
        HandSide::Left => match landmark_id {
            0 => "wrist_inner_l",
            1 => "thumb_01_l",
            2 => "thumb_02_l",
            3 => "thumb_03_l",
            5 => "index_01_l",
            6 => "index_02_l",
            7 => "index_03_l",
            9 => "middle_01_l",
            10 => "middle_02_l",
            11 => "middle_03_l",
            13 => "pinky_01_l",
            14 => "pinky_02_l",
            15 => "pinky_03_l",
            17 => "ring_01_l",
            18 => "ring_02_l",
            19 => "ring_03_l",
            _ => return None,
        },
    };
    Some(BoneId(name))
}

/// One pose update for one bone. Transient per tick; position is always
/// present, rotation only when a direction could be derived.
#[derive(Debug, Clone, PartialEq)]
pub struct BoneUpdate {
    /// Target bone.
    pub bone: BoneId,
    /// Target-space position.
    pub position: Vector3<f32>,
    /// Smoothed orientation, if any.
    pub rotation: Option<UnitQuaternion<f32>>,
}

/// The boundary to the host's skeletal representation.
///
/// Whatever owns the skeleton (a mesh, a physics rig, a plain transform
/// table) implements this and receives the update stream.
pub trait PoseSink {
    /// Apply one bone update.
    fn apply_bone(&mut self, update: &BoneUpdate);
}

/// One bone's current transform in a [`BoneTable`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoneTransform {
    /// Last applied position.
    pub position: Vector3<f32>,
    /// Last applied rotation (identity until a rotation update arrives).
    pub rotation: UnitQuaternion<f32>,
}

/// In-memory pose sink: an abstract bone-transform table.
///
/// Used by the binary and by tests; hosts with a real skeleton implement
/// [`PoseSink`] themselves.
#[derive(Debug, Default)]
pub struct BoneTable {
    bones: HashMap<BoneId, BoneTransform>,
}

impl BoneTable {
    /// Empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Current transform for `bone`, if it has received an update.
    pub fn get(&self, bone: BoneId) -> Option<&BoneTransform> {
        self.bones.get(&bone)
    }

    /// Number of bones that have received at least one update.
    pub fn len(&self) -> usize {
        self.bones.len()
    }

    /// True when no bone has been updated yet.
    pub fn is_empty(&self) -> bool {
        self.bones.is_empty()
    }

    /// Iterate over all updated bones.
    pub fn iter(&self) -> impl Iterator<Item = (&BoneId, &BoneTransform)> {
        self.bones.iter()
    }
}

impl PoseSink for BoneTable {
    fn apply_bone(&mut self, update: &BoneUpdate) {
        let entry = self.bones.entry(update.bone).or_insert(BoneTransform {
            position: update.position,
            rotation: UnitQuaternion::identity(),
        });
        entry.position = update.position;
        if let Some(rotation) = update.rotation {
            entry.rotation = rotation;
        }
    }
}

/// Applies decoded tracking messages to a pose sink.
///
/// Owns the per-session smoothing state: the latched reference position
/// (when the profile enables it) and each bone's last orientation, so the
/// sink can stay write-only.
#[derive(Debug)]
pub struct PoseApplier {
    profile: MappingProfile,
    reference: Option<Vector3<f32>>,
    rotations: HashMap<BoneId, UnitQuaternion<f32>>,
}

impl PoseApplier {
    /// Create an applier with the given calibration profile.
    pub fn new(profile: MappingProfile) -> Self {
        Self {
            profile,
            reference: None,
            rotations: HashMap::new(),
        }
    }

    /// Swap the calibration profile wholesale and restart the session
    /// state (reference latch, smoothing history).
    pub fn set_profile(&mut self, profile: MappingProfile) {
        self.profile = profile;
        self.reset();
    }

    /// Current profile.
    pub fn profile(&self) -> &MappingProfile {
        &self.profile
    }

    /// Clear per-session state: the latched reference and all smoothing
    /// history. Call on reconnect: a new tracker session means a new
    /// reference frame.
    pub fn reset(&mut self) {
        self.reference = None;
        self.rotations.clear();
    }

    /// Apply one tracking message to `sink`.
    ///
    /// `dt` is the host frame delta in seconds, used to make rotation
    /// smoothing frame-rate independent. Returns the number of bone
    /// updates emitted; landmarks without a bone mapping or with
    /// non-finite results are skipped.
    pub fn apply_message(
        &mut self,
        message: &TrackingMessage,
        dt: f32,
        sink: &mut dyn PoseSink,
    ) -> usize {
        let alpha = smoothing_alpha(self.profile.smoothing, dt);
        let mut applied = 0;

        for hand in &message.hands {
            // The wrist anchors both the reference latch and every other
            // landmark's rotation direction; map it first.
            let wrist = hand
                .landmarks
                .iter()
                .find(|l| l.id == WRIST_LANDMARK)
                .map(|l| to_target_space(l, &self.profile));

            if self.profile.latch_reference && self.reference.is_none() {
                if let Some(w) = wrist.filter(|w| w.iter().all(|c| c.is_finite())) {
                    log::debug!("[pose] latched reference position {w:?}");
                    self.reference = Some(w);
                }
            }

            for landmark in &hand.landmarks {
                let Some(bone) = resolve_bone(landmark.id, hand.side) else {
                    continue;
                };

                let mapped = to_target_space(landmark, &self.profile);
                let position = self.calibrate(mapped, hand.side);
                if !position.iter().all(|c| c.is_finite()) {
                    log::debug!("[pose] dropping non-finite position for {bone}");
                    continue;
                }

                let rotation = if landmark.id == WRIST_LANDMARK {
                    None
                } else {
                    wrist.and_then(|w| {
                        self.smooth_rotation(bone, mapped - w, hand.side, alpha)
                    })
                };

                sink.apply_bone(&BoneUpdate { bone, position, rotation });
                applied += 1;
            }
        }

        applied
    }

    /// Apply the profile's calibration strategies, in order: reference
    /// subtraction, view offset, left-hand mirroring.
    fn calibrate(&self, mapped: Vector3<f32>, side: HandSide) -> Vector3<f32> {
        let mut position = mapped;
        if let Some(reference) = self.reference {
            position -= reference;
        }
        if let Some([x, y, z]) = self.profile.view_offset {
            position += Vector3::new(x, y, z);
        }
        if self.profile.mirror_left && side == HandSide::Left {
            position.y = -position.y;
        }
        position
    }

    /// Slerp the bone's stored orientation toward the direction `dir`
    /// (wrist → landmark, in target space). Returns `None` when the
    /// direction is degenerate or the result is non-finite.
    fn smooth_rotation(
        &mut self,
        bone: BoneId,
        mut dir: Vector3<f32>,
        side: HandSide,
        alpha: f32,
    ) -> Option<UnitQuaternion<f32>> {
        if self.profile.mirror_left && side == HandSide::Left {
            dir.y = -dir.y;
        }
        if !dir.iter().all(|c| c.is_finite()) || dir.norm_squared() < 1e-10 {
            return None;
        }

        // Bones rest along +x in the target rig.
        let rest = Vector3::new(1.0, 0.0, 0.0);
        let target = UnitQuaternion::rotation_between(&rest, &dir.normalize())
            .unwrap_or_else(|| {
                UnitQuaternion::from_axis_angle(&Vector3::z_axis(), std::f32::consts::PI)
            });

        let current = self
            .rotations
            .get(&bone)
            .copied()
            .unwrap_or_else(UnitQuaternion::identity);
        // try_slerp: antipodal orientations have no unique path; snap to
        // the target instead of panicking.
        let smoothed = current.try_slerp(&target, alpha, 1.0e-6).unwrap_or(target);

        if !smoothed.coords.iter().all(|c| c.is_finite()) {
            return None;
        }
        self.rotations.insert(bone, smoothed);
        Some(smoothed)
    }
}

/// Frame-rate-independent slerp factor.
///
/// `smoothing` is the per-tick alpha at the reference rate; this
/// compensates for the actual `dt` so convergence speed does not depend
/// on the host frame rate (`1 - (1 - s)^(rate·dt)`, the exponential-decay
/// form of a constant alpha).
fn smoothing_alpha(smoothing: f32, dt: f32) -> f32 {
    let s = smoothing.clamp(0.0, 1.0);
    if s >= 1.0 {
        return 1.0;
    }
    1.0 - (1.0 - s).powf((dt * SMOOTHING_REFERENCE_HZ).max(0.0))
}

// ─── Tests ─────────────────────────────────────────────────────────────────
