//! Tracking message decoding.
//!
//! Parses one JSON text frame from the tracker into typed landmark records:
//!
//! ```text
//! {"hands":[{"type":"Right","landmarks":[{"id":0,"x":312.0,"y":287.5,"z":-0.04},…]}]}
//! ```
//!
//! The decoder is deliberately lenient where the tracker is sloppy:
//! a missing `hands` field is an empty message, an unrecognized hand type
//! skips that hand with a warning, and a missing `z` defaults to 0 (the
//! tracker sends `z` normalized while `x`/`y` are pixels, and some tracker
//! builds omit it entirely). Only unparsable JSON is an error, and even
//! that is contained to the single frame.

use serde::Deserialize;
use thiserror::Error;

/// Which hand a landmark batch belongs to.
///
/// Decided once at decode time; downstream code never compares strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HandSide {
    /// Left hand.
    Left,
    /// Right hand.
    Right,
}

impl HandSide {
    /// Parse a wire-format hand type, case-insensitively.
    ///
    /// Returns `None` for anything other than "left"/"right".
    pub fn parse(s: &str) -> Option<Self> {
        if s.eq_ignore_ascii_case("left") {
            Some(Self::Left)
        } else if s.eq_ignore_ascii_case("right") {
            Some(Self::Right)
        } else {
            None
        }
    }
}

impl std::fmt::Display for HandSide {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Left => write!(f, "Left"),
            Self::Right => write!(f, "Right"),
        }
    }
}

/// One tracked keypoint on a hand.
///
/// `x`/`y` are tracker pixel coordinates; `z` is the tracker's normalized
/// depth estimate. Ids are sparse; see [`crate::pose::resolve_bone`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Landmark {
    /// Tracker keypoint id.
    pub id: u32,
    /// Horizontal pixel coordinate.
    pub x: f32,
    /// Vertical pixel coordinate.
    pub y: f32,
    /// Normalized depth; 0 when the tracker omits it.
    pub z: f32,
}

/// All landmarks reported for one hand.
#[derive(Debug, Clone, PartialEq)]
pub struct Hand {
    /// Which hand this batch belongs to.
    pub side: HandSide,
    /// Landmark records in tracker order.
    pub landmarks: Vec<Landmark>,
}

/// One decoded tracking message: everything the tracker saw this frame.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TrackingMessage {
    /// Zero, one, or two hands.
    pub hands: Vec<Hand>,
}

impl TrackingMessage {
    /// True when the tracker reported no hands this frame.
    pub fn is_empty(&self) -> bool {
        self.hands.is_empty()
    }
}

/// Decode failure for a single frame. Never fatal to the session.
#[derive(Debug, Error)]
pub enum DecodeError {
    /// The frame was not parsable JSON, or lacked a required field.
    #[error("invalid tracking JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),
}

// ─── Wire representation ───────────────────────────────────────────────────
//
// Raw serde mirror of the tracker output. Kept private so leniency rules
// (side parsing, hand skipping) live in `decode`, not in callers.

#[derive(Deserialize)]
struct WireMessage {
    #[serde(default)]
    hands: Vec<WireHand>,
}

#[derive(Deserialize)]
struct WireHand {
    #[serde(rename = "type")]
    side: String,
    #[serde(default)]
    landmarks: Vec<WireLandmark>,
}

#[derive(Deserialize)]
struct WireLandmark {
    id: u32,
    x: f32,
    y: f32,
    #[serde(default)]
    z: f32,
}

/// Decode one JSON text frame into a [`TrackingMessage`].
///
/// A missing `hands` field yields an empty message. Hands with an
/// unrecognized `type` are skipped with a warning. Landmarks require
/// `id`, `x`, `y`; `z` defaults to 0.
///
/// # Errors
///
/// [`DecodeError::InvalidJson`] when the frame is not parsable or a
/// landmark lacks a required field. The caller discards the frame and
/// the pipeline continues.
pub fn decode(json: &str) -> Result<TrackingMessage, DecodeError> {
    let wire: WireMessage = serde_json::from_str(json)?;

    let mut hands = Vec::with_capacity(wire.hands.len());
    for hand in wire.hands {
        let Some(side) = HandSide::parse(&hand.side) else {
            log::warn!("[decode] skipping hand with unrecognized type {:?}", hand.side);
            continue;
        };
        hands.push(Hand {
            side,
            landmarks: hand
                .landmarks
                .into_iter()
                .map(|l| Landmark { id: l.id, x: l.x, y: l.y, z: l.z })
                .collect(),
        });
    }

    Ok(TrackingMessage { hands })
}

// ─── Tests ─────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_two_hand_message() {
        let json = r#"{"hands":[
            {"type":"Left","landmarks":[{"id":0,"x":100.0,"y":200.0,"z":-0.01}]},
            {"type":"Right","landmarks":[{"id":5,"x":310.5,"y":120.25,"z":0.2}]}
        ]}"#;
        let msg = decode(json).unwrap();
        assert_eq!(msg.hands.len(), 2);
        assert_eq!(msg.hands[0].side, HandSide::Left);
        assert_eq!(msg.hands[1].side, HandSide::Right);
        assert_eq!(msg.hands[1].landmarks[0].id, 5);
        assert_eq!(msg.hands[1].landmarks[0].x, 310.5);
    }

    #[test]
    fn missing_hands_field_is_empty_message() {
        let msg = decode("{}").unwrap();
        assert!(msg.is_empty());
    }

    #[test]
    fn malformed_json_is_invalid_json_error() {
        let err = decode("{not json").unwrap_err();
        assert!(matches!(err, DecodeError::InvalidJson(_)));
    }

    #[test]
    fn missing_required_field_is_invalid_json_error() {
        // Landmark without `x`.
        let json = r#"{"hands":[{"type":"Right","landmarks":[{"id":0,"y":2.0}]}]}"#;
        assert!(matches!(decode(json), Err(DecodeError::InvalidJson(_))));
    }

    #[test]
    fn missing_z_defaults_to_zero() {
        let json = r#"{"hands":[{"type":"Right","landmarks":[{"id":0,"x":1,"y":2}]}]}"#;
        let msg = decode(json).unwrap();
        assert_eq!(msg.hands[0].landmarks[0].z, 0.0);
    }

    #[test]
    fn side_is_case_insensitive() {
        let json = r#"{"hands":[{"type":"rIgHt","landmarks":[]}]}"#;
        let msg = decode(json).unwrap();
        assert_eq!(msg.hands[0].side, HandSide::Right);
    }

    #[test]
    fn unknown_side_skips_hand_not_message() {
        let json = r#"{"hands":[
            {"type":"Both","landmarks":[{"id":0,"x":1,"y":2}]},
            {"type":"Left","landmarks":[{"id":0,"x":3,"y":4}]}
        ]}"#;
        let msg = decode(json).unwrap();
        assert_eq!(msg.hands.len(), 1);
        assert_eq!(msg.hands[0].side, HandSide::Left);
    }

    #[test]
    fn integer_coordinates_decode_as_floats() {
        // The tracker sends x/y as pixel integers.
        let json = r#"{"hands":[{"type":"Left","landmarks":[{"id":9,"x":320,"y":240,"z":0}]}]}"#;
        let msg = decode(json).unwrap();
        assert_eq!(msg.hands[0].landmarks[0].x, 320.0);
    }
}
