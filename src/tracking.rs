//! Identity-tracked per-frame results and the raw/stabilized merge.
//!
//! Two result shapes have to reconcile into one: the raw frame result
//! decoded off the wire, and the stabilizer's corrected output. Tracked
//! entries carry the identity pair the engine assigned; the pass-through
//! path (stabilization off, or hand-only execution) synthesizes the same
//! shape directly from the raw result with not-tracked identities.

use serde::{Deserialize, Serialize};

use crate::result::{
    BlinkResult, DetectionResult, DirectionResult, ExpressionResult, FaceResult, FrameResult,
    GazeResult,
};
use crate::stabilizer::{
    InputDetection, InputDirection, InputEstimate, InputFace, StabilizedEstimate, StabilizedFrame,
    StabilizerInput, TrackingStatus,
};
use crate::wire::{FeatureFlags, NOT_TRACKED};

/// A detection plus its identity pair.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackedDetection {
    /// Index of the detection within its category in the current frame.
    pub detection_id: i32,
    /// Persistent identity, or [`NOT_TRACKED`] without a stabilizer.
    pub tracking_id: i32,
    pub detection: DetectionResult,
}

/// A stabilized attribute estimate.
///
/// `status` is `None` on the pass-through path, where the value is the
/// single-frame estimate copied verbatim and there is nothing to
/// accumulate.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackedEstimate {
    pub value: i32,
    pub confidence: i32,
    pub status: Option<TrackingStatus>,
}

/// One face in the unified tracking result.
///
/// Age, gender and recognition pass through the stabilizer and carry a
/// tracking status; direction, gaze, blink and expression are frame-local
/// and always hold the raw values of the current frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackedFace {
    pub detection_id: i32,
    pub tracking_id: i32,
    pub detection: DetectionResult,
    pub direction: Option<DirectionResult>,
    pub age: Option<TrackedEstimate>,
    pub gender: Option<TrackedEstimate>,
    pub gaze: Option<GazeResult>,
    pub blink: Option<BlinkResult>,
    pub expression: Option<ExpressionResult>,
    pub recognition: Option<TrackedEstimate>,
}

/// The unified per-frame tracking result. Rebuilt on every execute call;
/// nothing accumulates here across frames.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackingResult {
    pub faces: Vec<TrackedFace>,
    pub bodies: Vec<TrackedDetection>,
    pub hands: Vec<TrackedDetection>,
}

impl TrackingResult {
    pub fn is_empty(&self) -> bool {
        self.faces.is_empty() && self.bodies.is_empty() && self.hands.is_empty()
    }
}

/// Synthesizes a tracking result from a raw frame with no stabilizer in
/// effect: detection ids are category indices, nothing is tracked, and
/// attribute estimates are copied verbatim without a status.
pub fn from_raw(raw: &FrameResult) -> TrackingResult {
    let untracked = |list: &[DetectionResult]| {
        list.iter()
            .enumerate()
            .map(|(i, det)| TrackedDetection {
                detection_id: i as i32,
                tracking_id: NOT_TRACKED,
                detection: *det,
            })
            .collect()
    };

    TrackingResult {
        bodies: untracked(&raw.bodies),
        hands: untracked(&raw.hands),
        faces: raw
            .faces
            .iter()
            .enumerate()
            .map(|(i, face)| TrackedFace {
                detection_id: i as i32,
                tracking_id: NOT_TRACKED,
                detection: face.detection,
                direction: face.direction,
                age: face.age.map(|age| TrackedEstimate {
                    value: age.age as i32,
                    confidence: age.confidence as i32,
                    status: None,
                }),
                gender: face.gender.map(|gender| TrackedEstimate {
                    value: gender.gender as i32,
                    confidence: gender.confidence as i32,
                    status: None,
                }),
                gaze: face.gaze,
                blink: face.blink,
                expression: face.expression,
                recognition: face.recognition.map(|recognition| TrackedEstimate {
                    value: recognition.user_id as i32,
                    confidence: recognition.score as i32,
                    status: None,
                }),
            })
            .collect(),
    }
}

/// Translates a raw frame into the stabilizer's input shape. Only the
/// subset the engine consumes goes in: geometry for bodies and faces, plus
/// direction, age, gender and recognition per face.
pub fn to_stabilizer_input(raw: &FrameResult) -> StabilizerInput {
    StabilizerInput {
        bodies: raw.bodies.iter().map(input_detection).collect(),
        faces: raw.faces.iter().map(input_face).collect(),
    }
}

fn input_detection(det: &DetectionResult) -> InputDetection {
    InputDetection {
        x: det.x,
        y: det.y,
        size: det.size,
        confidence: det.confidence,
    }
}

fn input_face(face: &FaceResult) -> InputFace {
    InputFace {
        detection: input_detection(&face.detection),
        direction: face.direction.map(|d| InputDirection {
            lr: d.lr as i32,
            ud: d.ud as i32,
            roll: d.roll as i32,
            confidence: d.confidence as i32,
        }),
        age: face.age.map(|a| InputEstimate {
            value: a.age as i32,
            confidence: a.confidence as i32,
        }),
        gender: face.gender.map(|g| InputEstimate {
            value: g.gender as i32,
            confidence: g.confidence as i32,
        }),
        recognition: face.recognition.map(|r| InputEstimate {
            value: r.user_id as i32,
            confidence: r.score as i32,
        }),
    }
}

/// Folds the stabilizer's output back into the unified tracking result.
///
/// Stabilized faces and bodies carry the engine's geometry, identities and
/// per-attribute statuses; the frame-local attributes (direction, gaze,
/// blink, expression) come from the raw face at the same index: detection
/// order, not tracking identity. Hands never enter the engine and are
/// copied through untracked.
pub fn merge_stabilized(
    flags: FeatureFlags,
    raw: &FrameResult,
    stabilized: &StabilizedFrame,
) -> TrackingResult {
    let mut result = TrackingResult {
        faces: Vec::with_capacity(stabilized.faces.len()),
        bodies: stabilized
            .bodies
            .iter()
            .map(|body| TrackedDetection {
                detection_id: body.detection_id,
                tracking_id: body.tracking_id,
                detection: DetectionResult {
                    x: body.x,
                    y: body.y,
                    size: body.size,
                    confidence: body.confidence,
                },
            })
            .collect(),
        hands: raw
            .hands
            .iter()
            .enumerate()
            .map(|(i, det)| TrackedDetection {
                detection_id: i as i32,
                tracking_id: NOT_TRACKED,
                detection: *det,
            })
            .collect(),
    };

    for (i, face) in stabilized.faces.iter().enumerate() {
        let raw_face = raw.faces.get(i);
        let tracked_estimate = |flag: FeatureFlags, est: StabilizedEstimate| {
            flags.contains(flag).then_some(TrackedEstimate {
                value: est.value,
                confidence: est.confidence,
                status: Some(est.status),
            })
        };

        result.faces.push(TrackedFace {
            detection_id: face.detection.detection_id,
            tracking_id: face.detection.tracking_id,
            detection: DetectionResult {
                x: face.detection.x,
                y: face.detection.y,
                size: face.detection.size,
                confidence: face.detection.confidence,
            },
            age: tracked_estimate(FeatureFlags::AGE, face.age),
            gender: tracked_estimate(FeatureFlags::GENDER, face.gender),
            recognition: tracked_estimate(FeatureFlags::RECOGNITION, face.recognition),
            direction: flags
                .contains(FeatureFlags::DIRECTION)
                .then(|| raw_face.and_then(|f| f.direction))
                .flatten(),
            gaze: flags
                .contains(FeatureFlags::GAZE)
                .then(|| raw_face.and_then(|f| f.gaze))
                .flatten(),
            blink: flags
                .contains(FeatureFlags::BLINK)
                .then(|| raw_face.and_then(|f| f.blink))
                .flatten(),
            expression: flags
                .contains(FeatureFlags::EXPRESSION)
                .then(|| raw_face.and_then(|f| f.expression))
                .flatten(),
        });
    }

    result
}
