//! Interface to the external temporal stabilization engine.
//!
//! The engine smooths detection positions and attribute estimates across
//! frames and assigns persistent tracking identities. Its algorithm is not
//! reproduced here, only the input/output schema and the configuration
//! surface it exposes. The native library links as a vendor blob; tests and
//! demos run against [`StubStabilizer`].
//!
//! The engine consumes detection geometry plus the direction, age, gender
//! and recognition estimates. Gaze, blink and expression are frame-local
//! and never enter the engine.

use serde::{Deserialize, Serialize};

use crate::error::StabilizerFault;

/// Engine status for a successful frame.
pub const STB_NORMAL: i32 = 0;

/// Stabilization state of one tracked attribute.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum TrackingStatus {
    /// No usable data accumulated for this track yet.
    NoData,
    /// Accumulating; the value may still change.
    Calculating,
    /// Enough frames accumulated; the value is stable.
    Complete,
    /// The value is pinned for the lifetime of the track.
    Fixed,
}

impl TrackingStatus {
    pub fn from_i32(value: i32) -> Option<Self> {
        match value {
            -1 => Some(TrackingStatus::NoData),
            0 => Some(TrackingStatus::Calculating),
            1 => Some(TrackingStatus::Complete),
            2 => Some(TrackingStatus::Fixed),
            _ => None,
        }
    }

    pub fn as_i32(self) -> i32 {
        match self {
            TrackingStatus::NoData => -1,
            TrackingStatus::Calculating => 0,
            TrackingStatus::Complete => 1,
            TrackingStatus::Fixed => 2,
        }
    }
}

/// Detection geometry fed to the engine.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct InputDetection {
    pub x: i32,
    pub y: i32,
    pub size: i32,
    pub confidence: i32,
}

/// Face pose fed to the engine; it gates attribute accumulation on angle.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct InputDirection {
    pub lr: i32,
    pub ud: i32,
    pub roll: i32,
    pub confidence: i32,
}

/// A single-frame estimate (age, gender or recognition) fed to the engine.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct InputEstimate {
    pub value: i32,
    pub confidence: i32,
}

/// One raw face in the engine's input shape.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct InputFace {
    pub detection: InputDetection,
    pub direction: Option<InputDirection>,
    pub age: Option<InputEstimate>,
    pub gender: Option<InputEstimate>,
    pub recognition: Option<InputEstimate>,
}

/// One frame of raw detections in the engine's input shape.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct StabilizerInput {
    pub bodies: Vec<InputDetection>,
    pub faces: Vec<InputFace>,
}

/// Smoothed detection with its identity pair.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StabilizedDetection {
    /// Index of the source detection within the current frame.
    pub detection_id: i32,
    /// Persistent identity across frames.
    pub tracking_id: i32,
    pub x: i32,
    pub y: i32,
    pub size: i32,
    pub confidence: i32,
}

/// Stabilized attribute value with its accumulation status.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StabilizedEstimate {
    pub status: TrackingStatus,
    pub value: i32,
    pub confidence: i32,
}

impl Default for StabilizedEstimate {
    fn default() -> Self {
        Self {
            status: TrackingStatus::NoData,
            value: 0,
            confidence: 0,
        }
    }
}

/// One stabilized face. The engine always reports all three estimate
/// slots; the merge layer attaches only the requested ones.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StabilizedFace {
    pub detection: StabilizedDetection,
    pub age: StabilizedEstimate,
    pub gender: StabilizedEstimate,
    pub recognition: StabilizedEstimate,
}

/// Engine output for one frame.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct StabilizedFrame {
    pub faces: Vec<StabilizedFace>,
    pub bodies: Vec<StabilizedDetection>,
}

/// Up-down / left-right angle gate for attribute accumulation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AngleGate {
    pub min_ud: i32,
    pub max_ud: i32,
    pub min_lr: i32,
    pub max_lr: i32,
}

impl Default for AngleGate {
    fn default() -> Self {
        Self {
            min_ud: -15,
            max_ud: 20,
            min_lr: -30,
            max_lr: 30,
        }
    }
}

/// Engine configuration. Applied in one call at session construction.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StabilizerSettings {
    /// Frames a lost track survives before it is dropped. 0-300.
    pub retry_count: i32,
    /// Position steadiness: ignore positional jitter below this percentage. 0-100.
    pub pos_steadiness: i32,
    /// Size steadiness: ignore size jitter below this percentage. 0-100.
    pub size_steadiness: i32,
    /// Direction-confidence floor for age/gender accumulation. 0-1000.
    pub estimation_threshold: i32,
    /// Angle gate for age/gender accumulation.
    pub estimation_angle: AngleGate,
    /// Frames needed before an age/gender result is complete. 1-20.
    pub estimation_frame_count: i32,
    /// Direction-confidence floor for recognition accumulation. 0-1000.
    pub recognition_threshold: i32,
    /// Angle gate for recognition accumulation.
    pub recognition_angle: AngleGate,
    /// Frames needed before a recognition result is complete. 0-20.
    pub recognition_frame_count: i32,
    /// Minimum share of frames the winning identity must hold. 0-100.
    pub recognition_min_ratio: i32,
}

impl Default for StabilizerSettings {
    fn default() -> Self {
        Self {
            retry_count: 2,
            pos_steadiness: 30,
            size_steadiness: 30,
            estimation_threshold: 300,
            estimation_angle: AngleGate::default(),
            estimation_frame_count: 5,
            recognition_threshold: 300,
            recognition_angle: AngleGate::default(),
            recognition_frame_count: 5,
            recognition_min_ratio: 60,
        }
    }
}

/// The temporal stabilization engine.
///
/// An implementation holds cross-frame state (track identities,
/// accumulation windows) and is exclusively owned by one session. Feeding
/// it the same frame twice advances that state twice; `execute` exposes
/// the engine's statefulness rather than hiding it.
pub trait Stabilizer {
    /// Feeds one frame of raw detections and returns the stabilized frame.
    fn execute(&mut self, input: &StabilizerInput) -> Result<StabilizedFrame, StabilizerFault>;

    /// Drops all tracking state. Settings are retained.
    fn clear(&mut self) -> Result<(), StabilizerFault>;

    /// Engine version as (major, minor).
    fn version(&self) -> Result<(u8, u8), StabilizerFault>;

    /// Replaces the engine configuration.
    fn apply_settings(&mut self, settings: &StabilizerSettings) -> Result<(), StabilizerFault>;

    /// Reads back the active configuration.
    fn settings(&self) -> Result<StabilizerSettings, StabilizerFault>;
}

/// Stub engine for testing. Echoes detections and keeps index-stable
/// tracking identities; no smoothing happens.
pub struct StubStabilizer {
    settings: StabilizerSettings,
    face_tracks: Vec<i32>,
    body_tracks: Vec<i32>,
    next_track: i32,
}

impl StubStabilizer {
    pub fn new() -> Self {
        Self {
            settings: StabilizerSettings::default(),
            face_tracks: Vec::new(),
            body_tracks: Vec::new(),
            next_track: 0,
        }
    }

    fn track_id(tracks: &mut Vec<i32>, next: &mut i32, index: usize) -> i32 {
        while tracks.len() <= index {
            tracks.push(*next);
            *next += 1;
        }
        tracks[index]
    }

    fn stabilize_estimate(input: Option<InputEstimate>) -> StabilizedEstimate {
        match input {
            Some(est) => StabilizedEstimate {
                status: TrackingStatus::Calculating,
                value: est.value,
                confidence: est.confidence,
            },
            None => StabilizedEstimate::default(),
        }
    }
}

impl Default for StubStabilizer {
    fn default() -> Self {
        Self::new()
    }
}

impl Stabilizer for StubStabilizer {
    fn execute(&mut self, input: &StabilizerInput) -> Result<StabilizedFrame, StabilizerFault> {
        let mut frame = StabilizedFrame::default();
        for (i, face) in input.faces.iter().enumerate() {
            let tracking_id = Self::track_id(&mut self.face_tracks, &mut self.next_track, i);
            frame.faces.push(StabilizedFace {
                detection: StabilizedDetection {
                    detection_id: i as i32,
                    tracking_id,
                    x: face.detection.x,
                    y: face.detection.y,
                    size: face.detection.size,
                    confidence: face.detection.confidence,
                },
                age: Self::stabilize_estimate(face.age),
                gender: Self::stabilize_estimate(face.gender),
                recognition: Self::stabilize_estimate(face.recognition),
            });
        }
        for (i, body) in input.bodies.iter().enumerate() {
            let tracking_id = Self::track_id(&mut self.body_tracks, &mut self.next_track, i);
            frame.bodies.push(StabilizedDetection {
                detection_id: i as i32,
                tracking_id,
                x: body.x,
                y: body.y,
                size: body.size,
                confidence: body.confidence,
            });
        }
        Ok(frame)
    }

    fn clear(&mut self) -> Result<(), StabilizerFault> {
        self.face_tracks.clear();
        self.body_tracks.clear();
        self.next_track = 0;
        Ok(())
    }

    fn version(&self) -> Result<(u8, u8), StabilizerFault> {
        Ok((1, 0))
    }

    fn apply_settings(&mut self, settings: &StabilizerSettings) -> Result<(), StabilizerFault> {
        self.settings = *settings;
        Ok(())
    }

    fn settings(&self) -> Result<StabilizerSettings, StabilizerFault> {
        Ok(self.settings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tracking_status_round_trips() {
        for status in [
            TrackingStatus::NoData,
            TrackingStatus::Calculating,
            TrackingStatus::Complete,
            TrackingStatus::Fixed,
        ] {
            assert_eq!(TrackingStatus::from_i32(status.as_i32()), Some(status));
        }
        assert_eq!(TrackingStatus::from_i32(5), None);
    }

    #[test]
    fn stub_keeps_identities_across_frames() {
        let mut stb = StubStabilizer::new();
        let input = StabilizerInput {
            bodies: vec![InputDetection::default()],
            faces: vec![InputFace::default()],
        };

        let first = stb.execute(&input).unwrap();
        let second = stb.execute(&input).unwrap();
        assert_eq!(
            first.faces[0].detection.tracking_id,
            second.faces[0].detection.tracking_id
        );
        assert_eq!(
            first.bodies[0].detection_id,
            second.bodies[0].detection_id
        );

        stb.clear().unwrap();
        let third = stb.execute(&input).unwrap();
        assert_eq!(third.faces[0].detection.tracking_id, 0);
    }

    #[test]
    fn stub_reports_missing_estimates_as_no_data() {
        let mut stb = StubStabilizer::new();
        let input = StabilizerInput {
            bodies: Vec::new(),
            faces: vec![InputFace {
                age: Some(InputEstimate { value: 28, confidence: 500 }),
                ..InputFace::default()
            }],
        };
        let frame = stb.execute(&input).unwrap();
        assert_eq!(frame.faces[0].age.status, TrackingStatus::Calculating);
        assert_eq!(frame.faces[0].age.value, 28);
        assert_eq!(frame.faces[0].gender.status, TrackingStatus::NoData);
    }
}
