//! Raw per-frame detection results and the Execute body decoder.
//!
//! The Execute response body has no per-field tags: which sub-records are
//! present, and how wide each one is, follows entirely from the feature
//! bitmask that was sent with the command. Decoding walks a cursor through
//! the fixed declared order: bodies, hands, faces, and per face the
//! attribute records in bit order. Decoding with the wrong flags
//! misinterprets every byte after the first divergence, so any mismatch is
//! a protocol fault, never a best-effort recovery.

use serde::{Deserialize, Serialize};

use crate::error::ProtocolFault;
use crate::wire::{FeatureFlags, MAX_DETECTIONS};

/// Position, size and confidence shared by body, hand and face detections.
///
/// Wire values are unsigned 16-bit; the fields are wider so stabilized
/// results (which come back as full integers) fit the same shape.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DetectionResult {
    pub x: i32,
    pub y: i32,
    pub size: i32,
    pub confidence: i32,
}

/// Face pose estimate. Left-right and up-down angles and roll in degrees.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectionResult {
    pub lr: i16,
    pub ud: i16,
    pub roll: i16,
    pub confidence: u16,
}

/// Age estimate in years; [`crate::wire::EST_NOT_POSSIBLE`] when the
/// device could not estimate.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgeResult {
    pub age: i8,
    pub confidence: i16,
}

/// Gender estimate: 0 female, 1 male, or the not-possible sentinel.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenderResult {
    pub gender: i8,
    pub confidence: i16,
}

/// Gaze angles in degrees relative to the face direction.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GazeResult {
    pub lr: i8,
    pub ud: i8,
}

/// Eye openness, per eye, 1-1000 (1 fully open, 1000 fully closed).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlinkResult {
    pub left: i16,
    pub right: i16,
}

/// Five expression scores (summing to 100) plus a negative-positive degree.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpressionResult {
    pub neutral: i8,
    pub happiness: i8,
    pub surprise: i8,
    pub anger: i8,
    pub sadness: i8,
    pub neg_pos: i8,
}

/// Recognition outcome: matched user id (or a sentinel) and match score.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecognitionResult {
    pub user_id: i16,
    pub score: i16,
}

/// One detected face with whatever attribute estimates were requested.
///
/// `None` means the estimator did not run (flag unset), as distinct from an
/// estimate that ran and reported the not-possible sentinel.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FaceResult {
    pub detection: DetectionResult,
    pub direction: Option<DirectionResult>,
    pub age: Option<AgeResult>,
    pub gender: Option<GenderResult>,
    pub gaze: Option<GazeResult>,
    pub blink: Option<BlinkResult>,
    pub expression: Option<ExpressionResult>,
    pub recognition: Option<RecognitionResult>,
}

/// Everything the device detected in one frame, before stabilization.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameResult {
    pub bodies: Vec<DetectionResult>,
    pub hands: Vec<DetectionResult>,
    pub faces: Vec<FaceResult>,
}

struct Cursor<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    fn take(&mut self, n: usize, what: &'static str) -> Result<&'a [u8], ProtocolFault> {
        if self.pos + n > self.buf.len() {
            return Err(ProtocolFault::Malformed(what));
        }
        let slice = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    fn u8(&mut self, what: &'static str) -> Result<u8, ProtocolFault> {
        Ok(self.take(1, what)?[0])
    }

    fn i8(&mut self, what: &'static str) -> Result<i8, ProtocolFault> {
        Ok(self.take(1, what)?[0] as i8)
    }

    fn u16(&mut self, what: &'static str) -> Result<u16, ProtocolFault> {
        let b = self.take(2, what)?;
        Ok(u16::from_le_bytes([b[0], b[1]]))
    }

    fn i16(&mut self, what: &'static str) -> Result<i16, ProtocolFault> {
        let b = self.take(2, what)?;
        Ok(i16::from_le_bytes([b[0], b[1]]))
    }
}

/// Decodes an Execute response body into a [`FrameResult`].
///
/// Returns the result and the number of bytes consumed, which the caller
/// checks against the declared body length (the remainder, if any, is the
/// trailing output image).
pub fn decode(
    flags: FeatureFlags,
    body: &[u8],
) -> Result<(FrameResult, usize), ProtocolFault> {
    let mut cur = Cursor::new(body);
    let body_count = cur.u8("body count")? as usize;
    let hand_count = cur.u8("hand count")? as usize;
    let face_count = cur.u8("face count")? as usize;
    cur.u8("reserved header byte")?;

    for (count, what) in [
        (body_count, "body count"),
        (hand_count, "hand count"),
        (face_count, "face count"),
    ] {
        if count > MAX_DETECTIONS {
            return Err(ProtocolFault::Malformed(what));
        }
    }

    let mut result = FrameResult::default();

    for _ in 0..body_count {
        result.bodies.push(decode_detection(&mut cur, "body record")?);
    }
    for _ in 0..hand_count {
        result.hands.push(decode_detection(&mut cur, "hand record")?);
    }
    for _ in 0..face_count {
        result.faces.push(decode_face(flags, &mut cur)?);
    }

    log::debug!(
        "frame result: {} bodies, {} hands, {} faces ({} bytes)",
        body_count,
        hand_count,
        face_count,
        cur.pos
    );
    Ok((result, cur.pos))
}

fn decode_detection(
    cur: &mut Cursor<'_>,
    what: &'static str,
) -> Result<DetectionResult, ProtocolFault> {
    Ok(DetectionResult {
        x: cur.u16(what)? as i32,
        y: cur.u16(what)? as i32,
        size: cur.u16(what)? as i32,
        confidence: cur.u16(what)? as i32,
    })
}

fn decode_face(flags: FeatureFlags, cur: &mut Cursor<'_>) -> Result<FaceResult, ProtocolFault> {
    let mut face = FaceResult {
        detection: decode_detection(cur, "face record")?,
        ..FaceResult::default()
    };

    // Attribute records follow in bit order. Exactly the bits in `flags`
    // decide presence; no implication is applied at this layer.
    if flags.contains(FeatureFlags::DIRECTION) {
        face.direction = Some(DirectionResult {
            lr: cur.i16("direction record")?,
            ud: cur.i16("direction record")?,
            roll: cur.i16("direction record")?,
            confidence: cur.u16("direction record")?,
        });
    }
    if flags.contains(FeatureFlags::AGE) {
        face.age = Some(AgeResult {
            age: cur.i8("age record")?,
            confidence: cur.i16("age record")?,
        });
    }
    if flags.contains(FeatureFlags::GENDER) {
        face.gender = Some(GenderResult {
            gender: cur.i8("gender record")?,
            confidence: cur.i16("gender record")?,
        });
    }
    if flags.contains(FeatureFlags::GAZE) {
        face.gaze = Some(GazeResult {
            lr: cur.i8("gaze record")?,
            ud: cur.i8("gaze record")?,
        });
    }
    if flags.contains(FeatureFlags::BLINK) {
        face.blink = Some(BlinkResult {
            left: cur.i16("blink record")?,
            right: cur.i16("blink record")?,
        });
    }
    if flags.contains(FeatureFlags::EXPRESSION) {
        face.expression = Some(ExpressionResult {
            neutral: cur.i8("expression record")?,
            happiness: cur.i8("expression record")?,
            surprise: cur.i8("expression record")?,
            anger: cur.i8("expression record")?,
            sadness: cur.i8("expression record")?,
            neg_pos: cur.i8("expression record")?,
        });
    }
    if flags.contains(FeatureFlags::RECOGNITION) {
        face.recognition = Some(RecognitionResult {
            user_id: cur.i16("recognition record")?,
            score: cur.i16("recognition record")?,
        });
    }

    Ok(face)
}
