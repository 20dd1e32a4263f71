//! Host-side driver for the HVC-P2 (B5T-007001) human vision sensor.
//!
//! The sensor detects bodies, hands and faces and estimates facial
//! attributes (direction, age, gender, gaze, blink, expression,
//! recognition) on-device. This crate speaks its binary serial protocol
//! and reconciles the raw per-frame output with an external temporal
//! stabilizer into one identity-tracked result per frame.
//!
//! # Architecture
//!
//! - `wire`: protocol constants: command ids, response codes, the feature
//!   bitmask and setting enums
//! - `transport`: the byte-channel trait plus serial and scripted
//!   implementations
//! - `protocol`: command framing and the send/receive transaction
//! - `result`: the bitmask-driven decoder for raw per-frame results
//! - `stabilizer`: the injected interface to the stabilization engine
//! - `tracking`: the unified tracking result and the raw/stabilized merge
//! - `device`: one method per device command
//! - `session`: per-frame orchestration over one device and one engine
//! - `config`: immutable settings applied at session construction
//!
//! The protocol is half-duplex with a single outstanding request; every
//! call blocks until the transport delivers or times out. A session owns
//! its transport and stabilizer exclusively.

pub mod config;
pub mod device;
pub mod error;
pub mod image;
pub mod protocol;
pub mod result;
pub mod session;
pub mod stabilizer;
pub mod tracking;
pub mod transport;
pub mod wire;

pub use config::{DeviceSettings, SessionConfig};
pub use device::{
    Device, DetectionSizes, DeviceVersion, ExecuteOutcome, FaceAngle, Thresholds,
};
pub use error::{Error, ProtocolFault, Result, StabilizerFault};
pub use image::GrayscaleImage;
pub use result::{DetectionResult, FaceResult, FrameResult};
pub use session::{Capture, Session};
pub use stabilizer::{
    Stabilizer, StabilizerInput, StabilizerSettings, StabilizedFrame, StubStabilizer,
    TrackingStatus,
};
pub use tracking::{TrackedDetection, TrackedFace, TrackingResult};
#[cfg(target_os = "linux")]
pub use transport::TtyTransport;
pub use transport::{ScriptedTransport, Transport};
pub use wire::{
    CameraAngle, CommandId, FeatureFlags, OutputImage, ResponseCode, RollRange, YawRange,
    MAX_DETECTIONS, NOT_TRACKED,
};
