//! Orchestration: one device, one feature set, at most one stabilizer.
//!
//! A session pins the feature bitmask at construction, applies the device
//! and engine settings from the configuration, and drives the per-frame
//! cycle: execute on the device, decode, then merge through the stabilizer
//! or pass the raw result through untracked.

use crate::config::SessionConfig;
use crate::device::{Device, ExecuteOutcome};
use crate::error::{Result, StabilizerFault};
use crate::image::GrayscaleImage;
use crate::stabilizer::{Stabilizer, STB_NORMAL};
use crate::tracking::{self, TrackingResult};
use crate::transport::Transport;
use crate::wire::{FeatureFlags, OutputImage, ResponseCode};

/// Result of one frame cycle.
///
/// `response` and `stabilizer_status` travel together: a device error
/// leaves the tracking result empty, and a negative stabilizer status
/// means the engine refused the frame; no partial result is synthesized.
#[derive(Clone, Debug)]
pub struct Capture {
    pub response: ResponseCode,
    /// Engine status for this frame; [`STB_NORMAL`] when stabilization is
    /// off or succeeded, the engine's negative code when it failed.
    pub stabilizer_status: i32,
    pub tracking: TrackingResult,
    pub image: Option<GrayscaleImage>,
}

/// An exclusive session with one sensor.
pub struct Session<T: Transport> {
    device: Device<T>,
    flags: FeatureFlags,
    stabilizer: Option<Box<dyn Stabilizer>>,
}

impl<T: Transport> Session<T> {
    /// Builds a session over a connected device and applies the settings.
    ///
    /// The feature set is normalized (attribute estimators pull in
    /// Face|Direction). Hand-only execution drops the stabilizer outright:
    /// the engine has no hand model, so there is nothing for it to track.
    /// Other face-less feature sets keep the engine; body tracking still
    /// applies.
    pub fn open(
        device: Device<T>,
        features: FeatureFlags,
        stabilizer: Option<Box<dyn Stabilizer>>,
        config: &SessionConfig,
    ) -> Result<Self> {
        let flags = features.normalized();
        if flags != features {
            log::debug!(
                "feature set normalized from {:#06x} to {:#06x}",
                features.bits(),
                flags.bits()
            );
        }

        let stabilizer = if flags == FeatureFlags::HAND && stabilizer.is_some() {
            log::info!("hand-only execution: stabilization disabled");
            None
        } else {
            stabilizer
        };

        let mut session = Self {
            device,
            flags,
            stabilizer,
        };
        session.apply_config(config)?;
        Ok(session)
    }

    fn apply_config(&mut self, config: &SessionConfig) -> Result<()> {
        self.device.set_camera_angle(config.device.camera_angle)?;
        self.device.set_threshold(&config.device.thresholds)?;
        self.device.set_detection_size(&config.device.detection_sizes)?;
        self.device.set_face_angle(config.device.face_angle)?;
        if let Some(stb) = self.stabilizer.as_mut() {
            stb.apply_settings(&config.stabilizer)?;
        }
        Ok(())
    }

    /// Runs one frame cycle and returns the unified tracking result.
    pub fn execute(&mut self, image: OutputImage) -> Result<Capture> {
        let ExecuteOutcome {
            code,
            frame,
            image: out_image,
        } = self.device.execute(self.flags, image)?;

        if !code.is_normal() {
            // No body, no frame. The engine is not fed a phantom empty
            // frame; its cross-frame state stays where it was.
            return Ok(Capture {
                response: code,
                stabilizer_status: STB_NORMAL,
                tracking: TrackingResult::default(),
                image: None,
            });
        }

        let run_engine = !self.flags.is_empty();
        let stabilizer = self.stabilizer.as_mut().filter(|_| run_engine);
        let (status, tracking) = match stabilizer {
            None => (STB_NORMAL, tracking::from_raw(&frame)),
            Some(stb) => {
                let input = tracking::to_stabilizer_input(&frame);
                match stb.execute(&input) {
                    Ok(stabilized) => (
                        STB_NORMAL,
                        tracking::merge_stabilized(self.flags, &frame, &stabilized),
                    ),
                    Err(StabilizerFault(status)) => {
                        log::warn!("stabilizer refused the frame: status {}", status);
                        (status, TrackingResult::default())
                    }
                }
            }
        };

        Ok(Capture {
            response: code,
            stabilizer_status: status,
            tracking,
            image: out_image,
        })
    }

    /// Drops all tracking identities. Settings are retained.
    pub fn reset_tracking(&mut self) -> Result<()> {
        if let Some(stb) = self.stabilizer.as_mut() {
            stb.clear()?;
        }
        Ok(())
    }

    /// Engine version, when a stabilizer is attached.
    pub fn stabilizer_version(&self) -> Option<(u8, u8)> {
        self.stabilizer.as_ref().and_then(|stb| stb.version().ok())
    }

    pub fn features(&self) -> FeatureFlags {
        self.flags
    }

    pub fn stabilizer_enabled(&self) -> bool {
        self.stabilizer.is_some()
    }

    pub fn device_mut(&mut self) -> &mut Device<T> {
        &mut self.device
    }

    /// Tears the session down, disconnecting the transport.
    pub fn close(mut self) -> Result<()> {
        self.device.disconnect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::result::tests::build_body;
    use crate::stabilizer::{
        StabilizedFrame, StabilizerInput, StabilizerSettings, StubStabilizer,
    };
    use crate::transport::ScriptedTransport;
    use crate::wire::NOT_TRACKED;

    /// Fails the test if the engine is ever invoked.
    struct PanickingStabilizer;

    impl Stabilizer for PanickingStabilizer {
        fn execute(&mut self, _: &StabilizerInput) -> Result<StabilizedFrame, StabilizerFault> {
            panic!("stabilizer must not run");
        }
        fn clear(&mut self) -> Result<(), StabilizerFault> {
            Ok(())
        }
        fn version(&self) -> Result<(u8, u8), StabilizerFault> {
            Ok((0, 0))
        }
        fn apply_settings(&mut self, _: &StabilizerSettings) -> Result<(), StabilizerFault> {
            Ok(())
        }
        fn settings(&self) -> Result<StabilizerSettings, StabilizerFault> {
            Ok(StabilizerSettings::default())
        }
    }

    /// Refuses every frame with a fixed negative status.
    struct FailingStabilizer(i32);

    impl Stabilizer for FailingStabilizer {
        fn execute(&mut self, _: &StabilizerInput) -> Result<StabilizedFrame, StabilizerFault> {
            Err(StabilizerFault(self.0))
        }
        fn clear(&mut self) -> Result<(), StabilizerFault> {
            Ok(())
        }
        fn version(&self) -> Result<(u8, u8), StabilizerFault> {
            Ok((0, 0))
        }
        fn apply_settings(&mut self, _: &StabilizerSettings) -> Result<(), StabilizerFault> {
            Ok(())
        }
        fn settings(&self) -> Result<StabilizerSettings, StabilizerFault> {
            Ok(StabilizerSettings::default())
        }
    }

    fn transport_with_settings_applied() -> ScriptedTransport {
        let mut transport = ScriptedTransport::new();
        // camera angle, thresholds, detection sizes, face angle
        for _ in 0..4 {
            transport.queue_response(0x00, &[]);
        }
        transport
    }

    fn open_session(
        mut transport: ScriptedTransport,
        features: FeatureFlags,
        stabilizer: Option<Box<dyn Stabilizer>>,
        execute_body: &[u8],
    ) -> Session<ScriptedTransport> {
        transport.queue_response(0x00, execute_body);
        Session::open(
            Device::new(transport),
            features,
            stabilizer,
            &SessionConfig::default(),
        )
        .unwrap()
    }

    #[test]
    fn hand_only_execution_never_invokes_the_stabilizer() {
        let body = build_body(FeatureFlags::HAND, 0, 2, 0);
        let mut session = open_session(
            transport_with_settings_applied(),
            FeatureFlags::HAND,
            Some(Box::new(PanickingStabilizer)),
            &body,
        );
        assert!(!session.stabilizer_enabled());

        let capture = session.execute(OutputImage::None).unwrap();
        assert_eq!(capture.stabilizer_status, STB_NORMAL);
        assert_eq!(capture.tracking.hands.len(), 2);
        assert!(capture
            .tracking
            .hands
            .iter()
            .all(|hand| hand.tracking_id == NOT_TRACKED));
    }

    #[test]
    fn hand_plus_body_keeps_the_stabilizer() {
        let flags = FeatureFlags::HAND | FeatureFlags::BODY;
        let body = build_body(flags, 1, 1, 0);
        let mut session = open_session(
            transport_with_settings_applied(),
            flags,
            Some(Box::new(StubStabilizer::new())),
            &body,
        );
        assert!(session.stabilizer_enabled());

        let capture = session.execute(OutputImage::None).unwrap();
        assert_eq!(capture.tracking.bodies[0].tracking_id, 0);
        assert_eq!(capture.tracking.hands[0].tracking_id, NOT_TRACKED);
    }

    #[test]
    fn pass_through_without_a_stabilizer() {
        let flags = FeatureFlags::FACE | FeatureFlags::AGE;
        let body = build_body(flags.normalized(), 0, 0, 1);
        let mut session = open_session(transport_with_settings_applied(), flags, None, &body);

        let capture = session.execute(OutputImage::None).unwrap();
        let face = &capture.tracking.faces[0];
        assert_eq!(face.tracking_id, NOT_TRACKED);
        assert_eq!(face.detection_id, 0);
        let age = face.age.unwrap();
        assert_eq!(age.value, 30);
        assert_eq!(age.status, None);
    }

    #[test]
    fn stabilized_execution_assigns_identities() {
        let flags = FeatureFlags::FACE | FeatureFlags::AGE | FeatureFlags::GAZE;
        let body = build_body(flags.normalized(), 0, 0, 1);
        let mut session = open_session(
            transport_with_settings_applied(),
            flags,
            Some(Box::new(StubStabilizer::new())),
            &body,
        );

        let capture = session.execute(OutputImage::None).unwrap();
        let face = &capture.tracking.faces[0];
        assert_eq!(face.tracking_id, 0);
        assert!(face.age.unwrap().status.is_some());
        // Frame-local gaze came from the raw frame.
        assert!(face.gaze.is_some());
    }

    #[test]
    fn negative_stabilizer_status_yields_an_empty_result() {
        let flags = FeatureFlags::FACE;
        let body = build_body(flags, 0, 0, 1);
        let mut session = open_session(
            transport_with_settings_applied(),
            flags,
            Some(Box::new(FailingStabilizer(-7))),
            &body,
        );

        let capture = session.execute(OutputImage::None).unwrap();
        assert_eq!(capture.response, ResponseCode::Normal);
        assert_eq!(capture.stabilizer_status, -7);
        assert!(capture.tracking.is_empty());
    }

    #[test]
    fn device_error_skips_the_stabilizer_and_returns_empty() {
        let mut transport = transport_with_settings_applied();
        let mut raw = vec![0xFE, 0xFE];
        raw.extend_from_slice(&0u32.to_le_bytes());
        transport.queue_raw(&raw);

        let mut session = Session::open(
            Device::new(transport),
            FeatureFlags::FACE,
            Some(Box::new(PanickingStabilizer)),
            &SessionConfig::default(),
        )
        .unwrap();

        let capture = session.execute(OutputImage::None).unwrap();
        assert_eq!(capture.response, ResponseCode::InternalError);
        assert!(capture.tracking.is_empty());
    }

    #[test]
    fn settings_are_applied_at_open() {
        let transport = transport_with_settings_applied();
        let mut session = Session::open(
            Device::new(transport),
            FeatureFlags::BODY,
            None,
            &SessionConfig::default(),
        )
        .unwrap();

        let sent = session.device_mut().transport_mut().sent();
        assert_eq!(sent.len(), 4);
        assert_eq!(sent[0][1], 0x01); // SetCameraAngle
        assert_eq!(sent[1][1], 0x05); // SetThreshold
        assert_eq!(sent[2][1], 0x07); // SetDetectionSize
        assert_eq!(sent[3][1], 0x09); // SetFaceAngle
    }
}
