//! Session configuration.
//!
//! All tunables live in one immutable struct handed to the session at
//! construction: connection parameters, device settings and stabilizer
//! settings. Values come from a JSON file named by `HVC_CONFIG`, with
//! environment overrides for the connection parameters, and are validated
//! before anything touches the wire.

use anyhow::{anyhow, Result};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

use crate::device::{DetectionSizes, FaceAngle, Thresholds};
use crate::stabilizer::{AngleGate, StabilizerSettings};
use crate::wire::{CameraAngle, AVAILABLE_BAUD};

const DEFAULT_ENDPOINT: &str = "/dev/ttyACM0";
const DEFAULT_BAUD: u32 = 9600;
const DEFAULT_TIMEOUT_SECS: u64 = 3;

#[derive(Debug, Deserialize, Default)]
struct SessionConfigFile {
    endpoint: Option<String>,
    baud: Option<u32>,
    timeout_secs: Option<u64>,
    device: Option<DeviceSettings>,
    stabilizer: Option<StabilizerSettings>,
}

/// Device-side settings applied when a session opens.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct DeviceSettings {
    pub camera_angle: CameraAngle,
    pub thresholds: Thresholds,
    pub detection_sizes: DetectionSizes,
    pub face_angle: FaceAngle,
}

/// Everything a session needs, resolved and validated.
#[derive(Clone, Debug)]
pub struct SessionConfig {
    pub endpoint: String,
    pub baud: u32,
    pub timeout: Duration,
    pub device: DeviceSettings,
    pub stabilizer: StabilizerSettings,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            baud: DEFAULT_BAUD,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            device: DeviceSettings::default(),
            stabilizer: StabilizerSettings::default(),
        }
    }
}

impl SessionConfig {
    /// Loads the configuration: file named by `HVC_CONFIG` (if set), then
    /// environment overrides, then validation.
    pub fn load() -> Result<Self> {
        let file_cfg = match std::env::var("HVC_CONFIG").ok().as_deref() {
            Some(path) => read_config_file(Path::new(path))?,
            None => SessionConfigFile::default(),
        };
        let mut cfg = Self::from_file(file_cfg);
        cfg.apply_env()?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn from_file(file: SessionConfigFile) -> Self {
        Self {
            endpoint: file.endpoint.unwrap_or_else(|| DEFAULT_ENDPOINT.to_string()),
            baud: file.baud.unwrap_or(DEFAULT_BAUD),
            timeout: Duration::from_secs(file.timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS)),
            device: file.device.unwrap_or_default(),
            stabilizer: file.stabilizer.unwrap_or_default(),
        }
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Ok(endpoint) = std::env::var("HVC_ENDPOINT") {
            if !endpoint.trim().is_empty() {
                self.endpoint = endpoint;
            }
        }
        if let Ok(baud) = std::env::var("HVC_BAUD") {
            self.baud = baud
                .parse()
                .map_err(|_| anyhow!("HVC_BAUD must be an integer baud rate"))?;
        }
        if let Ok(timeout) = std::env::var("HVC_TIMEOUT_SECS") {
            let seconds: u64 = timeout
                .parse()
                .map_err(|_| anyhow!("HVC_TIMEOUT_SECS must be an integer number of seconds"))?;
            self.timeout = Duration::from_secs(seconds);
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if !AVAILABLE_BAUD.contains(&self.baud) {
            return Err(anyhow!(
                "baud {} not in the allowed set {:?}",
                self.baud,
                AVAILABLE_BAUD
            ));
        }
        if self.timeout.as_secs() == 0 {
            return Err(anyhow!("timeout must be greater than zero"));
        }

        let t = &self.device.thresholds;
        for (value, what) in [(t.body, "body"), (t.hand, "hand"), (t.face, "face")] {
            if !(1..=1000).contains(&value) {
                return Err(anyhow!("{} threshold {} out of range 1-1000", what, value));
            }
        }
        if t.recognition > 1000 {
            return Err(anyhow!(
                "recognition threshold {} out of range 0-1000",
                t.recognition
            ));
        }

        let s = &self.device.detection_sizes;
        for (min, max, what) in [
            (s.min_body, s.max_body, "body"),
            (s.min_hand, s.max_hand, "hand"),
            (s.min_face, s.max_face, "face"),
        ] {
            if !(20..=8192).contains(&min) || !(20..=8192).contains(&max) || min > max {
                return Err(anyhow!("invalid {} detection size window {}-{}", what, min, max));
            }
        }

        validate_stabilizer(&self.stabilizer)
    }
}

fn validate_stabilizer(stb: &StabilizerSettings) -> Result<()> {
    if !(0..=300).contains(&stb.retry_count) {
        return Err(anyhow!("retry count {} out of range 0-300", stb.retry_count));
    }
    for (value, what) in [
        (stb.pos_steadiness, "position steadiness"),
        (stb.size_steadiness, "size steadiness"),
        (stb.recognition_min_ratio, "recognition minimum ratio"),
    ] {
        if !(0..=100).contains(&value) {
            return Err(anyhow!("{} {} out of range 0-100", what, value));
        }
    }
    for (value, what) in [
        (stb.estimation_threshold, "estimation threshold"),
        (stb.recognition_threshold, "recognition threshold"),
    ] {
        if !(0..=1000).contains(&value) {
            return Err(anyhow!("{} {} out of range 0-1000", what, value));
        }
    }
    if !(1..=20).contains(&stb.estimation_frame_count) {
        return Err(anyhow!(
            "estimation frame count {} out of range 1-20",
            stb.estimation_frame_count
        ));
    }
    if !(0..=20).contains(&stb.recognition_frame_count) {
        return Err(anyhow!(
            "recognition frame count {} out of range 0-20",
            stb.recognition_frame_count
        ));
    }
    for gate in [&stb.estimation_angle, &stb.recognition_angle] {
        validate_gate(gate)?;
    }
    Ok(())
}

fn validate_gate(gate: &AngleGate) -> Result<()> {
    for value in [gate.min_ud, gate.max_ud, gate.min_lr, gate.max_lr] {
        if !(-90..=90).contains(&value) {
            return Err(anyhow!("angle gate value {} out of range -90..90", value));
        }
    }
    if gate.min_ud > gate.max_ud || gate.min_lr > gate.max_lr {
        return Err(anyhow!("angle gate minimum exceeds maximum"));
    }
    Ok(())
}

fn read_config_file(path: &Path) -> Result<SessionConfigFile> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow!("failed to read config file {}: {}", path.display(), e))?;
    let cfg = serde_json::from_str(&raw)
        .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?;
    Ok(cfg)
}
