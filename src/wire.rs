//! Wire-level definitions for the HVC-P2 (B5T-007001) serial protocol.
//!
//! Command identifiers, response codes, the execution feature bitmask and
//! the small setting enums that ride inside command payloads. All multi-byte
//! integers on the wire are little-endian.

use serde::{Deserialize, Serialize};

/// First byte of every command and response frame.
pub const SYNC_BYTE: u8 = 0xFE;

/// Per-category hard limit of the device: at most 35 bodies, hands and
/// faces per frame.
pub const MAX_DETECTIONS: usize = 35;

/// Estimation sub-results report this value when the device could not
/// produce an estimate for a detected face.
pub const EST_NOT_POSSIBLE: i32 = -128;

/// Recognition user id when recognition was not possible.
pub const RECOG_NOT_POSSIBLE: i16 = -128;
/// Recognition user id when the album holds no enrolled data.
pub const RECOG_NO_DATA_IN_ALBUM: i16 = -127;

/// Tracking id of a detection that no stabilizer has claimed.
pub const NOT_TRACKED: i32 = -1;

/// Command identifiers understood by the device.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum CommandId {
    GetVersion = 0x00,
    SetCameraAngle = 0x01,
    GetCameraAngle = 0x02,
    Execute = 0x04,
    SetThreshold = 0x05,
    GetThreshold = 0x06,
    SetDetectionSize = 0x07,
    GetDetectionSize = 0x08,
    SetFaceAngle = 0x09,
    GetFaceAngle = 0x0A,
    SetUartBaud = 0x0E,
    RegisterData = 0x10,
    DeleteData = 0x11,
    DeleteUser = 0x12,
    DeleteAllData = 0x13,
    GetUserData = 0x15,
    SaveAlbum = 0x20,
    LoadAlbum = 0x21,
    SaveAlbumToFlash = 0x22,
    ReformatFlash = 0x30,
}

/// Response code returned in byte 1 of every response header.
///
/// Codes 0x01/0x02 are only produced by `RegisterData`; everything else is
/// either normal or one of the generic error codes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ResponseCode {
    /// Normal end.
    Normal,
    /// No face was detected during registration.
    NoFace,
    /// More than one face was detected during registration.
    PluralFace,
    /// The device did not recognize the command.
    InvalidCommand,
    /// Internal device error.
    InternalError,
    /// Undefined error.
    Undefined,
    /// A code outside the documented set.
    Other(u8),
}

impl ResponseCode {
    pub fn from_u8(code: u8) -> Self {
        match code {
            0x00 => ResponseCode::Normal,
            0x01 => ResponseCode::NoFace,
            0x02 => ResponseCode::PluralFace,
            0xFD => ResponseCode::InvalidCommand,
            0xFE => ResponseCode::InternalError,
            0xFF => ResponseCode::Undefined,
            other => ResponseCode::Other(other),
        }
    }

    pub fn as_u8(self) -> u8 {
        match self {
            ResponseCode::Normal => 0x00,
            ResponseCode::NoFace => 0x01,
            ResponseCode::PluralFace => 0x02,
            ResponseCode::InvalidCommand => 0xFD,
            ResponseCode::InternalError => 0xFE,
            ResponseCode::Undefined => 0xFF,
            ResponseCode::Other(code) => code,
        }
    }

    pub fn is_normal(self) -> bool {
        matches!(self, ResponseCode::Normal)
    }
}

impl std::fmt::Display for ResponseCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ResponseCode::Normal => write!(f, "normal end"),
            ResponseCode::NoFace => write!(f, "no face detected"),
            ResponseCode::PluralFace => write!(f, "plural faces detected"),
            ResponseCode::InvalidCommand => write!(f, "invalid command"),
            ResponseCode::InternalError => write!(f, "internal device error"),
            ResponseCode::Undefined => write!(f, "undefined error"),
            ResponseCode::Other(code) => write!(f, "response code {:#04x}", code),
        }
    }
}

bitflags::bitflags! {
    /// Execution feature bitmask: which detectors and estimators run on a
    /// frame. Sent as a 16-bit little-endian field in the Execute payload.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct FeatureFlags: u16 {
        const BODY        = 0x0001;
        const HAND        = 0x0002;
        const FACE        = 0x0004;
        const DIRECTION   = 0x0008;
        const AGE         = 0x0010;
        const GENDER      = 0x0020;
        const GAZE        = 0x0040;
        const BLINK       = 0x0080;
        const EXPRESSION  = 0x0100;
        const RECOGNITION = 0x0200;
    }
}

impl FeatureFlags {
    /// Facial attribute estimators. Any of these requires face detection
    /// and direction data in the response body.
    pub const ATTRIBUTES: FeatureFlags = FeatureFlags::DIRECTION
        .union(FeatureFlags::AGE)
        .union(FeatureFlags::GENDER)
        .union(FeatureFlags::GAZE)
        .union(FeatureFlags::BLINK)
        .union(FeatureFlags::EXPRESSION)
        .union(FeatureFlags::RECOGNITION);

    /// Adds the Face and Direction bits when any facial attribute estimator
    /// is requested. The device only attaches attribute sub-records to face
    /// records, and every attribute path needs the direction record first.
    pub fn normalized(self) -> FeatureFlags {
        if self.intersects(Self::ATTRIBUTES) {
            self | FeatureFlags::FACE | FeatureFlags::DIRECTION
        } else {
            self
        }
    }
}

/// Output image request for Execute.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputImage {
    /// No trailing image in the response.
    #[default]
    None,
    /// 320x240 grayscale.
    Qvga,
    /// 160x120 grayscale.
    Qqvga,
}

impl OutputImage {
    pub fn as_u8(self) -> u8 {
        match self {
            OutputImage::None => 0x00,
            OutputImage::Qvga => 0x01,
            OutputImage::Qqvga => 0x02,
        }
    }
}

/// Mounting angle of the camera.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum CameraAngle {
    #[default]
    #[serde(rename = "0")]
    Deg0,
    #[serde(rename = "90")]
    Deg90,
    #[serde(rename = "180")]
    Deg180,
    #[serde(rename = "270")]
    Deg270,
}

impl CameraAngle {
    pub fn as_u8(self) -> u8 {
        match self {
            CameraAngle::Deg0 => 0x00,
            CameraAngle::Deg90 => 0x01,
            CameraAngle::Deg180 => 0x02,
            CameraAngle::Deg270 => 0x03,
        }
    }

    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0x00 => Some(CameraAngle::Deg0),
            0x01 => Some(CameraAngle::Deg90),
            0x02 => Some(CameraAngle::Deg180),
            0x03 => Some(CameraAngle::Deg270),
            _ => None,
        }
    }
}

/// Yaw angle range for face detection.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum YawRange {
    /// +/-30 degrees, frontal faces.
    #[default]
    Front,
    /// +/-60 degrees, half-profile faces.
    HalfProfile,
    /// +/-90 degrees, profile faces.
    Profile,
}

impl YawRange {
    pub fn as_u8(self) -> u8 {
        match self {
            YawRange::Front => 0x00,
            YawRange::HalfProfile => 0x01,
            YawRange::Profile => 0x02,
        }
    }

    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0x00 => Some(YawRange::Front),
            0x01 => Some(YawRange::HalfProfile),
            0x02 => Some(YawRange::Profile),
            _ => None,
        }
    }
}

/// Roll angle range for face detection.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RollRange {
    /// +/-15 degrees.
    #[default]
    Narrow,
    /// +/-45 degrees.
    Wide,
}

impl RollRange {
    pub fn as_u8(self) -> u8 {
        match self {
            RollRange::Narrow => 0x00,
            RollRange::Wide => 0x01,
        }
    }

    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0x00 => Some(RollRange::Narrow),
            0x01 => Some(RollRange::Wide),
            _ => None,
        }
    }
}

/// UART baud rates accepted by the device. `SetUartBaud` sends the
/// enumeration index, not the rate itself.
pub const AVAILABLE_BAUD: [u32; 6] = [9600, 38400, 115_200, 230_400, 460_800, 921_600];

/// Maps a baud rate to the wire index sent in `SetUartBaud`.
pub fn baud_index(baud: u32) -> Option<u8> {
    AVAILABLE_BAUD
        .iter()
        .position(|&rate| rate == baud)
        .map(|idx| idx as u8)
}

/// Gender estimation values.
pub const GENDER_FEMALE: i32 = 0;
pub const GENDER_MALE: i32 = 1;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn attribute_flags_imply_face_and_direction() {
        for flag in [
            FeatureFlags::DIRECTION,
            FeatureFlags::AGE,
            FeatureFlags::GENDER,
            FeatureFlags::GAZE,
            FeatureFlags::BLINK,
            FeatureFlags::EXPRESSION,
            FeatureFlags::RECOGNITION,
        ] {
            let normalized = flag.normalized();
            assert!(normalized.contains(FeatureFlags::FACE), "{:?}", flag);
            assert!(normalized.contains(FeatureFlags::DIRECTION), "{:?}", flag);
        }
    }

    #[test]
    fn detection_only_flags_are_left_alone() {
        let flags = FeatureFlags::BODY | FeatureFlags::HAND;
        assert_eq!(flags.normalized(), flags);
        assert_eq!(FeatureFlags::HAND.normalized(), FeatureFlags::HAND);
        assert_eq!(FeatureFlags::empty().normalized(), FeatureFlags::empty());
    }

    #[test]
    fn baud_index_covers_the_allowed_set() {
        assert_eq!(baud_index(9600), Some(0));
        assert_eq!(baud_index(921_600), Some(5));
        assert_eq!(baud_index(57_600), None);
        assert_eq!(baud_index(0), None);
    }

    #[test]
    fn response_code_round_trips() {
        for code in [0x00, 0x01, 0x02, 0xFD, 0xFE, 0xFF, 0x42] {
            assert_eq!(ResponseCode::from_u8(code).as_u8(), code);
        }
        assert!(ResponseCode::Normal.is_normal());
        assert!(!ResponseCode::NoFace.is_normal());
    }
}
