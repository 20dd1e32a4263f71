//! The device command surface.
//!
//! One method per command, each a thin fixed-layout encode over
//! [`crate::protocol::transact`] plus a symmetric decode of the response
//! body. Range checks happen before any bytes are sent; a non-zero
//! response code surfaces as [`Error::Device`], except for `execute`,
//! where the caller inspects the code alongside the (then empty) frame
//! result, mirroring the per-frame polling loop this command lives in.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, ProtocolFault, Result};
use crate::image::GrayscaleImage;
use crate::protocol::{encode_command, transact, transact_frame};
use crate::result::{self, FrameResult};
use crate::transport::Transport;
use crate::wire::{
    baud_index, CameraAngle, CommandId, FeatureFlags, OutputImage, ResponseCode, RollRange,
    YawRange, AVAILABLE_BAUD,
};

/// Model name and firmware version reported by `GetVersion`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DeviceVersion {
    /// Model string, e.g. "B5T-007001".
    pub model: String,
    pub major: u8,
    pub minor: u8,
    pub release: u8,
    pub revision: u32,
}

/// Detection confidence floors. Detections below the floor are dropped on
/// the device. 1-1000 for the detectors, 0-1000 for recognition.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Thresholds {
    pub body: u16,
    pub hand: u16,
    pub face: u16,
    pub recognition: u16,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            body: 500,
            hand: 500,
            face: 500,
            recognition: 500,
        }
    }
}

/// Per-detector size windows in pixels, 20-8192.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectionSizes {
    pub min_body: u16,
    pub max_body: u16,
    pub min_hand: u16,
    pub max_hand: u16,
    pub min_face: u16,
    pub max_face: u16,
}

impl Default for DetectionSizes {
    fn default() -> Self {
        Self {
            min_body: 30,
            max_body: 8192,
            min_hand: 40,
            max_hand: 8192,
            min_face: 64,
            max_face: 8192,
        }
    }
}

/// Face detection angle ranges.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FaceAngle {
    pub yaw: YawRange,
    pub roll: RollRange,
}

/// Outcome of one Execute command.
#[derive(Clone, Debug)]
pub struct ExecuteOutcome {
    pub code: ResponseCode,
    pub frame: FrameResult,
    pub image: Option<GrayscaleImage>,
}

/// A connected sensor behind some byte channel.
pub struct Device<T: Transport> {
    transport: T,
}

impl<T: Transport> Device<T> {
    pub fn new(transport: T) -> Self {
        Self { transport }
    }

    /// Opens the channel. The baud rate must be one the device supports.
    pub fn connect(&mut self, endpoint: &str, baud: u32, timeout: Duration) -> Result<()> {
        if !AVAILABLE_BAUD.contains(&baud) {
            return Err(Error::config(format!("invalid baud rate {}", baud)));
        }
        self.transport.connect(endpoint, baud, timeout)?;
        Ok(())
    }

    pub fn disconnect(&mut self) -> Result<()> {
        self.transport.disconnect()?;
        Ok(())
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    pub fn get_version(&mut self) -> Result<DeviceVersion> {
        let body = self.command(CommandId::GetVersion, &[])?;
        expect_len(&body, 19, "version response")?;
        Ok(DeviceVersion {
            model: String::from_utf8_lossy(&body[..12]).trim_end().to_string(),
            major: body[12],
            minor: body[13],
            release: body[14],
            revision: u32::from_le_bytes([body[15], body[16], body[17], body[18]]),
        })
    }

    pub fn set_camera_angle(&mut self, angle: CameraAngle) -> Result<()> {
        self.command(CommandId::SetCameraAngle, &[angle.as_u8()])?;
        Ok(())
    }

    pub fn get_camera_angle(&mut self) -> Result<CameraAngle> {
        let body = self.command(CommandId::GetCameraAngle, &[])?;
        expect_len(&body, 1, "camera angle response")?;
        CameraAngle::from_u8(body[0])
            .ok_or_else(|| ProtocolFault::Malformed("camera angle response").into())
    }

    /// Runs the selected detectors and estimators on one frame.
    ///
    /// Flags are normalized first (attribute estimators pull in
    /// Face|Direction), because the device lays out the response for the
    /// normalized set. On a non-zero response code the frame is empty and
    /// no body was read.
    pub fn execute(&mut self, flags: FeatureFlags, image: OutputImage) -> Result<ExecuteOutcome> {
        let flags = flags.normalized();
        let mut payload = [0u8; 3];
        payload[..2].copy_from_slice(&flags.bits().to_le_bytes());
        payload[2] = image.as_u8();

        let (code, body) = transact(&mut self.transport, CommandId::Execute, &payload)?;
        if !code.is_normal() {
            return Ok(ExecuteOutcome {
                code,
                frame: FrameResult::default(),
                image: None,
            });
        }

        let (frame, consumed) = result::decode(flags, &body)?;
        let (out_image, total) = match image {
            OutputImage::None => (None, consumed),
            _ => {
                let (img, img_len) = GrayscaleImage::decode(&body[consumed..])?;
                (Some(img), consumed + img_len)
            }
        };
        if total != body.len() {
            return Err(ProtocolFault::LengthMismatch {
                declared: body.len(),
                consumed: total,
            }
            .into());
        }

        Ok(ExecuteOutcome {
            code,
            frame,
            image: out_image,
        })
    }

    pub fn set_threshold(&mut self, thresholds: &Thresholds) -> Result<()> {
        for (value, what) in [
            (thresholds.body, "body threshold"),
            (thresholds.hand, "hand threshold"),
            (thresholds.face, "face threshold"),
        ] {
            if !(1..=1000).contains(&value) {
                return Err(Error::config(format!("{} {} out of range 1-1000", what, value)));
            }
        }
        if thresholds.recognition > 1000 {
            return Err(Error::config(format!(
                "recognition threshold {} out of range 0-1000",
                thresholds.recognition
            )));
        }

        let mut payload = Vec::with_capacity(8);
        for value in [
            thresholds.body,
            thresholds.hand,
            thresholds.face,
            thresholds.recognition,
        ] {
            payload.extend_from_slice(&value.to_le_bytes());
        }
        self.command(CommandId::SetThreshold, &payload)?;
        Ok(())
    }

    pub fn get_threshold(&mut self) -> Result<Thresholds> {
        let body = self.command(CommandId::GetThreshold, &[])?;
        expect_len(&body, 8, "threshold response")?;
        Ok(Thresholds {
            body: u16_at(&body, 0),
            hand: u16_at(&body, 2),
            face: u16_at(&body, 4),
            recognition: u16_at(&body, 6),
        })
    }

    pub fn set_detection_size(&mut self, sizes: &DetectionSizes) -> Result<()> {
        for (min, max, what) in [
            (sizes.min_body, sizes.max_body, "body"),
            (sizes.min_hand, sizes.max_hand, "hand"),
            (sizes.min_face, sizes.max_face, "face"),
        ] {
            if !(20..=8192).contains(&min) || !(20..=8192).contains(&max) {
                return Err(Error::config(format!("{} detection size out of range 20-8192", what)));
            }
            if min > max {
                return Err(Error::config(format!(
                    "{} minimum detection size exceeds maximum",
                    what
                )));
            }
        }

        let mut payload = Vec::with_capacity(12);
        for value in [
            sizes.min_body,
            sizes.max_body,
            sizes.min_hand,
            sizes.max_hand,
            sizes.min_face,
            sizes.max_face,
        ] {
            payload.extend_from_slice(&value.to_le_bytes());
        }
        self.command(CommandId::SetDetectionSize, &payload)?;
        Ok(())
    }

    pub fn get_detection_size(&mut self) -> Result<DetectionSizes> {
        let body = self.command(CommandId::GetDetectionSize, &[])?;
        expect_len(&body, 12, "detection size response")?;
        Ok(DetectionSizes {
            min_body: u16_at(&body, 0),
            max_body: u16_at(&body, 2),
            min_hand: u16_at(&body, 4),
            max_hand: u16_at(&body, 6),
            min_face: u16_at(&body, 8),
            max_face: u16_at(&body, 10),
        })
    }

    pub fn set_face_angle(&mut self, angle: FaceAngle) -> Result<()> {
        self.command(
            CommandId::SetFaceAngle,
            &[angle.yaw.as_u8(), angle.roll.as_u8()],
        )?;
        Ok(())
    }

    pub fn get_face_angle(&mut self) -> Result<FaceAngle> {
        let body = self.command(CommandId::GetFaceAngle, &[])?;
        expect_len(&body, 2, "face angle response")?;
        let yaw = YawRange::from_u8(body[0])
            .ok_or(ProtocolFault::Malformed("face angle response"))?;
        let roll = RollRange::from_u8(body[1])
            .ok_or(ProtocolFault::Malformed("face angle response"))?;
        Ok(FaceAngle { yaw, roll })
    }

    /// Switches the UART baud rate. The wire carries the enumeration index
    /// into the allowed set, not the rate itself. Only meaningful on UART
    /// links; over USB the setting is stored but has no effect.
    pub fn set_uart_baud(&mut self, baud: u32) -> Result<()> {
        let index =
            baud_index(baud).ok_or_else(|| Error::config(format!("invalid baud rate {}", baud)))?;
        self.command(CommandId::SetUartBaud, &[index])?;
        Ok(())
    }

    // ---------------- Album operations ----------------

    /// Enrolls the currently detected face under `user_id`/`data_id` and
    /// returns the normalized enrollment image. Exactly one face must be in
    /// view; otherwise the device answers NoFace or PluralFace.
    pub fn register_data(&mut self, user_id: u16, data_id: u8) -> Result<GrayscaleImage> {
        check_user_id(user_id)?;
        check_data_id(data_id)?;
        let mut payload = Vec::with_capacity(3);
        payload.extend_from_slice(&user_id.to_le_bytes());
        payload.push(data_id);

        let body = self.command(CommandId::RegisterData, &payload)?;
        let (image, consumed) = GrayscaleImage::decode(&body)?;
        if consumed != body.len() {
            return Err(ProtocolFault::LengthMismatch {
                declared: body.len(),
                consumed,
            }
            .into());
        }
        Ok(image)
    }

    pub fn delete_data(&mut self, user_id: u16, data_id: u8) -> Result<()> {
        check_user_id(user_id)?;
        check_data_id(data_id)?;
        let mut payload = Vec::with_capacity(3);
        payload.extend_from_slice(&user_id.to_le_bytes());
        payload.push(data_id);
        self.command(CommandId::DeleteData, &payload)?;
        Ok(())
    }

    pub fn delete_user(&mut self, user_id: u16) -> Result<()> {
        check_user_id(user_id)?;
        self.command(CommandId::DeleteUser, &user_id.to_le_bytes())?;
        Ok(())
    }

    pub fn delete_all_data(&mut self) -> Result<()> {
        self.command(CommandId::DeleteAllData, &[])?;
        Ok(())
    }

    /// Which of the ten data slots hold enrolled data for `user_id`.
    pub fn get_user_data(&mut self, user_id: u16) -> Result<[bool; 10]> {
        check_user_id(user_id)?;
        let body = self.command(CommandId::GetUserData, &user_id.to_le_bytes())?;
        expect_len(&body, 2, "user data response")?;
        let bitmap = u16_at(&body, 0);
        let mut slots = [false; 10];
        for (i, slot) in slots.iter_mut().enumerate() {
            *slot = bitmap & (1 << i) != 0;
        }
        Ok(slots)
    }

    /// Downloads the recognition album. The blob is opaque to the host.
    pub fn save_album(&mut self) -> Result<Vec<u8>> {
        self.command(CommandId::SaveAlbum, &[])
    }

    /// Uploads a previously saved album. The frame declares the 4-byte
    /// size field as its payload and appends the blob after it.
    pub fn load_album(&mut self, album: &[u8]) -> Result<()> {
        let mut frame = encode_command(CommandId::LoadAlbum, &(album.len() as u32).to_le_bytes());
        frame.extend_from_slice(album);
        let (code, _) = transact_frame(&mut self.transport, &frame)?;
        if !code.is_normal() {
            return Err(Error::Device(code));
        }
        Ok(())
    }

    /// Persists the on-device album to flash. Slow with a full album;
    /// overwrites whatever was there.
    pub fn save_album_to_flash(&mut self) -> Result<()> {
        self.command(CommandId::SaveAlbumToFlash, &[])?;
        Ok(())
    }

    /// Erases the album area of the flash ROM.
    pub fn reformat_flash(&mut self) -> Result<()> {
        self.command(CommandId::ReformatFlash, &[])?;
        Ok(())
    }

    fn command(&mut self, id: CommandId, payload: &[u8]) -> Result<Vec<u8>> {
        let (code, body) = transact(&mut self.transport, id, payload)?;
        if !code.is_normal() {
            return Err(Error::Device(code));
        }
        Ok(body)
    }
}

fn check_user_id(user_id: u16) -> Result<()> {
    if user_id > 9 {
        return Err(Error::config(format!("user id {} out of range 0-9", user_id)));
    }
    Ok(())
}

fn check_data_id(data_id: u8) -> Result<()> {
    if data_id > 99 {
        return Err(Error::config(format!("data id {} out of range 0-99", data_id)));
    }
    Ok(())
}

fn expect_len(body: &[u8], want: usize, what: &'static str) -> Result<()> {
    if body.len() < want {
        return Err(ProtocolFault::Malformed(what).into());
    }
    Ok(())
}

fn u16_at(body: &[u8], offset: usize) -> u16 {
    u16::from_le_bytes([body[offset], body[offset + 1]])
}
