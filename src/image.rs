//! 8-bit grayscale images returned by the device.
//!
//! Execute can append a QVGA/QQVGA snapshot after the detection records,
//! and RegisterData answers with the normalized 64x64 enrollment image.
//! Both arrive as `width:u16 | height:u16 | width*height` raw bytes.

use serde::{Deserialize, Serialize};

use crate::error::ProtocolFault;

/// Row-major 8-bit grayscale image.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GrayscaleImage {
    pub width: u16,
    pub height: u16,
    pub data: Vec<u8>,
}

impl GrayscaleImage {
    /// Decodes an image payload, returning the image and bytes consumed.
    pub fn decode(buf: &[u8]) -> Result<(Self, usize), ProtocolFault> {
        if buf.len() < 4 {
            return Err(ProtocolFault::Malformed("image dimensions"));
        }
        let width = u16::from_le_bytes([buf[0], buf[1]]);
        let height = u16::from_le_bytes([buf[2], buf[3]]);
        let pixels = width as usize * height as usize;
        if buf.len() < 4 + pixels {
            return Err(ProtocolFault::Malformed("image pixel data"));
        }
        let image = GrayscaleImage {
            width,
            height,
            data: buf[4..4 + pixels].to_vec(),
        };
        Ok((image, 4 + pixels))
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Writes the image as PNG.
    #[cfg(feature = "image-save")]
    pub fn save_png(&self, path: &std::path::Path) -> std::io::Result<()> {
        use std::io::{Error, ErrorKind};

        let buffer =
            image::GrayImage::from_raw(self.width as u32, self.height as u32, self.data.clone())
                .ok_or_else(|| Error::new(ErrorKind::InvalidData, "image dimensions mismatch"))?;
        buffer
            .save_with_format(path, image::ImageFormat::Png)
            .map_err(|e| Error::new(ErrorKind::Other, e))
    }
}
