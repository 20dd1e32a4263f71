//! Command framing and the request/response transaction.
//!
//! Every exchange is half-duplex: one command frame out, one response in.
//! A command frame is `0xFE | command id | payload length (u16 LE) |
//! payload`; a response opens with a fixed 6-byte header `0xFE | response
//! code | body length (u32 LE)`. The body is only read when the response
//! code signals success; error responses carry no payload.

use crate::error::{ProtocolFault, Result};
use crate::transport::Transport;
use crate::wire::{CommandId, ResponseCode, SYNC_BYTE};

pub const RESPONSE_HEADER_SIZE: usize = 6;

/// Parsed fixed-size response header.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ResponseHeader {
    pub code: ResponseCode,
    pub body_len: usize,
}

/// Builds a command frame. The payload length field is 16-bit; commands
/// whose trailing data exceeds that (album upload) declare only the fixed
/// part and append the rest to the frame.
pub fn encode_command(id: CommandId, payload: &[u8]) -> Vec<u8> {
    debug_assert!(payload.len() <= u16::MAX as usize);
    let mut frame = Vec::with_capacity(4 + payload.len());
    frame.push(SYNC_BYTE);
    frame.push(id as u8);
    frame.extend_from_slice(&(payload.len() as u16).to_le_bytes());
    frame.extend_from_slice(payload);
    frame
}

/// Parses the 6-byte response header.
pub fn parse_header(buf: &[u8]) -> std::result::Result<ResponseHeader, ProtocolFault> {
    if buf.len() < RESPONSE_HEADER_SIZE {
        return Err(ProtocolFault::ShortRead {
            want: RESPONSE_HEADER_SIZE,
            got: buf.len(),
        });
    }
    if buf[0] != SYNC_BYTE {
        return Err(ProtocolFault::BadSync { found: buf[0] });
    }
    let body_len = u32::from_le_bytes([buf[2], buf[3], buf[4], buf[5]]) as usize;
    Ok(ResponseHeader {
        code: ResponseCode::from_u8(buf[1]),
        body_len,
    })
}

/// Sends one command and receives its response.
///
/// Clears the receive buffer first: stale bytes from an aborted prior
/// exchange would otherwise shift the header. Returns the response code and
/// body; on a non-zero code the body is empty and nothing beyond the header
/// has been read.
pub fn transact(
    transport: &mut dyn Transport,
    id: CommandId,
    payload: &[u8],
) -> Result<(ResponseCode, Vec<u8>)> {
    let frame = encode_command(id, payload);
    transact_frame(transport, &frame)
}

/// Like [`transact`] but sends a pre-built frame. Used by commands that
/// append bulk data (album upload) past the declared payload length.
pub fn transact_frame(
    transport: &mut dyn Transport,
    frame: &[u8],
) -> Result<(ResponseCode, Vec<u8>)> {
    transport.clear_receive_buffer()?;
    log::trace!("tx {}", hex::encode(frame));
    transport.send(frame)?;

    let header_bytes = transport.receive(RESPONSE_HEADER_SIZE)?;
    let header = parse_header(&header_bytes)?;
    if !header.code.is_normal() {
        log::debug!("device answered {}", header.code);
        return Ok((header.code, Vec::new()));
    }

    let body = transport.receive(header.body_len)?;
    if body.len() != header.body_len {
        return Err(ProtocolFault::ShortRead {
            want: header.body_len,
            got: body.len(),
        }
        .into());
    }
    log::trace!("rx {} byte body", body.len());
    Ok((header.code, body))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::transport::ScriptedTransport;

    #[test]
    fn command_frame_layout() {
        let frame = encode_command(CommandId::Execute, &[0x04, 0x00, 0x01]);
        assert_eq!(frame, [0xFE, 0x04, 0x03, 0x00, 0x04, 0x00, 0x01]);

        let frame = encode_command(CommandId::GetVersion, &[]);
        assert_eq!(frame, [0xFE, 0x00, 0x00, 0x00]);
    }

    #[test]
    fn header_round_trip() {
        let mut raw = vec![SYNC_BYTE, 0x00];
        raw.extend_from_slice(&0x0001_0203u32.to_le_bytes());
        let header = parse_header(&raw).unwrap();
        assert_eq!(header.code, ResponseCode::Normal);
        assert_eq!(header.body_len, 0x0001_0203);
    }

    #[test]
    fn transact_returns_code_and_body() {
        let mut transport = ScriptedTransport::new();
        transport.queue_response(0x00, &[0xAA, 0xBB]);

        let (code, body) = transact(&mut transport, CommandId::GetCameraAngle, &[]).unwrap();
        assert_eq!(code, ResponseCode::Normal);
        assert_eq!(body, [0xAA, 0xBB]);
        assert_eq!(transport.sent(), &[vec![0xFE, 0x02, 0x00, 0x00]]);
        assert_eq!(transport.unread(), 0);
    }

    #[test]
    fn bad_sync_is_a_protocol_fault() {
        let mut transport = ScriptedTransport::new();
        transport.queue_raw(&[0x00, 0x00, 0x00, 0x00, 0x00, 0x00]);

        let err = transact(&mut transport, CommandId::GetVersion, &[]).unwrap_err();
        match err {
            Error::Protocol(ProtocolFault::BadSync { found }) => assert_eq!(found, 0x00),
            other => panic!("expected BadSync, got {:?}", other),
        }
    }

    #[test]
    fn short_header_is_a_protocol_fault() {
        let mut transport = ScriptedTransport::new();
        transport.queue_raw(&[SYNC_BYTE, 0x00, 0x01]);

        let err = transact(&mut transport, CommandId::GetVersion, &[]).unwrap_err();
        match err {
            Error::Protocol(ProtocolFault::ShortRead { want, got }) => {
                assert_eq!(want, RESPONSE_HEADER_SIZE);
                assert_eq!(got, 3);
            }
            other => panic!("expected ShortRead, got {:?}", other),
        }
    }

    #[test]
    fn short_body_is_a_protocol_fault() {
        let mut transport = ScriptedTransport::new();
        // Header declares 4 body bytes, only 2 follow.
        let mut raw = vec![SYNC_BYTE, 0x00];
        raw.extend_from_slice(&4u32.to_le_bytes());
        raw.extend_from_slice(&[0x01, 0x02]);
        transport.queue_raw(&raw);

        let err = transact(&mut transport, CommandId::SaveAlbum, &[]).unwrap_err();
        match err {
            Error::Protocol(ProtocolFault::ShortRead { want, got }) => {
                assert_eq!(want, 4);
                assert_eq!(got, 2);
            }
            other => panic!("expected ShortRead, got {:?}", other),
        }
    }

    #[test]
    fn error_code_reads_no_body() {
        let mut transport = ScriptedTransport::new();
        // Device error with a declared body; the host must not read it.
        let mut raw = vec![SYNC_BYTE, 0x01];
        raw.extend_from_slice(&8u32.to_le_bytes());
        transport.queue_raw(&raw);

        let (code, body) = transact(&mut transport, CommandId::RegisterData, &[0, 0, 0]).unwrap();
        assert_eq!(code, ResponseCode::NoFace);
        assert!(body.is_empty());
        assert_eq!(transport.unread(), 0);
    }

    #[test]
    fn stale_bytes_are_cleared_before_send() {
        let mut transport = ScriptedTransport::new();
        // Leftovers from a torn earlier exchange.
        transport.queue_raw(&[0x13, 0x37]);
        transport.send(&[0x00]).unwrap(); // push the stale bytes into rx
        transport.queue_response(0x00, &[]);

        let (code, _) = transact(&mut transport, CommandId::GetVersion, &[]).unwrap();
        assert_eq!(code, ResponseCode::Normal);
    }
}
