//! FLAP framing (the outermost OSCAR layer).
//!
//! Every byte on an OSCAR connection travels inside a FLAP frame: a fixed
//! 6-byte header (start marker 0x2A, frame type, big-endian sequence number,
//! big-endian payload length) followed by the payload. Sequence numbers are
//! kept per direction and wrap at 2^16.

use bytes::{Buf, BufMut, BytesMut};

use crate::error::{Result, WireError};

pub const FLAP_START_MARKER: u8 = 0x2A;
pub const FLAP_HEADER_LEN: usize = 6;

/// FLAP protocol version carried in the sign-on payload. Always 1.
pub const FLAP_VERSION: u32 = 0x0000_0001;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum FrameType {
    SignOn = 0x01,
    Data = 0x02,
    Error = 0x03,
    SignOff = 0x04,
    KeepAlive = 0x05,
}

impl FrameType {
    pub fn from_byte(b: u8) -> Option<Self> {
        match b {
            0x01 => Some(Self::SignOn),
            0x02 => Some(Self::Data),
            0x03 => Some(Self::Error),
            0x04 => Some(Self::SignOff),
            0x05 => Some(Self::KeepAlive),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlapFrame {
    pub frame_type: FrameType,
    pub sequence: u16,
    pub payload: Vec<u8>,
}

impl FlapFrame {
    pub fn new(frame_type: FrameType, sequence: u16, payload: Vec<u8>) -> Self {
        Self {
            frame_type,
            sequence,
            payload,
        }
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut buf = BytesMut::with_capacity(FLAP_HEADER_LEN + self.payload.len());
        buf.put_u8(FLAP_START_MARKER);
        buf.put_u8(self.frame_type as u8);
        buf.put_u16(self.sequence);
        buf.put_u16(self.payload.len() as u16);
        buf.put_slice(&self.payload);
        buf.to_vec()
    }

    /// Parse the fixed header. Returns (frame type, sequence, payload length).
    pub fn decode_header(header: &[u8; FLAP_HEADER_LEN]) -> Result<(FrameType, u16, usize)> {
        if header[0] != FLAP_START_MARKER {
            return Err(WireError::BadFrame(format!(
                "start marker {:#04x}, expected 0x2a",
                header[0]
            )));
        }
        let frame_type = FrameType::from_byte(header[1])
            .ok_or_else(|| WireError::BadFrame(format!("unknown frame type {:#04x}", header[1])))?;
        let mut rest = &header[2..];
        let sequence = rest.get_u16();
        let payload_len = rest.get_u16() as usize;
        Ok((frame_type, sequence, payload_len))
    }

    /// Parse a complete frame from a contiguous buffer (tests and cookies).
    pub fn decode(data: &[u8]) -> Result<Self> {
        if data.len() < FLAP_HEADER_LEN {
            return Err(WireError::Truncated {
                needed: FLAP_HEADER_LEN - data.len(),
            });
        }
        let mut header = [0u8; FLAP_HEADER_LEN];
        header.copy_from_slice(&data[..FLAP_HEADER_LEN]);
        let (frame_type, sequence, payload_len) = Self::decode_header(&header)?;
        let body = &data[FLAP_HEADER_LEN..];
        if body.len() < payload_len {
            return Err(WireError::Truncated {
                needed: payload_len - body.len(),
            });
        }
        Ok(Self {
            frame_type,
            sequence,
            payload: body[..payload_len].to_vec(),
        })
    }
}

/// Per-direction FLAP sequence counter, wrapping at 2^16.
#[derive(Debug, Default)]
pub struct SequenceCounter {
    next: u16,
}

impl SequenceCounter {
    pub fn new(start: u16) -> Self {
        Self { next: start }
    }

    pub fn take(&mut self) -> u16 {
        let seq = self.next;
        self.next = self.next.wrapping_add(1);
        seq
    }

    /// Check an inbound sequence against the expected value. Gaps and
    /// duplicates are diagnostic only, never fatal.
    pub fn observe(&mut self, seq: u16) -> bool {
        let in_order = seq == self.next;
        self.next = seq.wrapping_add(1);
        in_order
    }
}
