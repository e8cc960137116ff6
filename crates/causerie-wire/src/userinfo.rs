//! The user-info block carried by buddy arrivals, locate replies and chat
//! occupancy payloads: screen name, warning level, and a TLV block of
//! presence fields.

use bytes::{BufMut, BytesMut};

use crate::error::Result;
use crate::strings::{get_str8, put_str8};
use crate::tlv::{Tlv, TlvBlock, TlvList};

/// TLV tags inside the user-info block.
pub mod tags {
    pub const USER_FLAGS: u16 = 0x0001;
    pub const SIGNON_TIME: u16 = 0x0003;
    pub const IDLE_TIME: u16 = 0x0004;
    pub const STATUS: u16 = 0x0006;
    pub const CAPABILITIES: u16 = 0x000D;
}

/// User flag bits (tag 0x0001).
pub mod flags {
    pub const UNCONFIRMED: u16 = 0x0001;
    pub const AOL: u16 = 0x0002;
    pub const OSCAR_FREE: u16 = 0x0010;
    pub const AWAY: u16 = 0x0020;
    pub const ICQ: u16 = 0x0040;
    pub const INVISIBLE: u16 = 0x0100;
}

/// A 16-byte capability blob.
pub type Capability = [u8; 16];

/// Standard instant-messaging capability advertised for every session.
pub const CAP_INSTANT_MESSAGE: Capability = [
    0x09, 0x46, 0x13, 0x4D, 0x4C, 0x7F, 0x11, 0xD1, 0x82, 0x22, 0x44, 0x45, 0x53, 0x54, 0x00,
    0x00,
];

/// Chat capability, present on sessions joined to a room.
pub const CAP_CHAT: Capability = [
    0x74, 0x8F, 0x24, 0x20, 0x62, 0x87, 0x11, 0xD1, 0x82, 0x22, 0x44, 0x45, 0x53, 0x54, 0x00,
    0x00,
];

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserInfo {
    pub screen_name: String,
    pub warning_level: u16,
    pub tlvs: TlvList,
}

impl UserInfo {
    pub fn new(screen_name: impl Into<String>) -> Self {
        Self {
            screen_name: screen_name.into(),
            warning_level: 0,
            tlvs: TlvList::new(),
        }
    }

    pub fn with_flags(mut self, flags: u16) -> Self {
        self.tlvs.push(Tlv::u16(tags::USER_FLAGS, flags));
        self
    }

    pub fn with_signon_time(mut self, unix_secs: u32) -> Self {
        self.tlvs.push(Tlv::u32(tags::SIGNON_TIME, unix_secs));
        self
    }

    pub fn with_idle_minutes(mut self, minutes: u16) -> Self {
        self.tlvs.push(Tlv::u16(tags::IDLE_TIME, minutes));
        self
    }

    pub fn with_capabilities(mut self, caps: &[Capability]) -> Self {
        let mut blob = Vec::with_capacity(caps.len() * 16);
        for cap in caps {
            blob.extend_from_slice(cap);
        }
        self.tlvs.push(Tlv::new(tags::CAPABILITIES, blob));
        self
    }

    pub fn encode(&self, buf: &mut BytesMut) {
        put_str8(buf, &self.screen_name);
        buf.put_u16(self.warning_level);
        TlvBlock(self.tlvs.clone()).encode(buf);
    }

    pub fn decode(cursor: &mut &[u8]) -> Result<Self> {
        use bytes::Buf;
        let screen_name = get_str8(cursor)?;
        if cursor.len() < 2 {
            return Err(crate::error::WireError::Truncated {
                needed: 2 - cursor.len(),
            });
        }
        let warning_level = cursor.get_u16();
        let block = TlvBlock::decode(cursor)?;
        Ok(Self {
            screen_name,
            warning_level,
            tlvs: block.0,
        })
    }

    pub fn flags(&self) -> u16 {
        self.tlvs.get_u16(tags::USER_FLAGS).unwrap_or(0)
    }

    pub fn capabilities(&self) -> Vec<Capability> {
        let Some(blob) = self.tlvs.bytes(tags::CAPABILITIES) else {
            return Vec::new();
        };
        blob.chunks_exact(16)
            .map(|c| {
                let mut cap = [0u8; 16];
                cap.copy_from_slice(c);
                cap
            })
            .collect()
    }
}
