//! Permit/deny payloads (food group 0x0009).

use bytes::BytesMut;

use crate::error::Result;
use crate::strings::{get_str8, put_str8};
use crate::tlv::{Tlv, TlvList};

pub mod tags {
    pub const MAX_PERMITS: u16 = 0x0001;
    pub const MAX_DENIES: u16 = 0x0002;
}

/// Permit/deny modes stored in the feedbag pd-mode item and mirrored in the
/// session when set through this food group.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[repr(u8)]
pub enum PdMode {
    #[default]
    PermitAll = 0x01,
    DenyAll = 0x02,
    PermitSome = 0x03,
    DenySome = 0x04,
    PermitOnList = 0x05,
}

impl PdMode {
    pub fn from_byte(b: u8) -> Option<Self> {
        match b {
            0x01 => Some(Self::PermitAll),
            0x02 => Some(Self::DenyAll),
            0x03 => Some(Self::PermitSome),
            0x04 => Some(Self::DenySome),
            0x05 => Some(Self::PermitOnList),
            _ => None,
        }
    }
}

pub const DEFAULT_MAX_PERMITS: u16 = 200;
pub const DEFAULT_MAX_DENIES: u16 = 200;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RightsReply {
    pub tlvs: TlvList,
}

impl RightsReply {
    pub fn defaults() -> Self {
        Self {
            tlvs: TlvList::new()
                .with(Tlv::u16(tags::MAX_PERMITS, DEFAULT_MAX_PERMITS))
                .with(Tlv::u16(tags::MAX_DENIES, DEFAULT_MAX_DENIES)),
        }
    }

    pub fn encode(&self, buf: &mut BytesMut) {
        self.tlvs.encode(buf);
    }

    pub fn decode(cursor: &mut &[u8]) -> Result<Self> {
        Ok(Self {
            tlvs: TlvList::decode(cursor)?,
        })
    }
}

/// Screen-name run shared by the add/del permit/deny subgroups.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListEntries {
    pub screen_names: Vec<String>,
}

impl ListEntries {
    pub fn encode(&self, buf: &mut BytesMut) {
        for name in &self.screen_names {
            put_str8(buf, name);
        }
    }

    pub fn decode(cursor: &mut &[u8]) -> Result<Self> {
        let mut screen_names = Vec::new();
        while !cursor.is_empty() {
            screen_names.push(get_str8(cursor)?);
        }
        Ok(Self { screen_names })
    }
}
