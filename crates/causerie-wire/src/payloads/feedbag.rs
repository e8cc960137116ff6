//! Feedbag payloads (food group 0x0013): querying and mutating the
//! server-stored buddy list.

use bytes::{Buf, BufMut, BytesMut};

use crate::error::Result;
use crate::feedbag::FeedbagItem;
use crate::payloads::ensure;
use crate::tlv::{Tlv, TlvList};

pub mod tags {
    pub const MAX_ITEMS_BY_CLASS: u16 = 0x0004;
}

/// Per-item result codes in a Status reply.
pub mod status {
    pub const SUCCESS: u16 = 0x0000;
    pub const DB_ERROR: u16 = 0x0001;
    pub const NOT_FOUND: u16 = 0x0002;
    pub const ALREADY_EXISTS: u16 = 0x0003;
}

pub const FEEDBAG_VERSION: u8 = 0;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RightsReply {
    pub tlvs: TlvList,
}

impl RightsReply {
    /// Maxima per class id, in class-id order.
    pub fn defaults() -> Self {
        let mut limits = Vec::new();
        for max in [400u16, 61, 200, 200, 1, 0, 0, 0, 0, 0, 0, 0, 0, 0, 50] {
            limits.extend_from_slice(&max.to_be_bytes());
        }
        Self {
            tlvs: TlvList::new().with(Tlv::new(tags::MAX_ITEMS_BY_CLASS, limits)),
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

/// The full list: version byte, item count, items, last-modified time.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Reply {
    pub version: u8,
    pub items: Vec<FeedbagItem>,
    pub last_update: u32,
}

impl Reply {
    pub fn encode(&self, buf: &mut BytesMut) {
        buf.put_u8(self.version);
        buf.put_u16(self.items.len() as u16);
        for item in &self.items {
            item.encode(buf);
        }
        buf.put_u32(self.last_update);
    }

    pub fn decode(cursor: &mut &[u8]) -> Result<Self> {
        ensure(cursor, 3)?;
        let version = cursor.get_u8();
        let count = cursor.get_u16() as usize;
        let mut items = Vec::with_capacity(count);
        for _ in 0..count {
            items.push(FeedbagItem::decode(cursor)?);
        }
        ensure(cursor, 4)?;
        let last_update = cursor.get_u32();
        Ok(Self {
            version,
            items,
            last_update,
        })
    }
}

/// Query for items newer than a timestamp.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueryIfModified {
    pub last_update: u32,
    pub count: u16,
}

impl QueryIfModified {
    pub fn encode(&self, buf: &mut BytesMut) {
        buf.put_u32(self.last_update);
        buf.put_u16(self.count);
    }

    pub fn decode(cursor: &mut &[u8]) -> Result<Self> {
        ensure(cursor, 6)?;
        Ok(Self {
            last_update: cursor.get_u32(),
            count: cursor.get_u16(),
        })
    }
}

/// Insert, update and delete all carry a bare item run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ItemsPayload {
    pub items: Vec<FeedbagItem>,
}

impl ItemsPayload {
    pub fn encode(&self, buf: &mut BytesMut) {
        for item in &self.items {
            item.encode(buf);
        }
    }

    pub fn decode(cursor: &mut &[u8]) -> Result<Self> {
        Ok(Self {
            items: FeedbagItem::decode_list(cursor)?,
        })
    }
}

/// One result code per item of the request, in request order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Status {
    pub codes: Vec<u16>,
}

impl Status {
    pub fn success(n: usize) -> Self {
        Self {
            codes: vec![status::SUCCESS; n],
        }
    }

    pub fn encode(&self, buf: &mut BytesMut) {
        for code in &self.codes {
            buf.put_u16(*code);
        }
    }

    pub fn decode(cursor: &mut &[u8]) -> Result<Self> {
        let mut codes = Vec::new();
        while cursor.len() >= 2 {
            codes.push(cursor.get_u16());
        }
        Ok(Self { codes })
    }
}
