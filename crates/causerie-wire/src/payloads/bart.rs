//! BART payloads (food group 0x0010): buddy icon upload and download.

use bytes::{Buf, BufMut, BytesMut};

use crate::error::Result;
use crate::payloads::ensure;
use crate::strings::{get_bytes16, put_bytes16};

/// Item types. Only buddy icons are served.
pub mod item_type {
    pub const BUDDY_ICON_SMALL: u16 = 0x0000;
    pub const BUDDY_ICON: u16 = 0x0001;
}

/// Reply codes.
pub mod code {
    pub const SUCCESS: u8 = 0x00;
    pub const INVALID: u8 = 0x01;
    pub const NO_CUSTOM: u8 = 0x02;
    pub const TOO_BIG: u8 = 0x03;
}

/// An item reference: type, flags, and the 16-byte truncated hash.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BartId {
    pub item_type: u16,
    pub flags: u8,
    pub hash: Vec<u8>,
}

impl BartId {
    pub fn encode(&self, buf: &mut BytesMut) {
        buf.put_u16(self.item_type);
        buf.put_u8(self.flags);
        buf.put_u8(self.hash.len() as u8);
        buf.put_slice(&self.hash);
    }

    pub fn decode(cursor: &mut &[u8]) -> Result<Self> {
        ensure(cursor, 4)?;
        let item_type = cursor.get_u16();
        let flags = cursor.get_u8();
        let len = cursor.get_u8() as usize;
        ensure(cursor, len)?;
        let hash = cursor[..len].to_vec();
        cursor.advance(len);
        Ok(Self {
            item_type,
            flags,
            hash,
        })
    }
}

/// Upload: item type plus the raw blob.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UploadQuery {
    pub item_type: u16,
    pub data: Vec<u8>,
}

impl UploadQuery {
    pub fn encode(&self, buf: &mut BytesMut) {
        buf.put_u16(self.item_type);
        put_bytes16(buf, &self.data);
    }

    pub fn decode(cursor: &mut &[u8]) -> Result<Self> {
        ensure(cursor, 2)?;
        let item_type = cursor.get_u16();
        let data = get_bytes16(cursor)?;
        Ok(Self { item_type, data })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UploadReply {
    pub code: u8,
    pub id: BartId,
}

impl UploadReply {
    pub fn encode(&self, buf: &mut BytesMut) {
        buf.put_u8(self.code);
        self.id.encode(buf);
    }

    pub fn decode(cursor: &mut &[u8]) -> Result<Self> {
        ensure(cursor, 1)?;
        let code = cursor.get_u8();
        let id = BartId::decode(cursor)?;
        Ok(Self { code, id })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DownloadQuery {
    pub id: BartId,
}

impl DownloadQuery {
    pub fn encode(&self, buf: &mut BytesMut) {
        self.id.encode(buf);
    }

    pub fn decode(cursor: &mut &[u8]) -> Result<Self> {
        Ok(Self {
            id: BartId::decode(cursor)?,
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DownloadReply {
    pub id: BartId,
    pub data: Vec<u8>,
}

impl DownloadReply {
    pub fn encode(&self, buf: &mut BytesMut) {
        self.id.encode(buf);
        put_bytes16(buf, &self.data);
    }

    pub fn decode(cursor: &mut &[u8]) -> Result<Self> {
        let id = BartId::decode(cursor)?;
        let data = get_bytes16(cursor)?;
        Ok(Self { id, data })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upload_roundtrip() {
        let query = UploadQuery {
            item_type: item_type::BUDDY_ICON,
            data: vec![0xFF, 0xD8, 0xFF, 0xE0],
        };
        let mut buf = BytesMut::new();
        query.encode(&mut buf);
        let mut cursor = &buf[..];
        assert_eq!(UploadQuery::decode(&mut cursor).unwrap(), query);
    }

    #[test]
    fn download_reply_roundtrip() {
        let reply = DownloadReply {
            id: BartId {
                item_type: item_type::BUDDY_ICON,
                flags: 0,
                hash: vec![0xAB; 16],
            },
            data: vec![1, 2, 3],
        };
        let mut buf = BytesMut::new();
        reply.encode(&mut buf);
        let mut cursor = &buf[..];
        assert_eq!(DownloadReply::decode(&mut cursor).unwrap(), reply);
    }

    #[test]
    fn truncated_bart_id_rejected() {
        let data = [0x00, 0x01, 0x00, 0x10, 0xAA]; // claims 16 hash bytes
        let mut cursor = &data[..];
        assert!(BartId::decode(&mut cursor).is_err());
    }
}
