//! ODir payloads (food group 0x000F): directory search over the info and
//! keywords users upload through Locate.

use bytes::{Buf, BufMut, BytesMut};

use crate::error::Result;
use crate::payloads::ensure;
use crate::strings::{get_str16, put_str16};
use crate::tlv::{TlvBlock, TlvList};

/// TLV tags shared by the search query, the result blocks, and the Locate
/// dir-info/keyword uploads.
pub mod tags {
    pub const FIRST_NAME: u16 = 0x0001;
    pub const LAST_NAME: u16 = 0x0002;
    pub const EMAIL: u16 = 0x0005;
    pub const SCREEN_NAME: u16 = 0x0009;
    pub const KEYWORD: u16 = 0x000B;
}

pub mod status {
    pub const OK: u16 = 0x0001;
}

/// A directory search: any combination of name, email and keyword TLVs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InfoQuery {
    pub tlvs: TlvList,
}

impl InfoQuery {
    pub fn first_name(&self) -> Option<String> {
        self.tlvs.str(tags::FIRST_NAME)
    }

    pub fn last_name(&self) -> Option<String> {
        self.tlvs.str(tags::LAST_NAME)
    }

    pub fn email(&self) -> Option<String> {
        self.tlvs.str(tags::EMAIL)
    }

    pub fn keyword(&self) -> Option<String> {
        self.tlvs.str(tags::KEYWORD)
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

/// Search results: a status word, then one TLV block per match.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InfoReply {
    pub status: u16,
    pub results: Vec<TlvBlock>,
}

impl InfoReply {
    pub fn encode(&self, buf: &mut BytesMut) {
        buf.put_u16(self.status);
        buf.put_u16(self.results.len() as u16);
        for result in &self.results {
            result.encode(buf);
        }
    }

    pub fn decode(cursor: &mut &[u8]) -> Result<Self> {
        ensure(cursor, 4)?;
        let status = cursor.get_u16();
        let count = cursor.get_u16() as usize;
        let mut results = Vec::with_capacity(count);
        for _ in 0..count {
            results.push(TlvBlock::decode(cursor)?);
        }
        Ok(Self { status, results })
    }
}

/// The keyword vocabulary the directory currently knows.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeywordListReply {
    pub status: u16,
    pub keywords: Vec<String>,
}

impl KeywordListReply {
    pub fn encode(&self, buf: &mut BytesMut) {
        buf.put_u16(self.status);
        buf.put_u16(self.keywords.len() as u16);
        for keyword in &self.keywords {
            put_str16(buf, keyword);
        }
    }

    pub fn decode(cursor: &mut &[u8]) -> Result<Self> {
        ensure(cursor, 4)?;
        let status = cursor.get_u16();
        let count = cursor.get_u16() as usize;
        let mut keywords = Vec::with_capacity(count);
        for _ in 0..count {
            keywords.push(get_str16(cursor)?);
        }
        Ok(Self { status, keywords })
    }
}
