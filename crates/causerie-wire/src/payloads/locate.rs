//! Locate payloads (food group 0x0002): profiles, away messages and peer
//! info queries.

use bytes::{Buf, BufMut, BytesMut};

use crate::error::Result;
use crate::payloads::ensure;
use crate::strings::{get_str8, put_str8};
use crate::tlv::{Tlv, TlvList};
use crate::userinfo::UserInfo;

/// TLV tags in SetInfo and the rights reply.
pub mod tags {
    pub const PROFILE_MIME: u16 = 0x0001;
    pub const PROFILE: u16 = 0x0002;
    pub const AWAY_MIME: u16 = 0x0003;
    pub const AWAY_MESSAGE: u16 = 0x0004;
    pub const CAPABILITIES: u16 = 0x0005;
    pub const MAX_PROFILE_LEN: u16 = 0x0001;
    pub const MAX_CAPABILITIES: u16 = 0x0002;
}

/// Request-type bits for UserInfoQuery.
pub mod query_type {
    pub const PROFILE: u16 = 0x0001;
    pub const AWAY_MESSAGE: u16 = 0x0002;
    pub const CAPABILITIES: u16 = 0x0004;
}

pub const DEFAULT_MAX_PROFILE_LEN: u16 = 1024;
pub const DEFAULT_MAX_CAPABILITIES: u16 = 64;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RightsReply {
    pub tlvs: TlvList,
}

impl RightsReply {
    pub fn defaults() -> Self {
        Self {
            tlvs: TlvList::new()
                .with(Tlv::u16(tags::MAX_PROFILE_LEN, DEFAULT_MAX_PROFILE_LEN))
                .with(Tlv::u16(tags::MAX_CAPABILITIES, DEFAULT_MAX_CAPABILITIES)),
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

/// Each field travels in its own TLV; an absent tag means "leave unchanged".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SetInfo {
    pub tlvs: TlvList,
}

impl SetInfo {
    pub fn profile(&self) -> Option<String> {
        self.tlvs.str(tags::PROFILE)
    }

    pub fn away_message(&self) -> Option<String> {
        self.tlvs.str(tags::AWAY_MESSAGE)
    }

    pub fn capabilities(&self) -> Option<&[u8]> {
        self.tlvs.bytes(tags::CAPABILITIES)
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

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserInfoQuery {
    pub request_type: u16,
    pub screen_name: String,
}

impl UserInfoQuery {
    pub fn encode(&self, buf: &mut BytesMut) {
        buf.put_u16(self.request_type);
        put_str8(buf, &self.screen_name);
    }

    pub fn decode(cursor: &mut &[u8]) -> Result<Self> {
        ensure(cursor, 2)?;
        let request_type = cursor.get_u16();
        let screen_name = get_str8(cursor)?;
        Ok(Self {
            request_type,
            screen_name,
        })
    }
}

/// The peer's user-info block followed by the requested profile/away TLVs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserInfoReply {
    pub user_info: UserInfo,
    pub tlvs: TlvList,
}

impl UserInfoReply {
    pub fn encode(&self, buf: &mut BytesMut) {
        self.user_info.encode(buf);
        self.tlvs.encode(buf);
    }

    pub fn decode(cursor: &mut &[u8]) -> Result<Self> {
        let user_info = UserInfo::decode(cursor)?;
        let tlvs = TlvList::decode(cursor)?;
        Ok(Self { user_info, tlvs })
    }
}
