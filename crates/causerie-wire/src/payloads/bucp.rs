//! BUCP challenge/response authentication payloads (food group 0x0017).

use bytes::BytesMut;

use crate::error::Result;
use crate::payloads::ensure;
use crate::strings::{get_str16, put_str16};
use crate::tlv::{Tlv, TlvList};

/// TLV tags shared by the BUCP SNACs and the roasted FLAP sign-on frame.
pub mod tags {
    pub const SCREEN_NAME: u16 = 0x0001;
    pub const ROASTED_PASSWORD: u16 = 0x0002;
    pub const RECONNECT_HERE: u16 = 0x0005;
    pub const AUTHORIZATION_COOKIE: u16 = 0x0006;
    pub const ERROR_SUBCODE: u16 = 0x0008;
    pub const PASSWORD_HASH: u16 = 0x0025;
}

/// Login error subcodes carried in [`tags::ERROR_SUBCODE`].
pub mod errsub {
    pub const INVALID_CREDENTIALS: u16 = 0x0001;
    pub const SERVICE_UNAVAILABLE: u16 = 0x0005;
    pub const RATE_LIMITED: u16 = 0x0018;
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChallengeRequest {
    pub tlvs: TlvList,
}

impl ChallengeRequest {
    pub fn new(screen_name: &str) -> Self {
        Self {
            tlvs: TlvList::new().with(Tlv::str(tags::SCREEN_NAME, screen_name)),
        }
    }

    pub fn screen_name(&self) -> Option<String> {
        self.tlvs.str(tags::SCREEN_NAME)
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

/// Carries the user's auth salt as a 16-bit length-prefixed string.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChallengeResponse {
    pub auth_key: String,
}

impl ChallengeResponse {
    pub fn encode(&self, buf: &mut BytesMut) {
        put_str16(buf, &self.auth_key);
    }

    pub fn decode(cursor: &mut &[u8]) -> Result<Self> {
        ensure(cursor, 2)?;
        Ok(Self {
            auth_key: get_str16(cursor)?,
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoginRequest {
    pub tlvs: TlvList,
}

impl LoginRequest {
    pub fn screen_name(&self) -> Option<String> {
        self.tlvs.str(tags::SCREEN_NAME)
    }

    pub fn password_hash(&self) -> Option<&[u8]> {
        self.tlvs.bytes(tags::PASSWORD_HASH)
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
pub struct LoginResponse {
    pub tlvs: TlvList,
}

impl LoginResponse {
    pub fn success(screen_name: &str, bos_address: &str, cookie: Vec<u8>) -> Self {
        Self {
            tlvs: TlvList::new()
                .with(Tlv::str(tags::SCREEN_NAME, screen_name))
                .with(Tlv::str(tags::RECONNECT_HERE, bos_address))
                .with(Tlv::new(tags::AUTHORIZATION_COOKIE, cookie)),
        }
    }

    pub fn failure(screen_name: &str, subcode: u16) -> Self {
        Self {
            tlvs: TlvList::new()
                .with(Tlv::str(tags::SCREEN_NAME, screen_name))
                .with(Tlv::u16(tags::ERROR_SUBCODE, subcode)),
        }
    }

    pub fn error_subcode(&self) -> Option<u16> {
        self.tlvs.get_u16(tags::ERROR_SUBCODE)
    }

    pub fn cookie(&self) -> Option<&[u8]> {
        self.tlvs.bytes(tags::AUTHORIZATION_COOKIE)
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
