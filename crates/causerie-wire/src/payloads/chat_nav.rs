//! Chat navigation payloads (food group 0x000D): exchange advertising and
//! room creation.

use bytes::{Buf, BufMut, BytesMut};

use crate::error::Result;
use crate::payloads::ensure;
use crate::strings::{get_str8, put_str8};
use crate::tlv::{Tlv, TlvBlock, TlvList};

/// TLV tags in nav-info and room-info payloads.
pub mod tags {
    pub const MAX_CONCURRENT_ROOMS: u16 = 0x0002;
    pub const EXCHANGE_INFO: u16 = 0x0003;
    pub const ROOM_INFO: u16 = 0x0004;

    pub const ROOM_FLAGS: u16 = 0x00C9;
    pub const ROOM_CREATE_TIME: u16 = 0x00CA;
    pub const ROOM_MAX_MSG_LEN: u16 = 0x00D1;
    pub const ROOM_MAX_OCCUPANCY: u16 = 0x00D2;
    pub const ROOM_NAME: u16 = 0x00D3;
    pub const ROOM_CHARSET: u16 = 0x00D6;
    pub const ROOM_LANG: u16 = 0x00D7;
}

/// Public exchange id; dynamically created rooms live on exchange 5.
pub const EXCHANGE_PUBLIC: u16 = 4;
pub const EXCHANGE_PRIVATE: u16 = 5;

pub const DEFAULT_MAX_CONCURRENT_ROOMS: u8 = 10;

/// Exchange metadata advertised in the chat-rights reply.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExchangeInfo {
    pub identifier: u16,
    pub tlvs: TlvBlock,
}

impl ExchangeInfo {
    pub fn public() -> Self {
        Self {
            identifier: EXCHANGE_PUBLIC,
            tlvs: TlvBlock(
                TlvList::new()
                    .with(Tlv::u16(0x0002, 0x0010))
                    .with(Tlv::u16(tags::ROOM_FLAGS, 15))
                    .with(Tlv::str(tags::ROOM_NAME, "default Exchange"))
                    .with(Tlv::str(tags::ROOM_CHARSET, "us-ascii"))
                    .with(Tlv::str(tags::ROOM_LANG, "en")),
            ),
        }
    }

    pub fn encode(&self, buf: &mut BytesMut) {
        buf.put_u16(self.identifier);
        self.tlvs.encode(buf);
    }

    pub fn decode(cursor: &mut &[u8]) -> Result<Self> {
        ensure(cursor, 2)?;
        let identifier = cursor.get_u16();
        let tlvs = TlvBlock::decode(cursor)?;
        Ok(Self { identifier, tlvs })
    }
}

/// Room description: exchange, cookie, instance, detail level, TLV block.
/// The same layout serves the client's create-room request and the server's
/// room-info replies.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RoomInfo {
    pub exchange: u16,
    pub cookie: String,
    pub instance: u16,
    pub detail_level: u8,
    pub tlvs: TlvBlock,
}

impl RoomInfo {
    pub fn name(&self) -> Option<String> {
        self.tlvs.0.str(tags::ROOM_NAME)
    }

    pub fn encode(&self, buf: &mut BytesMut) {
        buf.put_u16(self.exchange);
        put_str8(buf, &self.cookie);
        buf.put_u16(self.instance);
        buf.put_u8(self.detail_level);
        self.tlvs.encode(buf);
    }

    pub fn decode(cursor: &mut &[u8]) -> Result<Self> {
        ensure(cursor, 2)?;
        let exchange = cursor.get_u16();
        let cookie = get_str8(cursor)?;
        ensure(cursor, 3)?;
        let instance = cursor.get_u16();
        let detail_level = cursor.get_u8();
        let tlvs = TlvBlock::decode(cursor)?;
        Ok(Self {
            exchange,
            cookie,
            instance,
            detail_level,
            tlvs,
        })
    }
}

/// A room lookup by cookie (subgroup 0x0004): exchange, cookie, instance.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RoomQuery {
    pub exchange: u16,
    pub cookie: String,
    pub instance: u16,
}

impl RoomQuery {
    pub fn encode(&self, buf: &mut BytesMut) {
        buf.put_u16(self.exchange);
        put_str8(buf, &self.cookie);
        buf.put_u16(self.instance);
    }

    pub fn decode(cursor: &mut &[u8]) -> Result<Self> {
        ensure(cursor, 2)?;
        let exchange = cursor.get_u16();
        let cookie = get_str8(cursor)?;
        ensure(cursor, 2)?;
        let instance = cursor.get_u16();
        Ok(Self {
            exchange,
            cookie,
            instance,
        })
    }
}

/// The nav-info reply wrapping exchange or room info TLVs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NavInfo {
    pub tlvs: TlvList,
}

impl NavInfo {
    pub fn with_exchanges(exchanges: &[ExchangeInfo]) -> Self {
        let mut tlvs =
            TlvList::new().with(Tlv::u8(tags::MAX_CONCURRENT_ROOMS, DEFAULT_MAX_CONCURRENT_ROOMS));
        for exchange in exchanges {
            let mut buf = BytesMut::new();
            exchange.encode(&mut buf);
            tlvs.push(Tlv::new(tags::EXCHANGE_INFO, buf.to_vec()));
        }
        Self { tlvs }
    }

    pub fn with_room(room: &RoomInfo) -> Self {
        let mut buf = BytesMut::new();
        room.encode(&mut buf);
        Self {
            tlvs: TlvList::new().with(Tlv::new(tags::ROOM_INFO, buf.to_vec())),
        }
    }

    pub fn room_info(&self) -> Option<RoomInfo> {
        let raw = self.tlvs.bytes(tags::ROOM_INFO)?;
        let mut cursor = raw;
        RoomInfo::decode(&mut cursor).ok()
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn room_info_roundtrip() {
        let room = RoomInfo {
            exchange: EXCHANGE_PUBLIC,
            cookie: "8c3bc586-e6c0-47ec-8a1c-7cdb1c14b849".into(),
            instance: 100,
            detail_level: 2,
            tlvs: TlvBlock(
                TlvList::new()
                    .with(Tlv::str(tags::ROOM_NAME, "Lobby"))
                    .with(Tlv::u16(tags::ROOM_MAX_OCCUPANCY, 100)),
            ),
        };
        let mut buf = BytesMut::new();
        room.encode(&mut buf);
        let mut cursor = &buf[..];
        let decoded = RoomInfo::decode(&mut cursor).unwrap();
        assert_eq!(decoded, room);
        assert_eq!(decoded.name().as_deref(), Some("Lobby"));
    }

    #[test]
    fn nav_info_embeds_room() {
        let room = RoomInfo {
            exchange: EXCHANGE_PRIVATE,
            cookie: "cookie".into(),
            instance: 100,
            detail_level: 2,
            tlvs: TlvBlock(TlvList::new().with(Tlv::str(tags::ROOM_NAME, "Lobby"))),
        };
        let nav = NavInfo::with_room(&room);
        assert_eq!(nav.room_info().unwrap(), room);
    }

    #[test]
    fn room_query_roundtrip() {
        let query = RoomQuery {
            exchange: EXCHANGE_PRIVATE,
            cookie: "8c3bc586-e6c0-47ec-8a1c-7cdb1c14b849".into(),
            instance: 100,
        };
        let mut buf = BytesMut::new();
        query.encode(&mut buf);
        let mut cursor = &buf[..];
        assert_eq!(RoomQuery::decode(&mut cursor).unwrap(), query);
    }

    #[test]
    fn nav_info_exchange_listing_roundtrip() {
        let nav = NavInfo::with_exchanges(&[ExchangeInfo::public()]);
        let mut buf = BytesMut::new();
        nav.encode(&mut buf);
        let mut cursor = &buf[..];
        let decoded = NavInfo::decode(&mut cursor).unwrap();
        assert_eq!(decoded, nav);
        assert_eq!(decoded.tlvs.get_u8(tags::MAX_CONCURRENT_ROOMS), Some(10));
    }
}
