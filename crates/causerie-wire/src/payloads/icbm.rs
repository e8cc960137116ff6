//! ICBM payloads (food group 0x0004): instant messages, acks and typing
//! events.

use bytes::{Buf, BufMut, BytesMut};

use crate::error::Result;
use crate::payloads::ensure;
use crate::strings::{get_str8, put_str8};
use crate::tlv::TlvList;
use crate::userinfo::UserInfo;

/// TLV tags in channel messages.
pub mod tags {
    pub const MESSAGE: u16 = 0x0002;
    pub const ACK_REQUESTED: u16 = 0x0003;
    pub const AUTO_RESPONSE: u16 = 0x0004;
    pub const STORE_OFFLINE: u16 = 0x0006;
}

/// Typing-notification event codes.
pub mod event {
    pub const TYPING_FINISHED: u16 = 0x0000;
    pub const TYPED: u16 = 0x0001;
    pub const TYPING_BEGUN: u16 = 0x0002;
}

/// Channel 1 carries plain instant messages.
pub const CHANNEL_IM: u16 = 0x0001;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParameterReply {
    pub max_slots: u16,
    pub icbm_flags: u32,
    pub max_incoming_len: u16,
    pub max_source_evil: u16,
    pub max_destination_evil: u16,
    pub min_inter_icbm_interval: u32,
}

impl Default for ParameterReply {
    fn default() -> Self {
        Self {
            max_slots: 100,
            icbm_flags: 0x0000_0001,
            max_incoming_len: 8000,
            max_source_evil: 999,
            max_destination_evil: 999,
            min_inter_icbm_interval: 100,
        }
    }
}

impl ParameterReply {
    pub fn encode(&self, buf: &mut BytesMut) {
        buf.put_u16(self.max_slots);
        buf.put_u32(self.icbm_flags);
        buf.put_u16(self.max_incoming_len);
        buf.put_u16(self.max_source_evil);
        buf.put_u16(self.max_destination_evil);
        buf.put_u32(self.min_inter_icbm_interval);
    }

    pub fn decode(cursor: &mut &[u8]) -> Result<Self> {
        ensure(cursor, 16)?;
        Ok(Self {
            max_slots: cursor.get_u16(),
            icbm_flags: cursor.get_u32(),
            max_incoming_len: cursor.get_u16(),
            max_source_evil: cursor.get_u16(),
            max_destination_evil: cursor.get_u16(),
            min_inter_icbm_interval: cursor.get_u32(),
        })
    }
}

/// Client → server message: cookie, channel, recipient, message TLVs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChannelMsgToHost {
    pub cookie: u64,
    pub channel: u16,
    pub screen_name: String,
    pub tlvs: TlvList,
}

impl ChannelMsgToHost {
    pub fn message(&self) -> Option<&[u8]> {
        self.tlvs.bytes(tags::MESSAGE)
    }

    pub fn wants_ack(&self) -> bool {
        self.tlvs.has(tags::ACK_REQUESTED)
    }

    pub fn wants_offline_storage(&self) -> bool {
        self.tlvs.has(tags::STORE_OFFLINE)
    }

    pub fn encode(&self, buf: &mut BytesMut) {
        buf.put_u64(self.cookie);
        buf.put_u16(self.channel);
        put_str8(buf, &self.screen_name);
        self.tlvs.encode(buf);
    }

    pub fn decode(cursor: &mut &[u8]) -> Result<Self> {
        ensure(cursor, 10)?;
        let cookie = cursor.get_u64();
        let channel = cursor.get_u16();
        let screen_name = get_str8(cursor)?;
        let tlvs = TlvList::decode(cursor)?;
        Ok(Self {
            cookie,
            channel,
            screen_name,
            tlvs,
        })
    }
}

/// Server → recipient message: the original cookie is echoed, the sender
/// appears as a full user-info block.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChannelMsgToClient {
    pub cookie: u64,
    pub channel: u16,
    pub sender: UserInfo,
    pub tlvs: TlvList,
}

impl ChannelMsgToClient {
    pub fn encode(&self, buf: &mut BytesMut) {
        buf.put_u64(self.cookie);
        buf.put_u16(self.channel);
        self.sender.encode(buf);
        self.tlvs.encode(buf);
    }

    pub fn decode(cursor: &mut &[u8]) -> Result<Self> {
        ensure(cursor, 10)?;
        let cookie = cursor.get_u64();
        let channel = cursor.get_u16();
        let sender = UserInfo::decode(cursor)?;
        let tlvs = TlvList::decode(cursor)?;
        Ok(Self {
            cookie,
            channel,
            sender,
            tlvs,
        })
    }
}

/// Sent to the sender when it asked for an ack and the message was accepted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HostAck {
    pub cookie: u64,
    pub channel: u16,
    pub screen_name: String,
}

impl HostAck {
    pub fn encode(&self, buf: &mut BytesMut) {
        buf.put_u64(self.cookie);
        buf.put_u16(self.channel);
        put_str8(buf, &self.screen_name);
    }

    pub fn decode(cursor: &mut &[u8]) -> Result<Self> {
        ensure(cursor, 10)?;
        Ok(Self {
            cookie: cursor.get_u64(),
            channel: cursor.get_u16(),
            screen_name: get_str8(cursor)?,
        })
    }
}

/// Typing notification, forwarded verbatim with the peer name swapped.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClientEvent {
    pub cookie: u64,
    pub channel: u16,
    pub screen_name: String,
    pub event: u16,
}

impl ClientEvent {
    pub fn encode(&self, buf: &mut BytesMut) {
        buf.put_u64(self.cookie);
        buf.put_u16(self.channel);
        put_str8(buf, &self.screen_name);
        buf.put_u16(self.event);
    }

    pub fn decode(cursor: &mut &[u8]) -> Result<Self> {
        ensure(cursor, 10)?;
        let cookie = cursor.get_u64();
        let channel = cursor.get_u16();
        let screen_name = get_str8(cursor)?;
        ensure(cursor, 2)?;
        let event = cursor.get_u16();
        Ok(Self {
            cookie,
            channel,
            screen_name,
            event,
        })
    }
}
