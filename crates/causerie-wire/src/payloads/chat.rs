//! Chat payloads (food group 0x000E): in-room messaging and occupancy
//! notifications.

use bytes::{Buf, BufMut, BytesMut};

use crate::error::Result;
use crate::payloads::ensure;
use crate::tlv::{Tlv, TlvList};
use crate::userinfo::UserInfo;

/// TLV tags in chat channel messages.
pub mod tags {
    pub const PUBLIC_WHISPER: u16 = 0x0001;
    pub const SENDER_INFO: u16 = 0x0003;
    pub const MESSAGE: u16 = 0x0005;
    pub const REFLECT_TO_SENDER: u16 = 0x0006;
}

/// Joins and leaves carry a run of user-info blocks to the end of the frame.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Users {
    pub users: Vec<UserInfo>,
}

impl Users {
    pub fn encode(&self, buf: &mut BytesMut) {
        for user in &self.users {
            user.encode(buf);
        }
    }

    pub fn decode(cursor: &mut &[u8]) -> Result<Self> {
        let mut users = Vec::new();
        while !cursor.is_empty() {
            users.push(UserInfo::decode(cursor)?);
        }
        Ok(Self { users })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChannelMsgToHost {
    pub cookie: u64,
    pub channel: u16,
    pub tlvs: TlvList,
}

impl ChannelMsgToHost {
    pub fn message(&self) -> Option<&[u8]> {
        self.tlvs.bytes(tags::MESSAGE)
    }

    pub fn wants_reflection(&self) -> bool {
        self.tlvs.has(tags::REFLECT_TO_SENDER)
    }

    pub fn encode(&self, buf: &mut BytesMut) {
        buf.put_u64(self.cookie);
        buf.put_u16(self.channel);
        self.tlvs.encode(buf);
    }

    pub fn decode(cursor: &mut &[u8]) -> Result<Self> {
        ensure(cursor, 10)?;
        let cookie = cursor.get_u64();
        let channel = cursor.get_u16();
        let tlvs = TlvList::decode(cursor)?;
        Ok(Self {
            cookie,
            channel,
            tlvs,
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChannelMsgToClient {
    pub cookie: u64,
    pub channel: u16,
    pub tlvs: TlvList,
}

impl ChannelMsgToClient {
    /// Fan-out form of an inbound room message: the sender's user-info is
    /// attached so occupants can attribute it.
    pub fn from_host_msg(msg: &ChannelMsgToHost, sender: &UserInfo) -> Self {
        let mut sender_buf = BytesMut::new();
        sender.encode(&mut sender_buf);
        let mut tlvs = TlvList::new().with(Tlv::new(tags::SENDER_INFO, sender_buf.to_vec()));
        if let Some(message) = msg.message() {
            tlvs.push(Tlv::new(tags::MESSAGE, message.to_vec()));
        }
        Self {
            cookie: msg.cookie,
            channel: msg.channel,
            tlvs,
        }
    }

    pub fn sender(&self) -> Option<UserInfo> {
        let raw = self.tlvs.bytes(tags::SENDER_INFO)?;
        let mut cursor = raw;
        UserInfo::decode(&mut cursor).ok()
    }

    pub fn encode(&self, buf: &mut BytesMut) {
        buf.put_u64(self.cookie);
        buf.put_u16(self.channel);
        self.tlvs.encode(buf);
    }

    pub fn decode(cursor: &mut &[u8]) -> Result<Self> {
        ensure(cursor, 10)?;
        let cookie = cursor.get_u64();
        let channel = cursor.get_u16();
        let tlvs = TlvList::decode(cursor)?;
        Ok(Self {
            cookie,
            channel,
            tlvs,
        })
    }
}
