//! OService payloads (food group 0x0001): the service handshake, rate
//! parameter tables and user-info updates.

use bytes::{Buf, BufMut, BytesMut};

use crate::error::Result;
use crate::payloads::ensure;
use crate::tlv::TlvList;
use crate::userinfo::UserInfo;

/// TLV tags used in service request/response payloads.
pub mod tags {
    pub const ROOM_COOKIE: u16 = 0x0001;
    pub const RECONNECT_HERE: u16 = 0x0005;
    pub const AUTHORIZATION_COOKIE: u16 = 0x0006;
    pub const GROUP_ID: u16 = 0x000D;
}

/// Rate-limit notification codes (subgroup 0x000A).
pub mod rate_code {
    pub const CHANGED: u16 = 0x0001;
    pub const WARNING: u16 = 0x0002;
    pub const LIMITED: u16 = 0x0003;
    pub const CLEAR: u16 = 0x0004;
}

/// The food groups the BOS connection advertises in HostOnline.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HostOnline {
    pub food_groups: Vec<u16>,
}

impl HostOnline {
    pub fn encode(&self, buf: &mut BytesMut) {
        for fg in &self.food_groups {
            buf.put_u16(*fg);
        }
    }

    pub fn decode(cursor: &mut &[u8]) -> Result<Self> {
        let mut food_groups = Vec::new();
        while cursor.len() >= 2 {
            food_groups.push(cursor.get_u16());
        }
        Ok(Self { food_groups })
    }
}

/// (food group, version) pairs; same layout for ClientVersions and
/// HostVersions.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Versions {
    pub pairs: Vec<(u16, u16)>,
}

impl Versions {
    pub fn encode(&self, buf: &mut BytesMut) {
        for (fg, version) in &self.pairs {
            buf.put_u16(*fg);
            buf.put_u16(*version);
        }
    }

    pub fn decode(cursor: &mut &[u8]) -> Result<Self> {
        let mut pairs = Vec::new();
        while cursor.len() >= 4 {
            pairs.push((cursor.get_u16(), cursor.get_u16()));
        }
        Ok(Self { pairs })
    }
}

/// Client asks to be routed to another service (chat, chat-nav, BART).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ServiceRequest {
    pub food_group: u16,
    pub tlvs: TlvList,
}

impl ServiceRequest {
    pub fn encode(&self, buf: &mut BytesMut) {
        buf.put_u16(self.food_group);
        self.tlvs.encode(buf);
    }

    pub fn decode(cursor: &mut &[u8]) -> Result<Self> {
        ensure(cursor, 2)?;
        let food_group = cursor.get_u16();
        let tlvs = TlvList::decode(cursor)?;
        Ok(Self { food_group, tlvs })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ServiceResponse {
    pub tlvs: TlvList,
}

impl ServiceResponse {
    pub fn encode(&self, buf: &mut BytesMut) {
        self.tlvs.encode(buf);
    }

    pub fn decode(cursor: &mut &[u8]) -> Result<Self> {
        Ok(Self {
            tlvs: TlvList::decode(cursor)?,
        })
    }
}

/// One rate class row of the rate parameter table.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RateClassParams {
    pub id: u16,
    pub window_ms: u32,
    pub clear_level: u32,
    pub alert_level: u32,
    pub limit_level: u32,
    pub disconnect_level: u32,
    pub current_level: u32,
    pub max_level: u32,
    pub last_time: u32,
    pub current_state: u8,
}

impl RateClassParams {
    pub fn encode(&self, buf: &mut BytesMut) {
        buf.put_u16(self.id);
        buf.put_u32(self.window_ms);
        buf.put_u32(self.clear_level);
        buf.put_u32(self.alert_level);
        buf.put_u32(self.limit_level);
        buf.put_u32(self.disconnect_level);
        buf.put_u32(self.current_level);
        buf.put_u32(self.max_level);
        buf.put_u32(self.last_time);
        buf.put_u8(self.current_state);
    }

    pub fn decode(cursor: &mut &[u8]) -> Result<Self> {
        ensure(cursor, 35)?;
        Ok(Self {
            id: cursor.get_u16(),
            window_ms: cursor.get_u32(),
            clear_level: cursor.get_u32(),
            alert_level: cursor.get_u32(),
            limit_level: cursor.get_u32(),
            disconnect_level: cursor.get_u32(),
            current_level: cursor.get_u32(),
            max_level: cursor.get_u32(),
            last_time: cursor.get_u32(),
            current_state: cursor.get_u8(),
        })
    }
}

/// Membership of SNAC ids in a rate class.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RateGroup {
    pub id: u16,
    pub pairs: Vec<(u16, u16)>,
}

impl RateGroup {
    pub fn encode(&self, buf: &mut BytesMut) {
        buf.put_u16(self.id);
        buf.put_u16(self.pairs.len() as u16);
        for (fg, sub) in &self.pairs {
            buf.put_u16(*fg);
            buf.put_u16(*sub);
        }
    }

    pub fn decode(cursor: &mut &[u8]) -> Result<Self> {
        ensure(cursor, 4)?;
        let id = cursor.get_u16();
        let count = cursor.get_u16() as usize;
        ensure(cursor, count * 4)?;
        let mut pairs = Vec::with_capacity(count);
        for _ in 0..count {
            pairs.push((cursor.get_u16(), cursor.get_u16()));
        }
        Ok(Self { id, pairs })
    }
}

/// The full class table sent in response to a rate params query.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RateParamsReply {
    pub classes: Vec<RateClassParams>,
    pub groups: Vec<RateGroup>,
}

impl RateParamsReply {
    pub fn encode(&self, buf: &mut BytesMut) {
        buf.put_u16(self.classes.len() as u16);
        for class in &self.classes {
            class.encode(buf);
        }
        for group in &self.groups {
            group.encode(buf);
        }
    }

    pub fn decode(cursor: &mut &[u8]) -> Result<Self> {
        ensure(cursor, 2)?;
        let count = cursor.get_u16() as usize;
        let mut classes = Vec::with_capacity(count);
        for _ in 0..count {
            classes.push(RateClassParams::decode(cursor)?);
        }
        let mut groups = Vec::new();
        while !cursor.is_empty() {
            groups.push(RateGroup::decode(cursor)?);
        }
        Ok(Self { classes, groups })
    }
}

/// Client acknowledges rate classes (subgroup 0x0008).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RateParamsSubAdd {
    pub class_ids: Vec<u16>,
}

impl RateParamsSubAdd {
    pub fn encode(&self, buf: &mut BytesMut) {
        for id in &self.class_ids {
            buf.put_u16(*id);
        }
    }

    pub fn decode(cursor: &mut &[u8]) -> Result<Self> {
        let mut class_ids = Vec::new();
        while cursor.len() >= 2 {
            class_ids.push(cursor.get_u16());
        }
        Ok(Self { class_ids })
    }
}

/// Server-initiated rate warning/limit notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitNotification {
    pub code: u16,
    pub class: RateClassParams,
}

impl RateLimitNotification {
    pub fn encode(&self, buf: &mut BytesMut) {
        buf.put_u16(self.code);
        self.class.encode(buf);
    }

    pub fn decode(cursor: &mut &[u8]) -> Result<Self> {
        ensure(cursor, 2)?;
        let code = cursor.get_u16();
        let class = RateClassParams::decode(cursor)?;
        Ok(Self { code, class })
    }
}

/// The session's own user-info block, sent after sign-on and on change.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserInfoUpdate {
    pub user_info: UserInfo,
}

impl UserInfoUpdate {
    pub fn encode(&self, buf: &mut BytesMut) {
        self.user_info.encode(buf);
    }

    pub fn decode(cursor: &mut &[u8]) -> Result<Self> {
        Ok(Self {
            user_info: UserInfo::decode(cursor)?,
        })
    }
}

/// Client reports seconds of idleness; 0 clears idle state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IdleNotification {
    pub idle_secs: u32,
}

impl IdleNotification {
    pub fn encode(&self, buf: &mut BytesMut) {
        buf.put_u32(self.idle_secs);
    }

    pub fn decode(cursor: &mut &[u8]) -> Result<Self> {
        ensure(cursor, 4)?;
        Ok(Self {
            idle_secs: cursor.get_u32(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snac::foodgroup;

    #[test]
    fn host_online_roundtrip() {
        let payload = HostOnline {
            food_groups: vec![foodgroup::OSERVICE, foodgroup::ICBM, foodgroup::FEEDBAG],
        };
        let mut buf = BytesMut::new();
        payload.encode(&mut buf);
        let mut cursor = &buf[..];
        assert_eq!(HostOnline::decode(&mut cursor).unwrap(), payload);
    }

    #[test]
    fn rate_params_reply_roundtrip() {
        let payload = RateParamsReply {
            classes: vec![RateClassParams {
                id: 1,
                window_ms: 1000,
                clear_level: 800,
                alert_level: 600,
                limit_level: 400,
                disconnect_level: 200,
                current_level: 1000,
                max_level: 1000,
                last_time: 0,
                current_state: 0,
            }],
            groups: vec![RateGroup {
                id: 1,
                pairs: vec![(foodgroup::ICBM, 0x0006), (foodgroup::LOCATE, 0x0004)],
            }],
        };
        let mut buf = BytesMut::new();
        payload.encode(&mut buf);
        let mut cursor = &buf[..];
        assert_eq!(RateParamsReply::decode(&mut cursor).unwrap(), payload);
    }

    #[test]
    fn service_request_roundtrip() {
        use crate::tlv::Tlv;
        let payload = ServiceRequest {
            food_group: foodgroup::CHAT,
            tlvs: TlvList::new().with(Tlv::new(tags::ROOM_COOKIE, vec![9; 20])),
        };
        let mut buf = BytesMut::new();
        payload.encode(&mut buf);
        let mut cursor = &buf[..];
        assert_eq!(ServiceRequest::decode(&mut cursor).unwrap(), payload);
    }

    #[test]
    fn idle_notification_roundtrip() {
        let payload = IdleNotification { idle_secs: 600 };
        let mut buf = BytesMut::new();
        payload.encode(&mut buf);
        let mut cursor = &buf[..];
        assert_eq!(IdleNotification::decode(&mut cursor).unwrap(), payload);
    }
}
