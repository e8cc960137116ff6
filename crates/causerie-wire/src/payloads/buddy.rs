//! Buddy payloads (food group 0x0003): the ephemeral client-side list kept
//! for 3.x clients, plus arrival/departure notifications.

use bytes::BytesMut;

use crate::error::Result;
use crate::strings::{get_str8, put_str8};
use crate::tlv::{Tlv, TlvList};
use crate::userinfo::UserInfo;

pub mod tags {
    pub const MAX_BUDDIES: u16 = 0x0001;
    pub const MAX_WATCHERS: u16 = 0x0002;
}

pub const DEFAULT_MAX_BUDDIES: u16 = 500;
pub const DEFAULT_MAX_WATCHERS: u16 = 500;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RightsReply {
    pub tlvs: TlvList,
}

impl RightsReply {
    pub fn defaults() -> Self {
        Self {
            tlvs: TlvList::new()
                .with(Tlv::u16(tags::MAX_BUDDIES, DEFAULT_MAX_BUDDIES))
                .with(Tlv::u16(tags::MAX_WATCHERS, DEFAULT_MAX_WATCHERS)),
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

/// A run of 8-bit length-prefixed screen names to the end of the frame.
/// Same layout for AddBuddies and DelBuddies.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuddyList {
    pub screen_names: Vec<String>,
}

impl BuddyList {
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

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuddyArrived {
    pub user_info: UserInfo,
}

impl BuddyArrived {
    pub fn encode(&self, buf: &mut BytesMut) {
        self.user_info.encode(buf);
    }

    pub fn decode(cursor: &mut &[u8]) -> Result<Self> {
        Ok(Self {
            user_info: UserInfo::decode(cursor)?,
        })
    }
}

/// Departures carry a minimal user-info block (name and warning only).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuddyDeparted {
    pub user_info: UserInfo,
}

impl BuddyDeparted {
    pub fn for_screen_name(screen_name: &str) -> Self {
        Self {
            user_info: UserInfo::new(screen_name),
        }
    }

    pub fn encode(&self, buf: &mut BytesMut) {
        self.user_info.encode(buf);
    }

    pub fn decode(cursor: &mut &[u8]) -> Result<Self> {
        Ok(Self {
            user_info: UserInfo::decode(cursor)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn buddy_list_roundtrip() {
        let list = BuddyList {
            screen_names: vec!["Alice".into(), "Bob Smith".into()],
        };
        let mut buf = BytesMut::new();
        list.encode(&mut buf);
        let mut cursor = &buf[..];
        assert_eq!(BuddyList::decode(&mut cursor).unwrap(), list);
    }

    #[test]
    fn arrival_roundtrip() {
        let arrived = BuddyArrived {
            user_info: UserInfo::new("Alice").with_signon_time(42),
        };
        let mut buf = BytesMut::new();
        arrived.encode(&mut buf);
        let mut cursor = &buf[..];
        assert_eq!(BuddyArrived::decode(&mut cursor).unwrap(), arrived);
    }

    #[test]
    fn departure_is_minimal() {
        let departed = BuddyDeparted::for_screen_name("Bob");
        assert_eq!(departed.user_info.screen_name, "Bob");
        assert!(departed.user_info.tlvs.0.is_empty());
    }
}
