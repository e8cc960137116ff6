//! Ephemeral chat rooms and the room registry.
//!
//! A room is created by chat-nav, keyed by a server-assigned uuid cookie,
//! and owns a session registry scoped to its occupants. The chat-nav-minted
//! cookie and the chat-join cookie are the same value. A room disappears
//! when its last occupant leaves.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use chrono::{DateTime, Utc};
use uuid::Uuid;

use causerie_wire::payloads::chat_nav::{tags, RoomInfo};
use causerie_wire::tlv::{Tlv, TlvBlock, TlvList};

use crate::session::SessionRegistry;

pub const ROOM_MAX_OCCUPANCY: u16 = 100;
pub const ROOM_MAX_MSG_LEN: u16 = 1024;
pub const ROOM_DETAIL_LEVEL: u8 = 2;
pub const ROOM_INSTANCE: u16 = 100;

pub struct ChatRoom {
    cookie: Uuid,
    name: String,
    exchange: u16,
    create_time: DateTime<Utc>,
    registry: SessionRegistry,
}

impl ChatRoom {
    pub fn new(name: impl Into<String>, exchange: u16) -> Arc<Self> {
        Arc::new(Self {
            cookie: Uuid::new_v4(),
            name: name.into(),
            exchange,
            create_time: Utc::now(),
            registry: SessionRegistry::new(),
        })
    }

    pub fn cookie(&self) -> Uuid {
        self.cookie
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn registry(&self) -> &SessionRegistry {
        &self.registry
    }

    fn metadata(&self) -> TlvList {
        TlvList::new()
            .with(Tlv::u16(tags::ROOM_FLAGS, 0x0000))
            .with(Tlv::u32(
                tags::ROOM_CREATE_TIME,
                self.create_time.timestamp() as u32,
            ))
            .with(Tlv::u16(tags::ROOM_MAX_MSG_LEN, ROOM_MAX_MSG_LEN))
            .with(Tlv::u16(tags::ROOM_MAX_OCCUPANCY, ROOM_MAX_OCCUPANCY))
            .with(Tlv::str(tags::ROOM_NAME, &self.name))
            .with(Tlv::str(tags::ROOM_CHARSET, "us-ascii"))
            .with(Tlv::str(tags::ROOM_LANG, "en"))
    }

    /// The wire description handed to chat-nav and chat clients.
    pub fn room_info(&self) -> RoomInfo {
        RoomInfo {
            exchange: self.exchange,
            cookie: self.cookie.to_string(),
            instance: ROOM_INSTANCE,
            detail_level: ROOM_DETAIL_LEVEL,
            tlvs: TlvBlock(self.metadata()),
        }
    }
}

#[derive(Default)]
pub struct ChatRegistry {
    rooms: RwLock<HashMap<Uuid, Arc<ChatRoom>>>,
}

impl ChatRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create(&self, name: &str, exchange: u16) -> Arc<ChatRoom> {
        let room = ChatRoom::new(name, exchange);
        self.rooms
            .write()
            .expect("chat registry lock poisoned")
            .insert(room.cookie(), room.clone());
        tracing::info!(room = %room.cookie(), name = %room.name(), "chat room created");
        room
    }

    pub fn get(&self, cookie: Uuid) -> Option<Arc<ChatRoom>> {
        self.rooms
            .read()
            .expect("chat registry lock poisoned")
            .get(&cookie)
            .cloned()
    }

    /// Drop the room if its registry is empty. Returns true when removed.
    pub fn remove_if_empty(&self, cookie: Uuid) -> bool {
        let mut rooms = self.rooms.write().expect("chat registry lock poisoned");
        if let Some(room) = rooms.get(&cookie) {
            if room.registry().is_empty() {
                rooms.remove(&cookie);
                tracing::info!(room = %cookie, "chat room removed, last occupant left");
                return true;
            }
        }
        false
    }
}
