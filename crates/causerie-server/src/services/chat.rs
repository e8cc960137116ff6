//! Chat: in-room messaging and occupancy notifications. Each chat
//! connection carries its own session scoped to the room's registry.

use std::sync::Arc;

use causerie_wire::payloads::chat::{ChannelMsgToClient, ChannelMsgToHost, Users};
use causerie_wire::snac::{chat, errcode, foodgroup, SnacFrame};

use crate::chat::ChatRoom;
use crate::error::Result;
use crate::services::Services;
use crate::session::{Session, SnacMessage};

pub fn route(
    services: &Services,
    room: &Arc<ChatRoom>,
    session: &Arc<Session>,
    frame: SnacFrame,
    body: &[u8],
) -> Result<Vec<SnacMessage>> {
    let _ = services;
    let mut cursor = body;
    match frame.subgroup {
        chat::CHANNEL_MSG_TO_HOST => msg_to_host(room, session, &mut cursor),
        _ => Ok(vec![SnacMessage::error(frame, errcode::INVALID_SNAC)]),
    }
}

fn users_message(subgroup: u16, users: Vec<causerie_wire::userinfo::UserInfo>) -> SnacMessage {
    SnacMessage::new(SnacFrame::new(foodgroup::CHAT, subgroup), |buf| {
        Users { users }.encode(buf)
    })
}

/// Announce a join: the newcomer gets an occupancy snapshot of everyone
/// already present, then every occupant (newcomer included) learns of the
/// join. A first occupant triggers no events.
pub fn announce_join(room: &ChatRoom, joiner: &Arc<Session>) {
    let others: Vec<_> = room
        .registry()
        .matching(|s| s.id() != joiner.id() && s.is_ready())
        .iter()
        .map(|s| s.user_info())
        .collect();
    if others.is_empty() {
        return;
    }

    joiner.push(users_message(chat::USERS_JOINED, others));

    let joined = users_message(chat::USERS_JOINED, vec![joiner.user_info()]);
    for occupant in room.registry().matching(|s| s.is_ready()) {
        occupant.push(joined.clone());
    }
}

/// Announce a departure to everyone left behind.
pub fn announce_leave(room: &ChatRoom, leaver: &Session) {
    let left = users_message(chat::USERS_LEFT, vec![leaver.user_info()]);
    for occupant in room
        .registry()
        .matching(|s| s.id() != leaver.id() && s.is_ready())
    {
        occupant.push(left.clone());
    }
}

/// Fan a room message out to every other occupant; the sender sees its own
/// message only when the reflection flag is present.
fn msg_to_host(
    room: &ChatRoom,
    sender: &Arc<Session>,
    cursor: &mut &[u8],
) -> Result<Vec<SnacMessage>> {
    let msg = ChannelMsgToHost::decode(cursor)?;
    let reflect = msg.wants_reflection();
    let outbound = ChannelMsgToClient::from_host_msg(&msg, &sender.user_info());
    let message = SnacMessage::new(
        SnacFrame::new(foodgroup::CHAT, chat::CHANNEL_MSG_TO_CLIENT),
        |buf| outbound.encode(buf),
    );

    for occupant in room.registry().matching(|s| s.is_ready()) {
        if occupant.id() == sender.id() && !reflect {
            continue;
        }
        occupant.push(message.clone());
    }
    Ok(Vec::new())
}
