//! Chat navigation: exchange advertising and room creation, served on the
//! BOS connection. The room cookie minted here is the one chat joins use.

use std::sync::Arc;

use uuid::Uuid;

use causerie_wire::payloads::chat_nav::{
    ExchangeInfo, NavInfo, RoomInfo, RoomQuery, EXCHANGE_PRIVATE, EXCHANGE_PUBLIC,
};
use causerie_wire::snac::{chat_nav, errcode, foodgroup, SnacFrame};

use crate::error::Result;
use crate::services::Services;
use crate::session::{Session, SnacMessage};

pub fn route(
    services: &Services,
    session: &Arc<Session>,
    frame: SnacFrame,
    body: &[u8],
) -> Result<Vec<SnacMessage>> {
    let _ = session;
    let mut cursor = body;
    match frame.subgroup {
        chat_nav::REQUEST_CHAT_RIGHTS => Ok(vec![chat_rights(frame)]),
        chat_nav::CREATE_ROOM => create_room(services, frame, &mut cursor),
        chat_nav::REQUEST_ROOM_INFO => room_info(services, frame, &mut cursor),
        _ => Ok(vec![SnacMessage::error(frame, errcode::INVALID_SNAC)]),
    }
}

fn chat_rights(frame: SnacFrame) -> SnacMessage {
    let reply = SnacFrame::reply_to(frame, foodgroup::CHAT_NAV, chat_nav::NAV_INFO);
    let nav = NavInfo::with_exchanges(&[ExchangeInfo::public()]);
    SnacMessage::new(reply, |buf| nav.encode(buf))
}

/// Allocate a room on first request. The client sends a room-info shape
/// whose name TLV carries the room name; the reply echoes the full room
/// description with the server-assigned cookie.
fn create_room(
    services: &Services,
    frame: SnacFrame,
    cursor: &mut &[u8],
) -> Result<Vec<SnacMessage>> {
    let request = RoomInfo::decode(cursor)?;
    let Some(name) = request.name() else {
        return Ok(vec![SnacMessage::error(frame, errcode::INVALID_SNAC)]);
    };
    let exchange = match request.exchange {
        EXCHANGE_PUBLIC => EXCHANGE_PUBLIC,
        _ => EXCHANGE_PRIVATE,
    };

    let room = services.rooms.create(&name, exchange);
    let reply = SnacFrame::reply_to(frame, foodgroup::CHAT_NAV, chat_nav::NAV_INFO);
    let nav = NavInfo::with_room(&room.room_info());
    Ok(vec![SnacMessage::new(reply, |buf| nav.encode(buf))])
}

fn room_info(
    services: &Services,
    frame: SnacFrame,
    cursor: &mut &[u8],
) -> Result<Vec<SnacMessage>> {
    let query = RoomQuery::decode(cursor)?;
    let room = Uuid::parse_str(&query.cookie)
        .ok()
        .and_then(|cookie| services.rooms.get(cookie));
    let Some(room) = room else {
        return Ok(vec![SnacMessage::error(frame, errcode::NOT_AVAILABLE)]);
    };

    let reply = SnacFrame::reply_to(frame, foodgroup::CHAT_NAV, chat_nav::NAV_INFO);
    let nav = NavInfo::with_room(&room.room_info());
    Ok(vec![SnacMessage::new(reply, |buf| nav.encode(buf))])
}
