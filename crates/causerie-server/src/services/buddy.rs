//! Buddy: the ephemeral client-side list 3.x clients manage in place of a
//! feedbag. The list lives in session state and dies with the session.

use std::sync::Arc;

use causerie_store::ident_of;
use causerie_wire::payloads::buddy::{BuddyArrived, BuddyList, RightsReply};
use causerie_wire::snac::{buddy, errcode, foodgroup, SnacFrame};

use crate::error::Result;
use crate::services::Services;
use crate::session::{Session, SnacMessage};

pub fn route(
    services: &Services,
    session: &Arc<Session>,
    frame: SnacFrame,
    body: &[u8],
) -> Result<Vec<SnacMessage>> {
    let mut cursor = body;
    match frame.subgroup {
        buddy::RIGHTS_QUERY => Ok(vec![rights_reply(frame)]),
        buddy::ADD_BUDDIES => add_buddies(services, session, &mut cursor),
        buddy::DEL_BUDDIES => del_buddies(session, &mut cursor),
        _ => Ok(vec![SnacMessage::error(frame, errcode::INVALID_SNAC)]),
    }
}

fn rights_reply(frame: SnacFrame) -> SnacMessage {
    let reply = SnacFrame::reply_to(frame, foodgroup::BUDDY, buddy::RIGHTS_REPLY);
    let rights = RightsReply::defaults();
    SnacMessage::new(reply, |buf| rights.encode(buf))
}

/// Additions take effect immediately: an already-online buddy produces an
/// arrival for this session alone.
fn add_buddies(
    services: &Services,
    session: &Arc<Session>,
    cursor: &mut &[u8],
) -> Result<Vec<SnacMessage>> {
    let list = BuddyList::decode(cursor)?;
    let mut replies = Vec::new();
    for name in &list.screen_names {
        let ident = ident_of(name);
        session.with_state_mut(|s| {
            s.ephemeral_buddies.insert(ident.clone());
        });

        let Some(peer) = services.sessions.find_by_ident(&ident) else {
            continue;
        };
        if !peer.is_ready() || peer.is_invisible() {
            continue;
        }
        if services.feedbags.blocked_state(session.ident(), &ident)?.any()
            || peer.denies(session.ident())
        {
            continue;
        }
        replies.push(SnacMessage::new(
            SnacFrame::new(foodgroup::BUDDY, buddy::ARRIVED),
            |buf| {
                BuddyArrived {
                    user_info: peer.user_info(),
                }
                .encode(buf)
            },
        ));
    }
    Ok(replies)
}

fn del_buddies(session: &Arc<Session>, cursor: &mut &[u8]) -> Result<Vec<SnacMessage>> {
    let list = BuddyList::decode(cursor)?;
    session.with_state_mut(|s| {
        for name in &list.screen_names {
            s.ephemeral_buddies.remove(&ident_of(name));
        }
    });
    Ok(Vec::new())
}
