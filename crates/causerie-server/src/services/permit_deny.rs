//! PermitDeny: ephemeral permit/deny lists and modes for clients that do
//! not manage them through the feedbag. Every mutation re-derives the
//! presence relationships it touches.

use std::sync::Arc;

use causerie_store::ident_of;
use causerie_wire::payloads::permit_deny::{ListEntries, PdMode, RightsReply};
use causerie_wire::snac::{errcode, foodgroup, permit_deny, SnacFrame};

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
        permit_deny::RIGHTS_QUERY => Ok(vec![rights_reply(frame)]),
        permit_deny::SET_GROUP_PERMIT_MASK => Ok(Vec::new()),
        permit_deny::ADD_PERMIT_ENTRIES => {
            mutate(services, session, &mut cursor, ListKind::Permit, true)
        }
        permit_deny::DEL_PERMIT_ENTRIES => {
            mutate(services, session, &mut cursor, ListKind::Permit, false)
        }
        permit_deny::ADD_DENY_ENTRIES => {
            mutate(services, session, &mut cursor, ListKind::Deny, true)
        }
        permit_deny::DEL_DENY_ENTRIES => {
            mutate(services, session, &mut cursor, ListKind::Deny, false)
        }
        _ => Ok(vec![SnacMessage::error(frame, errcode::INVALID_SNAC)]),
    }
}

#[derive(Clone, Copy)]
enum ListKind {
    Permit,
    Deny,
}

fn rights_reply(frame: SnacFrame) -> SnacMessage {
    let reply = SnacFrame::reply_to(frame, foodgroup::PERMIT_DENY, permit_deny::RIGHTS_REPLY);
    let rights = RightsReply::defaults();
    SnacMessage::new(reply, |buf| rights.encode(buf))
}

/// List edits imply the matching mode, the way period clients expect:
/// populating the permit list selects permit-some, the deny list deny-some.
fn mutate(
    services: &Services,
    session: &Arc<Session>,
    cursor: &mut &[u8],
    kind: ListKind,
    add: bool,
) -> Result<Vec<SnacMessage>> {
    let entries = ListEntries::decode(cursor)?;
    let idents: Vec<String> = entries.screen_names.iter().map(|n| ident_of(n)).collect();

    session.with_state_mut(|s| {
        let list = match kind {
            ListKind::Permit => &mut s.permit_list,
            ListKind::Deny => &mut s.deny_list,
        };
        for ident in &idents {
            if add {
                list.insert(ident.clone());
            } else {
                list.remove(ident);
            }
        }
        if add {
            s.pd_mode = match kind {
                ListKind::Permit => PdMode::PermitSome,
                ListKind::Deny => PdMode::DenySome,
            };
        }
    });

    for ident in &idents {
        services.presence.sync_relationship(session, ident)?;
    }
    Ok(Vec::new())
}
