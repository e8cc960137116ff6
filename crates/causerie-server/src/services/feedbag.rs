//! Feedbag: the server-stored buddy list. Mutations between StartCluster
//! and EndCluster are buffered per connection and land together; every
//! applied change re-derives the affected presence relationships.

use std::sync::Arc;

use causerie_store::ident_of;
use causerie_wire::feedbag::{class, FeedbagItem};
use causerie_wire::payloads::feedbag::{
    ItemsPayload, QueryIfModified, Reply, RightsReply, Status, FEEDBAG_VERSION,
};
use causerie_wire::payloads::permit_deny::PdMode;
use causerie_wire::snac::{errcode, feedbag, foodgroup, SnacFrame};

use crate::error::Result;
use crate::services::{FeedbagCluster, Services};
use crate::session::{Session, SnacMessage};

/// Attribute TLV carrying the permit/deny mode on a class-4 item.
const ATTR_PD_MODE: u16 = 0x00CA;

pub fn route(
    services: &Services,
    session: &Arc<Session>,
    cluster: &mut FeedbagCluster,
    frame: SnacFrame,
    body: &[u8],
) -> Result<Vec<SnacMessage>> {
    let mut cursor = body;
    match frame.subgroup {
        feedbag::RIGHTS_QUERY => Ok(vec![rights_reply(frame)]),
        feedbag::QUERY => query(services, session, frame),
        feedbag::QUERY_IF_MODIFIED => query_if_modified(services, session, frame, &mut cursor),
        feedbag::USE => Ok(Vec::new()),
        feedbag::INSERT_ITEM | feedbag::UPDATE_ITEM => {
            mutate(services, session, cluster, frame, &mut cursor, Mutation::Upsert)
        }
        feedbag::DELETE_ITEM => {
            mutate(services, session, cluster, frame, &mut cursor, Mutation::Delete)
        }
        feedbag::START_CLUSTER => {
            cluster.active = true;
            Ok(Vec::new())
        }
        feedbag::END_CLUSTER => end_cluster(services, session, cluster, frame),
        _ => Ok(vec![SnacMessage::error(frame, errcode::INVALID_SNAC)]),
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Mutation {
    Upsert,
    Delete,
}

fn rights_reply(frame: SnacFrame) -> SnacMessage {
    let reply = SnacFrame::reply_to(frame, foodgroup::FEEDBAG, feedbag::RIGHTS_REPLY);
    let rights = RightsReply::defaults();
    SnacMessage::new(reply, |buf| rights.encode(buf))
}

fn last_update_secs(services: &Services, ident: &str) -> Result<u32> {
    // Absent means "never modified"; clients read epoch 0 as exactly that.
    Ok(services
        .feedbags
        .last_modified(ident)?
        .map(|t| t.timestamp() as u32)
        .unwrap_or(0))
}

fn query(
    services: &Services,
    session: &Arc<Session>,
    frame: SnacFrame,
) -> Result<Vec<SnacMessage>> {
    let items = services.feedbags.feedbag(session.ident())?;
    let last_update = last_update_secs(services, session.ident())?;
    let reply = SnacFrame::reply_to(frame, foodgroup::FEEDBAG, feedbag::REPLY);
    let payload = Reply {
        version: FEEDBAG_VERSION,
        items,
        last_update,
    };
    Ok(vec![SnacMessage::new(reply, |buf| payload.encode(buf))])
}

/// Return the list only when it changed after the client's timestamp.
fn query_if_modified(
    services: &Services,
    session: &Arc<Session>,
    frame: SnacFrame,
    cursor: &mut &[u8],
) -> Result<Vec<SnacMessage>> {
    let request = QueryIfModified::decode(cursor)?;
    let last_update = last_update_secs(services, session.ident())?;
    let items = if last_update > request.last_update {
        services.feedbags.feedbag(session.ident())?
    } else {
        Vec::new()
    };
    let reply = SnacFrame::reply_to(frame, foodgroup::FEEDBAG, feedbag::REPLY);
    let payload = Reply {
        version: FEEDBAG_VERSION,
        items,
        last_update,
    };
    Ok(vec![SnacMessage::new(reply, |buf| payload.encode(buf))])
}

fn mutate(
    services: &Services,
    session: &Arc<Session>,
    cluster: &mut FeedbagCluster,
    frame: SnacFrame,
    cursor: &mut &[u8],
    mutation: Mutation,
) -> Result<Vec<SnacMessage>> {
    let payload = ItemsPayload::decode(cursor)?;
    let count = payload.items.len();

    if cluster.active {
        match mutation {
            Mutation::Upsert => cluster.upserts.extend(payload.items),
            Mutation::Delete => cluster.deletes.extend(payload.items),
        }
    } else {
        match mutation {
            Mutation::Upsert => apply(services, session, &payload.items, &[])?,
            Mutation::Delete => apply(services, session, &[], &payload.items)?,
        }
    }

    let reply = SnacFrame::reply_to(frame, foodgroup::FEEDBAG, feedbag::STATUS);
    let status = Status::success(count);
    Ok(vec![SnacMessage::new(reply, |buf| status.encode(buf))])
}

/// Commit the buffered batch. All inner operations land in one pass; a
/// failure rejects the whole batch with a try-again error.
fn end_cluster(
    services: &Services,
    session: &Arc<Session>,
    cluster: &mut FeedbagCluster,
    frame: SnacFrame,
) -> Result<Vec<SnacMessage>> {
    if !cluster.active {
        return Ok(Vec::new());
    }
    let upserts = std::mem::take(&mut cluster.upserts);
    let deletes = std::mem::take(&mut cluster.deletes);
    cluster.active = false;

    if let Err(e) = apply(services, session, &upserts, &deletes) {
        tracing::error!(error = %e, "feedbag cluster rejected");
        return Ok(vec![SnacMessage::error(frame, errcode::TRY_AGAIN_LATER)]);
    }
    Ok(Vec::new())
}

/// Upserts land before deletes, in one store transaction, so other readers
/// see the whole batch or none of it.
fn apply(
    services: &Services,
    session: &Arc<Session>,
    upserts: &[FeedbagItem],
    deletes: &[FeedbagItem],
) -> Result<()> {
    if !upserts.is_empty() || !deletes.is_empty() {
        services
            .feedbags
            .apply_batch(session.ident(), upserts, deletes)?;
    }

    for item in upserts.iter().chain(deletes) {
        match item.class_id {
            class::BUDDY | class::DENY | class::PERMIT => {
                services
                    .presence
                    .sync_relationship(session, &ident_of(&item.name))?;
            }
            class::PD_MODE => {
                if let Some(mode) = item
                    .attributes
                    .0
                    .get_u8(ATTR_PD_MODE)
                    .and_then(PdMode::from_byte)
                {
                    session.with_state_mut(|s| s.pd_mode = mode);
                }
            }
            _ => {}
        }
    }
    Ok(())
}
