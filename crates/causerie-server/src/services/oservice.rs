//! OService: the service handshake, rate parameters, and session-level
//! notifications. The server must not announce a session to buddies before
//! its ClientOnline arrives.

use std::sync::Arc;

use chrono::Utc;

use causerie_store::ScreenName;
use causerie_wire::payloads::chat_nav::RoomQuery;
use causerie_wire::payloads::icbm::{tags as icbm_tags, ChannelMsgToClient, CHANNEL_IM};
use causerie_wire::payloads::oservice::{
    tags, HostOnline, IdleNotification, ServiceRequest, ServiceResponse, UserInfoUpdate, Versions,
};
use causerie_wire::snac::{errcode, foodgroup, icbm, oservice, SnacFrame};
use causerie_wire::tlv::{Tlv, TlvList};
use causerie_wire::userinfo::UserInfo;
use uuid::Uuid;

use crate::chat::ChatRoom;
use crate::error::Result;
use crate::services::{auth, chat, Services};
use crate::session::{Session, SnacMessage};

/// Food groups advertised on a BOS connection.
pub const BOS_FOOD_GROUPS: &[u16] = &[
    foodgroup::OSERVICE,
    foodgroup::LOCATE,
    foodgroup::BUDDY,
    foodgroup::ICBM,
    foodgroup::ADMIN,
    foodgroup::PERMIT_DENY,
    foodgroup::USER_LOOKUP,
    foodgroup::STATS,
    foodgroup::CHAT_NAV,
    foodgroup::ODIR,
    foodgroup::BART,
    foodgroup::FEEDBAG,
    foodgroup::ICQ,
    foodgroup::BUCP,
];

/// Food groups advertised on a chat connection.
pub const CHAT_FOOD_GROUPS: &[u16] = &[foodgroup::OSERVICE, foodgroup::CHAT];

/// The unsolicited HostOnline frame opening every routed connection.
pub fn host_online_message(food_groups: &[u16]) -> SnacMessage {
    SnacMessage::new(
        SnacFrame::new(foodgroup::OSERVICE, oservice::HOST_ONLINE),
        |buf| {
            HostOnline {
                food_groups: food_groups.to_vec(),
            }
            .encode(buf)
        },
    )
}

pub fn route(
    services: &Services,
    session: &Arc<Session>,
    frame: SnacFrame,
    body: &[u8],
) -> Result<Vec<SnacMessage>> {
    let mut cursor = body;
    match frame.subgroup {
        oservice::CLIENT_ONLINE => client_online(services, session),
        oservice::SERVICE_REQUEST => service_request(services, session, frame, &mut cursor),
        oservice::RATE_PARAMS_QUERY => Ok(vec![rate_params_reply(services, frame)]),
        oservice::RATE_PARAMS_SUB_ADD => Ok(Vec::new()),
        oservice::USER_INFO_QUERY => Ok(vec![user_info_update(session, frame)]),
        oservice::IDLE_NOTIFICATION => idle_notification(services, session, &mut cursor),
        oservice::CLIENT_VERSIONS => host_versions(frame, &mut cursor),
        _ => Ok(vec![SnacMessage::error(frame, errcode::INVALID_SNAC)]),
    }
}

pub fn route_chat(
    services: &Services,
    room: &Arc<ChatRoom>,
    session: &Arc<Session>,
    frame: SnacFrame,
    body: &[u8],
) -> Result<Vec<SnacMessage>> {
    let mut cursor = body;
    match frame.subgroup {
        oservice::CLIENT_ONLINE => {
            session.with_state_mut(|s| s.ready = true);
            chat::announce_join(room, session);
            Ok(Vec::new())
        }
        oservice::RATE_PARAMS_QUERY => Ok(vec![rate_params_reply(services, frame)]),
        oservice::RATE_PARAMS_SUB_ADD => Ok(Vec::new()),
        oservice::CLIENT_VERSIONS => host_versions(frame, &mut cursor),
        _ => Ok(vec![SnacMessage::error(frame, errcode::INVALID_SNAC)]),
    }
}

/// ClientOnline on BOS: the session becomes visible, queued offline
/// messages are delivered, and both sides of the presence fan-out fire.
fn client_online(services: &Services, session: &Arc<Session>) -> Result<Vec<SnacMessage>> {
    session.with_state_mut(|s| s.ready = true);
    services
        .session_state
        .set_buddy_list_online(session.ident(), true)?;
    tracing::info!(ident = %session.ident(), "client online");

    let queued = services.offline.offline_messages_retrieve(session.ident())?;
    if !queued.is_empty() {
        tracing::info!(ident = %session.ident(), count = queued.len(), "delivering offline messages");
        for message in &queued {
            let payload = ChannelMsgToClient {
                cookie: 0,
                channel: CHANNEL_IM,
                sender: UserInfo::new(message.sender.clone()),
                tlvs: TlvList::new()
                    .with(Tlv::new(icbm_tags::MESSAGE, message.message.clone())),
            };
            session.push(SnacMessage::new(
                SnacFrame::new(foodgroup::ICBM, icbm::CHANNEL_MSG_TO_CLIENT),
                |buf| payload.encode(buf),
            ));
        }
        services.offline.offline_messages_delete(session.ident())?;
    }

    services.presence.send_buddy_snapshot(session)?;
    services.presence.broadcast_arrival(session)?;
    Ok(Vec::new())
}

/// Route the client to another service. Only chat is hosted out-of-band;
/// everything else is multiplexed on the BOS connection.
fn service_request(
    services: &Services,
    session: &Arc<Session>,
    frame: SnacFrame,
    cursor: &mut &[u8],
) -> Result<Vec<SnacMessage>> {
    let request = ServiceRequest::decode(cursor)?;
    if request.food_group != foodgroup::CHAT {
        return Ok(vec![SnacMessage::error(
            frame,
            errcode::REQUESTED_SERVICES_UNAVAILABLE,
        )]);
    }

    let Some(raw) = request.tlvs.bytes(tags::ROOM_COOKIE) else {
        return Ok(vec![SnacMessage::error(frame, errcode::INVALID_SNAC)]);
    };
    let mut raw_cursor = raw;
    let query = RoomQuery::decode(&mut raw_cursor)?;
    let Some(room_id) = Uuid::parse_str(&query.cookie).ok() else {
        return Ok(vec![SnacMessage::error(frame, errcode::NOT_AVAILABLE)]);
    };
    if services.rooms.get(room_id).is_none() {
        return Ok(vec![SnacMessage::error(frame, errcode::NOT_AVAILABLE)]);
    }

    let screen_name = ScreenName::new(session.display());
    let cookie = auth::mint_chat_cookie(services, &screen_name, room_id);
    let reply = SnacFrame::reply_to(frame, foodgroup::OSERVICE, oservice::SERVICE_RESPONSE);
    let response = ServiceResponse {
        tlvs: TlvList::new()
            .with(Tlv::str(
                tags::RECONNECT_HERE,
                &services.config.advertised_address,
            ))
            .with(Tlv::new(tags::AUTHORIZATION_COOKIE, cookie))
            .with(Tlv::u16(tags::GROUP_ID, foodgroup::CHAT)),
    };
    Ok(vec![SnacMessage::new(reply, |buf| response.encode(buf))])
}

fn rate_params_reply(services: &Services, frame: SnacFrame) -> SnacMessage {
    let reply = SnacFrame::reply_to(frame, foodgroup::OSERVICE, oservice::RATE_PARAMS_REPLY);
    let params = services.rate_classes.params_reply();
    SnacMessage::new(reply, |buf| params.encode(buf))
}

fn user_info_update(session: &Session, frame: SnacFrame) -> SnacMessage {
    let reply = SnacFrame::reply_to(frame, foodgroup::OSERVICE, oservice::USER_INFO_UPDATE);
    let update = UserInfoUpdate {
        user_info: session.user_info(),
    };
    SnacMessage::new(reply, |buf| update.encode(buf))
}

/// Heartbeat-ish: zero seconds clears idle state, anything else stamps it.
/// Watchers learn about the transition.
fn idle_notification(
    services: &Services,
    session: &Arc<Session>,
    cursor: &mut &[u8],
) -> Result<Vec<SnacMessage>> {
    let notification = IdleNotification::decode(cursor)?;
    session.with_state_mut(|s| {
        s.idle_since = if notification.idle_secs == 0 {
            None
        } else {
            Some(Utc::now() - chrono::Duration::seconds(notification.idle_secs as i64))
        };
    });
    if session.is_ready() {
        services.presence.broadcast_arrival(session)?;
    }
    Ok(Vec::new())
}

fn host_versions(frame: SnacFrame, cursor: &mut &[u8]) -> Result<Vec<SnacMessage>> {
    let versions = Versions::decode(cursor)?;
    let reply = SnacFrame::reply_to(frame, foodgroup::OSERVICE, oservice::HOST_VERSIONS);
    Ok(vec![SnacMessage::new(reply, |buf| versions.encode(buf))])
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::BytesMut;
    use chrono::TimeZone;

    use causerie_store::OfflineMessage;
    use causerie_wire::feedbag::FeedbagItem;
    use causerie_wire::payloads::oservice::RateParamsReply;
    use causerie_wire::snac::buddy as buddy_sub;

    use crate::services::testutil::{drain, online_session, services};

    fn frame(subgroup: u16) -> SnacFrame {
        SnacFrame {
            food_group: foodgroup::OSERVICE,
            subgroup,
            flags: 0,
            request_id: 5,
        }
    }

    #[test]
    fn rate_params_query_returns_full_table() {
        let svc = services();
        let session = online_session(&svc, "Alice");
        let replies = route(&svc, &session, frame(oservice::RATE_PARAMS_QUERY), &[]).unwrap();
        assert_eq!(replies.len(), 1);

        let mut cursor = &replies[0].body[..];
        let reply = RateParamsReply::decode(&mut cursor).unwrap();
        assert_eq!(reply.classes.len(), 5);
    }

    #[test]
    fn client_online_delivers_offline_messages_once() {
        let svc = services();
        svc.offline
            .offline_message_store(&OfflineMessage {
                sender: "alice".into(),
                recipient: "bob".into(),
                message: b"stored hello".to_vec(),
                sent_at: chrono::Utc.timestamp_opt(1_700_000_000, 0).unwrap(),
            })
            .unwrap();

        let bob = svc.sessions.add_new(&ScreenName::new("Bob"), None);
        route(&svc, &bob, frame(oservice::CLIENT_ONLINE), &[]).unwrap();

        let delivered = drain(&bob);
        assert_eq!(delivered.len(), 1);
        assert_eq!(delivered[0].frame.subgroup, icbm::CHANNEL_MSG_TO_CLIENT);
        // The queue is drained in storage too.
        assert!(svc.offline.offline_messages_retrieve("bob").unwrap().is_empty());
    }

    #[test]
    fn client_online_announces_to_watchers_and_bursts_snapshot() {
        let svc = services();
        let alice = online_session(&svc, "Alice");
        // Bob lists Alice; Alice lists Bob.
        svc.feedbags
            .upsert("bob", &[FeedbagItem::buddy(1, 1, "alice")])
            .unwrap();
        svc.feedbags
            .upsert("alice", &[FeedbagItem::buddy(1, 1, "bob")])
            .unwrap();

        let bob = svc.sessions.add_new(&ScreenName::new("Bob"), None);
        route(&svc, &bob, frame(oservice::CLIENT_ONLINE), &[]).unwrap();

        // Bob got a snapshot arrival for Alice; Alice got Bob's arrival.
        let bob_events = drain(&bob);
        assert_eq!(bob_events.len(), 1);
        assert_eq!(bob_events[0].frame.subgroup, buddy_sub::ARRIVED);
        let alice_events = drain(&alice);
        assert_eq!(alice_events.len(), 1);
        assert_eq!(alice_events[0].frame.subgroup, buddy_sub::ARRIVED);
    }

    #[test]
    fn no_arrivals_before_client_online() {
        let svc = services();
        let alice = online_session(&svc, "Alice");
        svc.feedbags
            .upsert("bob", &[FeedbagItem::buddy(1, 1, "alice")])
            .unwrap();

        // Bob signs on but has not sent ClientOnline.
        let bob = svc.sessions.add_new(&ScreenName::new("Bob"), None);
        svc.presence.broadcast_arrival(&alice).unwrap();
        assert!(drain(&bob).is_empty());
    }

    #[test]
    fn service_request_for_chat_mints_room_cookie() {
        let svc = services();
        let session = online_session(&svc, "Alice");
        let room = svc.rooms.create("Lobby", 5);

        let mut query_buf = BytesMut::new();
        RoomQuery {
            exchange: 5,
            cookie: room.cookie().to_string(),
            instance: 100,
        }
        .encode(&mut query_buf);
        let mut body = BytesMut::new();
        ServiceRequest {
            food_group: foodgroup::CHAT,
            tlvs: TlvList::new().with(Tlv::new(tags::ROOM_COOKIE, query_buf.to_vec())),
        }
        .encode(&mut body);

        let replies = route(&svc, &session, frame(oservice::SERVICE_REQUEST), &body).unwrap();
        assert_eq!(replies[0].frame.subgroup, oservice::SERVICE_RESPONSE);

        let mut cursor = &replies[0].body[..];
        let response = ServiceResponse::decode(&mut cursor).unwrap();
        let cookie = response.tlvs.bytes(tags::AUTHORIZATION_COOKIE).unwrap();
        let verified = svc
            .cookie_baker
            .verify(cookie, chrono::Utc::now().timestamp() as u32)
            .unwrap();
        assert_eq!(
            verified.service,
            causerie_wire::cookie::ServiceKind::Chat(room.cookie())
        );
    }

    #[test]
    fn service_request_for_missing_room_errors() {
        let svc = services();
        let session = online_session(&svc, "Alice");

        let mut query_buf = BytesMut::new();
        RoomQuery {
            exchange: 5,
            cookie: Uuid::new_v4().to_string(),
            instance: 100,
        }
        .encode(&mut query_buf);
        let mut body = BytesMut::new();
        ServiceRequest {
            food_group: foodgroup::CHAT,
            tlvs: TlvList::new().with(Tlv::new(tags::ROOM_COOKIE, query_buf.to_vec())),
        }
        .encode(&mut body);

        let replies = route(&svc, &session, frame(oservice::SERVICE_REQUEST), &body).unwrap();
        assert_eq!(replies[0].frame.subgroup, causerie_wire::snac::SUBGROUP_ERR);
    }

    #[test]
    fn idle_notification_updates_state() {
        let svc = services();
        let session = online_session(&svc, "Alice");

        let mut body = BytesMut::new();
        IdleNotification { idle_secs: 600 }.encode(&mut body);
        route(&svc, &session, frame(oservice::IDLE_NOTIFICATION), &body).unwrap();
        assert!(session.with_state(|s| s.idle_since.is_some()));

        let mut body = BytesMut::new();
        IdleNotification { idle_secs: 0 }.encode(&mut body);
        route(&svc, &session, frame(oservice::IDLE_NOTIFICATION), &body).unwrap();
        assert!(session.with_state(|s| s.idle_since.is_none()));
    }
}
