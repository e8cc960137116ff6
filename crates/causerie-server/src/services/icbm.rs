//! ICBM: instant messages between sessions, offline storage, acks and
//! typing events.

use std::sync::Arc;

use chrono::Utc;

use causerie_store::{ident_of, OfflineMessage};
use causerie_wire::payloads::icbm::{
    tags, ChannelMsgToClient, ChannelMsgToHost, ClientEvent, HostAck, ParameterReply,
};
use causerie_wire::snac::{errcode, foodgroup, icbm, SnacFrame};
use causerie_wire::tlv::{Tlv, TlvList};

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
        icbm::PARAMETER_QUERY => Ok(vec![parameter_reply(frame)]),
        icbm::ADD_PARAMETERS => Ok(Vec::new()),
        icbm::CHANNEL_MSG_TO_HOST => msg_to_host(services, session, frame, &mut cursor),
        icbm::CLIENT_EVENT => client_event(services, session, &mut cursor),
        icbm::EVIL_REQUEST => Ok(vec![SnacMessage::error(
            frame,
            errcode::NOT_SUPPORTED_BY_HOST,
        )]),
        _ => Ok(vec![SnacMessage::error(frame, errcode::INVALID_SNAC)]),
    }
}

fn parameter_reply(frame: SnacFrame) -> SnacMessage {
    let reply = SnacFrame::reply_to(frame, foodgroup::ICBM, icbm::PARAMETER_REPLY);
    let params = ParameterReply::default();
    SnacMessage::new(reply, |buf| params.encode(buf))
}

/// Deliver a message: blocked → error 0x04 and nothing reaches the
/// recipient; offline + store flag → queued for ClientOnline; ack flag →
/// immediate HostAck to the sender.
fn msg_to_host(
    services: &Services,
    session: &Arc<Session>,
    frame: SnacFrame,
    cursor: &mut &[u8],
) -> Result<Vec<SnacMessage>> {
    let msg = ChannelMsgToHost::decode(cursor)?;
    let recipient_ident = ident_of(&msg.screen_name);

    if let Some(message) = msg.message() {
        if message.len() > ParameterReply::default().max_incoming_len as usize {
            return Ok(vec![SnacMessage::error(frame, errcode::MESSAGE_TOO_LONG)]);
        }
    }

    if services
        .feedbags
        .blocked_state(session.ident(), &recipient_ident)?
        .any()
    {
        return Ok(vec![SnacMessage::error(frame, errcode::NOT_AVAILABLE)]);
    }

    let recipient = services
        .sessions
        .find_by_ident(&recipient_ident)
        .filter(|r| r.is_ready());

    match recipient {
        Some(recipient) => {
            if recipient.denies(session.ident()) {
                return Ok(vec![SnacMessage::error(frame, errcode::NOT_AVAILABLE)]);
            }
            let mut tlvs = TlvList::new();
            if let Some(message) = msg.message() {
                tlvs.push(Tlv::new(tags::MESSAGE, message.to_vec()));
            }
            if msg.tlvs.has(tags::AUTO_RESPONSE) {
                tlvs.push(Tlv::new(tags::AUTO_RESPONSE, Vec::new()));
            }
            let outbound = ChannelMsgToClient {
                cookie: msg.cookie,
                channel: msg.channel,
                sender: session.user_info(),
                tlvs,
            };
            recipient.push(SnacMessage::new(
                SnacFrame::new(foodgroup::ICBM, icbm::CHANNEL_MSG_TO_CLIENT),
                |buf| outbound.encode(buf),
            ));
        }
        None if msg.wants_offline_storage() => {
            let Some(message) = msg.message() else {
                return Ok(vec![SnacMessage::error(frame, errcode::INVALID_SNAC)]);
            };
            services.offline.offline_message_store(&OfflineMessage {
                sender: session.ident().to_owned(),
                recipient: recipient_ident,
                message: message.to_vec(),
                sent_at: Utc::now(),
            })?;
        }
        None => {
            return Ok(vec![SnacMessage::error(frame, errcode::NOT_AVAILABLE)]);
        }
    }

    if msg.wants_ack() {
        let reply = SnacFrame::reply_to(frame, foodgroup::ICBM, icbm::HOST_ACK);
        let ack = HostAck {
            cookie: msg.cookie,
            channel: msg.channel,
            screen_name: msg.screen_name,
        };
        return Ok(vec![SnacMessage::new(reply, |buf| ack.encode(buf))]);
    }
    Ok(Vec::new())
}

/// Typing notifications are forwarded with no storage and no error replies.
fn client_event(
    services: &Services,
    session: &Arc<Session>,
    cursor: &mut &[u8],
) -> Result<Vec<SnacMessage>> {
    let event = ClientEvent::decode(cursor)?;
    let recipient_ident = ident_of(&event.screen_name);

    if services
        .feedbags
        .blocked_state(session.ident(), &recipient_ident)?
        .any()
    {
        return Ok(Vec::new());
    }
    if let Some(recipient) = services.sessions.find_by_ident(&recipient_ident) {
        if recipient.is_ready() && !recipient.denies(session.ident()) {
            let forwarded = ClientEvent {
                cookie: event.cookie,
                channel: event.channel,
                screen_name: session.display().to_owned(),
                event: event.event,
            };
            recipient.push(SnacMessage::new(
                SnacFrame::new(foodgroup::ICBM, icbm::CLIENT_EVENT),
                |buf| forwarded.encode(buf),
            ));
        }
    }
    Ok(Vec::new())
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::BytesMut;

    use causerie_wire::feedbag::FeedbagItem;
    use causerie_wire::payloads::icbm::{event, CHANNEL_IM};
    use causerie_wire::payloads::SnacError;

    use crate::services::testutil::{drain, online_session, services};

    fn frame(subgroup: u16) -> SnacFrame {
        SnacFrame {
            food_group: foodgroup::ICBM,
            subgroup,
            flags: 0,
            request_id: 77,
        }
    }

    fn msg_body(recipient: &str, text: &[u8], extra: &[Tlv]) -> Vec<u8> {
        let mut tlvs = TlvList::new().with(Tlv::new(tags::MESSAGE, text.to_vec()));
        for tlv in extra {
            tlvs.push(tlv.clone());
        }
        let mut buf = BytesMut::new();
        ChannelMsgToHost {
            cookie: 0xABCD,
            channel: CHANNEL_IM,
            screen_name: recipient.into(),
            tlvs,
        }
        .encode(&mut buf);
        buf.to_vec()
    }

    #[test]
    fn message_reaches_online_recipient() {
        let svc = services();
        let alice = online_session(&svc, "Alice");
        let bob = online_session(&svc, "Bob");

        let replies = route(
            &svc,
            &alice,
            frame(icbm::CHANNEL_MSG_TO_HOST),
            &msg_body("Bob", b"hi", &[]),
        )
        .unwrap();
        assert!(replies.is_empty()); // no ack requested

        let delivered = drain(&bob);
        assert_eq!(delivered.len(), 1);
        let mut cursor = &delivered[0].body[..];
        let msg = ChannelMsgToClient::decode(&mut cursor).unwrap();
        assert_eq!(msg.cookie, 0xABCD); // original cookie echoed
        assert_eq!(msg.sender.screen_name, "Alice");
        assert_eq!(msg.tlvs.bytes(tags::MESSAGE), Some(&b"hi"[..]));
    }

    #[test]
    fn blocked_sender_gets_error_and_recipient_nothing() {
        let svc = services();
        let alice = online_session(&svc, "Alice");
        let bob = online_session(&svc, "Bob");
        // Bob's feedbag denies Alice.
        svc.feedbags
            .upsert("bob", &[FeedbagItem::deny(1, "alice")])
            .unwrap();

        let replies = route(
            &svc,
            &alice,
            frame(icbm::CHANNEL_MSG_TO_HOST),
            &msg_body("Bob", b"hi", &[]),
        )
        .unwrap();

        assert_eq!(replies.len(), 1);
        let mut cursor = &replies[0].body[..];
        let err = SnacError::decode(&mut cursor).unwrap();
        assert_eq!(err.code, errcode::NOT_AVAILABLE);
        assert!(drain(&bob).is_empty());
    }

    #[test]
    fn ack_requested_yields_host_ack() {
        let svc = services();
        let alice = online_session(&svc, "Alice");
        online_session(&svc, "Bob");

        let replies = route(
            &svc,
            &alice,
            frame(icbm::CHANNEL_MSG_TO_HOST),
            &msg_body("Bob", b"hi", &[Tlv::new(tags::ACK_REQUESTED, vec![])]),
        )
        .unwrap();
        assert_eq!(replies.len(), 1);
        assert_eq!(replies[0].frame.subgroup, icbm::HOST_ACK);
    }

    #[test]
    fn offline_recipient_with_store_flag_queues_message() {
        let svc = services();
        let alice = online_session(&svc, "Alice");

        let replies = route(
            &svc,
            &alice,
            frame(icbm::CHANNEL_MSG_TO_HOST),
            &msg_body("Bob", b"later", &[Tlv::new(tags::STORE_OFFLINE, vec![])]),
        )
        .unwrap();
        assert!(replies.is_empty());

        let queued = svc.offline.offline_messages_retrieve("bob").unwrap();
        assert_eq!(queued.len(), 1);
        assert_eq!(queued[0].message, b"later");
    }

    #[test]
    fn offline_recipient_without_store_flag_errors() {
        let svc = services();
        let alice = online_session(&svc, "Alice");

        let replies = route(
            &svc,
            &alice,
            frame(icbm::CHANNEL_MSG_TO_HOST),
            &msg_body("Bob", b"hi", &[]),
        )
        .unwrap();
        assert_eq!(replies[0].frame.subgroup, causerie_wire::snac::SUBGROUP_ERR);
    }

    #[test]
    fn oversized_message_rejected() {
        let svc = services();
        let alice = online_session(&svc, "Alice");
        online_session(&svc, "Bob");

        let big = vec![b'x'; 8001];
        let replies = route(
            &svc,
            &alice,
            frame(icbm::CHANNEL_MSG_TO_HOST),
            &msg_body("Bob", &big, &[]),
        )
        .unwrap();
        let mut cursor = &replies[0].body[..];
        let err = SnacError::decode(&mut cursor).unwrap();
        assert_eq!(err.code, errcode::MESSAGE_TOO_LONG);
    }

    #[test]
    fn typing_event_forwarded_with_sender_name() {
        let svc = services();
        let alice = online_session(&svc, "Alice");
        let bob = online_session(&svc, "Bob");

        let mut buf = BytesMut::new();
        ClientEvent {
            cookie: 1,
            channel: CHANNEL_IM,
            screen_name: "Bob".into(),
            event: event::TYPING_BEGUN,
        }
        .encode(&mut buf);
        route(&svc, &alice, frame(icbm::CLIENT_EVENT), &buf).unwrap();

        let delivered = drain(&bob);
        assert_eq!(delivered.len(), 1);
        let mut cursor = &delivered[0].body[..];
        let forwarded = ClientEvent::decode(&mut cursor).unwrap();
        assert_eq!(forwarded.screen_name, "Alice");
        assert_eq!(forwarded.event, event::TYPING_BEGUN);
    }

    #[test]
    fn parameter_reply_matches_documented_limits() {
        let svc = services();
        let alice = online_session(&svc, "Alice");
        let replies = route(&svc, &alice, frame(icbm::PARAMETER_QUERY), &[]).unwrap();
        let mut cursor = &replies[0].body[..];
        let params = ParameterReply::decode(&mut cursor).unwrap();
        assert_eq!(params.max_incoming_len, 8000);
        assert_eq!(params.max_source_evil, 999);
    }
}
