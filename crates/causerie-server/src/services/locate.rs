//! Locate: profiles, away messages, capabilities, peer info queries, and
//! the directory listings that feed ODir searches.

use std::sync::Arc;

use bytes::BufMut;

use causerie_store::{ident_of, DirInfo};
use causerie_wire::payloads::locate::{
    query_type, tags, RightsReply, SetInfo, UserInfoQuery, UserInfoReply,
};
use causerie_wire::payloads::odir::tags as dir_tags;
use causerie_wire::snac::{errcode, foodgroup, locate, SnacFrame};
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
        locate::RIGHTS_QUERY => Ok(vec![rights_reply(frame)]),
        locate::SET_INFO => set_info(services, session, &mut cursor),
        locate::USER_INFO_QUERY | locate::USER_INFO_QUERY2 => {
            user_info_query(services, session, frame, &mut cursor)
        }
        locate::SET_DIR_INFO => set_dir_info(services, session, frame, &mut cursor),
        locate::SET_KEYWORD_INFO => set_keyword_info(services, session, frame, &mut cursor),
        _ => Ok(vec![SnacMessage::error(frame, errcode::INVALID_SNAC)]),
    }
}

fn rights_reply(frame: SnacFrame) -> SnacMessage {
    let reply = SnacFrame::reply_to(frame, foodgroup::LOCATE, locate::RIGHTS_REPLY);
    let rights = RightsReply::defaults();
    SnacMessage::new(reply, |buf| rights.encode(buf))
}

/// Each field arrives in its own TLV; absence means "leave unchanged".
/// Away and capability changes are observable presence changes.
fn set_info(
    services: &Services,
    session: &Arc<Session>,
    cursor: &mut &[u8],
) -> Result<Vec<SnacMessage>> {
    let info = SetInfo::decode(cursor)?;

    if let Some(profile) = info.profile() {
        services.profiles.set_profile(session.ident(), &profile)?;
    }

    let mut presence_changed = false;
    if let Some(away) = info.away_message() {
        session.with_state_mut(|s| s.away_message = away);
        presence_changed = true;
    }
    if let Some(caps) = info.capabilities() {
        let caps: Vec<[u8; 16]> = caps
            .chunks_exact(16)
            .map(|c| {
                let mut cap = [0u8; 16];
                cap.copy_from_slice(c);
                cap
            })
            .collect();
        session.with_state_mut(|s| s.capabilities = caps);
        presence_changed = true;
    }

    if presence_changed && session.is_ready() {
        services.presence.broadcast_arrival(session)?;
    }
    Ok(Vec::new())
}

/// Upload the public directory listing ODir searches against.
fn set_dir_info(
    services: &Services,
    session: &Arc<Session>,
    frame: SnacFrame,
    cursor: &mut &[u8],
) -> Result<Vec<SnacMessage>> {
    let fields = TlvList::decode(cursor)?;
    let info = DirInfo {
        ident: session.ident().to_owned(),
        first_name: fields.str(dir_tags::FIRST_NAME).unwrap_or_default(),
        last_name: fields.str(dir_tags::LAST_NAME).unwrap_or_default(),
        email: fields.str(dir_tags::EMAIL).unwrap_or_default(),
    };
    services.directory.set_dir_info(&info)?;

    let reply = SnacFrame::reply_to(frame, foodgroup::LOCATE, locate::SET_DIR_REPLY);
    Ok(vec![SnacMessage::new(reply, |buf| buf.put_u16(0x0001))])
}

/// Replace the session's directory keywords; one TLV per keyword.
fn set_keyword_info(
    services: &Services,
    session: &Arc<Session>,
    frame: SnacFrame,
    cursor: &mut &[u8],
) -> Result<Vec<SnacMessage>> {
    let fields = TlvList::decode(cursor)?;
    let keywords: Vec<String> = fields
        .0
        .iter()
        .filter(|t| t.tag == dir_tags::KEYWORD)
        .map(|t| String::from_utf8_lossy(&t.value).into_owned())
        .collect();
    services.directory.set_keywords(session.ident(), &keywords)?;

    let reply = SnacFrame::reply_to(frame, foodgroup::LOCATE, locate::SET_KEYWORD_REPLY);
    Ok(vec![SnacMessage::new(reply, |buf| buf.put_u16(0x0001))])
}

/// A peer's info, gated on blocking in either direction.
fn user_info_query(
    services: &Services,
    session: &Arc<Session>,
    frame: SnacFrame,
    cursor: &mut &[u8],
) -> Result<Vec<SnacMessage>> {
    let query = UserInfoQuery::decode(cursor)?;
    let peer_ident = ident_of(&query.screen_name);

    if services
        .feedbags
        .blocked_state(session.ident(), &peer_ident)?
        .any()
    {
        return Ok(vec![SnacMessage::error(frame, errcode::NOT_AVAILABLE)]);
    }
    let Some(peer) = services.sessions.find_by_ident(&peer_ident) else {
        return Ok(vec![SnacMessage::error(frame, errcode::NOT_AVAILABLE)]);
    };
    if peer.denies(session.ident()) {
        return Ok(vec![SnacMessage::error(frame, errcode::NOT_AVAILABLE)]);
    }

    let mut tlvs = TlvList::new();
    if query.request_type & query_type::PROFILE != 0 {
        let profile = services.profiles.profile(&peer_ident)?;
        if !profile.is_empty() {
            tlvs.push(Tlv::str(tags::PROFILE_MIME, "text/aolrtf; charset=\"us-ascii\""));
            tlvs.push(Tlv::str(tags::PROFILE, &profile));
        }
    }
    if query.request_type & query_type::AWAY_MESSAGE != 0 {
        let away = peer.with_state(|s| s.away_message.clone());
        if !away.is_empty() {
            tlvs.push(Tlv::str(tags::AWAY_MIME, "text/aolrtf; charset=\"us-ascii\""));
            tlvs.push(Tlv::str(tags::AWAY_MESSAGE, &away));
        }
    }

    let reply = SnacFrame::reply_to(frame, foodgroup::LOCATE, locate::USER_INFO_REPLY);
    let payload = UserInfoReply {
        user_info: peer.user_info(),
        tlvs,
    };
    Ok(vec![SnacMessage::new(reply, |buf| payload.encode(buf))])
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::BytesMut;

    use causerie_wire::feedbag::FeedbagItem;

    use crate::services::testutil::{drain, online_session, services};

    fn frame(subgroup: u16) -> SnacFrame {
        SnacFrame {
            food_group: foodgroup::LOCATE,
            subgroup,
            flags: 0,
            request_id: 3,
        }
    }

    #[test]
    fn rights_reply_carries_limits() {
        let svc = services();
        let session = online_session(&svc, "Alice");
        let replies = route(&svc, &session, frame(locate::RIGHTS_QUERY), &[]).unwrap();
        assert_eq!(replies[0].frame.subgroup, locate::RIGHTS_REPLY);
    }

    #[test]
    fn set_info_updates_profile_and_away() {
        let svc = services();
        let session = online_session(&svc, "Alice");

        let mut body = BytesMut::new();
        SetInfo {
            tlvs: TlvList::new()
                .with(Tlv::str(tags::PROFILE, "<html>about me</html>"))
                .with(Tlv::str(tags::AWAY_MESSAGE, "gone fishing")),
        }
        .encode(&mut body);
        route(&svc, &session, frame(locate::SET_INFO), &body).unwrap();

        assert_eq!(svc.profiles.profile("alice").unwrap(), "<html>about me</html>");
        assert_eq!(
            session.with_state(|s| s.away_message.clone()),
            "gone fishing"
        );
    }

    #[test]
    fn absent_fields_leave_state_unchanged() {
        let svc = services();
        let session = online_session(&svc, "Alice");
        session.with_state_mut(|s| s.away_message = "original".into());

        let mut body = BytesMut::new();
        SetInfo {
            tlvs: TlvList::new().with(Tlv::str(tags::PROFILE, "profile only")),
        }
        .encode(&mut body);
        route(&svc, &session, frame(locate::SET_INFO), &body).unwrap();

        assert_eq!(session.with_state(|s| s.away_message.clone()), "original");
    }

    #[test]
    fn away_change_is_broadcast() {
        let svc = services();
        let alice = online_session(&svc, "Alice");
        let bob = online_session(&svc, "Bob");
        svc.feedbags
            .upsert("bob", &[FeedbagItem::buddy(1, 1, "alice")])
            .unwrap();

        let mut body = BytesMut::new();
        SetInfo {
            tlvs: TlvList::new().with(Tlv::str(tags::AWAY_MESSAGE, "brb")),
        }
        .encode(&mut body);
        route(&svc, &alice, frame(locate::SET_INFO), &body).unwrap();

        assert_eq!(drain(&bob).len(), 1);
    }

    #[test]
    fn dir_info_upload_is_persisted_and_acked() {
        let svc = services();
        let session = online_session(&svc, "Carol");

        let mut body = BytesMut::new();
        TlvList::new()
            .with(Tlv::str(dir_tags::FIRST_NAME, "Carol"))
            .with(Tlv::str(dir_tags::LAST_NAME, "Jones"))
            .with(Tlv::str(dir_tags::EMAIL, "carol@example.com"))
            .encode(&mut body);
        let replies = route(&svc, &session, frame(locate::SET_DIR_INFO), &body).unwrap();
        assert_eq!(replies[0].frame.subgroup, locate::SET_DIR_REPLY);

        let hits = svc
            .directory
            .search_dir(&causerie_store::DirQuery {
                email: Some("carol@example.com".into()),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].ident, "carol");
    }

    #[test]
    fn keyword_upload_replaces_the_set() {
        let svc = services();
        let session = online_session(&svc, "Carol");

        let mut body = BytesMut::new();
        TlvList::new()
            .with(Tlv::str(dir_tags::KEYWORD, "chess"))
            .with(Tlv::str(dir_tags::KEYWORD, "aviation"))
            .encode(&mut body);
        let replies = route(&svc, &session, frame(locate::SET_KEYWORD_INFO), &body).unwrap();
        assert_eq!(replies[0].frame.subgroup, locate::SET_KEYWORD_REPLY);

        assert_eq!(
            svc.directory.keywords().unwrap(),
            vec!["aviation".to_string(), "chess".to_string()]
        );
    }

    #[test]
    fn user_info_query_returns_profile_and_away() {
        let svc = services();
        let alice = online_session(&svc, "Alice");
        let bob = online_session(&svc, "Bob");
        svc.profiles.set_profile("bob", "<html>bob</html>").unwrap();
        bob.with_state_mut(|s| s.away_message = "lunch".into());

        let mut body = BytesMut::new();
        UserInfoQuery {
            request_type: query_type::PROFILE | query_type::AWAY_MESSAGE,
            screen_name: "Bob".into(),
        }
        .encode(&mut body);
        let replies = route(&svc, &alice, frame(locate::USER_INFO_QUERY), &body).unwrap();

        let mut cursor = &replies[0].body[..];
        let reply = UserInfoReply::decode(&mut cursor).unwrap();
        assert_eq!(reply.user_info.screen_name, "Bob");
        assert_eq!(reply.tlvs.str(tags::PROFILE).as_deref(), Some("<html>bob</html>"));
        assert_eq!(reply.tlvs.str(tags::AWAY_MESSAGE).as_deref(), Some("lunch"));
    }

    #[test]
    fn blocked_peer_query_is_refused() {
        let svc = services();
        let alice = online_session(&svc, "Alice");
        online_session(&svc, "Bob");
        svc.feedbags
            .upsert("bob", &[FeedbagItem::deny(1, "alice")])
            .unwrap();

        let mut body = BytesMut::new();
        UserInfoQuery {
            request_type: query_type::PROFILE,
            screen_name: "Bob".into(),
        }
        .encode(&mut body);
        let replies = route(&svc, &alice, frame(locate::USER_INFO_QUERY), &body).unwrap();
        assert_eq!(replies[0].frame.subgroup, causerie_wire::snac::SUBGROUP_ERR);
    }

    #[test]
    fn offline_peer_query_is_refused() {
        let svc = services();
        let alice = online_session(&svc, "Alice");

        let mut body = BytesMut::new();
        UserInfoQuery {
            request_type: query_type::PROFILE,
            screen_name: "Nobody".into(),
        }
        .encode(&mut body);
        let replies = route(&svc, &alice, frame(locate::USER_INFO_QUERY), &body).unwrap();
        assert_eq!(replies[0].frame.subgroup, causerie_wire::snac::SUBGROUP_ERR);
    }
}
