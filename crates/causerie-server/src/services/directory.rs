//! Informational endpoints: Admin, the ODir directory search, UserLookup,
//! Stats and the legacy ICQ envelope. Plain request/response, no fan-out.
//!
//! ODir queries run against the listings and keywords users upload through
//! Locate (`dir_info`/`dir_keyword` in the store).

use std::sync::Arc;

use bytes::BufMut;

use causerie_store::{ident_of, DirQuery};
use causerie_wire::payloads::odir::{
    status as odir_status, tags as dir_tags, InfoQuery, InfoReply, KeywordListReply,
};
use causerie_wire::snac::{
    admin, errcode, foodgroup, icq, odir, stats, user_lookup, SnacFrame,
};
use causerie_wire::tlv::{Tlv, TlvBlock, TlvList};

use crate::error::Result;
use crate::services::Services;
use crate::session::{Session, SnacMessage};

/// Cap on directory search hits returned to one query.
const MAX_DIR_RESULTS: usize = 25;

/// Admin info TLV tags.
mod admin_tags {
    pub const SCREEN_NAME: u16 = 0x0001;
    pub const ERROR_SUBCODE: u16 = 0x0008;
    pub const EMAIL: u16 = 0x0011;
}

const ADMIN_PERMISSIONS: u16 = 0x0003;

pub fn route(
    services: &Services,
    session: &Arc<Session>,
    frame: SnacFrame,
    body: &[u8],
) -> Result<Vec<SnacMessage>> {
    let mut cursor = body;
    match (frame.food_group, frame.subgroup) {
        (foodgroup::ADMIN, admin::INFO_QUERY) => Ok(vec![admin_info_reply(session, frame)]),
        (foodgroup::ADMIN, admin::INFO_CHANGE_REQUEST) => {
            admin_info_change(session, frame, &mut cursor)
        }
        (foodgroup::ADMIN, admin::CONFIRM_REQUEST) => Ok(vec![confirm_reply(frame)]),
        (foodgroup::USER_LOOKUP, user_lookup::FIND_BY_EMAIL) => {
            find_by_email(services, frame, body)
        }
        (foodgroup::ODIR, odir::INFO_QUERY) => dir_search(services, frame, &mut cursor),
        (foodgroup::ODIR, odir::KEYWORD_LIST_QUERY) => keyword_list(services, frame),
        (foodgroup::STATS, stats::REPORT_EVENTS) => {
            let reply = SnacFrame::reply_to(frame, foodgroup::STATS, stats::REPORT_ACK);
            Ok(vec![SnacMessage::new(reply, |_| {})])
        }
        (foodgroup::ICQ, icq::DB_QUERY) => Ok(vec![SnacMessage::error(
            frame,
            errcode::NOT_SUPPORTED_BY_HOST,
        )]),
        _ => Ok(vec![SnacMessage::error(frame, errcode::INVALID_SNAC)]),
    }
}

/// Account info: permissions word, then TLVs for the formatted screen name
/// and the synthesized account email.
fn admin_info_reply(session: &Session, frame: SnacFrame) -> SnacMessage {
    let reply = SnacFrame::reply_to(frame, foodgroup::ADMIN, admin::INFO_REPLY);
    let tlvs = TlvList::new()
        .with(Tlv::str(admin_tags::SCREEN_NAME, session.display()))
        .with(Tlv::str(
            admin_tags::EMAIL,
            &format!("{}@causerie.invalid", session.ident()),
        ));
    SnacMessage::new(reply, move |buf| {
        buf.put_u16(ADMIN_PERMISSIONS);
        buf.put_u16(tlvs.0.len() as u16);
        tlvs.encode(buf);
    })
}

/// Screen-name reformatting: only case and spacing may change, the ident
/// must stay the same.
fn admin_info_change(
    session: &Arc<Session>,
    frame: SnacFrame,
    cursor: &mut &[u8],
) -> Result<Vec<SnacMessage>> {
    let request = TlvList::decode(cursor)?;
    let reply = SnacFrame::reply_to(frame, foodgroup::ADMIN, admin::INFO_CHANGE_REPLY);

    let accepted = request
        .str(admin_tags::SCREEN_NAME)
        .is_some_and(|new_name| ident_of(&new_name) == session.ident());

    let tlvs = if accepted {
        TlvList::new().with(Tlv::str(
            admin_tags::SCREEN_NAME,
            &request.str(admin_tags::SCREEN_NAME).unwrap_or_default(),
        ))
    } else {
        TlvList::new().with(Tlv::u16(admin_tags::ERROR_SUBCODE, 0x0001))
    };
    Ok(vec![SnacMessage::new(reply, move |buf| {
        buf.put_u16(ADMIN_PERMISSIONS);
        buf.put_u16(tlvs.0.len() as u16);
        tlvs.encode(buf);
    })])
}

fn confirm_reply(frame: SnacFrame) -> SnacMessage {
    let reply = SnacFrame::reply_to(frame, foodgroup::ADMIN, admin::CONFIRM_REPLY);
    SnacMessage::new(reply, |buf| buf.put_u16(0x0000))
}

/// Match the local part of the queried address against known idents.
fn find_by_email(
    services: &Services,
    frame: SnacFrame,
    body: &[u8],
) -> Result<Vec<SnacMessage>> {
    let email = String::from_utf8_lossy(body);
    let local = email.split('@').next().unwrap_or("").trim();
    let ident = ident_of(local);

    let matched = services
        .users
        .all_users()?
        .into_iter()
        .any(|u| u.ident == ident);
    if !matched {
        return Ok(vec![SnacMessage::error(frame, errcode::NO_MATCH)]);
    }

    let reply = SnacFrame::reply_to(frame, foodgroup::USER_LOOKUP, user_lookup::FIND_REPLY);
    let tlvs = TlvList::new().with(Tlv::str(0x0001, &ident));
    Ok(vec![SnacMessage::new(reply, move |buf| tlvs.encode(buf))])
}

/// Search the uploaded directory listings by any mix of name, email and
/// keyword. An empty query matches nothing rather than dumping the list.
fn dir_search(
    services: &Services,
    frame: SnacFrame,
    cursor: &mut &[u8],
) -> Result<Vec<SnacMessage>> {
    let request = InfoQuery::decode(cursor)?;
    let query = DirQuery {
        first_name: request.first_name(),
        last_name: request.last_name(),
        email: request.email(),
        keyword: request.keyword(),
    };

    let hits = services.directory.search_dir(&query)?;
    let mut results = Vec::new();
    for hit in hits.into_iter().take(MAX_DIR_RESULTS) {
        let display = services
            .users
            .user(&hit.ident)?
            .map(|u| u.display)
            .unwrap_or_else(|| hit.ident.clone());
        let mut fields = TlvList::new().with(Tlv::str(dir_tags::SCREEN_NAME, &display));
        if !hit.first_name.is_empty() {
            fields.push(Tlv::str(dir_tags::FIRST_NAME, &hit.first_name));
        }
        if !hit.last_name.is_empty() {
            fields.push(Tlv::str(dir_tags::LAST_NAME, &hit.last_name));
        }
        if !hit.email.is_empty() {
            fields.push(Tlv::str(dir_tags::EMAIL, &hit.email));
        }
        results.push(TlvBlock(fields));
    }

    let reply = SnacFrame::reply_to(frame, foodgroup::ODIR, odir::INFO_REPLY);
    let payload = InfoReply {
        status: odir_status::OK,
        results,
    };
    Ok(vec![SnacMessage::new(reply, |buf| payload.encode(buf))])
}

fn keyword_list(services: &Services, frame: SnacFrame) -> Result<Vec<SnacMessage>> {
    let reply = SnacFrame::reply_to(frame, foodgroup::ODIR, odir::KEYWORD_LIST_REPLY);
    let payload = KeywordListReply {
        status: odir_status::OK,
        keywords: services.directory.keywords()?,
    };
    Ok(vec![SnacMessage::new(reply, |buf| payload.encode(buf))])
}

#[cfg(test)]
mod tests {
    use super::*;

    use causerie_store::{ScreenName, User};

    use crate::services::testutil::{online_session, services};

    fn frame(food_group: u16, subgroup: u16) -> SnacFrame {
        SnacFrame {
            food_group,
            subgroup,
            flags: 0,
            request_id: 51,
        }
    }

    #[test]
    fn admin_info_reports_display_name() {
        let svc = services();
        let session = online_session(&svc, "Bob Smith");
        let replies = route(
            &svc,
            &session,
            frame(foodgroup::ADMIN, admin::INFO_QUERY),
            &[],
        )
        .unwrap();
        assert_eq!(replies[0].frame.subgroup, admin::INFO_REPLY);
        // permissions + count + TLVs
        assert!(replies[0].body.len() > 4);
    }

    #[test]
    fn reformat_accepts_case_change_only() {
        let svc = services();
        let session = online_session(&svc, "bobsmith");

        let mut ok_body = bytes::BytesMut::new();
        TlvList::new()
            .with(Tlv::str(admin_tags::SCREEN_NAME, "Bob Smith"))
            .encode(&mut ok_body);
        let replies = route(
            &svc,
            &session,
            frame(foodgroup::ADMIN, admin::INFO_CHANGE_REQUEST),
            &ok_body,
        )
        .unwrap();
        assert_eq!(replies[0].frame.subgroup, admin::INFO_CHANGE_REPLY);

        let mut bad_body = bytes::BytesMut::new();
        TlvList::new()
            .with(Tlv::str(admin_tags::SCREEN_NAME, "Different Name"))
            .encode(&mut bad_body);
        let replies = route(
            &svc,
            &session,
            frame(foodgroup::ADMIN, admin::INFO_CHANGE_REQUEST),
            &bad_body,
        )
        .unwrap();
        // Rejected rename carries the error TLV after the header words.
        let mut cursor = &replies[0].body[4..];
        let tlvs = TlvList::decode(&mut cursor).unwrap();
        assert_eq!(tlvs.get_u16(admin_tags::ERROR_SUBCODE), Some(0x0001));
    }

    #[test]
    fn email_lookup_finds_known_user() {
        let svc = services();
        let session = online_session(&svc, "Alice");
        let mut user = User::new(&ScreenName::new("Carol"));
        user.set_password("pw");
        svc.users.insert_user(&user).unwrap();

        let replies = route(
            &svc,
            &session,
            frame(foodgroup::USER_LOOKUP, user_lookup::FIND_BY_EMAIL),
            b"carol@example.com",
        )
        .unwrap();
        assert_eq!(replies[0].frame.subgroup, user_lookup::FIND_REPLY);

        let replies = route(
            &svc,
            &session,
            frame(foodgroup::USER_LOOKUP, user_lookup::FIND_BY_EMAIL),
            b"ghost@example.com",
        )
        .unwrap();
        assert_eq!(replies[0].frame.subgroup, causerie_wire::snac::SUBGROUP_ERR);
    }

    #[test]
    fn dir_search_finds_uploaded_listing() {
        let svc = services();
        let session = online_session(&svc, "Alice");
        let mut carol = User::new(&ScreenName::new("Carol"));
        carol.set_password("pw");
        svc.users.insert_user(&carol).unwrap();
        svc.directory
            .set_dir_info(&causerie_store::DirInfo {
                ident: "carol".into(),
                first_name: "Carol".into(),
                last_name: "Jones".into(),
                email: "carol@example.com".into(),
            })
            .unwrap();

        let mut body = bytes::BytesMut::new();
        InfoQuery {
            tlvs: TlvList::new().with(Tlv::str(dir_tags::EMAIL, "carol@example.com")),
        }
        .encode(&mut body);
        let replies = route(
            &svc,
            &session,
            frame(foodgroup::ODIR, odir::INFO_QUERY),
            &body,
        )
        .unwrap();

        let mut cursor = &replies[0].body[..];
        let reply = InfoReply::decode(&mut cursor).unwrap();
        assert_eq!(reply.status, odir_status::OK);
        assert_eq!(reply.results.len(), 1);
        assert_eq!(
            reply.results[0].0.str(dir_tags::SCREEN_NAME).as_deref(),
            Some("Carol")
        );
    }

    #[test]
    fn dir_search_by_keyword() {
        let svc = services();
        let session = online_session(&svc, "Alice");
        svc.directory
            .set_dir_info(&causerie_store::DirInfo {
                ident: "carol".into(),
                ..Default::default()
            })
            .unwrap();
        svc.directory
            .set_keywords("carol", &["chess".into()])
            .unwrap();

        let mut body = bytes::BytesMut::new();
        InfoQuery {
            tlvs: TlvList::new().with(Tlv::str(dir_tags::KEYWORD, "chess")),
        }
        .encode(&mut body);
        let replies = route(
            &svc,
            &session,
            frame(foodgroup::ODIR, odir::INFO_QUERY),
            &body,
        )
        .unwrap();

        let mut cursor = &replies[0].body[..];
        let reply = InfoReply::decode(&mut cursor).unwrap();
        assert_eq!(reply.results.len(), 1);
    }

    #[test]
    fn empty_dir_query_returns_no_hits() {
        let svc = services();
        let session = online_session(&svc, "Alice");
        svc.directory
            .set_dir_info(&causerie_store::DirInfo {
                ident: "carol".into(),
                ..Default::default()
            })
            .unwrap();

        let replies = route(
            &svc,
            &session,
            frame(foodgroup::ODIR, odir::INFO_QUERY),
            &[],
        )
        .unwrap();
        let mut cursor = &replies[0].body[..];
        let reply = InfoReply::decode(&mut cursor).unwrap();
        assert!(reply.results.is_empty());
    }

    #[test]
    fn keyword_list_reports_vocabulary() {
        let svc = services();
        let session = online_session(&svc, "Alice");
        svc.directory
            .set_keywords("carol", &["chess".into(), "aviation".into()])
            .unwrap();

        let replies = route(
            &svc,
            &session,
            frame(foodgroup::ODIR, odir::KEYWORD_LIST_QUERY),
            &[],
        )
        .unwrap();
        let mut cursor = &replies[0].body[..];
        let reply = KeywordListReply::decode(&mut cursor).unwrap();
        assert_eq!(
            reply.keywords,
            vec!["aviation".to_string(), "chess".to_string()]
        );
    }

    #[test]
    fn stats_report_is_acked() {
        let svc = services();
        let session = online_session(&svc, "Alice");
        let replies = route(
            &svc,
            &session,
            frame(foodgroup::STATS, stats::REPORT_EVENTS),
            &[],
        )
        .unwrap();
        assert_eq!(replies[0].frame.subgroup, stats::REPORT_ACK);
    }

    #[test]
    fn icq_is_politely_unsupported() {
        let svc = services();
        let session = online_session(&svc, "Alice");
        let replies = route(&svc, &session, frame(foodgroup::ICQ, icq::DB_QUERY), &[]).unwrap();
        assert_eq!(replies[0].frame.subgroup, causerie_wire::snac::SUBGROUP_ERR);
    }
}
