//! BART: buddy icon storage, keyed by a hash truncated to 16 bytes.

use std::sync::Arc;

use sha2::{Digest, Sha256};

use causerie_wire::payloads::bart::{
    code, BartId, DownloadQuery, DownloadReply, UploadQuery, UploadReply,
};
use causerie_wire::snac::{bart, errcode, foodgroup, SnacFrame};

use crate::error::Result;
use crate::services::Services;
use crate::session::{Session, SnacMessage};

pub const HASH_LEN: usize = 16;

/// 7KB is the period client-side icon ceiling; anything bigger is refused.
pub const MAX_ICON_BYTES: usize = 7 * 1024;

pub fn item_hash(data: &[u8]) -> Vec<u8> {
    Sha256::digest(data)[..HASH_LEN].to_vec()
}

pub fn route(
    services: &Services,
    session: &Arc<Session>,
    frame: SnacFrame,
    body: &[u8],
) -> Result<Vec<SnacMessage>> {
    let _ = session;
    let mut cursor = body;
    match frame.subgroup {
        bart::UPLOAD_QUERY => upload(services, frame, &mut cursor),
        bart::DOWNLOAD_QUERY => download(services, frame, &mut cursor),
        _ => Ok(vec![SnacMessage::error(frame, errcode::INVALID_SNAC)]),
    }
}

fn upload(services: &Services, frame: SnacFrame, cursor: &mut &[u8]) -> Result<Vec<SnacMessage>> {
    let query = UploadQuery::decode(cursor)?;
    let reply = SnacFrame::reply_to(frame, foodgroup::BART, bart::UPLOAD_REPLY);

    if query.data.is_empty() || query.data.len() > MAX_ICON_BYTES {
        let response = UploadReply {
            code: code::TOO_BIG,
            id: BartId {
                item_type: query.item_type,
                flags: 0,
                hash: Vec::new(),
            },
        };
        return Ok(vec![SnacMessage::new(reply, |buf| response.encode(buf))]);
    }

    let hash = item_hash(&query.data);
    services.bart.bart_upsert(&hash, &query.data)?;
    tracing::debug!(hash = %hex::encode(&hash), size = query.data.len(), "stored bart item");

    let response = UploadReply {
        code: code::SUCCESS,
        id: BartId {
            item_type: query.item_type,
            flags: 0,
            hash,
        },
    };
    Ok(vec![SnacMessage::new(reply, |buf| response.encode(buf))])
}

fn download(
    services: &Services,
    frame: SnacFrame,
    cursor: &mut &[u8],
) -> Result<Vec<SnacMessage>> {
    let query = DownloadQuery::decode(cursor)?;
    // A missing icon is an explicit outcome, never an empty body.
    let Some(data) = services.bart.bart_retrieve(&query.id.hash)? else {
        return Ok(vec![SnacMessage::error(frame, errcode::NO_MATCH)]);
    };

    let reply = SnacFrame::reply_to(frame, foodgroup::BART, bart::DOWNLOAD_REPLY);
    let response = DownloadReply {
        id: query.id,
        data,
    };
    Ok(vec![SnacMessage::new(reply, |buf| response.encode(buf))])
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::BytesMut;

    use causerie_wire::payloads::bart::item_type;

    use crate::services::testutil::{online_session, services};

    fn frame(subgroup: u16) -> SnacFrame {
        SnacFrame {
            food_group: foodgroup::BART,
            subgroup,
            flags: 0,
            request_id: 31,
        }
    }

    #[test]
    fn upload_then_download_roundtrips() {
        let svc = services();
        let session = online_session(&svc, "Alice");
        let icon = vec![0xFF, 0xD8, 0xFF, 0xE0, 0x01, 0x02];

        let mut body = BytesMut::new();
        UploadQuery {
            item_type: item_type::BUDDY_ICON,
            data: icon.clone(),
        }
        .encode(&mut body);
        let replies = route(&svc, &session, frame(bart::UPLOAD_QUERY), &body).unwrap();
        let mut cursor = &replies[0].body[..];
        let upload_reply = UploadReply::decode(&mut cursor).unwrap();
        assert_eq!(upload_reply.code, code::SUCCESS);
        assert_eq!(upload_reply.id.hash.len(), HASH_LEN);

        let mut body = BytesMut::new();
        DownloadQuery {
            id: upload_reply.id.clone(),
        }
        .encode(&mut body);
        let replies = route(&svc, &session, frame(bart::DOWNLOAD_QUERY), &body).unwrap();
        let mut cursor = &replies[0].body[..];
        let download_reply = DownloadReply::decode(&mut cursor).unwrap();
        assert_eq!(download_reply.data, icon);
    }

    #[test]
    fn missing_icon_yields_error_not_empty_body() {
        let svc = services();
        let session = online_session(&svc, "Alice");

        let mut body = BytesMut::new();
        DownloadQuery {
            id: BartId {
                item_type: item_type::BUDDY_ICON,
                flags: 0,
                hash: vec![0xEE; HASH_LEN],
            },
        }
        .encode(&mut body);
        let replies = route(&svc, &session, frame(bart::DOWNLOAD_QUERY), &body).unwrap();
        assert_eq!(replies[0].frame.subgroup, causerie_wire::snac::SUBGROUP_ERR);
    }

    #[test]
    fn oversized_upload_refused() {
        let svc = services();
        let session = online_session(&svc, "Alice");

        let mut body = BytesMut::new();
        UploadQuery {
            item_type: item_type::BUDDY_ICON,
            data: vec![0; MAX_ICON_BYTES + 1],
        }
        .encode(&mut body);
        let replies = route(&svc, &session, frame(bart::UPLOAD_QUERY), &body).unwrap();
        let mut cursor = &replies[0].body[..];
        let reply = UploadReply::decode(&mut cursor).unwrap();
        assert_eq!(reply.code, code::TOO_BIG);
    }

    #[test]
    fn identical_blobs_share_a_key() {
        assert_eq!(item_hash(b"same"), item_hash(b"same"));
        assert_ne!(item_hash(b"one"), item_hash(b"two"));
    }
}
