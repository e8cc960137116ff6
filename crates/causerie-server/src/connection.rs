//! Per-connection dispatcher.
//!
//! One listener multiplexes all three connection kinds; the sign-on frame
//! decides which: no cookie TLV means an authentication connection (BUCP
//! SNACs, or roasted TLVs already in the sign-on frame), a BOS cookie
//! attaches a session, a chat cookie joins a room. After routing, a read
//! task and a write task run concurrently until signout, protocol error or
//! eviction.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use bytes::BytesMut;
use chrono::Utc;
use tokio::io::AsyncWriteExt;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch};
use tokio::time::timeout;
use tracing::{debug, info, warn};

use causerie_store::ScreenName;
use causerie_wire::cookie::ServiceKind;
use causerie_wire::flap::{FlapFrame, FrameType, SequenceCounter, FLAP_HEADER_LEN, FLAP_VERSION};
use causerie_wire::payloads::bucp::tags as auth_tags;
use causerie_wire::payloads::oservice::{rate_code, RateLimitNotification};
use causerie_wire::payloads::SnacError;
use causerie_wire::snac::{bucp, errcode, foodgroup, oservice, SnacFrame, SUBGROUP_ERR};
use causerie_wire::tlv::{Tlv, TlvList};

use crate::error::{Result, ServerError};
use crate::rate_limit::{ConnectionRateLimiter, RateBand};
use crate::services::{auth, chat as chat_service, oservice as oservice_service};
use crate::services::{FeedbagCluster, Services};
use crate::session::{DisconnectReason, Session, SessionEvent, SnacMessage, QUEUE_CAPACITY};

/// TLV 0x09 in a sign-off frame tells the client why it was dropped.
const SIGNOFF_ERROR_TAG: u16 = 0x0009;
const SIGNOFF_SIGNED_ON_ELSEWHERE: u16 = 0x0001;

pub async fn handle_connection(
    stream: TcpStream,
    addr: SocketAddr,
    services: Arc<Services>,
) -> Result<()> {
    let (mut read_half, mut write_half) = stream.into_split();
    let mut read_seq = SequenceCounter::new(0);
    let mut write_seq = SequenceCounter::new(0);

    // Hello: the server speaks first with a FLAP sign-on frame.
    write_frame(
        &mut write_half,
        &mut write_seq,
        FrameType::SignOn,
        FLAP_VERSION.to_be_bytes().to_vec(),
    )
    .await?;

    // AwaitSignon, bounded by the auth handshake deadline.
    let frame = timeout(
        services.config.auth_timeout,
        read_frame(&mut read_half, &mut read_seq),
    )
    .await
    .map_err(|_| ServerError::AuthTimeout)??;
    if frame.frame_type != FrameType::SignOn {
        let _ = write_frame(&mut write_half, &mut write_seq, FrameType::SignOff, vec![]).await;
        return Err(ServerError::Protocol(format!(
            "expected sign-on frame, got {:?}",
            frame.frame_type
        )));
    }
    let tlvs = match parse_signon_payload(&frame.payload) {
        Ok(tlvs) => tlvs,
        Err(e) => {
            // Best-effort sign-off before dropping a malformed peer.
            let _ = write_frame(&mut write_half, &mut write_seq, FrameType::SignOff, vec![]).await;
            return Err(e);
        }
    };

    if let Some(cookie) = tlvs.bytes(auth_tags::AUTHORIZATION_COOKIE) {
        let now = Utc::now().timestamp() as u32;
        let cookie = match services.cookie_baker.verify(cookie, now) {
            Ok(cookie) => cookie,
            Err(e) => {
                let _ = write_frame(&mut write_half, &mut write_seq, FrameType::SignOff, vec![])
                    .await;
                return Err(ServerError::Cookie(e));
            }
        };
        let screen_name = ScreenName::new(cookie.display.clone());
        match cookie.service {
            ServiceKind::Bos => {
                run_bos(
                    read_half, write_half, read_seq, write_seq, addr, screen_name, services,
                )
                .await
            }
            ServiceKind::Chat(room_id) => {
                run_chat(
                    read_half, write_half, read_seq, write_seq, addr, screen_name, room_id,
                    services,
                )
                .await
            }
        }
    } else if tlvs.has(auth_tags::SCREEN_NAME) && tlvs.has(auth_tags::ROASTED_PASSWORD) {
        // Roasted FLAP auth: reply TLVs ride a sign-off frame, then close.
        let reply = auth::handle_roasted_signon(&services, &tlvs)?;
        let mut buf = BytesMut::new();
        reply.encode(&mut buf);
        write_frame(&mut write_half, &mut write_seq, FrameType::SignOff, buf.to_vec()).await?;
        Ok(())
    } else {
        run_bucp(read_half, write_half, read_seq, write_seq, services).await
    }
}

fn parse_signon_payload(payload: &[u8]) -> Result<TlvList> {
    if payload.len() < 4 {
        return Err(ServerError::Protocol("sign-on payload too short".into()));
    }
    let version = u32::from_be_bytes([payload[0], payload[1], payload[2], payload[3]]);
    if version != FLAP_VERSION {
        return Err(ServerError::Protocol(format!(
            "unsupported FLAP version {version:#010x}"
        )));
    }
    let mut cursor = &payload[4..];
    Ok(TlvList::decode(&mut cursor)?)
}

/// The BUCP authentication connection: challenge then login, then the
/// connection is done either way.
async fn run_bucp(
    mut read_half: OwnedReadHalf,
    mut write_half: OwnedWriteHalf,
    mut read_seq: SequenceCounter,
    mut write_seq: SequenceCounter,
    services: Arc<Services>,
) -> Result<()> {
    let deadline = tokio::time::Instant::now() + services.config.auth_timeout;
    loop {
        let frame = tokio::time::timeout_at(deadline, read_frame(&mut read_half, &mut read_seq))
            .await
            .map_err(|_| ServerError::AuthTimeout)??;
        match frame.frame_type {
            FrameType::KeepAlive => continue,
            FrameType::SignOff => return Ok(()),
            FrameType::Data => {
                let mut cursor = &frame.payload[..];
                let snac = SnacFrame::decode(&mut cursor)?;
                if snac.food_group != foodgroup::BUCP {
                    return Err(ServerError::Protocol(format!(
                        "non-BUCP snac {:#06x} on auth connection",
                        snac.food_group
                    )));
                }
                match snac.subgroup {
                    bucp::CHALLENGE_REQUEST => {
                        let reply = auth::handle_challenge_request(&services, snac, cursor)?;
                        let terminal = reply.frame.subgroup == bucp::LOGIN_RESPONSE;
                        write_snac(&mut write_half, &mut write_seq, &reply).await?;
                        if terminal {
                            break;
                        }
                    }
                    bucp::LOGIN_REQUEST => {
                        let reply = auth::handle_login_request(&services, snac, cursor)?;
                        write_snac(&mut write_half, &mut write_seq, &reply).await?;
                        break;
                    }
                    _ => {
                        let error = SnacMessage::error(snac, errcode::INVALID_SNAC);
                        write_snac(&mut write_half, &mut write_seq, &error).await?;
                    }
                }
            }
            other => {
                return Err(ServerError::Protocol(format!(
                    "unexpected frame {other:?} on auth connection"
                )));
            }
        }
    }
    let _ = write_frame(&mut write_half, &mut write_seq, FrameType::SignOff, vec![]).await;
    Ok(())
}

async fn run_bos(
    mut read_half: OwnedReadHalf,
    write_half: OwnedWriteHalf,
    mut read_seq: SequenceCounter,
    write_seq: SequenceCounter,
    addr: SocketAddr,
    screen_name: ScreenName,
    services: Arc<Services>,
) -> Result<()> {
    let session = services.sessions.add_new(&screen_name, Some(addr));
    info!(ident = %session.ident(), addr = %addr, "BOS session attached");

    let queue = session
        .take_queue()
        .expect("fresh session queue already claimed");
    let writer = tokio::spawn(write_loop(
        write_half,
        queue,
        session.closed_signal(),
        write_seq,
        services.config.keepalive_interval,
    ));

    session.push(oservice_service::host_online_message(
        oservice_service::BOS_FOOD_GROUPS,
    ));

    let result = bos_read_loop(&mut read_half, &mut read_seq, &session, &services).await;

    auth::signout(&services, &session);
    let _ = writer.await;
    debug!(ident = %session.ident(), "BOS connection closed");
    result
}

async fn bos_read_loop(
    read_half: &mut OwnedReadHalf,
    read_seq: &mut SequenceCounter,
    session: &Arc<Session>,
    services: &Arc<Services>,
) -> Result<()> {
    let mut limiter = ConnectionRateLimiter::new(services.rate_classes.clone(), Instant::now());
    let mut cluster = FeedbagCluster::default();

    loop {
        if session.is_closed() {
            return Ok(());
        }
        let frame = match timeout(
            services.config.idle_timeout,
            read_frame(read_half, read_seq),
        )
        .await
        {
            Ok(frame) => frame?,
            Err(_) => return Err(ServerError::IdleTimeout),
        };
        match frame.frame_type {
            FrameType::KeepAlive => continue,
            FrameType::SignOff => return Ok(()),
            FrameType::Error => {
                debug!(ident = %session.ident(), "client FLAP error frame");
                continue;
            }
            FrameType::SignOn => {
                return Err(ServerError::Protocol("sign-on frame after routing".into()));
            }
            FrameType::Data => {
                let mut cursor = &frame.payload[..];
                let snac = SnacFrame::decode(&mut cursor)?;

                match check_rate(&mut limiter, session, snac) {
                    RateOutcome::Drop => continue,
                    RateOutcome::Disconnect => return Ok(()),
                    RateOutcome::Proceed => {}
                }

                let replies = services.route_bos(session, &mut cluster, snac, cursor)?;
                for reply in replies {
                    session.push(reply);
                }
            }
        }
    }
}

enum RateOutcome {
    Proceed,
    Drop,
    Disconnect,
}

fn check_rate(
    limiter: &mut ConnectionRateLimiter,
    session: &Session,
    snac: SnacFrame,
) -> RateOutcome {
    let verdict = limiter.check(snac.food_group, snac.subgroup, Instant::now());
    let notify = |code: u16| {
        let payload = RateLimitNotification {
            code,
            class: verdict.class,
        };
        session.push(SnacMessage::new(
            SnacFrame::new(foodgroup::OSERVICE, oservice::RATE_LIMIT_NOTIFICATION),
            |buf| payload.encode(buf),
        ));
    };
    match verdict.band {
        RateBand::Clear => {
            if verdict.entered.is_some() {
                notify(rate_code::CLEAR);
            }
            RateOutcome::Proceed
        }
        RateBand::Alert => {
            if verdict.entered.is_some() {
                warn!(ident = %session.ident(), "rate alert");
                notify(rate_code::WARNING);
            }
            RateOutcome::Proceed
        }
        RateBand::Limited => {
            if verdict.entered.is_some() {
                warn!(ident = %session.ident(), "rate limited, dropping snacs");
                notify(rate_code::LIMITED);
            }
            session.push(SnacMessage::error(snac, errcode::RATE_LIMIT_EXCEEDED));
            RateOutcome::Drop
        }
        RateBand::Disconnect => {
            warn!(ident = %session.ident(), "rate disconnect threshold crossed");
            session.disconnect(DisconnectReason::RateExceeded);
            RateOutcome::Disconnect
        }
    }
}

#[allow(clippy::too_many_arguments)]
async fn run_chat(
    mut read_half: OwnedReadHalf,
    mut write_half: OwnedWriteHalf,
    mut read_seq: SequenceCounter,
    mut write_seq: SequenceCounter,
    addr: SocketAddr,
    screen_name: ScreenName,
    room_id: uuid::Uuid,
    services: Arc<Services>,
) -> Result<()> {
    // A chat cookie is only valid while the room exists.
    let Some(room) = services.rooms.get(room_id) else {
        warn!(addr = %addr, room = %room_id, "chat join for missing room");
        let error = SnacMessage::new(
            SnacFrame::new(foodgroup::CHAT, SUBGROUP_ERR),
            |buf| SnacError::new(errcode::NOT_AVAILABLE).encode(buf),
        );
        let _ = write_snac(&mut write_half, &mut write_seq, &error).await;
        let _ = write_frame(&mut write_half, &mut write_seq, FrameType::SignOff, vec![]).await;
        return Ok(());
    };

    let session = room.registry().add_new(&screen_name, Some(addr));
    info!(ident = %session.ident(), room = %room.cookie(), "chat session attached");

    let queue = session
        .take_queue()
        .expect("fresh session queue already claimed");
    let writer = tokio::spawn(write_loop(
        write_half,
        queue,
        session.closed_signal(),
        write_seq,
        services.config.keepalive_interval,
    ));

    session.push(oservice_service::host_online_message(
        oservice_service::CHAT_FOOD_GROUPS,
    ));

    let result = chat_read_loop(&mut read_half, &mut read_seq, &room, &session, &services).await;

    let was_ready = session.is_ready();
    room.registry().remove(session.id());
    if was_ready {
        chat_service::announce_leave(&room, &session);
    }
    services.rooms.remove_if_empty(room.cookie());
    session.close();
    let _ = writer.await;
    result
}

async fn chat_read_loop(
    read_half: &mut OwnedReadHalf,
    read_seq: &mut SequenceCounter,
    room: &Arc<crate::chat::ChatRoom>,
    session: &Arc<Session>,
    services: &Arc<Services>,
) -> Result<()> {
    let mut limiter = ConnectionRateLimiter::new(services.rate_classes.clone(), Instant::now());
    loop {
        if session.is_closed() {
            return Ok(());
        }
        let frame = match timeout(
            services.config.idle_timeout,
            read_frame(read_half, read_seq),
        )
        .await
        {
            Ok(frame) => frame?,
            Err(_) => return Err(ServerError::IdleTimeout),
        };
        match frame.frame_type {
            FrameType::KeepAlive => continue,
            FrameType::SignOff => return Ok(()),
            FrameType::Error => continue,
            FrameType::SignOn => {
                return Err(ServerError::Protocol("sign-on frame after routing".into()));
            }
            FrameType::Data => {
                let mut cursor = &frame.payload[..];
                let snac = SnacFrame::decode(&mut cursor)?;

                match check_rate(&mut limiter, session, snac) {
                    RateOutcome::Drop => continue,
                    RateOutcome::Disconnect => return Ok(()),
                    RateOutcome::Proceed => {}
                }

                let replies = services.route_chat(room, session, snac, cursor)?;
                for reply in replies {
                    session.push(reply);
                }
            }
        }
    }
}

/// Drains the session queue onto the wire; also the only place sign-off
/// frames and keepalives are written after routing.
async fn write_loop(
    mut write_half: OwnedWriteHalf,
    mut queue: mpsc::Receiver<SessionEvent>,
    mut closed: watch::Receiver<bool>,
    mut seq: SequenceCounter,
    keepalive: std::time::Duration,
) {
    loop {
        tokio::select! {
            event = queue.recv() => match event {
                Some(SessionEvent::Snac(message)) => {
                    if write_snac(&mut write_half, &mut seq, &message).await.is_err() {
                        break;
                    }
                }
                Some(SessionEvent::Disconnect(reason)) => {
                    let _ = write_signoff(&mut write_half, &mut seq, Some(reason)).await;
                    break;
                }
                None => break,
            },
            _ = closed.changed() => {
                // Bounded best-effort drain, then sign off.
                let mut budget = QUEUE_CAPACITY;
                let mut reason = None;
                while budget > 0 {
                    match queue.try_recv() {
                        Ok(SessionEvent::Snac(message)) => {
                            if write_snac(&mut write_half, &mut seq, &message).await.is_err() {
                                break;
                            }
                        }
                        Ok(SessionEvent::Disconnect(r)) => {
                            reason = Some(r);
                            break;
                        }
                        Err(_) => break,
                    }
                    budget -= 1;
                }
                let _ = write_signoff(&mut write_half, &mut seq, reason).await;
                break;
            }
            _ = tokio::time::sleep(keepalive) => {
                // Opportunistic keepalive on an idle connection.
                if write_frame(&mut write_half, &mut seq, FrameType::KeepAlive, vec![])
                    .await
                    .is_err()
                {
                    break;
                }
            }
        }
    }
    let _ = write_half.shutdown().await;
}

async fn write_signoff(
    write_half: &mut OwnedWriteHalf,
    seq: &mut SequenceCounter,
    reason: Option<DisconnectReason>,
) -> std::io::Result<()> {
    let payload = match reason {
        Some(DisconnectReason::SignedOnElsewhere) => {
            let mut buf = BytesMut::new();
            TlvList::new()
                .with(Tlv::u16(SIGNOFF_ERROR_TAG, SIGNOFF_SIGNED_ON_ELSEWHERE))
                .encode(&mut buf);
            buf.to_vec()
        }
        _ => Vec::new(),
    };
    write_frame(write_half, seq, FrameType::SignOff, payload).await
}

async fn read_frame(
    read_half: &mut OwnedReadHalf,
    seq: &mut SequenceCounter,
) -> Result<FlapFrame> {
    use tokio::io::AsyncReadExt;

    let mut header = [0u8; FLAP_HEADER_LEN];
    read_half.read_exact(&mut header).await?;
    let (frame_type, sequence, payload_len) = FlapFrame::decode_header(&header)?;
    if !seq.observe(sequence) {
        // Diagnostic only; duplicates and gaps are not fatal.
        debug!(sequence, "FLAP sequence out of order");
    }
    let mut payload = vec![0u8; payload_len];
    read_half.read_exact(&mut payload).await?;
    Ok(FlapFrame::new(frame_type, sequence, payload))
}

async fn write_frame(
    write_half: &mut OwnedWriteHalf,
    seq: &mut SequenceCounter,
    frame_type: FrameType,
    payload: Vec<u8>,
) -> std::io::Result<()> {
    let frame = FlapFrame::new(frame_type, seq.take(), payload);
    write_half.write_all(&frame.encode()).await?;
    write_half.flush().await
}

async fn write_snac(
    write_half: &mut OwnedWriteHalf,
    seq: &mut SequenceCounter,
    message: &SnacMessage,
) -> std::io::Result<()> {
    let mut payload = BytesMut::new();
    message.frame.encode(&mut payload);
    payload.extend_from_slice(&message.body);
    write_frame(write_half, seq, FrameType::Data, payload.to_vec()).await
}

#[cfg(test)]
mod tests {
    use super::*;

    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    use causerie_wire::payloads::bucp::{ChallengeRequest, LoginResponse};
    use causerie_wire::payloads::oservice::HostOnline;

    use crate::services::testutil;

    async fn start_server() -> (SocketAddr, Arc<Services>) {
        let services = Arc::new(testutil::services());
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let accept_services = services.clone();
        tokio::spawn(async move {
            while let Ok((stream, peer)) = listener.accept().await {
                let services = accept_services.clone();
                tokio::spawn(async move {
                    let _ = handle_connection(stream, peer, services).await;
                });
            }
        });
        (addr, services)
    }

    async fn client_read_frame(stream: &mut TcpStream) -> FlapFrame {
        let mut header = [0u8; FLAP_HEADER_LEN];
        stream.read_exact(&mut header).await.unwrap();
        let (frame_type, sequence, payload_len) = FlapFrame::decode_header(&header).unwrap();
        let mut payload = vec![0u8; payload_len];
        stream.read_exact(&mut payload).await.unwrap();
        FlapFrame::new(frame_type, sequence, payload)
    }

    async fn client_write_frame(
        stream: &mut TcpStream,
        seq: &mut SequenceCounter,
        frame_type: FrameType,
        payload: Vec<u8>,
    ) {
        let frame = FlapFrame::new(frame_type, seq.take(), payload);
        stream.write_all(&frame.encode()).await.unwrap();
    }

    fn signon_payload(tlvs: TlvList) -> Vec<u8> {
        let mut buf = BytesMut::new();
        buf.extend_from_slice(&FLAP_VERSION.to_be_bytes());
        tlvs.encode(&mut buf);
        buf.to_vec()
    }

    #[tokio::test]
    async fn bucp_unknown_user_over_the_wire() {
        let (addr, _services) = start_server().await;
        let mut stream = TcpStream::connect(addr).await.unwrap();
        let mut seq = SequenceCounter::new(0);

        // Server hello.
        let hello = client_read_frame(&mut stream).await;
        assert_eq!(hello.frame_type, FrameType::SignOn);

        // Bare sign-on: no cookie, no roasted credentials -> BUCP flow.
        client_write_frame(
            &mut stream,
            &mut seq,
            FrameType::SignOn,
            signon_payload(TlvList::new()),
        )
        .await;

        // Challenge for a ghost account.
        let mut payload = BytesMut::new();
        SnacFrame::new(foodgroup::BUCP, bucp::CHALLENGE_REQUEST).encode(&mut payload);
        ChallengeRequest::new("Ghost").encode(&mut payload);
        client_write_frame(&mut stream, &mut seq, FrameType::Data, payload.to_vec()).await;

        let frame = client_read_frame(&mut stream).await;
        assert_eq!(frame.frame_type, FrameType::Data);
        let mut cursor = &frame.payload[..];
        let snac = SnacFrame::decode(&mut cursor).unwrap();
        assert_eq!(snac.subgroup, bucp::LOGIN_RESPONSE);
        let response = LoginResponse::decode(&mut cursor).unwrap();
        assert_eq!(response.error_subcode(), Some(0x0001));
        assert_eq!(response.cookie(), None);

        // The server signs off after a terminal login error.
        let frame = client_read_frame(&mut stream).await;
        assert_eq!(frame.frame_type, FrameType::SignOff);
    }

    #[tokio::test]
    async fn bos_cookie_attaches_session_and_sends_host_online() {
        let (addr, services) = start_server().await;
        let cookie = auth::mint_bos_cookie(&services, &ScreenName::new("Alice"));

        let mut stream = TcpStream::connect(addr).await.unwrap();
        let mut seq = SequenceCounter::new(0);
        let hello = client_read_frame(&mut stream).await;
        assert_eq!(hello.frame_type, FrameType::SignOn);

        client_write_frame(
            &mut stream,
            &mut seq,
            FrameType::SignOn,
            signon_payload(
                TlvList::new().with(Tlv::new(auth_tags::AUTHORIZATION_COOKIE, cookie)),
            ),
        )
        .await;

        let frame = client_read_frame(&mut stream).await;
        assert_eq!(frame.frame_type, FrameType::Data);
        let mut cursor = &frame.payload[..];
        let snac = SnacFrame::decode(&mut cursor).unwrap();
        assert_eq!(snac.food_group, foodgroup::OSERVICE);
        assert_eq!(snac.subgroup, oservice::HOST_ONLINE);
        let host_online = HostOnline::decode(&mut cursor).unwrap();
        assert!(host_online.food_groups.contains(&foodgroup::ICBM));

        // The session is registered under the ident form.
        let session = services.sessions.find_by_ident("alice").unwrap();
        assert_eq!(session.display(), "Alice");

        // Clean sign-off removes it.
        client_write_frame(&mut stream, &mut seq, FrameType::SignOff, vec![]).await;
        for _ in 0..50 {
            if services.sessions.find_by_ident("alice").is_none() {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
        assert!(services.sessions.find_by_ident("alice").is_none());
    }

    #[test]
    fn signon_payload_parses_version_and_tlvs() {
        let mut buf = BytesMut::new();
        buf.extend_from_slice(&FLAP_VERSION.to_be_bytes());
        TlvList::new()
            .with(Tlv::new(auth_tags::AUTHORIZATION_COOKIE, vec![1, 2, 3]))
            .encode(&mut buf);

        let tlvs = parse_signon_payload(&buf).unwrap();
        assert_eq!(tlvs.bytes(auth_tags::AUTHORIZATION_COOKIE), Some(&[1u8, 2, 3][..]));
    }

    #[test]
    fn bad_flap_version_rejected() {
        let mut buf = BytesMut::new();
        buf.extend_from_slice(&2u32.to_be_bytes());
        assert!(matches!(
            parse_signon_payload(&buf),
            Err(ServerError::Protocol(_))
        ));
    }

    #[test]
    fn short_signon_payload_rejected() {
        assert!(parse_signon_payload(&[0, 0]).is_err());
    }
}
