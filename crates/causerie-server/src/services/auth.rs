//! Authentication: BUCP challenge/response for 4.x/5.x clients and the
//! roasted-password FLAP sign-on used by 1.x-3.x and TOC-era clients.
//! Both flavours share user storage and mint the same HMAC cookie.

use chrono::Utc;
use uuid::Uuid;

use causerie_store::{new_stub_user, ScreenName};
use causerie_wire::cookie::{AuthCookie, CookieBaker, ServiceKind};
use causerie_wire::payloads::bucp::{
    errsub, tags, ChallengeRequest, ChallengeResponse, LoginRequest, LoginResponse,
};
use causerie_wire::snac::{bucp, foodgroup, SnacFrame};
use causerie_wire::tlv::{Tlv, TlvList};

use crate::error::{Result, ServerError};
use crate::services::Services;
use crate::session::{Session, SnacMessage};

fn mint_cookie(
    baker: &CookieBaker,
    service: ServiceKind,
    screen_name: &ScreenName,
    ttl_secs: u32,
) -> Vec<u8> {
    let cookie = AuthCookie {
        service,
        ident: screen_name.ident(),
        display: screen_name.display().to_owned(),
        nonce: CookieBaker::fresh_nonce(),
        expires_at: Utc::now().timestamp() as u32 + ttl_secs,
    };
    baker.mint(&cookie)
}

/// Mint a BOS cookie for a freshly authenticated user.
pub fn mint_bos_cookie(services: &Services, screen_name: &ScreenName) -> Vec<u8> {
    mint_cookie(
        &services.cookie_baker,
        ServiceKind::Bos,
        screen_name,
        services.config.cookie_ttl_secs,
    )
}

/// Mint a chat cookie bound to a room.
pub fn mint_chat_cookie(services: &Services, screen_name: &ScreenName, room: Uuid) -> Vec<u8> {
    mint_cookie(
        &services.cookie_baker,
        ServiceKind::Chat(room),
        screen_name,
        services.config.cookie_ttl_secs,
    )
}

/// BUCP step 1: answer a challenge request with the user's auth salt, or a
/// login error when the user is unknown and anonymous auth is off.
pub fn handle_challenge_request(
    services: &Services,
    frame: SnacFrame,
    body: &[u8],
) -> Result<SnacMessage> {
    let mut cursor = body;
    let request = ChallengeRequest::decode(&mut cursor)?;
    let screen_name = request
        .screen_name()
        .ok_or_else(|| ServerError::Protocol("challenge request without screen name".into()))?;
    let screen_name = ScreenName::new(screen_name);

    let auth_key = match services.users.user(&screen_name.ident())? {
        Some(user) => user.auth_key,
        None if services.config.disable_auth => Uuid::new_v4().to_string(),
        None => {
            tracing::info!(screen_name = %screen_name, "challenge for unregistered screen name");
            let reply = SnacFrame::reply_to(frame, foodgroup::BUCP, bucp::LOGIN_RESPONSE);
            return Ok(SnacMessage::new(reply, |buf| {
                LoginResponse::failure(screen_name.display(), errsub::INVALID_CREDENTIALS)
                    .encode(buf)
            }));
        }
    };

    let reply = SnacFrame::reply_to(frame, foodgroup::BUCP, bucp::CHALLENGE_RESPONSE);
    Ok(SnacMessage::new(reply, |buf| {
        ChallengeResponse { auth_key }.encode(buf)
    }))
}

/// BUCP step 2: verify the MD5 digest and answer with either the reconnect
/// address plus cookie, or an error subcode.
pub fn handle_login_request(
    services: &Services,
    frame: SnacFrame,
    body: &[u8],
) -> Result<SnacMessage> {
    let mut cursor = body;
    let request = LoginRequest::decode(&mut cursor)?;
    let screen_name = request
        .screen_name()
        .ok_or_else(|| ServerError::Protocol("login request without screen name".into()))?;
    let digest = request
        .password_hash()
        .ok_or_else(|| ServerError::Protocol("login request without password hash".into()))?;
    let screen_name = ScreenName::new(screen_name);

    let mut login_ok = false;
    match services.users.user(&screen_name.ident())? {
        Some(user) if user.validate_digest(digest) => login_ok = true,
        None if services.config.disable_auth => {
            let stub = new_stub_user(&screen_name);
            services.users.insert_user(&stub)?;
            tracing::info!(screen_name = %screen_name, "auto-provisioned stub user");
            login_ok = true;
        }
        _ => {}
    }

    let reply = SnacFrame::reply_to(frame, foodgroup::BUCP, bucp::LOGIN_RESPONSE);
    let response = if login_ok {
        tracing::info!(screen_name = %screen_name, "BUCP login succeeded");
        LoginResponse::success(
            screen_name.display(),
            &services.config.advertised_address,
            mint_bos_cookie(services, &screen_name),
        )
    } else {
        tracing::info!(screen_name = %screen_name, "BUCP login failed");
        LoginResponse::failure(screen_name.display(), errsub::INVALID_CREDENTIALS)
    };
    Ok(SnacMessage::new(reply, |buf| response.encode(buf)))
}

/// Roasted FLAP sign-on: screen name and XOR-roasted password arrive as
/// TLVs in the sign-on frame; the reply TLVs travel in a sign-off frame.
pub fn handle_roasted_signon(services: &Services, tlvs: &TlvList) -> Result<TlvList> {
    let screen_name = tlvs
        .str(tags::SCREEN_NAME)
        .ok_or_else(|| ServerError::Protocol("roasted sign-on without screen name".into()))?;
    let roasted = tlvs
        .bytes(tags::ROASTED_PASSWORD)
        .ok_or_else(|| ServerError::Protocol("roasted sign-on without password".into()))?;
    let screen_name = ScreenName::new(screen_name);

    let mut login_ok = false;
    match services.users.user(&screen_name.ident())? {
        Some(user) if user.validate_roasted(roasted) => login_ok = true,
        None if services.config.disable_auth => {
            let stub = new_stub_user(&screen_name);
            services.users.insert_user(&stub)?;
            login_ok = true;
        }
        _ => {}
    }

    let reply = if login_ok {
        tracing::info!(screen_name = %screen_name, "roasted FLAP login succeeded");
        TlvList::new()
            .with(Tlv::str(tags::SCREEN_NAME, screen_name.display()))
            .with(Tlv::str(
                tags::RECONNECT_HERE,
                &services.config.advertised_address,
            ))
            .with(Tlv::new(
                tags::AUTHORIZATION_COOKIE,
                mint_bos_cookie(services, &screen_name),
            ))
    } else {
        tracing::info!(screen_name = %screen_name, "roasted FLAP login failed");
        TlvList::new()
            .with(Tlv::str(tags::SCREEN_NAME, screen_name.display()))
            .with(Tlv::u16(tags::ERROR_SUBCODE, errsub::INVALID_CREDENTIALS))
    };
    Ok(reply)
}

/// Remove a signed-out session and tell its watchers. An evicted session
/// whose ident is already live again stays silent, so the successor's
/// arrival is not clobbered by a stale departure.
pub fn signout(services: &Services, session: &Session) {
    let replaced = services
        .sessions
        .find_by_ident(session.ident())
        .is_some_and(|current| current.id() != session.id());
    if session.is_ready() && !replaced {
        if let Err(e) = services.presence.broadcast_departure(session) {
            tracing::error!(error = %e, "departure broadcast failed");
        }
        if let Err(e) = services
            .session_state
            .set_buddy_list_online(session.ident(), false)
        {
            tracing::error!(error = %e, "failed to clear online marker");
        }
    }
    services.sessions.remove(session.id());
    session.close();
    tracing::info!(ident = %session.ident(), "session signed out");
}
