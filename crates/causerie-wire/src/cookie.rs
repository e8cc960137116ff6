//! HMAC-signed authentication cookies.
//!
//! The auth service mints a cookie after a successful login; BOS and chat
//! connections present it back in the sign-on frame. The blob is opaque to
//! clients. One cookie format serves both services: a chat cookie simply
//! carries the room id minted by chat-nav, which doubles as the join
//! cookie, a single authoritative identifier rather than two.

use bytes::{Buf, BufMut, BytesMut};
use hmac::{Hmac, Mac};
use rand::RngCore;
use sha2::Sha256;
use thiserror::Error;
use uuid::Uuid;

use crate::strings::{get_str8, put_str8};

type HmacSha256 = Hmac<Sha256>;

const COOKIE_VERSION: u8 = 1;
const MAC_LEN: usize = 16;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum CookieError {
    #[error("Cookie too short")]
    Truncated,

    #[error("Unsupported cookie version {0}")]
    BadVersion(u8),

    #[error("Cookie MAC verification failed")]
    BadMac,

    #[error("Cookie expired")]
    Expired,

    #[error("Malformed cookie body")]
    Malformed,
}

/// Which service the cookie admits the bearer to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceKind {
    Bos,
    Chat(Uuid),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthCookie {
    pub service: ServiceKind,
    pub ident: String,
    pub display: String,
    pub nonce: u64,
    pub expires_at: u32,
}

impl AuthCookie {
    fn encode_body(&self) -> BytesMut {
        let mut buf = BytesMut::new();
        buf.put_u8(COOKIE_VERSION);
        match self.service {
            ServiceKind::Bos => buf.put_u8(0),
            ServiceKind::Chat(room) => {
                buf.put_u8(1);
                buf.put_slice(room.as_bytes());
            }
        }
        buf.put_u32(self.expires_at);
        buf.put_u64(self.nonce);
        put_str8(&mut buf, &self.ident);
        put_str8(&mut buf, &self.display);
        buf
    }
}

/// Mints and verifies cookies with a process-wide HMAC key.
pub struct CookieBaker {
    key: [u8; 32],
}

impl CookieBaker {
    pub fn new(key: [u8; 32]) -> Self {
        Self { key }
    }

    /// A baker with a random key; cookies die with the process.
    pub fn ephemeral() -> Self {
        let mut key = [0u8; 32];
        rand::rngs::OsRng.fill_bytes(&mut key);
        Self::new(key)
    }

    pub fn fresh_nonce() -> u64 {
        rand::rngs::OsRng.next_u64()
    }

    pub fn mint(&self, cookie: &AuthCookie) -> Vec<u8> {
        let body = cookie.encode_body();
        let mut mac = HmacSha256::new_from_slice(&self.key).expect("hmac accepts any key length");
        mac.update(&body);
        let tag = mac.finalize().into_bytes();
        let mut out = body.to_vec();
        out.extend_from_slice(&tag[..MAC_LEN]);
        out
    }

    pub fn verify(&self, data: &[u8], now: u32) -> Result<AuthCookie, CookieError> {
        if data.len() < MAC_LEN + 2 {
            return Err(CookieError::Truncated);
        }
        let (body, tag) = data.split_at(data.len() - MAC_LEN);

        let mut mac = HmacSha256::new_from_slice(&self.key).expect("hmac accepts any key length");
        mac.update(body);
        mac.verify_truncated_left(tag)
            .map_err(|_| CookieError::BadMac)?;

        let mut cursor = body;
        let version = cursor.get_u8();
        if version != COOKIE_VERSION {
            return Err(CookieError::BadVersion(version));
        }
        let service = match cursor.get_u8() {
            0 => ServiceKind::Bos,
            1 => {
                if cursor.len() < 16 {
                    return Err(CookieError::Malformed);
                }
                let mut raw = [0u8; 16];
                raw.copy_from_slice(&cursor[..16]);
                cursor.advance(16);
                ServiceKind::Chat(Uuid::from_bytes(raw))
            }
            _ => return Err(CookieError::Malformed),
        };
        if cursor.len() < 12 {
            return Err(CookieError::Malformed);
        }
        let expires_at = cursor.get_u32();
        let nonce = cursor.get_u64();
        let ident = get_str8(&mut cursor).map_err(|_| CookieError::Malformed)?;
        let display = get_str8(&mut cursor).map_err(|_| CookieError::Malformed)?;

        if now >= expires_at {
            return Err(CookieError::Expired);
        }

        Ok(AuthCookie {
            service,
            ident,
            display,
            nonce,
            expires_at,
        })
    }
}
