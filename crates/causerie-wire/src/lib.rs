//! Wire-level building blocks for the OSCAR protocol: FLAP framing, SNAC
//! headers, TLV containers, the structured payloads the server speaks, and
//! the two crypto artifacts that live at the wire boundary (MD5 password
//! digests and the HMAC-signed authentication cookie).
//!
//! Everything here is pure byte manipulation with no sockets and no async.
//! The server crate owns I/O and feeds complete frames in and out.

pub mod auth;
pub mod cookie;
pub mod error;
pub mod feedbag;
pub mod flap;
pub mod payloads;
pub mod snac;
pub mod strings;
pub mod tlv;
pub mod userinfo;

pub use error::WireError;
pub use flap::{FlapFrame, FrameType};
pub use snac::SnacFrame;
pub use tlv::{Tlv, TlvBlock, TlvLBlock, TlvList};
