//! Structured SNAC payloads, one module per food group.
//!
//! Layouts are walked field by field in wire order; every payload offers
//! `encode` into a `BytesMut` and `decode` from a cursor, and round-trips
//! losslessly. Containers and strings come from [`crate::tlv`] and
//! [`crate::strings`].

pub mod bart;
pub mod bucp;
pub mod buddy;
pub mod chat;
pub mod chat_nav;
pub mod feedbag;
pub mod icbm;
pub mod locate;
pub mod odir;
pub mod oservice;
pub mod permit_deny;

use bytes::{Buf, BufMut, BytesMut};

use crate::error::{Result, WireError};
use crate::tlv::TlvList;

pub(crate) fn ensure(cursor: &[u8], needed: usize) -> Result<()> {
    if cursor.len() < needed {
        Err(WireError::Truncated {
            needed: needed - cursor.len(),
        })
    } else {
        Ok(())
    }
}

/// The generic SNAC error payload: a 16-bit subcode plus optional TLVs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SnacError {
    pub code: u16,
    pub tlvs: TlvList,
}

impl SnacError {
    pub fn new(code: u16) -> Self {
        Self {
            code,
            tlvs: TlvList::new(),
        }
    }

    pub fn encode(&self, buf: &mut BytesMut) {
        buf.put_u16(self.code);
        self.tlvs.encode(buf);
    }

    pub fn decode(cursor: &mut &[u8]) -> Result<Self> {
        ensure(cursor, 2)?;
        let code = cursor.get_u16();
        let tlvs = TlvList::decode(cursor)?;
        Ok(Self { code, tlvs })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snac::errcode;

    #[test]
    fn snac_error_roundtrip() {
        let err = SnacError::new(errcode::NOT_AVAILABLE);
        let mut buf = BytesMut::new();
        err.encode(&mut buf);
        let mut cursor = &buf[..];
        assert_eq!(SnacError::decode(&mut cursor).unwrap(), err);
    }
}
