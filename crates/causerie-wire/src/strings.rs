//! Length-prefixed strings and byte slices.
//!
//! OSCAR strings come in two shapes, prefixed by a 1- or 2-byte big-endian
//! length. The choice is per-field, never global, so both forms are exposed.

use bytes::{Buf, BufMut, BytesMut};

use crate::error::{Result, WireError};

pub fn put_str8(buf: &mut BytesMut, s: &str) {
    buf.put_u8(s.len() as u8);
    buf.put_slice(s.as_bytes());
}

pub fn put_str16(buf: &mut BytesMut, s: &str) {
    buf.put_u16(s.len() as u16);
    buf.put_slice(s.as_bytes());
}

pub fn put_bytes16(buf: &mut BytesMut, b: &[u8]) {
    buf.put_u16(b.len() as u16);
    buf.put_slice(b);
}

pub fn get_str8(cursor: &mut &[u8]) -> Result<String> {
    if cursor.is_empty() {
        return Err(WireError::Truncated { needed: 1 });
    }
    let len = cursor.get_u8() as usize;
    take_str(cursor, len)
}

pub fn get_str16(cursor: &mut &[u8]) -> Result<String> {
    if cursor.len() < 2 {
        return Err(WireError::Truncated {
            needed: 2 - cursor.len(),
        });
    }
    let len = cursor.get_u16() as usize;
    take_str(cursor, len)
}

pub fn get_bytes16(cursor: &mut &[u8]) -> Result<Vec<u8>> {
    if cursor.len() < 2 {
        return Err(WireError::Truncated {
            needed: 2 - cursor.len(),
        });
    }
    let len = cursor.get_u16() as usize;
    if cursor.len() < len {
        return Err(WireError::Truncated {
            needed: len - cursor.len(),
        });
    }
    let out = cursor[..len].to_vec();
    cursor.advance(len);
    Ok(out)
}

fn take_str(cursor: &mut &[u8], len: usize) -> Result<String> {
    if cursor.len() < len {
        return Err(WireError::Truncated {
            needed: len - cursor.len(),
        });
    }
    let s = std::str::from_utf8(&cursor[..len])
        .map_err(|_| WireError::BadString)?
        .to_owned();
    cursor.advance(len);
    Ok(s)
}
