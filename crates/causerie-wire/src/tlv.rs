//! Tag-length-value containers.
//!
//! OSCAR uses three TLV container shapes, distinguished only by how they are
//! delimited: a [`TlvList`] runs to the end of its enclosure, a [`TlvBlock`]
//! is prefixed with a 16-bit element count, and a [`TlvLBlock`] is prefixed
//! with a 16-bit byte length. Values are opaque bytes; callers ask for a tag
//! as a specific width and get `None` when the tag is absent.

use bytes::{Buf, BufMut, BytesMut};

use crate::error::{Result, WireError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tlv {
    pub tag: u16,
    pub value: Vec<u8>,
}

impl Tlv {
    pub fn new(tag: u16, value: Vec<u8>) -> Self {
        Self { tag, value }
    }

    pub fn u8(tag: u16, v: u8) -> Self {
        Self::new(tag, vec![v])
    }

    pub fn u16(tag: u16, v: u16) -> Self {
        Self::new(tag, v.to_be_bytes().to_vec())
    }

    pub fn u32(tag: u16, v: u32) -> Self {
        Self::new(tag, v.to_be_bytes().to_vec())
    }

    pub fn str(tag: u16, v: &str) -> Self {
        Self::new(tag, v.as_bytes().to_vec())
    }

    pub fn encode(&self, buf: &mut BytesMut) {
        buf.put_u16(self.tag);
        buf.put_u16(self.value.len() as u16);
        buf.put_slice(&self.value);
    }

    pub fn decode(cursor: &mut &[u8]) -> Result<Self> {
        if cursor.len() < 4 {
            return Err(WireError::Truncated {
                needed: 4 - cursor.len(),
            });
        }
        let tag = cursor.get_u16();
        let len = cursor.get_u16() as usize;
        if cursor.len() < len {
            return Err(WireError::TlvOverflow {
                len,
                available: cursor.len(),
            });
        }
        let value = cursor[..len].to_vec();
        cursor.advance(len);
        Ok(Self { tag, value })
    }
}

/// A count-less TLV sequence terminating at the end of the enclosing frame.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TlvList(pub Vec<Tlv>);

impl TlvList {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    pub fn push(&mut self, tlv: Tlv) {
        self.0.push(tlv);
    }

    pub fn with(mut self, tlv: Tlv) -> Self {
        self.0.push(tlv);
        self
    }

    pub fn encode(&self, buf: &mut BytesMut) {
        for tlv in &self.0 {
            tlv.encode(buf);
        }
    }

    pub fn encoded_len(&self) -> usize {
        self.0.iter().map(|t| 4 + t.value.len()).sum()
    }

    /// Consume the remainder of `cursor` as TLVs.
    pub fn decode(cursor: &mut &[u8]) -> Result<Self> {
        let mut tlvs = Vec::new();
        while !cursor.is_empty() {
            tlvs.push(Tlv::decode(cursor)?);
        }
        Ok(Self(tlvs))
    }

    fn find(&self, tag: u16) -> Option<&Tlv> {
        self.0.iter().find(|t| t.tag == tag)
    }

    pub fn has(&self, tag: u16) -> bool {
        self.find(tag).is_some()
    }

    pub fn bytes(&self, tag: u16) -> Option<&[u8]> {
        self.find(tag).map(|t| t.value.as_slice())
    }

    pub fn str(&self, tag: u16) -> Option<String> {
        self.find(tag)
            .map(|t| String::from_utf8_lossy(&t.value).into_owned())
    }

    pub fn get_u8(&self, tag: u16) -> Option<u8> {
        match self.find(tag) {
            Some(t) if t.value.len() == 1 => Some(t.value[0]),
            _ => None,
        }
    }

    pub fn get_u16(&self, tag: u16) -> Option<u16> {
        match self.find(tag) {
            Some(t) if t.value.len() == 2 => Some(u16::from_be_bytes([t.value[0], t.value[1]])),
            _ => None,
        }
    }

    pub fn get_u32(&self, tag: u16) -> Option<u32> {
        match self.find(tag) {
            Some(t) if t.value.len() == 4 => Some(u32::from_be_bytes([
                t.value[0], t.value[1], t.value[2], t.value[3],
            ])),
            _ => None,
        }
    }
}

impl FromIterator<Tlv> for TlvList {
    fn from_iter<I: IntoIterator<Item = Tlv>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// TLV container prefixed with a 16-bit element count.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TlvBlock(pub TlvList);

impl TlvBlock {
    pub fn encode(&self, buf: &mut BytesMut) {
        buf.put_u16(self.0 .0.len() as u16);
        self.0.encode(buf);
    }

    pub fn decode(cursor: &mut &[u8]) -> Result<Self> {
        if cursor.len() < 2 {
            return Err(WireError::Truncated {
                needed: 2 - cursor.len(),
            });
        }
        let count = cursor.get_u16();
        let mut tlvs = Vec::with_capacity(count as usize);
        for _ in 0..count {
            tlvs.push(Tlv::decode(cursor)?);
        }
        Ok(Self(TlvList(tlvs)))
    }
}

/// TLV container prefixed with a 16-bit byte length.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TlvLBlock(pub TlvList);

impl TlvLBlock {
    pub fn encode(&self, buf: &mut BytesMut) {
        buf.put_u16(self.0.encoded_len() as u16);
        self.0.encode(buf);
    }

    pub fn decode(cursor: &mut &[u8]) -> Result<Self> {
        if cursor.len() < 2 {
            return Err(WireError::Truncated {
                needed: 2 - cursor.len(),
            });
        }
        let len = cursor.get_u16() as usize;
        if cursor.len() < len {
            return Err(WireError::TlvOverflow {
                len,
                available: cursor.len(),
            });
        }
        let mut inner = &cursor[..len];
        cursor.advance(len);
        let list = TlvList::decode(&mut inner)?;
        Ok(Self(list))
    }

    /// The raw encoded form without the length prefix, as persisted by the
    /// feedbag store (round-trips byte-identical).
    pub fn inner_bytes(&self) -> Vec<u8> {
        let mut buf = BytesMut::new();
        self.0.encode(&mut buf);
        buf.to_vec()
    }

    pub fn from_inner_bytes(data: &[u8]) -> Result<Self> {
        let mut cursor = data;
        Ok(Self(TlvList::decode(&mut cursor)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn typed_getters() {
        let list = TlvList::new()
            .with(Tlv::u8(0x01, 7))
            .with(Tlv::u16(0x02, 0xBEEF))
            .with(Tlv::u32(0x03, 0xDEADBEEF))
            .with(Tlv::str(0x04, "alice"));

        assert_eq!(list.get_u8(0x01), Some(7));
        assert_eq!(list.get_u16(0x02), Some(0xBEEF));
        assert_eq!(list.get_u32(0x03), Some(0xDEADBEEF));
        assert_eq!(list.str(0x04).as_deref(), Some("alice"));
    }

    #[test]
    fn missing_tag_reports_absence() {
        let list = TlvList::new().with(Tlv::u16(0x01, 1));
        assert_eq!(list.get_u16(0x99), None);
        assert_eq!(list.bytes(0x99), None);
        assert!(!list.has(0x99));
    }

    #[test]
    fn wrong_width_is_absent() {
        let list = TlvList::new().with(Tlv::str(0x01, "abc"));
        assert_eq!(list.get_u16(0x01), None);
    }

    #[test]
    fn list_roundtrip() {
        let list = TlvList::new()
            .with(Tlv::str(0x11, "hello"))
            .with(Tlv::u16(0x12, 99));
        let mut buf = BytesMut::new();
        list.encode(&mut buf);
        let mut cursor = &buf[..];
        assert_eq!(TlvList::decode(&mut cursor).unwrap(), list);
    }

    #[test]
    fn block_roundtrip() {
        let block = TlvBlock(TlvList::new().with(Tlv::u32(0x03, 1234)));
        let mut buf = BytesMut::new();
        block.encode(&mut buf);
        let mut cursor = &buf[..];
        assert_eq!(TlvBlock::decode(&mut cursor).unwrap(), block);
        assert!(cursor.is_empty());
    }

    #[test]
    fn lblock_roundtrip_and_trailing_bytes_left() {
        let lblock = TlvLBlock(TlvList::new().with(Tlv::str(0x01, "x")));
        let mut buf = BytesMut::new();
        lblock.encode(&mut buf);
        buf.put_u16(0xFFFF); // unrelated trailing data
        let mut cursor = &buf[..];
        assert_eq!(TlvLBlock::decode(&mut cursor).unwrap(), lblock);
        assert_eq!(cursor.len(), 2);
    }

    #[test]
    fn overlong_tlv_is_an_error() {
        // Tag 0x0001, claimed length 10, only 2 bytes present.
        let data = [0x00, 0x01, 0x00, 0x0A, 0xAA, 0xBB];
        let mut cursor = &data[..];
        assert!(matches!(
            Tlv::decode(&mut cursor),
            Err(WireError::TlvOverflow { .. })
        ));
    }

    #[test]
    fn lblock_inner_bytes_roundtrip_is_byte_identical() {
        let lblock = TlvLBlock(
            TlvList::new()
                .with(Tlv::u16(0x6A, 1))
                .with(Tlv::new(0x131, b"buddy alias".to_vec())),
        );
        let raw = lblock.inner_bytes();
        let restored = TlvLBlock::from_inner_bytes(&raw).unwrap();
        assert_eq!(restored.inner_bytes(), raw);
    }
}
