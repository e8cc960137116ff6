//! Feedbag (server-stored buddy list) items in wire form.

use bytes::{Buf, BufMut, BytesMut};

use crate::error::{Result, WireError};
use crate::strings::{get_str16, put_str16};
use crate::tlv::TlvLBlock;

/// Class ids encoding an item's semantic.
pub mod class {
    pub const BUDDY: u16 = 0x0000;
    pub const GROUP: u16 = 0x0001;
    pub const PERMIT: u16 = 0x0002;
    pub const DENY: u16 = 0x0003;
    pub const PD_MODE: u16 = 0x0004;
    pub const IGNORE: u16 = 0x000E;
}

/// Group id 0 is reserved for items that live outside any group.
pub const UNGROUPED: u16 = 0x0000;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FeedbagItem {
    pub name: String,
    pub group_id: u16,
    pub item_id: u16,
    pub class_id: u16,
    pub attributes: TlvLBlock,
}

impl FeedbagItem {
    pub fn buddy(group_id: u16, item_id: u16, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            group_id,
            item_id,
            class_id: class::BUDDY,
            attributes: TlvLBlock::default(),
        }
    }

    pub fn deny(item_id: u16, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            group_id: UNGROUPED,
            item_id,
            class_id: class::DENY,
            attributes: TlvLBlock::default(),
        }
    }

    pub fn encode(&self, buf: &mut BytesMut) {
        put_str16(buf, &self.name);
        buf.put_u16(self.group_id);
        buf.put_u16(self.item_id);
        buf.put_u16(self.class_id);
        self.attributes.encode(buf);
    }

    pub fn decode(cursor: &mut &[u8]) -> Result<Self> {
        let name = get_str16(cursor)?;
        if cursor.len() < 6 {
            return Err(WireError::Truncated {
                needed: 6 - cursor.len(),
            });
        }
        let group_id = cursor.get_u16();
        let item_id = cursor.get_u16();
        let class_id = cursor.get_u16();
        let attributes = TlvLBlock::decode(cursor)?;
        Ok(Self {
            name,
            group_id,
            item_id,
            class_id,
            attributes,
        })
    }

    /// Decode items until the cursor is exhausted.
    pub fn decode_list(cursor: &mut &[u8]) -> Result<Vec<Self>> {
        let mut items = Vec::new();
        while !cursor.is_empty() {
            items.push(Self::decode(cursor)?);
        }
        Ok(items)
    }
}
