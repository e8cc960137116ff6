//! SNAC headers and the food-group/subgroup id tables.

use bytes::{Buf, BufMut, BytesMut};

use crate::error::{Result, WireError};

pub const SNAC_HEADER_LEN: usize = 10;

/// Flag bit indicating a version-info TLV block precedes the payload.
pub const SNAC_FLAG_VERSION_INFO: u16 = 0x8000;

/// Subgroup 0x0001 is the error reply in every food group.
pub const SUBGROUP_ERR: u16 = 0x0001;

/// Food groups the server knows about.
pub mod foodgroup {
    pub const OSERVICE: u16 = 0x0001;
    pub const LOCATE: u16 = 0x0002;
    pub const BUDDY: u16 = 0x0003;
    pub const ICBM: u16 = 0x0004;
    pub const ADMIN: u16 = 0x0007;
    pub const PERMIT_DENY: u16 = 0x0009;
    pub const USER_LOOKUP: u16 = 0x000A;
    pub const STATS: u16 = 0x000B;
    pub const CHAT_NAV: u16 = 0x000D;
    pub const CHAT: u16 = 0x000E;
    pub const ODIR: u16 = 0x000F;
    pub const BART: u16 = 0x0010;
    pub const FEEDBAG: u16 = 0x0013;
    pub const ICQ: u16 = 0x0015;
    pub const BUCP: u16 = 0x0017;
    pub const ALERT: u16 = 0x0018;
}

pub mod oservice {
    pub const ERR: u16 = 0x0001;
    pub const CLIENT_ONLINE: u16 = 0x0002;
    pub const HOST_ONLINE: u16 = 0x0003;
    pub const SERVICE_REQUEST: u16 = 0x0004;
    pub const SERVICE_RESPONSE: u16 = 0x0005;
    pub const RATE_PARAMS_QUERY: u16 = 0x0006;
    pub const RATE_PARAMS_REPLY: u16 = 0x0007;
    pub const RATE_PARAMS_SUB_ADD: u16 = 0x0008;
    pub const RATE_LIMIT_NOTIFICATION: u16 = 0x000A;
    pub const USER_INFO_QUERY: u16 = 0x000E;
    pub const USER_INFO_UPDATE: u16 = 0x000F;
    pub const IDLE_NOTIFICATION: u16 = 0x0011;
    pub const CLIENT_VERSIONS: u16 = 0x0017;
    pub const HOST_VERSIONS: u16 = 0x0018;
}

pub mod locate {
    pub const ERR: u16 = 0x0001;
    pub const RIGHTS_QUERY: u16 = 0x0002;
    pub const RIGHTS_REPLY: u16 = 0x0003;
    pub const SET_INFO: u16 = 0x0004;
    pub const USER_INFO_QUERY: u16 = 0x0005;
    pub const USER_INFO_REPLY: u16 = 0x0006;
    pub const SET_DIR_INFO: u16 = 0x0009;
    pub const SET_DIR_REPLY: u16 = 0x000A;
    pub const SET_KEYWORD_INFO: u16 = 0x000F;
    pub const SET_KEYWORD_REPLY: u16 = 0x0010;
    pub const USER_INFO_QUERY2: u16 = 0x0015;
}

pub mod buddy {
    pub const ERR: u16 = 0x0001;
    pub const RIGHTS_QUERY: u16 = 0x0002;
    pub const RIGHTS_REPLY: u16 = 0x0003;
    pub const ADD_BUDDIES: u16 = 0x0004;
    pub const DEL_BUDDIES: u16 = 0x0005;
    pub const ARRIVED: u16 = 0x000B;
    pub const DEPARTED: u16 = 0x000C;
}

pub mod icbm {
    pub const ERR: u16 = 0x0001;
    pub const ADD_PARAMETERS: u16 = 0x0002;
    pub const PARAMETER_QUERY: u16 = 0x0004;
    pub const PARAMETER_REPLY: u16 = 0x0005;
    pub const CHANNEL_MSG_TO_HOST: u16 = 0x0006;
    pub const CHANNEL_MSG_TO_CLIENT: u16 = 0x0007;
    pub const EVIL_REQUEST: u16 = 0x0008;
    pub const EVIL_REPLY: u16 = 0x0009;
    pub const HOST_ACK: u16 = 0x000C;
    pub const CLIENT_EVENT: u16 = 0x0014;
}

pub mod feedbag {
    pub const ERR: u16 = 0x0001;
    pub const RIGHTS_QUERY: u16 = 0x0002;
    pub const RIGHTS_REPLY: u16 = 0x0003;
    pub const QUERY: u16 = 0x0004;
    pub const QUERY_IF_MODIFIED: u16 = 0x0005;
    pub const REPLY: u16 = 0x0006;
    pub const USE: u16 = 0x0007;
    pub const INSERT_ITEM: u16 = 0x0008;
    pub const UPDATE_ITEM: u16 = 0x0009;
    pub const DELETE_ITEM: u16 = 0x000A;
    pub const STATUS: u16 = 0x000E;
    pub const START_CLUSTER: u16 = 0x0011;
    pub const END_CLUSTER: u16 = 0x0012;
}

pub mod chat_nav {
    pub const ERR: u16 = 0x0001;
    pub const REQUEST_CHAT_RIGHTS: u16 = 0x0002;
    pub const REQUEST_ROOM_INFO: u16 = 0x0004;
    pub const CREATE_ROOM: u16 = 0x0008;
    pub const NAV_INFO: u16 = 0x0009;
}

pub mod chat {
    pub const ERR: u16 = 0x0001;
    pub const ROOM_INFO_UPDATE: u16 = 0x0002;
    pub const USERS_JOINED: u16 = 0x0003;
    pub const USERS_LEFT: u16 = 0x0004;
    pub const CHANNEL_MSG_TO_HOST: u16 = 0x0005;
    pub const CHANNEL_MSG_TO_CLIENT: u16 = 0x0006;
}

pub mod bart {
    pub const ERR: u16 = 0x0001;
    pub const UPLOAD_QUERY: u16 = 0x0002;
    pub const UPLOAD_REPLY: u16 = 0x0003;
    pub const DOWNLOAD_QUERY: u16 = 0x0004;
    pub const DOWNLOAD_REPLY: u16 = 0x0005;
}

pub mod permit_deny {
    pub const ERR: u16 = 0x0001;
    pub const RIGHTS_QUERY: u16 = 0x0002;
    pub const RIGHTS_REPLY: u16 = 0x0003;
    pub const SET_GROUP_PERMIT_MASK: u16 = 0x0004;
    pub const ADD_PERMIT_ENTRIES: u16 = 0x0005;
    pub const DEL_PERMIT_ENTRIES: u16 = 0x0006;
    pub const ADD_DENY_ENTRIES: u16 = 0x0007;
    pub const DEL_DENY_ENTRIES: u16 = 0x0008;
}

pub mod bucp {
    pub const ERR: u16 = 0x0001;
    pub const LOGIN_REQUEST: u16 = 0x0002;
    pub const LOGIN_RESPONSE: u16 = 0x0003;
    pub const CHALLENGE_REQUEST: u16 = 0x0006;
    pub const CHALLENGE_RESPONSE: u16 = 0x0007;
}

pub mod admin {
    pub const ERR: u16 = 0x0001;
    pub const INFO_QUERY: u16 = 0x0002;
    pub const INFO_REPLY: u16 = 0x0003;
    pub const INFO_CHANGE_REQUEST: u16 = 0x0004;
    pub const INFO_CHANGE_REPLY: u16 = 0x0005;
    pub const CONFIRM_REQUEST: u16 = 0x0006;
    pub const CONFIRM_REPLY: u16 = 0x0007;
}

pub mod odir {
    pub const ERR: u16 = 0x0001;
    pub const INFO_QUERY: u16 = 0x0002;
    pub const INFO_REPLY: u16 = 0x0003;
    pub const KEYWORD_LIST_QUERY: u16 = 0x0004;
    pub const KEYWORD_LIST_REPLY: u16 = 0x0005;
}

pub mod user_lookup {
    pub const ERR: u16 = 0x0001;
    pub const FIND_BY_EMAIL: u16 = 0x0002;
    pub const FIND_REPLY: u16 = 0x0003;
}

pub mod stats {
    pub const ERR: u16 = 0x0001;
    pub const SET_MIN_REPORT_INTERVAL: u16 = 0x0002;
    pub const REPORT_EVENTS: u16 = 0x0003;
    pub const REPORT_ACK: u16 = 0x0004;
}

pub mod icq {
    pub const ERR: u16 = 0x0001;
    pub const DB_QUERY: u16 = 0x0002;
    pub const DB_REPLY: u16 = 0x0003;
}

/// SNAC error subcodes used by the server.
pub mod errcode {
    pub const INVALID_SNAC: u16 = 0x0001;
    pub const RATE_LIMIT_EXCEEDED: u16 = 0x0002;
    pub const NOT_AVAILABLE: u16 = 0x0004;
    pub const REQUESTED_SERVICES_UNAVAILABLE: u16 = 0x0006;
    pub const NOT_SUPPORTED_BY_HOST: u16 = 0x0008;
    pub const MESSAGE_TOO_LONG: u16 = 0x000A;
    pub const NO_MATCH: u16 = 0x0014;
    pub const TRY_AGAIN_LATER: u16 = 0x0015;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SnacFrame {
    pub food_group: u16,
    pub subgroup: u16,
    pub flags: u16,
    pub request_id: u32,
}

impl SnacFrame {
    pub fn new(food_group: u16, subgroup: u16) -> Self {
        Self {
            food_group,
            subgroup,
            flags: 0,
            request_id: 0,
        }
    }

    /// A reply header echoing the request id of `req`.
    pub fn reply_to(req: SnacFrame, food_group: u16, subgroup: u16) -> Self {
        Self {
            food_group,
            subgroup,
            flags: 0,
            request_id: req.request_id,
        }
    }

    pub fn encode(&self, buf: &mut BytesMut) {
        buf.put_u16(self.food_group);
        buf.put_u16(self.subgroup);
        buf.put_u16(self.flags);
        buf.put_u32(self.request_id);
    }

    /// Decode the header, transparently skipping the version-info block when
    /// flag bit 0x8000 is set. `cursor` is left at the start of the body.
    pub fn decode(cursor: &mut &[u8]) -> Result<Self> {
        if cursor.len() < SNAC_HEADER_LEN {
            return Err(WireError::Truncated {
                needed: SNAC_HEADER_LEN - cursor.len(),
            });
        }
        let frame = Self {
            food_group: cursor.get_u16(),
            subgroup: cursor.get_u16(),
            flags: cursor.get_u16(),
            request_id: cursor.get_u32(),
        };
        if frame.flags & SNAC_FLAG_VERSION_INFO != 0 {
            if cursor.len() < 2 {
                return Err(WireError::Truncated {
                    needed: 2 - cursor.len(),
                });
            }
            let skip = cursor.get_u16() as usize;
            if cursor.len() < skip {
                return Err(WireError::TlvOverflow {
                    len: skip,
                    available: cursor.len(),
                });
            }
            cursor.advance(skip);
        }
        Ok(frame)
    }
}
