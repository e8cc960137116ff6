use thiserror::Error;

#[derive(Error, Debug)]
pub enum WireError {
    #[error("Truncated data: needed {needed} more bytes")]
    Truncated { needed: usize },

    #[error("Bad FLAP frame: {0}")]
    BadFrame(String),

    #[error("TLV length {len} exceeds enclosure of {available} bytes")]
    TlvOverflow { len: usize, available: usize },

    #[error("Invalid string encoding")]
    BadString,

    #[error("Unknown payload layout for snac ({food_group:#06x}, {subgroup:#06x})")]
    UnknownPayload { food_group: u16, subgroup: u16 },

    #[error("Missing mandatory field: {0}")]
    MissingField(&'static str),
}

pub type Result<T> = std::result::Result<T, WireError>;
