use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("User already exists")]
    DupUser,

    #[error("User does not exist")]
    NoUser,

    #[error("Migration error: {0}")]
    Migration(String),

    #[error("Stored feedbag attributes are corrupt: {0}")]
    CorruptAttributes(#[from] causerie_wire::WireError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, StoreError>;
