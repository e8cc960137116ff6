//! v001 -- Initial schema creation.
//!
//! Creates the six core tables: `users`, `feedbag`, `profile`, `bart_item`,
//! `offline_message`, and `buddy_list_registry`.

use rusqlite::Connection;

/// SQL executed when upgrading from version 0 to version 1.
const UP_SQL: &str = r#"
-- ----------------------------------------------------------------
-- Users
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS users (
    ident           TEXT PRIMARY KEY NOT NULL,  -- canonical screen name
    display         TEXT NOT NULL,              -- user-entered form
    auth_key        TEXT NOT NULL,              -- MD5 salt
    weak_md5_pass   BLOB NOT NULL,              -- clients 3.5-4.7 + roasted
    strong_md5_pass BLOB NOT NULL               -- clients 4.8-5.9
);

-- ----------------------------------------------------------------
-- Feedbag (server-stored buddy list)
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS feedbag (
    owner         TEXT NOT NULL,                -- owner ident
    group_id      INTEGER NOT NULL,
    item_id       INTEGER NOT NULL,
    class_id      INTEGER NOT NULL,
    name          TEXT NOT NULL,
    attributes    BLOB NOT NULL,                -- raw TLV bytes, round-trip identical
    last_modified INTEGER NOT NULL,             -- unix seconds

    PRIMARY KEY (owner, group_id, item_id)
);

CREATE INDEX IF NOT EXISTS idx_feedbag_name ON feedbag(name, class_id);

-- ----------------------------------------------------------------
-- Profiles
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS profile (
    owner TEXT PRIMARY KEY NOT NULL,
    body  TEXT NOT NULL
);

-- ----------------------------------------------------------------
-- BART (buddy icon blobs, keyed by truncated hash)
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS bart_item (
    hash BLOB PRIMARY KEY NOT NULL,
    body BLOB NOT NULL
);

-- ----------------------------------------------------------------
-- Offline messages
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS offline_message (
    id        INTEGER PRIMARY KEY AUTOINCREMENT,
    sender    TEXT NOT NULL,
    recipient TEXT NOT NULL,
    message   BLOB NOT NULL,                    -- raw message TLV payload
    sent_at   INTEGER NOT NULL                  -- unix seconds
);

CREATE INDEX IF NOT EXISTS idx_offline_recipient ON offline_message(recipient);

-- ----------------------------------------------------------------
-- Online markers (cleared at startup to drop crash leftovers)
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS buddy_list_registry (
    ident TEXT PRIMARY KEY NOT NULL
);
"#;

/// Apply the initial migration.
pub fn up(conn: &Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(UP_SQL)
}
