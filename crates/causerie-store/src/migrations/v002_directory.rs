//! v002 -- Public directory.
//!
//! Adds `dir_info` (one listing per user) and `dir_keyword` (the keywords a
//! user advertises), both fed by Locate uploads and searched by ODir.

use rusqlite::Connection;

const UP_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS dir_info (
    ident      TEXT PRIMARY KEY NOT NULL,     -- canonical screen name
    first_name TEXT NOT NULL DEFAULT '',
    last_name  TEXT NOT NULL DEFAULT '',
    email      TEXT NOT NULL DEFAULT ''
);

CREATE TABLE IF NOT EXISTS dir_keyword (
    ident   TEXT NOT NULL,
    keyword TEXT NOT NULL,

    PRIMARY KEY (ident, keyword)
);

CREATE INDEX IF NOT EXISTS idx_dir_keyword ON dir_keyword(keyword);
"#;

pub fn up(conn: &Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(UP_SQL)
}
