use rusqlite::{params, OptionalExtension};

use crate::database::Database;
use crate::error::Result;
use crate::ProfileStore;

impl ProfileStore for Database {
    fn profile(&self, owner: &str) -> Result<String> {
        let body: Option<String> = self
            .conn()
            .query_row(
                "SELECT body FROM profile WHERE owner = ?1",
                params![owner],
                |row| row.get(0),
            )
            .optional()?;
        Ok(body.unwrap_or_default())
    }

    fn set_profile(&self, owner: &str, body: &str) -> Result<()> {
        self.conn().execute(
            "INSERT INTO profile (owner, body)
             VALUES (?1, ?2)
             ON CONFLICT (owner) DO UPDATE SET body = excluded.body",
            params![owner, body],
        )?;
        Ok(())
    }
}
