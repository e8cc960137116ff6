use chrono::{TimeZone, Utc};
use rusqlite::params;

use crate::database::Database;
use crate::error::Result;
use crate::models::OfflineMessage;
use crate::OfflineMessageStore;

impl OfflineMessageStore for Database {
    fn offline_message_store(&self, message: &OfflineMessage) -> Result<()> {
        self.conn().execute(
            "INSERT INTO offline_message (sender, recipient, message, sent_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                message.sender,
                message.recipient,
                message.message,
                message.sent_at.timestamp(),
            ],
        )?;
        Ok(())
    }

    fn offline_messages_retrieve(&self, recipient: &str) -> Result<Vec<OfflineMessage>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT sender, recipient, message, sent_at
             FROM offline_message
             WHERE recipient = ?1
             ORDER BY id",
        )?;
        let rows = stmt.query_map(params![recipient], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, Vec<u8>>(2)?,
                row.get::<_, i64>(3)?,
            ))
        })?;

        let mut messages = Vec::new();
        for row in rows {
            let (sender, recipient, message, sent_at) = row?;
            messages.push(OfflineMessage {
                sender,
                recipient,
                message,
                sent_at: Utc.timestamp_opt(sent_at, 0).unwrap(),
            });
        }
        Ok(messages)
    }

    fn offline_messages_delete(&self, recipient: &str) -> Result<()> {
        self.conn().execute(
            "DELETE FROM offline_message WHERE recipient = ?1",
            params![recipient],
        )?;
        Ok(())
    }
}
