use rusqlite::{params, OptionalExtension};

use crate::database::Database;
use crate::error::Result;
use crate::BartStore;

impl BartStore for Database {
    fn bart_upsert(&self, hash: &[u8], blob: &[u8]) -> Result<()> {
        self.conn().execute(
            "INSERT INTO bart_item (hash, body)
             VALUES (?1, ?2)
             ON CONFLICT DO NOTHING",
            params![hash, blob],
        )?;
        Ok(())
    }

    fn bart_retrieve(&self, hash: &[u8]) -> Result<Option<Vec<u8>>> {
        let body = self
            .conn()
            .query_row(
                "SELECT body FROM bart_item WHERE hash = ?1",
                params![hash],
                |row| row.get(0),
            )
            .optional()?;
        Ok(body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upsert_then_retrieve() {
        let db = Database::in_memory().unwrap();
        db.bart_upsert(&[0xAB; 16], b"icon-bytes").unwrap();
        assert_eq!(
            db.bart_retrieve(&[0xAB; 16]).unwrap(),
            Some(b"icon-bytes".to_vec())
        );
    }

    #[test]
    fn missing_icon_is_an_explicit_outcome() {
        let db = Database::in_memory().unwrap();
        assert_eq!(db.bart_retrieve(&[0x01; 16]).unwrap(), None);
    }

    #[test]
    fn duplicate_upload_keeps_first_blob() {
        let db = Database::in_memory().unwrap();
        db.bart_upsert(&[0xAB; 16], b"first").unwrap();
        db.bart_upsert(&[0xAB; 16], b"second").unwrap();
        assert_eq!(db.bart_retrieve(&[0xAB; 16]).unwrap(), Some(b"first".to_vec()));
    }
}
