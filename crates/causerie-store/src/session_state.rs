use rusqlite::params;

use crate::database::Database;
use crate::error::Result;
use crate::SessionStateStore;

impl SessionStateStore for Database {
    fn clear_buddy_list_registry(&self) -> Result<()> {
        self.conn().execute("DELETE FROM buddy_list_registry", [])?;
        Ok(())
    }

    fn set_buddy_list_online(&self, ident: &str, online: bool) -> Result<()> {
        if online {
            self.conn().execute(
                "INSERT INTO buddy_list_registry (ident)
                 VALUES (?1)
                 ON CONFLICT DO NOTHING",
                params![ident],
            )?;
        } else {
            self.conn().execute(
                "DELETE FROM buddy_list_registry WHERE ident = ?1",
                params![ident],
            )?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn online_count(db: &Database) -> i64 {
        db.conn()
            .query_row("SELECT COUNT(*) FROM buddy_list_registry", [], |row| {
                row.get(0)
            })
            .unwrap()
    }

    #[test]
    fn markers_toggle() {
        let db = Database::in_memory().unwrap();
        db.set_buddy_list_online("alice", true).unwrap();
        db.set_buddy_list_online("alice", true).unwrap(); // idempotent
        assert_eq!(online_count(&db), 1);

        db.set_buddy_list_online("alice", false).unwrap();
        assert_eq!(online_count(&db), 0);
    }

    #[test]
    fn startup_clear_drops_stale_markers() {
        let db = Database::in_memory().unwrap();
        db.set_buddy_list_online("alice", true).unwrap();
        db.set_buddy_list_online("bob", true).unwrap();
        db.clear_buddy_list_registry().unwrap();
        assert_eq!(online_count(&db), 0);
    }
}
