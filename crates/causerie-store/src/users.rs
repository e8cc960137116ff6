use rusqlite::{params, OptionalExtension};

use crate::database::Database;
use crate::error::{Result, StoreError};
use crate::models::User;
use crate::UserStore;

impl UserStore for Database {
    fn user(&self, ident: &str) -> Result<Option<User>> {
        let conn = self.conn();
        let user = conn
            .query_row(
                "SELECT ident, display, auth_key, weak_md5_pass, strong_md5_pass
                 FROM users WHERE ident = ?1",
                params![ident],
                row_to_user,
            )
            .optional()?;
        Ok(user)
    }

    fn insert_user(&self, user: &User) -> Result<()> {
        let affected = self.conn().execute(
            "INSERT INTO users (ident, display, auth_key, weak_md5_pass, strong_md5_pass)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT (ident) DO NOTHING",
            params![
                user.ident,
                user.display,
                user.auth_key,
                user.weak_md5_pass,
                user.strong_md5_pass,
            ],
        )?;
        if affected == 0 {
            return Err(StoreError::DupUser);
        }
        Ok(())
    }

    fn delete_user(&self, ident: &str) -> Result<()> {
        let affected = self
            .conn()
            .execute("DELETE FROM users WHERE ident = ?1", params![ident])?;
        if affected == 0 {
            return Err(StoreError::NoUser);
        }
        Ok(())
    }

    fn set_password(&self, user: &User) -> Result<()> {
        let affected = self.conn().execute(
            "UPDATE users
             SET auth_key = ?1, weak_md5_pass = ?2, strong_md5_pass = ?3
             WHERE ident = ?4",
            params![
                user.auth_key,
                user.weak_md5_pass,
                user.strong_md5_pass,
                user.ident,
            ],
        )?;
        if affected == 0 {
            return Err(StoreError::NoUser);
        }
        Ok(())
    }

    fn all_users(&self) -> Result<Vec<User>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT ident, display, auth_key, weak_md5_pass, strong_md5_pass
             FROM users ORDER BY ident",
        )?;
        let rows = stmt.query_map([], row_to_user)?;

        let mut users = Vec::new();
        for row in rows {
            users.push(row?);
        }
        Ok(users)
    }
}

fn row_to_user(row: &rusqlite::Row<'_>) -> rusqlite::Result<User> {
    Ok(User {
        ident: row.get(0)?,
        display: row.get(1)?,
        auth_key: row.get(2)?,
        weak_md5_pass: row.get(3)?,
        strong_md5_pass: row.get(4)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ScreenName;

    fn test_user(name: &str) -> User {
        let mut user = User::new(&ScreenName::new(name));
        user.set_password("hunter2");
        user
    }

    #[test]
    fn insert_and_fetch() {
        let db = Database::in_memory().unwrap();
        let user = test_user("Bob Smith");
        db.insert_user(&user).unwrap();

        let fetched = db.user("bobsmith").unwrap().unwrap();
        assert_eq!(fetched, user);
        assert_eq!(fetched.display, "Bob Smith");
    }

    #[test]
    fn unknown_user_is_none() {
        let db = Database::in_memory().unwrap();
        assert!(db.user("ghost").unwrap().is_none());
    }

    #[test]
    fn duplicate_insert_rejected() {
        let db = Database::in_memory().unwrap();
        db.insert_user(&test_user("Alice")).unwrap();
        assert!(matches!(
            db.insert_user(&test_user("alice")),
            Err(StoreError::DupUser)
        ));
    }

    #[test]
    fn delete_missing_user_rejected() {
        let db = Database::in_memory().unwrap();
        assert!(matches!(db.delete_user("ghost"), Err(StoreError::NoUser)));
    }

    #[test]
    fn password_update_roundtrips() {
        let db = Database::in_memory().unwrap();
        let mut user = test_user("Alice");
        db.insert_user(&user).unwrap();

        user.set_password("new-password");
        db.set_password(&user).unwrap();

        let fetched = db.user("alice").unwrap().unwrap();
        let digest = causerie_wire::auth::strong_md5_digest("new-password", &fetched.auth_key);
        assert!(fetched.validate_digest(&digest));
    }

    #[test]
    fn all_users_sorted_by_ident() {
        let db = Database::in_memory().unwrap();
        db.insert_user(&test_user("zed")).unwrap();
        db.insert_user(&test_user("alice")).unwrap();
        let idents: Vec<_> = db.all_users().unwrap().into_iter().map(|u| u.ident).collect();
        assert_eq!(idents, vec!["alice", "zed"]);
    }
}
