//! Public directory persistence: the listings and keywords users upload
//! through Locate, searched by the ODir food group.

use rusqlite::{params, params_from_iter};

use crate::database::Database;
use crate::error::Result;
use crate::models::{DirInfo, DirQuery};
use crate::DirectoryStore;

impl DirectoryStore for Database {
    fn set_dir_info(&self, info: &DirInfo) -> Result<()> {
        self.conn().execute(
            "INSERT INTO dir_info (ident, first_name, last_name, email)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT (ident)
                 DO UPDATE SET first_name = excluded.first_name,
                               last_name  = excluded.last_name,
                               email      = excluded.email",
            params![info.ident, info.first_name, info.last_name, info.email],
        )?;
        Ok(())
    }

    fn set_keywords(&self, ident: &str, keywords: &[String]) -> Result<()> {
        let mut conn = self.conn();
        let tx = conn.transaction()?;
        {
            tx.execute("DELETE FROM dir_keyword WHERE ident = ?1", params![ident])?;
            let mut insert = tx.prepare(
                "INSERT INTO dir_keyword (ident, keyword)
                 VALUES (?1, ?2)
                 ON CONFLICT DO NOTHING",
            )?;
            for keyword in keywords {
                insert.execute(params![ident, keyword])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    fn search_dir(&self, query: &DirQuery) -> Result<Vec<DirInfo>> {
        if query.is_empty() {
            return Ok(Vec::new());
        }

        let mut clauses: Vec<&str> = Vec::new();
        let mut values: Vec<&String> = Vec::new();
        if let Some(first_name) = &query.first_name {
            clauses.push("LOWER(d.first_name) = LOWER(?)");
            values.push(first_name);
        }
        if let Some(last_name) = &query.last_name {
            clauses.push("LOWER(d.last_name) = LOWER(?)");
            values.push(last_name);
        }
        if let Some(email) = &query.email {
            clauses.push("LOWER(d.email) = LOWER(?)");
            values.push(email);
        }
        if let Some(keyword) = &query.keyword {
            clauses.push(
                "EXISTS(SELECT 1 FROM dir_keyword k
                        WHERE k.ident = d.ident AND LOWER(k.keyword) = LOWER(?))",
            );
            values.push(keyword);
        }

        let sql = format!(
            "SELECT d.ident, d.first_name, d.last_name, d.email
             FROM dir_info d
             WHERE {}
             ORDER BY d.ident",
            clauses.join(" AND ")
        );

        let conn = self.conn();
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params_from_iter(values), |row| {
            Ok(DirInfo {
                ident: row.get(0)?,
                first_name: row.get(1)?,
                last_name: row.get(2)?,
                email: row.get(3)?,
            })
        })?;

        let mut hits = Vec::new();
        for row in rows {
            hits.push(row?);
        }
        Ok(hits)
    }

    fn keywords(&self) -> Result<Vec<String>> {
        let conn = self.conn();
        let mut stmt =
            conn.prepare("SELECT DISTINCT keyword FROM dir_keyword ORDER BY keyword")?;
        let rows = stmt.query_map([], |row| row.get(0))?;

        let mut keywords = Vec::new();
        for row in rows {
            keywords.push(row?);
        }
        Ok(keywords)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn listing(ident: &str, first: &str, last: &str, email: &str) -> DirInfo {
        DirInfo {
            ident: ident.into(),
            first_name: first.into(),
            last_name: last.into(),
            email: email.into(),
        }
    }

    #[test]
    fn search_by_email_is_case_insensitive() {
        let db = Database::in_memory().unwrap();
        db.set_dir_info(&listing("carol", "Carol", "Jones", "carol@example.com"))
            .unwrap();

        let hits = db
            .search_dir(&DirQuery {
                email: Some("CAROL@Example.com".into()),
                ..DirQuery::default()
            })
            .unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].ident, "carol");
    }

    #[test]
    fn search_combines_fields() {
        let db = Database::in_memory().unwrap();
        db.set_dir_info(&listing("carol", "Carol", "Jones", "carol@example.com"))
            .unwrap();
        db.set_dir_info(&listing("carl", "Carol", "Smith", "carl@example.com"))
            .unwrap();

        let hits = db
            .search_dir(&DirQuery {
                first_name: Some("carol".into()),
                last_name: Some("jones".into()),
                ..DirQuery::default()
            })
            .unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].ident, "carol");
    }

    #[test]
    fn search_by_keyword() {
        let db = Database::in_memory().unwrap();
        db.set_dir_info(&listing("carol", "Carol", "Jones", ""))
            .unwrap();
        db.set_keywords("carol", &["chess".into(), "retro computing".into()])
            .unwrap();

        let hits = db
            .search_dir(&DirQuery {
                keyword: Some("Chess".into()),
                ..DirQuery::default()
            })
            .unwrap();
        assert_eq!(hits.len(), 1);

        let none = db
            .search_dir(&DirQuery {
                keyword: Some("sailing".into()),
                ..DirQuery::default()
            })
            .unwrap();
        assert!(none.is_empty());
    }

    #[test]
    fn empty_query_matches_nothing() {
        let db = Database::in_memory().unwrap();
        db.set_dir_info(&listing("carol", "Carol", "Jones", ""))
            .unwrap();
        assert!(db.search_dir(&DirQuery::default()).unwrap().is_empty());
    }

    #[test]
    fn set_keywords_replaces_the_set() {
        let db = Database::in_memory().unwrap();
        db.set_keywords("carol", &["chess".into()]).unwrap();
        db.set_keywords("carol", &["sailing".into()]).unwrap();

        assert_eq!(db.keywords().unwrap(), vec!["sailing".to_string()]);
    }

    #[test]
    fn keyword_vocabulary_is_distinct_and_sorted() {
        let db = Database::in_memory().unwrap();
        db.set_keywords("carol", &["chess".into()]).unwrap();
        db.set_keywords("bob", &["chess".into(), "aviation".into()])
            .unwrap();

        assert_eq!(
            db.keywords().unwrap(),
            vec!["aviation".to_string(), "chess".to_string()]
        );
    }

    #[test]
    fn relisting_overwrites() {
        let db = Database::in_memory().unwrap();
        db.set_dir_info(&listing("carol", "Carol", "Jones", "old@example.com"))
            .unwrap();
        db.set_dir_info(&listing("carol", "Carol", "Jones", "new@example.com"))
            .unwrap();

        let hits = db
            .search_dir(&DirQuery {
                email: Some("new@example.com".into()),
                ..DirQuery::default()
            })
            .unwrap();
        assert_eq!(hits.len(), 1);
    }
}
