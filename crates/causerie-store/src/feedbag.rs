//! Feedbag (server-stored buddy list) persistence.
//!
//! Attribute TLVs are stored as raw bytes and round-trip byte-identical.
//! All mutations funnel through [`FeedbagStore::apply_batch`], one
//! transaction per batch, so a reader never observes a half-applied
//! cluster. The adjacency and blocking queries encode the class-3 deny
//! semantics directly in SQL so presence gating stays a single query per
//! side.

use chrono::{DateTime, TimeZone, Utc};
use rusqlite::params;

use causerie_wire::feedbag::{class, FeedbagItem};
use causerie_wire::tlv::TlvLBlock;

use crate::database::Database;
use crate::error::Result;
use crate::models::BlockedState;
use crate::FeedbagStore;

impl FeedbagStore for Database {
    fn feedbag(&self, owner: &str) -> Result<Vec<FeedbagItem>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT group_id, item_id, class_id, name, attributes
             FROM feedbag
             WHERE owner = ?1
             ORDER BY group_id, item_id",
        )?;
        let rows = stmt.query_map(params![owner], |row| {
            Ok((
                row.get::<_, u16>(0)?,
                row.get::<_, u16>(1)?,
                row.get::<_, u16>(2)?,
                row.get::<_, String>(3)?,
                row.get::<_, Vec<u8>>(4)?,
            ))
        })?;

        let mut items = Vec::new();
        for row in rows {
            let (group_id, item_id, class_id, name, attrs) = row?;
            items.push(FeedbagItem {
                name,
                group_id,
                item_id,
                class_id,
                attributes: TlvLBlock::from_inner_bytes(&attrs)?,
            });
        }
        Ok(items)
    }

    fn last_modified(&self, owner: &str) -> Result<Option<DateTime<Utc>>> {
        let last: Option<i64> = self.conn().query_row(
            "SELECT MAX(last_modified) FROM feedbag WHERE owner = ?1",
            params![owner],
            |row| row.get(0),
        )?;
        Ok(last.map(|secs| Utc.timestamp_opt(secs, 0).unwrap()))
    }

    fn apply_batch(
        &self,
        owner: &str,
        upserts: &[FeedbagItem],
        deletes: &[FeedbagItem],
    ) -> Result<()> {
        let mut conn = self.conn();
        let tx = conn.transaction()?;
        {
            let mut insert = tx.prepare(
                "INSERT INTO feedbag (owner, group_id, item_id, class_id, name, attributes, last_modified)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, UNIXEPOCH())
                 ON CONFLICT (owner, group_id, item_id)
                     DO UPDATE SET class_id      = excluded.class_id,
                                   name          = excluded.name,
                                   attributes    = excluded.attributes,
                                   last_modified = UNIXEPOCH()",
            )?;
            for item in upserts {
                insert.execute(params![
                    owner,
                    item.group_id,
                    item.item_id,
                    item.class_id,
                    item.name,
                    item.attributes.inner_bytes(),
                ])?;
            }
            let mut remove = tx.prepare(
                "DELETE FROM feedbag WHERE owner = ?1 AND group_id = ?2 AND item_id = ?3",
            )?;
            for item in deletes {
                remove.execute(params![owner, item.group_id, item.item_id])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    fn adjacent_users(&self, owner: &str) -> Result<Vec<String>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT DISTINCT f.owner
             FROM feedbag f
             WHERE f.name = ?1
               AND f.class_id = 0
               -- owner blocks the watcher
               AND NOT EXISTS(SELECT 1 FROM feedbag
                              WHERE owner = ?1 AND name = f.owner AND class_id = 3)
               -- the watcher blocks owner
               AND NOT EXISTS(SELECT 1 FROM feedbag
                              WHERE owner = f.owner AND name = ?1 AND class_id = 3)",
        )?;
        let names = collect_names(stmt.query_map(params![owner], |row| row.get(0))?);
        names
    }

    fn buddies(&self, owner: &str) -> Result<Vec<String>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT DISTINCT f.name
             FROM feedbag f
             WHERE f.owner = ?1 AND f.class_id = 0
               -- the buddy blocks owner
               AND NOT EXISTS(SELECT 1 FROM feedbag
                              WHERE owner = f.name AND name = ?1 AND class_id = 3)
               -- owner blocks the buddy
               AND NOT EXISTS(SELECT 1 FROM feedbag
                              WHERE owner = ?1 AND name = f.name AND class_id = 3)",
        )?;
        let names = collect_names(stmt.query_map(params![owner], |row| row.get(0))?);
        names
    }

    fn blocked_state(&self, a: &str, b: &str) -> Result<BlockedState> {
        let conn = self.conn();
        let a_blocks_b: bool = conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM feedbag
                           WHERE owner = ?1 AND name = ?2 AND class_id = ?3)",
            params![a, b, class::DENY],
            |row| row.get(0),
        )?;
        if a_blocks_b {
            return Ok(BlockedState::ABlocksB);
        }
        let b_blocks_a: bool = conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM feedbag
                           WHERE owner = ?1 AND name = ?2 AND class_id = ?3)",
            params![b, a, class::DENY],
            |row| row.get(0),
        )?;
        if b_blocks_a {
            return Ok(BlockedState::BBlocksA);
        }
        Ok(BlockedState::None)
    }
}

fn collect_names(
    rows: impl Iterator<Item = rusqlite::Result<String>>,
) -> Result<Vec<String>> {
    let mut names = Vec::new();
    for row in rows {
        names.push(row?);
    }
    Ok(names)
}
