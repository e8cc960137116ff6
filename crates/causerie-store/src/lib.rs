//! Persistence for the OSCAR server: user accounts, feedbags (server-stored
//! buddy lists), profiles, buddy icons and offline messages.
//!
//! The capability traits below are the collaborator contract the server
//! consumes; [`Database`] is the SQLite implementation. Tests inject focused
//! in-memory fakes instead of dragging in the SQL layer.

pub mod bart;
pub mod database;
pub mod directory;
pub mod feedbag;
pub mod migrations;
pub mod models;
pub mod offline;
pub mod profiles;
pub mod session_state;
pub mod users;

mod error;

use chrono::{DateTime, Utc};

use causerie_wire::feedbag::FeedbagItem;

pub use database::Database;
pub use error::{Result, StoreError};
pub use models::{
    ident_of, new_stub_user, BlockedState, DirInfo, DirQuery, OfflineMessage, ScreenName, User,
};

pub trait UserStore: Send + Sync {
    /// Look up a user by ident screen name; `None` when unknown.
    fn user(&self, ident: &str) -> Result<Option<User>>;
    fn insert_user(&self, user: &User) -> Result<()>;
    fn delete_user(&self, ident: &str) -> Result<()>;
    fn set_password(&self, user: &User) -> Result<()>;
    fn all_users(&self) -> Result<Vec<User>>;
}

pub trait FeedbagStore: Send + Sync {
    fn feedbag(&self, owner: &str) -> Result<Vec<FeedbagItem>>;
    /// `None` when the owner has no feedbag entries at all ("never
    /// modified"); rendered as epoch 0 on the wire.
    fn last_modified(&self, owner: &str) -> Result<Option<DateTime<Utc>>>;
    /// Apply `upserts` then `deletes` in one transaction. Concurrent readers
    /// see either none of the batch or all of it, which is what makes a
    /// feedbag cluster commit atomic.
    fn apply_batch(
        &self,
        owner: &str,
        upserts: &[FeedbagItem],
        deletes: &[FeedbagItem],
    ) -> Result<()>;
    fn upsert(&self, owner: &str, items: &[FeedbagItem]) -> Result<()> {
        self.apply_batch(owner, items, &[])
    }
    fn delete(&self, owner: &str, items: &[FeedbagItem]) -> Result<()> {
        self.apply_batch(owner, &[], items)
    }
    /// Idents who list `owner` as a buddy, excluding blocks in either
    /// direction.
    fn adjacent_users(&self, owner: &str) -> Result<Vec<String>>;
    /// Idents `owner` lists as buddies, excluding blocks in either direction.
    fn buddies(&self, owner: &str) -> Result<Vec<String>>;
    fn blocked_state(&self, a: &str, b: &str) -> Result<BlockedState>;
}

pub trait ProfileStore: Send + Sync {
    /// Empty string when the user has no profile.
    fn profile(&self, owner: &str) -> Result<String>;
    fn set_profile(&self, owner: &str, body: &str) -> Result<()>;
}

pub trait DirectoryStore: Send + Sync {
    /// Replace the owner's public directory listing.
    fn set_dir_info(&self, info: &DirInfo) -> Result<()>;
    /// Replace the owner's keyword set.
    fn set_keywords(&self, ident: &str, keywords: &[String]) -> Result<()>;
    /// Case-insensitive match on every populated query field; an empty
    /// query matches nothing.
    fn search_dir(&self, query: &DirQuery) -> Result<Vec<DirInfo>>;
    /// The distinct keyword vocabulary, sorted.
    fn keywords(&self) -> Result<Vec<String>>;
}

pub trait BartStore: Send + Sync {
    fn bart_upsert(&self, hash: &[u8], blob: &[u8]) -> Result<()>;
    /// A missing icon is an explicit outcome, not an empty body.
    fn bart_retrieve(&self, hash: &[u8]) -> Result<Option<Vec<u8>>>;
}

pub trait OfflineMessageStore: Send + Sync {
    fn offline_message_store(&self, message: &OfflineMessage) -> Result<()>;
    fn offline_messages_retrieve(&self, recipient: &str) -> Result<Vec<OfflineMessage>>;
    fn offline_messages_delete(&self, recipient: &str) -> Result<()>;
}

pub trait SessionStateStore: Send + Sync {
    /// Drop all stale "online" markers; called once at startup.
    fn clear_buddy_list_registry(&self) -> Result<()>;
    fn set_buddy_list_online(&self, ident: &str, online: bool) -> Result<()>;
}
