use causerie_wire::auth::{strong_md5_digest, weak_md5_digest};
use chrono::{DateTime, Utc};
use uuid::Uuid;

/// A screen name in both of its forms: the display form preserves the
/// user-entered case and spaces, the ident form (lowercased, despaced) is the
/// canonical key every lookup, equality and blocking check uses.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ScreenName {
    display: String,
}

impl ScreenName {
    pub fn new(display: impl Into<String>) -> Self {
        Self {
            display: display.into(),
        }
    }

    pub fn display(&self) -> &str {
        &self.display
    }

    pub fn ident(&self) -> String {
        ident_of(&self.display)
    }
}

impl std::fmt::Display for ScreenName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.display)
    }
}

/// Canonical form: lowercased, spaces removed.
pub fn ident_of(display: &str) -> String {
    display
        .chars()
        .filter(|c| !c.is_whitespace())
        .flat_map(|c| c.to_lowercase())
        .collect()
}

/// A user account: identity, auth salt, and the two MD5 password digests
/// (weak for clients 3.5-4.7 and roasted logins, strong for 4.8-5.9).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct User {
    pub ident: String,
    pub display: String,
    pub auth_key: String,
    pub weak_md5_pass: Vec<u8>,
    pub strong_md5_pass: Vec<u8>,
}

impl User {
    pub fn new(screen_name: &ScreenName) -> Self {
        Self {
            ident: screen_name.ident(),
            display: screen_name.display().to_owned(),
            auth_key: Uuid::new_v4().to_string(),
            weak_md5_pass: Vec::new(),
            strong_md5_pass: Vec::new(),
        }
    }

    /// Compute and store both digest variants for `password`.
    pub fn set_password(&mut self, password: &str) {
        self.weak_md5_pass = weak_md5_digest(password, &self.auth_key);
        self.strong_md5_pass = strong_md5_digest(password, &self.auth_key);
    }

    /// True if `digest` matches either stored digest.
    pub fn validate_digest(&self, digest: &[u8]) -> bool {
        (!self.weak_md5_pass.is_empty() && self.weak_md5_pass == digest)
            || (!self.strong_md5_pass.is_empty() && self.strong_md5_pass == digest)
    }

    /// Validate an XOR-roasted plaintext password from a 1.x-3.0 client.
    pub fn validate_roasted(&self, roasted: &[u8]) -> bool {
        let clear = causerie_wire::auth::roast_password(roasted);
        let Ok(clear) = String::from_utf8(clear) else {
            return false;
        };
        !self.weak_md5_pass.is_empty()
            && self.weak_md5_pass == weak_md5_digest(&clear, &self.auth_key)
    }
}

/// Stub account minted when disable-auth mode meets an unknown screen name.
/// The canned password is "welcome1".
pub fn new_stub_user(screen_name: &ScreenName) -> User {
    let mut user = User::new(screen_name);
    user.set_password("welcome1");
    user
}

/// The blocking relationship between two users, derived from class-3 deny
/// entries in their feedbags.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockedState {
    None,
    /// A blocks B.
    ABlocksB,
    /// B blocks A.
    BBlocksA,
}

impl BlockedState {
    pub fn any(&self) -> bool {
        !matches!(self, BlockedState::None)
    }
}

/// The public directory listing a user uploads through Locate; searched by
/// the ODir food group.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DirInfo {
    pub ident: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
}

/// A directory search; `None` fields are unconstrained.
#[derive(Debug, Clone, Default)]
pub struct DirQuery {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub keyword: Option<String>,
}

impl DirQuery {
    pub fn is_empty(&self) -> bool {
        self.first_name.is_none()
            && self.last_name.is_none()
            && self.email.is_none()
            && self.keyword.is_none()
    }
}

/// A message queued for an offline recipient, delivered at ClientOnline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OfflineMessage {
    pub sender: String,
    pub recipient: String,
    /// The raw message TLV payload exactly as the sender framed it.
    pub message: Vec<u8>,
    pub sent_at: DateTime<Utc>,
}
