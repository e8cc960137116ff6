//! Live sessions and the two-index session registry.
//!
//! A session is the in-memory presence of one logged-in user: identity,
//! presence state, and a bounded outbound queue drained by the connection's
//! writer task. The registry keeps one index by session id and one by ident
//! screen name; at most one live session exists per ident, and a newcomer
//! evicts its predecessor with a signed-on-elsewhere disconnect.

use std::collections::{HashMap, HashSet};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, RwLock};

use bytes::BytesMut;
use chrono::{DateTime, Utc};
use tokio::sync::{mpsc, watch};
use uuid::Uuid;

use causerie_store::ScreenName;
use causerie_wire::payloads::permit_deny::PdMode;
use causerie_wire::snac::SnacFrame;
use causerie_wire::userinfo::{flags, Capability, UserInfo, CAP_INSTANT_MESSAGE};

/// Outbound queue depth per session. A slow consumer that fills it is
/// evicted rather than back-pressuring the server.
pub const QUEUE_CAPACITY: usize = 64;

pub type SessionId = Uuid;

/// An encoded SNAC ready for the wire: header plus payload bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnacMessage {
    pub frame: SnacFrame,
    pub body: Vec<u8>,
}

impl SnacMessage {
    pub fn new(frame: SnacFrame, encode: impl FnOnce(&mut BytesMut)) -> Self {
        let mut buf = BytesMut::new();
        encode(&mut buf);
        Self {
            frame,
            body: buf.to_vec(),
        }
    }

    /// A generic SNAC error in reply to `req`.
    pub fn error(req: SnacFrame, code: u16) -> Self {
        use causerie_wire::payloads::SnacError;
        let frame = SnacFrame {
            food_group: req.food_group,
            subgroup: causerie_wire::snac::SUBGROUP_ERR,
            flags: 0,
            request_id: req.request_id,
        };
        Self::new(frame, |buf| SnacError::new(code).encode(buf))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisconnectReason {
    SignedOnElsewhere,
    RateExceeded,
    ServerShutdown,
}

/// What travels through a session's outbound queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    Snac(SnacMessage),
    Disconnect(DisconnectReason),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushResult {
    Queued,
    /// Push refused: the session is closed.
    Closed,
    /// Queue full; the session has been closed as overloaded.
    Overloaded,
}

/// Mutable presence state, guarded by a short-lived lock.
#[derive(Debug, Default)]
pub struct SessionState {
    /// Set at ClientOnline; no arrivals are emitted for this session before.
    pub ready: bool,
    pub away_message: String,
    pub idle_since: Option<DateTime<Utc>>,
    pub invisible: bool,
    pub warning_level: u16,
    pub capabilities: Vec<Capability>,
    /// Client-side buddy list kept for 3.x clients.
    pub ephemeral_buddies: HashSet<String>,
    pub pd_mode: PdMode,
    pub permit_list: HashSet<String>,
    pub deny_list: HashSet<String>,
}

pub struct Session {
    id: SessionId,
    ident: String,
    display: String,
    remote_addr: Option<SocketAddr>,
    signon_time: DateTime<Utc>,
    state: RwLock<SessionState>,
    queue_tx: mpsc::Sender<SessionEvent>,
    queue_rx: Mutex<Option<mpsc::Receiver<SessionEvent>>>,
    closed: AtomicBool,
    close_tx: watch::Sender<bool>,
}

impl Session {
    pub fn new(screen_name: &ScreenName, remote_addr: Option<SocketAddr>) -> Arc<Self> {
        let (queue_tx, queue_rx) = mpsc::channel(QUEUE_CAPACITY);
        let (close_tx, _) = watch::channel(false);
        Arc::new(Self {
            id: Uuid::new_v4(),
            ident: screen_name.ident(),
            display: screen_name.display().to_owned(),
            remote_addr,
            signon_time: Utc::now(),
            state: RwLock::new(SessionState {
                capabilities: vec![CAP_INSTANT_MESSAGE],
                ..SessionState::default()
            }),
            queue_tx,
            queue_rx: Mutex::new(Some(queue_rx)),
            closed: AtomicBool::new(false),
            close_tx,
        })
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn ident(&self) -> &str {
        &self.ident
    }

    pub fn display(&self) -> &str {
        &self.display
    }

    pub fn remote_addr(&self) -> Option<SocketAddr> {
        self.remote_addr
    }

    pub fn signon_time(&self) -> DateTime<Utc> {
        self.signon_time
    }

    /// The writer task claims the queue receiver exactly once.
    pub fn take_queue(&self) -> Option<mpsc::Receiver<SessionEvent>> {
        self.queue_rx.lock().expect("queue mutex poisoned").take()
    }

    pub fn closed_signal(&self) -> watch::Receiver<bool> {
        self.close_tx.subscribe()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Idempotent: the first call flips the flag and fires the close signal;
    /// later calls are no-ops.
    pub fn close(&self) {
        if !self.closed.swap(true, Ordering::AcqRel) {
            let _ = self.close_tx.send(true);
        }
    }

    pub fn push(&self, message: SnacMessage) -> PushResult {
        self.push_event(SessionEvent::Snac(message))
    }

    /// Queue a terminal disconnect, then close so nothing further lands.
    pub fn disconnect(&self, reason: DisconnectReason) {
        let _ = self.queue_tx.try_send(SessionEvent::Disconnect(reason));
        self.close();
    }

    fn push_event(&self, event: SessionEvent) -> PushResult {
        if self.is_closed() {
            return PushResult::Closed;
        }
        match self.queue_tx.try_send(event) {
            Ok(()) => PushResult::Queued,
            Err(mpsc::error::TrySendError::Full(_)) => {
                tracing::warn!(ident = %self.ident, "outbound queue full, closing session");
                self.close();
                PushResult::Overloaded
            }
            Err(mpsc::error::TrySendError::Closed(_)) => PushResult::Closed,
        }
    }

    pub fn with_state<T>(&self, f: impl FnOnce(&SessionState) -> T) -> T {
        f(&self.state.read().expect("state lock poisoned"))
    }

    pub fn with_state_mut<T>(&self, f: impl FnOnce(&mut SessionState) -> T) -> T {
        f(&mut self.state.write().expect("state lock poisoned"))
    }

    pub fn is_ready(&self) -> bool {
        self.with_state(|s| s.ready)
    }

    pub fn is_invisible(&self) -> bool {
        self.with_state(|s| s.invisible)
    }

    /// Whether this session's permit/deny settings refuse `ident`.
    pub fn denies(&self, ident: &str) -> bool {
        self.with_state(|s| match s.pd_mode {
            PdMode::PermitAll => false,
            PdMode::DenyAll => true,
            PdMode::PermitSome | PdMode::PermitOnList => !s.permit_list.contains(ident),
            PdMode::DenySome => s.deny_list.contains(ident),
        })
    }

    /// The current user-info block broadcast to watchers.
    pub fn user_info(&self) -> UserInfo {
        self.with_state(|s| {
            let mut user_flags = flags::OSCAR_FREE;
            if !s.away_message.is_empty() {
                user_flags |= flags::AWAY;
            }
            let mut info = UserInfo::new(self.display.clone())
                .with_flags(user_flags)
                .with_signon_time(self.signon_time.timestamp() as u32)
                .with_capabilities(&s.capabilities);
            info.warning_level = s.warning_level;
            if let Some(since) = s.idle_since {
                let minutes = (Utc::now() - since).num_minutes().clamp(0, u16::MAX as i64);
                info = info.with_idle_minutes(minutes as u16);
            }
            info
        })
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("ident", &self.ident)
            .field("closed", &self.is_closed())
            .finish()
    }
}

#[derive(Default)]
struct Indexes {
    by_id: HashMap<SessionId, Arc<Session>>,
    by_ident: HashMap<String, SessionId>,
}

/// The in-memory registry of live sessions. Also instantiated per chat room.
#[derive(Default)]
pub struct SessionRegistry {
    inner: RwLock<Indexes>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a fresh session, evicting any prior session with the same
    /// ident. The evicted session receives a signed-on-elsewhere disconnect.
    pub fn add_new(
        &self,
        screen_name: &ScreenName,
        remote_addr: Option<SocketAddr>,
    ) -> Arc<Session> {
        let session = Session::new(screen_name, remote_addr);
        let evicted = {
            let mut inner = self.inner.write().expect("registry lock poisoned");
            let old_id = inner
                .by_ident
                .insert(session.ident().to_owned(), session.id());
            let evicted = old_id.and_then(|id| inner.by_id.remove(&id));
            inner.by_id.insert(session.id(), session.clone());
            evicted
        };
        if let Some(old) = evicted {
            tracing::info!(ident = %old.ident(), "evicting prior session, signed on elsewhere");
            old.disconnect(DisconnectReason::SignedOnElsewhere);
        }
        session
    }

    pub fn remove(&self, id: SessionId) -> Option<Arc<Session>> {
        let mut inner = self.inner.write().expect("registry lock poisoned");
        let session = inner.by_id.remove(&id)?;
        // Only drop the ident index entry if it still points at this session;
        // an eviction may already have replaced it.
        if inner.by_ident.get(session.ident()) == Some(&id) {
            inner.by_ident.remove(session.ident());
        }
        Some(session)
    }

    #[allow(dead_code)]
    pub fn find_by_id(&self, id: SessionId) -> Option<Arc<Session>> {
        self.inner
            .read()
            .expect("registry lock poisoned")
            .by_id
            .get(&id)
            .cloned()
    }

    pub fn find_by_ident(&self, ident: &str) -> Option<Arc<Session>> {
        let inner = self.inner.read().expect("registry lock poisoned");
        let id = inner.by_ident.get(ident)?;
        inner.by_id.get(id).cloned()
    }

    pub fn all(&self) -> Vec<Arc<Session>> {
        self.inner
            .read()
            .expect("registry lock poisoned")
            .by_id
            .values()
            .cloned()
            .collect()
    }

    pub fn matching(&self, pred: impl Fn(&Session) -> bool) -> Vec<Arc<Session>> {
        self.inner
            .read()
            .expect("registry lock poisoned")
            .by_id
            .values()
            .filter(|s| pred(s))
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.inner.read().expect("registry lock poisoned").by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
