//! Presence fan-out.
//!
//! On arrival, departure, state change or list mutation, compute the
//! interested parties from the persistent feedbag plus the ephemeral
//! buddy-service lists, subtract blocks in either direction, and enqueue
//! exactly one arrival or departure per watcher.

use std::collections::HashSet;
use std::sync::Arc;

use causerie_store::{FeedbagStore, StoreError};
use causerie_wire::payloads::buddy::{BuddyArrived, BuddyDeparted};
use causerie_wire::snac::{buddy, foodgroup, SnacFrame};

use crate::session::{Session, SessionRegistry, SnacMessage};

pub struct PresenceNotifier {
    sessions: Arc<SessionRegistry>,
    feedbags: Arc<dyn FeedbagStore>,
}

impl PresenceNotifier {
    pub fn new(sessions: Arc<SessionRegistry>, feedbags: Arc<dyn FeedbagStore>) -> Self {
        Self { sessions, feedbags }
    }

    fn arrival_message(of: &Session) -> SnacMessage {
        SnacMessage::new(SnacFrame::new(foodgroup::BUDDY, buddy::ARRIVED), |buf| {
            BuddyArrived {
                user_info: of.user_info(),
            }
            .encode(buf)
        })
    }

    fn departure_message(of: &Session) -> SnacMessage {
        SnacMessage::new(SnacFrame::new(foodgroup::BUDDY, buddy::DEPARTED), |buf| {
            BuddyDeparted::for_screen_name(of.display()).encode(buf)
        })
    }

    /// Live, ready sessions watching `subject`: feedbag adjacents plus
    /// ephemeral buddy-list holders, minus blocks in either direction,
    /// deduplicated by ident so a watcher on both paths sees one event.
    fn watchers(&self, subject: &Session) -> Result<Vec<Arc<Session>>, StoreError> {
        let ident = subject.ident();
        let mut seen: HashSet<String> = HashSet::new();
        let mut out = Vec::new();

        for watcher_ident in self.feedbags.adjacent_users(ident)? {
            if watcher_ident == ident || !seen.insert(watcher_ident.clone()) {
                continue;
            }
            if let Some(watcher) = self.sessions.find_by_ident(&watcher_ident) {
                if watcher.is_ready() && !self.pd_blocked(subject, &watcher) {
                    out.push(watcher);
                }
            }
        }

        let ephemeral = self.sessions.matching(|s| {
            s.is_ready() && s.with_state(|st| st.ephemeral_buddies.contains(ident))
        });
        for watcher in ephemeral {
            if watcher.ident() == ident || !seen.insert(watcher.ident().to_owned()) {
                continue;
            }
            if self.feedbags.blocked_state(watcher.ident(), ident)?.any() {
                continue;
            }
            if !self.pd_blocked(subject, &watcher) {
                out.push(watcher);
            }
        }

        Ok(out)
    }

    fn pd_blocked(&self, a: &Session, b: &Session) -> bool {
        a.denies(b.ident()) || b.denies(a.ident())
    }

    /// Announce `session` to everyone watching it.
    pub fn broadcast_arrival(&self, session: &Session) -> Result<(), StoreError> {
        if session.is_invisible() {
            return Ok(());
        }
        let message = Self::arrival_message(session);
        for watcher in self.watchers(session)? {
            watcher.push(message.clone());
        }
        Ok(())
    }

    pub fn broadcast_departure(&self, session: &Session) -> Result<(), StoreError> {
        let message = Self::departure_message(session);
        for watcher in self.watchers(session)? {
            watcher.push(message.clone());
        }
        Ok(())
    }

    /// The burst of arrivals a fresh session receives at ClientOnline: one
    /// for each of its online, visible buddies.
    pub fn send_buddy_snapshot(&self, session: &Session) -> Result<(), StoreError> {
        let mut seen: HashSet<String> = HashSet::new();
        for buddy_ident in self.feedbags.buddies(session.ident())? {
            if !seen.insert(buddy_ident.clone()) {
                continue;
            }
            if let Some(buddy_sess) = self.sessions.find_by_ident(&buddy_ident) {
                if buddy_sess.is_ready()
                    && !buddy_sess.is_invisible()
                    && !self.pd_blocked(session, &buddy_sess)
                {
                    session.push(Self::arrival_message(&buddy_sess));
                }
            }
        }
        Ok(())
    }

    /// Re-derive visibility between `session` and the user named `peer`
    /// after a feedbag or permit/deny mutation, emitting the arrival or
    /// departure each side is now owed.
    pub fn sync_relationship(&self, session: &Session, peer: &str) -> Result<(), StoreError> {
        let Some(peer_sess) = self.sessions.find_by_ident(peer) else {
            return Ok(());
        };
        if !peer_sess.is_ready() {
            return Ok(());
        }

        let blocked = self.feedbags.blocked_state(session.ident(), peer)?.any()
            || self.pd_blocked(session, &peer_sess);

        if blocked {
            session.push(Self::departure_message(&peer_sess));
            if session.is_ready() {
                peer_sess.push(Self::departure_message(session));
            }
            return Ok(());
        }

        let lists_peer = self.feedbags.buddies(session.ident())?.contains(&peer.to_owned())
            || session.with_state(|s| s.ephemeral_buddies.contains(peer));
        if lists_peer && !peer_sess.is_invisible() {
            session.push(Self::arrival_message(&peer_sess));
        }

        let peer_lists = self
            .feedbags
            .buddies(peer)?
            .contains(&session.ident().to_owned())
            || peer_sess.with_state(|s| s.ephemeral_buddies.contains(session.ident()));
        if peer_lists && session.is_ready() && !session.is_invisible() {
            peer_sess.push(Self::arrival_message(session));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use causerie_store::{BlockedState, Result as StoreResult, ScreenName};
    use causerie_wire::feedbag::FeedbagItem;
    use causerie_wire::snac::buddy;

    use crate::session::SessionEvent;

    /// In-memory feedbag fake: (owner, buddy) pairs and (blocker, blocked)
    /// pairs.
    #[derive(Default)]
    struct FakeFeedbag {
        buddies: Mutex<Vec<(String, String)>>,
        blocks: Mutex<Vec<(String, String)>>,
    }

    impl FakeFeedbag {
        fn add_buddy(&self, owner: &str, name: &str) {
            self.buddies
                .lock()
                .unwrap()
                .push((owner.into(), name.into()));
        }

        fn add_block(&self, blocker: &str, blocked: &str) {
            self.blocks
                .lock()
                .unwrap()
                .push((blocker.into(), blocked.into()));
        }

        fn blocked_either_way(&self, a: &str, b: &str) -> bool {
            let blocks = self.blocks.lock().unwrap();
            blocks.iter().any(|(x, y)| {
                (x == a && y == b) || (x == b && y == a)
            })
        }
    }

    impl FeedbagStore for FakeFeedbag {
        fn feedbag(&self, _owner: &str) -> StoreResult<Vec<FeedbagItem>> {
            Ok(Vec::new())
        }

        fn last_modified(
            &self,
            _owner: &str,
        ) -> StoreResult<Option<chrono::DateTime<chrono::Utc>>> {
            Ok(None)
        }

        fn apply_batch(
            &self,
            _owner: &str,
            _upserts: &[FeedbagItem],
            _deletes: &[FeedbagItem],
        ) -> StoreResult<()> {
            Ok(())
        }

        fn adjacent_users(&self, owner: &str) -> StoreResult<Vec<String>> {
            let buddies = self.buddies.lock().unwrap();
            Ok(buddies
                .iter()
                .filter(|(o, n)| n == owner && !self.blocked_either_way(o, owner))
                .map(|(o, _)| o.clone())
                .collect())
        }

        fn buddies(&self, owner: &str) -> StoreResult<Vec<String>> {
            let buddies = self.buddies.lock().unwrap();
            Ok(buddies
                .iter()
                .filter(|(o, n)| o == owner && !self.blocked_either_way(owner, n))
                .map(|(_, n)| n.clone())
                .collect())
        }

        fn blocked_state(&self, a: &str, b: &str) -> StoreResult<BlockedState> {
            let blocks = self.blocks.lock().unwrap();
            if blocks.iter().any(|(x, y)| x == a && y == b) {
                Ok(BlockedState::ABlocksB)
            } else if blocks.iter().any(|(x, y)| x == b && y == a) {
                Ok(BlockedState::BBlocksA)
            } else {
                Ok(BlockedState::None)
            }
        }
    }

    fn setup() -> (Arc<SessionRegistry>, Arc<FakeFeedbag>, PresenceNotifier) {
        let sessions = Arc::new(SessionRegistry::new());
        let feedbags = Arc::new(FakeFeedbag::default());
        let notifier = PresenceNotifier::new(sessions.clone(), feedbags.clone());
        (sessions, feedbags, notifier)
    }

    fn ready_session(
        sessions: &SessionRegistry,
        name: &str,
    ) -> Arc<Session> {
        let session = sessions.add_new(&ScreenName::new(name), None);
        session.with_state_mut(|s| s.ready = true);
        session
    }

    fn drain_subgroups(session: &Session) -> Vec<u16> {
        let mut rx = session.take_queue().unwrap();
        let mut subgroups = Vec::new();
        while let Ok(ev) = rx.try_recv() {
            if let SessionEvent::Snac(msg) = ev {
                subgroups.push(msg.frame.subgroup);
            }
        }
        subgroups
    }

    #[test]
    fn watcher_receives_exactly_one_arrival() {
        let (sessions, feedbags, notifier) = setup();
        let alice = ready_session(&sessions, "Alice");
        let bob = ready_session(&sessions, "Bob");
        feedbags.add_buddy("bob", "alice");
        // Bob also has Alice on his ephemeral 3.x list: still one event.
        bob.with_state_mut(|s| {
            s.ephemeral_buddies.insert("alice".into());
        });

        notifier.broadcast_arrival(&alice).unwrap();

        assert_eq!(drain_subgroups(&bob), vec![buddy::ARRIVED]);
    }

    #[test]
    fn non_watchers_see_nothing() {
        let (sessions, _feedbags, notifier) = setup();
        let alice = ready_session(&sessions, "Alice");
        let carol = ready_session(&sessions, "Carol");

        notifier.broadcast_arrival(&alice).unwrap();
        assert!(drain_subgroups(&carol).is_empty());
    }

    #[test]
    fn blocks_suppress_fanout_both_ways() {
        let (sessions, feedbags, notifier) = setup();
        let alice = ready_session(&sessions, "Alice");
        let bob = ready_session(&sessions, "Bob");
        feedbags.add_buddy("bob", "alice");
        feedbags.add_block("alice", "bob");

        notifier.broadcast_arrival(&alice).unwrap();
        assert!(drain_subgroups(&bob).is_empty());
    }

    #[test]
    fn unready_watchers_are_skipped() {
        let (sessions, feedbags, notifier) = setup();
        let alice = ready_session(&sessions, "Alice");
        let bob = sessions.add_new(&ScreenName::new("Bob"), None); // not ready
        feedbags.add_buddy("bob", "alice");

        notifier.broadcast_arrival(&alice).unwrap();
        assert!(drain_subgroups(&bob).is_empty());
    }

    #[test]
    fn snapshot_contains_online_buddies_only() {
        let (sessions, feedbags, notifier) = setup();
        let bob = ready_session(&sessions, "Bob");
        ready_session(&sessions, "Alice");
        feedbags.add_buddy("bob", "alice");
        feedbags.add_buddy("bob", "offline-pal");

        notifier.send_buddy_snapshot(&bob).unwrap();
        assert_eq!(drain_subgroups(&bob), vec![buddy::ARRIVED]);
    }

    #[test]
    fn departure_reaches_watchers() {
        let (sessions, feedbags, notifier) = setup();
        let alice = ready_session(&sessions, "Alice");
        let bob = ready_session(&sessions, "Bob");
        feedbags.add_buddy("bob", "alice");

        notifier.broadcast_departure(&alice).unwrap();
        assert_eq!(drain_subgroups(&bob), vec![buddy::DEPARTED]);
    }

    #[test]
    fn new_block_produces_departures() {
        let (sessions, feedbags, notifier) = setup();
        let alice = ready_session(&sessions, "Alice");
        let bob = ready_session(&sessions, "Bob");
        feedbags.add_buddy("bob", "alice");
        feedbags.add_buddy("alice", "bob");
        feedbags.add_block("bob", "alice");

        notifier.sync_relationship(&bob, "alice").unwrap();

        assert_eq!(drain_subgroups(&bob), vec![buddy::DEPARTED]);
        assert_eq!(drain_subgroups(&alice), vec![buddy::DEPARTED]);
    }

    #[test]
    fn invisible_sessions_do_not_announce() {
        let (sessions, feedbags, notifier) = setup();
        let alice = ready_session(&sessions, "Alice");
        let bob = ready_session(&sessions, "Bob");
        feedbags.add_buddy("bob", "alice");
        alice.with_state_mut(|s| s.invisible = true);

        notifier.broadcast_arrival(&alice).unwrap();
        assert!(drain_subgroups(&bob).is_empty());
    }
}
