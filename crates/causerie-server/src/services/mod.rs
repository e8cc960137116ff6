//! Food-group services.
//!
//! Each module handles one food group's request/response (and occasionally
//! request/fan-out) contract. [`Services`] bundles the collaborators every
//! handler needs (registries, stores, cookie baker, presence) so tests can
//! inject focused fakes; there is no global state.

pub mod auth;
pub mod bart;
pub mod buddy;
pub mod chat;
pub mod chat_nav;
pub mod directory;
pub mod feedbag;
pub mod icbm;
pub mod locate;
pub mod oservice;
pub mod permit_deny;

use std::sync::Arc;

use causerie_store::{
    BartStore, DirectoryStore, FeedbagStore, OfflineMessageStore, ProfileStore,
    SessionStateStore, UserStore,
};
use causerie_wire::cookie::CookieBaker;
use causerie_wire::feedbag::FeedbagItem;
use causerie_wire::snac::{errcode, foodgroup, SnacFrame};

use crate::chat::{ChatRegistry, ChatRoom};
use crate::config::ServerConfig;
use crate::error::{Result, ServerError};
use crate::presence::PresenceNotifier;
use crate::rate_limit::RateClassTable;
use crate::session::{Session, SessionRegistry, SnacMessage};

pub struct Services {
    pub config: Arc<ServerConfig>,
    pub sessions: Arc<SessionRegistry>,
    pub rooms: Arc<ChatRegistry>,
    pub presence: Arc<PresenceNotifier>,
    pub users: Arc<dyn UserStore>,
    pub feedbags: Arc<dyn FeedbagStore>,
    pub profiles: Arc<dyn ProfileStore>,
    pub directory: Arc<dyn DirectoryStore>,
    pub bart: Arc<dyn BartStore>,
    pub offline: Arc<dyn OfflineMessageStore>,
    pub session_state: Arc<dyn SessionStateStore>,
    pub cookie_baker: Arc<CookieBaker>,
    pub rate_classes: Arc<RateClassTable>,
}

/// Buffered feedbag mutations between StartCluster and EndCluster; the
/// batch lands atomically at EndCluster.
#[derive(Default)]
pub struct FeedbagCluster {
    pub active: bool,
    pub upserts: Vec<FeedbagItem>,
    pub deletes: Vec<FeedbagItem>,
}

impl Services {
    /// Dispatch one SNAC on a BOS connection. Store faults become a
    /// "try again later" error reply; wire faults bubble up and close the
    /// connection.
    pub fn route_bos(
        &self,
        session: &Arc<Session>,
        cluster: &mut FeedbagCluster,
        frame: SnacFrame,
        body: &[u8],
    ) -> Result<Vec<SnacMessage>> {
        let result = match frame.food_group {
            foodgroup::OSERVICE => oservice::route(self, session, frame, body),
            foodgroup::LOCATE => locate::route(self, session, frame, body),
            foodgroup::BUDDY => buddy::route(self, session, frame, body),
            foodgroup::ICBM => icbm::route(self, session, frame, body),
            foodgroup::FEEDBAG => feedbag::route(self, session, cluster, frame, body),
            foodgroup::CHAT_NAV => chat_nav::route(self, session, frame, body),
            foodgroup::BART => bart::route(self, session, frame, body),
            foodgroup::PERMIT_DENY => permit_deny::route(self, session, frame, body),
            foodgroup::ADMIN
            | foodgroup::ODIR
            | foodgroup::USER_LOOKUP
            | foodgroup::STATS
            | foodgroup::ICQ => directory::route(self, session, frame, body),
            _ => Ok(vec![SnacMessage::error(frame, errcode::INVALID_SNAC)]),
        };
        self.absorb_store_faults(frame, result)
    }

    /// Dispatch one SNAC on a chat connection; only OService and Chat are
    /// routable there.
    pub fn route_chat(
        &self,
        room: &Arc<ChatRoom>,
        session: &Arc<Session>,
        frame: SnacFrame,
        body: &[u8],
    ) -> Result<Vec<SnacMessage>> {
        let result = match frame.food_group {
            foodgroup::OSERVICE => oservice::route_chat(self, room, session, frame, body),
            foodgroup::CHAT => chat::route(self, room, session, frame, body),
            _ => Ok(vec![SnacMessage::error(frame, errcode::INVALID_SNAC)]),
        };
        self.absorb_store_faults(frame, result)
    }

    fn absorb_store_faults(
        &self,
        frame: SnacFrame,
        result: Result<Vec<SnacMessage>>,
    ) -> Result<Vec<SnacMessage>> {
        match result {
            Err(ServerError::Store(e)) => {
                tracing::error!(error = %e, food_group = frame.food_group, "store fault while handling snac");
                Ok(vec![SnacMessage::error(frame, errcode::TRY_AGAIN_LATER)])
            }
            other => other,
        }
    }
}
