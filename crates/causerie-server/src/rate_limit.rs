//! Rate limiting.
//!
//! Two layers: per-connection token buckets keyed by SNAC rate class, and a
//! per-IP bucket throttling new connection attempts. A class bucket's level
//! refills toward the class maximum at `max / window_ms` points per
//! millisecond and each SNAC subtracts the class cost. Bands, from healthy
//! to terminal: clear, alert (warn the client), limited (drop the SNAC),
//! disconnect. Once limited, the level must climb back above the clear
//! threshold before traffic is accepted again.

use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::Arc;
use std::time::Instant;

use tokio::sync::Mutex;
use tracing::warn;

use causerie_wire::payloads::oservice::{RateClassParams, RateGroup, RateParamsReply};
use causerie_wire::snac::{buddy, chat, feedbag, foodgroup, icbm, locate, oservice};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateClass {
    pub id: u16,
    pub window_ms: u32,
    pub clear_level: u32,
    pub alert_level: u32,
    pub limit_level: u32,
    pub disconnect_level: u32,
    pub max_level: u32,
    /// Points one SNAC of this class costs.
    pub cost: u32,
}

impl RateClass {
    fn params(&self, current_level: u32, state: u8) -> RateClassParams {
        RateClassParams {
            id: self.id,
            window_ms: self.window_ms,
            clear_level: self.clear_level,
            alert_level: self.alert_level,
            limit_level: self.limit_level,
            disconnect_level: self.disconnect_level,
            current_level,
            max_level: self.max_level,
            last_time: 0,
            current_state: state,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateBand {
    Clear,
    Alert,
    Limited,
    Disconnect,
}

impl RateBand {
    fn as_state_byte(self) -> u8 {
        match self {
            RateBand::Clear => 0,
            RateBand::Alert => 1,
            RateBand::Limited => 2,
            RateBand::Disconnect => 3,
        }
    }
}

/// Outcome of admitting one SNAC.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateVerdict {
    pub band: RateBand,
    /// Set when this SNAC moved the bucket into a new band.
    pub entered: Option<RateBand>,
    pub class: RateClassParams,
}

/// The class table: thresholds plus the SNAC id → class mapping. Defaults
/// are tuned so well-behaved period clients never leave the clear band.
pub struct RateClassTable {
    classes: Vec<RateClass>,
}

impl Default for RateClassTable {
    fn default() -> Self {
        let base = RateClass {
            id: 1,
            window_ms: 80_000,
            clear_level: 2500,
            alert_level: 2000,
            limit_level: 1500,
            disconnect_level: 800,
            max_level: 4000,
            cost: 50,
        };
        Self {
            classes: vec![
                base,
                // Locate/profile queries.
                RateClass {
                    id: 2,
                    window_ms: 60_000,
                    clear_level: 3000,
                    alert_level: 2500,
                    limit_level: 2000,
                    disconnect_level: 1000,
                    max_level: 5000,
                    cost: 100,
                },
                // Outbound messaging.
                RateClass {
                    id: 3,
                    window_ms: 50_000,
                    clear_level: 3000,
                    alert_level: 2500,
                    limit_level: 2000,
                    disconnect_level: 1200,
                    max_level: 5000,
                    cost: 150,
                },
                // Typing events and other chatter.
                RateClass {
                    id: 4,
                    window_ms: 40_000,
                    clear_level: 2800,
                    alert_level: 2200,
                    limit_level: 1600,
                    disconnect_level: 800,
                    max_level: 4000,
                    cost: 100,
                },
                // Feedbag mutations.
                RateClass {
                    id: 5,
                    window_ms: 100_000,
                    clear_level: 3000,
                    alert_level: 2500,
                    limit_level: 2000,
                    disconnect_level: 1000,
                    max_level: 5000,
                    cost: 80,
                },
            ],
        }
    }
}

impl RateClassTable {
    /// Override hook for non-default thresholds.
    #[allow(dead_code)]
    pub fn with_classes(classes: Vec<RateClass>) -> Self {
        assert!(!classes.is_empty());
        Self { classes }
    }

    pub fn classes(&self) -> &[RateClass] {
        &self.classes
    }

    fn class_index(&self, food_group: u16, subgroup: u16) -> usize {
        let id = match (food_group, subgroup) {
            (foodgroup::LOCATE, locate::USER_INFO_QUERY)
            | (foodgroup::LOCATE, locate::USER_INFO_QUERY2) => 2,
            (foodgroup::ICBM, icbm::CHANNEL_MSG_TO_HOST)
            | (foodgroup::CHAT, chat::CHANNEL_MSG_TO_HOST) => 3,
            (foodgroup::ICBM, icbm::CLIENT_EVENT) => 4,
            (foodgroup::FEEDBAG, feedbag::INSERT_ITEM)
            | (foodgroup::FEEDBAG, feedbag::UPDATE_ITEM)
            | (foodgroup::FEEDBAG, feedbag::DELETE_ITEM) => 5,
            _ => 1,
        };
        self.classes
            .iter()
            .position(|c| c.id == id)
            .unwrap_or(0)
    }

    /// SNAC membership listing advertised to clients.
    fn groups(&self) -> Vec<RateGroup> {
        let mut groups: Vec<RateGroup> = self
            .classes
            .iter()
            .map(|c| RateGroup {
                id: c.id,
                pairs: Vec::new(),
            })
            .collect();
        let known: &[(u16, u16)] = &[
            (foodgroup::OSERVICE, oservice::CLIENT_ONLINE),
            (foodgroup::OSERVICE, oservice::RATE_PARAMS_QUERY),
            (foodgroup::OSERVICE, oservice::USER_INFO_QUERY),
            (foodgroup::OSERVICE, oservice::IDLE_NOTIFICATION),
            (foodgroup::LOCATE, locate::SET_INFO),
            (foodgroup::LOCATE, locate::USER_INFO_QUERY),
            (foodgroup::LOCATE, locate::USER_INFO_QUERY2),
            (foodgroup::BUDDY, buddy::ADD_BUDDIES),
            (foodgroup::BUDDY, buddy::DEL_BUDDIES),
            (foodgroup::ICBM, icbm::CHANNEL_MSG_TO_HOST),
            (foodgroup::ICBM, icbm::CLIENT_EVENT),
            (foodgroup::CHAT, chat::CHANNEL_MSG_TO_HOST),
            (foodgroup::FEEDBAG, feedbag::QUERY),
            (foodgroup::FEEDBAG, feedbag::INSERT_ITEM),
            (foodgroup::FEEDBAG, feedbag::UPDATE_ITEM),
            (foodgroup::FEEDBAG, feedbag::DELETE_ITEM),
        ];
        for &(fg, sub) in known {
            let idx = self.class_index(fg, sub);
            let id = self.classes[idx].id;
            if let Some(group) = groups.iter_mut().find(|g| g.id == id) {
                group.pairs.push((fg, sub));
            }
        }
        groups
    }

    /// The full table as sent in the rate-params reply.
    pub fn params_reply(&self) -> RateParamsReply {
        RateParamsReply {
            classes: self
                .classes
                .iter()
                .map(|c| c.params(c.max_level, RateBand::Clear.as_state_byte()))
                .collect(),
            groups: self.groups(),
        }
    }
}

struct Bucket {
    level: f64,
    last: Instant,
    band: RateBand,
}

/// Per-connection limiter: one bucket per class.
pub struct ConnectionRateLimiter {
    table: Arc<RateClassTable>,
    buckets: Vec<Bucket>,
}

impl ConnectionRateLimiter {
    pub fn new(table: Arc<RateClassTable>, now: Instant) -> Self {
        let buckets = table
            .classes()
            .iter()
            .map(|c| Bucket {
                level: c.max_level as f64,
                last: now,
                band: RateBand::Clear,
            })
            .collect();
        Self { table, buckets }
    }

    pub fn check(&mut self, food_group: u16, subgroup: u16, now: Instant) -> RateVerdict {
        let idx = self.table.class_index(food_group, subgroup);
        let class = self.table.classes()[idx];
        let bucket = &mut self.buckets[idx];

        let elapsed_ms = now.duration_since(bucket.last).as_millis() as f64;
        bucket.last = now;
        let refill_per_ms = class.max_level as f64 / class.window_ms as f64;
        bucket.level = (bucket.level + elapsed_ms * refill_per_ms).min(class.max_level as f64);
        bucket.level = (bucket.level - class.cost as f64).max(0.0);

        let level = bucket.level as u32;
        let band = if level <= class.disconnect_level {
            RateBand::Disconnect
        } else if level <= class.limit_level {
            RateBand::Limited
        } else if matches!(bucket.band, RateBand::Limited | RateBand::Disconnect)
            && level < class.clear_level
        {
            // No recovery until the level climbs back above the clear mark.
            RateBand::Limited
        } else if level < class.clear_level {
            RateBand::Alert
        } else {
            RateBand::Clear
        };

        let entered = (band != bucket.band).then_some(band);
        bucket.band = band;

        RateVerdict {
            band,
            entered,
            class: class.params(level, band.as_state_byte()),
        }
    }
}

#[derive(Debug, Clone)]
struct TokenBucket {
    tokens: f64,
    last_refill: Instant,
}

impl TokenBucket {
    fn new(capacity: f64) -> Self {
        Self {
            tokens: capacity,
            last_refill: Instant::now(),
        }
    }

    fn try_consume(&mut self, rate: f64, capacity: f64) -> bool {
        let now = Instant::now();
        let elapsed = now.duration_since(self.last_refill).as_secs_f64();
        self.last_refill = now;

        self.tokens = (self.tokens + elapsed * rate).min(capacity);

        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            true
        } else {
            false
        }
    }
}

/// Throttles connection attempts per source address.
#[derive(Clone)]
pub struct IpRateLimiter {
    buckets: Arc<Mutex<HashMap<IpAddr, TokenBucket>>>,
    rate: f64,
    capacity: f64,
}

impl IpRateLimiter {
    pub fn new(rate: f64, capacity: f64) -> Self {
        Self {
            buckets: Arc::new(Mutex::new(HashMap::new())),
            rate,
            capacity,
        }
    }

    pub async fn check(&self, ip: IpAddr) -> bool {
        let mut buckets = self.buckets.lock().await;
        let bucket = buckets
            .entry(ip)
            .or_insert_with(|| TokenBucket::new(self.capacity));
        let allowed = bucket.try_consume(self.rate, self.capacity);
        if !allowed {
            warn!(ip = %ip, "connection rate limit exceeded");
        }
        allowed
    }

    pub async fn purge_stale(&self, max_idle_secs: f64) {
        let mut buckets = self.buckets.lock().await;
        let now = Instant::now();
        buckets.retain(|_, bucket| {
            now.duration_since(bucket.last_refill).as_secs_f64() < max_idle_secs
        });
    }
}

impl Default for IpRateLimiter {
    /// 10 connection attempts per minute per address.
    fn default() -> Self {
        Self::new(10.0 / 60.0, 10.0)
    }
}
