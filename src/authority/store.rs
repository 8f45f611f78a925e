//! Correlation store
//!
//! Maps attempt ids to pending login attempts. Entries expire a fixed time
//! after insertion; expired entries are invisible to every operation and are
//! physically removed by a periodic sweep.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use ulid::Ulid;

use crate::events::{FlowEvent, SharedEventSink};
use crate::metrics::PENDING_ATTEMPTS;
use crate::model::Identity;

/// One in-flight login, owned by the authority.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingAuthAttempt {
    /// Original resource the caller wanted
    pub redirect_uri: String,
    /// Gate-local callback URL to bounce back to
    pub auth_url: String,
    /// Set exactly once by the exchange step
    pub identity: Option<Identity>,
}

impl PendingAuthAttempt {
    pub fn new(redirect_uri: impl Into<String>, auth_url: impl Into<String>) -> Self {
        Self {
            redirect_uri: redirect_uri.into(),
            auth_url: auth_url.into(),
            identity: None,
        }
    }

    pub fn is_exchanged(&self) -> bool {
        self.identity.is_some()
    }
}

#[derive(Debug)]
struct StoredAttempt {
    attempt: PendingAuthAttempt,
    expires_at: Instant,
}

impl StoredAttempt {
    fn is_live(&self, now: Instant) -> bool {
        now < self.expires_at
    }
}

fn live_count(entries: &HashMap<String, StoredAttempt>, now: Instant) -> usize {
    entries.values().filter(|stored| stored.is_live(now)).count()
}

/// Attempt id -> pending attempt, with expiry.
///
/// Cloning is cheap; clones share the same entries.
#[derive(Clone)]
pub struct CorrelationStore {
    entries: Arc<RwLock<HashMap<String, StoredAttempt>>>,
    ttl: Duration,
}

impl CorrelationStore {
    /// Create an empty store whose entries live for `ttl`.
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: Arc::new(RwLock::new(HashMap::new())),
            ttl,
        }
    }

    /// Store a new attempt under a fresh id and return the id.
    pub async fn insert(&self, attempt: PendingAuthAttempt) -> String {
        let now = Instant::now();
        let mut entries = self.entries.write().await;

        let rid = loop {
            let candidate = Ulid::new().to_string();
            match entries.get(&candidate) {
                Some(existing) if existing.is_live(now) => continue,
                _ => break candidate,
            }
        };

        entries.insert(
            rid.clone(),
            StoredAttempt {
                attempt,
                expires_at: now + self.ttl,
            },
        );
        PENDING_ATTEMPTS.set(live_count(&entries, now) as i64);

        rid
    }

    /// Non-destructive read.
    pub async fn get(&self, rid: &str) -> Option<PendingAuthAttempt> {
        let entries = self.entries.read().await;
        entries
            .get(rid)
            .filter(|stored| stored.is_live(Instant::now()))
            .map(|stored| stored.attempt.clone())
    }

    /// Destructive read. At most one caller ever receives a given attempt.
    pub async fn pop(&self, rid: &str) -> Option<PendingAuthAttempt> {
        let now = Instant::now();
        let mut entries = self.entries.write().await;
        let stored = entries.remove(rid)?;
        PENDING_ATTEMPTS.set(live_count(&entries, now) as i64);

        stored.is_live(now).then_some(stored.attempt)
    }

    /// Record the identity on a live attempt that has not been exchanged yet.
    ///
    /// Returns `false` when the attempt is absent, expired or already
    /// carries an identity.
    pub async fn complete(&self, rid: &str, identity: Identity) -> bool {
        let mut entries = self.entries.write().await;
        match entries.get_mut(rid) {
            Some(stored) if stored.is_live(Instant::now()) && !stored.attempt.is_exchanged() => {
                stored.attempt.identity = Some(identity);
                true
            }
            _ => false,
        }
    }

    /// Remove every expired entry, returning how many were dropped.
    pub async fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|_, stored| stored.is_live(now));
        PENDING_ATTEMPTS.set(entries.len() as i64);
        before - entries.len()
    }

    /// Number of entries currently held, expired ones included.
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    /// Number of attempts that have not expired.
    pub async fn live_len(&self) -> usize {
        live_count(&*self.entries.read().await, Instant::now())
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Spawn the background sweep.
    ///
    /// The task runs until the returned handle is aborted.
    pub fn spawn_sweeper(&self, interval: Duration, events: SharedEventSink) -> JoinHandle<()> {
        let store = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            // The first tick completes immediately.
            ticker.tick().await;

            loop {
                ticker.tick().await;
                let count = store.purge_expired().await;
                if count > 0 {
                    events.emit(FlowEvent::AttemptsPurged { count });
                }
            }
        })
    }
}
