//! Session caching with sliding idle expiry.
//!
//! Entries live in a sharded concurrent map, so sessions on different shards
//! never contend and a single session's read-modify-write is atomic within
//! its shard. There is no capacity bound and nothing is written to disk.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::clock::{Clock, SystemClock};
use crate::types::{SessionId, Transcript};

/// Default idle window after which an untouched session disappears.
pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(30 * 60);

// ─────────────────────────────────────────────
// SessionStore trait
// ─────────────────────────────────────────────

/// Keyed transcript cache owned by the orchestrator's host.
///
/// Implementations hand out clones only; callers never alias stored state.
pub trait SessionStore: Send + Sync {
    /// The transcript for `id`, or `None` if it never existed or has expired.
    /// A hit refreshes the idle timer.
    fn get(&self, id: &SessionId) -> Option<Transcript>;

    /// Insert or replace the transcript for `id` and restart its idle timer.
    fn put(&self, id: &SessionId, transcript: Transcript);

    /// Drop the entry for `id`. Returns `true` if a live entry was removed.
    fn remove(&self, id: &SessionId) -> bool;

    /// Drop every expired entry. Returns how many were removed.
    fn purge_expired(&self) -> usize;

    /// Number of live (non-expired) entries.
    fn len(&self) -> usize;

    /// Turn count and timestamps for a live entry. Does not refresh the idle timer.
    fn summary(&self, id: &SessionId) -> Option<SessionSummary>;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// ─────────────────────────────────────────────
// Config + entry
// ─────────────────────────────────────────────

/// Construction parameters for [`MemorySessionStore`].
#[derive(Clone, Debug)]
pub struct SessionStoreConfig {
    pub idle_timeout: Duration,
}

impl Default for SessionStoreConfig {
    fn default() -> Self {
        Self {
            idle_timeout: DEFAULT_IDLE_TIMEOUT,
        }
    }
}

#[derive(Debug)]
struct SessionEntry {
    transcript: Transcript,
    last_access: Instant,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl SessionEntry {
    fn new(transcript: Transcript, now: Instant) -> Self {
        let wall = Utc::now();
        SessionEntry {
            transcript,
            last_access: now,
            created_at: wall,
            updated_at: wall,
        }
    }

    fn is_expired(&self, now: Instant, idle_timeout: Duration) -> bool {
        now.saturating_duration_since(self.last_access) > idle_timeout
    }
}

/// Summary of a live session, for diagnostics.
#[derive(Clone, Debug)]
pub struct SessionSummary {
    pub id: SessionId,
    pub turns: usize,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// ─────────────────────────────────────────────
// MemorySessionStore
// ─────────────────────────────────────────────

/// In-process [`SessionStore`] with sliding-window idle expiry.
pub struct MemorySessionStore {
    entries: DashMap<SessionId, SessionEntry>,
    idle_timeout: Duration,
    clock: Arc<dyn Clock>,
}

impl std::fmt::Debug for MemorySessionStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemorySessionStore")
            .field("entries", &self.entries.len())
            .field("idle_timeout", &self.idle_timeout)
            .finish()
    }
}

impl MemorySessionStore {
    /// Create a store driven by the system clock.
    pub fn new(config: SessionStoreConfig) -> Self {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    /// Create a store driven by the given clock.
    pub fn with_clock(config: SessionStoreConfig, clock: Arc<dyn Clock>) -> Self {
        info!(
            idle_timeout_secs = config.idle_timeout.as_secs(),
            "session store initialized"
        );
        MemorySessionStore {
            entries: DashMap::new(),
            idle_timeout: config.idle_timeout,
            clock,
        }
    }

    pub fn idle_timeout(&self) -> Duration {
        self.idle_timeout
    }
}

impl SessionStore for MemorySessionStore {
    fn get(&self, id: &SessionId) -> Option<Transcript> {
        let now = self.clock.now();

        {
            let mut entry = self.entries.get_mut(id)?;
            if !entry.is_expired(now, self.idle_timeout) {
                entry.last_access = now;
                return Some(entry.transcript.clone());
            }
        }

        // Guard dropped above; re-check under the shard lock so a concurrent
        // put that just refreshed the entry is not thrown away.
        let timeout = self.idle_timeout;
        if self
            .entries
            .remove_if(id, |_, e| e.is_expired(now, timeout))
            .is_some()
        {
            debug!(session_id = %id, "session expired on read");
        }
        None
    }

    fn put(&self, id: &SessionId, transcript: Transcript) {
        let now = self.clock.now();
        let turns = transcript.len();

        match self.entries.entry(id.clone()) {
            Entry::Occupied(mut occupied) => {
                let entry = occupied.get_mut();
                if entry.is_expired(now, self.idle_timeout) {
                    *entry = SessionEntry::new(transcript, now);
                } else {
                    entry.transcript = transcript;
                    entry.last_access = now;
                    entry.updated_at = Utc::now();
                }
            }
            Entry::Vacant(vacant) => {
                vacant.insert(SessionEntry::new(transcript, now));
            }
        }

        debug!(session_id = %id, turns = turns, "session stored");
    }

    fn remove(&self, id: &SessionId) -> bool {
        let now = self.clock.now();
        match self.entries.remove(id) {
            Some((_, entry)) => !entry.is_expired(now, self.idle_timeout),
            None => false,
        }
    }

    fn purge_expired(&self) -> usize {
        let now = self.clock.now();
        let timeout = self.idle_timeout;
        let mut removed = 0;
        self.entries.retain(|_, e| {
            let keep = !e.is_expired(now, timeout);
            if !keep {
                removed += 1;
            }
            keep
        });
        removed
    }

    fn summary(&self, id: &SessionId) -> Option<SessionSummary> {
        let now = self.clock.now();
        let entry = self.entries.get(id)?;
        if entry.is_expired(now, self.idle_timeout) {
            return None;
        }
        Some(SessionSummary {
            id: id.clone(),
            turns: entry.transcript.len(),
            created_at: entry.created_at,
            updated_at: entry.updated_at,
        })
    }

    fn len(&self) -> usize {
        let now = self.clock.now();
        self.entries
            .iter()
            .filter(|e| !e.is_expired(now, self.idle_timeout))
            .count()
    }
}

// ─────────────────────────────────────────────
// Background sweeper
// ─────────────────────────────────────────────

/// Periodically purge expired sessions until `cancel` fires.
///
/// Expiry is already enforced on read; the sweeper only reclaims memory held
/// by sessions nobody comes back to.
pub fn spawn_sweeper(
    store: Arc<dyn SessionStore>,
    interval: Duration,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    debug!("session sweeper stopped");
                    break;
                }
                _ = ticker.tick() => {
                    let purged = store.purge_expired();
                    if purged > 0 {
                        debug!(purged = purged, remaining = store.len(), "purged expired sessions");
                    }
                }
            }
        }
    })
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::clock::ManualClock;
    use crate::types::Turn;

    const WINDOW: Duration = Duration::from_secs(30 * 60);

    fn make_store() -> (MemorySessionStore, ManualClock) {
        let clock = ManualClock::new();
        let store = MemorySessionStore::with_clock(
            SessionStoreConfig {
                idle_timeout: WINDOW,
            },
            Arc::new(clock.clone()),
        );
        (store, clock)
    }

    fn transcript(user: &str) -> Transcript {
        let mut t = Transcript::with_system("You are a patient.");
        t.push(Turn::user(user));
        t
    }

    #[test]
    fn test_get_missing() {
        let (store, _clock) = make_store();
        assert!(store.get(&SessionId::from("nope")).is_none());
        assert!(store.is_empty());
    }

    #[test]
    fn test_put_then_get() {
        let (store, _clock) = make_store();
        let id = SessionId::generate();
        store.put(&id, transcript("hello"));

        assert_eq!(store.get(&id), Some(transcript("hello")));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_put_replaces() {
        let (store, _clock) = make_store();
        let id = SessionId::generate();
        store.put(&id, transcript("first"));
        store.put(&id, transcript("second"));

        assert_eq!(store.get(&id), Some(transcript("second")));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_returned_transcript_is_a_snapshot() {
        let (store, _clock) = make_store();
        let id = SessionId::generate();
        store.put(&id, transcript("hello"));

        let mut copy = store.get(&id).unwrap();
        copy.push(Turn::assistant("local only"));

        assert_eq!(store.get(&id).unwrap().len(), 2);
    }

    #[test]
    fn test_idle_expiry() {
        let (store, clock) = make_store();
        let id = SessionId::generate();
        store.put(&id, transcript("hello"));

        clock.advance(WINDOW + Duration::from_secs(1));

        assert!(store.get(&id).is_none());
        assert_eq!(store.len(), 0);
        // Expired read removed the entry entirely.
        assert!(store.entries.is_empty());
    }

    #[test]
    fn test_entry_survives_within_window() {
        let (store, clock) = make_store();
        let id = SessionId::generate();
        store.put(&id, transcript("hello"));

        clock.advance(WINDOW - Duration::from_secs(1));
        assert!(store.get(&id).is_some());
    }

    #[test]
    fn test_get_slides_the_window() {
        let (store, clock) = make_store();
        let id = SessionId::generate();
        store.put(&id, transcript("hello"));

        // Three reads 20 minutes apart: 60 minutes total, never idle for 30.
        for _ in 0..3 {
            clock.advance(Duration::from_secs(20 * 60));
            assert!(store.get(&id).is_some());
        }

        clock.advance(WINDOW + Duration::from_secs(1));
        assert!(store.get(&id).is_none());
    }

    #[test]
    fn test_put_slides_the_window() {
        let (store, clock) = make_store();
        let id = SessionId::generate();
        store.put(&id, transcript("one"));

        clock.advance(Duration::from_secs(25 * 60));
        store.put(&id, transcript("two"));
        clock.advance(Duration::from_secs(25 * 60));

        assert_eq!(store.get(&id), Some(transcript("two")));
    }

    #[test]
    fn test_put_after_expiry_resets_created_at() {
        let (store, clock) = make_store();
        let id = SessionId::generate();
        store.put(&id, transcript("old"));
        let created = store.summary(&id).unwrap().created_at;

        clock.advance(WINDOW * 2);
        std::thread::sleep(Duration::from_millis(2));
        store.put(&id, transcript("new"));

        let summary = store.summary(&id).unwrap();
        assert!(summary.created_at > created);
        assert_eq!(store.get(&id), Some(transcript("new")));
    }

    #[test]
    fn test_remove() {
        let (store, _clock) = make_store();
        let id = SessionId::generate();
        store.put(&id, transcript("hello"));

        assert!(store.remove(&id));
        assert!(!store.remove(&id));
        assert!(store.get(&id).is_none());
    }

    #[test]
    fn test_purge_expired_only_drops_idle_entries() {
        let (store, clock) = make_store();
        let stale = SessionId::generate();
        let fresh = SessionId::generate();
        store.put(&stale, transcript("stale"));

        clock.advance(Duration::from_secs(20 * 60));
        store.put(&fresh, transcript("fresh"));
        clock.advance(Duration::from_secs(15 * 60));

        assert_eq!(store.purge_expired(), 1);
        assert!(store.get(&fresh).is_some());
        assert!(store.get(&stale).is_none());
        assert_eq!(store.purge_expired(), 0);
    }

    #[test]
    fn test_zero_idle_minutes_still_keeps_fresh_sessions() {
        let chat = crate::config::ChatConfig {
            session_idle_minutes: 0,
            ..Default::default()
        };
        let clock = ManualClock::new();
        let store = MemorySessionStore::with_clock(
            SessionStoreConfig {
                idle_timeout: chat.idle_timeout(),
            },
            Arc::new(clock.clone()),
        );
        let id = SessionId::generate();

        store.put(&id, transcript("hi"));
        clock.advance(Duration::from_secs(59));
        assert!(store.get(&id).is_some());
        clock.advance(Duration::from_secs(61));
        assert!(store.get(&id).is_none());
    }

    #[test]
    fn test_summary_tracks_updates_without_refreshing() {
        let (store, clock) = make_store();
        let id = SessionId::from("a");
        store.put(&id, transcript("a"));
        let first = store.summary(&id).unwrap();
        assert_eq!(first.turns, 2);
        assert_eq!(first.created_at, first.updated_at);

        std::thread::sleep(Duration::from_millis(2));
        let mut longer = transcript("a");
        longer.push(Turn::assistant("b"));
        store.put(&id, longer);

        let second = store.summary(&id).unwrap();
        assert_eq!(second.turns, 3);
        assert_eq!(second.created_at, first.created_at);
        assert!(second.updated_at > first.updated_at);

        // Reading the summary does not keep the session alive.
        clock.advance(WINDOW - Duration::from_secs(1));
        assert!(store.summary(&id).is_some());
        clock.advance(Duration::from_secs(2));
        assert!(store.summary(&id).is_none());
        assert!(store.summary(&SessionId::from("missing")).is_none());
    }

    #[test]
    fn test_concurrent_sessions_independent() {
        let store = Arc::new(MemorySessionStore::new(SessionStoreConfig::default()));
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let store = Arc::clone(&store);
                std::thread::spawn(move || {
                    let id = SessionId::from(format!("s{i}"));
                    for n in 0..100 {
                        let mut t = store.get(&id).unwrap_or_default();
                        t.push(Turn::user(format!("m{n}")));
                        store.put(&id, t);
                    }
                    id
                })
            })
            .collect();

        for handle in handles {
            let id = handle.join().unwrap();
            assert_eq!(store.get(&id).unwrap().len(), 100);
        }
        assert_eq!(store.len(), 8);
    }

    #[tokio::test]
    async fn test_sweeper_purges_and_stops() {
        let clock = ManualClock::new();
        let store = Arc::new(MemorySessionStore::with_clock(
            SessionStoreConfig {
                idle_timeout: WINDOW,
            },
            Arc::new(clock.clone()),
        ));
        store.put(&SessionId::from("idle"), transcript("x"));
        clock.advance(WINDOW * 2);

        let cancel = CancellationToken::new();
        let handle = spawn_sweeper(store.clone(), Duration::from_millis(10), cancel.clone());

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(store.entries.is_empty());

        cancel.cancel();
        handle.await.unwrap();
    }
}
