use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use futures::FutureExt;
use futures::future::{BoxFuture, Shared};
use parking_lot::Mutex;
use tracing::debug;

/// Order-preserving 32-bit rolling hash of a message, used as cache key.
/// `h = h * 31 + unit` over UTF-16 code units with wrapping arithmetic.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ContentHash(i32);

impl ContentHash {
    pub fn new(text: &str) -> Self {
        let hash = text
            .encode_utf16()
            .fold(0i32, |h, unit| h.wrapping_mul(31).wrapping_add(i32::from(unit)));
        Self(hash)
    }

    pub fn value(&self) -> i32 {
        self.0
    }
}

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

pub type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

type PendingTitle = Shared<BoxFuture<'static, String>>;

struct CacheEntry {
    title: String,
    computed_at: DateTime<Utc>,
}

#[derive(Default)]
struct CacheState {
    entries: HashMap<ContentHash, CacheEntry>,
    pending: HashMap<ContentHash, PendingTitle>,
}

/// Title cache with expiry and in-flight request coalescing
#[derive(Clone)]
pub struct TitleCache {
    state: Arc<Mutex<CacheState>>,
    ttl: Duration,
    clock: Clock,
}

impl TitleCache {
    pub fn new(ttl: Duration) -> Self {
        Self::with_clock(ttl, Arc::new(Utc::now))
    }

    pub fn with_clock(ttl: Duration, clock: Clock) -> Self {
        Self {
            state: Arc::new(Mutex::new(CacheState::default())),
            ttl,
            clock,
        }
    }

    fn is_fresh(&self, entry: &CacheEntry, now: DateTime<Utc>) -> bool {
        now - entry.computed_at < self.ttl
    }

    /// Return the cached title for `text`, join a computation already in
    /// flight for it, or start `compute` and cache what it yields.
    ///
    /// The lookup and the registration of a new computation happen under one
    /// lock, so concurrent callers with the same text share a single run.
    pub async fn get_or_compute<F, Fut>(&self, text: &str, compute: F) -> String
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = String> + Send + 'static,
    {
        let key = ContentHash::new(text);

        let pending = {
            let mut state = self.state.lock();
            let now = (self.clock)();

            match state.entries.get(&key) {
                Some(entry) if self.is_fresh(entry, now) => {
                    debug!(key = %key, "Title cache hit");
                    return entry.title.clone();
                }
                Some(_) => {
                    state.entries.remove(&key);
                }
                None => {}
            }

            match state.pending.get(&key) {
                Some(pending) => {
                    debug!(key = %key, "Joining in-flight title computation");
                    pending.clone()
                }
                None => {
                    let computation = compute();
                    let shared_state = self.state.clone();
                    let clock = self.clock.clone();
                    let pending = async move {
                        let title = computation.await;
                        let mut state = shared_state.lock();
                        state.pending.remove(&key);
                        state.entries.insert(
                            key,
                            CacheEntry {
                                title: title.clone(),
                                computed_at: clock(),
                            },
                        );
                        title
                    }
                    .boxed()
                    .shared();
                    state.pending.insert(key, pending.clone());
                    pending
                }
            }
        };

        pending.await
    }

    /// Fresh cached title, if any
    pub fn get(&self, text: &str) -> Option<String> {
        let key = ContentHash::new(text);
        let state = self.state.lock();
        let now = (self.clock)();
        state
            .entries
            .get(&key)
            .filter(|entry| self.is_fresh(entry, now))
            .map(|entry| entry.title.clone())
    }

    /// Forget the cached title for `text` so the next lookup recomputes
    pub fn invalidate(&self, text: &str) {
        self.state.lock().entries.remove(&ContentHash::new(text));
    }

    /// Drop every expired entry. Returns how many were removed.
    pub fn cleanup_expired(&self) -> usize {
        let now = (self.clock)();
        let mut state = self.state.lock();
        let before = state.entries.len();
        let ttl = self.ttl;
        state.entries.retain(|_, entry| now - entry.computed_at < ttl);
        before - state.entries.len()
    }

    pub fn len(&self) -> usize {
        self.state.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
