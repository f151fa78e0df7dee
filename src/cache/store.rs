//! Cache Store Module
//!
//! Main cache engine: a key map and an expiration heap guarded by one mutex,
//! plus the public [`TtlCache`] API on top of it.

use std::collections::HashMap;
use std::hash::Hash;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tokio::sync::Notify;
use tracing::{debug, error, info};

use crate::cache::arena::{SlotArena, SlotId};
use crate::cache::builder::{
    CacheBuilder, CacheOptions, Callbacks, CheckExpirationCallback, ItemCallback,
};
use crate::cache::clock::{Clock, SystemClock};
use crate::cache::item::{Item, Ttl};
use crate::cache::queue::ExpirationQueue;
use crate::cache::stats::Metrics;
use crate::cache::{IDLE_POLL, MIN_SLEEP};
use crate::error::Result;
use crate::tasks::{spawn_reaper, ReaperHandle};

// == Store ==
/// Map and heap state. Every method expects the caller to hold the lock.
pub(crate) struct Store<K, V> {
    index: HashMap<K, SlotId>,
    items: SlotArena<Item<K, V>>,
    queue: ExpirationQueue,
    global_ttl: Option<Duration>,
    skip_ttl_extension_on_hit: bool,
    callbacks: Callbacks<K, V>,
    metrics: Metrics,
    /// Instant the reaper is currently sleeping until
    next_wake: Option<Instant>,
    closed: bool,
}

/// Result of an upsert.
struct Upsert {
    is_new: bool,
    wake: bool,
}

impl<K, V> Store<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    fn new(options: CacheOptions<K, V>) -> Self {
        Self {
            index: HashMap::new(),
            items: SlotArena::new(),
            queue: ExpirationQueue::new(),
            global_ttl: options.global_ttl,
            skip_ttl_extension_on_hit: options.skip_ttl_extension_on_hit,
            callbacks: options.callbacks,
            metrics: Metrics::new(),
            next_wake: None,
            closed: false,
        }
    }

    // == Upsert ==
    /// Inserts or overwrites `key`, resetting its deadline.
    fn upsert(&mut self, key: K, value: V, ttl: Ttl, now: Instant) -> Upsert {
        let (id, is_new) = match self.index.get(&key) {
            Some(&id) => {
                if let Some(item) = self.items.get_mut(id) {
                    item.value = value;
                    item.ttl = ttl;
                }
                (id, false)
            }
            None => {
                let id = self.items.insert(Item::new(key.clone(), value, ttl));
                self.index.insert(key, id);
                self.metrics.record_insert();
                (id, true)
            }
        };
        let wake = self.touch_slot(id, now);
        Upsert { is_new, wake }
    }

    // == Lookup ==
    /// Returns a live item's slot, counting the lookup as a hit or miss.
    fn lookup(&mut self, key: &K, now: Instant) -> Option<SlotId> {
        let live = self
            .index
            .get(key)
            .copied()
            .filter(|&id| self.items.get(id).is_some_and(|item| !item.expired(now)));
        match live {
            Some(_) => self.metrics.record_hit(),
            None => self.metrics.record_miss(),
        }
        live
    }

    /// Touches the item on a read unless hits are configured not to extend.
    /// Returns whether the reaper must be woken.
    fn touch_on_hit(&mut self, id: SlotId, now: Instant) -> bool {
        if self.skip_ttl_extension_on_hit {
            return false;
        }
        self.touch_slot(id, now)
    }

    /// Recomputes the deadline and moves the item within, into, or out of the
    /// queue. Returns true if the new deadline precedes the reaper's wake-up.
    fn touch_slot(&mut self, id: SlotId, now: Instant) -> bool {
        let global = self.global_ttl;
        let Some(item) = self.items.get_mut(id) else {
            return false;
        };
        item.touch(now, global);
        let deadline = item.expire_at;
        let queued = item.heap_index.is_some();

        match (deadline.is_some(), queued) {
            (true, true) => self.queue.fix(id, &mut self.items),
            (true, false) => self.queue.push(id, &mut self.items),
            (false, true) => {
                self.queue.remove(id, &mut self.items);
            }
            (false, false) => {}
        }

        deadline.is_some_and(|at| self.next_wake.map_or(true, |wake| at < wake))
    }

    // == Remove ==
    fn remove(&mut self, key: &K) -> bool {
        let Some(id) = self.index.remove(key) else {
            return false;
        };
        self.queue.remove(id, &mut self.items);
        self.items.remove(id);
        true
    }

    // == Purge ==
    fn purge(&mut self) {
        self.index.clear();
        self.items.clear();
        self.queue.clear();
    }

    // == Next Sleep ==
    /// Computes how long the reaper may sleep and records the wake instant.
    /// The reaper never sleeps longer than [`IDLE_POLL`].
    pub(crate) fn next_sleep(&mut self, now: Instant) -> Duration {
        let root = self
            .queue
            .peek()
            .and_then(|id| self.items.get(id))
            .and_then(|item| item.expire_at);

        let sleep = match root {
            Some(deadline) => {
                let until = deadline.saturating_duration_since(now);
                match self.global_ttl {
                    Some(global) if global < until => global,
                    _ => until,
                }
                .max(MIN_SLEEP)
            }
            None => self.global_ttl.unwrap_or(IDLE_POLL),
        }
        .min(IDLE_POLL);
        self.next_wake = now.checked_add(sleep);
        sleep
    }

    // == Evict Expired ==
    /// Removes every expired item from the top of the heap, honouring the
    /// check-expiration veto. Returns the evicted pairs.
    pub(crate) fn evict_expired(&mut self, now: Instant) -> Vec<(K, V)> {
        let checker = self.callbacks.on_check_expire.clone();
        let mut evicted = Vec::new();

        while let Some(id) = self.queue.peek() {
            let Some(item) = self.items.get(id) else {
                break;
            };
            if !item.expired(now) {
                break;
            }

            let allow = checker
                .as_ref()
                .map_or(true, |check| allow_eviction(check, &item.key, &item.value));
            if !allow {
                // Vetoed: grant another cycle and move on to the next root
                self.touch_slot(id, now);
                continue;
            }

            self.queue.pop(&mut self.items);
            if let Some(item) = self.items.remove(id) {
                self.index.remove(&item.key);
                self.metrics.record_eviction();
                evicted.push((item.key, item.value));
            }
        }
        evicted
    }

    /// Asserts that map, arena and heap agree.
    #[cfg(test)]
    pub(crate) fn check_invariants(&self) {
        assert_eq!(self.index.len(), self.items.len(), "index/arena size mismatch");

        let mut with_deadline = 0;
        for (key, &id) in &self.index {
            let item = self.items.get(id).expect("index points at empty slot");
            assert!(item.key == *key, "slot holds a different key");
            assert_eq!(
                item.expire_at.is_some(),
                item.heap_index.is_some(),
                "an item is queued exactly when it has a deadline"
            );
            if item.expire_at.is_some() {
                with_deadline += 1;
            }
        }
        assert_eq!(self.queue.len(), with_deadline, "queue size mismatch");

        let queued: Vec<SlotId> = self.queue.iter().collect();
        for (pos, &id) in queued.iter().enumerate() {
            let item = self.items.get(id).expect("queue references a removed item");
            assert_eq!(item.heap_index, Some(pos), "stale heap_index");
            assert!(self.index.get(&item.key) == Some(&id), "queued item not in map");
            if pos > 0 {
                let parent = self.items.get(queued[(pos - 1) / 2]).expect("parent slot");
                assert!(parent.expire_at <= item.expire_at, "heap order violated");
            }
        }
    }
}

fn allow_eviction<K, V>(check: &CheckExpirationCallback<K, V>, key: &K, value: &V) -> bool {
    panic::catch_unwind(AssertUnwindSafe(|| check(key, value))).unwrap_or_else(|_| {
        error!("check-expiration callback panicked; evicting item");
        true
    })
}

// == Shared ==
/// State shared between the cache handle and its reaper thread.
pub(crate) struct Shared<K, V, C> {
    pub store: Mutex<Store<K, V>>,
    /// Coalescing wake-up for the reaper
    pub wake: Notify,
    pub clock: C,
}

impl<K, V, C> Shared<K, V, C>
where
    K: Eq + Hash + Clone,
    V: Clone,
    C: Clock,
{
    pub(crate) fn next_sleep(&self) -> Duration {
        let now = self.clock.now();
        self.store.lock().next_sleep(now)
    }

    /// Runs one eviction batch and fires expiration callbacks after the lock
    /// is released. Returns the number of evicted items.
    pub(crate) fn evict_expired(&self) -> usize {
        let (evicted, on_expire) = {
            let mut store = self.store.lock();
            let now = self.clock.now();
            (store.evict_expired(now), store.callbacks.on_expire.clone())
        };

        if let Some(on_expire) = on_expire {
            for (key, value) in &evicted {
                if panic::catch_unwind(AssertUnwindSafe(|| on_expire(key, value))).is_err() {
                    error!("expiration callback panicked");
                }
            }
        }
        evicted.len()
    }
}

// == TTL Cache ==
/// Generic thread-safe cache whose items expire after a time-to-live.
///
/// A background reaper thread sleeps until the earliest deadline and evicts
/// expired items. Reads also check expiration, so an item is invisible as soon
/// as its deadline passes even if the reaper has not run yet.
///
/// Dropping the cache closes it.
///
/// # Example
/// ```
/// use std::time::Duration;
/// use ttl_cache::{Ttl, TtlCache};
///
/// let cache: TtlCache<&str, i32> = TtlCache::new().unwrap();
/// cache.set_with_ttl("a", 1, Ttl::After(Duration::from_secs(60)));
/// cache.set_with_ttl("pinned", 2, Ttl::Never);
///
/// assert_eq!(cache.get(&"a"), Some(1));
/// assert_eq!(cache.count(), 2);
/// assert!(cache.remove(&"a"));
/// cache.close();
/// ```
pub struct TtlCache<K, V, C = SystemClock>
where
    K: Eq + Hash + Clone + Send + 'static,
    V: Clone + Send + 'static,
    C: Clock,
{
    shared: Arc<Shared<K, V, C>>,
    reaper: Mutex<Option<ReaperHandle>>,
}

impl<K, V> TtlCache<K, V, SystemClock>
where
    K: Eq + Hash + Clone + Send + 'static,
    V: Clone + Send + 'static,
{
    // == Constructor ==
    /// Creates a cache without a global TTL and starts its reaper.
    pub fn new() -> Result<Self> {
        CacheBuilder::new().build()
    }

    pub fn builder() -> CacheBuilder<K, V, SystemClock> {
        CacheBuilder::new()
    }
}

impl<K, V, C> TtlCache<K, V, C>
where
    K: Eq + Hash + Clone + Send + 'static,
    V: Clone + Send + 'static,
    C: Clock,
{
    pub(crate) fn from_options(options: CacheOptions<K, V>, clock: C) -> Result<Self> {
        let start_reaper = options.start_reaper;
        let shared = Arc::new(Shared {
            store: Mutex::new(Store::new(options)),
            wake: Notify::new(),
            clock,
        });
        let reaper = if start_reaper {
            Some(spawn_reaper(Arc::clone(&shared))?)
        } else {
            None
        };
        debug!("TTL cache created");

        Ok(Self {
            shared,
            reaper: Mutex::new(reaper),
        })
    }

    // == Set ==
    /// Stores `value` under `key` using the cache-wide TTL.
    pub fn set(&self, key: K, value: V) {
        self.set_with_ttl(key, value, Ttl::Global);
    }

    /// Stores `value` under `key` with an individual TTL.
    ///
    /// Overwriting an existing key replaces its value and TTL and restarts its
    /// lifetime. The new-item callback fires only for keys that were absent.
    pub fn set_with_ttl(&self, key: K, value: V, ttl: impl Into<Ttl>) {
        let ttl = ttl.into();
        let now = self.shared.clock.now();

        let announce = {
            let mut store = self.shared.store.lock();
            if store.closed {
                debug!("set on a closed cache ignored");
                return;
            }
            let pending = store
                .callbacks
                .on_new_item
                .clone()
                .map(|callback| (callback, key.clone(), value.clone()));

            let outcome = store.upsert(key, value, ttl, now);
            if outcome.wake {
                self.shared.wake.notify_one();
            }
            pending.filter(|_| outcome.is_new)
        };

        if let Some((callback, key, value)) = announce {
            callback(&key, &value);
        }
    }

    // == Get ==
    /// Returns a clone of the value if the key is present and not expired.
    ///
    /// Unless [`skip_ttl_extension_on_hit`](Self::skip_ttl_extension_on_hit)
    /// is enabled, a hit restarts the item's lifetime.
    pub fn get(&self, key: &K) -> Option<V> {
        self.get_with_ttl(key).map(|(value, _)| value)
    }

    /// Like [`get`](Self::get), also returning the remaining lifetime.
    /// `None` means the item never expires.
    pub fn get_with_ttl(&self, key: &K) -> Option<(V, Option<Duration>)> {
        let now = self.shared.clock.now();
        let mut store = self.shared.store.lock();
        if store.closed {
            return None;
        }
        let id = store.lookup(key, now)?;
        if store.touch_on_hit(id, now) {
            self.shared.wake.notify_one();
        }
        let item = store.items.get(id)?;
        Some((item.value.clone(), item.remaining(now)))
    }

    // == Touch ==
    /// Restarts the lifetime of a live item without reading it.
    pub fn touch(&self, key: &K) -> bool {
        let now = self.shared.clock.now();
        let mut store = self.shared.store.lock();
        let Some(&id) = store.index.get(key) else {
            return false;
        };
        if store.items.get(id).map_or(true, |item| item.expired(now)) {
            return false;
        }
        if store.touch_slot(id, now) {
            self.shared.wake.notify_one();
        }
        true
    }

    // == Remove ==
    /// Deletes `key`, returning whether it was present. The expiration
    /// callback is not invoked.
    pub fn remove(&self, key: &K) -> bool {
        self.shared.store.lock().remove(key)
    }

    // == Count ==
    /// Number of stored items, including expired ones the reaper has not
    /// collected yet.
    pub fn count(&self) -> usize {
        self.shared.store.lock().index.len()
    }

    /// Keys of all items that are not expired.
    pub fn keys(&self) -> Vec<K> {
        let now = self.shared.clock.now();
        let store = self.shared.store.lock();
        store
            .index
            .iter()
            .filter(|&(_, &id)| store.items.get(id).is_some_and(|item| !item.expired(now)))
            .map(|(key, _)| key.clone())
            .collect()
    }

    pub fn metrics(&self) -> Metrics {
        self.shared.store.lock().metrics
    }

    // == Configuration ==
    /// Changes the cache-wide TTL. A zero duration disables it.
    ///
    /// Items relying on the global TTL pick up the new value on their next
    /// touch or reaper check.
    pub fn set_ttl(&self, ttl: Duration) {
        self.shared.store.lock().global_ttl = Some(ttl).filter(|ttl| !ttl.is_zero());
        self.shared.wake.notify_one();
    }

    pub fn skip_ttl_extension_on_hit(&self, skip: bool) {
        self.shared.store.lock().skip_ttl_extension_on_hit = skip;
    }

    /// Called on the reaper thread for every evicted item, outside the lock.
    pub fn set_expiration_callback<F>(&self, callback: F)
    where
        F: Fn(&K, &V) + Send + Sync + 'static,
    {
        let callback: ItemCallback<K, V> = Arc::new(callback);
        self.shared.store.lock().callbacks.on_expire = Some(callback);
    }

    /// Called under the cache lock before evicting an expired item; it must
    /// not call back into the cache. Return `false` to keep the item for one
    /// more TTL cycle.
    pub fn set_check_expiration_callback<F>(&self, callback: F)
    where
        F: Fn(&K, &V) -> bool + Send + Sync + 'static,
    {
        let callback: CheckExpirationCallback<K, V> = Arc::new(callback);
        self.shared.store.lock().callbacks.on_check_expire = Some(callback);
    }

    /// Called on the inserting thread, outside the lock, for new keys only.
    pub fn set_new_item_callback<F>(&self, callback: F)
    where
        F: Fn(&K, &V) + Send + Sync + 'static,
    {
        let callback: ItemCallback<K, V> = Arc::new(callback);
        self.shared.store.lock().callbacks.on_new_item = Some(callback);
    }

    // == Purge ==
    /// Drops every item without invoking callbacks.
    pub fn purge(&self) {
        self.shared.store.lock().purge();
    }

    // == Close ==
    /// Stops the reaper, waits for it to exit, then purges the cache.
    ///
    /// Later calls are no-ops.
    pub fn close(&self) {
        {
            let mut store = self.shared.store.lock();
            if store.closed {
                return;
            }
            store.closed = true;
        }

        let reaper = self.reaper.lock().take();
        if let Some(reaper) = reaper {
            reaper.stop();
        }
        self.shared.store.lock().purge();
        info!("TTL cache closed");
    }

    pub fn is_closed(&self) -> bool {
        self.shared.store.lock().closed
    }

    #[cfg(test)]
    pub(crate) fn check_invariants(&self) {
        self.shared.store.lock().check_invariants();
    }

    /// Runs one reaper pass on the calling thread.
    #[cfg(test)]
    pub(crate) fn run_eviction(&self) -> usize {
        self.shared.evict_expired()
    }

    #[cfg(test)]
    pub(crate) fn value_at(&self, key: &K) -> Option<V> {
        let store = self.shared.store.lock();
        let id = *store.index.get(key)?;
        store.items.get(id).map(|item| item.value.clone())
    }
}

impl<K, V, C> Drop for TtlCache<K, V, C>
where
    K: Eq + Hash + Clone + Send + 'static,
    V: Clone + Send + 'static,
    C: Clock,
{
    fn drop(&mut self) {
        self.close();
    }
}
