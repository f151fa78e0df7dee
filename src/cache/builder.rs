//! Cache Builder Module
//!
//! Construction-time configuration for [`TtlCache`]: global TTL, hit
//! behaviour, callbacks and the clock.

use std::hash::Hash;
use std::marker::PhantomData;
use std::sync::Arc;
use std::time::Duration;

use crate::cache::clock::{Clock, SystemClock};
use crate::cache::store::TtlCache;
use crate::error::Result;

// == Callback Types ==
/// Invoked with the key and value of a genuinely new item, or of an item the
/// reaper just evicted.
pub type ItemCallback<K, V> = Arc<dyn Fn(&K, &V) + Send + Sync>;

/// Consulted before the reaper evicts an expired item. Returning `false`
/// vetoes the eviction and grants the item one more TTL cycle.
pub type CheckExpirationCallback<K, V> = Arc<dyn Fn(&K, &V) -> bool + Send + Sync>;

// == Callbacks ==
/// Callback slots. Kept inside the cache mutex so setters never race the reaper.
pub(crate) struct Callbacks<K, V> {
    pub on_new_item: Option<ItemCallback<K, V>>,
    pub on_check_expire: Option<CheckExpirationCallback<K, V>>,
    pub on_expire: Option<ItemCallback<K, V>>,
}

impl<K, V> Default for Callbacks<K, V> {
    fn default() -> Self {
        Self {
            on_new_item: None,
            on_check_expire: None,
            on_expire: None,
        }
    }
}

// == Cache Options ==
/// Everything the store needs at construction.
pub(crate) struct CacheOptions<K, V> {
    pub global_ttl: Option<Duration>,
    pub skip_ttl_extension_on_hit: bool,
    pub callbacks: Callbacks<K, V>,
    pub start_reaper: bool,
}

impl<K, V> Default for CacheOptions<K, V> {
    fn default() -> Self {
        Self {
            global_ttl: None,
            skip_ttl_extension_on_hit: false,
            callbacks: Callbacks::default(),
            start_reaper: true,
        }
    }
}

// == Cache Builder ==
/// Builder for [`TtlCache`].
///
/// # Example
/// ```
/// use std::time::Duration;
/// use ttl_cache::TtlCache;
///
/// let cache = TtlCache::<String, u32>::builder()
///     .global_ttl(Duration::from_secs(30))
///     .on_expire(|key, value| println!("{key} expired with {value}"))
///     .build()
///     .unwrap();
///
/// cache.set("answer".to_string(), 42);
/// assert_eq!(cache.get(&"answer".to_string()), Some(42));
/// ```
pub struct CacheBuilder<K, V, C = SystemClock> {
    global_ttl: Option<Duration>,
    skip_ttl_extension_on_hit: bool,
    callbacks: Callbacks<K, V>,
    clock: C,
    start_reaper: bool,
    _marker: PhantomData<fn() -> (K, V)>,
}

impl<K, V> CacheBuilder<K, V, SystemClock> {
    pub fn new() -> Self {
        Self {
            global_ttl: None,
            skip_ttl_extension_on_hit: false,
            callbacks: Callbacks::default(),
            clock: SystemClock,
            start_reaper: true,
            _marker: PhantomData,
        }
    }
}

impl<K, V> Default for CacheBuilder<K, V, SystemClock> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V, C> CacheBuilder<K, V, C>
where
    K: Eq + Hash + Clone + Send + 'static,
    V: Clone + Send + 'static,
    C: Clock,
{
    /// Cache-wide TTL used by items stored with [`Ttl::Global`](crate::Ttl::Global).
    /// A zero duration disables it.
    pub fn global_ttl(mut self, ttl: Duration) -> Self {
        self.global_ttl = Some(ttl).filter(|ttl| !ttl.is_zero());
        self
    }

    /// When set, reads no longer push an item's deadline back.
    pub fn skip_ttl_extension_on_hit(mut self, skip: bool) -> Self {
        self.skip_ttl_extension_on_hit = skip;
        self
    }

    pub fn on_new_item<F>(mut self, callback: F) -> Self
    where
        F: Fn(&K, &V) + Send + Sync + 'static,
    {
        self.callbacks.on_new_item = Some(Arc::new(callback));
        self
    }

    /// Runs while the cache lock is held; it must not call back into the cache.
    pub fn on_check_expire<F>(mut self, callback: F) -> Self
    where
        F: Fn(&K, &V) -> bool + Send + Sync + 'static,
    {
        self.callbacks.on_check_expire = Some(Arc::new(callback));
        self
    }

    pub fn on_expire<F>(mut self, callback: F) -> Self
    where
        F: Fn(&K, &V) + Send + Sync + 'static,
    {
        self.callbacks.on_expire = Some(Arc::new(callback));
        self
    }

    /// Replaces the time source, typically with a [`MockClock`](crate::MockClock).
    pub fn clock<C2: Clock>(self, clock: C2) -> CacheBuilder<K, V, C2> {
        CacheBuilder {
            global_ttl: self.global_ttl,
            skip_ttl_extension_on_hit: self.skip_ttl_extension_on_hit,
            callbacks: self.callbacks,
            clock,
            start_reaper: self.start_reaper,
            _marker: PhantomData,
        }
    }

    /// Leaves expiration to explicit eviction passes so mock-clock tests do
    /// not race a background thread.
    #[cfg(test)]
    pub(crate) fn without_reaper(mut self) -> Self {
        self.start_reaper = false;
        self
    }

    /// Creates the cache and starts its reaper thread.
    pub fn build(self) -> Result<TtlCache<K, V, C>> {
        let options = CacheOptions {
            global_ttl: self.global_ttl,
            skip_ttl_extension_on_hit: self.skip_ttl_extension_on_hit,
            callbacks: self.callbacks,
            start_reaper: self.start_reaper,
        };
        TtlCache::from_options(options, self.clock)
    }
}
