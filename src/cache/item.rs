//! Cache Item Module
//!
//! Defines the record stored per key and its TTL bookkeeping.

use std::time::{Duration, Instant};

// == Ttl ==
/// Lifetime requested for an individual item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Ttl {
    /// Inherit the cache-wide TTL at the moment the item is touched.
    #[default]
    Global,
    /// Never expire automatically. The item can still be removed explicitly.
    Never,
    /// Expire after this long without a touch. A zero duration behaves like
    /// [`Ttl::Global`].
    After(Duration),
}

impl Ttl {
    /// Resolves the lifetime against the cache-wide TTL.
    ///
    /// Returns `None` when the item has no finite lifetime.
    pub fn effective(self, global: Option<Duration>) -> Option<Duration> {
        match self {
            Ttl::Never => None,
            Ttl::After(ttl) if !ttl.is_zero() => Some(ttl),
            Ttl::After(_) | Ttl::Global => global.filter(|ttl| !ttl.is_zero()),
        }
    }
}

impl From<Duration> for Ttl {
    fn from(ttl: Duration) -> Self {
        Ttl::After(ttl)
    }
}

// == Item ==
/// A single cache entry.
///
/// `heap_index` mirrors the item's position in the expiration queue and is
/// `None` while the item is not queued. Only the queue writes it.
#[derive(Debug, Clone)]
pub struct Item<K, V> {
    pub key: K,
    pub value: V,
    pub ttl: Ttl,
    /// Absolute deadline, `None` when the item has no finite lifetime
    pub expire_at: Option<Instant>,
    pub heap_index: Option<usize>,
}

impl<K, V> Item<K, V> {
    // == Constructor ==
    /// Creates an unqueued item with no deadline yet.
    pub fn new(key: K, value: V, ttl: Ttl) -> Self {
        Self {
            key,
            value,
            ttl,
            expire_at: None,
            heap_index: None,
        }
    }

    // == Touch ==
    /// Resets the deadline to `now + ttl`.
    ///
    /// An item without a finite effective TTL loses any previous deadline. A
    /// TTL too large to represent as an instant counts as no deadline.
    pub fn touch(&mut self, now: Instant, global: Option<Duration>) {
        self.expire_at = self
            .ttl
            .effective(global)
            .and_then(|ttl| now.checked_add(ttl));
    }

    // == Expired ==
    /// True once the deadline lies strictly before `now`.
    pub fn expired(&self, now: Instant) -> bool {
        self.expire_at.is_some_and(|deadline| deadline < now)
    }

    // == Remaining ==
    /// Time left before expiration, `None` if the item never expires.
    pub fn remaining(&self, now: Instant) -> Option<Duration> {
        self.expire_at
            .map(|deadline| deadline.saturating_duration_since(now))
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;

    const SECOND: Duration = Duration::from_secs(1);

    #[test]
    fn test_effective_ttl_resolution() {
        assert_eq!(Ttl::Never.effective(Some(SECOND)), None);
        assert_eq!(Ttl::Global.effective(Some(SECOND)), Some(SECOND));
        assert_eq!(Ttl::Global.effective(None), None);
        assert_eq!(Ttl::After(2 * SECOND).effective(Some(SECOND)), Some(2 * SECOND));
        assert_eq!(Ttl::After(Duration::ZERO).effective(Some(SECOND)), Some(SECOND));
        assert_eq!(Ttl::After(Duration::ZERO).effective(None), None);
        assert_eq!(Ttl::Global.effective(Some(Duration::ZERO)), None);
    }

    #[test]
    fn test_new_item_has_no_deadline() {
        let item = Item::new("k", 1, Ttl::After(SECOND));
        assert!(item.expire_at.is_none());
        assert!(item.heap_index.is_none());
        assert!(!item.expired(Instant::now()));
    }

    #[test]
    fn test_touch_sets_deadline() {
        let now = Instant::now();
        let mut item = Item::new("k", 1, Ttl::After(SECOND));

        item.touch(now, None);

        assert_eq!(item.expire_at, Some(now + SECOND));
        assert_eq!(item.remaining(now), Some(SECOND));
    }

    #[test]
    fn test_touch_without_finite_ttl_clears_deadline() {
        let now = Instant::now();
        let mut item = Item::new("k", 1, Ttl::Global);

        item.touch(now, Some(SECOND));
        assert!(item.expire_at.is_some());

        item.touch(now, None);
        assert!(item.expire_at.is_none());
        assert_eq!(item.remaining(now), None);
    }

    #[test]
    fn test_expiration_boundary() {
        let now = Instant::now();
        let mut item = Item::new("k", 1, Ttl::After(SECOND));
        item.touch(now, None);

        // Exactly at the deadline the item is still alive
        assert!(!item.expired(now + SECOND));
        assert!(item.expired(now + SECOND + Duration::from_nanos(1)));
    }

    #[test]
    fn test_unrepresentable_ttl_has_no_deadline() {
        let now = Instant::now();
        let mut item = Item::new("k", 1, Ttl::After(Duration::MAX));
        item.touch(now, None);
        assert!(item.expire_at.is_none());

        let mut item = Item::new("k", 1, Ttl::Global);
        item.touch(now, Some(Duration::MAX));
        assert!(item.expire_at.is_none());
        assert!(!item.expired(now + 1000 * SECOND));
    }

    #[test]
    fn test_never_expires() {
        let now = Instant::now();
        let mut item = Item::new("k", 1, Ttl::Never);
        item.touch(now, Some(SECOND));

        assert!(!item.expired(now + 1000 * SECOND));
    }
}
