//! Expiration Queue Module
//!
//! Indexed binary min-heap of items ordered by absolute deadline.
//!
//! The heap stores [`SlotId`]s only; deadlines are read from the arena and
//! every move writes the new position back into the item's `heap_index`, so
//! `remove` and `fix` locate an item in O(1) and re-sift in O(log n).

use std::time::Instant;

use crate::cache::arena::{SlotArena, SlotId};
use crate::cache::item::Item;

// == Expiration Queue ==
/// Min-heap over item deadlines.
///
/// Items without a deadline compare greater than any item with one, so they
/// sink to the bottom and never reach the root ahead of an expiring item.
#[derive(Debug, Default)]
pub struct ExpirationQueue {
    heap: Vec<SlotId>,
}

impl ExpirationQueue {
    // == Constructor ==
    pub fn new() -> Self {
        Self { heap: Vec::new() }
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    // == Peek ==
    /// Returns the item with the earliest deadline without removing it.
    pub fn peek(&self) -> Option<SlotId> {
        self.heap.first().copied()
    }

    // == Push ==
    /// Inserts an item that is not yet queued.
    pub fn push<K, V>(&mut self, id: SlotId, items: &mut SlotArena<Item<K, V>>) {
        let idx = self.heap.len();
        self.heap.push(id);
        set_index(items, id, Some(idx));
        self.sift_up(idx, items);
    }

    // == Pop ==
    /// Removes and returns the root.
    pub fn pop<K, V>(&mut self, items: &mut SlotArena<Item<K, V>>) -> Option<SlotId> {
        if self.heap.is_empty() {
            return None;
        }
        let last = self.heap.len() - 1;
        self.swap(0, last, items);
        let id = self.heap.pop()?;
        set_index(items, id, None);
        if !self.heap.is_empty() {
            self.sift_down(0, items);
        }
        Some(id)
    }

    // == Remove ==
    /// Removes an arbitrary item using its recorded `heap_index`.
    ///
    /// Returns false if the item was not queued.
    pub fn remove<K, V>(&mut self, id: SlotId, items: &mut SlotArena<Item<K, V>>) -> bool {
        let Some(idx) = items.get(id).and_then(|item| item.heap_index) else {
            return false;
        };
        debug_assert_eq!(self.heap.get(idx), Some(&id), "stale heap_index");

        let last = self.heap.len() - 1;
        if idx != last {
            self.swap(idx, last, items);
        }
        self.heap.pop();
        set_index(items, id, None);
        if idx < self.heap.len() {
            self.fix_at(idx, items);
        }
        true
    }

    // == Fix ==
    /// Restores heap order after the item's deadline changed in place.
    pub fn fix<K, V>(&mut self, id: SlotId, items: &mut SlotArena<Item<K, V>>) {
        if let Some(idx) = items.get(id).and_then(|item| item.heap_index) {
            self.fix_at(idx, items);
        }
    }

    // == Clear ==
    /// Drops every entry. Callers clear the arena alongside, so indices are
    /// not rewritten.
    pub fn clear(&mut self) {
        self.heap.clear();
    }

    /// Queued ids in backing-array order.
    pub fn iter(&self) -> impl Iterator<Item = SlotId> + '_ {
        self.heap.iter().copied()
    }

    fn fix_at<K, V>(&mut self, idx: usize, items: &mut SlotArena<Item<K, V>>) {
        if !self.sift_up(idx, items) {
            self.sift_down(idx, items);
        }
    }

    /// Moves the entry at `idx` toward the root. Returns whether it moved.
    fn sift_up<K, V>(&mut self, mut idx: usize, items: &mut SlotArena<Item<K, V>>) -> bool {
        let start = idx;
        while idx > 0 {
            let parent = (idx - 1) / 2;
            if !self.less(idx, parent, items) {
                break;
            }
            self.swap(idx, parent, items);
            idx = parent;
        }
        idx != start
    }

    fn sift_down<K, V>(&mut self, mut idx: usize, items: &mut SlotArena<Item<K, V>>) {
        let len = self.heap.len();
        loop {
            let left = 2 * idx + 1;
            if left >= len {
                break;
            }
            let right = left + 1;
            let mut smallest = left;
            if right < len && self.less(right, left, items) {
                smallest = right;
            }
            if !self.less(smallest, idx, items) {
                break;
            }
            self.swap(idx, smallest, items);
            idx = smallest;
        }
    }

    fn less<K, V>(&self, i: usize, j: usize, items: &SlotArena<Item<K, V>>) -> bool {
        match (deadline(items, self.heap[i]), deadline(items, self.heap[j])) {
            (Some(a), Some(b)) => a < b,
            (Some(_), None) => true,
            (None, _) => false,
        }
    }

    fn swap<K, V>(&mut self, i: usize, j: usize, items: &mut SlotArena<Item<K, V>>) {
        self.heap.swap(i, j);
        set_index(items, self.heap[i], Some(i));
        set_index(items, self.heap[j], Some(j));
    }
}

fn deadline<K, V>(items: &SlotArena<Item<K, V>>, id: SlotId) -> Option<Instant> {
    items.get(id).and_then(|item| item.expire_at)
}

fn set_index<K, V>(items: &mut SlotArena<Item<K, V>>, id: SlotId, idx: Option<usize>) {
    if let Some(item) = items.get_mut(id) {
        item.heap_index = idx;
    }
}
