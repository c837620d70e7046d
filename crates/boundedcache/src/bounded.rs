//! Bounded LRU cache
//!
//! Nodes live in a slot vector and link to each other by index, so promotion
//! and eviction are O(1) without aliased references. Each node carries its own
//! key, which is what lets eviction find the forward-index entry to drop.

use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;
use ahash::RandomState;

use crate::error::{Error, Result};
use crate::stats::CacheStats;

type Weigher<V> = Box<dyn Fn(&V) -> usize + Send + Sync>;
type Releaser<K, V> = Box<dyn FnMut(&K, V) + Send>;

/// Node in the recency list
struct Node<K, V> {
    key: K,
    value: V,
    weight: usize,
    prev: Option<usize>,
    next: Option<usize>,
}

/// LRU cache bounded by entry count and, optionally, by total value weight
///
/// The cache owns every value it holds. Values leaving through eviction,
/// replacement or [`purge`](BoundedCache::purge) are handed to the release
/// hook (when one is configured) exactly once.
pub struct BoundedCache<K, V> {
    map: HashMap<K, usize, RandomState>,
    nodes: Vec<Option<Node<K, V>>>,
    head: Option<usize>,
    tail: Option<usize>,
    free_list: Vec<usize>,
    entry_limit: usize,
    size_limit: usize,
    total_weight: usize,
    weigher: Option<Weigher<V>>,
    releaser: Option<Releaser<K, V>>,
    stats: CacheStats,
}

/// Builder for a [`BoundedCache`] with a weight budget or release hook
pub struct CacheBuilder<K, V> {
    entry_limit: usize,
    size_limit: usize,
    weigher: Option<Weigher<V>>,
    releaser: Option<Releaser<K, V>>,
}

impl<K, V> CacheBuilder<K, V>
where
    K: Hash + Eq + Clone,
{
    /// Maximum summed weight of all values (0 means unlimited)
    pub fn size_limit(mut self, size_limit: usize) -> Self {
        self.size_limit = size_limit;
        self
    }

    /// Function giving the weight of a value; must be stable while cached
    pub fn weigher<F>(mut self, weigher: F) -> Self
    where
        F: Fn(&V) -> usize + Send + Sync + 'static,
    {
        self.weigher = Some(Box::new(weigher));
        self
    }

    /// Hook receiving each value the cache lets go of
    pub fn on_release<F>(mut self, releaser: F) -> Self
    where
        F: FnMut(&K, V) + Send + 'static,
    {
        self.releaser = Some(Box::new(releaser));
        self
    }

    /// Validate the configuration and create the cache
    ///
    /// # Returns
    /// * `Err(Error::InvalidConfiguration)` if the entry limit is zero, or a
    ///   size limit was given without a weigher
    pub fn build(self) -> Result<BoundedCache<K, V>> {
        if self.entry_limit == 0 {
            return Err(Error::InvalidConfiguration(
                "entry limit must be greater than 0".to_string(),
            ));
        }
        if self.size_limit > 0 && self.weigher.is_none() {
            return Err(Error::InvalidConfiguration(format!(
                "size limit {} requires a weigher",
                self.size_limit
            )));
        }

        Ok(BoundedCache::from_builder(self))
    }
}

impl<K, V> BoundedCache<K, V>
where
    K: Hash + Eq + Clone,
{
    /// Create a cache bounded only by entry count
    pub fn new(entry_limit: usize) -> Self {
        assert!(entry_limit > 0, "Entry limit must be greater than 0");
        Self::from_builder(Self::builder(entry_limit))
    }

    /// Start configuring a cache with the given entry limit
    pub fn builder(entry_limit: usize) -> CacheBuilder<K, V> {
        CacheBuilder {
            entry_limit,
            size_limit: 0,
            weigher: None,
            releaser: None,
        }
    }

    /// Get a value and mark it most recently used
    pub fn get(&mut self, key: &K) -> Option<&V> {
        match self.map.get(key).copied() {
            Some(idx) => {
                self.stats.record_hit();
                self.move_to_front(idx);
                self.nodes[idx].as_ref().map(|node| &node.value)
            }
            None => {
                self.stats.record_miss();
                None
            }
        }
    }

    /// Get a value without touching recency or statistics
    pub fn peek(&self, key: &K) -> Option<&V> {
        let idx = *self.map.get(key)?;
        self.nodes[idx].as_ref().map(|node| &node.value)
    }

    /// Check whether a key is cached
    pub fn contains(&self, key: &K) -> bool {
        self.map.contains_key(key)
    }

    /// Insert or replace a value, then evict until the bounds hold
    ///
    /// A replaced value is released before the new one takes its place. The
    /// most recently set entry is never evicted by its own insert, so a single
    /// value heavier than the whole budget stays cached on its own.
    pub fn set(&mut self, key: K, value: V) {
        let weight = self.weigh(&value);

        if let Some(&idx) = self.map.get(&key) {
            let replaced = match &mut self.nodes[idx] {
                Some(node) => {
                    let old_weight = std::mem::replace(&mut node.weight, weight);
                    self.total_weight = self.total_weight + weight - old_weight;
                    Some(std::mem::replace(&mut node.value, value))
                }
                None => None,
            };
            if let Some(old) = replaced {
                self.release(&key, old);
            }
            self.move_to_front(idx);
        } else {
            let idx = self.alloc_node();
            self.nodes[idx] = Some(Node {
                key: key.clone(),
                value,
                weight,
                prev: None,
                next: self.head,
            });

            if let Some(head_idx) = self.head {
                if let Some(head) = &mut self.nodes[head_idx] {
                    head.prev = Some(idx);
                }
            }

            self.head = Some(idx);
            if self.tail.is_none() {
                self.tail = Some(idx);
            }

            self.map.insert(key, idx);
            self.total_weight += weight;
            self.stats.record_insert();
        }

        while self.over_limit() {
            if !self.evict() {
                break;
            }
        }
    }

    /// Remove a key, handing its value back to the caller
    ///
    /// The release hook is not invoked: ownership moves to the caller.
    pub fn remove(&mut self, key: &K) -> Option<V> {
        let idx = self.map.remove(key)?;
        self.unlink(idx);
        self.free_node(idx);
        let node = self.nodes[idx].take()?;
        self.total_weight -= node.weight;
        Some(node.value)
    }

    /// Release every value and reset to empty
    pub fn purge(&mut self) {
        self.release_all();
        self.map.clear();
        self.free_list.clear();
        self.head = None;
        self.tail = None;
        self.total_weight = 0;
    }

    /// Get the current number of entries
    pub fn len(&self) -> usize {
        self.map.len()
    }

    /// Check if the cache is empty
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Maximum number of entries
    pub fn entry_limit(&self) -> usize {
        self.entry_limit
    }

    /// Maximum total weight (0 means unlimited)
    pub fn size_limit(&self) -> usize {
        self.size_limit
    }

    /// Summed weight of all cached values
    pub fn total_weight(&self) -> usize {
        self.total_weight
    }

    /// Hit/miss/insert/eviction counters
    pub fn stats(&self) -> &CacheStats {
        &self.stats
    }

    /// Iterate entries from most to least recently used
    pub fn iter(&self) -> Iter<'_, K, V> {
        Iter {
            nodes: &self.nodes,
            cursor: self.head,
            remaining: self.map.len(),
        }
    }

    fn weigh(&self, value: &V) -> usize {
        self.weigher.as_ref().map_or(0, |weigher| weigher(value))
    }

    fn over_limit(&self) -> bool {
        let len = self.map.len();
        len > self.entry_limit
            || (self.size_limit > 0 && len > 1 && self.total_weight > self.size_limit)
    }

    fn release(&mut self, key: &K, value: V) {
        if let Some(releaser) = self.releaser.as_mut() {
            releaser(key, value);
        }
    }

    fn move_to_front(&mut self, idx: usize) {
        if self.head == Some(idx) {
            return;
        }

        self.unlink(idx);

        if let Some(node) = &mut self.nodes[idx] {
            node.prev = None;
            node.next = self.head;
        }

        if let Some(head_idx) = self.head {
            if let Some(head) = &mut self.nodes[head_idx] {
                head.prev = Some(idx);
            }
        }

        self.head = Some(idx);
        if self.tail.is_none() {
            self.tail = Some(idx);
        }
    }

    fn evict(&mut self) -> bool {
        let Some(tail_idx) = self.tail else {
            return false;
        };

        self.unlink(tail_idx);
        let Some(node) = self.nodes[tail_idx].take() else {
            return false;
        };
        self.free_node(tail_idx);

        let Node { key, value, weight, .. } = node;
        self.map.remove(&key);
        self.total_weight -= weight;
        self.stats.record_eviction();
        self.release(&key, value);
        true
    }
}

impl<K, V> BoundedCache<K, V> {
    fn from_builder(builder: CacheBuilder<K, V>) -> Self {
        Self {
            map: HashMap::with_capacity_and_hasher(builder.entry_limit, RandomState::new()),
            nodes: Vec::with_capacity(builder.entry_limit),
            head: None,
            tail: None,
            free_list: Vec::new(),
            entry_limit: builder.entry_limit,
            size_limit: builder.size_limit,
            total_weight: 0,
            weigher: builder.weigher,
            releaser: builder.releaser,
            stats: CacheStats::new(),
        }
    }

    fn unlink(&mut self, idx: usize) {
        let (prev, next) = if let Some(node) = &self.nodes[idx] {
            (node.prev, node.next)
        } else {
            return;
        };

        match prev {
            Some(prev_idx) => {
                if let Some(prev_node) = &mut self.nodes[prev_idx] {
                    prev_node.next = next;
                }
            }
            None => {
                self.head = next;
            }
        }

        match next {
            Some(next_idx) => {
                if let Some(next_node) = &mut self.nodes[next_idx] {
                    next_node.prev = prev;
                }
            }
            None => {
                self.tail = prev;
            }
        }
    }

    fn alloc_node(&mut self) -> usize {
        if let Some(idx) = self.free_list.pop() {
            idx
        } else {
            let idx = self.nodes.len();
            self.nodes.push(None);
            idx
        }
    }

    fn free_node(&mut self, idx: usize) {
        self.free_list.push(idx);
    }

    fn release_all(&mut self) {
        let nodes = std::mem::take(&mut self.nodes);
        match self.releaser.as_mut() {
            Some(releaser) => {
                for node in nodes.into_iter().flatten() {
                    releaser(&node.key, node.value);
                }
            }
            None => drop(nodes),
        }
    }
}

impl<K, V> Drop for BoundedCache<K, V> {
    fn drop(&mut self) {
        self.release_all();
    }
}

impl<K, V> fmt::Debug for BoundedCache<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BoundedCache")
            .field("len", &self.map.len())
            .field("entry_limit", &self.entry_limit)
            .field("total_weight", &self.total_weight)
            .field("size_limit", &self.size_limit)
            .finish()
    }
}

/// Iterator over cache entries, most recently used first
pub struct Iter<'a, K, V> {
    nodes: &'a [Option<Node<K, V>>],
    cursor: Option<usize>,
    remaining: usize,
}

impl<'a, K, V> Iterator for Iter<'a, K, V> {
    type Item = (&'a K, &'a V);

    fn next(&mut self) -> Option<Self::Item> {
        let idx = self.cursor?;
        let node = self.nodes[idx].as_ref()?;
        self.cursor = node.next;
        self.remaining = self.remaining.saturating_sub(1);
        Some((&node.key, &node.value))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}
