//! LRU (Least Recently Used) ordered map
//!
//! Uses an index-linked list over a slab of nodes, so lookups, promotion,
//! insertion and eviction are all O(1).
//!
//! Unlike a self-evicting LRU cache this map has no capacity of its own.
//! `push_front` never evicts; `TileStore` pops from the cold end when it is
//! over budget, after it has inserted and touched under the same lock.
//! Reading and promoting are separate calls (`peek` and `touch`) so lookups
//! can run under a read lock. Freed slots are reused through a free list.

use std::collections::HashMap;
use std::hash::Hash;
use ahash::RandomState;

/// Node in the LRU doubly-linked list
struct Node<K, V> {
    key: K,
    value: V,
    prev: Option<usize>,
    next: Option<usize>,
}

/// Map whose entries are kept in recency order.
///
/// `head` is the most recently used entry, `tail` the least recently used.
pub struct LruMap<K, V> {
    map: HashMap<K, usize, RandomState>,
    nodes: Vec<Option<Node<K, V>>>,
    head: Option<usize>,
    tail: Option<usize>,
    free_list: Vec<usize>,
}

impl<K, V> LruMap<K, V>
where
    K: Hash + Eq + Clone,
{
    /// Create an empty map with room for `capacity` entries
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            map: HashMap::with_capacity_and_hasher(capacity, RandomState::new()),
            nodes: Vec::with_capacity(capacity),
            head: None,
            tail: None,
            free_list: Vec::new(),
        }
    }

    /// Get a value without changing recency
    pub fn peek(&self, key: &K) -> Option<&V> {
        let idx = *self.map.get(key)?;
        self.nodes[idx].as_ref().map(|node| &node.value)
    }

    /// Check if a key is present
    pub fn contains(&self, key: &K) -> bool {
        self.map.contains_key(key)
    }

    /// Promote a key to most recently used. Returns false if absent.
    pub fn touch(&mut self, key: &K) -> bool {
        match self.map.get(key) {
            Some(&idx) => {
                self.move_to_front(idx);
                true
            }
            None => false,
        }
    }

    /// Insert as most recently used.
    ///
    /// An existing value for the key is replaced and returned.
    pub fn push_front(&mut self, key: K, value: V) -> Option<V> {
        if let Some(&idx) = self.map.get(&key) {
            let old = self.nodes[idx]
                .as_mut()
                .map(|node| std::mem::replace(&mut node.value, value));
            self.move_to_front(idx);
            return old;
        }

        let idx = self.store_node(Node {
            key: key.clone(),
            value,
            prev: None,
            next: None,
        });
        self.link_front(idx);
        self.map.insert(key, idx);
        None
    }

    /// Remove a key
    pub fn remove(&mut self, key: &K) -> Option<V> {
        let idx = self.map.remove(key)?;
        self.release(idx).map(|node| node.value)
    }

    /// Remove and return the least recently used entry
    pub fn pop_lru(&mut self) -> Option<(K, V)> {
        let node = self.release(self.tail?)?;
        self.map.remove(&node.key);
        Some((node.key, node.value))
    }

    /// Keys from least to most recently used
    pub fn keys_lru(&self) -> Vec<K> {
        let mut keys = Vec::with_capacity(self.map.len());
        let mut cursor = self.tail;
        while let Some(idx) = cursor {
            match &self.nodes[idx] {
                Some(node) => {
                    keys.push(node.key.clone());
                    cursor = node.prev;
                }
                None => break,
            }
        }
        keys
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.map.len()
    }

    /// Check if the map is empty
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Remove all entries
    pub fn clear(&mut self) {
        self.map.clear();
        self.nodes.clear();
        self.free_list.clear();
        self.head = None;
        self.tail = None;
    }

    fn move_to_front(&mut self, idx: usize) {
        if self.head != Some(idx) {
            self.detach(idx);
            self.link_front(idx);
        }
    }

    /// Link a detached slot in as the new head
    fn link_front(&mut self, idx: usize) {
        let old_head = self.head.replace(idx);
        if let Some(node) = self.nodes[idx].as_mut() {
            node.prev = None;
            node.next = old_head;
        }
        match old_head.and_then(|h| self.nodes[h].as_mut()) {
            Some(head) => head.prev = Some(idx),
            None => self.tail = Some(idx),
        }
    }

    /// Splice a slot out of the list, leaving its neighbours joined
    fn detach(&mut self, idx: usize) {
        let Some((prev, next)) = self.nodes[idx].as_ref().map(|n| (n.prev, n.next)) else {
            return;
        };

        match prev.and_then(|p| self.nodes[p].as_mut()) {
            Some(before) => before.next = next,
            None => self.head = next,
        }
        match next.and_then(|n| self.nodes[n].as_mut()) {
            Some(after) => after.prev = prev,
            None => self.tail = prev,
        }
    }

    /// Place a node in a free slot, growing the slab if none is free
    fn store_node(&mut self, node: Node<K, V>) -> usize {
        match self.free_list.pop() {
            Some(idx) => {
                self.nodes[idx] = Some(node);
                idx
            }
            None => {
                self.nodes.push(Some(node));
                self.nodes.len() - 1
            }
        }
    }

    /// Detach a slot, return it to the free list and hand back its node
    fn release(&mut self, idx: usize) -> Option<Node<K, V>> {
        self.detach(idx);
        let node = self.nodes[idx].take()?;
        self.free_list.push(idx);
        Some(node)
    }
}
