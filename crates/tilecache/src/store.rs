//! TileStore: bounded tile mapping with LRU eviction
//!
//! The coordinate map and the recency list are one `LruMap` behind a single
//! `RwLock`, so every key in the map is also in the recency order and the
//! two can never be observed out of step. `lookup` takes the read lock; all
//! mutations take the write lock.

use std::sync::Arc;
use parking_lot::RwLock;
use tracing::debug;

use crate::lru::LruMap;
use crate::tile::{Coord, Ticket, Tile};

/// Upper bound on slots reserved up front; the map grows on demand past it
const INITIAL_SLOTS: usize = 4096;

/// Outcome of `TileStore::insert_placeholder`
#[derive(Debug)]
pub struct Inserted<T> {
    /// The resident tile for the coordinate (new or pre-existing)
    pub tile: Arc<Tile<T>>,
    /// Present only if this call created the placeholder
    pub ticket: Option<Ticket>,
    /// Entries evicted to make room
    pub evicted: usize,
}

impl<T> Inserted<T> {
    /// Whether this call won the insertion race
    pub fn won(&self) -> bool {
        self.ticket.is_some()
    }
}

/// Outcome of `TileStore::complete`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completion {
    /// Content was installed and the tile is now ready
    Installed,
    /// The coordinate is no longer resident; content discarded
    Evicted,
    /// The resident tile belongs to another epoch or is already ready; content discarded
    Stale,
}

struct StoreInner<T> {
    tiles: LruMap<Coord, Arc<Tile<T>>>,
    next_epoch: u64,
}

/// Thread-safe keyed storage of tiles with bounded capacity
pub struct TileStore<T> {
    inner: RwLock<StoreInner<T>>,
    capacity: usize,
}

impl<T> TileStore<T> {
    /// Create a store holding at most `capacity` tiles
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "Capacity must be greater than 0");

        Self {
            inner: RwLock::new(StoreInner {
                tiles: LruMap::with_capacity(capacity.saturating_add(1).min(INITIAL_SLOTS)),
                next_epoch: 0,
            }),
            capacity,
        }
    }

    /// Find a tile without changing recency
    pub fn lookup(&self, coord: Coord) -> Option<Arc<Tile<T>>> {
        self.inner.read().tiles.peek(&coord).cloned()
    }

    /// Promote a tile to most recently used. No-op if absent.
    pub fn touch(&self, coord: Coord) -> bool {
        self.inner.write().tiles.touch(&coord)
    }

    /// Insert a placeholder for `coord` unless one is already resident.
    ///
    /// Check and insert happen under one write lock, so among racing callers
    /// exactly one receives a `Ticket`. An existing entry is returned as is,
    /// without promotion.
    pub fn insert_placeholder(&self, coord: Coord) -> Inserted<T> {
        let mut inner = self.inner.write();

        if let Some(tile) = inner.tiles.peek(&coord) {
            return Inserted {
                tile: Arc::clone(tile),
                ticket: None,
                evicted: 0,
            };
        }

        let epoch = inner.next_epoch;
        inner.next_epoch += 1;

        let tile = Arc::new(Tile::placeholder(coord, epoch));
        inner.tiles.push_front(coord, Arc::clone(&tile));
        let evicted = Self::evict_locked(&mut inner, self.capacity);

        debug!(%coord, epoch, evicted, "inserted placeholder");

        Inserted {
            tile,
            ticket: Some(Ticket { coord, epoch }),
            evicted,
        }
    }

    /// Install generated content for the placeholder named by `ticket`.
    ///
    /// Never re-inserts an evicted coordinate: if the tile is gone or was
    /// replaced by a newer placeholder, the content is dropped.
    pub fn complete(&self, ticket: Ticket, content: T) -> Completion {
        let inner = self.inner.write();

        let tile = match inner.tiles.peek(&ticket.coord) {
            Some(tile) => tile,
            None => {
                debug!(coord = %ticket.coord, epoch = ticket.epoch, "discarding completion for evicted tile");
                return Completion::Evicted;
            }
        };

        if tile.epoch() != ticket.epoch {
            debug!(coord = %ticket.coord, epoch = ticket.epoch, resident = tile.epoch(), "discarding stale completion");
            return Completion::Stale;
        }

        match tile.fill(content) {
            Ok(()) => Completion::Installed,
            Err(_) => Completion::Stale,
        }
    }

    /// Evict least recently used tiles until the store is within capacity.
    ///
    /// Returns the number of tiles evicted.
    pub fn evict_if_over_capacity(&self) -> usize {
        let mut inner = self.inner.write();
        Self::evict_locked(&mut inner, self.capacity)
    }

    /// Remove a tile in any state
    pub fn remove(&self, coord: Coord) -> Option<Arc<Tile<T>>> {
        self.inner.write().tiles.remove(&coord)
    }

    /// Undo a placeholder insertion whose generation request never reached a worker.
    ///
    /// Only removes the entry if it is still the ticket's placeholder.
    pub fn rollback(&self, ticket: Ticket) -> bool {
        let mut inner = self.inner.write();

        let matches = inner
            .tiles
            .peek(&ticket.coord)
            .map(|tile| tile.epoch() == ticket.epoch && !tile.is_ready())
            .unwrap_or(false);

        if matches {
            inner.tiles.remove(&ticket.coord);
        }
        matches
    }

    /// Check if a coordinate is resident
    pub fn contains(&self, coord: Coord) -> bool {
        self.inner.read().tiles.contains(&coord)
    }

    /// Resident coordinates from least to most recently used
    pub fn resident(&self) -> Vec<Coord> {
        self.inner.read().tiles.keys_lru()
    }

    /// Get the number of resident tiles
    pub fn len(&self) -> usize {
        self.inner.read().tiles.len()
    }

    /// Check if the store is empty
    pub fn is_empty(&self) -> bool {
        self.inner.read().tiles.is_empty()
    }

    /// Get store capacity
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Drop every tile
    pub fn clear(&self) {
        self.inner.write().tiles.clear();
    }

    fn evict_locked(inner: &mut StoreInner<T>, capacity: usize) -> usize {
        let mut evicted = 0;
        while inner.tiles.len() > capacity {
            match inner.tiles.pop_lru() {
                Some((coord, _)) => {
                    debug!(%coord, "evicted tile");
                    evicted += 1;
                }
                None => break,
            }
        }
        evicted
    }
}
