//! TileCache: the access path over store, queue and workers

use std::sync::Arc;
use tracing::{debug, warn};

use crate::config::CacheConfig;
use crate::error::{Error, Result};
use crate::generator::Generator;
use crate::pool::WorkerPool;
use crate::queue::WorkQueue;
use crate::stats::CacheStats;
use crate::store::TileStore;
use crate::tile::{Coord, Ticket, Tile};

/// Bounded tile cache filled in the background by a worker pool.
///
/// `get_or_schedule` never waits for generation. It returns the resident
/// tile, or a fresh placeholder whose generation has just been queued; the
/// tile's readiness flag is the only signal that content is available.
pub struct TileCache<G: Generator> {
    store: Arc<TileStore<G::Output>>,
    stats: Arc<CacheStats>,
    queue: Option<WorkQueue>,
    pool: Option<WorkerPool>,
}

impl<G: Generator> TileCache<G> {
    /// Create a cache and start its workers
    pub fn new(generator: G, config: CacheConfig) -> Result<Self> {
        config.validate()?;

        let store = Arc::new(TileStore::new(config.capacity));
        let stats = Arc::new(CacheStats::new());
        let (queue, rx) = WorkQueue::bounded(config.queue_capacity, config.saturation);
        let pool = WorkerPool::spawn(
            config.workers,
            rx,
            Arc::clone(&store),
            Arc::new(generator),
            Arc::clone(&stats),
        )?;

        debug!(
            capacity = config.capacity,
            queue = config.queue_capacity,
            policy = ?config.saturation,
            "tile cache ready"
        );

        Ok(Self {
            store,
            stats,
            queue: Some(queue),
            pool: Some(pool),
        })
    }

    /// Create a cache with default queue settings
    pub fn with_capacity(generator: G, capacity: usize, workers: usize) -> Result<Self> {
        Self::new(generator, CacheConfig::new(capacity, workers))
    }

    /// Return the tile for `coord`, scheduling generation on a miss.
    ///
    /// A hit promotes the tile to most recently used. A miss inserts a
    /// placeholder, and only the caller that actually inserted it enqueues
    /// the generation request.
    pub fn get_or_schedule(&self, coord: Coord) -> Arc<Tile<G::Output>> {
        if let Some(tile) = self.store.lookup(coord) {
            self.store.touch(coord);
            self.stats.record_hit();
            return tile;
        }

        self.stats.record_miss();

        let inserted = self.store.insert_placeholder(coord);
        self.stats.record_evictions(inserted.evicted);

        match inserted.ticket {
            Some(ticket) => {
                self.enqueue(ticket);
            }
            None => {
                // Lost the race to another caller; still an access
                self.store.touch(coord);
            }
        }

        inserted.tile
    }

    /// Schedule generation for coordinates that are not resident.
    ///
    /// Resident tiles keep their recency. Returns the number of requests enqueued.
    pub fn prefetch<I>(&self, coords: I) -> usize
    where
        I: IntoIterator<Item = Coord>,
    {
        let mut scheduled = 0;
        for coord in coords {
            if self.store.contains(coord) {
                continue;
            }
            let inserted = self.store.insert_placeholder(coord);
            self.stats.record_evictions(inserted.evicted);
            if let Some(ticket) = inserted.ticket {
                if self.enqueue(ticket) {
                    scheduled += 1;
                }
            }
        }
        scheduled
    }

    /// Drop the tile for `coord` so the next access generates it again.
    ///
    /// An in-flight generation for the dropped tile is discarded on completion.
    pub fn invalidate(&self, coord: Coord) -> bool {
        self.store.remove(coord).is_some()
    }

    /// The underlying store
    pub fn store(&self) -> &TileStore<G::Output> {
        &self.store
    }

    /// Get cache statistics
    pub fn stats(&self) -> &CacheStats {
        &self.stats
    }

    /// Get current number of resident tiles
    pub fn len(&self) -> usize {
        self.store.len()
    }

    /// Check if no tiles are resident
    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }

    /// Get cache capacity
    pub fn capacity(&self) -> usize {
        self.store.capacity()
    }

    /// Number of generation requests waiting for a worker
    pub fn queued(&self) -> usize {
        self.queue.as_ref().map(WorkQueue::len).unwrap_or(0)
    }

    /// Whether `shutdown` has run
    pub fn is_shut_down(&self) -> bool {
        self.queue.is_none()
    }

    /// Close the work queue and wait for the workers to drain it.
    ///
    /// Requests already queued still complete into the store. Later misses
    /// get a placeholder that is never scheduled. Safe to call more than once.
    pub fn shutdown(&mut self) {
        // Dropping the only sender closes the queue
        self.queue = None;

        if let Some(pool) = self.pool.take() {
            pool.join();
        }
    }

    fn enqueue(&self, ticket: Ticket) -> bool {
        let result = match &self.queue {
            Some(queue) => queue.submit(ticket),
            None => Err(Error::QueueClosed),
        };

        match result {
            Ok(()) => {
                self.stats.record_scheduled();
                debug!(coord = %ticket.coord, epoch = ticket.epoch, "scheduled tile generation");
                true
            }
            Err(err) => {
                // Without a queued request the placeholder would never fill
                self.store.rollback(ticket);
                self.stats.record_dropped();
                warn!(coord = %ticket.coord, error = %err, "tile generation not scheduled");
                false
            }
        }
    }
}

impl<G: Generator> Drop for TileCache<G> {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SaturationPolicy;
    use crate::error::GenerateError;
    use crossbeam_channel::{unbounded, Receiver, Sender};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Barrier;
    use std::thread;
    use std::time::{Duration, Instant};

    fn c(x: i32, y: i32) -> Coord {
        Coord::new(x, y)
    }

    fn terrain(coord: Coord) -> i64 {
        coord.x as i64 * 1_000 + coord.y as i64
    }

    fn wait_until(what: &str, mut cond: impl FnMut() -> bool) {
        let deadline = Instant::now() + Duration::from_secs(5);
        while !cond() {
            assert!(Instant::now() < deadline, "timed out waiting for {}", what);
            thread::sleep(Duration::from_millis(1));
        }
    }

    /// Generator that blocks on its first call for `held` until released
    struct Gated {
        held: Coord,
        calls: Arc<AtomicUsize>,
        started: Sender<()>,
        release: Receiver<()>,
    }

    impl Gated {
        fn new(held: Coord) -> (Self, Receiver<()>, Sender<()>, Arc<AtomicUsize>) {
            let (started_tx, started_rx) = unbounded();
            let (release_tx, release_rx) = unbounded();
            let calls = Arc::new(AtomicUsize::new(0));
            let gated = Self {
                held,
                calls: Arc::clone(&calls),
                started: started_tx,
                release: release_rx,
            };
            (gated, started_rx, release_tx, calls)
        }
    }

    impl Generator for Gated {
        type Output = i64;

        fn generate(&self, coord: Coord) -> std::result::Result<i64, GenerateError> {
            if coord == self.held && self.calls.fetch_add(1, Ordering::SeqCst) == 0 {
                let _ = self.started.send(());
                let _ = self.release.recv();
            }
            Ok(terrain(coord))
        }
    }

    #[test]
    fn test_cache_capacity_scenario() {
        let cache = TileCache::with_capacity(terrain, 3, 2).unwrap();

        for x in 0..4 {
            cache.get_or_schedule(c(x, 0));
        }

        assert_eq!(cache.len(), 3);
        assert_eq!(cache.store().resident(), vec![c(1, 0), c(2, 0), c(3, 0)]);
        assert_eq!(cache.stats().evictions(), 1);
    }

    #[test]
    fn test_cache_touch_scenario() {
        let cache = TileCache::with_capacity(terrain, 3, 2).unwrap();

        cache.get_or_schedule(c(0, 0));
        cache.get_or_schedule(c(1, 0));
        cache.get_or_schedule(c(2, 0));
        cache.get_or_schedule(c(0, 0));
        cache.get_or_schedule(c(3, 0));

        assert!(cache.store().contains(c(0, 0)));
        assert!(!cache.store().contains(c(1, 0)));
        assert_eq!(cache.stats().hits(), 1);
        assert_eq!(cache.stats().misses(), 4);
    }

    #[test]
    fn test_cache_completion_matches_generator() {
        let cache = TileCache::with_capacity(terrain, 8, 2).unwrap();

        let tile = cache.get_or_schedule(c(5, -5));
        wait_until("tile (5, -5)", || tile.is_ready());

        let resident = cache.store().lookup(c(5, -5)).unwrap();
        assert_eq!(resident.content(), Some(&terrain(c(5, -5))));
        assert_eq!(cache.stats().completed(), 1);

        let again = cache.get_or_schedule(c(5, -5));
        assert!(again.is_ready());
        assert_eq!(cache.stats().scheduled(), 1);
    }

    #[test]
    fn test_cache_concurrent_misses_enqueue_once() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let cache = Arc::new(
            TileCache::with_capacity(
                move |coord: Coord| {
                    counter.fetch_add(1, Ordering::SeqCst);
                    terrain(coord)
                },
                16,
                4,
            )
            .unwrap(),
        );
        let barrier = Arc::new(Barrier::new(8));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let cache = Arc::clone(&cache);
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    barrier.wait();
                    cache.get_or_schedule(c(7, 7));
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        wait_until("single completion", || cache.stats().completed() == 1);
        assert_eq!(cache.stats().scheduled(), 1);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_cache_eviction_discards_in_flight_generation() {
        let (generator, started, release, calls) = Gated::new(c(0, 0));
        let cache = TileCache::with_capacity(generator, 2, 2).unwrap();

        let first = cache.get_or_schedule(c(0, 0));
        started.recv_timeout(Duration::from_secs(5)).unwrap();

        cache.get_or_schedule(c(1, 0));
        cache.get_or_schedule(c(2, 0));
        assert!(!cache.store().contains(c(0, 0)));

        release.send(()).unwrap();
        wait_until("discarded completion", || cache.stats().discarded() == 1);
        assert!(!first.is_ready());
        assert!(!cache.store().contains(c(0, 0)));

        // Fresh miss: generated again from scratch
        let second = cache.get_or_schedule(c(0, 0));
        wait_until("regenerated tile", || second.is_ready());
        assert_eq!(second.content(), Some(&terrain(c(0, 0))));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_cache_full_queue_drops_and_retries() {
        let (generator, started, release, _calls) = Gated::new(c(0, 0));
        let config = CacheConfig::new(16, 1)
            .with_queue_capacity(1)
            .with_saturation(SaturationPolicy::Drop);
        let cache = TileCache::new(generator, config).unwrap();

        cache.get_or_schedule(c(0, 0));
        started.recv_timeout(Duration::from_secs(5)).unwrap();
        cache.get_or_schedule(c(1, 0)); // Fills the queue

        let dropped = cache.get_or_schedule(c(2, 0));
        assert!(!dropped.is_ready());
        assert!(!cache.store().contains(c(2, 0)));
        assert_eq!(cache.stats().dropped(), 1);
        assert_eq!(cache.queued(), 1);

        release.send(()).unwrap();
        wait_until("queued tiles", || cache.stats().completed() == 2);

        let retried = cache.get_or_schedule(c(2, 0));
        wait_until("retried tile", || retried.is_ready());
        assert_eq!(cache.stats().scheduled(), 3);
    }

    #[test]
    fn test_cache_blocking_policy_never_drops() {
        let config = CacheConfig::new(64, 1)
            .with_queue_capacity(1)
            .with_saturation(SaturationPolicy::Block);
        let mut cache = TileCache::new(terrain, config).unwrap();

        for x in 0..32 {
            cache.get_or_schedule(c(x, 1));
        }
        cache.shutdown();

        assert_eq!(cache.stats().dropped(), 0);
        assert_eq!(cache.stats().completed(), 32);
    }

    #[test]
    fn test_cache_failed_generation_stays_placeholder_until_invalidated() {
        let attempts = Arc::new(AtomicUsize::new(0));

        struct FailOnce(Arc<AtomicUsize>);

        impl Generator for FailOnce {
            type Output = i64;

            fn generate(&self, coord: Coord) -> std::result::Result<i64, GenerateError> {
                if self.0.fetch_add(1, Ordering::SeqCst) == 0 {
                    return Err(GenerateError::new("transient failure"));
                }
                Ok(terrain(coord))
            }
        }

        let cache = TileCache::with_capacity(FailOnce(Arc::clone(&attempts)), 4, 1).unwrap();

        let tile = cache.get_or_schedule(c(3, 3));
        wait_until("failure", || cache.stats().failures() == 1);
        assert!(!tile.is_ready());
        assert!(!cache.get_or_schedule(c(3, 3)).is_ready());
        assert_eq!(cache.stats().scheduled(), 1);

        assert!(cache.invalidate(c(3, 3)));
        let tile = cache.get_or_schedule(c(3, 3));
        wait_until("second attempt", || tile.is_ready());
        assert_eq!(attempts.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_cache_panicking_generator_does_not_stop_pool() {
        let cache = TileCache::with_capacity(
            |coord: Coord| {
                if coord == Coord::new(13, 13) {
                    panic!("unlucky tile");
                }
                terrain(coord)
            },
            8,
            1,
        )
        .unwrap();

        let cursed = cache.get_or_schedule(c(13, 13));
        wait_until("panic recorded", || cache.stats().failures() == 1);

        let fine = cache.get_or_schedule(c(1, 1));
        wait_until("next tile", || fine.is_ready());
        assert!(!cursed.is_ready());
    }

    #[test]
    fn test_cache_prefetch_skips_resident() {
        let cache = TileCache::with_capacity(terrain, 8, 2).unwrap();

        cache.get_or_schedule(c(0, 0));
        let scheduled = cache.prefetch([c(0, 0), c(1, 0), c(2, 0), c(1, 0)]);

        assert_eq!(scheduled, 2);
        assert_eq!(cache.len(), 3);
        assert_eq!(cache.stats().misses(), 1);
        // Prefetch does not promote the resident tile
        assert_eq!(cache.store().resident(), vec![c(0, 0), c(1, 0), c(2, 0)]);
    }

    #[test]
    fn test_cache_shutdown_drains_queue() {
        let mut cache = TileCache::with_capacity(terrain, 64, 3).unwrap();

        for x in 0..40 {
            cache.get_or_schedule(c(x, x));
        }
        cache.shutdown();
        assert!(cache.is_shut_down());

        let stats = cache.stats();
        assert_eq!(stats.in_flight(), 0);
        assert_eq!(stats.completed() + stats.dropped(), 40);
        for coord in cache.store().resident() {
            assert_eq!(
                cache.store().lookup(coord).unwrap().content(),
                Some(&terrain(coord))
            );
        }

        // Misses after shutdown are never scheduled
        let late = cache.get_or_schedule(c(-1, -1));
        assert!(!late.is_ready());
        assert!(!cache.store().contains(c(-1, -1)));

        cache.shutdown();
    }

    #[test]
    fn test_cache_accepts_unbounded_capacity() {
        let mut cache = TileCache::with_capacity(terrain, usize::MAX, 1).unwrap();

        let tile = cache.get_or_schedule(c(2, 3));
        cache.shutdown();

        assert_eq!(tile.content(), Some(&terrain(c(2, 3))));
        assert_eq!(cache.capacity(), usize::MAX);
    }

    #[test]
    fn test_cache_rejects_invalid_config() {
        assert!(matches!(
            TileCache::with_capacity(terrain, 0, 1),
            Err(Error::InvalidConfig(_))
        ));
        assert!(matches!(
            TileCache::with_capacity(terrain, 4, 0),
            Err(Error::InvalidConfig(_))
        ));
    }
}
