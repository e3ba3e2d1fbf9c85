//! Worker pool draining the work queue into the store
//!
//! Each worker loops: receive a ticket (blocking while the queue is empty),
//! run the generator with no store lock held, then commit the result with
//! `TileStore::complete`. Generator errors and panics are contained to the
//! ticket that caused them; the tile stays a placeholder.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam_channel::Receiver;
use tracing::{debug, error, info, warn};

use crate::error::Result;
use crate::generator::Generator;
use crate::stats::CacheStats;
use crate::store::{Completion, TileStore};
use crate::tile::Ticket;

/// Fixed set of generation threads
pub struct WorkerPool {
    handles: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    /// Spawn `workers` threads reading from `rx`.
    ///
    /// Workers exit once every `WorkQueue` sender is dropped and the queue is drained.
    pub fn spawn<G: Generator>(
        workers: usize,
        rx: Receiver<Ticket>,
        store: Arc<TileStore<G::Output>>,
        generator: Arc<G>,
        stats: Arc<CacheStats>,
    ) -> Result<Self> {
        let mut handles = Vec::with_capacity(workers);

        for id in 0..workers {
            let rx = rx.clone();
            let store = Arc::clone(&store);
            let generator = Arc::clone(&generator);
            let stats = Arc::clone(&stats);

            let handle = thread::Builder::new()
                .name(format!("tile-worker-{}", id))
                .spawn(move || run_worker::<G>(id, rx, &store, &generator, &stats))?;
            handles.push(handle);
        }

        info!(workers, "tile worker pool started");
        Ok(Self { handles })
    }

    /// Number of worker threads
    pub fn size(&self) -> usize {
        self.handles.len()
    }

    /// Wait for every worker to exit.
    ///
    /// The queue must already be closed, otherwise this blocks forever.
    pub fn join(self) {
        let workers = self.handles.len();
        for handle in self.handles {
            if handle.join().is_err() {
                error!("tile worker exited by panic");
            }
        }
        info!(workers, "tile worker pool stopped");
    }
}

fn run_worker<G: Generator>(
    id: usize,
    rx: Receiver<Ticket>,
    store: &TileStore<G::Output>,
    generator: &G,
    stats: &CacheStats,
) {
    // recv fails only once the queue is closed and empty
    while let Ok(ticket) = rx.recv() {
        let coord = ticket.coord;
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| generator.generate(coord)));

        match outcome {
            Ok(Ok(content)) => match store.complete(ticket, content) {
                Completion::Installed => {
                    debug!(worker = id, %coord, "tile ready");
                    stats.record_completed();
                }
                Completion::Evicted | Completion::Stale => stats.record_discarded(),
            },
            Ok(Err(err)) => {
                warn!(worker = id, %coord, error = %err, "tile generation failed");
                stats.record_failure();
            }
            Err(payload) => {
                error!(worker = id, %coord, panic = panic_message(&*payload), "tile generator panicked");
                stats.record_failure();
            }
        }
    }

    debug!(worker = id, "tile worker exiting");
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(msg) = payload.downcast_ref::<&'static str>() {
        msg
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.as_str()
    } else {
        "unknown panic"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SaturationPolicy;
    use crate::error::GenerateError;
    use crate::queue::WorkQueue;
    use crate::tile::Coord;

    struct Flaky;

    impl Generator for Flaky {
        type Output = i32;

        fn generate(&self, coord: Coord) -> std::result::Result<i32, GenerateError> {
            match coord.x {
                1 => Err("bad seed".into()),
                2 => panic!("generator blew up"),
                x => Ok(x * 100),
            }
        }
    }

    fn schedule(store: &TileStore<i32>, queue: &WorkQueue, x: i32) {
        let ticket = store.insert_placeholder(Coord::new(x, 0)).ticket.unwrap();
        queue.submit(ticket).unwrap();
    }

    #[test]
    fn test_pool_drains_queue_and_isolates_failures() {
        let store: Arc<TileStore<i32>> = Arc::new(TileStore::new(16));
        let stats = Arc::new(CacheStats::new());
        let (queue, rx) = WorkQueue::bounded(16, SaturationPolicy::Block);

        for x in 0..6 {
            schedule(&store, &queue, x);
        }

        let pool = WorkerPool::spawn(3, rx, Arc::clone(&store), Arc::new(Flaky), Arc::clone(&stats))
            .unwrap();
        assert_eq!(pool.size(), 3);

        drop(queue);
        pool.join();

        assert_eq!(stats.completed(), 4);
        assert_eq!(stats.failures(), 2);
        for x in [0, 3, 4, 5] {
            let tile = store.lookup(Coord::new(x, 0)).unwrap();
            assert_eq!(tile.content(), Some(&(x * 100)));
        }
        for x in [1, 2] {
            assert!(!store.lookup(Coord::new(x, 0)).unwrap().is_ready());
        }
    }

    #[test]
    fn test_pool_discards_evicted_results() {
        let store: Arc<TileStore<i32>> = Arc::new(TileStore::new(1));
        let stats = Arc::new(CacheStats::new());
        let (queue, rx) = WorkQueue::bounded(4, SaturationPolicy::Block);

        // Both are queued before any worker runs; the second evicts the first
        schedule(&store, &queue, 3);
        schedule(&store, &queue, 4);

        let pool = WorkerPool::spawn(1, rx, Arc::clone(&store), Arc::new(Flaky), Arc::clone(&stats))
            .unwrap();
        drop(queue);
        pool.join();

        assert_eq!(stats.discarded(), 1);
        assert_eq!(stats.completed(), 1);
        assert_eq!(store.resident(), vec![Coord::new(4, 0)]);
        assert!(store.lookup(Coord::new(4, 0)).unwrap().is_ready());
    }

    #[test]
    fn test_panic_message() {
        let payload: Box<dyn Any + Send> = Box::new("static message");
        assert_eq!(panic_message(&*payload), "static message");

        let payload: Box<dyn Any + Send> = Box::new(String::from("owned message"));
        assert_eq!(panic_message(&*payload), "owned message");

        let payload: Box<dyn Any + Send> = Box::new(42u8);
        assert_eq!(panic_message(&*payload), "unknown panic");
    }
}
