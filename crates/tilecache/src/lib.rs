//! # tilecache
//!
//! Bounded LRU cache of procedurally generated tiles, filled asynchronously
//! by a fixed pool of background workers.
//!
//! ## Architecture
//! - **Store**: coordinate map and recency list behind one `RwLock` (O(1) lookup, touch, evict)
//! - **Work Queue**: bounded crossbeam channel of generation tickets
//! - **Worker Pool**: `W` threads running the `Generator` and committing results
//! - **Facade**: `TileCache::get_or_schedule`, which never waits on generation
//!
//! ## Example
//!
//! ```
//! use tilecache::{Coord, TileCache};
//!
//! let mut cache = TileCache::with_capacity(|c: Coord| c.x + c.y, 16, 2).unwrap();
//!
//! let tile = cache.get_or_schedule(Coord::new(3, 4));
//! if let Some(height) = tile.content() {
//!     assert_eq!(*height, 7);
//! }
//!
//! cache.shutdown();
//! assert_eq!(tile.content(), Some(&7));
//! ```

#![warn(missing_docs)]

mod cache;
mod config;
mod error;
mod generator;
mod lru;
mod pool;
mod queue;
mod stats;
mod store;
mod tile;

pub use cache::TileCache;
pub use config::{CacheConfig, SaturationPolicy};
pub use error::{Error, GenerateError, Result};
pub use generator::Generator;
pub use pool::WorkerPool;
pub use queue::WorkQueue;
pub use stats::CacheStats;
pub use store::{Completion, Inserted, TileStore};
pub use tile::{Coord, Ticket, Tile};
