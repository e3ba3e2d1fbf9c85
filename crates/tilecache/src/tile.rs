//! Tile coordinates and tile records

use std::fmt;
use std::sync::OnceLock;

/// Integer position of a tile in an unbounded 2D grid
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Coord {
    /// Column
    pub x: i32,
    /// Row
    pub y: i32,
}

impl Coord {
    /// Create a coordinate
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

impl From<(i32, i32)> for Coord {
    fn from((x, y): (i32, i32)) -> Self {
        Self { x, y }
    }
}

impl fmt::Display for Coord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// Cached unit of generated content for one coordinate.
///
/// A tile starts as a placeholder and becomes ready at most once, when the
/// store installs the generated content under its write lock. Handles are
/// shared (`Arc<Tile<T>>`), so a placeholder handed out earlier observes the
/// transition as well.
#[derive(Debug)]
pub struct Tile<T> {
    coord: Coord,
    epoch: u64,
    content: OnceLock<T>,
}

impl<T> Tile<T> {
    pub(crate) fn placeholder(coord: Coord, epoch: u64) -> Self {
        Self {
            coord,
            epoch,
            content: OnceLock::new(),
        }
    }

    /// Coordinate this tile was created for
    pub fn coord(&self) -> Coord {
        self.coord
    }

    /// Placeholder epoch assigned by the store on insertion
    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    /// Whether generated content is available
    pub fn is_ready(&self) -> bool {
        self.content.get().is_some()
    }

    /// Generated content, or `None` while still a placeholder
    pub fn content(&self) -> Option<&T> {
        self.content.get()
    }

    /// Installs content. Returns the content back if the tile was already ready.
    pub(crate) fn fill(&self, content: T) -> Result<(), T> {
        self.content.set(content)
    }
}

/// Proof of winning a placeholder insertion.
///
/// Only the caller that actually inserted the placeholder receives a ticket,
/// and only ticket holders enqueue generation, so there is one request per
/// placeholder epoch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Ticket {
    /// Coordinate to generate
    pub coord: Coord,
    /// Epoch of the placeholder this request belongs to
    pub epoch: u64,
}
