//! Tile content generation contract

use crate::error::GenerateError;
use crate::tile::Coord;

/// Produces the content of a tile from its coordinate.
///
/// Implementations must be deterministic and free of side effects, and safe
/// to call concurrently for distinct coordinates. Workers call `generate`
/// without holding any store lock.
///
/// Plain closures `Fn(Coord) -> T` implement this trait and never fail.
pub trait Generator: Send + Sync + 'static {
    /// Generated content
    type Output: Send + Sync + 'static;

    /// Generate the content for `coord`
    fn generate(&self, coord: Coord) -> Result<Self::Output, GenerateError>;
}

impl<F, T> Generator for F
where
    F: Fn(Coord) -> T + Send + Sync + 'static,
    T: Send + Sync + 'static,
{
    type Output = T;

    fn generate(&self, coord: Coord) -> Result<T, GenerateError> {
        Ok(self(coord))
    }
}
