//! Palette chunk generator
//!
//! Each chunk is a grid of flat-coloured tiles. The base colour depends on
//! the chunk coordinate and each tile shifts it by its position, so
//! neighbouring chunks are visibly distinct.

use tilecache::{Coord, GenerateError, Generator};

/// Side of one tile in pixels
pub const TILE_SIZE: i64 = 16;

/// RGBA colour
pub type Rgba = [u8; 4];

/// Generated chunk: one colour per tile, row-major
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkImage {
    /// Tiles per side
    pub size: usize,
    /// `size * size` colours
    pub tiles: Vec<Rgba>,
}

impl ChunkImage {
    /// Colour of the tile at `(x, y)` inside the chunk
    pub fn tile(&self, x: usize, y: usize) -> Option<Rgba> {
        if x >= self.size || y >= self.size {
            return None;
        }
        self.tiles.get(y * self.size + x).copied()
    }
}

/// Generator producing `ChunkImage`s of `chunk_size × chunk_size` tiles
#[derive(Debug, Clone, Copy)]
pub struct PaletteGenerator {
    chunk_size: usize,
}

impl PaletteGenerator {
    /// Create a generator for chunks with `chunk_size` tiles per side
    pub fn new(chunk_size: usize) -> Self {
        Self { chunk_size }
    }

    /// Chunk side in pixels
    pub fn chunk_pixels(&self) -> i64 {
        self.chunk_size as i64 * TILE_SIZE
    }

    fn base_color(coord: Coord) -> Rgba {
        // Truncating casts wrap negative coordinates into the byte range
        let r = (coord.x as i64 * 30 % 255) as u8;
        let g = (coord.y as i64 * 50 % 255) as u8;
        [r, g, 100, 255]
    }
}

impl Generator for PaletteGenerator {
    type Output = ChunkImage;

    fn generate(&self, coord: Coord) -> Result<ChunkImage, GenerateError> {
        if self.chunk_size == 0 {
            return Err(GenerateError::new("chunk size must be greater than 0"));
        }

        let base = Self::base_color(coord);
        let mut tiles = Vec::with_capacity(self.chunk_size * self.chunk_size);
        for y in 0..self.chunk_size {
            for x in 0..self.chunk_size {
                tiles.push([
                    base[0].wrapping_add((x * 5 % 50) as u8),
                    base[1].wrapping_add((y * 5 % 50) as u8),
                    base[2],
                    255,
                ]);
            }
        }

        Ok(ChunkImage {
            size: self.chunk_size,
            tiles,
        })
    }
}
