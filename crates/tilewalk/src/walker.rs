//! Player movement and the visible chunk window

use tilecache::Coord;

/// Heading of the walker
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Heading {
    East,
    South,
    West,
    North,
}

impl Heading {
    fn turn_right(self) -> Self {
        match self {
            Heading::East => Heading::South,
            Heading::South => Heading::West,
            Heading::West => Heading::North,
            Heading::North => Heading::East,
        }
    }

    fn delta(self) -> (f64, f64) {
        match self {
            Heading::East => (1.0, 0.0),
            Heading::South => (0.0, 1.0),
            Heading::West => (-1.0, 0.0),
            Heading::North => (0.0, -1.0),
        }
    }
}

/// Walks an outward square spiral, so it keeps entering new chunks and
/// regularly passes old ones again.
#[derive(Debug, Clone)]
pub struct Walker {
    x: f64,
    y: f64,
    speed: f64,
    heading: Heading,
    leg_frames: u64,
    frames_left: u64,
    turns: u64,
}

impl Walker {
    /// Start at `(x, y)` pixels, moving `speed` pixels per frame, with a
    /// first spiral leg of `leg_frames` frames
    pub fn new(x: f64, y: f64, speed: f64, leg_frames: u64) -> Self {
        let leg_frames = leg_frames.max(1);
        Self {
            x,
            y,
            speed,
            heading: Heading::East,
            leg_frames,
            frames_left: leg_frames,
            turns: 0,
        }
    }

    /// Current position in pixels
    pub fn position(&self) -> (f64, f64) {
        (self.x, self.y)
    }

    /// Advance one frame
    pub fn step(&mut self) {
        let (dx, dy) = self.heading.delta();
        self.x += dx * self.speed;
        self.y += dy * self.speed;

        self.frames_left -= 1;
        if self.frames_left == 0 {
            self.heading = self.heading.turn_right();
            self.turns += 1;
            // Legs grow every second turn
            if self.turns % 2 == 0 {
                self.leg_frames += self.leg_frames.max(1);
            }
            self.frames_left = self.leg_frames;
        }
    }

    /// Chunk containing the walker. Chunk sizes below one pixel count as one.
    pub fn chunk(&self, chunk_pixels: i64) -> Coord {
        let size = chunk_pixels.max(1) as f64;
        Coord::new(
            (self.x / size).floor() as i32,
            (self.y / size).floor() as i32,
        )
    }

    /// Square window of chunks centred on the walker's chunk.
    ///
    /// The side is `2 * (view / 2) + 1`, so an even `view` rounds up to the
    /// next odd side. Coordinates saturate at the edges of the `i32` grid.
    pub fn visible(&self, chunk_pixels: i64, view: u32) -> Vec<Coord> {
        let center = self.chunk(chunk_pixels);
        let half = (view / 2).min(i32::MAX as u32 / 2) as i32;
        let side = 2 * half as usize + 1;
        let mut coords = Vec::with_capacity(side.saturating_mul(side).min(4096));
        for dx in -half..=half {
            for dy in -half..=half {
                coords.push(Coord::new(
                    center.x.saturating_add(dx),
                    center.y.saturating_add(dy),
                ));
            }
        }
        coords
    }
}
