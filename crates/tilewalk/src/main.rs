//! TileWalk - headless walker streaming generated chunks through tilecache

mod palette;
mod walker;

use anyhow::Result;
use clap::Parser;
use serde::Serialize;
use std::thread;
use std::time::{Duration, Instant};
use tilecache::{CacheConfig, CacheStats, SaturationPolicy, TileCache};
use tracing::{debug, info};

use crate::palette::PaletteGenerator;
use crate::walker::Walker;

/// Largest accepted `--view`
const MAX_VIEW: i64 = 64;

/// Largest accepted `--chunk-size`
const MAX_CHUNK_SIZE: i64 = 4096;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Cache capacity (number of chunks)
    #[arg(short, long, default_value_t = 50)]
    capacity: usize,

    /// Number of generation workers
    #[arg(short, long, default_value_t = 4)]
    workers: usize,

    /// Pending generation requests before misses are dropped
    #[arg(short, long, default_value_t = 100)]
    queue: usize,

    /// Wait for queue space instead of dropping requests
    #[arg(long)]
    block_on_full: bool,

    /// Frames to simulate
    #[arg(short, long, default_value_t = 600)]
    steps: u64,

    /// Pixels moved per frame
    #[arg(long, default_value_t = 4.0)]
    speed: f64,

    /// Visible window side in chunks (even values round up to odd)
    #[arg(long, default_value_t = 3, value_parser = clap::value_parser!(u32).range(1..=MAX_VIEW))]
    view: u32,

    /// Frame duration in milliseconds (0 runs unthrottled)
    #[arg(long, default_value_t = 16)]
    frame_ms: u64,

    /// Tiles per chunk side
    #[arg(long, default_value_t = 32, value_parser = clap::value_parser!(u32).range(1..=MAX_CHUNK_SIZE))]
    chunk_size: u32,

    /// Print the final report as JSON
    #[arg(long)]
    json: bool,
}

#[derive(Debug, Serialize)]
struct WalkReport {
    frames: u64,
    requests: u64,
    ready_on_request: u64,
    final_chunk: (i32, i32),
    resident: usize,
    capacity: usize,
    hits: u64,
    misses: u64,
    hit_ratio: f64,
    scheduled: u64,
    dropped: u64,
    completed: u64,
    discarded: u64,
    failures: u64,
    evictions: u64,
    elapsed_ms: u64,
}

impl WalkReport {
    fn print(&self) {
        println!("\nWalk finished after {} frames ({} ms)", self.frames, self.elapsed_ms);
        println!("   Final chunk:      ({}, {})", self.final_chunk.0, self.final_chunk.1);
        println!(
            "   Requests:         {} ({} ready when asked)",
            self.requests, self.ready_on_request
        );
        println!("   Resident chunks:  {}/{}", self.resident, self.capacity);
        println!(
            "   Hits / misses:    {} / {} ({:.1}% hit rate)",
            self.hits,
            self.misses,
            self.hit_ratio * 100.0
        );
        println!(
            "   Generation:       {} scheduled, {} completed, {} discarded, {} failed, {} dropped",
            self.scheduled, self.completed, self.discarded, self.failures, self.dropped
        );
        println!("   Evictions:        {}", self.evictions);
    }
}

fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let args = Args::parse();

    info!("Starting TileWalk v{}", env!("CARGO_PKG_VERSION"));
    info!("Cache capacity: {}", args.capacity);
    info!("Workers: {}", args.workers);
    info!("Queue capacity: {}", args.queue);

    let saturation = if args.block_on_full {
        SaturationPolicy::Block
    } else {
        SaturationPolicy::Drop
    };
    let config = CacheConfig::new(args.capacity, args.workers)
        .with_queue_capacity(args.queue)
        .with_saturation(saturation);

    let generator = PaletteGenerator::new(args.chunk_size as usize);
    let chunk_pixels = generator.chunk_pixels();
    let mut cache = TileCache::new(generator, config)?;

    let frame = Duration::from_millis(args.frame_ms);
    let mut walker = Walker::new(512.0, 512.0, args.speed, 64);
    let mut requests = 0u64;
    let mut ready_on_request = 0u64;
    let started = Instant::now();

    for step in 0..args.steps {
        let frame_start = Instant::now();

        let mut ready = 0;
        let mut center_color = None;
        let center = walker.chunk(chunk_pixels);
        let visible = walker.visible(chunk_pixels, args.view);
        for coord in &visible {
            let chunk = cache.get_or_schedule(*coord);
            if let Some(image) = chunk.content() {
                ready += 1;
                if *coord == center {
                    center_color = image.tile(0, 0);
                }
            }
        }
        requests += visible.len() as u64;
        ready_on_request += ready;

        if step % 60 == 0 {
            let (x, y) = walker.position();
            debug!(
                step,
                x,
                y,
                ready,
                visible = visible.len(),
                resident = cache.len(),
                queued = cache.queued(),
                color = ?center_color,
                "frame"
            );
        }

        walker.step();

        if let Some(rest) = frame.checked_sub(frame_start.elapsed()) {
            thread::sleep(rest);
        }
    }

    cache.shutdown();

    let last = walker.chunk(chunk_pixels);
    let report = build_report(
        &cache,
        args.steps,
        requests,
        ready_on_request,
        (last.x, last.y),
        started.elapsed(),
    );

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        report.print();
    }

    Ok(())
}

fn build_report(
    cache: &TileCache<PaletteGenerator>,
    frames: u64,
    requests: u64,
    ready_on_request: u64,
    final_chunk: (i32, i32),
    elapsed: Duration,
) -> WalkReport {
    let stats: &CacheStats = cache.stats();
    WalkReport {
        frames,
        requests,
        ready_on_request,
        final_chunk,
        resident: cache.len(),
        capacity: cache.capacity(),
        hits: stats.hits(),
        misses: stats.misses(),
        hit_ratio: stats.hit_ratio(),
        scheduled: stats.scheduled(),
        dropped: stats.dropped(),
        completed: stats.completed(),
        discarded: stats.discarded(),
        failures: stats.failures(),
        evictions: stats.evictions(),
        elapsed_ms: elapsed.as_millis() as u64,
    }
}
