//! Headless fly-through over a grid of paged tiles.
//!
//! Usage:
//!   cargo run --release --bin flythrough -- --frames 900 --expiry 2.5
//!   cargo run --release --bin flythrough -- --config pager.json
//!
//! Each tile starts with a coarse child only. Flying close pages in a finer
//! tile, which in turn pages in a detail level. Tiles left behind expire once
//! they have gone unrendered for the expiry delay.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use glam::Vec3;

use paged_lod::core::logging;
use paged_lod::core::types::Result;
use paged_lod::core::FrameClock;
use paged_lod::math::Aabb;
use paged_lod::scene::{LocalTransform, Node, NodeRef, Traversal, TraversalMode, VisitorKind};
use paged_lod::streaming::{DatabasePager, MemorySource, PagedLod, PagerConfig, PagerStats, RangeEntry};

const GRID: i32 = 8;
const TILE_SIZE: f32 = 256.0;
const FINE_RANGE: f32 = 400.0;
const DETAIL_RANGE: f32 = 120.0;
const FAR: f32 = 1.0e6;
const EYE_HEIGHT: f32 = 30.0;
/// Simulated seconds per frame
const FRAME_DT: f64 = 1.0 / 30.0;

fn tile_leaf(name: String, half_extent: f32) -> NodeRef {
    Node::leaf(
        name,
        Aabb::from_center_half_extent(Vec3::ZERO, Vec3::new(half_extent, 8.0, half_extent)),
    )
    .into_ref()
}

fn detail_id(x: i32, z: i32) -> String {
    format!("tile_{x}_{z}/detail")
}

fn fine_id(x: i32, z: i32) -> String {
    format!("tile_{x}_{z}/fine")
}

/// Fine tile: permanent fine mesh plus a paged detail level.
fn build_fine_tile(x: i32, z: i32) -> Result<NodeRef> {
    let mut lod = PagedLod::new();
    lod.add_child(tile_leaf(format!("tile_{x}_{z}/fine_mesh"), TILE_SIZE * 0.5), RangeEntry::new(DETAIL_RANGE, FAR))?;
    lod.declare_level(None, RangeEntry::new(0.0, DETAIL_RANGE), detail_id(x, z), 1.0, 1.0)?;
    lod.set_user_bounds(Vec3::ZERO, TILE_SIZE * 0.75);
    Ok(Node::paged_lod(fine_id(x, z), lod).into_ref())
}

/// Source serving the fine and detail levels of every tile.
fn build_source() -> MemorySource {
    let mut source = MemorySource::new();
    for x in 0..GRID {
        for z in 0..GRID {
            source.insert(fine_id(x, z), move || match build_fine_tile(x, z) {
                Ok(node) => node,
                Err(e) => {
                    log::error!("Failed to build fine tile {x},{z}: {e}");
                    tile_leaf(fine_id(x, z), TILE_SIZE * 0.5)
                }
            });
            source.insert(detail_id(x, z), move || {
                tile_leaf(detail_id(x, z), TILE_SIZE * 0.5)
            });
        }
    }
    source
}

/// Root group with one paged tile per grid cell.
fn build_scene() -> Result<NodeRef> {
    let root = Node::group("terrain").into_ref();
    for x in 0..GRID {
        for z in 0..GRID {
            let mut lod = PagedLod::new();
            lod.add_child(tile_leaf(format!("tile_{x}_{z}/coarse"), TILE_SIZE * 0.5), RangeEntry::new(FINE_RANGE, FAR))?;
            lod.declare_level(None, RangeEntry::new(0.0, FINE_RANGE), fine_id(x, z), 0.0, 1.0)?;
            lod.set_user_bounds(Vec3::ZERO, TILE_SIZE * 0.75);
            lod.set_non_expirable(1)?;

            let center = Vec3::new((x as f32 + 0.5) * TILE_SIZE, 0.0, (z as f32 + 0.5) * TILE_SIZE);
            let tile = Node::paged_lod(format!("tile_{x}_{z}"), lod)
                .with_transform(LocalTransform::from_position(center))
                .into_ref();
            root.add_child(tile)?;
        }
    }
    Ok(root)
}

/// Slow figure-eight over the grid
fn eye_at(time: f64) -> Vec3 {
    let extent = GRID as f32 * TILE_SIZE;
    let t = time as f32;
    Vec3::new(
        extent * (0.5 + 0.45 * (t * 0.11).sin()),
        EYE_HEIGHT,
        extent * (0.5 + 0.45 * (t * 0.22).sin()),
    )
}

fn parse_config(args: &[String]) -> Result<PagerConfig> {
    let mut config = match args.iter().position(|a| a == "--config").and_then(|i| args.get(i + 1)) {
        Some(path) => PagerConfig::load_sync(&PathBuf::from(path))?,
        None => PagerConfig::default(),
    };

    if let Some(expiry) = args
        .iter()
        .position(|a| a == "--expiry")
        .and_then(|i| args.get(i + 1))
        .and_then(|s| s.parse().ok())
    {
        config.expiry_delay = expiry;
    }
    config.validate()?;
    Ok(config)
}

fn main() -> Result<()> {
    logging::init();

    let args: Vec<String> = std::env::args().collect();
    let frames: u64 = args
        .iter()
        .position(|a| a == "--frames")
        .and_then(|i| args.get(i + 1))
        .and_then(|s| s.parse().ok())
        .unwrap_or(600);
    let config = parse_config(&args)?;

    log::info!(
        "Fly-through: {}x{} tiles, {} frames, expiry {:.1}s, {} loaders",
        GRID,
        GRID,
        frames,
        config.expiry_delay,
        config.max_concurrent
    );

    let root = build_scene()?;
    let mut pager = DatabasePager::new(Arc::new(build_source()), config)?;
    pager.register_paged_lods(&root);
    let mut clock = FrameClock::new();
    let mut totals = PagerStats::default();

    for i in 1..=frames {
        let frame = clock.advance_to(i as f64 * FRAME_DT);
        let eye = eye_at(frame.reference_time);

        let rendered = {
            let mut traversal = Traversal::new(eye, VisitorKind::Cull)
                .with_frame_stamp(frame)
                .with_request_handler(&pager);
            traversal.run(&root, TraversalMode::ActiveChildren).len()
        };

        let stats = pager.update(&frame);
        totals += stats;

        if i % 60 == 0 {
            log::info!(
                "frame {:>5} t={:>6.2}s eye=({:>7.1}, {:>7.1}) rendered={:>3} pending={:>2} attached={} evicted={}",
                frame.frame_number,
                frame.reference_time,
                eye.x,
                eye.z,
                rendered,
                pager.pending_count(),
                totals.attached,
                totals.evicted
            );
        }

        // give the loaders a moment, frames are simulated
        std::thread::sleep(Duration::from_millis(2));
    }

    log::info!(
        "Done: attached {}, evicted {}, failed {}, discarded {}, {} LODs tracked",
        totals.attached,
        totals.evicted,
        totals.failed,
        totals.discarded,
        pager.tracked_lods()
    );
    Ok(())
}
