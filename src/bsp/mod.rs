//! Binary-space-partition compiler.
//!
//! The pipeline runs once per map, strictly in this order:
//!
//! 1. load the raw arrays into a [`BspLevel`] (reference counting, derived
//!    linedef flags),
//! 2. analysis: prune unused vertices, compute per-vertex wall tips, detect
//!    fully-overlapping linedefs,
//! 3. create one seg per sidedef and index them in a superblock tree,
//! 4. recursively pick a partition, divide the segs, close the gaps with
//!    minisegs — until every remaining set is convex (a subsector),
//! 5. finish: clockwise-order each subsector, round vertices off to integer
//!    precision (repairing degenerates), strip minisegs, and serialise the
//!    output tables.
//!
//! Everything is synchronous and single-threaded; all state lives in the
//! per-compilation [`BspLevel`], so independent maps can be compiled on
//! separate threads.

pub mod analyze;
pub mod level;
pub mod node;
pub mod seg;
pub mod superblock;
pub mod util;

pub use level::{BspLevel, CompiledMap};
pub use node::{BspNode, BspTree};

use crate::wad::level::RawMap;
use thiserror::Error;

/// Fatal compilation failures.
///
/// Every variant names the offending entity; none of these are expected on
/// valid input — they indicate either corrupt input tables or an internal
/// inconsistency between the partition selector and the seg divider.
#[derive(Debug, Error)]
pub enum BspError {
    #[error("couldn't find any {0}")]
    EmptyTable(&'static str),

    #[error("no such {kind} number #{index} (max {max})")]
    BadIndex {
        kind: &'static str,
        index: usize,
        max: usize,
    },

    #[error("vertex {vertex} ref_count is {count}")]
    VertexRefCount { vertex: usize, count: i32 },

    #[error("vertex {vertex} has no wall tips")]
    NoWallTips { vertex: usize },

    #[error("seg {seg} has zero length")]
    ZeroLengthSeg { seg: usize },

    #[error("bad delta while repairing a degenerate seg")]
    BadDelta,

    #[error("bad order in intersection list: {prev:.3} > {next:.3}")]
    CutOrder { prev: f64, next: f64 },

    #[error("separated seg list has no {side} side")]
    EmptySide { side: &'static str },

    #[error("superblock child still holds segs after drain")]
    ChildNotEmpty,

    #[error("subsector {sub} {stage} to being empty")]
    EmptySubsector { sub: usize, stage: &'static str },

    #[error("subsector {sub} rounded off with no real segs")]
    NoRealSegs { sub: usize },

    #[error("linedef {line} references a pruned vertex")]
    PrunedVertex { line: usize },

    #[error("seg {seg} never reached a subsector")]
    UnplacedSeg { seg: usize },

    #[error("{what} miscounted ({got} != {want})")]
    Miscount {
        what: &'static str,
        got: usize,
        want: usize,
    },

    #[error("hit {what} limit ({count} > {limit})")]
    LimitExceeded {
        what: &'static str,
        count: usize,
        limit: usize,
    },
}

/// Compile one map: raw editable geometry in, finished BSP tables out.
pub fn compile_map(raw: &RawMap) -> Result<CompiledMap, BspError> {
    let mut lev = BspLevel::from_raw(raw)?;

    lev.prune_vertices()?;
    lev.calculate_wall_tips();
    lev.detect_overlapping_lines();

    let root = lev.create_segs()?;
    let mut tree = lev.build_nodes(root)?;
    lev.blocks.free_tree(root);

    lev.clockwise_bsp_tree();
    lev.round_off_bsp_tree()?;
    lev.normalise_bsp_tree()?;

    let out = lev.save(&mut tree)?;

    log::debug!(
        "{}: {} vertices, {} segs, {} subsectors, {} nodes",
        raw.name,
        out.vertices.len(),
        out.segs.len(),
        out.subsectors.len(),
        out.nodes.len()
    );

    Ok(out)
}
