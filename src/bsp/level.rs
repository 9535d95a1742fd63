//! Geometry store: the per-compilation context and its data model.
//!
//! Everything the builder touches lives in one [`BspLevel`] value — flat
//! arenas of vertices, linedefs, sidedefs, sectors and segs, plus the
//! superblock pool.  Entities reference each other by arena index, never by
//! pointer, and nothing here is shared between compilations.

use bitflags::bitflags;
use glam::{DVec2, dvec2};

use crate::bsp::BspError;
use crate::bsp::node::{BspNode, BspTree, SUBSECTOR_BIT};
use crate::bsp::superblock::BlockPool;
use crate::bsp::util;
use crate::wad::level::{
    RawLinedef, RawMap, RawNode, RawSector, RawSeg, RawSidedef, RawSubsector, RawVertex,
};

pub type VertexId = usize;
pub type LinedefId = usize;
pub type SidedefId = usize;
pub type SectorId = usize;
pub type SegId = usize;
pub type SubsecId = usize;
pub type BlockId = usize;

/// Vertex / seg / linedef / sidedef tables cap out at this many entries.
pub const LIMIT_U16: usize = 65534;
/// Subsector and node tables use the top bit for the child-type flag.
pub const LIMIT_I15: usize = 32767;

/*──────────────────────────── data model ────────────────────────────*/

bitflags! {
    #[derive(Debug, Clone, Copy)]
    pub struct LinedefFlags: u16 {
        const IMPASSABLE      = 0x0001;
        const BLOCK_MONSTERS  = 0x0002;
        const TWO_SIDED       = 0x0004;
        const UPPER_UNPEGGED  = 0x0010;
        const LOWER_UNPEGGED  = 0x0020;
        const SECRET          = 0x0040;
        const BLOCK_SOUND     = 0x0080;
        const NOT_ON_MAP      = 0x0200;
        const ALREADY_ON_MAP  = 0x1000;
    }
}

/// One wall meeting a vertex.  A vertex keeps its tips sorted by ascending
/// angle, which lets [`BspLevel::vertex_check_open`] answer "what sector
/// lies in this direction" by angular bracketing.
#[derive(Clone, Copy, Debug)]
pub struct WallTip {
    /// Angle the wall makes at the vertex (degrees).
    pub angle: f64,
    /// Sector on the side of increasing angles, or `None` for one-sided.
    pub left: Option<SectorId>,
    /// Sector on the side of decreasing angles.
    pub right: Option<SectorId>,
}

#[derive(Clone, Debug)]
pub struct Vertex {
    pub pos: DVec2,

    /// Output index.  Dense and stable once pruning has run; `None` for
    /// pruned (unreferenced) vertices.
    pub index: Option<usize>,

    /// Number of linedef / seg endpoints referencing this vertex.
    pub ref_count: i32,

    /// Coincident earlier vertex, only meaningful during the dedup pass.
    pub equiv: Option<VertexId>,

    /// Wall tips, kept in increasing angular order.
    pub tips: Vec<WallTip>,

    /// Duplicate vertex carrying the second output index a split vertex
    /// needs; the round-off pass switches seg endpoints over to it.
    pub normal_dup: Option<VertexId>,
}

#[derive(Clone, Debug)]
pub struct Linedef {
    pub start: VertexId,
    pub end: VertexId,

    pub right: Option<SidedefId>,
    pub left: Option<SidedefId>,

    pub flags: LinedefFlags,
    pub special: u16,
    pub tag: i16,

    /// Marked two-sided in the flags.  Cleared at seg creation when the
    /// left sidedef turns out to be missing.
    pub two_sided: bool,

    /// Endpoints coincide within epsilon; the line is ignored entirely.
    pub zero_len: bool,

    /// Same sector on both sides (deep-water style trick); generates no
    /// segs and no wall tips.
    pub self_ref: bool,

    /// One-sided linedef used as a window effect; value is the sector seen
    /// through the back side.
    pub window_effect: Option<SectorId>,

    /// Earlier linedef this one exactly overlaps, if any.  Overlapping
    /// lines generate no segs.
    pub overlap: Option<LinedefId>,

    pub index: usize,
}

#[derive(Clone, Debug)]
pub struct Sidedef {
    /// Adjacent sector; `None` for an invalid sidedef.
    pub sector: Option<SectorId>,

    pub x_off: i16,
    pub y_off: i16,
    pub upper_tex: [u8; 8],
    pub lower_tex: [u8; 8],
    pub mid_tex: [u8; 8],

    pub index: usize,
    pub ref_count: i32,

    /// Sidedef sits on a special line (scrollers, switches); such sidedefs
    /// are never merged.
    pub on_special: bool,
}

#[derive(Clone, Debug)]
pub struct Sector {
    pub index: usize,
    pub ref_count: i32,

    pub floor_h: i16,
    pub ceil_h: i16,
    pub floor_tex: [u8; 8],
    pub ceil_tex: [u8; 8],
    pub light: i16,
    pub special: i16,
    pub tag: i16,

    /// Suppresses repeats of the "unclosed space" warning.
    pub warned_unclosed: bool,
}

/// A directed sub-span of a linedef — or a synthetic miniseg closing off a
/// partition boundary (`linedef == None`).
#[derive(Clone, Debug)]
pub struct Seg {
    pub start: VertexId,
    pub end: VertexId,

    /// Linedef this seg runs along, `None` for minisegs.
    pub linedef: Option<LinedefId>,

    /// Adjacent sector; `None` for an invalid sidedef.
    pub sector: Option<SectorId>,

    /// 0 right sidedef, 1 left.
    pub side: u16,

    /// Seg covering the same span from the other side.  One-to-one: when
    /// one of the pair is split, the partner must be split too.
    pub partner: Option<SegId>,

    /// Final output index; assigned once the seg lands in a subsector.
    pub index: Option<usize>,

    /// Integer rounding collapsed the endpoints onto one point; the seg is
    /// skipped when writing output.
    pub degenerate: bool,

    /// Superblock currently holding this seg, if any.
    pub block: Option<BlockId>,

    // precomputed geometry, valid after `recompute_seg`
    pub ps: DVec2,
    pub pe: DVec2,
    pub pd: DVec2,
    pub p_length: f64,
    pub p_angle: f64,
    pub p_para: f64,
    pub p_perp: f64,

    /// Linedef this seg originally comes from: the own linedef for real
    /// segs, the partition's linedef for minisegs (provenance only).
    pub source_line: Option<LinedefId>,
}

impl Seg {
    /// A seg with endpoints set and everything else blank; call
    /// [`BspLevel::recompute_seg`] before using it in any side test.
    pub(crate) fn blank(start: VertexId, end: VertexId) -> Seg {
        Seg {
            start,
            end,
            linedef: None,
            sector: None,
            side: 0,
            partner: None,
            index: None,
            degenerate: false,
            block: None,
            ps: DVec2::ZERO,
            pe: DVec2::ZERO,
            pd: DVec2::ZERO,
            p_length: 0.0,
            p_angle: 0.0,
            p_para: 0.0,
            p_perp: 0.0,
            source_line: None,
        }
    }

    /// Signed perpendicular distance from `p` to this seg's infinite line.
    /// Positive is the right side, negative the left.
    #[inline]
    pub fn perp_dist(&self, p: DVec2) -> f64 {
        (p.x * self.pd.y - p.y * self.pd.x + self.p_perp) / self.p_length
    }

    /// Signed distance of `p` along this seg's infinite line, measured from
    /// the seg's start.
    #[inline]
    pub fn para_dist(&self, p: DVec2) -> f64 {
        (p.x * self.pd.x + p.y * self.pd.y + self.p_para) / self.p_length
    }
}

/// Terminal leaf of the BSP tree: a convex run of segs.
#[derive(Clone, Debug, Default)]
pub struct Subsector {
    pub segs: Vec<SegId>,
    pub index: usize,
    /// Approximate middle point, used for the clockwise sort.
    pub mid: DVec2,
}

/*─────────────────────────── compilation context ───────────────────────────*/

/// All mutable state of one compilation.
#[derive(Debug, Default)]
pub struct BspLevel {
    pub vertices: Vec<Vertex>,
    pub linedefs: Vec<Linedef>,
    pub sidedefs: Vec<Sidedef>,
    pub sectors: Vec<Sector>,
    pub segs: Vec<Seg>,
    pub subsecs: Vec<Subsector>,
    pub blocks: BlockPool,

    /// Output vertex count (pruned originals + split vertices + duplexes).
    pub num_normal_vert: usize,
    /// Segs renumbered into their final, per-subsector order.
    pub num_complete_seg: usize,
}

impl BspLevel {
    /*──────────────────────────── loading ────────────────────────────*/

    /// Build the context from the raw map arrays, deriving reference counts
    /// and the per-linedef booleans the analyzer relies on.
    pub fn from_raw(raw: &RawMap) -> Result<BspLevel, BspError> {
        if raw.vertices.is_empty() {
            return Err(BspError::EmptyTable("vertices"));
        }
        if raw.sectors.is_empty() {
            return Err(BspError::EmptyTable("sectors"));
        }
        if raw.sidedefs.is_empty() {
            return Err(BspError::EmptyTable("sidedefs"));
        }
        if raw.linedefs.is_empty() {
            return Err(BspError::EmptyTable("linedefs"));
        }

        let mut lev = BspLevel::default();

        for (i, rv) in raw.vertices.iter().enumerate() {
            lev.vertices.push(Vertex {
                pos: dvec2(rv.x as f64, rv.y as f64),
                index: Some(i),
                ref_count: 0,
                equiv: None,
                tips: Vec::new(),
                normal_dup: None,
            });
        }

        for (i, rs) in raw.sectors.iter().enumerate() {
            lev.sectors.push(Sector {
                index: i,
                ref_count: 0,
                floor_h: rs.floor_h,
                ceil_h: rs.ceil_h,
                floor_tex: rs.floor_tex,
                ceil_tex: rs.ceil_tex,
                light: rs.light,
                special: rs.special,
                tag: rs.tag,
                warned_unclosed: false,
            });
        }

        for (i, rs) in raw.sidedefs.iter().enumerate() {
            let sector = match rs.sector {
                -1 => None,
                s => {
                    let s = s as u16 as usize;
                    if s >= lev.sectors.len() {
                        return Err(BspError::BadIndex {
                            kind: "sector",
                            index: s,
                            max: lev.sectors.len(),
                        });
                    }
                    lev.sectors[s].ref_count += 1;
                    Some(s)
                }
            };

            lev.sidedefs.push(Sidedef {
                sector,
                x_off: rs.x_off,
                y_off: rs.y_off,
                upper_tex: rs.top_tex,
                lower_tex: rs.bottom_tex,
                mid_tex: rs.mid_tex,
                index: i,
                ref_count: 0,
                on_special: false,
            });
        }

        for (i, rl) in raw.linedefs.iter().enumerate() {
            let start = lev.lookup_vertex(rl.v1 as u16 as usize)?;
            let end = lev.lookup_vertex(rl.v2 as u16 as usize)?;

            lev.vertices[start].ref_count += 1;
            lev.vertices[end].ref_count += 1;

            let flags = LinedefFlags::from_bits_truncate(rl.flags as u16);
            let special = rl.special as u16;

            let right = lev.lookup_sidedef(rl.sidenum[0])?;
            let left = lev.lookup_sidedef(rl.sidenum[1])?;

            for side in [right, left].into_iter().flatten() {
                lev.sidedefs[side].ref_count += 1;
                lev.sidedefs[side].on_special |= special > 0;
            }

            let delta = lev.vertices[end].pos - lev.vertices[start].pos;
            let zero_len =
                delta.x.abs() < util::DIST_EPSILON && delta.y.abs() < util::DIST_EPSILON;

            let self_ref = match (right, left) {
                (Some(r), Some(l)) => lev.sidedefs[r].sector == lev.sidedefs[l].sector,
                _ => false,
            };

            lev.linedefs.push(Linedef {
                start,
                end,
                right,
                left,
                flags,
                special,
                tag: rl.tag,
                two_sided: flags.contains(LinedefFlags::TWO_SIDED),
                zero_len,
                self_ref,
                window_effect: None,
                overlap: None,
                index: i,
            });
        }

        lev.num_normal_vert = lev.vertices.len();
        Ok(lev)
    }

    fn lookup_vertex(&self, index: usize) -> Result<VertexId, BspError> {
        if index >= self.vertices.len() {
            return Err(BspError::BadIndex {
                kind: "vertex",
                index,
                max: self.vertices.len(),
            });
        }
        Ok(index)
    }

    fn lookup_sidedef(&self, num: i16) -> Result<Option<SidedefId>, BspError> {
        if num < 0 {
            // 0xFFFF on disk
            return Ok(None);
        }
        let index = num as u16 as usize;
        if index >= self.sidedefs.len() {
            return Err(BspError::BadIndex {
                kind: "sidedef",
                index,
                max: self.sidedefs.len(),
            });
        }
        Ok(Some(index))
    }

    /*──────────────────────────── seg geometry ────────────────────────────*/

    /// Refresh a seg's cached direction, length, angle and the
    /// perpendicular / parallel distance scalars the side tests use.
    /// Must be called after *any* endpoint mutation.
    pub fn recompute_seg(&mut self, seg: SegId) -> Result<(), BspError> {
        let ps = self.vertices[self.segs[seg].start].pos;
        let pe = self.vertices[self.segs[seg].end].pos;
        let pd = pe - ps;

        let s = &mut self.segs[seg];
        s.ps = ps;
        s.pe = pe;
        s.pd = pd;
        s.p_length = util::compute_dist(pd);
        s.p_angle = util::compute_angle(pd);

        if s.p_length <= 0.0 {
            return Err(BspError::ZeroLengthSeg { seg });
        }

        s.p_perp = ps.y * pd.x - ps.x * pd.y;
        s.p_para = -ps.x * pd.x - ps.y * pd.y;
        Ok(())
    }

    /*──────────────────────────── output tables ────────────────────────────*/

    /// Serialise every table.  Runs after the finishing passes; `root` gets
    /// its node indices assigned here (post-order, right subtree first).
    pub fn save(&mut self, root: &mut BspTree) -> Result<CompiledMap, BspError> {
        Ok(CompiledMap {
            vertices: self.put_vertices()?,
            sectors: self.put_sectors()?,
            sidedefs: self.put_sidedefs()?,
            linedefs: self.put_linedefs()?,
            segs: self.put_segs()?,
            subsectors: self.put_subsecs()?,
            nodes: self.put_nodes(root)?,
        })
    }

    fn put_vertices(&self) -> Result<Vec<RawVertex>, BspError> {
        let mut out = Vec::with_capacity(self.num_normal_vert);

        for vert in self.vertices.iter().filter(|v| v.index.is_some()) {
            out.push(RawVertex {
                x: util::i_round(vert.pos.x) as i16,
                y: util::i_round(vert.pos.y) as i16,
            });
        }

        if out.len() != self.num_normal_vert {
            return Err(BspError::Miscount {
                what: "vertices",
                got: out.len(),
                want: self.num_normal_vert,
            });
        }
        check_limit("vertex", out.len(), LIMIT_U16)?;
        Ok(out)
    }

    fn put_sectors(&self) -> Result<Vec<RawSector>, BspError> {
        check_limit("sector", self.sectors.len(), LIMIT_U16)?;

        Ok(self
            .sectors
            .iter()
            .map(|s| RawSector {
                floor_h: s.floor_h,
                ceil_h: s.ceil_h,
                floor_tex: s.floor_tex,
                ceil_tex: s.ceil_tex,
                light: s.light,
                special: s.special,
                tag: s.tag,
            })
            .collect())
    }

    fn put_sidedefs(&self) -> Result<Vec<RawSidedef>, BspError> {
        check_limit("sidedef", self.sidedefs.len(), LIMIT_U16)?;

        Ok(self
            .sidedefs
            .iter()
            .map(|s| RawSidedef {
                x_off: s.x_off,
                y_off: s.y_off,
                top_tex: s.upper_tex,
                bottom_tex: s.lower_tex,
                mid_tex: s.mid_tex,
                sector: s.sector.map_or(-1, |sec| sec as i16),
            })
            .collect())
    }

    fn put_linedefs(&self) -> Result<Vec<RawLinedef>, BspError> {
        check_limit("linedef", self.linedefs.len(), LIMIT_U16)?;

        let mut out = Vec::with_capacity(self.linedefs.len());
        for line in &self.linedefs {
            let v1 = self.vertices[line.start]
                .index
                .ok_or(BspError::PrunedVertex { line: line.index })?;
            let v2 = self.vertices[line.end]
                .index
                .ok_or(BspError::PrunedVertex { line: line.index })?;

            out.push(RawLinedef {
                v1: v1 as u16 as i16,
                v2: v2 as u16 as i16,
                flags: line.flags.bits() as i16,
                special: line.special as i16,
                tag: line.tag,
                sidenum: [
                    line.right.map_or(-1, |s| s as u16 as i16),
                    line.left.map_or(-1, |s| s as u16 as i16),
                ],
            });
        }
        Ok(out)
    }

    fn put_segs(&self) -> Result<Vec<RawSeg>, BspError> {
        let mut out = Vec::with_capacity(self.num_complete_seg);

        for sub in &self.subsecs {
            for &sid in &sub.segs {
                let seg = &self.segs[sid];

                // minisegs and degenerates never appear in the output
                let Some(line_id) = seg.linedef else { continue };
                if seg.degenerate {
                    continue;
                }

                let v1 = self.vertices[seg.start]
                    .index
                    .ok_or(BspError::UnplacedSeg { seg: sid })?;
                let v2 = self.vertices[seg.end]
                    .index
                    .ok_or(BspError::UnplacedSeg { seg: sid })?;

                out.push(RawSeg {
                    v1: v1 as u16 as i16,
                    v2: v2 as u16 as i16,
                    angle: transform_angle(seg.p_angle) as i16,
                    linedef: line_id as u16 as i16,
                    side: seg.side as i16,
                    offset: self.transform_seg_dist(seg, line_id) as i16,
                });
            }
        }

        if out.len() != self.num_complete_seg {
            return Err(BspError::Miscount {
                what: "segs",
                got: out.len(),
                want: self.num_complete_seg,
            });
        }
        check_limit("seg", out.len(), LIMIT_U16)?;
        Ok(out)
    }

    fn put_subsecs(&self) -> Result<Vec<RawSubsector>, BspError> {
        check_limit("subsector", self.subsecs.len(), LIMIT_I15)?;

        let mut out = Vec::with_capacity(self.subsecs.len());
        for sub in &self.subsecs {
            let first = *sub
                .segs
                .first()
                .ok_or(BspError::EmptySubsector {
                    sub: sub.index,
                    stage: "serialised",
                })?;
            let first_index = self.segs[first]
                .index
                .ok_or(BspError::UnplacedSeg { seg: first })?;

            out.push(RawSubsector {
                seg_count: sub.segs.len() as i16,
                first_seg: first_index as u16 as i16,
            });
        }
        Ok(out)
    }

    /// Depth-first node serialisation: children before parent, right before
    /// left.  The traversal order *is* the on-disk numbering contract — the
    /// root always comes out last.
    fn put_nodes(&self, root: &mut BspTree) -> Result<Vec<RawNode>, BspError> {
        let mut out = Vec::new();
        if let BspTree::Node(node) = root {
            self.put_one_node(node, &mut out)?;
        }
        check_limit("node", out.len(), LIMIT_I15)?;
        Ok(out)
    }

    fn put_one_node(&self, node: &mut BspNode, out: &mut Vec<RawNode>) -> Result<(), BspError> {
        if let BspTree::Node(child) = &mut node.right.tree {
            self.put_one_node(child, out)?;
        }
        if let BspTree::Node(child) = &mut node.left.tree {
            self.put_one_node(child, out)?;
        }

        node.index = out.len();

        // a too-long partition stores halved deltas to fit the field width
        let shrink = if node.too_long { 2 } else { 1 };

        let child_ref = |tree: &BspTree| -> u16 {
            match tree {
                BspTree::Node(n) => n.index as u16,
                BspTree::Leaf(sub) => self.subsecs[*sub].index as u16 | SUBSECTOR_BIT,
            }
        };

        let rb = &node.right.bounds;
        let lb = &node.left.bounds;

        out.push(RawNode {
            x: util::i_round(node.x) as i16,
            y: util::i_round(node.y) as i16,
            dx: (util::i_round(node.dx) / shrink) as i16,
            dy: (util::i_round(node.dy) / shrink) as i16,
            bbox: [
                [rb.maxy as i16, rb.miny as i16, rb.minx as i16, rb.maxx as i16],
                [lb.maxy as i16, lb.miny as i16, lb.minx as i16, lb.maxx as i16],
            ],
            child: [child_ref(&node.right.tree), child_ref(&node.left.tree)],
        });
        Ok(())
    }

    /// Integer offset of a seg along `line`, measured from the
    /// sidedef-relative start of the line.
    fn transform_seg_dist(&self, seg: &Seg, line: LinedefId) -> i32 {
        let line = &self.linedefs[line];
        let anchor = if seg.side != 0 {
            self.vertices[line.end].pos
        } else {
            self.vertices[line.start].pos
        };
        util::compute_dist(self.vertices[seg.start].pos - anchor).ceil() as i32
    }
}

/// Map angle in degrees to binary angle units (full circle = 65536).
fn transform_angle(angle: f64) -> u16 {
    let mut result = (angle * 65536.0 / 360.0) as i32;
    if result < 0 {
        result += 65536;
    }
    (result & 0xFFFF) as u16
}

fn check_limit(what: &'static str, count: usize, limit: usize) -> Result<(), BspError> {
    if count > limit {
        return Err(BspError::LimitExceeded { what, count, limit });
    }
    Ok(())
}

/*─────────────────────────── compiled output ───────────────────────────*/

/// The finished per-map tables, ready for lump encoding.
///
/// The input-side tables are re-emitted too: pruning renumbers vertices,
/// so the original LINEDEFS lump would point at stale indices.
#[derive(Debug)]
pub struct CompiledMap {
    pub vertices: Vec<RawVertex>,
    pub linedefs: Vec<RawLinedef>,
    pub sidedefs: Vec<RawSidedef>,
    pub sectors: Vec<RawSector>,
    pub segs: Vec<RawSeg>,
    pub subsectors: Vec<RawSubsector>,
    pub nodes: Vec<RawNode>,
}

/*─────────────────────────────── tests ───────────────────────────────*/

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wad::level::test_support::{raw_linedef, raw_map, raw_sector, raw_sidedef};

    fn square_map() -> RawMap {
        // clockwise winding, interior on the right of every line
        raw_map(
            &[(0, 0), (0, 128), (128, 128), (128, 0)],
            &[
                raw_linedef(0, 1, 0, -1),
                raw_linedef(1, 2, 0, -1),
                raw_linedef(2, 3, 0, -1),
                raw_linedef(3, 0, 0, -1),
            ],
            &[raw_sidedef(0)],
            &[raw_sector()],
        )
    }

    #[test]
    fn load_counts_references() {
        let lev = BspLevel::from_raw(&square_map()).unwrap();

        assert_eq!(lev.vertices.len(), 4);
        assert!(lev.vertices.iter().all(|v| v.ref_count == 2));
        assert_eq!(lev.sidedefs[0].ref_count, 4);
        assert_eq!(lev.sectors[0].ref_count, 1);
        assert!(lev.linedefs.iter().all(|l| !l.zero_len && !l.self_ref));
    }

    #[test]
    fn self_referencing_line_detected() {
        let mut raw = square_map();
        // both sides of line 0 face sector 0
        raw.linedefs[0].sidenum = [0, 0];
        let lev = BspLevel::from_raw(&raw).unwrap();
        assert!(lev.linedefs[0].self_ref);
    }

    #[test]
    fn zero_length_line_detected() {
        let mut raw = square_map();
        raw.linedefs[0].v2 = raw.linedefs[0].v1;
        let lev = BspLevel::from_raw(&raw).unwrap();
        assert!(lev.linedefs[0].zero_len);
    }

    #[test]
    fn bad_sidedef_index_rejected() {
        let mut raw = square_map();
        raw.linedefs[0].sidenum[0] = 17;
        assert!(matches!(
            BspLevel::from_raw(&raw),
            Err(BspError::BadIndex { kind: "sidedef", .. })
        ));
    }

    #[test]
    fn perp_dist_signs() {
        let mut lev = BspLevel::from_raw(&square_map()).unwrap();

        // seg along the west wall, pointing north
        let s = lev.segs.len();
        lev.segs.push(Seg::blank(0, 1));
        lev.recompute_seg(s).unwrap();

        let seg = &lev.segs[s];
        assert!(seg.perp_dist(dvec2(64.0, 64.0)) > 0.0); // east: right side
        assert!(seg.perp_dist(dvec2(-64.0, 64.0)) < 0.0); // west: left side
        assert!(seg.perp_dist(dvec2(0.0, 500.0)).abs() < 1e-9); // collinear

        assert_eq!(seg.para_dist(dvec2(0.0, 0.0)), 0.0);
        assert_eq!(seg.para_dist(dvec2(0.0, 128.0)), 128.0);
        assert_eq!(seg.para_dist(dvec2(0.0, -32.0)), -32.0);
    }

    #[test]
    fn zero_length_seg_is_fatal() {
        let mut lev = BspLevel::from_raw(&square_map()).unwrap();
        let s = lev.segs.len();
        lev.segs.push(Seg::blank(2, 2));
        assert!(matches!(
            lev.recompute_seg(s),
            Err(BspError::ZeroLengthSeg { .. })
        ));
    }

    #[test]
    fn binary_angle_transform() {
        assert_eq!(transform_angle(0.0), 0);
        assert_eq!(transform_angle(90.0), 16384);
        assert_eq!(transform_angle(180.0), 32768);
        assert_eq!(transform_angle(270.0), 49152);
    }
}
