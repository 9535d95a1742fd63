//! Superblocks: a quadtree-ish spatial index over segs.
//!
//! Every active seg lives in exactly one block.  A block splits its longer
//! axis in half; a seg sinks into a sub-block only if it fits entirely on
//! one side, so crossing segs stay at the level they straddle.  Each block
//! also counts every real seg and miniseg in its whole subtree, which lets
//! the partition evaluator take an entire subtree lying on one side of a
//! candidate in one step instead of per seg.

use glam::{DVec2, dvec2};

use crate::bsp::level::{BlockId, BspLevel, Seg, SegId};
use crate::bsp::util::{DIST_EPSILON, IFFY_LEN};

/// Integer bounding box, as stored in the output nodes.
#[derive(Clone, Copy, Debug)]
pub struct Bounds {
    pub minx: i32,
    pub miny: i32,
    pub maxx: i32,
    pub maxy: i32,
}

impl Default for Bounds {
    fn default() -> Bounds {
        Bounds {
            minx: i16::MAX as i32,
            miny: i16::MAX as i32,
            maxx: i16::MIN as i32,
            maxy: i16::MIN as i32,
        }
    }
}

#[derive(Debug)]
pub struct Block {
    // coordinates on map for this block, from lower-left corner to
    // upper-right corner
    pub x1: i32,
    pub y1: i32,
    pub x2: i32,
    pub y2: i32,

    pub parent: Option<BlockId>,

    /// Sub-blocks: `[0]` has the lower coordinates, `[1]` the higher.  The
    /// longer axis is the one divided.
    pub subs: [Option<BlockId>; 2],

    /// Seg totals for this block *and* everything below it.
    pub real_num: i32,
    pub mini_num: i32,

    /// Segs held at this level (crossing the midline, or leaf residents).
    pub segs: Vec<SegId>,
}

impl Block {
    /// Blocks this small hold their segs directly.
    fn is_leaf(&self) -> bool {
        self.x2 - self.x1 <= 256 && self.y2 - self.y1 <= 256
    }
}

/// Arena of superblocks with slot recycling, so each partition level's pair
/// of child blocks reuses storage freed by earlier levels.
#[derive(Debug, Default)]
pub struct BlockPool {
    pub blocks: Vec<Block>,
    free: Vec<BlockId>,
}

impl BlockPool {
    pub fn alloc(
        &mut self,
        x1: i32,
        y1: i32,
        x2: i32,
        y2: i32,
        parent: Option<BlockId>,
    ) -> BlockId {
        let block = Block {
            x1,
            y1,
            x2,
            y2,
            parent,
            subs: [None, None],
            real_num: 0,
            mini_num: 0,
            segs: Vec::new(),
        };

        match self.free.pop() {
            Some(id) => {
                self.blocks[id] = block;
                id
            }
            None => {
                self.blocks.push(block);
                self.blocks.len() - 1
            }
        }
    }

    /// Return a block and all its sub-blocks to the free list.
    pub fn free_tree(&mut self, root: BlockId) {
        let mut stack = vec![root];
        while let Some(id) = stack.pop() {
            let block = &mut self.blocks[id];
            block.segs.clear();
            stack.extend(block.subs.iter().flatten());
            block.subs = [None, None];
            self.free.push(id);
        }
    }
}

/// Side of `part`'s infinite line a point lies on.
/// Returns -1 for left, +1 for right, or 0 for on the line.
pub fn point_on_line_side(part: &Seg, p: DVec2) -> i32 {
    let perp = part.perp_dist(p);

    if perp.abs() <= DIST_EPSILON {
        return 0;
    }
    if perp < 0.0 { -1 } else { 1 }
}

/// Side of `part` an entire block lies on, or 0 when the line passes
/// through it.  The box is inflated a little so segs near its edge are
/// never misjudged wholesale.
pub fn box_on_line_side(block: &Block, part: &Seg) -> i32 {
    let x1 = block.x1 as f64 - IFFY_LEN * 1.5;
    let y1 = block.y1 as f64 - IFFY_LEN * 1.5;
    let x2 = block.x2 as f64 + IFFY_LEN * 1.5;
    let y2 = block.y2 as f64 + IFFY_LEN * 1.5;

    let (mut p1, mut p2);

    // handle simple cases (vertical & horizontal lines)
    if part.pd.x == 0.0 {
        p1 = if x1 > part.ps.x { 1 } else { -1 };
        p2 = if x2 > part.ps.x { 1 } else { -1 };

        if part.pd.y < 0.0 {
            p1 = -p1;
            p2 = -p2;
        }
    } else if part.pd.y == 0.0 {
        p1 = if y1 < part.ps.y { 1 } else { -1 };
        p2 = if y2 < part.ps.y { 1 } else { -1 };

        if part.pd.x < 0.0 {
            p1 = -p1;
            p2 = -p2;
        }
    } else if part.pd.x * part.pd.y > 0.0 {
        // positive slope: the extreme corners are upper-left / lower-right
        p1 = point_on_line_side(part, dvec2(x1, y2));
        p2 = point_on_line_side(part, dvec2(x2, y1));
    } else {
        // negative slope
        p1 = point_on_line_side(part, dvec2(x1, y1));
        p2 = point_on_line_side(part, dvec2(x2, y2));
    }

    if p1 == p2 { p1 } else { 0 }
}

impl BspLevel {
    /// Sink a seg into the superblock tree rooted at `block`.  Counts are
    /// bumped at every level passed through, leaving the subtree totals
    /// consistent by construction.
    pub fn add_seg_to_super(&mut self, mut block: BlockId, seg: SegId) {
        let is_real = self.segs[seg].linedef.is_some();
        let sp = self.vertices[self.segs[seg].start].pos;
        let ep = self.vertices[self.segs[seg].end].pos;

        loop {
            let b = &mut self.blocks.blocks[block];
            if is_real {
                b.real_num += 1;
            } else {
                b.mini_num += 1;
            }

            let (x1, y1, x2, y2) = (b.x1, b.y1, b.x2, b.y2);
            let x_mid = (x1 + x2) / 2;
            let y_mid = (y1 + y2) / 2;
            let wide = x2 - x1 >= y2 - y1;

            if b.is_leaf() {
                b.segs.push(seg);
                self.segs[seg].block = Some(block);
                return;
            }

            let (p1, p2) = if wide {
                (sp.x >= x_mid as f64, ep.x >= x_mid as f64)
            } else {
                (sp.y >= y_mid as f64, ep.y >= y_mid as f64)
            };

            let child = match (p1, p2) {
                (true, true) => 1,
                (false, false) => 0,
                _ => {
                    // crosses the midline, keep it at this level
                    self.blocks.blocks[block].segs.push(seg);
                    self.segs[seg].block = Some(block);
                    return;
                }
            };

            block = match self.blocks.blocks[block].subs[child] {
                Some(sub) => sub,
                None => {
                    let hi = child == 1;
                    let (sx1, sy1, sx2, sy2) = if wide {
                        (if hi { x_mid } else { x1 }, y1, if hi { x2 } else { x_mid }, y2)
                    } else {
                        (x1, if hi { y_mid } else { y1 }, x2, if hi { y2 } else { y_mid })
                    };
                    let sub = self.blocks.alloc(sx1, sy1, sx2, sy2, Some(block));
                    self.blocks.blocks[block].subs[child] = Some(sub);
                    sub
                }
            };
        }
    }

    /// A split created one extra seg inside `block`'s subtree without going
    /// through [`add_seg_to_super`]; patch the totals from there up to the
    /// root.
    pub fn split_seg_accounting(&mut self, block: BlockId, is_real: bool) {
        let mut cur = Some(block);
        while let Some(b) = cur {
            if is_real {
                self.blocks.blocks[b].real_num += 1;
            } else {
                self.blocks.blocks[b].mini_num += 1;
            }
            cur = self.blocks.blocks[b].parent;
        }
    }

    /// Bounding box of every seg in the subtree, at integer precision
    /// (floor the low edge, ceil the high edge).
    pub fn find_limits(&self, block: BlockId, bbox: &mut Bounds) {
        let b = &self.blocks.blocks[block];

        for &seg in &b.segs {
            let p1 = self.vertices[self.segs[seg].start].pos;
            let p2 = self.vertices[self.segs[seg].end].pos;

            let lx = p1.x.min(p2.x).floor() as i32;
            let ly = p1.y.min(p2.y).floor() as i32;
            let hx = p1.x.max(p2.x).ceil() as i32;
            let hy = p1.y.max(p2.y).ceil() as i32;

            bbox.minx = bbox.minx.min(lx);
            bbox.miny = bbox.miny.min(ly);
            bbox.maxx = bbox.maxx.max(hx);
            bbox.maxy = bbox.maxy.max(hy);
        }

        for sub in b.subs.into_iter().flatten() {
            self.find_limits(sub, bbox);
        }
    }

    /// Integer map extent, from the endpoints of every non-degenerate
    /// linedef.
    pub fn map_bounds(&self) -> Bounds {
        let mut bbox = Bounds::default();

        for line in &self.linedefs {
            if line.zero_len {
                continue;
            }
            for v in [line.start, line.end] {
                let p = self.vertices[v].pos;
                bbox.minx = bbox.minx.min(p.x.floor() as i32);
                bbox.miny = bbox.miny.min(p.y.floor() as i32);
                bbox.maxx = bbox.maxx.max(p.x.ceil() as i32);
                bbox.maxy = bbox.maxy.max(p.y.ceil() as i32);
            }
        }

        bbox
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bsp::level::Vertex;
    use crate::wad::level::test_support::{raw_linedef, raw_map, raw_sector, raw_sidedef};
    use glam::dvec2;

    fn wide_level() -> BspLevel {
        // a 1024-wide strip so the root block subdivides a few times
        let raw = raw_map(
            &[(0, 0), (0, 128), (1024, 128), (1024, 0)],
            &[
                raw_linedef(0, 1, 0, -1),
                raw_linedef(1, 2, 0, -1),
                raw_linedef(2, 3, 0, -1),
                raw_linedef(3, 0, 0, -1),
            ],
            &[raw_sidedef(0)],
            &[raw_sector()],
        );
        BspLevel::from_raw(&raw).unwrap()
    }

    fn root_for(lev: &mut BspLevel) -> BlockId {
        let b = lev.map_bounds();
        lev.blocks
            .alloc(b.minx, b.miny, b.minx + 1024, b.miny + 1024, None)
    }

    fn push_seg(lev: &mut BspLevel, start: usize, end: usize, real: bool) -> SegId {
        let id = lev.segs.len();
        let mut seg = Seg::blank(start, end);
        seg.linedef = if real { Some(0) } else { None };
        lev.segs.push(seg);
        lev.recompute_seg(id).unwrap();
        id
    }

    fn add_super(lev: &mut BspLevel, root: BlockId, start: usize, end: usize, real: bool) -> SegId {
        let id = push_seg(lev, start, end, real);
        lev.add_seg_to_super(root, id);
        id
    }

    fn push_vertex(lev: &mut BspLevel, x: f64, y: f64) -> usize {
        lev.vertices.push(Vertex {
            pos: dvec2(x, y),
            index: None,
            ref_count: 0,
            equiv: None,
            tips: Vec::new(),
            normal_dup: None,
        });
        lev.vertices.len() - 1
    }

    fn bare_block(x1: i32, y1: i32, x2: i32, y2: i32) -> Block {
        Block {
            x1,
            y1,
            x2,
            y2,
            parent: None,
            subs: [None, None],
            real_num: 0,
            mini_num: 0,
            segs: Vec::new(),
        }
    }

    #[test]
    fn seg_sinks_into_fitting_subblock() {
        let mut lev = wide_level();
        let root = root_for(&mut lev);

        // west wall: entirely in the low-x half
        let seg = add_super(&mut lev, root, 0, 1, true);
        let home = lev.segs[seg].block.unwrap();
        assert_ne!(home, root);
        assert!(lev.blocks.blocks[home].x2 <= 512);

        // totals visible from the root
        assert_eq!(lev.blocks.blocks[root].real_num, 1);
        assert_eq!(lev.blocks.blocks[root].mini_num, 0);
    }

    #[test]
    fn crossing_seg_stays_at_top() {
        let mut lev = wide_level();
        let root = root_for(&mut lev);

        // south wall spans the x midline
        let seg = add_super(&mut lev, root, 0, 3, true);
        assert_eq!(lev.segs[seg].block, Some(root));
        assert_eq!(lev.blocks.blocks[root].segs, vec![seg]);
    }

    #[test]
    fn split_accounting_updates_ancestors() {
        let mut lev = wide_level();
        let root = root_for(&mut lev);

        let seg = add_super(&mut lev, root, 0, 1, false);
        let home = lev.segs[seg].block.unwrap();

        lev.split_seg_accounting(home, false);
        assert_eq!(lev.blocks.blocks[root].mini_num, 2);
        assert_eq!(lev.blocks.blocks[home].mini_num, 2);
    }

    #[test]
    fn box_side_tests() {
        let mut lev = wide_level();

        // vertical partition at x=512 pointing north: right side is +x
        let a = push_vertex(&mut lev, 512.0, 0.0);
        let b = push_vertex(&mut lev, 512.0, 128.0);
        let part = push_seg(&mut lev, a, b, true);

        let east = bare_block(600, 0, 856, 256);
        let west = bare_block(0, 0, 256, 256);
        let straddle = bare_block(384, 0, 640, 256);

        assert_eq!(box_on_line_side(&east, &lev.segs[part]), 1);
        assert_eq!(box_on_line_side(&west, &lev.segs[part]), -1);
        assert_eq!(box_on_line_side(&straddle, &lev.segs[part]), 0);
    }

    #[test]
    fn pool_recycles_freed_slots() {
        let mut pool = BlockPool::default();
        let a = pool.alloc(0, 0, 512, 512, None);
        let b = pool.alloc(0, 0, 256, 512, Some(a));
        pool.blocks[a].subs[0] = Some(b);

        pool.free_tree(a);
        let c = pool.alloc(0, 0, 1024, 1024, None);
        assert!(c == a || c == b);
        assert_eq!(pool.blocks.len(), 2);
    }

    #[test]
    fn limits_cover_all_segs() {
        let mut lev = wide_level();
        let root = root_for(&mut lev);
        add_super(&mut lev, root, 0, 1, true);
        add_super(&mut lev, root, 2, 3, true);

        let mut bbox = Bounds::default();
        lev.find_limits(root, &mut bbox);

        assert_eq!((bbox.minx, bbox.miny), (0, 0));
        assert_eq!((bbox.maxx, bbox.maxy), (1024, 128));
    }
}
