//! Tree construction and the finishing passes over the built tree.

use glam::DVec2;
use smallvec::SmallVec;

use crate::bsp::BspError;
use crate::bsp::level::{BlockId, BspLevel, LinedefId, Seg, SegId, SubsecId, Subsector};
use crate::bsp::superblock::Bounds;
use crate::bsp::util::{self, ANG_EPSILON};

/// Marks a node child reference as a subsector in the output format.
pub const SUBSECTOR_BIT: u16 = 0x8000;

/// Either an interior node or a convex leaf.
#[derive(Debug)]
pub enum BspTree {
    Node(Box<BspNode>),
    Leaf(SubsecId),
}

#[derive(Debug)]
pub struct BspChild {
    pub tree: BspTree,
    /// Bounding box of every seg on this side, frozen at division time.
    pub bounds: Bounds,
}

#[derive(Debug)]
pub struct BspNode {
    // partition line as point + delta, taken from the partition seg's
    // linedef (full precision, unlike the seg which may be a fragment)
    pub x: f64,
    pub y: f64,
    pub dx: f64,
    pub dy: f64,

    /// Delta overflows the output field width; halved when written.
    pub too_long: bool,

    /// Output index, assigned during serialisation.
    pub index: usize,

    pub right: BspChild,
    pub left: BspChild,
}

impl BspLevel {
    fn create_one_seg(
        &mut self,
        line: LinedefId,
        start: usize,
        end: usize,
        sidedef: usize,
        side_num: u16,
    ) -> Result<SegId, BspError> {
        let id = self.segs.len();

        let mut seg = Seg::blank(start, end);
        seg.linedef = Some(line);
        seg.side = side_num;
        seg.sector = self.sidedefs[sidedef].sector;
        seg.source_line = Some(line);

        self.segs.push(seg);
        self.recompute_seg(id)?;
        Ok(id)
    }

    /// Create the initial segs, one per sidedef, and index them all in a
    /// fresh superblock tree sized to the map (lower corner aligned down
    /// to 8 units, sides a power-of-two multiple of 128).
    pub fn create_segs(&mut self) -> Result<BlockId, BspError> {
        let bbox = self.map_bounds();

        let block_x = bbox.minx - (bbox.minx & 0x7);
        let block_y = bbox.miny - (bbox.miny & 0x7);
        let bw = (bbox.maxx - block_x) / 128 + 1;
        let bh = (bbox.maxy - block_y) / 128 + 1;

        let root = self.blocks.alloc(
            block_x,
            block_y,
            block_x + 128 * util::round_pow2(bw),
            block_y + 128 * util::round_pow2(bh),
            None,
        );

        for line in 0..self.linedefs.len() {
            let l = &self.linedefs[line];
            if l.zero_len || l.overlap.is_some() || l.self_ref {
                continue;
            }

            let (start, end) = (l.start, l.end);
            let (right_side, left_side) = (l.right, l.left);

            let mut right = None;
            if let Some(side) = right_side {
                let seg = self.create_one_seg(line, start, end, side, 0)?;
                self.add_seg_to_super(root, seg);
                right = Some(seg);
            }

            if let Some(side) = left_side {
                let seg = self.create_one_seg(line, end, start, side, 1)?;
                self.add_seg_to_super(root, seg);

                if let Some(right) = right {
                    self.segs[seg].partner = Some(right);
                    self.segs[right].partner = Some(seg);
                }
            } else if self.linedefs[line].two_sided {
                // flagged two-sided but the back side is missing
                self.linedefs[line].two_sided = false;
            }
        }

        Ok(root)
    }

    /// Recursively partition the seg set.  When no usable partition
    /// exists the set is convex and becomes a subsector leaf.
    pub fn build_nodes(&mut self, block: BlockId) -> Result<BspTree, BspError> {
        let Some((best, best_line)) = self.pick_node(block) else {
            return Ok(BspTree::Leaf(self.create_subsec(block)?));
        };

        let b = &self.blocks.blocks[block];
        let (x1, y1, x2, y2) = (b.x1, b.y1, b.x2, b.y2);
        let lefts = self.blocks.alloc(x1, y1, x2, y2, None);
        let rights = self.blocks.alloc(x1, y1, x2, y2, None);

        let mut cuts = Vec::new();
        self.separate_segs(block, best, lefts, rights, &mut cuts)?;

        let r = &self.blocks.blocks[rights];
        if r.real_num + r.mini_num == 0 {
            return Err(BspError::EmptySide { side: "right" });
        }
        let l = &self.blocks.blocks[lefts];
        if l.real_num + l.mini_num == 0 {
            return Err(BspError::EmptySide { side: "left" });
        }

        self.add_minisegs(best, lefts, rights, cuts)?;

        // the node's line comes from the linedef, oriented so the seg's
        // facing matches the right side
        let best_seg = &self.segs[best];
        let line = &self.linedefs[best_line];
        let (from, to) = if best_seg.side == 0 {
            (line.start, line.end)
        } else {
            (line.end, line.start)
        };
        let p1 = self.vertices[from].pos;
        let p2 = self.vertices[to].pos;
        let too_long = best_seg.p_length >= 30000.0;

        let mut right_bounds = Bounds::default();
        let mut left_bounds = Bounds::default();
        self.find_limits(rights, &mut right_bounds);
        self.find_limits(lefts, &mut left_bounds);

        let left_tree = self.build_nodes(lefts)?;
        self.blocks.free_tree(lefts);

        let right_tree = self.build_nodes(rights)?;
        self.blocks.free_tree(rights);

        Ok(BspTree::Node(Box::new(BspNode {
            x: p1.x,
            y: p1.y,
            dx: p2.x - p1.x,
            dy: p2.y - p1.y,
            too_long,
            index: 0,
            right: BspChild { tree: right_tree, bounds: right_bounds },
            left: BspChild { tree: left_tree, bounds: left_bounds },
        })))
    }

    fn create_subsec_worker(&mut self, sub: SubsecId, block: BlockId) -> Result<(), BspError> {
        let list = std::mem::take(&mut self.blocks.blocks[block].segs);
        for seg in &list {
            self.segs[*seg].block = None;
        }
        self.subsecs[sub].segs.extend(list);

        for num in 0..2 {
            if let Some(child) = self.blocks.blocks[block].subs[num] {
                self.create_subsec_worker(sub, child)?;

                let c = &self.blocks.blocks[child];
                if c.real_num + c.mini_num > 0 {
                    return Err(BspError::ChildNotEmpty);
                }

                self.blocks.free_tree(child);
                self.blocks.blocks[block].subs[num] = None;
            }
        }

        self.blocks.blocks[block].real_num = 0;
        self.blocks.blocks[block].mini_num = 0;
        Ok(())
    }

    fn create_subsec(&mut self, block: BlockId) -> Result<SubsecId, BspError> {
        let sub = self.subsecs.len();
        self.subsecs.push(Subsector::default());
        self.subsecs[sub].index = sub;

        self.create_subsec_worker(sub, block)?;
        self.determine_middle(sub);
        Ok(sub)
    }

    fn determine_middle(&mut self, sub: SubsecId) {
        let mut mid = DVec2::ZERO;
        let mut total = 0;

        for &seg in &self.subsecs[sub].segs {
            mid += self.vertices[self.segs[seg].start].pos;
            mid += self.vertices[self.segs[seg].end].pos;
            total += 2;
        }

        if total > 0 {
            self.subsecs[sub].mid = mid / total as f64;
        }
    }

    /// Sort a subsector's segs into clockwise order (descending angle of
    /// each start vertex around the middle point), then rotate the list so
    /// the most representative seg comes first.  The engine reads the
    /// subsector's sector off the first seg, so minisegs and trick
    /// linedefs make bad leaders.
    fn clockwise_order(&mut self, sub: SubsecId) {
        let mut array: SmallVec<[SegId; 32]> =
            self.subsecs[sub].segs.iter().copied().collect();
        let total = array.len();
        let mid = self.subsecs[sub].mid;

        // the now famous "double bubble" sort
        let mut i = 0;
        while i + 1 < total {
            let angle1 =
                util::compute_angle(self.vertices[self.segs[array[i]].start].pos - mid);
            let angle2 =
                util::compute_angle(self.vertices[self.segs[array[i + 1]].start].pos - mid);

            if angle1 + ANG_EPSILON < angle2 {
                array.swap(i, i + 1);
                if i > 0 {
                    i -= 1;
                }
            } else {
                i += 1;
            }
        }

        let mut first = 0;
        let mut score = -1;

        for (i, &seg) in array.iter().enumerate() {
            let cur_score = match self.segs[seg].linedef {
                None => 0,
                Some(l) if self.linedefs[l].window_effect.is_some() => 1,
                Some(l) if self.linedefs[l].self_ref => 2,
                Some(_) => 3,
            };

            if cur_score > score {
                first = i;
                score = cur_score;
            }
        }

        self.subsecs[sub].segs = (0..total).map(|i| array[(i + first) % total]).collect();
    }

    fn renumber_subsec_segs(&mut self, sub: SubsecId) {
        for i in 0..self.subsecs[sub].segs.len() {
            let seg = self.subsecs[sub].segs[i];
            self.segs[seg].index = Some(self.num_complete_seg);
            self.num_complete_seg += 1;
        }
    }

    pub fn clockwise_bsp_tree(&mut self) {
        self.num_complete_seg = 0;

        for sub in 0..self.subsecs.len() {
            self.clockwise_order(sub);
            self.renumber_subsec_segs(sub);
        }
    }

    fn round_off_subsector(&mut self, sub: SubsecId) -> Result<(), BspError> {
        let mut last_real_degen = None;
        let mut real_total = 0;

        for i in 0..self.subsecs[sub].segs.len() {
            let seg = self.subsecs[sub].segs[i];

            // switch to the duplex vertices, which carry the rounded
            // output indices for split points
            if let Some(dup) = self.vertices[self.segs[seg].start].normal_dup {
                self.segs[seg].start = dup;
            }
            if let Some(dup) = self.vertices[self.segs[seg].end].normal_dup {
                self.segs[seg].end = dup;
            }

            let sp = self.vertices[self.segs[seg].start].pos;
            let ep = self.vertices[self.segs[seg].end].pos;

            if util::i_round(sp.x) == util::i_round(ep.x)
                && util::i_round(sp.y) == util::i_round(ep.y)
            {
                self.segs[seg].degenerate = true;

                if self.segs[seg].linedef.is_some() {
                    last_real_degen = Some(seg);
                }
                continue;
            }

            if self.segs[seg].linedef.is_some() {
                real_total += 1;
            }
        }

        // hopefully rare: every real seg rounded into a point.  Revive the
        // last one by nudging its end vertex off the start's integer
        // position.
        if real_total == 0 {
            let seg = last_real_degen.ok_or(BspError::NoRealSegs {
                sub: self.subsecs[sub].index,
            })?;

            let (start, end) = (self.segs[seg].start, self.segs[seg].end);
            let vert = self.new_vertex_degenerate(start, end)?;

            self.segs[seg].end = vert;
            self.segs[seg].degenerate = false;
        }

        let kept: Vec<SegId> = self.subsecs[sub]
            .segs
            .iter()
            .copied()
            .filter(|&s| !self.segs[s].degenerate)
            .collect();

        if kept.is_empty() {
            return Err(BspError::EmptySubsector {
                sub: self.subsecs[sub].index,
                stage: "rounded off",
            });
        }

        self.subsecs[sub].segs = kept;
        Ok(())
    }

    /// Move every seg endpoint to output precision and drop the segs that
    /// collapse to a point in the process.
    pub fn round_off_bsp_tree(&mut self) -> Result<(), BspError> {
        self.num_complete_seg = 0;

        for sub in 0..self.subsecs.len() {
            self.round_off_subsector(sub)?;
            self.renumber_subsec_segs(sub);
        }
        Ok(())
    }

    fn normalise_subsector(&mut self, sub: SubsecId) -> Result<(), BspError> {
        let kept: Vec<SegId> = self.subsecs[sub]
            .segs
            .iter()
            .copied()
            .filter(|&s| self.segs[s].linedef.is_some())
            .collect();

        if kept.is_empty() {
            return Err(BspError::EmptySubsector {
                sub: self.subsecs[sub].index,
                stage: "normalised",
            });
        }

        self.subsecs[sub].segs = kept;
        Ok(())
    }

    /// Strip the minisegs; they were scaffolding for the build and don't
    /// appear in the output.
    pub fn normalise_bsp_tree(&mut self) -> Result<(), BspError> {
        self.num_complete_seg = 0;

        for sub in 0..self.subsecs.len() {
            self.normalise_subsector(sub)?;
            self.renumber_subsec_segs(sub);
        }
        Ok(())
    }
}
