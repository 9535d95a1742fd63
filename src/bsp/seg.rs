//! Partition selection and seg division.
//!
//! The evaluator and the divider *must* classify segs identically, or a
//! partition judged usable could separate into an empty half.  Both follow
//! the same sequence: collinear first, then wholly-right, wholly-left, and
//! only then a split.

use std::mem;

use glam::{DVec2, dvec2};

use crate::bsp::BspError;
use crate::bsp::level::{BlockId, BspLevel, LinedefId, Seg, SegId, VertexId};
use crate::bsp::superblock::box_on_line_side;
use crate::bsp::util::{DIST_EPSILON, IFFY_LEN};

// cost tuning; splits hurt most, and a split landing near a seg's end
// (which rounds into a degenerate sliver) hurts even more
const SPLIT_COST: i32 = 100;
const IFFY_SPLIT_EXTRA: i32 = 140;
const RIGHT_NEAR_MISS_COST: i32 = 100;
const LEFT_NEAR_MISS_COST: i32 = 70;
const BALANCE_COST: i32 = 100;
const MINI_BALANCE_COST: i32 = 50;
const DIAGONAL_COST: i32 = 25;

#[derive(Debug, Default)]
struct EvalInfo {
    cost: i32,
    splits: i32,
    iffy: i32,
    near_miss: i32,

    real_left: i32,
    real_right: i32,
    mini_left: i32,
    mini_right: i32,
}

/// A point where the partition line crosses something, ordered along the
/// partition.  Adjacent open cuts later become miniseg pairs.
#[derive(Clone, Debug)]
pub struct Cut {
    pub vertex: VertexId,
    /// Distance along the partition line, from its start.
    pub along_dist: f64,
    pub self_ref: bool,
    /// Sector open towards the partition start, `None` when closed.
    pub before: Option<usize>,
    /// Sector open towards the partition end.
    pub after: Option<usize>,
}

impl BspLevel {
    /// Returns true when the running cost already exceeds the best known
    /// partition, so the caller can bail out of this candidate early.
    fn eval_partition_internal(
        &self,
        block: BlockId,
        part: SegId,
        best_cost: i32,
        info: &mut EvalInfo,
    ) -> bool {
        let b = &self.blocks.blocks[block];
        let p = &self.segs[part];

        // whole-block shortcut: when the partition misses the block's box
        // entirely, every seg inside goes to that side at once
        let side = box_on_line_side(b, p);
        if side < 0 {
            info.real_left += b.real_num;
            info.mini_left += b.mini_num;
            return false;
        }
        if side > 0 {
            info.real_right += b.real_num;
            info.mini_right += b.mini_num;
            return false;
        }

        for &check_id in &b.segs {
            if info.cost > best_cost {
                return true;
            }

            let check = &self.segs[check_id];

            let (a, c) = if check.source_line == p.source_line {
                (0.0, 0.0)
            } else {
                (p.perp_dist(check.ps), p.perp_dist(check.pe))
            };
            let (fa, fc) = (a.abs(), c.abs());
            let is_real = check.linedef.is_some();

            // runs along the partition line; direction decides the side
            if fa <= DIST_EPSILON && fc <= DIST_EPSILON {
                if check.pd.dot(p.pd) < 0.0 {
                    tally(&mut info.real_left, &mut info.mini_left, is_real);
                } else {
                    tally(&mut info.real_right, &mut info.mini_right, is_real);
                }
                continue;
            }

            // wholly on the right side
            if a > -DIST_EPSILON && c > -DIST_EPSILON {
                tally(&mut info.real_right, &mut info.mini_right, is_real);

                if (a >= IFFY_LEN && c >= IFFY_LEN)
                    || (a <= DIST_EPSILON && c >= IFFY_LEN)
                    || (c <= DIST_EPSILON && a >= IFFY_LEN)
                {
                    continue;
                }

                info.near_miss += 1;

                // the closer the miss, the higher the cost
                let qnty = if a <= DIST_EPSILON || c <= DIST_EPSILON {
                    IFFY_LEN / a.max(c)
                } else {
                    IFFY_LEN / a.min(c)
                };
                info.cost += (RIGHT_NEAR_MISS_COST as f64 * (qnty * qnty - 1.0)) as i32;
                continue;
            }

            // wholly on the left side
            if a < DIST_EPSILON && c < DIST_EPSILON {
                tally(&mut info.real_left, &mut info.mini_left, is_real);

                if (a <= -IFFY_LEN && c <= -IFFY_LEN)
                    || (a >= -DIST_EPSILON && c <= -IFFY_LEN)
                    || (c >= -DIST_EPSILON && a <= -IFFY_LEN)
                {
                    continue;
                }

                info.near_miss += 1;

                let qnty = if a >= -DIST_EPSILON || c >= -DIST_EPSILON {
                    IFFY_LEN / -a.min(c)
                } else {
                    IFFY_LEN / -a.max(c)
                };
                info.cost += (LEFT_NEAR_MISS_COST as f64 * (qnty * qnty - 1.0)) as i32;
                continue;
            }

            // endpoints on opposite sides: the partition splits this seg
            info.splits += 1;
            info.cost += SPLIT_COST;

            // a split point very near one end produces a really short
            // piece, which tends to round into a degenerate
            if fa < IFFY_LEN || fc < IFFY_LEN {
                info.iffy += 1;

                let qnty = IFFY_LEN / fa.min(fc);
                info.cost += (IFFY_SPLIT_EXTRA as f64 * (qnty * qnty - 1.0)) as i32;
            }
        }

        for sub in b.subs.into_iter().flatten() {
            if self.eval_partition_internal(sub, part, best_cost, info) {
                return true;
            }
        }

        false
    }

    /// Cost of using `part` as the partition, or `None` when it is
    /// unusable (a side would end up without any real seg) or already
    /// worse than `best_cost`.
    fn eval_partition(&self, block: BlockId, part: SegId, best_cost: i32) -> Option<i32> {
        let mut info = EvalInfo::default();

        if self.eval_partition_internal(block, part, best_cost, &mut info) {
            return None;
        }

        if info.real_left == 0 || info.real_right == 0 {
            return None;
        }

        let mut cost = info.cost;
        cost += BALANCE_COST * (info.real_left - info.real_right).abs();
        cost += MINI_BALANCE_COST * (info.mini_left - info.mini_right).abs();

        // slight preference for axis-aligned partitions
        let p = &self.segs[part];
        if p.pd.x != 0.0 && p.pd.y != 0.0 {
            cost += DIAGONAL_COST;
        }

        Some(cost)
    }

    fn pick_node_internal(
        &self,
        part_list: BlockId,
        seg_list: BlockId,
        best: &mut Option<(SegId, LinedefId)>,
        best_cost: &mut i32,
    ) {
        let b = &self.blocks.blocks[part_list];

        for &part in &b.segs {
            // minisegs make poor partitions
            let Some(line) = self.segs[part].linedef else {
                continue;
            };

            if let Some(cost) = self.eval_partition(seg_list, part, *best_cost)
                && cost < *best_cost
            {
                *best_cost = cost;
                *best = Some((part, line));
            }
        }

        for sub in b.subs.into_iter().flatten() {
            self.pick_node_internal(sub, seg_list, best, best_cost);
        }
    }

    /// Best partition candidate (and its linedef) among the segs, or
    /// `None` when no usable partition exists, i.e. the set is convex.
    pub fn pick_node(&self, seg_list: BlockId) -> Option<(SegId, LinedefId)> {
        let mut best = None;
        let mut best_cost = i32::MAX;

        self.pick_node_internal(seg_list, seg_list, &mut best, &mut best_cost);
        best
    }

    /// Where `cur` crosses `part`'s infinite line, given the signed
    /// distances of cur's endpoints.  Axis-aligned combinations are taken
    /// exactly, which kills a whole class of slime-trail artifacts.
    fn compute_intersection(
        &self,
        cur: SegId,
        part: SegId,
        perp_c: f64,
        perp_d: f64,
    ) -> DVec2 {
        let cur = &self.segs[cur];
        let part = &self.segs[part];

        if part.pd.y == 0.0 && cur.pd.x == 0.0 {
            return dvec2(cur.ps.x, part.ps.y);
        }
        if part.pd.x == 0.0 && cur.pd.y == 0.0 {
            return dvec2(part.ps.x, cur.ps.y);
        }

        // 0 = start, 1 = end
        let ds = perp_c / (perp_c - perp_d);

        let x = if cur.pd.x == 0.0 { cur.ps.x } else { cur.ps.x + cur.pd.x * ds };
        let y = if cur.pd.y == 0.0 { cur.ps.y } else { cur.ps.y + cur.pd.y * ds };

        dvec2(x, y)
    }

    /// Record a cut of the partition line at `vert`, keeping the list
    /// ordered by distance along the partition.  Duplicate vertices are
    /// ignored.
    fn add_intersection(
        &mut self,
        cuts: &mut Vec<Cut>,
        vert: VertexId,
        part: SegId,
        self_ref: bool,
    ) -> Result<(), BspError> {
        if cuts.iter().any(|c| c.vertex == vert) {
            return Ok(());
        }

        let pd = self.segs[part].pd;
        let along_dist = self.segs[part].para_dist(self.vertices[vert].pos);

        let before = self.vertex_check_open(vert, -pd)?;
        let after = self.vertex_check_open(vert, pd)?;

        let pos = cuts
            .iter()
            .position(|c| along_dist < c.along_dist)
            .unwrap_or(cuts.len());

        cuts.insert(pos, Cut { vertex: vert, along_dist, self_ref, before, after });
        Ok(())
    }

    /// Split `old` at `pos`.  The old seg keeps its start and is
    /// shortened; the returned seg is the cut-off tail.  A partner seg is
    /// split in lockstep, its new piece going into the partner's current
    /// superblock, and subtree totals are patched for both.
    pub(crate) fn split_seg(&mut self, old: SegId, pos: DVec2) -> Result<SegId, BspError> {
        if let Some(b) = self.segs[old].block {
            let is_real = self.segs[old].linedef.is_some();
            self.split_seg_accounting(b, is_real);
        }

        let new_vert = self.new_vertex_from_split_seg(old, pos);

        let new_seg = self.segs.len();
        let copy = self.segs[old].clone();
        self.segs.push(copy);

        self.segs[old].end = new_vert;
        self.recompute_seg(old)?;

        self.segs[new_seg].start = new_vert;
        self.recompute_seg(new_seg)?;

        if let Some(partner) = self.segs[old].partner {
            if let Some(b) = self.segs[partner].block {
                let is_real = self.segs[partner].linedef.is_some();
                self.split_seg_accounting(b, is_real);
            }

            let buddy = self.segs.len();
            let copy = self.segs[partner].clone();
            self.segs.push(copy);

            // keep the partner relationship valid
            self.segs[buddy].partner = Some(new_seg);
            self.segs[new_seg].partner = Some(buddy);

            self.segs[partner].start = new_vert;
            self.recompute_seg(partner)?;

            self.segs[buddy].end = new_vert;
            self.recompute_seg(buddy)?;

            // the new piece joins the partner in whatever block it is in
            if let Some(b) = self.segs[partner].block {
                self.blocks.blocks[b].segs.push(buddy);
            }
        }

        Ok(new_seg)
    }

    /// Put one seg on the correct side of the partition, splitting it when
    /// it straddles, and recording any cut of the partition line.
    fn divide_one_seg(
        &mut self,
        cur: SegId,
        part: SegId,
        lefts: BlockId,
        rights: BlockId,
        cuts: &mut Vec<Cut>,
    ) -> Result<(), BspError> {
        let (mut a, mut c) = {
            let p = &self.segs[part];
            let s = &self.segs[cur];
            (p.perp_dist(s.ps), p.perp_dist(s.pe))
        };

        let self_ref = match self.segs[cur].linedef {
            Some(line) => self.linedefs[line].self_ref,
            None => false,
        };

        if self.segs[cur].source_line == self.segs[part].source_line {
            a = 0.0;
            c = 0.0;
        }

        let (start, end) = (self.segs[cur].start, self.segs[cur].end);

        // runs along the partition line
        if a.abs() <= DIST_EPSILON && c.abs() <= DIST_EPSILON {
            self.add_intersection(cuts, start, part, self_ref)?;
            self.add_intersection(cuts, end, part, self_ref)?;

            if self.segs[cur].pd.dot(self.segs[part].pd) < 0.0 {
                self.add_seg_to_super(lefts, cur);
            } else {
                self.add_seg_to_super(rights, cur);
            }
            return Ok(());
        }

        // wholly right
        if a > -DIST_EPSILON && c > -DIST_EPSILON {
            if a < DIST_EPSILON {
                self.add_intersection(cuts, start, part, self_ref)?;
            } else if c < DIST_EPSILON {
                self.add_intersection(cuts, end, part, self_ref)?;
            }

            self.add_seg_to_super(rights, cur);
            return Ok(());
        }

        // wholly left
        if a < DIST_EPSILON && c < DIST_EPSILON {
            if a > -DIST_EPSILON {
                self.add_intersection(cuts, start, part, self_ref)?;
            } else if c > -DIST_EPSILON {
                self.add_intersection(cuts, end, part, self_ref)?;
            }

            self.add_seg_to_super(lefts, cur);
            return Ok(());
        }

        // straddles: split, then place the two pieces
        let pos = self.compute_intersection(cur, part, a, c);
        let new_seg = self.split_seg(cur, pos)?;

        let split_vert = self.segs[cur].end;
        self.add_intersection(cuts, split_vert, part, self_ref)?;

        if a < 0.0 {
            self.add_seg_to_super(lefts, cur);
            self.add_seg_to_super(rights, new_seg);
        } else {
            self.add_seg_to_super(rights, cur);
            self.add_seg_to_super(lefts, new_seg);
        }
        Ok(())
    }

    /// Drain the superblock tree at `block`, sending every seg through
    /// [`divide_one_seg`] into the `lefts` / `rights` trees.  The drained
    /// blocks are returned to the pool.
    pub fn separate_segs(
        &mut self,
        block: BlockId,
        part: SegId,
        lefts: BlockId,
        rights: BlockId,
        cuts: &mut Vec<Cut>,
    ) -> Result<(), BspError> {
        // splitting a partnered seg can push the partner's new piece back
        // into this block, so keep draining until it stays empty
        loop {
            let list = mem::take(&mut self.blocks.blocks[block].segs);
            if list.is_empty() {
                break;
            }

            for cur in list {
                self.segs[cur].block = None;
                self.divide_one_seg(cur, part, lefts, rights, cuts)?;
            }
        }

        for num in 0..2 {
            if let Some(sub) = self.blocks.blocks[block].subs[num] {
                self.separate_segs(sub, part, lefts, rights, cuts)?;

                let b = &self.blocks.blocks[sub];
                if b.real_num + b.mini_num > 0 {
                    return Err(BspError::ChildNotEmpty);
                }

                self.blocks.free_tree(sub);
                self.blocks.blocks[block].subs[num] = None;
            }
        }

        self.blocks.blocks[block].real_num = 0;
        self.blocks.blocks[block].mini_num = 0;
        Ok(())
    }

    /// Close the gaps the partition opened: walk the ordered cut list,
    /// and wherever the space between two adjacent cuts is open, span it
    /// with a miniseg pair (one facing each side).
    pub fn add_minisegs(
        &mut self,
        part: SegId,
        lefts: BlockId,
        rights: BlockId,
        mut cuts: Vec<Cut>,
    ) -> Result<(), BspError> {
        if cuts.is_empty() {
            return Ok(());
        }

        // merge cuts that landed (nearly) on top of each other
        let mut i = 0;
        while i + 1 < cuts.len() {
            let len = cuts[i + 1].along_dist - cuts[i].along_dist;

            if len < -0.1 {
                return Err(BspError::CutOrder {
                    prev: cuts[i].along_dist,
                    next: cuts[i + 1].along_dist,
                });
            }

            if len > 0.2 {
                i += 1;
                continue;
            }

            let next = cuts.remove(i + 1);
            let cur = &mut cuts[i];

            if cur.self_ref && !next.self_ref {
                if cur.before.is_some() && next.before.is_some() {
                    cur.before = next.before;
                }
                if cur.after.is_some() && next.after.is_some() {
                    cur.after = next.after;
                }
                cur.self_ref = false;
            }

            if cur.before.is_none() {
                cur.before = next.before;
            }
            if cur.after.is_none() {
                cur.after = next.after;
            }
        }

        let source = self.segs[part].linedef;

        for i in 0..cuts.len() - 1 {
            let cur_after = cuts[i].after;
            let next_before = cuts[i + 1].before;

            if cur_after.is_none() && next_before.is_none() {
                continue;
            }

            // one side open, the other closed: unclosed space in the map
            if let (Some(sector), None) = (cur_after, next_before) {
                if !cuts[i].self_ref && !self.sectors[sector].warned_unclosed {
                    log::warn!("sector {sector} is unclosed near the partition line");
                    self.sectors[sector].warned_unclosed = true;
                }
                continue;
            }
            if let (None, Some(sector)) = (cur_after, next_before) {
                if !cuts[i + 1].self_ref && !self.sectors[sector].warned_unclosed {
                    log::warn!("sector {sector} is unclosed near the partition line");
                    self.sectors[sector].warned_unclosed = true;
                }
                continue;
            }

            // definite open space on both cuts
            if cur_after != next_before && cuts[i].self_ref && !cuts[i + 1].self_ref {
                // prefer the sector that isn't self-referencing
                cuts[i].after = next_before;
            }

            let sector = cuts[i].after;
            let (v1, v2) = (cuts[i].vertex, cuts[i + 1].vertex);

            let seg = self.segs.len();
            let mut fwd = Seg::blank(v1, v2);
            fwd.sector = sector;
            fwd.source_line = source;
            fwd.partner = Some(seg + 1);
            self.segs.push(fwd);

            let mut rev = Seg::blank(v2, v1);
            rev.sector = sector;
            rev.source_line = source;
            rev.partner = Some(seg);
            self.segs.push(rev);

            self.recompute_seg(seg)?;
            self.recompute_seg(seg + 1)?;

            self.add_seg_to_super(rights, seg);
            self.add_seg_to_super(lefts, seg + 1);
        }

        Ok(())
    }
}

fn tally(real: &mut i32, mini: &mut i32, is_real: bool) {
    if is_real {
        *real += 1;
    } else {
        *mini += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wad::level::test_support::{raw_linedef, raw_map, raw_sector, raw_sidedef};

    fn square_level() -> BspLevel {
        let raw = raw_map(
            &[(0, 0), (0, 128), (128, 128), (128, 0)],
            &[
                raw_linedef(0, 1, 0, -1),
                raw_linedef(1, 2, 0, -1),
                raw_linedef(2, 3, 0, -1),
                raw_linedef(3, 0, 0, -1),
            ],
            &[raw_sidedef(0)],
            &[raw_sector()],
        );
        let mut lev = BspLevel::from_raw(&raw).unwrap();
        lev.prune_vertices().unwrap();
        lev.calculate_wall_tips();
        lev
    }

    fn push_real_seg(lev: &mut BspLevel, start: usize, end: usize, line: usize) -> SegId {
        let id = lev.segs.len();
        let mut seg = Seg::blank(start, end);
        seg.linedef = Some(line);
        seg.source_line = Some(line);
        seg.sector = Some(0);
        lev.segs.push(seg);
        lev.recompute_seg(id).unwrap();
        id
    }

    /// Two rooms in a row behind a two-sided divider at x = 128.
    fn divided_rooms_map() -> crate::wad::level::RawMap {
        raw_map(
            &[(0, 0), (0, 128), (128, 128), (128, 0), (256, 0), (256, 128)],
            &[
                raw_linedef(0, 1, 0, -1),
                raw_linedef(1, 2, 0, -1),
                raw_linedef(3, 0, 0, -1),
                {
                    let mut l = raw_linedef(3, 2, 1, 0);
                    l.flags = 0x0004;
                    l
                },
                raw_linedef(4, 3, 1, -1),
                raw_linedef(5, 4, 1, -1),
                raw_linedef(2, 5, 1, -1),
            ],
            &[raw_sidedef(0), raw_sidedef(1)],
            &[raw_sector(), raw_sector()],
        )
    }

    /// A square cut into two triangles by a two-sided diagonal.
    fn diagonal_split_map() -> crate::wad::level::RawMap {
        raw_map(
            &[(0, 0), (0, 128), (128, 128), (128, 0)],
            &[
                raw_linedef(0, 1, 0, -1), // west wall, upper-left triangle
                raw_linedef(1, 2, 0, -1), // north wall
                raw_linedef(2, 3, 1, -1), // east wall, lower-right triangle
                raw_linedef(3, 0, 1, -1), // south wall
                {
                    // diagonal: lower-right triangle on the right
                    let mut l = raw_linedef(0, 2, 1, 0);
                    l.flags = 0x0004;
                    l
                },
            ],
            &[raw_sidedef(0), raw_sidedef(1)],
            &[raw_sector(), raw_sector()],
        )
    }

    #[test]
    fn accepted_partition_fills_both_sides() {
        for raw in [divided_rooms_map(), diagonal_split_map()] {
            let mut lev = BspLevel::from_raw(&raw).unwrap();
            lev.prune_vertices().unwrap();
            lev.calculate_wall_tips();
            lev.detect_overlapping_lines();

            let root = lev.create_segs().unwrap();
            let (best, _) = lev.pick_node(root).expect("a usable partition");

            let b = &lev.blocks.blocks[root];
            let (x1, y1, x2, y2) = (b.x1, b.y1, b.x2, b.y2);
            let lefts = lev.blocks.alloc(x1, y1, x2, y2, None);
            let rights = lev.blocks.alloc(x1, y1, x2, y2, None);

            let mut cuts = Vec::new();
            lev.separate_segs(root, best, lefts, rights, &mut cuts).unwrap();

            // an accepted partition never separates into an empty half
            assert!(lev.blocks.blocks[lefts].real_num > 0);
            assert!(lev.blocks.blocks[rights].real_num > 0);
        }
    }

    #[test]
    fn split_seg_with_partner() {
        let mut lev = square_level();

        // partnered pair along the west wall
        let right = push_real_seg(&mut lev, 0, 1, 0);
        let left = push_real_seg(&mut lev, 1, 0, 0);
        lev.segs[right].partner = Some(left);
        lev.segs[left].partner = Some(right);

        let verts_before = lev.vertices.len();
        let tail = lev.split_seg(right, dvec2(0.0, 64.0)).unwrap();

        // both sides of the pair got split
        assert_eq!(lev.segs.len(), 4);

        let mid = lev.segs[right].end;
        assert_eq!(lev.segs[tail].start, mid);
        assert_eq!(lev.segs[tail].end, 1);
        assert_eq!(lev.segs[right].p_length, 64.0);
        assert_eq!(lev.segs[tail].p_length, 64.0);

        // partner symmetry: tail's buddy covers the same span reversed
        let buddy = lev.segs[tail].partner.unwrap();
        assert_eq!(lev.segs[buddy].partner, Some(tail));
        assert_eq!(lev.segs[buddy].start, 1);
        assert_eq!(lev.segs[buddy].end, mid);
        assert_eq!(lev.segs[left].start, mid);

        // split vertex plus its duplex twin
        assert_eq!(lev.vertices.len(), verts_before + 2);
        assert_eq!(lev.vertices[mid].ref_count, 4);
        assert!(lev.vertices[mid].normal_dup.is_some());
    }

    #[test]
    fn intersections_sorted_and_deduped() {
        let mut lev = square_level();
        let part = push_real_seg(&mut lev, 0, 1, 0);

        let mut cuts = Vec::new();
        lev.add_intersection(&mut cuts, 1, part, false).unwrap();
        lev.add_intersection(&mut cuts, 0, part, false).unwrap();
        lev.add_intersection(&mut cuts, 0, part, false).unwrap();

        assert_eq!(cuts.len(), 2);
        assert_eq!(cuts[0].vertex, 0);
        assert_eq!(cuts[0].along_dist, 0.0);
        assert_eq!(cuts[1].vertex, 1);
        assert_eq!(cuts[1].along_dist, 128.0);
    }

    #[test]
    fn divide_sends_whole_segs_to_their_side() {
        let mut lev = square_level();

        // vertical partition through the middle of the square
        let a = lev.vertices.len();
        lev.vertices.push(lev.vertices[0].clone());
        lev.vertices[a].pos = dvec2(64.0, 0.0);
        let b = lev.vertices.len();
        lev.vertices.push(lev.vertices[0].clone());
        lev.vertices[b].pos = dvec2(64.0, 128.0);
        let part = push_real_seg(&mut lev, a, b, 1);

        let lefts = lev.blocks.alloc(0, 0, 256, 256, None);
        let rights = lev.blocks.alloc(0, 0, 256, 256, None);
        let mut cuts = Vec::new();

        // west wall: x=0, left of the partition
        let west = push_real_seg(&mut lev, 0, 1, 0);
        lev.divide_one_seg(west, part, lefts, rights, &mut cuts).unwrap();
        assert_eq!(lev.blocks.blocks[lefts].real_num, 1);
        assert_eq!(lev.blocks.blocks[rights].real_num, 0);

        // east wall: x=128, right of the partition
        let east = push_real_seg(&mut lev, 2, 3, 2);
        lev.divide_one_seg(east, part, lefts, rights, &mut cuts).unwrap();
        assert_eq!(lev.blocks.blocks[rights].real_num, 1);
    }

    #[test]
    fn divide_splits_straddling_seg() {
        let mut lev = square_level();

        let a = lev.vertices.len();
        lev.vertices.push(lev.vertices[0].clone());
        lev.vertices[a].pos = dvec2(64.0, 0.0);
        let b = lev.vertices.len();
        lev.vertices.push(lev.vertices[0].clone());
        lev.vertices[b].pos = dvec2(64.0, 128.0);
        let part = push_real_seg(&mut lev, a, b, 1);

        let lefts = lev.blocks.alloc(0, 0, 256, 256, None);
        let rights = lev.blocks.alloc(0, 0, 256, 256, None);
        let mut cuts = Vec::new();

        // south wall crosses x=64
        let south = push_real_seg(&mut lev, 0, 3, 3);
        lev.divide_one_seg(south, part, lefts, rights, &mut cuts).unwrap();

        assert_eq!(lev.blocks.blocks[lefts].real_num, 1);
        assert_eq!(lev.blocks.blocks[rights].real_num, 1);

        // the split point lands exactly on the partition
        assert_eq!(cuts.len(), 1);
        let split = lev.vertices[cuts[0].vertex].pos;
        assert_eq!(split, dvec2(64.0, 0.0));

        // original keeps its start, tail keeps the old end
        assert_eq!(lev.segs[south].start, 0);
        assert_eq!(lev.vertices[lev.segs[south].end].pos, split);
    }

    #[test]
    fn miniseg_pair_spans_open_gap() {
        let mut lev = square_level();

        // partition along the vertical mid-line; both cuts open into
        // sector 0 (the square interior has no wall at y=0..128, x=64)
        let a = lev.vertices.len();
        lev.vertices.push(lev.vertices[0].clone());
        lev.vertices[a].pos = dvec2(64.0, 0.0);
        lev.vertices[a].tips = Vec::new();
        let b = lev.vertices.len();
        lev.vertices.push(lev.vertices[0].clone());
        lev.vertices[b].pos = dvec2(64.0, 128.0);
        lev.vertices[b].tips = Vec::new();

        // give each new vertex a single tip, so every other direction at
        // the vertex reads as open into sector 0
        lev.vertex_add_wall_tip(a, dvec2(1.0, 0.0), Some(0), None);
        lev.vertex_add_wall_tip(b, dvec2(1.0, 0.0), Some(0), None);

        let part = push_real_seg(&mut lev, a, b, 1);

        let lefts = lev.blocks.alloc(0, 0, 256, 256, None);
        let rights = lev.blocks.alloc(0, 0, 256, 256, None);

        let mut cuts = Vec::new();
        lev.add_intersection(&mut cuts, a, part, false).unwrap();
        lev.add_intersection(&mut cuts, b, part, false).unwrap();
        assert_eq!(cuts[0].after, Some(0));
        assert_eq!(cuts[1].before, Some(0));

        let segs_before = lev.segs.len();
        lev.add_minisegs(part, lefts, rights, cuts).unwrap();

        assert_eq!(lev.segs.len(), segs_before + 2);

        let fwd = &lev.segs[segs_before];
        let rev = &lev.segs[segs_before + 1];
        assert_eq!(fwd.linedef, None);
        assert_eq!(fwd.sector, Some(0));
        assert_eq!(fwd.source_line, Some(1));
        assert_eq!((fwd.start, fwd.end), (a, b));
        assert_eq!((rev.start, rev.end), (b, a));
        assert_eq!(fwd.partner, Some(segs_before + 1));

        assert_eq!(lev.blocks.blocks[rights].mini_num, 1);
        assert_eq!(lev.blocks.blocks[lefts].mini_num, 1);
    }

    #[test]
    fn close_cuts_are_merged() {
        let mut lev = square_level();
        let part = push_real_seg(&mut lev, 0, 1, 0);

        let lefts = lev.blocks.alloc(0, 0, 256, 256, None);
        let rights = lev.blocks.alloc(0, 0, 256, 256, None);

        let cuts = vec![
            Cut { vertex: 0, along_dist: 0.0, self_ref: false, before: None, after: None },
            Cut { vertex: 1, along_dist: 0.1, self_ref: false, before: None, after: None },
        ];

        // both cuts closed and within merge distance: nothing created
        let segs_before = lev.segs.len();
        lev.add_minisegs(part, lefts, rights, cuts).unwrap();
        assert_eq!(lev.segs.len(), segs_before);
    }

    #[test]
    fn bad_cut_order_is_fatal() {
        let mut lev = square_level();
        let part = push_real_seg(&mut lev, 0, 1, 0);

        let lefts = lev.blocks.alloc(0, 0, 256, 256, None);
        let rights = lev.blocks.alloc(0, 0, 256, 256, None);

        let cuts = vec![
            Cut { vertex: 0, along_dist: 10.0, self_ref: false, before: None, after: None },
            Cut { vertex: 1, along_dist: 0.0, self_ref: false, before: None, after: None },
        ];

        assert!(matches!(
            lev.add_minisegs(part, lefts, rights, cuts),
            Err(BspError::CutOrder { .. })
        ));
    }
}
