//! Pre-build analysis: vertex pruning, overlapping-line detection and the
//! per-vertex wall-tip lists.
//!
//! Wall tips are the workhorse of gap closing: once every vertex knows
//! which walls meet it and at what angles, "is the space open in this
//! direction, and towards which sector" becomes a cheap angular lookup.

use glam::DVec2;

use crate::bsp::BspError;
use crate::bsp::level::{BspLevel, SectorId, SegId, Vertex, VertexId, WallTip};
use crate::bsp::util::{self, ANG_EPSILON};

impl BspLevel {
    /// Drop vertices nothing references, assigning dense output indices to
    /// the survivors.  Arena slots stay put so existing ids stay valid.
    pub fn prune_vertices(&mut self) -> Result<(), BspError> {
        let mut new_num = 0;
        let mut unused = 0;

        for (i, vert) in self.vertices.iter_mut().enumerate() {
            if vert.ref_count < 0 {
                return Err(BspError::VertexRefCount {
                    vertex: i,
                    count: vert.ref_count,
                });
            }

            if vert.ref_count == 0 {
                vert.index = None;
                unused += 1;
                continue;
            }

            vert.index = Some(new_num);
            new_num += 1;
        }

        if new_num == 0 {
            return Err(BspError::EmptyTable("vertices"));
        }
        if unused > 0 {
            log::debug!("pruned {unused} unused vertices");
        }

        self.num_normal_vert = new_num;
        Ok(())
    }

    /// Flag linedefs that exactly cover an earlier linedef.  Sorting by the
    /// lowest endpoint brings candidates next to each other, so only runs
    /// of equal keys need the full endpoint comparison.  Partial overlaps
    /// are not detected.
    pub fn detect_overlapping_lines(&mut self) {
        let mut array: Vec<usize> = (0..self.linedefs.len()).collect();
        let mut count = 0;

        array.sort_by(|&a, &b| self.line_start_key(a).cmp(&self.line_start_key(b)));

        for i in 0..array.len().saturating_sub(1) {
            for j in (i + 1)..array.len() {
                if self.line_start_key(array[i]) != self.line_start_key(array[j]) {
                    break;
                }

                if self.line_end_key(array[i]) == self.line_end_key(array[j]) {
                    let target = self.linedefs[array[i]].overlap.unwrap_or(array[i]);
                    self.linedefs[array[j]].overlap = Some(target);
                    count += 1;
                }
            }
        }

        if count > 0 {
            log::debug!("detected {count} overlapping linedefs");
        }
    }

    /// True when the line's `end` vertex is the lower one (left-most, or
    /// bottom-most for verticals), at integer precision.
    fn line_vertex_lowest(&self, line: usize) -> bool {
        let s = self.vertices[self.linedefs[line].start].pos;
        let e = self.vertices[self.linedefs[line].end].pos;

        !((s.x as i32) < (e.x as i32)
            || (s.x as i32 == e.x as i32 && (s.y as i32) < (e.y as i32)))
    }

    fn line_start_key(&self, line: usize) -> (i32, i32) {
        let l = &self.linedefs[line];
        let v = if self.line_vertex_lowest(line) { l.end } else { l.start };
        let p = self.vertices[v].pos;
        (p.x as i32, p.y as i32)
    }

    fn line_end_key(&self, line: usize) -> (i32, i32) {
        let l = &self.linedefs[line];
        let v = if self.line_vertex_lowest(line) { l.start } else { l.end };
        let p = self.vertices[v].pos;
        (p.x as i32, p.y as i32)
    }

    /// Record, at both endpoints of every linedef, a wall tip carrying the
    /// line's angle and its two adjacent sectors.  Self-referencing lines
    /// contribute nothing since they don't bound any space.
    pub fn calculate_wall_tips(&mut self) {
        for line in 0..self.linedefs.len() {
            if self.linedefs[line].self_ref {
                continue;
            }

            let l = &self.linedefs[line];
            let (start, end) = (l.start, l.end);
            let delta = self.vertices[end].pos - self.vertices[start].pos;

            let left = l.left.and_then(|s| self.sidedefs[s].sector);
            let right = l.right.and_then(|s| self.sidedefs[s].sector);

            self.vertex_add_wall_tip(start, delta, left, right);
            self.vertex_add_wall_tip(end, -delta, right, left);
        }
    }

    /// Insert one wall tip, keeping the vertex's tip list in increasing
    /// angular order.  Ties within epsilon go after the existing tip.
    pub fn vertex_add_wall_tip(
        &mut self,
        vert: VertexId,
        delta: DVec2,
        left: Option<SectorId>,
        right: Option<SectorId>,
    ) {
        let angle = util::compute_angle(delta);
        let tips = &mut self.vertices[vert].tips;

        let pos = tips
            .iter()
            .position(|t| angle + ANG_EPSILON < t.angle)
            .unwrap_or(tips.len());

        tips.insert(pos, WallTip { angle, left, right });
    }

    /// Is the space at `vert` open when looking along `delta`, and if so,
    /// which sector lies there?  A wall tip in the exact direction means
    /// the space is closed; otherwise the answer is read off the tip that
    /// angularly brackets the direction.
    pub fn vertex_check_open(
        &self,
        vert: VertexId,
        delta: DVec2,
    ) -> Result<Option<SectorId>, BspError> {
        let angle = util::compute_angle(delta);
        let tips = &self.vertices[vert].tips;

        for tip in tips {
            let diff = (tip.angle - angle).abs();
            if diff < ANG_EPSILON || diff > 360.0 - ANG_EPSILON {
                return Ok(None);
            }
        }

        for (i, tip) in tips.iter().enumerate() {
            if angle + ANG_EPSILON < tip.angle {
                // on the right side of this tip
                return Ok(tip.right);
            }

            if i + 1 == tips.len() {
                // past the largest angle, so on the left of the last tip
                return Ok(tip.left);
            }
        }

        Err(BspError::NoWallTips { vertex: vert })
    }

    /// Create the vertex a seg split happens at, with wall tips for the
    /// split direction and a duplex twin holding a second output index.
    pub fn new_vertex_from_split_seg(&mut self, seg: SegId, pos: DVec2) -> VertexId {
        let s = &self.segs[seg];
        let (pd, sector) = (s.pd, s.sector);
        let partner_sector = s.partner.map(|p| self.segs[p].sector).unwrap_or(None);
        let ref_count = if s.partner.is_some() { 4 } else { 2 };

        let vert = self.vertices.len();
        self.vertices.push(Vertex {
            pos,
            index: Some(self.num_normal_vert),
            ref_count,
            equiv: None,
            tips: Vec::new(),
            normal_dup: None,
        });
        self.num_normal_vert += 1;

        self.vertex_add_wall_tip(vert, -pd, sector, partner_sector);
        self.vertex_add_wall_tip(vert, pd, partner_sector, sector);

        let dup = self.vertices.len();
        self.vertices.push(Vertex {
            pos,
            index: Some(self.num_normal_vert),
            ref_count,
            equiv: None,
            tips: Vec::new(),
            normal_dup: None,
        });
        self.num_normal_vert += 1;

        self.vertices[vert].normal_dup = Some(dup);
        vert
    }

    /// Replacement endpoint for a seg whose endpoints round to the same
    /// integer coordinates: step from `start` towards `end` in unit hops
    /// until the rounded position moves off the start's.
    pub fn new_vertex_degenerate(
        &mut self,
        start: VertexId,
        end: VertexId,
    ) -> Result<VertexId, BspError> {
        let spos = self.vertices[start].pos;
        let delta = self.vertices[end].pos - spos;
        let dlen = util::compute_dist(delta);

        if dlen == 0.0 {
            return Err(BspError::BadDelta);
        }
        let step = delta / dlen;

        let mut pos = spos;
        while util::i_round(pos.x) == util::i_round(spos.x)
            && util::i_round(pos.y) == util::i_round(spos.y)
        {
            pos += step;
        }

        let vert = self.vertices.len();
        self.vertices.push(Vertex {
            pos,
            index: Some(self.num_normal_vert),
            ref_count: self.vertices[start].ref_count,
            equiv: None,
            tips: Vec::new(),
            normal_dup: None,
        });
        self.num_normal_vert += 1;

        Ok(vert)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bsp::level::Seg;
    use crate::wad::level::test_support::{raw_linedef, raw_map, raw_sector, raw_sidedef};
    use glam::dvec2;

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
        BspLevel::from_raw(&raw).unwrap()
    }

    #[test]
    fn prune_renumbers_around_unused() {
        let raw = raw_map(
            &[(0, 0), (50, 50), (0, 128), (128, 128), (128, 0)],
            &[
                raw_linedef(0, 2, 0, -1),
                raw_linedef(2, 3, 0, -1),
                raw_linedef(3, 4, 0, -1),
                raw_linedef(4, 0, 0, -1),
            ],
            &[raw_sidedef(0)],
            &[raw_sector()],
        );
        let mut lev = BspLevel::from_raw(&raw).unwrap();
        lev.prune_vertices().unwrap();

        assert_eq!(lev.num_normal_vert, 4);
        assert_eq!(lev.vertices[1].index, None);
        assert_eq!(lev.vertices[2].index, Some(1));
        assert_eq!(lev.vertices[4].index, Some(3));
    }

    #[test]
    fn wall_tips_sorted_by_angle() {
        let mut lev = square_level();
        lev.prune_vertices().unwrap();
        lev.calculate_wall_tips();

        // corner (0,0): walls lead north (90) and east (0)
        let tips = &lev.vertices[0].tips;
        assert_eq!(tips.len(), 2);
        assert!(tips[0].angle < tips[1].angle);
        assert_eq!(tips[0].angle, 0.0);
        assert_eq!(tips[1].angle, 90.0);
    }

    #[test]
    fn check_open_inside_and_outside() {
        let mut lev = square_level();
        lev.prune_vertices().unwrap();
        lev.calculate_wall_tips();

        // at (0,0): northeast is inside sector 0, southwest is the void
        assert_eq!(lev.vertex_check_open(0, dvec2(1.0, 1.0)).unwrap(), Some(0));
        assert_eq!(lev.vertex_check_open(0, dvec2(-1.0, -1.0)).unwrap(), None);

        // exactly along a wall counts as closed
        assert_eq!(lev.vertex_check_open(0, dvec2(0.0, 1.0)).unwrap(), None);
        assert_eq!(lev.vertex_check_open(0, dvec2(1.0, 0.0)).unwrap(), None);
    }

    #[test]
    fn overlap_detection_flags_later_line() {
        let raw = raw_map(
            &[(0, 0), (0, 128), (128, 128), (128, 0)],
            &[
                raw_linedef(0, 1, 0, -1),
                raw_linedef(1, 2, 0, -1),
                raw_linedef(2, 3, 0, -1),
                raw_linedef(3, 0, 0, -1),
                // same span as line 0, opposite direction
                raw_linedef(1, 0, 0, -1),
            ],
            &[raw_sidedef(0)],
            &[raw_sector()],
        );
        let mut lev = BspLevel::from_raw(&raw).unwrap();
        lev.detect_overlapping_lines();

        // the later line yields to the earlier one
        assert_eq!(lev.linedefs[4].overlap, Some(0));
        assert!(lev.linedefs[..4].iter().all(|l| l.overlap.is_none()));
    }

    #[test]
    fn split_vertex_gets_duplex_and_tips() {
        let mut lev = square_level();
        lev.prune_vertices().unwrap();

        let seg = lev.segs.len();
        let mut s = Seg::blank(0, 1);
        s.sector = Some(0);
        lev.segs.push(s);
        lev.recompute_seg(seg).unwrap();

        let before = lev.num_normal_vert;
        let v = lev.new_vertex_from_split_seg(seg, dvec2(0.0, 64.0));

        assert_eq!(lev.num_normal_vert, before + 2);
        assert_eq!(lev.vertices[v].ref_count, 2);
        assert_eq!(lev.vertices[v].tips.len(), 2);

        let dup = lev.vertices[v].normal_dup.unwrap();
        assert_eq!(lev.vertices[dup].pos, lev.vertices[v].pos);
        assert_ne!(lev.vertices[dup].index, lev.vertices[v].index);
    }

    #[test]
    fn degenerate_vertex_steps_off_start() {
        let mut lev = square_level();
        lev.prune_vertices().unwrap();

        // shrink the west wall to sub-pixel size
        lev.vertices[1].pos = dvec2(0.0, 0.4);

        let v = lev.new_vertex_degenerate(0, 1).unwrap();
        let pos = lev.vertices[v].pos;
        assert!(
            util::i_round(pos.x) != 0 || util::i_round(pos.y) != 0,
            "new vertex still rounds onto the start"
        );
    }
}
