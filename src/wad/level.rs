//! Map lump layer: typed views of the binary map lumps and the glue that
//! turns a [`crate::bsp::level::CompiledMap`] back into PWAD lumps.

use crate::bsp::level::CompiledMap;
use crate::wad::raw::{Wad, WadError, WadWriter};
use bincode::{Decode, Encode};
use once_cell::sync::Lazy;
use regex::Regex;

/*=======================================================================*/
/*                         Raw binary structs                            */
/*=======================================================================*/

#[repr(C)]
#[derive(Clone, Copy, Decode, Encode, Debug)]
pub struct RawThing {
    pub x: i16,
    pub y: i16,
    pub angle: i16,
    pub type_: i16,
    pub options: i16,
}

#[repr(C)]
#[derive(Clone, Copy, Decode, Encode, Debug)]
pub struct RawLinedef {
    pub v1: i16,
    pub v2: i16,
    pub flags: i16,
    pub special: i16,
    pub tag: i16,
    pub sidenum: [i16; 2],
}

#[repr(C)]
#[derive(Clone, Copy, Decode, Encode, Debug)]
pub struct RawSidedef {
    pub x_off: i16,
    pub y_off: i16,
    pub top_tex: [u8; 8],
    pub bottom_tex: [u8; 8],
    pub mid_tex: [u8; 8],
    pub sector: i16,
}

#[repr(C)]
#[derive(Clone, Copy, Decode, Encode, Debug)]
pub struct RawVertex {
    pub x: i16,
    pub y: i16,
}

#[repr(C)]
#[derive(Clone, Copy, Decode, Encode, Debug)]
pub struct RawSeg {
    pub v1: i16,
    pub v2: i16,
    pub angle: i16,
    pub linedef: i16,
    pub side: i16,
    pub offset: i16,
}

#[repr(C)]
#[derive(Clone, Copy, Decode, Encode, Debug)]
pub struct RawSubsector {
    pub seg_count: i16,
    pub first_seg: i16,
}

#[repr(C)]
#[derive(Clone, Copy, Decode, Encode, Debug)]
pub struct RawNode {
    pub x: i16,
    pub y: i16,
    pub dx: i16,
    pub dy: i16,
    pub bbox: [[i16; 4]; 2],
    pub child: [u16; 2],
}

#[repr(C)]
#[derive(Clone, Copy, Decode, Encode, Debug)]
pub struct RawSector {
    pub floor_h: i16,
    pub ceil_h: i16,
    pub floor_tex: [u8; 8],
    pub ceil_tex: [u8; 8],
    pub light: i16,
    pub special: i16,
    pub tag: i16,
}

/*=======================================================================*/
/*                     Aggregate returned by `parse_map`                 */
/*=======================================================================*/

/// The editing-side lumps of one map.  SEGS / SSECTORS / NODES are never
/// read here since the whole point is to rebuild them from scratch.
#[derive(Debug)]
pub struct RawMap {
    pub name: String,
    pub things: Vec<RawThing>,
    pub linedefs: Vec<RawLinedef>,
    pub sidedefs: Vec<RawSidedef>,
    pub vertices: Vec<RawVertex>,
    pub sectors: Vec<RawSector>,
}

/*=======================================================================*/
/*                                Errors                                 */
/*=======================================================================*/

#[derive(Debug, thiserror::Error)]
pub enum LevelError {
    #[error("marker index {0} out of bounds")]
    MarkerOob(usize),

    #[error("map {map}: expected lump `{lump}` not found after marker")]
    Missing { map: String, lump: &'static str },

    #[error(transparent)]
    Wad(#[from] WadError),
}

/*=======================================================================*/
/*                     Convenience helpers on `Wad`                      */
/*=======================================================================*/

static MARKER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(E[1-4]M[1-9]|MAP[0-3][0-9])$").unwrap());

impl Wad {
    /// Return directory indices of every map marker (`E#M#`, `MAP##`).
    pub fn level_indices(&self) -> Vec<usize> {
        self.lumps()
            .iter()
            .enumerate()
            .filter(|(_, l)| l.size == 0 && MARKER_RE.is_match(Self::lump_name_str(&l.name)))
            .map(|(i, _)| i)
            .collect()
    }

    /// Find `name` between the marker and the next map marker.  Editors
    /// shuffle lump order within a map, so a fixed-offset lookup is too
    /// strict here.
    fn map_lump(&self, marker_idx: usize, name: &'static str) -> Result<usize, LevelError> {
        let map = Self::lump_name_str(&self.lumps()[marker_idx].name).to_owned();

        for (i, l) in self.lumps().iter().enumerate().skip(marker_idx + 1) {
            let lump_name = Self::lump_name_str(&l.name);
            if l.size == 0 && MARKER_RE.is_match(lump_name) {
                break;
            }
            if lump_name == name {
                return Ok(i);
            }
        }
        Err(LevelError::Missing { map, lump: name })
    }

    /// Decode the five editing-side lumps of the map at `marker_idx`.
    pub fn parse_map(&self, marker_idx: usize) -> Result<RawMap, LevelError> {
        if marker_idx >= self.lumps().len() {
            return Err(LevelError::MarkerOob(marker_idx));
        }

        let things_idx = self.map_lump(marker_idx, "THINGS")?;
        let linedefs_idx = self.map_lump(marker_idx, "LINEDEFS")?;
        let sidedefs_idx = self.map_lump(marker_idx, "SIDEDEFS")?;
        let vertices_idx = self.map_lump(marker_idx, "VERTEXES")?;
        let sectors_idx = self.map_lump(marker_idx, "SECTORS")?;

        Ok(RawMap {
            name: Self::lump_name_str(&self.lumps()[marker_idx].name).into(),
            things: self.lump_to_vec::<RawThing>(things_idx)?,
            linedefs: self.lump_to_vec::<RawLinedef>(linedefs_idx)?,
            sidedefs: self.lump_to_vec::<RawSidedef>(sidedefs_idx)?,
            vertices: self.lump_to_vec::<RawVertex>(vertices_idx)?,
            sectors: self.lump_to_vec::<RawSector>(sectors_idx)?,
        })
    }
}

/*=======================================================================*/
/*                              Encoding                                 */
/*=======================================================================*/

/// Append all eleven lumps of one rebuilt map to `out`, in the canonical
/// order vanilla engines expect.  REJECT and BLOCKMAP go out empty; every
/// port in use today rebuilds or ignores them.
pub fn encode_map(out: &mut WadWriter, map: &RawMap, built: &CompiledMap) -> Result<(), WadError> {
    out.add_lump(&map.name, Vec::new());
    out.add_lump_vec("THINGS", &map.things)?;
    out.add_lump_vec("LINEDEFS", &built.linedefs)?;
    out.add_lump_vec("SIDEDEFS", &built.sidedefs)?;
    out.add_lump_vec("VERTEXES", &built.vertices)?;
    out.add_lump_vec("SEGS", &built.segs)?;
    out.add_lump_vec("SSECTORS", &built.subsectors)?;
    out.add_lump_vec("NODES", &built.nodes)?;
    out.add_lump_vec("SECTORS", &built.sectors)?;
    out.add_lump("REJECT", Vec::new());
    out.add_lump("BLOCKMAP", Vec::new());
    Ok(())
}

/*=======================================================================*/
/*                          Test fixtures                                */
/*=======================================================================*/

/// Tiny map constructors shared by the builder's unit tests.
#[cfg(test)]
pub mod test_support {
    use super::*;

    pub fn raw_linedef(v1: usize, v2: usize, right: i16, left: i16) -> RawLinedef {
        RawLinedef {
            v1: v1 as i16,
            v2: v2 as i16,
            flags: 0x0001,
            special: 0,
            tag: 0,
            sidenum: [right, left],
        }
    }

    pub fn raw_sidedef(sector: i16) -> RawSidedef {
        RawSidedef {
            x_off: 0,
            y_off: 0,
            top_tex: [0; 8],
            bottom_tex: [0; 8],
            mid_tex: *b"STARTAN2",
            sector,
        }
    }

    pub fn raw_sector() -> RawSector {
        RawSector {
            floor_h: 0,
            ceil_h: 128,
            floor_tex: *b"FLAT14\0\0",
            ceil_tex: *b"FLAT14\0\0",
            light: 160,
            special: 0,
            tag: 0,
        }
    }

    pub fn raw_map(
        verts: &[(i16, i16)],
        linedefs: &[RawLinedef],
        sidedefs: &[RawSidedef],
        sectors: &[RawSector],
    ) -> RawMap {
        RawMap {
            name: "MAP01".into(),
            things: vec![RawThing {
                x: 32,
                y: 32,
                angle: 90,
                type_: 1,
                options: 7,
            }],
            linedefs: linedefs.to_vec(),
            sidedefs: sidedefs.to_vec(),
            vertices: verts.iter().map(|&(x, y)| RawVertex { x, y }).collect(),
            sectors: sectors.to_vec(),
        }
    }
}

/*=======================================================================*/
/*                                Tests                                  */
/*=======================================================================*/
