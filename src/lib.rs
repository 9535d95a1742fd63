//! # Yet Another BSP node builder in Rust
//!
//! Offline compiler that turns an editable Doom-format map (vertices,
//! linedefs, sidedefs, sectors) into the binary-searchable runtime data the
//! engine renders from: SEGS, SSECTORS and NODES.
//!
//! * [`wad`] — thin container shim: reads IWAD/PWAD files, decodes the raw
//!   map lumps, writes the rebuilt map back out as a PWAD.
//! * [`bsp`] — the node builder itself; see [`bsp::compile_map`].

pub mod bsp;
pub mod wad;
