//! # Doom WAD container shim
//!
//! * Reads an entire IWAD/PWAD into RAM with zero-copy access to lumps.
//! * Decodes binary map lumps into typed vectors with **bincode 2**.
//! * Writes rebuilt maps back out as a PWAD.

pub mod level;
pub mod raw;

pub use level::{LevelError, RawMap, encode_map};
pub use raw::{Wad, WadError, WadWriter};
