//! WAD container access: directory parsing, lump decoding, PWAD output.

use bincode::{Decode, Encode, config, decode_from_slice, encode_to_vec};
use byteorder::{LittleEndian as LE, ReadBytesExt, WriteBytesExt};
use std::{
    collections::HashMap,
    fs::File,
    io::{self, BufWriter, Read, Seek, SeekFrom, Write},
    mem,
    path::Path,
};
use thiserror::Error;

/// Size (in bytes) of one directory entry.
const DIR_ENTRY_SIZE: usize = 16;

/// One entry in the lump directory (16 bytes on disk).
#[derive(Clone, Debug)]
pub struct LumpInfo {
    pub name: [u8; 8],
    pub offset: u32,
    pub size: u32,
}

/// Entire WAD in memory (raw bytes + parsed directory).
#[derive(Debug)]
pub struct Wad {
    lumps: Vec<LumpInfo>,
    bytes: Vec<u8>,
    by_name: HashMap<String, usize>,
}

/// Loader / decoding errors.
#[derive(Error, Debug)]
pub enum WadError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("file is not an IWAD or PWAD")]
    BadMagic,

    #[error("directory extends beyond end of file")]
    DirectoryOutOfBounds,

    #[error("lump index {0} out of range")]
    BadIndex(usize),

    #[error("lump {name} (# {index}) slice {offset}+{size} past EOF ({file_size})")]
    BadOffset {
        index: usize,
        name: String,
        offset: u32,
        size: u32,
        file_size: usize,
    },

    #[error("lump {name} (# {index}) size {size} not multiple of element {elem_size}")]
    BadLumpSize {
        index: usize,
        name: String,
        size: usize,
        elem_size: usize,
    },

    #[error("lump {name} (# {index}): {source}")]
    BadElement {
        index: usize,
        name: String,
        source: bincode::error::DecodeError,
    },

    #[error("encoding lump {name}: {source}")]
    BadEncode {
        name: String,
        source: bincode::error::EncodeError,
    },
}

impl Wad {
    // ------------------------------------------------------------------ //
    // Low-level helpers
    // ------------------------------------------------------------------ //

    /// Expose directory as a read-only slice
    pub fn lumps(&self) -> &[LumpInfo] {
        &self.lumps
    }

    /// Return &str view of an 8-byte lump name (trimmed at first NUL).
    pub fn lump_name_str(name: &[u8; 8]) -> &str {
        let end = name.iter().position(|&b| b == 0).unwrap_or(name.len());
        std::str::from_utf8(&name[..end]).unwrap_or("?")
    }

    /// Raw bytes of lump `idx` (slice into `self.bytes`).
    pub fn lump_bytes(&self, idx: usize) -> Result<&[u8], WadError> {
        let l = self.lumps.get(idx).ok_or(WadError::BadIndex(idx))?;
        let start = l.offset as usize;
        let end = start + l.size as usize;
        if end > self.bytes.len() {
            return Err(WadError::BadOffset {
                index: idx,
                name: Self::lump_name_str(&l.name).into(),
                offset: l.offset,
                size: l.size,
                file_size: self.bytes.len(),
            });
        }
        Ok(&self.bytes[start..end])
    }

    /// Find the last lump with `name` (case-sensitive like vanilla Doom).
    pub fn find_lump(&self, name: &str) -> Option<usize> {
        self.by_name.get(name).copied()
    }

    // ------------------------------------------------------------------ //
    // Generic decode helper
    // ------------------------------------------------------------------ //

    /// Decode a lump as a packed array of `T`.  An empty lump is a valid
    /// empty array.
    pub fn lump_to_vec<T>(&self, idx: usize) -> Result<Vec<T>, WadError>
    where
        T: Decode<()>,
    {
        let bytes = self.lump_bytes(idx)?;
        let elem = mem::size_of::<T>();

        if bytes.len() % elem != 0 {
            return Err(WadError::BadLumpSize {
                index: idx,
                name: Self::lump_name_str(&self.lumps[idx].name).into(),
                size: bytes.len(),
                elem_size: elem,
            });
        }

        let cfg = config::standard()
            .with_fixed_int_encoding()
            .with_little_endian();
        let mut out = Vec::with_capacity(bytes.len() / elem);
        let mut slice = bytes;

        while !slice.is_empty() {
            let (val, read) =
                decode_from_slice::<T, _>(slice, cfg).map_err(|e| WadError::BadElement {
                    index: idx,
                    name: Self::lump_name_str(&self.lumps[idx].name).into(),
                    source: e,
                })?;
            out.push(val);
            slice = &slice[read..];
        }
        Ok(out)
    }

    // ------------------------------------------------------------------ //
    // Loading
    // ------------------------------------------------------------------ //

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, WadError> {
        let mut file = File::open(path)?;

        let mut magic = [0u8; 4];
        file.read_exact(&mut magic)?;
        if &magic != b"IWAD" && &magic != b"PWAD" {
            return Err(WadError::BadMagic);
        }

        let num_lumps = file.read_u32::<LE>()?;
        let dir_offset = file.read_u32::<LE>()?;

        // read whole file
        let mut bytes = Vec::new();
        file.seek(SeekFrom::Start(0))?;
        file.read_to_end(&mut bytes)?;

        // directory bounds check
        let dir_end = dir_offset as usize + num_lumps as usize * DIR_ENTRY_SIZE;
        if dir_end > bytes.len() {
            return Err(WadError::DirectoryOutOfBounds);
        }

        // parse directory
        let mut lumps = Vec::with_capacity(num_lumps as usize);
        let mut cur = &bytes[dir_offset as usize..dir_end];

        for _ in 0..num_lumps {
            let off = cur.read_u32::<LE>()?;
            let size = cur.read_u32::<LE>()?;
            let mut name = [0u8; 8];
            cur.read_exact(&mut name)?;
            lumps.push(LumpInfo {
                name,
                offset: off,
                size,
            });
        }

        // validate each lump slice
        for (i, l) in lumps.iter().enumerate() {
            let end = l.offset as usize + l.size as usize;
            if end > bytes.len() {
                return Err(WadError::BadOffset {
                    index: i,
                    name: Self::lump_name_str(&l.name).into(),
                    offset: l.offset,
                    size: l.size,
                    file_size: bytes.len(),
                });
            }
        }

        // build name → idx map (later lumps shadow earlier ones)
        let mut by_name = HashMap::with_capacity(lumps.len());
        for (i, l) in lumps.iter().enumerate().rev() {
            by_name
                .entry(Self::lump_name_str(&l.name).to_owned())
                .or_insert(i);
        }

        Ok(Self {
            lumps,
            bytes,
            by_name,
        })
    }
}

// ==========================================================================
// Writing
// ==========================================================================

/// Accumulates lumps and writes them out as a PWAD (data first, directory
/// at the end, as every vanilla tool expects).
#[derive(Debug, Default)]
pub struct WadWriter {
    lumps: Vec<([u8; 8], Vec<u8>)>,
}

impl WadWriter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a lump.  Names longer than 8 bytes are truncated, shorter
    /// ones NUL-padded.
    pub fn add_lump(&mut self, name: &str, bytes: Vec<u8>) {
        let mut raw = [0u8; 8];
        for (dst, src) in raw.iter_mut().zip(name.bytes()) {
            *dst = src.to_ascii_uppercase();
        }
        self.lumps.push((raw, bytes));
    }

    /// Encode a packed array of `T` and append it as a lump.
    pub fn add_lump_vec<T: Encode>(&mut self, name: &str, items: &[T]) -> Result<(), WadError> {
        let cfg = config::standard()
            .with_fixed_int_encoding()
            .with_little_endian();
        let mut bytes = Vec::new();

        for item in items {
            bytes.extend(encode_to_vec(item, cfg).map_err(|e| WadError::BadEncode {
                name: name.into(),
                source: e,
            })?);
        }

        self.add_lump(name, bytes);
        Ok(())
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), WadError> {
        let mut out = BufWriter::new(File::create(path)?);

        let data_size: usize = self.lumps.iter().map(|(_, b)| b.len()).sum();
        let dir_offset = 12 + data_size as u32;

        out.write_all(b"PWAD")?;
        out.write_u32::<LE>(self.lumps.len() as u32)?;
        out.write_u32::<LE>(dir_offset)?;

        for (_, bytes) in &self.lumps {
            out.write_all(bytes)?;
        }

        let mut offset = 12u32;
        for (name, bytes) in &self.lumps {
            out.write_u32::<LE>(offset)?;
            out.write_u32::<LE>(bytes.len() as u32)?;
            out.write_all(name)?;
            offset += bytes.len() as u32;
        }

        out.flush()?;
        Ok(())
    }
}

// ==========================================================================
// Tests
// ==========================================================================
