//! yabsp - rebuild the BSP lumps (SEGS / SSECTORS / NODES) of Doom maps.
//!
//! USAGE:
//! ```bash
//! cargo run --release -- doom.wad -o nodes.wad
//! cargo run --release -- doom.wad -o nodes.wad -m E1M1 -m E1M2
//! ```
//!
//! The output is a PWAD holding only the rebuilt maps; load it on top of
//! the input WAD.

use anyhow::{Context, bail};
use clap::Parser;
use std::path::PathBuf;

use yabsp_rs::bsp;
use yabsp_rs::wad::{Wad, WadWriter, encode_map};

/// CLI options handled via `clap` derive.
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Opts {
    /// Input IWAD or PWAD
    #[arg(value_name = "FILE")]
    input: PathBuf,

    /// Output PWAD receiving the rebuilt maps
    #[arg(short, long, value_name = "FILE", default_value = "out.wad")]
    output: PathBuf,

    /// Only rebuild the named maps (repeatable); default is all of them
    #[arg(short, long, value_name = "NAME")]
    map: Vec<String>,
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let opts = Opts::parse();

    let wad = Wad::from_file(&opts.input)
        .with_context(|| format!("reading {}", opts.input.display()))?;

    let markers = wad.level_indices();
    if markers.is_empty() {
        bail!("{} contains no maps", opts.input.display());
    }

    let wanted = |name: &str| {
        opts.map.is_empty() || opts.map.iter().any(|m| m.eq_ignore_ascii_case(name))
    };

    let mut out = WadWriter::new();
    let mut built = 0usize;

    for &marker in &markers {
        let map = wad.parse_map(marker)?;
        if !wanted(&map.name) {
            continue;
        }

        let compiled = bsp::compile_map(&map).with_context(|| format!("compiling {}", map.name))?;
        println!(
            "{}: {} segs, {} subsectors, {} nodes",
            map.name,
            compiled.segs.len(),
            compiled.subsectors.len(),
            compiled.nodes.len()
        );

        encode_map(&mut out, &map, &compiled)?;
        built += 1;
    }

    if built == 0 {
        bail!("no maps matched {:?}", opts.map);
    }

    out.save(&opts.output)
        .with_context(|| format!("writing {}", opts.output.display()))?;
    println!("{} map(s) written to {}", built, opts.output.display());
    Ok(())
}
