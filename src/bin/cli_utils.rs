//! Shared helpers for CLI commands

use anyhow::{bail, Context, Result};
use graphscan::MAX_SCAN_LENGTH;
use std::fs::File;
use std::io::Read;
use std::path::Path;

/// Read an input file fully into memory for scanning
///
/// Empty files are an error: a zero-length scan is always a misconfigured
/// benchmark, never useful work. Files longer than the engine's offset range
/// are clipped with a warning rather than rejected, so oversized corpora
/// still produce a (truncated) result.
pub fn read_input_data(path: &Path) -> Result<Vec<u8>> {
    let mut file = File::open(path)
        .with_context(|| format!("unable to open input file \"{}\"", path.display()))?;
    let len = file
        .metadata()
        .with_context(|| format!("unable to stat input file \"{}\"", path.display()))?
        .len();

    if len == 0 {
        bail!("input file \"{}\" is empty", path.display());
    }
    let read_len = if len > MAX_SCAN_LENGTH as u64 {
        println!("WARNING: clipping input data to {} bytes", MAX_SCAN_LENGTH);
        MAX_SCAN_LENGTH as u64
    } else {
        len
    };

    let mut data = Vec::with_capacity(read_len as usize);
    file.by_ref()
        .take(read_len)
        .read_to_end(&mut data)
        .with_context(|| format!("unable to read input file \"{}\"", path.display()))?;
    Ok(data)
}
