//! Fixtures and assertions for testing scans.
//!
//! ```no_run
//! use bytehist::testing::*;
//! use bytehist::{Runner, ScanConfig};
//!
//! # fn main() -> anyhow::Result<()> {
//! let dir = tempfile::tempdir()?;
//! let data = sample_bytes(1 << 20, 7);
//! let path = write_fixture(dir.path(), "blob.bin", &data)?;
//!
//! let outcome = Runner::from_config(&ScanConfig::default())?.run_paths(&[&path])?;
//! assert_histograms_equal(&outcome.histogram, &naive_histogram(&data));
//! # Ok(())
//! # }
//! ```

use crate::histogram::Histogram;
use crate::io::compression::auto_detect_writer;
use crate::range::RangeDescriptor;
use anyhow::{Context, Result};
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Reference histogram: one increment per byte, no lanes, no splitting.
#[must_use]
pub fn naive_histogram(bytes: &[u8]) -> Histogram {
    let mut counts = [0u64; 256];
    for &b in bytes {
        counts[usize::from(b)] += 1;
    }
    Histogram::from(counts)
}

/// Deterministic pseudo-random bytes; the same `seed` gives the same content.
#[must_use]
pub fn sample_bytes(len: usize, seed: u32) -> Vec<u8> {
    let mut state = seed.wrapping_mul(2_654_435_761).wrapping_add(12_345);
    (0..len)
        .map(|_| {
            state = state.wrapping_mul(1_103_515_245).wrapping_add(12_345);
            (state >> 16) as u8
        })
        .collect()
}

/// `lines` text lines of varying length, `\n`-terminated, some with `\r\n`.
#[must_use]
pub fn sample_text(lines: usize) -> Vec<u8> {
    let mut out = Vec::new();
    for i in 0..lines {
        let width = 1 + (i * 7) % 23;
        out.extend((0..width).map(|j| b'a' + ((i + j) % 26) as u8));
        if i % 5 == 4 {
            out.push(b'\r');
        }
        out.push(b'\n');
    }
    out
}

/// Write `bytes` to `dir/name` as is.
///
/// # Errors
/// If the file cannot be written.
pub fn write_fixture(dir: &Path, name: &str, bytes: &[u8]) -> Result<PathBuf> {
    let path = dir.join(name);
    std::fs::write(&path, bytes).with_context(|| format!("write {}", path.display()))?;
    Ok(path)
}

/// Write `bytes` to `dir/name`, compressed by the codec matching the name's
/// extension (`.gz`, `.zst`, ...). Names without one are written plain.
///
/// # Errors
/// If the file cannot be created or the codec fails.
pub fn write_compressed_fixture(dir: &Path, name: &str, bytes: &[u8]) -> Result<PathBuf> {
    let path = dir.join(name);
    let file = File::create(&path).with_context(|| format!("create {}", path.display()))?;
    let mut out = auto_detect_writer(file, &path)?;
    out.write_all(bytes)
        .with_context(|| format!("write {}", path.display()))?;
    out.flush()?;
    drop(out);
    Ok(path)
}

/// Assert two histograms are equal, listing the buckets that differ.
///
/// # Panics
/// If any bucket differs.
pub fn assert_histograms_equal(actual: &Histogram, expected: &Histogram) {
    let diffs: Vec<(u8, u64, u64)> = actual
        .iter()
        .zip(expected.iter())
        .filter(|((_, a), (_, e))| a != e)
        .map(|((b, a), (_, e))| (b, a, e))
        .collect();
    assert!(
        diffs.is_empty(),
        "Histogram mismatch in {} bucket(s) (byte, actual, expected): {diffs:?}\n  Actual total: {}\n  Expected total: {}",
        diffs.len(),
        actual.total(),
        expected.total()
    );
}

/// Assert `ranges` are ordered, disjoint, and cover `[0, size)` exactly.
///
/// # Panics
/// On a gap, an overlap, or an empty range.
pub fn assert_covers(ranges: &[RangeDescriptor], size: u64) {
    let mut next = 0u64;
    for (i, r) in ranges.iter().enumerate() {
        assert!(r.length > 0, "Range {i} is empty: {r}");
        assert_eq!(
            r.start, next,
            "Range {i} starts at {} but the previous range ended at {next}: {ranges:?}",
            r.start
        );
        next = r.end();
    }
    assert_eq!(next, size, "Ranges end at {next}, file size is {size}: {ranges:?}");
}
