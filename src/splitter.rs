//! Cutting files into ranges.
//!
//! For every file the ranges are ordered, pairwise disjoint, and cover
//! `[0, size)` exactly. Two sizing modes:
//!
//! - **count**: exactly `min(count, size)` balanced ranges; range `i` starts at
//!   `floor(i * size / n)`, so lengths differ by at most one byte.
//! - **size**: fixed-size ranges, where the tail is folded into the last range
//!   while what is left is within `slop` times the target size.
//!
//! With both set, whichever yields the smaller ranges wins. Files whose codec
//! is not splittable get one range covering the whole compressed file, and an
//! empty file gets no ranges at all.

use crate::error::{Result, ScanError};
use crate::io::inputs::InputFile;
use crate::range::{RangeDescriptor, SplitPlan};
use serde::{Deserialize, Serialize};
use tracing::debug;

pub const DEFAULT_SPLIT_SIZE: u64 = 128 * 1024 * 1024;
pub const DEFAULT_SPLIT_SLOP: f64 = 1.1;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SplitConfig {
    pub count: Option<u64>,
    pub size: Option<u64>,
    pub slop: f64,
}

impl Default for SplitConfig {
    fn default() -> Self {
        Self {
            count: None,
            size: Some(DEFAULT_SPLIT_SIZE),
            slop: DEFAULT_SPLIT_SLOP,
        }
    }
}

impl SplitConfig {
    /// Exactly `n` ranges per file (fewer for files shorter than `n` bytes).
    #[must_use]
    pub fn by_count(n: u64) -> Self {
        Self {
            count: Some(n),
            size: None,
            slop: DEFAULT_SPLIT_SLOP,
        }
    }

    /// Ranges of `bytes` each, last one up to `slop` times larger.
    #[must_use]
    pub fn by_size(bytes: u64) -> Self {
        Self {
            count: None,
            size: Some(bytes),
            slop: DEFAULT_SPLIT_SLOP,
        }
    }

    #[must_use]
    pub fn with_slop(mut self, slop: f64) -> Self {
        self.slop = slop;
        self
    }

    /// # Errors
    /// `InvalidSplitRequest` on a zero count or size, no target at all, or a
    /// slop below 1.0.
    pub fn validate(&self) -> Result<()> {
        match (self.count, self.size) {
            (None, None) => Err(ScanError::invalid_split(
                "either a split count or a split size is required",
            )),
            (Some(0), _) => Err(ScanError::invalid_split("split count must be positive")),
            (_, Some(0)) => Err(ScanError::invalid_split("split size must be positive")),
            _ if !self.slop.is_finite() || self.slop < 1.0 => Err(ScanError::invalid_split(
                format!("split slop must be at least 1.0, got {}", self.slop),
            )),
            _ => Ok(()),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Splitter {
    config: SplitConfig,
}

impl Splitter {
    /// # Errors
    /// See [`SplitConfig::validate`].
    pub fn new(config: SplitConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    #[must_use]
    pub fn config(&self) -> &SplitConfig {
        &self.config
    }

    /// Ranges for one file, in offset order.
    ///
    /// # Errors
    /// Infallible for a splitter built with [`Splitter::new`].
    pub fn split(&self, input: &InputFile) -> Result<Vec<RangeDescriptor>> {
        let size = input.size;
        if size == 0 {
            return Ok(Vec::new());
        }
        if !input.is_splittable() {
            return Ok(vec![input.range(0, size)]);
        }

        let count = self.config.count.map(|n| n.min(size));
        let ranges = match (count, self.config.size) {
            (Some(n), Some(s)) if u128::from(s) * u128::from(n) < u128::from(size) => {
                self.sized(input, s)
            }
            (Some(n), _) => balanced(input, n),
            (None, s) => self.sized(input, s.unwrap_or(DEFAULT_SPLIT_SIZE)),
        };
        Ok(ranges)
    }

    /// Ranges for every file, concatenated in input order.
    ///
    /// # Errors
    /// As [`split`](Self::split).
    pub fn plan(&self, inputs: &[InputFile]) -> Result<SplitPlan> {
        let mut ranges = Vec::new();
        for input in inputs {
            let file_ranges = self.split(input)?;
            debug!(
                path = %input.path.display(),
                size = input.size,
                compressed = input.is_compressed(),
                ranges = file_ranges.len(),
                "planned file"
            );
            ranges.extend(file_ranges);
        }
        Ok(SplitPlan {
            ranges,
            files: inputs.len(),
        })
    }

    fn sized(&self, input: &InputFile, split_size: u64) -> Vec<RangeDescriptor> {
        let mut ranges = Vec::new();
        let mut remaining = input.size;
        while remaining as f64 / split_size as f64 > self.config.slop {
            ranges.push(input.range(input.size - remaining, split_size));
            remaining -= split_size;
        }
        if remaining != 0 {
            ranges.push(input.range(input.size - remaining, remaining));
        }
        ranges
    }
}

fn balanced(input: &InputFile, n: u64) -> Vec<RangeDescriptor> {
    let size = u128::from(input.size);
    let n128 = u128::from(n);
    // Both bounds are <= size, so they fit back into u64.
    let boundary = |i: u64| (u128::from(i) * size / n128) as u64;
    (0..n)
        .map(|i| {
            let start = boundary(i);
            input.range(start, boundary(i + 1) - start)
        })
        .collect()
}
