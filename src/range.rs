//! Byte ranges and split plans.
//!
//! A [`RangeDescriptor`] names `[start, start + length)` of one file. A
//! [`SplitPlan`] is the ordered list of descriptors the [`Splitter`](crate::Splitter)
//! issued for a set of inputs; a descriptor's position in the plan is its split
//! index, which is how the [`Merger`](crate::Merger) checks that every range was
//! accounted for exactly once.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// A contiguous byte span of one file.
///
/// For compressed files the offsets are raw on-disk offsets into the
/// compressed stream, not offsets into the decompressed content.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RangeDescriptor {
    pub path: PathBuf,
    pub start: u64,
    pub length: u64,
    /// Registered name of the codec the file was resolved with. `None` reads
    /// the bytes as they are, whatever the file is called.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub codec: Option<String>,
}

impl RangeDescriptor {
    /// An uncompressed range.
    pub fn new(path: impl Into<PathBuf>, start: u64, length: u64) -> Self {
        Self {
            path: path.into(),
            start,
            length,
            codec: None,
        }
    }

    #[must_use]
    pub fn with_codec(mut self, codec: impl Into<String>) -> Self {
        self.codec = Some(codec.into());
        self
    }

    #[must_use]
    pub fn codec(&self) -> Option<&str> {
        self.codec.as_deref()
    }

    /// Exclusive end offset.
    #[must_use]
    pub fn end(&self) -> u64 {
        self.start.saturating_add(self.length)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.length == 0
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl fmt::Display for RangeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:[{}, {})", self.path.display(), self.start, self.end())
    }
}

/// The ordered descriptors issued for one run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SplitPlan {
    /// Every issued range, in file order then offset order.
    pub ranges: Vec<RangeDescriptor>,
    /// Number of input files the plan was built from (including empty ones).
    pub files: usize,
}

impl SplitPlan {
    #[must_use]
    pub fn len(&self) -> usize {
        self.ranges.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }

    /// `(split index, descriptor)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (usize, &RangeDescriptor)> {
        self.ranges.iter().enumerate()
    }

    /// Total raw bytes covered by the plan.
    #[must_use]
    pub fn total_bytes(&self) -> u64 {
        self.ranges.iter().map(|r| r.length).sum()
    }
}
