//! Error taxonomy for splitting, scanning, and merging.
//!
//! ## Error Categories
//!
//! - `InvalidSplitRequest`: bad split configuration or an input that cannot be
//!   planned (missing, unreadable, not a regular file). Fatal for that input.
//! - `RangeRead`: I/O failure while reading one range (disk error, truncated
//!   stream, corrupt compressed data). Never retried here; re-issuing the same
//!   [`RangeDescriptor`] is the scheduler's job.
//! - `IncompleteInput` / `DuplicatePartial` / `UnexpectedPartial`: the merger did
//!   not see every issued split exactly once.
//! - `ResourceRelease`: closing a stream or returning a decompressor failed.
//!   Logged and surfaced as a warning; it never replaces an earlier `RangeRead`.

use crate::range::RangeDescriptor;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, ScanError>;

#[derive(Debug, Error)]
pub enum ScanError {
    #[error("invalid split request{}: {reason}", path_suffix(.path))]
    InvalidSplitRequest {
        path: Option<PathBuf>,
        reason: String,
    },

    #[error("failed to read range {range}: {source}")]
    RangeRead {
        range: RangeDescriptor,
        #[source]
        source: io::Error,
    },

    #[error("incomplete input: expected {expected} partial histograms, received {received} (missing splits {missing:?})")]
    IncompleteInput {
        expected: usize,
        received: usize,
        missing: Vec<usize>,
    },

    #[error("split {split} was reported more than once")]
    DuplicatePartial { split: usize },

    #[error("split {split} was never issued (plan has {expected} splits)")]
    UnexpectedPartial { split: usize, expected: usize },

    #[error("failed to release {resource}: {source}")]
    ResourceRelease {
        resource: String,
        #[source]
        source: io::Error,
    },

    #[error("worker pool error: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}

fn path_suffix(path: &Option<PathBuf>) -> String {
    match path {
        Some(p) => format!(" for {}", p.display()),
        None => String::new(),
    }
}

impl ScanError {
    /// Split-request error not tied to a particular file.
    pub fn invalid_split(reason: impl Into<String>) -> Self {
        Self::InvalidSplitRequest {
            path: None,
            reason: reason.into(),
        }
    }

    /// Split-request error for one input file.
    pub fn invalid_input(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::InvalidSplitRequest {
            path: Some(path.into()),
            reason: reason.into(),
        }
    }

    pub fn range_read(range: &RangeDescriptor, source: io::Error) -> Self {
        Self::RangeRead {
            range: range.clone(),
            source,
        }
    }

    pub fn release(resource: impl Into<String>, source: io::Error) -> Self {
        Self::ResourceRelease {
            resource: resource.into(),
            source,
        }
    }

    /// True for the non-fatal release warnings.
    #[must_use]
    pub fn is_warning(&self) -> bool {
        matches!(self, Self::ResourceRelease { .. })
    }
}
