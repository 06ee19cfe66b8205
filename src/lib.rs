//! # Bytehist
//!
//! **Split-aware parallel byte histograms** for files far larger than memory,
//! compressed or not.
//!
//! A scan cuts every input file into byte ranges, scans the ranges in parallel,
//! and merges the per-range results into one 256-bucket count of byte values.
//! The result is exact and does not depend on how the files were split or how
//! many workers ran.
//!
//! ## Key Features
//!
//! - **Range planning** - balanced split counts or fixed split sizes with slop
//! - **Zero-copy reads** - memory-mapped ranges when the stream supports it,
//!   a copying read otherwise, with identical results
//! - **Transparent decompression** - gzip, zstd, bzip2 and xz via feature flags,
//!   with pooled decompressor buffers
//! - **Bulk or line records** - whole ranges, or lines with the usual
//!   split-boundary rule
//! - **Three-tier reduce** - per-range scan, per-worker combine, global merge
//!   that refuses to report a total if any range went missing
//!
//! ## Quick Start
//!
//! ```no_run
//! use bytehist::*;
//! # use anyhow::Result;
//!
//! # fn main() -> Result<()> {
//! let config = ScanConfig {
//!     split_count: Some(16),
//!     ..ScanConfig::default()
//! };
//! let outcome = Runner::from_config(&config)?.run_paths(&["data/dump.bin", "data/logs/"])?;
//!
//! for (byte, count) in outcome.histogram.non_zero() {
//!     println!("{byte:#04x}\t{count}");
//! }
//! write_histogram_file("out/histogram.tsv", &outcome.histogram)?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Core Concepts
//!
//! ### Ranges and plans
//!
//! A [`RangeDescriptor`] is `[start, start + length)` of one file. The
//! [`Splitter`] turns [`InputFile`]s into a [`SplitPlan`] whose ranges cover each
//! file exactly once. Compressed files are planned as a single range.
//!
//! ### Sources and scanners
//!
//! A [`RangeSource`] opens one range and yields [`RawRecord`]s. A
//! [`RangeScanner`] counts every byte of those records into a [`Histogram`].
//!
//! ### Combine and merge
//!
//! Histograms merge by bucket-wise addition, which is commutative and
//! associative. [`combine_partials`] pre-merges within a worker; the [`Merger`]
//! checks that every planned range reported exactly once.
//!
//! ### Execution
//!
//! The [`Runner`] drives the whole pipeline on a rayon pool, or sequentially.
//!
//! ## Feature Flags
//!
//! - `compression-gzip`, `compression-zstd`, `compression-bzip2`, `compression-xz`
//! - `metrics` - forward read statistics into a [`metrics::MetricsCollector`]

pub mod combiner;
pub mod config;
pub mod error;
pub mod histogram;
pub mod io;
pub mod merger;
#[cfg(feature = "metrics")]
pub mod metrics;
pub mod range;
pub mod runner;
pub mod scanner;
pub mod source;
pub mod splitter;
pub mod testing;

pub use combiner::{CombineFn, HistogramCombine, combine_partials};
pub use config::ScanConfig;
pub use error::{Result, ScanError};
pub use histogram::{Histogram, PartialHistogram};
pub use io::fs::{FileSystem, LocalFileSystem, ReadStatistics};
pub use io::inputs::{InputFile, resolve_inputs};
pub use io::sink::{HistogramSink, write_histogram, write_histogram_file};
pub use merger::Merger;
pub use range::{RangeDescriptor, SplitPlan};
pub use runner::{ExecMode, Runner, ScanOutcome};
pub use scanner::{RangeScan, RangeScanner, count_bytes};
pub use source::{RangeSource, RawRecord, ReadPreference, ReadStrategy, RecordMode, SourceOptions};
pub use splitter::{SplitConfig, Splitter};
