//! The per-range worker: one [`RangeDescriptor`] in, one [`Histogram`] out.

use crate::error::{Result, ScanError};
use crate::histogram::Histogram;
use crate::io::fs::{FileSystem, ReadStatistics};
use crate::range::RangeDescriptor;
use crate::source::{RangeSource, RawRecord, ReadStrategy, SourceOptions};
use tracing::debug;

/// What scanning one range produced.
#[derive(Debug)]
pub struct RangeScan {
    pub histogram: Histogram,
    pub statistics: ReadStatistics,
    pub strategy: ReadStrategy,
    pub records: u64,
    /// Non-fatal failures while releasing the stream or decompressor.
    pub warnings: Vec<ScanError>,
}

/// Add every byte of a record to `histogram`.
pub fn count_bytes(record: &RawRecord, histogram: &mut Histogram) {
    histogram.add_bytes(record.bytes());
}

/// Scans ranges through [`RangeSource`]s opened on one filesystem.
///
/// A scanner holds no per-range state, so one instance can be shared by every
/// worker thread. Each call to [`scan`](Self::scan) opens and closes its own
/// source.
#[derive(Clone, Copy)]
pub struct RangeScanner<'a> {
    fs: &'a dyn FileSystem,
    options: &'a SourceOptions,
}

impl<'a> RangeScanner<'a> {
    #[must_use]
    pub fn new(fs: &'a dyn FileSystem, options: &'a SourceOptions) -> Self {
        Self { fs, options }
    }

    /// Histogram of exactly the bytes the source delivers for `range`.
    ///
    /// # Errors
    /// `RangeRead` if the range cannot be opened or read. The source is closed
    /// either way; release failures after a read error are logged but the read
    /// error is what gets returned.
    pub fn scan(&self, range: &RangeDescriptor) -> Result<RangeScan> {
        let mut source = RangeSource::open(self.fs, range, self.options)?;
        let mut histogram = Histogram::new();
        let mut records = 0u64;

        let read = loop {
            match source.next_record() {
                Ok(Some(record)) => {
                    count_bytes(&record, &mut histogram);
                    records += 1;
                }
                Ok(None) => break Ok(()),
                Err(e) => break Err(e),
            }
        };
        let warnings = source.close();
        read?;

        debug!(
            range = %range,
            records,
            bytes = histogram.total(),
            strategy = ?source.strategy(),
            "range scanned"
        );
        Ok(RangeScan {
            histogram,
            statistics: source.statistics(),
            strategy: source.strategy(),
            records,
            warnings,
        })
    }
}
