//! Global reduce of partial histograms.
//!
//! The merger is told up front how many ranges were issued. Partials may
//! arrive in any order and in any grouping (per range, or already combined
//! over several ranges); each carries the split indices it covers. `finish`
//! only succeeds once every index has been seen exactly once.

use crate::error::{Result, ScanError};
use crate::histogram::{Histogram, PartialHistogram};

#[derive(Debug, Clone)]
pub struct Merger {
    seen: Vec<bool>,
    received: usize,
    total: Histogram,
}

impl Merger {
    /// A merger expecting partials for splits `0..expected`.
    #[must_use]
    pub fn new(expected: usize) -> Self {
        Self {
            seen: vec![false; expected],
            received: 0,
            total: Histogram::new(),
        }
    }

    /// Fold one partial into the running total.
    ///
    /// The partial is checked as a whole before anything is added, so a
    /// rejected partial leaves the merger unchanged.
    ///
    /// # Errors
    /// `UnexpectedPartial` for a split index outside the plan,
    /// `DuplicatePartial` for one already received.
    pub fn accept(&mut self, partial: PartialHistogram) -> Result<()> {
        let mut splits = partial.splits.clone();
        splits.sort_unstable();
        for (i, &split) in splits.iter().enumerate() {
            if split >= self.seen.len() {
                return Err(ScanError::UnexpectedPartial {
                    split,
                    expected: self.seen.len(),
                });
            }
            if self.seen[split] || (i > 0 && splits[i - 1] == split) {
                return Err(ScanError::DuplicatePartial { split });
            }
        }
        for &split in &splits {
            self.seen[split] = true;
        }
        self.received += splits.len();
        self.total.merge(&partial.histogram);
        Ok(())
    }

    /// Number of distinct splits received so far.
    #[must_use]
    pub fn received(&self) -> usize {
        self.received
    }

    #[must_use]
    pub fn expected(&self) -> usize {
        self.seen.len()
    }

    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.received == self.seen.len()
    }

    /// The final histogram.
    ///
    /// # Errors
    /// `IncompleteInput` listing the missing split indices.
    pub fn finish(self) -> Result<Histogram> {
        if !self.is_complete() {
            let missing = self
                .seen
                .iter()
                .enumerate()
                .filter_map(|(i, &seen)| (!seen).then_some(i))
                .collect();
            return Err(ScanError::IncompleteInput {
                expected: self.seen.len(),
                received: self.received,
                missing,
            });
        }
        Ok(self.total)
    }
}
