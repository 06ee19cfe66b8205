//! In-process scheduler: plan, scan in parallel, combine, merge.
//!
//! A [`SplitPlan`] is cut into contiguous partitions. Each partition is one
//! unit of rayon work that scans its ranges in order and, with combining on,
//! pre-merges its partials into one before handing them to the [`Merger`].
//! The first failing range cancels the run: partitions that have not started
//! a range yet stop, and the error is returned instead of a partial total.

use crate::combiner::combine_partials;
use crate::config::ScanConfig;
use crate::error::Result;
use crate::histogram::{Histogram, PartialHistogram};
use crate::io::fs::{FileSystem, LocalFileSystem, ReadStatistics};
use crate::io::inputs::{InputFile, ResolveOptions, resolve_inputs};
use crate::merger::Merger;
#[cfg(feature = "metrics")]
use crate::metrics::{FILES_SCANNED, GaugeMetric, MetricsCollector, RANGES_SCANNED, RELEASE_WARNINGS};
use crate::range::{RangeDescriptor, SplitPlan};
use crate::scanner::RangeScanner;
use crate::source::SourceOptions;
use crate::splitter::{SplitConfig, Splitter};
use rayon::prelude::*;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;
use tracing::info;

#[derive(Clone, Copy, Debug)]
pub enum ExecMode {
    Sequential,
    Parallel {
        threads: Option<usize>,
        partitions: Option<usize>,
    },
}

/// Result of a whole run.
#[derive(Debug, Clone)]
pub struct ScanOutcome {
    pub histogram: Histogram,
    /// Ranges scanned.
    pub splits: usize,
    pub files: usize,
    /// Summed over every range's stream.
    pub statistics: ReadStatistics,
    /// Release failures logged along the way.
    pub warnings: usize,
}

pub struct Runner {
    pub mode: ExecMode,
    pub default_partitions: usize,
    pub split: SplitConfig,
    pub source: SourceOptions,
    pub resolve: ResolveOptions,
    pub combine: bool,
    pub fs: Arc<dyn FileSystem>,
    #[cfg(feature = "metrics")]
    pub metrics: Option<MetricsCollector>,
}

impl Default for Runner {
    fn default() -> Self {
        Self {
            mode: ExecMode::Parallel {
                threads: None,
                partitions: None,
            },
            default_partitions: 2 * num_cpus::get().max(2),
            split: SplitConfig::default(),
            source: SourceOptions::default(),
            resolve: ResolveOptions::default(),
            combine: true,
            fs: Arc::new(LocalFileSystem::new()),
            #[cfg(feature = "metrics")]
            metrics: None,
        }
    }
}

/// One partition's contribution.
struct WorkerOutput {
    partials: Vec<PartialHistogram>,
    statistics: ReadStatistics,
    warnings: usize,
}

impl Runner {
    /// # Errors
    /// `InvalidSplitRequest` if the configuration does not validate.
    pub fn from_config(config: &ScanConfig) -> Result<Self> {
        config.validate()?;
        let mode = if config.sequential {
            ExecMode::Sequential
        } else {
            ExecMode::Parallel {
                threads: config.threads,
                partitions: None,
            }
        };
        Ok(Self {
            mode,
            split: config.split_config(),
            source: config.source_options(),
            resolve: config.resolve_options(),
            combine: config.combine,
            ..Self::default()
        })
    }

    #[must_use]
    pub fn with_filesystem(mut self, fs: Arc<dyn FileSystem>) -> Self {
        self.fs = fs;
        self
    }

    #[cfg(feature = "metrics")]
    #[must_use]
    pub fn with_metrics(mut self, metrics: MetricsCollector) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Resolve paths (files, directories, globs), plan, and scan.
    ///
    /// # Errors
    /// See [`resolve_inputs`] and [`run_inputs`](Self::run_inputs).
    pub fn run_paths<P: AsRef<Path>>(&self, paths: &[P]) -> Result<ScanOutcome> {
        let inputs = resolve_inputs(self.fs.as_ref(), paths, &self.resolve)?;
        self.run_inputs(&inputs)
    }

    /// Plan the given inputs and scan them.
    ///
    /// # Errors
    /// `InvalidSplitRequest` from planning, then see [`run_plan`](Self::run_plan).
    pub fn run_inputs(&self, inputs: &[InputFile]) -> Result<ScanOutcome> {
        let plan = Splitter::new(self.split)?.plan(inputs)?;
        self.run_plan(&plan)
    }

    /// Scan every range of `plan` and merge.
    ///
    /// # Errors
    /// The first `RangeRead` of any range, `ThreadPool` if a dedicated pool
    /// cannot be built, or a merger error if a partial went missing.
    pub fn run_plan(&self, plan: &SplitPlan) -> Result<ScanOutcome> {
        let started = Instant::now();
        #[cfg(feature = "metrics")]
        if let Some(m) = &self.metrics {
            m.record_start();
        }

        let ranges: Vec<(usize, &RangeDescriptor)> = plan.iter().collect();
        let scanner = RangeScanner::new(self.fs.as_ref(), &self.source);
        let cancelled = AtomicBool::new(false);

        let outputs = match self.mode {
            ExecMode::Sequential => vec![self.scan_partition(&scanner, &ranges, &cancelled)?],
            ExecMode::Parallel {
                threads,
                partitions,
            } => {
                let parts = partitions
                    .unwrap_or(self.default_partitions)
                    .max(1)
                    .min(ranges.len().max(1));
                let chunk = ranges.len().div_ceil(parts).max(1);
                let work = || {
                    ranges
                        .par_chunks(chunk)
                        .map(|part| self.scan_partition(&scanner, part, &cancelled))
                        .collect::<Result<Vec<_>>>()
                };
                match threads {
                    Some(t) => rayon::ThreadPoolBuilder::new()
                        .num_threads(t)
                        .build()?
                        .install(work)?,
                    None => work()?,
                }
            }
        };

        let mut merger = Merger::new(plan.len());
        let mut statistics = ReadStatistics::default();
        let mut warnings = 0;
        for output in outputs {
            statistics += output.statistics;
            warnings += output.warnings;
            for partial in output.partials {
                merger.accept(partial)?;
            }
        }
        let histogram = merger.finish()?;
        let elapsed = started.elapsed();

        #[cfg(feature = "metrics")]
        if let Some(m) = &self.metrics {
            m.record_end();
            m.record_read_statistics(&statistics);
            m.increment_counter(RANGES_SCANNED, plan.len() as u64);
            m.increment_counter(FILES_SCANNED, plan.files as u64);
            m.increment_counter(RELEASE_WARNINGS, warnings as u64);
            let mib = histogram.total() as f64 / (1024.0 * 1024.0);
            m.register(Box::new(
                GaugeMetric::new("throughput_mib_per_s", mib / elapsed.as_secs_f64().max(1e-9))
                    .with_description("Decoded bytes counted per second of wall time"),
            ));
        }

        info!(
            files = plan.files,
            splits = plan.len(),
            bytes = histogram.total(),
            bytes_read = statistics.total_bytes_read,
            zero_copy_bytes = statistics.zero_copy_bytes_read,
            warnings,
            elapsed_ms = elapsed.as_millis() as u64,
            "scan finished"
        );
        Ok(ScanOutcome {
            histogram,
            splits: plan.len(),
            files: plan.files,
            statistics,
            warnings,
        })
    }

    fn scan_partition(
        &self,
        scanner: &RangeScanner<'_>,
        ranges: &[(usize, &RangeDescriptor)],
        cancelled: &AtomicBool,
    ) -> Result<WorkerOutput> {
        let mut partials = Vec::with_capacity(ranges.len());
        let mut statistics = ReadStatistics::default();
        let mut warnings = 0;
        for &(split, range) in ranges {
            // The failing partition reports the error; the others just stop.
            if cancelled.load(Ordering::Relaxed) {
                break;
            }
            let scan = scanner.scan(range).inspect_err(|_| {
                cancelled.store(true, Ordering::Relaxed);
            })?;
            statistics += scan.statistics;
            warnings += scan.warnings.len();
            partials.push(PartialHistogram::for_split(split, scan.histogram));
        }
        if self.combine {
            partials = combine_partials(partials).into_iter().collect();
        }
        Ok(WorkerOutput {
            partials,
            statistics,
            warnings,
        })
    }
}
