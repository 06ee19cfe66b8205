//! Scan configuration.
//!
//! Every field has a default, so a config file only needs the keys it changes:
//!
//! ```json
//! { "split_count": 16, "record_mode": "line", "threads": 4 }
//! ```

use crate::error::{Result as ScanResult, ScanError};
use crate::io::compression::CodecDetection;
use crate::io::inputs::ResolveOptions;
use crate::source::{ReadPreference, RecordMode, SourceOptions};
use crate::splitter::{DEFAULT_SPLIT_SIZE, DEFAULT_SPLIT_SLOP, SplitConfig};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    /// Ranges per file.
    pub split_count: Option<u64>,
    /// Target range size in bytes. With neither this nor `split_count` set,
    /// files are cut into [`DEFAULT_SPLIT_SIZE`] ranges.
    pub split_size: Option<u64>,
    /// How far past `split_size` the last range of a file may grow.
    pub split_slop: f64,
    pub record_mode: RecordMode,
    pub read_strategy: ReadPreference,
    /// Upper bound on one bulk record; `None` reads a range in one buffer.
    pub max_record_bytes: Option<u64>,
    /// Pre-merge partials per worker before the global merge.
    pub combine: bool,
    /// Worker threads; `None` uses the rayon default.
    pub threads: Option<usize>,
    pub sequential: bool,
    pub codec_detection: CodecDetection,
    /// Skip input files whose name starts with `_` or `.`.
    pub skip_hidden: bool,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            split_count: None,
            split_size: None,
            split_slop: DEFAULT_SPLIT_SLOP,
            record_mode: RecordMode::Bulk,
            read_strategy: ReadPreference::Auto,
            max_record_bytes: None,
            combine: true,
            threads: None,
            sequential: false,
            codec_detection: CodecDetection::Extension,
            skip_hidden: true,
        }
    }
}

impl ScanConfig {
    /// Load from a JSON file. Missing keys take their defaults.
    ///
    /// # Errors
    /// If the file cannot be read, is not valid JSON, or fails [`validate`](Self::validate).
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).with_context(|| format!("open {}", path.display()))?;
        Self::from_json_str(&text).with_context(|| format!("load config {}", path.display()))
    }

    /// # Errors
    /// If the text is not valid JSON for this struct or fails [`validate`](Self::validate).
    pub fn from_json_str(text: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(text).context("parse scan config")?;
        config.validate()?;
        Ok(config)
    }

    /// # Errors
    /// `InvalidSplitRequest` on a zero split count, size, record limit or
    /// thread count, or a slop below 1.0.
    pub fn validate(&self) -> ScanResult<()> {
        self.split_config().validate()?;
        if self.max_record_bytes == Some(0) {
            return Err(ScanError::invalid_split("max_record_bytes must be positive"));
        }
        if self.threads == Some(0) {
            return Err(ScanError::invalid_split("threads must be positive"));
        }
        Ok(())
    }

    #[must_use]
    pub fn split_config(&self) -> SplitConfig {
        let size = match (self.split_count, self.split_size) {
            (None, None) => Some(DEFAULT_SPLIT_SIZE),
            (_, size) => size,
        };
        SplitConfig {
            count: self.split_count,
            size,
            slop: self.split_slop,
        }
    }

    #[must_use]
    pub fn source_options(&self) -> SourceOptions {
        SourceOptions {
            record_mode: self.record_mode,
            read_preference: self.read_strategy,
            max_record_bytes: self.max_record_bytes,
        }
    }

    #[must_use]
    pub fn resolve_options(&self) -> ResolveOptions {
        ResolveOptions {
            codec_detection: self.codec_detection,
            skip_hidden: self.skip_hidden,
        }
    }
}
