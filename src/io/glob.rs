//! Glob expansion for input paths.
//!
//! Patterns follow the `glob` crate: `*`, `?`, `**` and `[...]` classes. Matches
//! are filtered to regular files and sorted so that split indices are stable
//! from run to run.
//!
//! ```no_run
//! use bytehist::io::glob::expand_glob;
//!
//! let dumps = expand_glob("captures/2024-*/*.bin.gz")?;
//! # use anyhow::Error; Ok::<(), Error>(())
//! ```

use anyhow::{Context, Result, bail};
use glob::glob;
use std::path::PathBuf;

/// True if `s` contains glob metacharacters.
#[must_use]
pub fn is_glob_pattern(s: &str) -> bool {
    s.contains(['*', '?', '['])
}

/// Expand `pattern` into a sorted list of matching regular files.
///
/// Zero matches is an empty list, not an error.
///
/// # Errors
/// If the pattern is malformed or a matched entry cannot be read.
pub fn expand_glob(pattern: &str) -> Result<Vec<PathBuf>> {
    let paths = glob(pattern).with_context(|| format!("invalid glob pattern: {pattern}"))?;

    let mut result = Vec::new();
    for entry in paths {
        let path =
            entry.with_context(|| format!("error reading glob entry for pattern: {pattern}"))?;
        if path.is_file() {
            result.push(path);
        }
    }
    result.sort();
    Ok(result)
}

/// Like [`expand_glob`], but zero matches is an error.
///
/// # Errors
/// As [`expand_glob`], plus when nothing matches.
pub fn expand_glob_required(pattern: &str) -> Result<Vec<PathBuf>> {
    let files = expand_glob(pattern)?;
    if files.is_empty() {
        bail!("no files found matching pattern: {pattern}");
    }
    Ok(files)
}
