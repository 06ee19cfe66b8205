//! Resolving user-supplied paths into scan inputs.
//!
//! Each path is a file, a directory (expanded to its regular files, one level
//! deep), or a glob pattern. Every resolved file becomes an [`InputFile`]
//! carrying its size and compression codec, which is all the splitter needs.

use crate::error::{Result, ScanError};
use crate::io::compression::{
    CodecDetection, CompressionCodec, detect_codec, detect_from_magic,
};
use crate::io::fs::{FileStatus, FileSystem};
use crate::io::glob::is_glob_pattern;
use crate::range::RangeDescriptor;
use std::fmt;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

/// One file to scan: `(path, size, codec)`.
#[derive(Clone)]
pub struct InputFile {
    pub path: PathBuf,
    /// On-disk size in bytes (compressed size for compressed files).
    pub size: u64,
    pub codec: Option<Arc<dyn CompressionCodec>>,
}

impl InputFile {
    /// An uncompressed input.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>, size: u64) -> Self {
        Self {
            path: path.into(),
            size,
            codec: None,
        }
    }

    /// An input with its codec detected from the file name.
    #[must_use]
    pub fn detect(path: impl Into<PathBuf>, size: u64) -> Self {
        let path = path.into();
        let codec = detect_codec(&path);
        Self { path, size, codec }
    }

    #[must_use]
    pub fn with_codec(mut self, codec: Arc<dyn CompressionCodec>) -> Self {
        self.codec = Some(codec);
        self
    }

    #[must_use]
    pub fn is_compressed(&self) -> bool {
        self.codec.is_some()
    }

    /// `[start, start + length)` of this file, tagged with its codec so the
    /// range is decoded the same way it was planned.
    #[must_use]
    pub fn range(&self, start: u64, length: u64) -> RangeDescriptor {
        let range = RangeDescriptor::new(&self.path, start, length);
        match &self.codec {
            Some(codec) => range.with_codec(codec.name()),
            None => range,
        }
    }

    /// Whether the file may be cut into more than one range.
    #[must_use]
    pub fn is_splittable(&self) -> bool {
        self.codec.as_ref().is_none_or(|c| c.is_splittable())
    }
}

impl fmt::Debug for InputFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InputFile")
            .field("path", &self.path)
            .field("size", &self.size)
            .field("codec", &self.codec.as_ref().map(|c| c.name().to_string()))
            .finish()
    }
}

/// How paths are turned into [`InputFile`]s.
#[derive(Debug, Clone, Copy)]
pub struct ResolveOptions {
    pub codec_detection: CodecDetection,
    /// Skip files whose name starts with `_` or `.`.
    pub skip_hidden: bool,
}

impl Default for ResolveOptions {
    fn default() -> Self {
        Self {
            codec_detection: CodecDetection::Extension,
            skip_hidden: true,
        }
    }
}

/// Resolve `paths` against `fs`.
///
/// Glob patterns are expanded by [`FileSystem::glob`], so they see the same
/// files as plain paths do. Glob matches and directory entries are sorted by
/// path; explicitly named files keep the caller's order.
///
/// # Errors
/// `InvalidSplitRequest` if a path does not exist, cannot be read, or a glob
/// pattern is malformed.
pub fn resolve_inputs<P: AsRef<Path>>(
    fs: &dyn FileSystem,
    paths: &[P],
    options: &ResolveOptions,
) -> Result<Vec<InputFile>> {
    let mut out = Vec::new();
    for path in paths {
        let path = path.as_ref();
        let text = path.to_string_lossy();
        if is_glob_pattern(&text) {
            let matches = fs
                .glob(&text)
                .map_err(|e| ScanError::invalid_input(path, e.to_string()))?;
            for m in matches {
                if options.skip_hidden && is_hidden(&m) {
                    continue;
                }
                let status = fs
                    .status(&m)
                    .map_err(|e| ScanError::invalid_input(&m, e.to_string()))?;
                out.push(to_input(fs, status, options)?);
            }
            continue;
        }

        let status = fs
            .status(path)
            .map_err(|e| ScanError::invalid_input(path, e.to_string()))?;
        if status.is_dir {
            let mut children = fs
                .list_dir(path)
                .map_err(|e| ScanError::invalid_input(path, e.to_string()))?;
            children.retain(|c| !c.is_dir && !(options.skip_hidden && is_hidden(&c.path)));
            children.sort_by(|a, b| a.path.cmp(&b.path));
            debug!(dir = %path.display(), files = children.len(), "expanded input directory");
            for child in children {
                out.push(to_input(fs, child, options)?);
            }
        } else {
            out.push(to_input(fs, status, options)?);
        }
    }
    Ok(out)
}

fn to_input(fs: &dyn FileSystem, status: FileStatus, options: &ResolveOptions) -> Result<InputFile> {
    let mut codec = detect_codec(&status.path);
    if codec.is_none() && options.codec_detection == CodecDetection::ExtensionAndMagic && status.len > 0 {
        codec = sniff(fs, &status.path)?;
    }
    Ok(InputFile {
        path: status.path,
        size: status.len,
        codec,
    })
}

fn sniff(fs: &dyn FileSystem, path: &Path) -> Result<Option<Arc<dyn CompressionCodec>>> {
    let read_header = || -> std::io::Result<Vec<u8>> {
        let mut stream = fs.open(path)?;
        let mut header = Vec::with_capacity(8);
        (&mut stream).take(8).read_to_end(&mut header)?;
        stream.close()?;
        Ok(header)
    };
    let header = read_header().map_err(|e| ScanError::invalid_input(path, e.to_string()))?;
    Ok(detect_from_magic(&header))
}

/// `_SUCCESS`, `.crc` sidecars and the like.
fn is_hidden(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|n| n.starts_with('_') || n.starts_with('.'))
}
