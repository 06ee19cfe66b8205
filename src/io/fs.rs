//! Filesystem abstraction the range readers sit on.
//!
//! ## Architecture
//!
//! - [`FileSystem`] resolves paths (status, directory listing) and opens
//!   [`InputStream`]s.
//! - [`InputStream`] is a seekable byte stream that may additionally expose the
//!   [`ZeroCopyRead`] capability through [`InputStream::as_zero_copy`]. A
//!   zero-copy read hands back a [`SharedBytes`] view aliasing memory the stream
//!   already owns (a memory map, an in-memory file) instead of filling a caller
//!   buffer.
//! - [`ReadStatistics`] are the informational counters a stream keeps about
//!   where its bytes came from.
//!
//! [`LocalFileSystem`] is the built-in implementation over `std::fs`, with
//! zero-copy reads served from a `memmap2` mapping of the file.

use crate::io::glob::expand_glob;
use glob::{MatchOptions, Pattern};
use memmap2::Mmap;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};
use std::ops::{AddAssign, Deref};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Size and kind of a path as seen by a [`FileSystem`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileStatus {
    pub path: PathBuf,
    pub len: u64,
    pub is_dir: bool,
}

/// Where a stream's bytes came from. Informational only.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReadStatistics {
    /// Every byte handed to a caller.
    pub total_bytes_read: u64,
    /// Bytes served from storage on this machine.
    pub local_bytes_read: u64,
    /// Bytes served from a cache or short-circuit path.
    pub cached_bytes_read: u64,
    /// Bytes handed out through [`ZeroCopyRead`].
    pub zero_copy_bytes_read: u64,
}

impl ReadStatistics {
    /// Bytes that went through a copying read.
    #[must_use]
    pub fn copied_bytes_read(&self) -> u64 {
        self.total_bytes_read - self.zero_copy_bytes_read
    }

    /// Bytes that had to come from another machine.
    #[must_use]
    pub fn remote_bytes_read(&self) -> u64 {
        self.total_bytes_read - self.local_bytes_read
    }
}

impl AddAssign for ReadStatistics {
    fn add_assign(&mut self, rhs: Self) {
        self.total_bytes_read += rhs.total_bytes_read;
        self.local_bytes_read += rhs.local_bytes_read;
        self.cached_bytes_read += rhs.cached_bytes_read;
        self.zero_copy_bytes_read += rhs.zero_copy_bytes_read;
    }
}

/// An immutable, cheaply clonable view into memory owned by a stream.
#[derive(Clone)]
pub struct SharedBytes {
    backing: Arc<dyn AsRef<[u8]> + Send + Sync>,
    offset: usize,
    len: usize,
}

impl SharedBytes {
    /// View `backing[offset..offset + len]`.
    ///
    /// # Panics
    /// If the window does not fit inside `backing`.
    pub fn new(backing: Arc<dyn AsRef<[u8]> + Send + Sync>, offset: usize, len: usize) -> Self {
        let available = AsRef::<[u8]>::as_ref(&*backing).len();
        assert!(
            offset.checked_add(len).is_some_and(|end| end <= available),
            "shared window {offset}+{len} exceeds backing of {available} bytes"
        );
        Self {
            backing,
            offset,
            len,
        }
    }

    /// True when both views alias the same backing allocation.
    #[must_use]
    pub fn shares_backing_with(&self, other: &SharedBytes) -> bool {
        Arc::ptr_eq(&self.backing, &other.backing)
    }
}

impl Deref for SharedBytes {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        &AsRef::<[u8]>::as_ref(&*self.backing)[self.offset..self.offset + self.len]
    }
}

impl fmt::Debug for SharedBytes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SharedBytes")
            .field("offset", &self.offset)
            .field("len", &self.len)
            .finish()
    }
}

/// Streams that can return buffers aliasing their own memory.
pub trait ZeroCopyRead {
    /// Return up to `max_len` bytes at the current position and advance past
    /// them. An empty result means end of stream.
    fn read_zero_copy(&mut self, max_len: usize) -> io::Result<SharedBytes>;
}

/// A seekable input stream opened by a [`FileSystem`].
pub trait InputStream: Read + Seek + Send {
    /// Current byte offset in the underlying file.
    fn position(&self) -> u64;

    /// The zero-copy capability, if this stream has one.
    fn as_zero_copy(&mut self) -> Option<&mut dyn ZeroCopyRead> {
        None
    }

    fn statistics(&self) -> ReadStatistics {
        ReadStatistics::default()
    }

    /// Release the stream's underlying handle. Called at most once per stream.
    fn close(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Path resolution and stream opening.
pub trait FileSystem: Send + Sync {
    /// # Errors
    /// If the path does not exist or cannot be inspected.
    fn status(&self, path: &Path) -> io::Result<FileStatus>;

    /// Direct children of a directory, in any order.
    ///
    /// # Errors
    /// If the path is not a readable directory.
    fn list_dir(&self, path: &Path) -> io::Result<Vec<FileStatus>>;

    /// # Errors
    /// If the file cannot be opened for reading.
    fn open(&self, path: &Path) -> io::Result<Box<dyn InputStream>>;

    /// Regular files matching a `glob` pattern, sorted.
    ///
    /// The default walks [`list_dir`](Self::list_dir) below the pattern's
    /// literal prefix and tests every file against the pattern, so it works
    /// for any implementation that can list directories.
    ///
    /// # Errors
    /// If the pattern is malformed or a directory cannot be listed.
    fn glob(&self, pattern: &str) -> io::Result<Vec<PathBuf>> {
        let matcher = Pattern::new(pattern).map_err(|e| {
            io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("invalid glob pattern {pattern}: {e}"),
            )
        })?;
        let options = MatchOptions {
            require_literal_separator: true,
            ..MatchOptions::new()
        };
        let root = literal_prefix(pattern);
        let relative = root == Path::new(".");

        let mut pending = vec![root];
        let mut out = Vec::new();
        while let Some(dir) = pending.pop() {
            let entries = match self.list_dir(&dir) {
                Ok(entries) => entries,
                Err(e) if e.kind() == io::ErrorKind::NotFound => continue,
                Err(e) => return Err(e),
            };
            for entry in entries {
                if entry.is_dir {
                    pending.push(entry.path);
                    continue;
                }
                let path = match entry.path.strip_prefix(".") {
                    Ok(stripped) if relative => stripped.to_path_buf(),
                    _ => entry.path,
                };
                if matcher.matches_path_with(&path, options) {
                    out.push(path);
                }
            }
        }
        out.sort();
        Ok(out)
    }
}

/// Leading components of `pattern` that contain no glob metacharacters.
fn literal_prefix(pattern: &str) -> PathBuf {
    let mut root = PathBuf::new();
    for component in Path::new(pattern).components() {
        if component.as_os_str().to_string_lossy().contains(['*', '?', '[']) {
            break;
        }
        root.push(component);
    }
    if root.as_os_str().is_empty() {
        root.push(".");
    }
    root
}

// ============================================================================
// Local filesystem
// ============================================================================

/// [`FileSystem`] over `std::fs`. Zero-copy reads come from a memory map.
#[derive(Debug, Clone)]
pub struct LocalFileSystem {
    zero_copy: bool,
}

impl LocalFileSystem {
    #[must_use]
    pub fn new() -> Self {
        Self { zero_copy: true }
    }

    /// A filesystem whose streams never advertise [`ZeroCopyRead`].
    #[must_use]
    pub fn without_zero_copy() -> Self {
        Self { zero_copy: false }
    }
}

impl Default for LocalFileSystem {
    fn default() -> Self {
        Self::new()
    }
}

impl FileSystem for LocalFileSystem {
    fn status(&self, path: &Path) -> io::Result<FileStatus> {
        let meta = std::fs::metadata(path)?;
        Ok(FileStatus {
            path: path.to_path_buf(),
            len: meta.len(),
            is_dir: meta.is_dir(),
        })
    }

    fn list_dir(&self, path: &Path) -> io::Result<Vec<FileStatus>> {
        let mut out = Vec::new();
        for entry in std::fs::read_dir(path)? {
            let entry = entry?;
            let meta = entry.metadata()?;
            out.push(FileStatus {
                path: entry.path(),
                len: meta.len(),
                is_dir: meta.is_dir(),
            });
        }
        Ok(out)
    }

    fn glob(&self, pattern: &str) -> io::Result<Vec<PathBuf>> {
        expand_glob(pattern).map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, format!("{e:#}")))
    }

    fn open(&self, path: &Path) -> io::Result<Box<dyn InputStream>> {
        let file = File::open(path)?;
        let len = file.metadata()?.len();
        Ok(Box::new(LocalInputStream {
            file: Some(file),
            len,
            pos: 0,
            mmap: None,
            zero_copy: self.zero_copy,
            stats: ReadStatistics::default(),
        }))
    }
}

struct LocalInputStream {
    file: Option<File>,
    len: u64,
    pos: u64,
    mmap: Option<Arc<Mmap>>,
    zero_copy: bool,
    stats: ReadStatistics,
}

impl LocalInputStream {
    fn file(&mut self) -> io::Result<&mut File> {
        self.file
            .as_mut()
            .ok_or_else(|| io::Error::other("stream already closed"))
    }

    fn mapping(&mut self) -> io::Result<Arc<Mmap>> {
        if let Some(m) = &self.mmap {
            return Ok(Arc::clone(m));
        }
        let file = self.file()?;
        // Safety: the mapping is read-only. Another process truncating or
        // rewriting the file while it is mapped is outside what this reader
        // can defend against, same as for any mmap-based reader.
        #[allow(unsafe_code)]
        let map = Arc::new(unsafe { Mmap::map(&*file)? });
        self.mmap = Some(Arc::clone(&map));
        Ok(map)
    }
}

impl Read for LocalInputStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.file()?.read(buf)?;
        self.pos += n as u64;
        self.stats.total_bytes_read += n as u64;
        self.stats.local_bytes_read += n as u64;
        Ok(n)
    }
}

impl Seek for LocalInputStream {
    fn seek(&mut self, to: SeekFrom) -> io::Result<u64> {
        let pos = self.file()?.seek(to)?;
        self.pos = pos;
        Ok(pos)
    }
}

impl ZeroCopyRead for LocalInputStream {
    fn read_zero_copy(&mut self, max_len: usize) -> io::Result<SharedBytes> {
        let map = self.mapping()?;
        // The mapping, not the length seen at open, bounds what can be served.
        let mapped = map.len();
        let remaining = (mapped as u64).saturating_sub(self.pos);
        let n = remaining.min(max_len as u64) as usize;
        let offset = usize::try_from(self.pos)
            .map_err(|_| io::Error::other("offset exceeds address space"))?;
        let out = SharedBytes::new(map, offset.min(mapped), n);
        self.pos += n as u64;
        // Keep the descriptor's offset in step for any copying read that follows.
        let pos = self.pos;
        self.file()?.seek(SeekFrom::Start(pos))?;
        self.stats.total_bytes_read += n as u64;
        self.stats.local_bytes_read += n as u64;
        self.stats.zero_copy_bytes_read += n as u64;
        Ok(out)
    }
}

impl InputStream for LocalInputStream {
    fn position(&self) -> u64 {
        self.pos
    }

    fn as_zero_copy(&mut self) -> Option<&mut dyn ZeroCopyRead> {
        // Zero-length files cannot be mapped on every platform.
        if self.zero_copy && self.len > 0 {
            Some(self)
        } else {
            None
        }
    }

    fn statistics(&self) -> ReadStatistics {
        self.stats
    }

    fn close(&mut self) -> io::Result<()> {
        self.mmap = None;
        // Dropping the handle is the close; std reports no error for it.
        drop(self.file.take());
        Ok(())
    }
}
