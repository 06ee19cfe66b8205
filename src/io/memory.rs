//! In-memory [`FileSystem`] for tests and demos.
//!
//! Files live in a shared map, so clones of a `MemoryFileSystem` see the same
//! files. Behavior knobs cover what a test of the range readers needs to
//! reach: whether streams advertise zero-copy reads, what the read statistics
//! claim about locality and caching, and injected failures on read or close.

use crate::io::fs::{FileStatus, FileSystem, InputStream, ReadStatistics, SharedBytes, ZeroCopyRead};
use std::collections::BTreeMap;
use std::io::{self, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

type FileMap = Arc<Mutex<BTreeMap<PathBuf, Arc<Vec<u8>>>>>;

/// Stream behavior for every file opened from a [`MemoryFileSystem`].
#[derive(Debug, Clone)]
pub struct MemoryBehavior {
    pub zero_copy: bool,
    /// Report bytes as served from this machine.
    pub local: bool,
    /// Report bytes as served from a cache.
    pub cached: bool,
    /// Fail any read that would touch this offset or beyond.
    pub fail_read_at: Option<u64>,
    /// Make `close` return an error.
    pub fail_close: bool,
    /// Make every `seek` return an error.
    pub fail_seek: bool,
}

impl Default for MemoryBehavior {
    fn default() -> Self {
        Self {
            zero_copy: true,
            local: true,
            cached: false,
            fail_read_at: None,
            fail_close: false,
            fail_seek: false,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct MemoryFileSystem {
    files: FileMap,
    behavior: MemoryBehavior,
}

impl MemoryFileSystem {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_behavior(behavior: MemoryBehavior) -> Self {
        Self {
            files: FileMap::default(),
            behavior,
        }
    }

    /// Same files, different stream behavior.
    #[must_use]
    pub fn with_shared_files(&self, behavior: MemoryBehavior) -> Self {
        Self {
            files: Arc::clone(&self.files),
            behavior,
        }
    }

    /// Create or replace a file.
    pub fn insert(&self, path: impl Into<PathBuf>, data: impl Into<Vec<u8>>) {
        let mut files = self.files.lock().unwrap_or_else(PoisonError::into_inner);
        files.insert(path.into(), Arc::new(data.into()));
    }

    fn get(&self, path: &Path) -> Option<Arc<Vec<u8>>> {
        let files = self.files.lock().unwrap_or_else(PoisonError::into_inner);
        files.get(path).cloned()
    }

    fn is_dir(&self, path: &Path) -> bool {
        let files = self.files.lock().unwrap_or_else(PoisonError::into_inner);
        files.keys().any(|p| p != path && p.starts_with(path))
    }
}

impl FileSystem for MemoryFileSystem {
    fn status(&self, path: &Path) -> io::Result<FileStatus> {
        if let Some(data) = self.get(path) {
            return Ok(FileStatus {
                path: path.to_path_buf(),
                len: data.len() as u64,
                is_dir: false,
            });
        }
        if self.is_dir(path) {
            return Ok(FileStatus {
                path: path.to_path_buf(),
                len: 0,
                is_dir: true,
            });
        }
        Err(io::Error::new(
            io::ErrorKind::NotFound,
            format!("no such file: {}", path.display()),
        ))
    }

    fn list_dir(&self, path: &Path) -> io::Result<Vec<FileStatus>> {
        if !self.is_dir(path) {
            return Err(io::Error::new(
                io::ErrorKind::NotFound,
                format!("no such directory: {}", path.display()),
            ));
        }
        let files = self.files.lock().unwrap_or_else(PoisonError::into_inner);
        let mut out = Vec::new();
        let mut subdirs = Vec::new();
        for (p, data) in files.iter() {
            let Ok(rest) = p.strip_prefix(path) else {
                continue;
            };
            let mut parts = rest.components();
            let Some(first) = parts.next() else { continue };
            let child = path.join(first);
            if parts.next().is_none() {
                out.push(FileStatus {
                    path: child,
                    len: data.len() as u64,
                    is_dir: false,
                });
            } else if !subdirs.contains(&child) {
                subdirs.push(child);
            }
        }
        drop(files);
        out.extend(subdirs.into_iter().map(|path| FileStatus {
            path,
            len: 0,
            is_dir: true,
        }));
        Ok(out)
    }

    fn open(&self, path: &Path) -> io::Result<Box<dyn InputStream>> {
        let data = self.get(path).ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::NotFound,
                format!("no such file: {}", path.display()),
            )
        })?;
        Ok(Box::new(MemoryInputStream {
            data,
            pos: 0,
            behavior: self.behavior.clone(),
            stats: ReadStatistics::default(),
            closed: false,
        }))
    }
}

struct MemoryInputStream {
    data: Arc<Vec<u8>>,
    pos: u64,
    behavior: MemoryBehavior,
    stats: ReadStatistics,
    closed: bool,
}

impl MemoryInputStream {
    /// How many bytes a read of up to `want` may return from the current position.
    fn readable(&self, want: usize) -> io::Result<usize> {
        if self.closed {
            return Err(io::Error::other("stream already closed"));
        }
        let remaining = (self.data.len() as u64).saturating_sub(self.pos);
        let n = remaining.min(want as u64);
        if let Some(fail_at) = self.behavior.fail_read_at
            && n > 0
            && self.pos + n > fail_at
        {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!("injected read failure at offset {fail_at}"),
            ));
        }
        Ok(n as usize)
    }

    fn account(&mut self, n: usize, zero_copy: bool) {
        let n = n as u64;
        self.pos += n;
        self.stats.total_bytes_read += n;
        if self.behavior.local {
            self.stats.local_bytes_read += n;
        }
        if self.behavior.cached {
            self.stats.cached_bytes_read += n;
        }
        if zero_copy {
            self.stats.zero_copy_bytes_read += n;
        }
    }
}

impl Read for MemoryInputStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.readable(buf.len())?;
        let start = (self.pos as usize).min(self.data.len());
        buf[..n].copy_from_slice(&self.data[start..start + n]);
        self.account(n, false);
        Ok(n)
    }
}

impl Seek for MemoryInputStream {
    fn seek(&mut self, to: SeekFrom) -> io::Result<u64> {
        if self.behavior.fail_seek {
            return Err(io::Error::other("injected seek failure"));
        }
        let len = self.data.len() as i128;
        let target = match to {
            SeekFrom::Start(p) => i128::from(p),
            SeekFrom::End(d) => len + i128::from(d),
            SeekFrom::Current(d) => i128::from(self.pos) + i128::from(d),
        };
        if target < 0 {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "seek before start of file",
            ));
        }
        self.pos = target as u64;
        Ok(self.pos)
    }
}

impl ZeroCopyRead for MemoryInputStream {
    fn read_zero_copy(&mut self, max_len: usize) -> io::Result<SharedBytes> {
        let n = self.readable(max_len)?;
        let start = (self.pos as usize).min(self.data.len());
        let backing: Arc<Vec<u8>> = Arc::clone(&self.data);
        let out = SharedBytes::new(backing, start, n);
        self.account(n, true);
        Ok(out)
    }
}

impl InputStream for MemoryInputStream {
    fn position(&self) -> u64 {
        self.pos
    }

    fn as_zero_copy(&mut self) -> Option<&mut dyn ZeroCopyRead> {
        if self.behavior.zero_copy {
            Some(self)
        } else {
            None
        }
    }

    fn statistics(&self) -> ReadStatistics {
        self.stats
    }

    fn close(&mut self) -> io::Result<()> {
        self.closed = true;
        if self.behavior.fail_close {
            return Err(io::Error::other("injected close failure"));
        }
        Ok(())
    }
}
