//! Pluggable compression support: codec detection and the decompressor pool.
//!
//! ## Architecture
//!
//! - [`CompressionCodec`] - pluggable codec implementations, kept in a global
//!   registry ([`register_codec`]).
//! - Detection by file extension ([`detect_codec`]) and, opt-in, by magic bytes
//!   ([`detect_from_magic`]).
//! - A process-wide decompressor pool. A range reader acquires a
//!   [`Decompressor`] when it opens a compressed range and must hand it back
//!   with [`return_decompressor`] when it closes. The pooled resource is the
//!   staging buffer the decompressing stream pulls compressed input through, so
//!   scanning many compressed ranges reuses a handful of buffers instead of
//!   allocating one per range. [`teardown_decompressor_pool`] drops everything
//!   idle and reports leases that were never returned.
//!
//! ## Built-in Codecs
//!
//! When enabled via feature flags, the following codecs are available:
//! - **Gzip** (`.gz`) - via `flate2` crate (feature: `compression-gzip`)
//! - **Zstd** (`.zst`) - via `zstd` crate (feature: `compression-zstd`)
//! - **Bzip2** (`.bz2`) - via `bzip2` crate (feature: `compression-bzip2`)
//! - **Xz** (`.xz`) - via `xz2` crate (feature: `compression-xz`)
//!
//! All built-in decoders accept concatenated members/frames. None of them is
//! splittable: a compressed file is always scanned as a single range.
//!
//! ## Custom Codec Implementation
//! ```
//! use bytehist::io::compression::CompressionCodec;
//! use std::io::{BufRead, Read, Write, Result};
//!
//! struct MyCodec;
//!
//! impl CompressionCodec for MyCodec {
//!     fn name(&self) -> &str { "mycodec" }
//!
//!     fn extensions(&self) -> &[&str] { &[".myext"] }
//!
//!     fn magic_bytes(&self) -> Option<&[u8]> { Some(&[0xAB, 0xCD]) }
//!
//!     fn wrap_reader_dyn(&self, reader: Box<dyn BufRead + Send>) -> Result<Box<dyn Read + Send>> {
//!         // Your decompression logic
//!         Ok(Box::new(reader))
//!     }
//!
//!     fn wrap_writer_dyn(&self, writer: Box<dyn Write>) -> Result<Box<dyn Write>> {
//!         // Your compression logic
//!         Ok(writer)
//!     }
//! }
//! ```

use crate::error::{Result as ScanResult, ScanError};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::io::{self, BufRead, BufWriter, Read, Write};
use std::path::Path;
use std::sync::{Arc, Mutex, RwLock};
use tracing::{debug, warn};

/// Global codec registry for pluggable compression support.
static CODEC_REGISTRY: RwLock<Option<Vec<Arc<dyn CompressionCodec>>>> = RwLock::new(None);

/// Global decompressor pool, keyed by codec name.
static DECOMPRESSOR_POOL: Mutex<Option<PoolState>> = Mutex::new(None);

/// Staging buffer size for compressed input.
pub const STAGING_BUFFER_BYTES: usize = 256 * 1024;

/// Initialize the codec registry with built-in codecs.
fn init_registry() -> Vec<Arc<dyn CompressionCodec>> {
    vec![
        #[cfg(feature = "compression-gzip")]
        Arc::new(GzipCodec),
        #[cfg(feature = "compression-zstd")]
        Arc::new(ZstdCodec),
        #[cfg(feature = "compression-bzip2")]
        Arc::new(Bzip2Codec),
        #[cfg(feature = "compression-xz")]
        Arc::new(XzCodec),
    ]
}

/// Get or initialize the global codec registry.
pub(crate) fn get_registry() -> Vec<Arc<dyn CompressionCodec>> {
    let mut lock = CODEC_REGISTRY.write().unwrap();
    lock.get_or_insert_with(init_registry).clone()
}

/// Register a custom compression codec globally.
///
/// Custom codecs are detected alongside the built-in ones. A codec whose
/// extension is already claimed by an earlier registration never wins
/// extension detection.
///
/// # Examples
/// ```
/// use bytehist::io::compression::{register_codec, CompressionCodec};
/// use std::io::{BufRead, Read, Write};
/// # use std::sync::Arc;
///
/// struct MyCodec;
/// impl CompressionCodec for MyCodec {
///     fn name(&self) -> &str { "mycodec" }
///     fn extensions(&self) -> &[&str] { &[".myext"] }
///     fn magic_bytes(&self) -> Option<&[u8]> { None }
///     fn wrap_reader_dyn(&self, r: Box<dyn BufRead + Send>) -> std::io::Result<Box<dyn Read + Send>> {
///         Ok(Box::new(r))
///     }
///     fn wrap_writer_dyn(&self, w: Box<dyn Write>) -> std::io::Result<Box<dyn Write>> {
///         Ok(w)
///     }
/// }
///
/// register_codec(Arc::new(MyCodec));
/// ```
pub fn register_codec(codec: Arc<dyn CompressionCodec>) {
    let mut lock = CODEC_REGISTRY.write().unwrap();
    lock.get_or_insert_with(init_registry).push(codec);
}

/// Pluggable compression codec trait.
///
/// # Thread Safety
/// Implementations must be `Send + Sync` as they're stored in a global registry
/// and used from every scanning worker.
pub trait CompressionCodec: Send + Sync {
    /// Human-readable codec name (e.g., "gzip", "zstd"). Also the pool key.
    fn name(&self) -> &str;

    /// File extensions associated with this codec (e.g., `&[".gz", ".gzip"]`).
    ///
    /// Extensions should include the leading dot and be lowercase.
    fn extensions(&self) -> &[&str];

    /// Optional magic byte signature for content-based detection.
    fn magic_bytes(&self) -> Option<&[u8]>;

    /// Whether a decoder can start at an arbitrary raw offset. Non-splittable
    /// files are planned as one range.
    fn is_splittable(&self) -> bool {
        false
    }

    /// Wrap buffered compressed input with decompression.
    fn wrap_reader_dyn(&self, reader: Box<dyn BufRead + Send>) -> io::Result<Box<dyn Read + Send>>;

    /// Wrap a writer with compression.
    fn wrap_writer_dyn(&self, writer: Box<dyn Write>) -> io::Result<Box<dyn Write>>;
}

/// How codecs are detected when an input is resolved.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CodecDetection {
    /// File name only.
    #[default]
    Extension,
    /// File name first, then the first bytes of the file.
    ExtensionAndMagic,
}

/// Detect compression codec from file path extension.
///
/// Returns the first registered codec whose extensions match the file path.
/// Matching is case-insensitive.
pub fn detect_codec(path: impl AsRef<Path>) -> Option<Arc<dyn CompressionCodec>> {
    let path_str = path.as_ref().to_string_lossy().to_lowercase();
    get_registry()
        .into_iter()
        .find(|codec| codec.extensions().iter().any(|ext| path_str.ends_with(ext)))
}

/// Detect compression codec from the first bytes of a file.
pub fn detect_from_magic(header: &[u8]) -> Option<Arc<dyn CompressionCodec>> {
    if header.is_empty() {
        return None;
    }
    get_registry().into_iter().find(|codec| {
        codec
            .magic_bytes()
            .is_some_and(|magic| header.len() >= magic.len() && header.starts_with(magic))
    })
}

/// Look a registered codec up by name.
pub fn codec_by_name(name: &str) -> Option<Arc<dyn CompressionCodec>> {
    get_registry().into_iter().find(|codec| codec.name() == name)
}

/// Automatically detect and wrap a writer with compression if needed.
///
/// Detection is based solely on file path extension. If a matching codec is found,
/// the writer is wrapped with compression; otherwise it's returned buffered.
pub fn auto_detect_writer<W: Write + 'static>(
    writer: W,
    path_hint: impl AsRef<Path>,
) -> Result<Box<dyn Write>> {
    if let Some(codec) = detect_codec(&path_hint) {
        return codec
            .wrap_writer_dyn(Box::new(writer))
            .with_context(|| format!("wrap writer with {} codec", codec.name()));
    }

    Ok(Box::new(BufWriter::new(writer)))
}

// ============================================================================
// Decompressor pool
// ============================================================================

#[derive(Default)]
struct PoolState {
    idle: HashMap<String, Vec<Vec<u8>>>,
    leased: HashMap<String, usize>,
    created: HashMap<String, u64>,
    reused: HashMap<String, u64>,
}

/// Pool counters for one codec, or summed over all codecs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoolStats {
    /// Decompressors acquired and not yet returned.
    pub leased: usize,
    /// Returned decompressors waiting for reuse.
    pub idle: usize,
    /// Staging buffers allocated.
    pub created: u64,
    /// Acquisitions served from an idle buffer.
    pub reused: u64,
}

type StagingSlot = Arc<Mutex<Option<Vec<u8>>>>;

/// A leased decompression resource for one codec.
///
/// Obtain with [`acquire_decompressor`], build the decompressing stream with
/// [`Decompressor::wrap`], drop that stream, then give the lease back with
/// [`return_decompressor`].
pub struct Decompressor {
    codec: Arc<dyn CompressionCodec>,
    slot: StagingSlot,
}

impl Decompressor {
    #[must_use]
    pub fn codec(&self) -> &Arc<dyn CompressionCodec> {
        &self.codec
    }

    /// Wrap raw compressed input in this codec's decoder. The decoder reads
    /// through the pooled staging buffer until the returned stream is dropped.
    ///
    /// # Errors
    /// If the staging buffer is already in use by another stream, or the codec
    /// rejects the input header.
    pub fn wrap(&self, raw: Box<dyn Read + Send>) -> io::Result<Box<dyn Read + Send>> {
        let buf = self
            .slot
            .lock()
            .map_err(|_| io::Error::other("staging buffer lock poisoned"))?
            .take()
            .ok_or_else(|| io::Error::other("decompressor already wraps an open stream"))?;
        let staged = StagedReader {
            inner: raw,
            buf,
            pos: 0,
            filled: 0,
            slot: Arc::clone(&self.slot),
        };
        self.codec.wrap_reader_dyn(Box::new(staged))
    }
}

/// Lease a decompressor for `codec` from the process-wide pool.
pub fn acquire_decompressor(codec: &Arc<dyn CompressionCodec>) -> Decompressor {
    let name = codec.name().to_string();
    let mut lock = DECOMPRESSOR_POOL.lock().unwrap();
    let state = lock.get_or_insert_with(PoolState::default);
    let buf = match state.idle.get_mut(&name).and_then(Vec::pop) {
        Some(buf) => {
            *state.reused.entry(name.clone()).or_default() += 1;
            buf
        }
        None => {
            *state.created.entry(name.clone()).or_default() += 1;
            vec![0u8; STAGING_BUFFER_BYTES]
        }
    };
    *state.leased.entry(name).or_default() += 1;
    drop(lock);
    Decompressor {
        codec: Arc::clone(codec),
        slot: Arc::new(Mutex::new(Some(buf))),
    }
}

/// Give a decompressor back to the pool.
///
/// The lease is always released. The staging buffer is only kept for reuse if
/// the stream built from it has already been dropped.
///
/// # Errors
/// `ResourceRelease` if the staging buffer was still held by a live stream, or
/// if the pool no longer knows the lease (it was torn down in between).
pub fn return_decompressor(decompressor: Decompressor) -> ScanResult<()> {
    let name = decompressor.codec.name().to_string();
    let buf = decompressor
        .slot
        .lock()
        .map(|mut slot| slot.take())
        .unwrap_or(None);

    let mut lock = DECOMPRESSOR_POOL.lock().unwrap();
    let state = lock.get_or_insert_with(PoolState::default);
    let known = match state.leased.get_mut(&name) {
        Some(n) if *n > 0 => {
            *n -= 1;
            true
        }
        _ => false,
    };
    match (known, buf) {
        (true, Some(buf)) => {
            state.idle.entry(name).or_default().push(buf);
            Ok(())
        }
        (true, None) => Err(ScanError::release(
            format!("{name} decompressor"),
            io::Error::other("staging buffer still held by an open stream"),
        )),
        (false, _) => Err(ScanError::release(
            format!("{name} decompressor"),
            io::Error::other("decompressor was not leased from the current pool"),
        )),
    }
}

/// Pool counters for one codec.
#[must_use]
pub fn decompressor_pool_stats(codec_name: &str) -> PoolStats {
    let lock = DECOMPRESSOR_POOL.lock().unwrap();
    let Some(state) = lock.as_ref() else {
        return PoolStats::default();
    };
    PoolStats {
        leased: state.leased.get(codec_name).copied().unwrap_or(0),
        idle: state.idle.get(codec_name).map_or(0, Vec::len),
        created: state.created.get(codec_name).copied().unwrap_or(0),
        reused: state.reused.get(codec_name).copied().unwrap_or(0),
    }
}

/// Drop every idle decompressor and reset the pool.
///
/// Returns the counters as they stood just before teardown, summed over
/// codecs. Outstanding leases are logged; returning them afterwards fails
/// with a release warning.
pub fn teardown_decompressor_pool() -> PoolStats {
    let mut lock = DECOMPRESSOR_POOL.lock().unwrap();
    let Some(state) = lock.take() else {
        return PoolStats::default();
    };
    drop(lock);
    for (codec, &n) in &state.leased {
        if n > 0 {
            warn!(codec = %codec, outstanding = n, "decompressor pool torn down with leases outstanding");
        }
    }
    let stats = PoolStats {
        leased: state.leased.values().sum(),
        idle: state.idle.values().map(Vec::len).sum(),
        created: state.created.values().sum(),
        reused: state.reused.values().sum(),
    };
    debug!(?stats, "decompressor pool torn down");
    stats
}

/// Buffered reader over raw compressed input that hands its buffer back to
/// the owning [`Decompressor`] when dropped.
struct StagedReader {
    inner: Box<dyn Read + Send>,
    buf: Vec<u8>,
    pos: usize,
    filled: usize,
    slot: StagingSlot,
}

impl Read for StagedReader {
    fn read(&mut self, out: &mut [u8]) -> io::Result<usize> {
        if self.pos == self.filled && out.len() >= self.buf.len() {
            return self.inner.read(out);
        }
        let available = self.fill_buf()?;
        let n = available.len().min(out.len());
        out[..n].copy_from_slice(&available[..n]);
        self.consume(n);
        Ok(n)
    }
}

impl BufRead for StagedReader {
    fn fill_buf(&mut self) -> io::Result<&[u8]> {
        if self.pos >= self.filled {
            self.filled = self.inner.read(&mut self.buf)?;
            self.pos = 0;
        }
        Ok(&self.buf[self.pos..self.filled])
    }

    fn consume(&mut self, amt: usize) {
        self.pos = (self.pos + amt).min(self.filled);
    }
}

impl Drop for StagedReader {
    fn drop(&mut self) {
        if let Ok(mut slot) = self.slot.lock() {
            *slot = Some(std::mem::take(&mut self.buf));
        }
    }
}

// ============================================================================
// Built-in Codec Implementations
// ============================================================================

#[cfg(feature = "compression-gzip")]
struct GzipCodec;

#[cfg(feature = "compression-gzip")]
impl CompressionCodec for GzipCodec {
    fn name(&self) -> &str {
        "gzip"
    }

    fn extensions(&self) -> &[&str] {
        &[".gz", ".gzip"]
    }

    fn magic_bytes(&self) -> Option<&[u8]> {
        Some(&[0x1f, 0x8b])
    }

    fn wrap_reader_dyn(&self, reader: Box<dyn BufRead + Send>) -> io::Result<Box<dyn Read + Send>> {
        use flate2::bufread::MultiGzDecoder;
        Ok(Box::new(MultiGzDecoder::new(reader)))
    }

    fn wrap_writer_dyn(&self, writer: Box<dyn Write>) -> io::Result<Box<dyn Write>> {
        use flate2::Compression;
        use flate2::write::GzEncoder;
        Ok(Box::new(GzEncoder::new(writer, Compression::default())))
    }
}

#[cfg(feature = "compression-zstd")]
struct ZstdCodec;

#[cfg(feature = "compression-zstd")]
impl CompressionCodec for ZstdCodec {
    fn name(&self) -> &str {
        "zstd"
    }

    fn extensions(&self) -> &[&str] {
        &[".zst", ".zstd"]
    }

    fn magic_bytes(&self) -> Option<&[u8]> {
        Some(&[0x28, 0xb5, 0x2f, 0xfd])
    }

    fn wrap_reader_dyn(&self, reader: Box<dyn BufRead + Send>) -> io::Result<Box<dyn Read + Send>> {
        zstd::stream::read::Decoder::with_buffer(reader).map(|d| Box::new(d) as Box<dyn Read + Send>)
    }

    fn wrap_writer_dyn(&self, writer: Box<dyn Write>) -> io::Result<Box<dyn Write>> {
        zstd::stream::write::Encoder::new(writer, 3).map(|e| Box::new(e.auto_finish()) as Box<dyn Write>)
    }
}

#[cfg(feature = "compression-bzip2")]
struct Bzip2Codec;

#[cfg(feature = "compression-bzip2")]
impl CompressionCodec for Bzip2Codec {
    fn name(&self) -> &str {
        "bzip2"
    }

    fn extensions(&self) -> &[&str] {
        &[".bz2", ".bzip2"]
    }

    fn magic_bytes(&self) -> Option<&[u8]> {
        Some(b"BZh")
    }

    fn wrap_reader_dyn(&self, reader: Box<dyn BufRead + Send>) -> io::Result<Box<dyn Read + Send>> {
        use bzip2::bufread::MultiBzDecoder;
        Ok(Box::new(MultiBzDecoder::new(reader)))
    }

    fn wrap_writer_dyn(&self, writer: Box<dyn Write>) -> io::Result<Box<dyn Write>> {
        use bzip2::Compression;
        use bzip2::write::BzEncoder;
        Ok(Box::new(BzEncoder::new(writer, Compression::default())))
    }
}

#[cfg(feature = "compression-xz")]
struct XzCodec;

#[cfg(feature = "compression-xz")]
impl CompressionCodec for XzCodec {
    fn name(&self) -> &str {
        "xz"
    }

    fn extensions(&self) -> &[&str] {
        &[".xz"]
    }

    fn magic_bytes(&self) -> Option<&[u8]> {
        Some(&[0xfd, 0x37, 0x7a, 0x58, 0x5a, 0x00])
    }

    fn wrap_reader_dyn(&self, reader: Box<dyn BufRead + Send>) -> io::Result<Box<dyn Read + Send>> {
        use xz2::bufread::XzDecoder;
        Ok(Box::new(XzDecoder::new_multi_decoder(reader)))
    }

    fn wrap_writer_dyn(&self, writer: Box<dyn Write>) -> io::Result<Box<dyn Write>> {
        use xz2::write::XzEncoder;
        Ok(Box::new(XzEncoder::new(writer, 6)))
    }
}
