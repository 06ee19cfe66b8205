//! Turning a [`RangeDescriptor`] into a sequence of byte records.
//!
//! A [`RangeSource`] owns one open stream over one range. On open it decides,
//! once, how the range will be read:
//!
//! - **compressed** input (a descriptor carrying a codec name) is
//!   wrapped in a decompressing stream backed by a pooled [`Decompressor`]. The
//!   raw window `[start, start + length)` is compressed input; the range ends
//!   when the decoder runs dry inside that window.
//! - **uncompressed** input is read at `start` either through the stream's
//!   [`ZeroCopyRead`](crate::io::fs::ZeroCopyRead) capability, which returns a
//!   buffer aliasing the stream's own memory, or with a plain copying read into
//!   a freshly allocated buffer. Both produce the same bytes.
//!
//! Records come out in one of two mutually exclusive modes, see [`RecordMode`].
//!
//! Closing releases the stream first and the decompressor second. Both are
//! attempted even if the first fails; failures are logged and returned as
//! `ResourceRelease` warnings. Dropping an unclosed source closes it.

use crate::error::{Result, ScanError};
use crate::io::compression::{
    CompressionCodec, Decompressor, acquire_decompressor, codec_by_name, return_decompressor,
};
use crate::io::fs::{FileSystem, InputStream, ReadStatistics, SharedBytes};
use crate::range::RangeDescriptor;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::io::{self, BufRead, BufReader, Read, Seek, SeekFrom};
use std::ops::Deref;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, info, warn};

/// Decompressed bytes per bulk record when no explicit limit is configured.
pub const DEFAULT_DECOMPRESSED_RECORD_BYTES: u64 = 8 * 1024 * 1024;

const LINE_BUFFER_BYTES: usize = 64 * 1024;

/// How a range is consumed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordMode {
    /// The whole range as one buffer (or as `max_record_bytes` chunks).
    #[default]
    Bulk,
    /// One record per `\n`-terminated line, terminator excluded. A range that
    /// does not start at offset 0 skips its first partial line; a range keeps
    /// reading while a line starts at or before its end.
    Line,
}

/// Caller preference for uncompressed bulk reads.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReadPreference {
    /// Zero-copy when the stream supports it, copying otherwise.
    #[default]
    Auto,
    /// Always copy.
    Copy,
}

/// The read path chosen when the source was opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReadStrategy {
    ZeroCopy,
    Copying,
    Decompressing,
}

#[derive(Debug, Clone, Default)]
pub struct SourceOptions {
    pub record_mode: RecordMode,
    pub read_preference: ReadPreference,
    /// Upper bound on one bulk record. `None` reads an uncompressed range in
    /// one shot and compressed input in [`DEFAULT_DECOMPRESSED_RECORD_BYTES`] chunks.
    pub max_record_bytes: Option<u64>,
}

/// A bulk buffer: either aliasing stream memory or owned.
#[derive(Clone)]
pub enum RecordBuffer {
    Shared(SharedBytes),
    Owned(Vec<u8>),
}

impl RecordBuffer {
    #[must_use]
    pub fn is_zero_copy(&self) -> bool {
        matches!(self, Self::Shared(_))
    }
}

impl Deref for RecordBuffer {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        match self {
            Self::Shared(b) => b,
            Self::Owned(v) => v,
        }
    }
}

impl fmt::Debug for RecordBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Shared(b) => write!(f, "Shared({} bytes)", b.len()),
            Self::Owned(v) => write!(f, "Owned({} bytes)", v.len()),
        }
    }
}

/// The unit handed from a [`RangeSource`] to a scanner.
#[derive(Debug, Clone)]
pub enum RawRecord {
    /// `offset` is the file offset for uncompressed input and the decompressed
    /// offset for compressed input.
    Bulk { offset: u64, buffer: RecordBuffer },
    Line { offset: u64, line: Vec<u8> },
}

impl RawRecord {
    #[must_use]
    pub fn offset(&self) -> u64 {
        match self {
            Self::Bulk { offset, .. } | Self::Line { offset, .. } => *offset,
        }
    }

    #[must_use]
    pub fn bytes(&self) -> &[u8] {
        match self {
            Self::Bulk { buffer, .. } => buffer,
            Self::Line { line, .. } => line,
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.bytes().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bytes().is_empty()
    }
}

type SharedInput = Arc<Mutex<Box<dyn InputStream>>>;

fn lock_input(input: &SharedInput) -> MutexGuard<'_, Box<dyn InputStream>> {
    input.lock().unwrap_or_else(PoisonError::into_inner)
}

/// `Read` over the shared raw stream, optionally capped at a byte budget.
struct WindowReader {
    input: SharedInput,
    remaining: Option<u64>,
}

impl Read for WindowReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let want = match self.remaining {
            Some(0) => return Ok(0),
            Some(r) => buf.len().min(usize::try_from(r).unwrap_or(usize::MAX)),
            None => buf.len(),
        };
        let n = lock_input(&self.input).read(&mut buf[..want])?;
        if let Some(r) = self.remaining.as_mut() {
            *r -= n as u64;
        }
        Ok(n)
    }
}

enum StreamBody {
    /// Bulk reads straight off the raw stream.
    Direct,
    /// Uncompressed line reads.
    Lines(BufReader<WindowReader>),
    /// Decompressed output, for both record modes.
    Decompressing(BufReader<Box<dyn Read + Send>>),
}

/// An open, positioned stream over one range.
///
/// `current_file_position` is the offset in the file on disk (for compressed
/// input: how much compressed input the decoder has pulled). It is tracked
/// separately from `logical_bytes_consumed`, the number of bytes handed out
/// as records plus skipped line fragments.
pub struct ByteRangeStream {
    raw: SharedInput,
    body: StreamBody,
    logical_bytes_consumed: u64,
}

impl ByteRangeStream {
    #[must_use]
    pub fn current_file_position(&self) -> u64 {
        lock_input(&self.raw).position()
    }

    #[must_use]
    pub fn logical_bytes_consumed(&self) -> u64 {
        self.logical_bytes_consumed
    }

    #[must_use]
    pub fn is_decompressing(&self) -> bool {
        matches!(self.body, StreamBody::Decompressing(_))
    }

    #[must_use]
    pub fn statistics(&self) -> ReadStatistics {
        lock_input(&self.raw).statistics()
    }

    /// Drop the decoding layers, then close the raw stream.
    fn close(self) -> io::Result<()> {
        let Self { raw, body, .. } = self;
        drop(body);
        let result = lock_input(&raw).close();
        result
    }
}

/// Reads one [`RangeDescriptor`] as a sequence of [`RawRecord`]s.
pub struct RangeSource {
    range: RangeDescriptor,
    options: SourceOptions,
    stream: Option<ByteRangeStream>,
    decompressor: Option<Decompressor>,
    strategy: ReadStrategy,
    /// Logical offset: file offset when uncompressed, decompressed offset when compressed.
    pos: u64,
    first_line_handled: bool,
    exhausted: bool,
    closed: bool,
    final_position: u64,
    final_statistics: ReadStatistics,
}

impl RangeSource {
    /// Open `range` on `fs` and pick the read strategy.
    ///
    /// The codec comes from the descriptor alone; the file name is not
    /// consulted again.
    ///
    /// # Errors
    /// `RangeRead` if the descriptor names an unregistered codec, the file
    /// cannot be opened or positioned, or the codec rejects the stream header.
    pub fn open(fs: &dyn FileSystem, range: &RangeDescriptor, options: &SourceOptions) -> Result<Self> {
        let fail = |e: io::Error| ScanError::range_read(range, e);
        let codec = match range.codec() {
            Some(name) => Some(codec_by_name(name).ok_or_else(|| {
                fail(io::Error::new(
                    io::ErrorKind::Unsupported,
                    format!("codec `{name}` is not registered"),
                ))
            })?),
            None => None,
        };
        let mut raw = fs.open(&range.path).map_err(fail)?;

        let (strategy, pos) = match &codec {
            Some(_) => (ReadStrategy::Decompressing, 0),
            None => {
                let zero_copy = options.record_mode == RecordMode::Bulk
                    && options.read_preference == ReadPreference::Auto
                    && raw.as_zero_copy().is_some();
                let strategy = if zero_copy {
                    ReadStrategy::ZeroCopy
                } else {
                    ReadStrategy::Copying
                };
                (strategy, range.start)
            }
        };

        if let Err(e) = raw.seek(SeekFrom::Start(range.start)) {
            if let Err(close) = raw.close() {
                let w = ScanError::release(format!("stream {}", range.path.display()), close);
                warn!(range = %range, error = %w, "resource release failed");
            }
            return Err(fail(e));
        }
        let raw: SharedInput = Arc::new(Mutex::new(raw));

        let mut source = Self {
            range: range.clone(),
            options: options.clone(),
            stream: Some(ByteRangeStream {
                raw: Arc::clone(&raw),
                body: StreamBody::Direct,
                logical_bytes_consumed: 0,
            }),
            decompressor: None,
            strategy,
            pos,
            first_line_handled: false,
            exhausted: range.is_empty(),
            closed: false,
            final_position: range.start,
            final_statistics: ReadStatistics::default(),
        };

        match codec {
            Some(codec) => {
                info!(
                    path = %range.path.display(),
                    codec = codec.name(),
                    start = range.start,
                    length = range.length,
                    "compressed input; decompressed size is unknown until the range is consumed"
                );
                source.attach_decoder(&codec, raw)?;
            }
            None => {
                debug!(
                    path = %range.path.display(),
                    start = range.start,
                    length = range.length,
                    strategy = ?strategy,
                    "opened range"
                );
                if options.record_mode == RecordMode::Line
                    && let Some(stream) = source.stream.as_mut()
                {
                    let window = WindowReader {
                        input: raw,
                        remaining: None,
                    };
                    stream.body = StreamBody::Lines(BufReader::with_capacity(LINE_BUFFER_BYTES, window));
                }
            }
        }
        Ok(source)
    }

    /// On failure `self` is dropped by the caller, which releases the lease.
    fn attach_decoder(&mut self, codec: &Arc<dyn CompressionCodec>, raw: SharedInput) -> Result<()> {
        let decompressor = acquire_decompressor(codec);
        let window = WindowReader {
            input: raw,
            remaining: Some(self.range.length),
        };
        let wrapped = decompressor.wrap(Box::new(window));
        self.decompressor = Some(decompressor);
        let decoded = wrapped.map_err(|e| ScanError::range_read(&self.range, e))?;
        if let Some(stream) = self.stream.as_mut() {
            stream.body = StreamBody::Decompressing(BufReader::with_capacity(LINE_BUFFER_BYTES, decoded));
        }
        Ok(())
    }

    #[must_use]
    pub fn range(&self) -> &RangeDescriptor {
        &self.range
    }

    #[must_use]
    pub fn strategy(&self) -> ReadStrategy {
        self.strategy
    }

    #[must_use]
    pub fn is_compressed(&self) -> bool {
        self.strategy == ReadStrategy::Decompressing
    }

    /// The open stream, until [`close`](Self::close).
    #[must_use]
    pub fn stream(&self) -> Option<&ByteRangeStream> {
        self.stream.as_ref()
    }

    /// Logical read position. See [`RawRecord::offset`].
    #[must_use]
    pub fn position(&self) -> u64 {
        self.pos
    }

    /// Fraction of the range consumed, in `[0.0, 1.0]`.
    ///
    /// Uncompressed: `(position - start) / length`. Compressed: compressed
    /// bytes pulled from the raw window divided by the window length. An empty
    /// range reports `0.0`.
    #[must_use]
    pub fn progress(&self) -> f32 {
        if self.range.length == 0 {
            return 0.0;
        }
        let current = if self.is_compressed() {
            self.stream
                .as_ref()
                .map_or(self.final_position, ByteRangeStream::current_file_position)
        } else {
            self.pos
        };
        let done = current.saturating_sub(self.range.start) as f64 / self.range.length as f64;
        done.clamp(0.0, 1.0) as f32
    }

    /// Read statistics of the underlying stream (frozen at close).
    #[must_use]
    pub fn statistics(&self) -> ReadStatistics {
        self.stream
            .as_ref()
            .map_or(self.final_statistics, ByteRangeStream::statistics)
    }

    /// Next record, or `None` at the end of the range.
    ///
    /// # Errors
    /// `RangeRead` on any I/O or decoding failure, including a file that ends
    /// before the range does. The source yields nothing further after an error.
    pub fn next_record(&mut self) -> Result<Option<RawRecord>> {
        if self.exhausted || self.closed {
            return Ok(None);
        }
        let result = match self.options.record_mode {
            RecordMode::Bulk => self.next_bulk(),
            RecordMode::Line => self.next_line(),
        };
        match result {
            Ok(Some(record)) => {
                if let Some(stream) = self.stream.as_mut() {
                    stream.logical_bytes_consumed += record.len() as u64;
                }
                Ok(Some(record))
            }
            Ok(None) => {
                self.exhausted = true;
                Ok(None)
            }
            Err(e) => {
                self.exhausted = true;
                Err(ScanError::range_read(&self.range, e))
            }
        }
    }

    fn next_bulk(&mut self) -> io::Result<Option<RawRecord>> {
        let offset = self.pos;
        let limit = self.options.max_record_bytes.filter(|&m| m > 0);
        let stream = self
            .stream
            .as_mut()
            .ok_or_else(|| io::Error::other("range source is closed"))?;

        if let StreamBody::Decompressing(reader) = &mut stream.body {
            let chunk = to_usize(limit.unwrap_or(DEFAULT_DECOMPRESSED_RECORD_BYTES))?;
            let mut buf = vec![0u8; chunk];
            let n = read_full(reader, &mut buf)?;
            if n == 0 {
                return Ok(None);
            }
            buf.truncate(n);
            self.pos += n as u64;
            return Ok(Some(RawRecord::Bulk {
                offset,
                buffer: RecordBuffer::Owned(buf),
            }));
        }

        let remaining = self.range.end().saturating_sub(self.pos);
        if remaining == 0 {
            return Ok(None);
        }
        let want = to_usize(limit.map_or(remaining, |m| m.min(remaining)))?;
        let mut raw = lock_input(&stream.raw);
        let buffer = match self.strategy {
            ReadStrategy::ZeroCopy => {
                let zero_copy = raw
                    .as_zero_copy()
                    .ok_or_else(|| io::Error::other("stream lost its zero-copy capability"))?;
                let bytes = zero_copy.read_zero_copy(want)?;
                if bytes.len() < want {
                    return Err(truncated(offset + bytes.len() as u64, self.range.end()));
                }
                RecordBuffer::Shared(bytes)
            }
            _ => {
                let mut buf = vec![0u8; want];
                let n = read_full(&mut **raw, &mut buf)?;
                if n < want {
                    return Err(truncated(offset + n as u64, self.range.end()));
                }
                RecordBuffer::Owned(buf)
            }
        };
        drop(raw);
        self.pos += buffer.len() as u64;
        Ok(Some(RawRecord::Bulk { offset, buffer }))
    }

    fn next_line(&mut self) -> io::Result<Option<RawRecord>> {
        let compressed = self.is_compressed();
        let (start, end) = (self.range.start, self.range.end());
        let stream = self
            .stream
            .as_mut()
            .ok_or_else(|| io::Error::other("range source is closed"))?;
        let reader: &mut dyn BufRead = match &mut stream.body {
            StreamBody::Lines(r) => r,
            StreamBody::Decompressing(r) => r,
            StreamBody::Direct => return Err(io::Error::other("line mode without a line reader")),
        };

        if !self.first_line_handled {
            self.first_line_handled = true;
            if !compressed && start != 0 {
                let mut partial = Vec::new();
                let skipped = reader.read_until(b'\n', &mut partial)?;
                self.pos += skipped as u64;
                stream.logical_bytes_consumed += skipped as u64;
            }
        }

        if !compressed && self.pos > end {
            return Ok(None);
        }
        let offset = self.pos;
        let mut line = Vec::new();
        let n = reader.read_until(b'\n', &mut line)?;
        if n == 0 {
            return Ok(None);
        }
        self.pos += n as u64;
        // Terminator bytes are consumed but not part of the record, so they
        // never reach `logical_bytes_consumed`.
        strip_terminator(&mut line);
        Ok(Some(RawRecord::Line { offset, line }))
    }

    /// Release the stream, then the decompressor.
    ///
    /// Idempotent. Returns the release warnings, which have already been logged.
    pub fn close(&mut self) -> Vec<ScanError> {
        if self.closed {
            return Vec::new();
        }
        self.closed = true;
        let mut warnings = Vec::new();

        if let Some(stream) = self.stream.take() {
            self.final_position = stream.current_file_position();
            self.final_statistics = stream.statistics();
            if let Err(e) = stream.close() {
                warnings.push(ScanError::release(
                    format!("stream {}", self.range.path.display()),
                    e,
                ));
            }
        }
        if let Some(decompressor) = self.decompressor.take()
            && let Err(e) = return_decompressor(decompressor)
        {
            warnings.push(e);
        }

        for w in &warnings {
            warn!(range = %self.range, error = %w, "resource release failed");
        }
        debug!(range = %self.range, progress = self.progress(), "range source closed");
        warnings
    }
}

impl Drop for RangeSource {
    fn drop(&mut self) {
        let _ = self.close();
    }
}

impl fmt::Debug for RangeSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RangeSource")
            .field("range", &self.range)
            .field("strategy", &self.strategy)
            .field("pos", &self.pos)
            .field("closed", &self.closed)
            .finish()
    }
}

/// Fill `buf` unless the reader ends first. Returns the bytes read.
fn read_full<R: Read + ?Sized>(reader: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

/// Remove a trailing `\n` or `\r\n`; returns how many bytes were removed.
fn strip_terminator(line: &mut Vec<u8>) -> usize {
    if line.last() != Some(&b'\n') {
        return 0;
    }
    line.pop();
    if line.last() == Some(&b'\r') {
        line.pop();
        return 2;
    }
    1
}

fn to_usize(n: u64) -> io::Result<usize> {
    usize::try_from(n).map_err(|_| {
        io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("record of {n} bytes exceeds the address space; set max_record_bytes"),
        )
    })
}

fn truncated(at: u64, end: u64) -> io::Error {
    io::Error::new(
        io::ErrorKind::UnexpectedEof,
        format!("file ended at offset {at} before range end {end}"),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminators_are_stripped() {
        let mut a = b"abc\r\n".to_vec();
        assert_eq!(strip_terminator(&mut a), 2);
        assert_eq!(a, b"abc");
        let mut b = b"abc\n".to_vec();
        assert_eq!(strip_terminator(&mut b), 1);
        let mut c = b"abc".to_vec();
        assert_eq!(strip_terminator(&mut c), 0);
        assert_eq!(c, b"abc");
    }

    #[test]
    fn read_full_stops_at_eof() {
        let mut r: &[u8] = b"12345";
        let mut buf = [0u8; 8];
        assert_eq!(read_full(&mut r, &mut buf).unwrap(), 5);
        assert_eq!(&buf[..5], b"12345");
    }
}
