//! Writing a finished histogram out.
//!
//! A sink receives `(byte, count)` pairs. [`write_histogram`] always emits all
//! 256 buckets, zeros included, in ascending byte order, so two outputs of the
//! same input diff cleanly.

use crate::histogram::Histogram;
use crate::io::compression::{auto_detect_writer, get_registry};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs::{File, create_dir_all};
use std::io::Write;
use std::path::Path;

/// Receives histogram entries one at a time.
pub trait HistogramSink {
    /// # Errors
    /// If the entry cannot be written.
    fn write_entry(&mut self, byte: u8, count: u64) -> Result<()>;

    /// Flush whatever the sink buffers.
    ///
    /// # Errors
    /// If flushing fails.
    fn finish(&mut self) -> Result<()> {
        Ok(())
    }
}

/// One output record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistogramEntry {
    pub byte: u8,
    pub count: u64,
}

/// `byte<TAB>count` lines.
pub struct TextSink<W: Write> {
    out: W,
}

impl<W: Write> TextSink<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> HistogramSink for TextSink<W> {
    fn write_entry(&mut self, byte: u8, count: u64) -> Result<()> {
        writeln!(self.out, "{byte}\t{count}")?;
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        self.out.flush()?;
        Ok(())
    }
}

/// One compact JSON object per line: `{"byte":65,"count":12}`.
pub struct JsonlSink<W: Write> {
    out: W,
}

impl<W: Write> JsonlSink<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> HistogramSink for JsonlSink<W> {
    fn write_entry(&mut self, byte: u8, count: u64) -> Result<()> {
        serde_json::to_writer(&mut self.out, &HistogramEntry { byte, count })?;
        self.out.write_all(b"\n")?;
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        self.out.flush()?;
        Ok(())
    }
}

/// Collects entries in memory.
#[derive(Debug, Default, Clone)]
pub struct VecSink {
    pub entries: Vec<(u8, u64)>,
}

impl HistogramSink for VecSink {
    fn write_entry(&mut self, byte: u8, count: u64) -> Result<()> {
        self.entries.push((byte, count));
        Ok(())
    }
}

/// Emit all 256 buckets in ascending order, then finish the sink.
///
/// # Errors
/// The first sink error.
pub fn write_histogram(histogram: &Histogram, sink: &mut dyn HistogramSink) -> Result<()> {
    for (byte, count) in histogram.iter() {
        sink.write_entry(byte, count)
            .with_context(|| format!("write bucket {byte}"))?;
    }
    sink.finish()
}

/// Write `histogram` to `path`, creating parent directories.
///
/// Format and compression both come from the file name: `.jsonl` / `.json`
/// (before any compression extension) selects JSONL, anything else the text
/// format; a registered compression extension such as `.gz` compresses.
///
/// # Errors
/// If the file cannot be created or written.
pub fn write_histogram_file(path: impl AsRef<Path>, histogram: &Histogram) -> Result<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        create_dir_all(parent).with_context(|| format!("create dir {}", parent.display()))?;
    }
    let file = File::create(path).with_context(|| format!("create {}", path.display()))?;
    let out = auto_detect_writer(file, path)?;

    if is_jsonl(path) {
        let mut sink = JsonlSink::new(out);
        write_histogram(histogram, &mut sink)
    } else {
        let mut sink = TextSink::new(out);
        write_histogram(histogram, &mut sink)
    }
    .with_context(|| format!("write {}", path.display()))
}

fn is_jsonl(path: &Path) -> bool {
    let mut name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_lowercase())
        .unwrap_or_default();
    for codec in get_registry() {
        if let Some(ext) = codec.extensions().iter().find(|e| name.ends_with(*e)) {
            name.truncate(name.len() - ext.len());
            break;
        }
    }
    name.ends_with(".jsonl") || name.ends_with(".json")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_sink_writes_every_bucket() {
        let h = Histogram::from_bytes(&[0x00, 0xFF, 0xFF, 0x41]);
        let mut sink = TextSink::new(Vec::new());
        write_histogram(&h, &mut sink).unwrap();
        let text = String::from_utf8(sink.into_inner()).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 256);
        assert_eq!(lines[0], "0\t1");
        assert_eq!(lines[65], "65\t1");
        assert_eq!(lines[255], "255\t2");
        assert_eq!(lines[1], "1\t0");
    }

    #[test]
    fn jsonl_detection_looks_past_compression_suffix() {
        assert!(is_jsonl(Path::new("out/hist.jsonl")));
        assert!(!is_jsonl(Path::new("out/hist.tsv")));
        #[cfg(feature = "compression-gzip")]
        assert!(is_jsonl(Path::new("out/hist.jsonl.gz")));
    }
}
