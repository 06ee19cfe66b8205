use anyhow::Result;
use bytehist::io::sink::{HistogramEntry, VecSink};
use bytehist::{Histogram, write_histogram, write_histogram_file};
use std::fs;

fn sample() -> Histogram {
    Histogram::from_bytes(b"hello, histogram")
}

#[test]
fn vec_sink_sees_all_buckets_in_order() -> Result<()> {
    let h = sample();
    let mut sink = VecSink::default();
    write_histogram(&h, &mut sink)?;
    assert_eq!(sink.entries.len(), 256);
    assert!(sink.entries.windows(2).all(|w| w[0].0 < w[1].0));
    assert_eq!(sink.entries[usize::from(b'l')], (b'l', 2));
    assert_eq!(sink.entries.iter().map(|e| e.1).sum::<u64>(), h.total());
    Ok(())
}

#[test]
fn text_file_in_a_new_directory() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("out/nested/hist.tsv");
    write_histogram_file(&path, &sample())?;

    let text = fs::read_to_string(&path)?;
    let parsed: Vec<(u8, u64)> = text
        .lines()
        .map(|line| {
            let (b, c) = line.split_once('\t').expect("tab separated");
            (b.parse().unwrap(), c.parse().unwrap())
        })
        .collect();
    assert_eq!(parsed.len(), 256);
    assert_eq!(parsed.into_iter().collect::<Histogram>(), sample());
    Ok(())
}

#[test]
fn jsonl_file() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("hist.jsonl");
    write_histogram_file(&path, &sample())?;

    let entries: Vec<HistogramEntry> = fs::read_to_string(&path)?
        .lines()
        .map(serde_json::from_str)
        .collect::<Result<_, _>>()?;
    assert_eq!(entries.len(), 256);
    assert_eq!(entries[usize::from(b'h')], HistogramEntry { byte: b'h', count: 2 });
    Ok(())
}

#[cfg(feature = "compression-gzip")]
#[test]
fn compressed_jsonl_file() -> Result<()> {
    use std::io::Read;

    let dir = tempfile::tempdir()?;
    let path = dir.path().join("hist.jsonl.gz");
    write_histogram_file(&path, &sample())?;

    let mut text = String::new();
    flate2::read::MultiGzDecoder::new(fs::File::open(&path)?).read_to_string(&mut text)?;
    let entries: Vec<HistogramEntry> = text
        .lines()
        .map(serde_json::from_str)
        .collect::<Result<_, _>>()?;
    let back: Histogram = entries.iter().map(|e| (e.byte, e.count)).collect();
    assert_eq!(back, sample());
    Ok(())
}
