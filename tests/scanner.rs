use anyhow::Result;
use bytehist::io::memory::{MemoryBehavior, MemoryFileSystem};
use bytehist::testing::{assert_histograms_equal, naive_histogram, sample_bytes, sample_text};
use bytehist::{
    Histogram, RangeDescriptor, RangeScanner, ReadStrategy, RecordMode, ScanError, SourceOptions,
};

#[test]
fn four_byte_file_single_range() -> Result<()> {
    let fs = MemoryFileSystem::new();
    fs.insert("/f", vec![0x00, 0xFF, 0xFF, 0x41]);
    let opts = SourceOptions::default();
    let scan = RangeScanner::new(&fs, &opts).scan(&RangeDescriptor::new("/f", 0, 4))?;

    assert_eq!(scan.histogram.get(0x00), 1);
    assert_eq!(scan.histogram.get(0xFF), 2);
    assert_eq!(scan.histogram.get(0x41), 1);
    assert_eq!(scan.histogram.total(), 4);
    assert_eq!(scan.records, 1);
    assert_eq!(scan.strategy, ReadStrategy::ZeroCopy);
    Ok(())
}

#[test]
fn four_byte_file_two_ranges() -> Result<()> {
    let fs = MemoryFileSystem::new();
    fs.insert("/f", vec![0x00, 0xFF, 0xFF, 0x41]);
    let opts = SourceOptions::default();
    let scanner = RangeScanner::new(&fs, &opts);

    let left = scanner.scan(&RangeDescriptor::new("/f", 0, 2))?.histogram;
    let right = scanner.scan(&RangeDescriptor::new("/f", 2, 2))?.histogram;
    assert_eq!(left, [(0x00, 1), (0xFF, 1)].into_iter().collect::<Histogram>());
    assert_eq!(right, [(0xFF, 1), (0x41, 1)].into_iter().collect::<Histogram>());
    assert_eq!(left.merged(&right), Histogram::from_bytes(&[0x00, 0xFF, 0xFF, 0x41]));
    Ok(())
}

#[test]
fn total_equals_bytes_delivered() -> Result<()> {
    let data = sample_bytes(50_000, 5);
    let fs = MemoryFileSystem::new();
    fs.insert("/f", data.clone());
    let opts = SourceOptions {
        max_record_bytes: Some(4_000),
        ..SourceOptions::default()
    };
    let scan = RangeScanner::new(&fs, &opts).scan(&RangeDescriptor::new("/f", 123, 40_000))?;
    assert_eq!(scan.histogram.total(), 40_000);
    assert_eq!(scan.records, 10);
    assert_histograms_equal(&scan.histogram, &naive_histogram(&data[123..40_123]));
    assert_eq!(scan.statistics.total_bytes_read, 40_000);
    Ok(())
}

#[test]
fn line_mode_counts_content_only() -> Result<()> {
    let text = sample_text(200);
    let fs = MemoryFileSystem::new();
    fs.insert("/t", text.clone());
    let opts = SourceOptions {
        record_mode: RecordMode::Line,
        ..SourceOptions::default()
    };
    let scanner = RangeScanner::new(&fs, &opts);
    let len = text.len() as u64;
    let cut = len / 3;

    let mut merged = Histogram::new();
    for (start, end) in [(0, cut), (cut, 2 * cut), (2 * cut, len)] {
        merged.merge(&scanner.scan(&RangeDescriptor::new("/t", start, end - start))?.histogram);
    }
    // sample_text only emits `\r` as part of a `\r\n` terminator.
    let content: Vec<u8> = text
        .iter()
        .copied()
        .filter(|&b| b != b'\n' && b != b'\r')
        .collect();
    assert_histograms_equal(&merged, &naive_histogram(&content));
    Ok(())
}

#[test]
fn read_error_wins_over_release_warning() {
    let fs = MemoryFileSystem::with_behavior(MemoryBehavior {
        fail_read_at: Some(10),
        fail_close: true,
        ..MemoryBehavior::default()
    });
    fs.insert("/f", vec![1u8; 32]);
    let opts = SourceOptions::default();
    let err = RangeScanner::new(&fs, &opts)
        .scan(&RangeDescriptor::new("/f", 0, 32))
        .unwrap_err();
    assert!(matches!(err, ScanError::RangeRead { .. }), "{err}");
}

#[test]
fn release_warning_alone_is_not_fatal() -> Result<()> {
    let fs = MemoryFileSystem::with_behavior(MemoryBehavior {
        fail_close: true,
        ..MemoryBehavior::default()
    });
    fs.insert("/f", vec![1u8; 32]);
    let opts = SourceOptions::default();
    let scan = RangeScanner::new(&fs, &opts).scan(&RangeDescriptor::new("/f", 0, 32))?;
    assert_eq!(scan.histogram.get(1), 32);
    assert_eq!(scan.warnings.len(), 1);
    Ok(())
}

#[test]
fn rescanning_a_range_is_byte_identical() -> Result<()> {
    let fs = MemoryFileSystem::new();
    fs.insert("/f", sample_bytes(9_999, 1));
    let opts = SourceOptions::default();
    let scanner = RangeScanner::new(&fs, &opts);
    let range = RangeDescriptor::new("/f", 1_000, 5_000);
    assert_eq!(scanner.scan(&range)?.histogram, scanner.scan(&range)?.histogram);
    Ok(())
}
