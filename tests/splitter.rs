use anyhow::Result;
use bytehist::splitter::DEFAULT_SPLIT_SIZE;
use bytehist::testing::assert_covers;
use bytehist::{InputFile, ScanError, SplitConfig, Splitter};

fn split(config: SplitConfig, size: u64) -> Result<Vec<bytehist::RangeDescriptor>> {
    Ok(Splitter::new(config)?.split(&InputFile::new("/data/f.bin", size))?)
}

#[test]
fn count_mode_is_balanced() -> Result<()> {
    for (size, n) in [(4, 2), (10, 3), (1_000_003, 7), (5, 5), (u64::MAX / 2, 13)] {
        let ranges = split(SplitConfig::by_count(n), size)?;
        assert_eq!(ranges.len() as u64, n);
        assert_covers(&ranges, size);
        let min = ranges.iter().map(|r| r.length).min().unwrap();
        let max = ranges.iter().map(|r| r.length).max().unwrap();
        assert!(max - min <= 1, "size {size}, n {n}: {min}..{max}");
    }
    Ok(())
}

#[test]
fn ten_bytes_in_three() -> Result<()> {
    let lengths: Vec<u64> = split(SplitConfig::by_count(3), 10)?
        .iter()
        .map(|r| r.length)
        .collect();
    assert_eq!(lengths, vec![3, 3, 4]);
    Ok(())
}

#[test]
fn more_splits_than_bytes_gives_one_byte_ranges() -> Result<()> {
    let ranges = split(SplitConfig::by_count(64), 5)?;
    assert_eq!(ranges.len(), 5);
    assert!(ranges.iter().all(|r| r.length == 1));
    assert_covers(&ranges, 5);
    Ok(())
}

#[test]
fn size_mode_folds_the_tail_within_slop() -> Result<()> {
    // 1_050 / 100 leaves 50 after ten ranges, but 150 / 100 > 1.1 so it stays separate.
    let ranges = split(SplitConfig::by_size(100), 1_050)?;
    assert_eq!(ranges.len(), 11);
    assert_eq!(ranges.last().unwrap().length, 50);

    // 1_005: the final 105 is within 1.1 * 100, so it is one range.
    let ranges = split(SplitConfig::by_size(100), 1_005)?;
    assert_eq!(ranges.len(), 10);
    assert_eq!(ranges.last().unwrap().length, 105);
    assert_covers(&ranges, 1_005);

    let strict = split(SplitConfig::by_size(100).with_slop(1.0), 1_005)?;
    assert_eq!(strict.len(), 11);
    assert_covers(&strict, 1_005);
    Ok(())
}

#[test]
fn smaller_target_wins_when_both_are_set() -> Result<()> {
    let both = |count, size| SplitConfig {
        count: Some(count),
        size: Some(size),
        ..SplitConfig::default()
    };
    // Two ranges would be 500 bytes each; 100-byte ranges are smaller.
    assert_eq!(split(both(2, 100), 1_000)?.len(), 10);
    // Twenty ranges of 50 beat 100-byte ranges.
    assert_eq!(split(both(20, 100), 1_000)?.len(), 20);
    Ok(())
}

#[test]
fn default_config_uses_the_default_split_size() -> Result<()> {
    let size = 3 * DEFAULT_SPLIT_SIZE + 1;
    let ranges = Splitter::default().split(&InputFile::new("/big", size))?;
    assert_eq!(ranges.len(), 3);
    assert_covers(&ranges, size);
    Ok(())
}

#[test]
fn empty_file_has_no_ranges() -> Result<()> {
    assert!(split(SplitConfig::by_count(4), 0)?.is_empty());
    assert!(split(SplitConfig::by_size(10), 0)?.is_empty());
    Ok(())
}

#[test]
fn plan_concatenates_files_in_order() -> Result<()> {
    let inputs = vec![
        InputFile::new("/a", 10),
        InputFile::new("/empty", 0),
        InputFile::new("/b", 7),
    ];
    let plan = Splitter::new(SplitConfig::by_count(2))?.plan(&inputs)?;
    assert_eq!(plan.files, 3);
    assert_eq!(plan.len(), 4);
    assert_eq!(plan.total_bytes(), 17);

    let paths: Vec<_> = plan.iter().map(|(i, r)| (i, r.path().to_path_buf())).collect();
    assert_eq!(paths[0], (0, "/a".into()));
    assert_eq!(paths[3], (3, "/b".into()));
    assert_covers(&plan.ranges[..2], 10);
    assert_covers(&plan.ranges[2..], 7);
    Ok(())
}

#[test]
fn invalid_configs_are_rejected() {
    let bad = [
        SplitConfig::by_count(0),
        SplitConfig::by_size(0),
        SplitConfig::by_size(10).with_slop(0.5),
        SplitConfig::by_size(10).with_slop(f64::NAN),
        SplitConfig {
            count: None,
            size: None,
            ..SplitConfig::default()
        },
    ];
    for config in bad {
        let err = Splitter::new(config).unwrap_err();
        assert!(matches!(err, ScanError::InvalidSplitRequest { .. }), "{config:?}");
    }
}

#[test]
fn missing_input_error_names_the_file() {
    let fs = bytehist::io::memory::MemoryFileSystem::new();
    let err = bytehist::resolve_inputs(&fs, &["/data/x.bin"], &Default::default()).unwrap_err();
    match err {
        ScanError::InvalidSplitRequest { path, .. } => {
            assert_eq!(path.as_deref(), Some(std::path::Path::new("/data/x.bin")));
        }
        other => panic!("unexpected error: {other}"),
    }
}
