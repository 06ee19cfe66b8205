use anyhow::Result;
use bytehist::io::compression::CodecDetection;
use bytehist::splitter::{DEFAULT_SPLIT_SIZE, DEFAULT_SPLIT_SLOP};
use bytehist::{
    ExecMode, InputFile, ReadPreference, RecordMode, Runner, ScanConfig, ScanError, Splitter,
};
use std::io::Write;

#[test]
fn empty_object_is_the_default() -> Result<()> {
    let config = ScanConfig::from_json_str("{}")?;
    assert_eq!(config, ScanConfig::default());
    assert_eq!(config.split_size, None);
    assert_eq!(config.split_config().size, Some(DEFAULT_SPLIT_SIZE));
    assert_eq!(config.split_slop, DEFAULT_SPLIT_SLOP);
    assert!(config.combine);
    assert!(config.skip_hidden);
    Ok(())
}

#[test]
fn partial_keys_override_defaults() -> Result<()> {
    let config = ScanConfig::from_json_str(
        r#"{
            "split_count": 16,
            "record_mode": "line",
            "read_strategy": "copy",
            "codec_detection": "extension_and_magic",
            "threads": 4
        }"#,
    )?;
    assert_eq!(config.split_count, Some(16));
    assert_eq!(config.split_size, None);
    assert_eq!(config.record_mode, RecordMode::Line);
    assert_eq!(config.read_strategy, ReadPreference::Copy);
    assert_eq!(config.codec_detection, CodecDetection::ExtensionAndMagic);
    assert_eq!(config.threads, Some(4));

    let opts = config.source_options();
    assert_eq!(opts.record_mode, RecordMode::Line);
    assert_eq!(opts.read_preference, ReadPreference::Copy);
    assert_eq!(config.split_config().count, Some(16));
    assert_eq!(config.split_config().size, None);
    assert_eq!(config.resolve_options().codec_detection, CodecDetection::ExtensionAndMagic);
    Ok(())
}

#[test]
fn invalid_values_are_rejected() {
    let cases = [
        r#"{"split_count": 0}"#,
        r#"{"split_size": 0}"#,
        r#"{"split_slop": 0.9}"#,
        r#"{"max_record_bytes": 0}"#,
        r#"{"threads": 0}"#,
    ];
    for text in cases {
        let err = ScanConfig::from_json_str(text).unwrap_err();
        assert!(
            matches!(err.downcast_ref::<ScanError>(), Some(ScanError::InvalidSplitRequest { .. })),
            "{text}: {err:#}"
        );
    }
}

#[test]
fn split_count_alone_is_not_capped_by_the_default_size() -> Result<()> {
    let config = ScanConfig::from_json_str(r#"{"split_count": 4}"#)?;
    let splitter = Splitter::new(config.split_config())?;
    let ranges = splitter.split(&InputFile::new("/big", 1 << 30))?;
    assert_eq!(ranges.len(), 4);
    assert!(ranges.iter().all(|r| r.length == 1 << 28));

    // An explicit size still competes with the count.
    let both = ScanConfig::from_json_str(r#"{"split_count": 4, "split_size": 134217728}"#)?;
    assert_eq!(Splitter::new(both.split_config())?.split(&InputFile::new("/big", 1 << 30))?.len(), 8);
    Ok(())
}

#[test]
fn null_split_size_falls_back_to_the_default() -> Result<()> {
    let config = ScanConfig::from_json_str(r#"{"split_size": null}"#)?;
    assert_eq!(config.split_config().size, Some(DEFAULT_SPLIT_SIZE));
    Ok(())
}

#[test]
fn malformed_json_is_a_parse_error() {
    let err = ScanConfig::from_json_str(r#"{"record_mode": "paragraph"}"#).unwrap_err();
    assert!(format!("{err:#}").contains("parse scan config"));
    assert!(err.downcast_ref::<ScanError>().is_none());
}

#[test]
fn loads_from_a_file() -> Result<()> {
    let mut file = tempfile::NamedTempFile::new()?;
    writeln!(file, r#"{{ "split_size": 4096, "sequential": true, "combine": false }}"#)?;
    let config = ScanConfig::from_json_file(file.path())?;
    assert_eq!(config.split_size, Some(4096));
    assert!(config.sequential);
    assert!(!config.combine);

    let runner = Runner::from_config(&config)?;
    assert!(matches!(runner.mode, ExecMode::Sequential));
    assert!(!runner.combine);
    Ok(())
}

#[test]
fn missing_file_names_the_path() {
    let err = ScanConfig::from_json_file("/no/such/scan.json").unwrap_err();
    assert!(format!("{err:#}").contains("/no/such/scan.json"));
}

#[test]
fn config_round_trips_through_json() -> Result<()> {
    let config = ScanConfig {
        split_count: Some(3),
        max_record_bytes: Some(1 << 20),
        record_mode: RecordMode::Line,
        ..ScanConfig::default()
    };
    let text = serde_json::to_string(&config)?;
    assert_eq!(ScanConfig::from_json_str(&text)?, config);
    Ok(())
}
