//! Resolving files, directories and glob patterns into scan inputs.

use anyhow::Result;
use bytehist::io::fs::LocalFileSystem;
use bytehist::io::glob::{expand_glob, expand_glob_required};
use bytehist::io::inputs::ResolveOptions;
use bytehist::testing::write_fixture;
use bytehist::{InputFile, resolve_inputs};
use std::fs::create_dir_all;
use tempfile::TempDir;

fn fixture_tree() -> Result<TempDir> {
    let dir = TempDir::new()?;
    let base = dir.path();
    create_dir_all(base.join("day-1"))?;
    create_dir_all(base.join("day-2"))?;
    write_fixture(&base.join("day-1"), "b.bin", &[1; 10])?;
    write_fixture(&base.join("day-1"), "a.bin", &[2; 20])?;
    write_fixture(&base.join("day-2"), "c.bin", &[3; 30])?;
    write_fixture(&base.join("day-2"), "_SUCCESS", b"")?;
    write_fixture(&base.join("day-2"), "notes.txt", b"not matched")?;
    Ok(dir)
}

#[test]
fn glob_matches_are_sorted_files() -> Result<()> {
    let dir = fixture_tree()?;
    let pattern = format!("{}/day-*/*.bin", dir.path().display());
    let names: Vec<String> = expand_glob(&pattern)?
        .iter()
        .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
        .collect();
    assert_eq!(names, vec!["a.bin", "b.bin", "c.bin"]);

    // Directories never match.
    assert!(expand_glob(&format!("{}/day-*", dir.path().display()))?.is_empty());
    Ok(())
}

#[test]
fn required_glob_fails_on_no_match() -> Result<()> {
    let dir = fixture_tree()?;
    let err = expand_glob_required(&format!("{}/*.zst", dir.path().display())).unwrap_err();
    assert!(err.to_string().contains("no files found"));
    assert!(expand_glob("[unclosed").is_err());
    Ok(())
}

#[test]
fn globs_directories_and_files_resolve_together() -> Result<()> {
    let dir = fixture_tree()?;
    let base = dir.path();
    let fs = LocalFileSystem::new();
    let paths = vec![
        format!("{}/day-1/*.bin", base.display()),
        base.join("day-2").display().to_string(),
    ];
    let inputs = resolve_inputs(&fs, &paths, &ResolveOptions::default())?;
    let sizes: Vec<u64> = inputs.iter().map(|i| i.size).collect();
    // Glob matches first (sorted), then the directory's files (sorted, `_SUCCESS` skipped).
    assert_eq!(sizes, vec![20, 10, 30, 11]);
    assert!(inputs.iter().all(|i| !i.is_compressed()));
    Ok(())
}

#[test]
fn hidden_glob_matches_are_skipped() -> Result<()> {
    let dir = fixture_tree()?;
    let fs = LocalFileSystem::new();
    let pattern = format!("{}/day-2/*", dir.path().display());
    let inputs = resolve_inputs(&fs, &[&pattern], &ResolveOptions::default())?;
    assert_eq!(inputs.len(), 2);

    let keep_all = ResolveOptions {
        skip_hidden: false,
        ..ResolveOptions::default()
    };
    assert_eq!(resolve_inputs(&fs, &[&pattern], &keep_all)?.len(), 3);
    Ok(())
}

#[test]
fn codec_follows_the_file_name() {
    let plain = InputFile::detect("/data/dump.bin", 100);
    assert!(!plain.is_compressed());
    assert!(plain.is_splittable());

    #[cfg(feature = "compression-gzip")]
    {
        let gz = InputFile::detect("/data/DUMP.BIN.GZ", 100);
        assert!(gz.is_compressed());
        assert!(!gz.is_splittable());
        assert!(format!("{gz:?}").contains("gzip"));
    }
}
