//! Byte histogram of files named on the command line.
//!
//! With no arguments a sample directory is generated first: a plain binary
//! file, a text file, and (with `compression-gzip`) a gzipped copy of it.
//!
//! Run with: `cargo run --example histogram_report -- [CONFIG.json] [PATH ...]`
//!
//! Set `RUST_LOG=bytehist=debug` to see the split plan and every range.

use anyhow::Result;
use bytehist::io::sink::TextSink;
use bytehist::metrics::MetricsCollector;
use bytehist::testing::{sample_bytes, sample_text, write_fixture};
use bytehist::{Runner, ScanConfig, write_histogram, write_histogram_file};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let mut args: Vec<String> = std::env::args().skip(1).collect();
    let config = match args.first() {
        Some(first) if first.ends_with(".json") => {
            let path = args.remove(0);
            println!("Loading config from {path}");
            ScanConfig::from_json_file(&path)?
        }
        _ => ScanConfig {
            split_size: Some(256 * 1024),
            ..ScanConfig::default()
        },
    };

    let sample_dir = tempfile::tempdir()?;
    let paths: Vec<PathBuf> = if args.is_empty() {
        println!("No inputs given; scanning a generated sample in {}", sample_dir.path().display());
        let dir = sample_dir.path();
        write_fixture(dir, "blob.bin", &sample_bytes(3 * 1024 * 1024, 7))?;
        write_fixture(dir, "notes.txt", &sample_text(20_000))?;
        #[cfg(feature = "compression-gzip")]
        bytehist::testing::write_compressed_fixture(dir, "notes.txt.gz", &sample_text(20_000))?;
        vec![dir.to_path_buf()]
    } else {
        args.iter().map(PathBuf::from).collect()
    };

    let metrics = MetricsCollector::new();
    let runner = Runner::from_config(&config)?.with_metrics(metrics.clone());
    let outcome = runner.run_paths(&paths)?;

    println!(
        "\n{} file(s), {} range(s), {} bytes counted, {} release warning(s)\n",
        outcome.files,
        outcome.splits,
        outcome.histogram.total(),
        outcome.warnings
    );

    let mut top: Vec<(u8, u64)> = outcome.histogram.non_zero().collect();
    top.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));
    println!("Most frequent bytes:");
    for (byte, count) in top.iter().take(10) {
        let shown = if byte.is_ascii_graphic() {
            format!("'{}'", char::from(*byte))
        } else {
            format!("{byte:#04x}")
        };
        println!("  {shown:>6}  {count}");
    }

    metrics.print();

    let out = std::env::temp_dir().join("bytehist-report/histogram.tsv");
    write_histogram_file(&out, &outcome.histogram)?;
    println!("\nFull histogram written to {}", out.display());

    if std::env::var_os("BYTEHIST_DUMP").is_some() {
        let mut sink = TextSink::new(std::io::stdout().lock());
        write_histogram(&outcome.histogram, &mut sink)?;
    }
    Ok(())
}
