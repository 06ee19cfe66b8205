//! The decompressor pool is process-wide, so everything touching it runs in
//! one test to keep the counters predictable.

use anyhow::Result;
use bytehist::io::compression::{
    CompressionCodec, acquire_decompressor, codec_by_name, decompressor_pool_stats,
    register_codec, return_decompressor, teardown_decompressor_pool,
};
use bytehist::io::memory::{MemoryBehavior, MemoryFileSystem};
use bytehist::testing::sample_bytes;
use bytehist::{InputFile, RangeDescriptor, RangeSource, ScanError, SourceOptions};
use bytehist::{ExecMode, Runner, SplitConfig};
use std::io::{BufRead, Read, Write};
use std::sync::Arc;

/// Stores data as is; exercises the pool without a real codec.
struct Stored;

impl CompressionCodec for Stored {
    fn name(&self) -> &str {
        "stored-pool-test"
    }

    fn extensions(&self) -> &[&str] {
        &[".stored"]
    }

    fn magic_bytes(&self) -> Option<&[u8]> {
        None
    }

    fn wrap_reader_dyn(&self, reader: Box<dyn BufRead + Send>) -> std::io::Result<Box<dyn Read + Send>> {
        Ok(Box::new(reader))
    }

    fn wrap_writer_dyn(&self, writer: Box<dyn Write>) -> std::io::Result<Box<dyn Write>> {
        Ok(writer)
    }
}

const NAME: &str = "stored-pool-test";

#[test]
fn decompressors_are_pooled_and_released() -> Result<()> {
    register_codec(Arc::new(Stored));
    let codec = codec_by_name(NAME).expect("codec registered");

    let fs = MemoryFileSystem::new();
    let files: Vec<_> = (0..6)
        .map(|i| {
            let data = sample_bytes(10_000 + i, i as u32);
            let path = format!("/in/{i}.stored");
            fs.insert(path.as_str(), data);
            InputFile::new(path, 10_000 + i as u64).with_codec(Arc::clone(&codec))
        })
        .collect();

    // Sequential: one lease at a time, so one buffer serves every file.
    let runner = Runner {
        mode: ExecMode::Sequential,
        split: SplitConfig::by_count(4),
        ..Runner::default()
    }
    .with_filesystem(Arc::new(fs.clone()));
    let outcome = runner.run_inputs(&files)?;
    assert_eq!(outcome.splits, 6);
    assert_eq!(outcome.histogram.total(), (0..6).map(|i| 10_000 + i).sum::<u64>());

    let stats = decompressor_pool_stats(NAME);
    assert_eq!(stats.leased, 0);
    assert_eq!(stats.created, 1);
    assert_eq!(stats.reused, 5);
    assert_eq!(stats.idle, 1);

    // A read error still hands the decompressor back.
    let failing = fs.with_shared_files(MemoryBehavior {
        fail_read_at: Some(100),
        ..MemoryBehavior::default()
    });
    let range = RangeDescriptor::new("/in/0.stored", 0, 10_000).with_codec(NAME);
    let mut source = RangeSource::open(&failing, &range, &SourceOptions::default())?;
    assert!(source.is_compressed());
    assert_eq!(decompressor_pool_stats(NAME).leased, 1);
    assert!(matches!(source.next_record(), Err(ScanError::RangeRead { .. })));
    assert!(source.close().is_empty());
    assert_eq!(decompressor_pool_stats(NAME).leased, 0);

    // Dropping an unclosed source releases it too.
    let source = RangeSource::open(&fs, &range, &SourceOptions::default())?;
    assert_eq!(decompressor_pool_stats(NAME).leased, 1);
    drop(source);
    assert_eq!(decompressor_pool_stats(NAME).leased, 0);

    // Returning while the stream is still alive is a release warning.
    let lease = acquire_decompressor(&codec);
    let stream = lease.wrap(Box::new(std::io::empty()))?;
    let err = return_decompressor(lease).unwrap_err();
    assert!(err.is_warning(), "{err}");
    drop(stream);
    assert_eq!(decompressor_pool_stats(NAME).leased, 0);

    // Teardown reports outstanding leases, and returning one afterwards warns.
    let outstanding = acquire_decompressor(&codec);
    let before = teardown_decompressor_pool();
    assert!(before.leased >= 1);
    assert_eq!(decompressor_pool_stats(NAME), Default::default());
    assert!(return_decompressor(outstanding).is_err());
    Ok(())
}
