//! Filesystem, codec, input, and output plumbing around the scanners.
//!
//! - [`fs`]: the [`FileSystem`](fs::FileSystem) / [`InputStream`](fs::InputStream)
//!   abstraction and the local implementation
//! - [`memory`]: an in-memory filesystem with injectable behavior
//! - [`compression`]: codec registry, detection, and the decompressor pool
//! - [`inputs`] and [`glob`]: turning paths into planned inputs
//! - [`sink`]: writing finished histograms

pub mod compression;
pub mod fs;
pub mod glob;
pub mod inputs;
pub mod memory;
pub mod sink;
