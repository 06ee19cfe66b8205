//! The 256-bucket byte histogram and its merge.
//!
//! [`Histogram::merge`] is a bucket-wise sum: commutative, associative, and with
//! the empty histogram as identity. Everything downstream of the scanners relies
//! on that, since partials are combined in whatever grouping and order the
//! workers happen to finish in.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, AddAssign};

pub const BUCKETS: usize = 256;

/// Below this many bytes the lane setup costs more than it saves.
const SMALL_INPUT: usize = 4096;

/// Occurrence count per byte value.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "Vec<u64>", into = "Vec<u64>")]
pub struct Histogram {
    counts: [u64; BUCKETS],
}

impl Histogram {
    #[must_use]
    pub fn new() -> Self {
        Self {
            counts: [0; BUCKETS],
        }
    }

    /// Histogram of a byte slice.
    #[must_use]
    pub fn from_bytes(bytes: &[u8]) -> Self {
        let mut h = Self::new();
        h.add_bytes(bytes);
        h
    }

    /// Count every byte of `bytes`.
    pub fn add_bytes(&mut self, bytes: &[u8]) {
        if bytes.len() < SMALL_INPUT {
            for &b in bytes {
                self.counts[b as usize] += 1;
            }
            return;
        }
        // Four independent lanes break the store-to-load dependency on runs of
        // the same byte value.
        let mut lanes = [[0u64; BUCKETS]; 4];
        let mut chunks = bytes.chunks_exact(4);
        for c in &mut chunks {
            lanes[0][c[0] as usize] += 1;
            lanes[1][c[1] as usize] += 1;
            lanes[2][c[2] as usize] += 1;
            lanes[3][c[3] as usize] += 1;
        }
        for &b in chunks.remainder() {
            lanes[0][b as usize] += 1;
        }
        for (i, slot) in self.counts.iter_mut().enumerate() {
            *slot += lanes[0][i] + lanes[1][i] + lanes[2][i] + lanes[3][i];
        }
    }

    /// Count signed bytes by their bit pattern: `-1` lands in bucket 255.
    pub fn add_signed(&mut self, bytes: &[i8]) {
        for &b in bytes {
            self.increment(b as u8);
        }
    }

    pub fn increment(&mut self, byte: u8) {
        self.counts[byte as usize] += 1;
    }

    /// Add `count` occurrences of `byte`.
    pub fn add_count(&mut self, byte: u8, count: u64) {
        self.counts[byte as usize] += count;
    }

    /// Bucket-wise sum of `other` into `self`.
    pub fn merge(&mut self, other: &Histogram) {
        for (a, b) in self.counts.iter_mut().zip(other.counts.iter()) {
            *a += *b;
        }
    }

    /// `self + other` without mutating either side.
    #[must_use]
    pub fn merged(&self, other: &Histogram) -> Histogram {
        let mut out = self.clone();
        out.merge(other);
        out
    }

    #[must_use]
    pub fn get(&self, byte: u8) -> u64 {
        self.counts[byte as usize]
    }

    /// Sum over all buckets.
    #[must_use]
    pub fn total(&self) -> u64 {
        self.counts.iter().sum()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.counts.iter().all(|&c| c == 0)
    }

    /// All 256 `(byte, count)` pairs in ascending byte order, zeros included.
    pub fn iter(&self) -> impl Iterator<Item = (u8, u64)> + '_ {
        self.counts.iter().enumerate().map(|(i, &c)| (i as u8, c))
    }

    /// Only the buckets with a non-zero count, ascending.
    pub fn non_zero(&self) -> impl Iterator<Item = (u8, u64)> + '_ {
        self.iter().filter(|&(_, c)| c > 0)
    }

    #[must_use]
    pub fn as_array(&self) -> &[u64; BUCKETS] {
        &self.counts
    }
}

impl Default for Histogram {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Histogram {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.non_zero()).finish()
    }
}

impl From<[u64; BUCKETS]> for Histogram {
    fn from(counts: [u64; BUCKETS]) -> Self {
        Self { counts }
    }
}

impl TryFrom<Vec<u64>> for Histogram {
    type Error = String;

    fn try_from(v: Vec<u64>) -> Result<Self, Self::Error> {
        let len = v.len();
        let counts: [u64; BUCKETS] = v
            .try_into()
            .map_err(|_| format!("histogram needs {BUCKETS} buckets, got {len}"))?;
        Ok(Self { counts })
    }
}

impl From<Histogram> for Vec<u64> {
    fn from(h: Histogram) -> Self {
        h.counts.to_vec()
    }
}

impl FromIterator<(u8, u64)> for Histogram {
    fn from_iter<I: IntoIterator<Item = (u8, u64)>>(iter: I) -> Self {
        let mut h = Self::new();
        for (byte, count) in iter {
            h.add_count(byte, count);
        }
        h
    }
}

impl AddAssign<&Histogram> for Histogram {
    fn add_assign(&mut self, rhs: &Histogram) {
        self.merge(rhs);
    }
}

impl Add for Histogram {
    type Output = Histogram;

    fn add(mut self, rhs: Histogram) -> Histogram {
        self.merge(&rhs);
        self
    }
}

/// A histogram tagged with the split indices it covers.
///
/// Scanners emit one partial per split; the combiner unions coverage as it
/// sums counts, so the merger can tell a dropped range from an empty one.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartialHistogram {
    pub splits: Vec<usize>,
    pub histogram: Histogram,
}

impl PartialHistogram {
    #[must_use]
    pub fn for_split(split: usize, histogram: Histogram) -> Self {
        Self {
            splits: vec![split],
            histogram,
        }
    }

    /// Absorb another partial: counts summed, coverage concatenated.
    pub fn absorb(&mut self, other: PartialHistogram) {
        self.histogram.merge(&other.histogram);
        self.splits.extend(other.splits);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lanes_agree_with_single_pass() {
        let data: Vec<u8> = (0..10_007u32).map(|i| (i * 7 % 251) as u8).collect();
        let mut expected = [0u64; BUCKETS];
        for &b in &data {
            expected[b as usize] += 1;
        }
        assert_eq!(Histogram::from_bytes(&data).as_array(), &expected);
    }

    #[test]
    fn signed_minus_one_is_bucket_255() {
        let mut h = Histogram::new();
        h.add_signed(&[-1, -1, 0, 65]);
        assert_eq!(h.get(255), 2);
        assert_eq!(h.get(0), 1);
        assert_eq!(h.get(65), 1);
        assert_eq!(h.total(), 4);
    }

    #[test]
    fn serde_keeps_all_buckets() {
        let h = Histogram::from_bytes(b"abca");
        let json = serde_json::to_string(&h).unwrap();
        let back: Histogram = serde_json::from_str(&json).unwrap();
        assert_eq!(h, back);
        assert!(serde_json::from_str::<Histogram>("[1,2,3]").is_err());
    }
}
