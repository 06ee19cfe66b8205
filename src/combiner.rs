//! Worker-local pre-merge of partial histograms.
//!
//! Combining is an optimization: the runner can skip it and hand every
//! per-range partial straight to the [`Merger`](crate::merger::Merger) with the
//! same final result.

use crate::histogram::{Histogram, PartialHistogram};

/// A commutative, associative aggregation.
///
/// `create` gives the identity accumulator, `add_input` folds one value in,
/// `merge` folds another accumulator in, and `finish` produces the output.
pub trait CombineFn<V, A, O>: Send + Sync + 'static {
    fn create(&self) -> A;
    fn add_input(&self, acc: &mut A, v: V);
    fn merge(&self, acc: &mut A, other: A);
    fn finish(&self, acc: A) -> O;
}

/// Combines [`PartialHistogram`]s; coverage is unioned as counts are summed.
#[derive(Clone, Copy, Debug, Default)]
pub struct HistogramCombine;

impl CombineFn<PartialHistogram, PartialHistogram, PartialHistogram> for HistogramCombine {
    fn create(&self) -> PartialHistogram {
        PartialHistogram::default()
    }

    fn add_input(&self, acc: &mut PartialHistogram, v: PartialHistogram) {
        acc.absorb(v);
    }

    fn merge(&self, acc: &mut PartialHistogram, other: PartialHistogram) {
        acc.absorb(other);
    }

    fn finish(&self, mut acc: PartialHistogram) -> PartialHistogram {
        acc.splits.sort_unstable();
        acc
    }
}

/// Plain histograms, no coverage tracking.
impl CombineFn<Histogram, Histogram, Histogram> for HistogramCombine {
    fn create(&self) -> Histogram {
        Histogram::new()
    }

    fn add_input(&self, acc: &mut Histogram, v: Histogram) {
        acc.merge(&v);
    }

    fn merge(&self, acc: &mut Histogram, other: Histogram) {
        acc.merge(&other);
    }

    fn finish(&self, acc: Histogram) -> Histogram {
        acc
    }
}

/// Merge a worker's partials into one. `None` for an empty input.
#[must_use]
pub fn combine_partials(partials: Vec<PartialHistogram>) -> Option<PartialHistogram> {
    if partials.is_empty() {
        return None;
    }
    type Partials = dyn CombineFn<PartialHistogram, PartialHistogram, PartialHistogram>;
    let comb: &Partials = &HistogramCombine;
    let mut acc = comb.create();
    for p in partials {
        comb.add_input(&mut acc, p);
    }
    Some(comb.finish(acc))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_input_has_no_combination() {
        assert!(combine_partials(Vec::new()).is_none());
    }

    #[test]
    fn coverage_is_unioned_and_sorted() {
        let parts = vec![
            PartialHistogram::for_split(2, Histogram::from_bytes(b"a")),
            PartialHistogram::for_split(0, Histogram::from_bytes(b"ab")),
        ];
        let out = combine_partials(parts).unwrap();
        assert_eq!(out.splits, vec![0, 2]);
        assert_eq!(out.histogram.get(b'a'), 2);
        assert_eq!(out.histogram.total(), 3);
    }
}
