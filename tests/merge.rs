use bytehist::{Histogram, Merger, PartialHistogram, ScanError, combine_partials};

fn partial(split: usize, bytes: &[u8]) -> PartialHistogram {
    PartialHistogram::for_split(split, Histogram::from_bytes(bytes))
}

#[test]
fn any_arrival_order_gives_the_same_total() -> anyhow::Result<()> {
    let parts = vec![partial(0, b"ab"), partial(1, b"bc"), partial(2, b"cd")];

    let mut forward = Merger::new(3);
    for p in parts.clone() {
        forward.accept(p)?;
    }
    let mut backward = Merger::new(3);
    for p in parts.into_iter().rev() {
        backward.accept(p)?;
    }
    assert_eq!(forward.finish()?, backward.finish()?);
    Ok(())
}

#[test]
fn combined_and_raw_partials_mix() -> anyhow::Result<()> {
    let combined = combine_partials(vec![partial(0, b"x"), partial(2, b"yy")]).unwrap();
    let mut merger = Merger::new(3);
    merger.accept(partial(1, b"zzz"))?;
    merger.accept(combined)?;
    assert_eq!(merger.received(), 3);
    assert_eq!(merger.expected(), 3);
    assert_eq!(merger.finish()?.total(), 6);
    Ok(())
}

#[test]
fn missing_partial_is_incomplete_input() {
    let mut merger = Merger::new(4);
    merger.accept(partial(0, b"a")).unwrap();
    merger.accept(partial(3, b"b")).unwrap();
    match merger.finish() {
        Err(ScanError::IncompleteInput {
            expected,
            received,
            missing,
        }) => {
            assert_eq!(expected, 4);
            assert_eq!(received, 2);
            assert_eq!(missing, vec![1, 2]);
        }
        other => panic!("expected IncompleteInput, got {other:?}"),
    }
}

#[test]
fn empty_partial_still_counts_as_received() -> anyhow::Result<()> {
    let mut merger = Merger::new(2);
    merger.accept(partial(0, b""))?;
    merger.accept(partial(1, b"q"))?;
    assert_eq!(merger.finish()?, Histogram::from_bytes(b"q"));
    Ok(())
}

#[test]
fn duplicate_partial_is_rejected_without_side_effects() {
    let mut merger = Merger::new(2);
    merger.accept(partial(0, b"a")).unwrap();
    let err = merger.accept(partial(0, b"a")).unwrap_err();
    assert!(matches!(err, ScanError::DuplicatePartial { split: 0 }));

    let both = combine_partials(vec![partial(1, b"b"), partial(0, b"c")]).unwrap();
    assert!(merger.accept(both).is_err());
    assert_eq!(merger.received(), 1);
    assert!(!merger.is_complete());
}

#[test]
fn unknown_split_is_rejected() {
    let mut merger = Merger::new(1);
    let err = merger.accept(partial(5, b"a")).unwrap_err();
    assert!(matches!(
        err,
        ScanError::UnexpectedPartial {
            split: 5,
            expected: 1
        }
    ));
}

#[test]
fn zero_expected_finishes_empty() -> anyhow::Result<()> {
    let h = Merger::new(0).finish()?;
    assert!(h.is_empty());
    assert_eq!(h.iter().count(), 256);
    Ok(())
}
