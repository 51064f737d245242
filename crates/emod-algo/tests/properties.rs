//! Property tests for index restriction and streaming consolidation.

use emod_algo::{restrict, restrict_blocks, restrict_rows, stream_groups};
use emod_core::{Key, Row};
use proptest::prelude::*;
use std::collections::BTreeSet;

fn arb_key() -> impl Strategy<Value = Key> {
    (
        prop_oneof![Just("R1"), Just("R2")],
        prop_oneof![Just("T1"), Just("T2"), Just("T3")],
        prop_oneof![Just("2020"), Just("2021")],
        prop_oneof![Just("1"), Just("2")],
    )
        .prop_map(|(r, t, y, m)| vec![r.to_string(), t.to_string(), y.to_string(), m.to_string()])
}

fn arb_rows() -> impl Strategy<Value = Vec<Row>> {
    prop::collection::vec(arb_key(), 0..64)
        .prop_map(|keys| keys.into_iter().map(Row::keyed).collect())
}

proptest! {
    #[test]
    fn block_partitions_match_the_sequential_pass(
        rows in arb_rows(),
        blocks in 1usize..9,
        depth in 1usize..5
    ) {
        let sequential = restrict_rows(&rows, depth);
        let partitioned = restrict_blocks(&rows, depth, blocks);
        prop_assert_eq!(&sequential, &partitioned);
        prop_assert_eq!(sequential.tuples(), partitioned.tuples());
    }

    #[test]
    fn pooled_restriction_matches_the_sequential_pass(rows in arb_rows(), workers in 2usize..5) {
        let pooled = restrict(&rows, 4, workers, 1).unwrap();
        prop_assert_eq!(pooled, restrict_rows(&rows, 4));
    }

    #[test]
    fn restricted_tuples_are_exactly_the_observed_prefixes(rows in arb_rows(), depth in 1usize..5) {
        let observed: BTreeSet<Key> = rows.iter().map(|row| row.prefix(depth).to_vec()).collect();
        let tuples: BTreeSet<Key> = restrict_rows(&rows, depth).tuples().into_iter().collect();
        prop_assert_eq!(observed, tuples);
    }

    #[test]
    fn streaming_emits_one_group_per_distinct_key(mut rows in arb_rows(), depth in 1usize..5) {
        rows.sort_by(|a, b| a.key.cmp(&b.key));
        let distinct: BTreeSet<&[String]> = rows.iter().map(|row| row.prefix(depth)).collect();

        let mut emitted: Vec<(Key, usize)> = Vec::new();
        let count = stream_groups(
            rows.iter(),
            &mut emitted,
            |row| row.prefix(depth),
            |_, _, acc: &mut usize| -> Result<(), ()> {
                *acc += 1;
                Ok(())
            },
            |out, k, acc| {
                out.push((k.to_vec(), acc));
                Ok(())
            },
        )
        .unwrap();

        prop_assert_eq!(count, distinct.len());
        prop_assert_eq!(emitted.len(), distinct.len());
        prop_assert_eq!(emitted.iter().map(|(_, n)| n).sum::<usize>(), rows.len());
        let keys: BTreeSet<&[String]> = emitted.iter().map(|(k, _)| k.as_slice()).collect();
        prop_assert_eq!(keys, distinct);
    }
}

#[test]
fn empty_inputs_produce_empty_results() {
    assert!(restrict(&[], 3, 4, 1).unwrap().tuples().is_empty());
    let mut sink: Vec<Key> = Vec::new();
    let count = stream_groups(
        std::iter::empty::<&Row>(),
        &mut sink,
        |row| row.prefix(1),
        |_, _, _: &mut ()| -> Result<(), ()> { Ok(()) },
        |out, k, ()| {
            out.push(k.to_vec());
            Ok(())
        },
    )
    .unwrap();
    assert_eq!(count, 0);
    assert!(sink.is_empty());
}
