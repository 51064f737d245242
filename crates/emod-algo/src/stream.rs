//! Streaming group consolidation.
//!
//! Every constraint family that folds many narrow rows into fewer
//! constraints goes through [`stream_groups`]: the rows arrive sorted by the
//! constraint key, terms are appended to an accumulator, and the accumulator
//! is handed to the emitter each time the key changes.
//!
//! The emitter always receives the key of the group that is *closing*, so the
//! right-hand side is evaluated for that group and never for the row that
//! triggered the flush. A final flush after the loop emits the last group.

/// Consolidate key-sorted `rows` into one emission per distinct key.
///
/// `key_fn` extracts the grouping key of a row, `term_fn` folds a row into the
/// accumulator and `emit_fn` receives the closing key with its finished
/// accumulator. `ctx` is threaded through both callbacks so they can share
/// mutable state (usually the model under construction).
///
/// Returns the number of groups emitted. An empty input emits nothing. The
/// first error from a callback aborts the pass.
pub fn stream_groups<R, K, C, A, E, KF, TF, EF>(
    rows: impl IntoIterator<Item = R>,
    ctx: &mut C,
    key_fn: KF,
    mut term_fn: TF,
    mut emit_fn: EF,
) -> Result<usize, E>
where
    R: Copy,
    K: PartialEq,
    A: Default,
    KF: Fn(R) -> K,
    TF: FnMut(&mut C, R, &mut A) -> Result<(), E>,
    EF: FnMut(&mut C, K, A) -> Result<(), E>,
{
    let mut last: Option<K> = None;
    let mut acc = A::default();
    let mut emitted = 0usize;

    for row in rows {
        let key = key_fn(row);
        if let Some(previous) = last.take() {
            if previous != key {
                emit_fn(ctx, previous, std::mem::take(&mut acc))?;
                emitted += 1;
            }
        }
        term_fn(ctx, row, &mut acc)?;
        last = Some(key);
    }

    if let Some(previous) = last {
        emit_fn(ctx, previous, acc)?;
        emitted += 1;
    }

    Ok(emitted)
}

#[cfg(test)]
mod tests {
    use super::*;

    type Sums = Vec<(&'static str, i32)>;

    fn sum_by_key(rows: &[(&'static str, i32)]) -> (usize, Sums) {
        let mut out: Sums = Vec::new();
        let emitted = stream_groups(
            rows.iter(),
            &mut out,
            |row: &(&'static str, i32)| row.0,
            |_: &mut Sums, row: &(&'static str, i32), acc: &mut i32| -> Result<(), ()> {
                *acc += row.1;
                Ok(())
            },
            |out: &mut Sums, key: &'static str, acc: i32| -> Result<(), ()> {
                out.push((key, acc));
                Ok(())
            },
        )
        .unwrap();
        (emitted, out)
    }

    #[test]
    fn final_group_is_flushed() {
        let (emitted, out) = sum_by_key(&[("a", 1), ("a", 2), ("b", 5)]);
        assert_eq!(emitted, 2);
        assert_eq!(out, vec![("a", 3), ("b", 5)]);
    }

    #[test]
    fn emitter_sees_closing_key() {
        let (_, out) = sum_by_key(&[("a", 1), ("b", 10), ("b", 1), ("c", 7)]);
        assert_eq!(out, vec![("a", 1), ("b", 11), ("c", 7)]);
    }

    #[test]
    fn empty_input_emits_nothing() {
        let (emitted, out) = sum_by_key(&[]);
        assert_eq!(emitted, 0);
        assert!(out.is_empty());
    }

    #[test]
    fn single_row_emits_once() {
        let (emitted, out) = sum_by_key(&[("only", 4)]);
        assert_eq!(emitted, 1);
        assert_eq!(out, vec![("only", 4)]);
    }

    #[test]
    fn callback_error_aborts() {
        let rows = [1, 2, 3];
        let mut seen = 0;
        let result = stream_groups(
            rows.iter(),
            &mut seen,
            |row: &i32| *row,
            |seen: &mut i32, _row: &i32, _acc: &mut ()| -> Result<(), String> {
                *seen += 1;
                Ok(())
            },
            |_: &mut i32, key: i32, _acc: ()| -> Result<(), String> {
                if key == 2 {
                    Err("boom".to_string())
                } else {
                    Ok(())
                }
            },
        );
        assert_eq!(result, Err("boom".to_string()));
        assert_eq!(seen, 2);
    }
}
