//! Pairwise operational transformation.
//!
//! [`transform`] adjusts two operations authored concurrently against the
//! same document version so they can be applied in either order with the
//! same outcome: for any document `d` on which both operations individually
//! apply,
//!
//! ```text
//! apply(apply(d, a), b') == apply(apply(d, b), a')
//! ```
//!
//! where `(a', b') = transform(a, b)`. Inputs are never mutated.

use crate::error::{OtError, OtResult};
use crate::operation::{OpKind, Operation};

/// Transform two concurrent operations into versions that commute.
///
/// Both returned operations carry `max(a.version, b.version) + 1`. An
/// operation whose whole effect is claimed by the other side degenerates to
/// a no-op: a delete comes back with empty text, an insert landing inside a
/// concurrently deleted range comes back as a retain. Callers skip such
/// no-ops instead of applying them.
pub fn transform(a: &Operation, b: &Operation) -> OtResult<(Operation, Operation)> {
    a.validate()?;
    b.validate()?;

    let next_version = a.version.max(b.version) + 1;
    let mut a_t = Operation {
        version: next_version,
        ..a.clone()
    };
    let mut b_t = Operation {
        version: next_version,
        ..b.clone()
    };

    match (a.kind, b.kind) {
        (OpKind::Insert, OpKind::Insert) => transform_insert_insert(&mut a_t, &mut b_t),
        (OpKind::Insert, OpKind::Delete) => transform_insert_delete(&mut a_t, &mut b_t)?,
        (OpKind::Delete, OpKind::Insert) => transform_insert_delete(&mut b_t, &mut a_t)?,
        (OpKind::Delete, OpKind::Delete) => transform_delete_delete(&mut a_t, &mut b_t)?,
        (a_kind, b_kind) => return Err(OtError::UnsupportedPair(a_kind, b_kind)),
    }

    Ok((a_t, b_t))
}

/// Concurrent inserts. A position tie is broken by shifting `b` right, so
/// `b`'s text always lands after `a`'s.
fn transform_insert_insert(a: &mut Operation, b: &mut Operation) {
    if a.position < b.position {
        b.position += a.len();
    } else if a.position > b.position {
        a.position += b.len();
    } else {
        b.position += a.len();
    }
}

/// Insert vs delete. An insert at or left of the deleted range shifts the
/// delete right; an insert at or past the range's end shifts left by the
/// deleted length and survives at the left edge of the hole; an insert
/// strictly inside the range is claimed by the delete.
fn transform_insert_delete(ins: &mut Operation, del: &mut Operation) -> OtResult<()> {
    let del_end = del.position + del.len();
    if ins.position <= del.position {
        del.position += ins.len();
    } else if ins.position >= del_end {
        ins.position -= del.len();
    } else {
        // The insert lands inside text the other side removes. A single
        // contiguous delete cannot leave the insertion standing in both
        // application orders, so the delete wins: the insert degenerates
        // to a no-op and the delete widens to absorb the inserted bytes.
        let split = ins.position - del.position;
        if !del.text.is_char_boundary(split) {
            return Err(OtError::InvalidOperation(format!(
                "insert at {} splits a multi-byte character of the deleted range",
                ins.position
            )));
        }
        del.text.insert_str(split, &ins.text);
        ins.kind = OpKind::Retain;
        ins.position = del.position;
        ins.text.clear();
    }
    Ok(())
}

/// Concurrent deletes. Each delete keeps only its exclusive share of the
/// two ranges, repositioned into the document as it stands after the other
/// delete has run. Disjoint ranges just shift, identical ranges reduce both
/// to no-ops, and overlap is removed from both sides so every character is
/// deleted exactly once across both application orders.
fn transform_delete_delete(a: &mut Operation, b: &mut Operation) -> OtResult<()> {
    let (a_start, a_end) = (a.position, a.position + a.len());
    let (b_start, b_end) = (b.position, b.position + b.len());

    clip_delete(a, b_start, b_end)?;
    clip_delete(b, a_start, a_end)?;
    Ok(())
}

/// Rewrite one delete so it applies after the other delete of
/// `[other_start, other_end)` has run: give up the bytes the other already
/// claims, and shift left by however much the other removes in front.
///
/// When the other range splits this one, the surviving head and tail are
/// contiguous in the post-delete document, so a single delete still
/// expresses them.
fn clip_delete(op: &mut Operation, other_start: usize, other_end: usize) -> OtResult<()> {
    let start = op.position;
    let end = op.position + op.len();

    let overlap_start = start.max(other_start);
    let overlap_end = end.min(other_end);
    if overlap_start < overlap_end {
        let lo = overlap_start - start;
        let hi = overlap_end - start;
        if !op.text.is_char_boundary(lo) || !op.text.is_char_boundary(hi) {
            return Err(OtError::InvalidOperation(
                "delete overlap splits a multi-byte character".to_string(),
            ));
        }
        op.text.replace_range(lo..hi, "");
    }

    let removed_before = other_end.min(start).saturating_sub(other_start);
    op.position = start - removed_before;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::apply::apply;

    /// Apply a transformed operation, treating an emptied delete as a no-op.
    fn apply_effective(doc: &str, op: &Operation) -> String {
        if op.is_noop() {
            doc.to_string()
        } else {
            apply(doc, op).expect("transformed operation must apply")
        }
    }

    /// Transform, apply in both orders, assert convergence, return the text.
    fn converge(doc: &str, a: &Operation, b: &Operation) -> String {
        let (a_t, b_t) = transform(a, b).expect("transform");
        let one = apply_effective(&apply_effective(doc, a), &b_t);
        let other = apply_effective(&apply_effective(doc, b), &a_t);
        assert_eq!(one, other, "orders diverged for a={a} b={b} on {doc:?}");
        one
    }

    #[test]
    fn inserts_at_different_positions() {
        let a = Operation::insert(1, "b", 0);
        let b = Operation::insert(2, "d", 0);
        assert_eq!(converge("ac", &a, &b), "abcd");
    }

    #[test]
    fn inserts_at_same_position_bias_right() {
        let a = Operation::insert(1, "X", 0);
        let b = Operation::insert(1, "Y", 0);

        let (a_t, b_t) = transform(&a, &b).unwrap();
        assert_eq!(a_t.position, 1);
        assert_eq!(b_t.position, 2);

        assert_eq!(converge("ac", &a, &b), "aXYc");
    }

    #[test]
    fn insert_left_of_delete_shifts_delete() {
        let ins = Operation::insert(1, "X", 0);
        let del = Operation::delete(2, "cd", 0);
        assert_eq!(converge("abcd", &ins, &del), "aXb");
    }

    #[test]
    fn insert_right_of_delete_shifts_insert() {
        let ins = Operation::insert(3, "X", 0);
        let del = Operation::delete(0, "ab", 0);
        assert_eq!(converge("abcd", &ins, &del), "cXd");
    }

    #[test]
    fn insert_strictly_inside_delete_is_claimed_by_the_delete() {
        let ins = Operation::insert(2, "Z", 0);
        let del = Operation::delete(1, "bc", 0);

        let (ins_t, del_t) = transform(&ins, &del).unwrap();
        assert!(ins_t.is_noop());
        assert_eq!(del_t.position, 1);
        assert_eq!(del_t.text, "bZc");

        assert_eq!(converge("abcd", &ins, &del), "ad");
    }

    #[test]
    fn insert_at_delete_range_end_survives_at_the_hole() {
        let ins = Operation::insert(3, "Z", 0);
        let del = Operation::delete(1, "bc", 0);

        let (ins_t, del_t) = transform(&ins, &del).unwrap();
        assert_eq!(ins_t.position, 1);
        assert_eq!(del_t.text, "bc");

        assert_eq!(converge("abcd", &ins, &del), "aZd");
    }

    #[test]
    fn delete_then_insert_mirrors_insert_then_delete() {
        let del = Operation::delete(1, "bc", 0);
        let inside = Operation::insert(2, "Z", 0);
        assert_eq!(converge("abcd", &del, &inside), "ad");

        let at_end = Operation::insert(3, "Z", 0);
        assert_eq!(converge("abcd", &del, &at_end), "aZd");
    }

    #[test]
    fn disjoint_deletes() {
        let a = Operation::delete(0, "ab", 0);
        let b = Operation::delete(4, "ef", 0);
        assert_eq!(converge("abcdef", &a, &b), "cd");
    }

    #[test]
    fn identical_deletes_become_noops() {
        let a = Operation::delete(1, "bc", 0);
        let b = Operation::delete(1, "bc", 0);

        let (a_t, b_t) = transform(&a, &b).unwrap();
        assert!(a_t.is_noop());
        assert!(b_t.is_noop());

        assert_eq!(converge("abcd", &a, &b), "ad");
    }

    #[test]
    fn overlapping_deletes_keep_their_exclusive_parts() {
        let a = Operation::delete(1, "bcd", 0);
        let b = Operation::delete(2, "cde", 0);

        let (a_t, b_t) = transform(&a, &b).unwrap();
        assert_eq!((a_t.position, a_t.text.as_str()), (1, "b"));
        assert_eq!((b_t.position, b_t.text.as_str()), (1, "e"));

        assert_eq!(converge("abcdef", &a, &b), "af");
        assert_eq!(converge("abcdef", &b, &a), "af");
    }

    #[test]
    fn contained_delete_is_swallowed() {
        let outer = Operation::delete(1, "bcde", 0);
        let inner = Operation::delete(2, "cd", 0);
        assert_eq!(converge("abcdef", &outer, &inner), "af");
        assert_eq!(converge("abcdef", &inner, &outer), "af");
    }

    #[test]
    fn versions_advance_past_both_inputs() {
        let a = Operation::insert(0, "x", 4);
        let b = Operation::insert(5, "y", 2);
        let (a_t, b_t) = transform(&a, &b).unwrap();
        assert_eq!(a_t.version, 5);
        assert_eq!(b_t.version, 5);
    }

    #[test]
    fn inputs_are_not_mutated_and_results_are_deterministic() {
        let a = Operation::delete(1, "bcd", 3);
        let b = Operation::delete(2, "cde", 3);
        let a_before = a.clone();
        let b_before = b.clone();

        let first = transform(&a, &b).unwrap();
        let second = transform(&a, &b).unwrap();

        assert_eq!(a, a_before);
        assert_eq!(b, b_before);
        assert_eq!(first, second);
    }

    #[test]
    fn retain_pairs_are_unsupported() {
        let retain = Operation::retain(0, 0);
        let ins = Operation::insert(0, "x", 0);
        let del = Operation::delete(0, "x", 0);

        for (a, b) in [
            (&retain, &ins),
            (&ins, &retain),
            (&retain, &del),
            (&del, &retain),
            (&retain, &retain),
        ] {
            assert!(matches!(
                transform(a, b),
                Err(OtError::UnsupportedPair(_, _))
            ));
        }
    }

    #[test]
    fn invalid_inputs_are_rejected() {
        let bad = Operation::insert(0, "", 0);
        let good = Operation::insert(0, "x", 0);
        assert!(matches!(
            transform(&bad, &good),
            Err(OtError::InvalidOperation(_))
        ));
        assert!(matches!(
            transform(&good, &bad),
            Err(OtError::InvalidOperation(_))
        ));
    }
}
