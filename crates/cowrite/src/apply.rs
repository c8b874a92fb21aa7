//! Pure application of operations to document text.
//!
//! Positions are byte offsets. An insert position must fall on a UTF-8
//! character boundary; a delete needs no extra check because its byte-exact
//! text comparison can only succeed on a boundary-aligned range.

use crate::error::{OtError, OtResult};
use crate::operation::{OpKind, Operation};

/// Apply a single operation to a document, returning the new text.
///
/// The input document is never modified; on error the caller's state is
/// exactly what it was.
pub fn apply(doc: &str, op: &Operation) -> OtResult<String> {
    op.validate()?;

    match op.kind {
        OpKind::Insert => apply_insert(doc, op),
        OpKind::Delete => apply_delete(doc, op),
        OpKind::Retain => Ok(doc.to_string()),
    }
}

/// Apply a sequence of operations left to right; the first failure aborts.
pub fn apply_all(doc: &str, ops: &[Operation]) -> OtResult<String> {
    let mut result = doc.to_string();
    for op in ops {
        result = apply(&result, op)?;
    }
    Ok(result)
}

fn apply_insert(doc: &str, op: &Operation) -> OtResult<String> {
    if op.position > doc.len() || !doc.is_char_boundary(op.position) {
        return Err(OtError::PositionOutOfRange {
            kind: OpKind::Insert,
            position: op.position,
            doc_len: doc.len(),
        });
    }

    let mut out = String::with_capacity(doc.len() + op.text.len());
    out.push_str(&doc[..op.position]);
    out.push_str(&op.text);
    out.push_str(&doc[op.position..]);
    Ok(out)
}

fn apply_delete(doc: &str, op: &Operation) -> OtResult<String> {
    let end = op.position + op.len();
    if op.position >= doc.len() || end > doc.len() {
        return Err(OtError::PositionOutOfRange {
            kind: OpKind::Delete,
            position: op.position,
            doc_len: doc.len(),
        });
    }

    let actual = &doc.as_bytes()[op.position..end];
    if actual != op.text.as_bytes() {
        return Err(OtError::DeleteTextMismatch {
            position: op.position,
            expected: op.text.clone(),
            found: String::from_utf8_lossy(actual).into_owned(),
        });
    }

    // The expected text matched byte-for-byte and is itself valid UTF-8, so
    // both cut points sit on character boundaries.
    let mut out = String::with_capacity(doc.len() - op.len());
    out.push_str(&doc[..op.position]);
    out.push_str(&doc[end..]);
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_at_beginning_middle_end() {
        let op = Operation::insert(0, "hello ", 1);
        assert_eq!(apply("world", &op).unwrap(), "hello world");

        let op = Operation::insert(3, "l", 1);
        assert_eq!(apply("helo", &op).unwrap(), "hello");

        let op = Operation::insert(5, " world", 1);
        assert_eq!(apply("hello", &op).unwrap(), "hello world");

        let op = Operation::insert(0, "first", 1);
        assert_eq!(apply("", &op).unwrap(), "first");
    }

    #[test]
    fn insert_out_of_range() {
        let op = Operation::insert(10, "x", 1);
        assert!(matches!(
            apply("test", &op),
            Err(OtError::PositionOutOfRange { position: 10, doc_len: 4, .. })
        ));
    }

    #[test]
    fn insert_off_a_character_boundary() {
        // "é" is two bytes; position 1 lands inside it.
        let op = Operation::insert(1, "x", 1);
        assert!(matches!(
            apply("é", &op),
            Err(OtError::PositionOutOfRange { .. })
        ));
    }

    #[test]
    fn delete_from_beginning_middle_end() {
        let op = Operation::delete(0, "hello ", 1);
        assert_eq!(apply("hello world", &op).unwrap(), "world");

        let op = Operation::delete(1, "ell", 1);
        assert_eq!(apply("hello", &op).unwrap(), "ho");

        let op = Operation::delete(5, " world", 1);
        assert_eq!(apply("hello world", &op).unwrap(), "hello");

        let op = Operation::delete(0, "test", 1);
        assert_eq!(apply("test", &op).unwrap(), "");
    }

    #[test]
    fn delete_multibyte_text() {
        let op = Operation::delete(1, "é", 1);
        assert_eq!(apply("aéb", &op).unwrap(), "ab");
    }

    #[test]
    fn delete_with_wrong_text() {
        let op = Operation::delete(0, "world", 1);
        let err = apply("hello", &op).unwrap_err();
        assert!(matches!(err, OtError::DeleteTextMismatch { .. }));
    }

    #[test]
    fn delete_out_of_range() {
        let op = Operation::delete(2, "stx", 1);
        assert!(matches!(
            apply("test", &op),
            Err(OtError::PositionOutOfRange { .. })
        ));

        let op = Operation::delete(4, "x", 1);
        assert!(matches!(
            apply("test", &op),
            Err(OtError::PositionOutOfRange { .. })
        ));

        let op = Operation::delete(0, "x", 1);
        assert!(matches!(
            apply("", &op),
            Err(OtError::PositionOutOfRange { .. })
        ));
    }

    #[test]
    fn retain_returns_document_unchanged() {
        let op = Operation::retain(3, 1);
        assert_eq!(apply("hello", &op).unwrap(), "hello");
    }

    #[test]
    fn empty_delete_is_rejected_at_apply_time() {
        let op = Operation::delete(0, "", 1);
        assert!(matches!(apply("abc", &op), Err(OtError::InvalidOperation(_))));
    }

    #[test]
    fn apply_all_folds_left() {
        let ops = vec![
            Operation::insert(0, "hello", 0),
            Operation::insert(5, " world", 1),
            Operation::delete(0, "hello ", 2),
        ];
        assert_eq!(apply_all("", &ops).unwrap(), "world");
    }

    #[test]
    fn apply_all_aborts_on_first_failure() {
        let ops = vec![
            Operation::insert(0, "ab", 0),
            Operation::delete(0, "xy", 1),
            Operation::insert(0, "never", 2),
        ];
        assert!(apply_all("", &ops).is_err());
    }
}
