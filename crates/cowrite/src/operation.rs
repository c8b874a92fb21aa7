//! Text editing operations.
//!
//! An [`Operation`] is an immutable value describing one atomic edit against
//! a specific document version. Positions and lengths are byte offsets into
//! the document text; see [`crate::apply`] for the boundary rules.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{OtError, OtResult};

/// The kind of edit an operation performs.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OpKind {
    /// Insert text at a position.
    Insert,
    /// Delete the expected text at a position.
    Delete,
    /// Leave the document unchanged (placeholder for composition).
    Retain,
}

impl fmt::Display for OpKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            OpKind::Insert => "insert",
            OpKind::Delete => "delete",
            OpKind::Retain => "retain",
        })
    }
}

/// One text editing operation.
///
/// `version` is the document version the operation was authored against;
/// the hub stamps the committed version back onto outgoing operations.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Operation {
    #[serde(rename = "type")]
    pub kind: OpKind,
    pub position: usize,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub text: String,
    pub version: u64,
}

impl Operation {
    /// Insert `text` at `position`.
    pub fn insert(position: usize, text: impl Into<String>, version: u64) -> Self {
        Self {
            kind: OpKind::Insert,
            position,
            text: text.into(),
            version,
        }
    }

    /// Delete `text` expected at `position`.
    pub fn delete(position: usize, text: impl Into<String>, version: u64) -> Self {
        Self {
            kind: OpKind::Delete,
            position,
            text: text.into(),
            version,
        }
    }

    /// Keep the document unchanged.
    pub fn retain(position: usize, version: u64) -> Self {
        Self {
            kind: OpKind::Retain,
            position,
            text: String::new(),
            version,
        }
    }

    /// Number of bytes this operation affects.
    pub fn len(&self) -> usize {
        self.text.len()
    }

    /// True when this operation carries no text.
    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    /// True when applying this operation would not change any document.
    ///
    /// Transform reduces a fully-shadowed delete to empty text; such an
    /// operation must be skipped rather than applied, since validation
    /// rejects empty deletes.
    pub fn is_noop(&self) -> bool {
        match self.kind {
            OpKind::Insert => false,
            OpKind::Delete => self.text.is_empty(),
            OpKind::Retain => true,
        }
    }

    /// Check the structural invariants: insert and delete require non-empty
    /// text, retain may be empty, and the affected range must be addressable.
    pub fn validate(&self) -> OtResult<()> {
        if self.position.checked_add(self.text.len()).is_none() {
            return Err(OtError::InvalidOperation(
                "operation range overflows".to_string(),
            ));
        }
        match self.kind {
            OpKind::Insert if self.text.is_empty() => Err(OtError::InvalidOperation(
                "insert operation must have non-empty text".to_string(),
            )),
            OpKind::Delete if self.text.is_empty() => Err(OtError::InvalidOperation(
                "delete operation must have non-empty text".to_string(),
            )),
            _ => Ok(()),
        }
    }

    /// Serialize to the JSON wire form.
    pub fn to_json(&self) -> OtResult<String> {
        serde_json::to_string(self).map_err(|e| OtError::Serialization(e.to_string()))
    }

    /// Deserialize from the JSON wire form.
    pub fn from_json(json: &str) -> OtResult<Self> {
        serde_json::from_str(json).map_err(|e| OtError::Serialization(e.to_string()))
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            OpKind::Insert => write!(
                f,
                "Insert({:?} at {}, v{})",
                self.text, self.position, self.version
            ),
            OpKind::Delete => write!(
                f,
                "Delete({:?} at {}, v{})",
                self.text, self.position, self.version
            ),
            OpKind::Retain => write!(
                f,
                "Retain({} bytes at {}, v{})",
                self.text.len(),
                self.position,
                self.version
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constructors_set_all_fields() {
        let op = Operation::insert(5, "hello", 1);
        assert_eq!(op.kind, OpKind::Insert);
        assert_eq!(op.position, 5);
        assert_eq!(op.text, "hello");
        assert_eq!(op.version, 1);

        let op = Operation::delete(3, "world", 2);
        assert_eq!(op.kind, OpKind::Delete);
        assert_eq!(op.len(), 5);

        let op = Operation::retain(0, 7);
        assert_eq!(op.kind, OpKind::Retain);
        assert!(op.is_empty());
    }

    #[test]
    fn validation_rejects_empty_insert_and_delete() {
        assert!(Operation::insert(0, "test", 1).validate().is_ok());
        assert!(Operation::delete(5, "abc", 1).validate().is_ok());
        assert!(Operation::retain(0, 0).validate().is_ok());

        assert!(matches!(
            Operation::insert(0, "", 1).validate(),
            Err(OtError::InvalidOperation(_))
        ));
        assert!(matches!(
            Operation::delete(0, "", 1).validate(),
            Err(OtError::InvalidOperation(_))
        ));
        assert!(matches!(
            Operation::delete(usize::MAX, "x", 1).validate(),
            Err(OtError::InvalidOperation(_))
        ));
    }

    #[test]
    fn noop_detection() {
        assert!(Operation::retain(3, 0).is_noop());
        assert!(Operation::delete(0, "", 0).is_noop());
        assert!(!Operation::delete(0, "x", 0).is_noop());
        assert!(!Operation::insert(0, "x", 0).is_noop());
    }

    #[test]
    fn json_round_trip() {
        let op = Operation::insert(5, "hello", 3);
        let json = op.to_json().unwrap();
        assert!(json.contains(r#""type":"insert""#));
        assert!(json.contains(r#""position":5"#));

        let back = Operation::from_json(&json).unwrap();
        assert_eq!(back, op);
    }

    #[test]
    fn retain_omits_empty_text_on_the_wire() {
        let json = Operation::retain(2, 1).to_json().unwrap();
        assert!(!json.contains("text"));

        // A missing text field decodes as empty.
        let back = Operation::from_json(&json).unwrap();
        assert_eq!(back.text, "");
    }

    #[test]
    fn unknown_kind_fails_to_decode() {
        let err = Operation::from_json(r#"{"type":"replace","position":0,"version":0}"#);
        assert!(matches!(err, Err(OtError::Serialization(_))));
    }
}
