//! Wire envelope for hub traffic.
//!
//! Every frame is a JSON object tagged by `type`. Bytes that do not decode
//! at all are the legacy plain-text path: the hub treats them as opaque
//! content and fans the raw bytes out document-agnostically.

use serde::{Deserialize, Serialize};

use crate::error::{OtError, OtResult};
use crate::operation::Operation;

/// Discriminant of a [`Message`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    /// Full document text; initial sync and the legacy path.
    Content,
    /// One OT operation; the normal edit path.
    Operation,
    /// Server-originated per-document participant count.
    UserCount,
    /// Any unrecognized tag. The hub routes these raw.
    #[serde(other)]
    Unknown,
}

/// The JSON envelope exchanged over a participant's transport.
///
/// Which optional fields are meaningful depends on `kind`; `document_id`
/// may accompany any kind and is what the hub routes on.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Message {
    #[serde(rename = "type")]
    pub kind: MessageKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub document_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operation: Option<Operation>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_count: Option<usize>,
}

impl Message {
    /// Full-content message.
    pub fn content(content: impl Into<String>) -> Self {
        Self {
            kind: MessageKind::Content,
            document_id: None,
            content: Some(content.into()),
            operation: None,
            user_count: None,
        }
    }

    /// Edit message carrying one operation.
    pub fn operation(operation: Operation) -> Self {
        Self {
            kind: MessageKind::Operation,
            document_id: None,
            content: None,
            operation: Some(operation),
            user_count: None,
        }
    }

    /// System message announcing a document's participant count.
    pub fn user_count(document_id: impl Into<String>, count: usize) -> Self {
        Self {
            kind: MessageKind::UserCount,
            document_id: Some(document_id.into()),
            content: None,
            operation: None,
            user_count: Some(count),
        }
    }

    /// Attach the document this message routes on.
    pub fn with_document_id(mut self, document_id: impl Into<String>) -> Self {
        self.document_id = Some(document_id.into());
        self
    }

    /// The document this message routes on, if any. An empty string counts
    /// as absent, matching the wire format's omitted-field convention.
    pub fn route_document_id(&self) -> Option<&str> {
        self.document_id.as_deref().filter(|id| !id.is_empty())
    }

    /// Serialize to JSON bytes.
    pub fn to_bytes(&self) -> OtResult<Vec<u8>> {
        serde_json::to_vec(self).map_err(|e| OtError::Serialization(e.to_string()))
    }

    /// Serialize to a JSON string.
    pub fn to_json(&self) -> OtResult<String> {
        serde_json::to_string(self).map_err(|e| OtError::Serialization(e.to_string()))
    }

    /// Deserialize from JSON bytes. Failure means the bytes are legacy
    /// plain text (or garbage) and should be routed raw.
    pub fn from_bytes(data: &[u8]) -> OtResult<Self> {
        serde_json::from_slice(data).map_err(|e| OtError::Serialization(e.to_string()))
    }
}
