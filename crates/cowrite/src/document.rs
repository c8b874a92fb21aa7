//! Shared per-document state.

use std::time::SystemTime;

use parking_lot::RwLock;

use crate::apply::apply;
use crate::error::OtResult;
use crate::operation::Operation;

/// Thread-safe authoritative state for one logical document: the full text,
/// a strictly monotone version counter, and the time of the last mutation.
///
/// Readers always observe a matched `(content, version)` pair. Both
/// mutations go through the exclusive lock and bump the version by exactly
/// one on success, so after N committed mutations the version is N.
#[derive(Debug)]
pub struct Document {
    inner: RwLock<DocumentInner>,
}

#[derive(Debug)]
struct DocumentInner {
    content: String,
    version: u64,
    last_modified: SystemTime,
}

/// Point-in-time snapshot of a document's metadata.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DocumentStats {
    pub version: u64,
    pub last_modified: SystemTime,
    /// Content length in bytes.
    pub length: usize,
}

impl Document {
    /// Create an empty document at version 0.
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(DocumentInner {
                content: String::new(),
                version: 0,
                last_modified: SystemTime::now(),
            }),
        }
    }

    /// Current content.
    pub fn content(&self) -> String {
        self.inner.read().content.clone()
    }

    /// Current version.
    pub fn version(&self) -> u64 {
        self.inner.read().version
    }

    /// Content and version as one consistent snapshot.
    pub fn content_and_version(&self) -> (String, u64) {
        let inner = self.inner.read();
        (inner.content.clone(), inner.version)
    }

    /// Metadata snapshot.
    pub fn stats(&self) -> DocumentStats {
        let inner = self.inner.read();
        DocumentStats {
            version: inner.version,
            last_modified: inner.last_modified,
            length: inner.content.len(),
        }
    }

    /// Replace the entire content, bumping the version.
    pub fn set_content(&self, content: impl Into<String>) {
        let mut inner = self.inner.write();
        inner.content = content.into();
        inner.version += 1;
        inner.last_modified = SystemTime::now();
    }

    /// Apply one operation against the current content.
    ///
    /// On success the new content and bumped version are committed
    /// atomically and returned; on error the document is unchanged.
    pub fn apply_operation(&self, op: &Operation) -> OtResult<(String, u64)> {
        let mut inner = self.inner.write();
        let new_content = apply(&inner.content, op)?;
        inner.content = new_content.clone();
        inner.version += 1;
        inner.last_modified = SystemTime::now();
        Ok((new_content, inner.version))
    }
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}
