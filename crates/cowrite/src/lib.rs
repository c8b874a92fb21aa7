//! Real-time collaborative text editing server.
//!
//! Multiple participants connected to the same logical document see each
//! other's edits with low latency. Concurrent edits issued against the same
//! document version are resolved by operational transformation (OT) so that
//! every participant converges to the same final text.
//!
//! # Modules
//!
//! - `operation`: the immutable edit value (insert, delete, retain)
//! - `apply`: pure application of operations to document text
//! - `transform`: pairwise OT, the algorithmic heart
//! - `document`: thread-safe per-document `(content, version)` state
//! - `hub`: the single-writer coordinator that owns participants and
//!   documents, serializes edits, and fans out messages
//! - `server`: the HTTP/WebSocket transport (behind the `server` feature,
//!   enabled by default)
//!
//! # Example
//!
//! ```
//! use cowrite::{apply, transform, Operation};
//!
//! // Two participants insert at the same position of "ac", concurrently.
//! let a = Operation::insert(1, "X", 0);
//! let b = Operation::insert(1, "Y", 0);
//!
//! let (a_t, b_t) = transform(&a, &b).unwrap();
//!
//! // Whichever edit is applied first, the result is the same.
//! let one = apply(&apply("ac", &a).unwrap(), &b_t).unwrap();
//! let other = apply(&apply("ac", &b).unwrap(), &a_t).unwrap();
//! assert_eq!(one, other);
//! assert_eq!(one, "aXYc");
//! ```

pub mod apply;
pub mod document;
pub mod error;
pub mod hub;
pub mod operation;
pub mod transform;

#[cfg(feature = "server")]
pub mod server;

// Re-export commonly used types
pub use apply::{apply, apply_all};
pub use document::{Document, DocumentStats};
pub use error::{OtError, OtResult};
pub use hub::message::{Message, MessageKind};
pub use hub::participant::{Participant, ParticipantId};
pub use hub::Hub;
pub use operation::{OpKind, Operation};
pub use transform::transform;
