//! Per-connection participant identity and transport tuning constants.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Maximum time allowed for a single frame write.
pub const WRITE_WAIT: Duration = Duration::from_secs(10);

/// Idle read deadline; some frame (a pong counts) must arrive within this
/// window or the connection is considered dead.
pub const PONG_WAIT: Duration = Duration::from_secs(60);

/// Liveness ping interval. Must stay under [`PONG_WAIT`].
pub const PING_PERIOD: Duration = Duration::from_secs(PONG_WAIT.as_secs() * 9 / 10);

/// Maximum inbound frame size in bytes (512 KiB).
pub const MAX_FRAME_SIZE: usize = 512 * 1024;

/// Capacity of each participant's outbound queue. The message after a full
/// queue triggers that participant's eviction.
pub const OUTBOUND_BUFFER: usize = 256;

/// Process-unique participant identifier.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ParticipantId(pub u64);

impl ParticipantId {
    /// Generate a new unique participant ID.
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(1);
        Self(COUNTER.fetch_add(1, Ordering::SeqCst))
    }
}

impl Default for ParticipantId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ParticipantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "participant-{}", self.0)
    }
}

/// One live connection, bound to a single document for its whole lifetime.
///
/// The participant itself is only identity. The hub holds the write end of
/// the participant's outbound queue (and closes it on unregister); the write
/// pump holds the read end; the transport lives with the pumps.
#[derive(Debug)]
pub struct Participant {
    id: ParticipantId,
    document_id: String,
}

impl Participant {
    /// Create a participant bound to `document_id`.
    pub fn new(document_id: impl Into<String>) -> Self {
        Self {
            id: ParticipantId::new(),
            document_id: document_id.into(),
        }
    }

    pub fn id(&self) -> ParticipantId {
        self.id
    }

    pub fn document_id(&self) -> &str {
        &self.document_id
    }
}
