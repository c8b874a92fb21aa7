//! The single-writer session hub.
//!
//! One event-loop task owns the participant set and the document table;
//! registration, unregistration, and broadcasts arrive over bounded
//! channels and are the only way those structures change. Read-only
//! snapshots (counts, document lookup) are served under a shared-read lock
//! without touching the loop.
//!
//! A slow participant can never stall the loop: fan-out uses `try_send`,
//! and a full outbound queue schedules that participant's eviction from a
//! separate task.

pub mod message;
pub mod participant;

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, error, info, warn};

use crate::document::Document;
use crate::hub::message::{Message, MessageKind};
use crate::hub::participant::{Participant, ParticipantId};

/// Capacity of the hub's inbound command channels.
const COMMAND_BUFFER: usize = 64;

/// A registration handed to the event loop: the participant plus the write
/// end of its outbound queue.
struct Registration {
    participant: Arc<Participant>,
    outbound: mpsc::Sender<Vec<u8>>,
}

/// A frame with its originator, for sender exclusion during fan-out.
struct BroadcastMessage {
    data: Vec<u8>,
    sender: Option<ParticipantId>,
}

struct RegisteredParticipant {
    participant: Arc<Participant>,
    outbound: mpsc::Sender<Vec<u8>>,
}

struct HubReceivers {
    register_rx: mpsc::Receiver<Registration>,
    unregister_rx: mpsc::Receiver<ParticipantId>,
    broadcast_rx: mpsc::Receiver<BroadcastMessage>,
}

struct HubInner {
    register_tx: mpsc::Sender<Registration>,
    unregister_tx: mpsc::Sender<ParticipantId>,
    broadcast_tx: mpsc::Sender<BroadcastMessage>,
    shutdown_tx: broadcast::Sender<()>,
    /// Taken exactly once by [`Hub::run`].
    receivers: Mutex<Option<HubReceivers>>,
    /// Mutated only by the event loop; read-locked by snapshot APIs.
    participants: RwLock<HashMap<ParticipantId, RegisteredParticipant>>,
    /// Created on first reference, never removed during a normal run.
    documents: RwLock<HashMap<String, Arc<Document>>>,
}

/// Cheap clonable handle to the session hub.
#[derive(Clone)]
pub struct Hub {
    inner: Arc<HubInner>,
}

impl Hub {
    pub fn new() -> Self {
        let (register_tx, register_rx) = mpsc::channel(COMMAND_BUFFER);
        let (unregister_tx, unregister_rx) = mpsc::channel(COMMAND_BUFFER);
        let (broadcast_tx, broadcast_rx) = mpsc::channel(COMMAND_BUFFER);
        let (shutdown_tx, _) = broadcast::channel(1);

        Self {
            inner: Arc::new(HubInner {
                register_tx,
                unregister_tx,
                broadcast_tx,
                shutdown_tx,
                receivers: Mutex::new(Some(HubReceivers {
                    register_rx,
                    unregister_rx,
                    broadcast_rx,
                })),
                participants: RwLock::new(HashMap::new()),
                documents: RwLock::new(HashMap::new()),
            }),
        }
    }

    /// Run the event loop until [`shutdown`](Self::shutdown).
    ///
    /// Only the first call runs the loop; it is the sole mutator of the
    /// participant set and the document table.
    pub async fn run(&self) {
        let receivers = self.inner.receivers.lock().take();
        let Some(receivers) = receivers else {
            warn!("hub event loop is already running");
            return;
        };
        let HubReceivers {
            mut register_rx,
            mut unregister_rx,
            mut broadcast_rx,
        } = receivers;
        let mut shutdown_rx = self.inner.shutdown_tx.subscribe();

        loop {
            tokio::select! {
                _ = shutdown_rx.recv() => {
                    info!("hub shutting down, closing all participants");
                    self.close_all_participants();
                    return;
                }
                Some(registration) = register_rx.recv() => self.handle_register(registration),
                Some(id) = unregister_rx.recv() => self.handle_unregister(id),
                Some(broadcast) = broadcast_rx.recv() => self.handle_broadcast(broadcast),
            }
        }
    }

    /// Register a participant, handing the hub the write end of its
    /// outbound queue. Blocks until the event loop accepts the message.
    pub async fn register(&self, participant: Arc<Participant>, outbound: mpsc::Sender<Vec<u8>>) {
        let registration = Registration {
            participant,
            outbound,
        };
        if self.inner.register_tx.send(registration).await.is_err() {
            debug!("register ignored: hub is shut down");
        }
    }

    /// Remove a participant and close its outbound queue. Unregistering a
    /// participant that is already gone is a no-op.
    pub async fn unregister(&self, id: ParticipantId) {
        if self.inner.unregister_tx.send(id).await.is_err() {
            debug!("unregister ignored: hub is shut down");
        }
    }

    /// Route a frame. `sender` is excluded from the resulting fan-out;
    /// system-originated frames pass `None` and reach every participant on
    /// the document.
    pub async fn broadcast(&self, data: Vec<u8>, sender: Option<ParticipantId>) {
        let broadcast = BroadcastMessage { data, sender };
        if self.inner.broadcast_tx.send(broadcast).await.is_err() {
            debug!("broadcast dropped: hub is shut down");
        }
    }

    /// Request orderly termination of the event loop.
    pub fn shutdown(&self) {
        let _ = self.inner.shutdown_tx.send(());
    }

    /// Number of connected participants.
    pub fn participant_count(&self) -> usize {
        self.inner.participants.read().len()
    }

    /// Number of participants bound to `document_id`.
    pub fn participant_count_for_document(&self, document_id: &str) -> usize {
        self.inner
            .participants
            .read()
            .values()
            .filter(|entry| entry.participant.document_id() == document_id)
            .count()
    }

    /// Look up a document, if it has been referenced before.
    pub fn get_document(&self, document_id: &str) -> Option<Arc<Document>> {
        self.inner.documents.read().get(document_id).cloned()
    }

    /// Fetch a document, creating it on first reference.
    pub fn get_or_create_document(&self, document_id: &str) -> Arc<Document> {
        if let Some(doc) = self.inner.documents.read().get(document_id) {
            return Arc::clone(doc);
        }
        let mut documents = self.inner.documents.write();
        Arc::clone(documents.entry(document_id.to_string()).or_insert_with(|| {
            info!(document_id, "created new document");
            Arc::new(Document::new())
        }))
    }

    fn handle_register(&self, registration: Registration) {
        let id = registration.participant.id();
        let total = {
            let mut participants = self.inner.participants.write();
            participants.insert(
                id,
                RegisteredParticipant {
                    participant: registration.participant,
                    outbound: registration.outbound,
                },
            );
            participants.len()
        };
        debug!(%id, total, "participant registered");
        self.broadcast_user_counts();
    }

    fn handle_unregister(&self, id: ParticipantId) {
        let removed = self.inner.participants.write().remove(&id);
        if removed.is_some() {
            // Dropping the entry drops the hub's write end of the outbound
            // queue; the write pump sees the close and finishes.
            debug!(%id, total = self.participant_count(), "participant unregistered");
        }
        self.broadcast_user_counts();
    }

    fn handle_broadcast(&self, broadcast: BroadcastMessage) {
        let mut msg = match Message::from_bytes(&broadcast.data) {
            Ok(msg) => msg,
            Err(_) => {
                debug!("undecodable frame, fanning out to all participants");
                self.fan_out_all(&broadcast.data, broadcast.sender);
                return;
            }
        };

        let Some(document_id) = msg.route_document_id().map(str::to_string) else {
            debug!("no document id in message, fanning out to all participants");
            self.fan_out_all(&broadcast.data, broadcast.sender);
            return;
        };

        let doc = self.get_or_create_document(&document_id);

        match msg.kind {
            MessageKind::Operation => match msg.operation.take() {
                Some(mut op) => match doc.apply_operation(&op) {
                    Ok((content, version)) => {
                        debug!(
                            %document_id,
                            version,
                            length = content.len(),
                            "operation applied"
                        );
                        op.version = version;
                        msg.operation = Some(op);
                        match msg.to_bytes() {
                            Ok(bytes) => {
                                self.fan_out_document(&document_id, &bytes, broadcast.sender)
                            }
                            Err(e) => error!("failed to re-serialize operation message: {}", e),
                        }
                    }
                    Err(e) => warn!(%document_id, "operation rejected: {}", e),
                },
                None => self.fan_out_document(&document_id, &broadcast.data, broadcast.sender),
            },
            MessageKind::Content => match msg.content.as_deref() {
                Some(content) if !content.is_empty() => {
                    doc.set_content(content);
                    match msg.to_bytes() {
                        Ok(bytes) => self.fan_out_document(&document_id, &bytes, broadcast.sender),
                        Err(e) => error!("failed to re-serialize content message: {}", e),
                    }
                }
                _ => self.fan_out_document(&document_id, &broadcast.data, broadcast.sender),
            },
            MessageKind::UserCount | MessageKind::Unknown => {
                self.fan_out_document(&document_id, &broadcast.data, broadcast.sender)
            }
        }
    }

    fn fan_out_all(&self, data: &[u8], exclude: Option<ParticipantId>) {
        let participants = self.inner.participants.read();
        for (id, entry) in participants.iter() {
            if Some(*id) == exclude {
                continue;
            }
            self.push_to(entry, data);
        }
    }

    fn fan_out_document(&self, document_id: &str, data: &[u8], exclude: Option<ParticipantId>) {
        let participants = self.inner.participants.read();
        let mut sent = 0;
        for (id, entry) in participants.iter() {
            if entry.participant.document_id() != document_id || Some(*id) == exclude {
                continue;
            }
            if self.push_to(entry, data) {
                sent += 1;
            }
        }
        debug!(document_id, sent, "fanned out message");
    }

    /// Push one frame into a participant's outbound queue. A full queue
    /// schedules the participant's eviction from a separate task, so the
    /// event loop never blocks and never mutates the set mid-iteration.
    fn push_to(&self, entry: &RegisteredParticipant, data: &[u8]) -> bool {
        match entry.outbound.try_send(data.to_vec()) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                let id = entry.participant.id();
                warn!(%id, "outbound queue full, scheduling removal");
                let hub = self.clone();
                tokio::spawn(async move {
                    hub.unregister(id).await;
                });
                false
            }
            // Already being torn down; the unregister is in flight.
            Err(TrySendError::Closed(_)) => false,
        }
    }

    /// Recompute per-document participant counts and push a `user_count`
    /// message to every participant of each populated document.
    fn broadcast_user_counts(&self) {
        let participants = self.inner.participants.read();

        let mut counts: HashMap<&str, usize> = HashMap::new();
        for entry in participants.values() {
            *counts.entry(entry.participant.document_id()).or_default() += 1;
        }

        for (document_id, count) in counts {
            let bytes = match Message::user_count(document_id, count).to_bytes() {
                Ok(bytes) => bytes,
                Err(e) => {
                    error!("failed to serialize user count message: {}", e);
                    continue;
                }
            };
            for entry in participants.values() {
                if entry.participant.document_id() == document_id {
                    self.push_to(entry, &bytes);
                }
            }
            debug!(document_id, count, "broadcasted user count");
        }
    }

    /// Drop every registration, closing every outbound queue. Write pumps
    /// send a close frame to their peer and exit, which closes the
    /// transports; readers then observe the closed transport and exit.
    fn close_all_participants(&self) {
        let mut participants = self.inner.participants.write();
        let total = participants.len();
        participants.clear();
        info!(total, "all participants closed");
    }
}

impl Default for Hub {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn documents_are_created_once_and_shared() {
        let hub = Hub::new();
        assert!(hub.get_document("doc-1").is_none());

        let first = hub.get_or_create_document("doc-1");
        let second = hub.get_or_create_document("doc-1");
        assert!(Arc::ptr_eq(&first, &second));
        assert!(hub.get_document("doc-1").is_some());
    }

    #[test]
    fn counts_start_at_zero() {
        let hub = Hub::new();
        assert_eq!(hub.participant_count(), 0);
        assert_eq!(hub.participant_count_for_document("doc-1"), 0);
    }
}
