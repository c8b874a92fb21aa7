//! Per-connection read and write pumps.
//!
//! Each upgraded socket gets exactly two tasks: the read pump forwards
//! inbound frames to the hub, the write pump drains the participant's
//! outbound queue and keeps the connection alive with periodic pings. A
//! slow peer therefore blocks only its own write pump, never the hub.

use std::sync::Arc;

use axum::extract::ws::{Message as WsMessage, WebSocket};
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio::time::{interval_at, timeout, Instant};
use tracing::debug;

use crate::hub::participant::{
    Participant, ParticipantId, OUTBOUND_BUFFER, PING_PERIOD, PONG_WAIT, WRITE_WAIT,
};
use crate::hub::Hub;

/// Drive one upgraded connection.
///
/// Registers a participant with the hub, runs the read pump on this task
/// and the write pump on a sibling, and unregisters when the reader stops.
/// The write pump finishes on its own once the hub drops the write end of
/// the outbound queue.
pub(crate) async fn handle_socket(socket: WebSocket, hub: Hub, document_id: String) {
    let (sink, stream) = socket.split();
    let (outbound_tx, outbound_rx) = mpsc::channel(OUTBOUND_BUFFER);

    let participant = Arc::new(Participant::new(document_id));
    let id = participant.id();
    debug!(%id, document_id = participant.document_id(), "connection established");

    hub.register(participant, outbound_tx).await;
    let writer = tokio::spawn(write_pump(sink, outbound_rx));

    read_pump(&hub, id, stream).await;

    hub.unregister(id).await;
    let _ = writer.await;
    debug!(%id, "connection closed");
}

/// Forward inbound frames to the hub until the connection goes away or the
/// idle deadline passes.
async fn read_pump(hub: &Hub, id: ParticipantId, mut stream: SplitStream<WebSocket>) {
    loop {
        let frame = match timeout(PONG_WAIT, stream.next()).await {
            Err(_) => {
                debug!(%id, "read deadline exceeded");
                return;
            }
            Ok(None) => return,
            Ok(Some(Err(e))) => {
                debug!(%id, "read error: {}", e);
                return;
            }
            Ok(Some(Ok(frame))) => frame,
        };

        match frame {
            WsMessage::Text(text) => hub.broadcast(text.into_bytes(), Some(id)).await,
            WsMessage::Binary(data) => hub.broadcast(data, Some(id)).await,
            // Receiving anything, pongs included, already reset the idle
            // deadline above.
            WsMessage::Ping(_) | WsMessage::Pong(_) => {}
            WsMessage::Close(_) => return,
        }
    }
}

/// Drain the outbound queue to the socket, one message per frame, pinging
/// every [`PING_PERIOD`]. Exits after a close frame when the hub closes the
/// queue, or immediately on the first failed write.
async fn write_pump(mut sink: SplitSink<WebSocket, WsMessage>, mut outbound: mpsc::Receiver<Vec<u8>>) {
    let mut ping = interval_at(Instant::now() + PING_PERIOD, PING_PERIOD);

    loop {
        tokio::select! {
            received = outbound.recv() => match received {
                Some(data) => {
                    // Structured messages and relayed text frames are UTF-8;
                    // anything else goes out as a binary frame unchanged.
                    let frame = match String::from_utf8(data) {
                        Ok(text) => WsMessage::Text(text),
                        Err(raw) => WsMessage::Binary(raw.into_bytes()),
                    };
                    if !send_frame(&mut sink, frame).await {
                        return;
                    }
                }
                None => {
                    // The hub closed the queue: say goodbye and stop.
                    let _ = send_frame(&mut sink, WsMessage::Close(None)).await;
                    return;
                }
            },
            _ = ping.tick() => {
                if !send_frame(&mut sink, WsMessage::Ping(Vec::new())).await {
                    return;
                }
            }
        }
    }
}

async fn send_frame(sink: &mut SplitSink<WebSocket, WsMessage>, frame: WsMessage) -> bool {
    match timeout(WRITE_WAIT, sink.send(frame)).await {
        Ok(Ok(())) => true,
        Ok(Err(e)) => {
            debug!("write error: {}", e);
            false
        }
        Err(_) => {
            debug!("write deadline exceeded");
            false
        }
    }
}
