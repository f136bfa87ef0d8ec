//! In-process transport. The hub side plays the service: it pushes frames
//! to connected clients (optionally only to a room), drops connections and
//! refuses opens on demand.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use futures::channel::mpsc;
use futures::StreamExt;
use log::debug;
use serde_json::Value;

use super::{ChannelTransport, Frame, FrameSink, Link, JOIN_BOARD, LEAVE_BOARD};
use crate::error::{ChannelError, Result};

struct Connection {
    tx: mpsc::UnboundedSender<Frame>,
    rooms: BTreeSet<String>,
}

#[derive(Default)]
struct Hub {
    next_id: u64,
    connections: BTreeMap<u64, Connection>,
    sent: Vec<Frame>,
    credentials: Vec<String>,
    failing_opens: u32,
}

#[derive(Clone, Default)]
pub struct MemoryTransport {
    hub: Arc<Mutex<Hub>>,
}

impl std::fmt::Debug for MemoryTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryTransport")
            .field("connections", &self.connection_count())
            .finish()
    }
}

impl MemoryTransport {
    pub fn new() -> Self {
        Self::default()
    }

    fn hub(&self) -> MutexGuard<'_, Hub> {
        self.hub.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Refuses the next `count` opens.
    pub fn fail_next_opens(&self, count: u32) {
        self.hub().failing_opens = count;
    }

    /// Sends a frame to every connection.
    pub fn emit(&self, event: &str, payload: Value) {
        let frame = Frame::new(event, payload);
        let mut hub = self.hub();
        hub.connections
            .retain(|_, connection| connection.tx.unbounded_send(frame.clone()).is_ok());
    }

    /// Sends a frame to the connections that joined `board_id`.
    pub fn emit_to_room(&self, board_id: &str, event: &str, payload: Value) {
        let frame = Frame::new(event, payload);
        let mut hub = self.hub();
        hub.connections.retain(|_, connection| {
            !connection.rooms.contains(board_id)
                || connection.tx.unbounded_send(frame.clone()).is_ok()
        });
    }

    /// Closes every open connection, as a network drop would.
    pub fn drop_connections(&self) {
        self.hub().connections.clear();
    }

    pub fn connection_count(&self) -> usize {
        self.hub().connections.len()
    }

    /// Opens attempted so far, refused ones included.
    pub fn open_count(&self) -> usize {
        self.hub().credentials.len()
    }

    pub fn credentials(&self) -> Vec<String> {
        self.hub().credentials.clone()
    }

    /// Frames received from clients, in arrival order.
    pub fn sent(&self) -> Vec<Frame> {
        self.hub().sent.clone()
    }

    /// Rooms joined by any live connection.
    pub fn rooms(&self) -> BTreeSet<String> {
        self.hub()
            .connections
            .values()
            .flat_map(|connection| connection.rooms.iter().cloned())
            .collect()
    }
}

#[async_trait]
impl ChannelTransport for MemoryTransport {
    async fn open(&self, credential: &str) -> Result<Link> {
        let mut hub = self.hub();
        hub.credentials.push(credential.to_string());
        if hub.failing_opens > 0 {
            hub.failing_opens -= 1;
            return Err(ChannelError::transport("connection refused"));
        }

        let (tx, rx) = mpsc::unbounded();
        hub.next_id += 1;
        let id = hub.next_id;
        hub.connections.insert(
            id,
            Connection {
                tx,
                rooms: BTreeSet::new(),
            },
        );
        debug!("Memory transport opened connection {}", id);

        Ok(Link {
            inbound: rx.boxed(),
            outbound: Box::new(MemorySink {
                hub: Arc::clone(&self.hub),
                id,
            }),
        })
    }
}

struct MemorySink {
    hub: Arc<Mutex<Hub>>,
    id: u64,
}

#[async_trait]
impl FrameSink for MemorySink {
    async fn send(&self, frame: Frame) -> Result<()> {
        let mut hub = self.hub.lock().unwrap_or_else(PoisonError::into_inner);
        let connection = hub
            .connections
            .get_mut(&self.id)
            .ok_or(ChannelError::Closed)?;
        if let Some(board_id) = frame.room() {
            match frame.event.as_str() {
                JOIN_BOARD => {
                    connection.rooms.insert(board_id.to_string());
                }
                LEAVE_BOARD => {
                    connection.rooms.remove(board_id);
                }
                _ => {}
            }
        }
        hub.sent.push(frame);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn room_emits_reach_only_members() {
        let transport = MemoryTransport::new();
        let mut member = transport.open("token").await.expect("open");
        let mut outsider = transport.open("token").await.expect("open");
        member.outbound.send(Frame::join("b1")).await.expect("join");

        transport.emit_to_room("b1", "card_created", json!({"id": "c1"}));
        transport.emit("new_notification", json!({"id": "n1"}));
        transport.drop_connections();

        let member_frames: Vec<Frame> = member.inbound.by_ref().collect().await;
        let outsider_frames: Vec<Frame> = outsider.inbound.by_ref().collect().await;
        assert_eq!(member_frames.len(), 2);
        assert_eq!(outsider_frames.len(), 1);
        assert_eq!(outsider_frames[0].event, "new_notification");
    }

    #[tokio::test]
    async fn refused_opens_are_counted() {
        let transport = MemoryTransport::new();
        transport.fail_next_opens(1);

        assert!(transport.open("a").await.is_err());
        let link = transport.open("b").await.expect("second open");

        assert_eq!(transport.credentials(), vec!["a".to_string(), "b".to_string()]);
        assert_eq!(transport.connection_count(), 1);
        drop(link);
    }

    #[tokio::test]
    async fn sending_on_a_dropped_connection_fails() {
        let transport = MemoryTransport::new();
        let link = transport.open("token").await.expect("open");
        transport.drop_connections();

        let err = link
            .outbound
            .send(Frame::join("b1"))
            .await
            .expect_err("closed");
        assert!(matches!(err, ChannelError::Closed));
    }
}
