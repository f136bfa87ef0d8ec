//! The real-time channel: one supervised connection per adapter.
//!
//! `connect` spawns a supervisor task that owns the transport link. It
//! broadcasts inbound frames and status transitions to every subscription,
//! forwards outbound frames, and
//! when the link drops it reconnects with exponential backoff plus jitter,
//! joining every recorded room again. Each successful (re)connect bumps the
//! connection generation. Once the reconnect budget is spent the channel
//! reports [`ChannelStatus::Unavailable`] and the supervisor exits.

use std::collections::{BTreeSet, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use futures::StreamExt;
use log::{debug, info, warn};
use serde::Serialize;
use serde_json::Value;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

use taskboard_core::bus::{EventBus, Listener, Subscription};
use taskboard_core::sync::backoff_with_jitter;

use crate::config::ChannelConfig;
use crate::error::{ChannelError, Result};
use crate::transport::{ChannelTransport, Frame, Link};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "status")]
pub enum ChannelStatus {
    Disconnected,
    Connecting,
    Connected { generation: u64 },
    Reconnecting { attempt: u32 },
    /// The reconnect budget is spent; consumers should poll instead.
    Unavailable,
}

impl ChannelStatus {
    pub fn is_connected(&self) -> bool {
        matches!(self, ChannelStatus::Connected { .. })
    }
}

#[derive(Debug)]
enum Command {
    Send(Frame),
    Join(String),
    Leave(String),
    Disconnect,
}

struct Running {
    commands: mpsc::UnboundedSender<Command>,
    handle: JoinHandle<()>,
}

struct Shared {
    config: ChannelConfig,
    transport: Arc<dyn ChannelTransport>,
    frames: EventBus<Frame>,
    statuses: EventBus<ChannelStatus>,
    status: watch::Sender<ChannelStatus>,
    generation: AtomicU64,
    rooms: Mutex<BTreeSet<String>>,
}

impl Shared {
    /// Transitions go out on the bus before the watch moves, so anyone who
    /// saw the watch change can already drain the transition.
    fn set_status(&self, status: ChannelStatus) {
        let previous = *self.status.borrow();
        if previous == status {
            return;
        }
        debug!("[Channel] {:?} -> {:?}", previous, status);
        self.statuses.publish(status);
        self.status.send_replace(status);
    }

    fn rooms(&self) -> MutexGuard<'_, BTreeSet<String>> {
        self.rooms.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Real-time channel adapter.
pub struct RealtimeChannel {
    shared: Arc<Shared>,
    running: Mutex<Option<Running>>,
}

impl std::fmt::Debug for RealtimeChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RealtimeChannel")
            .field("status", &self.status())
            .field("generation", &self.generation())
            .finish()
    }
}

impl RealtimeChannel {
    pub fn new(config: ChannelConfig, transport: Arc<dyn ChannelTransport>) -> Self {
        let (status, _) = watch::channel(ChannelStatus::Disconnected);
        Self {
            shared: Arc::new(Shared {
                config,
                transport,
                frames: EventBus::new(),
                statuses: EventBus::new(),
                status,
                generation: AtomicU64::new(0),
                rooms: Mutex::new(BTreeSet::new()),
            }),
            running: Mutex::new(None),
        }
    }

    fn running(&self) -> MutexGuard<'_, Option<Running>> {
        self.running.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn config(&self) -> &ChannelConfig {
        &self.shared.config
    }

    pub fn status(&self) -> ChannelStatus {
        *self.shared.status.borrow()
    }

    /// Watch handle for awaiting status changes.
    pub fn watch_status(&self) -> watch::Receiver<ChannelStatus> {
        self.shared.status.subscribe()
    }

    /// Successful connections so far. Bumped on every (re)connect.
    pub fn generation(&self) -> u64 {
        self.shared.generation.load(Ordering::SeqCst)
    }

    pub fn rooms(&self) -> Vec<String> {
        self.shared.rooms().iter().cloned().collect()
    }

    /// Starts the connection supervisor. Does nothing while a supervisor is
    /// already running. Must be called inside a tokio runtime.
    pub fn connect(&self, credential: impl Into<String>) {
        let mut running = self.running();
        if running
            .as_ref()
            .is_some_and(|current| !current.handle.is_finished())
        {
            debug!("[Channel] connect ignored, session already live");
            return;
        }

        let (commands, inbox) = mpsc::unbounded_channel();
        let supervisor = Supervisor {
            shared: Arc::clone(&self.shared),
            credential: credential.into(),
            inbox,
            pending: VecDeque::new(),
        };
        self.shared.set_status(ChannelStatus::Connecting);
        let handle = tokio::spawn(supervisor.run());
        *running = Some(Running { commands, handle });
    }

    /// Closes the connection and waits for the supervisor to stop. Rooms are
    /// remembered for the next `connect`.
    pub async fn disconnect(&self) {
        let running = self.running().take();
        let Some(running) = running else {
            return;
        };
        let _ = running.commands.send(Command::Disconnect);
        if let Err(err) = running.handle.await {
            warn!("[Channel] supervisor ended abnormally: {}", err);
        }
        self.shared.set_status(ChannelStatus::Disconnected);
    }

    fn command(&self, command: Command) -> Result<()> {
        let running = self.running();
        let Some(current) = running.as_ref() else {
            return Err(ChannelError::NotConnected);
        };
        current
            .commands
            .send(command)
            .map_err(|_| ChannelError::NotConnected)
    }

    /// Every inbound frame from now on.
    pub fn frames(&self) -> Subscription<Frame> {
        self.shared.frames.subscribe()
    }

    /// Every status transition from now on, in order.
    pub fn statuses(&self) -> Subscription<ChannelStatus> {
        self.shared.statuses.subscribe()
    }

    /// Calls `handler` with the payload of every `event` frame. Must be called
    /// inside a tokio runtime.
    pub fn subscribe<F>(&self, event: &str, handler: F) -> Listener
    where
        F: Fn(&Value) + Send + Sync + 'static,
    {
        let event = event.to_string();
        let mut frames = self.frames();
        Listener::spawn(async move {
            while let Some(frame) = frames.next().await {
                if frame.event == event {
                    handler(&frame.payload);
                }
            }
        })
    }

    /// Calls `handler` with every inbound frame.
    pub fn subscribe_all<F>(&self, handler: F) -> Listener
    where
        F: Fn(&Frame) + Send + Sync + 'static,
    {
        self.shared.frames.listen(handler)
    }

    pub fn subscribe_status<F>(&self, handler: F) -> Listener
    where
        F: Fn(&ChannelStatus) + Send + Sync + 'static,
    {
        self.shared.statuses.listen(handler)
    }

    /// Queues a frame for the service. Frames queued while reconnecting go
    /// out once the link is back.
    pub fn publish(&self, event: &str, payload: Value) -> Result<()> {
        self.command(Command::Send(Frame::new(event, payload)))
    }

    /// Records the room and joins it now if connected. Recorded rooms are
    /// joined again after every reconnect.
    pub fn join_room(&self, board_id: &str) {
        if !self.shared.rooms().insert(board_id.to_string()) {
            return;
        }
        if self.command(Command::Join(board_id.to_string())).is_err() {
            debug!("[Channel] room {} recorded for the next connection", board_id);
        }
    }

    pub fn leave_room(&self, board_id: &str) {
        if !self.shared.rooms().remove(board_id) {
            return;
        }
        let _ = self.command(Command::Leave(board_id.to_string()));
    }
}

impl Drop for RealtimeChannel {
    fn drop(&mut self) {
        if let Some(running) = self.running().take() {
            running.handle.abort();
        }
    }
}

enum LinkEnd {
    Lost,
    Disconnect,
}

struct Supervisor {
    shared: Arc<Shared>,
    credential: String,
    inbox: mpsc::UnboundedReceiver<Command>,
    /// Frames published while no link was up.
    pending: VecDeque<Frame>,
}

impl Supervisor {
    async fn run(mut self) {
        let config = self.shared.config.clone();
        let mut failures: u32 = 0;

        loop {
            match self.shared.transport.open(&self.credential).await {
                Ok(link) => {
                    failures = 0;
                    let generation = self.shared.generation.fetch_add(1, Ordering::SeqCst) + 1;
                    info!("[Channel] connected (generation {})", generation);
                    match self.pump(link, generation).await {
                        LinkEnd::Disconnect => {
                            info!("[Channel] disconnected");
                            self.shared.set_status(ChannelStatus::Disconnected);
                            return;
                        }
                        LinkEnd::Lost => warn!("[Channel] connection lost"),
                    }
                }
                Err(err) => warn!("[Channel] connect attempt failed: {}", err),
            }

            failures += 1;
            if failures > config.max_reconnect_attempts {
                warn!(
                    "[Channel] giving up after {} reconnect attempts",
                    config.max_reconnect_attempts
                );
                self.shared.set_status(ChannelStatus::Unavailable);
                return;
            }

            self.shared
                .set_status(ChannelStatus::Reconnecting { attempt: failures });
            let delay = backoff_with_jitter(
                failures - 1,
                config.reconnect_base_delay,
                config.reconnect_max_delay,
            );
            warn!("[Channel] reconnect attempt {} in {:?}", failures, delay);
            if !self.wait_offline(delay).await {
                self.shared.set_status(ChannelStatus::Disconnected);
                return;
            }
        }
    }

    /// Rejoins rooms, flushes queued frames, then relays until the link ends.
    async fn pump(&mut self, link: Link, generation: u64) -> LinkEnd {
        let Link {
            mut inbound,
            outbound,
        } = link;

        let rooms: Vec<String> = self.shared.rooms().iter().cloned().collect();
        for room in rooms {
            if let Err(err) = outbound.send(Frame::join(&room)).await {
                warn!("[Channel] rejoining {} failed: {}", room, err);
                return LinkEnd::Lost;
            }
        }
        while let Some(frame) = self.pending.pop_front() {
            if let Err(err) = outbound.send(frame.clone()).await {
                warn!("[Channel] flushing `{}` failed: {}", frame.event, err);
                self.pending.push_front(frame);
                return LinkEnd::Lost;
            }
        }
        self.shared.set_status(ChannelStatus::Connected { generation });

        loop {
            tokio::select! {
                frame = inbound.next() => match frame {
                    Some(frame) => {
                        debug!("[Channel] <- {}", frame.event);
                        self.shared.frames.publish(frame);
                    }
                    None => return LinkEnd::Lost,
                },
                command = self.inbox.recv() => {
                    let frame = match command {
                        Some(Command::Send(frame)) => frame,
                        Some(Command::Join(board_id)) => Frame::join(&board_id),
                        Some(Command::Leave(board_id)) => Frame::leave(&board_id),
                        Some(Command::Disconnect) | None => return LinkEnd::Disconnect,
                    };
                    if let Err(err) = outbound.send(frame.clone()).await {
                        warn!("[Channel] sending `{}` failed: {}", frame.event, err);
                        if frame.room().is_none() {
                            self.pending.push_back(frame);
                        }
                        return LinkEnd::Lost;
                    }
                }
            }
        }
    }

    /// Sleeps through a backoff delay while still taking commands. Returns
    /// false if asked to disconnect.
    async fn wait_offline(&mut self, delay: std::time::Duration) -> bool {
        let sleep = tokio::time::sleep(delay);
        tokio::pin!(sleep);
        loop {
            tokio::select! {
                _ = &mut sleep => return true,
                command = self.inbox.recv() => match command {
                    Some(Command::Send(frame)) => self.pending.push_back(frame),
                    // Rooms are joined from the recorded set on reconnect.
                    Some(Command::Join(_)) | Some(Command::Leave(_)) => {}
                    Some(Command::Disconnect) | None => return false,
                },
            }
        }
    }
}
