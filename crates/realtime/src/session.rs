//! Keeps one open board in step with the channel.
//!
//! A [`BoardSession`] joins the board's room and feeds every frame through
//! the coordinator. A worker task drains the channel's frame and status
//! subscriptions, so refetches never block the channel supervisor. After a reconnect the board is reloaded; while the channel
//! is unavailable it is reloaded every poll interval.

use std::sync::Arc;
use std::time::Duration;

use log::{debug, info, warn};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::{Interval, MissedTickBehavior};

use taskboard_core::bus::{RecvError, Subscription};
use taskboard_core::coordinator::MutationCoordinator;
use taskboard_core::reconcile::RefetchScope;
use taskboard_core::sync::PushEvent;
use taskboard_core::Error;

use crate::channel::{ChannelStatus, RealtimeChannel};
use crate::transport::Frame;

pub struct BoardSession {
    board_id: String,
    channel: Arc<RealtimeChannel>,
    stop: Option<oneshot::Sender<()>>,
    worker: JoinHandle<()>,
}

impl std::fmt::Debug for BoardSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BoardSession")
            .field("board_id", &self.board_id)
            .field("active", &self.is_active())
            .finish()
    }
}

impl BoardSession {
    /// Joins `board_id`'s room and starts routing events into `coordinator`.
    /// Must be called inside a tokio runtime.
    pub fn attach(
        channel: Arc<RealtimeChannel>,
        coordinator: Arc<MutationCoordinator>,
        board_id: impl Into<String>,
    ) -> Self {
        let board_id = board_id.into();
        let feeds = Feeds {
            frames: channel.frames(),
            statuses: channel.statuses(),
        };
        let initial = channel.status();
        let (stop, stopped) = oneshot::channel();

        let worker = SessionWorker {
            board_id: board_id.clone(),
            coordinator,
            generation: channel.generation(),
            poll_interval: channel.config().poll_interval,
            polling: None,
        };
        channel.join_room(&board_id);
        info!("[Session] attached to board {}", board_id);

        Self {
            board_id,
            channel,
            stop: Some(stop),
            worker: tokio::spawn(worker.run(feeds, initial, stopped)),
        }
    }

    pub fn board_id(&self) -> &str {
        &self.board_id
    }

    pub fn is_active(&self) -> bool {
        self.stop.is_some() && !self.worker.is_finished()
    }

    /// Stops listening and leaves the room. Work already started (including
    /// a refetch in flight) runs to completion.
    pub fn detach(mut self) {
        self.release();
    }

    fn release(&mut self) {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
            self.channel.leave_room(&self.board_id);
            info!("[Session] detached from board {}", self.board_id);
        }
    }
}

impl Drop for BoardSession {
    fn drop(&mut self) {
        self.release();
    }
}

struct Feeds {
    frames: Subscription<Frame>,
    statuses: Subscription<ChannelStatus>,
}

struct SessionWorker {
    board_id: String,
    coordinator: Arc<MutationCoordinator>,
    /// Last connection generation the board was loaded for.
    generation: u64,
    poll_interval: Duration,
    polling: Option<Interval>,
}

async fn next_tick(polling: &mut Option<Interval>) {
    match polling {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending::<()>().await,
    }
}

impl SessionWorker {
    async fn run(
        mut self,
        mut feeds: Feeds,
        initial: ChannelStatus,
        mut stopped: oneshot::Receiver<()>,
    ) {
        self.on_status(initial).await;
        loop {
            tokio::select! {
                biased;
                _ = &mut stopped => break,
                status = feeds.statuses.next() => match status {
                    Some(status) => self.on_status(status).await,
                    None => break,
                },
                frame = feeds.frames.recv() => match frame {
                    Ok(frame) => self.on_frame(frame).await,
                    Err(RecvError::Lagged(missed)) => {
                        warn!(
                            "[Session] {} events missed, reloading board {}",
                            missed, self.board_id
                        );
                        self.resync().await;
                    }
                    Err(RecvError::Closed) => break,
                },
                _ = next_tick(&mut self.polling) => {
                    debug!("[Session] polling board {}", self.board_id);
                    self.resync().await;
                }
            }
        }
        debug!("[Session] worker for board {} stopped", self.board_id);
    }

    fn concerns(&self, event: &PushEvent) -> bool {
        event.is_user_scoped()
            || event
                .board_id()
                .map_or(true, |board_id| board_id == self.board_id)
    }

    async fn on_frame(&mut self, frame: Frame) {
        let event = match PushEvent::decode(&frame.event, &frame.payload) {
            Ok(event) => event,
            Err(Error::UnknownEvent(name)) => {
                debug!("[Session] ignoring unknown event `{}`", name);
                return;
            }
            Err(err) => {
                warn!("[Session] dropping `{}`: {}", frame.event, err);
                return;
            }
        };
        if !self.concerns(&event) {
            if event.name().lists_boards() {
                debug!("[Session] `{}` on another board, reloading boards", frame.event);
                self.coordinator
                    .refetch_quietly(&RefetchScope::Boards)
                    .await;
            } else {
                debug!("[Session] `{}` is for another board", frame.event);
            }
            return;
        }

        let outcome = self.coordinator.react(event);
        if let Some(scope) = outcome.refetch {
            self.coordinator.refetch_quietly(&scope).await;
        }
    }

    async fn on_status(&mut self, status: ChannelStatus) {
        match status {
            ChannelStatus::Connected { generation } => {
                if self.polling.take().is_some() {
                    info!("[Session] channel back, polling stopped");
                }
                if generation > self.generation {
                    self.generation = generation;
                    self.resync().await;
                }
            }
            ChannelStatus::Unavailable => {
                if self.polling.is_none() {
                    warn!(
                        "[Session] channel unavailable, polling board {} every {:?}",
                        self.board_id, self.poll_interval
                    );
                    let mut interval = tokio::time::interval(self.poll_interval);
                    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
                    self.polling = Some(interval);
                }
            }
            ChannelStatus::Disconnected => {
                self.polling = None;
            }
            ChannelStatus::Connecting | ChannelStatus::Reconnecting { .. } => {}
        }
    }

    /// Reloads everything a missed event could have touched.
    async fn resync(&self) {
        for scope in [
            RefetchScope::board(&self.board_id),
            RefetchScope::Invitations,
            RefetchScope::Notifications,
        ] {
            self.coordinator.refetch_quietly(&scope).await;
        }
    }
}
