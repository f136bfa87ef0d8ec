//! Typed pub/sub over a tokio broadcast channel.
//!
//! [`EventBus::subscribe`] hands out a [`Subscription`] wrapping its own
//! receiver; dropping it unsubscribes. [`EventBus::listen`] runs a handler
//! on a spawned task instead and returns a [`Listener`] that aborts the task
//! when released.

use std::future::Future;

use log::warn;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

pub use tokio::sync::broadcast::error::RecvError;

/// Events a slow subscriber may fall behind by before it starts missing them.
pub const BUS_CAPACITY: usize = 1024;

#[derive(Debug)]
pub struct EventBus<E> {
    tx: broadcast::Sender<E>,
}

impl<E> Clone for EventBus<E> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
        }
    }
}

impl<E: Clone + Send + 'static> Default for EventBus<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: Clone + Send + 'static> EventBus<E> {
    pub fn new() -> Self {
        Self::with_capacity(BUS_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Publishes `event` to every live subscription. Returns how many there
    /// were; publishing with none is not an error.
    pub fn publish(&self, event: E) -> usize {
        self.tx.send(event).unwrap_or(0)
    }

    pub fn subscribe(&self) -> Subscription<E> {
        Subscription {
            rx: self.tx.subscribe(),
        }
    }

    /// Calls `handler` for every event on a spawned task until the returned
    /// handle is released. Must be called inside a tokio runtime.
    pub fn listen<F>(&self, handler: F) -> Listener
    where
        F: Fn(&E) + Send + Sync + 'static,
    {
        let mut subscription = self.subscribe();
        Listener::spawn(async move {
            while let Some(event) = subscription.next().await {
                handler(&event);
            }
        })
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

/// One receiver on an [`EventBus`].
#[derive(Debug)]
pub struct Subscription<E> {
    rx: broadcast::Receiver<E>,
}

impl<E: Clone> Subscription<E> {
    /// Waits for the next event. `Lagged(n)` means `n` events were missed
    /// and the next call resumes with the oldest one still buffered.
    pub async fn recv(&mut self) -> Result<E, RecvError> {
        self.rx.recv().await
    }

    /// Waits for the next event, logging and skipping over lag. `None` once
    /// the bus is gone.
    pub async fn next(&mut self) -> Option<E> {
        loop {
            match self.rx.recv().await {
                Ok(event) => return Some(event),
                Err(RecvError::Closed) => return None,
                Err(RecvError::Lagged(missed)) => {
                    warn!("Subscription lagged behind, {} events missed", missed);
                }
            }
        }
    }

    /// The next buffered event, if any, without waiting.
    pub fn try_next(&mut self) -> Option<E> {
        loop {
            match self.rx.try_recv() {
                Ok(event) => return Some(event),
                Err(broadcast::error::TryRecvError::Lagged(missed)) => {
                    warn!("Subscription lagged behind, {} events missed", missed);
                }
                Err(_) => return None,
            }
        }
    }

    pub fn unsubscribe(self) {}
}

/// Handle for a handler running on its own task. Releasing it (explicitly
/// or by drop) stops delivery; releasing twice is harmless.
#[must_use = "dropping a Listener immediately stops its handler"]
#[derive(Debug)]
pub struct Listener {
    tasks: Vec<JoinHandle<()>>,
}

impl Listener {
    pub fn spawn<F>(future: F) -> Self
    where
        F: Future<Output = ()> + Send + 'static,
    {
        Self {
            tasks: vec![tokio::spawn(future)],
        }
    }

    /// Folds several handles into one that releases them all.
    pub fn combine(listeners: Vec<Listener>) -> Self {
        Self {
            tasks: listeners
                .into_iter()
                .flat_map(|mut listener| std::mem::take(&mut listener.tasks))
                .collect(),
        }
    }

    pub fn unsubscribe(self) {}

    pub fn is_active(&self) -> bool {
        self.tasks.iter().any(|task| !task.is_finished())
    }
}

impl Drop for Listener {
    fn drop(&mut self) {
        for task in &self.tasks {
            task.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    async fn settle() {
        for _ in 0..20 {
            tokio::task::yield_now().await;
        }
        tokio::time::sleep(Duration::from_millis(2)).await;
    }

    #[test]
    fn dropped_subscription_stops_delivery() {
        let bus = EventBus::<u32>::new();
        let mut sub = bus.subscribe();
        assert_eq!(bus.publish(2), 1);
        assert_eq!(sub.try_next(), Some(2));
        assert_eq!(sub.try_next(), None);

        sub.unsubscribe();
        assert_eq!(bus.subscriber_count(), 0);
        assert_eq!(bus.publish(5), 0);
    }

    #[tokio::test]
    async fn lag_is_reported_to_recv() {
        let bus = EventBus::<u32>::with_capacity(2);
        let mut sub = bus.subscribe();
        for value in 0..4 {
            bus.publish(value);
        }

        assert!(matches!(sub.recv().await, Err(RecvError::Lagged(2))));
        assert_eq!(sub.recv().await.ok(), Some(2));
    }

    #[tokio::test]
    async fn listener_runs_until_released() {
        let bus = EventBus::<u32>::new();
        let seen = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&seen);
        let listener = bus.listen(move |value| {
            counter.fetch_add(*value as usize, Ordering::SeqCst);
        });

        bus.publish(2);
        settle().await;
        assert_eq!(seen.load(Ordering::SeqCst), 2);

        listener.unsubscribe();
        settle().await;
        bus.publish(5);
        tokio::time::sleep(Duration::from_millis(5)).await;
        assert_eq!(seen.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn combined_listener_releases_every_task() {
        let bus = EventBus::<()>::new();
        let combined = Listener::combine(vec![bus.listen(|_| {}), bus.listen(|_| {})]);
        assert!(combined.is_active());
        assert_eq!(bus.subscriber_count(), 2);

        combined.unsubscribe();
        settle().await;
        assert_eq!(bus.subscriber_count(), 0);
    }
}
