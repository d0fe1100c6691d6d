//! Change notification for the shared record set.
//!
//! # Responsibility
//! - Turn "the provider's record set may have changed" into a stream of
//!   events a session can react to.
//!
//! # Invariants
//! - Events carry no record data; consumers always reload in full.
//! - Undelivered events coalesce: a full channel drops new events because a
//!   pending one already forces a reload.
//! - Cancelling (or dropping) a subscription stops its background task.

use crate::provider::{Fingerprint, ProviderResult, SharedProvider};
use async_trait::async_trait;
use log::{debug, info, warn};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::task::JoinHandle;

const EVENT_BUFFER: usize = 4;

/// "The record set may have changed."
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeEvent {
    /// Provider or feed that observed the change.
    pub source: String,
    /// Fingerprint observed by polling feeds.
    pub fingerprint: Option<Fingerprint>,
}

/// Live subscription handle yielding change events.
#[derive(Debug)]
pub struct ChangeSubscription {
    events: mpsc::Receiver<ChangeEvent>,
    task: Option<JoinHandle<()>>,
}

impl ChangeSubscription {
    pub fn new(events: mpsc::Receiver<ChangeEvent>, task: Option<JoinHandle<()>>) -> Self {
        Self { events, task }
    }

    /// Next event, or `None` once cancelled or the feed is gone.
    pub async fn next(&mut self) -> Option<ChangeEvent> {
        self.events.recv().await
    }

    /// Stops delivery. Idempotent.
    pub fn cancel(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
        self.events.close();
    }
}

impl Drop for ChangeSubscription {
    fn drop(&mut self) {
        self.cancel();
    }
}

#[async_trait]
pub trait ChangeFeed: Send + Sync {
    async fn subscribe(&self) -> ProviderResult<ChangeSubscription>;
}

/// Detects changes by polling the provider's fingerprint.
pub struct PollingChangeFeed {
    provider: SharedProvider,
    interval: Duration,
}

impl PollingChangeFeed {
    pub fn new(provider: SharedProvider, interval: Duration) -> Self {
        Self { provider, interval }
    }
}

#[async_trait]
impl ChangeFeed for PollingChangeFeed {
    /// Fails when the initial fingerprint cannot be read.
    async fn subscribe(&self) -> ProviderResult<ChangeSubscription> {
        let mut last = self.provider.fingerprint().await?;
        let (sender, receiver) = mpsc::channel(EVENT_BUFFER);
        let provider = SharedProvider::clone(&self.provider);
        let interval = self.interval;

        info!(
            "event=feed_subscribe module=notifier status=ok provider={} interval_ms={}",
            provider.provider_id(),
            interval.as_millis()
        );

        let task = tokio::spawn(async move {
            loop {
                tokio::time::sleep(interval).await;
                let current = match provider.fingerprint().await {
                    Ok(current) => current,
                    Err(err) => {
                        warn!(
                            "event=feed_poll module=notifier status=error provider={} error={}",
                            provider.provider_id(),
                            err
                        );
                        continue;
                    }
                };
                if current == last {
                    continue;
                }
                last = current;
                debug!(
                    "event=feed_poll module=notifier status=changed provider={} count={}",
                    provider.provider_id(),
                    current.count
                );
                let event = ChangeEvent {
                    source: provider.provider_id().to_string(),
                    fingerprint: Some(current),
                };
                if let Err(TrySendError::Closed(_)) = sender.try_send(event) {
                    break;
                }
            }
        });

        Ok(ChangeSubscription::new(receiver, Some(task)))
    }
}

/// In-process trigger for changes pushed by some other transport.
#[derive(Default)]
pub struct ManualChangeFeed {
    subscribers: Mutex<Vec<mpsc::Sender<ChangeEvent>>>,
}

impl ManualChangeFeed {
    pub fn new() -> Self {
        Self::default()
    }

    /// Signals every live subscriber; returns how many were reached.
    pub fn notify(&self, source: &str) -> usize {
        let mut subscribers = self
            .subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        subscribers.retain(|sender| !sender.is_closed());

        let mut delivered = 0;
        for sender in subscribers.iter() {
            let event = ChangeEvent {
                source: source.to_string(),
                fingerprint: None,
            };
            match sender.try_send(event) {
                Ok(()) | Err(TrySendError::Full(_)) => delivered += 1,
                Err(TrySendError::Closed(_)) => {}
            }
        }
        delivered
    }

    pub fn subscriber_count(&self) -> usize {
        let mut subscribers = self
            .subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        subscribers.retain(|sender| !sender.is_closed());
        subscribers.len()
    }
}

#[async_trait]
impl ChangeFeed for ManualChangeFeed {
    async fn subscribe(&self) -> ProviderResult<ChangeSubscription> {
        let (sender, receiver) = mpsc::channel(EVENT_BUFFER);
        self.subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(sender);
        Ok(ChangeSubscription::new(receiver, None))
    }
}

#[cfg(test)]
mod tests {
    use super::{ChangeFeed, ManualChangeFeed};

    #[tokio::test]
    async fn manual_feed_delivers_and_coalesces() {
        let feed = ManualChangeFeed::new();
        let mut subscription = feed.subscribe().await.unwrap();

        for _ in 0..10 {
            assert_eq!(feed.notify("test"), 1);
        }

        let first = subscription.next().await.expect("event should arrive");
        assert_eq!(first.source, "test");
    }

    #[tokio::test]
    async fn cancelled_subscription_is_pruned() {
        let feed = ManualChangeFeed::new();
        let mut subscription = feed.subscribe().await.unwrap();
        assert_eq!(feed.subscriber_count(), 1);

        subscription.cancel();
        subscription.cancel();
        assert_eq!(feed.subscriber_count(), 0);
        assert_eq!(feed.notify("test"), 0);
        assert!(subscription.next().await.is_none());
    }
}
