//! Periodic token-status polling.
//!
//! The poller only produces [`StatusEvent`]s on a broadcast channel; anything
//! that renders status subscribes separately.

use std::time::Duration;

use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::constants::DEFAULT_POLL_INTERVAL;
use crate::manager::SessionManager;
use crate::types::TokenStatus;

/// Capacity of the status broadcast channel.
const EVENT_CHANNEL_CAPACITY: usize = 64;

/// Event emitted by the status poller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatusEvent {
    /// The server reported token status.
    Status(TokenStatus),
    /// Status could not be determined this tick.
    Unknown,
    /// The access token was refreshed after an expired status.
    Refreshed,
    /// The session ended; the poller stops after this event.
    SessionEnded,
}

/// Polls token status on a fixed interval.
pub struct StatusPoller {
    manager: SessionManager,
    interval: Duration,
    auto_refresh: bool,
    events: broadcast::Sender<StatusEvent>,
}

impl StatusPoller {
    pub fn new(manager: SessionManager) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            manager,
            interval: DEFAULT_POLL_INTERVAL,
            auto_refresh: false,
            events,
        }
    }

    /// Time between polls. The first poll happens immediately.
    pub fn interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Refresh or end the session when a poll finds an expired access token.
    pub fn auto_refresh(mut self, enabled: bool) -> Self {
        self.auto_refresh = enabled;
        self
    }

    /// Subscribe to status events.
    pub fn subscribe(&self) -> broadcast::Receiver<StatusEvent> {
        self.events.subscribe()
    }

    /// Run one poll. Returns `false` once the session has ended.
    pub async fn poll_once(&self) -> bool {
        let status = self.manager.get_token_status().await;

        let event = match &status {
            Some(status) => StatusEvent::Status(status.clone()),
            None => StatusEvent::Unknown,
        };
        let _ = self.events.send(event);

        if !self.auto_refresh {
            return true;
        }

        let needs_refresh = status.as_ref().is_some_and(TokenStatus::needs_refresh);
        if !self.manager.reconcile_status(status.as_ref()).await {
            let _ = self.events.send(StatusEvent::SessionEnded);
            return false;
        }
        if needs_refresh {
            let _ = self.events.send(StatusEvent::Refreshed);
        }
        true
    }

    /// Poll until `cancel` fires or the session ends.
    pub fn spawn(self, cancel: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(async move { self.run(cancel).await })
    }

    async fn run(self, cancel: CancellationToken) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        tracing::debug!(
            interval_secs = self.interval.as_secs(),
            auto_refresh = self.auto_refresh,
            "Token status poller started"
        );

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::debug!("Token status poller cancelled");
                    break;
                }
                _ = ticker.tick() => {
                    if !self.poll_once().await {
                        tracing::info!("Session ended, stopping token status poller");
                        break;
                    }
                }
            }
        }
    }
}
