//! Event sinks: consumers on the far side of the worker → sink channel.
//!
//! Workers publish captured events into a bounded channel; a single
//! dispatcher task drains it and hands each event to the attached
//! [`EventSink`]. A sink failure is logged and isolated to the event that
//! caused it, so a misbehaving consumer can never stall or kill capture.

use crate::error::Result;
use std::collections::HashMap;
use std::future::Future;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use zkfleet_core::{CapturedEvent, DeviceAddress, UserId};
use zkfleet_terminal::{AnyConnector, TerminalConnector, TerminalSession};

/// Consumer of captured events.
///
/// The returned future must be `Send`: the dispatcher runs on a spawned
/// task and may migrate between runtime workers. Implementations can still
/// be written with plain `async fn`.
pub trait EventSink: Send + 'static {
    /// Handle one captured event.
    ///
    /// An `Err` is logged by the dispatcher and the next event is
    /// delivered regardless.
    fn on_event(&mut self, event: CapturedEvent) -> impl Future<Output = Result<()>> + Send;
}

/// Spawn the dispatcher task: drain `events_rx` into `sink` until every
/// worker sender is dropped.
pub(crate) fn spawn_dispatcher<S: EventSink>(
    mut events_rx: mpsc::Receiver<CapturedEvent>,
    mut sink: S,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(event) = events_rx.recv().await {
            if let Err(error) = sink.on_event(event).await {
                warn!(%error, "event sink failed; continuing with next event");
            }
        }
        debug!("event channel drained; dispatcher exiting");
    })
}

/// Default sink: logs each event with structured fields.
#[derive(Debug, Default)]
pub struct LogSink;

impl EventSink for LogSink {
    async fn on_event(&mut self, event: CapturedEvent) -> Result<()> {
        info!(
            device = %event.device,
            user = %event.user_id,
            timestamp = %event.timestamp.format("%Y-%m-%d %H:%M:%S"),
            status = event.status,
            punch = event.punch,
            "attendance event"
        );
        Ok(())
    }
}

/// Sink that enriches events with the user's enrolled name.
///
/// The user table is fetched from the event's device on first sight and
/// cached for the sink's lifetime. Resolution failures degrade to logging
/// the event without a name; they never interrupt capture.
pub struct NameResolvingSink {
    connector: AnyConnector,
    connect_timeout: Duration,
    names: HashMap<DeviceAddress, HashMap<UserId, String>>,
}

impl NameResolvingSink {
    #[must_use]
    pub fn new(connector: AnyConnector, connect_timeout: Duration) -> Self {
        Self {
            connector,
            connect_timeout,
            names: HashMap::new(),
        }
    }

    async fn resolve(&mut self, device: &DeviceAddress, user: &UserId) -> Option<String> {
        if !self.names.contains_key(device) {
            match self.fetch_names(device).await {
                Ok(table) => {
                    self.names.insert(device.clone(), table);
                }
                Err(error) => {
                    debug!(device = %device, %error, "user table unavailable");
                    // Negative-cache the device so one dead terminal does
                    // not add a connect attempt to every event.
                    self.names.insert(device.clone(), HashMap::new());
                }
            }
        }
        self.names.get(device).and_then(|t| t.get(user)).cloned()
    }

    async fn fetch_names(
        &self,
        device: &DeviceAddress,
    ) -> zkfleet_terminal::Result<HashMap<UserId, String>> {
        let mut session = self.connector.connect(device, self.connect_timeout).await?;
        let users = session.users().await?;
        session.disconnect().await?;
        Ok(users
            .into_iter()
            .map(|u| (UserId::canonicalize(&u.user_id), u.name))
            .collect())
    }
}

impl EventSink for NameResolvingSink {
    async fn on_event(&mut self, event: CapturedEvent) -> Result<()> {
        let name = self.resolve(&event.device, &event.user_id).await;
        info!(
            device = %event.device,
            user = %event.user_id,
            name = name.as_deref().unwrap_or("Unknown"),
            timestamp = %event.timestamp.format("%Y-%m-%d %H:%M:%S"),
            status = event.status,
            punch = event.punch,
            "attendance event"
        );
        Ok(())
    }
}

/// Sink that forwards only one user's events to an unbounded channel.
///
/// Matching is canonical: events are compared by normalized user id, so a
/// device storing `"00042"` still matches a monitor for `"42"`.
pub struct TargetUserSink {
    target: UserId,
    matches_tx: mpsc::UnboundedSender<CapturedEvent>,
}

impl TargetUserSink {
    /// Create the sink and the receiving half for matched events.
    #[must_use]
    pub fn new(target: UserId) -> (Self, mpsc::UnboundedReceiver<CapturedEvent>) {
        let (matches_tx, matches_rx) = mpsc::unbounded_channel();
        (Self { target, matches_tx }, matches_rx)
    }
}

impl EventSink for TargetUserSink {
    async fn on_event(&mut self, event: CapturedEvent) -> Result<()> {
        if event.user_id != self.target {
            return Ok(());
        }
        info!(
            device = %event.device,
            user = %event.user_id,
            timestamp = %event.timestamp.format("%Y-%m-%d %H:%M:%S"),
            "target user detected"
        );
        self.matches_tx
            .send(event)
            .map_err(|_| crate::error::CaptureError::sink("monitor receiver dropped"))
    }
}
