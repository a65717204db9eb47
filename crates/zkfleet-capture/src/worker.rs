//! Per-device poll worker.
//!
//! One worker task runs per actively captured device and owns the whole
//! connect → fetch → diff → publish → sleep cycle, including retry and
//! backoff. New records are detected with a watermark: the count of
//! attendance records already processed. Each cycle compares the device's
//! current record count against the watermark and captures the tail slice.
//!
//! # States
//!
//! ```text
//! Starting ──► Polling ◄──► RetryWait
//!                 │
//!                 ▼
//!              Stopped (terminal)
//! ```
//!
//! Cancellation is cooperative: the controller clears the registry's
//! active flag and the worker observes it at the next loop top, so exit
//! happens within one poll-cycle bound of the request, never by
//! interrupting an in-flight network call.

use crate::config::CaptureConfig;
use crate::registry::{CaptureRegistry, StopReason};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::time::Instant;
use tracing::{debug, info, trace, warn};
use zkfleet_core::{CapturedEvent, DeviceAddress};
use zkfleet_terminal::{AnyConnector, AnySession, TerminalConnector, TerminalSession};

/// Poll worker lifecycle states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WorkerState {
    /// Task spawned, loop not yet entered.
    Starting,

    /// Connected (or connecting) and diffing attendance.
    Polling,

    /// Last connect or fetch failed; waiting out the fixed backoff.
    RetryWait,

    /// Terminal. Registry has been updated with the stop reason.
    Stopped,
}

/// One capture task for one device.
pub(crate) struct PollWorker {
    device: DeviceAddress,
    connector: AnyConnector,
    config: CaptureConfig,
    registry: Arc<CaptureRegistry>,
    events_tx: mpsc::Sender<CapturedEvent>,

    /// Optional wall-clock limit; the worker stops itself once elapsed.
    duration: Option<Duration>,
}

impl PollWorker {
    pub(crate) fn new(
        device: DeviceAddress,
        connector: AnyConnector,
        config: CaptureConfig,
        registry: Arc<CaptureRegistry>,
        events_tx: mpsc::Sender<CapturedEvent>,
        duration: Option<Duration>,
    ) -> Self {
        Self {
            device,
            connector,
            config,
            registry,
            events_tx,
            duration,
        }
    }

    /// Run the poll loop until stopped.
    ///
    /// Invariants on exit: the registry's active flag is cleared with an
    /// explicit stop reason, and no session is left open.
    pub(crate) async fn run(self) {
        let started = Instant::now();
        let mut state = WorkerState::Starting;
        let mut session: Option<AnySession> = None;

        debug!(device = %self.device, "poll worker starting");

        let reason = loop {
            // Loop-top checks: duration limit first, then cooperative stop.
            if let Some(limit) = self.duration
                && started.elapsed() >= limit
            {
                break StopReason::DurationElapsed;
            }
            if !self.registry.is_active(&self.device) {
                break StopReason::Requested;
            }

            self.transition(&mut state, WorkerState::Polling);

            if session.is_none() {
                match self
                    .connector
                    .connect(&self.device, self.config.connect_timeout)
                    .await
                {
                    Ok(new_session) => session = Some(new_session),
                    Err(error) => {
                        warn!(
                            device = %self.device,
                            %error,
                            backoff_ms = self.config.retry_backoff.as_millis() as u64,
                            "connect failed; backing off"
                        );
                        self.transition(&mut state, WorkerState::RetryWait);
                        tokio::time::sleep(self.config.retry_backoff).await;
                        continue;
                    }
                }
            }

            let Some(open_session) = session.as_mut() else {
                continue;
            };

            let records = match open_session.attendance().await {
                Ok(records) => Some(records),
                Err(error) if error.is_protocol() => {
                    // Malformed response: this cycle yields nothing and the
                    // watermark stays put, so nothing is lost or re-captured.
                    warn!(
                        device = %self.device,
                        %error,
                        "malformed attendance response; treating fetch as empty"
                    );
                    None
                }
                Err(error) => {
                    warn!(
                        device = %self.device,
                        %error,
                        "session failed mid-poll; backing off"
                    );
                    session = None;
                    self.transition(&mut state, WorkerState::RetryWait);
                    tokio::time::sleep(self.config.retry_backoff).await;
                    continue;
                }
            };

            if let Some(records) = records {
                let current = records.len();
                let mut watermark = self.registry.watermark(&self.device);

                // Shrinkage policy: a device-side clear makes the log
                // shorter than the watermark. Reset and treat everything
                // currently present as new.
                if current < watermark {
                    warn!(
                        device = %self.device,
                        watermark,
                        current,
                        "device log shrank; resetting watermark"
                    );
                    watermark = 0;
                    self.registry.set_watermark(&self.device, 0);
                }

                if current > watermark {
                    let events: Vec<CapturedEvent> = records[watermark..current]
                        .iter()
                        .map(|record| CapturedEvent::ingest(self.device.clone(), record))
                        .collect();

                    debug!(
                        device = %self.device,
                        new_events = events.len(),
                        watermark,
                        current,
                        "captured new attendance records"
                    );

                    self.registry.append_events(&self.device, &events);

                    let mut channel_closed = false;
                    for event in events {
                        if !self.publish(event).await {
                            channel_closed = true;
                            break;
                        }
                    }
                    if channel_closed {
                        self.registry.set_watermark(&self.device, current);
                        break StopReason::ChannelClosed;
                    }
                }

                self.registry.set_watermark(&self.device, current);
            }

            if self.config.reconnect_each_poll
                && let Some(open_session) = session.take()
                && let Err(error) = open_session.disconnect().await
            {
                debug!(device = %self.device, %error, "disconnect failed");
            }

            tokio::time::sleep(self.config.poll_interval).await;
        };

        if let Some(open_session) = session.take()
            && let Err(error) = open_session.disconnect().await
        {
            debug!(device = %self.device, %error, "disconnect on stop failed");
        }

        self.registry.record_stop(&self.device, reason);
        self.transition(&mut state, WorkerState::Stopped);
        info!(device = %self.device, %reason, "poll worker stopped");
    }

    /// Push one event into the worker → sink channel.
    ///
    /// Uses try_send to detect backpressure, then falls back to a blocking
    /// send so consumer latency throttles the producer instead of dropping
    /// events. Returns false when the channel is closed.
    async fn publish(&self, event: CapturedEvent) -> bool {
        match self.events_tx.try_send(event) {
            Ok(()) => true,
            Err(TrySendError::Full(event)) => {
                debug!(device = %self.device, "event channel full; applying backpressure");
                self.events_tx.send(event).await.is_ok()
            }
            Err(TrySendError::Closed(_)) => false,
        }
    }

    fn transition(&self, state: &mut WorkerState, next: WorkerState) {
        if *state != next {
            trace!(device = %self.device, from = ?*state, to = ?next, "worker state change");
            *state = next;
        }
    }
}
