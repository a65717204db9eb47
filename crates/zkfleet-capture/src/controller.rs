//! Capture controller: the public entry point for live capture.
//!
//! The controller owns the registry, the worker → sink event channel, and
//! the set of spawned worker tasks. Start and stop are asymmetric on
//! purpose: start spawns a task, stop only clears the registry's active
//! flag and lets the worker exit cooperatively at its next loop top.

use crate::config::CaptureConfig;
use crate::error::{CaptureError, Result};
use crate::registry::{CaptureRegistry, RegistrySnapshot};
use crate::sink::{EventSink, LogSink, spawn_dispatcher};
use crate::worker::PollWorker;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use zkfleet_core::{CapturedEvent, DeviceAddress};
use zkfleet_terminal::AnyConnector;

/// Orchestrates per-device poll workers and the single event dispatcher.
pub struct CaptureController {
    connector: AnyConnector,
    config: CaptureConfig,
    registry: Arc<CaptureRegistry>,
    events_tx: mpsc::Sender<CapturedEvent>,

    /// Held until a sink is attached; consumed by the dispatcher.
    events_rx: Option<mpsc::Receiver<CapturedEvent>>,

    dispatcher: Option<JoinHandle<()>>,
    workers: HashMap<DeviceAddress, JoinHandle<()>>,
}

impl CaptureController {
    #[must_use]
    pub fn new(connector: AnyConnector, config: CaptureConfig) -> Self {
        let (events_tx, events_rx) = mpsc::channel(config.event_channel_capacity);
        Self {
            connector,
            config,
            registry: Arc::new(CaptureRegistry::new()),
            events_tx,
            events_rx: Some(events_rx),
            dispatcher: None,
            workers: HashMap::new(),
        }
    }

    /// Shared handle to the capture registry.
    #[must_use]
    pub fn registry(&self) -> Arc<CaptureRegistry> {
        Arc::clone(&self.registry)
    }

    #[must_use]
    pub fn config(&self) -> &CaptureConfig {
        &self.config
    }

    /// Attach the sink that will consume every captured event.
    ///
    /// Exactly one sink consumes the stream; a second attach fails with
    /// [`CaptureError::SinkAlreadyAttached`]. If no sink is attached by
    /// the first start, a [`LogSink`] is attached automatically.
    pub fn attach_sink<S: EventSink>(&mut self, sink: S) -> Result<()> {
        let events_rx = self
            .events_rx
            .take()
            .ok_or(CaptureError::SinkAlreadyAttached)?;
        self.dispatcher = Some(spawn_dispatcher(events_rx, sink));
        Ok(())
    }

    /// Start capturing from one device.
    ///
    /// Returns `false` without side effects when a worker is already
    /// running for the device.
    pub fn start(&mut self, device: &DeviceAddress) -> bool {
        self.start_with_duration(device, None)
    }

    /// Start capturing from one device with an optional wall-clock limit.
    pub fn start_with_duration(
        &mut self,
        device: &DeviceAddress,
        duration: Option<Duration>,
    ) -> bool {
        self.prune_finished();
        if self.workers.contains_key(device) {
            warn!(device = %device, "capture already running; start ignored");
            return false;
        }

        if self.events_rx.is_some() {
            debug!("no sink attached; defaulting to log sink");
            // Infallible: events_rx was just observed present.
            let _ = self.attach_sink(LogSink);
        }

        self.registry.set_active(device, true);
        let worker = PollWorker::new(
            device.clone(),
            self.connector.clone(),
            self.config.clone(),
            Arc::clone(&self.registry),
            self.events_tx.clone(),
            duration,
        );
        self.workers.insert(device.clone(), tokio::spawn(worker.run()));
        info!(device = %device, "capture started");
        true
    }

    /// Start capturing from every device in `fleet`, staggering worker
    /// spawns to avoid a connect burst. Returns the devices actually
    /// started (already-running devices are skipped).
    pub async fn start_fleet(
        &mut self,
        fleet: &[DeviceAddress],
        duration: Option<Duration>,
    ) -> Vec<DeviceAddress> {
        let mut started = Vec::new();
        for device in fleet {
            if self.start_with_duration(device, duration) {
                started.push(device.clone());
            }
            tokio::time::sleep(self.config.stagger_delay).await;
        }
        info!(
            started = started.len(),
            requested = fleet.len(),
            "fleet capture started"
        );
        started
    }

    /// Request a stop for one device. The worker observes the cleared
    /// flag at its next loop top; latency is bounded by one poll cycle.
    pub fn stop(&self, device: &DeviceAddress) {
        self.registry.set_active(device, false);
        info!(device = %device, "capture stop requested");
    }

    /// Request a stop for every active device.
    pub fn stop_all(&self) {
        for (device, state) in self.registry.snapshot() {
            if state.active {
                self.stop(&device);
            }
        }
    }

    /// Whether a worker task currently exists for `device`.
    #[must_use]
    pub fn is_running(&self, device: &DeviceAddress) -> bool {
        self.workers
            .get(device)
            .is_some_and(|handle| !handle.is_finished())
    }

    /// Point-in-time view of every device's capture state.
    #[must_use]
    pub fn status(&self) -> RegistrySnapshot {
        self.registry.snapshot()
    }

    /// Drop all captured events. Refuses without explicit confirmation;
    /// watermarks are kept so running workers do not re-capture.
    pub fn clear_all(&self, confirmed: bool) -> Result<()> {
        if !confirmed {
            return Err(CaptureError::NotConfirmed);
        }
        let dropped = self.registry.total_events();
        self.registry.clear_all();
        info!(dropped, "captured events cleared");
        Ok(())
    }

    /// Stop everything and wait for orderly teardown: workers first, then
    /// the dispatcher once the channel drains.
    pub async fn shutdown(mut self) {
        self.stop_all();
        let workers: Vec<_> = self.workers.drain().collect();
        for (device, handle) in workers {
            if handle.await.is_err() {
                warn!(device = %device, "worker task panicked");
            }
        }
        // Last sender half; dropping it lets the dispatcher drain and exit.
        drop(self.events_tx);
        if let Some(dispatcher) = self.dispatcher
            && dispatcher.await.is_err()
        {
            warn!("dispatcher task panicked");
        }
        info!("capture controller shut down");
    }

    fn prune_finished(&mut self) {
        self.workers.retain(|_, handle| !handle.is_finished());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::StopReason;
    use chrono::Local;
    use zkfleet_core::AttendanceRecord;
    use zkfleet_terminal::MockFleet;

    fn addr(s: &str) -> DeviceAddress {
        DeviceAddress::new(s).unwrap()
    }

    fn punch(user: &str) -> AttendanceRecord {
        AttendanceRecord {
            user_id: user.to_string(),
            timestamp: Local::now(),
            status: 1,
            punch: 0,
        }
    }

    fn controller_for(fleet: &MockFleet) -> CaptureController {
        CaptureController::new(AnyConnector::Mock(fleet.connector()), CaptureConfig::default())
    }

    async fn wait_until(mut condition: impl FnMut() -> bool) {
        for _ in 0..10_000 {
            if condition() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("condition not met within virtual-time budget");
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_is_idempotent() {
        let fleet = MockFleet::new();
        let gate = addr("10.0.0.1");
        fleet.add_device(gate.clone());

        let mut controller = controller_for(&fleet);
        assert!(controller.start(&gate));
        assert!(!controller.start(&gate));
        assert_eq!(controller.status().len(), 1);

        controller.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_restart_after_stop() {
        let fleet = MockFleet::new();
        let gate = addr("10.0.0.1");
        fleet.add_device(gate.clone());

        let mut controller = controller_for(&fleet);
        assert!(controller.start(&gate));
        controller.stop(&gate);
        // Wait for the worker task itself to finish, not just the registry
        // update, so the restart below cannot race the winding-down task.
        wait_until(|| !controller.is_running(&gate)).await;
        assert_eq!(
            controller.status()[&gate].last_stop,
            Some(StopReason::Requested)
        );

        assert!(controller.start(&gate));
        assert!(controller.status()[&gate].active);
        controller.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_fleet_start_and_shutdown() {
        let fleet = MockFleet::new();
        let devices: Vec<_> = ["10.0.0.1", "10.0.0.2", "10.0.0.3"]
            .iter()
            .map(|s| addr(s))
            .collect();
        for device in &devices {
            fleet.add_device(device.clone());
        }
        fleet.push_punch(&devices[1], punch("7"));

        let mut controller = controller_for(&fleet);
        let started = controller.start_fleet(&devices, None).await;
        assert_eq!(started, devices);

        {
            let registry = controller.registry();
            let device = devices[1].clone();
            wait_until(move || registry.event_count(&device) == 1).await;
        }

        let registry = controller.registry();
        controller.shutdown().await;
        for device in &devices {
            assert!(!registry.is_active(device));
            assert_eq!(fleet.live_sessions(device), 0);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_second_sink_attach_fails() {
        let fleet = MockFleet::new();
        let mut controller = controller_for(&fleet);
        controller.attach_sink(LogSink).unwrap();
        assert!(matches!(
            controller.attach_sink(LogSink),
            Err(CaptureError::SinkAlreadyAttached)
        ));
        controller.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_clear_all_requires_confirmation() {
        let fleet = MockFleet::new();
        let gate = addr("10.0.0.1");
        fleet.add_device(gate.clone());
        fleet.push_punch(&gate, punch("1"));

        let mut controller = controller_for(&fleet);
        controller.start(&gate);
        {
            let registry = controller.registry();
            let gate = gate.clone();
            wait_until(move || registry.event_count(&gate) == 1).await;
        }

        assert!(matches!(
            controller.clear_all(false),
            Err(CaptureError::NotConfirmed)
        ));
        assert_eq!(controller.registry().total_events(), 1);

        controller.clear_all(true).unwrap();
        assert_eq!(controller.registry().total_events(), 0);
        // Watermark survives the clear, so nothing is re-captured.
        assert_eq!(controller.registry().watermark(&gate), 1);

        controller.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_one_device_failure_does_not_affect_siblings() {
        let fleet = MockFleet::new();
        let good = addr("10.0.0.1");
        let dead = addr("10.0.0.2");
        fleet.add_device(good.clone());
        fleet.add_device(dead.clone());
        fleet.set_unreachable(&dead, true);
        fleet.push_punch(&good, punch("5"));

        let mut controller = controller_for(&fleet);
        controller.start(&good);
        controller.start(&dead);

        {
            let registry = controller.registry();
            let good = good.clone();
            wait_until(move || registry.event_count(&good) == 1).await;
        }
        // The dead device is still retrying, not stopped.
        assert!(controller.status()[&dead].active);
        assert_eq!(controller.status()[&dead].events.len(), 0);

        controller.shutdown().await;
    }
}
