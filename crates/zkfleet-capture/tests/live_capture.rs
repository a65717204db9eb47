//! End-to-end capture pipeline tests over the mock fleet.

use std::time::Duration;
use chrono::Local;
use tokio::sync::mpsc;
use zkfleet_capture::{
    CaptureConfig, CaptureController, CaptureError, EventSink, Result as CaptureResult,
    StopReason, export_snapshot, render_report,
};
use zkfleet_core::{AttendanceRecord, CapturedEvent, DeviceAddress};
use zkfleet_terminal::{AnyConnector, MockFleet};

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

/// Forwards every event to an unbounded channel for assertions.
struct RecordingSink {
    tx: mpsc::UnboundedSender<CapturedEvent>,
}

impl RecordingSink {
    fn new() -> (Self, mpsc::UnboundedReceiver<CapturedEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl EventSink for RecordingSink {
    async fn on_event(&mut self, event: CapturedEvent) -> CaptureResult<()> {
        self.tx
            .send(event)
            .map_err(|_| CaptureError::sink("recorder dropped"))
    }
}

/// Device reports record counts 0, 3, 3, 5 across successive polls: the
/// registry tracks 0, 3, 3, 5 and the sink fires exactly five times, in
/// record order.
#[tokio::test(start_paused = true)]
async fn growth_sequence_captures_each_record_exactly_once() {
    let fleet = MockFleet::new();
    let gate = addr("10.0.0.1");
    fleet.add_device(gate.clone());

    let mut controller = controller_for(&fleet);
    let (sink, mut events_rx) = RecordingSink::new();
    controller.attach_sink(sink).unwrap();
    let registry = controller.registry();

    controller.start(&gate);
    {
        let gate = gate.clone();
        let fleet = fleet.clone();
        wait_until(move || fleet.connect_count(&gate) >= 1).await;
    }
    assert_eq!(registry.event_count(&gate), 0);

    for user in ["1", "2", "3"] {
        fleet.push_punch(&gate, punch(user));
    }
    {
        let gate = gate.clone();
        let registry = registry.clone();
        wait_until(move || registry.event_count(&gate) == 3).await;
    }

    // A poll with no new records changes nothing.
    let polls_before = fleet.connect_count(&gate);
    {
        let gate = gate.clone();
        let fleet = fleet.clone();
        wait_until(move || fleet.connect_count(&gate) > polls_before).await;
    }
    assert_eq!(registry.event_count(&gate), 3);

    for user in ["4", "5"] {
        fleet.push_punch(&gate, punch(user));
    }
    {
        let gate = gate.clone();
        let registry = registry.clone();
        wait_until(move || registry.event_count(&gate) == 5).await;
    }

    controller.shutdown().await;

    let mut seen = Vec::new();
    while let Ok(event) = events_rx.try_recv() {
        seen.push(event.user_id.as_str().to_string());
    }
    assert_eq!(seen, vec!["1", "2", "3", "4", "5"]);
}

/// After a stop request, status reports inactive within the documented
/// bound (one poll cycle plus any in-flight backoff).
#[tokio::test(start_paused = true)]
async fn stop_is_observed_within_one_cycle() {
    let fleet = MockFleet::new();
    let gate = addr("10.0.0.1");
    fleet.add_device(gate.clone());

    let mut controller = controller_for(&fleet);
    controller.start(&gate);
    {
        let gate = gate.clone();
        let fleet = fleet.clone();
        wait_until(move || fleet.connect_count(&gate) >= 1).await;
    }

    controller.stop(&gate);
    let bound = controller.config().connect_timeout + controller.config().retry_backoff;
    tokio::time::sleep(bound).await;

    let state = &controller.status()[&gate];
    assert!(!state.active);
    assert_eq!(state.last_stop, Some(StopReason::Requested));
    assert_eq!(fleet.live_sessions(&gate), 0);

    controller.shutdown().await;
}

/// Export over a fleet where only one device has events: a single MACHINE
/// section and the right trailing total.
#[tokio::test(start_paused = true)]
async fn export_reflects_live_capture() {
    let fleet = MockFleet::new();
    let busy = addr("10.0.0.1");
    let idle = addr("10.0.0.2");
    fleet.add_device(busy.clone());
    fleet.add_device(idle.clone());
    fleet.push_punch(&busy, punch("8"));
    fleet.push_punch(&busy, punch("9"));

    let mut controller = controller_for(&fleet);
    let registry = controller.registry();
    controller.start_fleet(&[busy.clone(), idle.clone()], None).await;
    {
        let busy = busy.clone();
        let registry = registry.clone();
        wait_until(move || registry.event_count(&busy) == 2).await;
    }
    controller.shutdown().await;

    let report = render_report(&registry.snapshot()).unwrap();
    assert_eq!(report.matches("MACHINE:").count(), 1);
    assert!(report.contains("MACHINE: 10.0.0.1"));
    assert!(report.contains("User: 8"));
    assert!(report.ends_with("Total Events: 2\n"));

    let dir = std::env::temp_dir().join("zkfleet-live-export-test");
    std::fs::create_dir_all(&dir).unwrap();
    let path = dir.join("capture.txt");
    let written = export_snapshot(&registry.snapshot(), Some(&path))
        .unwrap()
        .unwrap();
    assert!(std::fs::read_to_string(&written)
        .unwrap()
        .ends_with("Total Events: 2\n"));
    std::fs::remove_dir_all(&dir).unwrap();
}

/// A sink that fails on some events never stalls capture or loses
/// registry state.
#[tokio::test(start_paused = true)]
async fn failing_sink_does_not_disturb_capture() {
    struct EveryOtherFails {
        calls: usize,
        tx: mpsc::UnboundedSender<String>,
    }
    impl EventSink for EveryOtherFails {
        async fn on_event(&mut self, event: CapturedEvent) -> CaptureResult<()> {
            self.calls += 1;
            self.tx.send(event.user_id.as_str().to_string()).ok();
            if self.calls % 2 == 0 {
                return Err(CaptureError::sink("every other event"));
            }
            Ok(())
        }
    }

    let fleet = MockFleet::new();
    let gate = addr("10.0.0.1");
    fleet.add_device(gate.clone());
    for user in ["1", "2", "3", "4"] {
        fleet.push_punch(&gate, punch(user));
    }

    let mut controller = controller_for(&fleet);
    let (tx, mut rx) = mpsc::unbounded_channel();
    controller.attach_sink(EveryOtherFails { calls: 0, tx }).unwrap();
    let registry = controller.registry();
    controller.start(&gate);

    {
        let gate = gate.clone();
        let registry = registry.clone();
        wait_until(move || registry.event_count(&gate) == 4).await;
    }
    controller.shutdown().await;

    let mut delivered = Vec::new();
    while let Ok(user) = rx.try_recv() {
        delivered.push(user);
    }
    assert_eq!(delivered, vec!["1", "2", "3", "4"]);
    assert_eq!(registry.event_count(&gate), 4);
}
