//! Mock terminal fleet for testing and development.
//!
//! This module provides a scriptable in-memory fleet that behaves like a
//! set of networked attendance terminals: attendance logs that grow at the
//! tail (and can be cleared, like a device-side wipe), enrolled user lists,
//! and failure injection for connects and fetches. No physical hardware or
//! network is required.

use crate::error::{Result, TerminalError};
use crate::traits::{TerminalConnector, TerminalSession};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tracing::trace;
use zkfleet_core::{AttendanceRecord, DeviceAddress, TerminalInfo, TerminalUser};

/// Scriptable state for one simulated terminal.
#[derive(Debug)]
struct MockDeviceState {
    attendance: Vec<AttendanceRecord>,
    users: Vec<TerminalUser>,
    info: TerminalInfo,

    /// Refuse this many upcoming connect attempts.
    fail_connects: u32,

    /// Refuse every connect attempt while set.
    unreachable: bool,

    /// Simulated connect latency (exercises connect timeouts).
    connect_delay: Option<Duration>,

    /// Answer the next attendance fetch with a protocol error.
    fault_next_attendance: bool,

    /// Connect attempts observed, accepted or not.
    connect_attempts: u64,

    /// Sessions currently open against this device.
    live_sessions: u64,
}

impl MockDeviceState {
    fn new(addr: &DeviceAddress) -> Self {
        Self {
            attendance: Vec::new(),
            users: Vec::new(),
            info: TerminalInfo::new(
                format!("Mock Terminal {addr}"),
                format!("MOCK-{addr}"),
                "Ver 6.60 (mock)",
                "ZMM220_TFT",
            ),
            fail_connects: 0,
            unreachable: false,
            connect_delay: None,
            fault_next_attendance: false,
            connect_attempts: 0,
            live_sessions: 0,
        }
    }
}

/// Shared handle over a simulated terminal fleet.
///
/// Cloning is cheap; all clones observe the same fleet state. Tests script
/// devices through this handle while a [`MockConnector`] built from the
/// same fleet serves the capture layer.
///
/// # Examples
///
/// ```
/// use zkfleet_core::DeviceAddress;
/// use zkfleet_terminal::mock::MockFleet;
///
/// let fleet = MockFleet::new();
/// let gate = DeviceAddress::new("10.0.0.9").unwrap();
/// fleet.add_device(gate.clone());
/// fleet.fail_next_connects(&gate, 2);
/// assert_eq!(fleet.connect_count(&gate), 0);
/// ```
#[derive(Debug, Clone, Default)]
pub struct MockFleet {
    inner: Arc<Mutex<HashMap<DeviceAddress, MockDeviceState>>>,
}

impl MockFleet {
    /// Create an empty fleet.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a connector serving this fleet.
    #[must_use]
    pub fn connector(&self) -> MockConnector {
        MockConnector {
            fleet: self.clone(),
        }
    }

    /// Register a device with default identification data.
    pub fn add_device(&self, addr: DeviceAddress) {
        let mut fleet = self.lock();
        let state = MockDeviceState::new(&addr);
        fleet.entry(addr).or_insert(state);
    }

    /// Register a device with explicit identification data.
    pub fn add_device_with_info(&self, addr: DeviceAddress, info: TerminalInfo) {
        let mut fleet = self.lock();
        let mut state = MockDeviceState::new(&addr);
        state.info = info;
        fleet.insert(addr, state);
    }

    /// Append one punch to a device's attendance log.
    pub fn push_punch(&self, addr: &DeviceAddress, record: AttendanceRecord) {
        self.with_device(addr, |state| state.attendance.push(record));
    }

    /// Replace a device's attendance log wholesale.
    pub fn set_attendance(&self, addr: &DeviceAddress, records: Vec<AttendanceRecord>) {
        self.with_device(addr, |state| state.attendance = records);
    }

    /// Wipe a device's attendance log, like an external clear on the
    /// physical terminal.
    pub fn clear_attendance(&self, addr: &DeviceAddress) {
        self.with_device(addr, |state| state.attendance.clear());
    }

    /// Replace a device's enrolled user list.
    pub fn set_users(&self, addr: &DeviceAddress, users: Vec<TerminalUser>) {
        self.with_device(addr, |state| state.users = users);
    }

    /// Refuse the next `n` connect attempts to a device.
    pub fn fail_next_connects(&self, addr: &DeviceAddress, n: u32) {
        self.with_device(addr, |state| state.fail_connects = n);
    }

    /// Mark a device unreachable (or reachable again).
    pub fn set_unreachable(&self, addr: &DeviceAddress, unreachable: bool) {
        self.with_device(addr, |state| state.unreachable = unreachable);
    }

    /// Delay connect attempts to a device by `delay`.
    pub fn set_connect_delay(&self, addr: &DeviceAddress, delay: Duration) {
        self.with_device(addr, |state| state.connect_delay = Some(delay));
    }

    /// Make the device's next attendance fetch fail with a protocol error.
    pub fn fault_next_attendance(&self, addr: &DeviceAddress) {
        self.with_device(addr, |state| state.fault_next_attendance = true);
    }

    /// Connect attempts observed for a device (accepted or refused).
    #[must_use]
    pub fn connect_count(&self, addr: &DeviceAddress) -> u64 {
        self.lock().get(addr).map_or(0, |s| s.connect_attempts)
    }

    /// Sessions currently open against a device.
    ///
    /// After a worker stops cleanly this must read zero.
    #[must_use]
    pub fn live_sessions(&self, addr: &DeviceAddress) -> u64 {
        self.lock().get(addr).map_or(0, |s| s.live_sessions)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<DeviceAddress, MockDeviceState>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn with_device<F: FnOnce(&mut MockDeviceState)>(&self, addr: &DeviceAddress, f: F) {
        if let Some(state) = self.lock().get_mut(addr) {
            f(state);
        }
    }

    fn close_session(&self, addr: &DeviceAddress) {
        self.with_device(addr, |state| {
            state.live_sessions = state.live_sessions.saturating_sub(1);
        });
    }
}

/// Connector over a [`MockFleet`].
#[derive(Debug, Clone)]
pub struct MockConnector {
    fleet: MockFleet,
}

impl TerminalConnector for MockConnector {
    type Session = MockSession;

    async fn connect(&self, addr: &DeviceAddress, timeout: Duration) -> Result<MockSession> {
        let delay = {
            let mut fleet = self.fleet.lock();
            let state = fleet.get_mut(addr).ok_or_else(|| {
                TerminalError::connection(addr.as_str(), "unknown device")
            })?;

            state.connect_attempts += 1;

            if state.unreachable {
                return Err(TerminalError::connection(addr.as_str(), "host unreachable"));
            }
            if state.fail_connects > 0 {
                state.fail_connects -= 1;
                return Err(TerminalError::connection(addr.as_str(), "connection refused"));
            }
            state.connect_delay
        };

        if let Some(delay) = delay
            && tokio::time::timeout(timeout, tokio::time::sleep(delay))
                .await
                .is_err()
        {
            return Err(TerminalError::timeout(
                addr.as_str(),
                timeout.as_millis() as u64,
            ));
        }

        self.fleet
            .with_device(addr, |state| state.live_sessions += 1);
        trace!(device = %addr, "mock session opened");

        Ok(MockSession {
            addr: addr.clone(),
            fleet: self.fleet.clone(),
            open: true,
        })
    }
}

/// An open session against one simulated terminal.
#[derive(Debug)]
pub struct MockSession {
    addr: DeviceAddress,
    fleet: MockFleet,
    open: bool,
}

impl MockSession {
    fn ensure_open(&self) -> Result<()> {
        if self.open {
            Ok(())
        } else {
            Err(TerminalError::session_closed(self.addr.as_str()))
        }
    }
}

impl TerminalSession for MockSession {
    async fn attendance(&mut self) -> Result<Vec<AttendanceRecord>> {
        self.ensure_open()?;
        let mut fleet = self.fleet.lock();
        let state = fleet
            .get_mut(&self.addr)
            .ok_or_else(|| TerminalError::connection(self.addr.as_str(), "device removed"))?;

        if state.fault_next_attendance {
            state.fault_next_attendance = false;
            return Err(TerminalError::protocol(
                self.addr.as_str(),
                "truncated record table",
            ));
        }

        Ok(state.attendance.clone())
    }

    async fn users(&mut self) -> Result<Vec<TerminalUser>> {
        self.ensure_open()?;
        let fleet = self.fleet.lock();
        let state = fleet
            .get(&self.addr)
            .ok_or_else(|| TerminalError::connection(self.addr.as_str(), "device removed"))?;
        Ok(state.users.clone())
    }

    async fn info(&mut self) -> Result<TerminalInfo> {
        self.ensure_open()?;
        let fleet = self.fleet.lock();
        let state = fleet
            .get(&self.addr)
            .ok_or_else(|| TerminalError::connection(self.addr.as_str(), "device removed"))?;
        Ok(state.info.clone())
    }

    async fn disconnect(mut self) -> Result<()> {
        if self.open {
            self.open = false;
            self.fleet.close_session(&self.addr);
        }
        Ok(())
    }
}

impl Drop for MockSession {
    fn drop(&mut self) {
        // A dropped-but-open session still releases its device slot.
        if self.open {
            self.open = false;
            self.fleet.close_session(&self.addr);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Local;

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

    #[tokio::test]
    async fn test_connect_unknown_device() {
        let fleet = MockFleet::new();
        let connector = fleet.connector();

        let result = connector
            .connect(&addr("10.0.0.1"), Duration::from_secs(3))
            .await;
        assert!(matches!(result, Err(TerminalError::Connection { .. })));
    }

    #[tokio::test]
    async fn test_attendance_grows_between_sessions() {
        let fleet = MockFleet::new();
        let gate = addr("10.0.0.1");
        fleet.add_device(gate.clone());
        fleet.push_punch(&gate, punch("7"));

        let connector = fleet.connector();
        let mut session = connector
            .connect(&gate, Duration::from_secs(3))
            .await
            .unwrap();
        assert_eq!(session.attendance().await.unwrap().len(), 1);
        session.disconnect().await.unwrap();

        fleet.push_punch(&gate, punch("8"));
        let mut session = connector
            .connect(&gate, Duration::from_secs(3))
            .await
            .unwrap();
        assert_eq!(session.attendance().await.unwrap().len(), 2);
        session.disconnect().await.unwrap();
    }

    #[tokio::test]
    async fn test_fail_next_connects() {
        let fleet = MockFleet::new();
        let gate = addr("10.0.0.1");
        fleet.add_device(gate.clone());
        fleet.fail_next_connects(&gate, 1);

        let connector = fleet.connector();
        assert!(
            connector
                .connect(&gate, Duration::from_secs(3))
                .await
                .is_err()
        );
        assert!(
            connector
                .connect(&gate, Duration::from_secs(3))
                .await
                .is_ok()
        );
        assert_eq!(fleet.connect_count(&gate), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_connect_delay_times_out() {
        let fleet = MockFleet::new();
        let gate = addr("10.0.0.1");
        fleet.add_device(gate.clone());
        fleet.set_connect_delay(&gate, Duration::from_secs(10));

        let connector = fleet.connector();
        let result = connector.connect(&gate, Duration::from_secs(3)).await;
        assert!(matches!(result, Err(TerminalError::Timeout { .. })));
        assert_eq!(fleet.live_sessions(&gate), 0);
    }

    #[tokio::test]
    async fn test_protocol_fault_is_one_shot() {
        let fleet = MockFleet::new();
        let gate = addr("10.0.0.1");
        fleet.add_device(gate.clone());
        fleet.push_punch(&gate, punch("7"));
        fleet.fault_next_attendance(&gate);

        let connector = fleet.connector();
        let mut session = connector
            .connect(&gate, Duration::from_secs(3))
            .await
            .unwrap();
        assert!(session.attendance().await.unwrap_err().is_protocol());
        assert_eq!(session.attendance().await.unwrap().len(), 1);
        session.disconnect().await.unwrap();
    }

    #[tokio::test]
    async fn test_dropped_session_releases_slot() {
        let fleet = MockFleet::new();
        let gate = addr("10.0.0.1");
        fleet.add_device(gate.clone());

        let connector = fleet.connector();
        let session = connector
            .connect(&gate, Duration::from_secs(3))
            .await
            .unwrap();
        assert_eq!(fleet.live_sessions(&gate), 1);
        drop(session);
        assert_eq!(fleet.live_sessions(&gate), 0);
    }

    #[tokio::test]
    async fn test_session_closed_after_disconnect_via_any() {
        use crate::connectors::{AnyConnector, AnySession};

        let fleet = MockFleet::new();
        let gate = addr("10.0.0.1");
        fleet.add_device(gate.clone());

        let connector = AnyConnector::Mock(fleet.connector());
        let mut session = connector
            .connect(&gate, Duration::from_secs(3))
            .await
            .unwrap();
        assert!(matches!(session, AnySession::Mock(_)));
        assert!(session.attendance().await.is_ok());
        session.disconnect().await.unwrap();
        assert_eq!(fleet.live_sessions(&gate), 0);
    }
}
