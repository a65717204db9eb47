//! Thread-safe capture state shared across the fleet.
//!
//! The registry is the single source of truth for per-device capture
//! state: the active flag, the record-count watermark, and the ordered
//! list of captured events. Workers own their device's watermark and event
//! tail; the controller owns the active flag; both funnel every write
//! through the methods here so a snapshot can never observe a partial
//! append.
//!
//! A single coarse lock over the fleet map is deliberate: critical
//! sections are short map operations and fleets are tens of devices, not
//! thousands.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::{Mutex, MutexGuard, PoisonError};
use zkfleet_core::{CapturedEvent, DeviceAddress};

/// Why a poll worker exited.
///
/// Recorded in the registry on every exit so a stopped capture is never
/// silent about its cause.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StopReason {
    /// Stop was requested through the controller.
    Requested,

    /// The configured capture duration elapsed.
    DurationElapsed,

    /// The event channel closed; no consumer remains.
    ChannelClosed,
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Requested => write!(f, "stop requested"),
            Self::DurationElapsed => write!(f, "duration elapsed"),
            Self::ChannelClosed => write!(f, "event channel closed"),
        }
    }
}

/// Per-device capture state.
///
/// Created lazily on first start, never deleted — only cleared. The
/// watermark counts attendance records already processed; `events` is
/// append-only between clears.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaptureState {
    /// Whether a poll worker should keep running for this device.
    pub active: bool,

    /// Count of device records already processed.
    pub watermark: usize,

    /// Events captured since the last start (or clear), in source order.
    pub events: Vec<CapturedEvent>,

    /// Why the last worker for this device exited, if any has.
    pub last_stop: Option<StopReason>,
}

/// Point-in-time copy of the whole registry, ordered by device address.
pub type RegistrySnapshot = BTreeMap<DeviceAddress, CaptureState>;

/// Thread-safe map of device address → capture state.
#[derive(Debug, Default)]
pub struct CaptureRegistry {
    devices: Mutex<HashMap<DeviceAddress, CaptureState>>,
}

impl CaptureRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Ensure a default entry exists for `device`.
    pub fn ensure(&self, device: &DeviceAddress) {
        self.lock().entry(device.clone()).or_default();
    }

    /// Set the active flag, creating the entry if absent.
    ///
    /// Activating clears the previous stop reason.
    pub fn set_active(&self, device: &DeviceAddress, active: bool) {
        let mut devices = self.lock();
        let state = devices.entry(device.clone()).or_default();
        state.active = active;
        if active {
            state.last_stop = None;
        }
    }

    /// Whether a worker should keep running for `device`.
    #[must_use]
    pub fn is_active(&self, device: &DeviceAddress) -> bool {
        self.lock().get(device).is_some_and(|s| s.active)
    }

    /// Append newly captured events to a device's tail in one critical
    /// section; readers never observe a partial batch.
    pub fn append_events(&self, device: &DeviceAddress, events: &[CapturedEvent]) {
        if events.is_empty() {
            return;
        }
        let mut devices = self.lock();
        let state = devices.entry(device.clone()).or_default();
        state.events.extend_from_slice(events);
    }

    /// Current watermark for a device (0 when absent).
    #[must_use]
    pub fn watermark(&self, device: &DeviceAddress) -> usize {
        self.lock().get(device).map_or(0, |s| s.watermark)
    }

    /// Set a device's watermark.
    pub fn set_watermark(&self, device: &DeviceAddress, watermark: usize) {
        let mut devices = self.lock();
        devices.entry(device.clone()).or_default().watermark = watermark;
    }

    /// Mark a worker exit: clears the active flag and records why.
    pub fn record_stop(&self, device: &DeviceAddress, reason: StopReason) {
        let mut devices = self.lock();
        let state = devices.entry(device.clone()).or_default();
        state.active = false;
        state.last_stop = Some(reason);
    }

    /// Events captured so far for one device.
    #[must_use]
    pub fn event_count(&self, device: &DeviceAddress) -> usize {
        self.lock().get(device).map_or(0, |s| s.events.len())
    }

    /// Events captured so far across the fleet.
    #[must_use]
    pub fn total_events(&self) -> usize {
        self.lock().values().map(|s| s.events.len()).sum()
    }

    /// Devices whose active flag is set.
    #[must_use]
    pub fn active_count(&self) -> usize {
        self.lock().values().filter(|s| s.active).count()
    }

    /// Immutable point-in-time copy of every device's state.
    #[must_use]
    pub fn snapshot(&self) -> RegistrySnapshot {
        self.lock()
            .iter()
            .map(|(addr, state)| (addr.clone(), state.clone()))
            .collect()
    }

    /// Drop one device's captured events. The watermark is kept so the
    /// worker does not re-capture records it has already processed.
    pub fn clear_device(&self, device: &DeviceAddress) {
        if let Some(state) = self.lock().get_mut(device) {
            state.events.clear();
        }
    }

    /// Drop every device's captured events.
    pub fn clear_all(&self) {
        for state in self.lock().values_mut() {
            state.events.clear();
        }
    }

    // Critical sections are short, panic-free map operations; a poisoned
    // lock still holds consistent data, so recover it.
    fn lock(&self) -> MutexGuard<'_, HashMap<DeviceAddress, CaptureState>> {
        self.devices.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
