//! Live attendance capture for a fleet of biometric terminals.
//!
//! One poll worker per device detects new punches with a record-count
//! watermark and publishes them through a bounded channel to a single
//! sink, while a shared registry keeps a consistent view for status,
//! export, and clearing.
//!
//! ```text
//! CaptureController
//!   ├─ spawns ─► PollWorker (per device) ──┐
//!   ├─ spawns ─► PollWorker (per device) ──┼─► mpsc ─► dispatcher ─► EventSink
//!   │                   │                  │
//!   │                   ▼                  │
//!   └─ reads ──► CaptureRegistry ◄─────────┘
//!                      │
//!                      ▼
//!               export / status
//! ```

pub mod config;
pub mod controller;
pub mod error;
pub mod export;
pub mod monitor;
pub mod registry;
pub mod search;
pub mod sink;

mod worker;

pub use config::CaptureConfig;
pub use controller::CaptureController;
pub use error::{CaptureError, Result};
pub use export::{default_export_path, export_snapshot, render_report};
pub use monitor::{monitor_user, monitor_user_until};
pub use registry::{CaptureRegistry, CaptureState, RegistrySnapshot, StopReason};
pub use search::{
    AttendanceSearchOutcome, AttendanceSearchReport, DeviceCheckOutcome, DeviceSearchOutcome,
    DeviceStatus, FleetCheckReport, FleetSearchReport, UserQuery, check_fleet, find_user,
    find_user_attendance,
};
pub use sink::{EventSink, LogSink, NameResolvingSink, TargetUserSink};

/// Crate version, for diagnostics.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
