//! One-shot fleet queries: user search and device health checks.
//!
//! These share the connector with the capture pipeline but run outside
//! it: each device is visited once with a bounded connect, and a failure
//! on one device is recorded in the report rather than aborting the sweep.

use chrono::{DateTime, Local};
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::{debug, info, warn};
use zkfleet_core::{AttendanceRecord, DeviceAddress, TerminalInfo, TerminalUser, UserId};
use zkfleet_terminal::{AnyConnector, TerminalConnector, TerminalSession};

/// What to look for when sweeping the fleet for a user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UserQuery {
    /// Canonical user id equality.
    Id(UserId),

    /// Case-insensitive substring of the enrolled display name.
    Name(String),

    /// Exact device slot number.
    Uid(u16),
}

impl UserQuery {
    fn matches(&self, user: &TerminalUser) -> bool {
        match self {
            Self::Id(target) => UserId::canonicalize(&user.user_id) == *target,
            Self::Name(needle) => user
                .name
                .to_lowercase()
                .contains(&needle.to_lowercase()),
            Self::Uid(uid) => user.uid == *uid,
        }
    }
}

impl std::fmt::Display for UserQuery {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Id(id) => write!(f, "id:{id}"),
            Self::Name(name) => write!(f, "name:{name}"),
            Self::Uid(uid) => write!(f, "uid:{uid}"),
        }
    }
}

/// Result of looking for one user on one device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceSearchOutcome {
    /// Enrollments whose canonical user id matches the query.
    Found(Vec<TerminalUser>),
    NotFound,
    /// The device could not be queried; the message explains why.
    ConnectionFailed(String),
}

/// Per-device search results for a whole fleet sweep.
pub type FleetSearchReport = BTreeMap<DeviceAddress, DeviceSearchOutcome>;

/// Snapshot of one reachable device's identity and data volume.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceStatus {
    pub info: TerminalInfo,
    pub user_count: usize,
    pub attendance_count: usize,
}

/// Result of probing one device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceCheckOutcome {
    Online(DeviceStatus),
    Offline(String),
}

/// Per-device health results for a whole fleet sweep.
pub type FleetCheckReport = BTreeMap<DeviceAddress, DeviceCheckOutcome>;

/// Search every device in `fleet` for enrollments matching `query`.
///
/// Id matching is canonical on both sides, so a query for `42` finds
/// device records stored as `"42"`, `"042"`, or `"00042"`.
pub async fn find_user(
    connector: &AnyConnector,
    fleet: &[DeviceAddress],
    query: &UserQuery,
    connect_timeout: Duration,
) -> FleetSearchReport {
    let mut report = FleetSearchReport::new();
    for device in fleet {
        let outcome = search_device(connector, device, query, connect_timeout).await;
        match &outcome {
            DeviceSearchOutcome::Found(users) => {
                info!(device = %device, query = %query, hits = users.len(), "user found");
            }
            DeviceSearchOutcome::NotFound => {
                debug!(device = %device, query = %query, "user not enrolled");
            }
            DeviceSearchOutcome::ConnectionFailed(message) => {
                warn!(device = %device, error = %message, "device skipped during search");
            }
        }
        report.insert(device.clone(), outcome);
    }
    report
}

async fn search_device(
    connector: &AnyConnector,
    device: &DeviceAddress,
    query: &UserQuery,
    connect_timeout: Duration,
) -> DeviceSearchOutcome {
    let result = async {
        let mut session = connector.connect(device, connect_timeout).await?;
        let users = session.users().await?;
        session.disconnect().await?;
        Ok::<_, zkfleet_terminal::TerminalError>(users)
    }
    .await;

    match result {
        Ok(users) => {
            let hits: Vec<TerminalUser> = users
                .into_iter()
                .filter(|u| query.matches(u))
                .collect();
            if hits.is_empty() {
                DeviceSearchOutcome::NotFound
            } else {
                DeviceSearchOutcome::Found(hits)
            }
        }
        Err(error) => DeviceSearchOutcome::ConnectionFailed(error.to_string()),
    }
}

/// Result of sweeping one device's attendance log for a user's history.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttendanceSearchOutcome {
    /// The user is enrolled here; their records since the cutoff, in
    /// device order (possibly none).
    Records(Vec<AttendanceRecord>),

    /// The user is not enrolled on this device; its log was not swept.
    NotEnrolled,

    /// The device could not be queried; the message explains why.
    ConnectionFailed(String),
}

/// Per-device attendance history for a whole fleet sweep.
pub type AttendanceSearchReport = BTreeMap<DeviceAddress, AttendanceSearchOutcome>;

/// Find `target`'s recent attendance across `fleet`.
///
/// Each device is visited once: the enrollment list is checked first, and
/// only devices where the user is enrolled have their attendance log swept.
/// Records are matched by canonical id and kept when their device-reported
/// timestamp is at or after `cutoff`.
pub async fn find_user_attendance(
    connector: &AnyConnector,
    fleet: &[DeviceAddress],
    target: &UserId,
    cutoff: DateTime<Local>,
    connect_timeout: Duration,
) -> AttendanceSearchReport {
    let mut report = AttendanceSearchReport::new();
    for device in fleet {
        let outcome =
            attendance_on_device(connector, device, target, cutoff, connect_timeout).await;
        match &outcome {
            AttendanceSearchOutcome::Records(records) => {
                info!(device = %device, user = %target, records = records.len(), "attendance history");
            }
            AttendanceSearchOutcome::NotEnrolled => {
                debug!(device = %device, user = %target, "user not enrolled; log not swept");
            }
            AttendanceSearchOutcome::ConnectionFailed(message) => {
                warn!(device = %device, error = %message, "device skipped during history sweep");
            }
        }
        report.insert(device.clone(), outcome);
    }
    report
}

async fn attendance_on_device(
    connector: &AnyConnector,
    device: &DeviceAddress,
    target: &UserId,
    cutoff: DateTime<Local>,
    connect_timeout: Duration,
) -> AttendanceSearchOutcome {
    let result = async {
        let mut session = connector.connect(device, connect_timeout).await?;
        let enrolled = session
            .users()
            .await?
            .iter()
            .any(|u| target.matches_raw(&u.user_id));
        let records = if enrolled {
            Some(session.attendance().await?)
        } else {
            None
        };
        session.disconnect().await?;
        Ok::<_, zkfleet_terminal::TerminalError>(records)
    }
    .await;

    match result {
        Ok(Some(records)) => AttendanceSearchOutcome::Records(
            records
                .into_iter()
                .filter(|r| target.matches_raw(&r.user_id) && r.timestamp >= cutoff)
                .collect(),
        ),
        Ok(None) => AttendanceSearchOutcome::NotEnrolled,
        Err(error) => AttendanceSearchOutcome::ConnectionFailed(error.to_string()),
    }
}

/// Probe every device in `fleet`: identity plus user and attendance
/// counts for reachable devices, the failure message for the rest.
pub async fn check_fleet(
    connector: &AnyConnector,
    fleet: &[DeviceAddress],
    connect_timeout: Duration,
) -> FleetCheckReport {
    let mut report = FleetCheckReport::new();
    for device in fleet {
        let outcome = check_device(connector, device, connect_timeout).await;
        match &outcome {
            DeviceCheckOutcome::Online(status) => {
                info!(
                    device = %device,
                    firmware = %status.info.firmware,
                    users = status.user_count,
                    records = status.attendance_count,
                    "device online"
                );
            }
            DeviceCheckOutcome::Offline(message) => {
                warn!(device = %device, error = %message, "device offline");
            }
        }
        report.insert(device.clone(), outcome);
    }
    report
}

async fn check_device(
    connector: &AnyConnector,
    device: &DeviceAddress,
    connect_timeout: Duration,
) -> DeviceCheckOutcome {
    let result = async {
        let mut session = connector.connect(device, connect_timeout).await?;
        let info = session.info().await?;
        let user_count = session.users().await?.len();
        let attendance_count = session.attendance().await?.len();
        session.disconnect().await?;
        Ok::<_, zkfleet_terminal::TerminalError>(DeviceStatus {
            info,
            user_count,
            attendance_count,
        })
    }
    .await;

    match result {
        Ok(status) => DeviceCheckOutcome::Online(status),
        Err(error) => DeviceCheckOutcome::Offline(error.to_string()),
    }
}
