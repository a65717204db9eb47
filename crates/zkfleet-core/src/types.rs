use crate::{Result, error::Error};
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Network address of one attendance terminal (host or IP).
///
/// Opaque identifier; the registry keys per-device capture state on it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DeviceAddress(String);

impl DeviceAddress {
    /// Create a new device address with validation.
    ///
    /// The address is trimmed before validation.
    ///
    /// # Errors
    /// Returns `Error::InvalidDeviceAddress` if the address is empty or
    /// contains whitespace.
    pub fn new(addr: &str) -> Result<Self> {
        let addr = addr.trim();
        if addr.is_empty() {
            return Err(Error::InvalidDeviceAddress(
                "address must not be empty".to_string(),
            ));
        }
        if addr.chars().any(char::is_whitespace) {
            return Err(Error::InvalidDeviceAddress(format!(
                "address must not contain whitespace: {addr:?}"
            )));
        }
        Ok(DeviceAddress(addr.to_string()))
    }

    /// Get the address as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DeviceAddress {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for DeviceAddress {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        DeviceAddress::new(s)
    }
}

/// Canonical user identifier.
///
/// Terminals report user ids in several textual shapes for the same person
/// (`"7"`, `"07"`, `"00007"`). All ids entering the system go through
/// [`UserId::canonicalize`] exactly once, and every comparison site uses
/// canonical equality.
///
/// # Canonical form
///
/// - ASCII whitespace is trimmed;
/// - if the remainder is non-empty and all ASCII digits, leading zeros are
///   stripped (an all-zero id canonicalizes to `"0"`);
/// - any other id is kept verbatim after trimming.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserId(String);

impl UserId {
    /// Normalize a device-reported user id into its canonical form.
    ///
    /// # Examples
    ///
    /// ```
    /// use zkfleet_core::UserId;
    ///
    /// assert_eq!(UserId::canonicalize("00042"), UserId::canonicalize("42"));
    /// assert_eq!(UserId::canonicalize("000").as_str(), "0");
    /// assert_eq!(UserId::canonicalize(" A17 ").as_str(), "A17");
    /// // Distinct numeric ids sharing a prefix stay distinct
    /// assert_ne!(UserId::canonicalize("42"), UserId::canonicalize("421"));
    /// ```
    #[must_use]
    pub fn canonicalize(raw: &str) -> Self {
        let trimmed = raw.trim();
        if !trimmed.is_empty() && trimmed.bytes().all(|b| b.is_ascii_digit()) {
            let stripped = trimmed.trim_start_matches('0');
            if stripped.is_empty() {
                return UserId("0".to_string());
            }
            return UserId(stripped.to_string());
        }
        UserId(trimmed.to_string())
    }

    /// Get the canonical id as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Check whether a raw device-reported id denotes this user.
    #[must_use]
    pub fn matches_raw(&self, raw: &str) -> bool {
        *self == UserId::canonicalize(raw)
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One attendance punch as reported by a terminal.
///
/// Terminals return these as an ordered sequence that only grows at the
/// tail, except when the device-side log is cleared externally.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttendanceRecord {
    /// Raw user id exactly as the device reported it.
    pub user_id: String,

    /// Device-reported punch time.
    pub timestamp: DateTime<Local>,

    /// Device status code (verification mode).
    pub status: u16,

    /// Punch code (check-in/out variant).
    pub punch: u16,
}

/// An attendance event observed by the live-capture pipeline.
///
/// Immutable once constructed. `captured_at` is the local wall-clock time
/// of ingestion and is distinct from the device-reported `timestamp`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapturedEvent {
    /// Terminal the punch was captured from.
    pub device: DeviceAddress,

    /// Canonical user id (normalized at ingestion).
    pub user_id: UserId,

    /// Device-reported punch time.
    pub timestamp: DateTime<Local>,

    /// Device status code.
    pub status: u16,

    /// Punch code.
    pub punch: u16,

    /// Local wall-clock time the event entered the registry.
    pub captured_at: DateTime<Local>,
}

impl CapturedEvent {
    /// Ingest a device record into a captured event.
    ///
    /// This is the single point where user ids are normalized.
    #[must_use]
    pub fn ingest(device: DeviceAddress, record: &AttendanceRecord) -> Self {
        Self {
            device,
            user_id: UserId::canonicalize(&record.user_id),
            timestamp: record.timestamp,
            status: record.status,
            punch: record.punch,
            captured_at: Local::now(),
        }
    }
}

/// One user as enrolled on a terminal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TerminalUser {
    /// Internal device slot number.
    pub uid: u16,

    /// Raw user id as stored on the device.
    pub user_id: String,

    /// Display name.
    pub name: String,

    /// Privilege level (0 = user, 14 = admin on most firmware).
    pub privilege: u16,

    /// Device password (empty when unset).
    pub password: String,

    /// Access group.
    pub group_id: String,

    /// Card number (0 when no card is enrolled).
    pub card: u32,
}

/// Identification data reported by a terminal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TerminalInfo {
    /// Device name.
    pub name: String,

    /// Serial number.
    pub serial: String,

    /// Firmware version string.
    pub firmware: String,

    /// Hardware platform.
    pub platform: String,

    /// Face algorithm version, when the terminal supports face capture.
    pub face_version: Option<String>,

    /// Fingerprint algorithm version, when supported.
    pub fingerprint_version: Option<String>,
}

impl TerminalInfo {
    /// Create terminal info with the required fields.
    pub fn new(
        name: impl Into<String>,
        serial: impl Into<String>,
        firmware: impl Into<String>,
        platform: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            serial: serial.into(),
            firmware: firmware.into(),
            platform: platform.into(),
            face_version: None,
            fingerprint_version: None,
        }
    }

    /// Set the face algorithm version.
    #[must_use]
    pub fn with_face_version(mut self, version: impl Into<String>) -> Self {
        self.face_version = Some(version.into());
        self
    }

    /// Set the fingerprint algorithm version.
    #[must_use]
    pub fn with_fingerprint_version(mut self, version: impl Into<String>) -> Self {
        self.fingerprint_version = Some(version.into());
        self
    }
}
