//! Terminal communication trait definitions.
//!
//! These traits establish the contract between the capture core and the
//! device wire protocol, enabling substitution between the in-tree mock
//! fleet and real terminal drivers. The wire protocol itself lives behind
//! this seam; the capture layer never sees framing or packets.
//!
//! All traits use native `async fn` methods (Rust 1.90 + Edition 2024
//! RPITIT), eliminating the need for the `async_trait` macro.

#![allow(async_fn_in_trait)]

use crate::error::Result;
use std::time::Duration;
use zkfleet_core::{AttendanceRecord, DeviceAddress, TerminalInfo, TerminalUser};

/// Factory for terminal sessions.
///
/// One connector serves a whole fleet: `connect` is called with the target
/// address for every session the capture layer opens. Implementations must
/// bound the attempt by `timeout` and return
/// [`TerminalError::Timeout`](crate::TerminalError::Timeout) when it
/// elapses.
///
/// # Object Safety and Dynamic Dispatch
///
/// **NOTE**: This trait is NOT object-safe because `async fn` methods
/// return `impl Future` (Edition 2024 RPITIT). For dynamic dispatch, use
/// the enum wrapper [`AnyConnector`](crate::connectors::AnyConnector) —
/// poll workers are spawned over the concrete enum so their futures stay
/// `Send`.
pub trait TerminalConnector: Send + Sync {
    /// Session type produced by this connector.
    type Session: TerminalSession;

    /// Open a session to the terminal at `addr`.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The terminal is unreachable or refuses the connection
    /// - The attempt does not complete within `timeout`
    async fn connect(&self, addr: &DeviceAddress, timeout: Duration) -> Result<Self::Session>;
}

/// An open session to one attendance terminal.
///
/// Sessions are short-lived by default: the capture layer reconnects every
/// poll cycle unless configured to hold sessions open. A session must not
/// be shared across devices.
///
/// # Examples
///
/// ```no_run
/// use std::time::Duration;
/// use zkfleet_core::DeviceAddress;
/// use zkfleet_terminal::{Result, TerminalConnector, TerminalSession};
///
/// async fn record_count<C: TerminalConnector>(
///     connector: &C,
///     addr: &DeviceAddress,
/// ) -> Result<usize> {
///     let mut session = connector.connect(addr, Duration::from_secs(3)).await?;
///     let records = session.attendance().await?;
///     session.disconnect().await?;
///     Ok(records.len())
/// }
/// ```
pub trait TerminalSession: Send {
    /// Fetch the terminal's full attendance log, in device order.
    ///
    /// The sequence only grows at the tail between calls, except when the
    /// device-side log is cleared externally — callers must tolerate a
    /// shorter sequence than previously observed.
    ///
    /// # Errors
    ///
    /// Returns an error if the terminal answers with a malformed record
    /// table or the connection drops mid-transfer.
    async fn attendance(&mut self) -> Result<Vec<AttendanceRecord>>;

    /// Fetch the users enrolled on the terminal.
    ///
    /// # Errors
    ///
    /// Returns an error if the response is malformed or the connection
    /// drops mid-transfer.
    async fn users(&mut self) -> Result<Vec<TerminalUser>>;

    /// Query device identification data.
    ///
    /// # Errors
    ///
    /// Returns an error if the response is malformed or the connection
    /// drops mid-transfer.
    async fn info(&mut self) -> Result<TerminalInfo>;

    /// Close the session, releasing the device-side slot.
    ///
    /// # Errors
    ///
    /// Returns an error if the close handshake fails; the session is
    /// dropped either way.
    async fn disconnect(self) -> Result<()>;
}
