//! Enum wrappers for terminal connector dispatch.
//!
//! Native `async fn` in traits (RPITIT, Edition 2024) is not object-safe,
//! so `Box<dyn TerminalConnector>` is unavailable. These enums provide
//! concrete type dispatch instead: poll workers are spawned over
//! [`AnyConnector`], which keeps their futures `Send` without boxing and
//! costs nothing at runtime (compile-time monomorphization).
//!
//! A variant for the real ZK wire driver slots in here once one exists;
//! the capture layer is unaffected by the addition.

use crate::error::Result;
use crate::mock::{MockConnector, MockSession};
use crate::traits::{TerminalConnector, TerminalSession};
use std::time::Duration;
use zkfleet_core::{AttendanceRecord, DeviceAddress, TerminalInfo, TerminalUser};

/// Enum wrapper for connector dispatch.
#[derive(Debug, Clone)]
#[non_exhaustive]
pub enum AnyConnector {
    /// Mock fleet for development and testing.
    Mock(MockConnector),
}

impl TerminalConnector for AnyConnector {
    type Session = AnySession;

    async fn connect(&self, addr: &DeviceAddress, timeout: Duration) -> Result<AnySession> {
        match self {
            Self::Mock(connector) => connector
                .connect(addr, timeout)
                .await
                .map(AnySession::Mock),
        }
    }
}

/// Enum wrapper for session dispatch.
#[derive(Debug)]
#[non_exhaustive]
pub enum AnySession {
    /// Session against a mock fleet device.
    Mock(MockSession),
}

impl TerminalSession for AnySession {
    async fn attendance(&mut self) -> Result<Vec<AttendanceRecord>> {
        match self {
            Self::Mock(session) => session.attendance().await,
        }
    }

    async fn users(&mut self) -> Result<Vec<TerminalUser>> {
        match self {
            Self::Mock(session) => session.users().await,
        }
    }

    async fn info(&mut self) -> Result<TerminalInfo> {
        match self {
            Self::Mock(session) => session.info().await,
        }
    }

    async fn disconnect(self) -> Result<()> {
        match self {
            Self::Mock(session) => session.disconnect().await,
        }
    }
}
