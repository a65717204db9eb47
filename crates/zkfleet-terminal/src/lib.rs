//! Terminal communication seam for the zkfleet capture agent.
//!
//! This crate defines the contract between the capture core and networked
//! attendance terminals: a connector that opens bounded-timeout sessions,
//! and a session that fetches the attendance log, enrolled users, and
//! device identification. The actual wire protocol is an external
//! collaborator — this crate ships the trait seam plus a scriptable mock
//! fleet used by tests and by the CLI when no hardware is available.
//!
//! # Design
//!
//! - **Async-first**: native `async fn` in traits (Rust 1.90 + Edition
//!   2024 RPITIT), no `async_trait` macro.
//! - **Enum dispatch**: the traits are not object-safe, so the
//!   [`connectors`] module provides `AnyConnector` / `AnySession` wrappers
//!   for concrete, zero-cost dispatch.
//! - **Error-aware**: every operation returns [`Result<T>`] with a
//!   taxonomy the capture layer keys its retry policy on.

pub mod connectors;
pub mod error;
pub mod mock;
pub mod traits;

pub use connectors::{AnyConnector, AnySession};
pub use error::{Result, TerminalError};
pub use mock::{MockConnector, MockFleet, MockSession};
pub use traits::{TerminalConnector, TerminalSession};
