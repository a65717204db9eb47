//! Targeted live monitor for a single user across the fleet.
//!
//! Built on the capture pipeline: a private controller runs workers over
//! the whole fleet with a [`TargetUserSink`] attached, collects only the
//! matching events, and tears everything down before returning. No worker
//! it started outlives the call.

use crate::config::CaptureConfig;
use crate::controller::CaptureController;
use crate::error::Result;
use crate::sink::TargetUserSink;
use std::future::Future;
use std::time::Duration;
use tracing::info;
use zkfleet_core::{CapturedEvent, DeviceAddress, UserId};
use zkfleet_terminal::AnyConnector;

/// Monitor `target` across `fleet` until `stop` resolves.
///
/// Returns the matched events in capture order. Matching is canonical, so
/// zero-padded device-side ids still hit (see [`UserId::canonicalize`]).
pub async fn monitor_user_until<F>(
    connector: AnyConnector,
    config: CaptureConfig,
    fleet: &[DeviceAddress],
    target: UserId,
    stop: F,
) -> Result<Vec<CapturedEvent>>
where
    F: Future<Output = ()>,
{
    info!(user = %target, devices = fleet.len(), "starting targeted monitor");

    let mut controller = CaptureController::new(connector, config);
    let (sink, mut matches_rx) = TargetUserSink::new(target.clone());
    controller.attach_sink(sink)?;
    controller.start_fleet(fleet, None).await;

    let mut matches = Vec::new();
    tokio::pin!(stop);
    loop {
        tokio::select! {
            () = &mut stop => break,
            maybe_event = matches_rx.recv() => match maybe_event {
                Some(event) => matches.push(event),
                None => break,
            },
        }
    }

    controller.shutdown().await;

    // Pick up matches that raced with the stop signal.
    while let Ok(event) = matches_rx.try_recv() {
        matches.push(event);
    }

    info!(user = %target, matches = matches.len(), "targeted monitor finished");
    Ok(matches)
}

/// Monitor `target` across `fleet` for a fixed duration.
pub async fn monitor_user(
    connector: AnyConnector,
    config: CaptureConfig,
    fleet: &[DeviceAddress],
    target: UserId,
    duration: Duration,
) -> Result<Vec<CapturedEvent>> {
    monitor_user_until(
        connector,
        config,
        fleet,
        target,
        tokio::time::sleep(duration),
    )
    .await
}
