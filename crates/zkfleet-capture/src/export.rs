//! Plain-text export of a capture snapshot.
//!
//! The report is deterministic for a given snapshot: devices appear in
//! address order, events in capture order, and a trailing total counts
//! events across the whole fleet. Writes go through a temp file and an
//! atomic rename so a crash never leaves a truncated report behind.

use crate::error::{CaptureError, Result};
use crate::registry::RegistrySnapshot;
use chrono::Local;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Render the export report, or `None` when no device has any events.
#[must_use]
pub fn render_report(snapshot: &RegistrySnapshot) -> Option<String> {
    let total_events: usize = snapshot.values().map(|s| s.events.len()).sum();
    if total_events == 0 {
        return None;
    }

    let mut report = String::new();
    report.push_str("LIVE CAPTURE DATA EXPORT\n");
    report.push_str(&format!(
        "Exported at: {}\n",
        Local::now().format("%Y-%m-%d %H:%M:%S")
    ));
    report.push_str(&"=".repeat(50));
    report.push_str("\n\n");

    for (device, state) in snapshot {
        if state.events.is_empty() {
            continue;
        }
        report.push_str(&format!("MACHINE: {device}\n"));
        report.push_str(&"-".repeat(30));
        report.push('\n');
        for event in &state.events {
            report.push_str(&format!(
                "Time: {} | User: {} | Status: {} | Punch: {}\n",
                event.timestamp.format("%Y-%m-%d %H:%M:%S"),
                event.user_id,
                event.status,
                event.punch,
            ));
        }
        report.push('\n');
    }

    report.push_str(&format!("Total Events: {total_events}\n"));
    Some(report)
}

/// Derive the default export filename from the current local time.
#[must_use]
pub fn default_export_path() -> PathBuf {
    PathBuf::from(format!(
        "live_capture_{}.txt",
        Local::now().format("%Y%m%d_%H%M%S")
    ))
}

/// Export a snapshot to `path` (or a timestamp-derived default).
///
/// Returns the written path, or `Ok(None)` with a warning when there is
/// nothing to export.
pub fn export_snapshot(
    snapshot: &RegistrySnapshot,
    path: Option<&Path>,
) -> Result<Option<PathBuf>> {
    let Some(report) = render_report(snapshot) else {
        warn!("no captured events; export skipped");
        return Ok(None);
    };

    let path = path.map_or_else(default_export_path, Path::to_path_buf);
    write_atomic(&path, &report)?;

    let total: usize = snapshot.values().map(|s| s.events.len()).sum();
    info!(path = %path.display(), events = total, "capture data exported");
    Ok(Some(path))
}

// Write to a sibling temp file, then rename into place. A failed rename
// removes the temp file so neither path holds a partial report.
fn write_atomic(path: &Path, contents: &str) -> Result<()> {
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);

    std::fs::write(&tmp, contents).map_err(|e| CaptureError::export_io(&tmp, e))?;
    std::fs::rename(&tmp, path).map_err(|e| {
        let _ = std::fs::remove_file(&tmp);
        CaptureError::export_io(path, e)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::CaptureRegistry;
    use chrono::Local;
    use zkfleet_core::{AttendanceRecord, CapturedEvent, DeviceAddress};

    fn addr(s: &str) -> DeviceAddress {
        DeviceAddress::new(s).unwrap()
    }

    fn event(device: &DeviceAddress, user: &str) -> CapturedEvent {
        CapturedEvent::ingest(
            device.clone(),
            &AttendanceRecord {
                user_id: user.to_string(),
                timestamp: Local::now(),
                status: 1,
                punch: 0,
            },
        )
    }

    fn snapshot_two_devices() -> RegistrySnapshot {
        let registry = CaptureRegistry::new();
        let busy = addr("10.0.0.1");
        let idle = addr("10.0.0.2");
        registry.append_events(&busy, &[event(&busy, "1"), event(&busy, "2")]);
        registry.ensure(&idle);
        registry.snapshot()
    }

    #[test]
    fn test_report_skips_eventless_devices() {
        let report = render_report(&snapshot_two_devices()).unwrap();
        assert_eq!(report.matches("MACHINE:").count(), 1);
        assert!(report.contains("MACHINE: 10.0.0.1"));
        assert!(!report.contains("10.0.0.2"));
        assert!(report.ends_with("Total Events: 2\n"));
    }

    #[test]
    fn test_report_layout() {
        let report = render_report(&snapshot_two_devices()).unwrap();
        assert!(report.starts_with("LIVE CAPTURE DATA EXPORT\n"));
        assert!(report.contains(&"=".repeat(50)));
        assert!(report.contains(&"-".repeat(30)));
        assert_eq!(report.matches("| Punch: 0").count(), 2);
    }

    #[test]
    fn test_empty_snapshot_renders_nothing() {
        let registry = CaptureRegistry::new();
        registry.ensure(&addr("10.0.0.1"));
        assert!(render_report(&registry.snapshot()).is_none());
        assert!(
            export_snapshot(&registry.snapshot(), None)
                .unwrap()
                .is_none()
        );
    }

    #[test]
    fn test_export_writes_file() {
        let dir = std::env::temp_dir().join("zkfleet-export-test");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("report.txt");

        let written = export_snapshot(&snapshot_two_devices(), Some(&path))
            .unwrap()
            .unwrap();
        assert_eq!(written, path);
        let contents = std::fs::read_to_string(&path).unwrap();
        assert!(contents.ends_with("Total Events: 2\n"));

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_export_to_missing_directory_fails_cleanly() {
        let dir = std::env::temp_dir().join("zkfleet-export-missing-dir-test");
        let _ = std::fs::remove_dir_all(&dir);
        let path = dir.join("report.txt");

        let result = export_snapshot(&snapshot_two_devices(), Some(&path));
        assert!(matches!(
            result,
            Err(crate::error::CaptureError::ExportIo { .. })
        ));
        assert!(!path.exists());
    }

    #[test]
    fn test_failed_rename_leaves_no_temp_file() {
        let dir = std::env::temp_dir().join("zkfleet-export-rename-fail-test");
        let _ = std::fs::remove_dir_all(&dir);
        // The target path is an occupied directory, so the final rename
        // cannot succeed even though the temp write does.
        let path = dir.join("report.txt");
        std::fs::create_dir_all(path.join("occupied")).unwrap();

        let result = export_snapshot(&snapshot_two_devices(), Some(&path));
        assert!(matches!(
            result,
            Err(crate::error::CaptureError::ExportIo { .. })
        ));
        assert!(!dir.join("report.txt.tmp").exists());

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_default_path_shape() {
        let path = default_export_path();
        let name = path.file_name().unwrap().to_str().unwrap();
        assert!(name.starts_with("live_capture_"));
        assert!(name.ends_with(".txt"));
    }
}
