//! zkfleet command-line interface.
//!
//! Runs the capture pipeline against the in-tree emulated fleet: an
//! emulated terminal is seeded per configured address and a background
//! task feeds it punches, so live capture, monitoring, search, and export
//! can all be exercised end to end without hardware.

use anyhow::Context;
use chrono::Local;
use clap::{ArgGroup, Parser};
use std::path::PathBuf;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::EnvFilter;
use zkfleet_capture::{
    AttendanceSearchOutcome, CaptureConfig, CaptureController, CaptureState, DeviceCheckOutcome,
    DeviceSearchOutcome, NameResolvingSink, RegistrySnapshot, UserQuery, check_fleet,
    export_snapshot, find_user, find_user_attendance, monitor_user,
};
use zkfleet_core::constants::DEFAULT_FLEET;
use zkfleet_core::{AttendanceRecord, DeviceAddress, TerminalInfo, TerminalUser, UserId};
use zkfleet_terminal::{AnyConnector, MockFleet};

#[derive(Parser)]
#[command(name = "zkfleet")]
#[command(version)]
#[command(about = "Live attendance capture for ZK terminal fleets", long_about = None)]
#[command(group(
    ArgGroup::new("mode")
        .required(true)
        .args(["live", "user", "find", "find_name", "check"])
))]
struct Args {
    /// Comma-separated device addresses (defaults to the built-in fleet)
    #[arg(short, long)]
    target: Option<String>,

    /// Start live capture on every device
    #[arg(short, long, default_value_t = false)]
    live: bool,

    /// Monitor one user id live across the fleet
    #[arg(short, long)]
    user: Option<String>,

    /// Search the fleet for a user id
    #[arg(long)]
    find: Option<String>,

    /// Search the fleet for users whose name contains this text
    #[arg(long)]
    find_name: Option<String>,

    /// Check every device's identity and data counts
    #[arg(short, long, default_value_t = false)]
    check: bool,

    /// Capture/monitor duration in seconds (live default: run until Ctrl-C)
    #[arg(long)]
    duration: Option<u64>,

    /// With --find: also sweep each machine's attendance log for the
    /// user's records from the last N days
    #[arg(long, requires = "find", conflicts_with_all = ["live", "user", "find_name", "check"])]
    days_back: Option<i64>,

    /// Export captured events when capture ends; optional path, otherwise
    /// a timestamp-derived filename
    #[arg(long, num_args = 0..=1, conflicts_with_all = ["find", "find_name", "check"])]
    export: Option<Option<PathBuf>>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let args = Args::parse();
    let devices = parse_fleet(args.target.as_deref())?;
    info!(devices = devices.len(), "fleet configured");

    let fleet = seed_demo_fleet(&devices);
    let connector = AnyConnector::Mock(fleet.connector());
    let config = CaptureConfig::default();

    if args.check {
        run_check(&connector, &devices, &config).await;
    } else if let Some(raw) = args.user.as_deref() {
        run_monitor(connector, config, &devices, raw, args.duration, args.export).await?;
    } else if let Some(raw) = args.find.as_deref() {
        let target = UserId::canonicalize(raw);
        run_find(&connector, &devices, &UserQuery::Id(target.clone()), &config).await;
        if let Some(days) = args.days_back {
            run_history(&connector, &devices, &target, days, &config).await;
        }
    } else if let Some(needle) = args.find_name.clone() {
        let query = UserQuery::Name(needle);
        run_find(&connector, &devices, &query, &config).await;
    } else {
        run_live(connector, config, &devices, args.duration, args.export).await?;
    }

    Ok(())
}

fn parse_fleet(target: Option<&str>) -> anyhow::Result<Vec<DeviceAddress>> {
    let raw: Vec<&str> = match target {
        Some(list) => list.split(',').map(str::trim).filter(|s| !s.is_empty()).collect(),
        None => DEFAULT_FLEET.to_vec(),
    };
    anyhow::ensure!(!raw.is_empty(), "no device addresses given");
    raw.into_iter()
        .map(|addr| DeviceAddress::new(addr).with_context(|| format!("bad address {addr:?}")))
        .collect()
}

async fn run_live(
    connector: AnyConnector,
    config: CaptureConfig,
    devices: &[DeviceAddress],
    duration: Option<u64>,
    export: Option<Option<PathBuf>>,
) -> anyhow::Result<()> {
    let mut controller = CaptureController::new(connector.clone(), config.clone());
    let sink = NameResolvingSink::new(connector, config.connect_timeout);
    controller
        .attach_sink(sink)
        .context("failed to attach event sink")?;
    let registry = controller.registry();

    controller.start_fleet(devices, None).await;

    match duration {
        Some(secs) => tokio::time::sleep(Duration::from_secs(secs)).await,
        None => {
            info!("capturing; press Ctrl-C to stop");
            tokio::signal::ctrl_c()
                .await
                .context("failed to listen for Ctrl-C")?;
        }
    }

    controller.shutdown().await;

    let snapshot = registry.snapshot();
    println!("\nCapture summary");
    for (device, state) in &snapshot {
        let stop = state
            .last_stop
            .map_or_else(|| "-".to_string(), |reason| reason.to_string());
        println!("  {device}: {} events ({stop})", state.events.len());
    }
    println!("  total: {} events", registry.total_events());

    if let Some(path) = export {
        match export_snapshot(&snapshot, path.as_deref())? {
            Some(written) => println!("exported to {}", written.display()),
            None => println!("nothing to export"),
        }
    }
    Ok(())
}

async fn run_monitor(
    connector: AnyConnector,
    config: CaptureConfig,
    devices: &[DeviceAddress],
    raw_user: &str,
    duration: Option<u64>,
    export: Option<Option<PathBuf>>,
) -> anyhow::Result<()> {
    let target = UserId::canonicalize(raw_user);
    let duration = Duration::from_secs(duration.unwrap_or(30));
    let matches = monitor_user(connector, config, devices, target.clone(), duration).await?;

    println!("\nMatches for user {target}");
    for event in &matches {
        println!(
            "  {} @ {} ({})",
            event.timestamp.format("%Y-%m-%d %H:%M:%S"),
            event.device,
            event.captured_at.format("%H:%M:%S"),
        );
    }
    println!("  total: {}", matches.len());

    if let Some(path) = export {
        let mut snapshot = RegistrySnapshot::new();
        for event in &matches {
            snapshot
                .entry(event.device.clone())
                .or_insert_with(CaptureState::default)
                .events
                .push(event.clone());
        }
        match export_snapshot(&snapshot, path.as_deref())? {
            Some(written) => println!("exported to {}", written.display()),
            None => println!("nothing to export"),
        }
    }
    Ok(())
}

async fn run_history(
    connector: &AnyConnector,
    devices: &[DeviceAddress],
    target: &UserId,
    days_back: i64,
    config: &CaptureConfig,
) {
    let cutoff = Local::now() - chrono::Duration::days(days_back);
    let report =
        find_user_attendance(connector, devices, target, cutoff, config.connect_timeout).await;

    println!("\nAttendance for user {target} (last {days_back} days)");
    for (device, outcome) in &report {
        match outcome {
            AttendanceSearchOutcome::Records(records) => {
                for record in records {
                    println!(
                        "  {device}: {} status={} punch={}",
                        record.timestamp.format("%Y-%m-%d %H:%M:%S"),
                        record.status,
                        record.punch,
                    );
                }
                println!("  {device}: {} record(s)", records.len());
            }
            AttendanceSearchOutcome::NotEnrolled => println!("  {device}: not enrolled"),
            AttendanceSearchOutcome::ConnectionFailed(message) => {
                println!("  {device}: unreachable ({message})");
            }
        }
    }
}

async fn run_find(
    connector: &AnyConnector,
    devices: &[DeviceAddress],
    query: &UserQuery,
    config: &CaptureConfig,
) {
    let report = find_user(connector, devices, query, config.connect_timeout).await;
    println!("\nSearch results for {query}");
    for (device, outcome) in &report {
        match outcome {
            DeviceSearchOutcome::Found(users) => {
                for user in users {
                    println!(
                        "  {device}: uid={} id={} name={:?} privilege={}",
                        user.uid, user.user_id, user.name, user.privilege
                    );
                }
            }
            DeviceSearchOutcome::NotFound => println!("  {device}: not found"),
            DeviceSearchOutcome::ConnectionFailed(message) => {
                println!("  {device}: unreachable ({message})");
            }
        }
    }
}

async fn run_check(connector: &AnyConnector, devices: &[DeviceAddress], config: &CaptureConfig) {
    let report = check_fleet(connector, devices, config.connect_timeout).await;
    println!("\nFleet status");
    for (device, outcome) in &report {
        match outcome {
            DeviceCheckOutcome::Online(status) => println!(
                "  {device}: {} sn={} fw={} users={} records={}",
                status.info.name,
                status.info.serial,
                status.info.firmware,
                status.user_count,
                status.attendance_count,
            ),
            DeviceCheckOutcome::Offline(message) => {
                println!("  {device}: offline ({message})");
            }
        }
    }
}

/// Build the emulated fleet: one seeded terminal per address plus a
/// background task that keeps feeding punches so live modes have traffic.
fn seed_demo_fleet(devices: &[DeviceAddress]) -> MockFleet {
    let fleet = MockFleet::new();

    // Raw ids carry the padding quirks real terminals exhibit.
    let roster = [
        ("042", "Ana Souza"),
        ("7", "Bruno Lima"),
        ("00015", "Carla Mendes"),
        ("23", "Diego Alves"),
    ];

    for (index, device) in devices.iter().enumerate() {
        fleet.add_device_with_info(
            device.clone(),
            TerminalInfo::new(
                format!("ZK-F18-{index}"),
                format!("SN{:04}", 1000 + index),
                "Ver 6.60",
                "ZMM220",
            ),
        );
        fleet.set_users(
            device,
            roster
                .iter()
                .enumerate()
                .map(|(slot, (user_id, name))| TerminalUser {
                    uid: slot as u16 + 1,
                    user_id: (*user_id).to_string(),
                    name: (*name).to_string(),
                    privilege: 0,
                    password: String::new(),
                    group_id: String::new(),
                    card: 0,
                })
                .collect(),
        );
    }

    {
        let fleet = fleet.clone();
        let devices = devices.to_vec();
        tokio::spawn(async move {
            let mut tick = 0usize;
            loop {
                tokio::time::sleep(Duration::from_secs(3)).await;
                let device = &devices[tick % devices.len()];
                let (user_id, _) = roster[tick % roster.len()];
                fleet.push_punch(
                    device,
                    AttendanceRecord {
                        user_id: user_id.to_string(),
                        timestamp: Local::now(),
                        status: 1,
                        punch: (tick % 2) as u16,
                    },
                );
                tick += 1;
            }
        });
    }

    fleet
}
