//! Non-interactive subcommands
//!
//! Each subcommand takes one snapshot (or polls, for `watch`), prints it as
//! a table or as JSON, and exits.

mod output;

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{anyhow, bail, Context, Result};
use clap::Subcommand;
use tracing::{debug, warn};

use crate::core::{build_forest, sort_records, ProcessRecord, SortKey};
use crate::platform::{
    diagnostic_dirs, list_reports, report_detail, Signal, SnapshotProvider, DEFAULT_WINDOW,
};

pub use output::*;

#[derive(Subcommand, Debug)]
pub enum CliCommand {
    /// List all running processes
    List {
        /// Sort by: cpu, mem, pid, name
        #[arg(long, default_value = "cpu")]
        sort: String,

        /// Only show processes of this user
        #[arg(long)]
        user: Option<String>,
    },

    /// Show the top processes by CPU usage
    Top {
        /// Number of processes to show
        #[arg(short = 'n', default_value_t = 10)]
        n: usize,

        /// Mark battery-draining processes (CPU > 10%)
        #[arg(long)]
        battery: bool,

        /// Output format: spark (inline bars for CPU and memory)
        #[arg(long)]
        format: Option<String>,
    },

    /// Find processes whose name or command contains QUERY
    Find { query: String },

    /// Show the process tree
    Tree,

    /// Show detailed information about a process
    Info { pid: i32 },

    /// Send a signal to a process (SIGTERM unless told otherwise)
    Kill {
        pid: i32,

        /// Send SIGKILL instead of SIGTERM
        #[arg(short, long)]
        force: bool,

        /// Signal to send, e.g. HUP or SIGUSR1
        #[arg(long)]
        signal: Option<String>,
    },

    /// Show developer processes grouped by stack
    Dev,

    /// Watch one process, or all processes for threshold alerts
    Watch {
        pid: Option<i32>,

        /// Refresh interval in seconds
        #[arg(long, default_value_t = 2)]
        interval: u64,

        /// Exit with an error when any process exceeds a threshold
        #[arg(long)]
        alert: bool,

        /// CPU threshold percentage (with --alert)
        #[arg(long, default_value_t = 0.0)]
        cpu: f64,

        /// Memory threshold percentage (with --alert)
        #[arg(long, default_value_t = 0.0)]
        mem: f64,
    },

    /// Show recent crash reports, app hangs, spins and kernel panics
    Crashes {
        /// Time window, e.g. 24h, 7d, 30d
        #[arg(long, default_value = DEFAULT_WINDOW)]
        last: String,

        /// Only show reports for this process
        #[arg(long)]
        process: Option<String>,

        #[command(subcommand)]
        action: Option<CrashesAction>,
    },
}

#[derive(Subcommand, Debug)]
pub enum CrashesAction {
    /// Show details of one report
    Info { path: PathBuf },
}

/// Run a subcommand. `running` is cleared by SIGINT/SIGTERM and stops `watch`.
pub fn run(
    command: CliCommand,
    json: bool,
    provider: &dyn SnapshotProvider,
    running: &AtomicBool,
) -> Result<()> {
    debug!(?command, json, "running subcommand");

    match command {
        CliCommand::List { sort, user } => {
            let key = parse_sort_key(&sort)?;
            let mut procs = provider
                .fetch_all()
                .context("failed to list processes")?;
            if let Some(user) = user {
                procs.retain(|p| p.user == user);
            }
            sort_records(&mut procs, key);
            if json {
                return print_json(&procs);
            }
            print!("{}", process_table(&procs, false));
        }

        CliCommand::Top { n, battery, format } => {
            let procs = provider
                .fetch_top(n)
                .context("failed to get top processes")?;
            if json {
                return print_json(&procs);
            }
            match format.as_deref() {
                Some("spark") => print!("{}", spark_table(&procs)),
                Some(other) => bail!("unknown format: {} (use spark)", other),
                None => print!("{}", process_table(&procs, battery)),
            }
        }

        CliCommand::Find { query } => {
            let procs = provider
                .fetch_all()
                .context("failed to find processes")?;
            let found = find(&procs, &query);
            if json {
                return print_json(&found);
            }
            if found.is_empty() {
                println!("No processes found matching {:?}", query);
            } else {
                print!("{}", process_table(&found, false));
            }
        }

        CliCommand::Tree => {
            let procs = provider
                .fetch_all()
                .context("failed to build process tree")?;
            let forest = build_forest(&procs);
            if json {
                return print_json(&forest);
            }
            print!("{}", tree_text(&forest));
        }

        CliCommand::Info { pid } => {
            let detail = provider
                .fetch_detail(pid)
                .context("failed to get process info")?;
            if json {
                return print_json(&detail);
            }
            print!("{}", info_text(&detail));
        }

        CliCommand::Kill { pid, force, signal } => {
            let sig = match signal {
                Some(name) => Signal::from_name(&name)?,
                None if force => Signal::Kill,
                None => Signal::Term,
            };
            provider
                .send_signal(pid, sig)
                .context("failed to kill process")?;
            println!("Sent {} to PID {}", sig, pid);
        }

        CliCommand::Dev => {
            let groups = provider
                .fetch_groups()
                .context("failed to group processes")?;
            if json {
                return print_json(&groups);
            }
            print!("{}", dev_text(&groups));
        }

        CliCommand::Watch {
            pid,
            interval,
            alert,
            cpu,
            mem,
        } => {
            let interval = Duration::from_secs(interval.max(1));
            if alert {
                return watch_alerts(provider, interval, cpu, mem, json, running);
            }
            let pid = pid.ok_or_else(|| {
                anyhow!("PID argument required (or use --alert for threshold monitoring)")
            })?;
            if json {
                let detail = provider
                    .fetch_detail(pid)
                    .with_context(|| format!("process {} not found or inaccessible", pid))?;
                return print_json(&detail);
            }
            return watch_pid(provider, pid, interval, running);
        }

        CliCommand::Crashes {
            action: Some(CrashesAction::Info { path }),
            ..
        } => return show_crash_detail(&path, json),

        CliCommand::Crashes { last, process, .. } => {
            return show_crashes(&diagnostic_dirs(), &last, process.as_deref(), json);
        }
    }

    Ok(())
}

fn show_crashes(
    dirs: &[PathBuf],
    last: &str,
    process: Option<&str>,
    json: bool,
) -> Result<()> {
    let reports = list_reports(dirs, last, process).context("failed to list crash reports")?;
    if json {
        return print_json(&reports);
    }
    match (reports.is_empty(), process) {
        (true, Some(name)) => println!("No crash reports found for {:?} in the last {}", name, last),
        (true, None) => println!("No crash reports found in the last {}", last),
        (false, _) => print!("{}", crash_table(&reports)),
    }
    Ok(())
}

fn show_crash_detail(path: &Path, json: bool) -> Result<()> {
    let detail = report_detail(path).context("failed to read crash report")?;
    if json {
        return print_json(&detail);
    }
    print!("{}", crash_detail_text(&detail));
    Ok(())
}

fn parse_sort_key(name: &str) -> Result<SortKey> {
    SortKey::from_name(name)
        .ok_or_else(|| anyhow!("unknown sort key: {} (use cpu, mem, pid, name)", name))
}

/// Processes whose name or command contains `query`, ignoring case
pub fn find(procs: &[ProcessRecord], query: &str) -> Vec<ProcessRecord> {
    let query = query.to_lowercase();
    procs
        .iter()
        .filter(|p| {
            p.name.to_lowercase().contains(&query) || p.command.to_lowercase().contains(&query)
        })
        .cloned()
        .collect()
}

/// Sleep for `duration` unless `running` is cleared first.
/// Returns whether the caller should keep going.
fn sleep_while_running(duration: Duration, running: &AtomicBool) -> bool {
    let deadline = Instant::now() + duration;
    loop {
        if !running.load(Ordering::SeqCst) {
            return false;
        }
        let now = Instant::now();
        if now >= deadline {
            return true;
        }
        thread::sleep((deadline - now).min(Duration::from_millis(100)));
    }
}

fn watch_pid(
    provider: &dyn SnapshotProvider,
    pid: i32,
    interval: Duration,
    running: &AtomicBool,
) -> Result<()> {
    let header = format!(
        "Watching PID {} (interval: {}s). Press Ctrl+C to stop.\n",
        pid,
        interval.as_secs()
    );
    println!("{}", header);

    loop {
        let detail = provider
            .fetch_detail(pid)
            .with_context(|| format!("process {} not found or inaccessible", pid))?;
        print!("{}", info_text(&detail));
        println!("\nLast updated: {}", chrono::Local::now().format("%H:%M:%S"));

        if !sleep_while_running(interval, running) {
            println!("\nStopped watching.");
            return Ok(());
        }

        // Clear the screen before redrawing
        print!("\x1b[H\x1b[2J");
        println!("{}", header);
    }
}

fn watch_alerts(
    provider: &dyn SnapshotProvider,
    interval: Duration,
    cpu_limit: f64,
    mem_limit: f64,
    json: bool,
    running: &AtomicBool,
) -> Result<()> {
    if cpu_limit <= 0.0 && mem_limit <= 0.0 {
        bail!("--alert requires at least one of --cpu or --mem to be set");
    }

    if !json {
        println!(
            "Watching for alerts ({}, interval: {}s). Press Ctrl+C to stop.",
            thresholds_text(cpu_limit, mem_limit),
            interval.as_secs()
        );
    }

    loop {
        match provider.fetch_all() {
            Ok(procs) => {
                let now = chrono::Local::now().to_rfc3339();
                if let Some(alert) = check_thresholds(&procs, cpu_limit, mem_limit, &now) {
                    if json {
                        print_json(&alert)?;
                    } else {
                        print!("{}", alert_text(&alert));
                    }
                    return Err(anyhow!("threshold exceeded"));
                }
            }
            Err(e) => warn!(error = %e, "snapshot failed, retrying next interval"),
        }

        if !sleep_while_running(interval, running) {
            if !json {
                println!("\nStopped watching.");
            }
            return Ok(());
        }
    }
}
