//! Linux platform implementation
//!
//! This module reads process information from the /proc filesystem through
//! the procfs crate. Per-process reads run on rayon's pool.

use procfs::net::TcpState;
use procfs::process::{FDTarget, Process};
use procfs::{Current, Meminfo};
use rayon::prelude::*;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Instant;
use tracing::debug;

use super::error::ProviderError;
use super::parse::is_env_var_key;
use super::SnapshotProvider;
use crate::core::{Connection, DetailedInfo, ProcessRecord};

/// Values read from /proc for one process, before CPU% is known
struct RawProcess {
    pid: i32,
    ppid: i32,
    comm: String,
    command: String,
    uid: Option<u32>,
    state: char,
    /// utime + stime in clock ticks
    ticks: u64,
    /// Start time in clock ticks after boot
    starttime: u64,
    rss_bytes: u64,
}

/// Per-process CPU ticks from the previous scan
struct CpuSample {
    taken_at: Instant,
    ticks: HashMap<i32, u64>,
}

/// Recent samples kept as CPU baselines
const SAMPLE_HISTORY: usize = 4;

/// Snapshot provider backed by /proc
///
/// Fetches may overlap and finish out of order, so recent samples are kept
/// sorted by time and each scan measures against the newest one older than
/// itself.
pub struct LinuxProvider {
    samples: Mutex<Vec<Arc<CpuSample>>>,
    users: Mutex<HashMap<u32, String>>,
}

impl LinuxProvider {
    pub fn new() -> Self {
        LinuxProvider {
            samples: Mutex::new(Vec::new()),
            users: Mutex::new(HashMap::new()),
        }
    }

    /// Resolve a uid to a user name, caching lookups
    fn username(&self, uid: Option<u32>) -> String {
        let Some(uid) = uid else {
            return String::new();
        };
        let lookup = || {
            users::get_user_by_uid(uid)
                .map(|u| u.name().to_string_lossy().into_owned())
                .unwrap_or_else(|| uid.to_string())
        };
        match self.users.lock() {
            Ok(mut cache) => cache.entry(uid).or_insert_with(lookup).clone(),
            Err(_) => lookup(),
        }
    }

    /// Newest sample taken before `now`
    fn baseline(&self, now: Instant) -> Option<Arc<CpuSample>> {
        let samples = self.samples.lock().ok()?;
        samples.iter().rev().find(|s| s.taken_at < now).cloned()
    }

    fn store_sample(&self, sample: CpuSample) {
        if let Ok(mut samples) = self.samples.lock() {
            let at = samples.partition_point(|s| s.taken_at <= sample.taken_at);
            samples.insert(at, Arc::new(sample));
            if samples.len() > SAMPLE_HISTORY {
                let excess = samples.len() - SAMPLE_HISTORY;
                samples.drain(..excess);
            }
        }
    }

    /// Turn raw reads taken at `now` into records, measuring CPU against the
    /// newest earlier sample, then record this scan as a sample.
    fn build_records(
        &self,
        raw: Vec<RawProcess>,
        clock: &SystemClock,
        now: Instant,
    ) -> Vec<ProcessRecord> {
        let previous = self.baseline(now);
        let elapsed = previous
            .as_ref()
            .map(|s| now.duration_since(s.taken_at).as_secs_f64())
            .unwrap_or(0.0);

        let mut ticks = HashMap::with_capacity(raw.len());
        let mut records = Vec::with_capacity(raw.len());
        for p in raw {
            let prev = previous.as_ref().and_then(|s| s.ticks.get(&p.pid).copied());
            ticks.insert(p.pid, p.ticks);
            records.push(ProcessRecord {
                pid: p.pid,
                ppid: p.ppid,
                cpu: cpu_percent(p.ticks, prev, elapsed, p.starttime, clock),
                mem: clock.mem_percent(p.rss_bytes),
                user: self.username(p.uid),
                state: p.state.to_string(),
                name: p.comm,
                command: p.command,
            });
        }

        self.store_sample(CpuSample {
            taken_at: now,
            ticks,
        });
        records
    }
}

impl Default for LinuxProvider {
    fn default() -> Self {
        Self::new()
    }
}

/// System-wide values needed to turn ticks and pages into percentages
struct SystemClock {
    ticks_per_second: f64,
    uptime_secs: f64,
    total_mem_bytes: f64,
}

impl SystemClock {
    fn read() -> Self {
        SystemClock {
            ticks_per_second: procfs::ticks_per_second() as f64,
            uptime_secs: procfs::Uptime::current()
                .map(|u| u.uptime)
                .unwrap_or(0.0),
            total_mem_bytes: Meminfo::current().map(|m| m.mem_total).unwrap_or(0) as f64,
        }
    }

    fn mem_percent(&self, rss_bytes: u64) -> f64 {
        if self.total_mem_bytes > 0.0 {
            rss_bytes as f64 / self.total_mem_bytes * 100.0
        } else {
            0.0
        }
    }
}

/// CPU usage of a process.
///
/// With a previous sample this is the tick delta over the elapsed wall time;
/// without one it is the average since the process started, as `ps` reports.
fn cpu_percent(
    ticks: u64,
    previous_ticks: Option<u64>,
    elapsed_secs: f64,
    starttime: u64,
    clock: &SystemClock,
) -> f64 {
    if clock.ticks_per_second <= 0.0 {
        return 0.0;
    }
    match previous_ticks {
        Some(prev) if elapsed_secs > 0.0 => {
            ticks.saturating_sub(prev) as f64 / clock.ticks_per_second / elapsed_secs * 100.0
        }
        _ => {
            let age = clock.uptime_secs - starttime as f64 / clock.ticks_per_second;
            if age > 0.0 {
                ticks as f64 / clock.ticks_per_second / age * 100.0
            } else {
                0.0
            }
        }
    }
}

fn read_process(proc: &Process, page_size: u64) -> Option<RawProcess> {
    let stat = proc.stat().ok()?;

    // Kernel threads have no command line
    let command = match proc.cmdline() {
        Ok(args) if !args.is_empty() => args.join(" "),
        _ => format!("[{}]", stat.comm),
    };

    Some(RawProcess {
        pid: stat.pid,
        ppid: stat.ppid,
        command,
        uid: proc.uid().ok(),
        state: stat.state,
        ticks: stat.utime + stat.stime,
        starttime: stat.starttime,
        rss_bytes: stat.rss * page_size,
        comm: stat.comm,
    })
}

/// TCP state as lsof prints it
#[allow(unreachable_patterns)]
fn tcp_state_name(state: &TcpState) -> &'static str {
    match state {
        TcpState::Established => "ESTABLISHED",
        TcpState::SynSent => "SYN_SENT",
        TcpState::SynRecv => "SYN_RECV",
        TcpState::FinWait1 => "FIN_WAIT1",
        TcpState::FinWait2 => "FIN_WAIT2",
        TcpState::TimeWait => "TIME_WAIT",
        TcpState::Close => "CLOSE",
        TcpState::CloseWait => "CLOSE_WAIT",
        TcpState::LastAck => "LAST_ACK",
        TcpState::Listen => "LISTEN",
        TcpState::Closing => "CLOSING",
        TcpState::NewSynRecv => "NEW_SYN_RECV",
        _ => "UNKNOWN",
    }
}

/// TCP and UDP sockets whose inode is one of `inodes`
fn socket_connections(inodes: &HashSet<u64>) -> Vec<Connection> {
    let mut conns = Vec::new();
    if inodes.is_empty() {
        return conns;
    }

    let remote = |addr: SocketAddr| {
        if addr.port() == 0 {
            String::new()
        } else {
            addr.to_string()
        }
    };

    let tcp = procfs::net::tcp()
        .into_iter()
        .flatten()
        .chain(procfs::net::tcp6().into_iter().flatten());
    for entry in tcp.filter(|e| inodes.contains(&e.inode)) {
        conns.push(Connection {
            protocol: "TCP".to_string(),
            local_addr: entry.local_address.to_string(),
            remote_addr: remote(entry.remote_address),
            state: tcp_state_name(&entry.state).to_string(),
        });
    }

    let udp = procfs::net::udp()
        .into_iter()
        .flatten()
        .chain(procfs::net::udp6().into_iter().flatten());
    for entry in udp.filter(|e| inodes.contains(&e.inode)) {
        conns.push(Connection {
            protocol: "UDP".to_string(),
            local_addr: entry.local_address.to_string(),
            remote_addr: remote(entry.remote_address),
            state: String::new(),
        });
    }

    conns
}

/// Distinct local ports of a set of connections, in first-seen order
fn local_ports(conns: &[Connection]) -> Vec<u16> {
    let mut ports = Vec::new();
    for conn in conns {
        let port = conn
            .local_addr
            .parse::<SocketAddr>()
            .map(|a| a.port())
            .unwrap_or(0);
        if port > 0 && !ports.contains(&port) {
            ports.push(port);
        }
    }
    ports
}

impl SnapshotProvider for LinuxProvider {
    fn fetch_all(&self) -> Result<Vec<ProcessRecord>, ProviderError> {
        let procs: Vec<Process> = procfs::process::all_processes()?
            .filter_map(|p| p.ok())
            .collect();

        let page_size = procfs::page_size();
        let clock = SystemClock::read();

        let raw: Vec<RawProcess> = procs
            .par_iter()
            .filter_map(|p| read_process(p, page_size))
            .collect();

        let records = self.build_records(raw, &clock, Instant::now());

        debug!(count = records.len(), "scanned /proc");
        Ok(records)
    }

    fn fetch_detail(&self, pid: i32) -> Result<DetailedInfo, ProviderError> {
        let proc = Process::new(pid).map_err(|_| ProviderError::NotFound(pid))?;
        let stat = proc.stat()?;
        let clock = SystemClock::read();

        let ticks = stat.utime + stat.stime;
        let rss_bytes = stat.rss * procfs::page_size();

        let inodes: HashSet<u64> = proc
            .fd()
            .map(|fds| {
                fds.filter_map(|fd| fd.ok())
                    .filter_map(|fd| match fd.target {
                        FDTarget::Socket(inode) => Some(inode),
                        _ => None,
                    })
                    .collect()
            })
            .unwrap_or_default();
        let connections = socket_connections(&inodes);

        let children: Vec<i32> = procfs::process::all_processes()?
            .filter_map(|p| p.ok())
            .filter_map(|p| p.stat().ok())
            .filter(|s| s.ppid == pid && s.pid != pid)
            .map(|s| s.pid)
            .collect();

        let env_vars: BTreeMap<String, String> = proc
            .environ()
            .map(|env| {
                env.into_iter()
                    .filter_map(|(k, v)| {
                        let key = k.to_string_lossy().into_owned();
                        is_env_var_key(&key).then(|| (key, v.to_string_lossy().into_owned()))
                    })
                    .collect()
            })
            .unwrap_or_default();

        Ok(DetailedInfo {
            pid,
            user: self.username(proc.uid().ok()),
            cpu: cpu_percent(ticks, None, 0.0, stat.starttime, &clock),
            mem: clock.mem_percent(rss_bytes),
            open_files: proc.fd_count().unwrap_or(0),
            ports: local_ports(&connections),
            children,
            connections,
            env_vars,
            name: stat.comm,
        })
    }
}
