//! Process module
//!
//! This module contains the process record produced by a snapshot provider,
//! the sort keys, and the process table that derives the filtered view.

use serde::Serialize;
use std::collections::BTreeMap;

/// Sort key for the process list
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SortKey {
    #[default]
    Cpu,
    Mem,
    Pid,
    Name,
}

impl SortKey {
    /// Get the name used in the settings file and on the command line
    pub fn name(self) -> &'static str {
        match self {
            SortKey::Cpu => "cpu",
            SortKey::Mem => "mem",
            SortKey::Pid => "pid",
            SortKey::Name => "name",
        }
    }

    /// Column title shown in the list header
    pub fn title(self) -> &'static str {
        match self {
            SortKey::Cpu => "CPU%",
            SortKey::Mem => "MEM%",
            SortKey::Pid => "PID",
            SortKey::Name => "NAME",
        }
    }

    /// Parse a sort key name (case-insensitive)
    pub fn from_name(name: &str) -> Option<Self> {
        Self::all()
            .iter()
            .copied()
            .find(|k| k.name().eq_ignore_ascii_case(name))
    }

    pub fn all() -> &'static [SortKey] {
        &[SortKey::Cpu, SortKey::Mem, SortKey::Pid, SortKey::Name]
    }

    /// Order two records by this key.
    /// CPU and MEM sort descending, PID and NAME ascending, NAME ignores case.
    pub fn compare(self, a: &ProcessRecord, b: &ProcessRecord) -> std::cmp::Ordering {
        match self {
            SortKey::Cpu => b.cpu.total_cmp(&a.cpu),
            SortKey::Mem => b.mem.total_cmp(&a.mem),
            SortKey::Pid => a.pid.cmp(&b.pid),
            SortKey::Name => a.name.to_lowercase().cmp(&b.name.to_lowercase()),
        }
    }
}

/// One process as reported by the OS at sample time
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProcessRecord {
    pub pid: i32,
    pub ppid: i32,
    pub name: String,
    pub command: String,
    pub user: String,
    pub cpu: f64,
    pub mem: f64,
    pub state: String,
}

impl ProcessRecord {
    pub fn new(pid: i32, ppid: i32, name: &str) -> Self {
        ProcessRecord {
            pid,
            ppid,
            name: name.to_string(),
            command: name.to_string(),
            user: String::new(),
            cpu: 0.0,
            mem: 0.0,
            state: String::new(),
        }
    }

    /// Case-insensitive substring match on name, command, user or PID.
    /// `query` must already be lowercase.
    pub fn matches(&self, query: &str) -> bool {
        if query.is_empty() {
            return true;
        }
        self.name.to_lowercase().contains(query)
            || self.command.to_lowercase().contains(query)
            || self.user.to_lowercase().contains(query)
            || self.pid.to_string().contains(query)
    }
}

/// A network connection held by a process
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Connection {
    pub protocol: String,
    pub local_addr: String,
    pub remote_addr: String,
    pub state: String,
}

/// Extended information about a single process
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct DetailedInfo {
    pub pid: i32,
    pub name: String,
    pub user: String,
    pub cpu: f64,
    pub mem: f64,
    pub open_files: usize,
    pub ports: Vec<u16>,
    pub children: Vec<i32>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub connections: Vec<Connection>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub env_vars: BTreeMap<String, String>,
}

/// Compute the filtered view of `records` as a list of indices.
///
/// Keeps the records whose name, command, user or decimal PID contains `query`
/// (case-insensitive) and orders them by `key`. Equal keys keep snapshot order.
pub fn filtered_indices(records: &[ProcessRecord], query: &str, key: SortKey) -> Vec<usize> {
    let query = query.to_lowercase();
    let mut view: Vec<usize> = records
        .iter()
        .enumerate()
        .filter(|(_, r)| r.matches(&query))
        .map(|(i, _)| i)
        .collect();
    view.sort_by(|&a, &b| key.compare(&records[a], &records[b]));
    view
}

/// Sort records in place by a key
pub fn sort_records(records: &mut [ProcessRecord], key: SortKey) {
    records.sort_by(|a, b| key.compare(a, b));
}

/// Latest snapshot plus the filter and sort key that derive the visible view
#[derive(Debug, Default)]
pub struct ProcessTable {
    snapshot: Vec<ProcessRecord>,
    filter: String,
    sort_key: SortKey,
    view: Vec<usize>,
}

impl ProcessTable {
    pub fn new(sort_key: SortKey) -> Self {
        ProcessTable {
            sort_key,
            ..Default::default()
        }
    }

    /// Replace the snapshot wholesale and recompute the view
    pub fn load_snapshot(&mut self, records: Vec<ProcessRecord>) {
        self.snapshot = records;
        self.recompute();
    }

    /// Set the filter query and recompute the view
    pub fn set_filter(&mut self, query: &str) {
        self.filter = query.to_string();
        self.recompute();
    }

    /// Set the sort key and recompute the view
    pub fn set_sort(&mut self, key: SortKey) {
        self.sort_key = key;
        self.recompute();
    }

    fn recompute(&mut self) {
        self.view = filtered_indices(&self.snapshot, &self.filter, self.sort_key);
    }

    pub fn filter(&self) -> &str {
        &self.filter
    }

    pub fn sort_key(&self) -> SortKey {
        self.sort_key
    }

    pub fn snapshot(&self) -> &[ProcessRecord] {
        &self.snapshot
    }

    /// Number of records in the filtered view
    pub fn len(&self) -> usize {
        self.view.len()
    }

    pub fn is_empty(&self) -> bool {
        self.view.is_empty()
    }

    /// Record at a position of the filtered view
    pub fn get(&self, index: usize) -> Option<&ProcessRecord> {
        self.view.get(index).map(|&i| &self.snapshot[i])
    }

    /// Iterate the filtered view in order
    pub fn iter(&self) -> impl Iterator<Item = &ProcessRecord> {
        self.view.iter().map(move |&i| &self.snapshot[i])
    }

    /// Owned copy of the filtered view
    pub fn to_vec(&self) -> Vec<ProcessRecord> {
        self.iter().cloned().collect()
    }
}
