//! Parsers for `ps` and `lsof` output
//!
//! Used by the ps-based provider. `is_env_var_key` is shared with the
//! procfs provider so both report the same environment subset.

#![cfg_attr(target_os = "linux", allow(dead_code))]

use std::collections::BTreeMap;

use crate::core::{Connection, ProcessRecord};

/// Field list passed to `ps -o`
pub const PS_FIELDS: &str = "pid,ppid,user,stat,%cpu,rss,comm";

/// RSS (KB) that counts as 100% memory when the total is not known
pub const ASSUMED_TOTAL_MEM_KB: f64 = 16.0 * 1024.0 * 1024.0;

/// Parse the full output of `ps -eo pid,ppid,user,stat,%cpu,rss,comm`.
/// The header line is skipped, as are lines that do not parse.
pub fn parse_ps_output(output: &str) -> Vec<ProcessRecord> {
    output
        .trim()
        .lines()
        .skip(1)
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .filter_map(parse_ps_line)
        .collect()
}

/// Parse one `ps` row
pub fn parse_ps_line(line: &str) -> Option<ProcessRecord> {
    let fields: Vec<&str> = line.split_whitespace().collect();
    if fields.len() < 7 {
        return None;
    }

    let pid = fields[0].parse::<i32>().ok()?;
    let ppid = fields[1].parse::<i32>().ok()?;
    let cpu = fields[4].parse::<f64>().ok()?;
    let rss = fields[5].parse::<f64>().ok()?;

    Some(ProcessRecord {
        pid,
        ppid,
        name: basename(fields[6]).to_string(),
        command: fields[6..].join(" "),
        user: fields[2].to_string(),
        cpu,
        mem: rss / ASSUMED_TOTAL_MEM_KB * 100.0,
        state: fields[3].to_string(),
    })
}

/// Last path component of a command
pub fn basename(command: &str) -> &str {
    command.rsplit('/').next().unwrap_or(command)
}

/// Summarize `lsof -p PID`: number of open files and the distinct TCP/UDP
/// ports, in first-seen order.
pub fn parse_lsof_files(output: &str) -> (usize, Vec<u16>) {
    let mut count = 0;
    let mut ports: Vec<u16> = Vec::new();

    for line in output.lines().skip(1) {
        if line.trim().is_empty() {
            continue;
        }
        count += 1;

        if line.contains("TCP") || line.contains("UDP") {
            if let Some(port) = extract_port(line) {
                if !ports.contains(&port) {
                    ports.push(port);
                }
            }
        }
    }

    (count, ports)
}

/// First whitespace field whose text after the last `:` is a valid port
pub fn extract_port(line: &str) -> Option<u16> {
    line.split_whitespace().find_map(|field| {
        let (_, port) = field.rsplit_once(':')?;
        port.parse::<u16>().ok().filter(|&p| p > 0)
    })
}

/// Parse `lsof -i -P -n -p PID` into TCP/UDP connections.
///
/// Columns: COMMAND PID USER FD TYPE DEVICE SIZE/OFF NODE NAME [(STATE)]
pub fn parse_lsof_connections(output: &str) -> Vec<Connection> {
    let mut conns = Vec::new();

    for line in output.trim().lines().skip(1) {
        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.len() < 9 {
            continue;
        }

        let protocol = fields[7];
        if protocol != "TCP" && protocol != "UDP" {
            continue;
        }

        let name = fields[8];
        let (local, remote) = name.split_once("->").unwrap_or((name, ""));
        let state = fields
            .get(9)
            .map(|s| s.trim_matches(|c| c == '(' || c == ')'))
            .unwrap_or("");

        conns.push(Connection {
            protocol: protocol.to_string(),
            local_addr: local.to_string(),
            remote_addr: remote.to_string(),
            state: state.to_string(),
        });
    }

    conns
}

/// Extract `KEY=VALUE` tokens from `ps eww` output
pub fn parse_env_vars(output: &str) -> BTreeMap<String, String> {
    output
        .split_whitespace()
        .filter_map(|part| {
            let (key, value) = part.split_once('=')?;
            is_env_var_key(key).then(|| (key.to_string(), value.to_string()))
        })
        .collect()
}

/// Environment variable names: at least two of `A-Z`, `0-9`, `_`
pub fn is_env_var_key(key: &str) -> bool {
    key.len() >= 2
        && key
            .chars()
            .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || c == '_')
}

/// Parse `pgrep -P PID` output
pub fn parse_pid_list(output: &str) -> Vec<i32> {
    output
        .lines()
        .filter_map(|line| line.trim().parse::<i32>().ok())
        .collect()
}
