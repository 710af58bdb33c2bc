//! ps-based platform implementation
//!
//! Used where /proc is not available (macOS and the BSDs). Process lists come
//! from `ps`, open files and sockets from `lsof`, children from `pgrep`.

use std::process::Command;

use tracing::debug;

use super::error::ProviderError;
use super::parse::{
    basename, parse_env_vars, parse_lsof_connections, parse_lsof_files, parse_pid_list,
    parse_ps_output, ASSUMED_TOTAL_MEM_KB, PS_FIELDS,
};
use super::SnapshotProvider;
use crate::core::{DetailedInfo, ProcessRecord};

/// Snapshot provider that shells out to `ps` and `lsof`
pub struct PsProvider;

impl PsProvider {
    pub fn new() -> Self {
        PsProvider
    }
}

impl Default for PsProvider {
    fn default() -> Self {
        Self::new()
    }
}

/// Run a command and return its stdout. A non-zero exit is an error.
fn run(program: &str, args: &[&str]) -> Result<String, ProviderError> {
    let command = format!("{} {}", program, args.join(" "));
    debug!(%command, "running");

    let output = Command::new(program)
        .args(args)
        .output()
        .map_err(|source| ProviderError::Spawn {
            command: command.clone(),
            source,
        })?;

    if !output.status.success() {
        return Err(ProviderError::Exit {
            command,
            status: output.status,
        });
    }

    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

/// Like `run`, but an error yields empty output. `lsof` and `pgrep` exit
/// non-zero when there is simply nothing to report.
fn run_lenient(program: &str, args: &[&str]) -> String {
    run(program, args).unwrap_or_default()
}

impl SnapshotProvider for PsProvider {
    fn fetch_all(&self) -> Result<Vec<ProcessRecord>, ProviderError> {
        let out = run("ps", &["-eo", PS_FIELDS])?;
        Ok(parse_ps_output(&out))
    }

    fn fetch_top(&self, n: usize) -> Result<Vec<ProcessRecord>, ProviderError> {
        // -r sorts by CPU usage
        let out = run("ps", &["-eo", PS_FIELDS, "-r"])?;
        let mut procs = parse_ps_output(&out);
        procs.truncate(n);
        Ok(procs)
    }

    fn fetch_detail(&self, pid: i32) -> Result<DetailedInfo, ProviderError> {
        let pid_arg = pid.to_string();

        let out = run("ps", &["-p", &pid_arg, "-o", "pid,user,%cpu,rss,comm"])
            .map_err(|_| ProviderError::NotFound(pid))?;
        let line = out
            .trim()
            .lines()
            .nth(1)
            .ok_or(ProviderError::NotFound(pid))?;
        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.len() < 5 {
            return Err(ProviderError::Parse(line.to_string()));
        }

        let cpu = fields[2]
            .parse::<f64>()
            .map_err(|_| ProviderError::Parse(line.to_string()))?;
        let rss = fields[3]
            .parse::<f64>()
            .map_err(|_| ProviderError::Parse(line.to_string()))?;

        let (open_files, ports) = parse_lsof_files(&run_lenient("lsof", &["-p", &pid_arg]));
        let children = parse_pid_list(&run_lenient("pgrep", &["-P", &pid_arg]));
        let connections =
            parse_lsof_connections(&run_lenient("lsof", &["-i", "-P", "-n", "-p", &pid_arg]));
        let env_vars = parse_env_vars(&run_lenient(
            "ps",
            &["eww", "-p", &pid_arg, "-o", "command="],
        ));

        Ok(DetailedInfo {
            pid,
            name: basename(&fields[4..].join(" ")).to_string(),
            user: fields[1].to_string(),
            cpu,
            mem: rss / ASSUMED_TOTAL_MEM_KB * 100.0,
            open_files,
            ports,
            children,
            connections,
            env_vars,
        })
    }
}
