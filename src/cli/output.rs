//! Text and JSON output for the CLI subcommands

use std::fmt::Write as _;

use prettytable::{format, Cell, Row, Table};
use serde::Serialize;

use crate::core::{DetailedInfo, DevGroup, Forest, ProcessRecord};
use crate::platform::{CrashDetail, CrashReport, ReportKind};

const SPARK_CHARS: [char; 8] = ['▁', '▂', '▃', '▄', '▅', '▆', '▇', '█'];

/// Rows above this CPU% are marked in `top --battery`
pub const BATTERY_CPU_THRESHOLD: f64 = 10.0;

/// A process over a `watch --alert` threshold
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Alert {
    pub timestamp: String,
    pub threshold: String,
    pub value: f64,
    pub limit: f64,
    pub process: ProcessRecord,
}

/// Print any value as indented JSON
pub fn print_json<T: Serialize + ?Sized>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Borderless format: columns separated by two spaces
fn plain_format() -> format::TableFormat {
    format::FormatBuilder::new()
        .column_separator(' ')
        .padding(0, 1)
        .build()
}

/// Render rows under an optional title row
pub fn render_table(titles: &[&str], rows: &[Vec<String>]) -> String {
    let mut table = Table::new();
    table.set_format(plain_format());
    if !titles.is_empty() {
        table.set_titles(Row::new(titles.iter().map(|t| Cell::new(t)).collect()));
    }
    for row in rows {
        table.add_row(Row::new(row.iter().map(|c| Cell::new(c)).collect()));
    }
    table.to_string()
}

/// `PID NAME USER CPU% MEM% STATE COMMAND` table. With `battery`, rows above
/// the battery threshold get a `!! ` prefix.
pub fn process_table(procs: &[ProcessRecord], battery: bool) -> String {
    let rows: Vec<Vec<String>> = procs
        .iter()
        .map(|p| {
            let prefix = if battery && p.cpu > BATTERY_CPU_THRESHOLD {
                "!! "
            } else {
                ""
            };
            vec![
                format!("{}{}", prefix, p.pid),
                p.name.clone(),
                p.user.clone(),
                format!("{:.1}", p.cpu),
                format!("{:.1}", p.mem),
                p.state.clone(),
                p.command.clone(),
            ]
        })
        .collect();
    render_table(
        &["PID", "NAME", "USER", "CPU%", "MEM%", "STATE", "COMMAND"],
        &rows,
    )
}

/// Bar character for a percentage
pub fn spark(pct: f64) -> char {
    if pct <= 0.0 {
        return SPARK_CHARS[0];
    }
    if pct >= 100.0 {
        return SPARK_CHARS[SPARK_CHARS.len() - 1];
    }
    let index = (pct / 100.0 * (SPARK_CHARS.len() - 1) as f64) as usize;
    SPARK_CHARS[index]
}

/// `top --format spark` table
pub fn spark_table(procs: &[ProcessRecord]) -> String {
    let rows: Vec<Vec<String>> = procs
        .iter()
        .map(|p| {
            vec![
                p.pid.to_string(),
                p.name.clone(),
                format!("{} {:.1}%", spark(p.cpu), p.cpu),
                format!("{} {:.1}%", spark(p.mem), p.mem),
                p.command.clone(),
            ]
        })
        .collect();
    render_table(&["PID", "NAME", "CPU", "MEM", "COMMAND"], &rows)
}

/// Process forest with box-drawing connectors, one process per line
pub fn tree_text(forest: &Forest) -> String {
    let mut out = String::new();
    for entry in forest.flatten() {
        for level in 1..entry.depth {
            if entry.indent & (1u64 << (level - 1).min(63)) != 0 {
                out.push_str("│   ");
            } else {
                out.push_str("    ");
            }
        }
        if entry.depth > 0 {
            out.push_str(if entry.is_last { "└── " } else { "├── " });
        }
        let p = &entry.record;
        let _ = writeln!(
            out,
            "{} (PID {}, CPU {:.1}%, {})",
            p.name, p.pid, p.cpu, p.user
        );
    }
    out
}

fn join_numbers<T: ToString>(items: &[T]) -> String {
    items
        .iter()
        .map(|i| i.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

/// `Label: value` lines for `info` and `watch`
pub fn info_text(detail: &DetailedInfo) -> String {
    let mut rows = vec![
        vec!["PID:".to_string(), detail.pid.to_string()],
        vec!["Name:".to_string(), detail.name.clone()],
        vec!["User:".to_string(), detail.user.clone()],
        vec!["CPU:".to_string(), format!("{:.1}%", detail.cpu)],
        vec!["Memory:".to_string(), format!("{:.1}%", detail.mem)],
        vec!["Open Files:".to_string(), detail.open_files.to_string()],
    ];
    if !detail.ports.is_empty() {
        rows.push(vec!["Ports:".to_string(), join_numbers(&detail.ports)]);
    }
    if !detail.children.is_empty() {
        rows.push(vec!["Children:".to_string(), join_numbers(&detail.children)]);
    }
    render_table(&[], &rows)
}

/// Grouped table for `dev`
pub fn dev_text(groups: &[DevGroup]) -> String {
    if groups.is_empty() {
        return "No developer processes found.\n".to_string();
    }

    let mut out = String::new();
    for g in groups {
        let _ = writeln!(
            out,
            "\n=== {} ({} processes) ===  CPU: {:.1}%  MEM: {:.1}%",
            g.stack,
            g.processes.len(),
            g.total_cpu,
            g.total_mem
        );
        let rows: Vec<Vec<String>> = g
            .processes
            .iter()
            .map(|p| {
                vec![
                    p.pid.to_string(),
                    p.name.clone(),
                    format!("{:.1}", p.cpu),
                    format!("{:.1}", p.mem),
                ]
            })
            .collect();
        out.push_str(&render_table(&["PID", "NAME", "CPU%", "MEM%"], &rows));
    }
    out
}

/// The first process over a threshold. A threshold of 0 or less is unset.
pub fn check_thresholds(
    procs: &[ProcessRecord],
    cpu_limit: f64,
    mem_limit: f64,
    timestamp: &str,
) -> Option<Alert> {
    procs.iter().find_map(|p| {
        let (threshold, value, limit) = if cpu_limit > 0.0 && p.cpu > cpu_limit {
            ("cpu", p.cpu, cpu_limit)
        } else if mem_limit > 0.0 && p.mem > mem_limit {
            ("mem", p.mem, mem_limit)
        } else {
            return None;
        };
        Some(Alert {
            timestamp: timestamp.to_string(),
            threshold: threshold.to_string(),
            value,
            limit,
            process: p.clone(),
        })
    })
}

/// Human-readable form of an alert
pub fn alert_text(alert: &Alert) -> String {
    format!(
        "\nALERT: {} threshold exceeded!\n  Process: {} (PID {})\n  {}: {:.1}% (limit: {:.1}%)\n  Time: {}\n",
        alert.threshold,
        alert.process.name,
        alert.process.pid,
        alert.threshold,
        alert.value,
        alert.limit,
        alert.timestamp
    )
}

/// Description of the active thresholds, e.g. `CPU > 80.0%, MEM > 90.0%`
pub fn thresholds_text(cpu_limit: f64, mem_limit: f64) -> String {
    let mut parts = Vec::new();
    if cpu_limit > 0.0 {
        parts.push(format!("CPU > {:.1}%", cpu_limit));
    }
    if mem_limit > 0.0 {
        parts.push(format!("MEM > {:.1}%", mem_limit));
    }
    parts.join(", ")
}

/// `TIMESTAMP PROCESS TYPE SIGNAL PATH` table for `crashes`
pub fn crash_table(reports: &[CrashReport]) -> String {
    let rows: Vec<Vec<String>> = reports
        .iter()
        .map(|r| {
            vec![
                r.timestamp.clone(),
                r.process.clone(),
                r.report_type.to_string(),
                r.signal.clone(),
                r.path.clone(),
            ]
        })
        .collect();
    render_table(&["TIMESTAMP", "PROCESS", "TYPE", "SIGNAL", "PATH"], &rows)
}

/// `Label: value` lines for `crashes info`, then the faulting thread's frames
pub fn crash_detail_text(detail: &CrashDetail) -> String {
    let report = &detail.report;
    let mut rows = vec![
        vec!["Process:".to_string(), report.process.clone()],
        vec!["PID:".to_string(), report.pid.to_string()],
        vec!["Type:".to_string(), report.report_type.to_string()],
        vec!["Timestamp:".to_string(), report.timestamp.clone()],
    ];
    let optional = [
        ("Exception:", &report.exception),
        ("Signal:", &report.signal),
        ("OS Version:", &detail.os_version),
        ("App Version:", &detail.version),
    ];
    for (label, value) in optional {
        if !value.is_empty() {
            rows.push(vec![label.to_string(), value.clone()]);
        }
    }
    if report.report_type == ReportKind::Crash {
        rows.push(vec!["Crash Thread:".to_string(), detail.crash_thread.to_string()]);
    }
    rows.push(vec!["Path:".to_string(), report.path.clone()]);

    let mut out = render_table(&[], &rows);
    if !detail.backtrace.is_empty() {
        out.push_str("\nBacktrace (faulting thread):\n");
        for (i, frame) in detail.backtrace.iter().enumerate() {
            let _ = writeln!(out, "  {:2}: {}", i, frame);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{build_forest, group_by_stack};

    fn rec(pid: i32, ppid: i32, name: &str, cpu: f64, mem: f64) -> ProcessRecord {
        let mut r = ProcessRecord::new(pid, ppid, name);
        r.cpu = cpu;
        r.mem = mem;
        r.user = "alice".to_string();
        r.state = "S".to_string();
        r
    }

    #[test]
    fn test_spark() {
        assert_eq!(spark(-3.0), '▁');
        assert_eq!(spark(0.0), '▁');
        assert_eq!(spark(10.0), '▁');
        assert_eq!(spark(50.0), '▄');
        assert_eq!(spark(99.9), '▇');
        assert_eq!(spark(100.0), '█');
        assert_eq!(spark(250.0), '█');
    }

    #[test]
    fn test_render_table_aligns_columns() {
        let rows = vec![
            vec!["1".to_string(), "init".to_string()],
            vec!["12345".to_string(), "x".to_string()],
        ];
        let text = render_table(&["PID", "NAME"], &rows);
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 3);
        let col = lines[0].find("NAME").unwrap();
        assert_eq!(lines[1].find("init"), Some(col));
        assert_eq!(lines[2].find('x'), Some(col));
        assert!(lines[2].starts_with("12345"));
    }

    #[test]
    fn test_process_table_battery_marks() {
        let procs = vec![rec(1, 0, "hot", 55.0, 1.0), rec(2, 0, "cool", 2.0, 1.0)];
        let text = process_table(&procs, true);
        let lines: Vec<&str> = text.lines().collect();
        assert!(lines[0].starts_with("PID"));
        assert!(lines[1].starts_with("!! 1"));
        assert!(lines[2].starts_with('2'));
        assert!(lines[1].contains("55.0"));

        let plain = process_table(&procs, false);
        assert!(!plain.contains("!!"));
    }

    #[test]
    fn test_spark_table() {
        let text = spark_table(&[rec(5, 0, "node", 100.0, 0.0)]);
        assert!(text.contains("█ 100.0%"));
        assert!(text.contains("▁ 0.0%"));
    }

    #[test]
    fn test_tree_text() {
        let records = vec![
            rec(1, 0, "launchd", 0.1, 0.0),
            rec(10, 1, "node", 3.0, 0.0),
            rec(20, 10, "npm", 1.0, 0.0),
            rec(30, 1, "bash", 0.0, 0.0),
        ];
        let text = tree_text(&build_forest(&records));
        let expected = "\
launchd (PID 1, CPU 0.1%, alice)
├── node (PID 10, CPU 3.0%, alice)
│   └── npm (PID 20, CPU 1.0%, alice)
└── bash (PID 30, CPU 0.0%, alice)
";
        assert_eq!(text, expected);
    }

    #[test]
    fn test_info_text() {
        let detail = DetailedInfo {
            pid: 42,
            name: "node".to_string(),
            user: "alice".to_string(),
            cpu: 1.25,
            open_files: 12,
            ports: vec![3000, 9229],
            ..Default::default()
        };
        let text = info_text(&detail);
        assert!(text.contains("PID:"));
        assert!(text.contains("Open Files:"));
        assert!(text.contains("3000, 9229"));
        assert!(!text.contains("Children:"));
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 7);
    }

    #[test]
    fn test_dev_text() {
        assert_eq!(dev_text(&[]), "No developer processes found.\n");

        let groups = group_by_stack(&[rec(1, 0, "node", 5.0, 1.0), rec(2, 0, "npm", 3.0, 1.0)]);
        let text = dev_text(&groups);
        assert!(text.contains("=== Node.js (2 processes) ===  CPU: 8.0%  MEM: 2.0%"));
        assert!(text.contains("npm"));
    }

    #[test]
    fn test_check_thresholds() {
        let procs = vec![
            rec(1, 0, "idle", 1.0, 1.0),
            rec(2, 0, "fat", 2.0, 60.0),
            rec(3, 0, "busy", 95.0, 1.0),
        ];
        let alert = check_thresholds(&procs, 80.0, 50.0, "t").unwrap();
        assert_eq!(alert.threshold, "mem");
        assert_eq!(alert.process.pid, 2);
        assert_eq!(alert.limit, 50.0);

        let alert = check_thresholds(&procs, 80.0, 0.0, "t").unwrap();
        assert_eq!(alert.threshold, "cpu");
        assert_eq!(alert.process.pid, 3);

        assert!(check_thresholds(&procs, 99.0, 99.0, "t").is_none());
        assert!(check_thresholds(&procs, 0.0, 0.0, "t").is_none());
    }

    #[test]
    fn test_alert_and_threshold_text() {
        let alert = Alert {
            timestamp: "2026-01-01T00:00:00+00:00".to_string(),
            threshold: "cpu".to_string(),
            value: 91.0,
            limit: 80.0,
            process: rec(3, 0, "busy", 91.0, 0.0),
        };
        let text = alert_text(&alert);
        assert!(text.contains("ALERT: cpu threshold exceeded!"));
        assert!(text.contains("Process: busy (PID 3)"));
        assert!(text.contains("cpu: 91.0% (limit: 80.0%)"));

        assert_eq!(thresholds_text(80.0, 90.0), "CPU > 80.0%, MEM > 90.0%");
        assert_eq!(thresholds_text(0.0, 50.0), "MEM > 50.0%");
    }

    #[test]
    fn test_alert_json_shape() {
        let alert = Alert {
            timestamp: "t".to_string(),
            threshold: "mem".to_string(),
            value: 60.0,
            limit: 50.0,
            process: rec(2, 0, "fat", 2.0, 60.0),
        };
        let json = serde_json::to_value(&alert).unwrap();
        assert_eq!(json["threshold"], "mem");
        assert_eq!(json["process"]["pid"], 2);
    }

    #[test]
    fn test_crash_table() {
        let report = CrashReport {
            timestamp: "2026-02-08 10:30:00.00 -0500".to_string(),
            process: "Safari".to_string(),
            signal: "SIGSEGV".to_string(),
            path: "/tmp/Safari.ips".to_string(),
            ..CrashReport::default()
        };
        let text = crash_table(&[report]);
        let lines: Vec<&str> = text.lines().collect();
        assert!(lines[0].starts_with("TIMESTAMP"));
        assert!(lines[1].contains("Safari"));
        assert!(lines[1].contains(" crash "));
        assert!(lines[1].trim_end().ends_with("/tmp/Safari.ips"));
    }

    #[test]
    fn test_crash_detail_text() {
        let mut detail = CrashDetail {
            report: CrashReport {
                process: "CrashApp".to_string(),
                pid: 9999,
                exception: "EXC_BAD_ACCESS".to_string(),
                path: "/tmp/crash.ips".to_string(),
                ..CrashReport::default()
            },
            backtrace: vec!["objc_msgSend+32".to_string(), "0x12c".to_string()],
            ..CrashDetail::default()
        };
        let text = crash_detail_text(&detail);
        assert!(text.contains("Exception:"));
        assert!(text.contains("Crash Thread:"));
        assert!(!text.contains("Signal:"));
        assert!(text.contains("\nBacktrace (faulting thread):\n   0: objc_msgSend+32\n   1: 0x12c\n"));

        detail.report.report_type = ReportKind::Hang;
        detail.backtrace.clear();
        let text = crash_detail_text(&detail);
        assert!(!text.contains("Crash Thread:"));
        assert!(!text.contains("Backtrace"));
    }
}
