//! Diagnostic reports
//!
//! macOS writes crash (`.ips`), hang (`.hang`), spin (`.spin`) and kernel
//! panic (`.panic`) reports to `DiagnosticReports` folders. `.ips` files are
//! a one-line JSON header followed by a JSON body; the others are
//! `Key: value` text.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use chrono::{DateTime, Local, NaiveDateTime, TimeDelta, TimeZone};
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::error::CrashError;

/// Time window used when none is given
pub const DEFAULT_WINDOW: &str = "7d";

/// Text reports keep their header near the top
const SUMMARY_LINES: usize = 50;

static PROCESS_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^Process:\s+(.+?)(?:\s+\[(\d+)\])?$").expect("static regex")
});
static DATE_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^Date/Time:\s+(.+)$").expect("static regex"));
static DURATION_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^Duration:\s+(.+)$").expect("static regex"));
static OS_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^OS Version:\s+(.+)$").expect("static regex"));

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportKind {
    #[default]
    Crash,
    Hang,
    Spin,
    Panic,
}

impl ReportKind {
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "ips" => Some(ReportKind::Crash),
            "hang" => Some(ReportKind::Hang),
            "spin" => Some(ReportKind::Spin),
            "panic" => Some(ReportKind::Panic),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ReportKind::Crash => "crash",
            ReportKind::Hang => "hang",
            ReportKind::Spin => "spin",
            ReportKind::Panic => "panic",
        }
    }
}

impl fmt::Display for ReportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One line of `crashes` output
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct CrashReport {
    pub timestamp: String,
    pub process: String,
    pub pid: i32,
    #[serde(rename = "exception_type")]
    pub exception: String,
    pub signal: String,
    pub path: String,
    pub report_type: ReportKind,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct CrashDetail {
    #[serde(flatten)]
    pub report: CrashReport,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub version: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub os_version: String,
    #[serde(skip_serializing_if = "is_zero")]
    pub crash_thread: i64,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub backtrace: Vec<String>,
}

fn is_zero(n: &i64) -> bool {
    *n == 0
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct IpsHeader {
    app_name: String,
    name: String,
    app_version: String,
    timestamp: String,
    os_version: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct IpsBody {
    pid: i32,
    faulting_thread: i64,
    exception: IpsException,
    os_version: IpsOsVersion,
    threads: Vec<IpsThread>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct IpsException {
    #[serde(rename = "type")]
    kind: String,
    signal: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct IpsOsVersion {
    train: String,
    build: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct IpsThread {
    frames: Vec<IpsFrame>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct IpsFrame {
    symbol: String,
    symbol_location: u64,
    image_offset: u64,
}

impl IpsFrame {
    fn describe(&self) -> String {
        if self.symbol.is_empty() {
            format!("{:#x}", self.image_offset)
        } else {
            format!("{}+{}", self.symbol, self.symbol_location)
        }
    }
}

/// Per-user and system report folders
pub fn diagnostic_dirs() -> Vec<PathBuf> {
    let system = PathBuf::from("/Library/Logs/DiagnosticReports");
    match dirs::home_dir() {
        Some(home) => vec![
            home.join("Library").join("Logs").join("DiagnosticReports"),
            system,
        ],
        None => vec![system],
    }
}

/// Parse a window such as `24h` or `7d`. Empty means `7d`.
pub fn parse_window(window: &str) -> Result<TimeDelta, CrashError> {
    let spec = window.trim().to_lowercase();
    let spec = if spec.is_empty() {
        DEFAULT_WINDOW.to_string()
    } else {
        spec
    };
    let invalid = || CrashError::Window(window.to_string());

    let mut chars = spec.chars();
    let unit = chars.next_back().ok_or_else(invalid)?;
    let count: i64 = chars.as_str().parse().map_err(|_| invalid())?;
    if count <= 0 {
        return Err(invalid());
    }

    match unit {
        'h' => TimeDelta::try_hours(count),
        'd' => TimeDelta::try_days(count),
        _ => None,
    }
    .ok_or_else(invalid)
}

/// Timestamps appear as `2026-02-08 22:58:16.00 -0500`, without a zone
/// (read as local time) or as RFC 3339
pub fn parse_report_timestamp(ts: &str) -> Option<DateTime<Local>> {
    let ts = ts.trim();
    if let Ok(t) = DateTime::parse_from_str(ts, "%Y-%m-%d %H:%M:%S%.f %z") {
        return Some(t.with_timezone(&Local));
    }
    if let Ok(t) = DateTime::parse_from_rfc3339(ts) {
        return Some(t.with_timezone(&Local));
    }
    let naive = NaiveDateTime::parse_from_str(ts, "%Y-%m-%d %H:%M:%S%.f").ok()?;
    Local.from_local_datetime(&naive).earliest()
}

/// Reports in `dirs` newer than `window`, optionally for one process
/// (case-insensitive), most recent first. Missing folders and unreadable
/// reports are skipped.
pub fn list_reports(
    dirs: &[PathBuf],
    window: &str,
    process: Option<&str>,
) -> Result<Vec<CrashReport>, CrashError> {
    let cutoff = Local::now() - parse_window(window)?;
    let process = process.map(str::to_lowercase);
    let mut reports = Vec::new();

    for dir in dirs {
        let entries = match fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(e) => {
                debug!(dir = %dir.display(), error = %e, "skipping report folder");
                continue;
            }
        };

        for entry in entries.flatten() {
            if entry.file_type().map(|t| t.is_dir()).unwrap_or(true) {
                continue;
            }
            let path = entry.path();
            let Some(kind) = ReportKind::from_path(&path) else {
                continue;
            };
            let report = match read_summary(&path, kind) {
                Ok(report) => report,
                Err(e) => {
                    debug!(path = %path.display(), error = %e, "skipping report");
                    continue;
                }
            };

            if parse_report_timestamp(&report.timestamp).is_some_and(|ts| ts < cutoff) {
                continue;
            }
            if let Some(ref wanted) = process {
                if report.process.to_lowercase() != *wanted {
                    continue;
                }
            }
            reports.push(report);
        }
    }

    reports.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
    Ok(reports)
}

/// Everything known about one report
pub fn report_detail(path: &Path) -> Result<CrashDetail, CrashError> {
    match ReportKind::from_path(path) {
        Some(ReportKind::Crash) => parse_ips(path),
        Some(kind) => parse_text(path, kind, None),
        None => Err(CrashError::UnsupportedFormat(
            path.extension()
                .map(|e| format!(".{}", e.to_string_lossy()))
                .unwrap_or_else(|| path.display().to_string()),
        )),
    }
}

fn read_summary(path: &Path, kind: ReportKind) -> Result<CrashReport, CrashError> {
    let detail = match kind {
        ReportKind::Crash => parse_ips(path)?,
        _ => parse_text(path, kind, Some(SUMMARY_LINES))?,
    };
    Ok(detail.report)
}

fn read_text(path: &Path) -> Result<String, CrashError> {
    let bytes = fs::read(path).map_err(|source| CrashError::Io {
        path: path.display().to_string(),
        source,
    })?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

fn parse_ips(path: &Path) -> Result<CrashDetail, CrashError> {
    let text = read_text(path)?;
    let (header, body) = text.split_once('\n').unwrap_or((text.as_str(), ""));
    if header.trim().is_empty() {
        return Err(CrashError::Empty(path.display().to_string()));
    }
    let header: IpsHeader = serde_json::from_str(header.trim_end())?;

    let process = if header.name.is_empty() {
        header.app_name
    } else {
        header.name
    };
    let mut detail = CrashDetail {
        report: CrashReport {
            timestamp: header.timestamp,
            process,
            path: path.display().to_string(),
            report_type: ReportKind::Crash,
            ..CrashReport::default()
        },
        version: header.app_version,
        os_version: header.os_version,
        ..CrashDetail::default()
    };

    // A body that does not parse still leaves a usable summary
    let Ok(body) = serde_json::from_str::<IpsBody>(body) else {
        return Ok(detail);
    };

    detail.report.pid = body.pid;
    detail.report.exception = body.exception.kind;
    detail.report.signal = body.exception.signal;
    detail.crash_thread = body.faulting_thread;

    if !body.os_version.train.is_empty() {
        detail.os_version = if body.os_version.build.is_empty() {
            body.os_version.train
        } else {
            format!("{} ({})", body.os_version.train, body.os_version.build)
        };
    }

    if let Some(thread) = usize::try_from(body.faulting_thread)
        .ok()
        .and_then(|i| body.threads.get(i))
    {
        detail.backtrace = thread.frames.iter().map(IpsFrame::describe).collect();
    }

    Ok(detail)
}

/// `.hang`, `.spin` and `.panic` reports. `max_lines` limits how far to read.
fn parse_text(
    path: &Path,
    kind: ReportKind,
    max_lines: Option<usize>,
) -> Result<CrashDetail, CrashError> {
    let text = read_text(path)?;
    let mut detail = CrashDetail {
        report: CrashReport {
            path: path.display().to_string(),
            report_type: kind,
            ..CrashReport::default()
        },
        ..CrashDetail::default()
    };

    for line in text.lines().take(max_lines.unwrap_or(usize::MAX)) {
        if let Some(caps) = PROCESS_LINE.captures(line) {
            detail.report.process = caps[1].trim().to_string();
            if let Some(pid) = caps.get(2).and_then(|m| m.as_str().parse().ok()) {
                detail.report.pid = pid;
            }
        } else if let Some(caps) = DATE_LINE.captures(line) {
            detail.report.timestamp = caps[1].trim().to_string();
        } else if let Some(caps) = DURATION_LINE.captures(line) {
            detail.report.exception = format!("{} ({})", kind, caps[1].trim());
        } else if let Some(caps) = OS_LINE.captures(line) {
            detail.os_version = caps[1].trim().to_string();
        }
    }

    Ok(detail)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const CRASH_HEADER: &str = r#"{"app_name":"CrashApp","timestamp":"2026-02-08 10:30:00.00 -0500","app_version":"2.0","bug_type":"309","os_version":"macOS 26.2 (25C56)","incident_id":"DEF-456","name":"CrashApp"}"#;
    const CRASH_BODY: &str = r#"{
  "pid": 9999,
  "faultingThread": 0,
  "exception": {"type": "EXC_BAD_ACCESS", "signal": "SIGSEGV"},
  "osVersion": {"train": "macOS 26.2", "build": "25C56"},
  "threads": [
    {
      "triggered": true,
      "frames": [
        {"symbol": "objc_msgSend", "symbolLocation": 32, "imageOffset": 100, "imageIndex": 0},
        {"symbol": "main", "symbolLocation": 0, "imageOffset": 200, "imageIndex": 1},
        {"symbol": "", "symbolLocation": 0, "imageOffset": 300, "imageIndex": 2}
      ]
    },
    {
      "triggered": false,
      "frames": [{"symbol": "worker_thread", "symbolLocation": 10, "imageOffset": 400}]
    }
  ]
}"#;

    const HANG_REPORT: &str = "Process:     HangApp [100]
Path:        /Applications/HangApp.app/Contents/MacOS/HangApp
Date/Time:   2026-02-10 14:30:00 -0500
Duration:    45.2s

OS Version:  macOS 26.2 (25C56)

Some other content here...
";

    fn write(dir: &TempDir, name: &str, content: &str) -> PathBuf {
        let path = dir.path().join(name);
        fs::write(&path, content).unwrap();
        path
    }

    fn ips(name: &str, timestamp: &str, pid: i32) -> String {
        format!(
            "{{\"app_name\":\"{name}\",\"timestamp\":\"{timestamp}\",\"name\":\"{name}\"}}\n\
             {{\"pid\": {pid}, \"exception\": {{\"type\": \"EXC_CRASH\", \"signal\": \"SIGABRT\"}}, \
             \"faultingThread\": 0, \"threads\": []}}"
        )
    }

    fn now_stamp() -> String {
        Local::now().format("%Y-%m-%d %H:%M:%S").to_string()
    }

    #[test]
    fn test_parse_window() {
        assert_eq!(parse_window("24h").unwrap(), TimeDelta::hours(24));
        assert_eq!(parse_window("1h").unwrap(), TimeDelta::hours(1));
        assert_eq!(parse_window("30D").unwrap(), TimeDelta::days(30));
        assert_eq!(parse_window("").unwrap(), TimeDelta::days(7));

        for bad in ["7m", "abch", "h", "0d", "-1d", "d7", "7"] {
            assert!(parse_window(bad).is_err(), "{bad} should be rejected");
        }
    }

    #[test]
    fn test_parse_report_timestamp() {
        let t = parse_report_timestamp("2026-02-08 22:58:16.00 -0500").unwrap();
        assert_eq!(t.with_timezone(&chrono::Utc).to_rfc3339(), "2026-02-09T03:58:16+00:00");
        assert!(parse_report_timestamp("2026-02-08 22:58:16.0000 -0500").is_some());
        assert!(parse_report_timestamp("2026-02-08 22:58:16 -0500").is_some());
        assert!(parse_report_timestamp("2026-02-08 22:58:16").is_some());
        assert!(parse_report_timestamp("2026-02-08T22:58:16Z").is_some());
        assert!(parse_report_timestamp("not a date").is_none());
        assert!(parse_report_timestamp("").is_none());
    }

    #[test]
    fn test_ips_detail() {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, "crash.ips", &format!("{CRASH_HEADER}\n{CRASH_BODY}"));

        let detail = report_detail(&path).unwrap();
        assert_eq!(detail.report.process, "CrashApp");
        assert_eq!(detail.report.pid, 9999);
        assert_eq!(detail.report.exception, "EXC_BAD_ACCESS");
        assert_eq!(detail.report.signal, "SIGSEGV");
        assert_eq!(detail.report.report_type, ReportKind::Crash);
        assert_eq!(detail.version, "2.0");
        assert_eq!(detail.crash_thread, 0);
        assert_eq!(detail.os_version, "macOS 26.2 (25C56)");
        assert_eq!(detail.backtrace, vec!["objc_msgSend+32", "main+0", "0x12c"]);
    }

    #[test]
    fn test_ips_summary_header_only() {
        let dir = TempDir::new().unwrap();
        let header = r#"{"app_name":"OnlyHeader","timestamp":"2026-01-01 00:00:00.00 -0500","name":"OnlyHeader"}"#;
        let path = write(&dir, "headeronly.ips", &format!("{header}\n"));

        let report = read_summary(&path, ReportKind::Crash).unwrap();
        assert_eq!(report.process, "OnlyHeader");
        assert_eq!(report.pid, 0);
        assert!(report.exception.is_empty());
    }

    #[test]
    fn test_ips_falls_back_to_app_name() {
        let dir = TempDir::new().unwrap();
        let header = r#"{"app_name":"FallbackApp","timestamp":"2026-01-01 00:00:00","name":""}"#;
        let path = write(&dir, "fallback.ips", &format!("{header}\n{{}}"));
        assert_eq!(read_summary(&path, ReportKind::Crash).unwrap().process, "FallbackApp");
    }

    #[test]
    fn test_ips_rejects_empty_and_garbage() {
        let dir = TempDir::new().unwrap();
        let empty = write(&dir, "empty.ips", "");
        assert!(matches!(
            read_summary(&empty, ReportKind::Crash),
            Err(CrashError::Empty(_))
        ));

        let bad = write(&dir, "bad.ips", "not json at all\n{}");
        assert!(matches!(
            read_summary(&bad, ReportKind::Crash),
            Err(CrashError::Header(_))
        ));
    }

    #[test]
    fn test_text_report() {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, "test.hang", HANG_REPORT);

        let report = read_summary(&path, ReportKind::Hang).unwrap();
        assert_eq!(report.process, "HangApp");
        assert_eq!(report.pid, 100);
        assert_eq!(report.timestamp, "2026-02-10 14:30:00 -0500");
        assert_eq!(report.report_type, ReportKind::Hang);

        let detail = report_detail(&path).unwrap();
        assert_eq!(detail.os_version, "macOS 26.2 (25C56)");
        assert_eq!(detail.report.exception, "hang (45.2s)");
    }

    #[test]
    fn test_text_report_without_pid() {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, "kernel.panic", "process: kernel_task\n");
        let detail = report_detail(&path).unwrap();
        assert_eq!(detail.report.process, "kernel_task");
        assert_eq!(detail.report.pid, 0);
        assert_eq!(detail.report.report_type, ReportKind::Panic);
    }

    #[test]
    fn test_empty_text_report_is_blank() {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, "empty.spin", "");
        let report = read_summary(&path, ReportKind::Spin).unwrap();
        assert!(report.process.is_empty());
    }

    #[test]
    fn test_detail_errors() {
        let dir = TempDir::new().unwrap();
        let txt = write(&dir, "test.txt", "content");
        let err = report_detail(&txt).unwrap_err();
        assert!(err.to_string().contains("unsupported"));

        assert!(matches!(
            report_detail(Path::new("/nonexistent/path/test.ips")),
            Err(CrashError::Io { .. })
        ));
    }

    #[test]
    fn test_list_filters_and_orders() {
        let dir = TempDir::new().unwrap();
        let now = now_stamp();
        write(&dir, "recent.ips", &ips("RecentApp", &now, 100));
        write(&dir, "old.ips", &ips("OldApp", "2020-01-01 00:00:00", 200));
        write(&dir, "readme.txt", "not a report");
        write(&dir, "bad.ips", "garbage");
        write(
            &dir,
            "later.hang",
            &format!("Process: LaterApp [7]\nDate/Time: {}\n", "9999-01-01 00:00:00"),
        );
        fs::create_dir(dir.path().join("nested.ips")).unwrap();

        let dirs = vec![dir.path().to_path_buf(), dir.path().join("missing")];
        let reports = list_reports(&dirs, "7d", None).unwrap();
        let names: Vec<&str> = reports.iter().map(|r| r.process.as_str()).collect();
        assert_eq!(names, vec!["LaterApp", "RecentApp"]);
        assert_eq!(reports[1].pid, 100);
        assert_eq!(reports[1].signal, "SIGABRT");

        let only = list_reports(&dirs, "7d", Some("recentapp")).unwrap();
        assert_eq!(only.len(), 1);
        assert_eq!(only[0].process, "RecentApp");

        assert!(list_reports(&dirs, "invalid", None).is_err());
    }

    #[test]
    fn test_report_json_shape() {
        let detail = CrashDetail {
            report: CrashReport {
                process: "App".to_string(),
                pid: 5,
                exception: "EXC_CRASH".to_string(),
                report_type: ReportKind::Spin,
                ..CrashReport::default()
            },
            ..CrashDetail::default()
        };
        let json = serde_json::to_value(&detail).unwrap();
        assert_eq!(json["exception_type"], "EXC_CRASH");
        assert_eq!(json["report_type"], "spin");
        assert_eq!(json["pid"], 5);
        assert!(json.get("backtrace").is_none());
        assert!(json.get("crash_thread").is_none());
    }
}
