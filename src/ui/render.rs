//! Screen rendering
//!
//! Draws the controller state. Rendering only reads the controller; all
//! layout decisions that can be tested without a terminal live in the
//! string-building helpers at the bottom of this file.
//!
//! ```text
//! row 0        title
//! row 1        tabs
//! row 2        search / filter line
//! row 3        column header
//! rows 4..     process rows (page height)
//! row h-3      footer: count and status message
//! row h-2      error or kill confirmation
//! row h-1      short help
//! ```

use super::crt::{ColorElement, Crt, TreeStrings};
use crate::app::{help_entries, Controller, Mode};
use crate::core::{DetailedInfo, FlatEntry, ProcessRecord, SortKey, Tab};

const VERSION: &str = env!("CARGO_PKG_VERSION");

const LIST_TOP: i32 = 4;
const NAME_WIDTH: usize = 24;
const USER_WIDTH: usize = 10;

const SHORT_HELP: &str =
    "q quit  / search  K kill  i info  Tab tabs  1-4 sort  t tree  ? help";

/// Draw the whole screen
pub fn draw(crt: &Crt, controller: &Controller) {
    crt.erase();

    match controller.mode() {
        Mode::ShowingHelp => draw_help(crt),
        Mode::ShowingDetail(detail) => draw_detail(crt, detail),
        _ => draw_main(crt, controller),
    }

    crt.refresh();
}

fn draw_main(crt: &Crt, controller: &Controller) {
    let height = crt.height();

    draw_title(crt, controller);
    draw_tabs(crt, controller.tab());
    draw_filter_line(crt, controller);

    let page = controller.page_height();
    let range = controller
        .viewport()
        .visible_range(controller.view_len(), page);

    match controller.tab() {
        Tab::Dev => draw_groups(crt, controller, range),
        _ => {
            crt.print_bar(
                LIST_TOP - 1,
                crt.color(ColorElement::Header),
                &header_line(controller.table().sort_key()),
            );
            draw_processes(crt, controller, range);
        }
    }

    let footer = match controller.tab() {
        Tab::Dev => format!("{} groups", controller.groups().len()),
        _ => format!("{} processes", controller.table().len()),
    };
    crt.print_colored(height - 3, 0, ColorElement::Dim, &footer);
    if let Some(status) = controller.status() {
        let x = footer.chars().count() as i32 + 3;
        crt.print_colored(height - 3, x, ColorElement::Status, status);
    }

    if let Mode::ConfirmingKill { pid } = controller.mode() {
        crt.print_colored(
            height - 2,
            0,
            ColorElement::Warn,
            &format!("Kill PID {}? (y/n)", pid),
        );
    } else if let Some(error) = controller.last_error() {
        crt.print_colored(height - 2, 0, ColorElement::Error, &format!("Error: {}", error));
    }

    crt.print_colored(height - 1, 0, ColorElement::Dim, SHORT_HELP);
}

fn draw_title(crt: &Crt, controller: &Controller) {
    let title = format!("pstop {}", VERSION);
    crt.print_colored(0, 0, ColorElement::Title, &title);

    let settings = controller.settings();
    let mut info = format!(
        "refresh {:.1}s  sort {}",
        settings.refresh_interval().as_secs_f64(),
        controller.table().sort_key().title()
    );
    if controller.is_tree_view() {
        info.push_str("  tree");
    }
    if settings.readonly {
        info.push_str("  read-only");
    }
    crt.print_colored(0, title.chars().count() as i32 + 3, ColorElement::Label, &info);
}

fn draw_tabs(crt: &Crt, current: Tab) {
    let mut x = 0;
    for (label, active) in tab_labels(current) {
        let element = if active {
            ColorElement::ActiveTab
        } else {
            ColorElement::InactiveTab
        };
        crt.print_colored(1, x, element, &label);
        x += label.chars().count() as i32 + 1;
    }
}

fn draw_filter_line(crt: &Crt, controller: &Controller) {
    match controller.mode() {
        Mode::Searching { draft } => {
            crt.print_colored(2, 0, ColorElement::Filter, &format!("Search: {}_", draft));
        }
        _ if !controller.table().filter().is_empty() => {
            crt.print_colored(
                2,
                0,
                ColorElement::Filter,
                &format!("Filter: {}", controller.table().filter()),
            );
        }
        _ => crt.print_colored(2, 0, ColorElement::Dim, "Press / to search"),
    }
}

fn draw_processes(crt: &Crt, controller: &Controller, range: std::ops::Range<usize>) {
    let cursor = controller.viewport().cursor;
    let offset = range.start;

    for index in range {
        let y = LIST_TOP + (index - offset) as i32;
        let (record, prefix) = if controller.is_tree_view() {
            match controller.tree_rows().get(index) {
                Some(entry) => (&entry.record, tree_prefix(entry, crt.tree_str)),
                None => break,
            }
        } else {
            match controller.table().get(index) {
                Some(record) => (record, String::new()),
                None => break,
            }
        };

        let line = format_row(record, &prefix);
        if index == cursor {
            let attr = crt.color(ColorElement::Selected);
            crt.print_bar(y, attr, &line);
        } else {
            crt.print_at(y, 0, crt.color(cpu_color(record.cpu)), &line);
        }
    }
}

fn draw_groups(crt: &Crt, controller: &Controller, range: std::ops::Range<usize>) {
    crt.print_bar(
        LIST_TOP - 1,
        crt.color(ColorElement::Header),
        &format!(
            "{:<28} {:>7} {:>7} {:>6}",
            "STACK / PROCESS", "CPU%", "MEM%", "PROCS"
        ),
    );

    let cursor = controller.viewport().cursor;
    let offset = range.start;
    let rows = group_rows(controller.groups());

    for (index, (line, is_group)) in rows.iter().enumerate().take(range.end).skip(offset) {
        let y = LIST_TOP + (index - offset) as i32;
        if index == cursor {
            crt.print_bar(y, crt.color(ColorElement::Selected), line);
        } else if *is_group {
            crt.print_colored(y, 0, ColorElement::Group, line);
        } else {
            crt.print_colored(y, 0, ColorElement::InactiveTab, line);
        }
    }
}

fn draw_detail(crt: &Crt, detail: &DetailedInfo) {
    crt.print_colored(
        0,
        0,
        ColorElement::Title,
        &format!("Process {} ({})", detail.pid, detail.name),
    );

    let mut y = 2;
    for (label, value) in detail_lines(detail) {
        if y >= crt.height() - 1 {
            break;
        }
        if label.is_empty() {
            crt.print_at(y, 4, crt.color(ColorElement::InactiveTab), &value);
        } else {
            crt.print_colored(y, 2, ColorElement::Label, &format!("{:<14}", label));
            crt.print_at(y, 17, crt.color(ColorElement::InactiveTab), &value);
        }
        y += 1;
    }

    crt.print_colored(
        crt.height() - 1,
        0,
        ColorElement::Dim,
        "Press any key to return",
    );
}

fn draw_help(crt: &Crt) {
    crt.print_colored(0, 0, ColorElement::Title, &format!("pstop {} help", VERSION));

    let mut y = 2;
    for (keys, description) in help_entries() {
        crt.print_colored(y, 2, ColorElement::Label, &format!("{:<16}", keys));
        crt.print_at(y, 19, crt.color(ColorElement::InactiveTab), description);
        y += 1;
    }

    crt.print_colored(
        crt.height() - 1,
        0,
        ColorElement::Dim,
        "Press any key to return",
    );
}

/// Color for a row by CPU usage
pub fn cpu_color(cpu: f64) -> ColorElement {
    if cpu > 50.0 {
        ColorElement::HighCpu
    } else if cpu > 20.0 {
        ColorElement::MedCpu
    } else {
        ColorElement::InactiveTab
    }
}

/// Tab bar entries, e.g. `[All]`, ` Top `, ` Dev `
pub fn tab_labels(current: Tab) -> Vec<(String, bool)> {
    Tab::all()
        .iter()
        .map(|&tab| {
            if tab == current {
                (format!("[{}]", tab.title()), true)
            } else {
                (format!(" {} ", tab.title()), false)
            }
        })
        .collect()
}

/// Column header with ` v` after the sort column
pub fn header_line(sort: SortKey) -> String {
    let title = |key: SortKey| {
        if key == sort {
            format!("{} v", key.title())
        } else {
            key.title().to_string()
        }
    };
    format!(
        "{:>7} {:<name$} {:<user$} {:>7} {:>7} {:<5} COMMAND",
        title(SortKey::Pid),
        title(SortKey::Name),
        "USER",
        title(SortKey::Cpu),
        title(SortKey::Mem),
        "STATE",
        name = NAME_WIDTH,
        user = USER_WIDTH,
    )
}

/// One process row; `prefix` holds tree connectors
pub fn format_row(record: &ProcessRecord, prefix: &str) -> String {
    let name = format!("{}{}", prefix, record.name);
    format!(
        "{:>7} {:<name_w$} {:<user_w$} {:>7.1} {:>7.1} {:<5} {}",
        record.pid,
        truncate(&name, NAME_WIDTH),
        truncate(&record.user, USER_WIDTH),
        record.cpu,
        record.mem,
        truncate(&record.state, 5),
        record.command,
        name_w = NAME_WIDTH,
        user_w = USER_WIDTH,
    )
}

/// Connectors drawn before a tree row's name
pub fn tree_prefix(entry: &FlatEntry, tree: &TreeStrings) -> String {
    if entry.depth == 0 {
        return String::new();
    }
    let mut prefix = String::new();
    for level in 1..entry.depth {
        if entry.indent & (1u64 << (level - 1).min(63)) != 0 {
            prefix.push_str(tree.vert);
        } else {
            prefix.push_str("  ");
        }
    }
    prefix.push_str(if entry.is_last { tree.bend } else { tree.rtee });
    prefix
}

/// Rows of the Dev tab: each group header followed by its members.
/// The bool marks header rows.
pub fn group_rows(groups: &[crate::core::DevGroup]) -> Vec<(String, bool)> {
    let mut rows = Vec::new();
    for group in groups {
        rows.push((
            format!(
                "{:<28} {:>7.1} {:>7.1} {:>6}",
                group.stack,
                group.total_cpu,
                group.total_mem,
                group.processes.len()
            ),
            true,
        ));
        for p in &group.processes {
            rows.push((
                format!(
                    "  {:<26} {:>7.1} {:>7.1} {:>6}",
                    truncate(&format!("{} ({})", p.name, p.pid), 26),
                    p.cpu,
                    p.mem,
                    ""
                ),
                false,
            ));
        }
    }
    rows
}

/// `(label, value)` lines of the detail screen. Continuation lines have an
/// empty label.
pub fn detail_lines(detail: &DetailedInfo) -> Vec<(String, String)> {
    let join = |items: Vec<String>| {
        if items.is_empty() {
            "-".to_string()
        } else {
            items.join(", ")
        }
    };

    let mut lines = vec![
        ("User".to_string(), detail.user.clone()),
        ("CPU".to_string(), format!("{:.1}%", detail.cpu)),
        ("Memory".to_string(), format!("{:.1}%", detail.mem)),
        ("Open files".to_string(), detail.open_files.to_string()),
        (
            "Ports".to_string(),
            join(detail.ports.iter().map(u16::to_string).collect()),
        ),
        (
            "Children".to_string(),
            join(detail.children.iter().map(i32::to_string).collect()),
        ),
    ];

    if !detail.connections.is_empty() {
        lines.push(("Connections".to_string(), String::new()));
        for c in &detail.connections {
            let mut line = format!("{} {}", c.protocol, c.local_addr);
            if !c.remote_addr.is_empty() {
                line.push_str(&format!(" -> {}", c.remote_addr));
            }
            if !c.state.is_empty() {
                line.push_str(&format!(" ({})", c.state));
            }
            lines.push((String::new(), line));
        }
    }

    if !detail.env_vars.is_empty() {
        lines.push(("Environment".to_string(), String::new()));
        for (k, v) in &detail.env_vars {
            lines.push((String::new(), format!("{}={}", k, v)));
        }
    }

    lines
}

/// Cut `text` to `width` characters, marking the cut with `~`
pub fn truncate(text: &str, width: usize) -> String {
    if text.chars().count() <= width {
        return text.to_string();
    }
    let mut out: String = text.chars().take(width.saturating_sub(1)).collect();
    out.push('~');
    out
}
