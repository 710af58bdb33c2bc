//! Interaction controller
//!
//! Owns the process table, the tree flattening, the viewport and the
//! interaction mode. `update` applies one message and returns the requests
//! the caller must run; it performs no IO itself, so the whole interaction
//! can be driven by a scripted sequence of messages.

use tracing::{debug, info, warn};

use super::keymap::{self, Command, Key, KeyContext};
use super::message::{Message, Request};
use crate::core::{
    build_forest, DetailedInfo, DevGroup, FlatEntry, PageDirection, ProcessRecord, ProcessTable,
    Settings, Tab, Viewport,
};
use crate::platform::Signal;

/// Rows taken by the title, tabs, filter line, column header and status lines
pub const CHROME_ROWS: usize = 7;

/// Page height used when the terminal is too small to fit any rows
pub const FALLBACK_PAGE_HEIGHT: usize = 10;

/// Signal sent by the kill command
pub const KILL_SIGNAL: Signal = Signal::Term;

/// Longest search query, in characters
pub const SEARCH_CHAR_LIMIT: usize = 64;

#[derive(Debug, Clone, PartialEq)]
pub enum Mode {
    Browsing,
    Searching { draft: String },
    ConfirmingKill { pid: i32 },
    ShowingDetail(Box<DetailedInfo>),
    ShowingHelp,
}

pub struct Controller {
    settings: Settings,
    table: ProcessTable,
    groups: Vec<DevGroup>,
    /// Flattened forest of the filtered view, kept only in tree mode
    tree: Vec<FlatEntry>,
    viewport: Viewport,
    mode: Mode,
    tab: Tab,
    tree_view: bool,
    /// Terminal height in rows
    height: usize,
    /// Sequence number of the last fetch issued
    next_seq: u64,
    /// Sequence number of the last fetch result applied
    applied_seq: u64,
    status: Option<String>,
    last_error: Option<String>,
    running: bool,
}

impl Controller {
    pub fn new(settings: Settings) -> Self {
        Controller {
            table: ProcessTable::new(settings.sort_key),
            groups: Vec::new(),
            tree: Vec::new(),
            viewport: Viewport::new(),
            mode: Mode::Browsing,
            tab: settings.start_tab,
            tree_view: settings.tree_view,
            height: 24,
            next_seq: 0,
            applied_seq: 0,
            status: None,
            last_error: None,
            running: true,
            settings,
        }
    }

    /// Requests that start the first fetch and the tick timer
    pub fn init(&mut self) -> Vec<Request> {
        vec![
            self.fetch_request(),
            Request::ScheduleTick(self.settings.refresh_interval()),
        ]
    }

    /// Apply an initial filter, as if it had been typed and confirmed
    pub fn set_filter(&mut self, query: &str) {
        self.table.set_filter(query);
        self.refresh_tree();
        self.viewport.reset();
    }

    /// Apply one message
    pub fn update(&mut self, msg: Message) -> Vec<Request> {
        match msg {
            Message::Key(key) => self.handle_key(key),
            Message::Tick => vec![
                self.fetch_request(),
                Request::ScheduleTick(self.settings.refresh_interval()),
            ],
            Message::Resize { height } => {
                self.height = height;
                self.clamp();
                Vec::new()
            }
            Message::Processes { seq, tab, result } => {
                if self.accept(seq, tab) {
                    match result {
                        Ok(records) => {
                            self.table.load_snapshot(records);
                            self.refresh_tree();
                            self.clamp();
                            self.last_error = None;
                        }
                        Err(e) => self.record_error(e.to_string()),
                    }
                }
                Vec::new()
            }
            Message::Groups { seq, result } => {
                if self.accept(seq, Tab::Dev) {
                    match result {
                        Ok(groups) => {
                            self.groups = groups;
                            self.clamp();
                            self.last_error = None;
                        }
                        Err(e) => self.record_error(e.to_string()),
                    }
                }
                Vec::new()
            }
            Message::Detail { pid, result } => {
                match result {
                    Ok(detail) if self.mode == Mode::Browsing => {
                        self.mode = Mode::ShowingDetail(Box::new(detail));
                    }
                    Ok(_) => debug!(pid, "detail arrived outside browsing, dropped"),
                    Err(e) => self.record_error(e.to_string()),
                }
                Vec::new()
            }
            Message::Killed { pid, result } => {
                let status = match result {
                    Ok(()) => {
                        info!(pid, "process killed");
                        format!("Killed PID {}", pid)
                    }
                    Err(e) => {
                        warn!(pid, error = %e, "kill failed");
                        format!("Failed to kill PID {}: {}", pid, e)
                    }
                };
                self.status = Some(status);
                vec![self.fetch_request()]
            }
        }
    }

    /// Whether a fetch result should be applied. Results for another tab and
    /// results older than the last applied one are dropped.
    fn accept(&mut self, seq: u64, tab: Tab) -> bool {
        if tab != self.tab {
            debug!(seq, ?tab, current = ?self.tab, "result for another tab, dropped");
            return false;
        }
        if seq < self.applied_seq {
            debug!(seq, applied = self.applied_seq, "stale result, dropped");
            return false;
        }
        self.applied_seq = seq;
        true
    }

    fn record_error(&mut self, error: String) {
        warn!(%error, "fetch failed");
        self.last_error = Some(error);
    }

    /// Issue a fetch for the current tab
    fn fetch_request(&mut self) -> Request {
        self.next_seq += 1;
        let seq = self.next_seq;
        match self.tab {
            Tab::All => Request::FetchAll { seq },
            Tab::Top => Request::FetchTop {
                seq,
                n: self.settings.top_count,
            },
            Tab::Dev => Request::FetchGroups { seq },
        }
    }

    fn handle_key(&mut self, key: Key) -> Vec<Request> {
        match &mut self.mode {
            Mode::ShowingDetail(_) | Mode::ShowingHelp => {
                self.mode = Mode::Browsing;
                Vec::new()
            }
            Mode::Searching { draft } => {
                match keymap::lookup(KeyContext::Search, key) {
                    Some(Command::Confirm) => {
                        let query = std::mem::take(draft);
                        self.mode = Mode::Browsing;
                        self.set_filter(&query);
                    }
                    Some(Command::Cancel) => {
                        self.mode = Mode::Browsing;
                        self.set_filter("");
                    }
                    _ => {
                        let edited = match key {
                            Key::Char(c) if draft.chars().count() < SEARCH_CHAR_LIMIT => {
                                draft.push(c);
                                true
                            }
                            Key::Backspace => draft.pop().is_some(),
                            _ => false,
                        };
                        if edited {
                            let query = draft.clone();
                            self.set_filter(&query);
                        }
                    }
                }
                Vec::new()
            }
            Mode::ConfirmingKill { pid } => {
                let pid = *pid;
                match keymap::lookup(KeyContext::Confirm, key) {
                    Some(Command::Confirm) => {
                        self.mode = Mode::Browsing;
                        vec![Request::Kill {
                            pid,
                            signal: KILL_SIGNAL,
                        }]
                    }
                    Some(Command::Cancel) => {
                        self.mode = Mode::Browsing;
                        Vec::new()
                    }
                    _ => Vec::new(),
                }
            }
            Mode::Browsing => match keymap::lookup(KeyContext::Browse, key) {
                Some(cmd) => self.handle_command(cmd),
                None => Vec::new(),
            },
        }
    }

    fn handle_command(&mut self, cmd: Command) -> Vec<Request> {
        let len = self.view_len();
        let page = self.page_height();

        match cmd {
            Command::Up => self.viewport.move_cursor(-1, len, page),
            Command::Down => self.viewport.move_cursor(1, len, page),
            Command::PageUp => self.viewport.page_move(PageDirection::Up, page, len),
            Command::PageDown => self.viewport.page_move(PageDirection::Down, page, len),
            Command::Quit => self.running = false,
            Command::Kill => {
                if let Some(pid) = self.selected_pid() {
                    if self.settings.readonly {
                        self.status = Some("Kill disabled in read-only mode".to_string());
                    } else {
                        self.mode = Mode::ConfirmingKill { pid };
                    }
                }
            }
            Command::Info => {
                if let Some(pid) = self.selected_pid() {
                    return vec![Request::FetchDetail { pid }];
                }
            }
            Command::Search => {
                self.mode = Mode::Searching {
                    draft: String::new(),
                }
            }
            Command::NextTab => {
                self.tab = self.tab.next();
                self.viewport.reset();
                return vec![self.fetch_request()];
            }
            Command::Help => self.mode = Mode::ShowingHelp,
            Command::SortBy(key) => {
                self.table.set_sort(key);
                self.refresh_tree();
                self.clamp();
            }
            Command::ToggleTree => {
                self.tree_view = !self.tree_view;
                self.refresh_tree();
                self.clamp();
            }
            Command::Confirm | Command::Cancel => {}
        }
        Vec::new()
    }

    fn refresh_tree(&mut self) {
        self.tree = if self.tree_view {
            build_forest(&self.table.to_vec()).flatten()
        } else {
            Vec::new()
        };
    }

    fn clamp(&mut self) {
        let len = self.view_len();
        let page = self.page_height();
        self.viewport.clamp(len, page);
    }

    /// Rows available for the list
    pub fn page_height(&self) -> usize {
        match self.height.saturating_sub(CHROME_ROWS) {
            0 => FALLBACK_PAGE_HEIGHT,
            h => h,
        }
    }

    /// Number of rows in the current view
    pub fn view_len(&self) -> usize {
        match self.tab {
            Tab::Dev => self.groups.iter().map(|g| 1 + g.processes.len()).sum(),
            _ if self.tree_view => self.tree.len(),
            _ => self.table.len(),
        }
    }

    /// Record under the cursor. The Dev tab has no selectable records.
    pub fn selected(&self) -> Option<&ProcessRecord> {
        let cursor = self.viewport.cursor;
        match self.tab {
            Tab::Dev => None,
            _ if self.tree_view => self.tree.get(cursor).map(|e| &e.record),
            _ => self.table.get(cursor),
        }
    }

    pub fn selected_pid(&self) -> Option<i32> {
        self.selected().map(|r| r.pid)
    }

    pub fn mode(&self) -> &Mode {
        &self.mode
    }

    pub fn tab(&self) -> Tab {
        self.tab
    }

    pub fn table(&self) -> &ProcessTable {
        &self.table
    }

    pub fn groups(&self) -> &[DevGroup] {
        &self.groups
    }

    pub fn tree_rows(&self) -> &[FlatEntry] {
        &self.tree
    }

    pub fn is_tree_view(&self) -> bool {
        self.tree_view
    }

    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    pub fn status(&self) -> Option<&str> {
        self.status.as_deref()
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Settings with the sort key and tree mode chosen during the session
    pub fn into_settings(self) -> Settings {
        let mut settings = self.settings;
        let sort_key = self.table.sort_key();
        if settings.sort_key != sort_key || settings.tree_view != self.tree_view {
            settings.sort_key = sort_key;
            settings.tree_view = self.tree_view;
            settings.changed = true;
        }
        settings
    }
}
