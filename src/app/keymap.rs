//! Key bindings
//!
//! Keys are decoded by the terminal layer into `Key` and looked up in a
//! static table per context. The controller only ever sees `Command`s,
//! except while editing a search draft where printable keys are text.

use crate::core::SortKey;

/// A decoded keystroke
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Key {
    Char(char),
    /// Control + letter, stored lowercase
    Ctrl(char),
    Up,
    Down,
    PageUp,
    PageDown,
    Enter,
    Esc,
    Tab,
    Backspace,
}

impl Key {
    /// Short label used on the help screen
    pub fn label(self) -> String {
        match self {
            Key::Char(' ') => "Space".to_string(),
            Key::Char(c) => c.to_string(),
            Key::Ctrl(c) => format!("Ctrl-{}", c.to_ascii_uppercase()),
            Key::Up => "Up".to_string(),
            Key::Down => "Down".to_string(),
            Key::PageUp => "PgUp".to_string(),
            Key::PageDown => "PgDn".to_string(),
            Key::Enter => "Enter".to_string(),
            Key::Esc => "Esc".to_string(),
            Key::Tab => "Tab".to_string(),
            Key::Backspace => "Backspace".to_string(),
        }
    }
}

/// What a key means in its context
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Up,
    Down,
    PageUp,
    PageDown,
    Quit,
    Kill,
    Info,
    Search,
    NextTab,
    Help,
    SortBy(SortKey),
    ToggleTree,
    Confirm,
    Cancel,
}

/// Which table a key is looked up in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyContext {
    Browse,
    Search,
    Confirm,
}

pub struct Binding {
    pub keys: &'static [Key],
    pub command: Command,
    pub help: &'static str,
}

const BROWSE: &[Binding] = &[
    Binding {
        keys: &[Key::Char('k'), Key::Up],
        command: Command::Up,
        help: "move up",
    },
    Binding {
        keys: &[Key::Char('j'), Key::Down],
        command: Command::Down,
        help: "move down",
    },
    Binding {
        keys: &[Key::PageUp, Key::Ctrl('u')],
        command: Command::PageUp,
        help: "page up",
    },
    Binding {
        keys: &[Key::PageDown, Key::Ctrl('d')],
        command: Command::PageDown,
        help: "page down",
    },
    Binding {
        keys: &[Key::Char('/')],
        command: Command::Search,
        help: "search",
    },
    Binding {
        keys: &[Key::Char('K')],
        command: Command::Kill,
        help: "kill process",
    },
    Binding {
        keys: &[Key::Char('i')],
        command: Command::Info,
        help: "process info",
    },
    Binding {
        keys: &[Key::Tab],
        command: Command::NextTab,
        help: "next tab (All, Top, Dev)",
    },
    Binding {
        keys: &[Key::Char('1')],
        command: Command::SortBy(SortKey::Cpu),
        help: "sort by CPU",
    },
    Binding {
        keys: &[Key::Char('2')],
        command: Command::SortBy(SortKey::Mem),
        help: "sort by memory",
    },
    Binding {
        keys: &[Key::Char('3')],
        command: Command::SortBy(SortKey::Pid),
        help: "sort by PID",
    },
    Binding {
        keys: &[Key::Char('4')],
        command: Command::SortBy(SortKey::Name),
        help: "sort by name",
    },
    Binding {
        keys: &[Key::Char('t')],
        command: Command::ToggleTree,
        help: "toggle tree view",
    },
    Binding {
        keys: &[Key::Char('?')],
        command: Command::Help,
        help: "toggle help",
    },
    Binding {
        keys: &[Key::Char('q'), Key::Ctrl('c')],
        command: Command::Quit,
        help: "quit",
    },
];

const SEARCH: &[Binding] = &[
    Binding {
        keys: &[Key::Enter],
        command: Command::Confirm,
        help: "apply filter",
    },
    Binding {
        keys: &[Key::Esc],
        command: Command::Cancel,
        help: "clear filter",
    },
];

const CONFIRM: &[Binding] = &[
    Binding {
        keys: &[Key::Char('y')],
        command: Command::Confirm,
        help: "confirm",
    },
    Binding {
        keys: &[Key::Char('n'), Key::Esc],
        command: Command::Cancel,
        help: "cancel",
    },
];

/// All bindings of a context, in help order
pub fn bindings(context: KeyContext) -> &'static [Binding] {
    match context {
        KeyContext::Browse => BROWSE,
        KeyContext::Search => SEARCH,
        KeyContext::Confirm => CONFIRM,
    }
}

/// The command bound to `key`, if any
pub fn lookup(context: KeyContext, key: Key) -> Option<Command> {
    bindings(context)
        .iter()
        .find(|b| b.keys.contains(&key))
        .map(|b| b.command)
}

/// `(keys, description)` rows for the help screen
pub fn help_entries() -> Vec<(String, &'static str)> {
    [KeyContext::Browse, KeyContext::Search, KeyContext::Confirm]
        .iter()
        .flat_map(|&ctx| bindings(ctx).iter())
        .map(|b| {
            let keys: Vec<String> = b.keys.iter().map(|k| k.label()).collect();
            (keys.join("/"), b.help)
        })
        .collect()
}
