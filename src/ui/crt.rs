//! CRT - Terminal abstraction using ncurses
//!
//! This module owns terminal setup and teardown, the color table, and the
//! translation of raw ncurses key codes into `Key`s.

use ncurses::CURSOR_VISIBILITY::{CURSOR_INVISIBLE, CURSOR_VISIBLE};
use ncurses::*;

use crate::app::Key;
use crate::core::Settings;

/// How long `read_input` waits for input, in milliseconds. Short enough that
/// results posted by background requests are drawn promptly.
pub const INPUT_TIMEOUT_MS: i32 = 100;

const KEY_TAB: i32 = 9;
const KEY_LF: i32 = 10;
const KEY_CR: i32 = 13;
const KEY_ESC: i32 = 27;
const KEY_DEL: i32 = 127;
const KEY_CTRL_H: i32 = 8;

/// Raw input: an ncurses key code or a (possibly wide) character
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Input {
    Code(i32),
    Char(u32),
}

/// Tree connector pieces
pub struct TreeStrings {
    pub vert: &'static str,
    pub rtee: &'static str,
    pub bend: &'static str,
}

pub const TREE_ASCII: TreeStrings = TreeStrings {
    vert: "| ",
    rtee: "|- ",
    bend: "`- ",
};

pub const TREE_UTF8: TreeStrings = TreeStrings {
    vert: "\u{2502} ",          // │
    rtee: "\u{251c}\u{2500} ", // ├─
    bend: "\u{2514}\u{2500} ", // └─
};

/// Screen elements with their own color
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(usize)]
pub enum ColorElement {
    Title = 0,
    Header,
    ActiveTab,
    InactiveTab,
    HighCpu,
    MedCpu,
    Selected,
    Status,
    Error,
    Filter,
    Warn,
    Label,
    Dim,
    Group,
    LastColorElement,
}

/// Foreground, background and extra attributes per element. -1 is the
/// terminal's default color.
fn color_table() -> [(ColorElement, i16, i16, attr_t); ColorElement::LastColorElement as usize] {
    [
        (ColorElement::Title, COLOR_CYAN, -1, A_BOLD),
        (ColorElement::Header, COLOR_BLACK, COLOR_GREEN, A_NORMAL),
        (ColorElement::ActiveTab, COLOR_BLACK, COLOR_CYAN, A_BOLD),
        (ColorElement::InactiveTab, COLOR_WHITE, -1, A_NORMAL),
        (ColorElement::HighCpu, COLOR_RED, -1, A_BOLD),
        (ColorElement::MedCpu, COLOR_YELLOW, -1, A_NORMAL),
        (ColorElement::Selected, COLOR_BLACK, COLOR_CYAN, A_NORMAL),
        (ColorElement::Status, COLOR_GREEN, -1, A_NORMAL),
        (ColorElement::Error, COLOR_RED, -1, A_BOLD),
        (ColorElement::Filter, COLOR_YELLOW, -1, A_NORMAL),
        (ColorElement::Warn, COLOR_YELLOW, -1, A_BOLD),
        (ColorElement::Label, COLOR_CYAN, -1, A_NORMAL),
        (ColorElement::Dim, COLOR_WHITE, -1, A_DIM),
        (ColorElement::Group, COLOR_MAGENTA, -1, A_BOLD),
    ]
}

/// CRT - Terminal handler
pub struct Crt {
    colors: Vec<attr_t>,
    pub tree_str: &'static TreeStrings,
    pub utf8: bool,
    screen_width: i32,
    screen_height: i32,
}

impl Crt {
    /// Initialize the terminal
    pub fn new(settings: &Settings) -> anyhow::Result<Self> {
        // Locale must be set before initscr for wide characters
        unsafe {
            let lc_ctype = std::env::var("LC_CTYPE")
                .ok()
                .or_else(|| std::env::var("LC_ALL").ok());

            if let Some(lc) = lc_ctype {
                let c_str = std::ffi::CString::new(lc).unwrap_or_default();
                libc::setlocale(libc::LC_CTYPE, c_str.as_ptr());
            } else {
                libc::setlocale(libc::LC_CTYPE, b"\0".as_ptr() as *const libc::c_char);
            }
        }

        initscr();
        noecho();
        cbreak();
        curs_set(CURSOR_INVISIBLE);
        keypad(stdscr(), true);
        ncurses::timeout(INPUT_TIMEOUT_MS);

        let colored = settings.color && has_colors();
        if colored {
            start_color();
            use_default_colors();
        }

        let utf8 = Self::check_utf8_support();
        let mut crt = Crt {
            colors: vec![A_NORMAL; ColorElement::LastColorElement as usize],
            tree_str: if utf8 { &TREE_UTF8 } else { &TREE_ASCII },
            utf8,
            screen_width: 0,
            screen_height: 0,
        };

        if colored {
            crt.setup_colors();
        } else {
            crt.setup_monochrome();
        }
        crt.update_size();

        Ok(crt)
    }

    fn check_utf8_support() -> bool {
        #[cfg(unix)]
        {
            use std::ffi::CStr;

            let codeset = unsafe {
                let ptr = libc::nl_langinfo(libc::CODESET);
                if !ptr.is_null() {
                    CStr::from_ptr(ptr).to_string_lossy().to_string()
                } else {
                    String::new()
                }
            };

            let codeset = codeset.to_uppercase();
            if codeset == "UTF-8" || codeset == "UTF8" {
                return true;
            }
        }

        ["LANG", "LC_ALL", "LC_CTYPE"].iter().any(|var| {
            std::env::var(var)
                .map(|v| v.to_lowercase().contains("utf"))
                .unwrap_or(false)
        })
    }

    fn setup_colors(&mut self) {
        for (pair, (element, fg, bg, attr)) in (1i16..).zip(color_table()) {
            init_pair(pair, fg, bg);
            self.colors[element as usize] = COLOR_PAIR(pair) | attr;
        }
    }

    /// Terminal attributes only
    fn setup_monochrome(&mut self) {
        for (element, _, _, _) in color_table() {
            self.colors[element as usize] = match element {
                ColorElement::Header | ColorElement::ActiveTab | ColorElement::Selected => {
                    A_REVERSE
                }
                ColorElement::Title
                | ColorElement::HighCpu
                | ColorElement::Error
                | ColorElement::Warn
                | ColorElement::Group => A_BOLD,
                ColorElement::Dim => A_DIM,
                _ => A_NORMAL,
            };
        }
    }

    /// Get color attribute for an element
    pub fn color(&self, element: ColorElement) -> attr_t {
        self.colors
            .get(element as usize)
            .copied()
            .unwrap_or(A_NORMAL)
    }

    pub fn update_size(&mut self) {
        getmaxyx(stdscr(), &mut self.screen_height, &mut self.screen_width);
    }

    pub fn width(&self) -> i32 {
        self.screen_width
    }

    pub fn height(&self) -> i32 {
        self.screen_height
    }

    /// Read one key or character, waiting at most `INPUT_TIMEOUT_MS`
    pub fn read_input(&self) -> Option<Input> {
        match get_wch()? {
            WchResult::KeyCode(code) => Some(Input::Code(code)),
            WchResult::Char(c) => Some(Input::Char(c)),
        }
    }

    /// Clear the screen without forcing a full repaint
    pub fn erase(&self) {
        erase();
    }

    pub fn refresh(&self) {
        refresh();
    }

    /// Print a string with attributes, cut to the screen width
    pub fn print_at(&self, y: i32, x: i32, attr: attr_t, text: &str) {
        if y < 0 || y >= self.screen_height || x >= self.screen_width {
            return;
        }
        let room = (self.screen_width - x).max(0) as usize;
        let clipped: String = text.chars().take(room).collect();
        attrset(attr);
        let _ = mvaddstr(y, x, &clipped);
        attrset(A_NORMAL);
    }

    /// Print a string with a specific color element
    pub fn print_colored(&self, y: i32, x: i32, element: ColorElement, text: &str) {
        self.print_at(y, x, self.color(element), text);
    }

    /// Fill a whole row with an attribute, then print `text` on it
    pub fn print_bar(&self, y: i32, attr: attr_t, text: &str) {
        let width = self.screen_width.max(0) as usize;
        self.print_at(y, 0, attr, &format!("{:<width$}", text, width = width));
    }

    /// Clean up terminal
    pub fn done(&self) {
        curs_set(CURSOR_VISIBLE);
        endwin();
    }
}

impl Drop for Crt {
    fn drop(&mut self) {
        self.done();
    }
}

/// Translate an ncurses key code. Codes with no meaning here yield `None`.
pub fn decode_input(input: Input) -> Option<Key> {
    match input {
        Input::Code(code) => decode_key(code),
        Input::Char(c) if c < 0x80 => decode_key(c as i32),
        Input::Char(c) => char::from_u32(c)
            .filter(|ch| !ch.is_control())
            .map(Key::Char),
    }
}

fn decode_key(ch: i32) -> Option<Key> {
    let key = match ch {
        KEY_UP => Key::Up,
        KEY_DOWN => Key::Down,
        KEY_PPAGE => Key::PageUp,
        KEY_NPAGE => Key::PageDown,
        KEY_ENTER | KEY_LF | KEY_CR => Key::Enter,
        KEY_ESC => Key::Esc,
        KEY_TAB => Key::Tab,
        KEY_BACKSPACE | KEY_DEL | KEY_CTRL_H => Key::Backspace,
        1..=26 => Key::Ctrl((b'a' + (ch - 1) as u8) as char),
        32..=126 => Key::Char(ch as u8 as char),
        _ => return None,
    };
    Some(key)
}
