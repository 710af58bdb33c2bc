//! UI module
//!
//! This module contains all UI-related components:
//! - CRT: Terminal abstraction using ncurses
//! - Render: draws the controller state
//! - ScreenManager: the main loop

mod crt;
mod render;
mod screen_manager;

pub use crt::*;
pub use screen_manager::*;
