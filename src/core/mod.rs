//! Core module containing the main data structures
//!
//! This module contains:
//! - ProcessRecord / ProcessTable: snapshot records and the filtered, sorted view
//! - Forest: parent/child projection of a snapshot
//! - Viewport: cursor and scroll position
//! - DevGroup: developer stack aggregation
//! - Settings: user configuration

mod process;
mod settings;
mod stack;
mod tree;
mod viewport;

pub use process::*;
pub use settings::*;
pub use stack::*;
pub use tree::*;
pub use viewport::*;
