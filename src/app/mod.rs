//! Interactive application state
//!
//! - keymap: key decoding targets and per-context binding tables
//! - message: messages into the controller and requests out of it
//! - controller: the interaction state machine
//! - dispatcher: runs requests in the background and posts results

mod controller;
mod dispatcher;
mod keymap;
mod message;

pub use controller::*;
pub use dispatcher::*;
pub use keymap::*;
pub use message::*;
