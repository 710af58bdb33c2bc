//! Messages consumed by the controller and the requests it emits

use std::time::Duration;

use super::keymap::Key;
use crate::core::{DetailedInfo, DevGroup, ProcessRecord, Tab};
use crate::platform::{ProviderError, Signal, SignalError};

/// Everything that can change controller state.
///
/// Keys and resizes come from the terminal, the rest from completed
/// requests. All of them arrive through one channel, in arrival order.
#[derive(Debug)]
pub enum Message {
    Key(Key),
    Tick,
    Resize {
        height: usize,
    },
    /// Result of `FetchAll` or `FetchTop`
    Processes {
        seq: u64,
        tab: Tab,
        result: Result<Vec<ProcessRecord>, ProviderError>,
    },
    /// Result of `FetchGroups`
    Groups {
        seq: u64,
        result: Result<Vec<DevGroup>, ProviderError>,
    },
    Detail {
        pid: i32,
        result: Result<DetailedInfo, ProviderError>,
    },
    Killed {
        pid: i32,
        result: Result<(), SignalError>,
    },
}

/// Side effects requested by the controller
#[derive(Debug, Clone, PartialEq)]
pub enum Request {
    FetchAll { seq: u64 },
    FetchTop { seq: u64, n: usize },
    FetchGroups { seq: u64 },
    FetchDetail { pid: i32 },
    Kill { pid: i32, signal: Signal },
    /// Post a `Tick` after the delay
    ScheduleTick(Duration),
}

impl Request {
    /// Sequence number of a snapshot or group fetch
    pub fn seq(&self) -> Option<u64> {
        match self {
            Request::FetchAll { seq }
            | Request::FetchTop { seq, .. }
            | Request::FetchGroups { seq } => Some(*seq),
            _ => None,
        }
    }
}
