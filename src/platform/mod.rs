//! Platform-specific process information
//!
//! This module provides the snapshot provider used by the interactive view and
//! the CLI: full and top-N process lists, developer stack groups, detailed
//! single-process information, and signal delivery.

use std::sync::Arc;

use crate::core::{group_by_stack, sort_records, DetailedInfo, DevGroup, ProcessRecord, SortKey};

mod crash;
mod error;
mod parse;
mod signal;

#[cfg(target_os = "linux")]
mod linux;

#[cfg(not(target_os = "linux"))]
mod darwin;

pub use crash::*;
pub use error::*;
pub use parse::*;
pub use signal::*;

/// Source of process snapshots.
///
/// Every call returns a fresh, independent result. Implementations may keep
/// private sampling state but never share it with the caller.
pub trait SnapshotProvider: Send + Sync {
    /// All processes
    fn fetch_all(&self) -> Result<Vec<ProcessRecord>, ProviderError>;

    /// The `n` processes using the most CPU
    fn fetch_top(&self, n: usize) -> Result<Vec<ProcessRecord>, ProviderError> {
        let mut procs = self.fetch_all()?;
        sort_records(&mut procs, SortKey::Cpu);
        procs.truncate(n);
        Ok(procs)
    }

    /// Processes grouped by developer stack
    fn fetch_groups(&self) -> Result<Vec<DevGroup>, ProviderError> {
        Ok(group_by_stack(&self.fetch_all()?))
    }

    /// Detailed information about one process
    fn fetch_detail(&self, pid: i32) -> Result<DetailedInfo, ProviderError>;

    /// Send a signal to a process
    fn send_signal(&self, pid: i32, sig: Signal) -> Result<(), SignalError> {
        signal::send_signal(pid, sig)
    }
}

/// The provider for the running platform
pub fn native() -> Arc<dyn SnapshotProvider> {
    #[cfg(target_os = "linux")]
    {
        Arc::new(linux::LinuxProvider::new())
    }
    #[cfg(not(target_os = "linux"))]
    {
        Arc::new(darwin::PsProvider::new())
    }
}
