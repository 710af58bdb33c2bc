//! Request dispatcher
//!
//! Runs controller requests off the event loop and posts their results back
//! as messages.
//!
//! ```text
//! Event loop                     Workers
//! ──────────                     ───────
//! controller.update(msg)
//!   │
//!   └─► dispatch(requests) ────► rayon::spawn: provider.fetch_*() / send_signal()
//!                          ────► thread::spawn: sleep(delay)
//!                                    │
//! rx.try_recv() ◄──────────────────── tx.send(Message::...)
//! ```
//!
//! A send fails only after the event loop has dropped its receiver, at which
//! point the result has nobody to go to and is discarded.

use std::sync::mpsc::Sender;
use std::sync::Arc;
use std::thread;

use tracing::{debug, trace};

use super::message::{Message, Request};
use crate::core::Tab;
use crate::platform::SnapshotProvider;

pub struct Dispatcher {
    provider: Arc<dyn SnapshotProvider>,
    tx: Sender<Message>,
}

impl Dispatcher {
    pub fn new(provider: Arc<dyn SnapshotProvider>, tx: Sender<Message>) -> Self {
        Dispatcher { provider, tx }
    }

    /// Start every request in the background
    pub fn dispatch(&self, requests: Vec<Request>) {
        for request in requests {
            debug!(?request, "dispatch");
            let tx = self.tx.clone();

            if let Request::ScheduleTick(delay) = request {
                thread::spawn(move || {
                    thread::sleep(delay);
                    post(&tx, Message::Tick);
                });
                continue;
            }

            let provider = Arc::clone(&self.provider);
            rayon::spawn(move || {
                post(&tx, execute(provider.as_ref(), request));
            });
        }
    }
}

/// Send a result to the event loop. Returns false if it has gone away.
fn post(tx: &Sender<Message>, msg: Message) -> bool {
    match tx.send(msg) {
        Ok(()) => true,
        Err(err) => {
            trace!(message = ?err.0, "event loop gone, result dropped");
            false
        }
    }
}

/// Run one request synchronously and wrap its result.
/// `ScheduleTick` has no work to do and yields `Tick` at once.
pub fn execute(provider: &dyn SnapshotProvider, request: Request) -> Message {
    match request {
        Request::FetchAll { seq } => Message::Processes {
            seq,
            tab: Tab::All,
            result: provider.fetch_all(),
        },
        Request::FetchTop { seq, n } => Message::Processes {
            seq,
            tab: Tab::Top,
            result: provider.fetch_top(n),
        },
        Request::FetchGroups { seq } => Message::Groups {
            seq,
            result: provider.fetch_groups(),
        },
        Request::FetchDetail { pid } => Message::Detail {
            pid,
            result: provider.fetch_detail(pid),
        },
        Request::Kill { pid, signal } => Message::Killed {
            pid,
            result: provider.send_signal(pid, signal),
        },
        Request::ScheduleTick(_) => Message::Tick,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{DetailedInfo, ProcessRecord};
    use crate::platform::{ProviderError, Signal, SignalError};
    use std::sync::mpsc;
    use std::sync::Mutex;
    use std::time::Duration;

    struct FakeProvider {
        records: Vec<ProcessRecord>,
        signals: Mutex<Vec<(i32, Signal)>>,
    }

    impl FakeProvider {
        fn new() -> Self {
            let mut node = ProcessRecord::new(10, 1, "node");
            node.cpu = 3.0;
            FakeProvider {
                records: vec![ProcessRecord::new(1, 0, "init"), node],
                signals: Mutex::new(Vec::new()),
            }
        }
    }

    impl SnapshotProvider for FakeProvider {
        fn fetch_all(&self) -> Result<Vec<ProcessRecord>, ProviderError> {
            Ok(self.records.clone())
        }

        fn fetch_detail(&self, pid: i32) -> Result<DetailedInfo, ProviderError> {
            Err(ProviderError::NotFound(pid))
        }

        fn send_signal(&self, pid: i32, sig: Signal) -> Result<(), SignalError> {
            self.signals.lock().unwrap().push((pid, sig));
            Ok(())
        }
    }

    #[test]
    fn test_execute_tags_results() {
        let provider = FakeProvider::new();

        match execute(&provider, Request::FetchTop { seq: 4, n: 1 }) {
            Message::Processes { seq, tab, result } => {
                assert_eq!(seq, 4);
                assert_eq!(tab, Tab::Top);
                assert_eq!(result.unwrap()[0].pid, 10);
            }
            other => panic!("unexpected {:?}", other),
        }

        match execute(&provider, Request::FetchGroups { seq: 5 }) {
            Message::Groups { seq, result } => {
                assert_eq!(seq, 5);
                assert_eq!(result.unwrap().len(), 1);
            }
            other => panic!("unexpected {:?}", other),
        }

        assert!(matches!(
            execute(&provider, Request::FetchDetail { pid: 3 }),
            Message::Detail {
                pid: 3,
                result: Err(ProviderError::NotFound(3))
            }
        ));
    }

    #[test]
    fn test_execute_kill_uses_provider() {
        let provider = FakeProvider::new();
        let msg = execute(
            &provider,
            Request::Kill {
                pid: 10,
                signal: Signal::Term,
            },
        );
        assert!(matches!(msg, Message::Killed { pid: 10, result: Ok(()) }));
        assert_eq!(*provider.signals.lock().unwrap(), vec![(10, Signal::Term)]);
    }

    #[test]
    fn test_dispatch_posts_results() {
        let (tx, rx) = mpsc::channel();
        let dispatcher = Dispatcher::new(Arc::new(FakeProvider::new()), tx);
        dispatcher.dispatch(vec![
            Request::FetchAll { seq: 1 },
            Request::ScheduleTick(Duration::from_millis(1)),
        ]);

        let mut got_processes = false;
        let mut got_tick = false;
        for _ in 0..2 {
            match rx.recv_timeout(Duration::from_secs(5)).unwrap() {
                Message::Processes { seq: 1, .. } => got_processes = true,
                Message::Tick => got_tick = true,
                other => panic!("unexpected {:?}", other),
            }
        }
        assert!(got_processes && got_tick);
    }

    #[test]
    fn test_post_after_event_loop_exit() {
        let (tx, rx) = mpsc::channel();
        assert!(post(&tx, Message::Tick));
        assert!(matches!(rx.recv().unwrap(), Message::Tick));

        drop(rx);
        assert!(!post(&tx, Message::Tick));
    }
}
