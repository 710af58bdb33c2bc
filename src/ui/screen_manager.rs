//! ScreenManager - the main event loop
//!
//! Keys, resizes and request results all pass through one channel and are
//! handed to the controller one at a time, in arrival order. The requests
//! the controller returns go to the dispatcher, which posts results back
//! into the same channel.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;

use ncurses::KEY_RESIZE;
use tracing::{debug, info};

use super::crt::{decode_input, Crt, Input};
use super::render;
use crate::app::{Controller, Dispatcher, Message};
use crate::core::Settings;
use crate::platform::SnapshotProvider;

pub struct ScreenManager {
    controller: Controller,
    dispatcher: Dispatcher,
    tx: Sender<Message>,
    rx: Receiver<Message>,
}

impl ScreenManager {
    pub fn new(controller: Controller, provider: Arc<dyn SnapshotProvider>) -> Self {
        let (tx, rx) = mpsc::channel();
        ScreenManager {
            controller,
            dispatcher: Dispatcher::new(provider, tx.clone()),
            tx,
            rx,
        }
    }

    /// Run until the quit key or until `running` is cleared by a signal
    pub fn run(&mut self, crt: &mut Crt, running: &AtomicBool) -> anyhow::Result<()> {
        info!("starting event loop");
        self.post(Message::Resize {
            height: crt.height().max(0) as usize,
        });
        let requests = self.controller.init();
        self.dispatcher.dispatch(requests);

        loop {
            if !running.load(Ordering::SeqCst) {
                debug!("interrupted");
                break;
            }

            while let Ok(msg) = self.rx.try_recv() {
                let requests = self.controller.update(msg);
                self.dispatcher.dispatch(requests);
            }

            if !self.controller.is_running() {
                break;
            }

            render::draw(crt, &self.controller);

            match crt.read_input() {
                Some(Input::Code(KEY_RESIZE)) => {
                    crt.update_size();
                    self.post(Message::Resize {
                        height: crt.height().max(0) as usize,
                    });
                }
                Some(input) => {
                    if let Some(key) = decode_input(input) {
                        self.post(Message::Key(key));
                    }
                }
                None => {}
            }
        }

        info!("event loop finished");
        Ok(())
    }

    fn post(&self, msg: Message) {
        // The receiver lives in self, so this cannot fail
        let _ = self.tx.send(msg);
    }

    /// Settings to persist after the session
    pub fn into_settings(self) -> Settings {
        self.controller.into_settings()
    }
}
