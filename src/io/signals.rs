//! Shutdown signal handling for the alarm daemon and blocking commands.
//!
//! SIGINT, SIGTERM and SIGHUP all clear the shared `running` flag; loops poll it
//! between sleep slices.

use anyhow::{Context, Result};
use signal_hook::{
    consts::signal::{SIGHUP, SIGINT, SIGTERM},
    iterator::Signals,
};
use std::{
    sync::Arc,
    sync::atomic::{AtomicBool, Ordering},
    thread,
};

/// Signal handling state shared between threads
pub struct SignalState {
    /// Atomic flag indicating if the application should keep running
    pub running: Arc<AtomicBool>,
}

impl SignalState {
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }
}

/// Register handlers and start the listener thread.
pub fn setup_signal_handler() -> Result<SignalState> {
    let running = Arc::new(AtomicBool::new(true));

    let mut signals =
        Signals::new([SIGINT, SIGTERM, SIGHUP]).context("failed to register signal handlers")?;

    let running_clone = running.clone();
    thread::spawn(move || {
        if let Some(sig) = signals.forever().next() {
            let name = match sig {
                SIGINT => "SIGINT",
                SIGTERM => "SIGTERM",
                _ => "SIGHUP",
            };
            log_pipe!();
            log_info!("Received {}, shutting down", name);
            running_clone.store(false, Ordering::SeqCst);
        }
    });

    Ok(SignalState { running })
}
