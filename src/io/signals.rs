//! Shutdown signal handling.
//!
//! SIGINT, SIGTERM and SIGHUP clear the shared `running` flag. Every loop in
//! the process polls that flag once per iteration, so a signal stops the
//! animator, the samplers and the UI within one period each.

use anyhow::{Context, Result};
use signal_hook::{
    consts::signal::{SIGHUP, SIGINT, SIGTERM},
    iterator::{Handle, Signals},
};
use std::{
    sync::Arc,
    sync::atomic::{AtomicBool, Ordering},
    thread::{self, JoinHandle},
};

/// Signal handling state shared between threads
pub struct SignalState {
    /// Atomic flag indicating if the application should keep running
    pub running: Arc<AtomicBool>,
    handle: Handle,
    thread: Option<JoinHandle<()>>,
}

impl SignalState {
    /// Request shutdown as if a signal had arrived.
    pub fn request_shutdown(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }
}

impl Drop for SignalState {
    fn drop(&mut self) {
        self.handle.close();
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

/// Register the shutdown signals and start the watcher thread.
pub fn setup_signal_handler(debug_enabled: bool) -> Result<SignalState> {
    let running = Arc::new(AtomicBool::new(true));

    let mut signals =
        Signals::new([SIGINT, SIGTERM, SIGHUP]).context("failed to register signal handlers")?;
    let handle = signals.handle();

    let running_clone = Arc::clone(&running);
    let thread = thread::Builder::new()
        .name("signal-watcher".to_string())
        .spawn(move || {
            for sig in signals.forever() {
                let name = match sig {
                    SIGINT => "SIGINT",
                    SIGTERM => "SIGTERM",
                    SIGHUP => "SIGHUP",
                    _ => "signal",
                };
                if debug_enabled {
                    log_pipe!();
                    log_debug!("Received {name}, shutting down");
                }
                running_clone.store(false, Ordering::SeqCst);
            }
        })
        .context("failed to spawn signal watcher thread")?;

    Ok(SignalState {
        running,
        handle,
        thread: Some(thread),
    })
}
