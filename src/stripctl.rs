//! Application runner for the interactive session.
//!
//! Acquires the resources a session needs (configuration, instance lock,
//! signal handling) in that order and hands them to the core.
//!
//! ```no_run
//! use stripctl::Stripctl;
//!
//! # fn main() -> anyhow::Result<()> {
//! // Interactive controller, frames only logged
//! Stripctl::new(false).dry_run().run()?;
//! # Ok(())
//! # }
//! ```

use anyhow::Result;

use crate::{
    config::Config,
    core::{Core, CoreParams},
    io::{lock, signals::setup_signal_handler},
};

/// Builder for configuring and running an interactive stripctl session.
pub struct Stripctl {
    debug_enabled: bool,
    dry_run: bool,
}

impl Stripctl {
    pub fn new(debug_enabled: bool) -> Self {
        Self {
            debug_enabled,
            dry_run: false,
        }
    }

    /// Log frames instead of sending them
    pub fn dry_run(mut self) -> Self {
        self.dry_run = true;
        self
    }

    /// Run until the user quits or a shutdown signal arrives.
    pub fn run(self) -> Result<()> {
        log_version!();
        if self.debug_enabled {
            log_pipe!();
            log_debug!("Debug mode enabled - showing link and sampler activity");
        }

        let config = Config::load()?;

        // Lock before anything touches the radio
        let lock_file = lock::ensure_single_instance()?;
        log_block_start!("Lock acquired, starting stripctl...");

        let signal_state = setup_signal_handler(self.debug_enabled)?;

        config.log_config();

        Core::new(CoreParams {
            config,
            signal_state,
            debug_enabled: self.debug_enabled,
            dry_run: self.dry_run,
            lock_file,
        })
        .execute()
    }
}
