//! Command-line command handlers for stripctl.
//!
//! `set`, `on` and `off` are one-shot commands: they take the instance lock,
//! connect, animate the strip to the requested state and exit. `help` only
//! prints. Each command lives in its own submodule.

pub mod help;
pub mod power;
pub mod set;

use anyhow::Result;

use crate::{
    args::GlobalOptions,
    common::constants::*,
    config::Config,
    core::{
        OneShotOutcome, run_one_shot,
        state::{ColorIntent, ColorState},
    },
    io::{lock, signals::setup_signal_handler},
};

/// Shared driver for the one-shot commands.
///
/// `initial` is where the animation starts since the strip cannot be asked
/// for its current color; `apply` sets the targets.
pub(crate) fn run_animated_command(
    options: &GlobalOptions,
    summary: &str,
    initial: impl FnOnce(&Config) -> ColorIntent,
    apply: impl FnOnce(&ColorState) -> Result<()>,
) -> Result<()> {
    log_version!();

    let config = Config::load()?;
    let _lock = lock::ensure_single_instance()?;
    let signal_state = setup_signal_handler(options.debug_enabled)?;

    if options.debug_enabled {
        config.log_config();
    }

    log_block_start!("{summary}");
    let outcome = run_one_shot(
        &config,
        options.debug_enabled,
        options.dry_run,
        &signal_state.running,
        initial(&config),
        apply,
    )?;

    match outcome {
        OneShotOutcome::Converged => log_decorated!("Done"),
        OneShotOutcome::TimedOut => {
            log_pipe!();
            log_warning!(
                "Strip did not settle within {ONE_SHOT_TIMEOUT_SECS}s, the last frame may lag the target"
            );
        }
        OneShotOutcome::Interrupted => log_decorated!("Interrupted"),
    }

    log_end!();
    Ok(())
}

/// Starting intent at the configured default brightness.
pub(crate) fn default_intent(config: &Config) -> ColorIntent {
    ColorIntent::new(
        0.0,
        0.0,
        0.0,
        config.default_brightness.unwrap_or(DEFAULT_BRIGHTNESS),
    )
}
