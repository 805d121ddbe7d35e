//! Main application entry point and CLI dispatch.
//!
//! Parses arguments, applies the global flags (config directory, log file,
//! debug timestamps) and hands off to the interactive runner or a one-shot
//! command. Every error ends up here and exits non-zero.

use anyhow::Result;

use stripctl::{
    Stripctl,
    args::{self, CliAction, GlobalOptions, ParsedArgs},
    commands,
    common::{constants::EXIT_FAILURE, logger::Log},
    config, log_error_exit,
};

fn main() {
    let parsed_args = ParsedArgs::from_env();

    // Held until exit so buffered log lines reach the file
    let mut log_guard = None;

    let result = match parsed_args.action {
        CliAction::ShowVersion => {
            args::display_version_info();
            Ok(())
        }
        CliAction::ShowHelp => {
            args::display_help();
            Ok(())
        }
        CliAction::ShowHelpDueToError => {
            args::display_help();
            std::process::exit(EXIT_FAILURE);
        }
        CliAction::HelpCommand { command } => commands::help::run_help_command(command.as_deref()),
        CliAction::Run { options } => apply_global_options(&options, &mut log_guard).and_then(|()| {
            let runner = Stripctl::new(options.debug_enabled);
            if options.dry_run {
                runner.dry_run().run()
            } else {
                runner.run()
            }
        }),
        CliAction::Set {
            options,
            color,
            brightness,
            white_mix,
        } => apply_global_options(&options, &mut log_guard).and_then(|()| {
            commands::set::handle_set_command(&options, &color, brightness, white_mix)
        }),
        CliAction::On { options } => apply_global_options(&options, &mut log_guard)
            .and_then(|()| commands::power::handle_power_command(&options, true)),
        CliAction::Off { options } => apply_global_options(&options, &mut log_guard)
            .and_then(|()| commands::power::handle_power_command(&options, false)),
    };

    if let Err(e) = result {
        log_error_exit!("{e}");
        // Full cause chain for context, even when logging to a file
        eprintln!("{e:?}");
        drop(log_guard);
        std::process::exit(EXIT_FAILURE);
    }
}

fn apply_global_options(
    options: &GlobalOptions,
    log_guard: &mut Option<stripctl::common::logger::LoggerGuard>,
) -> Result<()> {
    if let Some(path) = &options.log_file {
        *log_guard = Some(Log::start_file_logging(path.clone())?);
    }
    if options.debug_enabled {
        Log::set_timestamps(true);
    }
    config::set_config_dir(options.config_dir.clone())
}
