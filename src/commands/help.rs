//! Help command implementation for stripctl.
//!
//! Dispatches to command-specific help or prints the general overview.

use anyhow::Result;

/// Run the help command (dispatcher)
///
/// # Arguments
/// * `command` - Optional command name to get help for (None = general help)
pub fn run_help_command(command: Option<&str>) -> Result<()> {
    match command {
        None => display_general_help(),
        Some("run") => display_run_help(),
        Some("set") | Some("s") => super::set::display_help(),
        Some("on") | Some("off") => super::power::display_help(),
        Some("help") => display_help_help(),
        Some(unknown) => {
            log_pipe!();
            log_warning!("Unknown command: {}", unknown);
            display_general_help();
        }
    }
    Ok(())
}

/// Display general help focused on commands (for the help command)
fn display_general_help() {
    log_version!();
    log_block_start!("Available Commands:");
    log_indented!("run                     Interactive controller (default)");
    log_indented!("set, s <RRGGBB>         Fade to a color and exit");
    log_indented!("on                      Fade to full brightness and exit");
    log_indented!("off                     Fade to black and exit");
    log_indented!("help [COMMAND]          Show detailed help for a command");
    log_pipe!();
    log_info!("Use 'stripctl help <command>' to see detailed help for a specific command.");
    log_indented!("Use 'stripctl --help' to see all options and general usage.");
    log_end!();
}

fn display_run_help() {
    log_version!();
    log_block_start!("run - Interactive controller");
    log_block_start!("Usage: stripctl [run] [OPTIONS]");
    log_block_start!("Keys:");
    log_indented!("1-9 0 a-g      Presets");
    log_indented!("arrows         Move the color wheel cursor");
    log_indented!("[ ]            White mix down / up");
    log_indented!("- +            Brightness down / up");
    log_indented!("o O            On (100%) / off (0%)");
    log_indented!("#              Type a hex color, Enter to apply");
    log_indented!("s S m          Screen color / screen brightness / audio mode");
    log_indented!("B M H          Toggle bass / mid / high bands");
    log_indented!("q Esc Ctrl+C   Quit");
    log_end!();
}

/// Display help for the help command itself
fn display_help_help() {
    log_version!();
    log_block_start!("help - Display help information");
    log_block_start!("Usage: stripctl help [COMMAND]");
    log_block_start!("Examples:");
    log_indented!("stripctl help");
    log_indented!("stripctl help set");
    log_end!();
}
