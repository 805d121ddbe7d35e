//! Command-line argument parsing and processing.
//!
//! Global flags may appear anywhere on the command line. The first
//! non-flag argument selects the command; everything after it that is not a
//! flag is that command's positional input.

/// Flags shared by every command that talks to the strip.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GlobalOptions {
    pub debug_enabled: bool,
    pub config_dir: Option<String>,
    pub log_file: Option<String>,
    pub dry_run: bool,
}

/// Represents the parsed command-line arguments and their intended actions.
#[derive(Debug, PartialEq)]
pub enum CliAction {
    /// Start the interactive controller
    Run { options: GlobalOptions },
    /// Animate to a color and exit
    Set {
        options: GlobalOptions,
        color: String,
        brightness: Option<f32>,
        white_mix: Option<f32>,
    },
    /// Fade to full brightness and exit
    On { options: GlobalOptions },
    /// Fade to zero brightness and exit
    Off { options: GlobalOptions },
    /// `help [COMMAND]`
    HelpCommand { command: Option<String> },

    /// Display help information and exit
    ShowHelp,
    /// Display version information and exit
    ShowVersion,
    /// Show help due to invalid arguments and exit
    ShowHelpDueToError,
}

/// Result of parsing command-line arguments.
pub struct ParsedArgs {
    pub action: CliAction,
}

impl ParsedArgs {
    /// Parse command-line arguments into a structured result.
    ///
    /// The first item is the program name and is skipped. Parse errors are
    /// logged here and reported as [`CliAction::ShowHelpDueToError`].
    pub fn parse<I, S>(args: I) -> ParsedArgs
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let action = match parse_action(args) {
            Ok(action) => action,
            Err(message) => {
                log_pipe!();
                log_warning!("{message}");
                CliAction::ShowHelpDueToError
            }
        };
        ParsedArgs { action }
    }

    /// Convenience method to parse from std::env::args()
    pub fn from_env() -> ParsedArgs {
        Self::parse(std::env::args())
    }
}

fn parse_action<I, S>(args: I) -> Result<CliAction, String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let args_vec: Vec<String> = args
        .into_iter()
        .skip(1)
        .map(|s| s.as_ref().to_string())
        .collect();

    let mut options = GlobalOptions::default();
    let mut display_help = false;
    let mut display_version = false;
    let mut brightness: Option<f32> = None;
    let mut white_mix: Option<f32> = None;
    let mut positionals: Vec<String> = Vec::new();

    let mut iter = args_vec.iter();
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--debug" | "-d" => options.debug_enabled = true,
            "--dry-run" | "-n" => options.dry_run = true,
            "--help" | "-h" => display_help = true,
            "--version" | "-V" | "-v" => display_version = true,
            "--config" | "-c" => {
                options.config_dir = Some(flag_value(&mut iter, arg)?.to_string());
            }
            "--log" | "-l" => {
                options.log_file = Some(flag_value(&mut iter, arg)?.to_string());
            }
            "--brightness" | "-b" => {
                let value = flag_value(&mut iter, arg)?;
                brightness = Some(parse_number(value, arg)?);
            }
            "--white" | "-w" => {
                let value = flag_value(&mut iter, arg)?;
                white_mix = Some(parse_number(value, arg)?);
            }
            // A leading '#' is a hex color, not a flag
            flag if flag.starts_with('-') && flag.len() > 1 => {
                return Err(format!("Unknown option: {flag}"));
            }
            _ => positionals.push(arg.clone()),
        }
    }

    // Version and help take precedence over everything else
    if display_version {
        return Ok(CliAction::ShowVersion);
    }
    if display_help {
        return Ok(CliAction::ShowHelp);
    }

    let mut positionals = positionals.into_iter();
    let command = positionals.next();
    let rest: Vec<String> = positionals.collect();

    let uses_color_flags = brightness.is_some() || white_mix.is_some();
    if uses_color_flags && !matches!(command.as_deref(), Some("set" | "s")) {
        return Err("--brightness and --white are only valid with 'set'".to_string());
    }

    let no_extra = |name: &str| -> Result<(), String> {
        match rest.first() {
            Some(extra) => Err(format!("Unexpected argument for '{name}': {extra}")),
            None => Ok(()),
        }
    };

    match command.as_deref() {
        None | Some("run") => {
            no_extra("run")?;
            Ok(CliAction::Run { options })
        }
        Some("set" | "s") => {
            let mut rest = rest.into_iter();
            let color = rest
                .next()
                .ok_or_else(|| "Missing color. Usage: stripctl set <RRGGBB>".to_string())?;
            if let Some(extra) = rest.next() {
                return Err(format!("Unexpected argument for 'set': {extra}"));
            }
            Ok(CliAction::Set {
                options,
                color,
                brightness,
                white_mix,
            })
        }
        Some("on") => {
            no_extra("on")?;
            Ok(CliAction::On { options })
        }
        Some("off") => {
            no_extra("off")?;
            Ok(CliAction::Off { options })
        }
        Some("help") => {
            if rest.len() > 1 {
                return Err("help takes at most one command".to_string());
            }
            Ok(CliAction::HelpCommand {
                command: rest.into_iter().next(),
            })
        }
        Some(unknown) => Err(format!("Unknown command: {unknown}")),
    }
}

fn flag_value<'a>(
    iter: &mut impl Iterator<Item = &'a String>,
    flag: &str,
) -> Result<&'a str, String> {
    iter.next()
        .map(String::as_str)
        .ok_or_else(|| format!("{flag} requires a value"))
}

fn parse_number(value: &str, flag: &str) -> Result<f32, String> {
    value
        .parse::<f32>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| format!("Invalid value for {flag}: {value}"))
}

/// Displays version information using custom logging style.
pub fn display_version_info() {
    log_version!();
    log_block_start!(env!("CARGO_PKG_DESCRIPTION"));
    log_end!();
}

/// Displays custom help message using logger methods.
pub fn display_help() {
    log_version!();
    log_block_start!(env!("CARGO_PKG_DESCRIPTION"));
    log_block_start!("Usage:");
    log_indented!("stripctl [OPTIONS] [COMMAND]");
    log_block_start!("Options:");
    log_indented!("-c, --config <dir>     Use custom configuration directory");
    log_indented!("-d, --debug            Enable detailed debug output");
    log_indented!("-h, --help             Print help information");
    log_indented!("-l, --log <file>       Write all output to a log file");
    log_indented!("-n, --dry-run          Log frames instead of sending them");
    log_indented!("-V, --version          Print version information");
    log_block_start!("Commands:");
    log_indented!("run                    Interactive controller (default)");
    log_indented!("set, s <RRGGBB>        Fade to a color and exit");
    log_indented!("on                     Fade to full brightness and exit");
    log_indented!("off                    Fade to black and exit");
    log_indented!("help [COMMAND]         Show detailed help for a command");
    log_end!();
}
