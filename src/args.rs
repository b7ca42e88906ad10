//! Command-line argument parsing and processing.
//!
//! This module handles parsing of command-line arguments and provides a clean
//! interface for the main application logic. Global flags (`--debug`, `--config`,
//! `--help`, `--version`) may appear anywhere; the first positional argument
//! selects the command.

use crate::prayer::PrayerClass;

/// Operations on the voice library.
#[derive(Debug, PartialEq)]
pub enum VoicesAction {
    List,
    Remote,
    Synthesize {
        variant: String,
    },
    Download {
        id: String,
    },
    Stream {
        id: String,
        name: String,
        url: String,
    },
    Remove {
        id: String,
    },
    /// `None` clears the pointer so resolution falls through to the bundled file
    Use {
        class: PrayerClass,
        id: Option<String>,
    },
}

/// Represents the parsed command-line arguments and their intended actions.
#[derive(Debug, PartialEq)]
pub enum CliAction {
    /// Watch the registry and fire alarms until interrupted
    Run {
        debug_enabled: bool,
        config_dir: Option<String>,
        log_file: Option<String>,
    },
    /// Replace today's alarms, optionally pretending it is `at`
    Schedule {
        debug_enabled: bool,
        config_dir: Option<String>,
        at: Option<String>,
    },
    Cancel {
        debug_enabled: bool,
        config_dir: Option<String>,
    },
    /// One-shot alarm `delay_minutes` from now
    Test {
        debug_enabled: bool,
        config_dir: Option<String>,
        delay_minutes: i64,
    },
    Times {
        debug_enabled: bool,
        config_dir: Option<String>,
        date: Option<String>,
    },
    Status {
        debug_enabled: bool,
        config_dir: Option<String>,
    },
    Voices {
        debug_enabled: bool,
        config_dir: Option<String>,
        action: VoicesAction,
    },
    /// Fire one registered alarm now
    Fire {
        debug_enabled: bool,
        config_dir: Option<String>,
        alarm_id: String,
    },
    Location {
        debug_enabled: bool,
        config_dir: Option<String>,
        latitude: f64,
        longitude: f64,
    },
    /// Detailed help for one command, or the command overview
    Help {
        command: Option<String>,
    },

    /// Display help information and exit
    ShowHelp,
    /// Display version information and exit
    ShowVersion,
    /// Show help due to unknown arguments and exit
    ShowHelpDueToError,
}

/// Result of parsing command-line arguments.
pub struct ParsedArgs {
    pub action: CliAction,
}

/// Check "YYYY-MM-DD HH:MM:SS" shape. Full parsing happens once the zone is known.
fn looks_like_datetime(s: &str) -> bool {
    s.len() == 19
        && s.chars().nth(4) == Some('-')
        && s.chars().nth(7) == Some('-')
        && s.chars().nth(10) == Some(' ')
        && s.chars().nth(13) == Some(':')
        && s.chars().nth(16) == Some(':')
}

fn looks_like_date(s: &str) -> bool {
    s.len() == 10 && s.chars().nth(4) == Some('-') && s.chars().nth(7) == Some('-')
}

fn usage_error(usage: &str) -> ParsedArgs {
    log_warning!("Usage: {}", usage);
    ParsedArgs {
        action: CliAction::ShowHelpDueToError,
    }
}

impl ParsedArgs {
    /// Parse command-line arguments into a structured result.
    ///
    /// # Arguments
    /// * `args` - Iterator over command-line arguments (typically from std::env::args())
    pub fn parse<I, S>(args: I) -> ParsedArgs
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut debug_enabled = false;
        let mut display_help = false;
        let mut display_version = false;
        let mut unknown_arg_found = false;
        let mut config_dir: Option<String> = None;
        let mut at: Option<String> = None;
        let mut log_file: Option<String> = None;
        let mut positional: Vec<String> = Vec::new();

        let args_vec: Vec<String> = args
            .into_iter()
            .skip(1)
            .map(|s| s.as_ref().to_string())
            .collect();

        let mut i = 0;
        while i < args_vec.len() {
            let arg = &args_vec[i];
            match arg.as_str() {
                "--help" | "-h" => display_help = true,
                "--version" | "-V" | "-v" => display_version = true,
                "--debug" | "-d" => debug_enabled = true,
                "--config" | "-c" => {
                    if i + 1 < args_vec.len() && !args_vec[i + 1].starts_with('-') {
                        config_dir = Some(args_vec[i + 1].clone());
                        i += 1;
                    } else {
                        log_warning!("Missing directory for --config. Usage: --config <directory>");
                        unknown_arg_found = true;
                    }
                }
                "--at" => {
                    if i + 1 < args_vec.len() && looks_like_datetime(&args_vec[i + 1]) {
                        at = Some(args_vec[i + 1].clone());
                        i += 1;
                    } else {
                        log_error!("--at expects a time formatted as \"YYYY-MM-DD HH:MM:SS\"");
                        unknown_arg_found = true;
                    }
                }
                "--log" => {
                    if i + 1 < args_vec.len() && !args_vec[i + 1].starts_with('-') {
                        log_file = Some(args_vec[i + 1].clone());
                        i += 1;
                    } else {
                        log_warning!("Missing file for --log. Usage: --log <file>");
                        unknown_arg_found = true;
                    }
                }
                // Negative numbers are values, not options
                _ if arg.starts_with('-') && arg.parse::<f64>().is_err() => {
                    log_warning!("Unknown option: {arg}");
                    unknown_arg_found = true;
                }
                _ => positional.push(arg.clone()),
            }
            i += 1;
        }

        if display_version {
            return ParsedArgs {
                action: CliAction::ShowVersion,
            };
        }
        if unknown_arg_found {
            return ParsedArgs {
                action: CliAction::ShowHelpDueToError,
            };
        }
        if display_help {
            return ParsedArgs {
                action: CliAction::ShowHelp,
            };
        }

        let command = positional.first().map(String::as_str);
        let rest = positional.get(1..).unwrap_or_default();

        if at.is_some() && !matches!(command, Some("schedule" | "s")) {
            log_warning!("--at only applies to 'salatr schedule'");
            return ParsedArgs {
                action: CliAction::ShowHelpDueToError,
            };
        }
        if log_file.is_some() && !matches!(command, None | Some("run")) {
            log_warning!("--log only applies to 'salatr run'");
            return ParsedArgs {
                action: CliAction::ShowHelpDueToError,
            };
        }

        let max_args = |count: usize, usage: &str| -> Option<ParsedArgs> {
            (rest.len() > count).then(|| usage_error(usage))
        };

        let action = match command {
            None | Some("run") => {
                if let Some(err) = max_args(0, "salatr run [--log <file>]") {
                    return err;
                }
                CliAction::Run {
                    debug_enabled,
                    config_dir,
                    log_file,
                }
            }
            Some("schedule" | "s") => {
                if let Some(err) = max_args(0, "salatr schedule [--at \"YYYY-MM-DD HH:MM:SS\"]") {
                    return err;
                }
                CliAction::Schedule {
                    debug_enabled,
                    config_dir,
                    at,
                }
            }
            Some("cancel" | "c") => {
                if let Some(err) = max_args(0, "salatr cancel") {
                    return err;
                }
                CliAction::Cancel {
                    debug_enabled,
                    config_dir,
                }
            }
            Some("test" | "t") => {
                if let Some(err) = max_args(1, "salatr test [minutes]") {
                    return err;
                }
                let delay_minutes = match rest.first() {
                    None => 1,
                    Some(value) => match value.parse::<i64>() {
                        Ok(minutes) if minutes >= 0 => minutes,
                        _ => {
                            log_error!("Invalid delay '{}': minutes must be 0 or more", value);
                            return usage_error("salatr test [minutes]");
                        }
                    },
                };
                CliAction::Test {
                    debug_enabled,
                    config_dir,
                    delay_minutes,
                }
            }
            Some("times" | "T") => {
                if let Some(err) = max_args(1, "salatr times [YYYY-MM-DD]") {
                    return err;
                }
                if let Some(date) = rest.first()
                    && !looks_like_date(date)
                {
                    log_error!("Invalid date '{}'. Use YYYY-MM-DD", date);
                    return usage_error("salatr times [YYYY-MM-DD]");
                }
                CliAction::Times {
                    debug_enabled,
                    config_dir,
                    date: rest.first().cloned(),
                }
            }
            Some("status" | "S") => {
                if let Some(err) = max_args(0, "salatr status") {
                    return err;
                }
                CliAction::Status {
                    debug_enabled,
                    config_dir,
                }
            }
            Some("voices" | "v") => match Self::parse_voices(rest) {
                Some(action) => CliAction::Voices {
                    debug_enabled,
                    config_dir,
                    action,
                },
                None => return usage_error("salatr voices <list|remote|synthesize|download|stream|remove|use> ..."),
            },
            Some("fire" | "f") => match rest {
                [alarm_id] => CliAction::Fire {
                    debug_enabled,
                    config_dir,
                    alarm_id: alarm_id.clone(),
                },
                _ => return usage_error("salatr fire <alarm-id>"),
            },
            Some("location" | "l") => {
                let coords = match rest {
                    [lat, lon] => lat.parse::<f64>().ok().zip(lon.parse::<f64>().ok()),
                    _ => None,
                };
                match coords {
                    Some((latitude, longitude)) => CliAction::Location {
                        debug_enabled,
                        config_dir,
                        latitude,
                        longitude,
                    },
                    None => return usage_error("salatr location <latitude> <longitude>"),
                }
            }
            Some("help" | "h") => CliAction::Help {
                command: rest.first().cloned(),
            },
            Some(unknown) => {
                log_warning!("Unknown command: {}", unknown);
                CliAction::ShowHelpDueToError
            }
        };

        ParsedArgs { action }
    }

    fn parse_voices(rest: &[String]) -> Option<VoicesAction> {
        let words: Vec<&str> = rest.iter().map(String::as_str).collect();
        match words.as_slice() {
            [] | ["list"] => Some(VoicesAction::List),
            ["remote"] => Some(VoicesAction::Remote),
            ["synthesize" | "synth", variant] => Some(VoicesAction::Synthesize {
                variant: variant.to_string(),
            }),
            ["download", id] => Some(VoicesAction::Download { id: id.to_string() }),
            ["stream", id, name, url] => Some(VoicesAction::Stream {
                id: id.to_string(),
                name: name.to_string(),
                url: url.to_string(),
            }),
            ["remove", id] => Some(VoicesAction::Remove { id: id.to_string() }),
            ["use", class, id] => {
                let Some(class) = PrayerClass::parse(class) else {
                    log_error!("Unknown voice class '{}'. Use 'regular' or 'dawn'", class);
                    return None;
                };
                let id = (*id != "none").then(|| id.to_string());
                Some(VoicesAction::Use { class, id })
            }
            _ => None,
        }
    }

    /// Convenience method to parse from std::env::args()
    pub fn from_env() -> ParsedArgs {
        Self::parse(std::env::args())
    }
}

/// Displays version information using custom logging style.
pub fn display_version_info() {
    log_version!();
    log_pipe!();
    println!("┗ {}", env!("CARGO_PKG_DESCRIPTION"));
}

/// Displays custom help message using logger methods.
pub fn display_help() {
    log_version!();
    log_block_start!(env!("CARGO_PKG_DESCRIPTION"));
    log_block_start!("Usage:");
    log_indented!("salatr [OPTIONS] [COMMAND]");
    log_block_start!("Options:");
    log_indented!("-c, --config <dir>        Use custom configuration directory");
    log_indented!("-d, --debug               Enable detailed debug output");
    log_indented!("-h, --help                Print help information");
    log_indented!("-V, --version             Print version information");
    log_block_start!("Commands:");
    log_indented!("run [--log <file>]        Fire alarms as they mature (default)");
    log_indented!("schedule, s [--at <time>] Schedule the next six prayer alarms");
    log_indented!("cancel, c                 Cancel all daily alarms");
    log_indented!("test, t [minutes]         Schedule a test alarm (default: 1 minute)");
    log_indented!("times, T [YYYY-MM-DD]     Show prayer times");
    log_indented!("status, S                 Show pending alarms and active voices");
    log_indented!("voices, v <action>        Manage adhan voices");
    log_indented!("fire, f <alarm-id>        Fire a registered alarm now");
    log_indented!("location, l <lat> <lon>   Set the coordinates used for prayer times");
    log_indented!("help, h [COMMAND]         Show detailed help for a command");
    log_end!();
}
