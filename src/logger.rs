//! Structured logging with box-drawing output.
//!
//! Every user-facing line goes through the macros defined here so the CLI, the
//! daemon and the scheduling core share one visual style:
//!
//! ```text
//! ┏ salatr v0.3.0 ━━╸
//! ┃
//! ┣ Scheduling prayer alarms
//! ┃   Fajr     05:21  (tomorrow)
//! ┣[WARNING] Bundled adhan missing, using remote fallback
//! ╹
//! ```
//!
//! ## Conventions
//!
//! - `log_block_start!` opens a new conceptual block (empty pipe, then `┣ message`).
//! - `log_decorated!` continues a block with `┣ message`.
//! - `log_indented!` lists details under the current block (`┃   message`).
//! - `log_pipe!` inserts an empty `┃` line, typically before a semantic message.
//! - `log_info!`, `log_warning!`, `log_error!`, `log_debug!`, `log_critical!` carry a
//!   colored `[LEVEL]` tag.
//! - `log_version!` / `log_end!` frame a whole command run.
//!
//! Output can be silenced at runtime (tests, `--quiet` style callers) and routed to a
//! file for the long-running daemon.

use std::io::Write;
use std::sync::OnceLock;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{Sender, channel};

static LOGGING_ENABLED: AtomicBool = AtomicBool::new(true);

// Time zone of the configured location, used for simulated-clock timestamps
static LOCATION_TIMEZONE: OnceLock<Option<chrono_tz::Tz>> = OnceLock::new();

// Channel for routing output to a file when `run --log` is active
static LOG_CHANNEL: OnceLock<Option<Sender<LogMessage>>> = OnceLock::new();

enum LogMessage {
    Formatted(String),
    Shutdown,
}

/// Logging control surface used by the macros.
pub struct Log;

impl Log {
    /// Enable or disable all logger output.
    pub fn set_enabled(enabled: bool) {
        LOGGING_ENABLED.store(enabled, Ordering::SeqCst);
    }

    pub fn is_enabled() -> bool {
        LOGGING_ENABLED.load(Ordering::SeqCst)
    }

    /// Remember the location's time zone so simulated timestamps can show it.
    pub fn set_location_timezone(tz: Option<chrono_tz::Tz>) {
        let _ = LOCATION_TIMEZONE.set(tz);
    }

    fn location_timezone() -> Option<chrono_tz::Tz> {
        LOCATION_TIMEZONE.get().and_then(|tz| *tz)
    }

    /// Route all further output to `file_path` through a writer thread.
    pub fn start_file_logging(file_path: String) -> anyhow::Result<LoggerGuard> {
        let (tx, rx) = channel();

        LOG_CHANNEL
            .set(Some(tx.clone()))
            .map_err(|_| anyhow::anyhow!("Logger channel already initialized"))?;

        let handle = std::thread::spawn(move || {
            let mut file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(&file_path)?;

            loop {
                match rx.recv() {
                    Ok(LogMessage::Formatted(text)) => {
                        file.write_all(text.as_bytes())?;
                        file.flush()?;
                    }
                    Ok(LogMessage::Shutdown) | Err(_) => {
                        file.flush()?;
                        break;
                    }
                }
            }

            Ok::<(), anyhow::Error>(())
        });

        Ok(LoggerGuard {
            tx,
            handle: Some(handle),
        })
    }

    /// Timestamp prefix shown only while a non-real clock is installed.
    ///
    /// With a known location time zone that differs from local time, both are shown
    /// as `[HH:MM:SSP] [HH:MM:SSL]` (place / local).
    pub fn get_timestamp_prefix() -> String {
        if !(crate::time_source::is_initialized() && crate::time_source::is_simulated()) {
            return String::new();
        }

        let now = crate::time_source::now();
        let local_str = now
            .with_timezone(&chrono::Local)
            .format("%H:%M:%S")
            .to_string();

        match Self::location_timezone() {
            Some(tz) => {
                let place_str = now.with_timezone(&tz).format("%H:%M:%S").to_string();
                if place_str != local_str {
                    format!("[{place_str}P] [{local_str}L] ")
                } else {
                    format!("[{local_str}] ")
                }
            }
            None => format!("[{local_str}] "),
        }
    }
}

/// Flushes and joins the file writer thread on drop.
pub struct LoggerGuard {
    tx: Sender<LogMessage>,
    handle: Option<std::thread::JoinHandle<anyhow::Result<()>>>,
}

impl Drop for LoggerGuard {
    fn drop(&mut self) {
        let _ = self.tx.send(LogMessage::Shutdown);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

fn strip_ansi_codes(text: &str) -> String {
    let mut result = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '\x1b' && chars.peek() == Some(&'[') {
            chars.next();
            for ch in chars.by_ref() {
                if ch == 'm' {
                    break;
                }
            }
        } else {
            result.push(ch);
        }
    }

    result
}

/// Write one formatted line to the active sink (needed by the macros).
pub fn write_output(text: &str) {
    if let Some(Some(tx)) = LOG_CHANNEL.get() {
        let _ = tx.send(LogMessage::Formatted(strip_ansi_codes(text)));
    } else {
        print!("{text}");
        let _ = std::io::stdout().flush();
    }
}

/// Shared body of every logging macro: `$lead` is the decoration placed between the
/// timestamp prefix and the message.
#[doc(hidden)]
#[macro_export]
macro_rules! __log_line {
    ($lead:literal, $($arg:tt)+) => {{
        use $crate::logger::Log;
        if Log::is_enabled() {
            let prefix = Log::get_timestamp_prefix();
            let message = format!($($arg)+);
            let lead = format!($lead, p = prefix);
            $crate::logger::write_output(&format!("{lead}{message}\n"));
        }
    }};
}

// # Logging Macros

/// Continue the current block with `┣ message`.
#[macro_export]
macro_rules! log_decorated {
    ($($arg:tt)+) => { $crate::__log_line!("{p}┣ ", $($arg)+) };
}

/// Detail line under the current block.
#[macro_export]
macro_rules! log_indented {
    ($($arg:tt)+) => { $crate::__log_line!("{p}┃   ", $($arg)+) };
}

/// Empty pipe for vertical spacing.
#[macro_export]
macro_rules! log_pipe {
    () => { $crate::__log_line!("{p}┃", "") };
}

/// Open a new block.
#[macro_export]
macro_rules! log_block_start {
    ($($arg:tt)+) => { $crate::__log_line!("{p}┃\n{p}┣ ", $($arg)+) };
}

/// Startup header.
#[macro_export]
macro_rules! log_version {
    () => {
        $crate::__log_line!("{p}┏ ", "salatr v{} ━━╸", env!("CARGO_PKG_VERSION"))
    };
}

/// Final termination marker.
#[macro_export]
macro_rules! log_end {
    () => { $crate::__log_line!("{p}╹", "") };
}

#[macro_export]
macro_rules! log_warning {
    ($($arg:tt)+) => { $crate::__log_line!("{p}┣[\x1b[33mWARNING\x1b[0m] ", $($arg)+) };
}

/// Warning outside of any block (help output, argument errors).
#[macro_export]
macro_rules! log_warning_standalone {
    ($($arg:tt)+) => { $crate::__log_line!("{p}[\x1b[33mWARNING\x1b[0m] ", $($arg)+) };
}

#[macro_export]
macro_rules! log_error {
    ($($arg:tt)+) => { $crate::__log_line!("{p}┣[\x1b[31mERROR\x1b[0m] ", $($arg)+) };
}

/// Error that terminates the current flow (`┗` corner).
#[macro_export]
macro_rules! log_error_exit {
    ($($arg:tt)+) => { $crate::__log_line!("{p}┃\n{p}┗[\x1b[31mERROR\x1b[0m] ", $($arg)+) };
}

#[macro_export]
macro_rules! log_info {
    ($($arg:tt)+) => { $crate::__log_line!("{p}┣[\x1b[32mINFO\x1b[0m] ", $($arg)+) };
}

#[macro_export]
macro_rules! log_debug {
    ($($arg:tt)+) => { $crate::__log_line!("{p}┣[\x1b[32mDEBUG\x1b[0m] ", $($arg)+) };
}

#[macro_export]
macro_rules! log_critical {
    ($($arg:tt)+) => { $crate::__log_line!("{p}┣[\x1b[31mCRITICAL\x1b[0m] ", $($arg)+) };
}
