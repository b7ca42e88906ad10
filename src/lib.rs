//! # Salatr Library
//!
//! Internal library for the salatr binary application
//!
//! This library exists to enable testing of the scheduling internals and provide clean
//! separation between CLI dispatch (main.rs) and application logic.
//!
//! ## Architecture
//!
//! - **Prayer times**: `prayer` computes the six daily events behind the
//!   `PrayerTimeSource` trait and rolls past events forward to their next occurrence
//! - **Alarms**: `alarm` turns events into durable alarms (`AlarmScheduler`), fires them
//!   (`FiringHandler`) and runs the polling daemon
//! - **Voices**: `voice` manages synthesized, downloaded and streamed adhan voices and
//!   resolves which audio an alarm plays (`AudioResolver`)
//! - **Configuration**: `config` for TOML-based settings with a private geo.toml
//! - **Commands**: `commands` for CLI subcommands (schedule, cancel, test, voices, ...)
//! - **Infrastructure**: state directories and stores, lock files, signal handling,
//!   D-Bus notifications, logging and the swappable clock

// Import macros from logger module for use in all submodules
#[macro_use]
pub mod logger;

pub mod alarm;
pub mod args;
pub mod commands;
pub mod config;
pub mod constants;
pub mod error;
pub mod io;
pub mod prayer;
pub mod state;
pub mod time_source;
pub mod voice;

pub use error::{CoreError, CoreResult};
