//! Command-line front end
//!
//! This module is only available when the "cli" feature is enabled.

#[path = "main.rs"]
mod main_impl;
mod progress;

pub use main_impl::{main, Cli, Command};
pub use progress::IndicatifProgressReporter;
