//! Command-line interface for the jukebox: two process roles, not library
//! actions.

mod commands;

pub use commands::{run, Cli, Commands};
