//! Chat-controlled audio jukebox.
//!
//! Two process roles, dispatched by [`cli`]: `supervisor` spawns and
//! monitors a `worker`, relaying its upward events into chat; `worker` owns
//! the audio queue and plays things. See `DESIGN.md` for the grounding of
//! every module against the codebase this crate is built from.

pub mod chat;
pub mod cli;
pub mod config;
pub mod dsp;
pub mod error;
pub mod fetcher;
pub mod ipc;
pub mod parser;
pub mod playback;
pub mod queue;
pub mod quiet_hours;
pub mod resource;
pub mod retry;
pub mod source;
pub mod supervisor;
pub mod worker;

use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true))
        .with(EnvFilter::from_default_env().add_directive("jukebox=info".parse().unwrap()))
        .init();

    let args = cli::Cli::parse();
    cli::run(args).await
}
