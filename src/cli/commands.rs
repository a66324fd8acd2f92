//! `supervisor` / `worker` subcommands — the process-role dispatch the
//! excluded chat-command router sits downstream of.

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};

use crate::chat::ConsoleChatSink;
use crate::config::SharedSettings;
use crate::playback::vlc::VlcProcess;
use crate::supervisor::Supervisor;
use crate::worker;

#[derive(Parser)]
#[command(name = "jukebox", about = "Chat-controlled audio jukebox")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the supervisor: spawn the worker, relay its upward events into
    /// chat, and keep the pinned flood-control notice honest.
    Supervisor {
        /// Directory downloaded/intermediate files live under while queued.
        #[arg(long, default_value = "resources")]
        resource_root: PathBuf,
    },
    /// Run one worker process. Spawned by the supervisor in normal
    /// operation; invocable standalone for local testing.
    Worker {
        #[arg(long, default_value = "resources")]
        resource_root: PathBuf,
    },
}

pub async fn run(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Commands::Supervisor { resource_root } => run_supervisor(resource_root).await,
        Commands::Worker { resource_root } => run_worker(resource_root).await,
    }
}

async fn run_supervisor(resource_root: PathBuf) -> anyhow::Result<()> {
    let settings = SharedSettings::load_from_disk();
    let chat = Arc::new(ConsoleChatSink::default());

    let worker_binary = std::env::current_exe()?;
    let worker_args = vec![
        "worker".to_string(),
        "--resource-root".to_string(),
        resource_root.display().to_string(),
    ];

    let supervisor = Supervisor::spawn(&worker_binary, &worker_args, chat, settings, None).await?;

    tracing::info!("supervisor running, press ctrl-c to shut down");
    tokio::signal::ctrl_c().await?;
    supervisor.shut_down(false).await?;
    Ok(())
}

async fn run_worker(resource_root: PathBuf) -> anyhow::Result<()> {
    let settings = SharedSettings::load_from_disk();
    let main_player = Arc::new(VlcProcess::spawn().await?);
    let sfx_player = Arc::new(VlcProcess::spawn().await?);

    worker::run(settings, main_player, sfx_player, resource_root).await?;
    Ok(())
}
