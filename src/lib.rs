pub mod backend;
pub mod capture;
pub mod cli;
pub mod config;
pub mod geometry;
pub mod identity;
pub mod poller;
pub mod refinement;
pub mod selection;
pub mod session;
mod utils;

use anyhow::{Context, Result};
use clap::Parser;

pub use backend::{HttpBackend, SearchBackend};
pub use capture::CaptureContext;
pub use config::ClientConfig;
pub use geometry::{map_to_image_space, RawPoint, Selection};
pub use poller::{poll_until_processed, PollOutcome, PollPolicy};
pub use refinement::RefinementController;
pub use selection::{InputEvent, SelectionMachine};
pub use session::{SessionOrchestrator, SessionPhase, SessionSnapshot};

pub fn run() -> Result<()> {
    let cli = cli::Cli::parse();
    let config = ClientConfig::load(cli.config.as_deref())?;

    // Initialize logging (reads RUST_LOG env var)
    env_logger::Builder::from_default_env()
        .filter_level(if config.debug {
            log::LevelFilter::Debug
        } else {
            log::LevelFilter::Info
        })
        .init();

    log::info!("seeclick starting up...");

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to start async runtime")?;
    let snapshot = runtime.block_on(cli::execute(cli, config))?;

    println!("{}", serde_json::to_string_pretty(&snapshot)?);
    Ok(())
}
