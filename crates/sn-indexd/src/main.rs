//! Content repository index administration
//!
//! # Usage
//!
//! ```bash
//! sn-indexd run [--commit-delay-ms MS]
//! sn-indexd status
//! sn-indexd clear
//! sn-indexd backup [--target DIR]
//! sn-indexd import FILE
//! ```
//!
//! # Configuration
//!
//! Configuration is loaded in order (later sources override earlier):
//! 1. Built-in defaults
//! 2. Config file (<config dir>/sn-index/config.toml)
//! 3. `--config` file
//! 4. Environment variables (SNINDEX_*)
//! 5. CLI flags

use std::path::Path;

use anyhow::Result;
use clap::Parser;

use sn_indexd::{
    backup_index, clear_index, import_documents, init_logging, load_settings, run_engine,
    show_status, Cli, Commands,
};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let settings = load_settings(
        cli.config.as_deref(),
        cli.index_dir.as_deref(),
        cli.log_level.as_deref(),
    )?;
    init_logging(&settings.log_level)?;

    match cli.command {
        Commands::Run { commit_delay_ms } => {
            run_engine(settings, commit_delay_ms).await?;
        }
        Commands::Status => {
            show_status(settings).await?;
        }
        Commands::Clear => {
            clear_index(settings).await?;
        }
        Commands::Backup { target } => {
            backup_index(settings, target.as_deref()).await?;
        }
        Commands::Import { path } => {
            import_documents(settings, Path::new(&path)).await?;
        }
    }

    Ok(())
}
