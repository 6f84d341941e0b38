//! Index administration library exports.
//!
//! # Modules
//!
//! - `cli`: Command-line argument parsing with clap
//! - `commands`: Command implementations (run, status, clear, backup, import)

pub mod cli;
pub mod commands;

pub use cli::{Cli, Commands};
pub use commands::{
    backup_index, clear_index, format_status, import_documents, init_logging, load_settings,
    read_documents, run_engine, show_status,
};
