//! CLI argument parsing for the index administration binary.
//!
//! CLI flags override every other configuration source.

use clap::{Parser, Subcommand};

/// Content repository index administration
#[derive(Parser, Debug)]
#[command(name = "sn-indexd")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to config file (overrides the default config.toml)
    #[arg(short, long, global = true)]
    pub config: Option<String>,

    /// Set log level (trace, debug, info, warn, error)
    #[arg(short, long, global = true)]
    pub log_level: Option<String>,

    /// Override the index directory
    #[arg(long, global = true)]
    pub index_dir: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Open the index and run the commit worker until interrupted
    Run {
        /// Override the commit worker interval
        #[arg(long)]
        commit_delay_ms: Option<u64>,
    },

    /// Print the activity status stored in the index
    Status,

    /// Delete every document and reset the activity status
    Clear,

    /// Copy the index into a backup directory
    Backup {
        /// Target directory (default: a timestamped directory under the backup directory)
        #[arg(short, long)]
        target: Option<String>,
    },

    /// Add documents from a file with one serialized index document per line
    Import {
        /// Path to the document file
        path: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_run() {
        let cli = Cli::parse_from(["sn-indexd", "run", "--commit-delay-ms", "250"]);
        assert!(matches!(
            cli.command,
            Commands::Run {
                commit_delay_ms: Some(250)
            }
        ));
    }

    #[test]
    fn test_cli_global_flags() {
        let cli = Cli::parse_from([
            "sn-indexd",
            "status",
            "--index-dir",
            "/data/index",
            "--config",
            "/etc/sn/config.toml",
            "-l",
            "debug",
        ]);
        assert!(matches!(cli.command, Commands::Status));
        assert_eq!(cli.index_dir.as_deref(), Some("/data/index"));
        assert_eq!(cli.config.as_deref(), Some("/etc/sn/config.toml"));
        assert_eq!(cli.log_level.as_deref(), Some("debug"));
    }

    #[test]
    fn test_cli_backup_target() {
        let cli = Cli::parse_from(["sn-indexd", "backup", "-t", "/backups/now"]);
        match cli.command {
            Commands::Backup { target } => assert_eq!(target.as_deref(), Some("/backups/now")),
            other => panic!("unexpected command {:?}", other),
        }

        let cli = Cli::parse_from(["sn-indexd", "backup"]);
        assert!(matches!(cli.command, Commands::Backup { target: None }));
    }

    #[test]
    fn test_cli_import() {
        let cli = Cli::parse_from(["sn-indexd", "import", "docs.jsonl"]);
        match cli.command {
            Commands::Import { path } => assert_eq!(path, "docs.jsonl"),
            other => panic!("unexpected command {:?}", other),
        }
    }
}
