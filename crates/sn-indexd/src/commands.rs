//! Command implementations for the index administration binary.
//!
//! Handles:
//! - run: start the engine and keep committing until Ctrl+C/SIGTERM
//! - status: print the persisted activity status
//! - clear, backup, import: one-shot maintenance on a started engine

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use sn_indexing::{IndexBackupResult, IndexingEngine, LocalIndexingEngine};
use sn_types::status::{GAPS_DISPLAY_GROWTH, GAPS_DISPLAY_MAX_COUNT};
use sn_types::{IndexDocument, IndexingActivityStatus, Settings};

/// Load configuration and apply CLI overrides (highest precedence).
pub fn load_settings(
    config_path: Option<&str>,
    index_dir_override: Option<&str>,
    log_level_override: Option<&str>,
) -> Result<Settings> {
    let mut settings = Settings::load(config_path).context("Failed to load configuration")?;

    if let Some(index_dir) = index_dir_override {
        settings.indexing.index_directory = index_dir.to_string();
    }
    if let Some(log_level) = log_level_override {
        settings.log_level = log_level.to_string();
    }
    Ok(settings)
}

/// Install the global tracing subscriber. `RUST_LOG` wins over `log_level`.
pub fn init_logging(log_level: &str) -> Result<()> {
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level)),
        )
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set tracing subscriber")?;
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down...");
        }
        _ = terminate => {
            info!("Received SIGTERM, shutting down...");
        }
    }
}

async fn started_engine(settings: &Settings) -> Result<LocalIndexingEngine> {
    let engine = LocalIndexingEngine::new(settings.indexing.clone());
    engine
        .start(Box::new(io::stdout()), &CancellationToken::new())
        .await
        .context("Failed to start indexing engine")?;
    Ok(engine)
}

/// Run the engine until a shutdown signal arrives.
pub async fn run_engine(mut settings: Settings, commit_delay_ms: Option<u64>) -> Result<()> {
    if let Some(delay) = commit_delay_ms {
        settings.indexing.commit_delay_ms = delay;
    }

    info!("Index engine starting...");
    info!("  Index directory: {}", settings.indexing.index_directory);
    info!("  Commit delay: {} ms", settings.indexing.commit_delay_ms);
    info!("  Log level: {}", settings.log_level);

    let engine = started_engine(&settings).await?;
    shutdown_signal().await;

    engine
        .shut_down(&CancellationToken::new())
        .await
        .context("Failed to shut down indexing engine")?;
    Ok(())
}

/// Render an activity status for the terminal.
pub fn format_status(status: &IndexingActivityStatus) -> String {
    format!(
        "Last activity id: {}\nGaps ({}): {}",
        status.last_activity_id,
        status.gaps.len(),
        IndexingActivityStatus::gaps_to_string(
            &status.gaps,
            GAPS_DISPLAY_MAX_COUNT,
            GAPS_DISPLAY_GROWTH
        )
    )
}

/// Print the status persisted with the last commit.
pub async fn show_status(settings: Settings) -> Result<()> {
    let engine = LocalIndexingEngine::new(settings.indexing.clone());
    let status = engine
        .read_activity_status_from_index(&CancellationToken::new())
        .await
        .context("Failed to read activity status")?;

    println!("Index: {}", settings.indexing.index_path().display());
    println!("{}", format_status(&status));
    Ok(())
}

/// Delete every document and reset the status.
pub async fn clear_index(settings: Settings) -> Result<()> {
    let cancel = CancellationToken::new();
    let engine = started_engine(&settings).await?;
    engine
        .clear_index(&cancel)
        .await
        .context("Failed to clear index")?;
    engine.shut_down(&cancel).await?;
    println!("Index cleared");
    Ok(())
}

/// Back up the index into `target` or a timestamped directory.
pub async fn backup_index(settings: Settings, target: Option<&str>) -> Result<()> {
    let cancel = CancellationToken::new();
    let engine = started_engine(&settings).await?;
    let result = match target {
        Some(target) => engine.backup_to(PathBuf::from(target), &cancel).await,
        None => engine.backup(&cancel).await,
    }
    .context("Index backup failed")?;
    engine.shut_down(&cancel).await?;

    match result {
        IndexBackupResult::Finished => println!("Backup finished"),
        IndexBackupResult::AlreadyExecuting => println!("A backup is already running"),
    }
    Ok(())
}

/// Read one serialized index document per non-empty line.
pub fn read_documents(path: &Path) -> Result<Vec<IndexDocument>> {
    let content =
        fs::read_to_string(path).with_context(|| format!("Failed to read {:?}", path))?;
    content
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(number, line)| {
            IndexDocument::deserialize(line)
                .with_context(|| format!("Invalid document on line {}", number + 1))
        })
        .collect()
}

/// Add the documents of a file and commit them.
pub async fn import_documents(settings: Settings, path: &Path) -> Result<usize> {
    let documents = read_documents(path)?;
    let count = documents.len();

    let cancel = CancellationToken::new();
    let engine = started_engine(&settings).await?;
    engine
        .write_index(Vec::new(), Vec::new(), documents, &cancel)
        .await
        .context("Failed to write documents")?;
    engine.shut_down(&cancel).await?;

    info!(count, path = ?path, "Imported documents");
    println!("Imported {} document(s)", count);
    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use sn_types::{IndexField, IndexingSettings};
    use tempfile::TempDir;

    fn settings(temp_dir: &TempDir) -> Settings {
        Settings {
            log_level: "info".to_string(),
            indexing: IndexingSettings::for_directory(temp_dir.path().join("index")),
        }
    }

    fn document(version_id: i32) -> IndexDocument {
        IndexDocument::from_fields(vec![
            IndexField::with_defaults("VersionId", version_id),
            IndexField::with_defaults("Name", "Foo"),
        ])
    }

    #[test]
    fn test_format_status() {
        let status = IndexingActivityStatus::new(10, [4, 7]);
        assert_eq!(format_status(&status), "Last activity id: 10\nGaps (2): 4,7");
    }

    #[test]
    fn test_read_documents() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("docs.jsonl");
        let lines = [
            document(1).serialize(true).unwrap(),
            String::new(),
            document(2).serialize(true).unwrap(),
        ];
        fs::write(&path, lines.join("\n")).unwrap();

        let documents = read_documents(&path).unwrap();
        assert_eq!(documents, vec![document(1), document(2)]);
    }

    #[test]
    fn test_read_documents_reports_line() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("docs.jsonl");
        fs::write(&path, format!("{}\nnot json\n", document(1).serialize(true).unwrap()))
            .unwrap();

        let err = read_documents(&path).unwrap_err();
        assert!(err.to_string().contains("line 2"));
    }

    #[tokio::test]
    async fn test_import_then_status() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("docs.jsonl");
        fs::write(
            &path,
            format!(
                "{}\n{}\n",
                document(1).serialize(true).unwrap(),
                document(2).serialize(true).unwrap()
            ),
        )
        .unwrap();

        let count = import_documents(settings(&temp_dir), &path).await.unwrap();
        assert_eq!(count, 2);
        show_status(settings(&temp_dir)).await.unwrap();
    }
}
