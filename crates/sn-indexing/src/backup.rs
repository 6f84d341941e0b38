//! Index backup: overlap guard and file copy.

use std::fs;
use std::io;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::{debug, warn};
use walkdir::WalkDir;

/// Outcome of a backup request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexBackupResult {
    Finished,
    /// Another backup was running; nothing was copied.
    AlreadyExecuting,
}

/// Allows one backup at a time.
#[derive(Debug, Default)]
pub struct BackupGuard {
    is_running: Arc<AtomicBool>,
}

impl BackupGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `None` while another backup holds the guard.
    pub fn try_acquire(&self) -> Option<BackupRun> {
        self.is_running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .ok()
            .map(|_| BackupRun {
                flag: self.is_running.clone(),
            })
    }

    pub fn is_running(&self) -> bool {
        self.is_running.load(Ordering::SeqCst)
    }
}

/// Releases the backup guard when dropped.
pub struct BackupRun {
    flag: Arc<AtomicBool>,
}

impl Drop for BackupRun {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::SeqCst);
    }
}

fn is_lock_file(name: &str) -> bool {
    name.starts_with(".tantivy-") && name.ends_with(".lock")
}

/// Copy every index file under `source` into `target`, skipping lock files.
///
/// Returns the number of files copied. Files that vanish during the copy are
/// skipped with a warning.
pub fn copy_index_files(source: &Path, target: &Path) -> io::Result<usize> {
    fs::create_dir_all(target)?;
    let mut copied = 0;

    for entry in WalkDir::new(source).follow_links(false) {
        let entry = entry?;
        let relative = match entry.path().strip_prefix(source) {
            Ok(relative) if !relative.as_os_str().is_empty() => relative,
            _ => continue,
        };
        let destination = target.join(relative);

        if entry.file_type().is_dir() {
            fs::create_dir_all(&destination)?;
            continue;
        }
        if is_lock_file(&entry.file_name().to_string_lossy()) {
            continue;
        }

        match fs::copy(entry.path(), &destination) {
            Ok(_) => copied += 1,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                warn!(path = %entry.path().display(), "Index file vanished during backup");
            }
            Err(e) => return Err(e),
        }
    }

    debug!(copied, target = %target.display(), "Copied index files");
    Ok(copied)
}
