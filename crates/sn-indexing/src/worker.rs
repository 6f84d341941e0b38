//! Background commit worker.
//!
//! A Tokio task ticks every `commit_delay` and runs
//! [`IndexManager::commit_or_delay`] on the blocking pool. The task holds a
//! weak reference so it never keeps a dropped manager alive.

use std::sync::{Arc, Weak};
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::manager::IndexManager;

pub struct CommitWorker {
    token: CancellationToken,
    handle: JoinHandle<()>,
}

impl CommitWorker {
    /// Spawn the worker on `runtime`.
    pub fn spawn(runtime: &Handle, manager: Weak<IndexManager>, delay: Duration) -> Self {
        let token = CancellationToken::new();
        let handle = runtime.spawn(run(manager, delay, token.clone()));
        info!(delay_ms = delay.as_millis() as u64, "Commit worker started");
        Self { token, handle }
    }

    /// Signal the worker to stop. An in-flight tick finishes on its own.
    pub fn stop(&self) {
        self.token.cancel();
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

impl Drop for CommitWorker {
    fn drop(&mut self) {
        self.token.cancel();
    }
}

async fn run(manager: Weak<IndexManager>, delay: Duration, token: CancellationToken) {
    let mut ticker = tokio::time::interval(delay);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // The first tick completes immediately.
    ticker.tick().await;

    loop {
        tokio::select! {
            _ = token.cancelled() => break,
            _ = ticker.tick() => {}
        }

        let Some(manager) = manager.upgrade() else {
            debug!("Index manager dropped, stopping commit worker");
            break;
        };

        if let Err(e) = tick(manager).await {
            error!(error = %e, "Commit worker tick failed");
        }
    }

    info!("Commit worker stopped");
}

async fn tick(manager: Arc<IndexManager>) -> Result<(), String> {
    match tokio::task::spawn_blocking(move || manager.commit_or_delay()).await {
        Ok(Ok(())) => Ok(()),
        Ok(Err(e)) if e.is_retryable() => {
            warn!(error = %e, "Commit skipped");
            Ok(())
        }
        Ok(Err(e)) => Err(e.to_string()),
        Err(e) => Err(format!("commit task panicked: {e}")),
    }
}
