//! Startup recovery hook.

use sn_types::IndexingActivityStatus;

use crate::error::IndexingError;
use crate::manager::IndexManager;

/// Replays activities the index has not seen yet.
///
/// Called by [`IndexManager::start`] with the status read from the last
/// commit, before the engine reports Running. Replayed operations must pass
/// `executing_unprocessed = true`; everything else is skipped while starting.
pub trait ActivityReplay: Send + Sync {
    fn replay(
        &self,
        manager: &IndexManager,
        status: &IndexingActivityStatus,
    ) -> Result<(), IndexingError>;
}
