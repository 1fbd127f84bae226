//! Persisted coordinator state.
//!
//! A single JSON snapshot, replaced atomically (write temp, rename) so a
//! crash mid-write leaves the previous state intact. On restart this file
//! is a hint only: recovery always reconciles against an authoritative
//! exchange read before resuming.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::warn;

use fxcarry_core::Position;

use crate::coordinator::CoordinatorState;
use crate::error::{ExecutorError, ExecutorResult};

/// What survives a restart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersistedState {
    pub state: CoordinatorState,
    pub position: Option<Position>,
}

/// Atomic JSON file store for `PersistedState`.
pub struct StateStore {
    path: PathBuf,
}

impl StateStore {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    /// Load the persisted state. A missing or unreadable file yields
    /// `None`; the authoritative read during recovery covers both cases.
    pub fn load(&self) -> Option<PersistedState> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(c) => c,
            Err(_) => return None,
        };
        match serde_json::from_str(&content) {
            Ok(state) => Some(state),
            Err(e) => {
                warn!(path = %self.path.display(), ?e, "Corrupt state file ignored");
                None
            }
        }
    }

    /// Persist the state atomically.
    pub fn save(&self, state: &PersistedState) -> ExecutorResult<()> {
        let json = serde_json::to_string_pretty(state)
            .map_err(|e| ExecutorError::Store(format!("serialize: {e}")))?;

        if let Some(dir) = self.path.parent() {
            std::fs::create_dir_all(dir)
                .map_err(|e| ExecutorError::Store(format!("create dir: {e}")))?;
        }

        let tmp = self.path.with_extension("tmp");
        std::fs::write(&tmp, json).map_err(|e| ExecutorError::Store(format!("write: {e}")))?;
        std::fs::rename(&tmp, &self.path)
            .map_err(|e| ExecutorError::Store(format!("rename: {e}")))?;
        Ok(())
    }
}
