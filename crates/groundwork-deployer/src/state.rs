//! Per-stack applied-state persistence.

use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

use groundwork_core::snapshot::AppliedSnapshot;

#[derive(Debug, Error)]
pub enum StateError {
    #[error("state IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("state decode error: {0}")]
    Decode(#[from] serde_json::Error),
}

/// Stores the last successfully applied snapshot per stack as JSON files in
/// a state directory.
pub struct StateStore {
    dir: PathBuf,
}

impl StateStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path_for(&self, stack: &str) -> PathBuf {
        self.dir.join(format!("{stack}.json"))
    }

    /// Load a stack's snapshot. A missing file is an empty snapshot, not an
    /// error: first deploys start from nothing.
    pub fn load(&self, stack: &str) -> Result<AppliedSnapshot, StateError> {
        let path = self.path_for(stack);
        if !path.exists() {
            debug!(stack, "no prior state, starting empty");
            return Ok(AppliedSnapshot::default());
        }
        let data = std::fs::read_to_string(&path)?;
        Ok(serde_json::from_str(&data)?)
    }

    /// Persist a stack's snapshot, creating the state directory on demand.
    pub fn save(&self, stack: &str, snapshot: &AppliedSnapshot) -> Result<(), StateError> {
        std::fs::create_dir_all(&self.dir)?;
        let data = serde_json::to_string_pretty(snapshot)?;
        write_atomic(&self.path_for(stack), &data)?;
        debug!(stack, nodes = snapshot.nodes.len(), "state saved");
        Ok(())
    }
}

/// Write via a temp file and rename so a crash never leaves half a snapshot.
fn write_atomic(path: &Path, data: &str) -> std::io::Result<()> {
    let tmp = path.with_extension("json.tmp");
    std::fs::write(&tmp, data)?;
    std::fs::rename(&tmp, path)
}
