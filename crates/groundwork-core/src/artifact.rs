//! Pipeline artifacts.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// An immutable, named bundle produced once per pipeline run by exactly one
/// action. The orchestrator never interprets its contents; it carries a
/// location and checksum for the executors that do.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Artifact {
    /// Artifact name, unique within a run.
    pub name: String,
    /// Stage index that produced it. The external source artifact carries
    /// `None` and is visible to every stage.
    pub produced_by_stage: Option<usize>,
    /// Action that produced it.
    pub produced_by_action: String,
    /// Backend-specific location (object key, path, image uri).
    pub location: String,
    /// Content hash for integrity, hex-encoded.
    pub checksum: String,
    pub created_at: DateTime<Utc>,
}

impl Artifact {
    /// Whether a stage at `stage_index` may consume this artifact. Stage
    /// outputs are visible only to strictly later stages.
    pub fn visible_to_stage(&self, stage_index: usize) -> bool {
        match self.produced_by_stage {
            None => true,
            Some(produced) => produced < stage_index,
        }
    }
}
