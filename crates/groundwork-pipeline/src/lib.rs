//! Pipeline run orchestration for groundwork.
//!
//! Executes a pipeline's stages strictly in order, one run at a time:
//! artifact lineage is validated before anything starts, any action failure
//! fails the run and stops every later stage, and a run may be cancelled
//! between stages. Already-produced artifacts survive a failed run for
//! inspection.

pub mod lineage;
pub mod orchestrator;

pub use lineage::validate_lineage;
pub use orchestrator::{CancelHandle, DeployTarget, PipelineOrchestrator, RunEvent};
