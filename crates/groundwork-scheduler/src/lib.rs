//! Deployment scheduling for groundwork.
//!
//! Pure graph-to-plan computation: batching via Kahn's algorithm and
//! diff-then-apply classification against the last applied snapshot. No I/O
//! happens here, which keeps unit tests deterministic.

pub mod diff;
pub mod plan;

pub use diff::{NodeChange, PlanSummary, diff};
pub use plan::DeployPlan;
