//! Core domain types and traits for the groundwork provisioning engine.
//!
//! This crate contains:
//! - Node and run identifiers
//! - Resource node model (kinds, attributes, capabilities)
//! - Stack declarations (nodes, access intents, network tuples)
//! - Pipeline, stage, action and artifact definitions
//! - Applied-state snapshots for diff-then-apply
//! - Executor and provider trait contracts
//! - The shared error taxonomy

pub mod artifact;
pub mod error;
pub mod executor;
pub mod id;
pub mod node;
pub mod pipeline;
pub mod snapshot;
pub mod stack;

pub use error::{Error, Result};
pub use id::{NodeId, RunId};
pub use node::{AttrValue, Capabilities, NodeKind, ResourceNode};
