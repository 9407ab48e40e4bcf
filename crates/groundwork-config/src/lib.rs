//! KDL declaration parsing for groundwork.
//!
//! This crate handles parsing of:
//! - Stack declarations (nodes, attributes, access intents, network rules)
//! - Pipeline definitions (stages, actions, artifact hand-off)

pub mod error;
pub mod pipeline;
pub mod stack;

pub use error::{ConfigError, ConfigResult};
pub use pipeline::parse_pipeline;
pub use stack::parse_stacks;
