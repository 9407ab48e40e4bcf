//! Dependency graph construction for groundwork.
//!
//! Declarations go in through [`GraphBuilder`]; an immutable [`Graph`]
//! snapshot comes out of `build()`, or a configuration error if the
//! declarations contain duplicates, dangling references or a cycle.

pub mod builder;
pub mod graph;

pub use builder::GraphBuilder;
pub use graph::Graph;
