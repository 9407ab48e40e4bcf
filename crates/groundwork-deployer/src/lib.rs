//! Deploy execution for groundwork.
//!
//! Takes the scheduler's batch plan and drives it against a
//! [`ProvisionExecutor`](groundwork_core::executor::ProvisionExecutor): each
//! batch is dispatched as a set of concurrent apply requests, batch N+1 never
//! starts before batch N fully succeeds, and the first failure halts
//! everything after it. Applied state is persisted per stack for the next
//! run's diff.

pub mod dispatch;
pub mod memory;
pub mod state;

pub use dispatch::{ApplyReport, BatchDispatcher};
pub use memory::MemoryExecutor;
pub use state::{StateError, StateStore};
