//! Derivation of permission grants and network reachability rules.
//!
//! Both resolvers are pure: they take a built graph plus declarations and
//! return a new derived graph, or a configuration error. Nothing is mutated
//! as a side effect, so resolution is replayable and idempotent.

pub mod grants;
pub mod network;

pub use grants::resolve_grants;
pub use network::resolve_network;
