//! In-memory model of the target's runtime state
//!
//! - `node`: the tagged node type and its display columns
//! - `store`: arena owning every node, lookups and the presenter query surface
//! - `builder`: applies decoded rundown events to a store

pub mod builder;
pub mod node;
pub mod store;

pub use builder::{ApplyOutcome, TreeBuilder};
pub use node::{Column, Node, NodeKind};
pub use store::NodeStore;
