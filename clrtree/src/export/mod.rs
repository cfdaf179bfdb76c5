//! Presenters for a finished inspection
//!
//! Both formats read the tree only through the [`NodeStore`](crate::tree::NodeStore)
//! query surface (roots, sorted children, cell text, tooltip), the same way an
//! interactive tree view would.
//!
//! - [`text`]: indented table with the five display columns
//! - [`json`]: `serde` snapshot of the tree and inspection summary

pub mod json;
pub mod text;

pub use json::{write_json, Snapshot, SnapshotNode};
pub use text::{render_text, write_text};
