//! Core type definitions shared across the Murmur data layer.
//!
//! This crate is pure data: identifier types, the logical clock used for
//! merge ordering, and the scalar cell value type. No I/O, no store logic.

mod cell;
mod ids;
mod stamp;

pub use cell::{Cell, CellKind};
pub use ids::ReplicaId;
pub use stamp::Stamp;
