//! Job records: identity, type, lifecycle status and snapshots.

pub(crate) mod record;
pub mod types;

pub use types::*;
