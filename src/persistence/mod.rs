//! Snapshot support for storage collaborators.

pub mod snapshot;
