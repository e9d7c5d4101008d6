//! Observers that sit on top of the change hub.

pub mod change_tracker;
