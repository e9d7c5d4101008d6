//! Foundational types: ids, errors, currencies, change tracking, configuration.

pub mod config;
pub mod currency;
pub mod error;
pub mod events;
pub mod ids;
