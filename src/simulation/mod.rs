//! Random ledger generation for tests, benchmarks and demos.

pub mod sample;
