//! Shared helpers for CLI integration tests

pub mod cli;
