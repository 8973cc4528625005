//! bkd CLI library
//!
//! Exposes the CLI components for integration tests.

pub mod commands;
pub mod exit_code;
pub mod output;
