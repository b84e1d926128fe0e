//! Subcommands.

pub mod config;
pub mod merge;
