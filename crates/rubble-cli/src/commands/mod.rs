//! CLI command implementations

pub mod config;
pub mod layout;
pub mod run;
