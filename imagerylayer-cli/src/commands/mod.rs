//! CLI command implementations.
//!
//! Each subcommand has its own module with argument definitions and handlers.
//!
//! # Command Modules
//!
//! - [`config`] - Configuration management (path, list, init)
//! - [`fetch`] - Fetch and realize imagery for an area
//! - [`map`] - Show imagery associations for an area

pub mod common;
pub mod config;
pub mod fetch;
pub mod map;
