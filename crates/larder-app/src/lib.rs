//! Command-line front end wiring settings, provider selection and the
//! intent engine together.

pub mod cli;
pub mod commands;
pub mod config;

pub use cli::{Cli, Commands};
