//! Node infrastructure for the `meshlink` binary.
//!
//! - [`cli`] - command-line definition
//! - [`args`] - flag groups shared between the CLI and the config file
//! - [`config`] - TOML configuration and its conversion to runtime settings
//! - [`logging`] - tracing subscriber setup
//! - [`version`] - version information

pub mod args;
pub mod cli;
pub mod config;
pub mod constants;
pub mod logging;
pub mod version;
