//! Version information for the MeshLink node.

/// The version string from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// The git commit SHA (set by build.rs if available).
pub const GIT_SHA: &str = {
    match option_env!("VERGEN_GIT_SHA") {
        Some(sha) => sha,
        None => "unknown",
    }
};

/// The build timestamp (set by build.rs if available).
pub const BUILD_TIMESTAMP: &str = {
    match option_env!("VERGEN_BUILD_TIMESTAMP") {
        Some(ts) => ts,
        None => "unknown",
    }
};

/// Multi-line version shown by `--version`.
pub static LONG_VERSION: once_cell::sync::Lazy<String> = once_cell::sync::Lazy::new(|| {
    format!("Version: {VERSION}\nCommit SHA: {GIT_SHA}\nBuild Timestamp: {BUILD_TIMESTAMP}")
});

/// Agent version announced to peers through identify.
pub const AGENT_VERSION: &str = concat!("meshlink/", env!("CARGO_PKG_VERSION"));
