//! Constants used throughout the MeshLink node.
//!
//! Control and metrics defaults are owned by the crates that use them.

// =============================================================================
// Network
// =============================================================================

/// Default P2P listen address (all interfaces, random port).
pub const DEFAULT_P2P_LISTEN_ADDR: &str = "/ip4/0.0.0.0/tcp/0";

/// Protocol version announced through identify.
pub const PROTOCOL_VERSION: &str = "/meshlink/1.0.0";

/// Default connection idle timeout in seconds.
pub const DEFAULT_IDLE_TIMEOUT_SECS: u64 = 300;

/// Default gossipsub heartbeat in milliseconds.
pub const DEFAULT_HEARTBEAT_MS: u64 = 1000;

// =============================================================================
// File System
// =============================================================================

/// Config file used when `--config` is not given.
pub const DEFAULT_CONFIG_FILE: &str = "meshlink.toml";
