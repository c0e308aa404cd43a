//! CLI argument groups.
//!
//! Every flag except the logging ones is optional so that it only overrides
//! the config file when given.

mod control;
mod log;
mod metrics;
mod network;

pub use control::ControlArgs;
pub use log::LogArgs;
pub use metrics::MetricsArgs;
pub use network::NetworkArgs;
