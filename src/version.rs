//! Relay version.

/// The short version information for the relay.
pub const RELAY_SHORT_VERSION: &str = env!("CARGO_PKG_VERSION");
