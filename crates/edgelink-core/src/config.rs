//! Coordinator configuration.

use std::time::Duration;

/// Timeout knobs for coordinator-driven operations.
///
/// Discovery carries no coordinator-side timeout: scan duration belongs to
/// the transport plugin.
#[derive(Debug, Clone)]
pub struct CoordinatorConfig {
    /// Maximum time for the transport to open a channel.
    pub connect_timeout: Duration,

    /// Maximum time for a single authentication plugin's exchange. An
    /// expired exchange counts as that scheme failing; the next configured
    /// scheme is still tried.
    pub auth_timeout: Duration,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            auth_timeout: Duration::from_secs(10),
        }
    }
}
