#[cfg(feature = "cli")]
pub mod cli;

use std::time::Duration;

use crate::adapters::http::DEFAULT_TIMEOUT;
use crate::domain::model::ApiCredentials;

/// The caller-tunable knobs. The library needs nothing else: institution
/// and credentials arrive per call, and there is no persisted
/// configuration.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Hard bound on each HTTP call.
    pub timeout: Duration,
    /// Application credentials cached from an earlier discovery; when set,
    /// the discovery round trip is skipped.
    pub api_credentials: Option<ApiCredentials>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        ClientConfig {
            timeout: DEFAULT_TIMEOUT,
            api_credentials: None,
        }
    }
}

impl ClientConfig {
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_api_credentials(mut self, credentials: ApiCredentials) -> Self {
        self.api_credentials = Some(credentials);
        self
    }
}
