use std::path::PathBuf;
use std::time::Duration;

use omnilead_shared::constants::{
    DEFAULT_API_BASE_URL, DEFAULT_REALTIME_URL, DEFAULT_REQUEST_TIMEOUT_SECS,
};

/// Client configuration. Defaults target a local backend; deployments
/// override the URLs.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub api_base_url: String,
    pub realtime_url: String,
    /// Overrides the platform data directory for the persisted credential.
    pub data_dir: Option<PathBuf>,
    pub request_timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            realtime_url: DEFAULT_REALTIME_URL.to_string(),
            data_dir: None,
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
        }
    }
}
