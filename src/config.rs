//! Runtime configuration for the hub

use crate::error::{HubError, Result};
use std::path::PathBuf;
use std::time::Duration;

/// Everything `serve` needs to start a hub
#[derive(Clone, Debug)]
pub struct HubConfig {
    /// Address the TCP listener binds to
    pub listen_addr: String,
    /// Base URL of the advisory service
    pub advisory_url: String,
    /// Bound on one advisory request
    pub advisory_timeout: Duration,
    /// Bound on one frame write to a client
    pub write_timeout: Duration,
    /// Largest inbound frame accepted before the connection is dropped
    pub max_frame_bytes: usize,
    /// JSON Lines message log; `None` keeps messages in memory
    pub store_path: Option<PathBuf>,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            listen_addr: "127.0.0.1:9000".to_string(),
            advisory_url: "http://127.0.0.1:5000".to_string(),
            advisory_timeout: crate::advisory::DEFAULT_TIMEOUT,
            write_timeout: Duration::from_secs(5),
            max_frame_bytes: 64 * 1024,
            store_path: None,
        }
    }
}

impl HubConfig {
    pub fn validate(&self) -> Result<()> {
        if self.listen_addr.is_empty() {
            return Err(HubError::Configuration("listen address is empty".to_string()));
        }
        if !self.advisory_url.starts_with("http://") && !self.advisory_url.starts_with("https://") {
            return Err(HubError::Configuration(format!(
                "advisory url must be http(s): {}",
                self.advisory_url
            )));
        }
        if self.advisory_timeout.is_zero() {
            return Err(HubError::Configuration("advisory timeout must be positive".to_string()));
        }
        if self.write_timeout.is_zero() {
            return Err(HubError::Configuration("write timeout must be positive".to_string()));
        }
        if self.max_frame_bytes == 0 {
            return Err(HubError::Configuration("max frame size must be positive".to_string()));
        }
        Ok(())
    }
}
