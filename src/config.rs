use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

fn default_api_base_url() -> String {
    "http://localhost:8000".to_string()
}

fn default_carrier_hz() -> f64 {
    200.0
}

fn default_initial_volume() -> f32 {
    0.3
}

fn default_session_minutes() -> u32 {
    25
}

fn default_request_timeout_secs() -> u64 {
    30
}

#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct BackendConfig {
    /// Base URL of the schedule-generation service
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,
    /// Base carrier presented to both ears; only the inter-aural offset
    /// varies per step
    #[serde(default = "default_carrier_hz")]
    pub carrier_hz: f64,
    #[serde(default = "default_initial_volume")]
    pub initial_volume: f32,
    #[serde(default = "default_session_minutes")]
    pub session_minutes: u32,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            api_base_url: default_api_base_url(),
            carrier_hz: default_carrier_hz(),
            initial_volume: default_initial_volume(),
            session_minutes: default_session_minutes(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

impl BackendConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        toml::from_str(&text).map_err(|e| Error::Config(e.to_string()))
    }

    pub fn generate_default(path: &Path) -> Result<()> {
        let text =
            toml::to_string_pretty(&Self::default()).map_err(|e| Error::Config(e.to_string()))?;
        std::fs::write(path, text)?;
        Ok(())
    }
}
