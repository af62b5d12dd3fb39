use std::{fs, io::ErrorKind, path::Path};

use serde::Deserialize;

use crate::{
    proximity::ranker::DEFAULT_RADIUS_KM,
    session::favourites::{DEFAULT_MAX_SESSIONS, DEFAULT_SESSION_TTL},
};

pub const DEFAULT_CONFIG_PATH: &str = "config.json";

#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    /// Local path or http(s) URL of the closure table.
    pub data_source: String,
    pub date_format: String,
    pub placeholder_marker: String,
    pub radius_km: f64,
    pub bind_address: String,
    /// Idle seconds before a session's favourites are discarded.
    pub session_ttl_secs: u64,
    pub max_sessions: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_source: "DatesofHawkerCentresClosure.csv".to_string(),
            date_format: "%d/%m/%Y".to_string(),
            placeholder_marker: "TBC".to_string(),
            radius_km: DEFAULT_RADIUS_KM,
            bind_address: "127.0.0.1:7878".to_string(),
            session_ttl_secs: DEFAULT_SESSION_TTL.as_secs(),
            max_sessions: DEFAULT_MAX_SESSIONS,
        }
    }
}

impl Config {
    pub fn from_config(config: String) -> Result<Self, String> {
        match serde_json::from_str(&config) {
            Ok(data) => Ok(data),
            Err(err) => Err(format!("Could not deserialize.\n{}", err)),
        }
    }

    /// Reads the config file, falling back to defaults when it does not exist.
    pub fn load(path: &Path) -> Result<Self, String> {
        match fs::read_to_string(path) {
            Ok(text) => Self::from_config(text),
            Err(err) if err.kind() == ErrorKind::NotFound => {
                log::info!("No config at {}, using defaults", path.display());
                Ok(Self::default())
            }
            Err(err) => Err(format!("Could not read {}.\n{}", path.display(), err)),
        }
    }
}
