//! Shell configuration from the environment.

use std::path::PathBuf;

pub const API_URL_VAR: &str = "PAIRLINK_API_URL";
pub const WS_URL_VAR: &str = "PAIRLINK_WS_URL";
pub const PROFILE_VAR: &str = "PAIRLINK_PROFILE";

pub const DEFAULT_API_URL: &str = "http://localhost:8000";
pub const DEFAULT_WS_URL: &str = "ws://localhost:8000";
pub const DEFAULT_PROFILE_PATH: &str = "pairlink-profile.json";

/// Endpoints and local paths used by the shell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShellConfig {
    /// Base for `POST /rooms` and `POST /autocomplete`
    pub api_base_url: String,
    /// Base for `/ws/{room}/{user}`
    pub ws_base_url: String,
    pub profile_path: PathBuf,
}

impl Default for ShellConfig {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_URL.to_string(),
            ws_base_url: DEFAULT_WS_URL.to_string(),
            profile_path: PathBuf::from(DEFAULT_PROFILE_PATH),
        }
    }
}

impl ShellConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any variable source; blank values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let var = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());
        let defaults = Self::default();
        Self {
            api_base_url: var(API_URL_VAR).unwrap_or(defaults.api_base_url),
            ws_base_url: var(WS_URL_VAR).unwrap_or(defaults.ws_base_url),
            profile_path: var(PROFILE_VAR)
                .map(PathBuf::from)
                .unwrap_or(defaults.profile_path),
        }
    }
}
