use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::metadata::TVDB_API;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub auth: AuthConfig,
    pub tvdb: TvdbConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub path: PathBuf,
}

/// Credentials required on `/sync` and `/shows/{id}`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TvdbConfig {
    pub api_key: Option<String>,
    pub pin: Option<String>,
    pub base_url: String,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            server: ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 8080,
            },
            database: DatabaseConfig {
                path: config_dir().join("tracker.db"),
            },
            auth: AuthConfig {
                username: "admin".to_string(),
                password: String::new(),
            },
            tvdb: TvdbConfig {
                api_key: None,
                pin: None,
                base_url: TVDB_API.to_string(),
            },
        }
    }
}

fn config_dir() -> PathBuf {
    dirs::config_dir()
        .or_else(|| dirs::home_dir().map(|home| home.join(".config")))
        .unwrap_or_else(|| PathBuf::from("."))
        .join("immersion-tracker")
}

/// Default location of the config file, ~/.config/immersion-tracker/config.yaml
pub fn get_config_path() -> PathBuf {
    config_dir().join("config.yaml")
}

impl Config {
    /// Load config from `path`, or from the default location if it exists
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => {
                info!("Loading config from {}", path.display());
                Self::load_from_file(path)?
            }
            None => {
                let default_path = get_config_path();
                if default_path.exists() {
                    info!("Loading config from {}", default_path.display());
                    Self::load_from_file(&default_path)?
                } else {
                    warn!("No config.yaml found, using defaults");
                    Config::default()
                }
            }
        };

        config.apply_env();
        config.sanitize();

        if config.auth.password.is_empty() {
            warn!("No password configured; authenticated routes will reject every request");
        }

        Ok(config)
    }

    /// Load config from specific file
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("read config {}", path.display()))?;
        let mut config: Config = serde_yaml::from_str(&contents)
            .with_context(|| format!("parse config {}", path.display()))?;
        config.sanitize();

        debug!(
            "Config loaded: server={}:{}, tvdb_key={}",
            config.server.host,
            config.server.port,
            config.tvdb.api_key.is_some()
        );

        Ok(config)
    }

    fn apply_env(&mut self) {
        if let Ok(username) = std::env::var("IMMERSION_TRACKER_USERNAME") {
            self.auth.username = username;
        }
        if let Ok(password) = std::env::var("IMMERSION_TRACKER_PASSWORD") {
            self.auth.password = password;
        }
        if let Ok(key) = std::env::var("TVDB_API_KEY") {
            self.tvdb.api_key = Some(key);
        }
        if let Ok(pin) = std::env::var("TVDB_PIN") {
            self.tvdb.pin = Some(pin);
        }
    }

    fn sanitize(&mut self) {
        if let Some(ref key) = self.tvdb.api_key {
            if key == "YOUR_API_KEY_HERE" || key.is_empty() {
                warn!("TVDB API key not configured in config.yaml");
                self.tvdb.api_key = None;
            }
        }
        if matches!(self.tvdb.pin.as_deref(), Some("")) {
            self.tvdb.pin = None;
        }
    }
}
