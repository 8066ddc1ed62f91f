use std::{env, fs, net::SocketAddr, path::PathBuf, str::FromStr};

use anyhow::{Context, Result, anyhow};
use serde::Deserialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DatabaseBackend {
    Sqlite,
    Memory,
}

impl FromStr for DatabaseBackend {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "sqlite" => Ok(Self::Sqlite),
            "memory" | "mock" => Ok(Self::Memory),
            other => Err(anyhow!("unsupported database backend: {other}")),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_bind_address")]
    pub bind_address: SocketAddr,
    #[serde(default = "default_database_backend")]
    pub database_backend: DatabaseBackend,
    #[serde(default = "default_database_path")]
    pub database_path: String,
    #[serde(default = "default_database_max_connections")]
    pub database_max_connections: u32,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            database_backend: default_database_backend(),
            database_path: default_database_path(),
            database_max_connections: default_database_max_connections(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

impl AppConfig {
    const CONFIG_ENV: &'static str = "DOCSHARE_CONFIG_FILE";
    const BIND_ADDRESS_ENV: &'static str = "DOCSHARE_BIND_ADDRESS";
    const DATABASE_BACKEND_ENV: &'static str = "DOCSHARE_DATABASE_BACKEND";
    const DATABASE_PATH_ENV: &'static str = "DOCSHARE_DATABASE_PATH";
    const DATABASE_MAX_CONNECTIONS_ENV: &'static str = "DOCSHARE_DATABASE_MAX_CONNECTIONS";
    const REQUEST_TIMEOUT_ENV: &'static str = "DOCSHARE_REQUEST_TIMEOUT_SECS";

    /// Load configuration from defaults layered with optional config files and
    /// environment variables.
    pub fn load() -> Result<Self> {
        Self::load_with(None)
    }

    pub fn load_with(config_path: Option<PathBuf>) -> Result<Self> {
        let mut config = Self::default();

        if let Some(path) = Self::resolve_config_path(config_path)? {
            let contents = fs::read_to_string(&path)
                .with_context(|| format!("failed to read config file: {}", path.display()))?;
            config = Self::from_toml(&contents)
                .with_context(|| format!("invalid config file: {}", path.display()))?;
        }

        config.apply_env_overrides()?;
        Ok(config)
    }

    pub fn from_toml(contents: &str) -> Result<Self> {
        toml::from_str(contents).map_err(Into::into)
    }

    fn apply_env_overrides(&mut self) -> Result<()> {
        if let Ok(addr) = env::var(Self::BIND_ADDRESS_ENV) {
            self.bind_address = addr
                .parse()
                .with_context(|| format!("invalid {name}", name = Self::BIND_ADDRESS_ENV))?;
        }

        if let Ok(backend) = env::var(Self::DATABASE_BACKEND_ENV) {
            self.database_backend = backend
                .parse()
                .with_context(|| format!("invalid {name}", name = Self::DATABASE_BACKEND_ENV))?;
        }

        if let Ok(path) = env::var(Self::DATABASE_PATH_ENV) {
            self.database_path = path;
        }

        if let Ok(value) = env::var(Self::DATABASE_MAX_CONNECTIONS_ENV) {
            self.database_max_connections = value.trim().parse().with_context(|| {
                format!("invalid {name}", name = Self::DATABASE_MAX_CONNECTIONS_ENV)
            })?;
        }

        if let Ok(value) = env::var(Self::REQUEST_TIMEOUT_ENV) {
            self.request_timeout_secs = value
                .trim()
                .parse()
                .with_context(|| format!("invalid {name}", name = Self::REQUEST_TIMEOUT_ENV))?;
        }

        Ok(())
    }

    fn resolve_config_path(explicit: Option<PathBuf>) -> Result<Option<PathBuf>> {
        if let Some(path) = explicit {
            return Self::validate_path(path);
        }

        if let Ok(path) = env::var(Self::CONFIG_ENV) {
            return Self::validate_path(PathBuf::from(path));
        }

        let mut candidates = vec![PathBuf::from("docshare.toml")];
        if let Some(dir) = Self::default_config_dir() {
            candidates.push(dir.join("config.toml"));
        }

        for candidate in candidates {
            if candidate.exists() {
                return Ok(Some(candidate));
            }
        }

        Ok(None)
    }

    fn validate_path(path: PathBuf) -> Result<Option<PathBuf>> {
        if path.exists() {
            Ok(Some(path))
        } else {
            Err(anyhow!(
                "configuration file does not exist: {}",
                path.display()
            ))
        }
    }

    fn default_config_dir() -> Option<PathBuf> {
        home_dir().map(|home| home.join(".docshare"))
    }
}

fn default_bind_address() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 9003))
}

fn default_database_backend() -> DatabaseBackend {
    DatabaseBackend::Sqlite
}

fn default_database_path() -> String {
    "./data/docshare.db".to_owned()
}

fn default_database_max_connections() -> u32 {
    4
}

fn default_request_timeout_secs() -> u64 {
    10
}

fn home_dir() -> Option<PathBuf> {
    if let Some(path) = env::var_os("HOME") {
        return Some(PathBuf::from(path));
    }

    if let Some(path) = env::var_os("USERPROFILE") {
        return Some(PathBuf::from(path));
    }

    None
}
