use std::{env, path::PathBuf, time::Duration};

use thiserror::Error;

pub const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 5_000;

#[derive(Debug, Clone)]
pub struct Config {
    pub project_root: PathBuf,
    pub request_timeout: Duration,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("MCP_REQUEST_TIMEOUT_MS must be a positive integer")]
    InvalidTimeout,
    #[error("project root {0} is not an accessible directory")]
    InvalidProjectRoot(PathBuf),
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let project_root = lookup("MCP_PROJECT_ROOT")
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("."));

        let request_timeout_ms = lookup("MCP_REQUEST_TIMEOUT_MS")
            .map(|value| parse_timeout_ms(&value))
            .transpose()?
            .unwrap_or(DEFAULT_REQUEST_TIMEOUT_MS);

        Ok(Self {
            project_root: canonical_project_root(project_root)?,
            request_timeout: Duration::from_millis(request_timeout_ms),
        })
    }

    pub fn with_project_root(mut self, project_root: PathBuf) -> Result<Self, ConfigError> {
        self.project_root = canonical_project_root(project_root)?;
        Ok(self)
    }

    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Result<Self, ConfigError> {
        if timeout_ms == 0 {
            return Err(ConfigError::InvalidTimeout);
        }
        self.request_timeout = Duration::from_millis(timeout_ms);
        Ok(self)
    }
}

fn parse_timeout_ms(value: &str) -> Result<u64, ConfigError> {
    value
        .trim()
        .parse::<u64>()
        .ok()
        .filter(|ms| *ms > 0)
        .ok_or(ConfigError::InvalidTimeout)
}

fn canonical_project_root(path: PathBuf) -> Result<PathBuf, ConfigError> {
    match path.canonicalize() {
        Ok(root) if root.is_dir() => Ok(root),
        _ => Err(ConfigError::InvalidProjectRoot(path)),
    }
}
