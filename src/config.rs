use std::{fs, path::Path, path::PathBuf, time::Duration};

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

pub const ENV_BASE_URL: &str = "SEECLICK_BASE_URL";
pub const ENV_POLL_INTERVAL_MS: &str = "SEECLICK_POLL_INTERVAL_MS";
pub const ENV_MAX_POLL_ATTEMPTS: &str = "SEECLICK_MAX_POLL_ATTEMPTS";
pub const ENV_ITEM_LIMIT: &str = "SEECLICK_ITEM_LIMIT";
pub const ENV_DEBUG: &str = "SEECLICK_DEBUG";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub base_url: String,
    pub poll_interval_ms: u64,
    /// 600 attempts at one second is a ten minute ceiling per job.
    pub max_poll_attempts: u32,
    pub item_limit: u32,
    pub request_timeout_secs: u64,
    /// Where the anonymous user id is kept. `None` keeps it in memory only.
    pub identity_path: Option<PathBuf>,
    pub debug: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000".into(),
            poll_interval_ms: 1_000,
            max_poll_attempts: 600,
            item_limit: 10,
            request_timeout_secs: 30,
            identity_path: None,
            debug: false,
        }
    }
}

impl ClientConfig {
    /// Defaults, then the JSON file at `path` if it exists, then the
    /// `SEECLICK_*` environment variables.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        Self::load_with(path, |key| std::env::var(key).ok())
    }

    fn load_with<F>(path: Option<&Path>, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = match path {
            Some(path) if path.exists() => {
                let contents = fs::read_to_string(path)
                    .with_context(|| format!("Failed to read config from {}", path.display()))?;
                serde_json::from_str(&contents)
                    .with_context(|| format!("Failed to parse config at {}", path.display()))?
            }
            _ => Self::default(),
        };

        config.apply_overrides(lookup)?;
        config.validate()?;
        Ok(config)
    }

    fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup(ENV_BASE_URL) {
            self.base_url = url;
        }
        if let Some(raw) = lookup(ENV_POLL_INTERVAL_MS) {
            self.poll_interval_ms = raw
                .parse()
                .with_context(|| format!("{ENV_POLL_INTERVAL_MS} must be an integer, got '{raw}'"))?;
        }
        if let Some(raw) = lookup(ENV_MAX_POLL_ATTEMPTS) {
            self.max_poll_attempts = raw
                .parse()
                .with_context(|| format!("{ENV_MAX_POLL_ATTEMPTS} must be an integer, got '{raw}'"))?;
        }
        if let Some(raw) = lookup(ENV_ITEM_LIMIT) {
            self.item_limit = raw
                .parse()
                .with_context(|| format!("{ENV_ITEM_LIMIT} must be an integer, got '{raw}'"))?;
        }
        if let Some(raw) = lookup(ENV_DEBUG) {
            self.debug = raw == "1" || raw.eq_ignore_ascii_case("true");
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.base_url.trim().is_empty() {
            bail!("base_url must not be empty");
        }
        if self.poll_interval_ms == 0 {
            bail!("poll_interval_ms must be greater than zero");
        }
        if self.max_poll_attempts == 0 {
            bail!("max_poll_attempts must be greater than zero");
        }
        if self.item_limit == 0 {
            bail!("item_limit must be greater than zero");
        }
        Ok(())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}
