//! Environment configuration.

use std::env;
use std::path::PathBuf;

pub const ENV_API_TOKEN: &str = "PERPLEXITY_API_TOKEN";
pub const ENV_BASE_URL: &str = "PERPLEXITY_BASE_URL";
pub const ENV_THREAD_DIR: &str = "PLEXCTL_THREAD_DIR";
pub const ENV_DEBUG: &str = "PLEXCTL_DEBUG";

#[derive(Debug, Clone, Default)]
pub struct EnvConfig {
    pub api_token: Option<String>,
    pub base_url: Option<String>,
    pub thread_dir: Option<PathBuf>,
    pub debug: bool,
}

impl EnvConfig {
    pub fn from_env() -> Self {
        Self {
            api_token: env_string_opt(ENV_API_TOKEN),
            base_url: env_string_opt(ENV_BASE_URL),
            thread_dir: env_string_opt(ENV_THREAD_DIR).map(PathBuf::from),
            debug: env_flag(ENV_DEBUG),
        }
    }

    /// An explicit flag value wins over the environment.
    pub fn resolve_token(&self, flag: Option<&str>) -> Option<String> {
        flag.map(str::trim)
            .filter(|value| !value.is_empty())
            .map(ToOwned::to_owned)
            .or_else(|| self.api_token.clone())
    }
}

fn env_flag(key: &str) -> bool {
    env::var(key).map(|value| value == "1").unwrap_or(false)
}

fn env_string_opt(key: &str) -> Option<String> {
    env::var(key).ok().and_then(|value| {
        if value.trim().is_empty() {
            None
        } else {
            Some(value)
        }
    })
}
