use crate::tmdb::TMDB_BASE;
use anyhow::{Context, Result};
use std::env;
use std::path::PathBuf;
use std::time::Duration;
use tracing::info;

const DEFAULT_LANGUAGE: &str = "en-US";
const DEFAULT_DEBOUNCE_MS: u64 = 500;
const DEFAULT_NOTIFICATION_SECS: u64 = 4;

#[derive(Debug, Clone)]
pub struct Config {
    pub tmdb_api_key: String,
    pub tmdb_base_url: String,
    pub language: String,
    pub data_dir: PathBuf,
    pub search_debounce: Duration,
    pub notification_ttl: Duration,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let tmdb_api_key = env::var("TMDB_API_KEY")
            .ok()
            .filter(|s| !s.is_empty())
            .context("Missing required environment variable: TMDB_API_KEY")?;
        let data_dir = match env::var("CINEXPLORA_DATA_DIR") {
            Ok(dir) if !dir.is_empty() => PathBuf::from(dir),
            _ => default_data_dir(),
        };
        let config = Self {
            tmdb_api_key,
            tmdb_base_url: env::var("TMDB_BASE_URL").unwrap_or_else(|_| TMDB_BASE.to_string()),
            language: env::var("CINEXPLORA_LANGUAGE")
                .unwrap_or_else(|_| DEFAULT_LANGUAGE.to_string()),
            data_dir,
            search_debounce: Duration::from_millis(parse_env_u64(
                "CINEXPLORA_SEARCH_DEBOUNCE_MS",
                DEFAULT_DEBOUNCE_MS,
            )?),
            notification_ttl: Duration::from_secs(parse_env_u64(
                "CINEXPLORA_NOTIFICATION_SECS",
                DEFAULT_NOTIFICATION_SECS,
            )?),
        };
        info!(
            "Using catalog {} ({}), data in {}",
            config.tmdb_base_url,
            config.language,
            config.data_dir.display()
        );
        Ok(config)
    }
}

/// Session timing knobs, separate from credentials so the core can be built
/// without any environment.
#[derive(Debug, Clone, Copy)]
pub struct Timings {
    pub search_debounce: Duration,
    pub notification_ttl: Duration,
}

impl Default for Timings {
    fn default() -> Self {
        Self {
            search_debounce: Duration::from_millis(DEFAULT_DEBOUNCE_MS),
            notification_ttl: Duration::from_secs(DEFAULT_NOTIFICATION_SECS),
        }
    }
}

impl From<&Config> for Timings {
    fn from(config: &Config) -> Self {
        Self {
            search_debounce: config.search_debounce,
            notification_ttl: config.notification_ttl,
        }
    }
}

fn default_data_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("cinexplora")
}

fn parse_env_u64(key: &str, default: u64) -> Result<u64> {
    match env::var(key) {
        Ok(v) if !v.trim().is_empty() => v
            .trim()
            .parse()
            .with_context(|| format!("{key} must be a whole number, got '{v}'")),
        _ => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_reference_timings() {
        let t = Timings::default();
        assert_eq!(t.search_debounce, Duration::from_millis(500));
        assert_eq!(t.notification_ttl, Duration::from_secs(4));
    }

    #[test]
    fn unset_numeric_vars_use_default() {
        assert_eq!(
            parse_env_u64("CINEXPLORA_TEST_UNSET_VARIABLE", 17).expect("default"),
            17
        );
    }
}
