//! Application-level configuration loading, including the curated fallback
//! question pool.

use std::time::Duration;
use std::{env, fs, io::ErrorKind, path::PathBuf};

use serde::Deserialize;
use tracing::{info, warn};

use crate::questions::fallback::{PoolQuestion, StaticQuestionPool};
use crate::services::room_service::RoomSettings;

/// Default location on disk where the server looks for the JSON configuration.
const DEFAULT_CONFIG_PATH: &str = "config/app.json";
/// Environment variable that overrides [`DEFAULT_CONFIG_PATH`].
const CONFIG_PATH_ENV: &str = "QUIZ_NEST_BACK_CONFIG_PATH";

const DEFAULT_QUESTION_COUNT: usize = 10;
const DEFAULT_GENERATION_TIMEOUT_SECS: u64 = 8;
const DEFAULT_CACHE_TTL_SECS: u64 = 1800;
const DEFAULT_REJOIN_GRACE_SECS: u64 = 60;
const DEFAULT_RESULTS_GRACE_SECS: u64 = 30;

#[derive(Debug, Clone)]
/// Immutable runtime configuration shared across the application.
pub struct AppConfig {
    question_count: usize,
    generation_timeout: Duration,
    cache_ttl: Duration,
    rejoin_grace: Duration,
    results_grace: Duration,
    generator_url: Option<String>,
    fallback_pool: Vec<PoolQuestion>,
}

impl AppConfig {
    /// Load the application configuration from disk, falling back to built-in
    /// defaults.
    pub fn load() -> Self {
        let path = resolve_config_path();
        match fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str::<RawConfig>(&contents) {
                Ok(raw) => {
                    let app_config: Self = raw.into();
                    info!(
                        path = %path.display(),
                        question_count = app_config.question_count,
                        pool_entries = app_config.fallback_pool.len(),
                        "loaded configuration"
                    );
                    app_config
                }
                Err(err) => {
                    warn!(
                        path = %path.display(),
                        error = %err,
                        "failed to parse config; falling back to defaults"
                    );
                    Self::default()
                }
            },
            Err(err) if err.kind() == ErrorKind::NotFound => {
                info!(
                    path = %path.display(),
                    "config file not found; using built-in defaults"
                );
                Self::default()
            }
            Err(err) => {
                warn!(
                    path = %path.display(),
                    error = %err,
                    "failed to read config; falling back to defaults"
                );
                Self::default()
            }
        }
    }

    /// Timing and sizing knobs handed to every room.
    pub fn room_settings(&self) -> RoomSettings {
        RoomSettings {
            question_count: self.question_count,
            rejoin_grace: self.rejoin_grace,
            results_grace: self.results_grace,
        }
    }

    /// How long one upstream generation call may take.
    pub fn generation_timeout(&self) -> Duration {
        self.generation_timeout
    }

    /// How long a generated question set stays cached.
    pub fn cache_ttl(&self) -> Duration {
        self.cache_ttl
    }

    /// Upstream generator endpoint, when one is configured.
    pub fn generator_url(&self) -> Option<&str> {
        self.generator_url.as_deref()
    }

    /// Build the curated pool; the built-in starter set when the config
    /// supplies no entries.
    pub fn fallback_pool(&self) -> StaticQuestionPool {
        if self.fallback_pool.is_empty() {
            StaticQuestionPool::starter()
        } else {
            StaticQuestionPool::new(self.fallback_pool.clone())
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            question_count: DEFAULT_QUESTION_COUNT,
            generation_timeout: Duration::from_secs(DEFAULT_GENERATION_TIMEOUT_SECS),
            cache_ttl: Duration::from_secs(DEFAULT_CACHE_TTL_SECS),
            rejoin_grace: Duration::from_secs(DEFAULT_REJOIN_GRACE_SECS),
            results_grace: Duration::from_secs(DEFAULT_RESULTS_GRACE_SECS),
            generator_url: None,
            fallback_pool: Vec::new(),
        }
    }
}

#[derive(Debug, Deserialize)]
/// JSON representation of the configuration file located at [`DEFAULT_CONFIG_PATH`].
struct RawConfig {
    question_count: Option<usize>,
    generation_timeout_secs: Option<u64>,
    cache_ttl_secs: Option<u64>,
    rejoin_grace_secs: Option<u64>,
    results_grace_secs: Option<u64>,
    generator_url: Option<String>,
    #[serde(default)]
    fallback_pool: Vec<PoolQuestion>,
}

impl From<RawConfig> for AppConfig {
    fn from(value: RawConfig) -> Self {
        let defaults = AppConfig::default();
        Self {
            // A zero-question game is never playable.
            question_count: value
                .question_count
                .unwrap_or(defaults.question_count)
                .max(1),
            generation_timeout: value
                .generation_timeout_secs
                .map(Duration::from_secs)
                .unwrap_or(defaults.generation_timeout),
            cache_ttl: value
                .cache_ttl_secs
                .map(Duration::from_secs)
                .unwrap_or(defaults.cache_ttl),
            rejoin_grace: value
                .rejoin_grace_secs
                .map(Duration::from_secs)
                .unwrap_or(defaults.rejoin_grace),
            results_grace: value
                .results_grace_secs
                .map(Duration::from_secs)
                .unwrap_or(defaults.results_grace),
            generator_url: value.generator_url,
            fallback_pool: value.fallback_pool,
        }
    }
}

/// Resolve the configuration path taking the environment override into account.
fn resolve_config_path() -> PathBuf {
    env::var_os(CONFIG_PATH_ENV)
        .map(PathBuf::from)
        .filter(|path| !path.as_os_str().is_empty())
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}
