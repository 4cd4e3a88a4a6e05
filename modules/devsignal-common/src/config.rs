use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use directories::BaseDirs;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// Name of the optional config file looked up in the working directory.
pub const LOCAL_CONFIG_FILE: &str = "devsignal.json";

/// Hard ceiling on crawled websites per run, whatever the config says.
pub const MAX_WEBSITES_CEILING: usize = 5;

/// Tunables loaded from an optional JSON file. Every field has a default,
/// so a partial file (or none at all) is fine.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub github: GithubConfig,
    pub scraping: ScrapingConfig,
    pub cache: CacheConfig,
    pub scoring: ScoringConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GithubConfig {
    pub max_repos: usize,
    pub max_featured_repos: usize,
    pub fetch_readme: bool,
    /// Organizations, gists, social accounts and, with a token, per-repository details.
    pub fetch_extended: bool,
}

impl Default for GithubConfig {
    fn default() -> Self {
        Self {
            max_repos: 20,
            max_featured_repos: 8,
            fetch_readme: true,
            fetch_extended: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScrapingConfig {
    pub max_websites: usize,
    /// Permits shared by the optional fetches.
    pub worker_limit: usize,
    pub api_timeout_secs: u64,
    pub crawl_timeout_secs: u64,
}

impl Default for ScrapingConfig {
    fn default() -> Self {
        Self {
            max_websites: 3,
            worker_limit: 4,
            api_timeout_secs: 30,
            crawl_timeout_secs: 60,
        }
    }
}

impl ScrapingConfig {
    pub fn effective_max_websites(&self) -> usize {
        self.max_websites.min(MAX_WEBSITES_CEILING)
    }

    pub fn effective_worker_limit(&self) -> usize {
        self.worker_limit.max(1)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub dir: Option<PathBuf>,
}

/// Scoring thresholds. Defaults are the documented reference scales.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    // Language tiers by share of code volume
    pub intermediate_share: f64,
    pub advanced_share: f64,

    // Activity score: weight per unit and cap per component
    pub star_weight: f64,
    pub star_cap: f64,
    pub fork_weight: f64,
    pub fork_cap: f64,
    pub watcher_weight: f64,
    pub watcher_cap: f64,
    pub recent_repo_weight: f64,
    pub recent_repo_cap: f64,
    pub repo_count_weight: f64,
    pub repo_count_cap: f64,

    // Recency
    pub recent_window_days: i64,
    pub active_window_days: i64,
    pub recency_high_repos: usize,
    pub recency_medium_repos: usize,

    // Impact
    pub impact_high_stars: u64,
    pub impact_high_avg_stars: f64,
    pub impact_medium_stars: u64,
    pub impact_medium_avg_stars: f64,

    // Archetypes
    pub architect_min_stars: u64,
    pub architect_min_repos: usize,
    pub architect_min_languages: usize,
    pub experimenter_min_repos: usize,
    pub experimenter_min_languages: usize,
    pub craftsperson_max_languages: usize,
    pub craftsperson_min_stars: u64,
    pub craftsperson_min_repos: usize,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            intermediate_share: 0.10,
            advanced_share: 0.30,
            star_weight: 0.5,
            star_cap: 35.0,
            fork_weight: 0.8,
            fork_cap: 20.0,
            watcher_weight: 0.3,
            watcher_cap: 15.0,
            recent_repo_weight: 4.0,
            recent_repo_cap: 20.0,
            repo_count_weight: 1.0,
            repo_count_cap: 10.0,
            recent_window_days: 90,
            active_window_days: 30,
            recency_high_repos: 3,
            recency_medium_repos: 1,
            impact_high_stars: 100,
            impact_high_avg_stars: 25.0,
            impact_medium_stars: 25,
            impact_medium_avg_stars: 10.0,
            architect_min_stars: 250,
            architect_min_repos: 10,
            architect_min_languages: 3,
            experimenter_min_repos: 20,
            experimenter_min_languages: 5,
            craftsperson_max_languages: 2,
            craftsperson_min_stars: 50,
            craftsperson_min_repos: 3,
        }
    }
}

impl Config {
    /// Load from `explicit`, else `./devsignal.json`, else the user config dir.
    /// A missing or broken file logs a warning and yields defaults.
    pub fn load(explicit: Option<&Path>) -> Self {
        let path = match explicit {
            Some(p) => Some(p.to_path_buf()),
            None => Self::discover(),
        };
        let Some(path) = path else {
            return Self::default();
        };

        match Self::from_file(&path) {
            Ok(config) => {
                info!(path = %path.display(), "Loaded config file");
                config
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Ignoring config file, using defaults");
                Self::default()
            }
        }
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let data = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&data)?)
    }

    fn discover() -> Option<PathBuf> {
        let local = PathBuf::from(LOCAL_CONFIG_FILE);
        if local.is_file() {
            return Some(local);
        }
        let user = BaseDirs::new()?
            .config_dir()
            .join("devsignal")
            .join("config.json");
        user.is_file().then_some(user)
    }

    /// Cache base directory: CLI flag, then environment, then config file,
    /// then the OS cache dir.
    pub fn cache_dir(&self, cli: Option<&Path>, credentials: &Credentials) -> PathBuf {
        cli.map(Path::to_path_buf)
            .or_else(|| credentials.cache_dir.clone())
            .or_else(|| self.cache.dir.clone())
            .unwrap_or_else(default_cache_dir)
    }
}

pub fn default_cache_dir() -> PathBuf {
    BaseDirs::new()
        .map(|dirs| dirs.cache_dir().join("devsignal"))
        .unwrap_or_else(|| env::temp_dir().join("devsignal-cache"))
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("cannot read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid config JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// Secrets and endpoints from the environment, read once at startup.
#[derive(Clone, Default)]
pub struct Credentials {
    pub github_token: Option<String>,
    pub browserless_url: Option<String>,
    pub browserless_token: Option<String>,
    pub apify_api_key: Option<String>,
    pub cache_dir: Option<PathBuf>,
}

impl Credentials {
    pub fn from_env() -> Self {
        Self {
            github_token: optional_env("GITHUB_TOKEN"),
            browserless_url: optional_env("BROWSERLESS_URL"),
            browserless_token: optional_env("BROWSERLESS_TOKEN"),
            apify_api_key: optional_env("APIFY_API_KEY"),
            cache_dir: optional_env("DEVSIGNAL_CACHE_DIR").map(PathBuf::from),
        }
    }

    /// Log which credentials are present without printing them.
    pub fn log_redacted(&self) {
        info!(
            github_token = self.github_token.is_some(),
            browserless = self.browserless_url.is_some(),
            apify = self.apify_api_key.is_some(),
            "Credentials loaded"
        );
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let redact = |v: &Option<String>| v.as_ref().map(|_| "<redacted>");
        f.debug_struct("Credentials")
            .field("github_token", &redact(&self.github_token))
            .field("browserless_url", &self.browserless_url)
            .field("browserless_token", &redact(&self.browserless_token))
            .field("apify_api_key", &redact(&self.apify_api_key))
            .field("cache_dir", &self.cache_dir)
            .finish()
    }
}

fn optional_env(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
