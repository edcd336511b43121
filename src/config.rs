use serde::Deserialize;
use std::fs;
use std::path::Path;
use thiserror::Error;

use crate::gate::SkipPolicy;
use crate::generate::Strategy;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Default instructions sent ahead of the aggregated diff. Configuration
/// data, not logic; override via `[review] prompt` in the config file.
const DEFAULT_PROMPT: &str = "You are a seasoned code reviewer. Analyze the following \
cumulative code diff and provide a strong, to-the-point review for the PR. Only comment \
on changes directly introduced in the diff. Format your response in Markdown with a \
Summary, Changes, Detailed Observations, and Fixes and Improvements section, naming the \
relevant file in each bullet point.\n";

/// Hidden token prepended to every posted comment; matching it is how a
/// prior review comment is recognized. An HTML comment renders invisibly.
const DEFAULT_MARKER: &str = "<!-- pr-reviewer -->";

fn default_denylist() -> Vec<String> {
    [
        ".yml", ".yaml", ".css", ".json", ".lock", ".env", ".txt", ".png", ".jpg", ".jpeg",
        ".gif", ".svg", ".ico", ".ttf", ".woff", ".woff2", ".eot", ".otf", ".webp", ".md",
        ".htm", ".xml", ".jsonld", ".csv", ".toml",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

fn default_threshold() -> usize {
    100
}

fn default_prompt() -> String {
    DEFAULT_PROMPT.to_string()
}

fn default_marker() -> String {
    DEFAULT_MARKER.to_string()
}

fn default_github_api_url() -> String {
    "https://api.github.com".to_string()
}

fn default_backend_api_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_model() -> String {
    "o3-mini".to_string()
}

fn default_poll_interval_secs() -> u64 {
    2
}

fn default_max_poll_attempts() -> u32 {
    150
}

/// Top-level configuration loaded from .pr-reviewer.toml.
///
/// Constructed once at process start and passed by reference; no
/// component reads the environment on its own.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub github: GithubConfig,

    #[serde(default)]
    pub backend: BackendConfig,

    #[serde(default)]
    pub review: ReviewConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GithubConfig {
    /// GitHub API token. If None, falls back to GITHUB_TOKEN env var.
    pub token: Option<String>,

    #[serde(default = "default_github_api_url")]
    pub api_url: String,
}

impl Default for GithubConfig {
    fn default() -> Self {
        Self {
            token: None,
            api_url: default_github_api_url(),
        }
    }
}

/// Generation-backend settings covering both strategies.
#[derive(Debug, Clone, Deserialize)]
pub struct BackendConfig {
    /// Backend API key. If None, falls back to OPENAI_API_KEY env var.
    pub api_key: Option<String>,

    #[serde(default = "default_backend_api_url")]
    pub api_url: String,

    /// Model for the synchronous completion strategy.
    #[serde(default = "default_model")]
    pub model: String,

    #[serde(default)]
    pub strategy: Strategy,

    /// Pre-registered reviewer identity; required by the thread strategy.
    pub assistant_id: Option<String>,

    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,

    #[serde(default = "default_max_poll_attempts")]
    pub max_poll_attempts: u32,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            api_url: default_backend_api_url(),
            model: default_model(),
            strategy: Strategy::default(),
            assistant_id: None,
            poll_interval_secs: default_poll_interval_secs(),
            max_poll_attempts: default_max_poll_attempts(),
        }
    }
}

/// Pipeline policy knobs.
#[derive(Debug, Clone, Deserialize)]
pub struct ReviewConfig {
    /// Changed-line-marker count below which the AI review is skipped.
    #[serde(default = "default_threshold")]
    pub threshold: usize,

    /// Lowercase filename suffixes excluded from review.
    #[serde(default = "default_denylist")]
    pub ignore_suffixes: Vec<String>,

    #[serde(default = "default_prompt")]
    pub prompt: String,

    #[serde(default = "default_marker")]
    pub marker: String,

    #[serde(default)]
    pub skip_policy: SkipPolicy,
}

impl Default for ReviewConfig {
    fn default() -> Self {
        Self {
            threshold: default_threshold(),
            ignore_suffixes: default_denylist(),
            prompt: default_prompt(),
            marker: default_marker(),
            skip_policy: SkipPolicy::default(),
        }
    }
}

impl Config {
    /// Load configuration from .pr-reviewer.toml in the current directory.
    /// Returns default config if the file doesn't exist.
    pub fn load() -> Result<Config, ConfigError> {
        let path = Path::new(".pr-reviewer.toml");
        if path.exists() {
            Self::load_from(path)
        } else {
            Ok(Config::default())
        }
    }

    /// Load from a specific path (useful for testing and --config).
    pub fn load_from(path: &Path) -> Result<Config, ConfigError> {
        let contents = fs::read_to_string(path)?;
        let config = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Resolve the GitHub token: config file value takes precedence,
    /// falls back to GITHUB_TOKEN env var.
    pub fn github_token(&self) -> Option<String> {
        self.github
            .token
            .clone()
            .or_else(|| std::env::var("GITHUB_TOKEN").ok())
    }

    /// Resolve the backend key: config file value takes precedence,
    /// falls back to OPENAI_API_KEY env var.
    pub fn backend_key(&self) -> Option<String> {
        self.backend
            .api_key
            .clone()
            .or_else(|| std::env::var("OPENAI_API_KEY").ok())
    }
}
