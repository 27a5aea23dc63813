// src/config/briefing.rs
use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use std::{env, fs};

use crate::errors::BriefingError;

pub const DEFAULT_BRIEFING_CONFIG_PATH: &str = "config/briefing.toml";
pub const ENV_BRIEFING_CONFIG_PATH: &str = "BRIEFING_CONFIG_PATH";

/// Credential placeholder meaning "read from the well-known env var".
const FROM_ENV: &str = "ENV";

pub const ENV_GEMINI_API_KEY: &str = "GEMINI_API_KEY";
pub const ENV_BRIGHTDATA_API_KEY: &str = "BRIGHTDATA_API_KEY";
pub const ENV_BRIGHTDATA_ZONE: &str = "BRIGHTDATA_WEB_UNLOCKER_ZONE";
pub const ENV_MCP_API_TOKEN: &str = "API_TOKEN";
pub const ENV_MCP_ZONE: &str = "WEB_UNLOCKER_ZONE";
pub const ENV_ELEVEN_API_KEY: &str = "ELEVEN_API_KEY";

/// Process-wide configuration, built once at start and passed down explicitly.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct BriefingConfig {
    pub news: NewsConfig,
    pub reddit: RedditConfig,
    pub gemini: GeminiConfig,
    pub scrape: ScrapeConfig,
    pub mcp: McpServerConfig,
    pub speech: SpeechConfig,
}

/// Pacing and retry numbers for one source.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SourcePolicy {
    /// Calls admitted per `window_secs`.
    pub permits: u32,
    pub window_secs: f64,
    pub max_attempts: u32,
    pub backoff_min_secs: f64,
    pub backoff_max_secs: f64,
    /// Fixed pause after every topic, success or not.
    pub pause_secs: f64,
    /// Optional wall-clock bound on a single attempt. Not retried when hit.
    pub attempt_timeout_secs: Option<f64>,
}

/// Keys a `[news]` / `[reddit]` table may set; anything absent keeps the
/// source's own default.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PolicyOverrides {
    pub permits: Option<u32>,
    pub window_secs: Option<f64>,
    pub max_attempts: Option<u32>,
    pub backoff_min_secs: Option<f64>,
    pub backoff_max_secs: Option<f64>,
    pub pause_secs: Option<f64>,
    pub attempt_timeout_secs: Option<f64>,
}

impl PolicyOverrides {
    fn apply(&self, base: SourcePolicy) -> SourcePolicy {
        SourcePolicy {
            permits: self.permits.unwrap_or(base.permits),
            window_secs: self.window_secs.unwrap_or(base.window_secs),
            max_attempts: self.max_attempts.unwrap_or(base.max_attempts),
            backoff_min_secs: self.backoff_min_secs.unwrap_or(base.backoff_min_secs),
            backoff_max_secs: self.backoff_max_secs.unwrap_or(base.backoff_max_secs),
            pause_secs: self.pause_secs.unwrap_or(base.pause_secs),
            attempt_timeout_secs: self.attempt_timeout_secs.or(base.attempt_timeout_secs),
        }
    }
}

impl SourcePolicy {
    pub fn news() -> Self {
        Self {
            permits: 5,
            window_secs: 1.0,
            max_attempts: 3,
            backoff_min_secs: 2.0,
            backoff_max_secs: 10.0,
            pause_secs: 1.0,
            attempt_timeout_secs: None,
        }
    }

    pub fn reddit() -> Self {
        Self {
            permits: 1,
            window_secs: 15.0,
            max_attempts: 3,
            backoff_min_secs: 15.0,
            backoff_max_secs: 60.0,
            pause_secs: 5.0,
            attempt_timeout_secs: None,
        }
    }

    pub fn window(&self) -> Duration {
        secs(self.window_secs)
    }
    pub fn backoff_min(&self) -> Duration {
        secs(self.backoff_min_secs)
    }
    pub fn backoff_max(&self) -> Duration {
        secs(self.backoff_max_secs)
    }
    pub fn pause(&self) -> Duration {
        secs(self.pause_secs)
    }
    pub fn attempt_timeout(&self) -> Option<Duration> {
        self.attempt_timeout_secs.filter(|s| *s > 0.0).map(secs)
    }

    fn sanitize(&mut self, fallback: SourcePolicy) {
        if self.permits == 0 {
            self.permits = fallback.permits;
        }
        if self.max_attempts == 0 {
            self.max_attempts = 1;
        }
        for (v, d) in [
            (&mut self.window_secs, fallback.window_secs),
            (&mut self.backoff_min_secs, fallback.backoff_min_secs),
            (&mut self.backoff_max_secs, fallback.backoff_max_secs),
            (&mut self.pause_secs, fallback.pause_secs),
        ] {
            if !is_duration_secs(*v) {
                *v = d;
            }
        }
        self.attempt_timeout_secs = self.attempt_timeout_secs.filter(|t| is_duration_secs(*t));
        if self.backoff_min_secs > self.backoff_max_secs {
            std::mem::swap(&mut self.backoff_min_secs, &mut self.backoff_max_secs);
        }
    }
}

/// Finite, non-negative and small enough to fit a `Duration`.
fn is_duration_secs(v: f64) -> bool {
    v >= 0.0 && Duration::try_from_secs_f64(v).is_ok()
}

fn secs(v: f64) -> Duration {
    Duration::try_from_secs_f64(v.max(0.0)).unwrap_or(Duration::MAX)
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct NewsConfig {
    #[serde(flatten)]
    pub overrides: PolicyOverrides,
    #[serde(skip)]
    pub policy: SourcePolicy,
    /// Search page fetched per topic; the topic goes into `q`.
    pub search_url: String,
    /// Open the tool subprocess for news batches too (news itself never calls it).
    pub use_tool_session: bool,
}

impl Default for NewsConfig {
    fn default() -> Self {
        Self {
            overrides: PolicyOverrides::default(),
            policy: SourcePolicy::news(),
            search_url: "https://news.google.com/search".to_string(),
            use_tool_session: false,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RedditConfig {
    #[serde(flatten)]
    pub overrides: PolicyOverrides,
    #[serde(skip)]
    pub policy: SourcePolicy,
    /// Only threads posted after `today - recency_days`.
    pub recency_days: u32,
    pub top_posts: u32,
}

impl Default for RedditConfig {
    fn default() -> Self {
        Self {
            overrides: PolicyOverrides::default(),
            policy: SourcePolicy::reddit(),
            recency_days: 14,
            top_posts: 2,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GeminiConfig {
    /// "ENV" means: read GEMINI_API_KEY
    pub api_key: String,
    pub model: String,
    pub base_url: String,
    pub timeout_secs: u64,
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            api_key: FROM_ENV.to_string(),
            model: "gemini-pro".to_string(),
            base_url: "https://generativelanguage.googleapis.com/v1beta".to_string(),
            timeout_secs: 60,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ScrapeConfig {
    /// "ENV" means: read BRIGHTDATA_API_KEY
    pub api_key: String,
    /// "ENV" means: read BRIGHTDATA_WEB_UNLOCKER_ZONE
    pub zone: String,
    pub endpoint: String,
    pub timeout_secs: u64,
}

impl Default for ScrapeConfig {
    fn default() -> Self {
        Self {
            api_key: FROM_ENV.to_string(),
            zone: FROM_ENV.to_string(),
            endpoint: "https://api.brightdata.com/request".to_string(),
            timeout_secs: 60,
        }
    }
}

/// How to start the tool-providing subprocess.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct McpServerConfig {
    pub command: String,
    pub args: Vec<String>,
    /// "ENV" means: read API_TOKEN
    pub api_token: String,
    /// "ENV" means: read WEB_UNLOCKER_ZONE
    pub zone: String,
    pub request_timeout_secs: u64,
    /// Model/tool round-trips before the agent gives up.
    pub max_agent_steps: usize,
}

impl Default for McpServerConfig {
    fn default() -> Self {
        Self {
            command: "npx".to_string(),
            args: vec!["@brightdata/mcp".to_string()],
            api_token: FROM_ENV.to_string(),
            zone: FROM_ENV.to_string(),
            request_timeout_secs: 120,
            max_agent_steps: 8,
        }
    }
}

impl McpServerConfig {
    /// Environment handed to the subprocess.
    pub fn child_env(&self) -> Vec<(String, String)> {
        vec![
            ("API_TOKEN".to_string(), self.api_token.clone()),
            ("WEB_UNLOCKER_ZONE".to_string(), self.zone.clone()),
        ]
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SpeechConfig {
    /// "ENV" means: read ELEVEN_API_KEY
    pub api_key: String,
    pub voice_id: String,
    pub model_id: String,
    pub output_format: String,
    pub output_dir: PathBuf,
    pub base_url: String,
    pub timeout_secs: u64,
}

impl Default for SpeechConfig {
    fn default() -> Self {
        Self {
            api_key: FROM_ENV.to_string(),
            voice_id: "JBFqnCBsd6RMkjVDRZzb".to_string(),
            model_id: "eleven_multilingual_v2".to_string(),
            output_format: "mp3_44100_128".to_string(),
            output_dir: PathBuf::from("audio"),
            base_url: "https://api.elevenlabs.io/v1".to_string(),
            timeout_secs: 120,
        }
    }
}

impl BriefingConfig {
    /// Parse a TOML file, then resolve "ENV" credentials and sanitize numbers.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let data = fs::read_to_string(path)
            .with_context(|| format!("reading briefing config from {}", path.display()))?;
        Self::from_toml_str(&data)
    }

    pub fn from_toml_str(data: &str) -> Result<Self> {
        let mut cfg: BriefingConfig = toml::from_str(data).context("parsing briefing config")?;
        cfg.finish();
        Ok(cfg)
    }

    /// Load using env var + fallbacks:
    /// 1) $BRIEFING_CONFIG_PATH (must exist)
    /// 2) config/briefing.toml
    /// 3) built-in defaults
    pub fn load_default() -> Result<Self> {
        if let Ok(p) = env::var(ENV_BRIEFING_CONFIG_PATH) {
            let pb = PathBuf::from(p);
            if !pb.exists() {
                anyhow::bail!("{ENV_BRIEFING_CONFIG_PATH} points to non-existent path");
            }
            return Self::load_from_file(&pb);
        }
        let default_path = PathBuf::from(DEFAULT_BRIEFING_CONFIG_PATH);
        if default_path.exists() {
            return Self::load_from_file(&default_path);
        }
        let mut cfg = Self::default();
        cfg.finish();
        Ok(cfg)
    }

    fn finish(&mut self) {
        resolve_env(&mut self.gemini.api_key, ENV_GEMINI_API_KEY);
        resolve_env(&mut self.scrape.api_key, ENV_BRIGHTDATA_API_KEY);
        resolve_env(&mut self.scrape.zone, ENV_BRIGHTDATA_ZONE);
        resolve_env(&mut self.mcp.api_token, ENV_MCP_API_TOKEN);
        resolve_env(&mut self.mcp.zone, ENV_MCP_ZONE);
        resolve_env(&mut self.speech.api_key, ENV_ELEVEN_API_KEY);

        self.news.policy = self.news.overrides.apply(SourcePolicy::news());
        self.news.policy.sanitize(SourcePolicy::news());
        self.reddit.policy = self.reddit.overrides.apply(SourcePolicy::reddit());
        self.reddit.policy.sanitize(SourcePolicy::reddit());
        if self.mcp.max_agent_steps == 0 {
            self.mcp.max_agent_steps = McpServerConfig::default().max_agent_steps;
        }
    }

    /// Credentials every request needs: the model (composition) and speech (rendering).
    pub fn ensure_credentials(&self) -> Result<(), BriefingError> {
        if self.gemini.api_key.trim().is_empty() {
            return Err(BriefingError::Config(format!("Missing {ENV_GEMINI_API_KEY}")));
        }
        if self.speech.api_key.trim().is_empty() {
            return Err(BriefingError::Config(format!("Missing {ENV_ELEVEN_API_KEY}")));
        }
        Ok(())
    }
}

/// Replace an "ENV" placeholder with the env var value, or empty when unset.
fn resolve_env(slot: &mut String, var: &str) {
    if slot.trim().eq_ignore_ascii_case(FROM_ENV) {
        *slot = env::var(var).unwrap_or_default();
    }
}
