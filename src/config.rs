//! # Configuration Module
//!
//! Loads provider credentials and endpoints from the environment (and a
//! `.env` file) into one [`Config`] value. Provider constructors read it;
//! the pipeline stages never do.

use std::env;
use std::time::Duration;

use anyhow::{Context, Result};
use tracing::{info, warn};

use crate::llm::gemini::DEFAULT_GEMINI_MODEL;
use crate::llm::groq::DEFAULT_GROQ_MODEL;
use crate::llm::ollama::DEFAULT_OLLAMA_HOST;

/// Backend used for the DuckDuckGo image proxy and the health probe.
pub const DEFAULT_API_URL: &str = "http://localhost:8002";

/// Prefixes front-end tooling adds to environment variable names.
const ENV_PREFIXES: [&str; 3] = ["", "VITE_", "REACT_APP_"];

// =============================================================================
// CONFIGURATION STRUCT
// =============================================================================
/// Credentials and endpoints for every capability provider.
///
/// A `None` key means the matching provider is left out of its fallback chain.
#[derive(Debug, Clone)]
pub struct Config {
    /// Google Gemini key (`API_KEY` or `GOOGLE_API_KEY`)
    pub google_api_key: Option<String>,
    pub groq_api_key: Option<String>,
    pub huggingface_api_key: Option<String>,
    pub tavily_api_key: Option<String>,
    pub pexels_api_key: Option<String>,
    pub unsplash_access_key: Option<String>,

    /// Backend base URL (`API_URL`)
    pub api_url: Option<String>,

    pub gemini_model: String,
    pub groq_model: String,

    /// Setting `OLLAMA_MODEL` enables the local Ollama provider
    pub ollama_model: Option<String>,
    pub ollama_host: String,

    /// Per-request HTTP timeout in seconds
    pub request_timeout_secs: u64,

    /// Log level for the application
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            google_api_key: None,
            groq_api_key: None,
            huggingface_api_key: None,
            tavily_api_key: None,
            pexels_api_key: None,
            unsplash_access_key: None,
            api_url: None,
            gemini_model: DEFAULT_GEMINI_MODEL.to_string(),
            groq_model: DEFAULT_GROQ_MODEL.to_string(),
            ollama_model: None,
            ollama_host: DEFAULT_OLLAMA_HOST.to_string(),
            request_timeout_secs: 30,
            log_level: "info".to_string(),
        }
    }
}

// =============================================================================
// CONFIGURATION LOADING
// =============================================================================
impl Config {
    /// Load configuration from environment variables, reading `.env` first
    /// if one exists.
    pub fn from_env() -> Result<Self> {
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build a configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| -> Option<String> {
            ENV_PREFIXES
                .iter()
                .find_map(|prefix| lookup(&format!("{prefix}{key}")).and_then(|v| clean_value(&v)))
        };

        let mut config = Config {
            google_api_key: get("API_KEY").or_else(|| get("GOOGLE_API_KEY")),
            groq_api_key: get("GROQ_API_KEY"),
            huggingface_api_key: get("HUGGINGFACE_API_KEY"),
            tavily_api_key: get("TAVILY_API_KEY"),
            pexels_api_key: get("PEXELS_API_KEY"),
            unsplash_access_key: get("UNSPLASH_ACCESS_KEY"),
            api_url: get("API_URL"),
            ollama_model: get("OLLAMA_MODEL"),
            ..Config::default()
        };

        if let Some(val) = get("GEMINI_MODEL") {
            config.gemini_model = val;
        }

        if let Some(val) = get("GROQ_MODEL") {
            config.groq_model = val;
        }

        if let Some(val) = get("OLLAMA_API_BASE_URL") {
            config.ollama_host = val;
        }

        if let Some(val) = get("REQUEST_TIMEOUT_SECS") {
            config.request_timeout_secs = val
                .parse()
                .context("REQUEST_TIMEOUT_SECS must be a valid positive integer")?;
        }

        if let Some(val) = get("RUST_LOG") {
            config.log_level = val;
        }

        Ok(config)
    }

    /// Validate the configuration before any provider is built.
    pub fn validate(&self) -> Result<()> {
        if self.request_timeout_secs == 0 {
            anyhow::bail!("REQUEST_TIMEOUT_SECS must be at least 1");
        }

        if !self.has_text_generation() {
            anyhow::bail!(
                "Missing API Key. Please add GOOGLE_API_KEY (or GROQ_API_KEY, HUGGINGFACE_API_KEY, OLLAMA_MODEL) to your .env file."
            );
        }

        Ok(())
    }

    pub fn has_text_generation(&self) -> bool {
        self.google_api_key.is_some()
            || self.groq_api_key.is_some()
            || self.huggingface_api_key.is_some()
            || self.ollama_model.is_some()
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn api_base_url(&self) -> &str {
        self.api_url
            .as_deref()
            .unwrap_or(DEFAULT_API_URL)
            .trim_end_matches('/')
    }

    /// Full backend URL for `endpoint`, with exactly one `/` between the parts.
    pub fn backend_url(&self, endpoint: &str) -> String {
        format!("{}/{}", self.api_base_url(), endpoint.trim_start_matches('/'))
    }

    /// Log which credentials were found. Key values are never logged.
    pub fn log_status(&self) {
        let status = |key: &Option<String>| if key.is_some() { "loaded" } else { "missing" };

        info!(
            google = status(&self.google_api_key),
            groq = status(&self.groq_api_key),
            huggingface = status(&self.huggingface_api_key),
            tavily = status(&self.tavily_api_key),
            pexels = status(&self.pexels_api_key),
            unsplash = status(&self.unsplash_access_key),
            ollama = self.ollama_model.as_deref().unwrap_or("disabled"),
            "Provider credentials"
        );

        match &self.api_url {
            Some(url) => info!(api_url = %url, "Backend API URL"),
            None => warn!(api_url = DEFAULT_API_URL, "API_URL not set, using default"),
        }
    }
}

/// Strip quotes users paste into `.env` files; empty means unset.
fn clean_value(raw: &str) -> Option<String> {
    let cleaned: String = raw.chars().filter(|c| *c != '"' && *c != '\'').collect();
    let cleaned = cleaned.trim();
    (!cleaned.is_empty()).then(|| cleaned.to_string())
}
