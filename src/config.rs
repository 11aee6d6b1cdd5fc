use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;
use anyhow::{Context, Result};
use once_cell::sync::Lazy;
use regex::Regex;

use crate::translate::GenerationOptions;
use crate::utils::chunker::DEFAULT_MAX_CHUNK_CHARS;

static ENV_VAR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\$\{(\w+)\}").expect("env var pattern is valid"));

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub queue: QueueConfig,
    #[serde(default)]
    pub translator: TranslatorConfig,
    #[serde(default)]
    pub export: ExportConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueConfig {
    /// Jobs allowed in `running` at once
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent: usize,
    #[serde(default = "default_max_chunk_chars")]
    pub max_chunk_chars: usize,
    /// How long a cancelled job stays readable before it is purged
    #[serde(default = "default_cancel_grace_secs")]
    pub cancel_grace_secs: u64,
    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,
    /// Purge done/error jobs this long after they finish; unset keeps them
    #[serde(default)]
    pub finished_ttl_secs: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranslatorConfig {
    #[serde(default = "default_service_url")]
    pub service_url: String,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    #[serde(default = "default_source")]
    pub default_source: String,
    #[serde(default = "default_target")]
    pub default_target: String,
    #[serde(default = "default_generation")]
    pub generation: GenerationOptions,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportConfig {
    #[serde(default = "default_filename")]
    pub default_filename: String,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8000
}

fn default_max_concurrent() -> usize {
    2
}

fn default_max_chunk_chars() -> usize {
    DEFAULT_MAX_CHUNK_CHARS
}

fn default_cancel_grace_secs() -> u64 {
    30
}

fn default_sweep_interval_secs() -> u64 {
    5
}

fn default_service_url() -> String {
    "http://127.0.0.1:8001".to_string()
}

fn default_request_timeout_secs() -> u64 {
    300
}

fn default_source() -> String {
    "en".to_string()
}

fn default_target() -> String {
    "zh".to_string()
}

fn default_generation() -> GenerationOptions {
    let mut options = GenerationOptions::new();
    options.insert("num_beams".to_string(), 1.into());
    options.insert("repetition_penalty".to_string(), 1.1.into());
    options.insert("no_repeat_ngram_size".to_string(), 3.into());
    options.insert("encoder_no_repeat_ngram_size".to_string(), 3.into());
    options
}

fn default_filename() -> String {
    "translation".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            max_concurrent: default_max_concurrent(),
            max_chunk_chars: default_max_chunk_chars(),
            cancel_grace_secs: default_cancel_grace_secs(),
            sweep_interval_secs: default_sweep_interval_secs(),
            finished_ttl_secs: None,
        }
    }
}

impl QueueConfig {
    pub fn cancel_grace(&self) -> Duration {
        Duration::from_secs(self.cancel_grace_secs)
    }

    pub fn finished_ttl(&self) -> Option<Duration> {
        self.finished_ttl_secs.map(Duration::from_secs)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs.max(1))
    }
}

impl Default for TranslatorConfig {
    fn default() -> Self {
        Self {
            service_url: default_service_url(),
            request_timeout_secs: default_request_timeout_secs(),
            default_source: default_source(),
            default_target: default_target(),
            generation: default_generation(),
        }
    }
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            default_filename: default_filename(),
        }
    }
}

impl Config {
    /// Load a YAML or JSON config file, picked by extension
    pub fn load(path: &str) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path))?;
        let content = substitute_env_vars(&content);

        let path_lower = path.to_lowercase();
        let config: Config = if path_lower.ends_with(".json") {
            serde_json::from_str(&content)?
        } else {
            serde_yaml::from_str(&content)?
        };

        config.validate()?;
        Ok(config)
    }

    /// Try `$CONFIG_PATH`, then the default file names; fall back to
    /// built-in defaults when nothing is found
    pub fn discover() -> Result<(Self, Option<String>)> {
        let candidates: Vec<String> = vec![
            std::env::var("CONFIG_PATH").ok(),
            Some("conf.yaml".to_string()),
            Some("conf.json".to_string()),
        ]
        .into_iter()
        .flatten()
        .collect();

        let mut loaded = None;
        for path in candidates {
            if !Path::new(&path).exists() {
                tracing::debug!("No config at {}", path);
                continue;
            }
            loaded = Some((Config::load(&path)?, Some(path)));
            break;
        }

        let (mut config, path) = match loaded {
            Some(found) => found,
            None => (Config::default(), None),
        };

        if let Ok(url) = std::env::var("TRANSLATOR_SERVICE_URL") {
            config.translator.service_url = url;
        }

        Ok((config, path))
    }

    pub fn validate(&self) -> Result<()> {
        if self.queue.max_concurrent == 0 {
            anyhow::bail!("queue.max_concurrent must be at least 1");
        }
        if self.queue.max_chunk_chars == 0 {
            anyhow::bail!("queue.max_chunk_chars must be at least 1");
        }
        Ok(())
    }
}

/// Replace `${VAR_NAME}` with the environment value, leaving unknown ones as-is
fn substitute_env_vars(content: &str) -> String {
    ENV_VAR
        .replace_all(content, |caps: &regex::Captures| {
            std::env::var(&caps[1]).unwrap_or_else(|_| caps[0].to_string())
        })
        .into_owned()
}
