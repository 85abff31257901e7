use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use config::{Environment, File};
use serde::Deserialize;

use crate::error::ConfigError;

const ENV_PREFIX: &str = "DASHBOARD";
const CONFIG_FILE: &str = "dashboard";
// Credential names understood besides DASHBOARD_API_KEY
const FALLBACK_KEY_VARS: [&str; 2] = ["API_KEY", "GEMINI_API_KEY"];

#[derive(Debug, Deserialize)]
struct RawConfig {
    host: String,
    port: u16,
    #[serde(default)]
    api_key: Option<String>,
    model: String,
    base_url: String,
    timeout_secs: u64,
    sample_limit: usize,
    #[serde(default)]
    roster_csv: Option<String>,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub api_key: Option<String>,
    pub model: String,
    pub base_url: String,
    pub request_timeout: Duration,
    pub sample_limit: usize,
    pub roster_csv: Option<PathBuf>,
}

impl Config {
    /// Loads defaults, then `dashboard.toml` if present, then `DASHBOARD_*`
    /// environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        let vars: HashMap<String, String> = std::env::vars().collect();
        Self::load(vars, true)
    }

    /// Same layering as [`Config::from_env`] but over an explicit variable
    /// map and without the config file.
    pub fn from_vars(vars: HashMap<String, String>) -> Result<Self, ConfigError> {
        Self::load(vars, false)
    }

    fn load(vars: HashMap<String, String>, read_file: bool) -> Result<Self, ConfigError> {
        let fallback_key = FALLBACK_KEY_VARS
            .iter()
            .filter_map(|name| vars.get(*name))
            .find(|value| !value.trim().is_empty())
            .cloned();

        let mut builder = config::Config::builder()
            .set_default("host", "127.0.0.1")?
            .set_default("port", 8080)?
            .set_default("model", "gemini-2.5-flash")?
            .set_default("base_url", "https://generativelanguage.googleapis.com/v1beta")?
            .set_default("timeout_secs", 30)?
            .set_default("sample_limit", 50)?;

        if read_file {
            builder = builder.add_source(File::with_name(CONFIG_FILE).required(false));
        }

        let raw: RawConfig = builder
            .add_source(Environment::with_prefix(ENV_PREFIX).source(Some(vars)))
            .build()?
            .try_deserialize()?;

        let non_blank = |value: Option<String>| {
            value
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        Ok(Self {
            host: raw.host,
            port: raw.port,
            api_key: non_blank(raw.api_key).or(fallback_key.map(|k| k.trim().to_string())),
            model: raw.model,
            base_url: raw.base_url.trim_end_matches('/').to_string(),
            request_timeout: Duration::from_secs(raw.timeout_secs),
            sample_limit: raw.sample_limit,
            roster_csv: non_blank(raw.roster_csv).map(PathBuf::from),
        })
    }

    pub fn bind_addr(&self) -> (String, u16) {
        (self.host.clone(), self.port)
    }
}
