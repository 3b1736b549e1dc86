//! Runtime configuration from environment variables (and an optional `.env`).

use std::net::IpAddr;
use std::path::PathBuf;

use anyhow::{anyhow, Context, Result};

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub dictionary_path: PathBuf,
    pub cache: CacheConfig,
    pub generator: GeneratorConfig,
    pub log_format: LogFormat,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: IpAddr,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: IpAddr::from([0, 0, 0, 0]),
            port: 5000,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheBackendKind {
    Json,
    Sqlite,
}

#[derive(Debug, Clone)]
pub struct CacheConfig {
    pub backend: CacheBackendKind,
    pub path: PathBuf,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            backend: CacheBackendKind::Json,
            path: PathBuf::from("data/cache.json"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct GeneratorConfig {
    pub api_key: Option<String>,
    pub base_url: String,
    pub model: String,
    pub timeout_secs: u64,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: "https://api.deepseek.com".to_string(),
            model: "deepseek-chat".to_string(),
            timeout_secs: 60,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            dictionary_path: PathBuf::from("data/dictionary.json"),
            cache: CacheConfig::default(),
            generator: GeneratorConfig::default(),
            log_format: LogFormat::default(),
        }
    }
}

impl AppConfig {
    /// Read `.env` if present, then the process environment.
    pub fn from_env() -> Result<Self> {
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build config from an arbitrary key lookup. Unset keys take defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let mut config = AppConfig::default();

        if let Some(host) = get("HOST") {
            config.server.host = host
                .trim()
                .parse()
                .with_context(|| format!("HOST must be an IP address, got {host:?}"))?;
        }
        if let Some(port) = get("PORT") {
            config.server.port = port
                .trim()
                .parse()
                .with_context(|| format!("PORT must be a valid port number, got {port:?}"))?;
        }
        if let Some(path) = get("DICTIONARY_PATH") {
            config.dictionary_path = PathBuf::from(path);
        }
        if let Some(path) = get("CACHE_PATH") {
            config.cache.path = PathBuf::from(path);
        }
        if let Some(backend) = get("CACHE_BACKEND") {
            config.cache.backend = match backend.trim().to_ascii_lowercase().as_str() {
                "json" => CacheBackendKind::Json,
                "sqlite" => CacheBackendKind::Sqlite,
                other => return Err(anyhow!("CACHE_BACKEND must be json or sqlite, got {other:?}")),
            };
        }
        config.generator.api_key = get("DEEPSEEK_API_KEY");
        if let Some(url) = get("GENERATOR_BASE_URL") {
            config.generator.base_url = url;
        }
        if let Some(model) = get("GENERATOR_MODEL") {
            config.generator.model = model;
        }
        if let Some(secs) = get("GENERATOR_TIMEOUT_SECS") {
            config.generator.timeout_secs = secs.trim().parse().with_context(|| {
                format!("GENERATOR_TIMEOUT_SECS must be a whole number, got {secs:?}")
            })?;
        }
        if let Some(format) = get("LOG_FORMAT") {
            config.log_format = match format.trim().to_ascii_lowercase().as_str() {
                "text" => LogFormat::Text,
                "json" => LogFormat::Json,
                other => return Err(anyhow!("LOG_FORMAT must be text or json, got {other:?}")),
            };
        }

        Ok(config)
    }
}
