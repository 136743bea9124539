//! Layered configuration loader and path helpers.
//!
//! Uses Figment to merge typed defaults, `config.toml`, `config.<env>.toml`,
//! `CHROMADB_CLOUD_*` credentials and `APP_*` env vars (`__` nests keys, e.g.
//! `APP_SEARCH__MAX_RESULTS`). Provides helpers to expand `~` and `${VAR}` and
//! to resolve relative paths against a known base directory.

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::env;
use std::fmt;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

pub struct Config {
    figment: Figment,
    env_name: String,
}

impl Config {
    pub fn load() -> anyhow::Result<Self> {
        let env_name = env::var("RUST_ENV").unwrap_or_else(|_| "dev".to_string());
        Self::load_for_env(&env_name)
    }

    pub fn load_for_env(env_name: &str) -> anyhow::Result<Self> {
        let mut figment = Figment::from(Serialized::defaults(Settings::default()))
            .merge(Toml::file("config.toml"));
        match env_name {
            "dev" | "development" => figment = figment.merge(Toml::file("config.dev.toml")),
            "prod" | "production" => figment = figment.merge(Toml::file("config.prod.toml")),
            "test" | "testing" => figment = figment.merge(Toml::file("config.test.toml")),
            _ => {}
        }
        figment = figment
            .merge(Env::prefixed("CHROMADB_CLOUD_").map(|key| format!("index.chroma.{key}").into()))
            .merge(Env::prefixed("APP_").split("__"));

        let config = Self { figment, env_name: env_name.to_string() };
        config.settings()?;
        Ok(config)
    }

    pub fn get<T>(&self, key: &str) -> anyhow::Result<T>
    where
        T: serde::de::DeserializeOwned,
    {
        self.figment
            .extract_inner(key)
            .map_err(|e| anyhow::anyhow!("Failed to get '{}': {}", key, e))
    }

    /// The fully merged and validated settings tree.
    pub fn settings(&self) -> Result<Settings> {
        let settings: Settings =
            self.figment.extract().map_err(|e| Error::InvalidConfig(e.to_string()))?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn env_name(&self) -> &str {
        &self.env_name
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub search: SearchSettings,
    pub index: IndexSettings,
    pub models: ModelSettings,
    pub server: ServerSettings,
}

impl Settings {
    pub fn validate(&self) -> Result<()> {
        let s = &self.search;
        if s.max_results == 0 || s.max_rerank_results == 0 {
            return Err(Error::InvalidConfig("search maxima must be positive".into()));
        }
        if s.default_results > s.max_results {
            return Err(Error::InvalidConfig(format!(
                "search.default_results ({}) exceeds search.max_results ({})",
                s.default_results, s.max_results
            )));
        }
        if s.default_rerank_results > s.max_rerank_results {
            return Err(Error::InvalidConfig(format!(
                "search.default_rerank_results ({}) exceeds search.max_rerank_results ({})",
                s.default_rerank_results, s.max_rerank_results
            )));
        }
        if self.index.collection.trim().is_empty() {
            return Err(Error::InvalidConfig("index.collection is empty".into()));
        }
        if self.index.backend == IndexBackend::Chroma {
            let c = &self.index.chroma;
            if c.tenant.trim().is_empty() || c.database.trim().is_empty() {
                return Err(Error::InvalidConfig(
                    "chroma backend needs index.chroma.tenant and index.chroma.database".into(),
                ));
            }
        }
        if self.models.batch_size == 0 || self.models.max_len < 8 {
            return Err(Error::InvalidConfig(
                "models.batch_size must be > 0 and models.max_len >= 8".into(),
            ));
        }
        self.server.socket_addr()?;
        Ok(())
    }
}

/// Result-count limits. Requests above a maximum are clamped, never rejected.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchSettings {
    pub max_results: usize,
    pub max_rerank_results: usize,
    pub default_results: usize,
    pub default_rerank_results: usize,
}

impl Default for SearchSettings {
    fn default() -> Self {
        Self {
            max_results: 200,
            max_rerank_results: 200,
            default_results: 10,
            default_rerank_results: 10,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IndexBackend {
    #[default]
    Lance,
    Chroma,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexSettings {
    pub backend: IndexBackend,
    /// Lance table name or Chroma collection name.
    pub collection: String,
    pub lance: LanceSettings,
    pub chroma: ChromaSettings,
}

impl Default for IndexSettings {
    fn default() -> Self {
        Self {
            backend: IndexBackend::Lance,
            collection: "atp".to_string(),
            lance: LanceSettings::default(),
            chroma: ChromaSettings::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LanceSettings {
    pub uri: String,
}

impl Default for LanceSettings {
    fn default() -> Self {
        Self { uri: "~/.local/share/atp/lancedb".to_string() }
    }
}

impl LanceSettings {
    /// Local paths are expanded; `s3://`-style URIs pass through untouched.
    pub fn resolved_uri(&self, base: &Path) -> String {
        if self.uri.contains("://") {
            return self.uri.clone();
        }
        resolve_with_base(base, &self.uri).to_string_lossy().into_owned()
    }
}

#[derive(Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChromaSettings {
    pub url: String,
    pub tenant: String,
    pub database: String,
    pub api_key: String,
    pub timeout_secs: u64,
}

impl Default for ChromaSettings {
    fn default() -> Self {
        Self {
            url: "https://api.trychroma.com".to_string(),
            tenant: String::new(),
            database: String::new(),
            api_key: String::new(),
            timeout_secs: 30,
        }
    }
}

impl fmt::Debug for ChromaSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChromaSettings")
            .field("url", &self.url)
            .field("tenant", &self.tenant)
            .field("database", &self.database)
            .field("api_key", &if self.api_key.is_empty() { "" } else { "<redacted>" })
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelSettings {
    /// Sentence-embedding model directory (config.json, tokenizer.json, weights).
    pub embedder_dir: String,
    /// Cross-encoder model directory, same layout.
    pub reranker_dir: String,
    pub max_len: usize,
    pub batch_size: usize,
}

impl Default for ModelSettings {
    fn default() -> Self {
        Self {
            embedder_dir: "models/all-MiniLM-L6-v2".to_string(),
            reranker_dir: "models/ms-marco-MiniLM-L6-v2".to_string(),
            max_len: 512,
            batch_size: 32,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub bind: String,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self { bind: "127.0.0.1:8000".to_string() }
    }
}

impl ServerSettings {
    pub fn socket_addr(&self) -> Result<SocketAddr> {
        self.bind
            .parse()
            .map_err(|e| Error::InvalidConfig(format!("server.bind '{}': {}", self.bind, e)))
    }
}

/// Expand a user-provided path string:
/// - Expands leading '~' to the user's home directory
/// - Expands ${VAR} and $VAR environment variables
/// - Returns a PathBuf without attempting to canonicalize
pub fn expand_path<S: AsRef<str>>(input: S) -> PathBuf {
    let s = input.as_ref();
    let expanded_env = shellexpand::env(s).unwrap_or(std::borrow::Cow::Borrowed(s));
    let expanded = shellexpand::tilde(&expanded_env);
    PathBuf::from(expanded.as_ref())
}

/// Resolve a possibly relative path against a given base directory after expansion.
/// If `p` is absolute, it's returned as-is; otherwise `base.join(p)` is returned.
pub fn resolve_with_base<S: AsRef<str>>(base: &Path, p: S) -> PathBuf {
    let p = expand_path(p);
    if p.is_absolute() { p } else { base.join(p) }
}
