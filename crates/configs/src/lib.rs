use std::collections::HashMap;
use std::path::PathBuf;

use anyhow::{anyhow, Result};
use serde::Deserialize;
use tracing::{debug, warn};

/// Env file loaded before the deployment-specific one; holds shipped defaults.
pub const DIST_ENV_FILE: &str = ".env.dist";

#[derive(Debug, Clone, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub auth: AuthConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default)]
    pub worker_threads: Option<usize>,
    /// Address of the admin listener (`/healthz`, `/metrics`); disabled when unset.
    #[serde(default)]
    pub metrics_addr: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { host: default_host(), port: default_port(), worker_threads: Some(4), metrics_addr: None }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_storage_dir")]
    pub directory: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self { directory: default_storage_dir() }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_credential")]
    pub username: String,
    #[serde(default = "default_credential")]
    pub password: String,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self { enabled: false, username: default_credential(), password: default_credential() }
    }
}

fn default_host() -> String { "127.0.0.1".into() }
fn default_port() -> u16 { 8080 }
fn default_storage_dir() -> PathBuf { PathBuf::from("./store") }
fn default_credential() -> String { "admin".into() }

/// Load env files into the process environment.
///
/// Variables already set in the environment are never overwritten, so the
/// effective precedence is: process env > `env_file` > `.env.dist`.
pub fn load_env_files(env_file: &str) {
    for file in [env_file, DIST_ENV_FILE] {
        match dotenvy::from_filename(file) {
            Ok(path) => debug!(path = %path.display(), "env file loaded"),
            Err(e) if e.not_found() => debug!(%file, "env file not present"),
            Err(e) => warn!(%file, error = %e, "error while reading env file"),
        }
    }
}

/// Env file named by `TF_ENV_FILE`, `.env` when unset.
pub fn env_file_name() -> String {
    std::env::var("TF_ENV_FILE").unwrap_or_else(|_| ".env".to_string())
}

/// Read the optional TOML file at `CONFIG_PATH` (default `config.toml`).
/// A missing file yields the built-in defaults.
pub fn load_default() -> Result<AppConfig> {
    let path = std::env::var("CONFIG_PATH").unwrap_or_else(|_| "config.toml".to_string());
    if !std::path::Path::new(&path).exists() {
        debug!(%path, "config file not found; using defaults");
        return Ok(AppConfig::default());
    }
    load_from_file(&path)
}

pub fn load_from_file(path: &str) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| anyhow!("cannot read {path}: {e}"))?;
    let cfg: AppConfig = toml::from_str(&content)?;
    Ok(cfg)
}

impl AppConfig {
    /// TOML file, then `TF_*` environment overrides, then validation.
    /// Env files are expected to be loaded already (see [`load_env_files`]).
    pub fn load_and_validate() -> Result<Self> {
        let mut cfg = load_default()?;
        cfg.apply_env_with(|key| std::env::var(key).ok())?;
        cfg.normalize_and_validate()?;
        Ok(cfg)
    }

    /// Override fields from `TF_*` variables resolved through `lookup`.
    pub fn apply_env_with<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(dir) = lookup("TF_STORAGE_DIR") {
            self.storage.directory = PathBuf::from(dir);
        }
        if let Some(v) = lookup("TF_AUTH_ENABLED") {
            self.auth.enabled = parse_bool(&v).ok_or_else(|| anyhow!("TF_AUTH_ENABLED is not a boolean: {v}"))?;
        }
        if let Some(v) = lookup("TF_USERNAME") {
            self.auth.username = v;
        }
        if let Some(v) = lookup("TF_PASSWORD") {
            self.auth.password = v;
        }
        if let Some(v) = lookup("TF_PORT") {
            self.server.port = v.trim().parse().map_err(|_| anyhow!("TF_PORT is not a valid port: {v}"))?;
        }
        if let Some(v) = lookup("TF_IP") {
            self.server.host = v;
        }
        if let Some(v) = lookup("TF_WORKER_THREADS") {
            self.server.worker_threads =
                Some(v.trim().parse().map_err(|_| anyhow!("TF_WORKER_THREADS is not a number: {v}"))?);
        }
        if let Some(v) = lookup("TF_METRICS_ADDR") {
            self.server.metrics_addr = if v.trim().is_empty() { None } else { Some(v) };
        }
        Ok(())
    }

    pub fn normalize_and_validate(&mut self) -> Result<()> {
        self.server.normalize()?;
        if self.storage.directory.as_os_str().is_empty() {
            return Err(anyhow!("storage.directory must not be empty"));
        }
        if self.auth.enabled && (self.auth.username.is_empty() || self.auth.password.is_empty()) {
            return Err(anyhow!("auth is enabled but username or password is empty"));
        }
        Ok(())
    }

    /// Credentials accepted by the basic-auth middleware, `username -> password`.
    pub fn auth_map(&self) -> HashMap<String, String> {
        let mut map = HashMap::new();
        map.insert(self.auth.username.clone(), self.auth.password.clone());
        map
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

impl ServerConfig {
    fn normalize(&mut self) -> Result<()> {
        if self.host.trim().is_empty() {
            self.host = default_host();
        }
        if self.port == 0 {
            return Err(anyhow!("server.port must be within 1..=65535"));
        }
        match self.worker_threads {
            Some(0) | None => self.worker_threads = Some(4),
            Some(_) => {}
        }
        Ok(())
    }
}

fn parse_bool(v: &str) -> Option<bool> {
    match v.trim().to_ascii_lowercase().as_str() {
        "1" | "t" | "true" | "yes" | "on" => Some(true),
        "0" | "f" | "false" | "no" | "off" | "" => Some(false),
        _ => None,
    }
}
