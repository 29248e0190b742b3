//! Configuration for the galaxy engine.
//!
//! Configuration sources (highest priority first):
//! 1. Environment variables (GALAXY_HOME, GALAXY_STORE, GALAXY_NAMESPACE)
//! 2. Config file (.galaxy/config.yaml)
//! 3. Defaults (~/.galaxy)
//!
//! Config file discovery:
//! - Searches current directory and parents for .galaxy/config.yaml
//! - Paths in the config file are relative to the .galaxy/ directory
//!
//! The resolved configuration is a plain value: load it once in `main` and
//! pass it down.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::domain::DEFAULT_NAMESPACE;

/// Raw config file schema (matches YAML structure)
#[derive(Debug, Clone, Deserialize)]
pub struct ConfigFile {
    pub version: String,
    #[serde(default)]
    pub paths: PathsConfig,
    #[serde(default)]
    pub controller: Option<ControllerConfig>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PathsConfig {
    /// Engine state directory (relative to .galaxy/)
    pub home: Option<String>,
    /// Record store directory (relative to .galaxy/)
    pub store: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ControllerConfig {
    pub namespace: Option<String>,
    pub workers: Option<usize>,
    pub requeue_after_seconds: Option<u64>,
    pub resync_interval_seconds: Option<u64>,
    pub debounce_millis: Option<u64>,
}

/// Resolved configuration with absolute paths
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    /// Absolute path to galaxy home (engine state)
    pub home: PathBuf,
    /// Absolute path to the record store
    pub store: PathBuf,
    /// Path to config file (if found)
    pub config_file: Option<PathBuf>,
    /// Controller runtime settings
    pub controller: ControllerSettings,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControllerSettings {
    /// Namespace used when a command does not name one
    pub namespace: String,
    /// Concurrent reconcile workers
    pub workers: usize,
    /// Fixed delay before a failed request is retried
    pub requeue_after_seconds: u64,
    /// Interval between full resyncs (every record re-enqueued, one GC pass)
    pub resync_interval_seconds: u64,
    /// Debounce window for store file events
    pub debounce_millis: u64,
}

impl Default for ControllerSettings {
    fn default() -> Self {
        Self {
            namespace: DEFAULT_NAMESPACE.to_string(),
            workers: 2,
            requeue_after_seconds: 5,
            resync_interval_seconds: 300,
            debounce_millis: 500,
        }
    }
}

impl ControllerSettings {
    pub fn requeue_after(&self) -> Duration {
        Duration::from_secs(self.requeue_after_seconds)
    }

    pub fn resync_interval(&self) -> Duration {
        Duration::from_secs(self.resync_interval_seconds)
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_millis)
    }

    fn merge(mut self, file: &ControllerConfig) -> Self {
        if let Some(ref namespace) = file.namespace {
            self.namespace = namespace.clone();
        }
        if let Some(workers) = file.workers {
            self.workers = workers.max(1);
        }
        if let Some(secs) = file.requeue_after_seconds {
            self.requeue_after_seconds = secs;
        }
        if let Some(secs) = file.resync_interval_seconds {
            self.resync_interval_seconds = secs.max(1);
        }
        if let Some(millis) = file.debounce_millis {
            self.debounce_millis = millis;
        }
        self
    }
}

/// Find config file by searching a directory and its parents
fn find_config_file(start: &Path) -> Option<PathBuf> {
    let mut current = start.to_path_buf();

    loop {
        let config_path = current.join(".galaxy").join("config.yaml");
        if config_path.exists() {
            return Some(config_path);
        }

        if !current.pop() {
            break;
        }
    }

    None
}

/// Load and parse config file
fn load_config_file(path: &Path) -> Result<ConfigFile> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    serde_yaml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))
}

/// Resolve a path that may be relative to the config file's directory
fn resolve_path(base: &Path, path_str: &str) -> PathBuf {
    let path = PathBuf::from(path_str);
    if path.is_absolute() {
        path
    } else {
        base.join(path)
            .canonicalize()
            .unwrap_or_else(|_| base.join(path_str))
    }
}

/// Environment overrides, read once so resolution itself stays pure
#[derive(Debug, Clone, Default)]
struct EnvOverrides {
    home: Option<String>,
    store: Option<String>,
    namespace: Option<String>,
}

impl EnvOverrides {
    fn from_env() -> Self {
        Self {
            home: std::env::var("GALAXY_HOME").ok(),
            store: std::env::var("GALAXY_STORE").ok(),
            namespace: std::env::var("GALAXY_NAMESPACE").ok(),
        }
    }
}

fn resolve(
    config_file: Option<PathBuf>,
    env: EnvOverrides,
    default_home: PathBuf,
) -> Result<ResolvedConfig> {
    let mut controller = ControllerSettings::default();

    let (home, store) = if let Some(ref config_path) = config_file {
        let config = load_config_file(config_path)?;
        let galaxy_dir = config_path.parent().unwrap_or(Path::new("."));

        let home = match (&env.home, &config.paths.home) {
            (Some(env_home), _) => PathBuf::from(env_home),
            (None, Some(home_path)) => resolve_path(galaxy_dir, home_path),
            (None, None) => default_home,
        };

        let store = match (&env.store, &config.paths.store) {
            (Some(env_store), _) => PathBuf::from(env_store),
            (None, Some(store_path)) => resolve_path(galaxy_dir, store_path),
            (None, None) => home.join("store"),
        };

        if let Some(ref file) = config.controller {
            controller = controller.merge(file);
        }

        (home, store)
    } else {
        let home = env.home.as_ref().map(PathBuf::from).unwrap_or(default_home);
        let store = env
            .store
            .as_ref()
            .map(PathBuf::from)
            .unwrap_or_else(|| home.join("store"));
        (home, store)
    };

    if let Some(namespace) = env.namespace {
        controller.namespace = namespace;
    }

    Ok(ResolvedConfig {
        home,
        store,
        config_file,
        controller,
    })
}

/// Load configuration from all sources
pub fn load_config() -> Result<ResolvedConfig> {
    let default_home = dirs::home_dir()
        .context("Failed to determine home directory")?
        .join(".galaxy");
    let cwd = std::env::current_dir().context("Failed to determine current directory")?;

    resolve(find_config_file(&cwd), EnvOverrides::from_env(), default_home)
}

/// Load configuration from an explicit config file (environment still wins)
pub fn load_config_from(path: &Path) -> Result<ResolvedConfig> {
    let default_home = dirs::home_dir()
        .context("Failed to determine home directory")?
        .join(".galaxy");

    resolve(
        Some(path.to_path_buf()),
        EnvOverrides::from_env(),
        default_home,
    )
}
