/*
 * Manages the process-wide runtime configuration: which backend is active, the
 * real backend's base endpoint and timeout, and the simulated backend's latency
 * and failure knobs. The configuration is loaded once at start, merged with the
 * compiled-in defaults, and re-persisted on every change through the single
 * `ConfigStore::update_config` entry point.
 *
 * Persistence goes through the `ConfigStorageOperations` trait so the blob can
 * live in a file (the default `FileConfigStorage`) or in a test double. The blob
 * itself is a JSON object stored under a well-known key.
 */
use crate::core::path_utils;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;

pub const CONFIG_STORAGE_KEY: &str = "media_shelf.runtime_config";
pub const DEFAULT_BASE_ENDPOINT: &str = "http://localhost:3000/api";

#[derive(Debug)]
pub enum ConfigError {
    Io(io::Error),
    Serde(serde_json::Error),
    NoConfigDirectory,
    InvalidValue(String),
}

impl From<io::Error> for ConfigError {
    fn from(err: io::Error) -> Self {
        ConfigError::Io(err)
    }
}

impl From<serde_json::Error> for ConfigError {
    fn from(err: serde_json::Error) -> Self {
        ConfigError::Serde(err)
    }
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "Configuration I/O error: {e}"),
            ConfigError::Serde(e) => write!(f, "Configuration JSON error: {e}"),
            ConfigError::NoConfigDirectory => {
                write!(f, "Could not determine a directory for the configuration")
            }
            ConfigError::InvalidValue(reason) => write!(f, "Invalid configuration value: {reason}"),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::Io(e) => Some(e),
            ConfigError::Serde(e) => Some(e),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, ConfigError>;

/* Latency bounds for the simulated backend, in milliseconds. */
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimulatedDelay {
    pub min: u64,
    pub max: u64,
    pub fixed: Option<u64>,
}

impl Default for SimulatedDelay {
    fn default() -> Self {
        SimulatedDelay {
            min: 200,
            max: 800,
            fixed: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuntimeConfig {
    pub use_real_backend: bool,
    pub base_endpoint: String,
    pub simulated_delay: SimulatedDelay,
    pub simulated_error_rate: f64,
    pub request_timeout_ms: u64,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        RuntimeConfig {
            use_real_backend: false,
            base_endpoint: DEFAULT_BASE_ENDPOINT.to_string(),
            simulated_delay: SimulatedDelay::default(),
            simulated_error_rate: 0.05,
            request_timeout_ms: 10_000,
        }
    }
}

impl RuntimeConfig {
    pub fn validate(&self) -> Result<()> {
        if !self.simulated_error_rate.is_finite()
            || !(0.0..=1.0).contains(&self.simulated_error_rate)
        {
            return Err(ConfigError::InvalidValue(format!(
                "simulatedErrorRate must be within [0, 1], got {}",
                self.simulated_error_rate
            )));
        }
        if self.simulated_delay.min > self.simulated_delay.max {
            return Err(ConfigError::InvalidValue(format!(
                "simulatedDelay.min ({}) exceeds simulatedDelay.max ({})",
                self.simulated_delay.min, self.simulated_delay.max
            )));
        }
        if self.base_endpoint.trim().is_empty() {
            return Err(ConfigError::InvalidValue(
                "baseEndpoint must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

/*
 * A partial configuration. Every `Some` field replaces the corresponding field of
 * the current configuration; `simulated_delay` is replaced as a whole.
 */
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConfigPatch {
    pub use_real_backend: Option<bool>,
    pub base_endpoint: Option<String>,
    pub simulated_delay: Option<SimulatedDelay>,
    pub simulated_error_rate: Option<f64>,
    pub request_timeout_ms: Option<u64>,
}

impl ConfigPatch {
    pub fn apply_to(&self, config: &RuntimeConfig) -> RuntimeConfig {
        let mut merged = config.clone();
        if let Some(v) = self.use_real_backend {
            merged.use_real_backend = v;
        }
        if let Some(v) = &self.base_endpoint {
            merged.base_endpoint = v.clone();
        }
        if let Some(v) = self.simulated_delay {
            merged.simulated_delay = v;
        }
        if let Some(v) = self.simulated_error_rate {
            merged.simulated_error_rate = v;
        }
        if let Some(v) = self.request_timeout_ms {
            merged.request_timeout_ms = v;
        }
        merged
    }
}

/*
 * Durable key/value storage for configuration blobs. Implementations must treat a
 * missing key as `Ok(None)` rather than as an error.
 */
pub trait ConfigStorageOperations: Send + Sync {
    fn load_blob(&self, key: &str) -> Result<Option<String>>;
    fn save_blob(&self, key: &str, blob: &str) -> Result<()>;
}

/* Stores each key as `<key>.json` inside one directory. */
pub struct FileConfigStorage {
    dir: PathBuf,
}

impl FileConfigStorage {
    pub fn new(dir: PathBuf) -> Self {
        FileConfigStorage { dir }
    }

    /* Uses the platform's local configuration directory for `app_name`. */
    pub fn for_app(app_name: &str) -> Result<Self> {
        let dir = path_utils::get_base_app_config_local_dir(app_name)
            .ok_or(ConfigError::NoConfigDirectory)?;
        Ok(FileConfigStorage::new(dir))
    }

    fn blob_path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }
}

impl ConfigStorageOperations for FileConfigStorage {
    fn load_blob(&self, key: &str) -> Result<Option<String>> {
        let file_path = self.blob_path(key);
        if !file_path.exists() {
            log::debug!("FileConfigStorage: No stored blob at {file_path:?}.");
            return Ok(None);
        }
        let contents = fs::read_to_string(&file_path)?;
        if contents.trim().is_empty() {
            log::debug!("FileConfigStorage: Stored blob at {file_path:?} is empty.");
            return Ok(None);
        }
        log::trace!("FileConfigStorage: Loaded blob '{key}' from {file_path:?}.");
        Ok(Some(contents))
    }

    fn save_blob(&self, key: &str, blob: &str) -> Result<()> {
        let dir = path_utils::ensure_dir(&self.dir).ok_or(ConfigError::NoConfigDirectory)?;
        let file_path = dir.join(format!("{key}.json"));
        fs::write(&file_path, blob)?;
        log::trace!("FileConfigStorage: Saved blob '{key}' to {file_path:?}.");
        Ok(())
    }
}

/*
 * Process-lifetime storage. Used when the platform offers no configuration
 * directory, and by tests that do not care about persistence.
 */
#[derive(Default)]
pub struct MemoryConfigStorage {
    blobs: RwLock<HashMap<String, String>>,
}

impl ConfigStorageOperations for MemoryConfigStorage {
    fn load_blob(&self, key: &str) -> Result<Option<String>> {
        Ok(self.blobs.read().get(key).cloned())
    }

    fn save_blob(&self, key: &str, blob: &str) -> Result<()> {
        self.blobs.write().insert(key.to_string(), blob.to_string());
        Ok(())
    }
}

/*
 * Overlays `stored` onto `base` key by key. Nested objects are merged recursively
 * so a stored `simulatedDelay` with only `fixed` keeps the default bounds.
 */
fn merge_json(base: &mut Value, stored: Value) {
    match (base, stored) {
        (Value::Object(base_map), Value::Object(stored_map)) => {
            for (key, stored_value) in stored_map {
                match base_map.get_mut(&key) {
                    Some(base_value) if base_value.is_object() && stored_value.is_object() => {
                        merge_json(base_value, stored_value);
                    }
                    Some(base_value) => *base_value = stored_value,
                    // Keys the current build does not know are dropped.
                    None => {}
                }
            }
        }
        (base, stored) => *base = stored,
    }
}

/*
 * Applies the stored blob field by field. A field that fails to deserialize or
 * leaves the configuration invalid is logged and keeps its default; the other
 * fields still apply. Only an unparseable blob or a non-object is an error.
 */
fn merge_over_defaults(blob: &str) -> Result<RuntimeConfig> {
    let Value::Object(stored) = serde_json::from_str::<Value>(blob)? else {
        return Err(ConfigError::InvalidValue(
            "stored configuration is not a JSON object".to_string(),
        ));
    };
    let mut accepted = serde_json::to_value(RuntimeConfig::default())?;
    for (field, stored_value) in stored {
        if accepted.get(&field).is_none() {
            log::debug!("ConfigStore: Dropping unknown stored field '{field}'.");
            continue;
        }
        let mut single = Map::new();
        single.insert(field.clone(), stored_value);
        let mut candidate = accepted.clone();
        merge_json(&mut candidate, Value::Object(single));
        let checked = serde_json::from_value::<RuntimeConfig>(candidate.clone())
            .map_err(ConfigError::from)
            .and_then(|config| config.validate());
        match checked {
            Ok(()) => accepted = candidate,
            Err(e) => {
                log::warn!("ConfigStore: Ignoring stored field '{field}' ({e}); keeping its default.")
            }
        }
    }
    Ok(serde_json::from_value(accepted)?)
}

/*
 * Owner of the live `RuntimeConfig`. Shared by handle (`Arc<ConfigStore>`) with the
 * backend selector and the simulated backends, which read it on every call. There
 * is no coordination between writers: the last `update_config` wins.
 */
pub struct ConfigStore {
    storage: Arc<dyn ConfigStorageOperations>,
    current: RwLock<RuntimeConfig>,
}

impl ConfigStore {
    /*
     * Loads the stored configuration and merges it over the defaults. A missing
     * or unreadable blob is logged and replaced by the defaults; a single bad
     * field only loses that field.
     */
    pub fn load(storage: Arc<dyn ConfigStorageOperations>) -> Self {
        let config = match storage.load_blob(CONFIG_STORAGE_KEY) {
            Ok(Some(blob)) => match merge_over_defaults(&blob) {
                Ok(config) => {
                    log::debug!("ConfigStore: Loaded stored configuration: {config:?}");
                    config
                }
                Err(e) => {
                    log::warn!("ConfigStore: Ignoring stored configuration ({e}); using defaults.");
                    RuntimeConfig::default()
                }
            },
            Ok(None) => {
                log::debug!("ConfigStore: No stored configuration; using defaults.");
                RuntimeConfig::default()
            }
            Err(e) => {
                log::warn!("ConfigStore: Failed to read stored configuration ({e}); using defaults.");
                RuntimeConfig::default()
            }
        };
        ConfigStore {
            storage,
            current: RwLock::new(config),
        }
    }

    /* A store that starts from `config` without reading storage. */
    pub fn with_config(storage: Arc<dyn ConfigStorageOperations>, config: RuntimeConfig) -> Self {
        ConfigStore {
            storage,
            current: RwLock::new(config),
        }
    }

    pub fn get_config(&self) -> RuntimeConfig {
        self.current.read().clone()
    }

    /*
     * Validates and applies `patch`, then persists the merged result. An invalid
     * patch leaves the configuration untouched. A persistence failure is returned
     * to the caller but the in-memory configuration has already changed.
     */
    pub fn update_config(&self, patch: ConfigPatch) -> Result<RuntimeConfig> {
        let merged = {
            let mut current = self.current.write();
            let merged = patch.apply_to(&current);
            merged.validate()?;
            *current = merged.clone();
            merged
        };
        log::info!("ConfigStore: Configuration updated: {merged:?}");
        self.persist(&merged)?;
        Ok(merged)
    }

    pub fn save(&self) -> Result<()> {
        let config = self.get_config();
        self.persist(&config)
    }

    fn persist(&self, config: &RuntimeConfig) -> Result<()> {
        let blob = serde_json::to_string_pretty(config)?;
        if let Err(e) = self.storage.save_blob(CONFIG_STORAGE_KEY, &blob) {
            log::error!("ConfigStore: Failed to persist configuration: {e}");
            return Err(e);
        }
        Ok(())
    }
}
