//! # MultiRoom Configuration Module
//!
//! This module provides configuration management for the MultiRoom relay:
//! - Loading configuration from a YAML file
//! - Merging with the embedded default configuration
//! - Environment variable overrides (nested `MULTIROOM_CONFIG__A__B` form and
//!   the flat variables historically used to deploy the relay)
//! - Typed getters with defaults
//!
//! Runtime state (tokens, registered device) never goes through this crate:
//! the configuration is read once at startup and setters only touch the
//! in-memory tree.
//!
//! ## Usage
//!
//! ```no_run
//! use mrconfig::Config;
//!
//! let config = Config::load_config("")?;
//! let port = config.get_http_port()?;
//! let interval = config.get_poll_interval_ms()?;
//! # Ok::<(), anyhow::Error>(())
//! ```

use anyhow::{anyhow, Result};
use dirs::home_dir;
use parking_lot::RwLock;
use serde_yaml::{Mapping, Number, Value};
use std::{env, fs, path::Path};
use tracing::info;

// Chiffrement des secrets stockés dans la configuration
pub mod encryption;

// Configuration par défaut intégrée
const DEFAULT_CONFIG: &str = include_str!("multiroom.yaml");

const ENV_CONFIG_DIR: &str = "MULTIROOM_CONFIG";
const ENV_PREFIX: &str = "MULTIROOM_CONFIG__";

/// Variables d'environnement "plates" acceptées pour compatibilité de déploiement
///
/// Chaque entrée associe le nom de la variable à son chemin dans l'arbre.
const FLAT_ENV_VARS: &[(&str, &[&str])] = &[
    ("SPOTIFY_CLIENT_ID", &["accounts", "spotify", "client_id"]),
    ("SPOTIFY_CLIENT_SECRET", &["accounts", "spotify", "client_secret"]),
    ("SPOTIFY_REFRESH_TOKEN", &["accounts", "spotify", "refresh_token"]),
    ("REDIRECT_URI", &["accounts", "spotify", "redirect_uri"]),
    ("SITE_PASSWORD", &["host", "site_password"]),
    ("PORT", &["host", "http_port"]),
];

// Default values for configuration
const DEFAULT_HTTP_PORT: u16 = 3001;
const DEFAULT_POLL_INTERVAL_MS: usize = 2000;
const DEFAULT_REQUEST_TIMEOUT_SECS: usize = 5;
const DEFAULT_LOG_BUFFER_CAPACITY: usize = 1000;
const DEFAULT_LOG_MIN_LEVEL: &str = "INFO";
const DEFAULT_LOG_ENABLE_CONSOLE: bool = true;

/// Macro to generate getter/setter for usize values with default
macro_rules! impl_usize_config {
    ($getter:ident, $setter:ident, $path:expr, $default:expr) => {
        pub fn $getter(&self) -> Result<usize> {
            self.get_usize($path, $default)
        }

        pub fn $setter(&self, value: usize) -> Result<()> {
            self.set_value($path, Value::Number(Number::from(value as u64)))
        }
    };
}

/// Same as `impl_usize_config`, 0 is rejected (durations, intervals)
macro_rules! impl_nonzero_usize_config {
    ($getter:ident, $setter:ident, $path:expr, $default:expr) => {
        pub fn $getter(&self) -> Result<usize> {
            match self.get_usize($path, $default)? {
                0 => Err(anyhow!("{} must be greater than 0", $path.join("."))),
                v => Ok(v),
            }
        }

        pub fn $setter(&self, value: usize) -> Result<()> {
            if value == 0 {
                return Err(anyhow!("{} must be greater than 0", $path.join(".")));
            }
            self.set_value($path, Value::Number(Number::from(value as u64)))
        }
    };
}

/// Macro to generate getter/setter for bool values with default
macro_rules! impl_bool_config {
    ($getter:ident, $setter:ident, $path:expr, $default:expr) => {
        pub fn $getter(&self) -> Result<bool> {
            match self.get_value($path) {
                Ok(Value::Bool(b)) => Ok(b),
                _ => Ok($default),
            }
        }

        pub fn $setter(&self, value: bool) -> Result<()> {
            self.set_value($path, Value::Bool(value))
        }
    };
}

/// Configuration manager for MultiRoom
///
/// # Examples
///
/// ```
/// use mrconfig::Config;
///
/// let config = Config::from_yaml_str("host:\n  http_port: 8080\n").unwrap();
/// assert_eq!(config.get_http_port().unwrap(), 8080);
/// ```
#[derive(Debug)]
pub struct Config {
    config_dir: String,
    data: RwLock<Value>,
}

impl Clone for Config {
    fn clone(&self) -> Self {
        Self {
            config_dir: self.config_dir.clone(),
            data: RwLock::new(self.data.read().clone()),
        }
    }
}

impl Config {
    /// Finds the config directory by trying different locations in order
    ///
    /// 1. The provided `directory` parameter if not empty
    /// 2. The `MULTIROOM_CONFIG` environment variable
    /// 3. `.multiroom` in the current directory
    /// 4. `.multiroom` in the user's home directory
    pub fn config_dir(directory: &str) -> String {
        if !directory.is_empty() {
            return directory.to_string();
        }

        if let Ok(env_path) = env::var(ENV_CONFIG_DIR) {
            info!(env_var = ENV_CONFIG_DIR, path = %env_path, "Using config directory from env");
            return env_path;
        }

        if Path::new(".multiroom").exists() {
            return ".multiroom".to_string();
        }

        if let Some(home) = home_dir() {
            let home_config = home.join(".multiroom");
            if home_config.exists() {
                return home_config.to_string_lossy().to_string();
            }
        }

        ".multiroom".to_string()
    }

    /// Loads the configuration from the specified directory
    ///
    /// This method:
    /// 1. Determines the configuration directory
    /// 2. Loads the default embedded configuration
    /// 3. Merges it with `config.yaml` from that directory if present
    /// 4. Applies environment variable overrides (nested, then flat)
    ///
    /// Unlike a settings store, nothing is written back: a missing directory
    /// simply means "defaults + environment".
    pub fn load_config(directory: &str) -> Result<Self> {
        let config_dir = Self::config_dir(directory);
        let config_file = Path::new(&config_dir).join("config.yaml");

        let mut value: Value = serde_yaml::from_str(DEFAULT_CONFIG)?;

        match fs::read(&config_file) {
            Ok(data) => {
                info!(config_file = %config_file.display(), "Loaded config file");
                let external: Value = serde_yaml::from_slice(&data).map_err(|e| {
                    anyhow!("Invalid YAML in {}: {}", config_file.display(), e)
                })?;
                if !external.is_null() {
                    merge_yaml(&mut value, &Self::lower_keys_value(external));
                }
            }
            Err(_) => {
                info!(config_file = %config_file.display(), "Config file not found, using embedded defaults");
            }
        }

        let mut value = Self::lower_keys_value(value);
        Self::apply_env_overrides(&mut value, env::vars());

        Ok(Config {
            config_dir,
            data: RwLock::new(value),
        })
    }

    /// Builds a configuration from a YAML document merged over the defaults
    ///
    /// The process environment is ignored, which makes this the entry point
    /// for tests and embedding.
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let mut value: Value = serde_yaml::from_str(DEFAULT_CONFIG)?;
        let external: Value = serde_yaml::from_str(yaml)?;
        if !external.is_null() {
            merge_yaml(&mut value, &Self::lower_keys_value(external));
        }

        Ok(Config {
            config_dir: String::new(),
            data: RwLock::new(Self::lower_keys_value(value)),
        })
    }

    /// Returns the directory the configuration was looked up in
    pub fn dir(&self) -> &str {
        &self.config_dir
    }

    /// Sets a configuration value at the specified path (in memory only)
    ///
    /// # Arguments
    ///
    /// * `path` - Array of keys representing the path (e.g., `&["host", "http_port"]`)
    /// * `value` - The YAML value to set
    pub fn set_value(&self, path: &[&str], value: Value) -> Result<()> {
        let mut data = self.data.write();
        Self::set_value_internal(&mut data, path, value)
    }

    fn set_value_internal(data: &mut Value, path: &[&str], value: Value) -> Result<()> {
        if path.is_empty() {
            *data = value;
            return Ok(());
        }
        if let Value::Mapping(map) = data {
            let key_value = Value::String(path[0].to_lowercase());
            if path.len() == 1 {
                map.insert(key_value, value);
            } else {
                let entry = map
                    .entry(key_value)
                    .or_insert(Value::Mapping(Mapping::new()));
                Self::set_value_internal(entry, &path[1..], value)?;
            }
            Ok(())
        } else {
            Err(anyhow!("Current node is not a map"))
        }
    }

    /// Gets a configuration value at the specified path
    ///
    /// Returns an error if the path doesn't exist.
    pub fn get_value(&self, path: &[&str]) -> Result<Value> {
        let data = self.data.read();
        let mut current = &*data;
        for (i, key) in path.iter().enumerate() {
            match current {
                Value::Mapping(map) => match map.get(&Value::String(key.to_lowercase())) {
                    Some(next) => current = next,
                    None => return Err(anyhow!("Path {} does not exist", path[..=i].join("."))),
                },
                _ => return Err(anyhow!("Path {} is not a mapping", path[..i].join("."))),
            }
        }
        Ok(current.clone())
    }

    /// Gets a scalar value as a string
    ///
    /// Numbers and booleans are rendered as text (a client id made only of
    /// digits comes back from an env override as a YAML number). Missing
    /// paths, `null` and empty strings all yield `None`.
    pub fn get_string(&self, path: &[&str]) -> Result<Option<String>> {
        match self.get_value(path) {
            Ok(Value::String(s)) if s.trim().is_empty() => Ok(None),
            Ok(Value::String(s)) => Ok(Some(s)),
            Ok(Value::Number(n)) => Ok(Some(n.to_string())),
            Ok(Value::Bool(b)) => Ok(Some(b.to_string())),
            Ok(Value::Null) | Err(_) => Ok(None),
            Ok(_) => Err(anyhow!("{} must be a scalar value", path.join("."))),
        }
    }

    /// Gets a secret, decrypting it when stored as `encrypted:...`
    pub fn get_secret(&self, path: &[&str]) -> Result<Option<String>> {
        match self.get_string(path)? {
            Some(raw) => Ok(Some(encryption::reveal_secret(&raw)?)),
            None => Ok(None),
        }
    }

    /// Applies environment overrides from an iterator of `(name, value)` pairs
    ///
    /// Nested variables (`MULTIROOM_CONFIG__HOST__HTTP_PORT`) are applied
    /// first, then the flat deployment variables, which therefore win.
    pub fn apply_env_overrides<I>(config: &mut Value, vars: I)
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let mut flat = Vec::new();

        for (key, value) in vars {
            if let Some(rest) = key.strip_prefix(ENV_PREFIX) {
                let key_path = rest.split("__").collect::<Vec<_>>();
                let _ = Self::set_value_internal(config, &key_path, Self::convert_env_value(&value));
            } else if let Some((_, path)) = FLAT_ENV_VARS.iter().find(|(name, _)| *name == key) {
                flat.push((*path, value));
            }
        }

        for (path, value) in flat {
            // Les secrets restent des chaînes, seul le port est interprété
            let yaml_value = if path == ["host", "http_port"] {
                Self::convert_env_value(&value)
            } else {
                Value::String(value)
            };
            let _ = Self::set_value_internal(config, path, yaml_value);
        }
    }

    fn convert_env_value(value: &str) -> Value {
        match serde_yaml::from_str::<Value>(value) {
            Ok(parsed) => parsed,
            Err(_) => Value::String(value.to_string()),
        }
    }

    fn lower_keys_value(value: Value) -> Value {
        match value {
            Value::Mapping(map) => {
                let mut new_map = Mapping::new();
                for (k, v) in map {
                    let key = match k {
                        Value::String(s) => Value::String(s.to_lowercase()),
                        other => other,
                    };
                    new_map.insert(key, Self::lower_keys_value(v));
                }
                Value::Mapping(new_map)
            }
            Value::Sequence(seq) => {
                Value::Sequence(seq.into_iter().map(Self::lower_keys_value).collect())
            }
            _ => value,
        }
    }

    /// Gets the HTTP port the relay listens on
    ///
    /// Unlike most getters an invalid value is an error: the listen port is
    /// the one setting the process cannot start without.
    pub fn get_http_port(&self) -> Result<u16> {
        match self.get_value(&["host", "http_port"]) {
            Ok(Value::Number(n)) => n
                .as_u64()
                .and_then(|p| u16::try_from(p).ok())
                .filter(|p| *p != 0)
                .ok_or_else(|| anyhow!("Invalid HTTP port {}", n)),
            Ok(Value::String(s)) => s
                .trim()
                .parse::<u16>()
                .map_err(|e| anyhow!("Invalid HTTP port '{}': {}", s, e)),
            Ok(Value::Null) | Err(_) => Ok(DEFAULT_HTTP_PORT),
            Ok(other) => Err(anyhow!("Invalid HTTP port {:?}", other)),
        }
    }

    /// Sets the HTTP port in configuration
    pub fn set_http_port(&self, port: u16) -> Result<()> {
        self.set_value(&["host", "http_port"], Value::Number(Number::from(port)))
    }

    /// Récupère le mot de passe du site (None = accès libre)
    fn get_usize(&self, path: &[&str], default: usize) -> Result<usize> {
        match self.get_value(path) {
            Ok(Value::Number(n)) => n
                .as_u64()
                .map(|v| v as usize)
                .ok_or_else(|| anyhow!("{} must be a positive integer", path.join("."))),
            Ok(Value::String(s)) => s
                .trim()
                .parse::<usize>()
                .map_err(|e| anyhow!("Invalid value '{}' for {}: {}", s, path.join("."), e)),
            _ => Ok(default),
        }
    }

    pub fn get_site_password(&self) -> Result<Option<String>> {
        self.get_secret(&["host", "site_password"])
    }

    impl_nonzero_usize_config!(
        get_poll_interval_ms,
        set_poll_interval_ms,
        &["relay", "poll_interval_ms"],
        DEFAULT_POLL_INTERVAL_MS
    );

    impl_nonzero_usize_config!(
        get_request_timeout_secs,
        set_request_timeout_secs,
        &["relay", "request_timeout_secs"],
        DEFAULT_REQUEST_TIMEOUT_SECS
    );

    impl_usize_config!(
        get_log_cache_size,
        set_log_cache_size,
        &["host", "logger", "buffer_capacity"],
        DEFAULT_LOG_BUFFER_CAPACITY
    );

    impl_bool_config!(
        get_log_enable_console,
        set_log_enable_console,
        &["host", "logger", "enable_console"],
        DEFAULT_LOG_ENABLE_CONSOLE
    );

    /// Récupère le niveau de log minimum depuis la configuration
    pub fn get_log_min_level(&self) -> Result<String> {
        Ok(self
            .get_string(&["host", "logger", "min_level"])?
            .unwrap_or_else(|| DEFAULT_LOG_MIN_LEVEL.to_string()))
    }

    /// Définit le niveau de log minimum dans la configuration
    pub fn set_log_min_level(&self, level: String) -> Result<()> {
        self.set_value(&["host", "logger", "min_level"], Value::String(level))
    }
}

/// Merges external YAML configuration into default configuration
///
/// Mappings are merged key by key, scalars and sequences are replaced.
fn merge_yaml(default: &mut Value, external: &Value) {
    match (default, external) {
        (Value::Mapping(dmap), Value::Mapping(emap)) => {
            for (k, v) in emap {
                match dmap.get_mut(k) {
                    Some(dv) => merge_yaml(dv, v),
                    None => {
                        dmap.insert(k.clone(), v.clone());
                    }
                }
            }
        }
        (d, e) => *d = e.clone(),
    }
}
