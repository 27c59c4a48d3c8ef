//! # radioconfig
//!
//! YAML configuration shared by the nederadio crates.
//!
//! At load time the embedded defaults (`nederadio.yaml`) are overlaid with
//! the user's `config.yaml`, keys are lower-cased, `NEDERADIO_CONFIG__*`
//! environment variables are applied, and the result is written back so the
//! file always shows every key.
//!
//! This crate only knows the host-level keys (logging). Domain crates add
//! theirs through extension traits (`CatalogConfigExt`, `PlaybackConfigExt`)
//! built on the generic accessors of [`Config`].
//!
//! ```no_run
//! use radioconfig::get_config;
//!
//! let config = get_config();
//! println!("log level: {}", config.get_log_min_level()?);
//! config.set_log_enable_console(false)?;
//! # Ok::<(), anyhow::Error>(())
//! ```

mod document;
mod location;

use anyhow::{anyhow, Result};
use lazy_static::lazy_static;
use serde_yaml::{Number, Value};
use std::{
    env, fs,
    path::{Path, PathBuf},
    sync::{Arc, Mutex, MutexGuard},
};
use tracing::{info, warn};

const DEFAULTS: &str = include_str!("nederadio.yaml");

const LOG_BUFFER_CAPACITY: usize = 1000;
const LOG_MIN_LEVEL: &str = "INFO";
const LOG_ENABLE_CONSOLE: bool = true;

lazy_static! {
    static ref CONFIG: Arc<Config> = Arc::new(
        Config::load_config("").expect("nederadio configuration could not be loaded")
    );
}

/// Typed getter/setter pair over one key, with a default
macro_rules! config_key {
    (usize, $getter:ident, $setter:ident, $path:expr, $default:expr) => {
        pub fn $getter(&self) -> Result<usize> {
            Ok(self.get_u64_or($path, $default as u64) as usize)
        }

        pub fn $setter(&self, value: usize) -> Result<()> {
            self.set_value($path, Value::Number(Number::from(value as u64)))
        }
    };
    (bool, $getter:ident, $setter:ident, $path:expr, $default:expr) => {
        pub fn $getter(&self) -> Result<bool> {
            Ok(self.get_bool_or($path, $default))
        }

        pub fn $setter(&self, value: bool) -> Result<()> {
            self.set_value($path, Value::Bool(value))
        }
    };
    (string, $getter:ident, $setter:ident, $path:expr, $default:expr) => {
        pub fn $getter(&self) -> Result<String> {
            Ok(self.get_string_or($path, $default))
        }

        pub fn $setter(&self, value: String) -> Result<()> {
            self.set_value($path, Value::String(value))
        }
    };
}

/// The loaded configuration document
///
/// Readers get copies of the values; every setter rewrites `config.yaml`.
#[derive(Debug)]
pub struct Config {
    dir: PathBuf,
    file: PathBuf,
    root: Mutex<Value>,
}

impl Config {
    /// Resolves, creates and checks the configuration directory
    ///
    /// `directory` wins when not empty, then `$NEDERADIO_CONFIG`, then an
    /// existing `.nederadio` in the working or home directory.
    pub fn config_dir(directory: &str) -> Result<String> {
        let dir = location::resolve(directory);
        location::ensure_writable(&dir)?;
        Ok(dir.to_string_lossy().into_owned())
    }

    pub fn load_config(directory: &str) -> Result<Self> {
        let dir = PathBuf::from(Self::config_dir(directory)?);
        let file = dir.join(location::CONFIG_FILE_NAME);
        info!(config_dir = %dir.display(), "Configuration directory");

        let mut root: Value = serde_yaml::from_str(DEFAULTS)?;
        match fs::read_to_string(&file) {
            Ok(text) => {
                let user: Value = serde_yaml::from_str(&text)?;
                // Fichier vide: seules les valeurs par défaut s'appliquent
                if !user.is_null() {
                    document::overlay(&mut root, &document::lowercase_keys(user));
                }
                info!(config_file = %file.display(), "Configuration file loaded");
            }
            Err(_) => {
                info!(config_file = %file.display(), "No configuration file, writing defaults")
            }
        }
        let mut root = document::lowercase_keys(root);
        document::apply_env(&mut root, env::vars());

        let config = Config {
            dir,
            file,
            root: Mutex::new(root),
        };
        config.save()?;
        Ok(config)
    }

    pub fn directory(&self) -> &Path {
        &self.dir
    }

    fn root(&self) -> Result<MutexGuard<'_, Value>> {
        self.root
            .lock()
            .map_err(|_| anyhow!("configuration lock poisoned"))
    }

    /// Writes the current document to `config.yaml`
    pub fn save(&self) -> Result<()> {
        let text = serde_yaml::to_string(&*self.root()?)?;
        fs::write(&self.file, text)?;
        Ok(())
    }

    /// Sets the value at `path` (e.g. `&["settings", "last_played_id"]`) and saves
    pub fn set_value(&self, path: &[&str], value: Value) -> Result<()> {
        document::insert(&mut *self.root()?, path, value)?;
        self.save()
    }

    /// Value at `path`; missing keys are an error
    pub fn get_value(&self, path: &[&str]) -> Result<Value> {
        document::lookup(&*self.root()?, path).cloned()
    }

    /// String at `path`; numbers are rendered, anything else gives `default`
    pub fn get_string_or(&self, path: &[&str], default: &str) -> String {
        match self.get_value(path) {
            Ok(Value::String(s)) => s,
            Ok(Value::Number(n)) => n.to_string(),
            _ => default.to_string(),
        }
    }

    pub fn get_u64_or(&self, path: &[&str], default: u64) -> u64 {
        let parsed = match self.get_value(path) {
            Ok(Value::Number(n)) => n.as_u64().or_else(|| n.as_i64().map(|v| v.max(0) as u64)),
            Ok(Value::String(s)) => s.trim().parse().ok(),
            _ => return default,
        };
        parsed.unwrap_or_else(|| {
            warn!(path = %path.join("."), default, "Not an unsigned number, using default");
            default
        })
    }

    pub fn get_i64_or(&self, path: &[&str], default: i64) -> i64 {
        match self.get_value(path) {
            Ok(Value::Number(n)) => n.as_i64(),
            Ok(Value::String(s)) => s.trim().parse().ok(),
            _ => None,
        }
        .unwrap_or(default)
    }

    pub fn get_bool_or(&self, path: &[&str], default: bool) -> bool {
        self.get_value(path)
            .ok()
            .and_then(|v| v.as_bool())
            .unwrap_or(default)
    }

    /// Scalars of the list at `path`, as strings; anything else is empty
    pub fn get_string_list(&self, path: &[&str]) -> Vec<String> {
        let Ok(Value::Sequence(items)) = self.get_value(path) else {
            return Vec::new();
        };
        items
            .into_iter()
            .filter_map(|item| match item {
                Value::String(s) => Some(s),
                Value::Number(n) => Some(n.to_string()),
                _ => None,
            })
            .collect()
    }

    pub fn set_string_list<I, S>(&self, path: &[&str], values: I) -> Result<()>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let items = values.into_iter().map(|s| Value::String(s.into())).collect();
        self.set_value(path, Value::Sequence(items))
    }

    pub fn set_i64(&self, path: &[&str], value: i64) -> Result<()> {
        self.set_value(path, Value::Number(Number::from(value)))
    }

    /// Deserializes the section at `path`
    pub fn get_typed<T: serde::de::DeserializeOwned>(&self, path: &[&str]) -> Result<T> {
        Ok(serde_yaml::from_value(self.get_value(path)?)?)
    }

    config_key!(
        usize,
        get_log_cache_size,
        set_log_cache_size,
        &["host", "logger", "buffer_capacity"],
        LOG_BUFFER_CAPACITY
    );

    config_key!(
        bool,
        get_log_enable_console,
        set_log_enable_console,
        &["host", "logger", "enable_console"],
        LOG_ENABLE_CONSOLE
    );

    config_key!(
        string,
        get_log_min_level,
        set_log_min_level,
        &["host", "logger", "min_level"],
        LOG_MIN_LEVEL
    );
}

/// Process-wide configuration, loaded on first use
pub fn get_config() -> Arc<Config> {
    CONFIG.clone()
}
