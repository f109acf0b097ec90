//! Thread-safe application configuration with optional hot reloading.

use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock, mpsc};
use std::thread;
use std::time::Duration;

use config::{Config as RawConfig, File};
use notify::{Event, RecommendedWatcher, RecursiveMode, Watcher};
use serde::de::DeserializeOwned;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to load or parse configuration file")]
    Load(#[from] config::ConfigError),

    #[error("Failed to initialize file watcher")]
    Watch(#[from] notify::Error),

    #[error("Configuration lock was poisoned, indicating a panic in another thread")]
    LockPoisoned,
}

/// Read handle over the loaded configuration.
///
/// Values are fetched by dotted key (`config.get::<u64>("session.ttl_secs")`)
/// so callers always observe the latest reload.
#[derive(Debug)]
pub struct Config {
    inner: Arc<RwLock<RawConfig>>,
    // Dropping the watcher stops the reload thread with the Config.
    _watcher: Option<RecommendedWatcher>,
}

impl Config {
    pub fn builder<P: AsRef<Path>>(path: P) -> ConfigBuilder {
        ConfigBuilder::new(path.as_ref().to_path_buf())
    }

    #[cfg(feature = "testing")]
    pub fn builder_test() -> test_utils::TestConfigBuilder {
        test_utils::TestConfigBuilder::new()
    }

    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Result<T, ConfigError> {
        let guard = self.inner.read().map_err(|_| ConfigError::LockPoisoned)?;
        guard.get(key).map_err(ConfigError::from)
    }
}

pub struct ConfigBuilder {
    path: PathBuf,
    watch: bool,
    watch_interval: Duration,
}

impl ConfigBuilder {
    fn new(path: PathBuf) -> Self {
        Self { path, watch: false, watch_interval: Duration::from_secs(2) }
    }

    /// Reload the file in place whenever it changes on disk.
    pub fn watch(mut self) -> Self {
        self.watch = true;
        self
    }

    pub fn watch_interval(mut self, interval: Duration) -> Self {
        self.watch_interval = interval;
        self
    }

    pub fn build(self) -> Result<Config, ConfigError> {
        let raw = Self::load(&self.path)?;
        let shared = Arc::new(RwLock::new(raw));

        let watcher = if self.watch { Some(self.spawn_reload_thread(Arc::clone(&shared))?) } else { None };

        Ok(Config { inner: shared, _watcher: watcher })
    }

    fn spawn_reload_thread(&self, shared: Arc<RwLock<RawConfig>>) -> Result<RecommendedWatcher, ConfigError> {
        let path = self.path.clone();
        let (tx, rx) = mpsc::channel();

        let mut watcher = RecommendedWatcher::new(tx, notify::Config::default().with_poll_interval(self.watch_interval))?;
        watcher.watch(&self.path, RecursiveMode::NonRecursive)?;

        thread::spawn(move || {
            tracing::info!("watching configuration file: {}", path.to_string_lossy());
            while let Ok(event) = rx.recv() {
                match event {
                    Ok(Event { kind: notify::EventKind::Modify(_), .. }) => match Self::load(&path) {
                        Ok(fresh) => {
                            if let Ok(mut guard) = shared.write() {
                                *guard = fresh;
                                tracing::info!("configuration reloaded");
                            } else {
                                tracing::error!("failed to acquire write lock while reloading configuration");
                            }
                        },
                        Err(err) => tracing::error!("failed to reload configuration file: {err}"),
                    },
                    Err(err) => tracing::error!("file watcher error: {err:?}"),
                    // Access/open events carry no content changes.
                    _ => {},
                }
            }
        });

        Ok(watcher)
    }

    fn load(path: &Path) -> Result<RawConfig, config::ConfigError> {
        RawConfig::builder().add_source(File::from(path).required(true)).build()
    }
}

#[cfg(feature = "testing")]
pub mod test_utils {
    use std::collections::HashMap;

    use config::Value;

    use super::*;

    /// Builds an in-memory [`Config`] from literal key/value pairs, so tests
    /// never touch the filesystem.
    #[derive(Default)]
    pub struct TestConfigBuilder {
        values: HashMap<String, Value>,
    }

    impl TestConfigBuilder {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn with<T: Into<Value>>(mut self, key: &str, value: T) -> Self {
            self.values.insert(key.to_string(), value.into());
            self
        }

        pub fn build(self) -> Config {
            let mut builder = RawConfig::builder();
            for (key, value) in self.values {
                builder = builder.set_override(key, value).unwrap();
            }

            let raw = builder.build().expect("failed to build config from test values");

            Config { inner: Arc::new(RwLock::new(raw)), _watcher: None }
        }
    }
}
