//! CLI command implementations

pub mod config;
pub mod decrypt;
pub mod keys;
pub mod register;
pub mod subscriptions;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context as _, Result};
use pushkit_lib::storage::FileStore;
use pushkit_lib::PushkitConfig;

/// Resolved storage directory and configuration shared by all commands.
pub struct Context {
    pub storage_dir: PathBuf,
    pub config_path: PathBuf,
    pub config: PushkitConfig,
}

impl Context {
    /// Load `config_path`, or `config.json` in the storage directory. A
    /// missing default config file means defaults.
    pub fn load(storage_dir: PathBuf, config_path: Option<&str>) -> Result<Self> {
        let (config_path, explicit) = match config_path {
            Some(path) => (PathBuf::from(path), true),
            None => (storage_dir.join("config.json"), false),
        };

        let config = if explicit || config_path.exists() {
            PushkitConfig::load(&config_path)
                .with_context(|| format!("failed to load {}", config_path.display()))?
        } else {
            PushkitConfig::default()
        };
        config.validate()?;
        tracing::debug!(storage_dir = %storage_dir.display(), "configuration loaded");

        Ok(Self {
            storage_dir,
            config_path,
            config,
        })
    }

    /// Like [`load`](Self::load), but a config that cannot be read or does
    /// not validate is replaced by defaults.
    pub fn load_or_default(storage_dir: PathBuf, config_path: Option<&str>) -> Self {
        match Self::load(storage_dir.clone(), config_path) {
            Ok(ctx) => ctx,
            Err(e) => {
                tracing::warn!("configuration rejected, using defaults: {:#}", e);
                let config_path = config_path
                    .map(PathBuf::from)
                    .unwrap_or_else(|| storage_dir.join("config.json"));
                Self {
                    storage_dir,
                    config_path,
                    config: PushkitConfig::default(),
                }
            }
        }
    }

    /// Root of the shared file store.
    pub fn store_root(&self) -> &Path {
        self.config
            .storage_root
            .as_deref()
            .unwrap_or(&self.storage_dir)
    }

    /// Read-only handle on the shared group namespace.
    pub fn group_reader(&self) -> Arc<FileStore> {
        Arc::new(FileStore::open_read_only(
            self.store_root(),
            self.config.group_identifier.clone(),
        ))
    }

    /// Writable handle on the shared group namespace.
    pub fn group_writer(&self) -> Result<Arc<FileStore>> {
        let store = FileStore::open(self.store_root(), self.config.group_identifier.clone())
            .context("failed to open the shared store")?;
        Ok(Arc::new(store))
    }
}
