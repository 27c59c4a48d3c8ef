//! Persisted user settings
//!
//! Favorites, the last played stream and the equalizer choice live in the
//! key-value store. [`ConfigSettingsRepository`] keeps them in the YAML
//! configuration; reads and writes go through `spawn_blocking` because
//! every write rewrites `config.yaml`.

use crate::config_ext::CatalogConfigExt;
use crate::error::Result;
use async_trait::async_trait;
use radioconfig::Config;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::debug;

/// Persisted equalizer choice
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct EqualizerSettings {
    pub enabled: bool,
    pub preset: i16,
}

#[async_trait]
pub trait SettingsRepository: Send + Sync {
    /// Favorite ids; the current value is always the persisted set
    fn favorites(&self) -> watch::Receiver<HashSet<String>>;

    async fn favorite_ids(&self) -> Result<HashSet<String>>;
    async fn add_to_favorites(&self, id: &str) -> Result<()>;
    async fn remove_from_favorites(&self, id: &str) -> Result<()>;

    async fn last_played_id(&self) -> Result<Option<String>>;
    async fn set_last_played_id(&self, id: &str) -> Result<()>;

    /// Numeric position written by older versions, if any
    async fn legacy_last_played_index(&self) -> Result<Option<usize>>;

    async fn equalizer_settings(&self) -> Result<EqualizerSettings>;
    async fn set_equalizer_settings(&self, settings: EqualizerSettings) -> Result<()>;
}

pub struct ConfigSettingsRepository {
    config: Arc<Config>,
    favorites: watch::Sender<HashSet<String>>,
}

impl ConfigSettingsRepository {
    pub fn new(config: Arc<Config>) -> Result<Self> {
        let initial: HashSet<String> = config.get_favorite_ids()?.into_iter().collect();
        let (favorites, _) = watch::channel(initial);
        Ok(Self { config, favorites })
    }

    async fn blocking<T, F>(&self, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&Config) -> anyhow::Result<T> + Send + 'static,
    {
        let config = self.config.clone();
        Ok(tokio::task::spawn_blocking(move || f(&config)).await??)
    }

    async fn update_favorites<F>(&self, change: F) -> Result<()>
    where
        F: FnOnce(&mut HashSet<String>) -> bool + Send + 'static,
    {
        let updated = self
            .blocking(move |config| {
                let mut ids: HashSet<String> = config.get_favorite_ids()?.into_iter().collect();
                if !change(&mut ids) {
                    return Ok(None);
                }
                let mut sorted: Vec<String> = ids.iter().cloned().collect();
                sorted.sort();
                config.set_favorite_ids(&sorted)?;
                Ok(Some(ids))
            })
            .await?;

        if let Some(ids) = updated {
            debug!(count = ids.len(), "Favorites updated");
            self.favorites.send_replace(ids);
        }
        Ok(())
    }
}

#[async_trait]
impl SettingsRepository for ConfigSettingsRepository {
    fn favorites(&self) -> watch::Receiver<HashSet<String>> {
        self.favorites.subscribe()
    }

    async fn favorite_ids(&self) -> Result<HashSet<String>> {
        self.blocking(|config| Ok(config.get_favorite_ids()?.into_iter().collect()))
            .await
    }

    async fn add_to_favorites(&self, id: &str) -> Result<()> {
        let id = id.to_string();
        self.update_favorites(move |ids| ids.insert(id)).await
    }

    async fn remove_from_favorites(&self, id: &str) -> Result<()> {
        let id = id.to_string();
        self.update_favorites(move |ids| ids.remove(&id)).await
    }

    async fn last_played_id(&self) -> Result<Option<String>> {
        self.blocking(|config| config.get_last_played_id()).await
    }

    async fn set_last_played_id(&self, id: &str) -> Result<()> {
        let id = id.to_string();
        self.blocking(move |config| config.set_last_played_id(&id))
            .await
    }

    async fn legacy_last_played_index(&self) -> Result<Option<usize>> {
        self.blocking(|config| config.get_legacy_last_played_index())
            .await
    }

    async fn equalizer_settings(&self) -> Result<EqualizerSettings> {
        self.blocking(|config| {
            Ok(EqualizerSettings {
                enabled: config.get_equalizer_enabled()?,
                preset: config.get_equalizer_preset()?,
            })
        })
        .await
    }

    async fn set_equalizer_settings(&self, settings: EqualizerSettings) -> Result<()> {
        self.blocking(move |config| {
            config.set_equalizer_enabled(settings.enabled)?;
            config.set_equalizer_preset(settings.preset)
        })
        .await
    }
}
