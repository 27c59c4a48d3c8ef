//! Use cases
//!
//! Thin operations over the repository and the settings store. The playback
//! crate and the binary depend on these rather than on the repository
//! directly, so the rules (blank ids rejected, persist before updating the
//! active flag) live in one place.

use crate::error::{Error, Result};
use crate::models::{ActiveStream, Stream, Streams};
use crate::repository::StreamRepository;
use crate::settings::{EqualizerSettings, SettingsRepository};
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::debug;

#[derive(Clone)]
pub struct GetAllStreams {
    repository: Arc<StreamRepository>,
}

impl GetAllStreams {
    pub fn new(repository: Arc<StreamRepository>) -> Self {
        Self { repository }
    }

    pub fn execute(&self) -> watch::Receiver<Streams> {
        self.repository.streams()
    }
}

/// Successful snapshots only
#[derive(Clone)]
pub struct GetSuccessfulStreams {
    repository: Arc<StreamRepository>,
}

impl GetSuccessfulStreams {
    pub fn new(repository: Arc<StreamRepository>) -> Self {
        Self { repository }
    }

    /// The latest successful list, if the current snapshot is one
    pub fn current(&self) -> Option<Vec<Stream>> {
        self.repository.current().as_success().map(<[Stream]>::to_vec)
    }

    /// Waits for the next successful snapshot (returns at once if current)
    pub async fn execute(&self) -> Result<Vec<Stream>> {
        let mut rx = self.repository.streams();
        let streams = rx
            .wait_for(|s| matches!(s, Streams::Success(_)))
            .await
            .map_err(|_| Error::NotLoaded)?;
        Ok(streams.as_success().map(<[Stream]>::to_vec).unwrap_or_default())
    }
}

#[derive(Clone)]
pub struct GetActiveStream {
    repository: Arc<StreamRepository>,
}

impl GetActiveStream {
    pub fn new(repository: Arc<StreamRepository>) -> Self {
        Self { repository }
    }

    pub fn current(&self) -> ActiveStream {
        ActiveStream::from_streams(&self.repository.current())
    }

    /// Follows the repository and publishes distinct projections
    ///
    /// The mapping task ends when every receiver is dropped.
    pub fn execute(&self) -> watch::Receiver<ActiveStream> {
        let mut streams = self.repository.streams();
        let initial = ActiveStream::from_streams(&streams.borrow_and_update());
        let (tx, rx) = watch::channel(initial);

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    changed = streams.changed() => {
                        if changed.is_err() {
                            break;
                        }
                    }
                    _ = tx.closed() => break,
                }
                let active = ActiveStream::from_streams(&streams.borrow_and_update());
                tx.send_if_modified(|current| {
                    if *current == active {
                        false
                    } else {
                        *current = active;
                        true
                    }
                });
            }
        });
        rx
    }
}

/// Persists the choice, then flips the active flag
#[derive(Clone)]
pub struct SetActiveStream {
    settings: Arc<dyn SettingsRepository>,
    repository: Arc<StreamRepository>,
}

impl SetActiveStream {
    pub fn new(settings: Arc<dyn SettingsRepository>, repository: Arc<StreamRepository>) -> Self {
        Self {
            settings,
            repository,
        }
    }

    pub async fn execute(&self, id: &str) -> Result<()> {
        if id.trim().is_empty() {
            return Err(Error::invalid_argument("stream id must not be blank"));
        }
        self.settings.set_last_played_id(id).await?;
        self.repository.update_active(id);
        debug!(id, "Active stream set");
        Ok(())
    }
}

#[derive(Clone)]
pub struct SetStreamTrack {
    repository: Arc<StreamRepository>,
}

impl SetStreamTrack {
    pub fn new(repository: Arc<StreamRepository>) -> Self {
        Self { repository }
    }

    pub fn execute(&self, track: Option<String>) -> bool {
        self.repository.update_track(track)
    }
}

#[derive(Clone)]
pub struct UpdateStreams {
    repository: Arc<StreamRepository>,
}

impl UpdateStreams {
    pub fn new(repository: Arc<StreamRepository>) -> Self {
        Self { repository }
    }

    pub async fn execute(&self) {
        self.repository.force_update().await
    }
}

#[derive(Clone)]
pub struct GetFavorites {
    settings: Arc<dyn SettingsRepository>,
}

impl GetFavorites {
    pub fn new(settings: Arc<dyn SettingsRepository>) -> Self {
        Self { settings }
    }

    pub async fn execute(&self) -> Result<HashSet<String>> {
        self.settings.favorite_ids().await
    }
}

#[derive(Clone)]
pub struct AddToFavorites {
    settings: Arc<dyn SettingsRepository>,
}

impl AddToFavorites {
    pub fn new(settings: Arc<dyn SettingsRepository>) -> Self {
        Self { settings }
    }

    pub async fn execute(&self, stream: &Stream) -> Result<()> {
        self.settings.add_to_favorites(&stream.id).await
    }
}

#[derive(Clone)]
pub struct RemoveFromFavorites {
    settings: Arc<dyn SettingsRepository>,
}

impl RemoveFromFavorites {
    pub fn new(settings: Arc<dyn SettingsRepository>) -> Self {
        Self { settings }
    }

    pub async fn execute(&self, stream: &Stream) -> Result<()> {
        self.settings.remove_from_favorites(&stream.id).await
    }
}

#[derive(Clone)]
pub struct GetLastPlayedId {
    settings: Arc<dyn SettingsRepository>,
}

impl GetLastPlayedId {
    pub fn new(settings: Arc<dyn SettingsRepository>) -> Self {
        Self { settings }
    }

    /// `None` when nothing was played yet
    pub async fn execute(&self) -> Result<Option<String>> {
        self.settings.last_played_id().await
    }
}

#[derive(Clone)]
pub struct SetLastPlayedId {
    settings: Arc<dyn SettingsRepository>,
}

impl SetLastPlayedId {
    pub fn new(settings: Arc<dyn SettingsRepository>) -> Self {
        Self { settings }
    }

    pub async fn execute(&self, id: &str) -> Result<()> {
        self.settings.set_last_played_id(id).await
    }
}

#[derive(Clone)]
pub struct GetEqualizerSettings {
    settings: Arc<dyn SettingsRepository>,
}

impl GetEqualizerSettings {
    pub fn new(settings: Arc<dyn SettingsRepository>) -> Self {
        Self { settings }
    }

    pub async fn execute(&self) -> Result<EqualizerSettings> {
        self.settings.equalizer_settings().await
    }
}

#[derive(Clone)]
pub struct SetEqualizerSettings {
    settings: Arc<dyn SettingsRepository>,
}

impl SetEqualizerSettings {
    pub fn new(settings: Arc<dyn SettingsRepository>) -> Self {
        Self { settings }
    }

    pub async fn execute(&self, settings: EqualizerSettings) -> Result<()> {
        self.settings.set_equalizer_settings(settings).await
    }
}
