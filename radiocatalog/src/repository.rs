//! Authoritative stream list and its reconciliation
//!
//! [`StreamRepository`] publishes [`Streams`] snapshots on a watch channel.
//! Three kinds of change are applied without refetching: the active stream,
//! the live track of the active stream, and the favorite set (pushed by the
//! [`SettingsRepository`]). Every change goes through `send_if_modified` on
//! the channel, so each one is applied against the latest snapshot and an
//! unchanged result never wakes observers.

use crate::error::{Error, Result};
use crate::failure::Failure;
use crate::models::{Stream, Streams};
use crate::network::NetworkManager;
use crate::settings::SettingsRepository;
use crate::source::StreamCatalog;
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

pub struct StreamRepository {
    catalog: Arc<dyn StreamCatalog>,
    network: Arc<dyn NetworkManager>,
    settings: Arc<dyn SettingsRepository>,
    state: Arc<watch::Sender<Streams>>,
    favorites_task: Mutex<Option<JoinHandle<()>>>,
}

impl StreamRepository {
    /// Creates the repository and starts following the favorite set.
    ///
    /// Must be called from within a tokio runtime.
    pub fn new(
        catalog: Arc<dyn StreamCatalog>,
        network: Arc<dyn NetworkManager>,
        settings: Arc<dyn SettingsRepository>,
    ) -> Arc<Self> {
        let (tx, _) = watch::channel(Streams::Loading);
        let state = Arc::new(tx);

        let task = tokio::spawn(follow_favorites(settings.favorites(), state.clone()));

        Arc::new(Self {
            catalog,
            network,
            settings,
            state,
            favorites_task: Mutex::new(Some(task)),
        })
    }

    /// Snapshot stream; starts at `Loading`
    pub fn streams(&self) -> watch::Receiver<Streams> {
        self.state.subscribe()
    }

    pub fn current(&self) -> Streams {
        self.state.borrow().clone()
    }

    /// Reloads the catalog
    ///
    /// Publishes `Loading`, then either a merged `Success` or an `Error`.
    /// When the catalog needs the network and the device is offline the
    /// catalog is not contacted at all.
    pub async fn force_update(&self) {
        self.state.send_replace(Streams::Loading);

        match self.load().await {
            Ok(streams) => {
                info!(source = self.catalog.name(), count = streams.len(), "Catalog loaded");
                self.state.send_replace(Streams::Success(streams));
            }
            Err(err) => {
                let failure = Failure::from_error(&err);
                warn!(source = self.catalog.name(), error = %err, ?failure, "Catalog update failed");
                self.state.send_replace(Streams::Error(failure));
            }
        }
    }

    async fn load(&self) -> Result<Vec<Stream>> {
        if self.catalog.requires_network() && !self.network.is_connected().await {
            return Err(Error::NoNetwork);
        }

        let streams = self.catalog.fetch_streams().await?;
        let active = self.resolve_last_played(&streams).await?;
        let favorites = self.settings.favorite_ids().await?;

        Ok(streams
            .into_iter()
            .map(|mut stream| {
                stream.is_active = active.as_deref() == Some(stream.id.as_str());
                stream.is_favorite = favorites.contains(&stream.id);
                stream
            })
            .collect())
    }

    /// Last played id, falling back to the legacy positional setting
    async fn resolve_last_played(&self, streams: &[Stream]) -> Result<Option<String>> {
        if let Some(id) = self.settings.last_played_id().await? {
            return Ok(Some(id));
        }
        Ok(self
            .settings
            .legacy_last_played_index()
            .await?
            .and_then(|index| streams.get(index))
            .map(|stream| stream.id.clone()))
    }

    /// Sets the live track of the active stream
    ///
    /// Returns whether a new snapshot was published.
    pub fn update_track(&self, track: Option<String>) -> bool {
        let changed = self.state.send_if_modified(|streams| {
            let Streams::Success(list) = streams else {
                return false;
            };
            let Some(index) = list.iter().position(|s| s.is_active) else {
                return false;
            };
            if list[index].track == track {
                return false;
            }
            let mut updated = list.clone();
            updated[index].track = track.clone();
            *streams = Streams::Success(updated);
            true
        });
        if changed {
            debug!(?track, "Track updated");
        }
        changed
    }

    /// Marks `id` as the only active stream
    ///
    /// Returns whether a new snapshot was published.
    pub fn update_active(&self, id: &str) -> bool {
        let changed = self.state.send_if_modified(|streams| {
            let Streams::Success(list) = streams else {
                return false;
            };
            if !list.iter().any(|s| s.id == id) {
                warn!(id, "Cannot activate unknown stream");
                return false;
            }
            if list.iter().all(|s| s.is_active == (s.id == id)) {
                return false;
            }
            let updated = list
                .iter()
                .map(|s| s.clone().with_active(s.id == id))
                .collect();
            *streams = Streams::Success(updated);
            true
        });
        if changed {
            debug!(id, "Active stream updated");
        }
        changed
    }

    /// Stops following favorites; snapshots stay readable
    pub fn shutdown(&self) {
        if let Ok(mut task) = self.favorites_task.lock() {
            if let Some(task) = task.take() {
                task.abort();
            }
        }
    }
}

impl Drop for StreamRepository {
    fn drop(&mut self) {
        self.shutdown();
    }
}

async fn follow_favorites(
    mut favorites: watch::Receiver<HashSet<String>>,
    state: Arc<watch::Sender<Streams>>,
) {
    while favorites.changed().await.is_ok() {
        let ids = favorites.borrow_and_update().clone();
        let changed = state.send_if_modified(|streams| match streams {
            Streams::Success(list) => match apply_favorites(list, &ids) {
                Some(updated) => {
                    *streams = Streams::Success(updated);
                    true
                }
                None => false,
            },
            _ => false,
        });
        debug!(count = ids.len(), changed, "Favorites applied");
    }
}

/// Rewrites `is_favorite` from `ids`; `None` when nothing changes
pub fn apply_favorites(streams: &[Stream], ids: &HashSet<String>) -> Option<Vec<Stream>> {
    if streams
        .iter()
        .all(|s| s.is_favorite == ids.contains(&s.id))
    {
        return None;
    }
    Some(
        streams
            .iter()
            .map(|s| s.clone().with_favorite(ids.contains(&s.id)))
            .collect(),
    )
}
