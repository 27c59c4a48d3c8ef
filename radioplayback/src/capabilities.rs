//! Engine capability traits
//!
//! Un moteur de lecture (local ou cast) expose son contrôle à travers ces
//! traits. Toutes les méthodes prennent `&mut self`: seul le player
//! composite, possédé par la tâche de session, les appelle.

use crate::errors::Result;
use crate::model::{Capability, PlaybackState, PlayerEvents};
use radiocatalog::{MediaItem, MediaMetadata};
use tokio::sync::mpsc;
use tracing::trace;

/// Contrôle du transport (play/pause/stop)
pub trait TransportControl {
    fn play(&mut self) -> Result<()>;
    fn pause(&mut self) -> Result<()>;
    fn stop(&mut self) -> Result<()>;
    /// Prépare la source courante (ouverture du flux, mise en tampon)
    fn prepare(&mut self) -> Result<()>;
}

/// Volume linéaire entre 0.0 et 1.0
pub trait VolumeControl {
    fn volume(&self) -> f32;
    fn set_volume(&mut self, volume: f32) -> Result<()>;
}

/// État de lecture
pub trait PlaybackStatus {
    fn is_playing(&self) -> bool;
    fn playback_state(&self) -> PlaybackState;
    fn content_position_ms(&self) -> u64;
}

/// Liste de lecture du moteur
pub trait PlaylistControl {
    fn set_media_item(&mut self, item: MediaItem) -> Result<()>;
    fn set_media_items(
        &mut self,
        items: Vec<MediaItem>,
        start_index: usize,
        position_ms: u64,
    ) -> Result<()>;
    fn clear_media_items(&mut self) -> Result<()>;
    fn media_item_count(&self) -> usize;
    /// L'item courant tel que le moteur le voit (peut être vide côté cast)
    fn current_media_item(&self) -> Option<MediaItem>;
    fn current_media_item_index(&self) -> Option<usize>;
    fn media_metadata(&self) -> MediaMetadata;
}

/// Un moteur complet, pilotable par le player composite
pub trait PlaybackEngine:
    TransportControl + VolumeControl + PlaybackStatus + PlaylistControl + Send + 'static
{
    fn name(&self) -> &str;

    /// Branche le moteur sur le bus d'événements du player composite
    fn attach(&mut self, sink: EngineEventSink);

    /// Débranche le moteur; il ne doit plus rien émettre ensuite
    fn detach(&mut self);

    /// Libère les ressources du moteur
    fn release(&mut self);
}

/// Where an engine pushes its event batches
///
/// Each batch is tagged with the capability of the engine that produced it.
#[derive(Debug, Clone)]
pub struct EngineEventSink {
    capability: Capability,
    tx: mpsc::UnboundedSender<(Capability, PlayerEvents)>,
}

impl EngineEventSink {
    pub(crate) fn new(
        capability: Capability,
        tx: mpsc::UnboundedSender<(Capability, PlayerEvents)>,
    ) -> Self {
        Self { capability, tx }
    }

    pub fn capability(&self) -> Capability {
        self.capability
    }

    /// Returns `false` once the composite player is gone
    pub fn emit(&self, events: PlayerEvents) -> bool {
        if events.is_empty() {
            return true;
        }
        trace!(capability = self.capability.as_str(), ?events, "Engine events");
        self.tx.send((self.capability, events)).is_ok()
    }
}
