//! Composite player
//!
//! [`CompositePlayer`] presents one playback surface backed by either the
//! local engine or the cast engine. Neither engine keeps the full contract
//! on its own:
//!
//! - the cast engine reports an empty item on its own transitions, so the
//!   façade keeps a shadow copy of the current item and playlist and
//!   rewrites transition events with it;
//! - the cast engine cannot show live track titles, so items handed to it
//!   carry a static label instead.
//!
//! The player is owned by the session task. Nothing else may call
//! [`CompositePlayer::switch_to`] or the `set_*` methods.

use crate::capabilities::{EngineEventSink, PlaybackEngine};
use crate::errors::Result;
use crate::events::EventBus;
use crate::model::{Capability, PlaybackState, PlayerEvent, PlayerEvents};
use radiocatalog::{MediaItem, MediaMetadata};
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver};
use tracing::{debug, info, trace, warn};

/// Raw engine events, tagged with the engine that produced them
pub type EngineEvents = UnboundedReceiver<(Capability, PlayerEvents)>;

/// What the façade remembers independently of the engines
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ShadowState {
    pub current_item: Option<MediaItem>,
    pub playlist: Vec<MediaItem>,
    pub index: Option<usize>,
}

impl ShadowState {
    fn clear(&mut self) {
        *self = ShadowState::default();
    }
}

pub struct CompositePlayer<L, C> {
    local: L,
    cast: C,
    capability: Capability,
    shadow: ShadowState,
    casting_label: String,
    listeners: EventBus<PlayerEvents>,
    released: bool,
}

impl<L: PlaybackEngine, C: PlaybackEngine> CompositePlayer<L, C> {
    /// Wires both engines to a fresh event channel
    ///
    /// The returned receiver must be drained by the owner, which hands each
    /// batch back to [`CompositePlayer::handle_engine_events`].
    pub fn new(
        mut local: L,
        mut cast: C,
        capability: Capability,
        casting_label: impl Into<String>,
    ) -> (Self, EngineEvents) {
        let (tx, rx) = unbounded_channel();
        local.attach(EngineEventSink::new(Capability::Local, tx.clone()));
        cast.attach(EngineEventSink::new(Capability::Cast, tx));

        let player = Self {
            local,
            cast,
            capability,
            shadow: ShadowState::default(),
            casting_label: casting_label.into(),
            listeners: EventBus::new(),
            released: false,
        };
        (player, rx)
    }

    pub fn capability(&self) -> Capability {
        self.capability
    }

    pub fn shadow(&self) -> &ShadowState {
        &self.shadow
    }

    pub fn local(&self) -> &L {
        &self.local
    }

    pub fn cast(&self) -> &C {
        &self.cast
    }

    pub fn subscribe(&self) -> UnboundedReceiver<PlayerEvents> {
        self.listeners.subscribe()
    }

    fn active(&mut self) -> &mut dyn PlaybackEngine {
        match self.capability {
            Capability::Local => &mut self.local,
            Capability::Cast => &mut self.cast,
        }
    }

    fn active_ref(&self) -> &dyn PlaybackEngine {
        match self.capability {
            Capability::Local => &self.local,
            Capability::Cast => &self.cast,
        }
    }

    /// The item as the given engine should display it
    fn display_item(&self, item: &MediaItem, capability: Capability) -> MediaItem {
        match capability {
            Capability::Local => item.with_title(None),
            Capability::Cast => item.with_title(Some(self.casting_label.clone())),
        }
    }

    pub fn set_media_item(&mut self, item: MediaItem) -> Result<()> {
        self.shadow.current_item = Some(item.clone());
        self.shadow.playlist = vec![item.clone()];
        self.shadow.index = Some(0);

        let shown = self.display_item(&item, self.capability);
        let engine = self.active();
        engine.stop()?;
        engine.set_media_item(shown)
    }

    pub fn set_media_items(
        &mut self,
        items: Vec<MediaItem>,
        start_index: usize,
        position_ms: u64,
    ) -> Result<()> {
        let index = (!items.is_empty()).then(|| start_index.min(items.len() - 1));
        self.shadow.current_item = index.and_then(|i| items.get(i).cloned());
        self.shadow.index = index;

        let capability = self.capability;
        let shown: Vec<MediaItem> = items
            .iter()
            .map(|item| self.display_item(item, capability))
            .collect();
        self.shadow.playlist = items;

        self.active()
            .set_media_items(shown, index.unwrap_or(0), position_ms)
    }

    pub fn clear_media_items(&mut self) -> Result<()> {
        self.shadow.clear();
        self.active().clear_media_items()
    }

    /// Moves playback to another engine
    ///
    /// Returns `false` when `target` is already active. With a shadow item
    /// the source is stopped and the destination gets the playlist again,
    /// prepared and playing; without one only the routing changes.
    pub fn switch_to(&mut self, target: Capability) -> Result<bool> {
        if self.released {
            warn!("Switch requested on a released player");
            return Ok(false);
        }
        if self.capability == target {
            debug!(capability = target.as_str(), "Already on this capability");
            return Ok(false);
        }

        let source = self.capability;
        let Some(current) = self.shadow.current_item.clone() else {
            info!(
                from = source.as_str(),
                to = target.as_str(),
                "Capability handover without media"
            );
            self.capability = target;
            return Ok(true);
        };

        info!(
            from = source.as_str(),
            to = target.as_str(),
            media_id = %current.media_id,
            "Switching capability"
        );
        self.active().stop()?;
        self.capability = target;

        if self.shadow.playlist.len() > 1 {
            let index = self.shadow.index.unwrap_or(0);
            let items: Vec<MediaItem> = self
                .shadow
                .playlist
                .iter()
                .map(|item| self.display_item(item, target))
                .collect();
            self.active().set_media_items(items, index, 0)?;
        } else {
            let shown = self.display_item(&current, target);
            self.active().set_media_item(shown)?;
        }
        let engine = self.active();
        engine.prepare()?;
        engine.play()?;
        Ok(true)
    }

    /// Rewrites and fans out one batch coming from an engine
    ///
    /// Batches from the inactive engine are dropped and `None` is returned.
    pub fn handle_engine_events(
        &mut self,
        capability: Capability,
        mut batch: PlayerEvents,
    ) -> Option<PlayerEvents> {
        if self.released || capability != self.capability {
            trace!(
                capability = capability.as_str(),
                "Ignoring events from inactive engine"
            );
            return None;
        }

        for event in batch.events_mut().iter_mut() {
            match event {
                PlayerEvent::MediaItemTransition { item, .. } => {
                    self.follow_transition(item.as_ref());
                    if self.shadow.current_item.is_some() {
                        *item = self.shadow.current_item.clone();
                    }
                }
                PlayerEvent::MediaMetadataChanged(metadata) => {
                    if capability == Capability::Local {
                        if let Some(current) = self.shadow.current_item.as_mut() {
                            current.metadata.title = metadata.title.clone();
                        }
                    }
                }
                PlayerEvent::PlayerError(message) => {
                    warn!(capability = capability.as_str(), %message, "Engine error");
                }
                _ => {}
            }
        }

        self.listeners.broadcast(batch.clone());
        Some(batch)
    }

    /// Moves the shadow index when the engine reports an item we know
    fn follow_transition(&mut self, reported: Option<&MediaItem>) {
        let Some(reported) = reported.filter(|item| !item.is_empty()) else {
            return;
        };
        if let Some(pos) = self
            .shadow
            .playlist
            .iter()
            .position(|item| item.media_id == reported.media_id)
        {
            if self.shadow.index != Some(pos) {
                self.shadow.index = Some(pos);
                self.shadow.current_item = self.shadow.playlist.get(pos).cloned();
            }
        }
    }

    pub fn play(&mut self) -> Result<()> {
        self.active().play()
    }

    pub fn pause(&mut self) -> Result<()> {
        self.active().pause()
    }

    pub fn stop(&mut self) -> Result<()> {
        self.active().stop()
    }

    pub fn prepare(&mut self) -> Result<()> {
        self.active().prepare()
    }

    pub fn is_playing(&self) -> bool {
        self.active_ref().is_playing()
    }

    pub fn playback_state(&self) -> PlaybackState {
        self.active_ref().playback_state()
    }

    pub fn volume(&self) -> f32 {
        self.active_ref().volume()
    }

    pub fn set_volume(&mut self, volume: f32) -> Result<()> {
        self.active().set_volume(volume.clamp(0.0, 1.0))
    }

    pub fn media_item_count(&self) -> usize {
        self.active_ref().media_item_count()
    }

    /// The shadow item, falling back to what the engine reports
    pub fn current_media_item(&self) -> Option<MediaItem> {
        self.shadow
            .current_item
            .clone()
            .or_else(|| self.active_ref().current_media_item())
    }

    pub fn current_media_item_index(&self) -> Option<usize> {
        self.shadow
            .index
            .or_else(|| self.active_ref().current_media_item_index())
    }

    pub fn content_position_ms(&self) -> u64 {
        self.active_ref().content_position_ms()
    }

    pub fn media_metadata(&self) -> MediaMetadata {
        self.active_ref().media_metadata()
    }

    pub fn is_released(&self) -> bool {
        self.released
    }

    /// Drops every listener, then detaches and releases both engines
    pub fn release(&mut self) {
        if self.released {
            return;
        }
        self.listeners.clear();
        self.local.detach();
        self.cast.detach();
        self.local.release();
        self.cast.release();
        self.shadow.clear();
        self.released = true;
        info!("Composite player released");
    }
}
