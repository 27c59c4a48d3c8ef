//! Fake engines shared by the unit tests

use crate::capabilities::{
    EngineEventSink, PlaybackEngine, PlaybackStatus, PlaylistControl, TransportControl,
    VolumeControl,
};
use crate::errors::Result;
use crate::model::{PlaybackState, PlayerEvent, PlayerEvents, TransitionReason};
use radiocatalog::{MediaItem, MediaMetadata, Stream};
use std::sync::{Arc, Mutex};

pub(crate) fn item(id: &str) -> MediaItem {
    MediaItem::from_stream(&Stream::new(id, format!("u{}", id), format!("Station {}", id), ""))
}

#[derive(Default)]
struct Shared {
    calls: Vec<String>,
    playing: bool,
    volume: f32,
    items: Vec<MediaItem>,
    index: Option<usize>,
    position_ms: u64,
    sink: Option<EngineEventSink>,
}

/// Engine recording every call; emits the events a real engine would
pub(crate) struct FakeEngine {
    name: String,
    shared: Arc<Mutex<Shared>>,
}

/// Test-side view of a [`FakeEngine`] moved into a player
#[derive(Clone)]
pub(crate) struct FakeEngineHandle {
    shared: Arc<Mutex<Shared>>,
}

impl FakeEngine {
    pub(crate) fn new(name: &str) -> (Self, FakeEngineHandle) {
        let shared = Arc::new(Mutex::new(Shared {
            volume: 1.0,
            ..Default::default()
        }));
        (
            Self {
                name: name.to_string(),
                shared: shared.clone(),
            },
            FakeEngineHandle { shared },
        )
    }

    fn record(&self, call: String) -> std::sync::MutexGuard<'_, Shared> {
        let mut shared = self.shared.lock().unwrap();
        shared.calls.push(call);
        shared
    }

    fn emit(shared: &Shared, events: Vec<PlayerEvent>) {
        if let Some(sink) = &shared.sink {
            sink.emit(PlayerEvents::new(events));
        }
    }

    fn set_playing(&self, call: &str, playing: bool) {
        let mut shared = self.record(call.to_string());
        if shared.playing != playing {
            shared.playing = playing;
            Self::emit(&shared, vec![PlayerEvent::IsPlayingChanged(playing)]);
        }
    }
}

impl FakeEngineHandle {
    pub(crate) fn take_calls(&self) -> Vec<String> {
        std::mem::take(&mut self.shared.lock().unwrap().calls)
    }

    pub(crate) fn calls(&self) -> Vec<String> {
        self.shared.lock().unwrap().calls.clone()
    }

    pub(crate) fn is_playing(&self) -> bool {
        self.shared.lock().unwrap().playing
    }

    pub(crate) fn volume(&self) -> f32 {
        self.shared.lock().unwrap().volume
    }

    pub(crate) fn items(&self) -> Vec<MediaItem> {
        self.shared.lock().unwrap().items.clone()
    }

    pub(crate) fn items_titles(&self) -> Vec<String> {
        self.items()
            .iter()
            .map(|i| i.metadata.title.clone().unwrap_or_default())
            .collect()
    }

    pub(crate) fn is_attached(&self) -> bool {
        self.shared.lock().unwrap().sink.is_some()
    }

    pub(crate) fn emit(&self, events: PlayerEvents) {
        let shared = self.shared.lock().unwrap();
        if let Some(sink) = &shared.sink {
            sink.emit(events);
        }
    }

    /// Simulates the user or the system stopping playback
    pub(crate) fn stop_externally(&self) {
        let mut shared = self.shared.lock().unwrap();
        shared.playing = false;
        if let Some(sink) = &shared.sink {
            sink.emit(PlayerEvents::single(PlayerEvent::IsPlayingChanged(false)));
        }
    }

    /// The current item takes `title`, then the change is reported
    pub(crate) fn emit_title(&self, title: &str) {
        {
            let mut shared = self.shared.lock().unwrap();
            if let Some(index) = shared.index {
                if let Some(item) = shared.items.get_mut(index) {
                    item.metadata.title = Some(title.to_string());
                }
            }
        }
        self.emit(PlayerEvents::single(PlayerEvent::MediaMetadataChanged(
            MediaMetadata {
                title: Some(title.to_string()),
                ..Default::default()
            },
        )));
    }
}

impl TransportControl for FakeEngine {
    fn play(&mut self) -> Result<()> {
        self.set_playing("play", true);
        Ok(())
    }

    fn pause(&mut self) -> Result<()> {
        self.set_playing("pause", false);
        Ok(())
    }

    fn stop(&mut self) -> Result<()> {
        self.set_playing("stop", false);
        Ok(())
    }

    fn prepare(&mut self) -> Result<()> {
        self.record("prepare".to_string());
        Ok(())
    }
}

impl VolumeControl for FakeEngine {
    fn volume(&self) -> f32 {
        self.shared.lock().unwrap().volume
    }

    fn set_volume(&mut self, volume: f32) -> Result<()> {
        let mut shared = self.record("set_volume".to_string());
        shared.volume = volume;
        Ok(())
    }
}

impl PlaybackStatus for FakeEngine {
    fn is_playing(&self) -> bool {
        self.shared.lock().unwrap().playing
    }

    fn playback_state(&self) -> PlaybackState {
        let shared = self.shared.lock().unwrap();
        if shared.items.is_empty() {
            PlaybackState::Idle
        } else {
            PlaybackState::Ready
        }
    }

    fn content_position_ms(&self) -> u64 {
        self.shared.lock().unwrap().position_ms
    }
}

impl PlaylistControl for FakeEngine {
    fn set_media_item(&mut self, item: MediaItem) -> Result<()> {
        let mut shared = self.record(format!(
            "set_item:{}:{}",
            item.media_id,
            item.metadata.title.clone().unwrap_or_default()
        ));
        shared.items = vec![item.clone()];
        shared.index = Some(0);
        shared.position_ms = 0;
        Self::emit(
            &shared,
            vec![PlayerEvent::MediaItemTransition {
                item: Some(item),
                reason: TransitionReason::PlaylistChanged,
            }],
        );
        Ok(())
    }

    fn set_media_items(
        &mut self,
        items: Vec<MediaItem>,
        start_index: usize,
        position_ms: u64,
    ) -> Result<()> {
        let mut shared = self.record(format!("set_items:{}@{}", items.len(), start_index));
        let current = items.get(start_index).cloned();
        shared.index = current.as_ref().map(|_| start_index);
        shared.items = items;
        shared.position_ms = position_ms;
        Self::emit(
            &shared,
            vec![PlayerEvent::MediaItemTransition {
                item: current,
                reason: TransitionReason::PlaylistChanged,
            }],
        );
        Ok(())
    }

    fn clear_media_items(&mut self) -> Result<()> {
        let mut shared = self.record("clear".to_string());
        shared.items.clear();
        shared.index = None;
        Ok(())
    }

    fn media_item_count(&self) -> usize {
        self.shared.lock().unwrap().items.len()
    }

    fn current_media_item(&self) -> Option<MediaItem> {
        let shared = self.shared.lock().unwrap();
        shared.index.and_then(|i| shared.items.get(i).cloned())
    }

    fn current_media_item_index(&self) -> Option<usize> {
        self.shared.lock().unwrap().index
    }

    fn media_metadata(&self) -> MediaMetadata {
        self.current_media_item()
            .map(|item| item.metadata)
            .unwrap_or_default()
    }
}

impl PlaybackEngine for FakeEngine {
    fn name(&self) -> &str {
        &self.name
    }

    fn attach(&mut self, sink: EngineEventSink) {
        self.shared.lock().unwrap().sink = Some(sink);
    }

    fn detach(&mut self) {
        let mut shared = self.record("detach".to_string());
        shared.sink = None;
    }

    fn release(&mut self) {
        self.record("release".to_string());
    }
}
