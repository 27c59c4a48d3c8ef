//! Simulated engines for the headless host
//!
//! Pas de décodage audio ici: le moteur tient sa liste de lecture, trace
//! chaque appel et émet les événements qu'un vrai moteur produirait.

use radiocatalog::{MediaItem, MediaMetadata};
use radioplayback::{
    AudioEqualizer, EngineEventSink, PlaybackEngine, PlaybackError, PlaybackState,
    PlaybackStatus, PlayerEvent, PlayerEvents, PlaylistControl, Result, TransitionReason,
    TransportControl, VolumeControl,
};
use std::time::Instant;
use tracing::{debug, info};

pub struct SimulatedEngine {
    name: String,
    playing: bool,
    state: PlaybackState,
    volume: f32,
    items: Vec<MediaItem>,
    index: Option<usize>,
    /// Position au dernier arrêt, et instant de reprise si on joue
    position_ms: u64,
    resumed_at: Option<Instant>,
    sink: Option<EngineEventSink>,
}

impl SimulatedEngine {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            playing: false,
            state: PlaybackState::Idle,
            volume: 1.0,
            items: Vec::new(),
            index: None,
            position_ms: 0,
            resumed_at: None,
            sink: None,
        }
    }

    fn emit(&self, events: Vec<PlayerEvent>) {
        if let Some(sink) = &self.sink {
            sink.emit(PlayerEvents::new(events));
        }
    }

    fn set_playing(&mut self, playing: bool) {
        if self.playing == playing {
            return;
        }
        if playing {
            self.resumed_at = Some(Instant::now());
        } else {
            self.position_ms = self.content_position_ms();
            self.resumed_at = None;
        }
        self.playing = playing;
        self.emit(vec![PlayerEvent::IsPlayingChanged(playing)]);
    }

    fn set_state(&mut self, state: PlaybackState) {
        if self.state != state {
            self.state = state;
            self.emit(vec![PlayerEvent::PlaybackStateChanged(state)]);
        }
    }

    fn load(&mut self, items: Vec<MediaItem>, start_index: usize, position_ms: u64) {
        self.set_playing(false);
        let current = items.get(start_index).cloned();
        self.index = current.as_ref().map(|_| start_index);
        self.items = items;
        self.position_ms = position_ms;
        self.state = PlaybackState::Idle;

        let mut events = vec![PlayerEvent::MediaItemTransition {
            item: current.clone(),
            reason: TransitionReason::PlaylistChanged,
        }];
        if let Some(item) = current {
            info!(engine = %self.name, media_id = %item.media_id, uri = ?item.uri, "Loaded");
            events.push(PlayerEvent::MediaMetadataChanged(item.metadata));
        }
        self.emit(events);
    }
}

impl TransportControl for SimulatedEngine {
    fn play(&mut self) -> Result<()> {
        if self.index.is_none() {
            return Err(PlaybackError::engine(&self.name, "nothing to play"));
        }
        debug!(engine = %self.name, "play");
        if self.state == PlaybackState::Idle {
            self.prepare()?;
        }
        self.set_playing(true);
        Ok(())
    }

    fn pause(&mut self) -> Result<()> {
        debug!(engine = %self.name, "pause");
        self.set_playing(false);
        Ok(())
    }

    fn stop(&mut self) -> Result<()> {
        debug!(engine = %self.name, "stop");
        self.set_playing(false);
        self.set_state(PlaybackState::Idle);
        Ok(())
    }

    fn prepare(&mut self) -> Result<()> {
        if self.index.is_none() {
            return Ok(());
        }
        debug!(engine = %self.name, "prepare");
        self.set_state(PlaybackState::Buffering);
        self.set_state(PlaybackState::Ready);
        Ok(())
    }
}

impl VolumeControl for SimulatedEngine {
    fn volume(&self) -> f32 {
        self.volume
    }

    fn set_volume(&mut self, volume: f32) -> Result<()> {
        let volume = volume.clamp(0.0, 1.0);
        if (self.volume - volume).abs() > f32::EPSILON {
            self.volume = volume;
            self.emit(vec![PlayerEvent::VolumeChanged(volume)]);
        }
        Ok(())
    }
}

impl PlaybackStatus for SimulatedEngine {
    fn is_playing(&self) -> bool {
        self.playing
    }

    fn playback_state(&self) -> PlaybackState {
        self.state
    }

    fn content_position_ms(&self) -> u64 {
        let running = self
            .resumed_at
            .map(|at| at.elapsed().as_millis() as u64)
            .unwrap_or(0);
        self.position_ms + running
    }
}

impl PlaylistControl for SimulatedEngine {
    fn set_media_item(&mut self, item: MediaItem) -> Result<()> {
        self.load(vec![item], 0, 0);
        Ok(())
    }

    fn set_media_items(
        &mut self,
        items: Vec<MediaItem>,
        start_index: usize,
        position_ms: u64,
    ) -> Result<()> {
        self.load(items, start_index, position_ms);
        Ok(())
    }

    fn clear_media_items(&mut self) -> Result<()> {
        self.set_playing(false);
        self.items.clear();
        self.index = None;
        self.set_state(PlaybackState::Idle);
        Ok(())
    }

    fn media_item_count(&self) -> usize {
        self.items.len()
    }

    fn current_media_item(&self) -> Option<MediaItem> {
        self.index.and_then(|i| self.items.get(i).cloned())
    }

    fn current_media_item_index(&self) -> Option<usize> {
        self.index
    }

    fn media_metadata(&self) -> MediaMetadata {
        self.current_media_item()
            .map(|item| item.metadata)
            .unwrap_or_default()
    }
}

impl PlaybackEngine for SimulatedEngine {
    fn name(&self) -> &str {
        &self.name
    }

    fn attach(&mut self, sink: EngineEventSink) {
        self.sink = Some(sink);
    }

    fn detach(&mut self) {
        self.sink = None;
    }

    fn release(&mut self) {
        info!(engine = %self.name, "Engine released");
        self.playing = false;
        self.resumed_at = None;
        self.items.clear();
        self.index = None;
        self.sink = None;
    }
}

const BAND_FREQUENCIES: [u32; 5] = [60_000, 230_000, 910_000, 3_600_000, 14_000_000];
const BAND_RANGE: (i16, i16) = (-1500, 1500);
const PRESETS: [(&str, [i16; 5]); 6] = [
    ("Normal", [300, 0, 0, 0, 300]),
    ("Classical", [500, 300, -200, 400, 400]),
    ("Dance", [600, 0, 200, 400, 100]),
    ("Flat", [0, 0, 0, 0, 0]),
    ("Jazz", [400, 200, -200, 200, 500]),
    ("Rock", [500, 300, -100, 300, 500]),
];

/// Égaliseur à cinq bandes piloté par presets
#[derive(Default)]
pub struct SimulatedEqualizer {
    enabled: bool,
    preset: i16,
}

impl AudioEqualizer for SimulatedEqualizer {
    fn band_count(&self) -> u16 {
        BAND_FREQUENCIES.len() as u16
    }

    fn band_level_range(&self) -> (i16, i16) {
        BAND_RANGE
    }

    fn band_level(&self, band: u16) -> i16 {
        PRESETS
            .get(self.preset as usize)
            .and_then(|(_, levels)| levels.get(band as usize))
            .copied()
            .unwrap_or(0)
    }

    fn center_frequency(&self, band: u16) -> u32 {
        BAND_FREQUENCIES.get(band as usize).copied().unwrap_or(0)
    }

    fn preset_names(&self) -> Vec<String> {
        PRESETS.iter().map(|(name, _)| name.to_string()).collect()
    }

    fn current_preset(&self) -> i16 {
        self.preset
    }

    fn use_preset(&mut self, preset: i16) -> Result<()> {
        if preset < 0 || preset as usize >= PRESETS.len() {
            return Err(PlaybackError::equalizer(format!("no preset {}", preset)));
        }
        self.preset = preset;
        debug!(preset = PRESETS[preset as usize].0, "Equalizer preset applied");
        Ok(())
    }

    fn is_enabled(&self) -> bool {
        self.enabled
    }

    fn set_enabled(&mut self, enabled: bool) -> Result<()> {
        self.enabled = enabled;
        Ok(())
    }
}
