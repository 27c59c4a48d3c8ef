use radiocatalog::{MediaItem, MediaMetadata};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

/// Which engine currently backs the composite player
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Capability {
    #[default]
    Local,
    Cast,
}

impl Capability {
    pub fn as_str(&self) -> &'static str {
        match self {
            Capability::Local => "local",
            Capability::Cast => "cast",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PlaybackState {
    #[default]
    Idle,
    Buffering,
    Ready,
    Ended,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransitionReason {
    Repeat,
    Auto,
    Seek,
    PlaylistChanged,
}

/// Something an engine reports about itself
#[derive(Debug, Clone, PartialEq)]
pub enum PlayerEvent {
    IsPlayingChanged(bool),
    PlaybackStateChanged(PlaybackState),
    MediaItemTransition {
        item: Option<MediaItem>,
        reason: TransitionReason,
    },
    MediaMetadataChanged(MediaMetadata),
    VolumeChanged(f32),
    PlayerError(String),
}

/// Events dispatched together by one engine
///
/// Listeners look at the whole batch: a pause that comes with an item
/// transition is not a "playback stopped" signal.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PlayerEvents {
    events: Vec<PlayerEvent>,
}

impl PlayerEvents {
    pub fn new(events: Vec<PlayerEvent>) -> Self {
        Self { events }
    }

    pub fn single(event: PlayerEvent) -> Self {
        Self {
            events: vec![event],
        }
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &PlayerEvent> {
        self.events.iter()
    }

    pub fn has_is_playing_changed(&self) -> bool {
        self.events
            .iter()
            .any(|e| matches!(e, PlayerEvent::IsPlayingChanged(_)))
    }

    pub fn has_item_transition(&self) -> bool {
        self.events
            .iter()
            .any(|e| matches!(e, PlayerEvent::MediaItemTransition { .. }))
    }

    /// Stopped playing without moving to another item
    pub fn stopped_without_transition(&self) -> bool {
        self.events
            .iter()
            .any(|e| matches!(e, PlayerEvent::IsPlayingChanged(false)))
            && !self.has_item_transition()
    }

    pub(crate) fn events_mut(&mut self) -> &mut Vec<PlayerEvent> {
        &mut self.events
    }
}

impl IntoIterator for PlayerEvents {
    type Item = PlayerEvent;
    type IntoIter = std::vec::IntoIter<PlayerEvent>;

    fn into_iter(self) -> Self::IntoIter {
        self.events.into_iter()
    }
}

/// Player state as seen by controllers, published by the session task
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PlayerSnapshot {
    pub capability: Capability,
    pub is_playing: bool,
    pub playback_state: PlaybackState,
    pub current_item: Option<MediaItem>,
    pub current_index: Option<usize>,
    pub media_item_count: usize,
    pub content_position_ms: u64,
    pub volume: f32,
    pub title: Option<String>,
    /// Remaining sleep time, `None` when the timer is idle
    pub sleep_timer_ms: Option<i64>,
}

impl PlayerSnapshot {
    pub fn current_media_id(&self) -> Option<&str> {
        self.current_item
            .as_ref()
            .map(|item| item.media_id.as_str())
            .filter(|id| !id.is_empty())
    }
}

static NEXT_ERROR_SEQ: AtomicU64 = AtomicU64::new(0);

/// Error shown to the user
///
/// Two `Filled` values never compare equal: each one carries its own
/// sequence number, so the same message raised twice is delivered twice.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum StreamingError {
    #[default]
    Empty,
    Filled {
        message: String,
        seq: u64,
        persistent: bool,
    },
}

impl StreamingError {
    pub fn filled(message: impl Into<String>) -> Self {
        Self::new(message.into(), false)
    }

    /// An error that is not cleared right after being shown
    pub fn persistent(message: impl Into<String>) -> Self {
        Self::new(message.into(), true)
    }

    fn new(message: String, persistent: bool) -> Self {
        StreamingError::Filled {
            message,
            seq: NEXT_ERROR_SEQ.fetch_add(1, Ordering::Relaxed),
            persistent,
        }
    }

    pub fn message(&self) -> Option<&str> {
        match self {
            StreamingError::Empty => None,
            StreamingError::Filled { message, .. } => Some(message),
        }
    }

    pub fn is_persistent(&self) -> bool {
        matches!(self, StreamingError::Filled { persistent: true, .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filled_errors_never_equal() {
        let a = StreamingError::filled("boom");
        let b = StreamingError::filled("boom");
        assert_ne!(a, b);
        assert_eq!(a.message(), b.message());
        assert_eq!(StreamingError::Empty, StreamingError::default());
        assert!(StreamingError::persistent("x").is_persistent());
        assert!(!a.is_persistent());
    }

    #[test]
    fn test_stopped_without_transition() {
        let paused = PlayerEvents::single(PlayerEvent::IsPlayingChanged(false));
        assert!(paused.stopped_without_transition());

        let switching = PlayerEvents::new(vec![
            PlayerEvent::IsPlayingChanged(false),
            PlayerEvent::MediaItemTransition {
                item: None,
                reason: TransitionReason::PlaylistChanged,
            },
        ]);
        assert!(!switching.stopped_without_transition());
        assert!(switching.has_is_playing_changed());

        let started = PlayerEvents::single(PlayerEvent::IsPlayingChanged(true));
        assert!(!started.stopped_without_transition());
    }

    #[test]
    fn test_snapshot_ignores_empty_id() {
        let snapshot = PlayerSnapshot {
            current_item: Some(MediaItem::EMPTY),
            ..Default::default()
        };
        assert_eq!(snapshot.current_media_id(), None);
    }
}
